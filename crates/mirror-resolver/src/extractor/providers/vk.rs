use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use reqwest::header;

use crate::extractor::error::ExtractorError;
use crate::extractor::handler::{Extractor, ResolveContext, StreamHandler};
use crate::media::{HeaderPairs, Quality, ResolvedMedia};

pub const DOMAINS: &[&str] = &["vk.com", "vkvideo.ru", "vk.ru"];

const SITE: &str = "https://vk.com";

// "mp4_720":"https:\/\/vkvd123.okcdn.ru\/?expires=..."
static MP4_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""mp4_(\d+)":"(https:\\/\\/[^"]+)""#).unwrap());

pub struct Vk;

impl Vk {
    pub(crate) fn embed_url(locator: &str) -> String {
        locator.replacen("video_ext", "video_embed", 1)
    }

    /// Highest `mp4_{height}` rendition listed in the player config.
    pub(crate) fn best_mp4(html: &str) -> Option<(u32, String)> {
        MP4_REGEX
            .captures_iter(html)
            .filter_map(|caps| Some((caps[1].parse::<u32>().ok()?, caps[2].replace("\\/", "/"))))
            .max_by_key(|(height, _)| *height)
    }
}

#[async_trait]
impl StreamHandler for Vk {
    async fn resolve(
        &self,
        ctx: &ResolveContext,
        locator: &str,
    ) -> Result<ResolvedMedia, ExtractorError> {
        let extractor = Extractor::new("vk", ctx);
        let html = extractor.fetch_text(&Self::embed_url(locator)).await?;
        let (height, url) =
            Self::best_mp4(&html).ok_or(ExtractorError::PatternMissing("mp4 renditions"))?;

        let mut headers = HeaderPairs::new();
        headers.insert("Accept".to_string(), "*/*".to_string());
        headers.insert("Origin".to_string(), SITE.to_string());
        headers.insert("Referer".to_string(), format!("{SITE}/"));
        if let Some(user_agent) = extractor.header(&header::USER_AGENT) {
            headers.insert("User-Agent".to_string(), user_agent.to_string());
        }
        Ok(ResolvedMedia::new(url, Quality::from_height(height)).with_request_headers(headers))
    }
}
