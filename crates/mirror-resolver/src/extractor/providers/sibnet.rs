use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use reqwest::header;

use super::capture;
use crate::extractor::error::ExtractorError;
use crate::extractor::handler::{Extractor, ResolveContext, StreamHandler, parse_locator};
use crate::media::{Quality, ResolvedMedia};

pub const DOMAINS: &[&str] = &["video.sibnet.ru"];

static SOURCE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?s)player\.src\(.*?src\s*:\s*"([^"]+)""#).unwrap());

pub struct Sibnet;

impl Sibnet {
    /// The player source, made absolute against the page origin.
    pub(crate) fn source_url(html: &str, origin: &str) -> Result<String, ExtractorError> {
        let source = capture(&SOURCE_REGEX, html, "player.src")?;
        if source.starts_with("http") {
            Ok(source.to_string())
        } else if let Some(rest) = source.strip_prefix("//") {
            Ok(format!("https://{rest}"))
        } else {
            Ok(format!("{origin}{source}"))
        }
    }
}

#[async_trait]
impl StreamHandler for Sibnet {
    async fn resolve(
        &self,
        ctx: &ResolveContext,
        locator: &str,
    ) -> Result<ResolvedMedia, ExtractorError> {
        let (_, origin) = parse_locator(locator)?;
        let mut extractor = Extractor::new("sibnet", ctx);
        let html = extractor.fetch_text(locator).await?;
        let url = Self::source_url(&html, &origin)?;

        // the CDN refuses requests without the embed page as referer
        extractor.add_header(header::REFERER, locator);
        Ok(ResolvedMedia::new(url, Quality::Unknown)
            .with_request_headers(extractor.replay_headers(&[header::REFERER])))
    }
}
