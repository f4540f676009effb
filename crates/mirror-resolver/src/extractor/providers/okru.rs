use std::sync::LazyLock;

use async_trait::async_trait;
use scraper::{Html, Selector};
use serde::Deserialize;

use crate::extractor::error::ExtractorError;
use crate::extractor::handler::{Extractor, ResolveContext, StreamHandler};
use crate::media::{Quality, ResolvedMedia};

pub const DOMAINS: &[&str] = &["ok.ru", "odnoklassniki.ru"];

static OPTIONS_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div[data-options]").unwrap());

#[derive(Debug, Deserialize)]
struct PlayerOptions {
    flashvars: Flashvars,
}

#[derive(Debug, Deserialize)]
struct Flashvars {
    // JSON encoded inside a string
    metadata: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Metadata {
    #[serde(default)]
    videos: Vec<Video>,
    #[serde(default)]
    ondemand_hls: Option<String>,
    #[serde(default)]
    hls_manifest_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Video {
    name: String,
    url: String,
}

fn quality_height(name: &str) -> Option<u32> {
    let height = match name {
        "ultra" => 2160,
        "quad" => 1440,
        "full" => 1080,
        "hd" => 720,
        "sd" => 480,
        "low" => 360,
        "lowest" => 240,
        "mobile" => 144,
        _ => return None,
    };
    Some(height)
}

fn unescape_link(link: &str) -> String {
    link.replace("\\\\u0026", "&").replace("\\u0026", "&")
}

pub struct Okru;

impl Okru {
    pub(crate) fn parse_metadata(html: &str) -> Result<Metadata, ExtractorError> {
        let document = Html::parse_document(html);
        let options = document
            .select(&OPTIONS_SELECTOR)
            .find_map(|div| div.value().attr("data-options"))
            .ok_or(ExtractorError::PatternMissing("data-options"))?;
        let options: PlayerOptions = serde_json::from_str(options)?;
        Ok(serde_json::from_str(&options.flashvars.metadata)?)
    }

    /// Best progressive rendition, falling back to the adaptive manifest.
    pub(crate) fn pick(metadata: &Metadata) -> Option<ResolvedMedia> {
        let progressive = metadata
            .videos
            .iter()
            .filter_map(|video| {
                let url = unescape_link(&video.url);
                let height = quality_height(&video.name)?;
                url.starts_with("https://").then_some((height, url))
            })
            .max_by_key(|(height, _)| *height);

        if let Some((height, url)) = progressive {
            return Some(ResolvedMedia::new(url, Quality::from_height(height)));
        }

        metadata
            .ondemand_hls
            .as_deref()
            .or(metadata.hls_manifest_url.as_deref())
            .filter(|url| !url.is_empty())
            .map(|url| ResolvedMedia::new(unescape_link(url), Quality::Unknown))
    }
}

#[async_trait]
impl StreamHandler for Okru {
    async fn resolve(
        &self,
        ctx: &ResolveContext,
        locator: &str,
    ) -> Result<ResolvedMedia, ExtractorError> {
        let extractor = Extractor::new("okru", ctx);
        let html = extractor.fetch_relayed(locator).await?;
        let metadata = Self::parse_metadata(&html)?;
        Self::pick(&metadata).ok_or(ExtractorError::NoStreamsFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractor::handler::tests::test_context;

    fn page(metadata: &str) -> String {
        let options = serde_json::json!({ "flashvars": { "metadata": metadata } });
        let attr = options.to_string().replace('"', "&quot;");
        format!(r#"<html><div class="vid-card" data-options="{attr}"></div></html>"#)
    }

    #[test]
    fn test_highest_progressive_rendition() {
        let html = page(
            r#"{"videos":[{"name":"mobile","url":"https://vd1.example/m.mp4"},{"name":"hd","url":"https://vd1.example/hd.mp4?a=1\\u0026b=2"},{"name":"sd","url":"https://vd1.example/sd.mp4"},{"name":"full","url":"http://insecure.example/f.mp4"}]}"#,
        );
        let metadata = Okru::parse_metadata(&html).unwrap();
        let media = Okru::pick(&metadata).unwrap();
        assert_eq!(media.url, "https://vd1.example/hd.mp4?a=1&b=2");
        assert_eq!(media.quality, Quality::Height(720));
    }

    #[test]
    fn test_hls_fallback() {
        let html = page(r#"{"videos":[],"ondemandHls":"https://vd1.example/master.m3u8"}"#);
        let metadata = Okru::parse_metadata(&html).unwrap();
        let media = Okru::pick(&metadata).unwrap();
        assert_eq!(media.url, "https://vd1.example/master.m3u8");
        assert_eq!(media.quality, Quality::Unknown);
    }

    #[test]
    fn test_missing_options() {
        assert!(matches!(
            Okru::parse_metadata("<html></html>"),
            Err(ExtractorError::PatternMissing("data-options"))
        ));
        assert!(Okru::pick(&Metadata::default()).is_none());
    }

    #[tokio::test]
    #[ignore]
    async fn test_okru_live() {
        let result = Okru
            .resolve(&test_context(), "https://ok.ru/videoembed/6183537920696")
            .await;
        println!("{result:?}");
    }
}
