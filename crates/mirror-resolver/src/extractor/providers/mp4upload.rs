use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use reqwest::header;

use super::capture;
use crate::extractor::error::ExtractorError;
use crate::extractor::handler::{Extractor, ResolveContext, StreamHandler};
use crate::media::{Quality, ResolvedMedia};

pub const DOMAINS: &[&str] = &["mp4upload.com"];

static SOURCE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"player\.src\(\s*\{\s*type:\s*"video/mp4",\s*src:\s*"([^"]+)""#).unwrap()
});
static HEIGHT_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"embed:\s*'[^']*?\bHEIGHT=(\d+)").unwrap());

const REFERER: &str = "https://www.mp4upload.com/";

pub struct Mp4upload;

impl Mp4upload {
    pub(crate) fn parse(html: &str) -> Result<(String, Quality), ExtractorError> {
        let url = capture(&SOURCE_REGEX, html, "player.src")?.to_string();
        let quality = HEIGHT_REGEX
            .captures(html)
            .and_then(|caps| caps[1].parse().ok())
            .map(Quality::from_height)
            .unwrap_or_default();
        Ok((url, quality))
    }
}

#[async_trait]
impl StreamHandler for Mp4upload {
    async fn resolve(
        &self,
        ctx: &ResolveContext,
        locator: &str,
    ) -> Result<ResolvedMedia, ExtractorError> {
        let mut extractor = Extractor::new("mp4upload", ctx);
        extractor.add_header(header::REFERER, REFERER);

        let html = extractor.fetch_text(locator).await?;
        let (url, quality) = Self::parse(&html)?;
        Ok(ResolvedMedia::new(url, quality).with_request_headers(
            extractor.replay_headers(&[header::USER_AGENT, header::REFERER]),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractor::handler::tests::test_context;

    #[test]
    fn test_parse() {
        let html = r#"<script>player.src({ type: "video/mp4", src: "https://a4.mp4upload.com:183/d/xyz/video.mp4" });
var cfg = { embed: '<iframe WIDTH=1280 HEIGHT=720 src=x>' };</script>"#;
        let (url, quality) = Mp4upload::parse(html).unwrap();
        assert_eq!(url, "https://a4.mp4upload.com:183/d/xyz/video.mp4");
        assert_eq!(quality, Quality::Height(720));
    }

    #[test]
    fn test_parse_without_height() {
        let html = r#"player.src({type: "video/mp4", src: "https://a.example/v.mp4"})"#;
        assert_eq!(
            Mp4upload::parse(html).unwrap().1,
            Quality::Unknown
        );
    }

    #[tokio::test]
    #[ignore]
    async fn test_mp4upload_live() {
        let result = Mp4upload
            .resolve(
                &test_context(),
                "https://www.mp4upload.com/embed-4kz23r0tp9li.html",
            )
            .await;
        println!("{result:?}");
    }
}
