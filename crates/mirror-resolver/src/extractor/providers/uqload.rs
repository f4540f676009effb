use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use reqwest::header;

use super::capture;
use crate::extractor::error::ExtractorError;
use crate::extractor::handler::{Extractor, ResolveContext, StreamHandler};
use crate::media::{Quality, ResolvedMedia};

pub const DOMAINS: &[&str] = &["uqload."];

static SOURCES_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"sources:\s*\["(https?.*?\.mp4)"\]"#).unwrap());

const REFERER: &str = "https://uqload.co/";

pub struct Uqload;

#[async_trait]
impl StreamHandler for Uqload {
    async fn resolve(
        &self,
        ctx: &ResolveContext,
        locator: &str,
    ) -> Result<ResolvedMedia, ExtractorError> {
        let mut extractor = Extractor::new("uqload", ctx);
        let html = extractor.fetch_text(locator).await?;
        let url = capture(&SOURCES_REGEX, &html, "sources")?.to_string();

        extractor.add_header(header::REFERER, REFERER);
        Ok(ResolvedMedia::new(url, Quality::Unknown)
            .with_request_headers(extractor.replay_headers(&[header::REFERER])))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractor::handler::tests::test_context;

    #[test]
    fn test_sources_pattern() {
        let html = r#"<script>var player = new Clappr.Player({sources: ["https://m180.uqload.co/3rfk/v.mp4"], poster: "x"});</script>"#;
        assert_eq!(
            capture(&SOURCES_REGEX, html, "sources").unwrap(),
            "https://m180.uqload.co/3rfk/v.mp4"
        );
        assert!(capture(&SOURCES_REGEX, "sources: []", "sources").is_err());
    }

    #[tokio::test]
    #[ignore]
    async fn test_uqload_live() {
        let result = Uqload
            .resolve(&test_context(), "https://uqload.co/embed-7x8lf0kqoq2c.html")
            .await;
        println!("{result:?}");
    }
}
