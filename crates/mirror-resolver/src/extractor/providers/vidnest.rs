use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use reqwest::header;

use crate::extractor::error::ExtractorError;
use crate::extractor::handler::{Extractor, ResolveContext, StreamHandler};
use crate::media::{Quality, ResolvedMedia};

pub const DOMAINS: &[&str] = &["vidnest.io"];

static SOURCES_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"sources:\s*\[\{file:"([^"]+)",label:"([^"]+)"\}\]"#).unwrap()
});

const REFERER: &str = "https://vidnest.io/";

pub struct Vidnest;

impl Vidnest {
    pub(crate) fn parse(html: &str) -> Result<(String, Quality), ExtractorError> {
        let caps = SOURCES_REGEX
            .captures(html)
            .ok_or(ExtractorError::PatternMissing("sources"))?;
        // labels look like "1920x1080 2311 kbps"
        Ok((caps[1].to_string(), Quality::from_label(&caps[2])))
    }
}

#[async_trait]
impl StreamHandler for Vidnest {
    async fn resolve(
        &self,
        ctx: &ResolveContext,
        locator: &str,
    ) -> Result<ResolvedMedia, ExtractorError> {
        let mut extractor = Extractor::new("vidnest", ctx);
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
        let html = r#"jwplayer("vplayer").setup({sources: [{file:"https://s1.vidnest.io/hls/x/master.m3u8",label:"1920x1080 2311 kbps"}],image:"p.jpg"});"#;
        let (url, quality) = Vidnest::parse(html).unwrap();
        assert_eq!(url, "https://s1.vidnest.io/hls/x/master.m3u8");
        assert_eq!(quality, Quality::Height(1080));
    }

    #[test]
    fn test_parse_missing_sources() {
        assert!(matches!(
            Vidnest::parse("<html></html>"),
            Err(ExtractorError::PatternMissing("sources"))
        ));
    }

    #[tokio::test]
    #[ignore]
    async fn test_vidnest_live() {
        let result = Vidnest
            .resolve(&test_context(), "https://vidnest.io/embed-5xsbjc4ohpyo.html")
            .await;
        println!("{result:?}");
    }
}
