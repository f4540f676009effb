use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use reqwest::header;
use scraper::{Html, Selector};

use crate::extractor::error::ExtractorError;
use crate::extractor::handler::{Extractor, ResolveContext, StreamHandler};
use crate::media::{Quality, ResolvedMedia};

pub const DOMAINS: &[&str] = &["streamtape", "strtape", "stape.fun", "streamta.pe"];

static SCRIPT_SELECTOR: LazyLock<Selector> = LazyLock::new(|| Selector::parse("script").unwrap());
static INNER_HTML_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"innerHTML\s*=\s*["']([^"']*)["']"#).unwrap());
static TOKEN_TAIL_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\('xcd(.*?)'\)").unwrap());

const EMBED_BASE: &str = "https://streamtape.com/e/";
const LINK_MARKER: &str = "document.getElementById('robotlink')";

pub struct Streamtape;

impl Streamtape {
    /// Rewrites `/v/{id}/...` and mirror-domain links to the canonical embed page.
    pub(crate) fn embed_url(locator: &str) -> Result<String, ExtractorError> {
        if locator.starts_with(EMBED_BASE) {
            return Ok(locator.to_string());
        }
        locator
            .split('/')
            .nth(4)
            .filter(|id| !id.is_empty())
            .map(|id| format!("{EMBED_BASE}{id}"))
            .ok_or_else(|| ExtractorError::InvalidUrl(locator.to_string()))
    }

    /// Joins the visible link prefix with the token tail the page appends
    /// through string slicing.
    pub(crate) fn assemble_link(html: &str) -> Result<String, ExtractorError> {
        let document = Html::parse_document(html);
        let script = document
            .select(&SCRIPT_SELECTOR)
            .map(|s| s.text().collect::<String>())
            .find(|text| text.contains(LINK_MARKER))
            .ok_or(ExtractorError::PatternMissing("robotlink"))?;

        let prefix = INNER_HTML_REGEX
            .captures(&script)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str())
            .ok_or(ExtractorError::PatternMissing("innerHTML"))?;
        let tail = TOKEN_TAIL_REGEX
            .captures_iter(&script)
            .nth(1)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str())
            .ok_or(ExtractorError::PatternMissing("token tail"))?;

        let mut chars = prefix.chars();
        chars.next_back();
        Ok(format!("https:/{}{tail}&stream=1", chars.as_str()))
    }
}

#[async_trait]
impl StreamHandler for Streamtape {
    async fn resolve(
        &self,
        ctx: &ResolveContext,
        locator: &str,
    ) -> Result<ResolvedMedia, ExtractorError> {
        let embed_url = Self::embed_url(locator)?;
        let mut extractor = Extractor::new("streamtape", ctx);
        extractor.add_header(header::REFERER, &embed_url);

        let html = extractor.fetch_text(&embed_url).await?;
        let url = Self::assemble_link(&html)?;
        Ok(ResolvedMedia::new(url, Quality::Unknown).with_request_headers(
            extractor.replay_headers(&[header::USER_AGENT, header::REFERER]),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractor::handler::tests::test_context;

    const PAGE: &str = r#"<html><body>
<div id="robotlink" style="display:none;">/streamtape.com/get_video?id=</div>
<script>document.getElementById('ideoolink').innerHTML = "/streamtape.com/get_video?id=9Kz&expires=17&ip=F0&token=ab_" + ''+ ('xcdj4kd').substring(1).substring(2);
document.getElementById('robotlink').innerHTML = '//streamtape.com/get_video?id=' + ('xcdX2c');</script>
</body></html>"#;

    #[test]
    fn test_embed_url() {
        assert_eq!(
            Streamtape::embed_url("https://streamtape.net/v/9KzQJ/episode.mp4").unwrap(),
            "https://streamtape.com/e/9KzQJ"
        );
        assert_eq!(
            Streamtape::embed_url("https://streamtape.com/e/9KzQJ").unwrap(),
            "https://streamtape.com/e/9KzQJ"
        );
        assert!(Streamtape::embed_url("https://streamtape.com/").is_err());
    }

    #[test]
    fn test_assemble_link() {
        assert_eq!(
            Streamtape::assemble_link(PAGE).unwrap(),
            "https://streamtape.com/get_video?id=9Kz&expires=17&ip=F0&token=abX2c&stream=1"
        );
    }

    #[test]
    fn test_missing_script() {
        assert!(matches!(
            Streamtape::assemble_link("<script>var a = 1;</script>"),
            Err(ExtractorError::PatternMissing("robotlink"))
        ));
    }

    #[tokio::test]
    #[ignore]
    async fn test_streamtape_live() {
        let result = Streamtape
            .resolve(&test_context(), "https://streamtape.com/e/9KzQJ0jA8Wf7Lx")
            .await;
        println!("{result:?}");
    }
}
