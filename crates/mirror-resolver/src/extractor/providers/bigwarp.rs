use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use reqwest::header;

use super::jw_source;
use crate::extractor::error::ExtractorError;
use crate::extractor::handler::{Extractor, ResolveContext, StreamHandler, parse_locator};
use crate::media::{Quality, ResolvedMedia};

pub const DOMAINS: &[&str] = &["bigwarp.io", "bigwarp.art", "bigwarp.cc"];

static SETUP_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)jwplayer\("vplayer"\)\.setup\(\s*(\{.*?\})\s*\);"#).unwrap()
});

pub struct Bigwarp;

impl Bigwarp {
    /// `/embed-abc123.html` -> `abc123`
    pub(crate) fn file_code(path: &str) -> Result<String, ExtractorError> {
        let name = path
            .trim_matches('/')
            .rsplit('/')
            .next()
            .unwrap_or_default();
        let name = if name.to_ascii_lowercase().ends_with(".html") {
            &name[..name.len() - 5]
        } else {
            name
        };
        let code = name.replace("embed-", "");
        if code.is_empty() {
            return Err(ExtractorError::PatternMissing("file code"));
        }
        Ok(code)
    }

    /// Stream URL and labelled quality from the embed player. The setup call
    /// is preferred over a stray `sources` block elsewhere on the page.
    pub(crate) fn player_source(html: &str) -> Result<(&str, Quality), ExtractorError> {
        let scope = SETUP_REGEX
            .captures(html)
            .and_then(|caps| caps.get(1))
            .map_or(html, |setup| setup.as_str());
        jw_source(scope).ok_or(ExtractorError::PatternMissing("sources"))
    }
}

#[async_trait]
impl StreamHandler for Bigwarp {
    async fn resolve(
        &self,
        ctx: &ResolveContext,
        locator: &str,
    ) -> Result<ResolvedMedia, ExtractorError> {
        let (url, origin) = parse_locator(locator)?;
        let file_code = Self::file_code(url.path())?;

        let mut extractor = Extractor::new("bigwarp", ctx);
        extractor.add_header(header::REFERER, locator);
        extractor.add_header(header::ORIGIN, &origin);

        let form = [
            ("op", "embed"),
            ("file_code", file_code.as_str()),
            ("auto", "1"),
            ("referer", locator),
        ];
        let (_, body) = extractor
            .send_text(extractor.post(&format!("{origin}/dl")).form(&form))
            .await?;
        let (stream_url, quality) = Self::player_source(&body)?;

        // the stream itself wants the site as referer
        extractor.add_header(header::REFERER, &format!("{origin}/"));
        Ok(ResolvedMedia::new(stream_url, quality)
            .with_request_headers(extractor.replay_headers(&[header::USER_AGENT, header::REFERER])))
    }
}
