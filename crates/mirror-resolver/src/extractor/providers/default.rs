//! Fallback for aggregator-style hosts without a dedicated handler.
//!
//! Most of them run a stock jwplayer build, optionally behind a packed
//! script, so sniffing the setup block is enough.

use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use reqwest::header;
use url::Url;

use super::{jw_source, unpack_if_packed};
use crate::extractor::error::ExtractorError;
use crate::extractor::handler::{Extractor, ResolveContext, StreamHandler, parse_locator};
use crate::extractor::hls::HlsProbe;
use crate::media::{Quality, ResolvedMedia};

static LOOSE_SOURCE_REGEXES: LazyLock<[Regex; 3]> = LazyLock::new(|| {
    [
        Regex::new(r#"file\s*:\s*"([^"]+\.(?:m3u8|mp4)[^"]*)""#).unwrap(),
        Regex::new(r#""hls\d?"\s*:\s*"([^"]+)""#).unwrap(),
        Regex::new(r#"<source\s+src="([^"]+)""#).unwrap(),
    ]
});

pub struct Generic;

impl Generic {
    /// Stream URL and its labelled quality, if the page names one.
    pub(crate) fn sniff(html: &str, page: &Url) -> Result<(String, Quality), ExtractorError> {
        let script = unpack_if_packed(html)?;

        let (raw, quality) = match jw_source(&script) {
            Some(found) => found,
            None => LOOSE_SOURCE_REGEXES
                .iter()
                .find_map(|regex| regex.captures(&script)?.get(1))
                .map(|m| (m.as_str(), Quality::Unknown))
                .ok_or(ExtractorError::PatternMissing("player sources"))?,
        };

        let url = page
            .join(&raw.replace("\\/", "/"))
            .map_err(|e| ExtractorError::InvalidUrl(format!("{raw}: {e}")))?;
        Ok((url.to_string(), quality))
    }
}

impl HlsProbe for Generic {}

#[async_trait]
impl StreamHandler for Generic {
    async fn resolve(
        &self,
        ctx: &ResolveContext,
        locator: &str,
    ) -> Result<ResolvedMedia, ExtractorError> {
        let (page, origin) = parse_locator(locator)?;
        let mut extractor = Extractor::new("default", ctx);
        extractor.add_header(header::REFERER, &format!("{origin}/"));

        let html = extractor.fetch_text(locator).await?;
        let (url, quality) = Self::sniff(&html, &page)?;
        let quality = if !quality.is_known() && url.contains(".m3u8") {
            self.probe_quality(&extractor, &url).await
        } else {
            quality
        };

        Ok(ResolvedMedia::new(url, quality).with_request_headers(
            extractor.replay_headers(&[header::USER_AGENT, header::REFERER]),
        ))
    }
}
