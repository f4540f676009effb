use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use reqwest::header;
use url::{Url, form_urlencoded};

use super::{JW_SOURCE_REGEX, capture, unpack_if_packed};
use crate::decoding::packer;
use crate::extractor::error::ExtractorError;
use crate::extractor::handler::{Extractor, ResolveContext, StreamHandler, parse_locator};
use crate::extractor::hls::HlsProbe;
use crate::media::ResolvedMedia;

pub const DOMAINS: &[&str] = &["filemoon.sx", "filemoon.to", "filemoon.in", "filemoon.nl"];

static IFRAME_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"<iframe[^>]+src="([^"]+)""#).unwrap());

// names of the positional parameters the player drops the keys of
const KEYLESS_ORDER: &[&str] = &["t", "s", "e", "f"];

pub struct Filemoon;

impl Filemoon {
    /// Restores key names the player strips from the manifest query and
    /// appends the empty `p` parameter the CDN expects.
    pub(crate) fn fix_manifest_link(link: &str) -> String {
        let (base, query) = link.split_once('?').unwrap_or((link, ""));

        let mut params: Vec<(String, String)> = Vec::new();
        let mut keyless = KEYLESS_ORDER.iter();
        for param in query.split('&').filter(|p| !p.is_empty()) {
            let (key, value) = param.split_once('=').unwrap_or((param, ""));
            let key = if key.is_empty() {
                match keyless.next() {
                    Some(name) => *name,
                    None => continue,
                }
            } else {
                key
            };
            upsert(&mut params, key, value);
        }
        upsert(&mut params, "p", "");

        let query = form_urlencoded::Serializer::new(String::new())
            .extend_pairs(params.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .finish();
        format!("{base}?{query}")
    }

    pub(crate) fn stream_url(html: &str) -> Result<String, ExtractorError> {
        if !packer::detect(html) {
            return Err(ExtractorError::PatternMissing("packed script"));
        }
        let script = unpack_if_packed(html)?;
        let raw = capture(&JW_SOURCE_REGEX, &script, "sources")?;
        Ok(Self::fix_manifest_link(raw))
    }
}

fn upsert(params: &mut Vec<(String, String)>, key: &str, value: &str) {
    match params.iter_mut().find(|(k, _)| k == key) {
        Some(existing) => existing.1 = value.to_string(),
        None => params.push((key.to_string(), value.to_string())),
    }
}

impl HlsProbe for Filemoon {}

#[async_trait]
impl StreamHandler for Filemoon {
    async fn resolve(
        &self,
        ctx: &ResolveContext,
        locator: &str,
    ) -> Result<ResolvedMedia, ExtractorError> {
        let (page_url, origin) = parse_locator(locator)?;
        let mut extractor = Extractor::new("filemoon", ctx);
        extractor.add_header(header::REFERER, &origin);

        let mut html = extractor.fetch_relayed(locator).await?;

        // embed pages may wrap the real player in an iframe
        let iframe = IFRAME_REGEX
            .captures(&html)
            .and_then(|caps| page_url.join(&caps[1]).ok());
        if let Some(iframe_url) = iframe.as_ref().map(Url::as_str) {
            extractor.add_header(header::REFERER, locator);
            html = extractor.fetch_relayed(iframe_url).await?;
        }

        let url = Self::stream_url(&html)?;
        let quality = self.probe_quality(&extractor, &url).await;
        Ok(ResolvedMedia::new(url, quality).with_request_headers(
            extractor.replay_headers(&[header::USER_AGENT, header::REFERER]),
        ))
    }
}
