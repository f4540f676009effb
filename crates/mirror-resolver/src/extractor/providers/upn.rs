use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use reqwest::header;

use super::capture;
use crate::decoding::cipher::decrypt_aes_cbc_hex;
use crate::extractor::error::ExtractorError;
use crate::extractor::handler::{Extractor, ResolveContext, StreamHandler, parse_locator};
use crate::extractor::hls::HlsProbe;
use crate::media::ResolvedMedia;

pub const DOMAINS: &[&str] = &["upns.pro", "rpmhub.site", "rpmvip.com", "uns.bio"];

static VIDEO_ID_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"#([a-zA-Z0-9]+)").unwrap());
static SOURCE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""source"\s*:\s*"([^"]+)""#).unwrap());

const KEY_HEX: &str = "6b69656d7469656e6d75613931316361";

pub struct Upn;

impl Upn {
    pub(crate) fn api_url(locator: &str, origin: &str) -> Result<String, ExtractorError> {
        let video_id = capture(&VIDEO_ID_REGEX, locator, "video id")?;
        Ok(format!("{origin}/api/v1/video?id={video_id}&w=1920&h=1200&r="))
    }

    /// Decrypts the hex API response and pulls the manifest out of it.
    pub(crate) fn stream_url(response_hex: &str) -> Result<String, ExtractorError> {
        let decrypted = decrypt_aes_cbc_hex(KEY_HEX, response_hex)?;
        let source = capture(&SOURCE_REGEX, &decrypted, "source")?;
        Ok(source.replace("\\/", "/"))
    }
}

impl HlsProbe for Upn {}

#[async_trait]
impl StreamHandler for Upn {
    async fn resolve(
        &self,
        ctx: &ResolveContext,
        locator: &str,
    ) -> Result<ResolvedMedia, ExtractorError> {
        let (_, origin) = parse_locator(locator)?;
        let mut extractor = Extractor::new("upn", ctx);
        extractor.add_header(header::REFERER, &format!("{origin}/"));

        let response = extractor.fetch_text(&Self::api_url(locator, &origin)?).await?;
        let url = Self::stream_url(&response)?;
        let quality = self.probe_quality(&extractor, &url).await;
        Ok(ResolvedMedia::new(url, quality).with_request_headers(
            extractor.replay_headers(&[header::USER_AGENT, header::REFERER]),
        ))
    }
}
