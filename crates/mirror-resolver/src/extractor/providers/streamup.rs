use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use reqwest::header;
use serde::Deserialize;

use crate::decoding::base64::decode_standard;
use crate::decoding::cipher::decrypt_aes_cbc;
use crate::extractor::error::ExtractorError;
use crate::extractor::handler::{Extractor, ResolveContext, StreamHandler, parse_locator};
use crate::extractor::hls::HlsProbe;
use crate::media::ResolvedMedia;

pub const DOMAINS: &[&str] = &["streamup.ws", "strmup."];

static SESSION_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"'([a-f0-9]{32})'").unwrap());
static DATA_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"'([A-Za-z0-9+/=]{200,})'").unwrap());

#[derive(Debug, Deserialize)]
pub(crate) struct StreamInfo {
    #[serde(default)]
    streaming_url: Option<String>,
}

/// Session id and encrypted stream info embedded in the player page.
#[derive(Debug, PartialEq, Eq)]
pub(crate) struct PageSecrets<'a> {
    session: &'a str,
    data: &'a str,
}

pub struct Streamup;

impl Streamup {
    pub(crate) fn page_secrets(html: &str) -> Option<PageSecrets<'_>> {
        let session = SESSION_REGEX.captures(html)?.get(1)?.as_str();
        let data = DATA_REGEX.captures(html)?.get(1)?.as_str();
        Some(PageSecrets { session, data })
    }

    /// `data` is base64 of `iv || ciphertext`, keyed with the base64 key the
    /// session endpoint returns.
    pub(crate) fn decrypt_info(
        key_b64: &str,
        data_b64: &str,
    ) -> Result<StreamInfo, ExtractorError> {
        let key = decode_standard(key_b64.trim())?;
        let data = decode_standard(data_b64)?;
        let plaintext = decrypt_aes_cbc(&key, &data)?;
        Ok(serde_json::from_slice(&plaintext)?)
    }
}

impl HlsProbe for Streamup {}

#[async_trait]
impl StreamHandler for Streamup {
    async fn resolve(
        &self,
        ctx: &ResolveContext,
        locator: &str,
    ) -> Result<ResolvedMedia, ExtractorError> {
        parse_locator(locator)?;
        let mut extractor = Extractor::new("streamup", ctx);

        let (final_url, html) = extractor.send_text(extractor.get(locator)).await?;
        let base = match final_url.host_str() {
            Some(host) => format!("{}://{host}", final_url.scheme()),
            None => return Err(ExtractorError::InvalidUrl(final_url.to_string())),
        };
        let secrets =
            Self::page_secrets(&html).map(|s| (s.session.to_string(), s.data.to_string()));
        extractor.add_header(header::REFERER, locator);

        let info = match secrets {
            Some((session, data)) => {
                let key = extractor
                    .fetch_text(&format!("{base}/ajax/stream?session={session}"))
                    .await?;
                Self::decrypt_info(&key, &data)?
            }
            None => {
                let media_id = locator.rsplit('/').next().unwrap_or_default();
                extractor
                    .fetch_json(&format!("{base}/ajax/stream?filecode={media_id}"))
                    .await?
            }
        };
        let url = info
            .streaming_url
            .filter(|url| !url.is_empty())
            .ok_or(ExtractorError::NoStreamsFound)?;

        extractor.add_header(header::REFERER, &format!("{base}/"));
        extractor.add_header(header::ORIGIN, &base);
        let quality = self.probe_quality(&extractor, &url).await;
        Ok(ResolvedMedia::new(url, quality).with_request_headers(extractor.replay_headers(&[
            header::USER_AGENT,
            header::REFERER,
            header::ORIGIN,
        ])))
    }
}
