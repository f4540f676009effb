use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use reqwest::header;
use serde::Deserialize;
use url::Url;

use crate::decoding::cipher::decrypt_aes_gcm_encoded;
use crate::extractor::error::ExtractorError;
use crate::extractor::handler::{Extractor, ResolveContext, StreamHandler, parse_locator};
use crate::media::{Quality, ResolvedMedia};

pub const DOMAINS: &[&str] = &[
    "f16px.com",
    "bysesayeveum.com",
    "bysetayico.com",
    "bysevepoin.com",
    "bysezejataos.com",
    "bysekoze.com",
    "bysesukior.com",
];

static MEDIA_ID_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/(?:e|d)/([0-9a-zA-Z]+)").unwrap());

#[derive(Debug, Default, Deserialize)]
pub(crate) struct Playback {
    #[serde(default)]
    sources: Vec<Source>,
    #[serde(default)]
    playback: Option<EncryptedPlayback>,
}

#[derive(Debug, Deserialize)]
struct Source {
    #[serde(default)]
    label: Option<String>,
    #[serde(default)]
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EncryptedPlayback {
    iv: String,
    key_parts: Vec<String>,
    payload: String,
}

#[derive(Debug, Deserialize)]
struct DecryptedSources {
    #[serde(default)]
    sources: Vec<Source>,
}

pub struct F16px;

impl F16px {
    pub(crate) fn api_url(page: &Url) -> Result<String, ExtractorError> {
        let media_id = MEDIA_ID_REGEX
            .captures(page.path())
            .map(|caps| caps[1].to_string())
            .ok_or(ExtractorError::PatternMissing("media id"))?;
        let host = page
            .host_str()
            .ok_or_else(|| ExtractorError::InvalidUrl(page.to_string()))?;
        Ok(format!("https://{host}/api/videos/{media_id}/embed/playback"))
    }

    /// Picks the highest labelled source, decrypting the playback block when
    /// the response carries no plain sources.
    pub(crate) fn select(
        response: Playback,
        page: &Url,
    ) -> Result<(String, Quality), ExtractorError> {
        let sources = if response.sources.iter().any(|s| s.url.is_some()) {
            response.sources
        } else if let Some(encrypted) = response.playback {
            let plaintext = decrypt_aes_gcm_encoded(
                encrypted.key_parts.as_slice(),
                &encrypted.iv,
                &encrypted.payload,
            )?;
            serde_json::from_slice::<DecryptedSources>(&plaintext)?.sources
        } else {
            return Err(ExtractorError::NoStreamsFound);
        };

        let (label, url) = sources
            .iter()
            .filter_map(|s| s.url.as_deref().map(|url| (s.label.as_deref().unwrap_or("0"), url)))
            .max_by_key(|(label, _)| label_rank(label))
            .ok_or(ExtractorError::NoStreamsFound)?;

        let url = if url.starts_with('/') {
            page.join(url)
                .map_err(|e| ExtractorError::InvalidUrl(format!("{url}: {e}")))?
                .to_string()
        } else {
            url.to_string()
        };
        Ok((url, Quality::from_label(label)))
    }
}

fn label_rank(label: &str) -> u64 {
    label
        .chars()
        .filter(char::is_ascii_digit)
        .collect::<String>()
        .parse()
        .unwrap_or(0)
}

#[async_trait]
impl StreamHandler for F16px {
    async fn resolve(
        &self,
        ctx: &ResolveContext,
        locator: &str,
    ) -> Result<ResolvedMedia, ExtractorError> {
        let (page, origin) = parse_locator(locator)?;
        let mut extractor = Extractor::new("f16px", ctx);
        extractor.add_header(header::REFERER, &format!("{origin}/"));

        let response: Playback = extractor.fetch_json(&Self::api_url(&page)?).await?;
        let (url, quality) = Self::select(response, &page)?;
        Ok(ResolvedMedia::new(url, quality).with_request_headers(
            extractor.replay_headers(&[header::USER_AGENT, header::REFERER]),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoding::cipher::tests::{GCM_IV, GCM_KEY_PARTS, GCM_PAYLOAD};
    use crate::extractor::handler::tests::test_context;

    fn page() -> Url {
        Url::parse("https://bysesukior.com/e/6u384tt8fz95").unwrap()
    }

    #[test]
    fn test_api_url() {
        assert_eq!(
            F16px::api_url(&page()).unwrap(),
            "https://bysesukior.com/api/videos/6u384tt8fz95/embed/playback"
        );
        let other = Url::parse("https://f16px.com/about").unwrap();
        assert!(F16px::api_url(&other).is_err());
    }

    #[test]
    fn test_plain_sources() {
        let response: Playback = serde_json::from_str(
            r#"{"sources":[
                {"label":"480p","url":"/stream/480.m3u8"},
                {"label":"1080p","url":"/stream/1080.m3u8"},
                {"label":"720p"}
            ]}"#,
        )
        .unwrap();
        let (url, quality) = F16px::select(response, &page()).unwrap();
        assert_eq!(url, "https://bysesukior.com/stream/1080.m3u8");
        assert_eq!(quality, Quality::Height(1080));
    }

    #[test]
    fn test_encrypted_playback() {
        let body = serde_json::json!({
            "playback": {
                "iv": GCM_IV,
                "key_parts": GCM_KEY_PARTS,
                "payload": GCM_PAYLOAD,
            }
        });
        let response: Playback = serde_json::from_value(body).unwrap();
        let (url, quality) = F16px::select(response, &page()).unwrap();
        assert_eq!(url, "https://cdn.example/v.m3u8");
        assert_eq!(quality, Quality::Height(1080));
    }

    #[test]
    fn test_tampered_payload_fails() {
        let mut payload = GCM_PAYLOAD.to_string();
        payload.replace_range(0..1, if payload.starts_with('A') { "B" } else { "A" });
        let body = serde_json::json!({
            "playback": {"iv": GCM_IV, "key_parts": GCM_KEY_PARTS, "payload": payload}
        });
        let response: Playback = serde_json::from_value(body).unwrap();
        assert!(matches!(
            F16px::select(response, &page()),
            Err(ExtractorError::Decode(_))
        ));
    }

    #[test]
    fn test_empty_response() {
        assert!(matches!(
            F16px::select(Playback::default(), &page()),
            Err(ExtractorError::NoStreamsFound)
        ));
    }

    #[tokio::test]
    #[ignore]
    async fn test_f16px_live() {
        let result = F16px
            .resolve(&test_context(), "https://bysesukior.com/e/6u384tt8fz95")
            .await;
        println!("{result:?}");
    }
}
