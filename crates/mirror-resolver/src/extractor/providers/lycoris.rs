use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use rustc_hash::FxHashMap;

use super::capture;
use crate::decoding::base64::decode_standard;
use crate::decoding::transform::{reverse, shift_chars};
use crate::extractor::error::ExtractorError;
use crate::extractor::handler::{Extractor, ResolveContext, StreamHandler};
use crate::media::{Quality, ResolvedMedia};

pub const DOMAINS: &[&str] = &["lycoris.cafe"];

static EPISODE_DATA_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)episodeData\s*:\s*(\{.*?\}),").unwrap());
static EPISODE_ID_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"id\s*:\s*(\d+)").unwrap());

const SECONDARY_LINK_URL: &str = "https://www.lycoris.cafe/api/getSecondaryLink";
const SIGNATURE: &str = "LC";
const SHIFT: i32 = -7;

pub struct Lycoris;

impl Lycoris {
    pub(crate) fn episode_id(html: &str) -> Result<&str, ExtractorError> {
        let data = capture(&EPISODE_DATA_REGEX, html, "episodeData")?;
        capture(&EPISODE_ID_REGEX, data, "episode id")
    }

    /// Decodes the link map served by the secondary-link endpoint.
    ///
    /// Signed payloads end in `LC`; the rest is base64 JSON, shifted by
    /// seven code points and reversed. Unsigned payloads are plain JSON.
    pub(crate) fn decode_links(body: &str) -> Result<FxHashMap<String, String>, ExtractorError> {
        let body = body.trim();
        let json = match body.strip_suffix(SIGNATURE) {
            Some(scrambled) => {
                let unshifted = shift_chars(&reverse(scrambled), SHIFT)?;
                String::from_utf8(decode_standard(&unshifted)?)
                    .map_err(crate::decoding::DecodeError::from)?
            }
            None => body.to_string(),
        };
        Ok(serde_json::from_str(&json)?)
    }

    pub(crate) fn best_link(links: &FxHashMap<String, String>) -> Option<(Quality, &str)> {
        links
            .iter()
            .filter_map(|(label, url)| {
                let height = match label.as_str() {
                    "SD" => 480,
                    "HD" => 720,
                    "FHD" => 1080,
                    _ => return None,
                };
                Some((height, url.as_str()))
            })
            .filter(|(_, url)| !url.is_empty())
            .max_by_key(|(height, _)| *height)
            .map(|(height, url)| (Quality::from_height(height), url))
    }
}

#[async_trait]
impl StreamHandler for Lycoris {
    async fn resolve(
        &self,
        ctx: &ResolveContext,
        locator: &str,
    ) -> Result<ResolvedMedia, ExtractorError> {
        let extractor = Extractor::new("lycoris", ctx);
        let html = extractor.fetch_text(locator).await?;
        let episode_id = Self::episode_id(&html)?.to_string();

        let request = extractor
            .get(SECONDARY_LINK_URL)
            .query(&[("id", episode_id.as_str())]);
        let (_, body) = extractor.send_text(request).await?;

        let links = Self::decode_links(&body)?;
        let (quality, url) = Self::best_link(&links).ok_or(ExtractorError::NoStreamsFound)?;
        Ok(ResolvedMedia::new(url, quality))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractor::handler::tests::test_context;

    const ENCODED: &str = r"@QJU~8tSro9SsNj{MNls<jwQ:iqsOi|;Naq@S=TOj7YOhpvqPLorPzPJU~8tSrota}\Ni~8^`;]tSstj}U^lz<pirU9S}vj~YOkvQpVpXLZNQJSpXKj{<Ja@ZazI_ioo_a|T_h@9`<tS|Y9`}?pVIOk7otP=PJY[QlLC";

    #[test]
    fn test_episode_id() {
        let html = r#"<script>const data = {episodeData: {id: 4711, number: 3}, other: 1};</script>"#;
        assert_eq!(Lycoris::episode_id(html).unwrap(), "4711");
        assert!(matches!(
            Lycoris::episode_id("<script></script>"),
            Err(ExtractorError::PatternMissing("episodeData"))
        ));
    }

    #[test]
    fn test_decode_signed_links() {
        let links = Lycoris::decode_links(ENCODED).unwrap();
        assert_eq!(links.len(), 3);
        assert_eq!(
            Lycoris::best_link(&links),
            Some((Quality::Height(1080), "https://cdn.lycoris.example/fhd.mp4"))
        );
    }

    #[test]
    fn test_decode_unsigned_links() {
        let links = Lycoris::decode_links(r#"{"SD":"https://a.example/sd.mp4","4K":"x"}"#).unwrap();
        assert_eq!(
            Lycoris::best_link(&links),
            Some((Quality::Height(480), "https://a.example/sd.mp4"))
        );
    }

    #[test]
    fn test_corrupted_payload_fails() {
        assert!(matches!(
            Lycoris::decode_links("!!!!LC"),
            Err(ExtractorError::Decode(_))
        ));
    }

    #[tokio::test]
    #[ignore]
    async fn test_lycoris_live() {
        let result = Lycoris
            .resolve(
                &test_context(),
                "https://www.lycoris.cafe/anime/the-apothecary-diaries/watch/1",
            )
            .await;
        println!("{result:?}");
    }
}
