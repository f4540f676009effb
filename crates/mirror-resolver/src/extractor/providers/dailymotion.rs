//! Dailymotion embeds.
//!
//! The embed page carries a `dmInternalData` blob whose `ts` and `v1st`
//! values unlock the player metadata endpoint. The metadata points at an
//! auto master manifest whose variants are named by their height; the best
//! variant is returned directly.

use async_trait::async_trait;
use reqwest::header;
use rustc_hash::FxHashMap;
use serde::Deserialize;
use tracing::debug;
use url::Url;

use crate::extractor::error::ExtractorError;
use crate::extractor::handler::{Extractor, ResolveContext, StreamHandler, parse_locator};
use crate::media::{Quality, ResolvedMedia};

pub const DOMAINS: &[&str] = &["dailymotion.com"];

const SITE: &str = "https://www.dailymotion.com";

#[derive(Debug, Deserialize)]
struct Metadata {
    #[serde(default)]
    qualities: Option<FxHashMap<String, Vec<QualitySource>>>,
    #[serde(default)]
    error: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct QualitySource {
    url: Option<String>,
}

/// Session values scraped from the embed page.
#[derive(Debug, PartialEq, Eq)]
pub(crate) struct PlayerSession<'a> {
    pub ts: &'a str,
    pub v1st: &'a str,
}

pub struct Dailymotion {
    site: String,
}

impl Default for Dailymotion {
    fn default() -> Self {
        Self::with_site(SITE)
    }
}

impl Dailymotion {
    /// Handler talking to the metadata API at `site` instead of dailymotion.com.
    pub fn with_site(site: impl Into<String>) -> Self {
        Self {
            site: site.into().trim_end_matches('/').to_string(),
        }
    }

    pub(crate) fn embed_url(locator: &str) -> String {
        if locator.contains("/embed/") {
            locator.to_string()
        } else {
            locator.replacen("/video/", "/embed/video/", 1)
        }
    }

    pub(crate) fn session(html: &str) -> Result<PlayerSession<'_>, ExtractorError> {
        const MARKER: &str = "\"dmInternalData\":";
        let missing = || ExtractorError::PatternMissing("dmInternalData");

        let start = html.find(MARKER).ok_or_else(missing)? + MARKER.len();
        let data = &html[start..];
        let data = data.find("</script>").map_or(data, |end| &data[..end]);

        let ts = data
            .split_once("\"ts\":")
            .and_then(|(_, rest)| rest.split_once(','))
            .map(|(ts, _)| ts.trim())
            .ok_or_else(missing)?;
        let v1st = data
            .split_once("\"v1st\":\"")
            .and_then(|(_, rest)| rest.split_once("\","))
            .map(|(v1st, _)| v1st.trim())
            .ok_or_else(missing)?;
        Ok(PlayerSession { ts, v1st })
    }

    /// `?video=` wins over the last path segment.
    pub(crate) fn video_id(url: &Url) -> Option<String> {
        url.query_pairs()
            .find(|(key, _)| key == "video")
            .map(|(_, value)| value.into_owned())
            .filter(|id| !id.is_empty())
            .or_else(|| {
                url.path_segments()?
                    .next_back()
                    .filter(|id| !id.is_empty())
                    .map(str::to_string)
            })
    }

    /// Variant with the highest numeric `NAME` attribute of a master manifest.
    pub(crate) fn best_named_variant(manifest: &str) -> Option<(u32, &str)> {
        let mut lines = manifest.lines();
        let mut best: Option<(u32, &str)> = None;
        while let Some(line) = lines.next() {
            if !line.starts_with("#EXT-X-STREAM-INF") {
                continue;
            }
            let name = line
                .split(',')
                .find_map(|attr| attr.trim().strip_prefix("NAME="))
                .map(|name| name.trim_matches('"'))
                .and_then(|name| name.parse::<u32>().ok());
            let (Some(height), Some(uri)) = (name, lines.next()) else {
                continue;
            };
            if best.is_none_or(|(current, _)| height > current) {
                best = Some((height, uri.trim()));
            }
        }
        best
    }
}

#[async_trait]
impl StreamHandler for Dailymotion {
    async fn resolve(
        &self,
        ctx: &ResolveContext,
        locator: &str,
    ) -> Result<ResolvedMedia, ExtractorError> {
        let embed = Self::embed_url(locator);
        let (embed_url, _) = parse_locator(&embed)?;

        let mut extractor = Extractor::new("dailymotion", ctx);
        let html = extractor.fetch_text(&embed).await?;
        let session = Self::session(&html)?;
        let video_id =
            Self::video_id(&embed_url).ok_or(ExtractorError::PatternMissing("video id"))?;

        let metadata_url = format!(
            "{}/player/metadata/video/{video_id}?locale=en-US&dmV1st={}&dmTs={}&is_native_app=0",
            self.site, session.v1st, session.ts
        );
        let metadata: Metadata = extractor.fetch_json(&metadata_url).await?;
        if let Some(error) = metadata.error {
            debug!(%video_id, %error, "metadata refused");
            return Err(ExtractorError::NoStreamsFound);
        }
        let master_url = metadata
            .qualities
            .as_ref()
            .and_then(|qualities| qualities.get("auto"))
            .and_then(|sources| sources.iter().find_map(|source| source.url.clone()))
            .ok_or(ExtractorError::PatternMissing("auto qualities"))?;

        extractor.add_header(header::ACCEPT, "*/*");
        extractor.add_header(header::REFERER, &format!("{}/", self.site));
        extractor.add_header(header::ORIGIN, &self.site);
        let manifest = extractor.fetch_text(&master_url).await?;
        let (height, uri) = Self::best_named_variant(&manifest)
            .ok_or(ExtractorError::PatternMissing("named variants"))?;
        let stream_url = Url::parse(&master_url)
            .and_then(|master| master.join(uri))
            .map_err(|e| ExtractorError::InvalidUrl(format!("{uri}: {e}")))?;

        Ok(
            ResolvedMedia::new(stream_url.to_string(), Quality::from_height(height))
                .with_request_headers(extractor.replay_headers(&[
                    header::ACCEPT,
                    header::REFERER,
                    header::ORIGIN,
                ])),
        )
    }
}
