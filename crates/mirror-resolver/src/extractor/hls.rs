use std::sync::LazyLock;

use async_trait::async_trait;
use m3u8_rs::Playlist;
use regex::Regex;
use tracing::debug;

use super::handler::Extractor;
use crate::media::Quality;

static RESOLUTION_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"RESOLUTION=\d+x(\d+)").unwrap());

/// Highest `RESOLUTION` height announced by a manifest.
///
/// Bodies m3u8-rs rejects (a BOM, leading blank lines, a missing `#EXTM3U`
/// or attributes it insists on) are scanned for `RESOLUTION=WxH` directly.
/// Media playlists and bodies without any resolution yield
/// [`Quality::Unknown`].
pub fn max_resolution(body: &[u8]) -> Quality {
    let parsed = match m3u8_rs::parse_playlist_res(body) {
        Ok(Playlist::MasterPlaylist(playlist)) => playlist
            .variants
            .iter()
            .filter_map(|variant| variant.resolution.as_ref())
            .filter_map(|resolution| u32::try_from(resolution.height).ok())
            .max(),
        Ok(Playlist::MediaPlaylist(_)) => None,
        Err(e) => {
            debug!("manifest did not parse, scanning for resolutions: {e}");
            None
        }
    };

    parsed
        .or_else(|| scan_resolutions(body))
        .map(Quality::from_height)
        .unwrap_or_default()
}

fn scan_resolutions(body: &[u8]) -> Option<u32> {
    let text = String::from_utf8_lossy(body);
    RESOLUTION_REGEX
        .captures_iter(&text)
        .filter_map(|caps| caps[1].parse::<u32>().ok())
        .max()
}

/// Quality sniffing for handlers whose hosts only hand out a master manifest.
#[async_trait]
pub trait HlsProbe {
    /// Fetches `manifest_url` with the extractor's current headers and
    /// returns its best resolution. Any failure degrades to unknown.
    async fn probe_quality(&self, extractor: &Extractor, manifest_url: &str) -> Quality {
        let response = match extractor.get(manifest_url).send().await {
            Ok(response) if response.status().is_success() => response,
            Ok(response) => {
                debug!(
                    provider = extractor.provider,
                    status = %response.status(),
                    "manifest probe rejected"
                );
                return Quality::Unknown;
            }
            Err(e) => {
                debug!(provider = extractor.provider, "manifest probe failed: {e}");
                return Quality::Unknown;
            }
        };

        match response.bytes().await {
            Ok(body) => max_resolution(&body),
            Err(_) => Quality::Unknown,
        }
    }
}
