use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use reqwest::header;

use super::capture;
use crate::extractor::error::ExtractorError;
use crate::extractor::handler::{Extractor, ResolveContext, StreamHandler, parse_locator};
use crate::extractor::hls::HlsProbe;
use crate::media::ResolvedMedia;

pub const DOMAINS: &[&str] = &[
    "turboviplay.com",
    "emturbovid.com",
    "tuborstb.co",
    "javggvideo.xyz",
    "stbturbo.xyz",
    "turbovidhls.com",
];

static MEDIA_ID_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^/(?:t/|d/)?([0-9a-zA-Z]+)").unwrap());
static URL_PLAY_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?:urlPlay|data-hash)\s*=\s*['"]([^"']+)"#).unwrap()
});

pub struct Turbovid;

impl HlsProbe for Turbovid {}

#[async_trait]
impl StreamHandler for Turbovid {
    async fn resolve(
        &self,
        ctx: &ResolveContext,
        locator: &str,
    ) -> Result<ResolvedMedia, ExtractorError> {
        let (url, origin) = parse_locator(locator)?;
        let media_id = capture(&MEDIA_ID_REGEX, url.path(), "media id")?;

        let mut extractor = Extractor::new("turbovid", ctx);
        extractor.add_header(header::REFERER, locator);

        let html = extractor.fetch_text(&format!("{origin}/t/{media_id}")).await?;
        let stream_url = capture(&URL_PLAY_REGEX, &html, "urlPlay")?.to_string();

        let quality = self.probe_quality(&extractor, &stream_url).await;
        Ok(ResolvedMedia::new(stream_url, quality)
            .with_request_headers(extractor.replay_headers(&[header::USER_AGENT, header::REFERER])))
    }
}

#[cfg(test)]
mod tests {
    use axum::Router;
    use axum::routing::get;
    use tokio::net::TcpListener;

    use super::*;
    use crate::extractor::handler::tests::test_context;
    use crate::media::Quality;

    #[test]
    fn test_media_id() {
        for path in ["/t/6981d1ded9585", "/d/6981d1ded9585", "/6981d1ded9585"] {
            assert_eq!(
                capture(&MEDIA_ID_REGEX, path, "media id").unwrap(),
                "6981d1ded9585"
            );
        }
        assert!(capture(&MEDIA_ID_REGEX, "/", "media id").is_err());
    }

    #[test]
    fn test_url_play_variants() {
        let html = r#"<script>var urlPlay = 'https://cdn.turbo.example/hls/x/master.m3u8';</script>"#;
        assert_eq!(
            capture(&URL_PLAY_REGEX, html, "urlPlay").unwrap(),
            "https://cdn.turbo.example/hls/x/master.m3u8"
        );

        let html = r#"<div id="video_player" data-hash="https://cdn.turbo.example/v.m3u8"></div>"#;
        assert_eq!(
            capture(&URL_PLAY_REGEX, html, "urlPlay").unwrap(),
            "https://cdn.turbo.example/v.m3u8"
        );
    }

    #[tokio::test]
    async fn test_resolve_embed_page() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let manifest = format!("http://{addr}/hls/master.m3u8");

        let app = Router::new()
            .route(
                "/t/abc123",
                get(move || {
                    let manifest = manifest.clone();
                    async move { format!("<script>var urlPlay = '{manifest}';</script>") }
                }),
            )
            .route(
                "/hls/master.m3u8",
                get(|| async {
                    "#EXTM3U\n#EXT-X-STREAM-INF:BANDWIDTH=1,RESOLUTION=1280x720\nv.m3u8\n"
                }),
            );
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });

        let locator = format!("http://{addr}/d/abc123");
        let media = Turbovid.resolve(&test_context(), &locator).await.unwrap();
        assert_eq!(media.url, format!("http://{addr}/hls/master.m3u8"));
        assert_eq!(media.quality, Quality::Height(720));
        assert_eq!(media.headers.request.unwrap()["Referer"], locator);
    }

    #[tokio::test]
    #[ignore]
    async fn test_turbovid_live() {
        let result = Turbovid
            .resolve(&test_context(), "https://turbovidhls.com/t/6981d1ded9585")
            .await;
        println!("{result:?}");
    }
}
