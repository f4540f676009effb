use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use reqwest::header;
use rustc_hash::FxHashMap;
use serde::Deserialize;

use crate::extractor::error::ExtractorError;
use crate::extractor::handler::{Extractor, ResolveContext, StreamHandler};
use crate::media::{Quality, ResolvedMedia};

pub const DOMAINS: &[&str] = &["rumble.com"];

const SITE: &str = "https://rumble.com";

// `"ua":{"mp4":{"360":{...},"720":{...}}}` inside the embed config
static UA_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?s)"ua":\{.*?\}\}\}\}"#).unwrap());

#[derive(Debug, Deserialize)]
struct Config {
    ua: Renditions,
}

#[derive(Debug, Deserialize)]
struct Renditions {
    mp4: FxHashMap<String, Rendition>,
}

#[derive(Debug, Deserialize)]
struct Rendition {
    url: String,
}

pub struct Rumble;

impl Rumble {
    /// Highest mp4 rendition, with the query the CDN expects appended.
    pub(crate) fn best_mp4(html: &str) -> Result<(u32, String), ExtractorError> {
        let ua = UA_REGEX
            .find(html)
            .ok_or(ExtractorError::PatternMissing("ua renditions"))?;
        let config: Config = serde_json::from_str(&format!("{{{}}}", ua.as_str()))?;

        config
            .ua
            .mp4
            .iter()
            .filter_map(|(height, rendition)| Some((height.parse::<u32>().ok()?, rendition)))
            .max_by_key(|(height, _)| *height)
            .map(|(height, rendition)| {
                (height, format!("{}?u=0&b=0", rendition.url.replace("\\/", "/")))
            })
            .ok_or(ExtractorError::NoStreamsFound)
    }
}

#[async_trait]
impl StreamHandler for Rumble {
    async fn resolve(
        &self,
        ctx: &ResolveContext,
        locator: &str,
    ) -> Result<ResolvedMedia, ExtractorError> {
        let mut extractor = Extractor::new("rumble", ctx);
        let html = extractor.fetch_text(locator).await?;
        let (height, url) = Self::best_mp4(&html)?;

        extractor.add_header(header::RANGE, "bytes=0-");
        extractor.add_header(header::REFERER, &format!("{SITE}/"));
        Ok(ResolvedMedia::new(url, Quality::from_height(height)).with_request_headers(
            extractor.replay_headers(&[header::RANGE, header::REFERER, header::USER_AGENT]),
        ))
    }
}

#[cfg(test)]
mod tests {
    use axum::Router;
    use axum::routing::get;
    use tokio::net::TcpListener;

    use super::*;
    use crate::extractor::handler::tests::test_context;

    const EMBED: &str = r#"<script>g.f["v5abc"]={"fps":30,"ua":{"mp4":{"360":{"url":"https:\/\/sp.rmbl.example\/v360.mp4","meta":{"bitrate":700}},"1080":{"url":"https:\/\/sp.rmbl.example\/v1080.mp4","meta":{"bitrate":4000}}}},"i":"thumb.jpg"};</script>"#;

    #[test]
    fn test_best_mp4() {
        assert_eq!(
            Rumble::best_mp4(EMBED).unwrap(),
            (1080, "https://sp.rmbl.example/v1080.mp4?u=0&b=0".to_string())
        );
        assert!(matches!(
            Rumble::best_mp4("<p>removed</p>"),
            Err(ExtractorError::PatternMissing(_))
        ));
    }

    #[tokio::test]
    async fn test_resolve_embed() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = Router::new().route("/embed/v5abc/", get(|| async { EMBED }));
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });

        let media = Rumble
            .resolve(&test_context(), &format!("http://{addr}/embed/v5abc/"))
            .await
            .unwrap();
        assert_eq!(media.quality, Quality::Height(1080));
        let headers = media.headers.request.unwrap();
        assert_eq!(headers["Range"], "bytes=0-");
        assert_eq!(headers["Referer"], "https://rumble.com/");
    }

    #[tokio::test]
    #[ignore]
    async fn test_rumble_live() {
        let result = Rumble
            .resolve(&test_context(), "https://rumble.com/embed/v5abc/")
            .await;
        println!("{result:?}");
    }
}
