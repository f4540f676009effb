use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use reqwest::header;

use super::capture;
use crate::extractor::error::ExtractorError;
use crate::extractor::handler::{Extractor, ResolveContext, StreamHandler, parse_locator};
use crate::media::{Quality, ResolvedMedia};

pub const DOMAINS: &[&str] = &["buzzheavier.com"];

static MEDIA_ID_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^/([0-9a-zA-Z]+)").unwrap());
static SOURCE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"<source\s+src="([^"]+)""#).unwrap());

/// File host whose `/{id}/preview` page embeds a plain `<video>` tag.
pub struct Buzz;

#[async_trait]
impl StreamHandler for Buzz {
    async fn resolve(
        &self,
        ctx: &ResolveContext,
        locator: &str,
    ) -> Result<ResolvedMedia, ExtractorError> {
        let (url, origin) = parse_locator(locator)?;
        let media_id = capture(&MEDIA_ID_REGEX, url.path(), "media id")?;
        let preview = url
            .join(&format!("{origin}/{media_id}/preview"))
            .map_err(|e| ExtractorError::InvalidUrl(e.to_string()))?;

        let mut extractor = Extractor::new("buzz", ctx);
        extractor.add_header(header::REFERER, locator);

        let html = extractor.fetch_relayed(preview.as_str()).await?;
        let source = capture(&SOURCE_REGEX, &html, "video source")?;
        let stream_url = preview
            .join(source)
            .map_err(|e| ExtractorError::InvalidUrl(format!("{source}: {e}")))?;

        Ok(ResolvedMedia::new(stream_url.to_string(), Quality::Unknown)
            .with_request_headers(extractor.replay_headers(&[header::USER_AGENT, header::REFERER])))
    }
}

#[cfg(test)]
mod tests {
    use axum::Router;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::get;
    use tokio::net::TcpListener;

    use super::*;
    use crate::extractor::handler::tests::test_context;

    #[tokio::test]
    async fn test_resolve_preview_page() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let app = Router::new().route(
            "/hg1gtctkofos/preview",
            get(|headers: HeaderMap| async move {
                match headers.get("referer").and_then(|v| v.to_str().ok()) {
                    Some(referer) if referer.ends_with("/hg1gtctkofos") => (
                        StatusCode::OK,
                        r#"<video controls><source src="/dl/hg1gtctkofos.mp4" type="video/mp4"></video>"#,
                    ),
                    _ => (StatusCode::FORBIDDEN, ""),
                }
            }),
        );
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });

        let locator = format!("http://{addr}/hg1gtctkofos");
        let media = Buzz.resolve(&test_context(), &locator).await.unwrap();
        assert_eq!(media.url, format!("http://{addr}/dl/hg1gtctkofos.mp4"));
        assert_eq!(media.quality, Quality::Unknown);
        assert_eq!(media.headers.request.unwrap()["Referer"], locator);
    }

    #[tokio::test]
    async fn test_preview_without_source() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = Router::new().route("/abc/preview", get(|| async { "<p>File not found</p>" }));
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });

        assert!(matches!(
            Buzz.resolve(&test_context(), &format!("http://{addr}/abc")).await,
            Err(ExtractorError::PatternMissing(_))
        ));
    }

    #[tokio::test]
    #[ignore]
    async fn test_buzz_live() {
        let result = Buzz
            .resolve(&test_context(), "https://buzzheavier.com/hg1gtctkofos")
            .await;
        println!("{result:?}");
    }
}
