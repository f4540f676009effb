use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use reqwest::header;

use super::capture;
use crate::extractor::error::ExtractorError;
use crate::extractor::handler::{Extractor, ResolveContext, StreamHandler, parse_locator};
use crate::media::{Quality, ResolvedMedia};

pub const DOMAINS: &[&str] = &["dood", "d0000d", "d000d", "ds2play", "ds2video"];

static PASS_MD5_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"'/pass_md5/([^']+)'").unwrap());

pub struct Dood;

#[async_trait]
impl StreamHandler for Dood {
    async fn resolve(
        &self,
        ctx: &ResolveContext,
        locator: &str,
    ) -> Result<ResolvedMedia, ExtractorError> {
        let (_, origin) = parse_locator(locator)?;
        let mut extractor = Extractor::new("dood", ctx);
        let html = extractor.fetch_text(locator).await?;
        let token = capture(&PASS_MD5_REGEX, &html, "pass_md5")?;

        extractor.add_header(header::REFERER, locator);
        let url = extractor
            .fetch_text(&format!("{origin}/pass_md5/{token}"))
            .await?
            .trim()
            .to_string();
        if !url.starts_with("http") {
            return Err(ExtractorError::NoStreamsFound);
        }

        Ok(ResolvedMedia::new(url, Quality::Unknown)
            .with_request_headers(extractor.replay_headers(&[header::REFERER])))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractor::handler::tests::test_context;
    use axum::Router;
    use axum::extract::Path;
    use axum::http::HeaderMap;
    use axum::routing::get;

    const EMBED: &str = r#"<script>$.get('/pass_md5/12345-67-890/abcdefghij', function(data){ makePlay(data); });</script>"#;

    #[test]
    fn test_pass_md5_token() {
        assert_eq!(
            capture(&PASS_MD5_REGEX, EMBED, "pass_md5").unwrap(),
            "12345-67-890/abcdefghij"
        );
    }

    #[tokio::test]
    async fn test_resolve_against_local_host() {
        async fn pass_md5(Path(rest): Path<String>, headers: HeaderMap) -> String {
            let referer = headers
                .get("referer")
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default()
                .to_string();
            if referer.ends_with("/e/abc") {
                format!("https://cdn.dood.example/{rest}.mp4")
            } else {
                "denied".to_string()
            }
        }

        let app = Router::new()
            .route("/e/abc", get(|| async { EMBED }))
            .route("/pass_md5/{*rest}", get(pass_md5));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let locator = format!("http://{addr}/e/abc");
        let media = Dood.resolve(&test_context(), &locator).await.unwrap();
        assert_eq!(
            media.url,
            "https://cdn.dood.example/12345-67-890/abcdefghij.mp4"
        );
        assert_eq!(
            media.headers.request.unwrap().get("Referer"),
            Some(&locator)
        );
    }

    #[tokio::test]
    #[ignore]
    async fn test_dood_live() {
        let result = Dood
            .resolve(&test_context(), "https://dood.li/e/ovmhp5y7uwmj")
            .await;
        println!("{result:?}");
    }
}
