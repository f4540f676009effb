use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use reqwest::header;

use super::capture;
use crate::extractor::error::ExtractorError;
use crate::extractor::handler::{Extractor, ResolveContext, StreamHandler, parse_locator};
use crate::extractor::hls::HlsProbe;
use crate::media::ResolvedMedia;

pub const DOMAINS: &[&str] = &["savefiles.com"];

static SOURCES_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"sources:\s*\[\{file:"([^"]+)""#).unwrap());

const SITE: &str = "https://savefiles.com";

pub struct Savefiles;

impl Savefiles {
    pub(crate) fn file_code(path: &str) -> Result<&str, ExtractorError> {
        path.rsplit('/')
            .next()
            .filter(|code| !code.is_empty())
            .ok_or(ExtractorError::PatternMissing("file code"))
    }
}

impl HlsProbe for Savefiles {}

#[async_trait]
impl StreamHandler for Savefiles {
    async fn resolve(
        &self,
        ctx: &ResolveContext,
        locator: &str,
    ) -> Result<ResolvedMedia, ExtractorError> {
        let (url, _) = parse_locator(locator)?;
        let file_code = Self::file_code(url.path())?;

        let mut extractor = Extractor::new("savefiles", ctx);
        extractor.add_header(header::REFERER, locator);
        extractor.add_header(header::ORIGIN, SITE);

        let form = [("op", "embed"), ("file_code", file_code), ("auto", "0")];
        let (_, body) = extractor
            .send_text(extractor.post(&format!("{SITE}/dl")).form(&form))
            .await?;
        let stream_url = capture(&SOURCES_REGEX, &body, "sources")?.to_string();

        // the CDN checks the site referer, not the embed page
        extractor.add_header(header::REFERER, &format!("{SITE}/"));
        let quality = self.probe_quality(&extractor, &stream_url).await;
        Ok(ResolvedMedia::new(stream_url, quality).with_request_headers(
            extractor.replay_headers(&[header::USER_AGENT, header::REFERER, header::ORIGIN]),
        ))
    }
}

#[cfg(test)]
mod tests {
    use axum::routing::{get, post};
    use axum::{Form, Router};
    use std::collections::HashMap;
    use tokio::net::TcpListener;

    use super::*;
    use crate::extractor::handler::tests::test_context;
    use crate::media::Quality;

    #[test]
    fn test_file_code() {
        assert_eq!(Savefiles::file_code("/e/ko901kakbuho").unwrap(), "ko901kakbuho");
        assert!(Savefiles::file_code("/e/").is_err());
    }

    #[test]
    fn test_sources_regex() {
        let body = r#"jwplayer("vplayer").setup({sources: [{file:"https://s3.savefiles.example/hls/x/master.m3u8"}]});"#;
        assert_eq!(
            capture(&SOURCES_REGEX, body, "sources").unwrap(),
            "https://s3.savefiles.example/hls/x/master.m3u8"
        );
    }

    #[tokio::test]
    async fn test_form_post_and_probe() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let manifest = format!("http://{addr}/master.m3u8");

        let app = Router::new()
            .route(
                "/dl",
                post(move |Form(form): Form<HashMap<String, String>>| {
                    let manifest = manifest.clone();
                    async move {
                        if form.get("op").map(String::as_str) == Some("embed")
                            && form.get("file_code").map(String::as_str) == Some("abc123")
                        {
                            format!(r#"sources: [{{file:"{manifest}"}}]"#)
                        } else {
                            String::new()
                        }
                    }
                }),
            )
            .route(
                "/master.m3u8",
                get(|| async {
                    "#EXTM3U\n#EXT-X-STREAM-INF:BANDWIDTH=800000,RESOLUTION=1280x720\nv.m3u8\n"
                }),
            );
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });

        // the handler posts to the fixed site, so exercise its pieces directly
        let mut extractor = Extractor::new("savefiles", &test_context());
        extractor.add_header(header::ORIGIN, SITE);
        let form = [("op", "embed"), ("file_code", "abc123"), ("auto", "0")];
        let (_, body) = extractor
            .send_text(extractor.post(&format!("http://{addr}/dl")).form(&form))
            .await
            .unwrap();
        let stream_url = capture(&SOURCES_REGEX, &body, "sources").unwrap();
        assert_eq!(stream_url, format!("http://{addr}/master.m3u8"));
        assert_eq!(
            Savefiles.probe_quality(&extractor, stream_url).await,
            Quality::Height(720)
        );
    }

    #[tokio::test]
    #[ignore]
    async fn test_savefiles_live() {
        let result = Savefiles
            .resolve(&test_context(), "https://savefiles.com/e/ko901kakbuho")
            .await;
        println!("{result:?}");
    }
}
