use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use reqwest::header;

use super::{JW_SOURCE_REGEX, capture, jw_source, unpack_if_packed};
use crate::decoding::packer;
use crate::extractor::error::ExtractorError;
use crate::extractor::handler::{Extractor, ResolveContext, StreamHandler, parse_locator};
use crate::media::{Quality, ResolvedMedia};

pub const DOMAINS: &[&str] = &["vidtube.one"];

static QUERY_PARAM_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[?&]([^=]*)=([^&]*)").unwrap());
static PLAIN_SOURCE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"sources: \[\{file:"(https?://[^"]+)"\}\]"#).unwrap());

const POSITIONAL_PARAMS: &[&str] = &["t", "s", "e", "f"];
const EXT_MARKER: &str = "/.mp4";

pub struct Vidtube;

impl Vidtube {
    /// Turns the obfuscated mp4 link of a packed player into a playable one.
    ///
    /// Keyless parameters get the names `t`, `s`, `e`, `f` by position, the
    /// empty `/.mp4` file name takes the last character of the directory
    /// before it, and the path after the second `//` moves under `/v/`.
    pub(crate) fn fix_mp4_link(link: &str) -> Result<String, ExtractorError> {
        let mut positional: Vec<(&str, &str)> = Vec::new();
        let mut extra: Vec<(&str, &str)> = Vec::new();
        for (i, caps) in QUERY_PARAM_REGEX.captures_iter(link).enumerate() {
            let key = caps.get(1).map_or("", |m| m.as_str());
            let value = caps.get(2).map_or("", |m| m.as_str());
            if key.is_empty() {
                if let Some(name) = POSITIONAL_PARAMS.get(i) {
                    upsert(&mut positional, name, value);
                }
            } else {
                upsert(&mut extra, key, value);
            }
        }
        upsert(&mut extra, "i", "0.0");
        upsert(&mut extra, "sp", "30000");

        let join = |params: &[(&str, &str)]| {
            params
                .iter()
                .map(|(k, v)| format!("{k}={v}"))
                .collect::<Vec<_>>()
                .join("&")
        };
        let base = link.split('?').next().unwrap_or(link);
        let fixed = format!("{base}?{}&{}", join(&positional), join(&extra));

        let malformed = || ExtractorError::InvalidUrl(link.to_string());
        let ext_index = fixed.find(EXT_MARKER).ok_or_else(malformed)?;
        let dir_start = fixed[..ext_index].rfind('/').ok_or_else(malformed)?;
        let marker = fixed[dir_start + 1..ext_index]
            .chars()
            .next_back()
            .ok_or_else(malformed)?;
        let fixed = fixed.replacen(EXT_MARKER, &format!("/{marker}.mp4"), 1);

        let mut parts = fixed.splitn(3, "//");
        Ok(match (parts.next(), parts.next(), parts.next()) {
            (Some(scheme), Some(host), Some(path)) => format!("{scheme}//{host}/v/{path}"),
            _ => fixed,
        })
    }

    /// Stream URL and labelled quality from the player page.
    pub(crate) fn player_source(html: &str) -> Result<(String, Quality), ExtractorError> {
        if packer::detect(html) {
            let script = unpack_if_packed(html)?;
            let raw = capture(&JW_SOURCE_REGEX, &script, "sources")?;
            let quality = jw_source(&script).map(|(_, q)| q).unwrap_or_default();
            return Ok((Self::fix_mp4_link(raw)?, quality));
        }

        let url = capture(&PLAIN_SOURCE_REGEX, html, "sources")?;
        let quality = jw_source(html).map(|(_, q)| q).unwrap_or_default();
        Ok((url.to_string(), quality))
    }
}

fn upsert<'a>(params: &mut Vec<(&'a str, &'a str)>, key: &'a str, value: &'a str) {
    match params.iter_mut().find(|(k, _)| *k == key) {
        Some(existing) => existing.1 = value,
        None => params.push((key, value)),
    }
}

#[async_trait]
impl StreamHandler for Vidtube {
    async fn resolve(
        &self,
        ctx: &ResolveContext,
        locator: &str,
    ) -> Result<ResolvedMedia, ExtractorError> {
        let (_, origin) = parse_locator(locator)?;
        let mut extractor = Extractor::new("vidtube", ctx);
        extractor.add_header(header::REFERER, &format!("{origin}/"));

        let html = extractor.fetch_text(locator).await?;
        let (stream_url, quality) = Self::player_source(&html)?;
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

    #[test]
    fn test_fix_mp4_link() {
        assert_eq!(
            Vidtube::fix_mp4_link("https://cdn.vidtube.example//abcdef/.mp4?=TOK&=SIG&=123&=456")
                .unwrap(),
            "https://cdn.vidtube.example/v/abcdef/f.mp4?t=TOK&s=SIG&e=123&f=456&i=0.0&sp=30000"
        );
        // named parameters are kept after the positional ones
        assert_eq!(
            Vidtube::fix_mp4_link("https://cdn.vidtube.example//x9/.mp4?=TOK&srv=3").unwrap(),
            "https://cdn.vidtube.example/v/x9/9.mp4?t=TOK&srv=3&i=0.0&sp=30000"
        );
        assert!(Vidtube::fix_mp4_link("https://cdn.vidtube.example/v.mp4?=a").is_err());
    }

    #[test]
    fn test_plain_player_source() {
        let html = r#"jwplayer("vplayer").setup({sources: [{file:"https://cdn.vidtube.example/v.mp4"}],label:"1280x720"});"#;
        let (url, _) = Vidtube::player_source(html).unwrap();
        assert_eq!(url, "https://cdn.vidtube.example/v.mp4");
        assert!(Vidtube::player_source("<p>gone</p>").is_err());
    }

    #[tokio::test]
    async fn test_resolve_plain_page() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = Router::new().route(
            "/embed-1.html",
            get(|| async {
                r#"<script>jwplayer("vplayer").setup({sources: [{file:"https://cdn.vidtube.example/hd.mp4"}]});</script>"#
            }),
        );
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });

        let media = Vidtube
            .resolve(&test_context(), &format!("http://{addr}/embed-1.html"))
            .await
            .unwrap();
        assert_eq!(media.url, "https://cdn.vidtube.example/hd.mp4");
        assert_eq!(
            media.headers.request.unwrap()["Referer"],
            format!("http://{addr}/")
        );
    }

    #[tokio::test]
    #[ignore]
    async fn test_vidtube_live() {
        let result = Vidtube
            .resolve(&test_context(), "https://vidtube.one/embed-abc.html")
            .await;
        println!("{result:?}");
    }
}
