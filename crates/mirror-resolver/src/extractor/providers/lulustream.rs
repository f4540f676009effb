use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use reqwest::header;

use super::{JW_SOURCE_REGEX, capture, unpack_if_packed};
use crate::decoding::packer;
use crate::extractor::error::ExtractorError;
use crate::extractor::handler::{Extractor, ResolveContext, StreamHandler};
use crate::extractor::hls::HlsProbe;
use crate::media::ResolvedMedia;

pub const DOMAINS: &[&str] = &["lulustream.com", "luluvdo.com", "lulu.st"];

static QUERY_PARAM_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[?&]([^=]*)=([^&]*)").unwrap());

const SITE: &str = "https://luluvdo.com";
const KEPT_PARAMS: &[&str] = &["t", "s", "e", "f"];

pub struct Lulustream;

impl Lulustream {
    /// Rebuilds the manifest query from the `t`, `s`, `e` and `f` parameters.
    ///
    /// A keyless parameter takes the name at its own position in the query.
    pub(crate) fn fix_manifest_link(link: &str) -> String {
        let mut params: Vec<(&str, &str)> = Vec::new();
        for (i, caps) in QUERY_PARAM_REGEX.captures_iter(link).enumerate() {
            let value = caps.get(2).map_or("", |m| m.as_str());
            let key = match caps.get(1).map_or("", |m| m.as_str()) {
                "" => match KEPT_PARAMS.get(i) {
                    Some(name) => *name,
                    None => continue,
                },
                key => key,
            };
            match params.iter_mut().find(|(k, _)| *k == key) {
                Some(existing) => existing.1 = value,
                None => params.push((key, value)),
            }
        }

        let base = link.split('?').next().unwrap_or(link);
        let query = params
            .iter()
            .filter(|(k, _)| KEPT_PARAMS.contains(k))
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("&");
        format!("{base}?{query}&i=0.3&sp=0")
    }

    pub(crate) fn stream_url(html: &str) -> Result<String, ExtractorError> {
        if !packer::detect(html) {
            return Err(ExtractorError::PatternMissing("packed script"));
        }
        let script = unpack_if_packed(html)?;
        let raw = capture(&JW_SOURCE_REGEX, &script, "sources")?;
        Ok(Self::fix_manifest_link(raw))
    }
}

impl HlsProbe for Lulustream {}

#[async_trait]
impl StreamHandler for Lulustream {
    async fn resolve(
        &self,
        ctx: &ResolveContext,
        locator: &str,
    ) -> Result<ResolvedMedia, ExtractorError> {
        let mut extractor = Extractor::new("lulustream", ctx);
        extractor.add_header(header::REFERER, SITE);
        extractor.add_header(header::ORIGIN, SITE);

        let html = extractor.fetch_text(locator).await?;
        let url = Self::stream_url(&html)?;
        let quality = self.probe_quality(&extractor, &url).await;
        Ok(ResolvedMedia::new(url, quality).with_request_headers(extractor.replay_headers(&[
            header::USER_AGENT,
            header::REFERER,
            header::ORIGIN,
        ])))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractor::handler::tests::test_context;

    const PACKED: &str = r#"<script type="text/javascript">eval(function(p,a,c,k,e,d){while(c--)if(k[c])p=p.replace(new RegExp('\\b'+c.toString(a)+'\\b','g'),k[c]);return p}('0("1").2({3:[{4:"5://6.7.8/9/a/b.c?=d&=e&=f&g=h"}]});',36,18,'jwplayer|vplayer|setup|sources|file|https|cdn|lulu|example|hls|v|master|m3u8|tok|99|43200|srv|7'.split('|')))</script>"#;

    #[test]
    fn test_fix_manifest_link() {
        assert_eq!(
            Lulustream::fix_manifest_link("https://a.example/m.m3u8?=tok&=99&=43200&srv=7"),
            "https://a.example/m.m3u8?t=tok&s=99&e=43200&i=0.3&sp=0"
        );
        // keyless names follow the overall position, not the keyless count
        assert_eq!(
            Lulustream::fix_manifest_link("https://a.example/m.m3u8?srv=7&=tok&f=1"),
            "https://a.example/m.m3u8?s=tok&f=1&i=0.3&sp=0"
        );
    }

    #[test]
    fn test_stream_url_from_packed_page() {
        assert_eq!(
            Lulustream::stream_url(PACKED).unwrap(),
            "https://cdn.lulu.example/hls/v/master.m3u8?t=tok&s=99&e=43200&i=0.3&sp=0"
        );
    }

    #[test]
    fn test_page_without_packed_script() {
        assert!(matches!(
            Lulustream::stream_url("<html>File was deleted</html>"),
            Err(ExtractorError::PatternMissing(_))
        ));
    }

    #[tokio::test]
    #[ignore]
    async fn test_lulustream_live() {
        let result = Lulustream
            .resolve(&test_context(), "https://luluvdo.com/e/3r2jbh6s9y1o")
            .await;
        println!("{result:?}");
    }
}
