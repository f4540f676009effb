use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use reqwest::header;
use serde_json::Value;
use tracing::debug;

use crate::decoding::base64::decode_standard;
use crate::decoding::transform::{reverse, rot13, shift_chars};
use crate::decoding::DecodeError;
use crate::extractor::error::ExtractorError;
use crate::extractor::handler::{Extractor, ResolveContext, StreamHandler, parse_locator};
use crate::extractor::hls::HlsProbe;
use crate::media::{Quality, ResolvedMedia};

pub const DOMAINS: &[&str] = &[
    "voe.sx",
    "voe-unblock.",
    "voeunblock",
    "un-block-voe.net",
    "voeunbl0ck.com",
    "voeunblck.com",
    "voeunblk.com",
    "voe-un-block.com",
    "voeun-block.net",
    "v-o-e-unblock.com",
    "jonathansociallike.com",
    "edwardarriveoften.com",
    "nathanfromsubject.com",
    "audaciousdefaulthouse.com",
    "launchreliantcleaverriver.com",
    "kennethofficialitem.com",
    "reputationsheriffkennethsand.com",
    "fittingcentermondaysunday.com",
    "lukecomparetwo.com",
    "housecardsummerbutton.com",
    "fraudclatterflyingcar.com",
    "wolfdyslectic.com",
    "bigclatterhomesguideservice.com",
    "uptodatefinishconferenceroom.com",
    "jayservicestuff.com",
    "realfinanceblogcenter.com",
    "tinycat-voe-fashion.com",
    "paulkitchendark.com",
    "metagnathtuggers.com",
    "gamoneinterrupted.com",
    "chromotypic.com",
    "crownmakermacaronicism.com",
    "generatesnitrosate.com",
    "yodelswartlike.com",
    "figeterpiazine.com",
    "strawberriesporail.com",
    "valeronevijao.com",
    "timberwoodanotia.com",
    "apinchcaseation.com",
    "nectareousoverelate.com",
    "nonesnanking.com",
    "smoki.cc",
    "chuckle-tube.com",
    "goofy-banana.com",
];

static REDIRECT_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"window\.location\.href\s*=\s*'([^']+)'").unwrap());
static EMBED_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"json">\["([^"]+)"]</script>\s*<script\s*src="([^"]+)"#).unwrap()
});
static LUT_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\[(?:'\W{2}'[,\]]){1,9})").unwrap());
static FALLBACK_REGEXES: LazyLock<[Regex; 3]> = LazyLock::new(|| {
    [
        Regex::new(
            r#"mp4["']:\s*["'](?P<url>[^"']+)["'],\s*["']video_height["']:\s*(?P<label>[^,]+)"#,
        )
        .unwrap(),
        Regex::new(r"hls':\s*'(?P<url>[^']+)'").unwrap(),
        Regex::new(r#"hls":\s*"(?P<url>[^"]+)",\s*"video_height":\s*(?P<label>[^,]+)"#).unwrap(),
    ]
});

const URL_KEYS: &[&str] = &["file", "source", "direct_access_url"];

pub struct Voe;

impl Voe {
    /// Junk markers from a `['@$','^^',...]` literal.
    pub(crate) fn parse_luts(literal: &str) -> Vec<&str> {
        literal
            .strip_prefix("['")
            .and_then(|rest| rest.strip_suffix("']"))
            .map(|inner| inner.split("','").filter(|m| !m.is_empty()).collect())
            .unwrap_or_default()
    }

    /// ROT13, marker removal, base64, shift by -3, reverse, base64, JSON.
    pub(crate) fn decode_payload(encoded: &str, luts: &[&str]) -> Result<Value, ExtractorError> {
        let mut text = rot13(encoded);
        for marker in luts {
            text = text.replace(*marker, "");
        }
        let layer = String::from_utf8(decode_standard(&text)?).map_err(DecodeError::from)?;
        let layer = reverse(&shift_chars(&layer, -3)?);
        let json = decode_standard(&layer)?;
        Ok(serde_json::from_slice(&json)?)
    }

    pub(crate) fn stream_url(decoded: &Value) -> Option<&str> {
        URL_KEYS
            .iter()
            .find_map(|key| decoded.get(*key).and_then(Value::as_str))
    }

    /// Direct `mp4`/`hls` assignments some player builds still carry.
    pub(crate) fn fallback_source(html: &str) -> Option<(String, Quality)> {
        FALLBACK_REGEXES.iter().find_map(|regex| {
            let caps = regex.captures(html)?;
            let quality = caps
                .name("label")
                .map(|label| Quality::from_label(label.as_str()))
                .unwrap_or_default();
            Some((caps["url"].to_string(), quality))
        })
    }
}

impl HlsProbe for Voe {}

#[async_trait]
impl StreamHandler for Voe {
    async fn resolve(
        &self,
        ctx: &ResolveContext,
        locator: &str,
    ) -> Result<ResolvedMedia, ExtractorError> {
        parse_locator(locator)?;
        let mut extractor = Extractor::new("voe", ctx);
        extractor.add_header(header::REFERER, locator);

        let mut player_url = locator.to_string();
        let mut html = extractor.fetch_relayed(&player_url).await?;
        if html.contains("const currentUrl") {
            let redirect = REDIRECT_REGEX.captures(&html).map(|caps| caps[1].to_string());
            if let Some(redirect) = redirect {
                debug!(from = %player_url, to = %redirect, "following player redirect");
                html = extractor.fetch_relayed(&redirect).await?;
                player_url = redirect;
            }
        }

        let embed = EMBED_REGEX
            .captures(&html)
            .map(|caps| (caps[1].to_string(), caps[2].to_string()));
        let mut source = None;
        if let Some((encoded, script_src)) = embed {
            let (page, _) = parse_locator(&player_url)?;
            let script_url = page
                .join(&script_src)
                .map_err(|e| ExtractorError::InvalidUrl(format!("{script_src}: {e}")))?;
            let script = extractor.fetch_text(script_url.as_str()).await?;
            if let Some(caps) = LUT_REGEX.captures(&script) {
                let decoded = Self::decode_payload(&encoded, &Self::parse_luts(&caps[1]))?;
                source = Self::stream_url(&decoded).map(|url| (url.to_string(), Quality::Unknown));
            }
        }

        let (url, quality) = match source.or_else(|| Self::fallback_source(&html)) {
            Some(found) => found,
            None => return Err(ExtractorError::NoStreamsFound),
        };
        let quality = if url.contains(".m3u8") {
            match self.probe_quality(&extractor, &url).await {
                Quality::Unknown => quality,
                probed => probed,
            }
        } else {
            quality
        };

        Ok(ResolvedMedia::new(url, quality).with_request_headers(
            extractor.replay_headers(&[header::USER_AGENT, header::REFERER]),
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

    const LUTS: &str = "['@$','^^','~@','%?','*~','!!','#&']";
    const ENCODED: &str = "CR1J@$HUcMpRj^^5GSMqqy~@IoMQAAE%?x9fHUOp*~nmEUMmW!!dI2q9Z3#&OCsSyXM@$31WJzI5^^JQIyAGk~@JKKMSJ2%?Ien1gqr*~QqXKJ08!!sR85HRg#&zZ1IYMT@$kloHkir^^1cxpR18~@nN==";

    #[test]
    fn test_parse_luts() {
        let script = format!("var x=1;var l={LUTS};run(l);");
        let literal = &LUT_REGEX.captures(&script).unwrap()[1];
        assert_eq!(
            Voe::parse_luts(literal),
            vec!["@$", "^^", "~@", "%?", "*~", "!!", "#&"]
        );
        assert!(Voe::parse_luts("[]").is_empty());
    }

    #[test]
    fn test_decode_payload() {
        let luts = Voe::parse_luts(LUTS);
        let decoded = Voe::decode_payload(ENCODED, &luts).unwrap();
        assert_eq!(
            Voe::stream_url(&decoded),
            Some("https://cdn.example/voe/master.m3u8?t=abc")
        );
        assert_eq!(decoded["title"], "ep1");
    }

    #[test]
    fn test_decode_without_markers_fails() {
        assert!(Voe::decode_payload(ENCODED, &[]).is_err());
    }

    #[test]
    fn test_stream_url_key_order() {
        let decoded = serde_json::json!({
            "direct_access_url": "https://a/d.mp4",
            "source": "https://a/s.m3u8"
        });
        assert_eq!(Voe::stream_url(&decoded), Some("https://a/s.m3u8"));
        assert_eq!(Voe::stream_url(&serde_json::json!({"x": 1})), None);
    }

    #[test]
    fn test_fallback_source() {
        let html = r#"var sources = {'mp4': 'https://a.example/v.mp4', 'video_height': 720, 'x': 1};"#;
        assert_eq!(
            Voe::fallback_source(html),
            Some(("https://a.example/v.mp4".to_string(), Quality::Height(720)))
        );

        let html = "var sources = {'hls': 'https://a.example/m.m3u8'};";
        assert_eq!(
            Voe::fallback_source(html),
            Some(("https://a.example/m.m3u8".to_string(), Quality::Unknown))
        );
        assert_eq!(Voe::fallback_source("<html></html>"), None);
    }

    #[tokio::test]
    async fn test_redirect_then_fallback() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let landing = format!(
            "<script>const currentUrl = 'x'; window.location.href = 'http://{addr}/e/real';</script>"
        );
        let player = format!("<script>var sources = {{'hls': 'http://{addr}/master.m3u8'}};</script>");

        let app = Router::new()
            .route("/e/start", get(move || std::future::ready(landing.clone())))
            .route("/e/real", get(move || std::future::ready(player.clone())))
            .route(
                "/master.m3u8",
                get(|| async {
                    "#EXTM3U\n#EXT-X-STREAM-INF:BANDWIDTH=1,RESOLUTION=1280x720\nv.m3u8\n"
                }),
            );
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });

        let media = Voe
            .resolve(&test_context(), &format!("http://{addr}/e/start"))
            .await
            .unwrap();
        assert_eq!(media.url, format!("http://{addr}/master.m3u8"));
        assert_eq!(media.quality, Quality::Height(720));
    }

    #[tokio::test]
    #[ignore]
    async fn test_voe_live() {
        let result = Voe
            .resolve(&test_context(), "https://voe.sx/e/mw8a0fo2xeay")
            .await;
        println!("{result:?}");
    }
}
