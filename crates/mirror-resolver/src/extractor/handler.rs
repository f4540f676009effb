use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{self, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use super::default::random_user_agent;
use super::error::ExtractorError;
use crate::config::ResolverConfig;
use crate::media::{HeaderPairs, ResolvedMedia};
use crate::proxy::Relay;

/// Per-request state handed to every handler of one resolution request.
#[derive(Debug, Clone)]
pub struct ResolveContext {
    pub client: Client,
    pub privileged: bool,
    pub request_timeout: Duration,
    pub relay: Option<Relay>,
    pub user_agent: Option<String>,
}

impl ResolveContext {
    pub fn new(client: Client, config: &ResolverConfig, privileged: bool) -> Self {
        Self {
            client,
            privileged: privileged || config.force_privileged,
            request_timeout: config.request_timeout(),
            relay: config.relay.clone(),
            user_agent: config.user_agent.clone(),
        }
    }

    pub fn user_agent(&self) -> String {
        self.user_agent
            .clone()
            .unwrap_or_else(|| random_user_agent().to_string())
    }
}

/// Extraction logic for one hosting site.
///
/// Implementations issue their own requests through the context's client and
/// return either a complete [`ResolvedMedia`] or an error. They never see the
/// catalog entry the locator came from.
#[async_trait]
pub trait StreamHandler: Send + Sync {
    async fn resolve(
        &self,
        ctx: &ResolveContext,
        locator: &str,
    ) -> Result<ResolvedMedia, ExtractorError>;
}

/// Outcome of invoking a provider through its descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Resolved(ResolvedMedia),
    NoResult,
}

impl Resolution {
    pub fn into_media(self) -> Option<ResolvedMedia> {
        match self {
            Resolution::Resolved(media) => Some(media),
            Resolution::NoResult => None,
        }
    }
}

/// Request helper shared by the handlers.
///
/// Carries the headers a handler sends on every hop so that the same set can
/// be replayed by the player or the HLS probe afterwards.
#[derive(Debug, Clone)]
pub struct Extractor {
    pub provider: &'static str,
    pub client: Client,
    timeout: Duration,
    headers: HeaderMap,
    relay: Option<Relay>,
}

impl Extractor {
    pub fn new(provider: &'static str, ctx: &ResolveContext) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::ACCEPT,
            HeaderValue::from_static(
                "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
            ),
        );
        headers.insert(
            header::ACCEPT_LANGUAGE,
            HeaderValue::from_static("en-US,en;q=0.9,pl;q=0.8"),
        );

        let mut extractor = Self {
            provider,
            client: ctx.client.clone(),
            timeout: ctx.request_timeout,
            headers,
            relay: ctx.relay.clone().filter(|_| ctx.privileged),
        };
        extractor.add_header(header::USER_AGENT, &ctx.user_agent());
        extractor
    }

    /// Sets a header for every following request. Values that are not valid
    /// header values are skipped.
    pub fn add_header(&mut self, name: HeaderName, value: &str) {
        match HeaderValue::from_str(value) {
            Ok(value) => {
                self.headers.insert(name, value);
            }
            Err(_) => debug!(provider = self.provider, %name, "skipping invalid header value"),
        }
    }

    pub fn header(&self, name: &HeaderName) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn user_agent(&self) -> &str {
        self.header(&header::USER_AGENT).unwrap_or_default()
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn get(&self, url: &str) -> RequestBuilder {
        self.request(Method::GET, url)
    }

    pub fn post(&self, url: &str) -> RequestBuilder {
        self.request(Method::POST, url)
    }

    pub fn request(&self, method: Method, url: &str) -> RequestBuilder {
        debug!(provider = self.provider, %method, url, "request");
        self.client
            .request(method, url)
            .headers(self.headers.clone())
            .timeout(self.timeout)
    }

    /// Sends `request` and returns the final URL after redirects with the body.
    pub async fn send_text(
        &self,
        request: RequestBuilder,
    ) -> Result<(Url, String), ExtractorError> {
        let response = check_status(request.send().await?)?;
        let final_url = response.url().clone();
        Ok((final_url, response.text().await?))
    }

    pub async fn fetch_text(&self, url: &str) -> Result<String, ExtractorError> {
        let (_, body) = self.send_text(self.get(url)).await?;
        Ok(body)
    }

    pub async fn fetch_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, ExtractorError> {
        let body = self.fetch_text(url).await?;
        Ok(serde_json::from_str(&body)?)
    }

    /// Fetches a page through the relay when the request is privileged and a
    /// relay is configured, directly otherwise.
    pub async fn fetch_relayed(&self, url: &str) -> Result<String, ExtractorError> {
        match &self.relay {
            Some(relay) => self.fetch_text(&relay.wrap(url, self.user_agent())).await,
            None => self.fetch_text(url).await,
        }
    }

    pub fn is_relayed(&self) -> bool {
        self.relay.is_some()
    }

    /// The subset of the current headers a player has to replay, keyed by
    /// their conventional spelling.
    pub fn replay_headers(&self, names: &[HeaderName]) -> HeaderPairs {
        names
            .iter()
            .filter_map(|name| {
                self.header(name)
                    .filter(|value| !value.is_empty())
                    .map(|value| (canonical_name(name), value.to_string()))
            })
            .collect()
    }
}

fn check_status(response: Response) -> Result<Response, ExtractorError> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(ExtractorError::Status {
            status,
            url: response.url().to_string(),
        })
    }
}

/// `user-agent` -> `User-Agent`
pub(crate) fn canonical_name(name: &HeaderName) -> String {
    name.as_str()
        .split('-')
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join("-")
}

/// Parses `locator` and returns it with its `scheme://host` origin.
pub(crate) fn parse_locator(locator: &str) -> Result<(Url, String), ExtractorError> {
    let url =
        Url::parse(locator).map_err(|e| ExtractorError::InvalidUrl(format!("{locator}: {e}")))?;
    let host = url
        .host_str()
        .ok_or_else(|| ExtractorError::InvalidUrl(locator.to_string()))?;
    let origin = format!("{}://{host}", url.scheme());
    Ok((url, origin))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn test_context() -> ResolveContext {
        ResolveContext::new(Client::new(), &ResolverConfig::default(), false)
    }

    #[test]
    fn test_canonical_name() {
        assert_eq!(canonical_name(&header::USER_AGENT), "User-Agent");
        assert_eq!(canonical_name(&header::REFERER), "Referer");
        assert_eq!(canonical_name(&header::ORIGIN), "Origin");
    }

    #[test]
    fn test_replay_headers() {
        let mut extractor = Extractor::new("test", &test_context());
        extractor.add_header(header::USER_AGENT, "UA");
        extractor.add_header(header::REFERER, "https://a.example/");
        extractor.add_header(header::ORIGIN, "bad\nvalue");

        let replay =
            extractor.replay_headers(&[header::USER_AGENT, header::REFERER, header::ORIGIN]);
        assert_eq!(replay.len(), 2);
        assert_eq!(replay["User-Agent"], "UA");
        assert_eq!(replay["Referer"], "https://a.example/");
    }

    #[test]
    fn test_relay_only_when_privileged() {
        let config = ResolverConfig {
            relay: Some(Relay::new("https://relay.example", "pw")),
            ..Default::default()
        };
        let plain = ResolveContext::new(Client::new(), &config, false);
        assert!(!Extractor::new("test", &plain).is_relayed());

        let privileged = ResolveContext::new(Client::new(), &config, true);
        assert!(Extractor::new("test", &privileged).is_relayed());
    }

    #[test]
    fn test_force_privileged() {
        let config = ResolverConfig {
            force_privileged: true,
            ..Default::default()
        };
        assert!(ResolveContext::new(Client::new(), &config, false).privileged);
    }

    #[test]
    fn test_parse_locator() {
        let (url, origin) = parse_locator("https://www.cda.pl/video/123?x=1").unwrap();
        assert_eq!(url.path(), "/video/123");
        assert_eq!(origin, "https://www.cda.pl");
        assert!(matches!(
            parse_locator("not a url"),
            Err(ExtractorError::InvalidUrl(_))
        ));
    }
}
