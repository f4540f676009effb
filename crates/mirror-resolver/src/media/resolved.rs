use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{MirrorEntry, Quality};

pub type HeaderPairs = BTreeMap<String, String>;

/// Headers a player must replay (`request`) or a proxy must inject
/// (`response`) for the resolved URL to play.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamHeaders {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request: Option<HeaderPairs>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<HeaderPairs>,
}

impl StreamHeaders {
    pub fn request(headers: HeaderPairs) -> Self {
        Self {
            request: non_empty(headers),
            response: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.request.is_none() && self.response.is_none()
    }
}

fn non_empty(headers: HeaderPairs) -> Option<HeaderPairs> {
    if headers.is_empty() {
        None
    } else {
        Some(headers)
    }
}

/// What a provider handler hands back on success.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ResolvedMedia {
    pub url: String,
    pub quality: Quality,
    pub headers: StreamHeaders,
}

impl ResolvedMedia {
    pub fn new<S: Into<String>>(url: S, quality: Quality) -> Self {
        Self {
            url: url.into(),
            quality,
            headers: StreamHeaders::default(),
        }
    }

    pub fn with_request_headers(mut self, headers: HeaderPairs) -> Self {
        self.headers.request = non_empty(headers);
        self
    }

    pub fn with_response_headers(mut self, headers: HeaderPairs) -> Self {
        self.headers.response = non_empty(headers);
        self
    }
}

/// A resolved media URL joined with the mirror entry it came from.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ResolvedStream {
    pub url: String,
    pub quality: Quality,
    pub request_headers: Option<HeaderPairs>,
    pub response_headers: Option<HeaderPairs>,
    // name of the provider that resolved the mirror, e.g. "cda"
    pub provider_label: String,
    pub translator_title: String,
    pub inverted: bool,
}

impl ResolvedStream {
    pub fn new(media: ResolvedMedia, provider: &str, entry: &MirrorEntry) -> Self {
        Self {
            url: media.url,
            quality: media.quality,
            request_headers: media.headers.request,
            response_headers: media.headers.response,
            provider_label: provider.to_string(),
            translator_title: entry.translator_title.clone(),
            inverted: entry.inverted,
        }
    }
}
