use serde::{Deserialize, Serialize};

use super::resolved::HeaderPairs;

/// One entry of the `streams` array returned to the catalog client.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StreamRecord {
    pub name: String,
    pub description: String,
    pub url: String,
    pub behavior_hints: BehaviorHints,
    #[serde(skip)]
    pub priority: u32,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BehaviorHints {
    pub filename: String,
    pub binge_group: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proxy_headers: Option<ProxyHeaders>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub not_web_ready: Option<bool>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct ProxyHeaders {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request: Option<HeaderPairs>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<HeaderPairs>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamsResponse {
    pub streams: Vec<StreamRecord>,
}
