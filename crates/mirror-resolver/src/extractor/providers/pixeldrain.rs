use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use reqwest::header;
use serde::Deserialize;

use crate::extractor::error::ExtractorError;
use crate::extractor::handler::{Extractor, ResolveContext, StreamHandler, parse_locator};
use crate::media::{Quality, ResolvedMedia};

pub const DOMAINS: &[&str] = &["pixeldrain."];

static PATH_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/(u|l|file)/([0-9a-zA-Z\-]+)").unwrap());

const API_BASE: &str = "https://pixeldrain.com/api";

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Target {
    File(String),
    List(String),
}

#[derive(Debug, Deserialize)]
pub(crate) struct ListResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    files: Vec<ListFile>,
}

#[derive(Debug, Deserialize)]
struct ListFile {
    id: String,
    #[serde(default)]
    mime_type: String,
    #[serde(default)]
    size: u64,
}

pub struct Pixeldrain;

impl Pixeldrain {
    pub(crate) fn target(path: &str) -> Result<Target, ExtractorError> {
        let caps = PATH_REGEX
            .captures(path)
            .ok_or(ExtractorError::PatternMissing("file id"))?;
        let id = caps[2].to_string();
        Ok(match &caps[1] {
            "l" => Target::List(id),
            _ => Target::File(id),
        })
    }

    /// Id of the largest video in a list.
    pub(crate) fn largest_video(list: &ListResponse) -> Result<&str, ExtractorError> {
        if !list.success {
            return Err(ExtractorError::Client(
                list.message.clone().unwrap_or_else(|| "list lookup failed".to_string()),
            ));
        }
        list.files
            .iter()
            .filter(|f| f.mime_type.contains("video"))
            .max_by_key(|f| f.size)
            .map(|f| f.id.as_str())
            .ok_or(ExtractorError::NoStreamsFound)
    }

    fn file_url(id: &str) -> String {
        format!("{API_BASE}/file/{id}")
    }
}

#[async_trait]
impl StreamHandler for Pixeldrain {
    async fn resolve(
        &self,
        ctx: &ResolveContext,
        locator: &str,
    ) -> Result<ResolvedMedia, ExtractorError> {
        let (url, _) = parse_locator(locator)?;
        let extractor = Extractor::new("pixeldrain", ctx);

        let file_id = match Self::target(url.path())? {
            Target::File(id) => id,
            Target::List(id) => {
                let body = extractor
                    .fetch_relayed(&format!("{API_BASE}/list/{id}"))
                    .await?;
                let list: ListResponse = serde_json::from_str(&body)?;
                Self::largest_video(&list)?.to_string()
            }
        };

        Ok(
            ResolvedMedia::new(Self::file_url(&file_id), Quality::Unknown)
                .with_request_headers(extractor.replay_headers(&[header::USER_AGENT])),
        )
    }
}
