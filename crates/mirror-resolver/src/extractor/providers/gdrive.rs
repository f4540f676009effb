use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use reqwest::header;
use scraper::{Html, Selector};
use url::{Url, form_urlencoded};

use super::capture;
use crate::extractor::error::ExtractorError;
use crate::extractor::handler::{Extractor, ResolveContext, StreamHandler};
use crate::media::{Quality, ResolvedMedia};

pub const DOMAINS: &[&str] = &["drive.google.com"];

const DOWNLOAD_URL: &str = "https://drive.usercontent.google.com/download";

static ITEM_ID_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/d/([a-zA-Z0-9_-]+)").unwrap());
static HIDDEN_INPUT_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("input[type=hidden]").unwrap());

/// Google Drive shares. Large files answer with a virus scan warning whose
/// hidden form fields make up the real download query.
pub struct Gdrive {
    download_url: String,
}

impl Default for Gdrive {
    fn default() -> Self {
        Self::with_download_url(DOWNLOAD_URL)
    }
}

impl Gdrive {
    pub fn with_download_url(download_url: impl Into<String>) -> Self {
        Self {
            download_url: download_url.into(),
        }
    }

    /// Download URL rebuilt from the hidden inputs of the warning page.
    pub(crate) fn confirm_url(download_url: &str, html: &str) -> Result<String, ExtractorError> {
        let document = Html::parse_document(html);
        let mut query = form_urlencoded::Serializer::new(String::new());
        for input in document.select(&HIDDEN_INPUT_SELECTOR) {
            let attrs = input.value();
            if let (Some(name), Some(value)) = (attrs.attr("name"), attrs.attr("value")) {
                query.append_pair(name, value);
            }
        }

        let mut url = Url::parse(download_url)
            .map_err(|e| ExtractorError::InvalidUrl(format!("{download_url}: {e}")))?;
        url.set_query(Some(&query.finish()));
        Ok(url.to_string())
    }
}

#[async_trait]
impl StreamHandler for Gdrive {
    async fn resolve(
        &self,
        ctx: &ResolveContext,
        locator: &str,
    ) -> Result<ResolvedMedia, ExtractorError> {
        let item_id = capture(&ITEM_ID_REGEX, locator, "item id")?;
        let download = format!("{}?id={item_id}", self.download_url);

        let extractor = Extractor::new("gdrive", ctx);
        let body = extractor.fetch_text(&download).await?;
        let url = if body.starts_with("<!DOCTYPE html>") {
            Self::confirm_url(&self.download_url, &body)?
        } else {
            download
        };

        Ok(ResolvedMedia::new(url, Quality::Unknown)
            .with_request_headers(extractor.replay_headers(&[header::USER_AGENT, header::ACCEPT])))
    }
}
