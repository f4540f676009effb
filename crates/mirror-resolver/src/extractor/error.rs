use reqwest::StatusCode;
use thiserror::Error;
use tracing::Level;

use crate::decoding::DecodeError;

#[derive(Error, Debug)]
pub enum ExtractorError {
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    #[error("http error: {0}")]
    HttpError(#[from] reqwest::Error),
    #[error("unexpected status {status} from {url}")]
    Status { status: StatusCode, url: String },
    #[error("json error: {0}")]
    JsonError(#[from] serde_json::Error),
    #[error("pattern not found: {0}")]
    PatternMissing(&'static str),
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),
    #[error("no streams found")]
    NoStreamsFound,
    #[error("privileged request required")]
    PrivilegeRequired,
    #[error("client error: {0}")]
    Client(String),
}

impl ExtractorError {
    /// Log level a failure of this kind is reported at.
    ///
    /// Network trouble is routine and stays at debug, a page that no longer
    /// contains what a handler looks for usually means the site changed its
    /// layout, and a payload that fails to decode points at a changed scheme.
    pub fn severity(&self) -> Level {
        match self {
            ExtractorError::HttpError(_)
            | ExtractorError::Status { .. }
            | ExtractorError::Client(_)
            | ExtractorError::PrivilegeRequired => Level::DEBUG,
            ExtractorError::PatternMissing(_)
            | ExtractorError::NoStreamsFound
            | ExtractorError::InvalidUrl(_) => Level::INFO,
            ExtractorError::Decode(_) | ExtractorError::JsonError(_) => Level::WARN,
        }
    }
}
