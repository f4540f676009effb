use thiserror::Error;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("Configuration error: {0}")]
    Config(#[from] anyhow::Error),

    #[error("Invalid resolver configuration: {0}")]
    ResolverConfig(#[from] mirror_resolver::config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Extractor error: {0}")]
    Extractor(#[from] mirror_resolver::ExtractorError),

    #[error("Proxy token error: {0}")]
    Proxy(#[from] mirror_resolver::ProxyError),

    #[error("{0}")]
    Service(#[from] mirror_resolver::ServiceError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("No streams could be resolved")]
    NoStreamsAvailable,
}

impl CliError {
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, CliError>;
