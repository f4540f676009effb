//! Glue between the external collaborators and the resolution core.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use thiserror::Error;
use tracing::{debug, warn};

use crate::assembler::{EpisodeMeta, StreamAssembler};
use crate::extractor::error::ExtractorError;
use crate::media::{MirrorEntry, StreamsResponse};
use crate::resolver::Resolver;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("invalid content id: {0}")]
    InvalidContentId(String),
    #[error("catalog error: {0}")]
    Catalog(String),
    #[error("metadata error: {0}")]
    Metadata(String),
    #[error(transparent)]
    Extractor(#[from] ExtractorError),
}

/// `prefix:id:episode`, e.g. `mal:21:1000`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContentId {
    pub prefix: String,
    pub id: String,
    pub episode: u32,
}

impl FromStr for ContentId {
    type Err = ServiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ServiceError::InvalidContentId(s.to_string());
        let mut parts = s.trim().split(':');
        let (Some(prefix), Some(id), Some(episode), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(invalid());
        };
        if prefix.is_empty() || id.is_empty() {
            return Err(invalid());
        }
        Ok(Self {
            prefix: prefix.to_string(),
            id: id.to_string(),
            episode: episode.parse().map_err(|_| invalid())?,
        })
    }
}

impl fmt::Display for ContentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.prefix, self.id, self.episode)
    }
}

/// Episode listing: the mirrors offered for one episode.
#[async_trait]
pub trait MirrorCatalog: Send + Sync {
    async fn mirrors(&self, content: &ContentId) -> Result<Vec<MirrorEntry>, ServiceError>;
}

/// Maps a content id to a display name.
#[async_trait]
pub trait MetadataSource: Send + Sync {
    async fn anime_name(&self, content: &ContentId) -> Result<Option<String>, ServiceError>;
}

pub struct StreamService {
    resolver: Resolver,
    assembler: StreamAssembler,
    catalog: Arc<dyn MirrorCatalog>,
    metadata: Arc<dyn MetadataSource>,
    // shared client instead of one built per request
    client: Option<Client>,
}

impl StreamService {
    pub fn new(
        resolver: Resolver,
        catalog: Arc<dyn MirrorCatalog>,
        metadata: Arc<dyn MetadataSource>,
    ) -> Self {
        Self {
            resolver,
            assembler: StreamAssembler::new(),
            catalog,
            metadata,
            client: None,
        }
    }

    /// Opts out of the per-request pool: every request reuses `client` and
    /// its connections outlive the request. Meant for embedders that manage
    /// their own client, and for tests.
    pub fn with_client(mut self, client: Client) -> Self {
        self.client = Some(client);
        self
    }

    pub fn resolver(&self) -> &Resolver {
        &self.resolver
    }

    /// Resolves every mirror of an episode into ranked stream records.
    ///
    /// Provider failures only shorten the list. A metadata failure falls
    /// back to the content id in filenames.
    pub async fn streams_for_episode(
        &self,
        content_id: &str,
        privileged: bool,
    ) -> Result<StreamsResponse, ServiceError> {
        let content: ContentId = content_id.parse()?;

        let (entries, name) = tokio::join!(
            self.catalog.mirrors(&content),
            self.metadata.anime_name(&content)
        );
        let entries = entries?;
        let name = name.unwrap_or_else(|e| {
            warn!(%content, "metadata lookup failed: {e}");
            None
        });
        debug!(%content, mirrors = entries.len(), "resolving episode");

        let report = match &self.client {
            Some(client) => {
                self.resolver
                    .resolve_with_client(client.clone(), &entries, privileged)
                    .await
            }
            None => self.resolver.resolve(&entries, privileged).await?,
        };
        let meta = EpisodeMeta::new(content.to_string(), name, content.episode);
        Ok(StreamsResponse {
            streams: self.assembler.assemble(report.streams, &meta),
        })
    }
}
