//! # Mirror Resolver
//!
//! Resolves direct, playable media URLs from third-party mirror pages.
//!
//! ## Features
//!
//! - Static provider registry with domain, alias and fallback dispatch
//! - Concurrent fan-out over a shared, bounded HTTP connection pool
//! - Decoding toolkit: packed-script unpacking, custom base64 alphabets,
//!   AES-CBC and AES-GCM payload decryption, HLS resolution sniffing
//! - Priority-ranked stream assembly for catalog clients
//! - Signed edge proxy URLs for IP-bound manifests

pub mod assembler;
pub mod config;
pub mod decoding;
pub mod extractor;
pub mod media;
pub mod proxy;
pub mod resolver;
pub mod service;

pub use assembler::{EpisodeMeta, StreamAssembler};
pub use config::ResolverConfig;
pub use extractor::error::ExtractorError;
pub use extractor::registry::{ProviderDescriptor, ProviderRegistry};
pub use media::{MirrorEntry, Quality, ResolvedStream, StreamRecord, StreamsResponse};
pub use proxy::{ProxyError, ProxySigner, Relay};
pub use resolver::{ResolutionReport, Resolver};
pub use service::{ContentId, MetadataSource, MirrorCatalog, ServiceError, StreamService};
