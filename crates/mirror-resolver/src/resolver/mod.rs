//! Concurrent fan-out of one episode's mirrors to their handlers.
//!
//! A request goes through dedup, dispatch and collect. Every routable mirror
//! gets its own task on a [`JoinSet`]; all tasks share one pooled client and
//! a semaphore bounds how many handler calls run at once. Results are taken
//! in completion order and the report is only returned once every task has
//! finished. Dropping the future aborts whatever is still running.

use std::sync::Arc;

use reqwest::Client;
use rustc_hash::FxHashSet;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info};

use crate::config::ResolverConfig;
use crate::extractor::default::create_client;
use crate::extractor::error::ExtractorError;
use crate::extractor::handler::ResolveContext;
use crate::extractor::registry::{ProviderDescriptor, ProviderRegistry, normalize_locator};
use crate::media::{MirrorEntry, ResolvedStream};

/// Outcome of one resolution request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolutionReport {
    /// Resolved streams in completion order
    pub streams: Vec<ResolvedStream>,
    /// Handler tasks dispatched
    pub attempted: usize,
    /// Dispatched tasks that produced nothing, panics included
    pub failed: usize,
    /// Entries no descriptor accepted
    pub unroutable: usize,
    /// Entries dropped as repeats of an earlier locator
    pub duplicates: usize,
}

impl ResolutionReport {
    pub fn resolved(&self) -> usize {
        self.streams.len()
    }
}

pub struct Resolver {
    registry: ProviderRegistry,
    config: ResolverConfig,
}

impl Resolver {
    pub fn new(registry: ProviderRegistry, config: ResolverConfig) -> Self {
        Self { registry, config }
    }

    /// Resolver over the built-in providers.
    pub fn from_config(config: ResolverConfig) -> Self {
        let registry = ProviderRegistry::builtin(&config.providers);
        Self::new(registry, config)
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Resolves `entries` with a client built for this request alone.
    ///
    /// The client is only built once something is routable and is dropped,
    /// closing its pool, before this returns.
    pub async fn resolve(
        &self,
        entries: &[MirrorEntry],
        privileged: bool,
    ) -> Result<ResolutionReport, ExtractorError> {
        let (dispatch, report) = self.plan(entries);
        if dispatch.is_empty() {
            debug!(unroutable = report.unroutable, "nothing to dispatch");
            return Ok(report);
        }
        let client = create_client(&self.config)?;
        Ok(self.dispatch(client, dispatch, report, privileged).await)
    }

    /// Resolves `entries` over a caller-owned client.
    pub async fn resolve_with_client(
        &self,
        client: Client,
        entries: &[MirrorEntry],
        privileged: bool,
    ) -> ResolutionReport {
        let (dispatch, report) = self.plan(entries);
        self.dispatch(client, dispatch, report, privileged).await
    }

    /// Dedup and routing. Returns the entries to dispatch with their
    /// descriptors and a report carrying the duplicate and unroutable counts.
    fn plan(&self, entries: &[MirrorEntry]) -> (Vec<Dispatch>, ResolutionReport) {
        let unique = dedup(entries);
        let mut report = ResolutionReport {
            duplicates: entries.len() - unique.len(),
            ..Default::default()
        };

        let mut dispatch = Vec::with_capacity(unique.len());
        for entry in unique {
            match self.registry.route(&entry) {
                Some(descriptor) => dispatch.push((entry, descriptor)),
                None => report.unroutable += 1,
            }
        }
        (dispatch, report)
    }

    async fn dispatch(
        &self,
        client: Client,
        dispatch: Vec<Dispatch>,
        mut report: ResolutionReport,
        privileged: bool,
    ) -> ResolutionReport {
        let ctx = Arc::new(ResolveContext::new(client, &self.config, privileged));
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent.max(1)));
        let mut tasks = JoinSet::new();

        for (entry, descriptor) in dispatch {
            let ctx = Arc::clone(&ctx);
            let semaphore = Arc::clone(&semaphore);
            report.attempted += 1;
            tasks.spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok()?;
                let locator = normalize_locator(&entry.locator);
                debug!(provider = %descriptor.name, %locator, "dispatching");
                descriptor
                    .invoke(&ctx, &locator)
                    .await
                    .into_media()
                    .map(|media| ResolvedStream::new(media, &descriptor.name, &entry))
            });
        }
        // tasks hold the only remaining references to the client
        drop(ctx);

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Some(stream)) => report.streams.push(stream),
                Ok(None) => report.failed += 1,
                Err(e) => {
                    error!("handler task failed: {e}");
                    report.failed += 1;
                }
            }
        }

        info!(
            attempted = report.attempted,
            resolved = report.resolved(),
            failed = report.failed,
            unroutable = report.unroutable,
            duplicates = report.duplicates,
            "resolution finished"
        );
        report
    }
}

type Dispatch = (MirrorEntry, Arc<ProviderDescriptor>);

/// Drops entries whose locator was already seen verbatim, keeping the first.
pub fn dedup(entries: &[MirrorEntry]) -> Vec<MirrorEntry> {
    let mut seen = FxHashSet::default();
    entries
        .iter()
        .filter(|entry| seen.insert(entry.locator.as_str()))
        .cloned()
        .collect()
}
