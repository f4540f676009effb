//! Turns resolved streams into ranked catalog records.

use serde::{Deserialize, Serialize};

use crate::media::{BehaviorHints, ProxyHeaders, ResolvedStream, StreamRecord};

/// Rank of providers without an entry in the priority table.
pub const DEFAULT_PRIORITY: u32 = 10;

/// Rank of machine-translated tracks, whatever their provider.
pub const AI_PRIORITY: u32 = 100;

const AI_TRANSLATOR: &str = "ai";

static PROVIDER_PRIORITY: &[(&str, u32)] = &[
    ("cda", 0),
    ("lycoris", 1),
    ("okru", 2),
    ("pixeldrain", 3),
    ("sibnet", 4),
    ("uqload", 5),
];

/// Episode metadata from the metadata collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpisodeMeta {
    /// `prefix:id:episode` id the catalog client asked for
    pub content_id: String,
    pub anime_name: Option<String>,
    pub episode: u32,
}

impl EpisodeMeta {
    pub fn new<S: Into<String>>(content_id: S, anime_name: Option<String>, episode: u32) -> Self {
        Self {
            content_id: content_id.into(),
            anime_name,
            episode,
        }
    }

    /// Anime name usable in filenames, or the content id when the name is
    /// unknown.
    fn title_key(&self) -> String {
        match self.anime_name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => strip_separators(name),
            _ => strip_separators(&self.content_id),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct StreamAssembler;

impl StreamAssembler {
    pub fn new() -> Self {
        Self
    }

    pub fn priority(stream: &ResolvedStream) -> u32 {
        if stream.translator_title.trim().eq_ignore_ascii_case(AI_TRANSLATOR) {
            return AI_PRIORITY;
        }
        PROVIDER_PRIORITY
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(&stream.provider_label))
            .map(|(_, priority)| *priority)
            .unwrap_or(DEFAULT_PRIORITY)
    }

    pub fn record(&self, stream: ResolvedStream, meta: &EpisodeMeta) -> StreamRecord {
        let priority = Self::priority(&stream);
        let quality = stream.quality.to_string();
        let title = meta.title_key();
        let translator = strip_separators(&stream.translator_title.to_lowercase());

        let proxy_headers = if stream.request_headers.is_some() || stream.response_headers.is_some()
        {
            Some(ProxyHeaders {
                request: stream.request_headers,
                response: stream.response_headers,
            })
        } else {
            None
        };

        StreamRecord {
            description: format!(
                "{} [{quality}]\n{}",
                stream.provider_label, stream.translator_title
            ),
            url: stream.url,
            behavior_hints: BehaviorHints {
                filename: format!("{title}_{:02}_{quality}_{translator}.mp4", meta.episode),
                binge_group: format!("{title}-{}-{quality}-{translator}", stream.provider_label),
                not_web_ready: proxy_headers.as_ref().map(|_| true),
                proxy_headers,
            },
            name: quality,
            priority,
        }
    }

    /// Builds one record per stream, ordered by ascending priority. Streams
    /// of equal priority keep their arrival order.
    pub fn assemble(&self, streams: Vec<ResolvedStream>, meta: &EpisodeMeta) -> Vec<StreamRecord> {
        let mut records: Vec<_> = streams
            .into_iter()
            .map(|stream| self.record(stream, meta))
            .collect();
        records.sort_by_key(|record| record.priority);
        records
    }
}

fn strip_separators(value: &str) -> String {
    value
        .chars()
        .filter(|c| !matches!(c, ' ' | ':' | '/'))
        .collect()
}
