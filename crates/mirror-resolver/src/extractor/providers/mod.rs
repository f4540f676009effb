//! One module per hosting site.
//!
//! Every module exposes its `DOMAINS` for the registry table and a unit
//! struct implementing [`StreamHandler`](super::handler::StreamHandler).

use std::borrow::Cow;
use std::sync::LazyLock;

use regex::Regex;

use super::error::ExtractorError;
use crate::decoding::packer;
use crate::media::Quality;

pub mod bigwarp;
pub mod buzz;
pub mod cda;
pub mod dailymotion;
pub mod default;
pub mod dood;
pub mod f16px;
pub mod filemoon;
pub mod gdrive;
pub mod lulustream;
pub mod lycoris;
pub mod mp4upload;
pub mod okru;
pub mod pixeldrain;
pub mod rumble;
pub mod savefiles;
pub mod sibnet;
pub mod streamtape;
pub mod streamup;
pub mod turbovid;
pub mod upn;
pub mod uqload;
pub mod vidnest;
pub mod vidtube;
pub mod vk;
pub mod voe;

/// `sources:[{file:"..."` of a jwplayer setup block.
pub(crate) static JW_SOURCE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"sources\s*:\s*\[\s*\{\s*file\s*:\s*"([^"]+)""#).unwrap());

static SOURCES_BLOCK_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)sources\s*:\s*\[\s*\{(.*?)\}\s*\]").unwrap());
static FILE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)file\s*:\s*"([^"]+)""#).unwrap());
static LABEL_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)label\s*:\s*"([^"]+)""#).unwrap());

/// `file` and labelled quality of the first entry of a jwplayer
/// `sources: [{...}]` block.
pub(crate) fn jw_source(script: &str) -> Option<(&str, Quality)> {
    let body = SOURCES_BLOCK_REGEX.captures(script)?.get(1)?.as_str();
    let file = FILE_REGEX.captures(body)?.get(1)?.as_str();
    let quality = LABEL_REGEX
        .captures(body)
        .map(|label| Quality::from_label(&label[1]))
        .unwrap_or_default();
    Some((file, quality))
}

/// First capture group of `regex` in `haystack`.
pub(crate) fn capture<'h>(
    regex: &Regex,
    haystack: &'h str,
    what: &'static str,
) -> Result<&'h str, ExtractorError> {
    regex
        .captures(haystack)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
        .ok_or(ExtractorError::PatternMissing(what))
}

/// Unpacks the page's packed player script if it has one.
pub(crate) fn unpack_if_packed(html: &str) -> Result<Cow<'_, str>, ExtractorError> {
    if packer::detect(html) {
        Ok(Cow::Owned(packer::unpack(html)?))
    } else {
        Ok(Cow::Borrowed(html))
    }
}
