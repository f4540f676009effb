//! Base64 variants used by hosting sites: URL-safe alphabets with sloppy
//! padding, permuted 64-character alphabets and multi-part key fragments.

use base64::Engine;
use base64::alphabet::{self, Alphabet};
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};

use super::error::DecodeError;

const LENIENT: GeneralPurposeConfig = GeneralPurposeConfig::new()
    .with_decode_padding_mode(DecodePaddingMode::Indifferent)
    .with_decode_allow_trailing_bits(true);

const URL_SAFE_LENIENT: GeneralPurpose = GeneralPurpose::new(&alphabet::URL_SAFE, LENIENT);
const STANDARD_LENIENT: GeneralPurpose = GeneralPurpose::new(&alphabet::STANDARD, LENIENT);

/// How `=` padding is treated while decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PaddingRule {
    /// Input must be padded to a multiple of four.
    Required,
    /// Padding may be present or absent.
    #[default]
    Optional,
    /// Input must not carry any padding.
    Forbidden,
}

impl From<PaddingRule> for DecodePaddingMode {
    fn from(rule: PaddingRule) -> Self {
        match rule {
            PaddingRule::Required => DecodePaddingMode::RequireCanonical,
            PaddingRule::Optional => DecodePaddingMode::Indifferent,
            PaddingRule::Forbidden => DecodePaddingMode::RequireNone,
        }
    }
}

/// Decodes `input` using a caller supplied 64 character alphabet.
pub fn decode_with_alphabet(
    input: &str,
    alphabet: &str,
    padding: PaddingRule,
) -> Result<Vec<u8>, DecodeError> {
    let alphabet =
        Alphabet::new(alphabet).map_err(|e| DecodeError::InvalidAlphabet(e.to_string()))?;
    let config = GeneralPurposeConfig::new()
        .with_decode_padding_mode(padding.into())
        .with_decode_allow_trailing_bits(true);
    let engine = GeneralPurpose::new(&alphabet, config);
    Ok(engine.decode(input.trim())?)
}

/// Decodes URL-safe base64 that may also use `+`/`/` and may or may not be padded.
pub fn decode_url_safe(input: &str) -> Result<Vec<u8>, DecodeError> {
    let normalized: String = input
        .trim()
        .chars()
        .map(|c| match c {
            '+' => '-',
            '/' => '_',
            other => other,
        })
        .collect();
    Ok(URL_SAFE_LENIENT.decode(normalized)?)
}

/// Decodes standard base64, tolerating missing padding.
pub fn decode_standard(input: &str) -> Result<Vec<u8>, DecodeError> {
    Ok(STANDARD_LENIENT.decode(input.trim())?)
}

/// Decodes every fragment with [`decode_url_safe`] and concatenates the bytes.
pub fn join_decoded<S: AsRef<str>>(parts: &[S]) -> Result<Vec<u8>, DecodeError> {
    let mut joined = Vec::new();
    for part in parts {
        joined.extend(decode_url_safe(part.as_ref())?);
    }
    Ok(joined)
}

/// Encodes bytes as padded URL-safe base64.
pub fn encode_url_safe(input: &[u8]) -> String {
    base64::engine::general_purpose::URL_SAFE.encode(input)
}
