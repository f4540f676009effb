use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

static DIMENSIONS_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)\s*[xX×]\s*(\d+)").unwrap());
static DIGITS_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\d+)").unwrap());

/// Vertical resolution of a stream, rendered as `"{height}p"` or `"unknown"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Quality {
    Height(u32),
    #[default]
    Unknown,
}

impl Quality {
    pub fn from_height(height: u32) -> Self {
        if height == 0 {
            Quality::Unknown
        } else {
            Quality::Height(height)
        }
    }

    /// Normalizes labels such as `"1920x1080 2311 kbps"`, `"720p"` or `"1080"`.
    pub fn from_label(label: &str) -> Self {
        if let Some(caps) = DIMENSIONS_REGEX.captures(label) {
            return caps[2].parse().map(Self::from_height).unwrap_or_default();
        }
        DIGITS_REGEX
            .captures(label)
            .and_then(|caps| caps[1].parse().ok())
            .map(Self::from_height)
            .unwrap_or_default()
    }

    pub fn height(&self) -> Option<u32> {
        match self {
            Quality::Height(height) => Some(*height),
            Quality::Unknown => None,
        }
    }

    pub fn is_known(&self) -> bool {
        matches!(self, Quality::Height(_))
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Quality::Height(height) => write!(f, "{height}p"),
            Quality::Unknown => write!(f, "unknown"),
        }
    }
}

impl FromStr for Quality {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from_label(s))
    }
}

impl Serialize for Quality {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Quality {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::from_label(&raw))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_label() {
        assert_eq!(Quality::from_label("1920x1080 2311 kbps"), Quality::Height(1080));
        assert_eq!(Quality::from_label("720p"), Quality::Height(720));
        assert_eq!(Quality::from_label("480"), Quality::Height(480));
        assert_eq!(Quality::from_label("HD"), Quality::Unknown);
        assert_eq!(Quality::from_label("0"), Quality::Unknown);
        assert_eq!(Quality::from_label(""), Quality::Unknown);
    }

    #[test]
    fn test_display() {
        assert_eq!(Quality::Height(1080).to_string(), "1080p");
        assert_eq!(Quality::Unknown.to_string(), "unknown");
    }

    #[test]
    fn test_serde_as_string() {
        assert_eq!(serde_json::to_string(&Quality::Height(720)).unwrap(), "\"720p\"");
        let parsed: Quality = serde_json::from_str("\"unknown\"").unwrap();
        assert_eq!(parsed, Quality::Unknown);
    }
}
