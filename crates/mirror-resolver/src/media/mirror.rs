use serde::{Deserialize, Deserializer, Serialize};

/// One hosting mirror of one episode, as produced by the episode listing.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct MirrorEntry {
    // player page, e.g. "https://filemoon.sx/e/abc123"
    #[serde(rename = "player")]
    pub locator: String,
    // hosting label reported by the listing, e.g. "Filemoon", "cda"
    #[serde(rename = "player_hosting", default)]
    pub provider_label: String,
    #[serde(default)]
    pub translator_title: String,
    #[serde(
        rename = "isInverted",
        default,
        deserialize_with = "deserialize_flag",
        serialize_with = "serialize_flag"
    )]
    pub inverted: bool,
}

impl MirrorEntry {
    pub fn new<S1, S2, S3>(locator: S1, provider_label: S2, translator_title: S3) -> Self
    where
        S1: Into<String>,
        S2: Into<String>,
        S3: Into<String>,
    {
        Self {
            locator: locator.into(),
            provider_label: provider_label.into(),
            translator_title: translator_title.into(),
            inverted: false,
        }
    }

    pub fn inverted(mut self, inverted: bool) -> Self {
        self.inverted = inverted;
        self
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Flag {
    Bool(bool),
    Text(String),
}

fn deserialize_flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Flag>::deserialize(deserializer)? {
        Some(Flag::Bool(value)) => Ok(value),
        Some(Flag::Text(value)) => Ok(value.trim().eq_ignore_ascii_case("true")),
        None => Ok(false),
    }
}

fn serialize_flag<S>(value: &bool, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_str(if *value { "true" } else { "false" })
}
