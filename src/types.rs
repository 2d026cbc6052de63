use derive_more::{Display, From, Into};
use serde::{Deserialize, Deserializer, Serialize};

/// Inventory API user identifier.
///
/// The API emits user ids as integers in token responses and as strings
/// elsewhere; both deserialize into the same opaque string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Display, From, Into)]
#[serde(transparent)]
pub struct UserId(pub String);

impl<'de> Deserialize<'de> for UserId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Text(String),
            Number(i64),
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::Text(s) => Self(s),
            Raw::Number(n) => Self(n.to_string()),
        })
    }
}

impl From<&str> for UserId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// Cellar identifier (UUID string, kept opaque).
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display, From, Into,
)]
#[serde(transparent)]
pub struct CellarId(pub String);

impl CellarId {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for CellarId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// Bottle identifier (UUID string, kept opaque).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Display, From, Into)]
#[serde(transparent)]
pub struct BottleId(pub String);

impl BottleId {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for BottleId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}
