//! Identifiers used as the sole cross-reference mechanism of the flattened form.

use std::fmt;
use std::str::FromStr;

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::PersistError;

lazy_static! {
    /// Canonical hyphenated 8-4-4-4-12 form. Braced, URN and simple forms are
    /// ordinary strings as far as the engine is concerned.
    static ref CANONICAL_UUID: Regex = Regex::new(
        r"^[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}$"
    )
    .expect("canonical uuid pattern compiles");
}

/// A 128-bit random token referencing a record, variable or function object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Identifier(Uuid);

impl Identifier {
    /// Mint a fresh random identifier.
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse `text` if, and only if, it is in canonical form.
    pub fn parse(text: &str) -> Option<Self> {
        if !CANONICAL_UUID.is_match(text) {
            return None;
        }
        Uuid::parse_str(text).ok().map(Self)
    }

    /// Interpret a structure value as a reference.
    pub fn from_value(value: &Value) -> Option<Self> {
        value.as_str().and_then(Self::parse)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }

    pub fn to_value(self) -> Value {
        Value::String(self.to_string())
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

impl FromStr for Identifier {
    type Err = PersistError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| PersistError::malformed(format!("'{s}' is not a canonical identifier")))
    }
}

// Pool keys go through here too, so a non-canonical key is rejected on read.
impl<'de> Deserialize<'de> for Identifier {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Self::parse(&text)
            .ok_or_else(|| serde::de::Error::custom(format!("'{text}' is not a canonical identifier")))
    }
}

impl From<Uuid> for Identifier {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}
