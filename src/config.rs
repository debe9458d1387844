//! Persistence settings, read from the environment or a config file.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::flatten::{Flattener, DEFAULT_EXCLUDED};
use crate::reconstruct::ResolutionStrategy;
use crate::storage::Format;

pub const ENV_FORMAT: &str = "OPTIC_PERSIST_FORMAT";
pub const ENV_STRATEGY: &str = "OPTIC_PERSIST_STRATEGY";
pub const ENV_EXCLUDE: &str = "OPTIC_PERSIST_EXCLUDE";
pub const ENV_PRETTY: &str = "OPTIC_PERSIST_PRETTY";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistConfig {
    /// Document format when the path has no telling extension
    pub format: Format,
    pub strategy: ResolutionStrategy,
    /// Attribute names never written to a structure
    pub excluded: Vec<String>,
    /// Indent JSON output
    pub pretty: bool,
}

impl Default for PersistConfig {
    fn default() -> Self {
        Self {
            format: Format::default(),
            strategy: ResolutionStrategy::default(),
            excluded: DEFAULT_EXCLUDED.iter().map(|s| s.to_string()).collect(),
            pretty: true,
        }
    }
}

impl PersistConfig {
    /// Defaults overridden by `OPTIC_PERSIST_*` variables, `.env` included.
    /// Unparseable values are logged and skipped.
    pub fn from_env() -> Self {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(value) = lookup(ENV_FORMAT) {
            match value.parse() {
                Ok(format) => config.format = format,
                Err(e) => warn!("Ignoring {}: {}", ENV_FORMAT, e),
            }
        }
        if let Some(value) = lookup(ENV_STRATEGY) {
            match value.parse() {
                Ok(strategy) => config.strategy = strategy,
                Err(e) => warn!("Ignoring {}: {}", ENV_STRATEGY, e),
            }
        }
        if let Some(value) = lookup(ENV_EXCLUDE) {
            config.excluded = value
                .split(',')
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .map(str::to_string)
                .collect();
        }
        if let Some(value) = lookup(ENV_PRETTY) {
            match value.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => config.pretty = true,
                "0" | "false" | "no" | "off" => config.pretty = false,
                other => warn!("Ignoring {}: '{}' is not a boolean", ENV_PRETTY, other),
            }
        }
        config
    }

    /// Read a JSON or YAML config file, picked by extension.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config = match Format::from_path(path) {
            Some(Format::Yaml) => serde_yaml::from_str(&content).context("Failed to parse YAML config")?,
            _ => serde_json::from_str(&content).context("Failed to parse JSON config")?,
        };
        Ok(config)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let content = match Format::from_path(path) {
            Some(Format::Yaml) => serde_yaml::to_string(self).context("Failed to serialize config")?,
            _ => serde_json::to_string_pretty(self).context("Failed to serialize config")?,
        };
        std::fs::write(path, content).with_context(|| format!("Failed to write config file {}", path.display()))?;
        Ok(())
    }

    pub fn flattener(&self) -> Flattener {
        Flattener::with_excluded(self.excluded.iter().cloned())
    }
}
