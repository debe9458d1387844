//! Storage - JSON and YAML documents holding a flattened graph
//!
//! Writes go to a temporary file next to the target which is then renamed
//! over it, so an interrupted save never leaves a truncated document.

use std::fmt;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::config::PersistConfig;
use crate::error::{PersistError, Result};
use crate::flatten::Flattener;
use crate::graph::{ObjectGraph, ObjectId, Trust};
use crate::pool::Flattened;
use crate::reconstruct::{Reconstructed, Reconstructor, ResolutionStrategy};
use crate::registry::{ClassRegistry, Constructor};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    #[default]
    Json,
    Yaml,
}

impl Format {
    /// Guess the format from a file extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()?.to_ascii_lowercase().as_str() {
            "json" => Some(Format::Json),
            "yaml" | "yml" => Some(Format::Yaml),
            _ => None,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Format::Json => "json",
            Format::Yaml => "yaml",
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for Format {
    type Err = PersistError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(Format::Json),
            "yaml" | "yml" => Ok(Format::Yaml),
            other => Err(PersistError::malformed(format!("unknown format '{other}'"))),
        }
    }
}

/// Render a flattened graph as a document.
pub fn to_string(flattened: &Flattened, format: Format, pretty: bool) -> Result<String> {
    Ok(match (format, pretty) {
        (Format::Json, true) => serde_json::to_string_pretty(flattened)?,
        (Format::Json, false) => serde_json::to_string(flattened)?,
        (Format::Yaml, _) => serde_yaml::to_string(flattened)?,
    })
}

pub fn from_str(text: &str, format: Format) -> Result<Flattened> {
    Ok(match format {
        Format::Json => serde_json::from_str(text)?,
        Format::Yaml => serde_yaml::from_str(text)?,
    })
}

/// Atomically write `flattened` to `path`.
pub fn write(flattened: &Flattened, path: &Path, format: Format, pretty: bool) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let mut temp = NamedTempFile::new_in(&dir).map_err(|e| PersistError::io(&dir, e))?;
    {
        let mut writer = BufWriter::new(temp.as_file_mut());
        match (format, pretty) {
            (Format::Json, true) => serde_json::to_writer_pretty(&mut writer, flattened)?,
            (Format::Json, false) => serde_json::to_writer(&mut writer, flattened)?,
            (Format::Yaml, _) => serde_yaml::to_writer(&mut writer, flattened)?,
        }
        writer.flush().map_err(|e| PersistError::io(path, e))?;
    }
    temp.persist(path).map_err(|e| PersistError::io(path, e.error))?;
    debug!("Wrote {} document to {}", format, path.display());
    Ok(())
}

pub fn read(path: &Path, format: Format) -> Result<Flattened> {
    let file = File::open(path).map_err(|e| PersistError::io(path, e))?;
    let reader = BufReader::new(file);
    Ok(match format {
        Format::Json => serde_json::from_reader(reader)?,
        Format::Yaml => serde_yaml::from_reader(reader)?,
    })
}

/// Flatten everything reachable from `root` and write it to `path`.
pub fn save(graph: &ObjectGraph, root: ObjectId, path: impl AsRef<Path>, format: Format) -> Result<Flattened> {
    let path = path.as_ref();
    let flattened = Flattener::default().flatten(graph, root)?;
    write(&flattened, path, format, true)?;
    info!("Saved '{}' to {}", flattened.root.name, path.display());
    Ok(flattened)
}

/// Read `path` and rebuild the graph with the built-in classes plus
/// `register_classes`.
///
/// Function objects in the document are compiled only when both
/// `source_checked` and `variables_checked` are set.
pub fn load<I>(
    path: impl AsRef<Path>,
    format: Format,
    source_checked: bool,
    variables_checked: bool,
    register_classes: I,
) -> Result<Reconstructed>
where
    I: IntoIterator<Item = (String, Constructor)>,
{
    let mut registry = ClassRegistry::with_builtins();
    registry.extend(register_classes);
    load_with(
        path.as_ref(),
        format,
        Trust::new(source_checked, variables_checked),
        &registry,
        ResolutionStrategy::default(),
    )
}

pub fn load_with(
    path: &Path,
    format: Format,
    trust: Trust,
    registry: &ClassRegistry,
    strategy: ResolutionStrategy,
) -> Result<Reconstructed> {
    let flattened = read(path, format)?;
    let rebuilt = Reconstructor::new(registry, trust).with_strategy(strategy).reconstruct(&flattened)?;
    info!("Loaded '{}' from {}", flattened.root.name, path.display());
    Ok(rebuilt)
}

/// A document location plus the settings and classes used to read and write it.
#[derive(Debug, Clone)]
pub struct Store {
    path: PathBuf,
    config: PersistConfig,
    registry: ClassRegistry,
}

impl Store {
    pub fn new(path: impl Into<PathBuf>, config: PersistConfig) -> Self {
        Self { path: path.into(), config, registry: ClassRegistry::with_builtins() }
    }

    pub fn with_registry(mut self, registry: ClassRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn registry_mut(&mut self) -> &mut ClassRegistry {
        &mut self.registry
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn config(&self) -> &PersistConfig {
        &self.config
    }

    /// The file extension wins over the configured format.
    pub fn format(&self) -> Format {
        Format::from_path(&self.path).unwrap_or(self.config.format)
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    pub fn save(&self, graph: &ObjectGraph, root: ObjectId) -> Result<Flattened> {
        let flattened = self.config.flattener().flatten(graph, root)?;
        write(&flattened, &self.path, self.format(), self.config.pretty)?;
        info!("Saved '{}' to {}", flattened.root.name, self.path.display());
        Ok(flattened)
    }

    pub fn load(&self, trust: Trust) -> Result<Reconstructed> {
        load_with(&self.path, self.format(), trust, &self.registry, self.config.strategy)
    }
}
