//! Error types for flattening, reconstruction and storage.

use std::path::PathBuf;

use thiserror::Error;

use crate::expr::ExprError;
use crate::identifier::Identifier;
use crate::reconstruct::PartialReconstruction;

/// Everything that can go wrong between a live graph and its persisted form.
#[derive(Debug, Error)]
pub enum PersistError {
    /// The payload is structurally broken (bad pool reference, key mismatch, ...).
    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    /// No constructor is registered for a record's tag.
    #[error("unknown tag '{tag}'{}", .record.map(|id| format!(" on record {id}")).unwrap_or_default())]
    UnknownTag {
        tag: String,
        record: Option<Identifier>,
    },

    /// A structure mapping names an identifier that no pool contains.
    #[error("record {record} references {reference}, which is neither a record nor a variable")]
    DanglingReference {
        record: Identifier,
        reference: Identifier,
    },

    /// The same identifier keys more than one pool.
    #[error("identifier {0} is used by more than one pool")]
    IdentifierCollision(Identifier),

    /// Function objects were present but the caller did not vouch for them.
    #[error(
        "refusing to compile {count} function object(s) without attestation \
         (source_checked={source_checked}, variables_checked={variables_checked})"
    )]
    UntrustedSource {
        count: usize,
        source_checked: bool,
        variables_checked: bool,
    },

    /// Identifiers remained after the resolution sweeps ran out.
    #[error(
        "gave up after {} sweep(s): {} record(s) still hold unresolved references",
        .0.sweeps,
        .0.unresolved.len()
    )]
    UnresolvedCycle(Box<PartialReconstruction>),

    /// A registered constructor rejected its input.
    #[error("constructing '{kind}' for record {record} failed: {source}")]
    Construction {
        kind: String,
        record: Identifier,
        #[source]
        source: Box<PersistError>,
    },

    /// A constructor found a required attribute missing or of the wrong shape.
    #[error("invalid attribute '{attribute}' for '{kind}': {reason}")]
    InvalidAttribute {
        kind: String,
        attribute: String,
        reason: String,
    },

    #[error("expression error: {0}")]
    Expression(#[from] ExprError),

    #[error("evaluation failed: {0}")]
    Evaluation(String),

    /// A handle does not belong to the graph it was used with.
    #[error("handle {0} is not part of this graph")]
    MissingObject(String),

    #[error("I/O failure on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl PersistError {
    pub(crate) fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedPayload(message.into())
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// The partially rebuilt graph, if this is a give-up report.
    pub fn partial(&self) -> Option<&PartialReconstruction> {
        match self {
            Self::UnresolvedCycle(partial) => Some(partial),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, PersistError>;
