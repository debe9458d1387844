//! Optical System Persistence
//!
//! Saves and restores the object graphs of an optical design toolkit:
//! - Flattening of nested, shared and cyclic graphs into identifier-linked records
//! - A pool of variables (fixed, free, picked up) and the function objects they use
//! - Reconstruction through iterative reference resolution with a bounded sweep count
//! - A class registry mapping record tags onto constructors
//! - JSON and YAML documents

pub mod config;
pub mod entities;
pub mod error;
pub mod expr;
pub mod flatten;
pub mod graph;
pub mod identifier;
pub mod pool;
pub mod reconstruct;
pub mod registry;
pub mod storage;
pub mod utils;

// Re-exports for convenience
pub use config::PersistConfig;
pub use entities::{Entity, EntityKind};
pub use error::{PersistError, Result};
pub use flatten::Flattener;
pub use graph::{Attribute, FunctionObject, ObjectGraph, ObjectId, Persistable, Trust, Variable, VariableId};
pub use identifier::Identifier;
pub use pool::{Flattened, VariablePool};
pub use reconstruct::{Phase, Reconstructed, Reconstructor, ResolutionStrategy};
pub use registry::{ClassRegistry, Constructible};
pub use storage::{load, save, Format, Store};
