use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::graph::{FunctionObject, Trust};
use crate::identifier::Identifier;

/// Persisted form of a [`FunctionObject`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionRecord {
    pub unique_id: Identifier,
    pub name: String,
    pub source: String,
    #[serde(default)]
    pub globals: BTreeMap<String, f64>,
    /// Names of the functions the source is expected to define.
    #[serde(default)]
    pub functions: Vec<String>,
}

pub type FunctionPoolData = BTreeMap<Identifier, FunctionRecord>;

impl FunctionRecord {
    pub fn from_live(unique_id: Identifier, function: &FunctionObject) -> Self {
        Self {
            unique_id,
            name: function.name().to_string(),
            source: function.source().to_string(),
            globals: function.globals().clone(),
            functions: function.exported().to_vec(),
        }
    }

    pub fn compile(&self, trust: Trust) -> Result<FunctionObject> {
        FunctionObject::from_persisted(
            self.name.clone(),
            self.source.clone(),
            self.globals.clone(),
            self.functions.clone(),
            trust,
        )
    }
}
