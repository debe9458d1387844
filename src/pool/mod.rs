//! Flattened representation
//!
//! A flattened graph is four independent artifacts: the root record, the
//! pool of every other composite record, the variable pool and the
//! function-object pool. Identifiers are the only links between them.

pub mod functions;
pub mod variables;

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::graph::Annotations;
use crate::identifier::Identifier;

pub use functions::{FunctionPoolData, FunctionRecord};
pub use variables::{StateRecord, TransformRecord, VariablePool, VariablePoolData, VariableRecord};

/// One composite object with every reference replaced by an identifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructureRecord {
    pub unique_id: Identifier,
    pub kind: String,
    pub name: String,
    #[serde(default)]
    pub annotations: Annotations,
    #[serde(default)]
    pub structure: BTreeMap<String, Value>,
}

pub type RecordsPool = BTreeMap<Identifier, StructureRecord>;

impl StructureRecord {
    /// Every identifier mentioned in the structure, depth-first in attribute
    /// order. Repeats are kept.
    pub fn references(&self) -> Vec<Identifier> {
        let mut out = Vec::new();
        for value in self.structure.values() {
            collect_identifiers(value, &mut out);
        }
        out
    }
}

pub(crate) fn collect_identifiers(value: &Value, out: &mut Vec<Identifier>) {
    match value {
        Value::String(_) => out.extend(Identifier::from_value(value)),
        Value::Array(items) => items.iter().for_each(|item| collect_identifiers(item, out)),
        Value::Object(entries) => entries.values().for_each(|item| collect_identifiers(item, out)),
        _ => {}
    }
}

/// Output of a flatten run, persisted as `[root, records, variables, functions]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "FlattenedRepr", into = "FlattenedRepr")]
pub struct Flattened {
    pub root: StructureRecord,
    pub records: RecordsPool,
    pub variables: VariablePoolData,
    pub functions: FunctionPoolData,
}

#[derive(Serialize, Deserialize)]
struct FlattenedRepr(StructureRecord, RecordsPool, VariablePoolData, FunctionPoolData);

impl From<FlattenedRepr> for Flattened {
    fn from(FlattenedRepr(root, records, variables, functions): FlattenedRepr) -> Self {
        Self { root, records, variables, functions }
    }
}

impl From<Flattened> for FlattenedRepr {
    fn from(flattened: Flattened) -> Self {
        FlattenedRepr(flattened.root, flattened.records, flattened.variables, flattened.functions)
    }
}

impl Flattened {
    pub fn identifier_count(&self) -> usize {
        1 + self.records.len() + self.variables.len() + self.functions.len()
    }

    /// Identifier-free rendering of the graph shape.
    ///
    /// Entries appear in first-visit order starting at the root, and every
    /// identifier is replaced by `@n`, the position of the entry it names.
    /// Two runs over the same graph yield equal canonical forms.
    pub fn canonical(&self) -> Value {
        let mut labeler = Labeler { flattened: self, labels: HashMap::new(), order: Vec::new() };
        labeler.visit(self.root.unique_id);
        // unreachable pool entries, in pool order
        let leftovers: Vec<Identifier> = self
            .records
            .keys()
            .chain(self.variables.keys())
            .chain(self.functions.keys())
            .copied()
            .collect();
        for id in leftovers {
            labeler.visit(id);
        }
        Value::Array(labeler.order.iter().map(|id| labeler.render(*id)).collect())
    }

    fn record(&self, id: Identifier) -> Option<&StructureRecord> {
        if id == self.root.unique_id {
            Some(&self.root)
        } else {
            self.records.get(&id)
        }
    }
}

struct Labeler<'a> {
    flattened: &'a Flattened,
    labels: HashMap<Identifier, usize>,
    order: Vec<Identifier>,
}

impl Labeler<'_> {
    fn visit(&mut self, id: Identifier) {
        if self.labels.contains_key(&id) {
            return;
        }
        self.labels.insert(id, self.order.len());
        self.order.push(id);
        let references = if let Some(record) = self.flattened.record(id) {
            record.references()
        } else if let Some(variable) = self.flattened.variables.get(&id) {
            variable.references()
        } else {
            Vec::new()
        };
        for reference in references {
            self.visit(reference);
        }
    }

    fn relabel(&self, value: &Value) -> Value {
        match value {
            Value::String(_) => match Identifier::from_value(value).and_then(|id| self.labels.get(&id)) {
                Some(label) => Value::String(format!("@{label}")),
                None => value.clone(),
            },
            Value::Array(items) => Value::Array(items.iter().map(|item| self.relabel(item)).collect()),
            Value::Object(entries) => {
                Value::Object(entries.iter().map(|(k, v)| (k.clone(), self.relabel(v))).collect())
            }
            other => other.clone(),
        }
    }

    fn render(&self, id: Identifier) -> Value {
        let flattened = self.flattened;
        if let Some(record) = flattened.record(id) {
            let structure: serde_json::Map<String, Value> =
                record.structure.iter().map(|(k, v)| (k.clone(), self.relabel(v))).collect();
            return json!({"record": {
                "kind": record.kind,
                "name": record.name,
                "annotations": record.annotations,
                "structure": structure,
            }});
        }
        if let Some(variable) = flattened.variables.get(&id) {
            let mut rendered = serde_json::to_value(variable).unwrap_or(Value::Null);
            if let Value::Object(entries) = &mut rendered {
                entries.remove("unique_id");
            }
            return json!({"variable": self.relabel(&rendered)});
        }
        if let Some(function) = flattened.functions.get(&id) {
            return json!({"function": {
                "name": function.name,
                "source": function.source,
                "globals": function.globals,
                "functions": function.functions,
            }});
        }
        json!({"dangling": null})
    }
}
