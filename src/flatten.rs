//! Flattener: live graph to independent records.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::{PersistError, Result};
use crate::graph::{Attribute, FunctionId, ObjectGraph, ObjectId, VariableId, VariableState};
use crate::identifier::Identifier;
use crate::pool::{
    collect_identifiers, Flattened, FunctionPoolData, FunctionRecord, RecordsPool, StateRecord, StructureRecord,
    TransformRecord, VariablePoolData, VariableRecord,
};

/// Attribute names never written to a structure unless configured otherwise.
pub const DEFAULT_EXCLUDED: [&str; 3] = ["annotations", "list_observers", "serializationfilter"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Flattener {
    excluded: BTreeSet<String>,
}

impl Default for Flattener {
    fn default() -> Self {
        Self::with_excluded(DEFAULT_EXCLUDED)
    }
}

impl Flattener {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the exclusion set entirely.
    pub fn with_excluded<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self { excluded: names.into_iter().map(Into::into).collect() }
    }

    pub fn exclude(mut self, name: impl Into<String>) -> Self {
        self.excluded.insert(name.into());
        self
    }

    pub fn excluded(&self) -> impl Iterator<Item = &str> {
        self.excluded.iter().map(String::as_str)
    }

    /// Flatten everything reachable from `root`.
    ///
    /// Every composite gets a fresh identifier on first visit; later visits
    /// only substitute it, which is what breaks cycles. Pickup arguments and
    /// function objects are pulled into their pools even when no structure
    /// mentions them.
    pub fn flatten(&self, graph: &ObjectGraph, root: ObjectId) -> Result<Flattened> {
        let mut run = Run {
            graph,
            excluded: &self.excluded,
            objects: HashMap::new(),
            variable_ids: HashMap::new(),
            function_ids: HashMap::new(),
            records: RecordsPool::new(),
            variables: VariablePoolData::new(),
            functions: FunctionPoolData::new(),
        };
        let root_id = run.visit_object(root)?;
        let Run { mut records, variables, functions, .. } = run;
        let root = records
            .remove(&root_id)
            .ok_or_else(|| PersistError::MissingObject(root.to_string()))?;

        info!(
            "Flattened '{}': {} record(s), {} variable(s), {} function object(s)",
            root.name,
            records.len(),
            variables.len(),
            functions.len()
        );
        Ok(Flattened { root, records, variables, functions })
    }
}

struct Run<'g> {
    graph: &'g ObjectGraph,
    excluded: &'g BTreeSet<String>,
    objects: HashMap<ObjectId, Identifier>,
    variable_ids: HashMap<VariableId, Identifier>,
    function_ids: HashMap<FunctionId, Identifier>,
    records: RecordsPool,
    variables: VariablePoolData,
    functions: FunctionPoolData,
}

impl Run<'_> {
    fn visit_object(&mut self, object_id: ObjectId) -> Result<Identifier> {
        if let Some(id) = self.objects.get(&object_id) {
            return Ok(*id);
        }
        let unique_id = Identifier::generate();
        self.objects.insert(object_id, unique_id);

        let graph = self.graph;
        let object = graph.object(object_id)?;
        let mut structure = BTreeMap::new();
        for (attribute, value) in object.structure() {
            if self.excluded.contains(&attribute) {
                continue;
            }
            let encoded = self.encode(&value)?;
            if matches!(value, Attribute::Scalar(_)) {
                let mut shaped = Vec::new();
                collect_identifiers(&encoded, &mut shaped);
                if !shaped.is_empty() {
                    warn!(
                        "Attribute '{}' of {} '{}' holds identifier-shaped text; it will be read back as a reference",
                        attribute,
                        object.kind(),
                        object.name()
                    );
                }
            }
            structure.insert(attribute, encoded);
        }
        debug!("Record {} for {} '{}'", unique_id, object.kind(), object.name());
        self.records.insert(
            unique_id,
            StructureRecord {
                unique_id,
                kind: object.kind().to_string(),
                name: object.name().to_string(),
                annotations: object.annotations(),
                structure,
            },
        );
        Ok(unique_id)
    }

    fn encode(&mut self, attribute: &Attribute) -> Result<Value> {
        Ok(match attribute {
            Attribute::Scalar(value) => value.clone(),
            Attribute::Variable(id) => self.visit_variable(*id)?.to_value(),
            Attribute::Object(id) => self.visit_object(*id)?.to_value(),
            Attribute::List(items) => Value::Array(items.iter().map(|item| self.encode(item)).collect::<Result<_>>()?),
            Attribute::Map(entries) => Value::Object(
                entries
                    .iter()
                    .map(|(key, item)| -> Result<(String, Value)> { Ok((key.clone(), self.encode(item)?)) })
                    .collect::<Result<_>>()?,
            ),
        })
    }

    fn visit_variable(&mut self, variable_id: VariableId) -> Result<Identifier> {
        if let Some(id) = self.variable_ids.get(&variable_id) {
            return Ok(*id);
        }
        let unique_id = Identifier::generate();
        self.variable_ids.insert(variable_id, unique_id);

        let graph = self.graph;
        let variable = graph.variable(variable_id)?;
        let state = match variable.state() {
            VariableState::Fixed(value) => StateRecord::Fixed { value: value.clone() },
            VariableState::Variable(value) => StateRecord::Variable { value: value.clone() },
            VariableState::Pickup { function, function_name, args } => StateRecord::Pickup {
                function: self.visit_function(*function)?,
                function_name: function_name.clone(),
                args: args.iter().map(|arg| self.visit_variable(*arg)).collect::<Result<_>>()?,
            },
        };
        let transform = match variable.transform() {
            Some(transform) => Some(TransformRecord {
                function: self.visit_function(transform.function)?,
                forward: transform.forward.clone(),
                inverse: transform.inverse.clone(),
            }),
            None => None,
        };
        self.variables.insert(
            unique_id,
            VariableRecord { unique_id, name: variable.name().to_string(), state, transform },
        );
        Ok(unique_id)
    }

    fn visit_function(&mut self, function_id: FunctionId) -> Result<Identifier> {
        if let Some(id) = self.function_ids.get(&function_id) {
            return Ok(*id);
        }
        let unique_id = Identifier::generate();
        self.function_ids.insert(function_id, unique_id);
        let record = FunctionRecord::from_live(unique_id, self.graph.function(function_id)?);
        self.functions.insert(unique_id, record);
        Ok(unique_id)
    }
}
