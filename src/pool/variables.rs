use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use super::functions::FunctionPoolData;
use crate::error::{PersistError, Result};
use crate::graph::{FunctionId, ObjectGraph, Transform, Trust, Variable, VariableId, VariableKind, VariableState};
use crate::identifier::Identifier;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StateRecord {
    Fixed {
        value: Value,
    },
    Variable {
        value: Value,
    },
    Pickup {
        function: Identifier,
        function_name: String,
        args: Vec<Identifier>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformRecord {
    pub function: Identifier,
    pub forward: String,
    pub inverse: String,
}

/// Persisted form of a [`Variable`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableRecord {
    pub unique_id: Identifier,
    pub name: String,
    pub state: StateRecord,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transform: Option<TransformRecord>,
}

pub type VariablePoolData = BTreeMap<Identifier, VariableRecord>;

impl VariableRecord {
    pub fn kind(&self) -> VariableKind {
        match self.state {
            StateRecord::Fixed { .. } => VariableKind::Fixed,
            StateRecord::Variable { .. } => VariableKind::Variable,
            StateRecord::Pickup { .. } => VariableKind::Pickup,
        }
    }

    /// Every identifier this record points at: function objects first, then
    /// pickup arguments.
    pub fn references(&self) -> Vec<Identifier> {
        let mut out = Vec::new();
        if let StateRecord::Pickup { function, args, .. } = &self.state {
            out.push(*function);
            out.extend(args.iter().copied());
        }
        if let Some(transform) = &self.transform {
            out.push(transform.function);
        }
        out
    }
}

/// Live variable pool: persisted identifiers mapped onto graph handles.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VariablePool {
    variables: BTreeMap<Identifier, VariableId>,
    functions: BTreeMap<Identifier, FunctionId>,
}

impl VariablePool {
    /// Materialise persisted variables and function objects into `graph`.
    ///
    /// Function objects are compiled only when `trust` vouches for them.
    /// Pickups are created first with empty argument lists and bound once
    /// every variable of the pool exists, so argument order does not matter.
    pub fn from_persisted(
        variables: &VariablePoolData,
        functions: &FunctionPoolData,
        trust: Trust,
        graph: &mut ObjectGraph,
    ) -> Result<Self> {
        trust.require(functions.len())?;

        let mut pool = VariablePool::default();
        for (key, record) in functions {
            check_key(*key, record.unique_id, "function")?;
            let function = graph.add_function(record.compile(trust)?);
            pool.functions.insert(*key, function);
        }

        for (key, record) in variables {
            check_key(*key, record.unique_id, "variable")?;
            let mut variable = match &record.state {
                StateRecord::Fixed { value } => Variable::fixed(record.name.clone(), value.clone()),
                StateRecord::Variable { value } => Variable::free(record.name.clone(), value.clone()),
                StateRecord::Pickup { function, function_name, .. } => Variable::pickup(
                    record.name.clone(),
                    pool.function_for(record, *function)?,
                    function_name.clone(),
                    Vec::new(),
                ),
            };
            if let Some(transform) = &record.transform {
                let function = pool.function_for(record, transform.function)?;
                graph.check_callable(function, &transform.forward, 1)?;
                graph.check_callable(function, &transform.inverse, 1)?;
                variable = variable.with_transform(Transform {
                    function,
                    forward: transform.forward.clone(),
                    inverse: transform.inverse.clone(),
                });
            }
            pool.variables.insert(*key, graph.add_variable(variable));
        }

        for (key, record) in variables {
            let StateRecord::Pickup { function, function_name, args } = &record.state else {
                continue;
            };
            let function = pool.function_for(record, *function)?;
            let args = args
                .iter()
                .map(|arg| {
                    pool.get(*arg).ok_or_else(|| {
                        PersistError::malformed(format!(
                            "pickup '{}' ({}) takes argument {}, which is not in the variable pool",
                            record.name, key, arg
                        ))
                    })
                })
                .collect::<Result<Vec<_>>>()?;
            graph.check_callable(function, function_name, args.len())?;
            let id = pool.variables[key];
            debug!("Bound pickup '{}' to {} argument(s)", record.name, args.len());
            graph
                .variable_mut(id)?
                .set_state(VariableState::Pickup { function, function_name: function_name.clone(), args });
        }

        info!(
            "Variable pool resolved: {} variable(s), {} function object(s)",
            pool.variables.len(),
            pool.functions.len()
        );
        Ok(pool)
    }

    fn function_for(&self, record: &VariableRecord, function: Identifier) -> Result<FunctionId> {
        self.function(function).ok_or_else(|| {
            PersistError::malformed(format!(
                "variable '{}' ({}) uses function object {}, which is not in the function pool",
                record.name, record.unique_id, function
            ))
        })
    }

    pub fn get(&self, id: Identifier) -> Option<VariableId> {
        self.variables.get(&id).copied()
    }

    pub fn function(&self, id: Identifier) -> Option<FunctionId> {
        self.functions.get(&id).copied()
    }

    pub fn contains(&self, id: Identifier) -> bool {
        self.variables.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.variables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }

    pub fn function_count(&self) -> usize {
        self.functions.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Identifier, VariableId)> + '_ {
        self.variables.iter().map(|(k, v)| (*k, *v))
    }
}

pub(crate) fn check_key(key: Identifier, unique_id: Identifier, pool: &str) -> Result<()> {
    if key == unique_id {
        Ok(())
    } else {
        Err(PersistError::malformed(format!(
            "{pool} pool key {key} does not match unique_id {unique_id}"
        )))
    }
}
