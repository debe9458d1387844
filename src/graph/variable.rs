use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{FunctionId, VariableId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VariableKind {
    Fixed,
    Variable,
    Pickup,
}

#[derive(Debug, Clone, PartialEq)]
pub enum VariableState {
    /// Held constant during optimisation.
    Fixed(Value),
    /// Free for the optimiser to change.
    Variable(Value),
    /// Derived from `args` through `function_name` of a function object.
    Pickup {
        function: FunctionId,
        function_name: String,
        args: Vec<VariableId>,
    },
}

/// Maps a stored value into the unbounded domain the optimiser works in.
#[derive(Debug, Clone, PartialEq)]
pub struct Transform {
    pub function: FunctionId,
    pub forward: String,
    pub inverse: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    name: String,
    state: VariableState,
    transform: Option<Transform>,
}

impl Variable {
    pub fn fixed(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::with_state(name, VariableState::Fixed(value.into()))
    }

    pub fn free(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::with_state(name, VariableState::Variable(value.into()))
    }

    pub fn pickup(
        name: impl Into<String>,
        function: FunctionId,
        function_name: impl Into<String>,
        args: Vec<VariableId>,
    ) -> Self {
        Self::with_state(
            name,
            VariableState::Pickup { function, function_name: function_name.into(), args },
        )
    }

    fn with_state(name: impl Into<String>, state: VariableState) -> Self {
        Self { name: name.into(), state, transform: None }
    }

    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = Some(transform);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> &VariableState {
        &self.state
    }

    pub(crate) fn set_state(&mut self, state: VariableState) {
        self.state = state;
    }

    pub fn kind(&self) -> VariableKind {
        match self.state {
            VariableState::Fixed(_) => VariableKind::Fixed,
            VariableState::Variable(_) => VariableKind::Variable,
            VariableState::Pickup { .. } => VariableKind::Pickup,
        }
    }

    pub fn is_free(&self) -> bool {
        self.kind() == VariableKind::Variable
    }

    /// The value held directly by fixed and free variables. Pickups hold none.
    pub fn stored_value(&self) -> Option<&Value> {
        match &self.state {
            VariableState::Fixed(value) | VariableState::Variable(value) => Some(value),
            VariableState::Pickup { .. } => None,
        }
    }

    pub fn transform(&self) -> Option<&Transform> {
        self.transform.as_ref()
    }

    pub(crate) fn set_transform(&mut self, transform: Option<Transform>) {
        self.transform = transform;
    }
}
