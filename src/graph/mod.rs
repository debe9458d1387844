//! Live Object Graph
//!
//! Composite objects, variables and function objects live in an arena and
//! point at each other through typed handles. Cycles and sharing are plain
//! handle edges, so nothing here needs reference counting.

mod function;
mod variable;

use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;

use serde_json::{Number, Value};
use tracing::debug;

use crate::error::{PersistError, Result};

pub use function::{FunctionObject, Trust};
pub use variable::{Transform, Variable, VariableKind, VariableState};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VariableId(usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FunctionId(usize);

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "object#{}", self.0)
    }
}

impl fmt::Display for VariableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "variable#{}", self.0)
    }
}

impl fmt::Display for FunctionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "function#{}", self.0)
    }
}

/// Opaque metadata handed to constructors unchanged.
pub type Annotations = serde_json::Map<String, Value>;

/// Attribute name to value, as enumerated by [`Persistable::structure`].
pub type Structure = BTreeMap<String, Attribute>;

/// One persistable attribute of a composite object.
#[derive(Debug, Clone, PartialEq)]
pub enum Attribute {
    /// Numbers, strings, booleans and null. Arrays and objects are held as
    /// [`Attribute::List`] and [`Attribute::Map`], which is also what
    /// reconstruction produces for them.
    Scalar(Value),
    Variable(VariableId),
    Object(ObjectId),
    List(Vec<Attribute>),
    Map(BTreeMap<String, Attribute>),
}

impl Attribute {
    pub fn scalar(value: impl Into<Value>) -> Self {
        Attribute::from_value(value.into())
    }

    /// Plain data in its canonical shape, with containers opened up.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Array(items) => Attribute::List(items.into_iter().map(Attribute::from_value).collect()),
            Value::Object(entries) => {
                Attribute::Map(entries.into_iter().map(|(key, item)| (key, Attribute::from_value(item))).collect())
            }
            other => Attribute::Scalar(other),
        }
    }

    pub fn as_scalar(&self) -> Option<&Value> {
        match self {
            Attribute::Scalar(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_variable(&self) -> Option<VariableId> {
        match self {
            Attribute::Variable(id) => Some(*id),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<ObjectId> {
        match self {
            Attribute::Object(id) => Some(*id),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Attribute]> {
        match self {
            Attribute::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, Attribute>> {
        match self {
            Attribute::Map(entries) => Some(entries),
            _ => None,
        }
    }

    /// Short label used in validation messages.
    pub fn shape(&self) -> &'static str {
        match self {
            Attribute::Scalar(_) => "scalar",
            Attribute::Variable(_) => "variable",
            Attribute::Object(_) => "object",
            Attribute::List(_) => "list",
            Attribute::Map(_) => "map",
        }
    }
}

/// Contract every class stored in an [`ObjectGraph`] fulfils.
///
/// The matching constructor `(annotations, structure, name) -> instance` is
/// registered separately in a [`crate::registry::ClassRegistry`].
pub trait Persistable: Any + fmt::Debug + Send + Sync {
    /// Stable tag selecting the constructor on reconstruction.
    fn kind(&self) -> &str;

    fn name(&self) -> &str;

    fn annotations(&self) -> Annotations {
        Annotations::new()
    }

    /// Every persistable attribute, keyed by attribute name.
    fn structure(&self) -> Structure;

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Arena holding a live graph.
#[derive(Debug, Default)]
pub struct ObjectGraph {
    objects: Vec<Box<dyn Persistable>>,
    variables: Vec<Variable>,
    functions: Vec<FunctionObject>,
}

impl ObjectGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_object<T: Persistable>(&mut self, object: T) -> ObjectId {
        self.insert_object(Box::new(object))
    }

    pub fn insert_object(&mut self, object: Box<dyn Persistable>) -> ObjectId {
        self.objects.push(object);
        ObjectId(self.objects.len() - 1)
    }

    pub fn object(&self, id: ObjectId) -> Result<&dyn Persistable> {
        self.objects
            .get(id.0)
            .map(|o| o.as_ref())
            .ok_or_else(|| PersistError::MissingObject(id.to_string()))
    }

    pub fn object_mut(&mut self, id: ObjectId) -> Result<&mut (dyn Persistable + 'static)> {
        match self.objects.get_mut(id.0) {
            Some(object) => Ok(object.as_mut()),
            None => Err(PersistError::MissingObject(id.to_string())),
        }
    }

    /// Borrow an object as its concrete type, `None` if the type differs.
    pub fn downcast<T: Persistable>(&self, id: ObjectId) -> Result<Option<&T>> {
        Ok(self.object(id)?.as_any().downcast_ref::<T>())
    }

    pub fn downcast_mut<T: Persistable>(&mut self, id: ObjectId) -> Result<Option<&mut T>> {
        Ok(self.object_mut(id)?.as_any_mut().downcast_mut::<T>())
    }

    pub fn add_variable(&mut self, variable: Variable) -> VariableId {
        self.variables.push(variable);
        VariableId(self.variables.len() - 1)
    }

    pub fn variable(&self, id: VariableId) -> Result<&Variable> {
        self.variables
            .get(id.0)
            .ok_or_else(|| PersistError::MissingObject(id.to_string()))
    }

    pub(crate) fn variable_mut(&mut self, id: VariableId) -> Result<&mut Variable> {
        self.variables
            .get_mut(id.0)
            .ok_or_else(|| PersistError::MissingObject(id.to_string()))
    }

    pub fn add_function(&mut self, function: FunctionObject) -> FunctionId {
        self.functions.push(function);
        FunctionId(self.functions.len() - 1)
    }

    pub fn function(&self, id: FunctionId) -> Result<&FunctionObject> {
        self.functions
            .get(id.0)
            .ok_or_else(|| PersistError::MissingObject(id.to_string()))
    }

    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    pub fn variable_count(&self) -> usize {
        self.variables.len()
    }

    pub fn function_count(&self) -> usize {
        self.functions.len()
    }

    pub fn objects(&self) -> impl Iterator<Item = (ObjectId, &dyn Persistable)> {
        self.objects.iter().enumerate().map(|(i, o)| (ObjectId(i), o.as_ref()))
    }

    pub fn variables(&self) -> impl Iterator<Item = (VariableId, &Variable)> {
        self.variables.iter().enumerate().map(|(i, v)| (VariableId(i), v))
    }

    pub fn functions(&self) -> impl Iterator<Item = (FunctionId, &FunctionObject)> {
        self.functions.iter().enumerate().map(|(i, f)| (FunctionId(i), f))
    }

    /// Current value of a variable; pickups are evaluated from their arguments.
    pub fn evaluate(&self, id: VariableId) -> Result<Value> {
        self.evaluate_guarded(id, &mut Vec::new())
    }

    fn evaluate_guarded(&self, id: VariableId, stack: &mut Vec<VariableId>) -> Result<Value> {
        let variable = self.variable(id)?;
        if stack.contains(&id) {
            return Err(PersistError::Evaluation(format!(
                "pickup '{}' depends on itself",
                variable.name()
            )));
        }
        match variable.state() {
            VariableState::Fixed(value) | VariableState::Variable(value) => Ok(value.clone()),
            VariableState::Pickup { function, function_name, args } => {
                stack.push(id);
                let mut values = Vec::with_capacity(args.len());
                for arg in args {
                    let value = self.evaluate_guarded(*arg, stack)?;
                    values.push(as_number(&value, variable.name())?);
                }
                stack.pop();
                let result = self.function(*function)?.call(function_name, &values)?;
                number_value(result, variable.name())
            }
        }
    }

    /// Value as seen by the optimiser: the forward transform applied, if any.
    pub fn evaluate_transformed(&self, id: VariableId) -> Result<f64> {
        let variable = self.variable(id)?;
        let value = as_number(&self.evaluate(id)?, variable.name())?;
        match variable.transform() {
            Some(transform) => self.function(transform.function)?.call(&transform.forward, &[value]),
            None => Ok(value),
        }
    }

    /// Replace the stored value. Pickups hold no value and are left alone,
    /// which is reported as `false`.
    pub fn set_value(&mut self, id: VariableId, value: impl Into<Value>) -> Result<bool> {
        let variable = self.variable_mut(id)?;
        let state = match variable.state() {
            VariableState::Fixed(_) => VariableState::Fixed(value.into()),
            VariableState::Variable(_) => VariableState::Variable(value.into()),
            VariableState::Pickup { .. } => {
                debug!("Ignoring value assignment to pickup '{}'", variable.name());
                return Ok(false);
            }
        };
        variable.set_state(state);
        Ok(true)
    }

    /// Store the value whose forward transform is `transformed`.
    pub fn set_value_transformed(&mut self, id: VariableId, transformed: f64) -> Result<bool> {
        let variable = self.variable(id)?;
        let value = match variable.transform() {
            Some(transform) => self.function(transform.function)?.call(&transform.inverse, &[transformed])?,
            None => transformed,
        };
        let value = number_value(value, variable.name())?;
        self.set_value(id, value)
    }

    /// Freeze a variable at its current value.
    pub fn to_fixed(&mut self, id: VariableId) -> Result<()> {
        let value = self.evaluate(id)?;
        self.variable_mut(id)?.set_state(VariableState::Fixed(value));
        Ok(())
    }

    /// Release a variable to the optimiser at its current value.
    pub fn to_variable(&mut self, id: VariableId) -> Result<()> {
        let value = self.evaluate(id)?;
        self.variable_mut(id)?.set_state(VariableState::Variable(value));
        Ok(())
    }

    pub fn to_pickup(
        &mut self,
        id: VariableId,
        function: FunctionId,
        function_name: impl Into<String>,
        args: Vec<VariableId>,
    ) -> Result<()> {
        let function_name = function_name.into();
        self.check_callable(function, &function_name, args.len())?;
        for arg in &args {
            self.variable(*arg)?;
        }
        self.variable_mut(id)?
            .set_state(VariableState::Pickup { function, function_name, args });
        Ok(())
    }

    pub fn set_transform(&mut self, id: VariableId, transform: Option<Transform>) -> Result<()> {
        if let Some(t) = &transform {
            self.check_callable(t.function, &t.forward, 1)?;
            self.check_callable(t.function, &t.inverse, 1)?;
        }
        self.variable_mut(id)?.set_transform(transform);
        Ok(())
    }

    /// Attach the interval transform for the given bounds, or clear the
    /// transform when both are absent.
    pub fn set_interval(&mut self, id: VariableId, left: Option<f64>, right: Option<f64>) -> Result<()> {
        self.variable(id)?;
        let transform = match FunctionObject::interval(left, right)? {
            Some((function, forward, inverse)) => Some(Transform {
                function: self.add_function(function),
                forward: forward.to_string(),
                inverse: inverse.to_string(),
            }),
            None => None,
        };
        self.set_transform(id, transform)
    }

    pub(crate) fn check_callable(&self, function: FunctionId, name: &str, arity: usize) -> Result<()> {
        let object = self.function(function)?;
        match object.arity(name) {
            Some(expected) if expected == arity => Ok(()),
            Some(expected) => Err(PersistError::Evaluation(format!(
                "'{name}' of function object '{}' takes {expected} argument(s), got {arity}",
                object.name()
            ))),
            None => Err(PersistError::Evaluation(format!(
                "function object '{}' does not define '{name}'",
                object.name()
            ))),
        }
    }
}

fn as_number(value: &Value, name: &str) -> Result<f64> {
    value
        .as_f64()
        .ok_or_else(|| PersistError::Evaluation(format!("'{name}' holds non-numeric value {value}")))
}

fn number_value(value: f64, name: &str) -> Result<Value> {
    Number::from_f64(value)
        .map(Value::Number)
        .ok_or_else(|| PersistError::Evaluation(format!("'{name}' evaluated to non-finite {value}")))
}
