//! Function objects: named expression programs that drive derived variables
//! and value transforms.

use std::collections::BTreeMap;

use tracing::{debug, warn};

use crate::error::{PersistError, Result};
use crate::expr::Program;

/// Caller attestation required before persisted expressions are compiled.
///
/// Has no `Default`; both flags are spelled out at the call site.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Trust {
    pub source_checked: bool,
    pub variables_checked: bool,
}

impl Trust {
    pub fn new(source_checked: bool, variables_checked: bool) -> Self {
        Self { source_checked, variables_checked }
    }

    pub fn is_trusted(&self) -> bool {
        self.source_checked && self.variables_checked
    }

    /// Fail with `UntrustedSource` if `count` function objects would be compiled
    /// without full attestation.
    pub fn require(&self, count: usize) -> Result<()> {
        if count == 0 || self.is_trusted() {
            return Ok(());
        }
        warn!(
            "Refusing to compile {} function object(s): source_checked={}, variables_checked={}",
            count, self.source_checked, self.variables_checked
        );
        Err(PersistError::UntrustedSource {
            count,
            source_checked: self.source_checked,
            variables_checked: self.variables_checked,
        })
    }
}

/// Compiled expression source plus the numeric globals it closes over.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionObject {
    name: String,
    source: String,
    globals: BTreeMap<String, f64>,
    exported: Vec<String>,
    program: Program,
}

impl FunctionObject {
    /// Compile source written by the calling program itself.
    pub fn new(name: impl Into<String>, source: impl Into<String>) -> Result<Self> {
        Self::compile(name.into(), source.into(), BTreeMap::new(), None)
    }

    pub fn with_globals(
        name: impl Into<String>,
        source: impl Into<String>,
        globals: BTreeMap<String, f64>,
    ) -> Result<Self> {
        Self::compile(name.into(), source.into(), globals, None)
    }

    /// Rebuild a function object read from storage. Nothing is parsed unless
    /// `trust` vouches for both the source and its globals.
    pub fn from_persisted(
        name: impl Into<String>,
        source: impl Into<String>,
        globals: BTreeMap<String, f64>,
        exported: Vec<String>,
        trust: Trust,
    ) -> Result<Self> {
        trust.require(1)?;
        Self::compile(name.into(), source.into(), globals, Some(exported))
    }

    fn compile(
        name: String,
        source: String,
        globals: BTreeMap<String, f64>,
        exported: Option<Vec<String>>,
    ) -> Result<Self> {
        let program = Program::parse(&source)?;
        program.validate(&globals)?;
        let exported = match exported {
            Some(names) => {
                if let Some(missing) = names.iter().find(|n| !program.contains(n)) {
                    return Err(PersistError::malformed(format!(
                        "function object '{name}' exports '{missing}' but does not define it"
                    )));
                }
                names
            }
            None => program.function_names().map(str::to_string).collect(),
        };
        debug!("Compiled function object '{}' exporting {:?}", name, exported);
        Ok(Self { name, source, globals, exported, program })
    }

    /// Interval transform mapping a bounded value onto the whole real line.
    ///
    /// Returns the function object plus the forward and inverse function
    /// names, or `None` when neither bound is given.
    pub fn interval(left: Option<f64>, right: Option<f64>) -> Result<Option<(Self, &'static str, &'static str)>> {
        let (source, forward, inverse) = match (left, right) {
            (Some(_), None) => (
                "left_bounded(x) = abs(left) * ln((x - left) / abs(left))\n\
                 left_bounded_inv(x) = left + abs(left) * exp(x / abs(left))",
                "left_bounded",
                "left_bounded_inv",
            ),
            (None, Some(_)) => (
                "right_bounded(x) = -abs(right) * ln((right - x) / abs(right))\n\
                 right_bounded_inv(x) = right - abs(right) * exp(-x / abs(right))",
                "right_bounded",
                "right_bounded_inv",
            ),
            (Some(_), Some(_)) => (
                "both_bounded(x) = ln((-x + left) / (x - right)) * abs(left - right)\n\
                 both_bounded_inv(x) = left + (right - left) / (1 + exp(-x / abs(right - left)))",
                "both_bounded",
                "both_bounded_inv",
            ),
            (None, None) => return Ok(None),
        };
        let globals = left
            .map(|l| ("left".to_string(), l))
            .into_iter()
            .chain(right.map(|r| ("right".to_string(), r)))
            .collect();
        let function = Self::with_globals("interval_trafo", source, globals)?;
        Ok(Some((function, forward, inverse)))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn globals(&self) -> &BTreeMap<String, f64> {
        &self.globals
    }

    pub fn exported(&self) -> &[String] {
        &self.exported
    }

    pub fn defines(&self, function: &str) -> bool {
        self.program.contains(function)
    }

    pub fn arity(&self, function: &str) -> Option<usize> {
        self.program.arity(function)
    }

    pub fn call(&self, function: &str, args: &[f64]) -> Result<f64> {
        Ok(self.program.call(function, args, &self.globals)?)
    }
}
