//! Expression language backing function objects.
//!
//! A program is a list of definitions such as
//!
//! ```text
//! # left/right come from the function object's globals
//! both_bounded(x) = ln((left - x) / (x - right)) * abs(left - right)
//! both_bounded_inv(x) = left + (right - left) / (1 + exp(-x / abs(right - left)))
//! ```
//!
//! Definitions may call built-ins and each other. Evaluation is purely
//! numeric and has no access to anything outside the program.

mod lexer;
mod parser;

use std::collections::BTreeMap;

use std::fmt;

use chumsky::{error::Rich, input::Input, Parser as _};
use thiserror::Error;

use self::lexer::lexer;
use self::parser::parser;

/// Nested calls allowed before evaluation is aborted.
pub const MAX_CALL_DEPTH: usize = 64;

/// Operators and opening brackets allowed in one source. Every level of a
/// parsed tree needs one of them, so this also bounds the tree depth.
pub const MAX_NESTING: usize = 256;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExprError {
    #[error("syntax error at offset {offset}: {message}")]
    Syntax { offset: usize, message: String },

    #[error("source nests {found} operators and brackets, at most {limit} are allowed")]
    NestingLimit { found: usize, limit: usize },

    #[error("function '{0}' is defined twice")]
    DuplicateDefinition(String),

    #[error("parameter '{parameter}' appears twice in '{function}'")]
    DuplicateParameter { function: String, parameter: String },

    #[error("unknown name '{name}' in '{function}'")]
    UnknownName { function: String, name: String },

    #[error("unknown function '{0}'")]
    UnknownFunction(String),

    #[error("'{function}' takes {expected} argument(s), got {found}")]
    Arity {
        function: String,
        expected: usize,
        found: usize,
    },

    #[error("call depth exceeded {max} while evaluating '{0}'", max = MAX_CALL_DEPTH)]
    RecursionLimit(String),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Expr {
    Number(f64),
    Name(String),
    Neg(Box<Expr>),
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Call {
        name: String,
        args: Vec<Expr>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Definition {
    pub params: Vec<String>,
    pub body: Expr,
}

/// A parsed set of function definitions.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Program {
    definitions: BTreeMap<String, Definition>,
}

fn builtin_arity(name: &str) -> Option<usize> {
    match name {
        "sqrt" | "exp" | "ln" | "log" | "log10" | "abs" | "sin" | "cos" | "tan" | "asin" | "acos" | "atan" => {
            Some(1)
        }
        "atan2" | "min" | "max" | "pow" => Some(2),
        _ => None,
    }
}

fn call_builtin(name: &str, args: &[f64]) -> f64 {
    match (name, args) {
        ("sqrt", [x]) => x.sqrt(),
        ("exp", [x]) => x.exp(),
        ("ln" | "log", [x]) => x.ln(),
        ("log10", [x]) => x.log10(),
        ("abs", [x]) => x.abs(),
        ("sin", [x]) => x.sin(),
        ("cos", [x]) => x.cos(),
        ("tan", [x]) => x.tan(),
        ("asin", [x]) => x.asin(),
        ("acos", [x]) => x.acos(),
        ("atan", [x]) => x.atan(),
        ("atan2", [y, x]) => y.atan2(*x),
        ("min", [a, b]) => a.min(*b),
        ("max", [a, b]) => a.max(*b),
        ("pow", [a, b]) => a.powf(*b),
        _ => f64::NAN,
    }
}

fn constant(name: &str) -> Option<f64> {
    match name {
        "pi" => Some(std::f64::consts::PI),
        "e" => Some(std::f64::consts::E),
        _ => None,
    }
}

fn syntax_error<T: fmt::Display>(errors: Vec<Rich<'_, T>>) -> ExprError {
    match errors.into_iter().next() {
        Some(error) => ExprError::Syntax { offset: error.span().start, message: error.to_string() },
        None => ExprError::Syntax { offset: 0, message: "unparseable source".to_string() },
    }
}

struct Frame<'a> {
    function: &'a str,
    params: &'a [String],
    args: &'a [f64],
    depth: usize,
}

impl Program {
    pub fn parse(source: &str) -> Result<Self, ExprError> {
        let tokens = lexer().parse(source).into_result().map_err(syntax_error)?;

        let found = tokens.iter().filter(|(token, _)| token.nests()).count();
        if found > MAX_NESTING {
            return Err(ExprError::NestingLimit { found, limit: MAX_NESTING });
        }

        let end = source.len();
        let parsed = parser()
            .parse(tokens.as_slice().map((end..end).into(), |(token, span)| (token, span)))
            .into_result()
            .map_err(syntax_error)?;

        let mut definitions = BTreeMap::new();
        for (name, params, body) in parsed {
            for (index, parameter) in params.iter().enumerate() {
                if params[..index].contains(parameter) {
                    return Err(ExprError::DuplicateParameter { function: name, parameter: parameter.clone() });
                }
            }
            if definitions.contains_key(&name) {
                return Err(ExprError::DuplicateDefinition(name));
            }
            definitions.insert(name, Definition { params, body });
        }
        Ok(Self { definitions })
    }

    pub fn function_names(&self) -> impl Iterator<Item = &str> {
        self.definitions.keys().map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.definitions.contains_key(name)
    }

    pub fn arity(&self, name: &str) -> Option<usize> {
        self.definitions.get(name).map(|d| d.params.len())
    }

    /// Check every call target, call arity and free name against `globals`.
    pub fn validate(&self, globals: &BTreeMap<String, f64>) -> Result<(), ExprError> {
        for (function, definition) in &self.definitions {
            self.validate_expr(function, &definition.body, &definition.params, globals)?;
        }
        Ok(())
    }

    fn validate_expr(
        &self,
        function: &str,
        expr: &Expr,
        params: &[String],
        globals: &BTreeMap<String, f64>,
    ) -> Result<(), ExprError> {
        match expr {
            Expr::Number(_) => Ok(()),
            Expr::Name(name) => {
                if params.contains(name) || globals.contains_key(name) || constant(name).is_some() {
                    Ok(())
                } else {
                    Err(ExprError::UnknownName { function: function.to_string(), name: name.clone() })
                }
            }
            Expr::Neg(inner) => self.validate_expr(function, inner, params, globals),
            Expr::Binary { lhs, rhs, .. } => {
                self.validate_expr(function, lhs, params, globals)?;
                self.validate_expr(function, rhs, params, globals)
            }
            Expr::Call { name, args } => {
                let expected = self
                    .arity(name)
                    .or_else(|| builtin_arity(name))
                    .ok_or_else(|| ExprError::UnknownFunction(name.clone()))?;
                if expected != args.len() {
                    return Err(ExprError::Arity { function: name.clone(), expected, found: args.len() });
                }
                args.iter().try_for_each(|arg| self.validate_expr(function, arg, params, globals))
            }
        }
    }

    /// Evaluate `name(args...)`.
    pub fn call(&self, name: &str, args: &[f64], globals: &BTreeMap<String, f64>) -> Result<f64, ExprError> {
        self.call_at_depth(name, args, globals, 0)
    }

    fn call_at_depth(
        &self,
        name: &str,
        args: &[f64],
        globals: &BTreeMap<String, f64>,
        depth: usize,
    ) -> Result<f64, ExprError> {
        if depth >= MAX_CALL_DEPTH {
            return Err(ExprError::RecursionLimit(name.to_string()));
        }
        if let Some(definition) = self.definitions.get(name) {
            if definition.params.len() != args.len() {
                return Err(ExprError::Arity {
                    function: name.to_string(),
                    expected: definition.params.len(),
                    found: args.len(),
                });
            }
            let frame = Frame { function: name, params: &definition.params, args, depth };
            return self.eval(&definition.body, &frame, globals);
        }
        match builtin_arity(name) {
            Some(expected) if expected == args.len() => Ok(call_builtin(name, args)),
            Some(expected) => Err(ExprError::Arity { function: name.to_string(), expected, found: args.len() }),
            None => Err(ExprError::UnknownFunction(name.to_string())),
        }
    }

    fn eval(&self, expr: &Expr, frame: &Frame<'_>, globals: &BTreeMap<String, f64>) -> Result<f64, ExprError> {
        match expr {
            Expr::Number(value) => Ok(*value),
            Expr::Name(name) => {
                if let Some(index) = frame.params.iter().position(|p| p == name) {
                    return Ok(frame.args[index]);
                }
                globals
                    .get(name)
                    .copied()
                    .or_else(|| constant(name))
                    .ok_or_else(|| ExprError::UnknownName { function: frame.function.to_string(), name: name.clone() })
            }
            Expr::Neg(inner) => Ok(-self.eval(inner, frame, globals)?),
            Expr::Binary { op, lhs, rhs } => {
                let a = self.eval(lhs, frame, globals)?;
                let b = self.eval(rhs, frame, globals)?;
                Ok(match op {
                    BinaryOp::Add => a + b,
                    BinaryOp::Sub => a - b,
                    BinaryOp::Mul => a * b,
                    BinaryOp::Div => a / b,
                    BinaryOp::Pow => a.powf(b),
                })
            }
            Expr::Call { name, args } => {
                let values = args
                    .iter()
                    .map(|arg| self.eval(arg, frame, globals))
                    .collect::<Result<Vec<_>, _>>()?;
                self.call_at_depth(name, &values, globals, frame.depth + 1)
            }
        }
    }
}
