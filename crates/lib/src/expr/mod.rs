//! Conditional and computed expressions.
//!
//! Expressions are Lua expressions. They are syntax-checked when the document
//! that holds them is parsed, so a typo in a buildspec is reported before any
//! build is started, and evaluated later in a [`Scope`].
//!
//! - [`BoolExpr`]: must evaluate to a boolean (`if` conditions)
//! - [`StringExpr`]: must evaluate to a string (computed environment variables)

mod runtime;

use std::fmt;

use mlua::prelude::*;
use serde::{Deserialize, Deserializer, de::Error as _};
use thiserror::Error;

pub use runtime::{Evaluator, Scope};

#[derive(Debug, Error)]
pub enum ExprError {
  #[error("failed to compile `{expr}`: {message}")]
  Compile { expr: String, message: String },
  #[error("failed to evaluate `{expr}`: {message}")]
  Evaluation { expr: String, message: String },
  #[error("`{expr}` must evaluate to a {expected}, got {actual}")]
  TypeMismatch {
    expr: String,
    expected: &'static str,
    actual: &'static str,
  },
  #[error("expression runtime error: {0}")]
  Runtime(String),
}

impl From<LuaError> for ExprError {
  fn from(err: LuaError) -> Self {
    ExprError::Runtime(err.to_string())
  }
}

thread_local! {
  static COMPILER: Lua = Lua::new();
}

/// A syntax-checked expression and the chunk it runs as.
#[derive(Clone, PartialEq, Eq)]
pub struct Program {
  source: String,
  chunk: String,
}

impl Program {
  pub(crate) fn compile(source: &str) -> Result<Self, ExprError> {
    let chunk = format!("return {source}");
    COMPILER
      .with(|lua| lua.load(chunk.as_str()).set_name(source).into_function().map(|_| ()))
      .map_err(|e| ExprError::Compile {
        expr: source.to_string(),
        message: e.to_string(),
      })?;

    Ok(Self {
      source: source.to_string(),
      chunk,
    })
  }

  pub fn source(&self) -> &str {
    &self.source
  }

  pub(crate) fn chunk(&self) -> &str {
    &self.chunk
  }
}

impl fmt::Debug for Program {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{:?}", self.source)
  }
}

/// An expression that must evaluate to a boolean.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoolExpr(Program);

impl BoolExpr {
  pub fn compile(source: &str) -> Result<Self, ExprError> {
    Program::compile(source).map(Self)
  }

  pub fn source(&self) -> &str {
    self.0.source()
  }

  pub fn run(&self, scope: &Scope<'_>) -> Result<bool, ExprError> {
    match scope.eval(&self.0)? {
      LuaValue::Boolean(b) => Ok(b),
      other => Err(ExprError::TypeMismatch {
        expr: self.0.source.clone(),
        expected: "boolean",
        actual: other.type_name(),
      }),
    }
  }
}

/// An expression that must evaluate to a string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StringExpr(Program);

impl StringExpr {
  pub fn compile(source: &str) -> Result<Self, ExprError> {
    Program::compile(source).map(Self)
  }

  pub fn source(&self) -> &str {
    self.0.source()
  }

  pub fn run(&self, scope: &Scope<'_>) -> Result<String, ExprError> {
    match scope.eval(&self.0)? {
      LuaValue::String(s) => s.to_str().map(|s| s.to_string()).map_err(|e| ExprError::Evaluation {
        expr: self.0.source.clone(),
        message: e.to_string(),
      }),
      other => Err(ExprError::TypeMismatch {
        expr: self.0.source.clone(),
        expected: "string",
        actual: other.type_name(),
      }),
    }
  }
}

impl TryFrom<String> for BoolExpr {
  type Error = ExprError;

  fn try_from(source: String) -> Result<Self, Self::Error> {
    Self::compile(&source)
  }
}

impl TryFrom<String> for StringExpr {
  type Error = ExprError;

  fn try_from(source: String) -> Result<Self, Self::Error> {
    Self::compile(&source)
  }
}

impl<'de> Deserialize<'de> for BoolExpr {
  fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
    let source = String::deserialize(deserializer)?;
    Self::compile(&source).map_err(D::Error::custom)
  }
}

impl<'de> Deserialize<'de> for StringExpr {
  fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
    let source = String::deserialize(deserializer)?;
    Self::compile(&source).map_err(D::Error::custom)
  }
}

/// Deserializes an optional compiled value, treating a missing, null or blank
/// string as absent.
pub fn deserialize_optional<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
  D: Deserializer<'de>,
  T: TryFrom<String>,
  T::Error: fmt::Display,
{
  match Option::<String>::deserialize(deserializer)? {
    Some(source) if !source.trim().is_empty() => T::try_from(source).map(Some).map_err(D::Error::custom),
    _ => Ok(None),
  }
}
