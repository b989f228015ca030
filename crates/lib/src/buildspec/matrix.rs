//! `batch.build-matrix`.
//!
//! Every dynamic axis is a list of entries. An entry is a literal string or a
//! mapping `{value, if}`; conditional entries are filtered before the axes are
//! expanded.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, de::Error as _};
use serde_yaml::Value;

use super::graph::ElementEnv;
use crate::expr::{BoolExpr, deserialize_optional};
use crate::util::yaml::{deserialize_or_default, scalar_to_string};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AxisEntry {
  Literal(String),
  Conditional { value: String, condition: Option<BoolExpr> },
}

impl AxisEntry {
  pub fn value(&self) -> &str {
    match self {
      AxisEntry::Literal(value) | AxisEntry::Conditional { value, .. } => value,
    }
  }

  pub fn condition(&self) -> Option<&BoolExpr> {
    match self {
      AxisEntry::Literal(_) => None,
      AxisEntry::Conditional { condition, .. } => condition.as_ref(),
    }
  }
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct ConditionalEntry {
  value: Value,
  #[serde(rename = "if", default, deserialize_with = "deserialize_optional")]
  condition: Option<BoolExpr>,
}

impl<'de> Deserialize<'de> for AxisEntry {
  fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
    match Value::deserialize(deserializer)? {
      value @ Value::Mapping(_) => {
        let entry: ConditionalEntry = serde_yaml::from_value(value).map_err(D::Error::custom)?;
        let value = scalar_to_string(&entry.value).ok_or_else(|| D::Error::custom("an axis value must be a scalar"))?;
        Ok(AxisEntry::Conditional {
          value,
          condition: entry.condition,
        })
      }
      other => scalar_to_string(&other)
        .map(AxisEntry::Literal)
        .ok_or_else(|| D::Error::custom("an axis entry must be a scalar or a mapping")),
    }
  }
}

/// One dimension of the matrix.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct Axis(pub Vec<AxisEntry>);

impl Axis {
  pub fn is_empty(&self) -> bool {
    self.0.is_empty()
  }

  pub fn entries(&self) -> &[AxisEntry] {
    &self.0
  }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct MatrixStatic {
  pub ignore_failure: Option<bool>,
  #[serde(deserialize_with = "deserialize_or_default")]
  pub env: ElementEnv,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct DynamicEnv {
  pub compute_type: Axis,
  pub image: Axis,
  #[serde(deserialize_with = "deserialize_or_default")]
  pub variables: BTreeMap<String, Axis>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct MatrixDynamic {
  pub buildspec: Axis,
  #[serde(deserialize_with = "deserialize_or_default")]
  pub env: DynamicEnv,
}

impl MatrixDynamic {
  /// Whether any axis has at least one entry.
  pub fn is_populated(&self) -> bool {
    !self.buildspec.is_empty()
      || !self.env.image.is_empty()
      || !self.env.compute_type.is_empty()
      || self.env.variables.values().any(|axis| !axis.is_empty())
  }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Matrix {
  #[serde(rename = "static")]
  pub static_env: Option<MatrixStatic>,
  pub dynamic: MatrixDynamic,
}
