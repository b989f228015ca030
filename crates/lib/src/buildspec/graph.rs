//! `batch.build-graph` elements.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, de::Error as _};
use serde_yaml::{Mapping, Value};

use crate::expr::{BoolExpr, deserialize_optional};
use crate::util::yaml::{deserialize_or_default, deserialize_scalar_map};

/// The `env` block of a graph or list element.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ElementEnv {
  pub compute_type: Option<String>,
  pub image: Option<String>,
  #[serde(rename = "type")]
  pub environment_type: Option<String>,
  pub privileged_mode: Option<bool>,
  #[serde(deserialize_with = "deserialize_scalar_map")]
  pub variables: BTreeMap<String, String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "kebab-case")]
struct GraphFields {
  identifier: String,
  #[serde(default)]
  buildspec: Option<String>,
  #[serde(default)]
  depend_on: Vec<String>,
  #[serde(default, deserialize_with = "deserialize_or_default")]
  env: ElementEnv,
  #[serde(default)]
  debug_session: Option<bool>,
  #[serde(rename = "if", default, deserialize_with = "deserialize_optional")]
  condition: Option<BoolExpr>,
}

/// A node of the build graph.
///
/// `raw` keeps the element as written, minus its `if`, so that surviving
/// elements are re-emitted with every CodeBuild field they declared.
#[derive(Debug, Clone, PartialEq)]
pub struct GraphElement {
  pub identifier: String,
  pub buildspec: Option<String>,
  pub depend_on: Vec<String>,
  pub env: ElementEnv,
  pub debug_session: Option<bool>,
  pub condition: Option<BoolExpr>,
  pub raw: Mapping,
}

impl<'de> Deserialize<'de> for GraphElement {
  fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
    let mut raw = Mapping::deserialize(deserializer)?;
    let fields: GraphFields = serde_yaml::from_value(Value::Mapping(raw.clone())).map_err(D::Error::custom)?;
    raw.remove("if");

    Ok(Self {
      identifier: fields.identifier,
      buildspec: fields.buildspec.filter(|s| !s.is_empty()),
      depend_on: fields.depend_on,
      env: fields.env,
      debug_session: fields.debug_session,
      condition: fields.condition,
      raw,
    })
  }
}
