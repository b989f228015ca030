//! `batch.build-list` elements.

use serde::{Deserialize, Deserializer, de::Error as _};
use serde_yaml::{Mapping, Value};

use super::graph::ElementEnv;
use crate::expr::{BoolExpr, deserialize_optional};
use crate::util::yaml::deserialize_or_default;

#[derive(Deserialize)]
#[serde(rename_all = "kebab-case")]
struct ListFields {
  identifier: String,
  #[serde(default)]
  buildspec: Option<String>,
  #[serde(default, deserialize_with = "deserialize_or_default")]
  env: ElementEnv,
  #[serde(default)]
  debug_session: Option<bool>,
  #[serde(rename = "if", default, deserialize_with = "deserialize_optional")]
  condition: Option<BoolExpr>,
}

/// An independent build of a build list. `raw` is the element minus its `if`.
#[derive(Debug, Clone, PartialEq)]
pub struct ListElement {
  pub identifier: String,
  pub buildspec: Option<String>,
  pub env: ElementEnv,
  pub debug_session: Option<bool>,
  pub condition: Option<BoolExpr>,
  pub raw: Mapping,
}

impl<'de> Deserialize<'de> for ListElement {
  fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
    let mut raw = Mapping::deserialize(deserializer)?;
    let fields: ListFields = serde_yaml::from_value(Value::Mapping(raw.clone())).map_err(D::Error::custom)?;
    raw.remove("if");

    Ok(Self {
      identifier: fields.identifier,
      buildspec: fields.buildspec.filter(|s| !s.is_empty()),
      env: fields.env,
      debug_session: fields.debug_session,
      condition: fields.condition,
      raw,
    })
  }
}
