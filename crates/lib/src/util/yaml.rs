//! Helpers for editing `serde_yaml` trees in place.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, de::Error as _};
use serde_yaml::{Mapping, Value};

/// Sets `value` at `path`, creating intermediate mappings as needed.
///
/// A non-mapping value found along the path is replaced by a mapping.
pub fn set_in(root: &mut Mapping, path: &[&str], value: Value) {
  let Some((last, parents)) = path.split_last() else {
    return;
  };

  let mut current = root;
  for key in parents {
    let entry = current
      .entry(Value::from(*key))
      .or_insert_with(|| Value::Mapping(Mapping::new()));
    if !entry.is_mapping() {
      *entry = Value::Mapping(Mapping::new());
    }
    let Value::Mapping(next) = entry else {
      return;
    };
    current = next;
  }
  current.insert(Value::from(*last), value);
}

pub fn string_sequence<I, S>(values: I) -> Value
where
  I: IntoIterator<Item = S>,
  S: Into<String>,
{
  Value::Sequence(values.into_iter().map(|v| Value::String(v.into())).collect())
}

/// Renders a scalar the way CodeBuild reads it from a buildspec.
pub fn scalar_to_string(value: &Value) -> Option<String> {
  match value {
    Value::String(s) => Some(s.clone()),
    Value::Number(n) => Some(n.to_string()),
    Value::Bool(b) => Some(b.to_string()),
    Value::Null => Some(String::new()),
    _ => None,
  }
}

/// Deserializes a mapping of scalars into strings, accepting numbers and bools.
/// Reads a value whose empty form (`key:` with nothing after it) means the default.
pub fn deserialize_or_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
  D: Deserializer<'de>,
  T: Default + Deserialize<'de>,
{
  Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

pub fn deserialize_scalar_map<'de, D>(deserializer: D) -> Result<BTreeMap<String, String>, D::Error>
where
  D: Deserializer<'de>,
{
  let raw = Option::<BTreeMap<String, Value>>::deserialize(deserializer)?.unwrap_or_default();
  raw
    .into_iter()
    .map(|(key, value)| match scalar_to_string(&value) {
      Some(s) => Ok((key, s)),
      None => Err(D::Error::custom(format!("variable `{key}` must be a scalar"))),
    })
    .collect()
}
