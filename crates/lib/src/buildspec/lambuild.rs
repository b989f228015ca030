//! The `lambuild` extension block.

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::expr::{BoolExpr, StringExpr, deserialize_optional};
use crate::template::Template;
use crate::util::yaml::deserialize_or_default;

/// Settings that `lambuild` and each of its items may override.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct Overrides {
  pub image: Option<String>,
  pub compute_type: Option<String>,
  pub environment_type: Option<String>,
  pub privileged_mode: Option<bool>,
  pub git_clone_depth: Option<i64>,
  pub debug_session: Option<bool>,
  #[serde(deserialize_with = "deserialize_optional")]
  pub build_status_context: Option<Template>,
  #[serde(deserialize_with = "deserialize_or_default")]
  pub env: ComputedEnv,
}

/// Environment variables whose values are string expressions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ComputedEnv {
  #[serde(deserialize_with = "deserialize_or_default")]
  pub variables: BTreeMap<String, StringExpr>,
}

/// One build of item mode.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Item {
  #[serde(rename = "if", deserialize_with = "deserialize_optional")]
  pub condition: Option<BoolExpr>,
  pub param: serde_yaml::Value,
  #[serde(flatten)]
  pub overrides: Overrides,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Lambuild {
  #[serde(rename = "if", deserialize_with = "deserialize_optional")]
  pub condition: Option<BoolExpr>,
  pub items: Vec<Item>,
  #[serde(flatten)]
  pub overrides: Overrides,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn lambuild_block_parses_every_setting() {
    let lambuild: Lambuild = serde_yaml::from_str(
      r#"
if: event.name == 'push'
image: aws/codebuild/standard:5.0
compute-type: BUILD_GENERAL1_SMALL
environment-type: LINUX_CONTAINER
privileged-mode: true
git-clone-depth: 1
debug-session: false
build-status-context: "lambuild ({{ event.name }})"
env:
  variables:
    FOO: "'foo'"
items:
  - param:
      name: lint
    if: item.name == 'lint'
    image: alpine
    env:
      variables:
        NAME: item.name
  - {}
"#,
    )
    .unwrap();

    assert_eq!(lambuild.condition.as_ref().unwrap().source(), "event.name == 'push'");
    assert_eq!(lambuild.overrides.image.as_deref(), Some("aws/codebuild/standard:5.0"));
    assert_eq!(lambuild.overrides.compute_type.as_deref(), Some("BUILD_GENERAL1_SMALL"));
    assert_eq!(lambuild.overrides.privileged_mode, Some(true));
    assert_eq!(lambuild.overrides.git_clone_depth, Some(1));
    assert_eq!(lambuild.overrides.debug_session, Some(false));
    assert!(lambuild.overrides.build_status_context.is_some());
    assert_eq!(lambuild.overrides.env.variables["FOO"].source(), "'foo'");

    assert_eq!(lambuild.items.len(), 2);
    let item = &lambuild.items[0];
    assert_eq!(item.overrides.image.as_deref(), Some("alpine"));
    assert_eq!(item.param["name"], serde_yaml::Value::from("lint"));
    assert_eq!(item.overrides.env.variables["NAME"].source(), "item.name");
    assert!(lambuild.items[1].param.is_null());
  }

  #[test]
  fn empty_env_blocks_parse_as_default() {
    let lambuild: Lambuild = serde_yaml::from_str("env:\nitems:\n  - env:\n      variables:\n").unwrap();
    assert!(lambuild.overrides.env.variables.is_empty());
    assert_eq!(lambuild.items.len(), 1);
    assert!(lambuild.items[0].overrides.env.variables.is_empty());
  }

  #[test]
  fn invalid_expression_fails_to_parse() {
    let err = serde_yaml::from_str::<Lambuild>("env:\n  variables:\n    FOO: \"'foo' ..\"\n").unwrap_err();
    assert!(err.to_string().contains("failed to compile"), "{err}");
  }

  #[test]
  fn unclosed_template_fails_to_parse() {
    assert!(serde_yaml::from_str::<Lambuild>("build-status-context: \"{{ event.name\"\n").is_err());
  }
}
