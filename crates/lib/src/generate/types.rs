//! Build requests produced by the generator.
//!
//! Field names follow the CodeBuild `StartBuild` and `StartBuildBatch` APIs.
//! Unset overrides are omitted so the project settings apply.

use std::collections::BTreeMap;

use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnvironmentVariable {
  pub name: String,
  pub value: String,
}

/// Converts a name-ordered map into CodeBuild environment variables.
pub fn environment_variables(variables: BTreeMap<String, String>) -> Vec<EnvironmentVariable> {
  variables
    .into_iter()
    .map(|(name, value)| EnvironmentVariable { name, value })
    .collect()
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildRequest {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub buildspec_override: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub image_override: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub compute_type_override: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub environment_type_override: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub privileged_mode_override: Option<bool>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub git_clone_depth_override: Option<i64>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub debug_session_enabled: Option<bool>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub build_status_context: Option<String>,
  #[serde(skip_serializing_if = "Vec::is_empty")]
  pub environment_variables_override: Vec<EnvironmentVariable>,
}

impl BuildRequest {
  pub fn variable(&self, name: &str) -> Option<&str> {
    self
      .environment_variables_override
      .iter()
      .find(|v| v.name == name)
      .map(|v| v.value.as_str())
  }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchBuildRequest {
  pub buildspec_override: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub image_override: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub compute_type_override: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub environment_type_override: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub privileged_mode_override: Option<bool>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub git_clone_depth_override: Option<i64>,
  #[serde(skip_serializing_if = "Vec::is_empty")]
  pub environment_variables_override: Vec<EnvironmentVariable>,
}

impl BatchBuildRequest {
  pub fn variable(&self, name: &str) -> Option<&str> {
    self
      .environment_variables_override
      .iter()
      .find(|v| v.name == name)
      .map(|v| v.value.as_str())
  }
}

/// What to start for one buildspec document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum BuildInput {
  /// Nothing to run
  Empty,

  /// One or more independent builds, started in order
  Builds(Vec<BuildRequest>),

  /// One batch build
  Batch(BatchBuildRequest),
}

impl BuildInput {
  pub fn is_empty(&self) -> bool {
    matches!(self, BuildInput::Empty)
  }

  pub fn is_batch(&self) -> bool {
    matches!(self, BuildInput::Batch(_))
  }

  pub fn builds(&self) -> &[BuildRequest] {
    match self {
      BuildInput::Builds(builds) => builds,
      _ => &[],
    }
  }

  pub fn batch(&self) -> Option<&BatchBuildRequest> {
    match self {
      BuildInput::Batch(batch) => Some(batch),
      _ => None,
    }
  }
}
