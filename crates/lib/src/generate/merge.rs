//! Precedence between layers of build settings.
//!
//! For every setting, the most specific layer that sets it wins: an element
//! (or item) over the `lambuild` block, which wins over the project.

use std::collections::BTreeMap;

use super::GenerateError;
use super::types::{BatchBuildRequest, BuildRequest, environment_variables};
use crate::buildspec::{ComputedEnv, ElementEnv, Overrides};
use crate::expr::Scope;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct Settings {
  pub image: Option<String>,
  pub compute_type: Option<String>,
  pub environment_type: Option<String>,
  pub privileged_mode: Option<bool>,
  pub git_clone_depth: Option<i64>,
  pub debug_session: Option<bool>,
}

impl Settings {
  pub fn from_overrides(overrides: &Overrides) -> Self {
    Self {
      image: overrides.image.clone(),
      compute_type: overrides.compute_type.clone(),
      environment_type: overrides.environment_type.clone(),
      privileged_mode: overrides.privileged_mode,
      git_clone_depth: overrides.git_clone_depth,
      debug_session: overrides.debug_session,
    }
  }

  pub fn from_element(env: &ElementEnv, debug_session: Option<bool>) -> Self {
    Self {
      image: env.image.clone(),
      compute_type: env.compute_type.clone(),
      environment_type: env.environment_type.clone(),
      privileged_mode: env.privileged_mode,
      git_clone_depth: None,
      debug_session,
    }
  }

  /// Fills every unset field from `fallback`.
  pub fn or(self, fallback: Settings) -> Settings {
    Settings {
      image: self.image.or(fallback.image),
      compute_type: self.compute_type.or(fallback.compute_type),
      environment_type: self.environment_type.or(fallback.environment_type),
      privileged_mode: self.privileged_mode.or(fallback.privileged_mode),
      git_clone_depth: self.git_clone_depth.or(fallback.git_clone_depth),
      debug_session: self.debug_session.or(fallback.debug_session),
    }
  }

  pub fn into_build(
    self,
    buildspec: String,
    variables: BTreeMap<String, String>,
    build_status_context: Option<String>,
  ) -> BuildRequest {
    BuildRequest {
      buildspec_override: Some(buildspec),
      image_override: self.image,
      compute_type_override: self.compute_type,
      environment_type_override: self.environment_type,
      privileged_mode_override: self.privileged_mode,
      git_clone_depth_override: self.git_clone_depth,
      debug_session_enabled: self.debug_session,
      build_status_context,
      environment_variables_override: environment_variables(variables),
    }
  }

  pub fn into_batch(self, buildspec: String, variables: BTreeMap<String, String>) -> BatchBuildRequest {
    BatchBuildRequest {
      buildspec_override: buildspec,
      image_override: self.image,
      compute_type_override: self.compute_type,
      environment_type_override: self.environment_type,
      privileged_mode_override: self.privileged_mode,
      git_clone_depth_override: self.git_clone_depth,
      environment_variables_override: environment_variables(variables),
    }
  }
}

/// Evaluates computed variables. Every value must be a string.
pub(crate) fn evaluate_variables(
  env: &ComputedEnv,
  scope: &Scope<'_>,
  prefix: &str,
) -> Result<BTreeMap<String, String>, GenerateError> {
  env
    .variables
    .iter()
    .map(|(name, expr)| {
      let value = expr.run(scope).map_err(|source| GenerateError::Evaluation {
        target: format!("{prefix}.env.variables.{name}"),
        source,
      })?;
      Ok((name.clone(), value))
    })
    .collect()
}

/// Overlays `overrides` on `base`; names present in both take the override.
pub(crate) fn overlay(
  mut base: BTreeMap<String, String>,
  overrides: impl IntoIterator<Item = (String, String)>,
) -> BTreeMap<String, String> {
  base.extend(overrides);
  base
}
