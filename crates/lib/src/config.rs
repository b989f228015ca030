//! Process configuration.
//!
//! The configuration lists the repositories handled by the process, the
//! CodeBuild project of each one, and hooks that select which buildspec file
//! of a repository applies to an event.
//!
//! It is read from the `LAMBUILD_CONFIG` environment variable, or from a file.

use std::path::Path;

use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::context::{Aws, Data};
use crate::expr::{BoolExpr, Evaluator, ExprError, deserialize_optional};
use crate::generate::Generator;
use crate::template::Template;

/// Environment variable holding the configuration YAML.
pub const CONFIG_ENV: &str = "LAMBUILD_CONFIG";

/// Environment variable with the default build status context template.
pub const BUILD_STATUS_CONTEXT_ENV: &str = "BUILD_STATUS_CONTEXT";

/// Buildspec file used by hooks that name none.
pub const DEFAULT_HOOK_CONFIG: &str = "lambuild.yaml";

/// Environment variable with the AWS region, used when the configuration has none.
pub const REGION_ENV: &str = "REGION";

/// Accepted values of `log-level`.
pub const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("environment variable {0} is not set")]
  MissingEnv(&'static str),

  #[error("failed to read {path}: {source}")]
  Read {
    path: String,
    #[source]
    source: std::io::Error,
  },

  #[error("invalid configuration: {0}")]
  Yaml(#[from] serde_yaml::Error),

  #[error("invalid BUILD_STATUS_CONTEXT: {0}")]
  StatusContext(String),

  #[error("invalid configuration: {0}")]
  Invalid(String),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
  #[serde(default)]
  pub log_level: Option<String>,
  #[serde(default)]
  pub region: Option<String>,
  #[serde(default)]
  pub account_id: Option<String>,
  #[serde(default, deserialize_with = "deserialize_optional")]
  pub build_status_context: Option<Template>,
  #[serde(default)]
  pub repositories: Vec<Repository>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Repository {
  #[serde(default)]
  pub name: String,
  #[serde(default)]
  pub hooks: Vec<Hook>,
  #[serde(default)]
  pub codebuild: CodeBuild,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct CodeBuild {
  #[serde(default)]
  pub project_name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Hook {
  #[serde(rename = "if", default, deserialize_with = "deserialize_optional")]
  pub condition: Option<BoolExpr>,
  #[serde(default = "default_hook_config")]
  pub config: String,
}

fn default_hook_config() -> String {
  DEFAULT_HOOK_CONFIG.to_string()
}

impl Config {
  pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
    let config: Config = serde_yaml::from_str(content)?;
    config.validate()?;
    Ok(config)
  }

  pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
      path: path.display().to_string(),
      source,
    })?;
    Self::from_yaml(&content)
  }

  /// Reads the configuration from [`CONFIG_ENV`].
  ///
  /// [`BUILD_STATUS_CONTEXT_ENV`] fills in the status context when the
  /// configuration has none.
  pub fn from_env() -> Result<Self, ConfigError> {
    let content = std::env::var(CONFIG_ENV).map_err(|_| ConfigError::MissingEnv(CONFIG_ENV))?;
    let mut config = Self::from_yaml(&content)?;

    if config.build_status_context.is_none()
      && let Ok(source) = std::env::var(BUILD_STATUS_CONTEXT_ENV)
      && !source.is_empty()
    {
      let template = Template::parse(&source).map_err(|e| ConfigError::StatusContext(e.to_string()))?;
      config.build_status_context = Some(template);
    }

    debug!(repositories = config.repositories.len(), "loaded configuration");
    Ok(config)
  }

  fn validate(&self) -> Result<(), ConfigError> {
    if let Some(level) = &self.log_level
      && !LOG_LEVELS.contains(&level.to_ascii_lowercase().as_str())
    {
      return Err(ConfigError::Invalid(format!(
        "log-level must be one of {}: {level}",
        LOG_LEVELS.join(", ")
      )));
    }
    if self.repositories.is_empty() {
      return Err(ConfigError::Invalid("repositories are required".to_string()));
    }
    for (index, repo) in self.repositories.iter().enumerate() {
      if repo.name.is_empty() {
        return Err(ConfigError::Invalid(format!("repositories[{index}].name is required")));
      }
      if repo.codebuild.project_name.is_empty() {
        return Err(ConfigError::Invalid(format!(
          "repositories[{index}].codebuild.project-name is required: {}",
          repo.name
        )));
      }
    }
    Ok(())
  }

  pub fn repository(&self, full_name: &str) -> Option<&Repository> {
    self.repositories.iter().find(|repo| repo.name == full_name)
  }

  /// The `aws` table of expressions. The region falls back to [`REGION_ENV`].
  pub fn aws(&self) -> Aws {
    let region = self
      .region
      .clone()
      .filter(|region| !region.is_empty())
      .or_else(|| std::env::var(REGION_ENV).ok())
      .unwrap_or_default();
    Aws {
      region,
      account_id: self.account_id.clone().unwrap_or_default(),
    }
  }

  /// A generator using the configured default status context.
  pub fn generator(&self) -> Generator {
    Generator::new().with_build_status_context(self.build_status_context.clone())
  }
}

impl Repository {
  /// The first hook whose condition holds for the event. A hook without a
  /// condition always matches.
  pub fn match_hook(&self, data: &Data) -> Result<Option<&Hook>, ExprError> {
    if self.hooks.iter().all(|hook| hook.condition.is_none()) {
      return Ok(self.hooks.first());
    }

    let evaluator = Evaluator::new(data)?;
    let scope = evaluator.scope();
    for hook in &self.hooks {
      match &hook.condition {
        Some(condition) if !condition.run(&scope)? => continue,
        _ => return Ok(Some(hook)),
      }
    }
    Ok(None)
  }
}
