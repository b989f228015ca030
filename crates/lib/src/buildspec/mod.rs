//! Buildspec documents extended with a `lambuild` block.
//!
//! A document is a CodeBuild buildspec plus:
//! - a `lambuild` block with a top-level condition, items and overrides
//! - `if` conditions on batch elements, matrix axis entries and phase commands
//!
//! Parsing compiles every expression. The parsed document keeps the original
//! YAML tree so that the CodeBuild-visible part can be re-emitted after the
//! conditional parts are evaluated and removed.

pub mod graph;
pub mod lambuild;
pub mod list;
pub mod matrix;
pub mod phase;

use std::collections::HashSet;
use std::path::Path;

use serde::Deserialize;
use serde_yaml::{Mapping, Value};
use thiserror::Error;
use tracing::debug;

use crate::expr::{ExprError, Scope};

pub use graph::{ElementEnv, GraphElement};
pub use lambuild::{ComputedEnv, Item, Lambuild, Overrides};
pub use list::ListElement;
pub use matrix::{Axis, AxisEntry, DynamicEnv, Matrix, MatrixDynamic, MatrixStatic};
pub use phase::{Command, Phase};

#[derive(Debug, Error)]
pub enum BuildspecError {
  #[error("failed to read {path}: {source}")]
  Read {
    path: String,
    #[source]
    source: std::io::Error,
  },

  #[error("invalid YAML: {0}")]
  Yaml(#[from] serde_yaml::Error),

  #[error("a buildspec must be a mapping")]
  NotAMapping,

  #[error("invalid `{section}`: {source}")]
  Section {
    section: &'static str,
    #[source]
    source: serde_yaml::Error,
  },

  #[error("duplicate identifier `{identifier}` in {section}")]
  DuplicateIdentifier { section: &'static str, identifier: String },
}

/// Errors raised while re-emitting a buildspec.
#[derive(Debug, Error)]
pub enum PayloadError {
  #[error("failed to evaluate {target}: {source}")]
  Command {
    target: String,
    #[source]
    source: ExprError,
  },

  #[error("failed to serialize the buildspec: {0}")]
  Serialization(#[from] serde_yaml::Error),
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct Batch {
  pub build_graph: Vec<GraphElement>,
  pub build_list: Vec<ListElement>,
  pub build_matrix: Option<Matrix>,
}

impl Batch {
  fn check_identifiers(&self) -> Result<(), BuildspecError> {
    check_unique("batch.build-graph", self.build_graph.iter().map(|e| e.identifier.as_str()))?;
    check_unique("batch.build-list", self.build_list.iter().map(|e| e.identifier.as_str()))
  }
}

fn check_unique<'a>(section: &'static str, identifiers: impl Iterator<Item = &'a str>) -> Result<(), BuildspecError> {
  let mut seen = HashSet::new();
  for identifier in identifiers {
    if !seen.insert(identifier) {
      return Err(BuildspecError::DuplicateIdentifier {
        section,
        identifier: identifier.to_string(),
      });
    }
  }
  Ok(())
}

#[derive(Debug, Clone, PartialEq)]
pub struct Buildspec {
  pub batch: Batch,
  pub lambuild: Lambuild,
  pub phases: Vec<(String, Phase)>,
  document: Mapping,
}

impl Buildspec {
  /// Parses a document and compiles every expression in it.
  pub fn from_yaml(content: &str) -> Result<Self, BuildspecError> {
    let document = match serde_yaml::from_str::<Value>(content)? {
      Value::Mapping(document) => document,
      Value::Null => Mapping::new(),
      _ => return Err(BuildspecError::NotAMapping),
    };

    let batch: Batch = section(&document, "batch")?;
    batch.check_identifiers()?;
    let lambuild: Lambuild = section(&document, "lambuild")?;

    let phases = match document.get("phases") {
      Some(Value::Mapping(phases)) => phases
        .iter()
        .filter_map(|(name, phase)| Some((name.as_str()?.to_string(), phase.clone())))
        .map(|(name, phase)| {
          let parsed = serde_yaml::from_value::<Phase>(phase).map_err(|source| BuildspecError::Section {
            section: "phases",
            source,
          })?;
          Ok((name, parsed))
        })
        .collect::<Result<Vec<_>, BuildspecError>>()?,
      _ => Vec::new(),
    };

    debug!(
      graph = batch.build_graph.len(),
      list = batch.build_list.len(),
      matrix = batch.build_matrix.is_some(),
      items = lambuild.items.len(),
      "parsed buildspec"
    );

    Ok(Self {
      batch,
      lambuild,
      phases,
      document,
    })
  }

  pub fn from_file(path: &Path) -> Result<Self, BuildspecError> {
    let content = std::fs::read_to_string(path).map_err(|source| BuildspecError::Read {
      path: path.display().to_string(),
      source,
    })?;
    Self::from_yaml(&content)
  }

  /// The `batch` mapping as written.
  pub fn raw_batch(&self) -> Mapping {
    match self.document.get("batch") {
      Some(Value::Mapping(batch)) => batch.clone(),
      _ => Mapping::new(),
    }
  }

  /// The document without `lambuild`, with phase commands filtered.
  pub fn payload(&self, scope: &Scope<'_>) -> Result<String, PayloadError> {
    let document = self.filtered_document(scope)?;
    Ok(serde_yaml::to_string(&document)?)
  }

  /// Like [`payload`](Self::payload), without `batch`. Used for single builds.
  pub fn payload_without_batch(&self, scope: &Scope<'_>) -> Result<String, PayloadError> {
    let mut document = self.filtered_document(scope)?;
    document.remove("batch");
    Ok(serde_yaml::to_string(&document)?)
  }

  /// Like [`payload`](Self::payload), with `batch` replaced by `batch`.
  pub fn payload_with_batch(&self, scope: &Scope<'_>, batch: Mapping) -> Result<String, PayloadError> {
    let mut document = self.filtered_document(scope)?;
    document.insert(Value::from("batch"), Value::Mapping(batch));
    Ok(serde_yaml::to_string(&document)?)
  }

  fn filtered_document(&self, scope: &Scope<'_>) -> Result<Mapping, PayloadError> {
    let mut document = self.document.clone();
    document.remove("lambuild");
    phase::apply(&self.phases, &mut document, scope).map_err(|(target, source)| PayloadError::Command { target, source })?;
    Ok(document)
  }
}

fn section<T: Default + for<'de> Deserialize<'de>>(document: &Mapping, name: &'static str) -> Result<T, BuildspecError> {
  match document.get(name) {
    Some(value) if !value.is_null() => {
      serde_yaml::from_value(value.clone()).map_err(|source| BuildspecError::Section { section: name, source })
    }
    _ => Ok(T::default()),
  }
}
