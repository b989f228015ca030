//! Build input generation.
//!
//! [`Generator::generate`] turns one buildspec document and the context of one
//! event into a [`BuildInput`]:
//! 1. A false top-level `lambuild.if` yields [`BuildInput::Empty`] right away
//! 2. The mode is selected by content: build graph, then build list, then
//!    build matrix, then items
//! 3. The selected resolver filters conditional elements and decides between
//!    nothing, independent builds and one batch build
//!
//! Generation is synchronous. The only I/O it can trigger is the first read of
//! a lazy fact of the context.

mod graph;
mod item;
mod list;
mod matrix;
mod merge;
mod types;

use std::collections::BTreeMap;

use serde_yaml::Mapping;
use thiserror::Error;
use tracing::{debug, info};

use crate::buildspec::{Buildspec, PayloadError};
use crate::context::Data;
use crate::expr::{BoolExpr, Evaluator, ExprError, Scope};
use crate::template::{Template, TemplateError};

use merge::Settings;

pub use graph::prune_dependencies;
pub use matrix::size_of_variables;
pub use types::{BatchBuildRequest, BuildInput, BuildRequest, EnvironmentVariable};

#[derive(Debug, Error)]
pub enum GenerateError {
  #[error("failed to evaluate {target}: {source}")]
  Evaluation {
    target: String,
    #[source]
    source: ExprError,
  },

  #[error("failed to render the build status context: {0}")]
  Template(#[from] TemplateError),

  #[error("failed to serialize the buildspec: {0}")]
  Serialization(#[from] serde_yaml::Error),

  #[error("failed to prepare the expression runtime: {0}")]
  Runtime(ExprError),
}

impl From<PayloadError> for GenerateError {
  fn from(err: PayloadError) -> Self {
    match err {
      PayloadError::Command { target, source } => GenerateError::Evaluation { target, source },
      PayloadError::Serialization(source) => GenerateError::Serialization(source),
    }
  }
}

/// Evaluates an optional condition; an absent condition holds.
fn check(condition: Option<&BoolExpr>, scope: &Scope<'_>, target: impl FnOnce() -> String) -> Result<bool, GenerateError> {
  match condition {
    Some(condition) => condition.run(scope).map_err(|source| GenerateError::Evaluation {
      target: target(),
      source,
    }),
    None => Ok(true),
  }
}

/// The conditional pass shared by graph and list mode: keeps the elements
/// whose condition holds, in order.
fn filter_elements<'e, T>(
  elements: &'e [T],
  scope: &Scope<'_>,
  section: &str,
  condition: impl Fn(&T) -> Option<&BoolExpr>,
  identifier: impl Fn(&T) -> &str,
) -> Result<Vec<&'e T>, GenerateError> {
  let mut kept = Vec::with_capacity(elements.len());
  for element in elements {
    let id = identifier(element);
    if check(condition(element), scope, || format!("{section}[{id}].if"))? {
      kept.push(element);
    } else {
      debug!(build_identifier = id, "condition is false, skipping");
    }
  }
  Ok(kept)
}

/// How a document is turned into builds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
  Graph,
  List,
  Matrix,
  Items,
}

impl Mode {
  pub fn as_str(self) -> &'static str {
    match self {
      Mode::Graph => "graph",
      Mode::List => "list",
      Mode::Matrix => "matrix",
      Mode::Items => "items",
    }
  }

  pub fn of(buildspec: &Buildspec) -> Self {
    let batch = &buildspec.batch;
    if !batch.build_graph.is_empty() {
      Mode::Graph
    } else if !batch.build_list.is_empty() {
      Mode::List
    } else if batch
      .build_matrix
      .as_ref()
      .is_some_and(|m| m.static_env.is_some() || m.dynamic.is_populated())
    {
      Mode::Matrix
    } else {
      Mode::Items
    }
  }
}

#[derive(Debug, Clone, Default)]
pub struct Generator {
  build_status_context: Option<Template>,
}

impl Generator {
  pub fn new() -> Self {
    Self::default()
  }

  /// Sets the process-wide default build status context.
  pub fn with_build_status_context(mut self, template: Option<Template>) -> Self {
    self.build_status_context = template;
    self
  }

  pub fn generate(&self, data: &Data, buildspec: &Buildspec) -> Result<BuildInput, GenerateError> {
    let evaluator = Evaluator::new(data).map_err(GenerateError::Runtime)?;
    let scope = evaluator.scope();

    if !check(buildspec.lambuild.condition.as_ref(), &scope, || "lambuild.if".to_string())? {
      info!("lambuild.if is false, no build is run");
      return Ok(BuildInput::Empty);
    }

    let mode = Mode::of(buildspec);
    debug!(?mode, "selected generation mode");

    let request = Request {
      buildspec,
      scope: &scope,
      default_status_context: self.build_status_context.as_ref(),
    };
    match mode {
      Mode::Graph => graph::resolve(&request),
      Mode::List => list::resolve(&request),
      Mode::Matrix => matrix::resolve(&request),
      Mode::Items => item::resolve(&request),
    }
  }
}

/// Generates with no process-wide default status context.
pub fn generate(data: &Data, buildspec: &Buildspec) -> Result<BuildInput, GenerateError> {
  Generator::default().generate(data, buildspec)
}

/// State shared by the resolvers of one generation.
pub(crate) struct Request<'a> {
  buildspec: &'a Buildspec,
  scope: &'a Scope<'a>,
  default_status_context: Option<&'a Template>,
}

impl<'a> Request<'a> {
  fn lambuild_settings(&self) -> Settings {
    Settings::from_overrides(&self.buildspec.lambuild.overrides)
  }

  fn lambuild_variables(&self, scope: &Scope<'_>) -> Result<BTreeMap<String, String>, GenerateError> {
    merge::evaluate_variables(&self.buildspec.lambuild.overrides.env, scope, "lambuild")
  }

  /// Renders the most specific status context template. Blank output means
  /// no override.
  fn status_context(&self, specific: Option<&Template>, scope: &Scope<'_>) -> Result<Option<String>, GenerateError> {
    let template = specific
      .or(self.buildspec.lambuild.overrides.build_status_context.as_ref())
      .or(self.default_status_context);
    let Some(template) = template else {
      return Ok(None);
    };

    let rendered = template.render(scope)?;
    Ok((!rendered.is_empty()).then_some(rendered))
  }

  /// One build from the batch section: `buildspec` is the element's own path,
  /// or the document without `batch` when unset.
  fn single_build(
    &self,
    settings: Settings,
    buildspec: Option<&str>,
    variables: BTreeMap<String, String>,
  ) -> Result<BuildInput, GenerateError> {
    let buildspec = match buildspec {
      Some(path) => path.to_string(),
      None => self.buildspec.payload_without_batch(self.scope)?,
    };
    let variables = merge::overlay(self.lambuild_variables(self.scope)?, variables);
    let status = self.status_context(None, self.scope)?;

    Ok(BuildInput::Builds(vec![
      settings.or(self.lambuild_settings()).into_build(buildspec, variables, status),
    ]))
  }

  /// One batch build whose document carries `batch` in place of the original.
  fn batch_build(&self, batch: Mapping) -> Result<BuildInput, GenerateError> {
    let buildspec = self.buildspec.payload_with_batch(self.scope, batch)?;
    let variables = self.lambuild_variables(self.scope)?;

    Ok(BuildInput::Batch(self.lambuild_settings().into_batch(buildspec, variables)))
  }
}
