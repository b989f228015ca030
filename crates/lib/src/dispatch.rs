//! Concurrent generation and submission for every document of one event.
//!
//! Each document gets its own task. Generation runs on the blocking pool, then
//! the resulting builds are submitted to the [`BuildService`]. Tasks never
//! cancel each other: every document is handled, and the first error in
//! document order is reported afterwards.

use std::future::Future;
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tokio::task::JoinSet;
use tracing::{error, info};

use crate::buildspec::Buildspec;
use crate::context::Data;
use crate::generate::{BatchBuildRequest, BuildInput, BuildRequest, GenerateError, Generator};

#[derive(Debug, Error)]
#[error("{0}")]
pub struct ServiceError(pub String);

#[derive(Debug, Error)]
pub enum DispatchError {
  #[error("failed to generate builds for {path}: {source}")]
  Generate {
    path: String,
    #[source]
    source: GenerateError,
  },

  #[error("failed to start a build for {path}: {source}")]
  StartBuild {
    path: String,
    #[source]
    source: ServiceError,
  },

  #[error("failed to start a batch build for {path}: {source}")]
  StartBuildBatch {
    path: String,
    #[source]
    source: ServiceError,
  },

  #[error("task for {path} did not complete: {message}")]
  Join { path: String, message: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartBuild {
  pub project_name: String,
  pub source_version: String,
  #[serde(flatten)]
  pub request: BuildRequest,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartBuildBatch {
  pub project_name: String,
  pub source_version: String,
  #[serde(flatten)]
  pub request: BatchBuildRequest,
}

/// The remote build service. Both calls return the id of what was started.
pub trait BuildService: Send + Sync + 'static {
  fn start_build(&self, input: StartBuild) -> impl Future<Output = Result<String, ServiceError>> + Send;

  fn start_build_batch(&self, input: StartBuildBatch) -> impl Future<Output = Result<String, ServiceError>> + Send;
}

/// A buildspec document and where it was found.
#[derive(Debug, Clone)]
pub struct Document {
  pub path: String,
  pub buildspec: Buildspec,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
  Skipped,
  Builds(Vec<String>),
  Batch(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentOutcome {
  pub path: String,
  pub outcome: Outcome,
}

pub struct Dispatcher<S> {
  service: Arc<S>,
  generator: Arc<Generator>,
  project_name: String,
}

impl<S: BuildService> Dispatcher<S> {
  pub fn new(service: S, generator: Generator, project_name: impl Into<String>) -> Self {
    Self {
      service: Arc::new(service),
      generator: Arc::new(generator),
      project_name: project_name.into(),
    }
  }

  pub fn service(&self) -> &S {
    &self.service
  }

  /// Generates and submits every document concurrently.
  ///
  /// Returns the outcome of each document in input order, or the first error
  /// in input order once every task has finished.
  pub async fn dispatch(&self, data: &Data, documents: Vec<Document>) -> Result<Vec<DocumentOutcome>, DispatchError> {
    info!(documents = documents.len(), "dispatching documents");

    let paths: Vec<String> = documents.iter().map(|d| d.path.clone()).collect();
    let mut join_set = JoinSet::new();

    for (index, document) in documents.into_iter().enumerate() {
      let service = self.service.clone();
      let generator = self.generator.clone();
      let project_name = self.project_name.clone();
      let data = data.clone();

      join_set.spawn(async move { (index, run(service, generator, project_name, data, document).await) });
    }

    let mut results: Vec<Option<Result<Outcome, DispatchError>>> = paths.iter().map(|_| None).collect();
    while let Some(join_result) = join_set.join_next().await {
      match join_result {
        Ok((index, result)) => {
          if let Err(e) = &result {
            error!(path = %paths[index], error = %e, "document failed");
          }
          results[index] = Some(result);
        }
        Err(e) => {
          error!(error = %e, "dispatch task panicked");
        }
      }
    }

    paths
      .into_iter()
      .zip(results)
      .map(|(path, result)| match result {
        Some(result) => result.map(|outcome| DocumentOutcome { path, outcome }),
        None => Err(DispatchError::Join {
          message: "the task panicked".to_string(),
          path,
        }),
      })
      .collect()
  }
}

async fn run<S: BuildService>(
  service: Arc<S>,
  generator: Arc<Generator>,
  project_name: String,
  data: Data,
  document: Document,
) -> Result<Outcome, DispatchError> {
  let Document { path, buildspec } = document;
  let source_version = data.sha.clone();

  let input = tokio::task::spawn_blocking(move || generator.generate(&data, &buildspec))
    .await
    .map_err(|e| DispatchError::Join {
      path: path.clone(),
      message: e.to_string(),
    })?
    .map_err(|source| DispatchError::Generate {
      path: path.clone(),
      source,
    })?;

  match input {
    BuildInput::Empty => {
      info!(path = %path, "no build is started");
      Ok(Outcome::Skipped)
    }
    BuildInput::Builds(requests) => {
      let mut ids = Vec::with_capacity(requests.len());
      for request in requests {
        let id = service
          .start_build(StartBuild {
            project_name: project_name.clone(),
            source_version: source_version.clone(),
            request,
          })
          .await
          .map_err(|source| DispatchError::StartBuild {
            path: path.clone(),
            source,
          })?;
        info!(path = %path, build_id = %id, "started a build");
        ids.push(id);
      }
      Ok(Outcome::Builds(ids))
    }
    BuildInput::Batch(request) => {
      let id = service
        .start_build_batch(StartBuildBatch {
          project_name,
          source_version,
          request,
        })
        .await
        .map_err(|source| DispatchError::StartBuildBatch {
          path: path.clone(),
          source,
        })?;
      info!(path = %path, batch_id = %id, "started a batch build");
      Ok(Outcome::Batch(id))
    }
  }
}
