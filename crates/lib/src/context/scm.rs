//! The source-control boundary.
//!
//! Facts that are not part of the webhook payload are fetched through a
//! [`SourceControl`] implementation. The models only carry the fields that
//! expressions and templates read; unknown fields in API responses are ignored.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::Repository;

#[derive(Debug, Error)]
pub enum ScmError {
  #[error("source control request failed: {0}")]
  Request(String),
  #[error("source control is unavailable: {0}")]
  Unavailable(&'static str),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Commit {
  pub sha: String,
  pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Label {
  pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GitRef {
  #[serde(rename = "ref")]
  pub name: String,
  pub sha: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PullRequest {
  pub number: u64,
  pub title: String,
  pub state: String,
  pub draft: bool,
  pub labels: Vec<Label>,
  pub changed_files: u64,
  pub head: GitRef,
  pub base: GitRef,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommitFile {
  pub filename: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub previous_filename: Option<String>,
  pub status: String,
}

/// Read access to the hosting service of a repository.
pub trait SourceControl: Send + Sync {
  fn get_commit(&self, repo: &Repository, sha: &str) -> Result<Commit, ScmError>;

  fn get_pull_request(&self, repo: &Repository, number: u64) -> Result<PullRequest, ScmError>;

  /// Lists one page of the files changed by a pull request. Pages start at 1.
  fn list_pull_request_files(
    &self,
    repo: &Repository,
    number: u64,
    page: u32,
    per_page: u32,
  ) -> Result<Vec<CommitFile>, ScmError>;

  fn list_pull_requests_with_commit(&self, repo: &Repository, sha: &str) -> Result<Vec<PullRequest>, ScmError>;
}

/// A [`SourceControl`] that answers nothing.
///
/// Used when every fact an expression needs is seeded up front, e.g. from the
/// webhook payload or a local facts file.
#[derive(Debug, Clone, Copy, Default)]
pub struct Offline;

const OFFLINE: &str = "no source control client is configured";

impl SourceControl for Offline {
  fn get_commit(&self, _repo: &Repository, _sha: &str) -> Result<Commit, ScmError> {
    Err(ScmError::Unavailable(OFFLINE))
  }

  fn get_pull_request(&self, _repo: &Repository, _number: u64) -> Result<PullRequest, ScmError> {
    Err(ScmError::Unavailable(OFFLINE))
  }

  fn list_pull_request_files(
    &self,
    _repo: &Repository,
    _number: u64,
    _page: u32,
    _per_page: u32,
  ) -> Result<Vec<CommitFile>, ScmError> {
    Err(ScmError::Unavailable(OFFLINE))
  }

  fn list_pull_requests_with_commit(&self, _repo: &Repository, _sha: &str) -> Result<Vec<PullRequest>, ScmError> {
    Err(ScmError::Unavailable(OFFLINE))
  }
}
