//! Shared helpers for library integration tests.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use lambuild_lib::Buildspec;
use lambuild_lib::context::{
  Commit, CommitFile, Data, Event, Label, PullRequest, Repository, ScmError, SourceControl,
};

/// Get path to a fixture file.
pub fn fixture_path(name: &str) -> PathBuf {
  PathBuf::from(env!("CARGO_MANIFEST_DIR"))
    .join("tests")
    .join("fixtures")
    .join(name)
}

pub fn fixture(name: &str) -> Buildspec {
  Buildspec::from_file(&fixture_path(name)).unwrap_or_else(|e| panic!("Failed to load fixture {}: {}", name, e))
}

/// A fake hosting service with one pull request.
pub struct FakeScm {
  pub pull_request: PullRequest,
  pub files: Vec<String>,
  pub calls: AtomicUsize,
}

impl FakeScm {
  pub fn new(labels: &[&str], files: &[&str]) -> Self {
    Self {
      pull_request: PullRequest {
        number: 12,
        title: "Update".to_string(),
        state: "open".to_string(),
        labels: labels
          .iter()
          .map(|name| Label {
            name: name.to_string(),
          })
          .collect(),
        changed_files: files.len() as u64,
        ..Default::default()
      },
      files: files.iter().map(|f| f.to_string()).collect(),
      calls: AtomicUsize::new(0),
    }
  }

  pub fn calls(&self) -> usize {
    self.calls.load(Ordering::SeqCst)
  }
}

impl SourceControl for FakeScm {
  fn get_commit(&self, _repo: &Repository, sha: &str) -> Result<Commit, ScmError> {
    self.calls.fetch_add(1, Ordering::SeqCst);
    Ok(Commit {
      sha: sha.to_string(),
      message: "chore: update".to_string(),
    })
  }

  fn get_pull_request(&self, _repo: &Repository, _number: u64) -> Result<PullRequest, ScmError> {
    self.calls.fetch_add(1, Ordering::SeqCst);
    Ok(self.pull_request.clone())
  }

  fn list_pull_request_files(
    &self,
    _repo: &Repository,
    _number: u64,
    page: u32,
    per_page: u32,
  ) -> Result<Vec<CommitFile>, ScmError> {
    self.calls.fetch_add(1, Ordering::SeqCst);
    Ok(
      self
        .files
        .iter()
        .skip(((page - 1) * per_page) as usize)
        .take(per_page as usize)
        .map(|name| CommitFile {
          filename: name.clone(),
          ..Default::default()
        })
        .collect(),
    )
  }

  fn list_pull_requests_with_commit(&self, _repo: &Repository, _sha: &str) -> Result<Vec<PullRequest>, ScmError> {
    self.calls.fetch_add(1, Ordering::SeqCst);
    Ok(vec![self.pull_request.clone()])
  }
}

/// A push to `main` whose facts come from `scm`.
pub fn push(scm: Arc<FakeScm>) -> Data {
  let event = Event {
    name: "push".to_string(),
    delivery: "delivery".to_string(),
    payload: serde_json::json!({
      "ref": "refs/heads/main",
      "after": "abc123",
      "repository": { "full_name": "owner/repo" },
    }),
  };
  Data::from_event(event, scm).unwrap()
}

/// A pull request event whose remaining facts come from `scm`.
pub fn pull_request(scm: Arc<FakeScm>) -> Data {
  let pr = serde_json::to_value(&scm.pull_request).unwrap();
  let event = Event {
    name: "pull_request".to_string(),
    delivery: "delivery".to_string(),
    payload: serde_json::json!({
      "repository": { "full_name": "owner/repo" },
      "pull_request": pr,
    }),
  };
  Data::from_event(event, scm).unwrap()
}
