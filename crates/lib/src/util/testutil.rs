//! Test utilities for lambuild-lib.
//!
//! Canned webhook events and a [`SourceControl`] that records every call.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::context::{
  Commit, CommitFile, Data, Event, Label, Offline, PullRequest, Repository, ScmError, SourceControl,
};

pub fn push_event() -> Event {
  Event {
    name: "push".to_string(),
    delivery: "delivery-1".to_string(),
    payload: serde_json::json!({
      "ref": "refs/heads/main",
      "after": "0123456789abcdef",
      "head_commit": { "message": "feat: add lambuild" },
      "repository": { "full_name": "suzuki-shunsuke/test-lambuild" },
    }),
  }
}

pub fn pull_request_event() -> Event {
  Event {
    name: "pull_request".to_string(),
    delivery: "delivery-2".to_string(),
    payload: serde_json::json!({
      "action": "opened",
      "repository": { "full_name": "suzuki-shunsuke/test-lambuild" },
      "pull_request": {
        "number": 7,
        "title": "Add lambuild",
        "state": "open",
        "changed_files": 2,
        "labels": [{ "name": "ci" }, { "name": "enhancement" }],
        "head": { "ref": "feature/foo", "sha": "fedcba9876543210" },
        "base": { "ref": "main", "sha": "0000000000000000" },
      },
    }),
  }
}

/// A push context that can never reach a source control.
pub fn push_data() -> Data {
  Data::from_event(push_event(), Arc::new(Offline)).unwrap()
}

/// A pull request context whose changed files are seeded.
pub fn pull_request_data(files: &[&str]) -> Data {
  let data = Data::from_event(pull_request_event(), Arc::new(Offline)).unwrap();
  data.seed_pr_files(
    files
      .iter()
      .map(|name| CommitFile {
        filename: name.to_string(),
        previous_filename: None,
        status: "modified".to_string(),
      })
      .collect(),
  );
  data
}

/// Counts calls per method and answers with synthetic data.
#[derive(Debug)]
pub struct SpySourceControl {
  calls: Mutex<HashMap<&'static str, usize>>,
  with_pull_requests: bool,
  changed_files: u64,
}

impl Default for SpySourceControl {
  fn default() -> Self {
    Self {
      calls: Mutex::default(),
      with_pull_requests: true,
      changed_files: 2,
    }
  }
}

impl SpySourceControl {
  pub const PR_NUMBER: u64 = 42;

  pub fn without_pull_requests(mut self) -> Self {
    self.with_pull_requests = false;
    self
  }

  pub fn with_changed_files(mut self, count: u64) -> Self {
    self.changed_files = count;
    self
  }

  pub fn calls(&self, method: &str) -> usize {
    self.calls.lock().get(method).copied().unwrap_or(0)
  }

  pub fn total_calls(&self) -> usize {
    self.calls.lock().values().sum()
  }

  fn record(&self, method: &'static str) {
    *self.calls.lock().entry(method).or_default() += 1;
  }

  fn pull_request(&self) -> PullRequest {
    PullRequest {
      number: Self::PR_NUMBER,
      title: "spy".to_string(),
      state: "open".to_string(),
      changed_files: self.changed_files,
      labels: vec![Label {
        name: "spy".to_string(),
      }],
      ..Default::default()
    }
  }
}

impl SourceControl for SpySourceControl {
  fn get_commit(&self, _repo: &Repository, sha: &str) -> Result<Commit, ScmError> {
    self.record("get_commit");
    Ok(Commit {
      sha: sha.to_string(),
      message: format!("commit {sha}"),
    })
  }

  fn get_pull_request(&self, _repo: &Repository, _number: u64) -> Result<PullRequest, ScmError> {
    self.record("get_pull_request");
    Ok(self.pull_request())
  }

  fn list_pull_request_files(
    &self,
    _repo: &Repository,
    _number: u64,
    page: u32,
    per_page: u32,
  ) -> Result<Vec<CommitFile>, ScmError> {
    self.record("list_pull_request_files");
    let start = u64::from(page - 1) * u64::from(per_page);
    let end = (start + u64::from(per_page)).min(self.changed_files);
    Ok(
      (start..end)
        .map(|i| CommitFile {
          filename: format!("file-{i}.txt"),
          previous_filename: None,
          status: "modified".to_string(),
        })
        .collect(),
    )
  }

  fn list_pull_requests_with_commit(&self, _repo: &Repository, _sha: &str) -> Result<Vec<PullRequest>, ScmError> {
    self.record("list_pull_requests_with_commit");
    if self.with_pull_requests {
      Ok(vec![self.pull_request()])
    } else {
      Ok(Vec::new())
    }
  }
}
