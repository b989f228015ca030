//! The per-event evaluation context.
//!
//! [`Data`] carries everything expressions and templates can observe about the
//! triggering event: the raw event, the repository, the commit SHA and ref, and
//! a set of lazily fetched facts (commit, pull request, changed files, labels).
//!
//! Lazy facts live in [`Memo`] cells behind an `Arc`, so clones of a `Data`
//! share them. Each fact is fetched at most once per event, no matter how many
//! documents or expressions ask for it.

mod memo;
mod scm;

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;
use tracing::debug;

pub use memo::Memo;
pub use scm::{Commit, CommitFile, GitRef, Label, Offline, PullRequest, ScmError, SourceControl};

/// Page size used when listing pull request files.
pub const MAX_PER_PAGE: u32 = 100;

#[derive(Debug, Error)]
pub enum ContextError {
  #[error("unsupported event: {0}")]
  UnsupportedEvent(String),
  #[error("the event payload is missing `{0}`")]
  MissingField(&'static str),
  #[error("the event payload is malformed: {0}")]
  InvalidPayload(String),
  #[error("no pull request is associated with commit {0}")]
  NoPullRequest(String),
  #[error(transparent)]
  SourceControl(#[from] ScmError),
}

/// The raw triggering event.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Event {
  pub name: String,
  #[serde(default)]
  pub delivery: String,
  #[serde(default)]
  pub payload: JsonValue,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repository {
  pub full_name: String,
  pub owner: String,
  pub name: String,
}

impl Repository {
  /// Splits `owner/name` into its parts. A name without a slash has no owner.
  pub fn from_full_name(full_name: &str) -> Self {
    let (owner, name) = full_name.split_once('/').unwrap_or(("", full_name));
    Self {
      full_name: full_name.to_string(),
      owner: owner.to_string(),
      name: name.to_string(),
    }
  }
}

/// Where the builds run, as exposed to expressions under `aws`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Aws {
  pub region: String,
  pub account_id: String,
}

#[derive(Debug, Default)]
struct Facts {
  commit: Memo<Commit>,
  commit_message: Memo<String>,
  pr_number: Memo<Option<u64>>,
  pull_request: Memo<PullRequest>,
  pr_files: Memo<Vec<CommitFile>>,
  pr_file_names: Memo<Vec<String>>,
  pr_label_names: Memo<Vec<String>>,
}

#[derive(Clone)]
pub struct Data {
  pub event: Event,
  pub repository: Repository,
  pub sha: String,
  pub r#ref: String,
  pub aws: Aws,
  source_control: Arc<dyn SourceControl>,
  facts: Arc<Facts>,
}

impl fmt::Debug for Data {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Data")
      .field("event", &self.event.name)
      .field("repository", &self.repository.full_name)
      .field("sha", &self.sha)
      .field("ref", &self.r#ref)
      .finish_non_exhaustive()
  }
}

impl Data {
  pub fn new(
    event: Event,
    repository: Repository,
    sha: impl Into<String>,
    r#ref: impl Into<String>,
    source_control: Arc<dyn SourceControl>,
  ) -> Self {
    Self {
      event,
      repository,
      sha: sha.into(),
      r#ref: r#ref.into(),
      aws: Aws::default(),
      source_control,
      facts: Arc::default(),
    }
  }

  pub fn with_aws(mut self, aws: Aws) -> Self {
    self.aws = aws;
    self
  }

  /// Builds the context for a webhook event.
  ///
  /// Only `push` and `pull_request` events are supported. Facts carried by the
  /// payload are seeded so that they are never fetched:
  /// - `push`: the head commit message
  /// - `pull_request`: the pull request, its number and its labels
  pub fn from_event(event: Event, source_control: Arc<dyn SourceControl>) -> Result<Self, ContextError> {
    let full_name = str_field(&event.payload, "/repository/full_name", "repository.full_name")?.to_string();
    let repository = Repository::from_full_name(&full_name);

    match event.name.as_str() {
      "push" => {
        let sha = str_field(&event.payload, "/after", "after")?.to_string();
        let r#ref = str_field(&event.payload, "/ref", "ref")?.to_string();
        let message = event
          .payload
          .pointer("/head_commit/message")
          .and_then(JsonValue::as_str)
          .map(str::to_string);

        let data = Self::new(event, repository, sha, r#ref, source_control);
        if let Some(message) = message {
          data.seed_commit_message(message);
        }
        Ok(data)
      }
      "pull_request" => {
        let raw = event
          .payload
          .get("pull_request")
          .cloned()
          .ok_or(ContextError::MissingField("pull_request"))?;
        let pr: PullRequest =
          serde_json::from_value(raw).map_err(|e| ContextError::InvalidPayload(format!("pull_request: {e}")))?;

        let data = Self::new(event, repository, pr.head.sha.clone(), pr.head.name.clone(), source_control);
        data.seed_pull_request(pr);
        Ok(data)
      }
      other => Err(ContextError::UnsupportedEvent(other.to_string())),
    }
  }

  pub fn seed_commit(&self, commit: Commit) {
    self.facts.commit_message.set(commit.message.clone());
    self.facts.commit.set(commit);
  }

  pub fn seed_commit_message(&self, message: impl Into<String>) {
    self.facts.commit_message.set(message.into());
  }

  /// Seeds the pull request together with its number and label names.
  pub fn seed_pull_request(&self, pr: PullRequest) {
    self.facts.pr_number.set(Some(pr.number));
    self
      .facts
      .pr_label_names
      .set(pr.labels.iter().map(|label| label.name.clone()).collect());
    self.facts.pull_request.set(pr);
  }

  pub fn seed_pr_files(&self, files: Vec<CommitFile>) {
    self.facts.pr_files.set(files);
  }

  /// The commit at `sha`.
  pub fn commit(&self) -> Result<Commit, ContextError> {
    self.facts.commit.get_or_try_init(|| {
      debug!(sha = %self.sha, "fetching commit");
      Ok(self.source_control.get_commit(&self.repository, &self.sha)?)
    })
  }

  pub fn commit_message(&self) -> Result<String, ContextError> {
    self
      .facts
      .commit_message
      .get_or_try_init(|| Ok(self.commit()?.message))
  }

  /// The number of the pull request associated with the commit, if any.
  ///
  /// When several pull requests contain the commit, the first one reported by
  /// the source control wins.
  pub fn pr_number(&self) -> Result<Option<u64>, ContextError> {
    self.facts.pr_number.get_or_try_init(|| {
      if let Some(pr) = self.facts.pull_request.get() {
        return Ok(Some(pr.number));
      }
      debug!(sha = %self.sha, "looking up pull requests with commit");
      let prs = self
        .source_control
        .list_pull_requests_with_commit(&self.repository, &self.sha)?;
      Ok(prs.first().map(|pr| pr.number))
    })
  }

  pub fn pull_request(&self) -> Result<PullRequest, ContextError> {
    self.facts.pull_request.get_or_try_init(|| {
      let number = self
        .pr_number()?
        .ok_or_else(|| ContextError::NoPullRequest(self.sha.clone()))?;
      debug!(number, "fetching pull request");
      Ok(self.source_control.get_pull_request(&self.repository, number)?)
    })
  }

  /// The pull request if it has already been seeded or fetched. Never fetches.
  pub fn cached_pull_request(&self) -> Option<PullRequest> {
    self.facts.pull_request.get()
  }

  /// Every file changed by the pull request.
  ///
  /// Files are listed [`MAX_PER_PAGE`] at a time. The number of pages comes
  /// from the pull request's changed file count, and listing stops early at the
  /// first short page.
  pub fn pr_files(&self) -> Result<Vec<CommitFile>, ContextError> {
    self.facts.pr_files.get_or_try_init(|| {
      let pr = self.pull_request()?;
      if pr.changed_files == 0 {
        return Ok(Vec::new());
      }

      let pages = pr.changed_files / u64::from(MAX_PER_PAGE) + 1;
      let mut files = Vec::new();
      for page in 1..=pages {
        let page = u32::try_from(page).map_err(|_| ContextError::InvalidPayload("too many changed files".into()))?;
        let batch = self
          .source_control
          .list_pull_request_files(&self.repository, pr.number, page, MAX_PER_PAGE)?;
        let short = batch.len() < MAX_PER_PAGE as usize;
        files.extend(batch);
        if short {
          break;
        }
      }

      debug!(number = pr.number, count = files.len(), "listed pull request files");
      Ok(files)
    })
  }

  /// Changed file names including the previous names of renamed files,
  /// deduplicated in first-seen order.
  pub fn pr_file_names(&self) -> Result<Vec<String>, ContextError> {
    self.facts.pr_file_names.get_or_try_init(|| {
      let mut names: Vec<String> = Vec::new();
      for file in self.pr_files()? {
        for name in std::iter::once(file.filename).chain(file.previous_filename) {
          if !name.is_empty() && !names.contains(&name) {
            names.push(name);
          }
        }
      }
      Ok(names)
    })
  }

  pub fn pr_label_names(&self) -> Result<Vec<String>, ContextError> {
    self
      .facts
      .pr_label_names
      .get_or_try_init(|| Ok(self.pull_request()?.labels.into_iter().map(|label| label.name).collect()))
  }
}

fn str_field<'a>(payload: &'a JsonValue, pointer: &str, name: &'static str) -> Result<&'a str, ContextError> {
  payload
    .pointer(pointer)
    .and_then(JsonValue::as_str)
    .ok_or(ContextError::MissingField(name))
}
