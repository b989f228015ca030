//! Generate command implementation.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::debug;

use lambuild_lib::config::{CONFIG_ENV, Config};
use lambuild_lib::context::{Commit, CommitFile, Event, Offline, PullRequest};
use lambuild_lib::generate::{BatchBuildRequest, BuildRequest, EnvironmentVariable};
use lambuild_lib::{BuildInput, Buildspec, Data, Generator};

use crate::output::{OutputFormat, print_info, print_json, print_stat, print_success, print_warning, summarize_buildspec, symbols};

pub struct GenerateOptions {
  pub buildspec: PathBuf,
  pub event: PathBuf,
  pub event_name: String,
  pub delivery: Option<String>,
  pub facts: Option<PathBuf>,
}

/// Source-control answers supplied up front, since the CLI never calls out.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Facts {
  commit: Option<Commit>,
  pull_request: Option<PullRequest>,
  pr_files: Option<Vec<CommitFile>>,
}

impl Facts {
  fn load(path: &Path) -> Result<Self> {
    let content = fs::read_to_string(path).with_context(|| format!("Failed to read facts: {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Failed to parse facts: {}", path.display()))
  }

  fn seed(self, data: &Data) {
    if let Some(commit) = self.commit {
      data.seed_commit(commit);
    }
    if let Some(pr) = self.pull_request {
      data.seed_pull_request(pr);
    }
    if let Some(files) = self.pr_files {
      data.seed_pr_files(files);
    }
  }
}

pub fn cmd_generate(opts: &GenerateOptions, config: Option<&Config>, format: OutputFormat) -> Result<()> {
  let buildspec = Buildspec::from_file(&opts.buildspec)
    .with_context(|| format!("Failed to load buildspec: {}", opts.buildspec.display()))?;

  let payload = fs::read_to_string(&opts.event)
    .with_context(|| format!("Failed to read event: {}", opts.event.display()))?;
  let payload: serde_json::Value =
    serde_json::from_str(&payload).with_context(|| format!("Failed to parse event: {}", opts.event.display()))?;

  let event = Event {
    name: opts.event_name.clone(),
    delivery: opts.delivery.clone().unwrap_or_default(),
    payload,
  };
  let data = Data::from_event(event, Arc::new(Offline)).context("Failed to read the event")?;
  let data = match config {
    Some(config) => data.with_aws(config.aws()),
    None => data,
  };
  debug!(repository = %data.repository.full_name, sha = %data.sha, "loaded event");

  if let Some(path) = &opts.facts {
    Facts::load(path)?.seed(&data);
  }

  let generator = config.map(Config::generator).unwrap_or_else(Generator::new);

  if !format.is_json()
    && let Some(config) = config
  {
    report_hook(config, &data)?;
  }

  let input = generator
    .generate(&data, &buildspec)
    .with_context(|| format!("Failed to generate build input: {}", opts.buildspec.display()))?;

  if format.is_json() {
    return print_json(&input);
  }
  print_input(&input);
  Ok(())
}

/// Reads the configuration from `path`, or from [`CONFIG_ENV`] when it is set.
pub fn load_config(path: Option<&Path>) -> Result<Option<Config>> {
  if let Some(path) = path {
    let config = Config::from_file(path).with_context(|| format!("Failed to load config: {}", path.display()))?;
    return Ok(Some(config));
  }
  if std::env::var_os(CONFIG_ENV).is_some() {
    let config = Config::from_env().with_context(|| format!("Failed to load config from {CONFIG_ENV}"))?;
    return Ok(Some(config));
  }
  Ok(None)
}

fn report_hook(config: &Config, data: &Data) -> Result<()> {
  let Some(repo) = config.repository(&data.repository.full_name) else {
    print_warning(&format!("Repository is not configured: {}", data.repository.full_name));
    return Ok(());
  };

  print_stat("project", &repo.codebuild.project_name);
  match repo.match_hook(data).context("Failed to evaluate hooks")? {
    Some(hook) => print_stat("hook", &hook.config),
    None => print_warning("No hook matches the event"),
  }
  Ok(())
}

fn print_input(input: &BuildInput) {
  match input {
    BuildInput::Empty => print_info("No build to run"),
    BuildInput::Builds(builds) => {
      let noun = if builds.len() == 1 { "build" } else { "builds" };
      print_success(&format!("{} {noun}", builds.len()));
      for (index, build) in builds.iter().enumerate() {
        println!("{} build {}", symbols::ARROW, index + 1);
        print_build(build);
      }
    }
    BuildInput::Batch(batch) => {
      print_success("Batch build");
      print_batch(batch);
    }
  }
}

fn print_build(build: &BuildRequest) {
  if let Some(buildspec) = &build.buildspec_override {
    print_stat("buildspec", &summarize_buildspec(buildspec));
  }
  print_optional("image", build.image_override.as_deref());
  print_optional("compute-type", build.compute_type_override.as_deref());
  print_optional("environment-type", build.environment_type_override.as_deref());
  print_flag("privileged-mode", build.privileged_mode_override);
  if let Some(depth) = build.git_clone_depth_override {
    print_stat("git-clone-depth", &depth.to_string());
  }
  print_flag("debug-session", build.debug_session_enabled);
  print_optional("build-status-context", build.build_status_context.as_deref());
  print_variables(&build.environment_variables_override);
}

fn print_batch(batch: &BatchBuildRequest) {
  print_stat("buildspec", &summarize_buildspec(&batch.buildspec_override));
  print_optional("image", batch.image_override.as_deref());
  print_optional("compute-type", batch.compute_type_override.as_deref());
  print_optional("environment-type", batch.environment_type_override.as_deref());
  print_flag("privileged-mode", batch.privileged_mode_override);
  if let Some(depth) = batch.git_clone_depth_override {
    print_stat("git-clone-depth", &depth.to_string());
  }
  print_variables(&batch.environment_variables_override);
}

fn print_optional(label: &str, value: Option<&str>) {
  if let Some(value) = value {
    print_stat(label, value);
  }
}

fn print_flag(label: &str, value: Option<bool>) {
  if let Some(value) = value {
    print_stat(label, &value.to_string());
  }
}

fn print_variables(variables: &[EnvironmentVariable]) {
  for var in variables {
    print_stat("env", &format!("{}={}", var.name, var.value));
  }
}
