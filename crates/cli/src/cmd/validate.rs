//! Validate command implementation.

use std::path::PathBuf;

use anyhow::{Result, bail};
use serde::Serialize;

use lambuild_lib::Buildspec;
use lambuild_lib::generate::Mode;

use crate::output::{OutputFormat, print_error, print_json, print_success};

#[derive(Debug, Serialize)]
struct Report {
  path: String,
  valid: bool,
  #[serde(skip_serializing_if = "Option::is_none")]
  mode: Option<&'static str>,
  #[serde(skip_serializing_if = "Option::is_none")]
  error: Option<String>,
}

pub fn cmd_validate(buildspecs: &[PathBuf], format: OutputFormat) -> Result<()> {
  let reports: Vec<Report> = buildspecs
    .iter()
    .map(|path| match Buildspec::from_file(path) {
      Ok(buildspec) => Report {
        path: path.display().to_string(),
        valid: true,
        mode: Some(Mode::of(&buildspec).as_str()),
        error: None,
      },
      Err(e) => Report {
        path: path.display().to_string(),
        valid: false,
        mode: None,
        error: Some(e.to_string()),
      },
    })
    .collect();

  if format.is_json() {
    print_json(&reports)?;
  } else {
    for report in &reports {
      match (&report.mode, &report.error) {
        (Some(mode), _) => print_success(&format!("{} ({mode} mode)", report.path)),
        (None, Some(error)) => print_error(&format!("{}: {error}", report.path)),
        (None, None) => {}
      }
    }
  }

  let invalid = reports.iter().filter(|r| !r.valid).count();
  if invalid > 0 {
    bail!("{invalid} of {} buildspecs are invalid", reports.len());
  }
  Ok(())
}
