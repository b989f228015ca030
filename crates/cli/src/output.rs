//! CLI output formatting utilities.
//!
//! Colored status lines, labelled fields and JSON output.

use anyhow::Context;
use clap::ValueEnum;
use owo_colors::{OwoColorize, Stream};

#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
  #[default]
  Text,
  Json,
}

impl OutputFormat {
  pub fn is_json(self) -> bool {
    matches!(self, OutputFormat::Json)
  }
}

pub mod symbols {
  pub const SUCCESS: &str = "✓";
  pub const ERROR: &str = "✗";
  pub const WARNING: &str = "⚠";
  pub const INFO: &str = "•";
  pub const ARROW: &str = "→";
}

/// A buildspec override is either a path or a whole inline document.
pub fn summarize_buildspec(buildspec: &str) -> String {
  let lines = buildspec.lines().count();
  if lines <= 1 {
    return buildspec.trim().to_string();
  }
  format!("inline ({lines} lines)")
}

pub fn print_success(message: &str) {
  println!(
    "{} {}",
    symbols::SUCCESS.if_supports_color(Stream::Stdout, |s| s.green()),
    message
  );
}

pub fn print_error(message: &str) {
  eprintln!(
    "{} {}",
    symbols::ERROR.if_supports_color(Stream::Stderr, |s| s.red()),
    message.if_supports_color(Stream::Stderr, |s| s.red())
  );
}

pub fn print_warning(message: &str) {
  eprintln!(
    "{} {}",
    symbols::WARNING.if_supports_color(Stream::Stderr, |s| s.yellow()),
    message.if_supports_color(Stream::Stderr, |s| s.yellow())
  );
}

pub fn print_info(message: &str) {
  println!(
    "{} {}",
    symbols::INFO.if_supports_color(Stream::Stdout, |s| s.blue()),
    message
  );
}

pub fn print_stat(label: &str, value: &str) {
  println!(
    "  {}: {}",
    label.if_supports_color(Stream::Stdout, |s| s.dimmed()),
    value
  );
}

pub fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
  let json = serde_json::to_string_pretty(value).context("Failed to serialize to JSON")?;
  println!("{}", json);
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_summarize_buildspec() {
    assert_eq!(summarize_buildspec("build.yml"), "build.yml");
    assert_eq!(summarize_buildspec(""), "");
    assert_eq!(
      summarize_buildspec("version: 0.2\nphases:\n  build:\n    commands: [make]\n"),
      "inline (4 lines)"
    );
  }

  #[test]
  fn test_colored_helpers_print() {
    print_success("generated");
    print_info("no build to run");
    print_stat("image", "alpine");
    print_warning("repository is not configured");
    print_error("failed");
    print_json(&serde_json::json!({ "kind": "empty" })).unwrap();
  }

  #[test]
  fn test_output_format_is_json() {
    assert!(OutputFormat::Json.is_json());
    assert!(!OutputFormat::Text.is_json());
  }
}
