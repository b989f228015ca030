mod cmd;
mod output;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use cmd::GenerateOptions;
use output::{OutputFormat, print_error};

#[derive(Parser)]
#[command(name = "lambuild")]
#[command(about = "Generate build inputs from a buildspec and a webhook event", long_about = None)]
#[command(version)]
struct Cli {
  /// Enable debug logging
  #[arg(short, long, global = true)]
  verbose: bool,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Generate the build input a webhook event would start
  Generate {
    /// Path to the buildspec
    buildspec: PathBuf,

    /// Path to the event payload (JSON)
    #[arg(short, long)]
    event: PathBuf,

    /// Event name, such as push or pull_request
    #[arg(short = 'n', long)]
    event_name: String,

    /// Delivery ID of the event
    #[arg(long)]
    delivery: Option<String>,

    /// Path to a JSON file with source-control facts (commit, pull_request, pr_files)
    #[arg(long)]
    facts: Option<PathBuf>,

    /// Path to the lambuild configuration (defaults to LAMBUILD_CONFIG when set)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value_t)]
    output: OutputFormat,
  },
  /// Check that buildspecs parse and report their mode
  Validate {
    /// Paths to buildspecs
    #[arg(required = true)]
    buildspecs: Vec<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value_t)]
    output: OutputFormat,
  },
}

/// `--verbose` wins, then `RUST_LOG`, then the configured `log-level`, then `warn`.
fn log_filter(verbose: bool, configured: Option<&str>) -> EnvFilter {
  if verbose {
    return EnvFilter::new("debug");
  }
  EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(configured.unwrap_or("warn").to_ascii_lowercase()))
}

fn init_tracing(filter: EnvFilter) {
  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(std::io::stderr)
    .without_time()
    .init();
}

fn run(cli: Cli) -> anyhow::Result<()> {
  match cli.command {
    Commands::Generate {
      buildspec,
      event,
      event_name,
      delivery,
      facts,
      config,
      output,
    } => {
      let config = cmd::load_config(config.as_deref())?;
      init_tracing(log_filter(
        cli.verbose,
        config.as_ref().and_then(|c| c.log_level.as_deref()),
      ));
      cmd::cmd_generate(
        &GenerateOptions {
          buildspec,
          event,
          event_name,
          delivery,
          facts,
        },
        config.as_ref(),
        output,
      )
    }
    Commands::Validate { buildspecs, output } => {
      init_tracing(log_filter(cli.verbose, None));
      cmd::cmd_validate(&buildspecs, output)
    }
  }
}

fn main() -> ExitCode {
  match run(Cli::parse()) {
    Ok(()) => ExitCode::SUCCESS,
    Err(e) => {
      print_error(&format!("{e:#}"));
      ExitCode::FAILURE
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serial_test::serial;

  #[test]
  #[serial]
  fn verbose_wins_over_everything() {
    temp_env::with_var("RUST_LOG", Some("error"), || {
      assert_eq!(log_filter(true, Some("info")).to_string(), "debug");
    });
  }

  #[test]
  #[serial]
  fn rust_log_wins_over_configured_level() {
    temp_env::with_var("RUST_LOG", Some("error"), || {
      assert_eq!(log_filter(false, Some("info")).to_string(), "error");
    });
  }

  #[test]
  #[serial]
  fn configured_level_applies_without_rust_log() {
    temp_env::with_var_unset("RUST_LOG", || {
      assert_eq!(log_filter(false, Some("INFO")).to_string(), "info");
      assert_eq!(log_filter(false, None).to_string(), "warn");
    });
  }
}
