mod cmd;
mod output;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use cmd::{cmd_build, cmd_info, cmd_validate};
use output::OutputFormat;

/// dockbuild - build container images by driving the engine CLI
#[derive(Parser)]
#[command(name = "dockbuild")]
#[command(author, version, about, long_about = None)]
struct Cli {
  /// Enable debug logging
  #[arg(short, long, global = true)]
  verbose: bool,

  /// Engine executable to invoke instead of the configured one
  #[arg(long, global = true)]
  docker_path: Option<String>,

  /// Isolated engine client configuration directory
  #[arg(long, global = true)]
  config_dir: Option<PathBuf>,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Build an image from a configuration file
  Build {
    /// Path to the build file (.toml or .json)
    config: PathBuf,

    /// Output format
    #[arg(short = 'o', long, value_enum, default_value = "text")]
    format: OutputFormat,
  },

  /// Check a configuration file without running the engine
  Validate {
    /// Path to the build file (.toml or .json)
    config: PathBuf,
  },

  /// Show the installed engine version
  Info,
}

/// Global options forwarded to every subcommand.
pub struct EngineOptions {
  pub docker_path: Option<String>,
  pub config_dir: Option<PathBuf>,
}

fn main() -> Result<ExitCode> {
  let cli = Cli::parse();

  let level = if cli.verbose { "debug" } else { "info" };
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
    .with_writer(std::io::stderr)
    .without_time()
    .init();

  let engine = EngineOptions {
    docker_path: cli.docker_path,
    config_dir: cli.config_dir,
  };

  match cli.command {
    Commands::Build { config, format } => cmd_build(&config, &engine, format),
    Commands::Validate { config } => cmd_validate(&config, &engine),
    Commands::Info => cmd_info(&engine),
  }
}
