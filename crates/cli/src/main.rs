mod cmd;
mod output;

use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use cmd::{StepArgs, WorkspaceArgs, cmd_info, cmd_step, cmd_workspace};
use output::OutputFormat;

/// envinject - compute the environment of a build step
#[derive(Parser)]
#[command(name = "envinject")]
#[command(author, version, about, long_about = None)]
struct Cli {
  /// Enable debug logging
  #[arg(short, long, global = true)]
  verbose: bool,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Run the injection pipeline for a build step
  Step(StepArgs),

  /// Publish the variables available once the workspace exists
  Workspace(WorkspaceArgs),

  /// Show the local node as seen by the injector
  Info {
    /// Output format
    #[arg(short = 'o', long, value_enum, default_value = "text")]
    output: OutputFormat,
  },
}

fn main() -> Result<ExitCode> {
  let cli = Cli::parse();

  let filter = if cli.verbose {
    EnvFilter::new("debug")
  } else {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
  };
  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(std::io::stderr)
    .without_time()
    .init();

  match cli.command {
    Commands::Step(args) => cmd_step(args),
    Commands::Workspace(args) => cmd_workspace(args).map(|()| ExitCode::SUCCESS),
    Commands::Info { output } => cmd_info(output).map(|()| ExitCode::SUCCESS),
  }
}
