//! Implementation of the `envinject step` command.
//!
//! Runs the injection pipeline the way a scheduler would right before a
//! build step, then prints the published variables.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;
use tracing::warn;

use envinject_lib::script::{MemorySink, Stream, interrupt_pair};
use envinject_lib::system::BuildContext;
use envinject_lib::{EnvInjector, InjectError, MemoryRecord, ResolutionResult};

use super::{InjectArgs, parse_key_value};
use crate::output::{OutputFormat, print_error, print_json, print_stat, print_success, print_vars};

#[derive(Args, Debug)]
pub struct StepArgs {
  #[command(flatten)]
  pub inject: InjectArgs,

  /// Workspace of the build, exported as WORKSPACE (defaults to the node root)
  #[arg(short, long)]
  pub workspace: Option<PathBuf>,

  /// Job name
  #[arg(long, default_value = "job")]
  pub job: String,

  /// Build number
  #[arg(long, default_value_t = 1)]
  pub build_number: u64,

  /// Build parameter (repeatable)
  #[arg(long = "param", value_name = "KEY=VALUE", value_parser = parse_key_value)]
  pub params: Vec<(String, String)>,

  /// Abort the step after this long (e.g., "30s", "5m")
  #[arg(long, value_parser = humantime::parse_duration)]
  pub timeout: Option<Duration>,

  /// Output format
  #[arg(short = 'o', long, value_enum, default_value = "text")]
  pub output: OutputFormat,
}

#[derive(Debug, Serialize)]
struct StepReport<'a> {
  #[serde(flatten)]
  result: &'a ResolutionResult,
  elapsed: String,
  output: Vec<OutputLine>,
}

#[derive(Debug, Serialize)]
struct OutputLine {
  stream: Stream,
  line: String,
}

#[derive(Debug, Serialize)]
struct StepFailure {
  kind: String,
  error: String,
  elapsed: String,
  output: Vec<OutputLine>,
}

/// Execute the step command.
///
/// Exits with the script's exit code when the injection script fails, with
/// 1 for any other injection failure.
pub fn cmd_step(args: StepArgs) -> Result<ExitCode> {
  let config = args.inject.load_config()?;
  let prior = args.inject.prior_vars()?;
  let node = args.inject.node()?;

  let mut build = BuildContext::new(args.job.as_str(), args.build_number);
  build.node_name = Some(node.name.clone());
  build.workspace = Some(match &args.workspace {
    Some(dir) => dunce::canonicalize(dir).with_context(|| format!("Workspace not found: {}", dir.display()))?,
    None => node.root.clone(),
  });
  build.parameters = args.params.iter().cloned().collect();

  let (handle, interrupt) = interrupt_pair();
  let mut injector = EnvInjector::new(node).with_interrupt(interrupt);
  if let Some(central) = args.inject.central()? {
    injector = injector.with_central(central);
  }

  // Script output is folded into the JSON report instead of the log
  let sink = Arc::new(MemorySink::new());
  if args.output.is_json() {
    injector = injector.with_sink(sink.clone());
  }

  let rt = tokio::runtime::Runtime::new().context("Failed to create async runtime")?;
  let started = Instant::now();
  let mut record = MemoryRecord::new();

  let outcome = rt.block_on(async {
    if let Some(timeout) = args.timeout {
      tokio::spawn(async move {
        tokio::time::sleep(timeout).await;
        warn!(timeout = %humantime::format_duration(timeout), "step timed out; interrupting");
        handle.interrupt();
      });
    }
    injector.before_step(config.as_ref(), &build, &prior, &mut record).await
  });

  let elapsed = humantime::format_duration(round_to_millis(started.elapsed())).to_string();
  let output = sink
    .entries()
    .into_iter()
    .map(|(stream, line)| OutputLine { stream, line })
    .collect();

  match outcome {
    Ok(result) => {
      if args.output.is_json() {
        print_json(&StepReport {
          result: &result,
          elapsed,
          output,
        })?;
      } else {
        print_success(&format!("Injected {} variable(s) in {}", result.vars.len(), elapsed));
        if let Some(code) = result.exit_code {
          print_stat("Script exit code", &code.to_string());
        }
        print_vars(&result.vars);
      }
      Ok(ExitCode::SUCCESS)
    }
    Err(err) => {
      if args.output.is_json() {
        print_json(&StepFailure {
          kind: err.kind().to_string(),
          error: err.to_string(),
          elapsed,
          output,
        })?;
      } else {
        print_error(&format!("Injection failed ({} error): {}", err.kind(), err));
      }
      Ok(exit_code_for(&err))
    }
  }
}

fn exit_code_for(err: &InjectError) -> ExitCode {
  match err {
    InjectError::NonZeroExit { code } => u8::try_from(*code)
      .ok()
      .filter(|c| *c != 0)
      .map_or(ExitCode::FAILURE, ExitCode::from),
    _ => ExitCode::FAILURE,
  }
}

fn round_to_millis(duration: Duration) -> Duration {
  Duration::from_millis(duration.as_millis().try_into().unwrap_or(u64::MAX))
}
