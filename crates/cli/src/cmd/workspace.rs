//! Implementation of the `envinject workspace` command.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use envinject_lib::{EnvInjector, MemoryRecord};

use super::InjectArgs;
use crate::output::{OutputFormat, print_info, print_json, print_success, print_vars};

#[derive(Args, Debug)]
pub struct WorkspaceArgs {
  #[command(flatten)]
  pub inject: InjectArgs,

  /// The workspace that just became available
  #[arg(short, long)]
  pub workspace: PathBuf,

  /// Output format
  #[arg(short = 'o', long, value_enum, default_value = "text")]
  pub output: OutputFormat,
}

/// Execute the workspace command.
///
/// Prints nothing but a notice when the job does not keep build variables.
pub fn cmd_workspace(args: WorkspaceArgs) -> Result<()> {
  let config = args.inject.load_config()?;
  let prior = args.inject.prior_vars()?;
  let workspace = dunce::canonicalize(&args.workspace)
    .with_context(|| format!("Workspace not found: {}", args.workspace.display()))?;

  let injector = EnvInjector::new(args.inject.node()?);
  let mut record = MemoryRecord::new();

  let published = injector.before_workspace_use(config.as_ref(), &prior, &workspace, &mut record);

  match published {
    Some(vars) if args.output.is_json() => print_json(&serde_json::json!({ "published": true, "vars": vars }))?,
    Some(vars) => {
      print_success(&format!("Published {} workspace variable(s)", vars.len()));
      print_vars(&vars);
    }
    None if args.output.is_json() => print_json(&serde_json::json!({ "published": false }))?,
    None => print_info("Job does not keep build variables; nothing published"),
  }

  Ok(())
}
