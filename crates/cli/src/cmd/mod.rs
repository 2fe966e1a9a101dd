mod info;
mod step;
mod workspace;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use clap::Args;

use envinject_lib::JobConfig;
use envinject_lib::properties::parse_properties;
use envinject_lib::system::NodeContext;
use envinject_lib::vars::{PrecedenceChain, VariableSet};

pub use info::cmd_info;
pub use step::{StepArgs, cmd_step};
pub use workspace::{WorkspaceArgs, cmd_workspace};

/// Inputs shared by the commands that run the injector.
#[derive(Args, Debug)]
pub struct InjectArgs {
  /// Job configuration file (JSON)
  #[arg(short, long)]
  pub config: Option<PathBuf>,

  /// Root of the node running the step
  #[arg(long, default_value = ".")]
  pub node_root: PathBuf,

  /// Root of the central host (defaults to the node root)
  #[arg(long)]
  pub central_root: Option<PathBuf>,

  /// Variable established by an earlier step (repeatable)
  #[arg(long = "prior", value_name = "KEY=VALUE", value_parser = parse_key_value)]
  pub prior: Vec<(String, String)>,

  /// Properties file with variables established by earlier steps
  #[arg(long)]
  pub prior_file: Option<PathBuf>,

  /// Variable configured on the node (repeatable)
  #[arg(long = "node-var", value_name = "KEY=VALUE", value_parser = parse_key_value)]
  pub node_vars: Vec<(String, String)>,
}

impl InjectArgs {
  pub fn load_config(&self) -> Result<Option<JobConfig>> {
    self
      .config
      .as_deref()
      .map(|path| JobConfig::from_file(path).context("Failed to load job configuration"))
      .transpose()
  }

  /// Prior variables: the `--prior-file` entries overridden by `--prior` flags.
  pub fn prior_vars(&self) -> Result<VariableSet> {
    let from_file = match &self.prior_file {
      Some(path) => read_properties(path)?,
      None => VariableSet::new(),
    };
    let from_flags: VariableSet = self.prior.iter().cloned().collect();
    Ok(PrecedenceChain::new().then(&from_file).then(&from_flags).merge())
  }

  pub fn node(&self) -> Result<NodeContext> {
    let root = canonical(&self.node_root)?;
    Ok(NodeContext::local(root).with_node_vars(self.node_vars.iter().cloned().collect()))
  }

  pub fn central(&self) -> Result<Option<NodeContext>> {
    let Some(root) = self.central_root.as_deref() else {
      return Ok(None);
    };
    let mut central = NodeContext::local(canonical(root)?);
    central.name = "central".to_string();
    Ok(Some(central))
  }
}

fn read_properties(path: &Path) -> Result<VariableSet> {
  let text = std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
  parse_properties(&text).with_context(|| format!("Failed to parse {}", path.display()))
}

fn canonical(path: &Path) -> Result<PathBuf> {
  dunce::canonicalize(path).with_context(|| format!("Directory not found: {}", path.display()))
}

fn parse_key_value(raw: &str) -> Result<(String, String)> {
  let (key, value) = raw
    .split_once('=')
    .ok_or_else(|| anyhow!("expected KEY=VALUE, got '{raw}'"))?;
  if key.is_empty() {
    return Err(anyhow!("empty variable name in '{raw}'"));
  }
  Ok((key.to_string(), value.to_string()))
}
