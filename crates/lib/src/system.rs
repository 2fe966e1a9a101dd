//! Host and build metadata variables.
//!
//! The pipeline never reads ambient state on its own: the scheduler passes a
//! [`NodeContext`] for the node running the step (and one for the central
//! host) plus a [`BuildContext`] describing the build.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::consts::{APP_NAME, LOCAL_NODE_NAME};
use crate::placeholder;
use crate::script::ShellDialect;
use crate::vars::VariableSet;

/// Snapshot of the current process environment, sorted by name.
pub fn system_variables() -> VariableSet {
  let mut vars: Vec<(String, String)> = std::env::vars_os()
    .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)))
    .collect();
  vars.sort();
  vars.into_iter().collect()
}

/// A machine that takes part in a build step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeContext {
  /// Display name of the node.
  pub name: String,

  /// Root directory resources are resolved against.
  pub root: PathBuf,

  /// Interpreter family for inline scripts.
  pub dialect: ShellDialect,

  /// The node's system-level environment.
  pub system_vars: VariableSet,

  /// Variables configured on the node itself; may reference system variables.
  pub node_vars: VariableSet,
}

impl NodeContext {
  pub fn new(name: impl Into<String>, root: impl Into<PathBuf>, dialect: ShellDialect) -> Self {
    Self {
      name: name.into(),
      root: root.into(),
      dialect,
      system_vars: VariableSet::new(),
      node_vars: VariableSet::new(),
    }
  }

  /// The machine this process runs on, with its live environment.
  pub fn local(root: impl Into<PathBuf>) -> Self {
    Self {
      system_vars: system_variables(),
      ..Self::new(LOCAL_NODE_NAME, root, ShellDialect::current())
    }
  }

  pub fn with_system_vars(mut self, vars: VariableSet) -> Self {
    self.system_vars = vars;
    self
  }

  pub fn with_node_vars(mut self, vars: VariableSet) -> Self {
    self.node_vars = vars;
    self
  }

  /// The node's own variables with references to its system variables
  /// (and to each other) expanded.
  pub fn resolved_node_vars(&self) -> VariableSet {
    let mut vars = self.node_vars.clone();
    placeholder::resolve(&self.system_vars, &mut vars);
    placeholder::resolve_self(&mut vars);
    vars
  }
}

/// Metadata of the build a step belongs to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildContext {
  pub job_name: String,
  pub build_number: u64,
  pub build_id: Option<String>,
  pub build_url: Option<String>,
  pub node_name: Option<String>,
  pub workspace: Option<PathBuf>,

  /// Build parameters, exposed as variables after the metadata.
  pub parameters: VariableSet,
}

impl BuildContext {
  pub fn new(job_name: impl Into<String>, build_number: u64) -> Self {
    Self {
      job_name: job_name.into(),
      build_number,
      ..Self::default()
    }
  }

  /// Tag identifying the build, e.g. `envinject-nightly-42`.
  pub fn tag(&self) -> String {
    format!("{}-{}-{}", APP_NAME, self.job_name, self.build_number)
  }

  /// Variables describing the build: `BUILD_NUMBER`, `BUILD_ID`,
  /// `BUILD_TAG`, `JOB_NAME`, optional `BUILD_URL`, `NODE_NAME`,
  /// `WORKSPACE`, then the build parameters.
  pub fn build_variables(&self) -> VariableSet {
    let mut vars = VariableSet::new();
    let number = self.build_number.to_string();

    vars.insert("BUILD_NUMBER", number.as_str());
    vars.insert("BUILD_ID", self.build_id.clone().unwrap_or(number));
    vars.insert("BUILD_TAG", self.tag());
    vars.insert("JOB_NAME", self.job_name.as_str());

    if let Some(url) = &self.build_url {
      vars.insert("BUILD_URL", url.as_str());
    }
    if let Some(node) = &self.node_name {
      vars.insert("NODE_NAME", node.as_str());
    }
    if let Some(workspace) = &self.workspace {
      vars.insert("WORKSPACE", workspace.to_string_lossy());
    }

    vars.extend_from(&self.parameters);
    vars
  }
}
