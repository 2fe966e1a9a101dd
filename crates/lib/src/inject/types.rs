//! Types describing the progress and outcome of an injection pipeline.

use std::fmt;

use serde::Serialize;

use crate::vars::VariableSet;

/// A state of the per-step injection pipeline.
///
/// Stages are entered in declaration order; `Failed` absorbs any error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
  Init,
  Gathering,
  ExecutingScript,
  Evaluating,
  LoadingProperties,
  Contributing,
  Merging,
  Resolving,
  Published,
  Failed,
}

impl fmt::Display for Stage {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let name = match self {
      Stage::Init => "init",
      Stage::Gathering => "gathering",
      Stage::ExecutingScript => "executing_script",
      Stage::Evaluating => "evaluating",
      Stage::LoadingProperties => "loading_properties",
      Stage::Contributing => "contributing",
      Stage::Merging => "merging",
      Stage::Resolving => "resolving",
      Stage::Published => "published",
      Stage::Failed => "failed",
    };
    f.write_str(name)
  }
}

/// Outcome of a successful pipeline run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ResolutionResult {
  /// The published variables.
  pub vars: VariableSet,

  /// Exit code of the injection script, if one ran.
  pub exit_code: Option<i32>,

  /// Stages visited, in order.
  pub stages: Vec<Stage>,
}
