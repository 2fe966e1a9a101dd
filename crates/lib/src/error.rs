//! Failures that abort an injection pipeline.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

use crate::contrib::ContributorError;
use crate::expr::ExpressionError;
use crate::properties::PropertiesError;
use crate::script::ScriptError;

/// Broad class of an [`InjectError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
  /// Malformed job input: properties, expression, or file references.
  Configuration,

  /// Processes or files could not be handled, or the step was interrupted.
  Infrastructure,

  /// The injection script finished with a non-zero exit code.
  NonZeroExit,

  /// A contributor failed.
  Contributor,
}

impl fmt::Display for ErrorKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let name = match self {
      ErrorKind::Configuration => "configuration",
      ErrorKind::Infrastructure => "infrastructure",
      ErrorKind::NonZeroExit => "non-zero exit",
      ErrorKind::Contributor => "contributor",
    };
    f.write_str(name)
  }
}

#[derive(Debug, Error)]
pub enum InjectError {
  #[error("injection script exited with code {code}")]
  NonZeroExit { code: i32 },

  #[error(transparent)]
  Script(#[from] ScriptError),

  #[error(transparent)]
  Expression(#[from] ExpressionError),

  #[error(transparent)]
  Properties(#[from] PropertiesError),

  #[error(transparent)]
  Contributor(#[from] ContributorError),

  #[error("build step was interrupted")]
  Interrupted,
}

impl InjectError {
  pub fn kind(&self) -> ErrorKind {
    match self {
      InjectError::NonZeroExit { .. } => ErrorKind::NonZeroExit,
      InjectError::Script(_) | InjectError::Interrupted => ErrorKind::Infrastructure,
      InjectError::Properties(PropertiesError::Io { .. }) => ErrorKind::Infrastructure,
      InjectError::Expression(_) | InjectError::Properties(_) => ErrorKind::Configuration,
      InjectError::Contributor(_) => ErrorKind::Contributor,
    }
  }
}
