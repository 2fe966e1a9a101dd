//! Job configuration: what a job asks the injector to do.
//!
//! A job is configured with a JSON document:
//!
//! ```json
//! {
//!   "keep_system_vars": true,
//!   "keep_build_vars": true,
//!   "script_content": "echo preparing",
//!   "properties_content": "OUT=${WORKSPACE}/out",
//!   "contributions": [{ "name": "defaults", "vars": { "TIER": "ci" } }]
//! }
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

use crate::contrib::{Contributors, StaticContributor};
use crate::placeholder;
use crate::properties::{PropertiesError, parse_properties};
use crate::script::ScriptSpec;
use crate::vars::VariableSet;

#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("failed to read job configuration '{path}': {source}")]
  Io {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("invalid job configuration '{path}': {source}")]
  Json {
    path: PathBuf,
    #[source]
    source: serde_json::Error,
  },
}

/// The injection sources of a job. Blank strings count as absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct JobPropertyInfo {
  #[serde(deserialize_with = "non_blank")]
  pub script_path: Option<String>,

  #[serde(deserialize_with = "non_blank")]
  pub script_content: Option<String>,

  /// Lua snippet returning extra variables.
  #[serde(deserialize_with = "non_blank")]
  pub expression: Option<String>,

  #[serde(deserialize_with = "non_blank")]
  pub properties_path: Option<String>,

  /// Inline properties text.
  #[serde(deserialize_with = "non_blank")]
  pub properties_content: Option<String>,

  /// Resolve the script and properties paths on the central host.
  pub load_from_central: bool,
}

impl JobPropertyInfo {
  pub fn script_spec(&self) -> ScriptSpec {
    ScriptSpec {
      path: self.script_path.clone(),
      content: self.script_content.clone(),
      load_from_central: self.load_from_central,
    }
  }

  /// Inline properties with `${NAME}` expanded against `prior`, parsed.
  pub fn properties_content_map(&self, prior: &VariableSet) -> Result<VariableSet, PropertiesError> {
    match &self.properties_content {
      Some(content) => parse_properties(&placeholder::substitute(content, prior)),
      None => Ok(VariableSet::new()),
    }
  }
}

/// A named fixed variable set registered as a contributor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contribution {
  pub name: String,
  #[serde(default)]
  pub vars: VariableSet,
}

/// Complete injection configuration of a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct JobConfig {
  /// Whether the job uses injection at all.
  pub on: bool,

  /// Seed the step with the node's system variables.
  pub keep_system_vars: bool,

  /// Seed the step with the build metadata variables.
  pub keep_build_vars: bool,

  #[serde(flatten)]
  pub info: JobPropertyInfo,

  pub contributions: Vec<Contribution>,
}

impl Default for JobConfig {
  fn default() -> Self {
    Self {
      on: true,
      keep_system_vars: false,
      keep_build_vars: false,
      info: JobPropertyInfo::default(),
      contributions: Vec::new(),
    }
  }
}

impl JobConfig {
  pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
      path: path.to_path_buf(),
      source,
    })?;
    Self::from_json(&text).map_err(|source| ConfigError::Json {
      path: path.to_path_buf(),
      source,
    })
  }

  pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
    serde_json::from_str(text)
  }

  /// The configured contributions, in declaration order.
  pub fn contributors(&self) -> Contributors {
    self
      .contributions
      .iter()
      .map(|c| StaticContributor::new(c.name.as_str(), c.vars.clone()))
      .collect()
  }
}

fn non_blank<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
  let value = Option::<String>::deserialize(deserializer)?;
  Ok(value.filter(|s| !s.trim().is_empty()))
}
