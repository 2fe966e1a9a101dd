//! Contributors: external sources of extra build variables.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::system::BuildContext;
use crate::vars::{VariableSet, merge};

/// A contributor could not produce its variables.
#[derive(Debug, Error)]
#[error("contributor '{contributor}' failed: {message}")]
pub struct ContributorError {
  pub contributor: String,
  pub message: String,
}

impl ContributorError {
  pub fn new(contributor: impl Into<String>, message: impl Into<String>) -> Self {
    Self {
      contributor: contributor.into(),
      message: message.into(),
    }
  }
}

/// Supplies variables for a build.
pub trait Contributor: Send + Sync {
  /// Name used in logs and errors.
  fn name(&self) -> &str;

  fn env_vars(&self, build: &BuildContext) -> Result<VariableSet, ContributorError>;
}

/// A contributor returning a fixed set of variables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaticContributor {
  pub name: String,
  #[serde(default)]
  pub vars: VariableSet,
}

impl StaticContributor {
  pub fn new(name: impl Into<String>, vars: VariableSet) -> Self {
    Self {
      name: name.into(),
      vars,
    }
  }
}

impl Contributor for StaticContributor {
  fn name(&self) -> &str {
    &self.name
  }

  fn env_vars(&self, _build: &BuildContext) -> Result<VariableSet, ContributorError> {
    Ok(self.vars.clone())
  }
}

/// Registered contributors, queried in registration order.
#[derive(Default)]
pub struct Contributors {
  registered: Vec<Box<dyn Contributor>>,
}

impl Contributors {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn register(&mut self, contributor: impl Contributor + 'static) -> &mut Self {
    self.registered.push(Box::new(contributor));
    self
  }

  pub fn len(&self) -> usize {
    self.registered.len()
  }

  pub fn is_empty(&self) -> bool {
    self.registered.is_empty()
  }

  /// Query every contributor and merge the results; a later contributor
  /// overrides an earlier one on the same name.
  ///
  /// The first failure aborts collection.
  pub fn collect(&self, build: &BuildContext) -> Result<VariableSet, ContributorError> {
    if self.registered.is_empty() {
      return Ok(VariableSet::new());
    }

    info!(count = self.registered.len(), "injecting contributions");

    let mut results = Vec::with_capacity(self.registered.len());
    for contributor in &self.registered {
      let vars = contributor.env_vars(build)?;
      debug!(contributor = contributor.name(), count = vars.len(), "contributor variables");
      results.push(vars);
    }

    Ok(merge(&results))
  }
}

impl std::fmt::Debug for Contributors {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_list().entries(self.registered.iter().map(|c| c.name())).finish()
  }
}

impl<C: Contributor + 'static> FromIterator<C> for Contributors {
  fn from_iter<I: IntoIterator<Item = C>>(iter: I) -> Self {
    let mut contributors = Contributors::new();
    for contributor in iter {
      contributors.register(contributor);
    }
    contributors
  }
}
