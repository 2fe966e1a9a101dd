//! Attachment point for the published variables of a build.

use crate::vars::VariableSet;

/// The host's record of a build, receiving the injected environment.
pub trait BuildRecord {
  /// Set or replace the injected environment of the build.
  fn set_env_injection(&mut self, vars: VariableSet);

  fn env_injection(&self) -> Option<&VariableSet>;
}

/// A [`BuildRecord`] kept in memory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryRecord {
  injected: Option<VariableSet>,
  publications: usize,
}

impl MemoryRecord {
  pub fn new() -> Self {
    Self::default()
  }

  /// How many times an environment was published to this record.
  pub fn publications(&self) -> usize {
    self.publications
  }
}

impl BuildRecord for MemoryRecord {
  fn set_env_injection(&mut self, vars: VariableSet) {
    self.injected = Some(vars);
    self.publications += 1;
  }

  fn env_injection(&self) -> Option<&VariableSet> {
    self.injected.as_ref()
  }
}
