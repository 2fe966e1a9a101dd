//! Precedence-ordered merging of variable sets.

use super::VariableSet;

/// Variable sets ordered from lowest to highest priority.
///
/// For a name defined by several sets, the set pushed last wins.
#[derive(Debug, Default)]
pub struct PrecedenceChain<'a> {
  sets: Vec<&'a VariableSet>,
}

impl<'a> PrecedenceChain<'a> {
  pub fn new() -> Self {
    Self::default()
  }

  /// Append a set that overrides everything already in the chain.
  pub fn then(mut self, set: &'a VariableSet) -> Self {
    self.sets.push(set);
    self
  }

  pub fn len(&self) -> usize {
    self.sets.len()
  }

  pub fn is_empty(&self) -> bool {
    self.sets.is_empty()
  }

  /// Collapse the chain into a single set.
  pub fn merge(&self) -> VariableSet {
    merge(self.sets.iter().copied())
  }
}

/// Merge sets in order: later sets overwrite earlier ones on name collision.
///
/// Names keep the position of their first appearance in the chain. Nothing is
/// ever removed, so every name defined anywhere in the chain is in the result.
pub fn merge<'a>(chain: impl IntoIterator<Item = &'a VariableSet>) -> VariableSet {
  let mut merged = VariableSet::new();
  for set in chain {
    merged.extend_from(set);
  }
  merged
}
