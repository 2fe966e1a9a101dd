//! Ordered environment variable sets.
//!
//! A [`VariableSet`] maps variable names to string values and remembers the
//! order in which names were first inserted. Overwriting a name keeps its
//! original position, so merged sets stay stable for display and debugging.

mod merge;

use std::fmt;

use indexmap::IndexMap;
use indexmap::map::{IntoIter, Iter};
use serde::{Deserialize, Serialize};

pub use merge::{PrecedenceChain, merge};

/// An ordered mapping from variable name to value.
///
/// Equality ignores insertion order: two sets are equal when they hold the
/// same name/value pairs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VariableSet(IndexMap<String, String>);

impl VariableSet {
  pub fn new() -> Self {
    Self::default()
  }

  /// Insert or overwrite a variable, returning the previous value.
  pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) -> Option<String> {
    self.0.insert(name.into(), value.into())
  }

  pub fn get(&self, name: &str) -> Option<&str> {
    self.0.get(name).map(String::as_str)
  }

  pub fn contains(&self, name: &str) -> bool {
    self.0.contains_key(name)
  }

  /// Remove a variable while keeping the order of the remaining ones.
  pub fn remove(&mut self, name: &str) -> Option<String> {
    self.0.shift_remove(name)
  }

  pub fn len(&self) -> usize {
    self.0.len()
  }

  pub fn is_empty(&self) -> bool {
    self.0.is_empty()
  }

  pub fn iter(&self) -> Iter<'_, String, String> {
    self.0.iter()
  }

  pub fn names(&self) -> impl Iterator<Item = &str> {
    self.0.keys().map(String::as_str)
  }

  /// Copy every entry of `other` into this set, overwriting on collision.
  pub fn extend_from(&mut self, other: &VariableSet) {
    for (name, value) in other {
      self.0.insert(name.clone(), value.clone());
    }
  }

  /// Keep only the variables for which `keep` returns true.
  pub fn retain(&mut self, mut keep: impl FnMut(&str, &str) -> bool) {
    self.0.retain(|name, value| keep(name, value));
  }

  pub(crate) fn value_at(&self, index: usize) -> Option<&str> {
    self.0.get_index(index).map(|(_, value)| value.as_str())
  }

  pub(crate) fn set_value_at(&mut self, index: usize, value: String) {
    if let Some((_, slot)) = self.0.get_index_mut(index) {
      *slot = value;
    }
  }
}

impl fmt::Display for VariableSet {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    for (name, value) in &self.0 {
      writeln!(f, "{name}={value}")?;
    }
    Ok(())
  }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for VariableSet {
  fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
    let mut set = Self::new();
    set.extend(iter);
    set
  }
}

impl<K: Into<String>, V: Into<String>> Extend<(K, V)> for VariableSet {
  fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
    for (name, value) in iter {
      self.0.insert(name.into(), value.into());
    }
  }
}

impl<'a> IntoIterator for &'a VariableSet {
  type Item = (&'a String, &'a String);
  type IntoIter = Iter<'a, String, String>;

  fn into_iter(self) -> Self::IntoIter {
    self.0.iter()
  }
}

impl IntoIterator for VariableSet {
  type Item = (String, String);
  type IntoIter = IntoIter<String, String>;

  fn into_iter(self) -> Self::IntoIter {
    self.0.into_iter()
  }
}
