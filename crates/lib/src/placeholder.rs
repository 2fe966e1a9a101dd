//! Placeholder parsing and macro resolution for variable values.
//!
//! Values may reference other variables with `${NAME}`. Resolution is best
//! effort: a reference to an unknown name stays in the text verbatim, so a
//! later stage (or the shell running the build) can still see it.
//!
//! # Placeholder Format
//!
//! - `${NAME}` where `NAME` is made of ASCII letters, digits, `_` and `.`
//!
//! # Shell Variables
//!
//! A `$` that is not followed by `{` passes through unchanged, so shell
//! variables like `$HOME` and `$1` survive expansion. `${` without a closing
//! brace, or with characters outside the name alphabet, is kept literally.
//!
//! # Example
//!
//! ```
//! use envinject_lib::placeholder::{parse, Segment};
//!
//! let segments = parse("${WORKSPACE}/bin:$PATH");
//! assert_eq!(segments, vec![
//!     Segment::Placeholder("WORKSPACE".to_string()),
//!     Segment::Literal("/bin:$PATH".to_string()),
//! ]);
//! ```

use std::collections::{HashMap, HashSet};

use tracing::{debug, warn};

use crate::vars::VariableSet;

/// A segment of parsed text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
  /// Literal text (no placeholders)
  Literal(String),

  /// A `${NAME}` reference, holding the name
  Placeholder(String),
}

/// Source of values for placeholder substitution.
pub trait Lookup {
  fn lookup(&self, name: &str) -> Option<&str>;
}

impl Lookup for VariableSet {
  fn lookup(&self, name: &str) -> Option<&str> {
    self.get(name)
  }
}

impl<L: Lookup + ?Sized> Lookup for &L {
  fn lookup(&self, name: &str) -> Option<&str> {
    (**self).lookup(name)
  }
}

fn is_name_char(c: char) -> bool {
  c.is_ascii_alphanumeric() || c == '_' || c == '.'
}

/// Parse a value into literal text and `${NAME}` references.
///
/// Parsing never fails: anything that is not a well-formed reference is
/// literal text.
pub fn parse(input: &str) -> Vec<Segment> {
  let mut segments = Vec::new();
  let mut literal = String::new();
  let mut rest = input;

  while let Some(start) = rest.find("${") {
    literal.push_str(&rest[..start]);
    let after = &rest[start + 2..];

    match after.find('}') {
      Some(end) if end > 0 && after[..end].chars().all(is_name_char) => {
        if !literal.is_empty() {
          segments.push(Segment::Literal(std::mem::take(&mut literal)));
        }
        segments.push(Segment::Placeholder(after[..end].to_string()));
        rest = &after[end + 1..];
      }
      _ => {
        // Not a reference; keep "${" and continue scanning after it
        literal.push_str("${");
        rest = after;
      }
    }
  }

  literal.push_str(rest);
  if !literal.is_empty() {
    segments.push(Segment::Literal(literal));
  }

  segments
}

/// Substitute every `${NAME}` in `input` from `lookup` in one left-to-right pass.
///
/// Substituted text is not rescanned; unknown names are left as `${NAME}`.
pub fn substitute(input: &str, lookup: &impl Lookup) -> String {
  if !input.contains("${") {
    return input.to_string();
  }

  let mut result = String::with_capacity(input.len());
  for segment in parse(input) {
    match segment {
      Segment::Literal(s) => result.push_str(&s),
      Segment::Placeholder(name) => match lookup.lookup(&name) {
        Some(value) => result.push_str(value),
        None => {
          result.push_str("${");
          result.push_str(&name);
          result.push('}');
        }
      },
    }
  }
  result
}

/// Returns true if `value` still holds at least one `${NAME}` reference.
pub fn has_placeholders(value: &str) -> bool {
  parse(value).iter().any(|s| matches!(s, Segment::Placeholder(_)))
}

/// Upper bound on resolution passes for a table of `count` variables.
///
/// Every pass either changes nothing (fixed point) or resolves at least one
/// more link of an acyclic reference chain, and no chain is longer than the
/// number of variables.
pub fn max_iterations(count: usize) -> usize {
  count.max(1) + 1
}

/// Names referenced by `value`, in order of appearance.
pub fn references(value: &str) -> impl Iterator<Item = String> {
  parse(value).into_iter().filter_map(|segment| match segment {
    Segment::Placeholder(name) => Some(name),
    Segment::Literal(_) => None,
  })
}

/// Names of `vars` that reach themselves through `${NAME}` references,
/// including direct self-references such as `PATH=${PATH}:/opt/bin`.
///
/// Substitution only ever replaces a reference with text the referenced
/// variable already holds, so the set computed up front stays valid for every
/// later pass.
pub fn cyclic_names(vars: &VariableSet) -> HashSet<String> {
  let edges: HashMap<&str, Vec<String>> = vars
    .iter()
    .map(|(name, value)| {
      let targets = references(value).filter(|target| vars.contains(target)).collect();
      (name.as_str(), targets)
    })
    .collect();

  let mut cyclic = HashSet::new();
  for name in edges.keys() {
    let mut seen = HashSet::new();
    let mut stack: Vec<&str> = edges[name].iter().map(String::as_str).collect();
    while let Some(next) = stack.pop() {
      if next == *name {
        cyclic.insert(name.to_string());
        break;
      }
      if seen.insert(next) {
        stack.extend(edges.get(next).into_iter().flatten().map(String::as_str));
      }
    }
  }
  cyclic
}

/// Lookup that refuses names on a reference cycle, leaving them as `${NAME}`.
struct Acyclic<'a, L> {
  inner: L,
  cyclic: &'a HashSet<String>,
}

impl<L: Lookup> Lookup for Acyclic<'_, L> {
  fn lookup(&self, name: &str) -> Option<&str> {
    if self.cyclic.contains(name) {
      return None;
    }
    self.inner.lookup(name)
  }
}

fn warn_cycles(cyclic: &HashSet<String>) {
  if !cyclic.is_empty() {
    let mut names: Vec<_> = cyclic.iter().map(String::as_str).collect();
    names.sort_unstable();
    warn!(names = ?names, "reference cycle; leaving references to these variables unexpanded");
  }
}

/// Resolve the values of `target` in place against `lookup`.
///
/// Passes repeat until no value changes or [`max_iterations`] is reached, so
/// values pulled from `lookup` that themselves contain references get
/// expanded as well. References to names on a cycle within `lookup` are
/// left as they are.
pub fn resolve(lookup: &VariableSet, target: &mut VariableSet) {
  let cyclic = cyclic_names(lookup);
  warn_cycles(&cyclic);
  let lookup = Acyclic {
    inner: lookup,
    cyclic: &cyclic,
  };
  let bound = max_iterations(lookup.inner.len() + target.len());
  run_passes(target, bound, |value, _| substitute(value, &lookup));
}

/// Resolve the values of `vars` in place against the set itself.
///
/// Variables are visited in insertion order and each update is visible to
/// the variables after it within the same pass. Variables on a reference
/// cycle (`A=${B}`, `B=${A}`, or `PATH=${PATH}:/opt/bin` with no other
/// `PATH`) are never expanded, so every reference to them stays literal and
/// no value can grow from one pass to the next.
pub fn resolve_self(vars: &mut VariableSet) {
  let cyclic = cyclic_names(vars);
  warn_cycles(&cyclic);
  let bound = max_iterations(vars.len());
  run_passes(vars, bound, |value, current| {
    substitute(
      value,
      &Acyclic {
        inner: current,
        cyclic: &cyclic,
      },
    )
  });
}

fn run_passes(vars: &mut VariableSet, bound: usize, step: impl Fn(&str, &VariableSet) -> String) {
  for pass in 1..=bound {
    let mut changed = false;

    for index in 0..vars.len() {
      let Some(value) = vars.value_at(index) else {
        continue;
      };
      let next = step(value, vars);
      if next != value {
        vars.set_value_at(index, next);
        changed = true;
      }
    }

    if !changed {
      debug!(passes = pass, "variables resolved");
      return;
    }
  }

  warn!(bound, "variable resolution did not reach a fixed point");
}

/// Return a copy of `vars` without the variables that still reference an
/// unresolved `${NAME}` after resolution.
pub fn remove_unset_vars(vars: &VariableSet) -> VariableSet {
  let mut clean = vars.clone();
  clean.retain(|name, value| {
    let unset = has_placeholders(value);
    if unset {
      debug!(name, "dropping variable with unresolved reference");
    }
    !unset
  });
  clean
}
