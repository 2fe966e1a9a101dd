//! Loading properties files against the node or central location.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use super::{PropertiesError, parse_properties};
use crate::placeholder;
use crate::vars::{PrecedenceChain, VariableSet};

/// Filesystem roots that relative resource paths are resolved against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Locations {
  /// Root of the node that runs the build step.
  pub node_root: PathBuf,

  /// Root of the designated central host.
  pub central_root: PathBuf,
}

impl Locations {
  pub fn new(node_root: impl Into<PathBuf>, central_root: impl Into<PathBuf>) -> Self {
    Self {
      node_root: node_root.into(),
      central_root: central_root.into(),
    }
  }

  /// Locations where the central host is the node itself.
  pub fn local(root: impl Into<PathBuf>) -> Self {
    let root = root.into();
    Self {
      central_root: root.clone(),
      node_root: root,
    }
  }

  pub fn root(&self, central: bool) -> &Path {
    if central { &self.central_root } else { &self.node_root }
  }
}

/// Produces the properties-derived variable set of a build step.
pub struct PropertiesLoader<'a> {
  locations: &'a Locations,
}

impl<'a> PropertiesLoader<'a> {
  pub fn new(locations: &'a Locations) -> Self {
    Self { locations }
  }

  /// Load properties for a build step.
  ///
  /// 1. Reads `file_path` (if given) relative to the central or node root
  /// 2. Overlays `inline` on top of the file entries
  /// 3. Expands `${NAME}` in every value against the lookups
  ///
  /// The lookup tables are layered so that the one matching the file's
  /// location wins: with `load_from_central` the central table overrides
  /// the node table, otherwise the node table overrides the central one.
  /// The same layered table expands references inside `file_path`.
  ///
  /// # Errors
  ///
  /// A configured file that does not exist, cannot be read, or is malformed.
  /// An absent or blank `file_path` is not an error.
  pub fn load(
    &self,
    load_from_central: bool,
    file_path: Option<&str>,
    inline: &VariableSet,
    lookup_central: &VariableSet,
    lookup_node: &VariableSet,
  ) -> Result<VariableSet, PropertiesError> {
    let lookup = if load_from_central {
      PrecedenceChain::new().then(lookup_node).then(lookup_central).merge()
    } else {
      PrecedenceChain::new().then(lookup_central).then(lookup_node).merge()
    };

    let from_file = match file_path.map(str::trim).filter(|p| !p.is_empty()) {
      Some(path) => {
        let expanded = placeholder::substitute(path, &lookup).replace('\\', "/");
        let full = self.locations.root(load_from_central).join(expanded);
        self.read_file(&full)?
      }
      None => VariableSet::new(),
    };

    let mut combined = PrecedenceChain::new().then(&from_file).then(inline).merge();
    placeholder::resolve(&lookup, &mut combined);

    debug!(count = combined.len(), "properties loaded");
    Ok(combined)
  }

  fn read_file(&self, path: &Path) -> Result<VariableSet, PropertiesError> {
    info!(path = %path.display(), "injecting variables from properties file");

    let text = std::fs::read_to_string(path).map_err(|source| match source.kind() {
      ErrorKind::NotFound => PropertiesError::NotFound(path.to_path_buf()),
      _ => PropertiesError::Io {
        path: path.to_path_buf(),
        source,
      },
    })?;

    parse_properties(&text)
  }
}
