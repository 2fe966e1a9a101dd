//! Properties files and inline properties blocks.
//!
//! - [`parse_properties`] turns `key=value` text into a [`VariableSet`](crate::vars::VariableSet)
//! - [`PropertiesLoader`] reads a properties file from the node or the
//!   central location, overlays inline properties, and expands references

mod loader;
mod parse;

use std::path::PathBuf;

use thiserror::Error;

pub use loader::{Locations, PropertiesLoader};
pub use parse::parse_properties;

/// Errors raised while reading or parsing properties.
#[derive(Debug, Error)]
pub enum PropertiesError {
  /// The configured properties file does not exist.
  #[error("properties file '{0}' does not exist")]
  NotFound(PathBuf),

  /// The properties file exists but could not be read.
  #[error("failed to read properties file '{path}': {source}")]
  Io {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  /// A non-comment line has no key.
  #[error("malformed properties: empty key on line {line}")]
  EmptyKey { line: usize },

  /// The text is not valid properties syntax, such as a bad `\u` escape.
  #[error("malformed properties: {message}")]
  Malformed { line: Option<usize>, message: String },
}
