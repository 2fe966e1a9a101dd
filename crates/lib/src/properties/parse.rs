//! Parser for `key=value` properties text, on top of `java-properties`.
//!
//! The syntax is the Java one: `=`, `:` or whitespace separators, `#` and `!`
//! comments, trailing-backslash continuation lines and `\uXXXX` escapes.
//! Values keep `${NAME}` references untouched; expansion is the loader's job.

use java_properties::{LineContent, PropertiesIter};

use super::PropertiesError;
use crate::vars::VariableSet;

/// Parse properties text into an ordered variable set.
///
/// A later duplicate key overwrites the earlier value. An entry with an
/// empty key is malformed.
pub fn parse_properties(text: &str) -> Result<VariableSet, PropertiesError> {
  let mut vars = VariableSet::new();

  for line in PropertiesIter::new_with_encoding(text.as_bytes(), encoding_rs::UTF_8) {
    let line = line.map_err(|err| PropertiesError::Malformed {
      line: err.line_number(),
      message: err.to_string(),
    })?;
    let line_no = line.line_number();

    if let LineContent::KVPair(key, value) = line.consume_content() {
      if key.is_empty() {
        return Err(PropertiesError::EmptyKey { line: line_no });
      }
      vars.insert(key, value);
    }
  }

  Ok(vars)
}
