//! Expression evaluation of variable-producing snippets.
//!
//! A job may carry a Lua snippet that computes extra variables from the ones
//! gathered so far. The snippet runs in its own environment where:
//! - every gathered variable is readable by name (`WORKSPACE`, `BUILD_NUMBER`)
//! - `env` is a table holding all gathered variables, for names that are
//!   not valid Lua identifiers (`env["my-var"]`)
//! - the standard Lua globals stay reachable through the environment's
//!   metatable
//!
//! The snippet must `return` a table of names to strings, numbers, or
//! booleans. Returning nothing yields an empty set.
//!
//! # Example
//!
//! ```
//! use envinject_lib::expr::evaluate_expression;
//! use envinject_lib::vars::VariableSet;
//!
//! let context: VariableSet = [("BUILD_NUMBER", "41")].into_iter().collect();
//! let vars = evaluate_expression(
//!     Some("return { NEXT = tonumber(BUILD_NUMBER) + 1 }"),
//!     &context,
//! ).unwrap();
//! assert_eq!(vars.get("NEXT"), Some("42"));
//! ```

use mlua::prelude::*;
use thiserror::Error;
use tracing::{debug, info};

use crate::vars::VariableSet;

/// Chunk name reported in Lua error messages.
const CHUNK_NAME: &str = "=expression";

/// Errors raised while evaluating an expression snippet.
#[derive(Debug, Error)]
pub enum ExpressionError {
  /// Syntax or runtime error inside the snippet.
  #[error("expression evaluation failed: {0}")]
  Lua(String),

  /// The snippet returned something other than a table.
  #[error("expression must return a table of variables, got {0}")]
  NotATable(String),

  /// A key of the returned table is not a string.
  #[error("expression returned a key of type {0}; variable names must be strings")]
  InvalidKey(String),

  /// A value of the returned table cannot be turned into a string.
  #[error("expression returned a {kind} for '{name}'; expected string, number or boolean")]
  InvalidValue { name: String, kind: String },
}

impl From<LuaError> for ExpressionError {
  fn from(err: LuaError) -> Self {
    ExpressionError::Lua(err.to_string())
  }
}

/// Evaluate `snippet` with `context` bound as its input variables.
///
/// An absent or blank snippet returns an empty set without starting Lua.
/// Returned variables are sorted by name, since Lua table iteration order
/// is unspecified.
pub fn evaluate_expression(snippet: Option<&str>, context: &VariableSet) -> Result<VariableSet, ExpressionError> {
  let Some(snippet) = snippet.filter(|s| !s.trim().is_empty()) else {
    return Ok(VariableSet::new());
  };

  info!("evaluating expression");
  debug!(snippet = %snippet, "expression content");

  let lua = Lua::new();
  let env = create_environment(&lua, context)?;

  let result = lua
    .load(snippet)
    .set_name(CHUNK_NAME)
    .set_environment(env)
    .eval::<LuaValue>()?;

  let vars = collect_variables(result)?;
  debug!(count = vars.len(), "expression produced variables");
  Ok(vars)
}

/// Build the snippet's environment: variables as fields, `_G` as fallback.
fn create_environment(lua: &Lua, context: &VariableSet) -> LuaResult<LuaTable> {
  let env = lua.create_table()?;
  let all = lua.create_table()?;

  for (name, value) in context {
    all.set(name.as_str(), value.as_str())?;
    env.set(name.as_str(), value.as_str())?;
  }
  env.set("env", all)?;

  let mt = lua.create_table()?;
  mt.set("__index", lua.globals())?;
  env.set_metatable(Some(mt))?;

  Ok(env)
}

fn collect_variables(result: LuaValue) -> Result<VariableSet, ExpressionError> {
  let table = match result {
    LuaValue::Nil => return Ok(VariableSet::new()),
    LuaValue::Table(table) => table,
    other => return Err(ExpressionError::NotATable(other.type_name().to_string())),
  };

  let mut entries = Vec::new();
  for pair in table.pairs::<LuaValue, LuaValue>() {
    let (key, value) = pair?;
    let name = match key {
      LuaValue::String(s) => s.to_string_lossy(),
      other => return Err(ExpressionError::InvalidKey(other.type_name().to_string())),
    };
    let value = match value {
      LuaValue::String(s) => s.to_string_lossy(),
      LuaValue::Integer(i) => i.to_string(),
      LuaValue::Number(n) => n.to_string(),
      LuaValue::Boolean(b) => b.to_string(),
      other => {
        return Err(ExpressionError::InvalidValue {
          name,
          kind: other.type_name().to_string(),
        });
      }
    };
    entries.push((name, value));
  }

  entries.sort_by(|a, b| a.0.cmp(&b.0));
  Ok(entries.into_iter().collect())
}
