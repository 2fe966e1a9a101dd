//! envinject-lib: environment variable injection for build steps
//!
//! This crate computes the environment a build step runs with:
//! - `VariableSet`: ordered variable maps and precedence merging
//! - `placeholder`: `${NAME}` expansion to a fixed point
//! - `script`: injection scripts run with a controlled environment
//! - `expr`: Lua snippets computing variables
//! - `properties`: properties files and inline properties
//! - `EnvInjector`: the per-step pipeline publishing the final set

pub mod config;
pub mod consts;
pub mod contrib;
pub mod error;
pub mod expr;
pub mod inject;
pub mod placeholder;
pub mod properties;
pub mod script;
pub mod system;
pub mod vars;

pub use config::{JobConfig, JobPropertyInfo};
pub use error::{ErrorKind, InjectError};
pub use inject::{BuildRecord, EnvInjector, MemoryRecord, ResolutionResult, Stage};
pub use vars::VariableSet;
