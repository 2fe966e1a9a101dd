//! External script execution.
//!
//! - [`ScriptExecutor`] runs a script path and/or inline script content
//! - [`ShellDialect`] decides how inline content is written and launched
//! - [`OutputSink`] receives the interleaved stdout/stderr of the process
//! - [`Interrupt`] lets the owner of a build step abort a running script

mod dialect;
mod executor;
mod interrupt;
mod sink;

pub use dialect::{ShellDialect, tokenize};
pub use executor::{ScriptError, ScriptExecutor, ScriptSpec};
pub use interrupt::{Interrupt, InterruptHandle, interrupt_pair};
pub use sink::{MemorySink, OutputSink, Stream, TracingSink};
