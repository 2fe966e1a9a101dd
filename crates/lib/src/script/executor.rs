//! Script execution with a caller-supplied environment.
//!
//! Runs the script file path and/or the inline script content of a
//! [`ScriptSpec`] in the node's working directory. A non-zero exit is a
//! normal result; only failures to launch or supervise the process are
//! errors.

use std::io;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tracing::{debug, error, info};

use super::dialect::{ShellDialect, tokenize};
use super::interrupt::Interrupt;
use super::sink::{OutputSink, Stream, TracingSink};
use crate::consts::SCRIPT_PREFIX;
use crate::placeholder;
use crate::vars::VariableSet;

/// What to run: a script path, inline content, or both.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptSpec {
  /// Command line of a script file, may reference variables as `${NAME}`.
  pub path: Option<String>,

  /// Inline script content written to a temporary file before running.
  pub content: Option<String>,

  /// Resolve a relative script path against the central root instead of
  /// the node root.
  #[serde(default)]
  pub load_from_central: bool,
}

impl ScriptSpec {
  /// True when there is nothing to run.
  pub fn is_empty(&self) -> bool {
    self.path.is_none() && self.content.is_none()
  }
}

/// Errors that prevent a script from running to completion.
#[derive(Debug, Error)]
pub enum ScriptError {
  /// The script path expanded to an empty command line.
  #[error("script path '{0}' expands to an empty command")]
  EmptyCommand(String),

  /// The temporary script file could not be created or written.
  #[error("failed to write temporary script in {dir}: {source}")]
  TempScript {
    dir: PathBuf,
    #[source]
    source: io::Error,
  },

  /// The process could not be started.
  #[error("failed to launch '{command}': {source}")]
  Spawn {
    command: String,
    #[source]
    source: io::Error,
  },

  /// Reading output from or waiting for the process failed.
  #[error("failed while running '{command}': {source}")]
  Wait {
    command: String,
    #[source]
    source: io::Error,
  },

  /// The enclosing build step was cancelled while the script ran.
  #[error("script '{0}' was interrupted")]
  Interrupted(String),
}

/// Runs scripts for one build step on one node.
pub struct ScriptExecutor {
  workdir: PathBuf,
  resource_root: PathBuf,
  dialect: ShellDialect,
  sink: Arc<dyn OutputSink>,
  interrupt: Option<Interrupt>,
}

impl ScriptExecutor {
  /// Create an executor running in `workdir`, streaming output to the log.
  pub fn new(workdir: impl Into<PathBuf>, dialect: ShellDialect) -> Self {
    let workdir = workdir.into();
    Self {
      resource_root: workdir.clone(),
      workdir,
      dialect,
      sink: Arc::new(TracingSink),
      interrupt: None,
    }
  }

  /// Directory against which relative script paths from the central
  /// location are resolved.
  pub fn with_resource_root(mut self, root: impl Into<PathBuf>) -> Self {
    self.resource_root = root.into();
    self
  }

  pub fn with_sink(mut self, sink: Arc<dyn OutputSink>) -> Self {
    self.sink = sink;
    self
  }

  pub fn with_interrupt(mut self, interrupt: Interrupt) -> Self {
    self.interrupt = Some(interrupt);
    self
  }

  pub fn workdir(&self) -> &Path {
    &self.workdir
  }

  /// Run the script section described by `spec`.
  ///
  /// The path (macro-expanded against `path_env`) runs first; the inline
  /// content only runs if the path script exited with 0. Both run with
  /// `run_env` layered over the inherited process environment.
  ///
  /// # Returns
  ///
  /// The first non-zero exit code, or 0 when everything succeeded (or there
  /// was nothing to run).
  pub async fn execute(
    &self,
    spec: &ScriptSpec,
    path_env: &VariableSet,
    run_env: &VariableSet,
  ) -> Result<i32, ScriptError> {
    if let Some(path) = &spec.path {
      let resolved = placeholder::substitute(path, path_env).replace('\\', "/");
      let code = self.execute_path(&resolved, spec.load_from_central, run_env).await?;
      if code != 0 {
        return Ok(code);
      }
    }

    if let Some(content) = &spec.content {
      let code = self.execute_content(content, run_env).await?;
      if code != 0 {
        return Ok(code);
      }
    }

    Ok(0)
  }

  async fn execute_path(&self, command: &str, from_central: bool, env: &VariableSet) -> Result<i32, ScriptError> {
    info!(path = %command, "executing script");

    let mut argv = tokenize(command);
    if argv.is_empty() {
      return Err(ScriptError::EmptyCommand(command.to_string()));
    }
    let root = if from_central { &self.resource_root } else { &self.workdir };
    argv[0] = program_path(&argv[0], root);

    let code = self.launch(&argv, env).await?;
    if code != 0 {
      info!(code, "script exited with non-zero code; failing the build step");
    }
    Ok(code)
  }

  async fn execute_content(&self, content: &str, env: &VariableSet) -> Result<i32, ScriptError> {
    let script = self.write_script(content)?;
    info!(content = %content, "executing script content");

    let argv = self.dialect.command_line(&script, content);
    let code = self.launch(&argv, env).await?;
    if code != 0 {
      error!(code, "script exited with non-zero code; failing the build step");
    }
    // TempPath removes the file when dropped here
    drop(script);
    Ok(code)
  }

  fn write_script(&self, content: &str) -> Result<tempfile::TempPath, ScriptError> {
    let temp_err = |source| ScriptError::TempScript {
      dir: self.workdir.clone(),
      source,
    };

    let mut file = tempfile::Builder::new()
      .prefix(SCRIPT_PREFIX)
      .suffix(self.dialect.script_suffix())
      .tempfile_in(&self.workdir)
      .map_err(temp_err)?;

    io::Write::write_all(&mut file, self.dialect.script_body(content).as_bytes()).map_err(temp_err)?;
    io::Write::flush(&mut file).map_err(temp_err)?;

    // Close the handle so the interpreter can open the file on every platform
    Ok(file.into_temp_path())
  }

  async fn launch(&self, argv: &[String], env: &VariableSet) -> Result<i32, ScriptError> {
    let Some((program, args)) = argv.split_first() else {
      return Err(ScriptError::EmptyCommand(String::new()));
    };

    let mut command = Command::new(program);
    command
      .args(args)
      .current_dir(&self.workdir)
      .envs(env.iter())
      .stdin(Stdio::null())
      .stdout(Stdio::piped())
      .stderr(Stdio::piped())
      .kill_on_drop(true);

    debug!(program = %program, working_dir = ?self.workdir, "spawning process");

    let mut child = command.spawn().map_err(|source| ScriptError::Spawn {
      command: program.clone(),
      source,
    })?;

    let stdout = child.stdout.take();
    let stderr = child.stderr.take();

    let outcome = {
      let run = async {
        let (out, err) = tokio::join!(
          forward(stdout, Stream::Stdout, self.sink.as_ref()),
          forward(stderr, Stream::Stderr, self.sink.as_ref())
        );
        out?;
        err?;
        child.wait().await
      };

      match &self.interrupt {
        Some(interrupt) => tokio::select! {
          status = run => Some(status),
          () = interrupt.fired() => None,
        },
        None => Some(run.await),
      }
    };

    match outcome {
      Some(status) => {
        let status = status.map_err(|source| ScriptError::Wait {
          command: program.clone(),
          source,
        })?;
        Ok(exit_code(status))
      }
      None => {
        // kill_on_drop also covers this, but reap eagerly
        let _ = child.start_kill();
        let _ = child.wait().await;
        Err(ScriptError::Interrupted(program.clone()))
      }
    }
  }
}

/// Resolve a relative program path that names a file (contains a separator)
/// against `root`; bare command names are left for `PATH` lookup.
fn program_path(program: &str, root: &Path) -> String {
  let path = Path::new(program);
  if path.is_relative() && program.contains('/') {
    root.join(path).to_string_lossy().to_string()
  } else {
    program.to_string()
  }
}

async fn forward<R: AsyncRead + Unpin>(reader: Option<R>, stream: Stream, sink: &dyn OutputSink) -> io::Result<()> {
  let Some(reader) = reader else {
    return Ok(());
  };

  let mut reader = BufReader::new(reader);
  let mut buf = Vec::new();
  loop {
    buf.clear();
    if reader.read_until(b'\n', &mut buf).await? == 0 {
      return Ok(());
    }
    let line = String::from_utf8_lossy(&buf);
    sink.line(stream, line.trim_end_matches(['\n', '\r']));
  }
}

#[cfg(unix)]
fn exit_code(status: ExitStatus) -> i32 {
  use std::os::unix::process::ExitStatusExt;
  status
    .code()
    .or_else(|| status.signal().map(|signal| 128 + signal))
    .unwrap_or(-1)
}

#[cfg(not(unix))]
fn exit_code(status: ExitStatus) -> i32 {
  status.code().unwrap_or(-1)
}
