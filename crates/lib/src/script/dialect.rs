//! Shell dialects and command-line construction for script files.

use std::path::Path;

use serde::{Deserialize, Serialize};

/// The interpreter family a node runs scripts with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShellDialect {
  /// POSIX `sh` with `.sh` script files
  Posix,
  /// `cmd.exe` with `.bat` script files
  Windows,
}

impl ShellDialect {
  /// The dialect of the machine this process runs on.
  pub fn current() -> Self {
    if cfg!(windows) { Self::Windows } else { Self::Posix }
  }

  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Posix => "posix",
      Self::Windows => "windows",
    }
  }

  /// File suffix for temporary script files.
  pub fn script_suffix(&self) -> &'static str {
    match self {
      Self::Posix => ".sh",
      Self::Windows => ".bat",
    }
  }

  /// The text written to the temporary script file for `content`.
  ///
  /// Batch files get CRLF line endings and an explicit `exit %ERRORLEVEL%`
  /// so the exit code of the last command becomes the script's exit code.
  pub fn script_body(&self, content: &str) -> String {
    match self {
      Self::Posix => content.to_string(),
      Self::Windows => {
        let mut body = content.replace("\r\n", "\n").replace('\n', "\r\n");
        body.push_str("\r\nexit %ERRORLEVEL%");
        body
      }
    }
  }

  /// Build the argument vector that runs `script` (written from `content`).
  ///
  /// POSIX content starting with a `#!` line runs under the interpreter it
  /// names; anything else runs under `sh -xe` so every command is echoed
  /// and the first failure stops the script.
  pub fn command_line(&self, script: &Path, content: &str) -> Vec<String> {
    let script = script.to_string_lossy().to_string();
    match self {
      Self::Posix => {
        let mut args = shebang(content).unwrap_or_else(|| vec!["sh".to_string(), "-xe".to_string()]);
        args.push(script);
        args
      }
      Self::Windows => vec!["cmd".to_string(), "/c".to_string(), "call".to_string(), script],
    }
  }
}

impl std::fmt::Display for ShellDialect {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}", self.as_str())
  }
}

fn shebang(content: &str) -> Option<Vec<String>> {
  let line = content.lines().next()?.strip_prefix("#!")?;
  let args: Vec<String> = line.split_whitespace().map(str::to_string).collect();
  if args.is_empty() { None } else { Some(args) }
}

/// Split a command string into arguments.
///
/// Whitespace separates arguments; single or double quotes group text that
/// contains whitespace, and the quotes themselves are dropped.
pub fn tokenize(command: &str) -> Vec<String> {
  let mut args = Vec::new();
  let mut current = String::new();
  let mut in_token = false;
  let mut quote: Option<char> = None;

  for c in command.chars() {
    match quote {
      Some(q) if c == q => quote = None,
      Some(_) => current.push(c),
      None if c == '"' || c == '\'' => {
        quote = Some(c);
        in_token = true;
      }
      None if c.is_whitespace() => {
        if in_token {
          args.push(std::mem::take(&mut current));
          in_token = false;
        }
      }
      None => {
        current.push(c);
        in_token = true;
      }
    }
  }

  if in_token {
    args.push(current);
  }
  args
}
