//! Destinations for the interleaved output of script processes.

use std::sync::Mutex;

use serde::Serialize;
use tracing::info;

/// Which process stream a line came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stream {
  Stdout,
  Stderr,
}

/// Receives script output one line at a time, in arrival order.
pub trait OutputSink: Send + Sync {
  fn line(&self, stream: Stream, line: &str);
}

/// Re-emits every line as a `tracing` event, i.e. into the build log.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl OutputSink for TracingSink {
  fn line(&self, stream: Stream, line: &str) {
    info!(target: "envinject::script", stream = ?stream, "{line}");
  }
}

/// Keeps every line in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
  lines: Mutex<Vec<(Stream, String)>>,
}

impl MemorySink {
  pub fn new() -> Self {
    Self::default()
  }

  /// All captured lines regardless of stream.
  pub fn lines(&self) -> Vec<String> {
    self.entries().into_iter().map(|(_, line)| line).collect()
  }

  /// Captured lines from one stream.
  pub fn stream(&self, stream: Stream) -> Vec<String> {
    self
      .entries()
      .into_iter()
      .filter(|(s, _)| *s == stream)
      .map(|(_, line)| line)
      .collect()
  }

  pub fn entries(&self) -> Vec<(Stream, String)> {
    self.lines.lock().unwrap_or_else(|e| e.into_inner()).clone()
  }
}

impl OutputSink for MemorySink {
  fn line(&self, stream: Stream, line: &str) {
    self
      .lines
      .lock()
      .unwrap_or_else(|e| e.into_inner())
      .push((stream, line.to_string()));
  }
}
