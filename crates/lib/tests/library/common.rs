//! Shared helpers for library integration tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use envinject_lib::contrib::{Contributor, ContributorError};
use envinject_lib::script::{MemorySink, ShellDialect};
use envinject_lib::system::{BuildContext, NodeContext};
use envinject_lib::{EnvInjector, VariableSet};
use tempfile::TempDir;

pub fn vars(pairs: &[(&str, &str)]) -> VariableSet {
  pairs.iter().copied().collect()
}

/// A node rooted in a fresh temporary directory, with no system variables.
pub struct TestNode {
  pub root: TempDir,
  pub sink: Arc<MemorySink>,
}

impl TestNode {
  pub fn new() -> Self {
    Self {
      root: TempDir::new().unwrap(),
      sink: Arc::new(MemorySink::new()),
    }
  }

  pub fn context(&self) -> NodeContext {
    NodeContext::new("agent-1", self.root.path(), ShellDialect::current())
  }

  /// Injector for this node, capturing script output.
  pub fn injector(&self) -> EnvInjector {
    EnvInjector::new(self.context()).with_sink(self.sink.clone())
  }

  pub fn write(&self, relative: &str, content: &str) {
    let path = self.root.path().join(relative);
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, content).unwrap();
  }

  #[cfg(unix)]
  pub fn write_executable(&self, relative: &str, content: &str) {
    use std::os::unix::fs::PermissionsExt;
    self.write(relative, content);
    let path = self.root.path().join(relative);
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755)).unwrap();
  }
}

/// Contributor that counts how often it is queried.
pub struct CountingContributor {
  pub vars: VariableSet,
  pub calls: Arc<AtomicUsize>,
  pub fail: bool,
}

impl CountingContributor {
  pub fn new(vars: VariableSet) -> (Self, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    let contributor = Self {
      vars,
      calls: calls.clone(),
      fail: false,
    };
    (contributor, calls)
  }

  pub fn failing() -> (Self, Arc<AtomicUsize>) {
    let (mut contributor, calls) = Self::new(VariableSet::new());
    contributor.fail = true;
    (contributor, calls)
  }
}

impl Contributor for CountingContributor {
  fn name(&self) -> &str {
    "counting"
  }

  fn env_vars(&self, _build: &BuildContext) -> Result<VariableSet, ContributorError> {
    self.calls.fetch_add(1, Ordering::SeqCst);
    if self.fail {
      return Err(ContributorError::new(self.name(), "backend unavailable"));
    }
    Ok(self.vars.clone())
  }
}
