//! Cancellation of an in-flight resolution.
//!
//! The scheduler that owns a build step keeps the [`InterruptHandle`]; the
//! pipeline and the script executor hold [`Interrupt`] receivers and abort
//! as soon as the handle fires.

use tokio::sync::watch;

/// Sending half: fires the interruption.
#[derive(Debug)]
pub struct InterruptHandle(watch::Sender<bool>);

/// Receiving half: observed by the running pipeline.
#[derive(Debug, Clone)]
pub struct Interrupt(watch::Receiver<bool>);

/// Create a connected handle/receiver pair.
pub fn interrupt_pair() -> (InterruptHandle, Interrupt) {
  let (tx, rx) = watch::channel(false);
  (InterruptHandle(tx), Interrupt(rx))
}

impl InterruptHandle {
  pub fn interrupt(&self) {
    self.0.send_replace(true);
  }
}

impl Interrupt {
  pub fn is_interrupted(&self) -> bool {
    *self.0.borrow()
  }

  /// Resolves once the handle fires. Never resolves if the handle is
  /// dropped without firing.
  pub async fn fired(&self) {
    let mut rx = self.0.clone();
    if rx.wait_for(|fired| *fired).await.is_err() {
      std::future::pending::<()>().await;
    }
  }
}
