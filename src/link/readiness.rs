//! Readiness gate: a reusable level-triggered signal over link readiness.
//!
//! Set when the link acquires an address, cleared on loss, set again on
//! recovery. Waiters block until the gate is set; a wait that starts while
//! the gate is already set returns immediately.

use std::sync::Arc;
use tokio::sync::watch;

/// Level-triggered readiness signal.
#[derive(Debug, Clone)]
pub struct ReadinessGate {
    tx: Arc<watch::Sender<bool>>,
    rx: watch::Receiver<bool>,
}

impl ReadinessGate {
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(false);
        Self { tx: Arc::new(tx), rx }
    }

    /// Mark the link ready. Idempotent.
    pub fn signal(&self) {
        self.tx.send_replace(true);
    }

    /// Mark the link not ready. Idempotent.
    pub fn clear(&self) {
        self.tx.send_replace(false);
    }

    /// Whether the gate is currently set.
    pub fn is_set(&self) -> bool {
        *self.rx.borrow()
    }

    /// Wait until the gate is set. Returns immediately when already set.
    pub async fn wait(&self) {
        let mut rx = self.rx.clone();
        // The gate owns a sender clone, so the channel cannot close
        let _ = rx.wait_for(|ready| *ready).await;
    }
}

impl Default for ReadinessGate {
    fn default() -> Self {
        Self::new()
    }
}
