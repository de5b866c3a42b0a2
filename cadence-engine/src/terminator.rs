//! Process-wide termination signal
//!
//! Raised by the control loop when play-and-exit hits the end of the
//! playlist. The daemon awaits it next to Ctrl+C and SIGTERM.

use std::sync::Arc;
use tokio::sync::watch;

/// Cloneable one-way "please exit" flag
#[derive(Clone)]
pub struct Terminator {
    tx: Arc<watch::Sender<bool>>,
}

impl Terminator {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Raise the flag. Idempotent.
    pub fn request(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_requested(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolves once the flag is raised
    pub async fn wait(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives in self, so the channel cannot close here
        let _ = rx.wait_for(|requested| *requested).await;
    }
}

impl Default for Terminator {
    fn default() -> Self {
        Self::new()
    }
}
