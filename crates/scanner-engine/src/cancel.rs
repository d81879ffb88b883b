use std::sync::Arc;

use tokio::sync::watch;

/// Cloneable cancellation flag for an in-flight scan.
#[derive(Debug, Clone)]
pub struct CancelSignal {
    tx: Arc<watch::Sender<bool>>,
}

impl CancelSignal {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolves once `cancel` has been called on any clone.
    pub async fn cancelled(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives in `self`, so the channel cannot close here.
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }

    /// Cancel automatically once `deadline` elapses.
    pub fn cancel_after(&self, deadline: std::time::Duration) -> tokio::task::JoinHandle<()> {
        let signal = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(deadline).await;
            signal.cancel();
        })
    }
}

impl Default for CancelSignal {
    fn default() -> Self {
        Self::new()
    }
}
