use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::watch;

/// Handle shared between a relay session and its response body, used to tell
/// the relay that the client went away.
#[derive(Clone)]
pub struct StreamCancelHandle {
    sender: Arc<watch::Sender<bool>>,
    receiver: watch::Receiver<bool>,
    /// Set once the relay closed the stream itself (not a disconnect)
    completed: Arc<AtomicBool>,
}

impl StreamCancelHandle {
    pub fn new() -> Self {
        let (sender, receiver) = watch::channel(false);
        Self {
            sender: Arc::new(sender),
            receiver,
            completed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Mark the stream as completed normally.
    /// Any later [`cancel`](Self::cancel) is ignored.
    pub fn mark_completed(&self) {
        self.completed.store(true, Ordering::SeqCst);
    }

    pub fn is_completed(&self) -> bool {
        self.completed.load(Ordering::SeqCst)
    }

    /// Signal cancellation (only if not already completed)
    pub fn cancel(&self) {
        if !self.is_completed() {
            let _ = self.sender.send(true);
        }
    }

    pub fn is_cancelled(&self) -> bool {
        *self.receiver.borrow()
    }

    /// Get a receiver for use in select!
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.receiver.clone()
    }
}

impl Default for StreamCancelHandle {
    fn default() -> Self {
        Self::new()
    }
}

/// Resolve once `rx` observes a cancellation.
///
/// Never resolves if the sending side is gone without having cancelled.
pub async fn cancelled(rx: &mut watch::Receiver<bool>) {
    loop {
        if *rx.borrow_and_update() {
            return;
        }
        if rx.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}
