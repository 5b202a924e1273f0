use std::fmt;

use tokio::sync::mpsc::{error::TryRecvError, UnboundedReceiver};

type Detach = Box<dyn FnOnce() + Send>;

/// Live stream of store events for one listener.
///
/// Cancelling (explicitly or by dropping) detaches the listener from the store
/// before returning; nothing is yielded afterwards, not even events that were
/// already queued.
pub struct Subscription<T> {
    rx: UnboundedReceiver<T>,
    detach: Option<Detach>,
    cancelled: bool,
}

impl<T> Subscription<T> {
    pub fn new(rx: UnboundedReceiver<T>, detach: impl FnOnce() + Send + 'static) -> Self {
        Self {
            rx,
            detach: Some(Box::new(detach)),
            cancelled: false,
        }
    }

    /// A subscription that yields nothing. Used when a listener cannot be
    /// attached; consumers see an empty snapshot instead of an error.
    pub fn closed() -> Self {
        let (_tx, rx) = tokio::sync::mpsc::unbounded_channel();
        Self {
            rx,
            detach: None,
            cancelled: false,
        }
    }

    /// Wait for the next event. `None` once cancelled or once the store
    /// dropped the listener.
    pub async fn recv(&mut self) -> Option<T> {
        if self.cancelled {
            return None;
        }
        self.rx.recv().await
    }

    /// Next queued event without waiting.
    pub fn try_recv(&mut self) -> Option<T> {
        if self.cancelled {
            return None;
        }
        match self.rx.try_recv() {
            Ok(ev) => Some(ev),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }

    /// Detach from the store.
    pub fn cancel(&mut self) {
        if self.cancelled {
            return;
        }
        self.cancelled = true;
        if let Some(detach) = self.detach.take() {
            detach();
        }
        self.rx.close();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl<T> fmt::Debug for Subscription<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("cancelled", &self.cancelled)
            .finish()
    }
}
