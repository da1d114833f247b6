//! Cooperative cancellation
//!
//! An `AbortHandle` flips a flag; any number of `AbortSignal` clones
//! observe it. Cancellation is checked between steps and inside
//! long-running bricks, never mid-instruction.

use tokio::sync::watch;

/// Producer side of a cancellation pair
#[derive(Debug, Clone)]
pub struct AbortHandle {
    tx: watch::Sender<bool>,
}

/// Consumer side of a cancellation pair.
///
/// Cheap to clone; a signal built with [`AbortSignal::never`] is never
/// aborted and its `aborted()` future never resolves.
#[derive(Debug, Clone, Default)]
pub struct AbortSignal {
    rx: Option<watch::Receiver<bool>>,
}

impl AbortHandle {
    /// Create a linked handle/signal pair
    pub fn new() -> (AbortHandle, AbortSignal) {
        let (tx, rx) = watch::channel(false);
        (AbortHandle { tx }, AbortSignal { rx: Some(rx) })
    }

    /// Request cancellation. Idempotent.
    pub fn abort(&self) {
        let _ = self.tx.send(true);
    }

    /// Derive another signal from this handle
    pub fn signal(&self) -> AbortSignal {
        AbortSignal {
            rx: Some(self.tx.subscribe()),
        }
    }
}

impl AbortSignal {
    /// A signal that never fires
    pub fn never() -> AbortSignal {
        AbortSignal { rx: None }
    }

    /// Whether cancellation has been requested
    pub fn is_aborted(&self) -> bool {
        self.rx.as_ref().map(|rx| *rx.borrow()).unwrap_or(false)
    }

    /// Resolve once cancellation is requested. Pending forever for a
    /// never-signal or when the handle is dropped without aborting.
    pub async fn aborted(&self) {
        let Some(rx) = &self.rx else {
            std::future::pending::<()>().await;
            unreachable!()
        };
        let mut rx = rx.clone();
        if *rx.borrow() {
            return;
        }
        loop {
            if rx.changed().await.is_err() {
                // Handle dropped without aborting; stay pending
                std::future::pending::<()>().await;
            }
            if *rx.borrow() {
                return;
            }
        }
    }
}
