//! Cooperative cancellation for the pipeline's blocking waits.
//!
//! In normal service both threads run until process exit.  [`CancelToken`]
//! exists so embedders and tests can still terminate deterministically:
//! every blocking wait in the pipeline checks the token between bounded
//! condvar wait slices.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Cheap-to-clone cancellation flag shared across the pipeline's threads.
#[derive(Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request shutdown.  Idempotent; blocking waits observe it within one
    /// wait slice.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}
