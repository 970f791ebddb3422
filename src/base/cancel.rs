//! Cooperative cancellation.
//!
//! A build never suspends and is never interrupted preemptively: long loops
//! poll a shared token at controlled points (per outer iteration, per
//! import, per macro expansion) and unwind with [`Cancelled`] when the host
//! has asked to stop. Callers must not publish any partially-built state
//! after seeing `Cancelled`.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Raised when the host cancelled an in-flight build.
#[derive(Clone, Copy, PartialEq, Eq, Debug, thiserror::Error)]
#[error("operation cancelled")]
pub struct Cancelled;

/// Shared flag polled by build loops.
///
/// Cloning the token shares the flag; cancelling any clone cancels all.
#[derive(Clone, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> CancellationToken {
        CancellationToken::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }

    /// Poll point: returns `Err(Cancelled)` once [`cancel`](Self::cancel)
    /// has been called.
    pub fn check(&self) -> Result<(), Cancelled> {
        if self.is_cancelled() { Err(Cancelled) } else { Ok(()) }
    }
}

impl std::fmt::Debug for CancellationToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancellationToken")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}
