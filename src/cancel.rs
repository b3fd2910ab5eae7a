//! Cooperative cancellation signal for long index builds and range scans.
//!
//! The core has no intrinsic timeouts; cancellation is caller-driven only.
//! Builds and scans check the signal at every loop boundary and report
//! [`crate::guard::IndexError::Cancelled`] when it has fired — a cancelled
//! query is never silently treated as Allow.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Cloneable cancellation flag shared between a caller and in-flight scans.
///
/// Clones observe the same underlying flag, so a caller keeps one clone as
/// the trigger handle and passes another into the scan.
#[derive(Debug, Clone, Default)]
pub struct CancelSignal {
    cancelled: Arc<AtomicBool>,
}

impl CancelSignal {
    /// A fresh, un-fired signal.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fire the signal. Idempotent; scans observe it at their next loop
    /// boundary.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    /// Whether the signal has fired.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }
}
