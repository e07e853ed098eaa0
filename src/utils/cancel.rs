//! Cooperative cancellation for the long-running loops
//!
//! Every loop takes a [`CancelToken`] and checks it at each suspension point.
//! Sleeping through [`CancelToken::wait`] wakes up early on cancellation.

use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::time::Duration;

/// Shared stop flag
#[derive(Clone, Default)]
pub struct CancelToken {
    inner: Arc<(Mutex<bool>, Condvar)>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation and wake every waiter
    pub fn cancel(&self) {
        let (flag, wakeup) = &*self.inner;
        *flag.lock() = true;
        wakeup.notify_all();
    }

    pub fn is_cancelled(&self) -> bool {
        *self.inner.0.lock()
    }

    /// Sleep for `timeout` unless cancelled first.
    ///
    /// Returns `true` if the token is cancelled.
    pub fn wait(&self, timeout: Duration) -> bool {
        let (flag, wakeup) = &*self.inner;
        let mut cancelled = flag.lock();
        if !*cancelled && !timeout.is_zero() {
            wakeup.wait_while_for(&mut cancelled, |cancelled| !*cancelled, timeout);
        }
        *cancelled
    }
}

impl std::fmt::Debug for CancelToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancelToken")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}
