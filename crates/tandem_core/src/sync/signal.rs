//! Single-slot signal: one boolean, one mutex, one condition variable.

use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

/// A single-slot, auto-resetting signal.
///
/// One side calls [`raise`](Self::raise), the other side consumes the signal
/// with [`wait`](Self::wait), [`wait_timeout`](Self::wait_timeout) or
/// [`take`](Self::take). Raising an already raised signal is idempotent: the
/// slot holds at most one pending notification.
///
/// ## Usage
///
/// ```rust
/// use tandem_core::Signal;
///
/// let signal = Signal::new();
/// assert!(!signal.take());
///
/// signal.raise();
/// signal.raise(); // still a single pending notification
/// assert!(signal.is_raised());
/// assert!(signal.take());
/// assert!(!signal.take());
/// ```
#[derive(Debug, Default)]
pub struct Signal {
    raised: Mutex<bool>,
    cond: Condvar,
}

impl Signal {
    /// Creates a signal in the lowered state.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            raised: Mutex::new(false),
            cond: Condvar::new(),
        }
    }

    /// Sets the flag and wakes every waiter.
    pub fn raise(&self) {
        *self.raised.lock() = true;
        self.cond.notify_all();
    }

    /// Blocks until the signal is raised, then lowers it.
    ///
    /// Returns immediately if the signal is already raised.
    pub fn wait(&self) {
        let mut raised = self.raised.lock();
        while !*raised {
            self.cond.wait(&mut raised);
        }
        *raised = false;
    }

    /// Blocks until the signal is raised or `timeout` elapses.
    ///
    /// Returns `true` if the signal was consumed, `false` on timeout.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut raised = self.raised.lock();
        while !*raised {
            if self.cond.wait_until(&mut raised, deadline).timed_out() {
                break;
            }
        }
        std::mem::replace(&mut *raised, false)
    }

    /// Consumes the signal without blocking.
    ///
    /// Returns `true` if it was raised.
    pub fn take(&self) -> bool {
        std::mem::replace(&mut *self.raised.lock(), false)
    }

    /// Lowers the signal without waking anyone.
    pub fn clear(&self) {
        *self.raised.lock() = false;
    }

    /// Returns whether a notification is pending.
    #[must_use]
    pub fn is_raised(&self) -> bool {
        *self.raised.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_wait_returns_after_raise_from_other_thread() {
        let signal = Arc::new(Signal::new());
        let remote = Arc::clone(&signal);

        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(10));
            remote.raise();
        });

        signal.wait();
        assert!(!signal.is_raised(), "wait must lower the flag");
        handle.join().unwrap();
    }

    #[test]
    fn test_wait_does_not_block_when_already_raised() {
        let signal = Signal::new();
        signal.raise();
        signal.wait();
        assert!(!signal.is_raised());
    }

    #[test]
    fn test_wait_timeout_expires() {
        let signal = Signal::new();
        let start = Instant::now();
        assert!(!signal.wait_timeout(Duration::from_millis(20)));
        assert!(start.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn test_wait_timeout_consumes_pending() {
        let signal = Signal::new();
        signal.raise();
        assert!(signal.wait_timeout(Duration::from_secs(5)));
        assert!(!signal.is_raised());
    }

    #[test]
    fn test_raise_is_single_slot() {
        let signal = Signal::new();
        signal.raise();
        signal.raise();
        assert!(signal.take());
        assert!(!signal.take());
    }

    #[test]
    fn test_clear() {
        let signal = Signal::new();
        signal.raise();
        signal.clear();
        assert!(!signal.wait_timeout(Duration::from_millis(1)));
    }
}
