//! Cooperative cancellation tokens
//!
//! Each pending operation carries one token. Any thread may cancel it; the
//! worker loop and the running command poll it at defined checkpoints.
//! Cancellation is a signal, not a preemptive interrupt: a command that never
//! polls runs to completion.
//!
//! Callbacks registered with [`CancelToken::on_cancel`] are the side-channel
//! for propagating cancellation into nested calls a command has in flight
//! (e.g. an outstanding network request).

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

type CancelCallback = Box<dyn Fn() + Send + Sync>;

#[derive(Default)]
struct Inner {
    cancelled: AtomicBool,
    callbacks: Mutex<Vec<CancelCallback>>,
}

/// Thread-safe cancellation flag with propagation callbacks
#[derive(Clone, Default)]
pub struct CancelToken {
    inner: Arc<Inner>,
}

impl CancelToken {
    /// Create a fresh, uncancelled token
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the token has been cancelled
    #[inline]
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::Acquire)
    }

    /// Cancel the token and fire every registered callback
    ///
    /// Idempotent: callbacks run at most once per registration.
    pub fn cancel(&self) {
        if self.inner.cancelled.swap(true, Ordering::AcqRel) {
            return;
        }
        let callbacks = std::mem::take(&mut *self.inner.callbacks.lock());
        for callback in &callbacks {
            callback();
        }
    }

    /// Register a callback fired on cancellation
    ///
    /// When the token is already cancelled the callback runs immediately on
    /// the registering thread, so late registrations cannot miss the signal.
    pub fn on_cancel(&self, callback: impl Fn() + Send + Sync + 'static) {
        if self.is_cancelled() {
            callback();
            return;
        }
        let mut callbacks = self.inner.callbacks.lock();
        // re-check under the lock, cancel() may have raced us
        if self.is_cancelled() {
            drop(callbacks);
            callback();
        } else {
            callbacks.push(Box::new(callback));
        }
    }
}

impl std::fmt::Debug for CancelToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancelToken")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn token_starts_uncancelled() {
        let token = CancelToken::new();
        assert!(!token.is_cancelled());
    }

    #[test]
    fn cancel_propagates_to_clones() {
        let token = CancelToken::new();
        let clone = token.clone();
        token.cancel();
        assert!(clone.is_cancelled());
    }

    #[test]
    fn callbacks_fire_once() {
        let token = CancelToken::new();
        let fired = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&fired);
        token.on_cancel(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        token.cancel();
        token.cancel();
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn late_registration_fires_immediately() {
        let token = CancelToken::new();
        token.cancel();

        let fired = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&fired);
        token.on_cancel(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn cancel_from_another_thread() {
        let token = CancelToken::new();
        let clone = token.clone();

        let handle = std::thread::spawn(move || clone.cancel());
        handle.join().unwrap();

        assert!(token.is_cancelled());
    }
}
