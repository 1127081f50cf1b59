use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::Notify;

type Observer = Box<dyn FnOnce() + Send + 'static>;

/// One-shot cancellation signal shared between the issuer of a call and its executor.
///
/// Signaling never stops anything by itself; the executor has to observe the token
/// (`cancelled().await` or `is_signaled()`) and abandon its work cooperatively.
#[derive(Clone, Default)]
pub struct CancellationToken {
    inner: Arc<TokenInner>,
}

#[derive(Default)]
struct TokenInner {
    signaled: AtomicBool,
    observers: Mutex<Vec<Observer>>,
    notify: Notify,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Signals the token. Returns `true` only for the call that performed the transition.
    pub fn signal(&self) -> bool {
        if self.inner.signaled.swap(true, Ordering::AcqRel) {
            return false;
        }

        let observers = std::mem::take(
            &mut *self
                .inner
                .observers
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        );
        self.inner.notify.notify_waiters();

        for observer in observers {
            observer();
        }
        true
    }

    pub fn is_signaled(&self) -> bool {
        self.inner.signaled.load(Ordering::Acquire)
    }

    /// Registers a reaction to the signal. Runs immediately when the token is already signaled.
    pub fn on_signal(&self, observer: impl FnOnce() + Send + 'static) {
        let mut observers = self
            .inner
            .observers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        // `signal` flips the flag before draining, so checking under the lock cannot miss it.
        if self.is_signaled() {
            drop(observers);
            observer();
            return;
        }
        observers.push(Box::new(observer));
    }

    /// Completes once the token has been signaled.
    pub async fn cancelled(&self) {
        loop {
            let notified = self.inner.notify.notified();
            if self.is_signaled() {
                return;
            }
            notified.await;
        }
    }
}

impl fmt::Debug for CancellationToken {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("CancellationToken")
            .field("signaled", &self.is_signaled())
            .finish()
    }
}
