//! Cancellation and interruption primitives.
//!
//! Two flavors, both over [`tokio::sync::watch`]:
//!
//! - A cancel pair: the handle requests cancellation once; the token can be
//!   polled synchronously or awaited. Used to tear a motion down mid-flight.
//! - An interruption pair: a motion that finds pending interruptions in its
//!   queue pauses and waits for each to be released before moving again.
//!   Releasing is idempotent.

use tokio::sync::watch;

/// Requests cancellation of the paired [`CancelToken`].
#[derive(Clone, Debug)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelHandle {
    /// Request cancellation. Idempotent.
    pub fn request(&self) {
        self.tx.send_replace(true);
    }
}

/// Observes a cancellation request.
#[derive(Clone, Debug)]
pub struct CancelToken {
    rx: watch::Receiver<bool>,
}

impl CancelToken {
    /// Whether cancellation has been requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Wait until cancellation is requested.
    pub async fn cancelled(&mut self) {
        if *self.rx.borrow_and_update() {
            return;
        }
        // The sender lives inside the handle; if it is dropped without a
        // request, the motion is orphaned and waits forever on the other
        // select arm instead.
        while self.rx.changed().await.is_ok() {
            if *self.rx.borrow() {
                return;
            }
        }
        std::future::pending::<()>().await;
    }
}

/// Create a linked cancel handle/token pair.
#[must_use]
pub fn cancel_pair() -> (CancelHandle, CancelToken) {
    let (tx, rx) = watch::channel(false);
    (CancelHandle { tx }, CancelToken { rx })
}

/// Releases the paired [`InterruptToken`].
#[derive(Clone, Debug)]
pub struct InterruptHandle {
    tx: watch::Sender<bool>,
}

impl InterruptHandle {
    /// Release every waiter. Idempotent.
    pub fn release(&self) {
        self.tx.send_replace(true);
    }

    /// A fresh token observing this interruption.
    #[must_use]
    pub fn token(&self) -> InterruptToken {
        InterruptToken {
            rx: self.tx.subscribe(),
        }
    }
}

/// Waits for an interruption to be released.
#[derive(Clone, Debug)]
pub struct InterruptToken {
    rx: watch::Receiver<bool>,
}

impl InterruptToken {
    /// Wait until released. Returns immediately if the handle was dropped
    /// without releasing; an abandoned interruption must not wedge a walk.
    pub async fn wait(&mut self) {
        if *self.rx.borrow_and_update() {
            return;
        }
        while self.rx.changed().await.is_ok() {
            if *self.rx.borrow() {
                return;
            }
        }
    }
}

/// Create a linked interruption handle/token pair.
#[must_use]
pub fn interruption() -> (InterruptHandle, InterruptToken) {
    let (tx, rx) = watch::channel(false);
    (InterruptHandle { tx }, InterruptToken { rx })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_cancel_observable_sync_and_async() {
        let (handle, mut token) = cancel_pair();
        assert!(!token.is_cancelled());
        handle.request();
        assert!(token.is_cancelled());
        // Must complete immediately even after the request happened.
        tokio::time::timeout(Duration::from_millis(10), token.cancelled())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_cancel_request_idempotent() {
        let (handle, token) = cancel_pair();
        handle.request();
        handle.request();
        assert!(token.is_cancelled());
    }

    #[tokio::test]
    async fn test_interrupt_release_wakes_waiter() {
        let (handle, mut token) = interruption();
        let waiter = tokio::spawn(async move { token.wait().await });
        tokio::task::yield_now().await;
        handle.release();
        tokio::time::timeout(Duration::from_millis(100), waiter)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_interrupt_dropped_handle_does_not_wedge() {
        let (handle, mut token) = interruption();
        drop(handle);
        tokio::time::timeout(Duration::from_millis(10), token.wait())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_interrupt_release_before_wait() {
        let (handle, mut token) = interruption();
        handle.release();
        tokio::time::timeout(Duration::from_millis(10), token.wait())
            .await
            .unwrap();
    }
}
