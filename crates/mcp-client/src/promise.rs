//! Single-assignment async results with fan-out (§4.5's "promise / async
//! response" primitive), used wherever a value is produced once but may be
//! awaited from more than one place — e.g. a deferred approval decision
//! that both the tool-call path and a diagnostics hook want to observe.
//!
//! Backed by `tokio::sync::watch` rather than `oneshot`: `oneshot` only
//! supports one receiver, so fan-out would need an extra broadcast layer.
//! `watch` already gives every clone of the handle the last (and, since we
//! only ever write once, the only) value.

use tokio::sync::watch;

/// How a [`Promise`] settled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome<T> {
    /// Settled with a value.
    Resolved(T),
    /// Settled with a rejection reason.
    Rejected(String),
    /// Settled because the operation was cancelled.
    Cancelled,
    /// Settled because a deadline elapsed before anyone resolved it.
    TimedOut,
}

/// The write side. Only the first call among `resolve`/`reject`/`cancel`/
/// `timeout` has any effect; later calls return `false`.
#[derive(Debug)]
pub struct Promise<T: Clone + Send + Sync + 'static> {
    tx: watch::Sender<Option<Outcome<T>>>,
}

/// The read side. Cheap to clone for fan-out; every clone observes the
/// same single settlement.
#[derive(Debug, Clone)]
pub struct PromiseHandle<T: Clone + Send + Sync + 'static> {
    rx: watch::Receiver<Option<Outcome<T>>>,
}

impl<T: Clone + Send + Sync + 'static> Promise<T> {
    /// Builds a fresh, unsettled promise and its first handle.
    #[must_use]
    pub fn new() -> (Self, PromiseHandle<T>) {
        let (tx, rx) = watch::channel(None);
        (Self { tx }, PromiseHandle { rx })
    }

    /// Hands out another reader of the same settlement.
    #[must_use]
    pub fn handle(&self) -> PromiseHandle<T> {
        PromiseHandle { rx: self.tx.subscribe() }
    }

    /// Settles with a value. Returns `false` if already settled.
    pub fn resolve(&self, value: T) -> bool {
        self.settle(Outcome::Resolved(value))
    }

    /// Settles with a rejection. Returns `false` if already settled.
    pub fn reject(&self, reason: impl Into<String>) -> bool {
        self.settle(Outcome::Rejected(reason.into()))
    }

    /// Settles as cancelled. Returns `false` if already settled.
    pub fn cancel(&self) -> bool {
        self.settle(Outcome::Cancelled)
    }

    /// Settles as timed out. Returns `false` if already settled.
    pub fn timeout(&self) -> bool {
        self.settle(Outcome::TimedOut)
    }

    /// Whether a value has already been written.
    #[must_use]
    pub fn is_settled(&self) -> bool {
        self.tx.borrow().is_some()
    }

    fn settle(&self, outcome: Outcome<T>) -> bool {
        let mut applied = false;
        self.tx.send_if_modified(|slot| {
            if slot.is_none() {
                *slot = Some(outcome);
                applied = true;
                true
            } else {
                false
            }
        });
        applied
    }
}

impl<T: Clone + Send + Sync + 'static> Default for Promise<T> {
    fn default() -> Self {
        Self::new().0
    }
}

impl<T: Clone + Send + Sync + 'static> PromiseHandle<T> {
    /// Waits for settlement and returns it. If every [`Promise`] clone is
    /// dropped without settling (the producer panicked or was dropped),
    /// resolves to [`Outcome::Cancelled`].
    pub async fn wait(mut self) -> Outcome<T> {
        loop {
            if let Some(outcome) = self.rx.borrow().clone() {
                return outcome;
            }
            if self.rx.changed().await.is_err() {
                return Outcome::Cancelled;
            }
        }
    }

    /// Non-blocking peek at the current settlement, if any.
    #[must_use]
    pub fn peek(&self) -> Option<Outcome<T>> {
        self.rx.borrow().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn resolve_delivers_to_handle() {
        let (promise, handle) = Promise::new();
        assert!(promise.resolve(42));
        assert_eq!(handle.wait().await, Outcome::Resolved(42));
    }

    #[tokio::test]
    async fn second_settlement_is_ignored() {
        let (promise, handle) = Promise::new();
        assert!(promise.reject("first"));
        assert!(!promise.resolve(1));
        assert_eq!(handle.wait().await, Outcome::Rejected("first".into()));
    }

    #[tokio::test]
    async fn fan_out_to_multiple_handles() {
        let (promise, handle_a) = Promise::new();
        let handle_b = promise.handle();
        promise.resolve("done".to_string());
        assert_eq!(handle_a.wait().await, Outcome::Resolved("done".to_string()));
        assert_eq!(handle_b.wait().await, Outcome::Resolved("done".to_string()));
    }

    #[tokio::test]
    async fn dropping_promise_unsettled_resolves_cancelled() {
        let (promise, handle) = Promise::<i32>::new();
        drop(promise);
        assert_eq!(handle.wait().await, Outcome::Cancelled);
    }

    #[tokio::test]
    async fn waiting_after_settlement_still_observes_it() {
        let (promise, _handle) = Promise::new();
        promise.resolve(7);
        let late_handle = promise.handle();
        assert_eq!(late_handle.wait().await, Outcome::Resolved(7));
    }
}
