//! [`CancellableOperation`]: the per-request state machine from §3/§4.5.
//!
//! Every in-flight client request and every in-progress server-initiated
//! request handler is wrapped in one of these so a timeout, an explicit
//! `notifications/cancelled`, or coordinator shutdown can unblock the
//! worker driving it. Built on `tokio::sync::watch` rather than `Notify`:
//! a waiter that calls [`CancellableOperation::wait_for_cancel`] after
//! `cancel` has already fired still observes the cancelled state
//! immediately, whereas `Notify::notified()` would miss a wakeup that
//! happened before the waiter subscribed.

use tokio::sync::watch;

/// `pending → running → completed`, or `pending → cancelled` /
/// `running → cancelling → cancelled` (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationState {
    /// Constructed, not yet started.
    Pending,
    /// A worker has claimed it and is doing the work.
    Running,
    /// Cancellation was requested on a running operation; the worker has
    /// not yet observed and acknowledged it.
    Cancelling,
    /// Cancelled, either directly from `Pending` or via `Cancelling`.
    Cancelled,
    /// Finished normally.
    Completed,
}

/// Outcome of a [`CancellableOperation::cancel`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelOutcome {
    /// The operation is now (or was already) cancelled.
    Cancelled,
    /// The operation had already completed; cancellation is a no-op
    /// (§3: "cancellation of a completed operation ... returns
    /// `already_completed`").
    AlreadyCompleted,
}

/// The state machine itself. Cheap to clone (an `Arc` the caller keeps
/// alongside its worker task), cheap to poll, safe to cancel from any
/// thread.
#[derive(Debug)]
pub struct CancellableOperation {
    tx: watch::Sender<OperationState>,
}

impl Default for CancellableOperation {
    fn default() -> Self {
        Self::new()
    }
}

impl CancellableOperation {
    /// Builds a new operation in [`OperationState::Pending`].
    #[must_use]
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(OperationState::Pending);
        Self { tx }
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> OperationState {
        *self.tx.borrow()
    }

    /// `Pending -> Running`. Returns `false` if the operation wasn't
    /// pending (already started, or already cancelled).
    pub fn start(&self) -> bool {
        self.transition(OperationState::Pending, OperationState::Running)
    }

    /// `Running -> Completed` (also accepts `Pending -> Completed` for
    /// operations that resolve synchronously without an explicit `start`).
    /// Returns `false` once cancelled.
    pub fn complete(&self) -> bool {
        let mut ok = false;
        self.tx.send_if_modified(|state| match state {
            OperationState::Pending | OperationState::Running => {
                *state = OperationState::Completed;
                ok = true;
                true
            }
            _ => false,
        });
        ok
    }

    /// Requests cancellation. `Pending` moves directly to `Cancelled`;
    /// `Running` moves to `Cancelling` and wakes anyone blocked in
    /// [`Self::wait_for_cancel`], which is expected to finish the job by
    /// calling [`Self::finalize_cancelled`] once it has actually unwound.
    pub fn cancel(&self) -> CancelOutcome {
        let mut outcome = CancelOutcome::Cancelled;
        self.tx.send_if_modified(|state| match state {
            OperationState::Completed => {
                outcome = CancelOutcome::AlreadyCompleted;
                false
            }
            OperationState::Pending => {
                *state = OperationState::Cancelled;
                true
            }
            OperationState::Running => {
                *state = OperationState::Cancelling;
                true
            }
            OperationState::Cancelling | OperationState::Cancelled => false,
        });
        outcome
    }

    /// `Cancelling -> Cancelled`, called by the worker once it has
    /// actually stopped doing work in response to [`Self::cancel`].
    pub fn finalize_cancelled(&self) {
        self.tx.send_if_modified(|state| {
            if *state == OperationState::Cancelling {
                *state = OperationState::Cancelled;
                true
            } else {
                false
            }
        });
    }

    /// Resolves once cancellation has been requested (`Cancelling` or
    /// `Cancelled`). A worker races this against its real work in a
    /// `tokio::select!` to be interruptible mid-flight.
    pub async fn wait_for_cancel(&self) {
        let mut rx = self.tx.subscribe();
        if matches!(*rx.borrow(), OperationState::Cancelling | OperationState::Cancelled) {
            return;
        }
        let _ = rx
            .wait_for(|s| matches!(s, OperationState::Cancelling | OperationState::Cancelled))
            .await;
    }

    fn transition(&self, from: OperationState, to: OperationState) -> bool {
        let mut ok = false;
        self.tx.send_if_modified(|state| {
            if *state == from {
                *state = to;
                ok = true;
                true
            } else {
                false
            }
        });
        ok
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pending_cancel_skips_cancelling() {
        let op = CancellableOperation::new();
        assert_eq!(op.cancel(), CancelOutcome::Cancelled);
        assert_eq!(op.state(), OperationState::Cancelled);
    }

    #[test]
    fn completed_cancel_is_no_op() {
        let op = CancellableOperation::new();
        op.start();
        op.complete();
        assert_eq!(op.cancel(), CancelOutcome::AlreadyCompleted);
        assert_eq!(op.state(), OperationState::Completed);
    }

    #[tokio::test]
    async fn running_cancel_unblocks_waiter() {
        let op = std::sync::Arc::new(CancellableOperation::new());
        op.start();
        let waiter = {
            let op = op.clone();
            tokio::spawn(async move {
                op.wait_for_cancel().await;
                op.finalize_cancelled();
            })
        };
        assert_eq!(op.cancel(), CancelOutcome::Cancelled);
        waiter.await.unwrap();
        assert_eq!(op.state(), OperationState::Cancelled);
    }

    #[test]
    fn double_start_rejected() {
        let op = CancellableOperation::new();
        assert!(op.start());
        assert!(!op.start());
    }
}
