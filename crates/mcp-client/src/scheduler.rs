//! A single monotonic-clock deadline scheduler shared by every entry in a
//! registry, replacing a one-timer-thread-per-entry design (§9): one
//! background task owns a min-heap of deadlines and sleeps until the next
//! one, waking early whenever a new, sooner deadline is scheduled.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashSet};
use std::sync::Mutex;
use std::time::Instant;

use tokio::sync::{mpsc, Notify};
use tokio::task::JoinHandle;

#[derive(Debug)]
struct Heap {
    entries: BinaryHeap<Reverse<(Instant, String)>>,
    cancelled: HashSet<String>,
}

/// Fires `id` on its channel once `deadline` elapses, unless cancelled
/// first. One instance is shared by all entries of a single registry.
#[derive(Debug)]
pub struct Scheduler {
    heap: std::sync::Arc<Mutex<Heap>>,
    wake: std::sync::Arc<Notify>,
    task: JoinHandle<()>,
}

impl Scheduler {
    /// Spawns the background loop. Expired ids are sent on `expired_tx`;
    /// the receiving end is expected to be drained for the lifetime of the
    /// scheduler.
    #[must_use]
    pub fn spawn(expired_tx: mpsc::UnboundedSender<String>) -> Self {
        let heap = std::sync::Arc::new(Mutex::new(Heap {
            entries: BinaryHeap::new(),
            cancelled: HashSet::new(),
        }));
        let wake = std::sync::Arc::new(Notify::new());

        let task_heap = heap.clone();
        let task_wake = wake.clone();
        let task = tokio::spawn(async move {
            loop {
                let next_deadline = {
                    let guard = task_heap.lock().unwrap();
                    guard.entries.peek().map(|Reverse((deadline, _))| *deadline)
                };

                match next_deadline {
                    None => task_wake.notified().await,
                    Some(deadline) => {
                        tokio::select! {
                            () = tokio::time::sleep_until(deadline.into()) => {}
                            () = task_wake.notified() => continue,
                        }
                    }
                }

                let fired = {
                    let mut guard = task_heap.lock().unwrap();
                    let now = Instant::now();
                    let mut fired = Vec::new();
                    while let Some(Reverse((deadline, _))) = guard.entries.peek() {
                        if *deadline > now {
                            break;
                        }
                        let Reverse((_, id)) = guard.entries.pop().unwrap();
                        if guard.cancelled.remove(&id) {
                            continue;
                        }
                        fired.push(id);
                    }
                    fired
                };

                for id in fired {
                    if expired_tx.send(id).is_err() {
                        return;
                    }
                }
            }
        });

        Self { heap, wake, task }
    }

    /// Schedules `id` to fire at `deadline`.
    pub fn schedule(&self, id: String, deadline: Instant) {
        let mut guard = self.heap.lock().unwrap();
        guard.cancelled.remove(&id);
        guard.entries.push(Reverse((deadline, id)));
        drop(guard);
        self.wake.notify_one();
    }

    /// Cancels a previously scheduled id. Cheap lazy deletion: the entry
    /// stays in the heap and is skipped when it would otherwise fire.
    pub fn cancel(&self, id: &str) {
        self.heap.lock().unwrap().cancelled.insert(id.to_string());
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn fires_after_deadline() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let scheduler = Scheduler::spawn(tx);
        scheduler.schedule("a".into(), Instant::now() + Duration::from_millis(20));
        let id = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("did not time out")
            .expect("channel closed");
        assert_eq!(id, "a");
    }

    #[tokio::test]
    async fn cancelled_entry_never_fires() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let scheduler = Scheduler::spawn(tx);
        scheduler.schedule("a".into(), Instant::now() + Duration::from_millis(20));
        scheduler.cancel("a");
        let result = tokio::time::timeout(Duration::from_millis(80), rx.recv()).await;
        assert!(result.is_err(), "cancelled entry should not fire");
    }

    #[tokio::test]
    async fn later_schedule_does_not_delay_earlier_one() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let scheduler = Scheduler::spawn(tx);
        scheduler.schedule("late".into(), Instant::now() + Duration::from_secs(5));
        scheduler.schedule("early".into(), Instant::now() + Duration::from_millis(15));
        let id = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("did not time out")
            .expect("channel closed");
        assert_eq!(id, "early");
    }
}
