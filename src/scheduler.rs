//! # Task Scheduler
//!
//! The timer-armed completion waiter never runs a timer thread of its own. It
//! hands a delayed task to a [`TaskScheduler`] and keeps the returned
//! [`TaskHandle`] so it can cancel or replace the task later.
//!
//! [`TokioScheduler`] is the production implementation: every task is a tokio
//! task that sleeps for the delay and then runs the closure. Tests that need
//! full control over *when* a timer fires use
//! [`ManualScheduler`](crate::mock::ManualScheduler) instead.

use dashmap::DashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::AbortHandle;
use tracing::trace;

/// Work scheduled for later execution.
pub type ScheduledTask = Box<dyn FnOnce() + Send + 'static>;

/// Opaque identifier of a scheduled task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskHandle(u64);

impl TaskHandle {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn id(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for TaskHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task-{}", self.0)
    }
}

/// Runs delayed tasks on behalf of the engine.
pub trait TaskScheduler: Send + Sync {
    /// Schedules `task` to run once after `delay`.
    fn schedule_delayed(&self, name: &str, task: ScheduledTask, delay: Duration) -> TaskHandle;

    /// Cancels a pending task. Returns false if it already ran or was unknown.
    fn cancel(&self, handle: TaskHandle) -> bool;
}

/// A [`TaskScheduler`] backed by a tokio runtime.
#[derive(Clone)]
pub struct TokioScheduler {
    runtime: Handle,
    pending: Arc<DashMap<u64, AbortHandle>>,
    next_id: Arc<AtomicU64>,
}

impl TokioScheduler {
    pub fn new(runtime: Handle) -> Self {
        Self {
            runtime,
            pending: Arc::new(DashMap::new()),
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Uses the runtime of the calling context, if there is one.
    pub fn try_current() -> Option<Self> {
        Handle::try_current().ok().map(Self::new)
    }

    /// Number of tasks scheduled and not yet run or cancelled.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}

impl fmt::Debug for TokioScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokioScheduler")
            .field("pending", &self.pending.len())
            .finish()
    }
}

impl TaskScheduler for TokioScheduler {
    fn schedule_delayed(&self, name: &str, task: ScheduledTask, delay: Duration) -> TaskHandle {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let pending = Arc::clone(&self.pending);
        let name = name.to_string();
        let join = self.runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            pending.remove(&id);
            trace!(task = %name, id, "Delayed task firing");
            task();
            // The insert below may land after the first remove.
            pending.remove(&id);
        });
        self.pending.insert(id, join.abort_handle());
        if join.is_finished() {
            self.pending.remove(&id);
        }
        TaskHandle::new(id)
    }

    fn cancel(&self, handle: TaskHandle) -> bool {
        match self.pending.remove(&handle.id()) {
            Some((_, abort)) => {
                abort.abort();
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_scheduled_task_runs_after_delay() {
        let scheduler = TokioScheduler::try_current().unwrap();
        let (tx, rx) = tokio::sync::oneshot::channel();
        scheduler.schedule_delayed(
            "fire",
            Box::new(move || {
                let _ = tx.send(());
            }),
            Duration::from_millis(20),
        );
        tokio::time::timeout(Duration::from_secs(2), rx)
            .await
            .expect("task did not fire")
            .unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_immediate_task_leaves_no_pending_entry() {
        let scheduler = TokioScheduler::try_current().unwrap();
        let (release_tx, release_rx) = std::sync::mpsc::channel::<()>();
        let (done_tx, done_rx) = tokio::sync::oneshot::channel();
        scheduler.schedule_delayed(
            "immediate",
            Box::new(move || {
                let _ = release_rx.recv_timeout(Duration::from_secs(2));
                let _ = done_tx.send(());
            }),
            Duration::ZERO,
        );
        release_tx.send(()).unwrap();
        tokio::time::timeout(Duration::from_secs(2), done_rx)
            .await
            .expect("task did not run")
            .unwrap();

        let deadline = tokio::time::Instant::now() + Duration::from_secs(1);
        while scheduler.pending_count() > 0 && tokio::time::Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(scheduler.pending_count(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_cancelled_task_never_runs() {
        let scheduler = TokioScheduler::try_current().unwrap();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        let handle = scheduler.schedule_delayed(
            "cancel-me",
            Box::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
            Duration::from_millis(50),
        );
        assert!(scheduler.cancel(handle));
        assert!(!scheduler.cancel(handle));
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(hits.load(Ordering::SeqCst), 0);
        assert_eq!(scheduler.pending_count(), 0);
    }
}
