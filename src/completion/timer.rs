use super::{check_payload, claim_result, effective_timeout, Completion};
use crate::error::CompletionError;
use crate::message::{Response, ResponseStatus};
use crate::scheduler::{TaskHandle, TaskScheduler};
use crate::value::ValueKind;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::debug;

/// Receives the responses of an `async_invoke` call.
pub type ResponseCallback = Arc<dyn Fn(Response) + Send + Sync>;

struct TimerState {
    timeout: Duration,
    task: Option<TaskHandle>,
    // Bumped on every reschedule and on completion. A firing task whose
    // generation is stale does nothing.
    generation: u64,
    completed: bool,
    timed_out: bool,
}

struct TimerInner {
    cmd: String,
    expected: Option<ValueKind>,
    scheduler: Arc<dyn TaskScheduler>,
    callback: ResponseCallback,
    state: Mutex<TimerState>,
    // Held while a callback runs so deliveries never overtake each other.
    delivery: Mutex<()>,
}

/// Completion waiter for a caller that supplied a callback and does not block.
///
/// The timeout is a delayed task on a [`TaskScheduler`]. Callbacks run on the
/// thread that claims the slot and must not call back into the same waiter.
#[derive(Clone)]
pub struct TimerWaiter {
    inner: Arc<TimerInner>,
}

impl TimerWaiter {
    pub fn new(
        cmd: impl Into<String>,
        expected: Option<ValueKind>,
        timeout: Duration,
        scheduler: Arc<dyn TaskScheduler>,
        callback: ResponseCallback,
    ) -> Self {
        Self {
            inner: Arc::new(TimerInner {
                cmd: cmd.into(),
                expected,
                scheduler,
                callback,
                state: Mutex::new(TimerState {
                    timeout: effective_timeout(timeout),
                    task: None,
                    generation: 0,
                    completed: false,
                    timed_out: false,
                }),
                delivery: Mutex::new(()),
            }),
        }
    }

    /// Schedules the timeout task with the current timeout.
    pub fn arm(&self) {
        let timeout = self.inner.lock_state().timeout;
        self.inner.reschedule(&self.inner, timeout);
    }

    /// Delivers a transitional response (normally `ACCEPTED`) unless a
    /// terminal response has already been delivered.
    pub fn accept(&self, response: Response) -> bool {
        let _delivery = self.inner.lock_delivery();
        if self.inner.lock_state().completed {
            return false;
        }
        (self.inner.callback)(response);
        true
    }
}

impl TimerInner {
    fn lock_state(&self) -> MutexGuard<'_, TimerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_delivery(&self) -> MutexGuard<'_, ()> {
        self.delivery.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn reschedule(&self, this: &Arc<TimerInner>, timeout: Duration) {
        let (generation, previous) = {
            let mut state = self.lock_state();
            if state.completed {
                return;
            }
            state.timeout = timeout;
            state.generation += 1;
            (state.generation, state.task.take())
        };
        if let Some(task) = previous {
            self.scheduler.cancel(task);
        }

        // The task keeps the waiter alive: the operation may drop its handle
        // without ever completing, and the timeout must still be delivered.
        let inner = Arc::clone(this);
        let handle = self.scheduler.schedule_delayed(
            &self.cmd,
            Box::new(move || inner.fire(generation)),
            timeout,
        );

        let mut state = self.lock_state();
        if state.generation == generation && !state.completed {
            state.task = Some(handle);
        } else {
            drop(state);
            self.scheduler.cancel(handle);
        }
    }

    fn fire(&self, generation: u64) {
        let _delivery = self.lock_delivery();
        {
            let mut state = self.lock_state();
            if state.completed || state.generation != generation {
                return;
            }
            state.completed = true;
            state.timed_out = true;
            state.task = None;
            debug!(cmd = %self.cmd, timeout_ms = state.timeout.as_millis() as u64, "Async command timed out");
        }
        (self.callback)(Response::status_only(ResponseStatus::Timeout));
    }
}

impl Completion for TimerWaiter {
    fn is_timed_out(&self) -> bool {
        self.inner.lock_state().timed_out
    }

    fn has_completed(&self) -> bool {
        self.inner.lock_state().completed
    }

    fn timeout(&self) -> Duration {
        self.inner.lock_state().timeout
    }

    fn set_timeout(&self, timeout: Duration) {
        self.inner.reschedule(&self.inner, effective_timeout(timeout));
    }

    fn complete(&self, response: Response) -> Result<bool, CompletionError> {
        let (response, mismatch) = check_payload(&self.inner.cmd, self.inner.expected, response);
        let _delivery = self.inner.lock_delivery();
        let task = {
            let mut state = self.inner.lock_state();
            if state.completed {
                return claim_result(false, mismatch);
            }
            state.completed = true;
            state.generation += 1;
            state.task.take()
        };
        if let Some(task) = task {
            self.inner.scheduler.cancel(task);
        }
        (self.inner.callback)(response);
        claim_result(true, mismatch)
    }
}

impl std::fmt::Debug for TimerWaiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.lock_state();
        f.debug_struct("TimerWaiter")
            .field("cmd", &self.inner.cmd)
            .field("timeout", &state.timeout)
            .field("task", &state.task)
            .field("completed", &state.completed)
            .field("timed_out", &state.timed_out)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{ManualScheduler, ResponseRecorder};

    fn waiter(scheduler: &ManualScheduler, recorder: &ResponseRecorder) -> TimerWaiter {
        TimerWaiter::new(
            "cb",
            Some(ValueKind::Text),
            Duration::from_millis(100),
            Arc::new(scheduler.clone()),
            recorder.callback(),
        )
    }

    #[test]
    fn test_timer_fires_timeout_once() {
        let scheduler = ManualScheduler::new();
        let recorder = ResponseRecorder::new();
        let waiter = waiter(&scheduler, &recorder);
        waiter.arm();
        assert_eq!(scheduler.pending_count(), 1);

        assert_eq!(scheduler.fire_all(), 1);
        assert!(waiter.is_timed_out());
        assert_eq!(waiter.complete(Response::ok("late")), Ok(false));
        assert_eq!(recorder.statuses(), vec![ResponseStatus::Timeout]);
    }

    #[test]
    fn test_complete_cancels_timer() {
        let scheduler = ManualScheduler::new();
        let recorder = ResponseRecorder::new();
        let waiter = waiter(&scheduler, &recorder);
        waiter.arm();

        assert_eq!(waiter.complete(Response::ok("done")), Ok(true));
        assert_eq!(scheduler.pending_count(), 0);
        assert_eq!(scheduler.fire_all(), 0);
        assert_eq!(recorder.statuses(), vec![ResponseStatus::Ok]);
    }

    #[test]
    fn test_set_timeout_replaces_task() {
        let scheduler = ManualScheduler::new();
        let recorder = ResponseRecorder::new();
        let waiter = waiter(&scheduler, &recorder);
        waiter.arm();
        waiter.set_timeout(Duration::from_millis(500));

        assert_eq!(scheduler.pending_count(), 1);
        assert_eq!(scheduler.delays(), vec![Duration::from_millis(500)]);
        assert_eq!(waiter.timeout(), Duration::from_millis(500));
    }

    #[test]
    fn test_zero_timeout_reschedules_with_default() {
        let scheduler = ManualScheduler::new();
        let recorder = ResponseRecorder::new();
        let waiter = waiter(&scheduler, &recorder);
        waiter.arm();
        waiter.set_timeout(Duration::ZERO);

        assert_eq!(scheduler.delays(), vec![crate::registry::DEFAULT_TIMEOUT]);
        assert_eq!(waiter.timeout(), crate::registry::DEFAULT_TIMEOUT);
        assert!(!waiter.has_completed());
    }

    #[test]
    fn test_set_timeout_after_completion_is_noop() {
        let scheduler = ManualScheduler::new();
        let recorder = ResponseRecorder::new();
        let waiter = waiter(&scheduler, &recorder);
        waiter.arm();
        waiter.complete(Response::ok("done")).unwrap();
        waiter.set_timeout(Duration::from_millis(500));
        assert_eq!(scheduler.pending_count(), 0);
        assert_eq!(waiter.timeout(), Duration::from_millis(100));
    }

    #[test]
    fn test_accept_is_skipped_after_completion() {
        let scheduler = ManualScheduler::new();
        let recorder = ResponseRecorder::new();
        let waiter = waiter(&scheduler, &recorder);
        waiter.arm();
        assert!(waiter.accept(Response::status_only(ResponseStatus::Accepted)));
        waiter.complete(Response::ok("done")).unwrap();
        assert!(!waiter.accept(Response::status_only(ResponseStatus::Accepted)));
        assert_eq!(
            recorder.statuses(),
            vec![ResponseStatus::Accepted, ResponseStatus::Ok]
        );
    }

    #[test]
    fn test_wrong_payload_is_delivered_as_exception() {
        let scheduler = ManualScheduler::new();
        let recorder = ResponseRecorder::new();
        let waiter = waiter(&scheduler, &recorder);
        waiter.arm();
        assert!(waiter.complete(Response::ok(3)).is_err());
        assert_eq!(scheduler.fire_all(), 0);
        assert_eq!(recorder.statuses(), vec![ResponseStatus::Exception]);
    }
}
