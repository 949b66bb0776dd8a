use super::{check_payload, claim_result, effective_timeout, Completion};
use crate::error::CompletionError;
use crate::message::{Response, ResponseStatus};
use crate::value::ValueKind;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tracing::debug;

struct WaitState {
    timeout: Duration,
    armed_at: Instant,
    response: Option<Response>,
    timed_out: bool,
}

/// Completion waiter for a caller that blocks until the result arrives.
///
/// The waiting thread re-computes its deadline every time it wakes up, so a
/// [`set_timeout`](Completion::set_timeout) during the wait rearms it from the
/// moment of the call.
pub struct BlockingWaiter {
    cmd: String,
    expected: Option<ValueKind>,
    state: Mutex<WaitState>,
    cond: Condvar,
}

impl BlockingWaiter {
    pub fn new(cmd: impl Into<String>, expected: Option<ValueKind>, timeout: Duration) -> Self {
        Self {
            cmd: cmd.into(),
            expected,
            state: Mutex::new(WaitState {
                timeout: effective_timeout(timeout),
                armed_at: Instant::now(),
                response: None,
                timed_out: false,
            }),
            cond: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, WaitState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Blocks until a response is delivered or the timeout elapses.
    ///
    /// On expiry the waiter claims the slot itself with a `TIMEOUT` response,
    /// so a late [`complete`](Completion::complete) is a no-op.
    pub fn wait_for_result(&self) -> Response {
        let mut state = self.lock();
        state.armed_at = Instant::now();
        loop {
            if let Some(response) = &state.response {
                return response.clone();
            }
            let deadline = state.armed_at + state.timeout;
            let now = Instant::now();
            if now >= deadline {
                let response = Response::status_only(ResponseStatus::Timeout);
                state.timed_out = true;
                state.response = Some(response.clone());
                debug!(cmd = %self.cmd, timeout_ms = state.timeout.as_millis() as u64, "Async command timed out");
                return response;
            }
            state = self
                .cond
                .wait_timeout(state, deadline - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
    }
}

impl Completion for BlockingWaiter {
    fn is_timed_out(&self) -> bool {
        self.lock().timed_out
    }

    fn has_completed(&self) -> bool {
        self.lock().response.is_some()
    }

    fn timeout(&self) -> Duration {
        self.lock().timeout
    }

    fn set_timeout(&self, timeout: Duration) {
        let mut state = self.lock();
        if state.response.is_some() {
            return;
        }
        state.timeout = effective_timeout(timeout);
        state.armed_at = Instant::now();
        self.cond.notify_all();
    }

    fn complete(&self, response: Response) -> Result<bool, CompletionError> {
        let (response, mismatch) = check_payload(&self.cmd, self.expected, response);
        let mut state = self.lock();
        let claimed = state.response.is_none();
        if claimed {
            state.response = Some(response);
            self.cond.notify_all();
        }
        drop(state);
        claim_result(claimed, mismatch)
    }
}

impl std::fmt::Debug for BlockingWaiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("BlockingWaiter")
            .field("cmd", &self.cmd)
            .field("timeout", &state.timeout)
            .field("completed", &state.response.is_some())
            .field("timed_out", &state.timed_out)
            .finish()
    }
}
