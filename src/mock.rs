//! # Test Doubles
//!
//! Three helpers make engine code testable without real timing:
//!
//! | Double | Replaces | Typical use |
//! |--------|----------|-------------|
//! | [`MockDispatcher`] | [`DispatchClient`](crate::DispatchClient) | unit-testing code that *sends* requests |
//! | [`ManualScheduler`] | [`TokioScheduler`](crate::TokioScheduler) | deciding exactly when an async timeout fires |
//! | [`ResponseRecorder`] | an `async_invoke` callback | asserting every response a call delivered |
//!
//! ## Driving timeouts by hand
//!
//! ```rust
//! use actor_dispatch::mock::{ManualScheduler, ResponseRecorder};
//! use actor_dispatch::{ResponseStatus, TimerWaiter, ValueKind};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! let scheduler = ManualScheduler::new();
//! let recorder = ResponseRecorder::new();
//! let waiter = TimerWaiter::new(
//!     "async-callback",
//!     Some(ValueKind::Text),
//!     Duration::from_secs(60),
//!     Arc::new(scheduler.clone()),
//!     recorder.callback(),
//! );
//! waiter.arm();
//!
//! // No real minute passes: the test decides the timer has expired.
//! scheduler.fire_all();
//! assert_eq!(recorder.statuses(), vec![ResponseStatus::Timeout]);
//! ```
//!
//! ## Mocking the dispatcher
//!
//! Expectations are consumed in order. A request that does not match the next
//! expectation panics, and [`MockDispatcher::verify`] panics if some were never
//! consumed.

use crate::client_trait::Dispatcher;
use crate::completion::ResponseCallback;
use crate::error::ClientError;
use crate::message::{Request, Response, ResponseStatus};
use crate::scheduler::{ScheduledTask, TaskHandle, TaskScheduler};
use crate::value::Value;
use async_trait::async_trait;
use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// =============================================================================
// MOCK DISPATCHER
// =============================================================================

struct Expectation {
    address: [String; 4],
    response: Result<Response, ClientError>,
}

impl Expectation {
    fn matches(&self, request: &Request) -> bool {
        let actual = [
            request.app_id(),
            request.module_id(),
            request.actor_id(),
            request.cmd(),
        ];
        self.address
            .iter()
            .zip(actual)
            .all(|(expected, actual)| expected.eq_ignore_ascii_case(actual.trim()))
    }
}

/// A [`Dispatcher`] answering from a queue of expectations.
#[derive(Default)]
pub struct MockDispatcher {
    expectations: Arc<Mutex<VecDeque<Expectation>>>,
    received: Arc<Mutex<Vec<Request>>>,
}

impl MockDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Expects a request addressed to `app/module/actor/cmd` (case-insensitive).
    pub fn expect(&mut self, app: &str, module: &str, actor: &str, cmd: &str) -> ExpectationBuilder {
        ExpectationBuilder {
            address: [app, module, actor, cmd].map(|part| part.trim().to_string()),
            expectations: Arc::clone(&self.expectations),
        }
    }

    /// Requests received so far, in order.
    pub fn received(&self) -> Vec<Request> {
        lock(&self.received).clone()
    }

    /// Panics unless every expectation was consumed.
    pub fn verify(&self) {
        let remaining = lock(&self.expectations).len();
        if remaining > 0 {
            panic!("Not all expectations were met. {remaining} remaining");
        }
    }

    fn answer(&self, request: Request) -> Result<Response, ClientError> {
        let expectation = lock(&self.expectations).pop_front();
        let Some(expectation) = expectation else {
            panic!("Unexpected request {request}: no expectations left");
        };
        if !expectation.matches(&request) {
            panic!(
                "Unexpected request {request}: expected {}",
                expectation.address.join("/")
            );
        }
        lock(&self.received).push(request);
        expectation.response
    }
}

#[async_trait]
impl Dispatcher for MockDispatcher {
    async fn dispatch(&self, request: Request) -> Result<Response, ClientError> {
        self.answer(request)
    }

    async fn dispatch_blocking(&self, request: Request) -> Result<Response, ClientError> {
        self.answer(request)
    }
}

/// Builder returned by [`MockDispatcher::expect`].
pub struct ExpectationBuilder {
    address: [String; 4],
    expectations: Arc<Mutex<VecDeque<Expectation>>>,
}

impl ExpectationBuilder {
    pub fn return_response(self, response: Response) {
        self.push(Ok(response));
    }

    /// Answers `OK` with `data`.
    pub fn return_ok(self, data: impl Into<Value>) {
        self.push(Ok(Response::ok(data)));
    }

    /// Answers with a bare status.
    pub fn return_status(self, status: ResponseStatus) {
        self.push(Ok(Response::status_only(status)));
    }

    pub fn return_err(self, error: ClientError) {
        self.push(Err(error));
    }

    fn push(self, response: Result<Response, ClientError>) {
        lock(&self.expectations).push_back(Expectation {
            address: self.address,
            response,
        });
    }
}

// =============================================================================
// MANUAL SCHEDULER
// =============================================================================

struct ManualTask {
    name: String,
    delay: Duration,
    task: ScheduledTask,
}

#[derive(Default)]
struct ManualState {
    next_id: u64,
    tasks: BTreeMap<u64, ManualTask>,
}

/// A [`TaskScheduler`] whose tasks run only when the test says so.
///
/// Clones share the same task queue.
#[derive(Clone, Default)]
pub struct ManualScheduler {
    state: Arc<Mutex<ManualState>>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pending_count(&self) -> usize {
        lock(&self.state).tasks.len()
    }

    /// Delays of the pending tasks, oldest first.
    pub fn delays(&self) -> Vec<Duration> {
        lock(&self.state).tasks.values().map(|t| t.delay).collect()
    }

    /// Names of the pending tasks, oldest first.
    pub fn names(&self) -> Vec<String> {
        lock(&self.state).tasks.values().map(|t| t.name.clone()).collect()
    }

    /// Runs one pending task. Returns false if it was not pending.
    pub fn fire(&self, handle: TaskHandle) -> bool {
        let task = lock(&self.state).tasks.remove(&handle.id());
        match task {
            Some(task) => {
                (task.task)();
                true
            }
            None => false,
        }
    }

    /// Runs every task pending at the time of the call and returns how many
    /// ran. Tasks scheduled while firing stay pending.
    pub fn fire_all(&self) -> usize {
        let tasks = std::mem::take(&mut lock(&self.state).tasks);
        let count = tasks.len();
        for task in tasks.into_values() {
            (task.task)();
        }
        count
    }
}

impl TaskScheduler for ManualScheduler {
    fn schedule_delayed(&self, name: &str, task: ScheduledTask, delay: Duration) -> TaskHandle {
        let mut state = lock(&self.state);
        state.next_id += 1;
        let id = state.next_id;
        state.tasks.insert(
            id,
            ManualTask {
                name: name.to_string(),
                delay,
                task,
            },
        );
        TaskHandle::new(id)
    }

    fn cancel(&self, handle: TaskHandle) -> bool {
        lock(&self.state).tasks.remove(&handle.id()).is_some()
    }
}

impl std::fmt::Debug for ManualScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManualScheduler")
            .field("pending", &self.pending_count())
            .finish()
    }
}

// =============================================================================
// RESPONSE RECORDER
// =============================================================================

/// Records every response delivered to an `async_invoke` callback.
#[derive(Clone, Default)]
pub struct ResponseRecorder {
    inner: Arc<(Mutex<Vec<Response>>, Condvar)>,
}

impl ResponseRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// A callback appending to this recorder.
    pub fn callback(&self) -> ResponseCallback {
        let inner = Arc::clone(&self.inner);
        Arc::new(move |response: Response| {
            let (responses, cond) = &*inner;
            lock(responses).push(response);
            cond.notify_all();
        })
    }

    pub fn responses(&self) -> Vec<Response> {
        lock(&self.inner.0).clone()
    }

    pub fn statuses(&self) -> Vec<ResponseStatus> {
        lock(&self.inner.0).iter().map(Response::status).collect()
    }

    pub fn len(&self) -> usize {
        lock(&self.inner.0).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The most recent response.
    pub fn last(&self) -> Option<Response> {
        lock(&self.inner.0).last().cloned()
    }

    /// Blocks until at least `count` responses arrived or `timeout` elapsed.
    pub fn wait_for(&self, count: usize, timeout: Duration) -> bool {
        let (responses, cond) = &*self.inner;
        let deadline = Instant::now() + timeout;
        let mut guard = lock(responses);
        while guard.len() < count {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            guard = cond
                .wait_timeout(guard, deadline - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
        true
    }

    /// Blocks until a terminal response arrived and returns it.
    pub fn wait_for_terminal(&self, timeout: Duration) -> Option<Response> {
        let (responses, cond) = &*self.inner;
        let deadline = Instant::now() + timeout;
        let mut guard = lock(responses);
        loop {
            if let Some(terminal) = guard.iter().find(|r| r.status().is_terminal()) {
                return Some(terminal.clone());
            }
            let now = Instant::now();
            if now >= deadline {
                return None;
            }
            guard = cond
                .wait_timeout(guard, deadline - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
    }
}

impl std::fmt::Debug for ResponseRecorder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseRecorder")
            .field("statuses", &self.statuses())
            .finish()
    }
}
