//! # Invocation Engine
//!
//! The [`Invoker`] turns a [`Request`] into exactly one terminal [`Response`].
//!
//! ## Call pipeline
//!
//! ```text
//! RESOLVING ─► AUTHORIZING ─► INSTANTIATING ─► INVOKING ─┬─► COMPLETED
//!                                                         └─► AWAITING_CALLBACK ─► COMPLETED
//! ```
//!
//! 1. **Resolve** the address against the [`Registry`] (enabled entities only).
//!    Unknown or disabled ⇒ `NOT_FOUND`.
//! 2. **Publish** a [`CallContext`] for the call. It is passed to every
//!    collaborator and installed thread-locally until the call returns.
//! 3. **Authorize** with the application's authorizer, else the invoker's. No
//!    authorizer means allow. `Ok(false)` or a logical error ⇒ `UNAUTHORIZED`.
//! 4. **Check arity** of the arguments ⇒ `BAD_PARAMETERS` on mismatch.
//! 5. **Instantiate** the handler through the [`HandlerFactory`]. `None` or a
//!    logical error ⇒ `REJECT`.
//! 6. **Invoke.** A sync command answers `OK` with the returned payload, or
//!    `LOGIC_FAILED` / `BAD_PARAMETERS` for declared failures.
//! 7. **Await** (async commands only). The operation receives a completion
//!    waiter in its context and delivers the result later:
//!    - [`Invoker::sync_invoke`] blocks on a [`BlockingWaiter`];
//!    - [`Invoker::async_invoke`] arms a [`TimerWaiter`], reports `ACCEPTED` to
//!      the callback and returns at once.
//!
//! ## Faults
//!
//! Any undeclared error, and any panic, raised by the authorizer, the factory
//! or the operation becomes `EXCEPTION`. The caller only sees
//! [`INTERNAL_ERROR_MESSAGE`](crate::message::INTERNAL_ERROR_MESSAGE); the
//! fault detail is logged and carried in the response `reference`.
//!
//! Nothing is retried.

use crate::authorizer::{Authorizer, DirectFactory, HandlerFactory};
use crate::completion::{BlockingWaiter, Completion, ResponseCallback, TimerWaiter};
use crate::config::InvokerConfig;
use crate::context::CallContext;
use crate::error::HandlerError;
use crate::handler::HandlerInstance;
use crate::message::{Request, Response, ResponseStatus};
use crate::registry::{Command, Registry};
use crate::scheduler::{TaskScheduler, TokioScheduler};
use crate::value::Value;
use std::any::Any;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, debug_span, error, info, warn};

/// Pipeline stage, used in logs and diagnostic references.
#[derive(Debug, Clone, Copy)]
enum Stage {
    Authorize,
    Instantiate,
    Invoke,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::Authorize => "authorize",
            Stage::Instantiate => "instantiate",
            Stage::Invoke => "invoke",
        })
    }
}

/// Decrements the running-call counter on every exit path.
struct RunningGuard<'a>(&'a AtomicUsize);

impl<'a> RunningGuard<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// The dispatch engine.
///
/// ```rust
/// use actor_dispatch::{
///     ActorDef, CommandDef, HandlerType, Invoker, Operation, Registry, Request, ResponseStatus,
///     Value,
/// };
/// use std::sync::Arc;
///
/// #[derive(Default)]
/// struct Echo;
///
/// let registry = Arc::new(Registry::new());
/// let module = registry
///     .add_application("Demo", None, true, "")
///     .and_then(|app| app.add_module("GLOBAL", true, ""))
///     .unwrap();
/// let echo = module.add_actor(ActorDef::new("Echo", HandlerType::of::<Echo>())).unwrap();
/// echo.add_command(CommandDef::new(
///     "ping",
///     Operation::new::<Echo, _>("ping", 0, |_, _, _| Ok(Some(Value::from("pong")))),
/// ))
/// .unwrap();
///
/// let invoker = Invoker::new(registry);
/// let request = Request::new("Demo", None, "GLOBAL", "Echo", "ping", vec![]).unwrap();
/// let response = invoker.sync_invoke(&request, None);
/// assert_eq!(response.status(), ResponseStatus::Ok);
/// assert_eq!(response.data(), Some(&Value::from("pong")));
/// ```
pub struct Invoker {
    registry: Arc<Registry>,
    authorizer: Option<Arc<dyn Authorizer>>,
    factory: Arc<dyn HandlerFactory>,
    scheduler: Option<Arc<dyn TaskScheduler>>,
    config: InvokerConfig,
    running: AtomicUsize,
}

impl Invoker {
    /// An invoker with no authorizer, a [`DirectFactory`] and default settings.
    pub fn new(registry: Arc<Registry>) -> Self {
        Self {
            registry,
            authorizer: None,
            factory: Arc::new(DirectFactory),
            scheduler: None,
            config: InvokerConfig::default(),
            running: AtomicUsize::new(0),
        }
    }

    /// Invoker-wide authorizer. An application's own authorizer overrides it.
    pub fn with_authorizer(mut self, authorizer: Arc<dyn Authorizer>) -> Self {
        self.authorizer = Some(authorizer);
        self
    }

    pub fn with_factory(mut self, factory: Arc<dyn HandlerFactory>) -> Self {
        self.factory = factory;
        self
    }

    /// Scheduler for async timeouts. Without one, the tokio runtime of the
    /// calling thread is used when there is one.
    pub fn with_scheduler(mut self, scheduler: Arc<dyn TaskScheduler>) -> Self {
        self.scheduler = Some(scheduler);
        self
    }

    pub fn with_config(mut self, config: InvokerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn config(&self) -> &InvokerConfig {
        &self.config
    }

    /// Number of calls currently inside `sync_invoke` or `async_invoke`.
    pub fn running_count(&self) -> usize {
        self.running.load(Ordering::SeqCst)
    }

    /// Invokes `request` and blocks until its terminal response.
    ///
    /// For async commands the calling thread waits on a [`BlockingWaiter`]
    /// for at most `timeout`, else the command's timeout, else the configured
    /// default.
    pub fn sync_invoke(&self, request: &Request, timeout: Option<Duration>) -> Response {
        let _running = RunningGuard::enter(&self.running);
        let _span = debug_span!("sync_invoke", request = %request).entered();

        let Some(info) = self.registry.resolve(request, true) else {
            debug!(request = %request, "Command not found");
            return Response::status_only(ResponseStatus::NotFound);
        };
        let ctx = CallContext::new(request.clone(), info);
        let _ctx_guard = ctx.install();

        let mut instance = match self.prepare(&ctx) {
            Ok(instance) => instance,
            Err(response) => return response,
        };

        let command = Arc::clone(ctx.command_info().command());
        if !command.is_async() {
            return match self.run_operation(&ctx, &mut instance) {
                Ok(data) => Response::new(ResponseStatus::Ok, None, None, data),
                Err(response) => response,
            };
        }

        let timeout = self.effective_timeout(&command, timeout);
        let waiter = Arc::new(BlockingWaiter::new(
            command.cmd(),
            command.async_result(),
            timeout,
        ));
        let async_ctx = ctx.with_completion(Arc::clone(&waiter) as Arc<dyn Completion>);
        let _async_guard = async_ctx.install();

        if let Err(response) = self.run_operation(&async_ctx, &mut instance) {
            let _ = waiter.complete(response);
        }
        debug!(cmd = %command.cmd(), timeout_ms = timeout.as_millis() as u64, "Awaiting async completion");
        waiter.wait_for_result()
    }

    /// Invokes `request` without blocking on async completion.
    ///
    /// `callback` receives exactly one terminal response. For an async command
    /// it may first receive `ACCEPTED`; the terminal response always comes
    /// last.
    pub fn async_invoke<F>(&self, request: Request, callback: F, timeout: Option<Duration>)
    where
        F: Fn(Response) + Send + Sync + 'static,
    {
        let callback: ResponseCallback = Arc::new(callback);
        let _running = RunningGuard::enter(&self.running);
        let _span = debug_span!("async_invoke", request = %request).entered();

        let Some(info) = self.registry.resolve(&request, true) else {
            debug!(request = %request, "Command not found");
            callback(Response::status_only(ResponseStatus::NotFound));
            return;
        };
        let ctx = CallContext::new(request, info);
        let _ctx_guard = ctx.install();

        let mut instance = match self.prepare(&ctx) {
            Ok(instance) => instance,
            Err(response) => {
                callback(response);
                return;
            }
        };

        let command = Arc::clone(ctx.command_info().command());
        if !command.is_async() {
            let response = match self.run_operation(&ctx, &mut instance) {
                Ok(data) => Response::new(ResponseStatus::Ok, None, None, data),
                Err(response) => response,
            };
            callback(response);
            return;
        }

        let Some(scheduler) = self.scheduler_for(&ctx) else {
            let reference = format!("{}: no task scheduler available", ctx.command_info());
            error!(cmd = %command.cmd(), "No task scheduler for async command");
            callback(Response::exception(reference));
            return;
        };
        let timeout = self.effective_timeout(&command, timeout);
        let waiter = TimerWaiter::new(
            command.cmd(),
            command.async_result(),
            timeout,
            scheduler,
            callback,
        );
        let async_ctx = ctx.with_completion(Arc::new(waiter.clone()) as Arc<dyn Completion>);
        let _async_guard = async_ctx.install();

        match self.run_operation(&async_ctx, &mut instance) {
            Ok(_) => {
                waiter.arm();
                waiter.accept(Response::status_only(ResponseStatus::Accepted));
                debug!(cmd = %command.cmd(), timeout_ms = timeout.as_millis() as u64, "Async command accepted");
            }
            Err(response) => {
                let _ = waiter.complete(response);
            }
        }
    }

    /// Waits for running calls to drain.
    ///
    /// Polls every `shutdown_poll_ms` for at most `shutdown_wait_ms` and
    /// returns the number of calls still running.
    pub fn shutdown(&self) -> usize {
        let wait = self.config.shutdown_wait();
        let poll = self.config.shutdown_poll();
        info!(running = self.running_count(), wait_ms = wait.as_millis() as u64, "Invoker shutting down");
        let started = Instant::now();
        while self.running_count() > 0 && started.elapsed() < wait {
            std::thread::sleep(poll.min(wait.saturating_sub(started.elapsed())));
        }
        let remaining = self.running_count();
        if remaining > 0 {
            warn!(remaining, "Invoker shut down with calls still running");
        } else {
            info!("Invoker shut down");
        }
        remaining
    }

    // --------------------------------------------------------------------
    // Pipeline steps
    // --------------------------------------------------------------------

    fn prepare(&self, ctx: &CallContext) -> Result<HandlerInstance, Response> {
        self.authorize(ctx)?;
        self.check_arity(ctx)?;
        self.instantiate(ctx)
    }

    fn authorize(&self, ctx: &CallContext) -> Result<(), Response> {
        let authorizer = ctx
            .command_info()
            .application()
            .authorizer()
            .or_else(|| self.authorizer.clone());
        let Some(authorizer) = authorizer else {
            return Ok(());
        };
        let info = ctx.command_info();
        match guarded(|| authorizer.verify_permission(ctx.request(), ctx)) {
            Ok(true) => Ok(()),
            Ok(false) => {
                warn!(command = %info, "Permission denied");
                Err(Response::status_only(ResponseStatus::Unauthorized))
            }
            Err(HandlerError::Logic(message)) | Err(HandlerError::BadParameters(message)) => {
                warn!(command = %info, reason = %message, "Permission denied");
                Err(Response::with_message(ResponseStatus::Unauthorized, message))
            }
            Err(fault) => Err(fault_response(ctx, Stage::Authorize, &fault)),
        }
    }

    fn check_arity(&self, ctx: &CallContext) -> Result<(), Response> {
        let operation = ctx.command_info().command().operation();
        let given = ctx.request().params().len();
        if given == operation.arity() {
            return Ok(());
        }
        let detail = format!(
            "{} expects {} parameter(s), got {}",
            operation,
            operation.arity(),
            given
        );
        warn!(command = %ctx.command_info(), expected = operation.arity(), given, "Parameter count mismatch");
        Err(Response::new(
            ResponseStatus::BadParameters,
            Some(format!("Expected {} parameter(s), got {}", operation.arity(), given)),
            Some(detail),
            None,
        ))
    }

    fn instantiate(&self, ctx: &CallContext) -> Result<HandlerInstance, Response> {
        match guarded(|| self.factory.create_instance(ctx.request(), ctx)) {
            Ok(Some(instance)) => Ok(instance),
            Ok(None) => {
                warn!(command = %ctx.command_info(), "Factory declined the call");
                Err(Response::status_only(ResponseStatus::Reject))
            }
            Err(HandlerError::Logic(message)) | Err(HandlerError::BadParameters(message)) => {
                warn!(command = %ctx.command_info(), reason = %message, "Factory rejected the call");
                Err(Response::with_message(ResponseStatus::Reject, message))
            }
            Err(fault) => Err(fault_response(ctx, Stage::Instantiate, &fault)),
        }
    }

    fn run_operation(
        &self,
        ctx: &CallContext,
        instance: &mut HandlerInstance,
    ) -> Result<Option<Value>, Response> {
        let operation = ctx.command_info().command().operation();
        match guarded(|| operation.call(instance, ctx.request().to_params(), ctx)) {
            Ok(data) => Ok(data),
            Err(HandlerError::Logic(message)) => {
                warn!(command = %ctx.command_info(), reason = %message, "Logic failed");
                Err(Response::with_message(ResponseStatus::LogicFailed, message))
            }
            Err(HandlerError::BadParameters(message)) => {
                warn!(command = %ctx.command_info(), reason = %message, "Bad parameters");
                Err(Response::new(
                    ResponseStatus::BadParameters,
                    Some(message),
                    Some(operation.to_string()),
                    None,
                ))
            }
            Err(fault) => Err(fault_response(ctx, Stage::Invoke, &fault)),
        }
    }

    fn effective_timeout(&self, command: &Command, requested: Option<Duration>) -> Duration {
        requested
            .filter(|t| !t.is_zero())
            .or_else(|| command.declared_timeout())
            .unwrap_or_else(|| self.config.default_timeout())
    }

    fn scheduler_for(&self, ctx: &CallContext) -> Option<Arc<dyn TaskScheduler>> {
        ctx.command_info()
            .application()
            .scheduler()
            .or_else(|| self.scheduler.clone())
            .or_else(|| {
                TokioScheduler::try_current().map(|s| Arc::new(s) as Arc<dyn TaskScheduler>)
            })
    }
}

impl fmt::Debug for Invoker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Invoker")
            .field("registry", &self.registry)
            .field("authorizer", &self.authorizer.is_some())
            .field("scheduler", &self.scheduler.is_some())
            .field("config", &self.config)
            .field("running", &self.running_count())
            .finish()
    }
}

/// Runs a collaborator, turning a panic into an undeclared fault.
fn guarded<T>(f: impl FnOnce() -> Result<T, HandlerError>) -> Result<T, HandlerError> {
    catch_unwind(AssertUnwindSafe(f))
        .unwrap_or_else(|payload| Err(HandlerError::fault(panic_message(payload.as_ref()))))
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        format!("panicked: {message}")
    } else if let Some(message) = payload.downcast_ref::<String>() {
        format!("panicked: {message}")
    } else {
        "panicked".to_string()
    }
}

fn fault_response(ctx: &CallContext, stage: Stage, fault: &HandlerError) -> Response {
    let info = ctx.command_info();
    let reference = format!("{} [{}] {}: {}", info, stage, info.command().operation(), fault);
    error!(
        app = %info.application().app_id(),
        module = %info.module().module_id(),
        actor = %info.actor().actor_id(),
        cmd = %info.command().cmd(),
        %stage,
        error = %fault,
        "Undeclared fault"
    );
    Response::exception(reference)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_panic_message_extraction() {
        let payload: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(payload.as_ref()), "panicked: boom");
        let payload: Box<dyn Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(payload.as_ref()), "panicked: bang");
        let payload: Box<dyn Any + Send> = Box::new(7_u8);
        assert_eq!(panic_message(payload.as_ref()), "panicked");
    }

    #[test]
    fn test_guarded_converts_panic_to_fault() {
        let result: Result<(), HandlerError> = guarded(|| panic!("kaboom"));
        match result {
            Err(HandlerError::Fault(err)) => assert!(err.to_string().contains("kaboom")),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_running_guard_balances_counter() {
        let counter = AtomicUsize::new(0);
        {
            let _a = RunningGuard::enter(&counter);
            let _b = RunningGuard::enter(&counter);
            assert_eq!(counter.load(Ordering::SeqCst), 2);
        }
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }
}
