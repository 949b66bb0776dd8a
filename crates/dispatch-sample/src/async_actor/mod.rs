//! # AsyncCallback Actor
//!
//! Async commands that return immediately and finish their work later on a
//! tokio task. The operation takes a [`Postman`](actor_dispatch::Postman)
//! from its context, moves it into the task, and completes the call from
//! inside [`Postman::deliver`](actor_dispatch::Postman::deliver).
//!
//! ```text
//! caller ──► async-callback("hi") ──► Ok(None)          (operation returns)
//!                    │
//!                    └─ tokio::spawn ── sleep ── postman.deliver(complete "RES: hi")
//! ```
//!
//! | Command | Params | Declared result | Behaviour |
//! |---------|--------|-----------------|-----------|
//! | `async-callback` | `text` | `Text` | completes with `"RES: {text}"` after [`CALLBACK_DELAY`] |
//! | `async-timeout` | `data` | `Int` | extends its own timeout, never completes |
//! | `async-illegal-type` | `data` | `Text` | completes with an `Int`, which is rejected |

use actor_dispatch::context;
use actor_dispatch::{
    Actor, ActorDef, CallContext, CommandDef, HandlerError, HandlerType, Module, Operation,
    Params, RegistryError, Response, Value, ValueKind,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tracing::{debug, warn};

/// Delay before `async-callback` and `async-illegal-type` complete.
pub const CALLBACK_DELAY: Duration = Duration::from_millis(100);

/// Declared timeout of `async-timeout`.
pub const SHORT_TIMEOUT: Duration = Duration::from_millis(300);

/// What `async-timeout` extends its timeout to while running.
pub const EXTENDED_TIMEOUT: Duration = Duration::from_millis(500);

/// Handler struct. Holds the runtime its background work is spawned on.
#[derive(Debug, Clone)]
pub struct AsyncCallback {
    runtime: Handle,
}

impl AsyncCallback {
    pub fn new(runtime: Handle) -> Self {
        Self { runtime }
    }

    /// Runs `work` on a tokio task after `delay`, with the call's context
    /// installed.
    fn later<F>(&self, ctx: &CallContext, delay: Duration, work: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let postman = ctx.postman();
        self.runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            postman.deliver(work);
        });
    }
}

/// Registers the `AsyncCallback` actor into `module`.
pub fn register(module: &Arc<Module>, runtime: Handle) -> Result<Arc<Actor>, RegistryError> {
    let actor = module.add_actor(
        ActorDef::new(
            "AsyncCallback",
            HandlerType::with_constructor(move || AsyncCallback::new(runtime.clone())),
        )
        .doc("Async callback commands"),
    )?;
    actor.add_command(
        CommandDef::new(
            "async-callback",
            Operation::new::<AsyncCallback, _>("async_callback", 1, async_callback),
        )
        .async_result(ValueKind::Text)
        .doc("Completes later from a tokio task"),
    )?;
    actor.add_command(
        CommandDef::new(
            "async-timeout",
            Operation::new::<AsyncCallback, _>("async_timeout", 1, async_timeout),
        )
        .async_result(ValueKind::Int)
        .timeout(SHORT_TIMEOUT)
        .doc("Extends its timeout and never completes"),
    )?;
    actor.add_command(
        CommandDef::new(
            "async-illegal-type",
            Operation::new::<AsyncCallback, _>("async_illegal_type", 1, async_illegal_type),
        )
        .async_result(ValueKind::Text)
        .doc("Completes with the wrong payload type"),
    )?;
    Ok(actor)
}

/// Completes the call currently delivered to this thread.
fn complete_current(response: Response) {
    let Some(ctx) = context::current() else {
        warn!("Delivered without a call context");
        return;
    };
    let Some(completion) = ctx.completion() else {
        warn!(command = %ctx.command_info(), "Call is not async");
        return;
    };
    match completion.complete(response) {
        Ok(true) => debug!(command = %ctx.command_info(), "Async result delivered"),
        Ok(false) => debug!(command = %ctx.command_info(), "Async result arrived too late"),
        Err(e) => warn!(command = %ctx.command_info(), error = %e, "Async result rejected"),
    }
}

fn async_callback(
    handler: &mut AsyncCallback,
    params: Params,
    ctx: &CallContext,
) -> Result<Option<Value>, HandlerError> {
    let text = params.text(0)?;
    handler.later(ctx, CALLBACK_DELAY, move || {
        complete_current(Response::ok(format!("RES: {text}")));
    });
    Ok(None)
}

fn async_timeout(
    handler: &mut AsyncCallback,
    params: Params,
    ctx: &CallContext,
) -> Result<Option<Value>, HandlerError> {
    let data = params.int(0)?;
    debug!(data, "No callback will follow");
    handler.later(ctx, CALLBACK_DELAY, || {
        if let Some(completion) = context::current().as_ref().and_then(|c| c.completion().cloned()) {
            completion.set_timeout(EXTENDED_TIMEOUT);
        }
    });
    Ok(None)
}

fn async_illegal_type(
    handler: &mut AsyncCallback,
    params: Params,
    ctx: &CallContext,
) -> Result<Option<Value>, HandlerError> {
    let data = params.int(0)?;
    handler.later(ctx, CALLBACK_DELAY, move || complete_current(Response::ok(data)));
    Ok(None)
}
