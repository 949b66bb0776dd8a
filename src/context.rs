//! # Call Context
//!
//! Every call carries a [`CallContext`]: the original [`Request`], the resolved
//! [`CommandInfo`] and, for async commands, the active [`Completion`] waiter.
//!
//! ## Two ways to reach it
//!
//! 1. **Explicitly.** The authorizer, the factory and the operation all receive
//!    `&CallContext` as a parameter. This is the preferred path.
//! 2. **Ambiently.** For the synchronous portion of a call the invoker also
//!    installs the context in a thread-local slot, so helper code deep in a
//!    handler can call [`current()`]. The slot is owned by a [`ContextGuard`]
//!    and cleared when the guard drops, on every exit path including unwinding.
//!
//! ## Crossing threads
//!
//! Nothing is inherited by other threads. When an async operation resumes on a
//! different worker it takes a [`Postman`] with it and calls
//! [`Postman::deliver`], which installs the snapshot for the duration of the
//! closure and clears it afterwards:
//!
//! ```rust,ignore
//! let postman = ctx.postman();
//! tokio::spawn(async move {
//!     let data = fetch().await;
//!     postman.deliver(|| {
//!         let ctx = actor_dispatch::context::current().unwrap();
//!         ctx.completion().unwrap().complete(Response::ok(data))
//!     })
//! });
//! ```

use crate::completion::Completion;
use crate::message::Request;
use crate::registry::CommandInfo;
use std::cell::RefCell;
use std::fmt;
use std::sync::Arc;

thread_local! {
    static CURRENT: RefCell<Option<CallContext>> = const { RefCell::new(None) };
}

struct ContextInner {
    request: Request,
    info: CommandInfo,
    completion: Option<Arc<dyn Completion>>,
}

/// Per-call carrier. Cloning is cheap.
#[derive(Clone)]
pub struct CallContext {
    inner: Arc<ContextInner>,
}

impl CallContext {
    pub fn new(request: Request, info: CommandInfo) -> Self {
        Self {
            inner: Arc::new(ContextInner {
                request,
                info,
                completion: None,
            }),
        }
    }

    /// A copy of this context carrying `completion`.
    pub fn with_completion(&self, completion: Arc<dyn Completion>) -> Self {
        Self {
            inner: Arc::new(ContextInner {
                request: self.inner.request.clone(),
                info: self.inner.info.clone(),
                completion: Some(completion),
            }),
        }
    }

    pub fn request(&self) -> &Request {
        &self.inner.request
    }

    pub fn command_info(&self) -> &CommandInfo {
        &self.inner.info
    }

    /// The waiter of an async command; `None` for sync commands.
    pub fn completion(&self) -> Option<&Arc<dyn Completion>> {
        self.inner.completion.as_ref()
    }

    /// One-shot transfer of this context to another worker.
    pub fn postman(&self) -> Postman {
        Postman {
            context: Some(self.clone()),
        }
    }

    /// Installs this context on the current thread until the guard drops.
    pub fn install(&self) -> ContextGuard {
        let previous = CURRENT.with(|slot| slot.borrow_mut().replace(self.clone()));
        ContextGuard { previous }
    }
}

impl fmt::Debug for CallContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallContext")
            .field("request", &self.inner.request.to_string())
            .field("command", &self.inner.info.address())
            .field("async", &self.inner.completion.is_some())
            .finish()
    }
}

/// The context installed on the current thread, if any.
pub fn current() -> Option<CallContext> {
    CURRENT.with(|slot| slot.borrow().clone())
}

/// Restores the previously installed context (usually none) on drop.
#[must_use = "the context is cleared as soon as the guard is dropped"]
pub struct ContextGuard {
    previous: Option<CallContext>,
}

impl Drop for ContextGuard {
    fn drop(&mut self) {
        let previous = self.previous.take();
        // The slot may already be gone during thread teardown.
        let _ = CURRENT.try_with(|slot| *slot.borrow_mut() = previous);
    }
}

/// Carries a context snapshot to another worker. Consumed by delivery.
pub struct Postman {
    context: Option<CallContext>,
}

impl Postman {
    /// Snapshots the context installed on the current thread.
    pub fn capture() -> Self {
        Self { context: current() }
    }

    /// Whether there is anything to deliver.
    pub fn is_empty(&self) -> bool {
        self.context.is_none()
    }

    /// Runs `f` with the carried context installed, then clears it.
    pub fn deliver<F, R>(self, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        let _guard = self.context.as_ref().map(CallContext::install);
        f()
    }

    /// Takes the context out without installing it.
    pub fn into_context(self) -> Option<CallContext> {
        self.context
    }
}

impl fmt::Debug for Postman {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Postman")
            .field("context", &self.context)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::{HandlerType, Operation};
    use crate::registry::{ActorDef, CommandDef, Registry};

    #[derive(Default)]
    struct Echo;

    fn context() -> CallContext {
        let registry = Registry::new();
        let app = registry.add_application("Demo", None, true, "").unwrap();
        let module = app.add_module("GLOBAL", true, "").unwrap();
        let actor = module
            .add_actor(ActorDef::new("Echo", HandlerType::of::<Echo>()))
            .unwrap();
        let op = Operation::new::<Echo, _>("ping", 0, |_, _, _| Ok(None));
        actor.add_command(CommandDef::new("ping", op)).unwrap();
        let info = registry
            .resolve_command("Demo", None, "GLOBAL", "Echo", "ping", true)
            .unwrap();
        let request = Request::new("Demo", None, "GLOBAL", "Echo", "ping", vec![]).unwrap();
        CallContext::new(request, info)
    }

    #[test]
    fn test_guard_installs_and_clears() {
        assert!(current().is_none());
        let ctx = context();
        {
            let _guard = ctx.install();
            assert_eq!(current().unwrap().request().cmd(), "ping");
        }
        assert!(current().is_none());
    }

    #[test]
    fn test_guard_clears_on_unwind() {
        let ctx = context();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = ctx.install();
            panic!("boom");
        }));
        assert!(result.is_err());
        assert!(current().is_none());
    }

    #[test]
    fn test_postman_delivers_on_other_thread() {
        let ctx = context();
        let postman = {
            let _guard = ctx.install();
            Postman::capture()
        };
        let seen = std::thread::spawn(move || {
            assert!(current().is_none());
            let inside = postman.deliver(|| current().map(|c| c.command_info().address()));
            (inside, current().is_none())
        })
        .join()
        .unwrap();
        assert_eq!(seen.0.as_deref(), Some("Demo@1.0.0/GLOBAL/Echo/ping"));
        assert!(seen.1);
    }

    #[test]
    fn test_nested_install_restores_outer() {
        let outer = context();
        let _outer_guard = outer.install();
        {
            let _inner = context().install();
        }
        let now = current().unwrap();
        assert!(Arc::ptr_eq(&now.inner, &outer.inner));
    }
}
