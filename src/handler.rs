//! # Handler Binding
//!
//! An actor is backed by a plain Rust struct (the *handler type*) and each of its
//! commands is bound to one method of that struct (an [`Operation`]). Instead of
//! scanning for annotated methods, startup code describes the binding
//! explicitly:
//!
//! ```rust
//! use actor_dispatch::{HandlerType, Operation, Value};
//!
//! #[derive(Default)]
//! struct Echo;
//!
//! impl Echo {
//!     fn ping(&mut self) -> &'static str {
//!         "pong"
//!     }
//! }
//!
//! let handler = HandlerType::of::<Echo>();
//! let ping = Operation::new::<Echo, _>("ping", 0, |echo, _params, _ctx| {
//!     Ok(Some(Value::from(echo.ping())))
//! });
//! assert_eq!(ping.arity(), 0);
//! assert!(ping.handler_type_id() == handler.type_id());
//! ```
//!
//! ## Identity
//!
//! Two operations are *the same underlying operation* when they target the same
//! handler type and carry the same method name. The registry uses this to make
//! duplicate registration a no-op and to detect conflicts.

use crate::context::CallContext;
use crate::error::HandlerError;
use crate::value::{Params, Value};
use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;

/// A live handler object produced by a factory for one call.
pub type HandlerInstance = Box<dyn Any + Send>;

/// Describes the struct that implements an actor's business methods.
#[derive(Clone)]
pub struct HandlerType {
    type_id: TypeId,
    name: &'static str,
    construct: Arc<dyn Fn() -> HandlerInstance + Send + Sync>,
}

impl HandlerType {
    /// Handler type constructed with `H::default()`.
    pub fn of<H: Default + Send + 'static>() -> Self {
        Self::with_constructor(H::default)
    }

    /// Handler type constructed with a custom function.
    pub fn with_constructor<H, F>(construct: F) -> Self
    where
        H: Send + 'static,
        F: Fn() -> H + Send + Sync + 'static,
    {
        Self {
            type_id: TypeId::of::<H>(),
            name: short_type_name::<H>(),
            construct: Arc::new(move || Box::new(construct()) as HandlerInstance),
        }
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Short type name, e.g. `Echo`.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Builds a fresh instance.
    pub fn instantiate(&self) -> HandlerInstance {
        (self.construct)()
    }
}

impl PartialEq for HandlerType {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id
    }
}

impl fmt::Debug for HandlerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("HandlerType").field(&self.name).finish()
    }
}

type OperationFn =
    dyn Fn(&mut (dyn Any + Send), Params, &CallContext) -> Result<Option<Value>, HandlerError>
        + Send
        + Sync;

/// One business method bound to a handler type.
#[derive(Clone)]
pub struct Operation {
    handler: TypeId,
    handler_name: &'static str,
    name: &'static str,
    arity: usize,
    func: Arc<OperationFn>,
}

impl Operation {
    /// Binds `func` as method `name` of handler `H` taking `arity` arguments.
    ///
    /// The returned value becomes the response payload for sync commands and is
    /// ignored for async ones.
    pub fn new<H, F>(name: &'static str, arity: usize, func: F) -> Self
    where
        H: Send + 'static,
        F: Fn(&mut H, Params, &CallContext) -> Result<Option<Value>, HandlerError>
            + Send
            + Sync
            + 'static,
    {
        let handler_name = short_type_name::<H>();
        let func = move |instance: &mut (dyn Any + Send), params: Params, ctx: &CallContext| {
            let handler = instance.downcast_mut::<H>().ok_or_else(|| {
                HandlerError::fault(format!(
                    "handler instance is not a `{handler_name}`"
                ))
            })?;
            func(handler, params, ctx)
        };
        Self {
            handler: TypeId::of::<H>(),
            handler_name,
            name,
            arity,
            func: Arc::new(func),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn arity(&self) -> usize {
        self.arity
    }

    pub fn handler_type_id(&self) -> TypeId {
        self.handler
    }

    pub fn handler_name(&self) -> &'static str {
        self.handler_name
    }

    /// Whether `self` and `other` refer to the same method of the same handler.
    pub fn same_as(&self, other: &Operation) -> bool {
        self.handler == other.handler && self.name == other.name
    }

    pub(crate) fn call(
        &self,
        instance: &mut HandlerInstance,
        params: Params,
        ctx: &CallContext,
    ) -> Result<Option<Value>, HandlerError> {
        (self.func)(&mut **instance, params, ctx)
    }
}

impl fmt::Debug for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}/{}", self.handler_name, self.name, self.arity)
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}(...)", self.handler_name, self.name)
    }
}

fn short_type_name<T>() -> &'static str {
    let full = std::any::type_name::<T>();
    full.rsplit("::").next().unwrap_or(full)
}
