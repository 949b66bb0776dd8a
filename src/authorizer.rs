//! # Authorizer & Factory Collaborators
//!
//! Both collaborators are supplied by the embedding application:
//!
//! - [`Authorizer`] decides whether a resolved call may proceed. It usually
//!   reads the [`PermissionSet`](crate::PermissionSet)s attached to the actor
//!   and command through [`CallContext::command_info`].
//! - [`HandlerFactory`] produces the handler object the operation runs on.
//!   [`DirectFactory`] (the default) simply constructs the actor's
//!   [`HandlerType`](crate::HandlerType).
//!
//! Closures implement both traits, which keeps tests short:
//!
//! ```rust
//! use actor_dispatch::{Authorizer, CallContext, HandlerError, Request};
//!
//! let deny_all = |_: &Request, _: &CallContext| -> Result<bool, HandlerError> { Ok(false) };
//! fn assert_authorizer(_: &dyn Authorizer) {}
//! assert_authorizer(&deny_all);
//! ```

use crate::context::CallContext;
use crate::error::HandlerError;
use crate::handler::HandlerInstance;
use crate::message::Request;

/// Verifies that a call is permitted.
///
/// Return `Ok(false)` for a plain denial, `Err(HandlerError::Logic(..))` for a
/// denial with a custom message. Any other error is an undeclared fault.
pub trait Authorizer: Send + Sync {
    fn verify_permission(&self, request: &Request, ctx: &CallContext) -> Result<bool, HandlerError>;
}

impl<F> Authorizer for F
where
    F: Fn(&Request, &CallContext) -> Result<bool, HandlerError> + Send + Sync,
{
    fn verify_permission(&self, request: &Request, ctx: &CallContext) -> Result<bool, HandlerError> {
        self(request, ctx)
    }
}

/// Produces handler instances.
///
/// `Ok(None)` declines the call (`REJECT`). A logical error also rejects, with
/// its message.
pub trait HandlerFactory: Send + Sync {
    fn create_instance(
        &self,
        request: &Request,
        ctx: &CallContext,
    ) -> Result<Option<HandlerInstance>, HandlerError>;
}

impl<F> HandlerFactory for F
where
    F: Fn(&Request, &CallContext) -> Result<Option<HandlerInstance>, HandlerError> + Send + Sync,
{
    fn create_instance(
        &self,
        request: &Request,
        ctx: &CallContext,
    ) -> Result<Option<HandlerInstance>, HandlerError> {
        self(request, ctx)
    }
}

/// Builds a new handler per call from the actor's registered handler type.
#[derive(Debug, Default, Clone, Copy)]
pub struct DirectFactory;

impl HandlerFactory for DirectFactory {
    fn create_instance(
        &self,
        _request: &Request,
        ctx: &CallContext,
    ) -> Result<Option<HandlerInstance>, HandlerError> {
        Ok(Some(ctx.command_info().actor().handler_type().instantiate()))
    }
}
