//! # UserPermission Actor
//!
//! Commands guarded by permission tokens, plus the [`DemoAuthorizer`] that
//! checks them.
//!
//! The demo authorizer takes its decision from the request arguments so every
//! authorization outcome can be reached from the outside:
//!
//! | Command | Argument | Outcome |
//! |---------|----------|---------|
//! | `get-user-id` | `license = 0` | denied (`UNAUTHORIZED`) |
//! | `get-user-id` | `license = 1` | allowed |
//! | `get-user-id` | `license = 2` | denied with message `"No license"` |
//! | `get-user-id` | `license = 3` | authorizer fault (`EXCEPTION`) |
//! | `update-user-status` | `status = 0` | requires `EDIT` alone: denied |
//! | `update-user-status` | `status = 1` | requires `EDIT \| ADMIN`: allowed |
//! | `update-user-status` | `status = 2` | requires `VIEW`: denied |
//! | `update-user-status` | `status = 3` | requires any of `CONFIG`, `EDIT`: allowed |
//!
//! Commands without declared permissions are always allowed.

use actor_dispatch::{
    Actor, ActorDef, Authorizer, CallContext, CommandDef, HandlerError, HandlerType, Module,
    Operation, Params, RegistryError, Request, Value,
};
use std::sync::Arc;
use tracing::trace;

/// Permission tokens used by the sample.
pub mod tokens {
    pub const VIEW: i32 = 0x01;
    pub const EDIT: i32 = 0x02;
    pub const CONFIG: i32 = 0x04;
    pub const ADMIN: i32 = 0x08;
}

use tokens::{ADMIN, CONFIG, EDIT, VIEW};

#[derive(Debug, Default)]
pub struct UserPermission;

impl UserPermission {
    pub fn user_id(&mut self) -> &'static str {
        "USER-001"
    }

    pub fn update_status(&mut self, user_id: &str, status: i64) -> bool {
        trace!(user_id, status, "Updating user status");
        true
    }
}

/// Registers the `UserPermission` actor into `module`.
pub fn register(module: &Arc<Module>) -> Result<Arc<Actor>, RegistryError> {
    let actor = module.add_actor(
        ActorDef::new("UserPermission", HandlerType::of::<UserPermission>())
            .doc("Actor for permission checks"),
    )?;
    actor.add_command(
        CommandDef::new(
            "get-user-id",
            Operation::new::<UserPermission, _>("get_user_id", 2, get_user_id),
        )
        .permissions([VIEW])
        .doc("Permission decided by the license argument"),
    )?;
    actor.add_command(
        CommandDef::new(
            "update-user-status",
            Operation::new::<UserPermission, _>("update_user_status", 2, update_user_status),
        )
        .permissions([EDIT | ADMIN, CONFIG])
        .doc("Permission decided by the declared tokens"),
    )?;
    Ok(actor)
}

fn get_user_id(
    handler: &mut UserPermission,
    _: Params,
    _: &CallContext,
) -> Result<Option<Value>, HandlerError> {
    Ok(Some(Value::from(handler.user_id())))
}

fn update_user_status(
    handler: &mut UserPermission,
    params: Params,
    _: &CallContext,
) -> Result<Option<Value>, HandlerError> {
    let user_id = params.text(0)?;
    let status = params.int(1)?;
    Ok(Some(Value::from(handler.update_status(&user_id, status))))
}

/// The sample's [`Authorizer`].
#[derive(Debug, Default, Clone, Copy)]
pub struct DemoAuthorizer;

impl Authorizer for DemoAuthorizer {
    fn verify_permission(&self, request: &Request, ctx: &CallContext) -> Result<bool, HandlerError> {
        let permissions = ctx.command_info().command().permissions();
        if permissions.is_empty() {
            return Ok(true);
        }
        let params = Params::new(request.params().to_vec());
        match ctx.command_info().command().cmd() {
            "get-user-id" => match params.int(0)? {
                0 => Ok(false),
                1 => Ok(true),
                2 => Err(HandlerError::logic("No license")),
                3 => Err(HandlerError::fault("License server unreachable")),
                _ => Ok(false),
            },
            "update-user-status" => match params.int(1)? {
                0 => Ok(permissions.contains(EDIT)),
                1 => Ok(permissions.contains(EDIT | ADMIN)),
                2 => Ok(permissions.contains(VIEW)),
                3 => Ok(permissions.contains_any(&[CONFIG, EDIT])),
                _ => Ok(false),
            },
            _ => Ok(false),
        }
    }
}
