//! # Echo Actor
//!
//! The simplest actor in the sample: synchronous commands with no permissions.
//!
//! | Command | Params | Result |
//! |---------|--------|--------|
//! | `ping` | none | `"pong"` |
//! | `echo` | `text` | the same text |
//! | `fail` | none | `LOGIC_FAILED` with a message |

use actor_dispatch::{
    Actor, ActorDef, CallContext, CommandDef, HandlerError, HandlerType, Module, Operation,
    Params, RegistryError, Value,
};
use std::sync::Arc;
use tracing::trace;

/// Handler struct. A fresh one is built for every call.
#[derive(Debug, Default)]
pub struct Echo;

impl Echo {
    pub fn ping(&mut self) -> &'static str {
        "pong"
    }

    pub fn echo(&mut self, text: String) -> String {
        trace!(%text, "Echoing");
        text
    }
}

/// Registers the `Echo` actor into `module`.
pub fn register(module: &Arc<Module>) -> Result<Arc<Actor>, RegistryError> {
    let actor = module.add_actor(
        ActorDef::new("Echo", HandlerType::of::<Echo>()).doc("Synchronous echo commands"),
    )?;
    actor.add_command(
        CommandDef::new("ping", Operation::new::<Echo, _>("ping", 0, ping)).doc("Answers pong"),
    )?;
    actor.add_command(
        CommandDef::new("echo", Operation::new::<Echo, _>("echo", 1, echo))
            .doc("Returns its argument"),
    )?;
    actor.add_command(
        CommandDef::new("fail", Operation::new::<Echo, _>("fail", 0, fail))
            .doc("Always fails with a business error"),
    )?;
    Ok(actor)
}

fn ping(echo: &mut Echo, _: Params, _: &CallContext) -> Result<Option<Value>, HandlerError> {
    Ok(Some(Value::from(echo.ping())))
}

fn echo(echo: &mut Echo, params: Params, _: &CallContext) -> Result<Option<Value>, HandlerError> {
    Ok(Some(Value::from(echo.echo(params.text(0)?))))
}

fn fail(_: &mut Echo, _: Params, _: &CallContext) -> Result<Option<Value>, HandlerError> {
    Err(HandlerError::logic("Echo refused on purpose"))
}
