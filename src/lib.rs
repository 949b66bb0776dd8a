//! # Actor Dispatch
//!
//! > **An in-process command dispatch and invocation engine.**
//!
//! Callers address a handler method with four names (application, module,
//! actor, command) and get back exactly one typed [`Response`]: immediately for
//! ordinary commands, or through an asynchronous completion path with its own
//! timeout for long-running ones.
//!
//! ## 🏗️ Design Philosophy
//!
//! ### Explicit registration, no scanning
//!
//! Handlers are plain Rust structs. Startup code registers them through
//! [`ActorDef`] and [`CommandDef`], binding each command to a closure over one
//! method (an [`Operation`]). The engine only ever consumes the finished
//! [`Registry`].
//!
//! ### Exactly one terminal response
//!
//! Every failure is classified into a closed status set
//! ([`ResponseStatus`]). Async commands complete through a [`Completion`]
//! waiter that accepts the first of *business result* or *timeout* and
//! silently discards the rest.
//!
//! ### Context is passed, not inherited
//!
//! The [`CallContext`] is handed to every collaborator explicitly. It is also
//! installed thread-locally for the synchronous part of a call; crossing to
//! another worker takes an explicit [`Postman`].
//!
//! ## 🗺️ Module Tour
//!
//! ### 1. The Tree ([`registry`])
//! Application → Module → Actor → Command, concurrency-safe, case-insensitive,
//! with per-level `enabled` flags.
//! - **Key items**: [`Registry`], [`CommandInfo`], [`PermissionSet`].
//!
//! ### 2. The Engine ([`invoker`])
//! Resolve, authorize, check arity, instantiate, invoke, await.
//! - **Key items**: [`Invoker::sync_invoke`], [`Invoker::async_invoke`],
//!   [`Authorizer`], [`HandlerFactory`].
//!
//! ### 3. The Coordinator ([`completion`])
//! - **Key items**: [`BlockingWaiter`], [`TimerWaiter`], [`TaskScheduler`].
//!
//! ### 4. The Interface ([`client`], [`client_trait`], [`mock`])
//! `async` access for tokio code, plus test doubles.
//! - **Key items**: [`DispatchClient`], [`Dispatcher`],
//!   [`MockDispatcher`](mock::MockDispatcher).
//!
//! ## 🚀 Quick Start
//!
//! ```rust
//! use actor_dispatch::{
//!     ActorDef, CommandDef, HandlerType, Invoker, Operation, Registry, Request, ResponseStatus,
//!     Value,
//! };
//! use std::sync::Arc;
//!
//! #[derive(Default)]
//! struct Echo;
//!
//! impl Echo {
//!     fn echo(&self, text: String) -> String {
//!         text
//!     }
//! }
//!
//! let registry = Arc::new(Registry::new());
//! let app = registry.add_application("Demo", None, true, "Demo app").unwrap();
//! let module = app.add_module("GLOBAL", true, "").unwrap();
//! let actor = module.add_actor(ActorDef::new("Echo", HandlerType::of::<Echo>())).unwrap();
//! actor
//!     .add_command(CommandDef::new(
//!         "echo",
//!         Operation::new::<Echo, _>("echo", 1, |echo, params, _ctx| {
//!             Ok(Some(Value::from(echo.echo(params.text(0)?))))
//!         }),
//!     ))
//!     .unwrap();
//!
//! let invoker = Invoker::new(registry);
//! let request = Request::new("Demo", None, "GLOBAL", "Echo", "echo", vec![Value::from("hi")]).unwrap();
//! let response = invoker.sync_invoke(&request, None);
//! assert_eq!(response.status(), ResponseStatus::Ok);
//! assert_eq!(response.data(), Some(&Value::from("hi")));
//! ```
//!
//! ### Running the Demo
//!
//! ```bash
//! RUST_LOG=info cargo run -p dispatch-sample
//! ```

pub mod authorizer;
pub mod client;
pub mod client_trait;
pub mod completion;
pub mod config;
pub mod context;
pub mod error;
pub mod handler;
pub mod invoker;
pub mod message;
pub mod mock;
pub mod observability;
pub mod permission;
pub mod registry;
pub mod scheduler;
pub mod value;

pub use authorizer::{Authorizer, DirectFactory, HandlerFactory};
pub use client::DispatchClient;
pub use client_trait::Dispatcher;
pub use completion::{BlockingWaiter, Completion, ResponseCallback, TimerWaiter};
pub use config::{ApplicationConfig, DispatchConfig, InvokerConfig, ModuleConfig, RegistryConfig};
pub use context::{CallContext, ContextGuard, Postman};
pub use error::{ClientError, CompletionError, ConfigError, HandlerError, RegistryError, RequestError};
pub use handler::{HandlerInstance, HandlerType, Operation};
pub use invoker::Invoker;
pub use message::{Request, Response, ResponseStatus, INTERNAL_ERROR_MESSAGE};
pub use permission::PermissionSet;
pub use registry::{
    Actor, ActorDef, Application, Command, CommandDef, CommandInfo, Module, Registry,
    DEFAULT_APP_VERSION, DEFAULT_TIMEOUT,
};
pub use scheduler::{ScheduledTask, TaskHandle, TaskScheduler, TokioScheduler};
pub use value::{FromValue, Params, Value, ValueKind};
