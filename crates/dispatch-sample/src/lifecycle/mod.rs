//! # System Lifecycle & Wiring
//!
//! Individual handlers are simple; **wiring them into an engine** is where the
//! setup lives. This module is the one place that does it.
//!
//! ## The DispatchSystem Pattern
//!
//! 1. **Declare** the application and its modules from configuration
//!    ([`DEMO_CONFIG`], applied with `Registry::apply_config`).
//! 2. **Register** every actor through the explicit registration API.
//! 3. **Collaborators**: the demo authorizer is installed on the application,
//!    the invoker schedules async timeouts on the current tokio runtime.
//! 4. **Expose** a [`DispatchClient`](actor_dispatch::DispatchClient) for
//!    async callers.
//!
//! ```rust,no_run
//! use actor_dispatch::{Dispatcher, Request};
//! use dispatch_sample::lifecycle::DispatchSystem;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let system = DispatchSystem::new()?;
//!     let request = Request::new("Demo", None, "GLOBAL", "Echo", "ping", vec![])?;
//!     let response = system.client.dispatch(request).await?;
//!     println!("{}", response.status());
//!     system.shutdown().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Graceful Shutdown
//!
//! [`DispatchSystem::shutdown`] waits (off the async workers) until no call is
//! running, bounded by the invoker's `shutdown_wait_ms`.

pub mod dispatch_system;

pub use dispatch_system::*;
