//! # Observability & Tracing
//!
//! The engine logs through `tracing` with structured fields and never installs
//! a subscriber itself. Binaries call [`setup_tracing`] once at startup; tests
//! call [`try_setup_tracing`], which is safe to call from every test.
//!
//! ## What Gets Traced
//!
//! | Level | Event |
//! |-------|-------|
//! | `info` | registry configured, invoker shutdown |
//! | `warn` | registration conflicts, denials, rejections, logical failures, bad parameters |
//! | `error` | undeclared faults (with the diagnostic text) |
//! | `debug` | registry population, not-found, accepted async calls, timeouts |
//! | `trace` | scheduler task firing |
//!
//! Every call runs inside a `sync_invoke` / `async_invoke` span carrying the
//! request address, so a compact log line reads like:
//!
//! ```text
//! WARN sync_invoke{request=Demo@-/PERMISSION/UserPermission/get-user-id()}: Permission denied command=Demo@1.0.0/PERMISSION/UserPermission/get-user-id
//! ```
//!
//! ## Usage
//!
//! ```bash
//! RUST_LOG=info cargo run -p dispatch-sample
//! RUST_LOG=actor_dispatch=debug cargo run -p dispatch-sample
//! ```

use tracing_subscriber::EnvFilter;

/// Initializes the global subscriber: `RUST_LOG` filtering, compact format,
/// no target.
///
/// # Panics
///
/// Panics if a global subscriber is already installed.
pub fn setup_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();
}

/// Like [`setup_tracing`], writing through the test harness and ignoring an
/// already installed subscriber.
pub fn try_setup_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .with_test_writer()
        .try_init();
}
