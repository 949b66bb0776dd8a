//! # Dispatch Sample
//!
//! Drives the demo engine through every kind of call:
//!
//! 1. Synchronous commands (`Echo`), including a business failure.
//! 2. Async commands (`AsyncCallback`) completed from a tokio task, timed out,
//!    and completed with the wrong payload type.
//! 3. Permission-guarded commands (`UserPermission`) through the demo
//!    authorizer.
//!
//! ```bash
//! RUST_LOG=info cargo run -p dispatch-sample
//! ```

use actor_dispatch::observability::setup_tracing;
use actor_dispatch::{Dispatcher, Request, Value};
use dispatch_sample::lifecycle::{DispatchSystem, DEMO_APP};
use tracing::{info, warn, Instrument};

fn request(module: &str, actor: &str, cmd: &str, params: Vec<Value>) -> Result<Request, String> {
    Request::new(DEMO_APP, None, module, actor, cmd, params).map_err(|e| e.to_string())
}

#[tokio::main]
async fn main() -> Result<(), String> {
    setup_tracing();

    info!("Starting dispatch sample");
    let system = DispatchSystem::new().map_err(|e| e.to_string())?;

    let calls = vec![
        request("GLOBAL", "Echo", "ping", vec![])?,
        request("GLOBAL", "Echo", "echo", vec![Value::from("hello")])?,
        request("GLOBAL", "Echo", "fail", vec![])?,
        request("GLOBAL", "Echo", "missing", vec![])?,
        request("ASYNC", "AsyncCallback", "async-callback", vec![Value::from("hi")])?,
        request("ASYNC", "AsyncCallback", "async-timeout", vec![Value::from(7)])?,
        request("ASYNC", "AsyncCallback", "async-illegal-type", vec![Value::from(5)])?,
        request("PERMISSION", "UserPermission", "get-user-id", vec![Value::from(1), Value::from("token")])?,
        request("PERMISSION", "UserPermission", "get-user-id", vec![Value::from(2), Value::from("token")])?,
        request("PERMISSION", "UserPermission", "update-user-status", vec![Value::from("USER-001"), Value::from(0)])?,
        request("PERMISSION", "UserPermission", "update-user-status", vec![Value::from("USER-001"), Value::from(3)])?,
    ];

    for call in calls {
        let span = tracing::info_span!("call", request = %call);
        async {
            match system.client.dispatch(call).await {
                Ok(response) => info!(
                    status = %response.status(),
                    message = ?response.message(),
                    data = ?response.data(),
                    "Call finished"
                ),
                Err(e) => warn!(error = %e, "Call failed"),
            }
        }
        .instrument(span)
        .await;
    }

    // The blocking path, run off the async workers.
    let blocking = request("ASYNC", "AsyncCallback", "async-callback", vec![Value::from("blocking")])?;
    let response = system
        .client
        .dispatch_blocking(blocking)
        .await
        .map_err(|e| e.to_string())?;
    info!(status = %response.status(), data = ?response.data(), "Blocking call finished");

    system.shutdown().await.map_err(|e| e.to_string())?;
    info!("Dispatch sample completed successfully");
    Ok(())
}
