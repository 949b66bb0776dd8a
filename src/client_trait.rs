//! # Dispatcher Trait
//!
//! The async face of the engine. Code that only needs to *send* requests should
//! depend on `dyn Dispatcher` rather than on the [`Invoker`](crate::Invoker),
//! so tests can swap in a [`MockDispatcher`](crate::mock::MockDispatcher).
use crate::error::ClientError;
use crate::message::{Request, Response};
use crate::value::Value;
use async_trait::async_trait;

/// Sends requests and awaits their terminal responses.
///
/// # Example
///
/// ```rust
/// use actor_dispatch::mock::MockDispatcher;
/// use actor_dispatch::{Dispatcher, Request, Value};
///
/// #[tokio::main]
/// async fn main() {
///     let mut mock = MockDispatcher::new();
///     mock.expect("Demo", "GLOBAL", "Echo", "ping").return_ok(Value::from("pong"));
///
///     let request = Request::new("Demo", None, "GLOBAL", "Echo", "ping", vec![]).unwrap();
///     let pong = mock.fetch(request).await.unwrap();
///     assert_eq!(pong, Some(Value::from("pong")));
///     mock.verify();
/// }
/// ```
#[async_trait]
pub trait Dispatcher: Send + Sync {
    /// Dispatches through the non-blocking path. `ACCEPTED` is skipped; the
    /// terminal response is returned.
    async fn dispatch(&self, request: Request) -> Result<Response, ClientError>;

    /// Dispatches through the blocking path, off the async worker threads.
    async fn dispatch_blocking(&self, request: Request) -> Result<Response, ClientError>;

    /// Dispatches and returns the payload of an `OK` response. Any other
    /// status is an error.
    #[tracing::instrument(skip_all, fields(request = %request))]
    async fn fetch(&self, request: Request) -> Result<Option<Value>, ClientError> {
        tracing::debug!("Sending request");
        let response = self.dispatch(request).await?;
        if response.is_ok() {
            return Ok(response.into_data());
        }
        Err(ClientError::Status {
            status: response.status(),
            message: response.message().map(str::to_string),
        })
    }
}
