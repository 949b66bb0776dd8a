use actor_dispatch::{Dispatcher, Request, ResponseStatus, Value, INTERNAL_ERROR_MESSAGE};
use dispatch_sample::async_actor::{CALLBACK_DELAY, EXTENDED_TIMEOUT};
use dispatch_sample::error::SampleError;
use dispatch_sample::lifecycle::{DispatchSystem, DEMO_APP};
use std::time::{Duration, Instant};

fn request(module: &str, actor: &str, cmd: &str, params: Vec<Value>) -> Request {
    Request::new(DEMO_APP, None, module, actor, cmd, params).expect("Failed to build request")
}

fn get_user_id(license: i64) -> Request {
    request(
        "PERMISSION",
        "UserPermission",
        "get-user-id",
        vec![Value::from(license), Value::from("token")],
    )
}

fn update_user_status(status: i64) -> Request {
    request(
        "PERMISSION",
        "UserPermission",
        "update-user-status",
        vec![Value::from("USER-001"), Value::from(status)],
    )
}

/// Full end-to-end run through the wired system.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_full_dispatch_system_integration() {
    let system = DispatchSystem::new().expect("Failed to build system");

    let pong = system
        .client
        .fetch(request("GLOBAL", "Echo", "ping", vec![]))
        .await
        .expect("Failed to ping");
    assert_eq!(pong, Some(Value::from("pong")));

    let echoed = system
        .client
        .fetch(request("GLOBAL", "Echo", "echo", vec![Value::from("hello")]))
        .await
        .expect("Failed to echo");
    assert_eq!(echoed, Some(Value::from("hello")));

    let failed = system
        .client
        .dispatch(request("GLOBAL", "Echo", "fail", vec![]))
        .await
        .expect("Failed to dispatch");
    assert_eq!(failed.status(), ResponseStatus::LogicFailed);
    assert!(failed.message().is_some());

    let started = Instant::now();
    let result = system
        .client
        .dispatch(request(
            "ASYNC",
            "AsyncCallback",
            "async-callback",
            vec![Value::from("hi")],
        ))
        .await
        .expect("Failed to dispatch");
    assert_eq!(result.status(), ResponseStatus::Ok);
    assert_eq!(result.data(), Some(&Value::from("RES: hi")));
    assert!(started.elapsed() >= CALLBACK_DELAY);

    system.shutdown().await.expect("Failed to shut down");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_async_callback_on_blocking_path() {
    let system = DispatchSystem::new().expect("Failed to build system");
    let response = system
        .client
        .dispatch_blocking(request(
            "ASYNC",
            "AsyncCallback",
            "async-callback",
            vec![Value::from("blocking")],
        ))
        .await
        .expect("Failed to dispatch");
    assert_eq!(response.data(), Some(&Value::from("RES: blocking")));
    system.shutdown().await.expect("Failed to shut down");
}

/// The command extends its own timeout mid-flight, so the timeout lands
/// after the extension rather than at the declared value.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_async_timeout_after_extension() {
    let system = DispatchSystem::new().expect("Failed to build system");
    for blocking in [false, true] {
        let call = request("ASYNC", "AsyncCallback", "async-timeout", vec![Value::from(7)]);
        let started = Instant::now();
        let outcome = if blocking {
            system.client.dispatch_blocking(call).await
        } else {
            system.client.dispatch(call).await
        };
        let response = outcome.expect("Failed to dispatch");
        assert_eq!(response.status(), ResponseStatus::Timeout);
        assert!(started.elapsed() >= CALLBACK_DELAY + EXTENDED_TIMEOUT);
        assert!(started.elapsed() < Duration::from_secs(5));
    }
    system.shutdown().await.expect("Failed to shut down");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_async_illegal_type_is_exception() {
    let system = DispatchSystem::new().expect("Failed to build system");
    let response = system
        .client
        .dispatch(request(
            "ASYNC",
            "AsyncCallback",
            "async-illegal-type",
            vec![Value::from(5)],
        ))
        .await
        .expect("Failed to dispatch");
    assert_eq!(response.status(), ResponseStatus::Exception);
    assert_eq!(response.message(), Some(INTERNAL_ERROR_MESSAGE));
    assert!(response.data().is_none());
}

#[tokio::test]
async fn test_permission_by_license() {
    let system = DispatchSystem::new().expect("Failed to build system");

    let denied = system.client.dispatch(get_user_id(0)).await.unwrap();
    assert_eq!(denied.status(), ResponseStatus::Unauthorized);

    let allowed = system.client.dispatch(get_user_id(1)).await.unwrap();
    assert_eq!(allowed.data(), Some(&Value::from("USER-001")));

    let no_license = system.client.dispatch(get_user_id(2)).await.unwrap();
    assert_eq!(no_license.status(), ResponseStatus::Unauthorized);
    assert_eq!(no_license.message(), Some("No license"));

    let fault = system.client.dispatch(get_user_id(3)).await.unwrap();
    assert_eq!(fault.status(), ResponseStatus::Exception);
}

#[tokio::test]
async fn test_permission_by_declared_tokens() {
    let system = DispatchSystem::new().expect("Failed to build system");
    let expected = [
        (0, ResponseStatus::Unauthorized),
        (1, ResponseStatus::Ok),
        (2, ResponseStatus::Unauthorized),
        (3, ResponseStatus::Ok),
    ];
    for (status, outcome) in expected {
        let response = system
            .client
            .dispatch(update_user_status(status))
            .await
            .unwrap();
        assert_eq!(response.status(), outcome, "status argument {status}");
    }
}

#[tokio::test]
async fn test_unknown_and_disabled_commands() {
    let system = DispatchSystem::new().expect("Failed to build system");
    let missing = system
        .client
        .dispatch(request("GLOBAL", "Echo", "missing", vec![]))
        .await
        .unwrap();
    assert_eq!(missing.status(), ResponseStatus::NotFound);

    let echo = system
        .registry
        .application(DEMO_APP, None)
        .and_then(|app| app.module("GLOBAL"))
        .and_then(|module| module.actor("Echo"))
        .expect("Echo actor registered");
    echo.set_enabled(false);
    let disabled = system
        .client
        .dispatch(request("GLOBAL", "Echo", "ping", vec![]))
        .await
        .unwrap();
    assert_eq!(disabled.status(), ResponseStatus::NotFound);
}

#[tokio::test]
async fn test_wrong_arity_is_bad_parameters() {
    let system = DispatchSystem::new().expect("Failed to build system");
    let response = system
        .client
        .dispatch(request("GLOBAL", "Echo", "echo", vec![]))
        .await
        .unwrap();
    assert_eq!(response.status(), ResponseStatus::BadParameters);
}

#[test]
fn test_new_outside_runtime_is_error() {
    let outcome = DispatchSystem::new();
    assert!(matches!(outcome, Err(SampleError::NoRuntime(_))));
}
