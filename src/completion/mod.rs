//! # Async Completion
//!
//! An async command does not return its result. It receives a [`Completion`]
//! waiter through its [`CallContext`](crate::CallContext) and later calls
//! [`Completion::complete`] exactly once, possibly from another thread.
//!
//! Two strategies share the contract:
//!
//! | Strategy | Used by | Timeout mechanism |
//! |----------|---------|-------------------|
//! | [`BlockingWaiter`] | `sync_invoke` | the caller blocks on a condition variable |
//! | [`TimerWaiter`] | `async_invoke` | a delayed task on a [`TaskScheduler`](crate::TaskScheduler) |
//!
//! ## Guarantees
//!
//! - **Exactly once.** Whichever of business logic or the timeout claims the
//!   slot first wins; every later attempt is a no-op returning `Ok(false)`.
//! - **Rearm.** [`Completion::set_timeout`] restarts the countdown from the
//!   moment of the call with the new duration. A zero duration means
//!   [`DEFAULT_TIMEOUT`].
//! - **Typed payloads.** A command declares the [`ValueKind`] of its async
//!   result. A non-null payload of another kind is replaced by an `EXCEPTION`
//!   response, which still consumes the slot, and `complete` returns
//!   [`CompletionError::PayloadType`] so the caller can notice.

mod blocking;
mod timer;

pub use blocking::BlockingWaiter;
pub use timer::{ResponseCallback, TimerWaiter};

use crate::error::CompletionError;
use crate::message::Response;
use crate::registry::DEFAULT_TIMEOUT;
use crate::value::ValueKind;
use std::time::Duration;

/// The handle through which an async command delivers its terminal response.
pub trait Completion: Send + Sync {
    /// Whether the timeout claimed the slot.
    fn is_timed_out(&self) -> bool;

    /// Whether a terminal response (including a timeout) has been claimed.
    fn has_completed(&self) -> bool;

    fn timeout(&self) -> Duration;

    /// Replaces the timeout and restarts the countdown. No-op once completed.
    /// A zero timeout is replaced by [`DEFAULT_TIMEOUT`].
    fn set_timeout(&self, timeout: Duration);

    /// Delivers `response`.
    ///
    /// Returns `Ok(true)` if this call claimed the slot and `Ok(false)` if the
    /// slot was already taken.
    fn complete(&self, response: Response) -> Result<bool, CompletionError>;
}

/// Zero means "not set" and falls back to [`DEFAULT_TIMEOUT`].
pub(crate) fn effective_timeout(timeout: Duration) -> Duration {
    if timeout.is_zero() {
        DEFAULT_TIMEOUT
    } else {
        timeout
    }
}

/// Payload type check shared by both waiters.
///
/// Returns the response to deliver and, on a mismatch, the error for the
/// caller of `complete`.
pub(crate) fn check_payload(
    cmd: &str,
    expected: Option<ValueKind>,
    response: Response,
) -> (Response, Option<CompletionError>) {
    let (Some(expected), Some(data)) = (expected, response.data()) else {
        return (response, None);
    };
    let actual = data.kind();
    if actual == ValueKind::Null || actual == expected {
        return (response, None);
    }
    let err = CompletionError::PayloadType {
        cmd: cmd.to_string(),
        expected,
        actual,
    };
    (Response::exception(err.to_string()), Some(err))
}

/// Maps the claim outcome to the value `complete` returns.
pub(crate) fn claim_result(claimed: bool, mismatch: Option<CompletionError>) -> Result<bool, CompletionError> {
    match mismatch {
        Some(err) => Err(err),
        None => Ok(claimed),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::ResponseStatus;
    use crate::value::Value;

    #[test]
    fn test_matching_or_empty_payload_passes() {
        let (resp, err) = check_payload("cb", Some(ValueKind::Text), Response::ok("done"));
        assert!(err.is_none());
        assert_eq!(resp.data(), Some(&Value::from("done")));

        let (_, err) = check_payload("cb", Some(ValueKind::Text), Response::ok(Value::Null));
        assert!(err.is_none());

        let (_, err) = check_payload(
            "cb",
            Some(ValueKind::Text),
            Response::status_only(ResponseStatus::LogicFailed),
        );
        assert!(err.is_none());
    }

    #[test]
    fn test_mismatch_becomes_exception() {
        let (resp, err) = check_payload("cb", Some(ValueKind::Text), Response::ok(42));
        assert_eq!(resp.status(), ResponseStatus::Exception);
        assert_eq!(
            err,
            Some(CompletionError::PayloadType {
                cmd: "cb".into(),
                expected: ValueKind::Text,
                actual: ValueKind::Int,
            })
        );
    }

    #[test]
    fn test_zero_timeout_means_default() {
        assert_eq!(effective_timeout(Duration::ZERO), DEFAULT_TIMEOUT);
        assert_eq!(effective_timeout(Duration::from_millis(5)), Duration::from_millis(5));
    }

    #[test]
    fn test_no_declared_kind_skips_check() {
        let (resp, err) = check_payload("cb", None, Response::ok(42));
        assert!(err.is_none());
        assert!(resp.is_ok());
    }
}
