//! # Dispatch Errors
//!
//! This module defines the error types used throughout the dispatch engine.
//! By centralizing error definitions, every collaborator (authorizer, factory,
//! business operation) speaks the same failure vocabulary, and the invoker can
//! classify any failure into exactly one response status.
//!
//! ## Declared vs. undeclared failures
//!
//! | Variant | Meaning | Mapped status |
//! |---------|---------|---------------|
//! | [`HandlerError::Logic`] | An expected, named failure raised on purpose | `UNAUTHORIZED` / `REJECT` / `LOGIC_FAILED` depending on the stage |
//! | [`HandlerError::BadParameters`] | Arguments could not be decoded | `BAD_PARAMETERS` |
//! | [`HandlerError::Fault`] | Anything else | `EXCEPTION` |
//!
//! Declared failures surface their message to the caller verbatim. Faults never
//! do: the caller gets a generic message and the detail goes to the log and the
//! response `reference`.

use crate::message::ResponseStatus;
use crate::value::ValueKind;

/// Failure raised by a business operation or a caller-supplied collaborator.
#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    /// A declared logical failure. The message reaches the caller unchanged.
    #[error("{0}")]
    Logic(String),

    /// An argument had the wrong type or could not be converted.
    #[error("Bad parameters: {0}")]
    BadParameters(String),

    /// An undeclared runtime fault.
    #[error("Fault: {0}")]
    Fault(Box<dyn std::error::Error + Send + Sync>),
}

impl HandlerError {
    /// Shorthand for a declared logical failure.
    pub fn logic(message: impl Into<String>) -> Self {
        HandlerError::Logic(message.into())
    }

    /// Wraps any error as an undeclared fault.
    pub fn fault<E>(error: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        HandlerError::Fault(error.into())
    }

    /// Whether this is a declared failure (logic or parameters).
    pub fn is_declared(&self) -> bool {
        !matches!(self, HandlerError::Fault(_))
    }
}

/// Errors raised while constructing a [`Request`](crate::Request).
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum RequestError {
    #[error("Request field `{0}` can not be empty")]
    EmptyField(&'static str),
}

/// Registration failures. A conflict leaves the first registration in place.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Registry identifier `{0}` can not be empty")]
    EmptyId(&'static str),

    #[error("Actor `{actor_id}` in module `{module_id}` is already bound to `{existing}`, ignoring `{rejected}`")]
    ActorConflict {
        module_id: String,
        actor_id: String,
        existing: &'static str,
        rejected: &'static str,
    },

    #[error("Command `{cmd}` of actor `{actor_id}` is already bound to `{existing}`, ignoring `{rejected}`")]
    CommandConflict {
        actor_id: String,
        cmd: String,
        existing: String,
        rejected: String,
    },

    #[error("Operation `{operation}` does not belong to handler `{handler}` of actor `{actor_id}`")]
    HandlerMismatch {
        actor_id: String,
        handler: &'static str,
        operation: String,
    },
}

/// Returned to the caller of [`Completion::complete`](crate::Completion::complete)
/// when the response payload does not match the command's declared result type.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum CompletionError {
    #[error("Async result type mismatch for command `{cmd}`: expected {expected}, got {actual}")]
    PayloadType {
        cmd: String,
        expected: ValueKind,
        actual: ValueKind,
    },
}

/// Errors raised while loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Errors surfaced by the async [`DispatchClient`](crate::DispatchClient).
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum ClientError {
    #[error("Invocation dropped without a terminal response")]
    Closed,
    #[error("Blocking invocation task failed: {0}")]
    Join(String),
    #[error("Call ended with {status}")]
    Status {
        status: ResponseStatus,
        message: Option<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_logic_error_keeps_message_verbatim() {
        let err = HandlerError::logic("no license");
        assert_eq!(err.to_string(), "no license");
        assert!(err.is_declared());
    }

    #[test]
    fn test_fault_is_not_declared() {
        let err = HandlerError::fault("disk on fire");
        assert!(!err.is_declared());
        assert!(err.to_string().contains("disk on fire"));
    }
}
