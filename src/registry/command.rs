//! Commands: one named, permission-scoped operation of an actor.

use super::actor::Actor;
use crate::handler::Operation;
use crate::permission::PermissionSet;
use crate::value::ValueKind;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

/// Response timeout used when nothing more specific is configured.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(60_000);

/// Registration data for a [`Command`].
///
/// A command is synchronous unless [`CommandDef::async_result`] declares the
/// kind of payload its completion will carry.
#[derive(Debug, Clone)]
pub struct CommandDef {
    cmd: String,
    operation: Operation,
    permissions: Vec<i32>,
    timeout: Option<Duration>,
    async_result: Option<ValueKind>,
    enabled: bool,
    doc: String,
}

impl CommandDef {
    pub fn new(cmd: impl Into<String>, operation: Operation) -> Self {
        Self {
            cmd: cmd.into(),
            operation,
            permissions: Vec::new(),
            timeout: None,
            async_result: None,
            enabled: true,
            doc: String::new(),
        }
    }

    pub fn permissions<I: IntoIterator<Item = i32>>(mut self, tokens: I) -> Self {
        self.permissions = tokens.into_iter().collect();
        self
    }

    /// Response timeout for async completion. Zero means the default.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Marks the command async, completing with a payload of `kind`.
    pub fn async_result(mut self, kind: ValueKind) -> Self {
        self.async_result = Some(kind);
        self
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn doc(mut self, doc: impl Into<String>) -> Self {
        self.doc = doc.into();
        self
    }

    pub fn cmd(&self) -> &str {
        &self.cmd
    }

    pub fn operation(&self) -> &Operation {
        &self.operation
    }
}

pub struct Command {
    actor: Weak<Actor>,
    cmd: String,
    operation: Operation,
    permissions: PermissionSet,
    timeout: Option<Duration>,
    async_result: Option<ValueKind>,
    enabled: AtomicBool,
    doc: String,
}

impl Command {
    pub(crate) fn new(actor: Weak<Actor>, def: CommandDef) -> Self {
        Self {
            actor,
            cmd: def.cmd.trim().to_string(),
            operation: def.operation,
            permissions: PermissionSet::new(def.permissions),
            timeout: def.timeout.filter(|t| !t.is_zero()),
            async_result: def.async_result,
            enabled: AtomicBool::new(def.enabled),
            doc: def.doc,
        }
    }

    pub fn cmd(&self) -> &str {
        &self.cmd
    }

    pub fn operation(&self) -> &Operation {
        &self.operation
    }

    pub fn permissions(&self) -> &PermissionSet {
        &self.permissions
    }

    /// Response timeout, [`DEFAULT_TIMEOUT`] unless one was declared.
    pub fn timeout(&self) -> Duration {
        self.timeout.unwrap_or(DEFAULT_TIMEOUT)
    }

    /// The timeout given at registration, if it was non-zero.
    pub fn declared_timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub fn is_async(&self) -> bool {
        self.async_result.is_some()
    }

    /// Declared payload kind of the async completion.
    pub fn async_result(&self) -> Option<ValueKind> {
        self.async_result
    }

    pub fn doc(&self) -> &str {
        &self.doc
    }

    pub fn actor(&self) -> Option<Arc<Actor>> {
        self.actor.upgrade()
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Release);
    }
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command")
            .field("cmd", &self.cmd)
            .field("operation", &self.operation)
            .field("async_result", &self.async_result)
            .field("timeout", &self.timeout)
            .field("enabled", &self.is_enabled())
            .finish()
    }
}
