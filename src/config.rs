//! # Configuration
//!
//! Runtime settings are plain `serde` structs loaded from TOML. Every field has
//! a default, so an empty document is a valid configuration:
//!
//! ```toml
//! [invoker]
//! default_timeout_ms = 60000
//! shutdown_wait_ms = 10000
//! shutdown_poll_ms = 100
//!
//! [[registry.applications]]
//! app_id = "Demo"
//! version = "1.0.0"
//! doc = "Demo application"
//!
//! [[registry.applications.modules]]
//! module_id = "GLOBAL"
//! ```
//!
//! The registry section only pre-declares applications and modules. Actors and
//! commands are registered in code because their handlers are Rust types.

use crate::error::ConfigError;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

const DEFAULT_TIMEOUT_MS: u64 = 60_000;
const DEFAULT_SHUTDOWN_WAIT_MS: u64 = 10_000;
const DEFAULT_SHUTDOWN_POLL_MS: u64 = 100;

fn enabled_by_default() -> bool {
    true
}

/// Settings of the [`Invoker`](crate::Invoker).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct InvokerConfig {
    /// Async response timeout when neither the call nor the command sets one.
    pub default_timeout_ms: u64,
    /// How long `shutdown` waits for running calls.
    pub shutdown_wait_ms: u64,
    pub shutdown_poll_ms: u64,
}

impl Default for InvokerConfig {
    fn default() -> Self {
        Self {
            default_timeout_ms: DEFAULT_TIMEOUT_MS,
            shutdown_wait_ms: DEFAULT_SHUTDOWN_WAIT_MS,
            shutdown_poll_ms: DEFAULT_SHUTDOWN_POLL_MS,
        }
    }
}

impl InvokerConfig {
    /// Zero falls back to 60 seconds.
    pub fn default_timeout(&self) -> Duration {
        Duration::from_millis(non_zero_or(self.default_timeout_ms, DEFAULT_TIMEOUT_MS))
    }

    pub fn shutdown_wait(&self) -> Duration {
        Duration::from_millis(self.shutdown_wait_ms)
    }

    /// Zero falls back to 100 milliseconds.
    pub fn shutdown_poll(&self) -> Duration {
        Duration::from_millis(non_zero_or(self.shutdown_poll_ms, DEFAULT_SHUTDOWN_POLL_MS))
    }
}

fn non_zero_or(value: u64, fallback: u64) -> u64 {
    if value == 0 {
        fallback
    } else {
        value
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ModuleConfig {
    pub module_id: String,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
    #[serde(default)]
    pub doc: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ApplicationConfig {
    pub app_id: String,
    /// Defaults to `1.0.0` when absent.
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
    #[serde(default)]
    pub doc: Option<String>,
    #[serde(default)]
    pub modules: Vec<ModuleConfig>,
}

/// Applications and modules to pre-declare, see
/// [`Registry::apply_config`](crate::Registry::apply_config).
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RegistryConfig {
    #[serde(default)]
    pub applications: Vec<ApplicationConfig>,
}

/// Top-level configuration document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    pub invoker: InvokerConfig,
    pub registry: RegistryConfig,
}

impl DispatchConfig {
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(source)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let source = std::fs::read_to_string(path)?;
        Self::from_toml_str(&source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_uses_defaults() {
        let config = DispatchConfig::from_toml_str("").unwrap();
        assert_eq!(config.invoker, InvokerConfig::default());
        assert_eq!(config.invoker.default_timeout(), Duration::from_secs(60));
        assert!(config.registry.applications.is_empty());
    }

    #[test]
    fn test_parses_applications_and_modules() {
        let config = DispatchConfig::from_toml_str(
            r#"
            [invoker]
            default_timeout_ms = 0
            shutdown_wait_ms = 500

            [[registry.applications]]
            app_id = "Demo"
            doc = "Demo application"

            [[registry.applications.modules]]
            module_id = "GLOBAL"

            [[registry.applications.modules]]
            module_id = "LEGACY"
            enabled = false
            "#,
        )
        .unwrap();

        assert_eq!(config.invoker.default_timeout(), Duration::from_secs(60));
        assert_eq!(config.invoker.shutdown_wait(), Duration::from_millis(500));
        assert_eq!(config.invoker.shutdown_poll(), Duration::from_millis(100));

        let app = &config.registry.applications[0];
        assert_eq!(app.app_id, "Demo");
        assert_eq!(app.version, None);
        assert!(app.enabled);
        assert_eq!(app.modules.len(), 2);
        assert!(!app.modules[1].enabled);
    }

    #[test]
    fn test_invalid_toml_is_parse_error() {
        let err = DispatchConfig::from_toml_str("[invoker\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = DispatchConfig::from_file("/definitely/not/here.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
