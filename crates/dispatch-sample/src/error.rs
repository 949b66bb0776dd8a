//! Error types for the sample application.

use actor_dispatch::{ConfigError, RegistryError};
use thiserror::Error;

/// Errors that can occur while building or stopping the [`DispatchSystem`](crate::lifecycle::DispatchSystem).
#[derive(Debug, Error)]
pub enum SampleError {
    /// The embedded configuration could not be loaded.
    #[error("Sample configuration error: {0}")]
    Config(#[from] ConfigError),

    /// An actor or command could not be registered.
    #[error("Sample registration error: {0}")]
    Registry(#[from] RegistryError),

    /// The system was built outside a tokio runtime.
    #[error("No tokio runtime available: {0}")]
    NoRuntime(String),

    #[error("Application not configured: {0}")]
    MissingApplication(&'static str),

    /// A module the actors expect was not declared by the configuration.
    #[error("Module not configured: {0}")]
    MissingModule(&'static str),

    /// Shutdown gave up with calls still in flight.
    #[error("{0} call(s) still running at shutdown")]
    StillRunning(usize),

    #[error("Shutdown task failed: {0}")]
    Join(String),
}
