//! Runtime error types.

use thiserror::Error;

use mentionbot_framework::{FactoryError, InstanceError};

use crate::config::ConfigError;

/// Errors that stop the runtime.
#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The module registry could not be collected.
    #[error("Module factory error: {0}")]
    Factory(#[from] FactoryError),

    /// A server instance could not be constructed.
    #[error("Failed to start server {server_id}: {source}")]
    Instance {
        server_id: String,
        #[source]
        source: InstanceError,
    },

    /// A fault escaped a server instance.
    #[error("Core fault in server {server_id}: {source:#}")]
    CoreFault {
        server_id: String,
        #[source]
        source: anyhow::Error,
    },
}

/// Result type for runtime operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;
