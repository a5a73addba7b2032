//! Runtime error types.

use thiserror::Error;

use crate::config::ConfigError;

/// Errors that can occur during runtime operations.
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Configuration could not be loaded or is invalid.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The chatter or its connector failed.
    #[error("Chatter error: {0}")]
    Core(#[from] dotbot_core::CoreError),

    /// No transport was supplied and none is compiled in.
    #[error("No transport available; enable the `ws-client` feature or supply one")]
    NoTransport,
}

/// Result type for runtime operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;
