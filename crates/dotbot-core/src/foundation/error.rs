//! Unified error types for the dotbot core.
//!
//! Every failure the core can report falls into one of four groups:
//! protocol errors (malformed frames, missing decorations), state errors
//! (lifecycle misuse), missing-data errors (accessors asked for fields a
//! message never carries) and transport errors reported by the link.

use thiserror::Error;

// =============================================================================
// Transport Errors
// =============================================================================

/// Errors that can occur in transport operations.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    /// Connection failed.
    #[error("connection failed: {url} - {reason}")]
    ConnectionFailed {
        /// The URL that failed to connect.
        url: String,
        /// Reason for failure.
        reason: String,
    },

    /// Connection closed by the remote side or by a protocol error.
    #[error("connection closed: {reason}")]
    ConnectionClosed {
        /// Reason for closure.
        reason: String,
    },

    /// Message send failed.
    #[error("failed to send message: {0}")]
    SendFailed(String),

    /// Invalid configuration (bad URL, bad header).
    #[error("invalid transport configuration: {0}")]
    InvalidConfig(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(String),
}

impl From<std::io::Error> for TransportError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

// =============================================================================
// Core Errors
// =============================================================================

/// Errors surfaced by connectors, normalizers and the dispatch layer.
#[derive(Debug, Clone, Error)]
pub enum CoreError {
    /// A wire payload could not be normalized.
    #[error("failed to parse message: {reason}")]
    Parse {
        /// Reason for failure.
        reason: String,
    },

    /// `start` or `run_forever` was called while a session is active.
    #[error("connector is already running")]
    AlreadyRunning,

    /// `wait` was called before `start`.
    #[error("connection is not started yet, use start() first")]
    NotStarted,

    /// An outbound write was attempted while the transport is closed.
    #[error("transport is not connected")]
    NotConnected,

    /// A background session was requested outside of a tokio runtime.
    #[error("no async runtime available: {0}")]
    NoRuntime(String),

    /// An accessor was asked for data the message never carries.
    #[error("missing data: {0}")]
    MissingData(String),

    /// The transport reported an error.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Internal error (background task panicked, channel torn down).
    #[error("internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Creates a parse error.
    pub fn parse(reason: impl Into<String>) -> Self {
        Self::Parse {
            reason: reason.into(),
        }
    }

    /// Creates a missing-data error.
    pub fn missing(what: impl Into<String>) -> Self {
        Self::MissingData(what.into())
    }

    /// Creates an internal error.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Returns true for errors caused by calling an operation in the wrong
    /// lifecycle state.
    pub fn is_state_error(&self) -> bool {
        matches!(
            self,
            Self::AlreadyRunning | Self::NotStarted | Self::NotConnected | Self::NoRuntime(_)
        )
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::parse(err.to_string())
    }
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;
