//! Error types for the printer library

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;

/// Classification of transport failures
///
/// The kind decides whether the state machine retries: see
/// [`TransportError::recoverable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportErrorKind {
    /// Required platform driver/backend is absent
    CapabilityMissing,
    /// Channel did not open within the connection timeout
    ConnectionTimeout,
    /// Channel dropped or could not be opened
    ConnectionLost,
    /// Write to an open channel failed
    SendFailure,
    /// Descriptor or command parameter rejected before any I/O
    ValidationError,
    /// Auto-reconnect deadline exceeded
    ReconnectTimeout,
    /// `send` called while not connected
    NotConnected,
    /// Connect sequence aborted by `disconnect`
    Cancelled,
}

impl TransportErrorKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::CapabilityMissing => "capability_missing",
            Self::ConnectionTimeout => "connection_timeout",
            Self::ConnectionLost => "connection_lost",
            Self::SendFailure => "send_failure",
            Self::ValidationError => "validation_error",
            Self::ReconnectTimeout => "reconnect_timeout",
            Self::NotConnected => "not_connected",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

type Cause = Arc<dyn std::error::Error + Send + Sync>;

/// Transport error
///
/// Cloneable so it can be broadcast to every event subscriber.
#[derive(Debug, Clone, Error)]
#[error("{kind}: {message}")]
pub struct TransportError {
    pub kind: TransportErrorKind,
    pub message: String,
    #[source]
    pub cause: Option<Cause>,
    pub recoverable: bool,
}

impl TransportError {
    pub fn new(kind: TransportErrorKind, message: impl Into<String>, recoverable: bool) -> Self {
        Self {
            kind,
            message: message.into(),
            cause: None,
            recoverable,
        }
    }

    /// Attach the underlying error
    pub fn with_cause<E>(mut self, cause: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        self.cause = Some(Arc::new(cause));
        self
    }

    pub fn capability_missing(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::CapabilityMissing, message, false)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::ConnectionTimeout, message, true)
    }

    pub fn connection_lost(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::ConnectionLost, message, true)
    }

    pub fn send_failure(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::SendFailure, message, true)
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::ValidationError, message, false)
    }

    pub fn reconnect_timeout(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::ReconnectTimeout, message, false)
    }

    pub fn not_connected(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::NotConnected, message, false)
    }

    pub fn cancelled(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Cancelled, message, false)
    }

    /// Wrap an I/O error as a failed connection attempt
    pub fn io(context: &str, err: std::io::Error) -> Self {
        Self::connection_lost(format!("{}: {}", context, err)).with_cause(err)
    }

    pub fn is_recoverable(&self) -> bool {
        self.recoverable
    }
}

/// Result type for transport operations
pub type TransportResult<T> = Result<T, TransportError>;
