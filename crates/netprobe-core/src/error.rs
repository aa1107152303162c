//! Error types for probe operations.

use serde::Serialize;
use thiserror::Error;

/// Substring every permission failure carries so operators can spot missing
/// raw-socket capability in collected results.
pub const RAW_SOCKET_PERMISSION_DENIED: &str = "raw socket permission denied";

/// Main error type for probe operations.
#[derive(Error, Debug)]
pub enum ProbeError {
    // Resolution errors
    #[error("Host not found: {host}")]
    HostNotFound { host: String },

    // Socket/IO errors
    #[error("raw socket permission denied: {0}")]
    PermissionDenied(String),

    #[error("Failed to create socket: {0}")]
    SocketCreation(#[source] std::io::Error),

    #[error("Send failed: {0}")]
    SendFailed(#[source] std::io::Error),

    #[error("Read timeout exceeded")]
    Timeout,

    // Protocol errors
    #[error("{message}")]
    Protocol { message: String },

    // Request errors
    #[error("{0}")]
    InvalidInput(String),

    // Internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ProbeError {
    /// Returns the stable error name exposed to API clients.
    pub fn name(&self) -> &'static str {
        match self {
            Self::HostNotFound { .. } => "HostNotFound",
            Self::PermissionDenied(_) => "PermissionDenied",
            Self::Timeout => "Timeout",
            Self::Protocol { .. } => "ProtocolError",
            Self::InvalidInput(_) => "InvalidInput",
            Self::SocketCreation(_) | Self::SendFailed(_) | Self::Internal(_) => "InternalError",
        }
    }

    /// Returns true for conditions that are part of normal probing
    /// (no answer before the deadline) rather than infrastructure failures.
    pub fn is_expected(&self) -> bool {
        matches!(self, Self::Timeout | Self::Protocol { .. })
    }

    /// Builds a permission error from the OS error that refused the socket.
    pub fn permission_denied(err: &std::io::Error) -> Self {
        Self::PermissionDenied(err.to_string())
    }

    /// Converts the error into the body placed in the `err` field of a response.
    ///
    /// Internal errors are reduced to a generic message; their detail only
    /// goes to the log.
    pub fn to_body(&self) -> ErrorBody {
        let message = match self {
            Self::Internal(_) => "internal error".to_string(),
            other => other.to_string(),
        };
        ErrorBody {
            name: self.name().to_string(),
            message,
        }
    }
}

impl From<std::io::Error> for ProbeError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock => ProbeError::Timeout,
            std::io::ErrorKind::PermissionDenied => ProbeError::permission_denied(&err),
            _ => ProbeError::Internal(err.to_string()),
        }
    }
}

/// The `err` object of every response body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorBody {
    pub name: String,
    pub message: String,
}

/// Result type alias for probe operations.
pub type ProbeResult<T> = Result<T, ProbeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_names() {
        assert_eq!(
            ProbeError::HostNotFound {
                host: "nope.invalid".into()
            }
            .name(),
            "HostNotFound"
        );
        assert_eq!(ProbeError::Timeout.name(), "Timeout");
        assert_eq!(ProbeError::InvalidInput("bad".into()).name(), "InvalidInput");
        assert_eq!(
            ProbeError::SendFailed(std::io::Error::other("boom")).name(),
            "InternalError"
        );
    }

    #[test]
    fn test_permission_message_is_greppable() {
        let io = std::io::Error::from(std::io::ErrorKind::PermissionDenied);
        let err = ProbeError::from(io);
        assert_eq!(err.name(), "PermissionDenied");
        assert!(err.to_string().contains(RAW_SOCKET_PERMISSION_DENIED));
    }

    #[test]
    fn test_io_timeout_maps_to_timeout() {
        let io = std::io::Error::from(std::io::ErrorKind::WouldBlock);
        assert!(matches!(ProbeError::from(io), ProbeError::Timeout));
    }

    #[test]
    fn test_internal_body_is_generic() {
        let body = ProbeError::Internal("task panicked at foo.rs:12".into()).to_body();
        assert_eq!(body.name, "InternalError");
        assert_eq!(body.message, "internal error");
    }
}
