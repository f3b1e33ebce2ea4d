//! Error types for sandbox operations.

use thiserror::Error;
use weaver_protocol::ErrorBody;

/// Errors that can occur while talking to a sandbox.
#[derive(Debug, Error)]
pub enum SandboxError {
    /// Failed to establish the transport
    #[error("failed to connect to sandbox: {0}")]
    ConnectionFailed(String),

    /// The transport is gone; every outstanding and future request fails with this
    #[error("sandbox connection closed")]
    ConnectionClosed,

    /// The sandbox answered with `success = false`
    #[error("sandbox error {code}: {message}")]
    Remote { code: String, message: String },

    /// The peer sent something we could not interpret
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The interactive shell process is gone
    #[error("shell session exited")]
    ShellExited,

    /// The caller aborted the operation
    #[error("operation cancelled")]
    Cancelled,

    /// Path cannot be used inside the sandbox
    #[error("invalid path: {0}")]
    InvalidPath(String),

    /// File content could not be decoded with the requested encoding
    #[error("failed to decode '{path}' as {encoding}: {message}")]
    Decode {
        path: String,
        encoding: &'static str,
        message: String,
    },

    /// Generic I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl SandboxError {
    /// Create a connection failed error
    pub fn connection_failed(message: impl Into<String>) -> Self {
        Self::ConnectionFailed(message.into())
    }

    /// Create a protocol error
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol(message.into())
    }

    /// Error code reported by the sandbox, if this is a remote error
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::Remote { code, .. } => Some(code),
            _ => None,
        }
    }

    /// Check if this error means the transport is unusable
    pub fn is_connection_closed(&self) -> bool {
        matches!(self, Self::ConnectionClosed)
    }

    /// Check if the sandbox reported a missing path
    pub fn is_not_found(&self) -> bool {
        self.code() == Some("ENOENT")
    }
}

impl From<ErrorBody> for SandboxError {
    fn from(body: ErrorBody) -> Self {
        Self::Remote {
            code: body.code,
            message: body.message,
        }
    }
}

/// Result type for sandbox operations.
pub type SandboxResult<T> = Result<T, SandboxError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_error_from_body() {
        let err: SandboxError = ErrorBody::new("ENOENT", "no such file").into();
        assert_eq!(err.to_string(), "sandbox error ENOENT: no such file");
        assert!(err.is_not_found());
        assert_eq!(err.code(), Some("ENOENT"));
    }

    #[test]
    fn test_connection_closed() {
        let err = SandboxError::ConnectionClosed;
        assert!(err.is_connection_closed());
        assert!(err.code().is_none());
    }
}
