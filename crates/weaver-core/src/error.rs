//! Error types for the core crate.

use crate::patch::PatchError;
use thiserror::Error;
use weaver_sandbox::SandboxError;

/// Core error types.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Configuration error.
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// Sandbox error outside of an action.
    #[error("sandbox error: {0}")]
    Sandbox(#[from] SandboxError),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Configuration-specific errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Invalid JSON/JSONC syntax.
    #[error("invalid config at {path}: {message}")]
    InvalidJson { path: String, message: String },

    /// Config validation failed.
    #[error("config validation failed: {message}")]
    Validation { message: String },

    /// Environment variable not found during substitution.
    #[error("environment variable not found: {name}")]
    EnvVarNotFound { name: String },

    /// File reference not found during substitution.
    #[error("file reference not found: {path}")]
    FileRefNotFound { path: String },

    /// Invalid path (e.g., could not determine config directory).
    #[error("invalid path: {0}")]
    InvalidPath(String),
}

/// Why a single action failed.
///
/// None of these stop the execution chain; the record is marked failed and
/// the next action runs.
#[derive(Debug, Error)]
pub enum ActionError {
    /// A command ran and exited non-zero.
    #[error("command `{command}` failed with exit code {exit_code}")]
    Command {
        command: String,
        exit_code: i32,
        output: String,
    },

    /// Creating a directory or writing a file failed.
    #[error("failed to write {path}: {source}")]
    Filesystem {
        path: String,
        #[source]
        source: SandboxError,
    },

    /// A modify action could not be applied.
    #[error("failed to patch {path}: {source}")]
    Patch {
        path: String,
        #[source]
        source: PatchError,
    },

    /// Any other sandbox failure.
    #[error(transparent)]
    Sandbox(#[from] SandboxError),

    /// The action was aborted while running.
    #[error("action aborted")]
    Cancelled,

    /// The action is missing something it needs to run.
    #[error("invalid action: {0}")]
    Invalid(String),
}

impl ActionError {
    /// Create a command error
    pub fn command(command: impl Into<String>, exit_code: i32, output: impl Into<String>) -> Self {
        Self::Command {
            command: command.into(),
            exit_code,
            output: output.into(),
        }
    }

    /// Whether later actions can still succeed.
    ///
    /// False once the sandbox connection is gone.
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Sandbox(e) | Self::Filesystem { source: e, .. } => !e.is_connection_closed(),
            _ => true,
        }
    }

    /// Captured process output, for command failures.
    pub fn output(&self) -> Option<&str> {
        match self {
            Self::Command { output, .. } => Some(output),
            _ => None,
        }
    }
}

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Result type for action handlers.
pub type ActionResult<T> = Result<T, ActionError>;
