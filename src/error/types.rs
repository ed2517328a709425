//! Error types for the weave service manager.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for service lifecycle operations.
#[derive(Error, Debug)]
pub enum ServiceError {
    /// Subprocess invocation errors.
    #[error("Command error: {kind}")]
    Command { kind: CommandErrorKind },

    /// Configuration errors (home directory resolution, settings file).
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Template rendering errors.
    #[error("Template error: {message}")]
    Template { message: String },

    /// Plist decode/encode errors.
    #[error("Plist error: {message}")]
    Plist { message: String },

    /// The workload has no definition for the requested backend.
    #[error("Workload '{workload}' is not supported by the {backend} backend")]
    UnsupportedWorkload { workload: String, backend: String },

    /// The backend deliberately does not implement this operation.
    #[error("{operation} is not supported by the {backend} backend")]
    Unsupported { backend: String, operation: String },

    /// Start was requested before the service was ever created.
    #[error("Service '{service}' has not been created yet, run `{hint}` first")]
    ServiceNotCreated { service: String, hint: String },

    /// A log file that should exist is missing.
    #[error("Log file not found: {}", path.display())]
    LogFileNotFound { path: PathBuf },

    /// I/O errors.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Command error kinds.
#[derive(Error, Debug)]
pub enum CommandErrorKind {
    #[error("Command execution failed: {message}")]
    ExecutionFailed { message: String },

    #[error("Generated manifest failed validation: {message}")]
    InvalidManifest { message: String },
}

impl ServiceError {
    /// Shorthand for a wrapped subprocess failure.
    pub fn execution_failed(message: impl Into<String>) -> Self {
        ServiceError::Command {
            kind: CommandErrorKind::ExecutionFailed {
                message: message.into(),
            },
        }
    }

    /// Shorthand for an operation a backend does not implement.
    pub fn unsupported(backend: &str, operation: &str) -> Self {
        ServiceError::Unsupported {
            backend: backend.to_string(),
            operation: operation.to_string(),
        }
    }
}

/// Result type alias for service operations.
pub type ServiceResult<T> = Result<T, ServiceError>;
