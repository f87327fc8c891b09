//! Custom error types for the application.
//!
//! This module defines the primary error type, `DaqError`, for the whole recorder.
//! Using the `thiserror` crate, it provides a centralized and consistent way to handle
//! the different kinds of errors that can occur, from configuration and file issues to
//! acquisition backend failures.
//!
//! ## Error Hierarchy
//!
//! - **`Config`**: Wraps errors from `figment`, typically parse or type errors in the
//!   configuration file or environment.
//! - **`Configuration`**: Semantic errors in otherwise well-formed settings (e.g. a
//!   sampling rate above the aggregate bound). These are caught during validation.
//! - **`Io`** / **`Csv`** / **`Parse`**: Failures while saving or loading series files.
//! - **`InvalidState`**: An operation was requested in a controller or session state
//!   where it is not allowed (e.g. starting while already running).
//! - **`Backend`**: A `BackendError` surfaced synchronously.
//! - **`WorkerPanicked`**: The acquisition thread died and took the backend with it.
//!
//! Errors raised on the acquisition worker thread never use this type directly; they are
//! converted to `SessionEvent::Error` and delivered asynchronously.

use crate::acquisition::AcquisitionState;
use crate::hardware::BackendError;
use thiserror::Error;

/// Convenience alias for results using the application error type.
pub type AppResult<T> = std::result::Result<T, DaqError>;

#[derive(Error, Debug)]
#[allow(missing_docs)]
pub enum DaqError {
    #[error("Configuration error: {0}")]
    Config(#[from] figment::Error),

    #[error("Configuration validation error: {0}")]
    Configuration(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Malformed series file at line {line}: {message}")]
    Parse { line: u64, message: String },

    #[error("Operation '{operation}' not allowed while acquisition is {state}")]
    InvalidState {
        operation: &'static str,
        state: AcquisitionState,
    },

    #[error("There are unsaved data; '{0}' would discard them")]
    UnsavedData(&'static str),

    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    #[error("Failed to serialize configuration: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("The acquisition worker panicked; the backend is no longer available")]
    WorkerPanicked,
}

impl DaqError {
    /// Returns true when the error was caused by invalid settings rather than I/O.
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Config(_) | Self::Configuration(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DaqError::Parse {
            line: 12,
            message: "invalid float literal".to_string(),
        };
        assert!(err.to_string().contains("12"));
        assert!(err.to_string().contains("invalid float literal"));
    }

    #[test]
    fn test_invalid_state_display() {
        let err = DaqError::InvalidState {
            operation: "start",
            state: AcquisitionState::Running,
        };
        assert_eq!(
            err.to_string(),
            "Operation 'start' not allowed while acquisition is Running"
        );
    }

    #[test]
    fn test_is_configuration() {
        assert!(DaqError::Configuration("bad rate".into()).is_configuration());
        assert!(!DaqError::UnsavedData("open").is_configuration());
    }
}
