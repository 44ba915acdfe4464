//! Unified error type for the conversion pipeline.
//!
//! Every failure a job can end in is a `ConversionError` variant. Conversion
//! into `docforge_core::error::AppError` keeps diagnostics server-side: the
//! caller only ever sees a generic message and a machine-readable code.

use std::path::PathBuf;

use docforge_core::error::{AppError, ErrorKind};
use thiserror::Error;

use crate::models::JobStatus;

/// Message reported to callers for any server-side conversion failure.
pub const GENERIC_FAILURE_MESSAGE: &str = "File conversion failed on the server.";

/// Unified error type for all conversion operations.
#[derive(Debug, Error)]
pub enum ConversionError {
    /// No uploaded file accompanied the request.
    #[error("No file uploaded")]
    MissingInput,

    /// The requested operation is not served by the registry.
    #[error("Unsupported operation: {operation}")]
    UnsupportedOperation {
        /// The operation id as requested.
        operation: String,
    },

    /// The converter could not be launched or exited unsuccessfully.
    #[error("Converter execution failed: {diagnostic}")]
    ExecutionFailed {
        /// Exit status and captured stderr, for server logs only.
        diagnostic: String,
    },

    /// The converter reported success but its output file is absent.
    #[error("Output file not created: {expected_path}")]
    OutputNotFound {
        /// Where the converter was expected to write.
        expected_path: PathBuf,
    },

    /// The converted file could not be handed to the caller.
    #[error("Delivery failed: {reason}")]
    DeliveryFailed {
        /// Transport-level reason.
        reason: String,
    },

    /// A path handed to a converter was not an internally generated scratch path.
    #[error("Refusing to pass unsafe path to converter: {path}")]
    UnsafePath {
        /// The rejected path.
        path: PathBuf,
    },

    /// The job state machine was driven backwards or out of order.
    #[error("Invalid job transition from {from:?} to {to:?}")]
    InvalidTransition {
        /// Current status.
        from: JobStatus,
        /// Requested status.
        to: JobStatus,
    },

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Tokio task join error.
    #[error("Task join error: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl ConversionError {
    /// Machine-readable code for this failure.
    pub fn code(&self) -> &'static str {
        match self {
            Self::MissingInput => "MISSING_INPUT",
            Self::UnsupportedOperation { .. } => "UNSUPPORTED_OPERATION",
            Self::ExecutionFailed { .. } => "EXECUTION_FAILED",
            Self::OutputNotFound { .. } => "OUTPUT_NOT_FOUND",
            Self::DeliveryFailed { .. } => "DELIVERY_FAILED",
            Self::UnsafePath { .. }
            | Self::InvalidTransition { .. }
            | Self::Io(_)
            | Self::Join(_) => "INTERNAL_ERROR",
        }
    }

    /// Whether the failure was caused by the caller rather than the server.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::MissingInput | Self::UnsupportedOperation { .. }
        )
    }
}

impl From<ConversionError> for AppError {
    fn from(err: ConversionError) -> Self {
        let code = err.code();
        match &err {
            ConversionError::MissingInput => {
                AppError::validation("No file uploaded.").with_code(code)
            }
            ConversionError::UnsupportedOperation { operation } => {
                AppError::not_found(format!("Unsupported operation '{operation}'.")).with_code(code)
            }
            _ => AppError::with_source(ErrorKind::Conversion, GENERIC_FAILURE_MESSAGE, err)
                .with_code(code),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diagnostic_is_hidden_from_caller() {
        let err = ConversionError::ExecutionFailed {
            diagnostic: "exit code 1: /tmp/secret-path.pdf is broken".to_string(),
        };
        let app: AppError = err.into();
        assert_eq!(app.kind, ErrorKind::Conversion);
        assert_eq!(app.message, GENERIC_FAILURE_MESSAGE);
        assert_eq!(app.code(), "EXECUTION_FAILED");
        assert!(!app.message.contains("secret"));
    }

    #[test]
    fn test_client_errors_map_to_client_kinds() {
        let app: AppError = ConversionError::MissingInput.into();
        assert_eq!(app.kind, ErrorKind::Validation);
        assert_eq!(app.code(), "MISSING_INPUT");

        let app: AppError = ConversionError::UnsupportedOperation {
            operation: "pdf-to-midi".to_string(),
        }
        .into();
        assert_eq!(app.kind, ErrorKind::NotFound);
        assert_eq!(app.code(), "UNSUPPORTED_OPERATION");
    }

    #[test]
    fn test_output_not_found_code() {
        let err = ConversionError::OutputNotFound {
            expected_path: PathBuf::from("/tmp/x.pdf"),
        };
        assert_eq!(err.code(), "OUTPUT_NOT_FOUND");
        assert!(!err.is_client_error());
    }
}
