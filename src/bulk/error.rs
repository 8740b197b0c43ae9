//! Error taxonomy of the bulk-operation engine.

use miette::Diagnostic;
use thiserror::Error;

use crate::backend::BackendError;

/// Errors surfaced by bulk operations.
///
/// The engine does not tell recoverable from fatal failures apart: any of
/// these ends the running operation.
#[derive(Error, Diagnostic, Debug)]
pub enum BulkError {
    #[error("Not found: {what}")]
    #[diagnostic(code(fb_extra::bulk::not_found))]
    NotFound { what: String },

    #[error("Invalid input: {message}")]
    #[diagnostic(code(fb_extra::bulk::invalid_input))]
    InvalidInput { message: String },

    #[error("IO error: {0}")]
    #[diagnostic(code(fb_extra::bulk::io))]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Backend(BackendError),
}

impl BulkError {
    pub fn invalid(message: impl Into<String>) -> Self {
        BulkError::InvalidInput {
            message: message.into(),
        }
    }
}

impl From<BackendError> for BulkError {
    fn from(e: BackendError) -> Self {
        match e {
            BackendError::NotFound { what } => BulkError::NotFound { what },
            BackendError::Io(io) => BulkError::Io(io),
            other => BulkError::Backend(other),
        }
    }
}

impl From<serde_json::Error> for BulkError {
    fn from(e: serde_json::Error) -> Self {
        BulkError::invalid(e.to_string())
    }
}

/// Result type for bulk operations.
pub type BulkResult<T> = Result<T, BulkError>;
