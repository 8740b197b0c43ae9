use miette::Diagnostic;
use thiserror::Error;

use crate::backend::BackendError;
use crate::backend::gcloud::GcloudError;
use crate::bulk::BulkError;
use crate::config::ConfigError;

#[derive(Error, Diagnostic, Debug)]
pub enum CliError {
    #[error("No currently active project!")]
    #[diagnostic(
        code(fb_extra::cli::no_active_project),
        help("Select one first: fb-extra use <project-id>")
    )]
    NoActiveProject,

    #[error("{message}")]
    #[diagnostic(code(fb_extra::cli::invalid_input))]
    InvalidInput { message: String },

    #[error("{failed} of {attempted} {what} failed")]
    #[diagnostic(
        code(fb_extra::cli::batch_failed),
        help("Earlier successful changes were kept. Re-run with an exclusion list to retry.")
    )]
    BatchFailed {
        what: &'static str,
        failed: usize,
        attempted: usize,
    },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Gcloud(#[from] GcloudError),

    #[error("Update failed: {message}")]
    #[diagnostic(code(fb_extra::cli::update))]
    Update { message: String },

    #[error("Aborted.")]
    #[diagnostic(code(fb_extra::cli::aborted))]
    Aborted,

    #[error(transparent)]
    #[diagnostic(transparent)]
    Bulk(#[from] BulkError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    #[diagnostic(code(fb_extra::cli::io))]
    Io(#[from] std::io::Error),
}

impl CliError {
    pub fn invalid(message: impl Into<String>) -> Self {
        CliError::InvalidInput {
            message: message.into(),
        }
    }
}

impl From<BackendError> for CliError {
    fn from(e: BackendError) -> Self {
        CliError::Bulk(e.into())
    }
}

impl From<serde_json::Error> for CliError {
    fn from(e: serde_json::Error) -> Self {
        CliError::InvalidInput {
            message: e.to_string(),
        }
    }
}

impl From<dialoguer::Error> for CliError {
    fn from(e: dialoguer::Error) -> Self {
        CliError::Io(std::io::Error::other(e))
    }
}

pub type CliResult<T> = Result<T, CliError>;
