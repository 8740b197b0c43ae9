//! Backend error types.
//!
//! Every REST call against the authentication, document and storage services
//! funnels its failures through [`BackendError`].

use miette::Diagnostic;
use thiserror::Error;

/// Errors raised by backend clients.
#[derive(Error, Diagnostic, Debug)]
pub enum BackendError {
    #[error("Failed to reach {service}")]
    #[diagnostic(
        code(fb_extra::backend::connection_failed),
        help("Check your network connection, or the emulator host if one is configured.")
    )]
    Connection {
        service: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("{service} returned {status}: {message}")]
    #[diagnostic(code(fb_extra::backend::http))]
    Http {
        service: &'static str,
        status: u16,
        message: String,
    },

    #[error("Not found: {what}")]
    #[diagnostic(code(fb_extra::backend::not_found))]
    NotFound { what: String },

    #[error("Invalid response from {service}: {message}")]
    #[diagnostic(code(fb_extra::backend::invalid_response))]
    InvalidResponse {
        service: &'static str,
        message: String,
    },

    #[error("Invalid request: {message}")]
    #[diagnostic(code(fb_extra::backend::invalid_request))]
    InvalidRequest { message: String },

    #[error("Credential error: {message}")]
    #[diagnostic(
        code(fb_extra::backend::credentials),
        help("Run `fb-extra use <project>` to store a service account for the project.")
    )]
    Credentials { message: String },

    #[error("IO error: {0}")]
    #[diagnostic(code(fb_extra::backend::io))]
    Io(#[from] std::io::Error),
}

impl BackendError {
    pub fn not_found(what: impl Into<String>) -> Self {
        BackendError::NotFound { what: what.into() }
    }

    pub fn credentials(message: impl Into<String>) -> Self {
        BackendError::Credentials {
            message: message.into(),
        }
    }

    /// Classify a transport error for the given service.
    pub fn transport(service: &'static str, e: reqwest::Error) -> Self {
        if e.is_connect() || e.is_timeout() {
            BackendError::Connection { service, source: e }
        } else {
            BackendError::InvalidResponse {
                service,
                message: e.to_string(),
            }
        }
    }
}

/// Result type for backend operations.
pub type BackendResult<T> = Result<T, BackendError>;
