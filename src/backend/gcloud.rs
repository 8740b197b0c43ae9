//! Google Cloud SDK (`gcloud`) invocations.
//!
//! This module provides a trait-based abstraction over the handful of
//! `gcloud` commands the tool relies on, so they can be mocked in tests.

use miette::Diagnostic;
use std::path::Path;
use std::process::{Command, Output};
use thiserror::Error;

#[cfg(test)]
use mockall::automock;

/// Errors that can occur while running `gcloud`.
#[derive(Error, Diagnostic, Debug)]
pub enum GcloudError {
    #[error("gcloud command failed: {0}")]
    #[diagnostic(code(fb_extra::gcloud::command_failed))]
    CommandFailed(String),

    #[error("gcloud returned non-zero exit code {code}: {output}")]
    #[diagnostic(code(fb_extra::gcloud::non_zero_exit))]
    NonZeroExit { code: i32, output: String },

    #[error("Command 'gcloud' not found!")]
    #[diagnostic(
        code(fb_extra::gcloud::not_found),
        help("Please install Cloud SDK Command Line Tools.")
    )]
    GcloudNotFound,
}

/// Trait for gcloud operations. Can be mocked in tests.
#[cfg_attr(test, automock)]
pub trait Gcloud {
    /// Select the default project for subsequent gcloud calls.
    fn set_project(&self, project: &str) -> Result<Output, GcloudError>;

    /// List the service accounts of the current project.
    fn list_service_accounts(&self) -> Result<Output, GcloudError>;

    /// Create a new JSON key for `account` and write it to `path`.
    fn create_key(&self, path: &Path, account: &str) -> Result<Output, GcloudError>;

    /// Print an access token for the ambient gcloud login.
    fn print_access_token(&self) -> Result<Output, GcloudError>;
}

/// Real implementation of Gcloud using std::process::Command.
#[derive(Clone, Copy, Default)]
pub struct RealGcloud;

impl RealGcloud {
    pub fn new() -> Self {
        Self
    }

    fn run(&self, args: &[&str]) -> Result<Output, GcloudError> {
        let output = Command::new("gcloud").args(args).output().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                GcloudError::GcloudNotFound
            } else {
                GcloudError::CommandFailed(e.to_string())
            }
        })?;
        check_output(output)
    }
}

/// Check if the output indicates success, otherwise return an error.
fn check_output(output: Output) -> Result<Output, GcloudError> {
    if output.status.success() {
        return Ok(output);
    }
    let code = output.status.code().unwrap_or(-1);
    let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
    let combined = match (stdout.is_empty(), stderr.is_empty()) {
        (false, false) => format!("{}\n{}", stdout, stderr),
        (false, true) => stdout,
        _ => stderr,
    };
    Err(GcloudError::NonZeroExit {
        code,
        output: combined,
    })
}

impl Gcloud for RealGcloud {
    fn set_project(&self, project: &str) -> Result<Output, GcloudError> {
        self.run(&["config", "set", "project", project])
    }

    fn list_service_accounts(&self) -> Result<Output, GcloudError> {
        self.run(&["iam", "service-accounts", "list"])
    }

    fn create_key(&self, path: &Path, account: &str) -> Result<Output, GcloudError> {
        let path = path.to_string_lossy();
        let iam_account = format!("--iam-account={}", account);
        self.run(&[
            "iam",
            "service-accounts",
            "keys",
            "create",
            &path,
            &iam_account,
        ])
    }

    fn print_access_token(&self) -> Result<Output, GcloudError> {
        self.run(&["auth", "print-access-token"])
    }
}

/// Pick the Firebase Admin SDK service account of `project` out of
/// `gcloud iam service-accounts list` output.
pub fn find_admin_sdk_account(listing: &str, project: &str) -> Option<String> {
    let suffix = format!("@{}.iam.gserviceaccount.com", project);
    listing
        .split_whitespace()
        .find(|token| token.starts_with("firebase-adminsdk") && token.ends_with(&suffix))
        .map(str::to_string)
}
