//! Self-update against the crates.io registry.

use serde::Deserialize;
use std::process::{Command, Output};
use std::time::Duration;
use tracing::debug;

#[cfg(test)]
use mockall::automock;

use crate::cli::error::{CliError, CliResult};
use crate::cli::output::{info, success};

pub const CRATE_NAME: &str = env!("CARGO_PKG_NAME");
pub const CURRENT_VERSION: &str = env!("CARGO_PKG_VERSION");
pub const CRATES_IO_URL: &str = "https://crates.io";
pub const NO_UPDATE_CHECK_ENV: &str = "FB_EXTRA_NO_UPDATE_CHECK";

#[derive(Debug, Deserialize)]
struct CrateResponse {
    #[serde(rename = "crate")]
    krate: CrateInfo,
}

#[derive(Debug, Deserialize)]
struct CrateInfo {
    max_version: String,
    #[serde(default)]
    max_stable_version: Option<String>,
}

/// Installs a published version of the tool. Can be mocked in tests.
#[cfg_attr(test, automock)]
pub trait Installer {
    fn install(&self, version: &str) -> std::io::Result<Output>;
}

/// Installs through `cargo install`.
#[derive(Clone, Copy, Default)]
pub struct CargoInstaller;

impl Installer for CargoInstaller {
    fn install(&self, version: &str) -> std::io::Result<Output> {
        Command::new("cargo")
            .args(["install", CRATE_NAME, "--version", version, "--force"])
            .output()
    }
}

/// Latest stable version published on the registry at `base_url`.
pub async fn latest_version(base_url: &str) -> CliResult<String> {
    let url = format!("{}/api/v1/crates/{}", base_url.trim_end_matches('/'), CRATE_NAME);
    debug!(%url, "Checking for updates");

    let response = reqwest::Client::new()
        .get(&url)
        .header(
            reqwest::header::USER_AGENT,
            format!("{}/{}", CRATE_NAME, CURRENT_VERSION),
        )
        .timeout(Duration::from_secs(5))
        .send()
        .await
        .map_err(|e| CliError::Update {
            message: e.to_string(),
        })?;

    if !response.status().is_success() {
        return Err(CliError::Update {
            message: format!("registry returned {}", response.status()),
        });
    }

    let body: CrateResponse = response.json().await.map_err(|e| CliError::Update {
        message: e.to_string(),
    })?;
    Ok(body.krate.max_stable_version.unwrap_or(body.krate.max_version))
}

/// Numeric components of a dotted version, ignoring any pre-release suffix.
fn version_parts(version: &str) -> Vec<u64> {
    version
        .trim()
        .trim_start_matches('v')
        .split(['-', '+'])
        .next()
        .unwrap_or_default()
        .split('.')
        .map(|part| part.parse().unwrap_or(0))
        .collect()
}

pub fn is_newer(latest: &str, current: &str) -> bool {
    version_parts(latest) > version_parts(current)
}

/// Startup notice shown when a newer version is published. Lookup failures
/// are swallowed.
pub async fn update_notice(base_url: &str) -> Option<String> {
    match latest_version(base_url).await {
        Ok(latest) if is_newer(&latest, CURRENT_VERSION) => Some(success(&format!(
            "Update for CLI is available! ({} -> {})",
            CURRENT_VERSION, latest
        ))),
        Ok(_) => None,
        Err(e) => {
            debug!(error = %e, "Update check failed");
            None
        }
    }
}

/// Install `latest` over the running `current` version after confirmation.
pub fn update<I: Installer + ?Sized>(
    installer: &I,
    current: &str,
    latest: &str,
    confirm: impl FnOnce() -> CliResult<bool>,
) -> CliResult<String> {
    if !is_newer(latest, current) {
        return Ok(info(&format!("CLI is already up to date. ({})", current)));
    }

    if !confirm()? {
        return Err(CliError::Aborted);
    }

    let output = installer.install(latest)?;
    if !output.status.success() {
        return Err(CliError::Update {
            message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    Ok(success(&format!(
        "Successfully updated CLI! ({} -> {})",
        current, latest
    )))
}
