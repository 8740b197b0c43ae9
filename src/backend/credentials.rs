//! Credential bootstrap.
//!
//! Resolves how requests against the active project are authenticated:
//! a stored service-account key, the file named by
//! `GOOGLE_APPLICATION_CREDENTIALS`, or the ambient `gcloud` login.
//! Emulated services use a fixed token instead.

use chrono::Utc;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use std::env;
use tokio::sync::OnceCell;
use tracing::debug;

use super::error::{BackendError, BackendResult};
use super::gcloud::{Gcloud, RealGcloud};

pub const CLOUD_PLATFORM_SCOPE: &str = "https://www.googleapis.com/auth/cloud-platform";
pub const APPLICATION_CREDENTIALS_ENV: &str = "GOOGLE_APPLICATION_CREDENTIALS";

const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

fn default_token_uri() -> String {
    "https://oauth2.googleapis.com/token".to_string()
}

/// Service-account key as downloaded from the cloud console or `gcloud`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceAccountKey {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub key_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub private_key_id: Option<String>,
    pub private_key: String,
    pub client_email: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

impl ServiceAccountKey {
    /// Parse a key from its JSON blob.
    pub fn from_json(blob: &str) -> BackendResult<Self> {
        serde_json::from_str(blob)
            .map_err(|e| BackendError::credentials(format!("invalid service account key: {}", e)))
    }

    /// Sign an RS256 JWT with this key.
    pub fn sign<T: Serialize>(&self, claims: &T) -> BackendResult<String> {
        let key = EncodingKey::from_rsa_pem(self.private_key.as_bytes())
            .map_err(|e| BackendError::credentials(format!("unusable private key: {}", e)))?;
        let mut header = Header::new(Algorithm::RS256);
        header.kid = self.private_key_id.clone();
        jsonwebtoken::encode(&header, claims, &key)
            .map_err(|e| BackendError::credentials(format!("failed to sign token: {}", e)))
    }
}

#[derive(Debug, Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// Where access tokens come from.
#[derive(Debug, Clone)]
pub enum TokenSource {
    /// OAuth2 JWT-bearer exchange with a service-account key.
    ServiceAccount(ServiceAccountKey),
    /// `gcloud auth print-access-token`.
    Gcloud,
    /// A fixed token (emulators, tests).
    Static(String),
}

/// Lazily fetched, process-wide cached access token.
#[derive(Debug)]
pub struct Credentials {
    source: TokenSource,
    token: OnceCell<String>,
}

impl Credentials {
    pub fn new(source: TokenSource) -> Self {
        Self {
            source,
            token: OnceCell::new(),
        }
    }

    pub fn fixed(token: impl Into<String>) -> Self {
        Self::new(TokenSource::Static(token.into()))
    }

    /// Resolve credentials for a project.
    ///
    /// Priority:
    /// 1. Stored service-account blob for the project
    /// 2. Key file named by `GOOGLE_APPLICATION_CREDENTIALS`
    /// 3. Ambient `gcloud` login
    pub fn resolve(stored_blob: Option<&str>) -> BackendResult<Self> {
        if let Some(blob) = stored_blob {
            debug!("Using stored service account");
            return Ok(Self::new(TokenSource::ServiceAccount(
                ServiceAccountKey::from_json(blob)?,
            )));
        }
        if let Ok(path) = env::var(APPLICATION_CREDENTIALS_ENV) {
            debug!("Using service account from {}", path);
            let blob = std::fs::read_to_string(&path)?;
            return Ok(Self::new(TokenSource::ServiceAccount(
                ServiceAccountKey::from_json(&blob)?,
            )));
        }
        debug!("Falling back to ambient gcloud credentials");
        Ok(Self::new(TokenSource::Gcloud))
    }

    pub fn source(&self) -> &TokenSource {
        &self.source
    }

    /// The service-account key, when credentials are key based.
    pub fn service_account(&self) -> Option<&ServiceAccountKey> {
        match &self.source {
            TokenSource::ServiceAccount(key) => Some(key),
            _ => None,
        }
    }

    /// Get an access token, fetching it on first use.
    pub async fn access_token(&self) -> BackendResult<String> {
        self.token
            .get_or_try_init(|| self.fetch_token())
            .await
            .cloned()
    }

    async fn fetch_token(&self) -> BackendResult<String> {
        match &self.source {
            TokenSource::Static(token) => Ok(token.clone()),
            TokenSource::ServiceAccount(key) => self.exchange(key).await,
            TokenSource::Gcloud => {
                let output = tokio::task::spawn_blocking(|| RealGcloud::new().print_access_token())
                    .await
                    .map_err(|e| BackendError::credentials(e.to_string()))?
                    .map_err(|e| BackendError::credentials(e.to_string()))?;
                let token = String::from_utf8_lossy(&output.stdout).trim().to_string();
                if token.is_empty() {
                    return Err(BackendError::credentials(
                        "gcloud returned an empty access token",
                    ));
                }
                Ok(token)
            }
        }
    }

    async fn exchange(&self, key: &ServiceAccountKey) -> BackendResult<String> {
        let now = Utc::now().timestamp();
        let assertion = key.sign(&AssertionClaims {
            iss: &key.client_email,
            scope: CLOUD_PLATFORM_SCOPE,
            aud: &key.token_uri,
            iat: now,
            exp: now + 3600,
        })?;

        debug!("Exchanging service account assertion at {}", key.token_uri);
        let response = reqwest::Client::new()
            .post(&key.token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", &assertion)])
            .send()
            .await
            .map_err(|e| BackendError::transport("OAuth2", e))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            return Err(BackendError::credentials(format!(
                "token exchange failed ({}): {}",
                status, message
            )));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| BackendError::transport("OAuth2", e))?;
        Ok(token.access_token)
    }
}
