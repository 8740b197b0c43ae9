//! Service endpoint resolution.
//!
//! Production endpoints are the public Google APIs. Each service can be
//! redirected to a local Firebase emulator through the same environment
//! variables the official SDKs honour.

use std::env;

pub const AUTH_EMULATOR_ENV: &str = "FIREBASE_AUTH_EMULATOR_HOST";
pub const FIRESTORE_EMULATOR_ENV: &str = "FIRESTORE_EMULATOR_HOST";
pub const STORAGE_EMULATOR_ENV: &str = "FIREBASE_STORAGE_EMULATOR_HOST";

/// Token every Firebase emulator accepts as an administrator credential.
pub const EMULATOR_TOKEN: &str = "owner";

/// Base URL of one backend service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceEndpoint {
    pub base_url: String,
    /// True when the endpoint points at a local emulator.
    pub emulated: bool,
}

impl ServiceEndpoint {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            emulated: false,
        }
    }

    pub fn emulator(base_url: impl Into<String>) -> Self {
        Self {
            emulated: true,
            ..Self::new(base_url)
        }
    }
}

/// Endpoints for the three backend services.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    /// Identity Toolkit v1 root, e.g. `https://identitytoolkit.googleapis.com/v1`.
    pub auth: ServiceEndpoint,
    /// Firestore v1 root, e.g. `https://firestore.googleapis.com/v1`.
    pub firestore: ServiceEndpoint,
    /// Cloud Storage origin; `/storage/v1` and `/upload/storage/v1` hang off it.
    pub storage: ServiceEndpoint,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            auth: ServiceEndpoint::new("https://identitytoolkit.googleapis.com/v1"),
            firestore: ServiceEndpoint::new("https://firestore.googleapis.com/v1"),
            storage: ServiceEndpoint::new("https://storage.googleapis.com"),
        }
    }
}

impl Endpoints {
    /// Resolve endpoints from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Resolve endpoints with a custom variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut endpoints = Self::default();
        let host = |key: &str| lookup(key).filter(|h| !h.trim().is_empty());

        if let Some(h) = host(AUTH_EMULATOR_ENV) {
            endpoints.auth =
                ServiceEndpoint::emulator(format!("http://{}/identitytoolkit.googleapis.com/v1", h));
        }
        if let Some(h) = host(FIRESTORE_EMULATOR_ENV) {
            endpoints.firestore = ServiceEndpoint::emulator(format!("http://{}/v1", h));
        }
        if let Some(h) = host(STORAGE_EMULATOR_ENV) {
            endpoints.storage = ServiceEndpoint::emulator(format!("http://{}", h));
        }
        endpoints
    }

    /// Point every service at one local server. Used by tests and single-host emulators.
    pub fn local(base_url: &str) -> Self {
        let base = base_url.trim_end_matches('/');
        Self {
            auth: ServiceEndpoint::emulator(format!("{}/identitytoolkit.googleapis.com/v1", base)),
            firestore: ServiceEndpoint::emulator(format!("{}/v1", base)),
            storage: ServiceEndpoint::emulator(base),
        }
    }
}
