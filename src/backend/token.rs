//! Locally minted custom sign-in tokens.
//!
//! A custom token is a JWT signed with the project's service-account key
//! that a client app exchanges for an ID token.

use chrono::Utc;
use serde::Serialize;
use serde_json::Value;

use super::credentials::ServiceAccountKey;
use super::error::{BackendError, BackendResult};

pub const CUSTOM_TOKEN_AUDIENCE: &str =
    "https://identitytoolkit.googleapis.com/google.identity.identitytoolkit.v1.IdentityToolkit";

const TOKEN_LIFETIME_SECS: i64 = 3600;
const MAX_UID_LEN: usize = 128;

/// Claim names the token format reserves for itself.
const RESERVED_CLAIMS: &[&str] = &[
    "acr", "amr", "at_hash", "aud", "auth_time", "azp", "cnf", "c_hash", "exp", "firebase",
    "iat", "iss", "jti", "nbf", "nonce", "sub",
];

#[derive(Debug, Serialize)]
struct CustomTokenClaims<'a> {
    iss: &'a str,
    sub: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
    uid: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    claims: Option<&'a Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tenant_id: Option<&'a str>,
}

fn invalid(message: impl Into<String>) -> BackendError {
    BackendError::InvalidRequest {
        message: message.into(),
    }
}

/// Mint a custom token for `uid`, optionally carrying developer claims and
/// bound to a tenant.
pub fn create_custom_token(
    key: Option<&ServiceAccountKey>,
    uid: &str,
    claims: Option<&Value>,
    tenant: Option<&str>,
) -> BackendResult<String> {
    let key = key.ok_or_else(|| {
        BackendError::credentials("custom tokens require a service account key")
    })?;

    if uid.is_empty() || uid.chars().count() > MAX_UID_LEN {
        return Err(invalid(format!(
            "uid must be a non-empty string of at most {} characters",
            MAX_UID_LEN
        )));
    }

    if let Some(claims) = claims {
        let Some(map) = claims.as_object() else {
            return Err(invalid("developer claims must be a JSON object"));
        };
        if let Some(reserved) = map.keys().find(|k| RESERVED_CLAIMS.contains(&k.as_str())) {
            return Err(invalid(format!("developer claim '{}' is reserved", reserved)));
        }
    }

    let now = Utc::now().timestamp();
    key.sign(&CustomTokenClaims {
        iss: &key.client_email,
        sub: &key.client_email,
        aud: CUSTOM_TOKEN_AUDIENCE,
        iat: now,
        exp: now + TOKEN_LIFETIME_SECS,
        uid,
        claims: claims.filter(|c| c.as_object().is_some_and(|m| !m.is_empty())),
        tenant_id: tenant.filter(|t| !t.is_empty()),
    })
}
