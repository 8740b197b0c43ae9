//! Authentication backend (Identity Toolkit v1).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use super::error::{BackendError, BackendResult};
use super::http::RestClient;
use crate::bulk::{Keyed, Page, PageSource};

/// A user account.
///
/// Deserializes from the Identity Toolkit wire format (`localId`,
/// `customAttributes` as a JSON string) and serializes to the friendlier
/// `uid`/`customClaims` shape used for output files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    #[serde(rename(deserialize = "localId", serialize = "uid"))]
    pub uid: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default)]
    pub email_verified: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,
    #[serde(default)]
    pub disabled: bool,
    #[serde(
        rename(deserialize = "customAttributes", serialize = "customClaims"),
        default,
        deserialize_with = "crate::serde_utils::json_in_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub custom_claims: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_login_at: Option<String>,
}

impl UserRecord {
    pub fn new(uid: impl Into<String>, email: Option<&str>) -> Self {
        Self {
            uid: uid.into(),
            email: email.map(str::to_string),
            email_verified: false,
            display_name: None,
            phone_number: None,
            photo_url: None,
            disabled: false,
            custom_claims: None,
            tenant_id: None,
            created_at: None,
            last_login_at: None,
        }
    }

    /// Email if set, uid otherwise.
    pub fn label(&self) -> &str {
        self.email.as_deref().unwrap_or(&self.uid)
    }
}

impl Keyed for UserRecord {
    fn key(&self) -> &str {
        &self.uid
    }

    fn email(&self) -> Option<&str> {
        self.email.as_deref()
    }
}

/// Fields of a new account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewUser {
    #[serde(rename = "localId", skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,
    pub email: String,
    pub password: String,
}

/// Partial account update. Only provided fields change.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserUpdate {
    pub email: Option<String>,
    pub password: Option<String>,
    pub custom_claims: Option<Value>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct UpdateRequest<'a> {
    local_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    email: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    password: Option<&'a str>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        serialize_with = "crate::serde_utils::to_json_string"
    )]
    custom_attributes: Option<Value>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ImportUser<'a> {
    local_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    email: Option<&'a str>,
    email_verified: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    display_name: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    phone_number: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    photo_url: Option<&'a str>,
    disabled: bool,
    #[serde(
        skip_serializing_if = "Option::is_none",
        serialize_with = "crate::serde_utils::to_json_string"
    )]
    custom_attributes: Option<Value>,
}

#[derive(Debug, Serialize)]
struct BatchCreateRequest<'a> {
    users: Vec<ImportUser<'a>>,
}

impl<'a> From<&'a UserRecord> for ImportUser<'a> {
    fn from(user: &'a UserRecord) -> Self {
        Self {
            local_id: &user.uid,
            email: user.email.as_deref(),
            email_verified: user.email_verified,
            display_name: user.display_name.as_deref(),
            phone_number: user.phone_number.as_deref(),
            photo_url: user.photo_url.as_deref(),
            disabled: user.disabled,
            custom_attributes: user.custom_claims.clone(),
        }
    }
}

/// Per-user failure of a batch import.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ImportFailure {
    #[serde(default)]
    pub index: usize,
    #[serde(default)]
    pub message: String,
}

/// Outcome of a batch import.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportResult {
    pub success_count: usize,
    pub errors: Vec<ImportFailure>,
}

/// Account operations of the authentication service.
#[async_trait]
pub trait AccountStore: Send + Sync {
    /// List one page of accounts.
    async fn list_users(
        &self,
        page_size: u32,
        page_token: Option<&str>,
    ) -> BackendResult<Page<UserRecord>>;

    /// Look an account up by uid.
    async fn get_user(&self, uid: &str) -> BackendResult<UserRecord>;

    /// Look an account up by email.
    async fn get_user_by_email(&self, email: &str) -> BackendResult<UserRecord>;

    /// Create an account and return its uid.
    async fn create_user(&self, user: &NewUser) -> BackendResult<String>;

    /// Apply a partial update to an account.
    async fn update_user(&self, uid: &str, update: &UserUpdate) -> BackendResult<()>;

    /// Delete an account.
    async fn delete_user(&self, uid: &str) -> BackendResult<()>;

    /// Copy existing account records in, keeping their uids.
    async fn import_users(&self, users: &[UserRecord]) -> BackendResult<ImportResult>;
}

/// Adapter draining accounts through the bulk enumerator.
pub struct AccountPages<'a, S: AccountStore + ?Sized>(pub &'a S);

#[async_trait]
impl<S: AccountStore + ?Sized> PageSource for AccountPages<'_, S> {
    type Item = UserRecord;

    async fn fetch_page(
        &self,
        page_size: u32,
        page_token: Option<&str>,
    ) -> BackendResult<Page<UserRecord>> {
        self.0.list_users(page_size, page_token).await
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListUsersResponse {
    #[serde(default)]
    users: Vec<UserRecord>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LookupResponse {
    #[serde(default)]
    users: Vec<UserRecord>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateResponse {
    local_id: String,
}

#[derive(Debug, Deserialize)]
struct BatchCreateResponse {
    #[serde(default)]
    error: Vec<ImportFailure>,
}

/// Identity Toolkit client, bound to a project and optionally a tenant.
#[derive(Debug, Clone)]
pub struct AuthClient {
    rest: RestClient,
    project: String,
    tenant: Option<String>,
}

impl AuthClient {
    pub fn new(rest: RestClient, project: impl Into<String>) -> Self {
        Self {
            rest,
            project: project.into(),
            tenant: None,
        }
    }

    /// A client scoped to `tenant`, or to the project when `None`.
    pub fn for_tenant(&self, tenant: Option<&str>) -> Self {
        Self {
            tenant: tenant.filter(|t| !t.is_empty()).map(str::to_string),
            ..self.clone()
        }
    }

    pub fn tenant(&self) -> Option<&str> {
        self.tenant.as_deref()
    }

    fn scope(&self) -> String {
        match &self.tenant {
            Some(t) => format!("/projects/{}/tenants/{}", self.project, t),
            None => format!("/projects/{}", self.project),
        }
    }

    async fn lookup(&self, body: Value, what: String) -> BackendResult<UserRecord> {
        let request = self
            .rest
            .post(&format!("{}/accounts:lookup", self.scope()))
            .await?
            .json(&body);
        let response = self.rest.send(request).await?;
        let lookup: LookupResponse = self.rest.handle_response(response).await?;
        lookup
            .users
            .into_iter()
            .next()
            .ok_or_else(|| BackendError::not_found(what))
    }
}

#[async_trait]
impl AccountStore for AuthClient {
    async fn list_users(
        &self,
        page_size: u32,
        page_token: Option<&str>,
    ) -> BackendResult<Page<UserRecord>> {
        let mut request = self
            .rest
            .get(&format!("{}/accounts:batchGet", self.scope()))
            .await?
            .query(&[("maxResults", page_size.to_string())]);
        if let Some(token) = page_token {
            request = request.query(&[("nextPageToken", token)]);
        }

        let response = self.rest.send(request).await?;
        let list: ListUsersResponse = self.rest.handle_response(response).await?;
        debug!(count = list.users.len(), "Listed users");
        Ok(Page {
            items: list.users,
            next_page_token: list.next_page_token,
        })
    }

    async fn get_user(&self, uid: &str) -> BackendResult<UserRecord> {
        self.lookup(
            serde_json::json!({ "localId": [uid] }),
            format!("user with id '{}'", uid),
        )
        .await
    }

    async fn get_user_by_email(&self, email: &str) -> BackendResult<UserRecord> {
        self.lookup(
            serde_json::json!({ "email": [email] }),
            format!("user with email '{}'", email),
        )
        .await
    }

    async fn create_user(&self, user: &NewUser) -> BackendResult<String> {
        let request = self
            .rest
            .post(&format!("{}/accounts", self.scope()))
            .await?
            .json(user);
        let response = self.rest.send(request).await?;
        let created: CreateResponse = self.rest.handle_response(response).await?;
        Ok(created.local_id)
    }

    async fn update_user(&self, uid: &str, update: &UserUpdate) -> BackendResult<()> {
        let body = UpdateRequest {
            local_id: uid,
            email: update.email.as_deref(),
            password: update.password.as_deref(),
            custom_attributes: update.custom_claims.clone(),
        };
        let request = self
            .rest
            .post(&format!("{}/accounts:update", self.scope()))
            .await?
            .json(&body);
        let response = self.rest.send(request).await?;
        self.rest.expect_success(response).await
    }

    async fn delete_user(&self, uid: &str) -> BackendResult<()> {
        debug!(uid, "Deleting user");
        let request = self
            .rest
            .post(&format!("{}/accounts:delete", self.scope()))
            .await?
            .json(&serde_json::json!({ "localId": uid }));
        let response = self.rest.send(request).await?;
        self.rest.expect_success(response).await
    }

    async fn import_users(&self, users: &[UserRecord]) -> BackendResult<ImportResult> {
        let body = BatchCreateRequest {
            users: users.iter().map(ImportUser::from).collect(),
        };
        let request = self
            .rest
            .post(&format!("{}/accounts:batchCreate", self.scope()))
            .await?
            .json(&body);
        let response = self.rest.send(request).await?;
        let result: BatchCreateResponse = self.rest.handle_response(response).await?;
        Ok(ImportResult {
            success_count: users.len().saturating_sub(result.error.len()),
            errors: result.error,
        })
    }
}

#[cfg(test)]
#[path = "auth_test.rs"]
mod auth_test;
