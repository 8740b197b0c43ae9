use serde_json::Value;
use std::path::Path;
use tabled::{Table, Tabled};

use crate::backend::auth::ImportResult;
use crate::backend::credentials::ServiceAccountKey;
use crate::backend::token::create_custom_token as mint_custom_token;
use crate::backend::{AccountPages, AccountStore, NewUser, UserRecord, UserUpdate};
use crate::bulk::{BULK_PAGE_SIZE, BatchPolicy, ExclusionList, apply_to_all, enumerate_all, resolve};
use crate::cli::error::{CliError, CliResult};
use crate::cli::output::success;
use crate::cli::utils::{apply_table_style, format_kv_table, parse_custom_claims, write_output};

#[derive(Tabled)]
struct UserDisplay {
    #[tabled(rename = "UID")]
    uid: String,
    #[tabled(rename = "Email")]
    email: String,
}

impl From<&UserRecord> for UserDisplay {
    fn from(user: &UserRecord) -> Self {
        Self {
            uid: user.uid.clone(),
            email: user.email.clone().unwrap_or_else(|| "-".to_string()),
        }
    }
}

/// Create an account, then attach custom claims when given.
pub async fn create_user<S: AccountStore + ?Sized>(
    store: &S,
    email: &str,
    password: &str,
    uid: Option<&str>,
    custom_claims: Option<&str>,
) -> CliResult<String> {
    let claims = custom_claims.map(parse_custom_claims).transpose()?;

    let uid = store
        .create_user(&NewUser {
            uid: uid.filter(|u| !u.is_empty()).map(str::to_string),
            email: email.to_string(),
            password: password.to_string(),
        })
        .await?;

    if let Some(claims) = claims {
        store
            .update_user(
                &uid,
                &UserUpdate {
                    custom_claims: Some(claims),
                    ..Default::default()
                },
            )
            .await?;
    }

    Ok(success(&format!("User {} created with uid {}.", email, uid)))
}

/// Replace the custom claims of an account.
pub async fn update_claims<S: AccountStore + ?Sized>(
    store: &S,
    identifier: &str,
    custom_claims: &str,
) -> CliResult<String> {
    let claims = parse_custom_claims(custom_claims)?;
    let user = resolve(store, identifier).await?;
    store
        .update_user(
            &user.uid,
            &UserUpdate {
                custom_claims: Some(claims),
                ..Default::default()
            },
        )
        .await?;
    Ok(success(&format!("Custom claims of {} updated.", user.label())))
}

pub async fn change_password<S: AccountStore + ?Sized>(
    store: &S,
    identifier: &str,
    password: &str,
) -> CliResult<String> {
    let user = resolve(store, identifier).await?;
    store
        .update_user(
            &user.uid,
            &UserUpdate {
                password: Some(password.to_string()),
                ..Default::default()
            },
        )
        .await?;
    Ok(success(&format!("Password of {} changed.", user.label())))
}

pub async fn change_email<S: AccountStore + ?Sized>(
    store: &S,
    identifier: &str,
    email: &str,
) -> CliResult<String> {
    let user = resolve(store, identifier).await?;
    store
        .update_user(
            &user.uid,
            &UserUpdate {
                email: Some(email.to_string()),
                ..Default::default()
            },
        )
        .await?;
    Ok(success(&format!("Email of {} changed to {}.", user.uid, email)))
}

/// Delete one account after `confirm` approves it.
pub async fn remove_user<S, C>(store: &S, identifier: &str, confirm: C) -> CliResult<String>
where
    S: AccountStore + ?Sized,
    C: FnOnce(&UserRecord) -> CliResult<bool>,
{
    let user = resolve(store, identifier).await?;
    if !confirm(&user)? {
        return Err(CliError::Aborted);
    }
    store.delete_user(&user.uid).await?;
    Ok(success(&format!("User {} removed.", user.label())))
}

/// Delete every account not named in `excluded`.
pub async fn remove_users<S: AccountStore + ?Sized>(
    store: &S,
    excluded: Option<&str>,
    policy: BatchPolicy,
) -> CliResult<String> {
    let exclusions = ExclusionList::parse(excluded);
    let users = enumerate_all(&AccountPages(store), BULK_PAGE_SIZE).await?;

    let report = apply_to_all(&users, &exclusions, policy, |user| {
        store.delete_user(&user.uid)
    })
    .await?;

    if !report.is_success() {
        return Err(CliError::BatchFailed {
            what: "user removals",
            failed: report.failures.len(),
            attempted: report.processed + report.failures.len(),
        });
    }

    Ok(success(&format!(
        "Removed {} users ({} excluded).",
        report.processed, report.skipped
    )))
}

/// Show one page of accounts, or write it to `output` as JSON.
pub async fn list_users<S: AccountStore + ?Sized>(
    store: &S,
    page_size: u32,
    page_token: Option<&str>,
    output: Option<&Path>,
) -> CliResult<String> {
    if page_size == 0 || page_size > BULK_PAGE_SIZE {
        return Err(CliError::invalid(format!(
            "Page size must be between 1 and {}",
            BULK_PAGE_SIZE
        )));
    }
    let page = store
        .list_users(page_size, page_token.filter(|t| !t.is_empty()))
        .await?;

    let mut out = match output {
        Some(path) => {
            write_output(path, serde_json::to_string_pretty(&page.items)?.as_bytes())?;
            success(&format!(
                "Saved {} users to {}.",
                page.items.len(),
                path.display()
            ))
        }
        None if page.items.is_empty() => "No users found.".to_string(),
        None => {
            let rows: Vec<UserDisplay> = page.items.iter().map(UserDisplay::from).collect();
            let mut table = Table::new(rows);
            apply_table_style(&mut table);
            table.to_string()
        }
    };

    if let Some(token) = page.continuation() {
        out.push_str(&format!("\nNext page token: {}", token));
    }
    Ok(out)
}

/// Show one account, or write it to `output` as JSON.
pub async fn get_user<S: AccountStore + ?Sized>(
    store: &S,
    identifier: &str,
    output: Option<&Path>,
) -> CliResult<String> {
    let user = resolve(store, identifier).await?;
    let value = serde_json::to_value(&user)?;

    match (output, value) {
        (Some(path), value) => {
            write_output(path, serde_json::to_string_pretty(&value)?.as_bytes())?;
            Ok(success(&format!("Saved user {} to {}.", user.uid, path.display())))
        }
        (None, Value::Object(map)) => Ok(format_kv_table(&map)),
        (None, other) => Ok(other.to_string()),
    }
}

/// Mint a custom token; the bare token is the output so it can be piped.
pub fn create_custom_token(
    key: Option<&ServiceAccountKey>,
    uid: &str,
    custom_claims: Option<&str>,
    tenant: Option<&str>,
) -> CliResult<String> {
    let claims = custom_claims.map(parse_custom_claims).transpose()?;
    Ok(mint_custom_token(key, uid, claims.as_ref(), tenant)?)
}

/// Copy an account from the project into a tenant, keeping its uid.
pub async fn add_tenant<S, T>(
    store: &S,
    tenant_store: &T,
    identifier: &str,
    tenant: &str,
) -> CliResult<String>
where
    S: AccountStore + ?Sized,
    T: AccountStore + ?Sized,
{
    if tenant.trim().is_empty() {
        return Err(CliError::invalid("Tenant id must not be empty"));
    }
    let mut user = resolve(store, identifier).await?;
    user.tenant_id = Some(tenant.to_string());

    let ImportResult { errors, .. } = tenant_store.import_users(std::slice::from_ref(&user)).await?;
    if let Some(failure) = errors.first() {
        return Err(CliError::invalid(format!(
            "Failed to add {} to tenant {}: {}",
            user.label(),
            tenant,
            failure.message
        )));
    }
    Ok(success(&format!("User {} added to tenant {}.", user.label(), tenant)))
}
