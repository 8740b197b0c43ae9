//! Account identifier resolution.

use tracing::debug;

use super::error::BulkResult;
use crate::backend::{AccountStore, UserRecord};

/// A user-supplied account reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Identifier<'a> {
    Email(&'a str),
    Id(&'a str),
}

impl<'a> Identifier<'a> {
    /// Anything containing `@` is an email, everything else a uid.
    pub fn parse(raw: &'a str) -> Self {
        if raw.contains('@') {
            Identifier::Email(raw)
        } else {
            Identifier::Id(raw)
        }
    }
}

/// Look up the account `identifier` refers to with a single backend call.
pub async fn resolve<S: AccountStore + ?Sized>(
    store: &S,
    identifier: &str,
) -> BulkResult<UserRecord> {
    let user = match Identifier::parse(identifier) {
        Identifier::Email(email) => store.get_user_by_email(email).await?,
        Identifier::Id(uid) => store.get_user(uid).await?,
    };
    debug!(identifier, uid = %user.uid, "Resolved user");
    Ok(user)
}
