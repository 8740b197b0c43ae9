//! REST clients for the authentication, document and storage services.

pub mod auth;
pub mod credentials;
pub mod endpoints;
pub mod error;
pub mod firestore;
pub mod gcloud;
pub mod http;
pub mod storage;
pub mod token;

#[cfg(test)]
pub mod testing;

#[cfg(test)]
pub(crate) mod test_server;

use std::sync::Arc;

pub use auth::{AccountPages, AccountStore, AuthClient, NewUser, UserRecord, UserUpdate};
pub use credentials::Credentials;
pub use endpoints::Endpoints;
pub use error::{BackendError, BackendResult};
pub use firestore::{Document, DocumentPages, DocumentStore, FirestoreClient};
pub use storage::{ObjectInfo, ObjectPages, ObjectStore, StorageClient};

/// Clients for every service of one project, sharing one set of credentials.
#[derive(Debug, Clone)]
pub struct Backend {
    pub project: String,
    pub credentials: Arc<Credentials>,
    pub auth: AuthClient,
    pub firestore: FirestoreClient,
    pub storage: StorageClient,
}

impl Backend {
    pub fn connect(project: &str, credentials: Arc<Credentials>, endpoints: &Endpoints) -> Self {
        let rest = |service: &'static str, endpoint: &endpoints::ServiceEndpoint| {
            http::RestClient::new(service, endpoint, credentials.clone())
        };
        Self {
            project: project.to_string(),
            auth: AuthClient::new(rest("Identity Toolkit", &endpoints.auth), project),
            firestore: FirestoreClient::new(rest("Firestore", &endpoints.firestore), project),
            storage: StorageClient::new(rest("Cloud Storage", &endpoints.storage)),
            credentials,
        }
    }

    /// The project's default storage bucket.
    pub fn default_bucket(&self) -> String {
        storage::default_bucket(&self.project)
    }
}
