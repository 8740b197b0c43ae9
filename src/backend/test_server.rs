//! Local HTTP server for exercising REST clients in tests.

use axum::Router;
use std::sync::Arc;
use tokio::net::TcpListener;

use super::credentials::Credentials;
use super::endpoints::Endpoints;

pub fn init_crypto() {
    let _ = rustls::crypto::ring::default_provider().install_default();
}

/// Spawn `app` on an ephemeral port and return its base URL.
pub async fn spawn_test_server(app: Router) -> (String, tokio::task::JoinHandle<()>) {
    init_crypto();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let url = format!("http://{}", addr);

    let handle = tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (url, handle)
}

/// Endpoints and credentials pointing every service at `url`.
pub fn local_backend(url: &str) -> (Endpoints, Arc<Credentials>) {
    (Endpoints::local(url), Arc::new(Credentials::fixed("unused")))
}
