use reqwest::{Client, Method, RequestBuilder, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use std::sync::Arc;

use super::credentials::Credentials;
use super::endpoints::{EMULATOR_TOKEN, ServiceEndpoint};
use super::error::{BackendError, BackendResult};

/// Authenticated REST client bound to one backend service.
#[derive(Debug, Clone)]
pub struct RestClient {
    service: &'static str,
    base_url: String,
    client: Client,
    credentials: Arc<Credentials>,
}

impl RestClient {
    /// Create a client for `service` rooted at `endpoint`.
    ///
    /// Emulated endpoints always authenticate with the emulator owner token,
    /// whatever `credentials` were resolved for the project.
    pub fn new(
        service: &'static str,
        endpoint: &ServiceEndpoint,
        credentials: Arc<Credentials>,
    ) -> Self {
        let credentials = if endpoint.emulated {
            Arc::new(Credentials::fixed(EMULATOR_TOKEN))
        } else {
            credentials
        };
        Self {
            service,
            base_url: endpoint.base_url.clone(),
            client: Client::new(),
            credentials,
        }
    }

    /// Get the base URL being used
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Join a path onto the base URL.
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Join a path onto the base URL, then append `segments` percent-encoded.
    pub fn url_with_segments<'s>(
        &self,
        path: &str,
        segments: impl IntoIterator<Item = &'s str>,
    ) -> BackendResult<String> {
        let mut url = Url::parse(&self.url(path)).map_err(|e| BackendError::InvalidRequest {
            message: e.to_string(),
        })?;
        url.path_segments_mut()
            .map_err(|_| BackendError::InvalidRequest {
                message: format!("{} cannot take path segments", self.base_url),
            })?
            .extend(segments);
        Ok(url.to_string())
    }

    /// Create an authenticated request builder for an absolute URL.
    pub async fn request(&self, method: Method, url: &str) -> BackendResult<RequestBuilder> {
        let token = self.credentials.access_token().await?;
        Ok(self.client.request(method, url).bearer_auth(token))
    }

    /// Create a GET request builder
    pub async fn get(&self, path: &str) -> BackendResult<RequestBuilder> {
        self.request(Method::GET, &self.url(path)).await
    }

    /// Create a POST request builder
    pub async fn post(&self, path: &str) -> BackendResult<RequestBuilder> {
        self.request(Method::POST, &self.url(path)).await
    }

    /// Send a request, classifying transport failures.
    pub async fn send(&self, request: RequestBuilder) -> BackendResult<Response> {
        request
            .send()
            .await
            .map_err(|e| BackendError::transport(self.service, e))
    }

    /// Handle API response with standardized error handling
    ///
    /// Returns the deserialized response body on success,
    /// or a `BackendError` on non-success status codes.
    pub async fn handle_response<T: DeserializeOwned>(&self, response: Response) -> BackendResult<T> {
        let response = self.check_status(response).await?;
        response
            .json()
            .await
            .map_err(|e| BackendError::InvalidResponse {
                service: self.service,
                message: e.to_string(),
            })
    }

    /// Like `handle_response` but returns the raw body bytes.
    pub async fn handle_bytes(&self, response: Response) -> BackendResult<Vec<u8>> {
        let response = self.check_status(response).await?;
        response
            .bytes()
            .await
            .map(|b| b.to_vec())
            .map_err(|e| BackendError::transport(self.service, e))
    }

    /// Succeed on any 2xx status and discard the body.
    pub async fn expect_success(&self, response: Response) -> BackendResult<()> {
        self.check_status(response).await.map(|_| ())
    }

    async fn check_status(&self, response: Response) -> BackendResult<Response> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status();
        let url = response.url().path().to_string();
        let error_text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        if status == StatusCode::NOT_FOUND {
            return Err(BackendError::not_found(format!("{} ({})", url, error_text.trim())));
        }
        Err(BackendError::Http {
            service: self.service,
            status: status.as_u16(),
            message: error_text,
        })
    }
}
