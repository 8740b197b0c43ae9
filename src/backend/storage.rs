//! Object storage backend (Cloud Storage JSON API).

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use super::error::BackendResult;
use super::http::RestClient;
use crate::bulk::{Page, PageSource};

/// Content type the console gives zero-byte "folder" objects.
pub const FOLDER_PLACEHOLDER_TYPE: &str = "application/x-www-form-urlencoded;charset=UTF-8";

/// Bucket every project gets by default.
pub fn default_bucket(project: &str) -> String {
    format!("{}.appspot.com", project)
}

/// Listing entry for one object.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectInfo {
    pub name: String,
    #[serde(default)]
    pub content_type: Option<String>,
    #[serde(default, deserialize_with = "size_from_string")]
    pub size: u64,
}

impl ObjectInfo {
    pub fn new(name: impl Into<String>, size: u64) -> Self {
        Self {
            name: name.into(),
            content_type: None,
            size,
        }
    }

    /// Keys ending in `/` name a directory and cannot be written as files.
    pub fn is_directory_key(&self) -> bool {
        self.name.ends_with('/')
    }

    /// An empty-folder marker as created by the console: a directory key
    /// carrying the placeholder content type.
    pub fn is_folder_placeholder(&self) -> bool {
        self.is_directory_key() && self.content_type.as_deref() == Some(FOLDER_PLACEHOLDER_TYPE)
    }
}

// The JSON API reports sizes as decimal strings.
fn size_from_string<'de, D>(de: D) -> Result<u64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Size {
        Text(String),
        Number(u64),
    }

    match Option::<Size>::deserialize(de)? {
        None => Ok(0),
        Some(Size::Number(n)) => Ok(n),
        Some(Size::Text(s)) => s.parse().map_err(serde::de::Error::custom),
    }
}

/// Bucket operations of the object store.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// List one page of objects whose key starts with `prefix`.
    async fn list_objects(
        &self,
        bucket: &str,
        prefix: Option<&str>,
        page_size: u32,
        page_token: Option<&str>,
    ) -> BackendResult<Page<ObjectInfo>>;

    async fn download(&self, bucket: &str, key: &str) -> BackendResult<Vec<u8>>;

    async fn upload(
        &self,
        bucket: &str,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> BackendResult<()>;
}

/// Adapter draining a bucket listing through the bulk enumerator.
pub struct ObjectPages<'a, S: ObjectStore + ?Sized> {
    pub store: &'a S,
    pub bucket: &'a str,
    pub prefix: Option<&'a str>,
}

#[async_trait]
impl<S: ObjectStore + ?Sized> PageSource for ObjectPages<'_, S> {
    type Item = ObjectInfo;

    async fn fetch_page(
        &self,
        page_size: u32,
        page_token: Option<&str>,
    ) -> BackendResult<Page<ObjectInfo>> {
        self.store
            .list_objects(self.bucket, self.prefix, page_size, page_token)
            .await
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListObjectsResponse {
    #[serde(default)]
    items: Vec<ObjectInfo>,
    #[serde(default)]
    next_page_token: Option<String>,
}

/// Cloud Storage client.
#[derive(Debug, Clone)]
pub struct StorageClient {
    rest: RestClient,
}

impl StorageClient {
    pub fn new(rest: RestClient) -> Self {
        Self { rest }
    }
}

#[async_trait]
impl ObjectStore for StorageClient {
    async fn list_objects(
        &self,
        bucket: &str,
        prefix: Option<&str>,
        page_size: u32,
        page_token: Option<&str>,
    ) -> BackendResult<Page<ObjectInfo>> {
        let url = self
            .rest
            .url_with_segments("/storage/v1/b", [bucket, "o"])?;
        let mut request = self
            .rest
            .request(reqwest::Method::GET, &url)
            .await?
            .query(&[("maxResults", page_size.to_string())]);
        if let Some(p) = prefix.filter(|p| !p.is_empty()) {
            request = request.query(&[("prefix", p)]);
        }
        if let Some(token) = page_token {
            request = request.query(&[("pageToken", token)]);
        }

        let response = self.rest.send(request).await?;
        let list: ListObjectsResponse = self.rest.handle_response(response).await?;
        debug!(bucket, count = list.items.len(), "Listed objects");
        Ok(Page {
            items: list.items,
            next_page_token: list.next_page_token,
        })
    }

    async fn download(&self, bucket: &str, key: &str) -> BackendResult<Vec<u8>> {
        let url = self
            .rest
            .url_with_segments("/storage/v1/b", [bucket, "o", key])?;
        let request = self
            .rest
            .request(reqwest::Method::GET, &url)
            .await?
            .query(&[("alt", "media")]);
        let response = self.rest.send(request).await?;
        self.rest.handle_bytes(response).await
    }

    async fn upload(
        &self,
        bucket: &str,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> BackendResult<()> {
        debug!(bucket, key, size = bytes.len(), "Uploading object");
        let url = self
            .rest
            .url_with_segments("/upload/storage/v1/b", [bucket, "o"])?;
        let request = self
            .rest
            .request(reqwest::Method::POST, &url)
            .await?
            .query(&[("uploadType", "media"), ("name", key)])
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(bytes);
        let response = self.rest.send(request).await?;
        self.rest.expect_success(response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::BackendError;
    use crate::backend::test_server::{local_backend, spawn_test_server};
    use crate::bulk::enumerate_all;
    use axum::Router;
    use axum::body::Bytes;
    use axum::extract::{RawQuery, State};
    use axum::http::{HeaderMap, StatusCode, Uri};
    use axum::response::{IntoResponse, Response};
    use serde_json::json;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct FakeGcs {
        uploads: Mutex<Vec<(String, String, Vec<u8>)>>,
        listings: Mutex<Vec<String>>,
    }

    async fn handle(
        State(fake): State<Arc<FakeGcs>>,
        uri: Uri,
        RawQuery(query): RawQuery,
        headers: HeaderMap,
        body: Bytes,
    ) -> Response {
        let query = query.unwrap_or_default();
        match uri.path() {
            "/storage/v1/b/demo.appspot.com/o" => {
                fake.listings.lock().unwrap().push(query.clone());
                if query.contains("pageToken=next") {
                    axum::Json(json!({ "items": [{ "name": "docs/sub/b.txt", "size": "3" }] }))
                        .into_response()
                } else {
                    axum::Json(json!({
                        "items": [
                            { "name": "docs/", "size": "0" },
                            { "name": "docs/a.txt", "size": "5", "contentType": "text/plain" }
                        ],
                        "nextPageToken": "next"
                    }))
                    .into_response()
                }
            }
            "/storage/v1/b/demo.appspot.com/o/docs%2Fa.txt" if query == "alt=media" => {
                "hello".into_response()
            }
            "/upload/storage/v1/b/demo.appspot.com/o" => {
                let name = query
                    .split('&')
                    .find_map(|kv| kv.strip_prefix("name="))
                    .unwrap_or_default()
                    .to_string();
                let content_type = headers
                    .get("content-type")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or_default()
                    .to_string();
                fake.uploads
                    .lock()
                    .unwrap()
                    .push((name, content_type, body.to_vec()));
                axum::Json(json!({})).into_response()
            }
            _ => (StatusCode::NOT_FOUND, "No such object").into_response(),
        }
    }

    async fn setup() -> (StorageClient, Arc<FakeGcs>, tokio::task::JoinHandle<()>) {
        let fake = Arc::new(FakeGcs::default());
        let app = Router::new().fallback(handle).with_state(fake.clone());
        let (url, handle) = spawn_test_server(app).await;
        let (endpoints, credentials) = local_backend(&url);
        let rest = RestClient::new("Cloud Storage", &endpoints.storage, credentials);
        (StorageClient::new(rest), fake, handle)
    }

    #[test]
    fn test_default_bucket() {
        assert_eq!(default_bucket("demo"), "demo.appspot.com");
    }

    #[test]
    fn test_folder_placeholder_detection() {
        let mut marker = ObjectInfo::new("docs/", 0);
        marker.content_type = Some(FOLDER_PLACEHOLDER_TYPE.to_string());
        assert!(marker.is_folder_placeholder());

        let untyped = ObjectInfo::new("docs/", 0);
        assert!(untyped.is_directory_key());
        assert!(!untyped.is_folder_placeholder());

        let mut empty_form = ObjectInfo::new("forms/empty.txt", 0);
        empty_form.content_type = Some(FOLDER_PLACEHOLDER_TYPE.to_string());
        assert!(!empty_form.is_directory_key());
        assert!(!empty_form.is_folder_placeholder());

        assert!(!ObjectInfo::new("docs/a.txt", 5).is_directory_key());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_list_objects_follows_page_tokens() {
        let (client, fake, _handle) = setup().await;
        let pages = ObjectPages {
            store: &client,
            bucket: "demo.appspot.com",
            prefix: Some("docs"),
        };

        let objects = enumerate_all(&pages, 2).await.unwrap();

        let names: Vec<&str> = objects.iter().map(|o| o.name.as_str()).collect();
        assert_eq!(names, vec!["docs/", "docs/a.txt", "docs/sub/b.txt"]);
        assert_eq!(objects[1].size, 5);
        assert_eq!(objects[1].content_type.as_deref(), Some("text/plain"));
        let listings = fake.listings.lock().unwrap();
        assert_eq!(listings.len(), 2);
        assert!(listings[0].contains("prefix=docs"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_download_encodes_key_as_one_segment() {
        let (client, _fake, _handle) = setup().await;
        let bytes = client.download("demo.appspot.com", "docs/a.txt").await.unwrap();
        assert_eq!(bytes, b"hello");

        let err = client
            .download("demo.appspot.com", "docs/missing.txt")
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::NotFound { .. }));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_upload_sends_media_with_content_type() {
        let (client, fake, _handle) = setup().await;
        client
            .upload("demo.appspot.com", "img.png", vec![1, 2, 3], "image/png")
            .await
            .unwrap();

        let uploads = fake.uploads.lock().unwrap();
        assert_eq!(uploads[0].0, "img.png");
        assert_eq!(uploads[0].1, "image/png");
        assert_eq!(uploads[0].2, vec![1, 2, 3]);
    }
}
