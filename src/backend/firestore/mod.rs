//! Document database backend (Firestore v1 REST).

pub mod value;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use tracing::{debug, warn};

use super::error::{BackendError, BackendResult};
use super::http::RestClient;
use crate::bulk::{ExportRow, FieldFilter, Keyed, OrderBy, Page, PageSource, Query, QueryTarget};
use value::{decode_fields, encode_fields, encode_value, field_path};

/// A document: its id, full slash path and decoded data.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub path: String,
    pub data: Map<String, Value>,
}

impl Document {
    /// Flatten into an export row with `id` first. A data field named `id`
    /// is dropped in favour of the document id.
    pub fn to_row(&self) -> ExportRow {
        let mut row = ExportRow::new();
        row.insert("id".to_string(), Value::String(self.id.clone()));
        for (k, v) in &self.data {
            if k == "id" {
                warn!(path = %self.path, "Data field `id` shadowed by the document id");
                continue;
            }
            row.insert(k.clone(), v.clone());
        }
        row
    }
}

impl Keyed for Document {
    fn key(&self) -> &str {
        &self.id
    }
}

/// Split a slash path into its non-empty segments.
pub fn path_segments(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

/// An even number of segments names a document, an odd number a collection.
pub fn is_document_path(path: &str) -> bool {
    let count = path_segments(path).len();
    count > 0 && count % 2 == 0
}

/// Document operations of the database.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// List one page of the documents directly under `collection`.
    async fn list_documents(
        &self,
        collection: &str,
        page_size: u32,
        page_token: Option<&str>,
    ) -> BackendResult<Page<Document>>;

    async fn get_document(&self, path: &str) -> BackendResult<Document>;

    /// Create a document with a generated id.
    async fn add_document(
        &self,
        collection: &str,
        data: &Map<String, Value>,
    ) -> BackendResult<Document>;

    /// Write a document at `path`. With `merge`, only the given top-level
    /// fields are replaced; otherwise the whole document is.
    async fn set_document(
        &self,
        path: &str,
        data: &Map<String, Value>,
        merge: bool,
    ) -> BackendResult<()>;

    async fn delete_document(&self, path: &str) -> BackendResult<()>;

    async fn run_query(&self, query: &Query) -> BackendResult<Vec<Document>>;
}

/// Adapter draining one collection through the bulk enumerator.
pub struct DocumentPages<'a, S: DocumentStore + ?Sized> {
    pub store: &'a S,
    pub collection: &'a str,
}

#[async_trait]
impl<S: DocumentStore + ?Sized> PageSource for DocumentPages<'_, S> {
    type Item = Document;

    async fn fetch_page(
        &self,
        page_size: u32,
        page_token: Option<&str>,
    ) -> BackendResult<Page<Document>> {
        self.store
            .list_documents(self.collection, page_size, page_token)
            .await
    }
}

#[derive(Debug, Deserialize)]
struct RawDocument {
    name: String,
    #[serde(default)]
    fields: Map<String, Value>,
}

impl RawDocument {
    fn into_document(self) -> BackendResult<Document> {
        let path = self
            .name
            .split_once("/documents/")
            .map(|(_, p)| p.to_string())
            .ok_or_else(|| BackendError::InvalidResponse {
                service: "Firestore",
                message: format!("unexpected document name '{}'", self.name),
            })?;
        let id = path.rsplit('/').next().unwrap_or_default().to_string();
        Ok(Document {
            id,
            path,
            data: decode_fields(&self.fields)?,
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListDocumentsResponse {
    #[serde(default)]
    documents: Vec<RawDocument>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct QueryResponseItem {
    #[serde(default)]
    document: Option<RawDocument>,
}

#[derive(Debug, Serialize)]
struct WriteBody<'a> {
    fields: &'a Map<String, Value>,
}

/// Render a query as a `runQuery` request body, returning the parent
/// document path (relative to the database root) alongside it.
pub fn structured_query(query: &Query) -> BackendResult<(String, Value)> {
    let (parent, from) = match &query.target {
        QueryTarget::Collection(path) => {
            let mut segments = path_segments(path);
            if segments.len() % 2 == 0 {
                return Err(BackendError::InvalidRequest {
                    message: format!("'{}' is not a collection path", path),
                });
            }
            let id = segments.pop().unwrap_or_default();
            (segments.join("/"), json!({ "collectionId": id }))
        }
        QueryTarget::CollectionGroup(id) => {
            (String::new(), json!({ "collectionId": id, "allDescendants": true }))
        }
    };

    let mut structured = Map::new();
    structured.insert("from".to_string(), json!([from]));

    let filters: Vec<Value> = query.filters.iter().map(field_filter).collect();
    match filters.len() {
        0 => {}
        1 => {
            structured.insert("where".to_string(), filters[0].clone());
        }
        _ => {
            structured.insert(
                "where".to_string(),
                json!({ "compositeFilter": { "op": "AND", "filters": filters } }),
            );
        }
    }

    if let Some(OrderBy { field, direction }) = &query.order_by {
        structured.insert(
            "orderBy".to_string(),
            json!([{ "field": { "fieldPath": field }, "direction": direction.as_str() }]),
        );
    }
    if let Some(limit) = query.limit {
        structured.insert("limit".to_string(), json!(limit));
    }

    Ok((parent, json!({ "structuredQuery": structured })))
}

fn field_filter(filter: &FieldFilter) -> Value {
    json!({
        "fieldFilter": {
            "field": { "fieldPath": filter.field },
            "op": filter.op.as_str(),
            "value": encode_value(&filter.value),
        }
    })
}

/// Firestore client for the default database of one project.
#[derive(Debug, Clone)]
pub struct FirestoreClient {
    rest: RestClient,
    project: String,
}

impl FirestoreClient {
    pub fn new(rest: RestClient, project: impl Into<String>) -> Self {
        Self {
            rest,
            project: project.into(),
        }
    }

    fn root(&self) -> String {
        format!("/projects/{}/databases/(default)/documents", self.project)
    }

    fn document_url(&self, path: &str) -> BackendResult<String> {
        self.rest.url_with_segments(&self.root(), path_segments(path))
    }
}

#[async_trait]
impl DocumentStore for FirestoreClient {
    async fn list_documents(
        &self,
        collection: &str,
        page_size: u32,
        page_token: Option<&str>,
    ) -> BackendResult<Page<Document>> {
        let url = self.document_url(collection)?;
        let mut request = self
            .rest
            .request(reqwest::Method::GET, &url)
            .await?
            .query(&[("pageSize", page_size.to_string())]);
        if let Some(token) = page_token {
            request = request.query(&[("pageToken", token)]);
        }

        let response = self.rest.send(request).await?;
        let list: ListDocumentsResponse = self.rest.handle_response(response).await?;
        debug!(collection, count = list.documents.len(), "Listed documents");
        Ok(Page {
            items: list
                .documents
                .into_iter()
                .map(RawDocument::into_document)
                .collect::<BackendResult<_>>()?,
            next_page_token: list.next_page_token,
        })
    }

    async fn get_document(&self, path: &str) -> BackendResult<Document> {
        let url = self.document_url(path)?;
        let request = self.rest.request(reqwest::Method::GET, &url).await?;
        let response = self.rest.send(request).await?;
        let raw: RawDocument = self.rest.handle_response(response).await?;
        raw.into_document()
    }

    async fn add_document(
        &self,
        collection: &str,
        data: &Map<String, Value>,
    ) -> BackendResult<Document> {
        let url = self.document_url(collection)?;
        let fields = encode_fields(data);
        let request = self
            .rest
            .request(reqwest::Method::POST, &url)
            .await?
            .json(&WriteBody { fields: &fields });
        let response = self.rest.send(request).await?;
        let raw: RawDocument = self.rest.handle_response(response).await?;
        raw.into_document()
    }

    async fn set_document(
        &self,
        path: &str,
        data: &Map<String, Value>,
        merge: bool,
    ) -> BackendResult<()> {
        let url = self.document_url(path)?;
        let fields = encode_fields(data);
        let mut request = self.rest.request(reqwest::Method::PATCH, &url).await?;
        if merge {
            let mask: Vec<(&str, String)> = data
                .keys()
                .map(|k| ("updateMask.fieldPaths", field_path(k)))
                .collect();
            request = request.query(&mask);
        }
        debug!(path, merge, "Writing document");
        let response = self
            .rest
            .send(request.json(&WriteBody { fields: &fields }))
            .await?;
        self.rest.expect_success(response).await
    }

    async fn delete_document(&self, path: &str) -> BackendResult<()> {
        debug!(path, "Deleting document");
        let url = self.document_url(path)?;
        let request = self.rest.request(reqwest::Method::DELETE, &url).await?;
        let response = self.rest.send(request).await?;
        self.rest.expect_success(response).await
    }

    async fn run_query(&self, query: &Query) -> BackendResult<Vec<Document>> {
        let (parent, body) = structured_query(query)?;
        let url = format!("{}:runQuery", self.document_url(&parent)?);
        let request = self
            .rest
            .request(reqwest::Method::POST, &url)
            .await?
            .json(&body);
        let response = self.rest.send(request).await?;
        let items: Vec<QueryResponseItem> = self.rest.handle_response(response).await?;
        items
            .into_iter()
            .filter_map(|item| item.document)
            .map(RawDocument::into_document)
            .collect()
    }
}
