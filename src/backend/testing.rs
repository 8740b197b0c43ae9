//! In-memory stand-ins for the backend stores.
//!
//! Each fake keeps its records behind a mutex, pages with decimal offset
//! tokens, logs the calls it receives and can be told to fail for chosen
//! keys. Only available when compiled with `cfg(test)`.

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashSet};
use std::sync::Mutex;

use super::auth::{AccountStore, ImportFailure, ImportResult, NewUser, UserRecord, UserUpdate};
use super::error::{BackendError, BackendResult};
use super::firestore::{Document, DocumentStore, path_segments};
use super::storage::{ObjectInfo, ObjectStore};
use crate::bulk::{FilterOp, Page, Query, QueryTarget};

fn page_of<T: Clone>(items: &[T], page_size: u32, page_token: Option<&str>) -> Page<T> {
    let start: usize = page_token.and_then(|t| t.parse().ok()).unwrap_or(0);
    let end = (start + page_size as usize).min(items.len());
    Page {
        items: items[start.min(end)..end].to_vec(),
        next_page_token: (end < items.len()).then(|| end.to_string()),
    }
}

fn injected(key: &str) -> BackendError {
    BackendError::Http {
        service: "fake",
        status: 500,
        message: format!("injected failure for {}", key),
    }
}

/// Account store backed by a vector of users.
#[derive(Default)]
pub struct FakeAccounts {
    pub users: Mutex<Vec<UserRecord>>,
    pub fail_for: Mutex<HashSet<String>>,
    pub deleted: Mutex<Vec<String>>,
    pub updates: Mutex<Vec<(String, UserUpdate)>>,
    pub imported: Mutex<Vec<UserRecord>>,
    pub page_requests: Mutex<Vec<Option<String>>>,
}

impl FakeAccounts {
    pub fn with_users(users: Vec<UserRecord>) -> Self {
        Self {
            users: Mutex::new(users),
            ..Default::default()
        }
    }

    /// Make every mutation of `uid` fail.
    pub fn fail_for(self, uid: &str) -> Self {
        self.fail_for.lock().unwrap().insert(uid.to_string());
        self
    }

    fn check(&self, uid: &str) -> BackendResult<()> {
        if self.fail_for.lock().unwrap().contains(uid) {
            return Err(injected(uid));
        }
        Ok(())
    }

    pub fn deleted(&self) -> Vec<String> {
        self.deleted.lock().unwrap().clone()
    }
}

#[async_trait]
impl AccountStore for FakeAccounts {
    async fn list_users(
        &self,
        page_size: u32,
        page_token: Option<&str>,
    ) -> BackendResult<Page<UserRecord>> {
        self.page_requests
            .lock()
            .unwrap()
            .push(page_token.map(str::to_string));
        let users = self.users.lock().unwrap();
        Ok(page_of(users.as_slice(), page_size, page_token))
    }

    async fn get_user(&self, uid: &str) -> BackendResult<UserRecord> {
        self.users
            .lock()
            .unwrap()
            .iter()
            .find(|u| u.uid == uid)
            .cloned()
            .ok_or_else(|| BackendError::not_found(format!("user with id '{}'", uid)))
    }

    async fn get_user_by_email(&self, email: &str) -> BackendResult<UserRecord> {
        self.users
            .lock()
            .unwrap()
            .iter()
            .find(|u| u.email.as_deref() == Some(email))
            .cloned()
            .ok_or_else(|| BackendError::not_found(format!("user with email '{}'", email)))
    }

    async fn create_user(&self, user: &NewUser) -> BackendResult<String> {
        let mut users = self.users.lock().unwrap();
        let uid = user
            .uid
            .clone()
            .unwrap_or_else(|| format!("generated-{}", users.len() + 1));
        if users.iter().any(|u| u.uid == uid) {
            return Err(BackendError::Http {
                service: "fake",
                status: 400,
                message: "DUPLICATE_LOCAL_ID".to_string(),
            });
        }
        users.push(UserRecord::new(&uid, Some(user.email.as_str())));
        Ok(uid)
    }

    async fn update_user(&self, uid: &str, update: &UserUpdate) -> BackendResult<()> {
        self.check(uid)?;
        let mut users = self.users.lock().unwrap();
        let user = users
            .iter_mut()
            .find(|u| u.uid == uid)
            .ok_or_else(|| BackendError::not_found(format!("user with id '{}'", uid)))?;
        if let Some(email) = &update.email {
            user.email = Some(email.clone());
        }
        if let Some(claims) = &update.custom_claims {
            user.custom_claims = Some(claims.clone());
        }
        self.updates
            .lock()
            .unwrap()
            .push((uid.to_string(), update.clone()));
        Ok(())
    }

    async fn delete_user(&self, uid: &str) -> BackendResult<()> {
        self.check(uid)?;
        self.users.lock().unwrap().retain(|u| u.uid != uid);
        self.deleted.lock().unwrap().push(uid.to_string());
        Ok(())
    }

    async fn import_users(&self, users: &[UserRecord]) -> BackendResult<ImportResult> {
        let mut errors = Vec::new();
        for (index, user) in users.iter().enumerate() {
            if self.fail_for.lock().unwrap().contains(&user.uid) {
                errors.push(ImportFailure {
                    index,
                    message: "injected failure".to_string(),
                });
            } else {
                self.imported.lock().unwrap().push(user.clone());
            }
        }
        Ok(ImportResult {
            success_count: users.len() - errors.len(),
            errors,
        })
    }
}

/// Document store keyed by full document path.
#[derive(Default)]
pub struct FakeDocuments {
    pub docs: Mutex<BTreeMap<String, Map<String, Value>>>,
    pub fail_for: Mutex<HashSet<String>>,
    pub writes: Mutex<Vec<(String, Map<String, Value>, bool)>>,
    pub deleted: Mutex<Vec<String>>,
    pub queries: Mutex<Vec<Query>>,
    next_id: Mutex<usize>,
}

impl FakeDocuments {
    pub fn insert(&self, path: &str, data: Value) {
        let Value::Object(map) = data else {
            panic!("document data must be an object");
        };
        self.docs.lock().unwrap().insert(path.to_string(), map);
    }

    /// Make every mutation of the document with this path fail.
    pub fn fail_for(self, path: &str) -> Self {
        self.fail_for.lock().unwrap().insert(path.to_string());
        self
    }

    pub fn get(&self, path: &str) -> Option<Map<String, Value>> {
        self.docs.lock().unwrap().get(path).cloned()
    }

    fn check(&self, path: &str) -> BackendResult<()> {
        if self.fail_for.lock().unwrap().contains(path) {
            return Err(injected(path));
        }
        Ok(())
    }

    fn document(path: &str, data: &Map<String, Value>) -> Document {
        Document {
            id: path.rsplit('/').next().unwrap_or_default().to_string(),
            path: path.to_string(),
            data: data.clone(),
        }
    }

    fn in_collection(&self, collection: &str) -> Vec<Document> {
        let parent = path_segments(collection).join("/");
        self.docs
            .lock()
            .unwrap()
            .iter()
            .filter(|(path, _)| path.rsplit_once('/').is_some_and(|(p, _)| p == parent))
            .map(|(path, data)| Self::document(path, data))
            .collect()
    }

    fn in_group(&self, id: &str) -> Vec<Document> {
        self.docs
            .lock()
            .unwrap()
            .iter()
            .filter(|(path, _)| {
                let segments = path_segments(path);
                segments.len() >= 2 && segments[segments.len() - 2] == id
            })
            .map(|(path, data)| Self::document(path, data))
            .collect()
    }
}

#[async_trait]
impl DocumentStore for FakeDocuments {
    async fn list_documents(
        &self,
        collection: &str,
        page_size: u32,
        page_token: Option<&str>,
    ) -> BackendResult<Page<Document>> {
        Ok(page_of(&self.in_collection(collection), page_size, page_token))
    }

    async fn get_document(&self, path: &str) -> BackendResult<Document> {
        self.docs
            .lock()
            .unwrap()
            .get(path)
            .map(|data| Self::document(path, data))
            .ok_or_else(|| BackendError::not_found(format!("document '{}'", path)))
    }

    async fn add_document(
        &self,
        collection: &str,
        data: &Map<String, Value>,
    ) -> BackendResult<Document> {
        let id = {
            let mut next = self.next_id.lock().unwrap();
            *next += 1;
            format!("auto{}", next)
        };
        let path = format!("{}/{}", path_segments(collection).join("/"), id);
        self.check(&path)?;
        self.docs.lock().unwrap().insert(path.clone(), data.clone());
        Ok(Self::document(&path, data))
    }

    async fn set_document(
        &self,
        path: &str,
        data: &Map<String, Value>,
        merge: bool,
    ) -> BackendResult<()> {
        self.check(path)?;
        let mut docs = self.docs.lock().unwrap();
        let entry = docs.entry(path.to_string()).or_default();
        if !merge {
            entry.clear();
        }
        for (k, v) in data {
            entry.insert(k.clone(), v.clone());
        }
        self.writes
            .lock()
            .unwrap()
            .push((path.to_string(), data.clone(), merge));
        Ok(())
    }

    async fn delete_document(&self, path: &str) -> BackendResult<()> {
        self.check(path)?;
        self.docs.lock().unwrap().remove(path);
        self.deleted.lock().unwrap().push(path.to_string());
        Ok(())
    }

    /// Evaluates equality filters and the limit; other operators only
    /// get recorded.
    async fn run_query(&self, query: &Query) -> BackendResult<Vec<Document>> {
        self.queries.lock().unwrap().push(query.clone());
        let candidates = match &query.target {
            QueryTarget::Collection(path) => self.in_collection(path),
            QueryTarget::CollectionGroup(id) => self.in_group(id),
        };
        let mut matched: Vec<Document> = candidates
            .into_iter()
            .filter(|doc| {
                query
                    .filters
                    .iter()
                    .filter(|f| f.op == FilterOp::Equal)
                    .all(|f| doc.data.get(&f.field) == Some(&f.value))
            })
            .collect();
        if let Some(limit) = query.limit {
            matched.truncate(limit as usize);
        }
        Ok(matched)
    }
}

/// Object store keyed by `(bucket, key)`.
#[derive(Default)]
pub struct FakeObjects {
    pub objects: Mutex<BTreeMap<(String, String), (Vec<u8>, Option<String>)>>,
    pub fail_for: Mutex<HashSet<String>>,
    pub downloads: Mutex<Vec<String>>,
}

impl FakeObjects {
    pub fn insert(&self, bucket: &str, key: &str, bytes: &[u8]) {
        self.objects
            .lock()
            .unwrap()
            .insert((bucket.to_string(), key.to_string()), (bytes.to_vec(), None));
    }

    /// Make every transfer of `key` fail.
    pub fn fail_for(self, key: &str) -> Self {
        self.fail_for.lock().unwrap().insert(key.to_string());
        self
    }

    pub fn get(&self, bucket: &str, key: &str) -> Option<(Vec<u8>, Option<String>)> {
        self.objects
            .lock()
            .unwrap()
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
    }

    pub fn keys(&self, bucket: &str) -> Vec<String> {
        self.objects
            .lock()
            .unwrap()
            .keys()
            .filter(|(b, _)| b == bucket)
            .map(|(_, k)| k.clone())
            .collect()
    }

    fn check(&self, key: &str) -> BackendResult<()> {
        if self.fail_for.lock().unwrap().contains(key) {
            return Err(injected(key));
        }
        Ok(())
    }
}

#[async_trait]
impl ObjectStore for FakeObjects {
    async fn list_objects(
        &self,
        bucket: &str,
        prefix: Option<&str>,
        page_size: u32,
        page_token: Option<&str>,
    ) -> BackendResult<Page<ObjectInfo>> {
        let listing: Vec<ObjectInfo> = self
            .objects
            .lock()
            .unwrap()
            .iter()
            .filter(|((b, k), _)| b == bucket && k.starts_with(prefix.unwrap_or_default()))
            .map(|((_, k), (bytes, content_type))| ObjectInfo {
                name: k.clone(),
                content_type: content_type.clone(),
                size: bytes.len() as u64,
            })
            .collect();
        Ok(page_of(&listing, page_size, page_token))
    }

    async fn download(&self, bucket: &str, key: &str) -> BackendResult<Vec<u8>> {
        self.check(key)?;
        self.downloads.lock().unwrap().push(key.to_string());
        self.get(bucket, key)
            .map(|(bytes, _)| bytes)
            .ok_or_else(|| BackendError::not_found(format!("object '{}'", key)))
    }

    async fn upload(
        &self,
        bucket: &str,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> BackendResult<()> {
        self.check(key)?;
        self.objects.lock().unwrap().insert(
            (bucket.to_string(), key.to_string()),
            (bytes, Some(content_type.to_string())),
        );
        Ok(())
    }
}
