//! Recursive transfer between a local directory tree and a flat object
//! key namespace.
//!
//! A key is the file's path relative to the tree root with segments joined
//! by `/`. Transfers run one file at a time and stop at the first failure.

use std::path::{Component, Path, PathBuf};
use tracing::{debug, info, instrument, warn};

use super::error::{BulkError, BulkResult};
use super::paginate::{BULK_PAGE_SIZE, enumerate_all};
use crate::backend::{ObjectPages, ObjectStore};

/// Totals of a finished tree transfer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransferSummary {
    /// Files written or uploaded.
    pub transferred: usize,
    /// Directory keys passed over.
    pub skipped: usize,
    pub bytes: u64,
}

/// Map a remote key to a path under `root`.
///
/// Keys that would land outside `root` are refused.
pub fn local_path_for_key(root: &Path, key: &str) -> BulkResult<PathBuf> {
    if key.starts_with('/') || key.starts_with('\\') {
        return Err(BulkError::invalid(format!("refusing absolute object key '{}'", key)));
    }
    let mut path = root.to_path_buf();
    for segment in key.split('/').filter(|s| !s.is_empty()) {
        let mut components = Path::new(segment).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(part)), None) => path.push(part),
            _ => {
                return Err(BulkError::invalid(format!(
                    "object key '{}' escapes the destination directory",
                    key
                )));
            }
        }
    }
    Ok(path)
}

/// Map a local file under `root` to its remote key.
pub fn key_for_path(root: &Path, path: &Path) -> BulkResult<String> {
    let outside = || {
        BulkError::invalid(format!(
            "{} is not inside {}",
            path.display(),
            root.display()
        ))
    };
    let relative = path.strip_prefix(root).map_err(|_| outside())?;

    let mut segments = Vec::new();
    for component in relative.components() {
        match component {
            Component::Normal(part) => segments.push(part.to_string_lossy().replace('\\', "/")),
            Component::CurDir => {}
            _ => return Err(outside()),
        }
    }
    if segments.is_empty() {
        return Err(BulkError::invalid(format!("{} has no file name", path.display())));
    }
    Ok(segments.join("/"))
}

/// Download every object under `prefix` into `destination`, mirroring keys
/// as relative paths.
#[instrument(skip(store, destination), fields(destination = %destination.display()))]
pub async fn export_tree<S: ObjectStore + ?Sized>(
    store: &S,
    bucket: &str,
    prefix: Option<&str>,
    destination: &Path,
) -> BulkResult<TransferSummary> {
    let pages = ObjectPages {
        store,
        bucket,
        prefix,
    };
    let objects = enumerate_all(&pages, BULK_PAGE_SIZE).await?;
    let mut summary = TransferSummary::default();

    for object in &objects {
        if object.is_directory_key() {
            if object.is_folder_placeholder() {
                debug!(key = %object.name, "Skipping folder placeholder");
            } else {
                warn!(key = %object.name, "Skipping directory key that carries content");
            }
            summary.skipped += 1;
            continue;
        }

        let target = local_path_for_key(destination, &object.name)?;
        let bytes = store.download(bucket, &object.name).await?;
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&target, &bytes).await?;
        debug!(key = %object.name, size = bytes.len(), "Downloaded object");

        summary.transferred += 1;
        summary.bytes += bytes.len() as u64;
    }

    info!(
        transferred = summary.transferred,
        skipped = summary.skipped,
        "Export finished"
    );
    Ok(summary)
}

/// Every regular file under `root`, depth first, siblings in name order.
pub fn walk_files(root: &Path) -> BulkResult<Vec<PathBuf>> {
    if !root.is_dir() {
        return Err(BulkError::NotFound {
            what: format!("directory {}", root.display()),
        });
    }

    let mut files = Vec::new();
    let walker = ignore::WalkBuilder::new(root)
        .standard_filters(false)
        .sort_by_file_name(|a, b| a.cmp(b))
        .build();
    for entry in walker {
        let entry = entry.map_err(|e| std::io::Error::other(e.to_string()))?;
        if entry.file_type().is_some_and(|t| t.is_file()) {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

/// Upload every file under `base/folder`, keyed by its path relative to
/// `base`.
#[instrument(skip(store, base, folder), fields(folder = %folder.display()))]
pub async fn import_tree<S: ObjectStore + ?Sized>(
    store: &S,
    bucket: &str,
    base: &Path,
    folder: &Path,
) -> BulkResult<TransferSummary> {
    let mut summary = TransferSummary::default();

    for path in walk_files(&base.join(folder))? {
        let key = key_for_path(base, &path)?;
        let bytes = tokio::fs::read(&path).await?;
        let size = bytes.len() as u64;
        let content_type = mime_guess::from_path(&path).first_or_octet_stream();

        store
            .upload(bucket, &key, bytes, content_type.essence_str())
            .await?;
        debug!(%key, size, "Uploaded file");

        summary.transferred += 1;
        summary.bytes += size;
    }

    info!(transferred = summary.transferred, "Import finished");
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::storage::FOLDER_PLACEHOLDER_TYPE;
    use crate::backend::testing::FakeObjects;
    use tempfile::TempDir;

    const BUCKET: &str = "demo.appspot.com";

    #[test]
    fn test_local_path_for_key() {
        let root = Path::new("/out");
        assert_eq!(
            local_path_for_key(root, "docs/sub/b.txt").unwrap(),
            PathBuf::from("/out/docs/sub/b.txt")
        );
        assert!(local_path_for_key(root, "../etc/passwd").is_err());
        assert!(local_path_for_key(root, "docs/../../x").is_err());
        assert!(local_path_for_key(root, "/etc/passwd").is_err());
    }

    #[test]
    fn test_key_for_path_joins_with_slashes() {
        let root = Path::new("/data");
        assert_eq!(
            key_for_path(root, Path::new("/data/docs/sub/b.txt")).unwrap(),
            "docs/sub/b.txt"
        );
        assert_eq!(
            key_for_path(root, Path::new("/data/./docs/a.txt")).unwrap(),
            "docs/a.txt"
        );
        assert!(key_for_path(root, Path::new("/elsewhere/a.txt")).is_err());
        assert!(key_for_path(root, Path::new("/data/../etc/a.txt")).is_err());
    }

    #[tokio::test]
    async fn test_export_writes_keys_as_paths() {
        let store = FakeObjects::default();
        store.insert(BUCKET, "docs/a.txt", b"alpha");
        store.insert(BUCKET, "docs/sub/b.txt", b"beta");
        store.insert(BUCKET, "docs/", b"");
        let out = TempDir::new().unwrap();

        let summary = export_tree(&store, BUCKET, None, out.path()).await.unwrap();

        assert_eq!(summary.transferred, 2);
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.bytes, 9);
        assert_eq!(std::fs::read(out.path().join("docs/a.txt")).unwrap(), b"alpha");
        assert_eq!(
            std::fs::read(out.path().join("docs/sub/b.txt")).unwrap(),
            b"beta"
        );
    }

    #[tokio::test]
    async fn test_export_respects_prefix() {
        let store = FakeObjects::default();
        store.insert(BUCKET, "docs/a.txt", b"alpha");
        store.insert(BUCKET, "img/logo.png", b"png");
        let out = TempDir::new().unwrap();

        let summary = export_tree(&store, BUCKET, Some("img/"), out.path())
            .await
            .unwrap();

        assert_eq!(summary.transferred, 1);
        assert!(out.path().join("img/logo.png").exists());
        assert!(!out.path().join("docs").exists());
    }

    #[tokio::test]
    async fn test_export_skips_folder_markers_only() {
        let store = FakeObjects::default();
        {
            let mut objects = store.objects.lock().unwrap();
            objects.insert(
                (BUCKET.to_string(), "docs/".to_string()),
                (Vec::new(), Some(FOLDER_PLACEHOLDER_TYPE.to_string())),
            );
            objects.insert(
                (BUCKET.to_string(), "forms/empty.txt".to_string()),
                (Vec::new(), Some(FOLDER_PLACEHOLDER_TYPE.to_string())),
            );
        }
        let out = TempDir::new().unwrap();

        let summary = export_tree(&store, BUCKET, None, out.path()).await.unwrap();

        assert_eq!(summary.transferred, 1);
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.bytes, 0);
        let empty = out.path().join("forms/empty.txt");
        assert!(empty.is_file());
        assert_eq!(std::fs::read(empty).unwrap(), b"");
        assert_eq!(*store.downloads.lock().unwrap(), vec!["forms/empty.txt"]);
    }

    #[tokio::test]
    async fn test_export_aborts_on_failed_download() {
        let store = FakeObjects::default().fail_for("b.txt");
        store.insert(BUCKET, "a.txt", b"a");
        store.insert(BUCKET, "b.txt", b"b");
        store.insert(BUCKET, "c.txt", b"c");
        let out = TempDir::new().unwrap();

        let result = export_tree(&store, BUCKET, None, out.path()).await;

        assert!(matches!(result, Err(BulkError::Backend(_))));
        assert!(out.path().join("a.txt").exists());
        assert!(!out.path().join("c.txt").exists());
    }

    #[tokio::test]
    async fn test_export_refuses_escaping_keys() {
        let store = FakeObjects::default();
        store.insert(BUCKET, "../outside.txt", b"x");
        let out = TempDir::new().unwrap();

        let result = export_tree(&store, BUCKET, None, out.path()).await;

        assert!(matches!(result, Err(BulkError::InvalidInput { .. })));
        assert!(store.downloads.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_import_keeps_folder_in_keys() {
        let base = TempDir::new().unwrap();
        std::fs::create_dir_all(base.path().join("docs/sub")).unwrap();
        std::fs::write(base.path().join("docs/a.txt"), "alpha").unwrap();
        std::fs::write(base.path().join("docs/sub/b.txt"), "beta").unwrap();
        std::fs::write(base.path().join("other.txt"), "not imported").unwrap();
        let store = FakeObjects::default();

        let summary = import_tree(&store, BUCKET, base.path(), Path::new("docs"))
            .await
            .unwrap();

        assert_eq!(summary.transferred, 2);
        assert_eq!(summary.bytes, 9);
        assert_eq!(store.keys(BUCKET), vec!["docs/a.txt", "docs/sub/b.txt"]);
        let (bytes, content_type) = store.get(BUCKET, "docs/sub/b.txt").unwrap();
        assert_eq!(bytes, b"beta");
        assert_eq!(content_type.as_deref(), Some("text/plain"));
    }

    #[tokio::test]
    async fn test_import_current_directory() {
        let base = TempDir::new().unwrap();
        std::fs::create_dir_all(base.path().join("img")).unwrap();
        std::fs::write(base.path().join("img/logo.png"), [0x89, b'P']).unwrap();
        std::fs::write(base.path().join("index.html"), "<html>").unwrap();
        let store = FakeObjects::default();

        import_tree(&store, BUCKET, base.path(), Path::new("."))
            .await
            .unwrap();

        assert_eq!(store.keys(BUCKET), vec!["img/logo.png", "index.html"]);
        assert_eq!(
            store.get(BUCKET, "img/logo.png").unwrap().1.as_deref(),
            Some("image/png")
        );
    }

    #[tokio::test]
    async fn test_import_then_export_preserves_structure() {
        let source = TempDir::new().unwrap();
        std::fs::create_dir_all(source.path().join("docs/sub")).unwrap();
        std::fs::write(source.path().join("docs/a.txt"), "alpha").unwrap();
        std::fs::write(source.path().join("docs/sub/b.txt"), "beta").unwrap();
        let store = FakeObjects::default();

        import_tree(&store, BUCKET, source.path(), Path::new("docs"))
            .await
            .unwrap();
        let out = TempDir::new().unwrap();
        export_tree(&store, BUCKET, None, out.path()).await.unwrap();

        assert_eq!(
            std::fs::read_to_string(out.path().join("docs/sub/b.txt")).unwrap(),
            "beta"
        );
        assert_eq!(
            std::fs::read_to_string(out.path().join("docs/a.txt")).unwrap(),
            "alpha"
        );
    }

    #[tokio::test]
    async fn test_import_includes_hidden_files() {
        let base = TempDir::new().unwrap();
        std::fs::write(base.path().join(".env"), "X=1").unwrap();
        std::fs::write(base.path().join(".gitignore"), ".env").unwrap();
        let store = FakeObjects::default();

        let summary = import_tree(&store, BUCKET, base.path(), Path::new("."))
            .await
            .unwrap();

        assert_eq!(summary.transferred, 2);
        assert!(store.get(BUCKET, ".env").is_some());
    }

    #[tokio::test]
    async fn test_import_missing_folder_is_not_found() {
        let base = TempDir::new().unwrap();
        let store = FakeObjects::default();
        let result = import_tree(&store, BUCKET, base.path(), Path::new("missing")).await;
        assert!(matches!(result, Err(BulkError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_import_aborts_on_failed_upload() {
        let base = TempDir::new().unwrap();
        for name in ["a.txt", "b.txt", "c.txt"] {
            std::fs::write(base.path().join(name), name).unwrap();
        }
        let store = FakeObjects::default().fail_for("b.txt");

        let result = import_tree(&store, BUCKET, base.path(), Path::new(".")).await;

        assert!(result.is_err());
        assert_eq!(store.keys(BUCKET), vec!["a.txt"]);
    }
}
