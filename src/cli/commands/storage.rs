use std::path::Path;

use crate::backend::ObjectStore;
use crate::bulk::{export_tree, import_tree};
use crate::cli::error::CliResult;
use crate::cli::output::success;

/// Download every object under `prefix` (the whole bucket when absent) into
/// `destination`.
pub async fn export<S: ObjectStore + ?Sized>(
    store: &S,
    bucket: &str,
    prefix: Option<&str>,
    destination: &Path,
) -> CliResult<String> {
    let prefix = prefix.and_then(directory_prefix);
    let summary = export_tree(store, bucket, prefix.as_deref(), destination).await?;

    Ok(format!(
        "{}\nDownloaded {} files ({} bytes) from gs://{}, skipped {} folder markers.",
        success("Export completed successfully."),
        summary.transferred,
        summary.bytes,
        bucket,
        summary.skipped
    ))
}

/// Listing prefix for a remote directory: no leading `./` or `/`, exactly
/// one trailing `/`. The bucket root has no prefix.
fn directory_prefix(directory: &str) -> Option<String> {
    let trimmed = directory
        .trim()
        .trim_start_matches("./")
        .trim_start_matches('/')
        .trim_end_matches('/');
    match trimmed {
        "" | "." => None,
        dir => Some(format!("{}/", dir)),
    }
}

/// Upload every file under `base/folder`, keyed by its path relative to `base`.
pub async fn import<S: ObjectStore + ?Sized>(
    store: &S,
    bucket: &str,
    base: &Path,
    folder: &Path,
) -> CliResult<String> {
    let summary = import_tree(store, bucket, base, folder).await?;

    Ok(format!(
        "{}\nUploaded {} files ({} bytes) to gs://{}.",
        success("All files imported successfully."),
        summary.transferred,
        summary.bytes,
        bucket
    ))
}
