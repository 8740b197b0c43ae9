use serde_json::{Map, Value};
use std::path::Path;
use tracing::debug;

use crate::backend::firestore::is_document_path;
use crate::backend::{Document, DocumentPages, DocumentStore};
use crate::bulk::{
    BULK_PAGE_SIZE, BatchPolicy, Columns, ExclusionList, ExportFormat, ExportRow,
    Keyed, QueryTarget, apply_to_all, build_query, enumerate_all, parse_filters,
};
use crate::cli::error::{CliError, CliResult};
use crate::cli::output::success;
use crate::cli::utils::{json_object_arg, write_output};

/// Optional arguments shared by the two export commands.
#[derive(Debug, Default)]
pub struct ExportOptions<'a> {
    pub format: Option<&'a str>,
    pub columns: Option<&'a str>,
    pub query: Option<&'a str>,
    pub sort: Option<&'a str>,
    pub sort_direction: Option<&'a str>,
    pub limit: Option<u32>,
}

/// Create a document with a generated id from inline JSON or a JSON file.
pub async fn add_document<S: DocumentStore + ?Sized>(
    store: &S,
    collection: &str,
    json_or_path: &str,
) -> CliResult<String> {
    let data = json_object_arg(json_or_path)?;
    let document = store.add_document(collection, &data).await?;
    Ok(success(&format!("Successfully added document: {}", document.id)))
}

/// Delete every document of a collection not named in `excluded`.
pub async fn remove_collection<S: DocumentStore + ?Sized>(
    store: &S,
    collection: &str,
    excluded: Option<&str>,
    policy: BatchPolicy,
) -> CliResult<String> {
    let exclusions = ExclusionList::parse(excluded);
    let pages = DocumentPages { store, collection };
    let documents = enumerate_all(&pages, BULK_PAGE_SIZE).await?;

    let report = apply_to_all(&documents, &exclusions, policy, |doc| {
        store.delete_document(&doc.path)
    })
    .await?;

    if !report.is_success() {
        return Err(CliError::BatchFailed {
            what: "document removals",
            failed: report.failures.len(),
            attempted: report.processed + report.failures.len(),
        });
    }

    Ok(success(&format!(
        "Removed {} documents from {} ({} excluded).",
        report.processed, collection, report.skipped
    )))
}

/// Export a collection or collection group to a file.
///
/// A plain collection export without filters, ordering or limit pages
/// through the listing; everything else goes through one server-side query.
pub async fn export_collection<S: DocumentStore + ?Sized>(
    store: &S,
    target: QueryTarget,
    output: &Path,
    options: ExportOptions<'_>,
) -> CliResult<String> {
    let format = ExportFormat::from_arg(options.format);
    let columns = Columns::parse(options.columns);
    let filters = parse_filters(options.query)?;
    let query = build_query(
        target,
        &filters,
        options.sort,
        options.sort_direction,
        options.limit,
    )?;

    let documents = match &query.target {
        QueryTarget::Collection(collection)
            if query.filters.is_empty() && query.order_by.is_none() && query.limit.is_none() =>
        {
            let pages = DocumentPages { store, collection };
            enumerate_all(&pages, BULK_PAGE_SIZE).await?
        }
        _ => store.run_query(&query).await?,
    };
    debug!(count = documents.len(), "Fetched documents for export");

    let rows: Vec<ExportRow> = documents.iter().map(Document::to_row).collect();
    let bytes = format.encode(&rows, &columns)?;
    write_output(output, &bytes)?;

    Ok(success(&format!(
        "Exported {} documents to {}.",
        rows.len(),
        output.display()
    )))
}

/// One element of an import file.
struct ImportItem {
    id: Option<String>,
    data: Map<String, Value>,
}

impl Keyed for ImportItem {
    fn key(&self) -> &str {
        self.id.as_deref().unwrap_or_default()
    }
}

fn read_import_file(file: &Path) -> CliResult<Vec<ImportItem>> {
    let text = std::fs::read_to_string(file)?;
    let Value::Array(elements) = serde_json::from_str::<Value>(&text)? else {
        return Err(CliError::invalid(format!(
            "{} must contain a JSON array of objects",
            file.display()
        )));
    };

    elements
        .into_iter()
        .enumerate()
        .map(|(index, element)| match element {
            Value::Object(mut data) => {
                let id = match data.remove("id") {
                    Some(Value::String(id)) if !id.is_empty() => Some(id),
                    Some(Value::Number(n)) => Some(n.to_string()),
                    _ => None,
                };
                Ok(ImportItem { id, data })
            }
            _ => Err(CliError::invalid(format!(
                "element {} of {} is not an object",
                index,
                file.display()
            ))),
        })
        .collect()
}

/// Write every element of a JSON array file into a collection.
///
/// Elements with an `id` are written to that document (merged or replaced),
/// the rest get generated ids.
pub async fn import_collection<S: DocumentStore + ?Sized>(
    store: &S,
    collection: &str,
    file: &Path,
    merge: bool,
    policy: BatchPolicy,
) -> CliResult<String> {
    let items = read_import_file(file)?;

    let report = apply_to_all(&items, &ExclusionList::default(), policy, |item| async move {
        match &item.id {
            Some(id) => {
                let path = format!("{}/{}", collection.trim_matches('/'), id);
                store.set_document(&path, &item.data, merge).await
            }
            None => store.add_document(collection, &item.data).await.map(|_| ()),
        }
    })
    .await?;

    if !report.is_success() {
        return Err(CliError::BatchFailed {
            what: "document imports",
            failed: report.failures.len(),
            attempted: items.len(),
        });
    }

    Ok(success(&format!("Imported {} documents", report.processed)))
}

/// Copy a document's data to another document, or to a new document when
/// `destination` is a collection.
pub async fn duplicate_document<S: DocumentStore + ?Sized>(
    store: &S,
    origin: &str,
    destination: &str,
) -> CliResult<String> {
    if !is_document_path(origin) {
        return Err(CliError::invalid(format!(
            "Origin {} does not point to a document",
            origin
        )));
    }
    let source = store.get_document(origin).await?;

    let written = if is_document_path(destination) {
        store.set_document(destination, &source.data, false).await?;
        destination.trim_matches('/').to_string()
    } else {
        store.add_document(destination, &source.data).await?.path
    };

    Ok(success(&format!("Duplicated {} to {}.", source.path, written)))
}

/// Save a document's data as pretty JSON.
pub async fn get_document<S: DocumentStore + ?Sized>(
    store: &S,
    path: &str,
    output: &Path,
) -> CliResult<String> {
    if !is_document_path(path) {
        return Err(CliError::invalid(format!(
            "{} does not point to a document",
            path
        )));
    }
    let document = store.get_document(path).await?;
    write_output(
        output,
        serde_json::to_string_pretty(&document.data)?.as_bytes(),
    )?;
    Ok(success(&format!(
        "Saved {} to {}.",
        document.path,
        output.display()
    )))
}
