//! Structured export encoding.
//!
//! Turns exported rows into JSON, comma separated text, the historical
//! two-space "tab" text, or an XLSX workbook. Each format is one variant of
//! [`ExportFormat`].

use rust_xlsxwriter::{Workbook, XlsxError};
use serde_json::{Map, Value};
use std::io;
use tracing::warn;

use super::error::{BulkError, BulkResult};

/// A flattened record: `id`/`uid` first, then the record's data fields.
pub type ExportRow = Map<String, Value>;

/// Delimiter of the `tab` format. Two spaces, not a tab character.
pub const TAB_DELIMITER: &str = "  ";

/// Output encodings supported by exports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExportFormat {
    Json,
    #[default]
    Csv,
    Tab,
    Xlsx,
}

impl ExportFormat {
    /// Select a format from its command-line name. Unknown or missing names
    /// fall back to CSV.
    pub fn from_arg(arg: Option<&str>) -> Self {
        match arg.map(|a| a.trim().to_ascii_lowercase()).as_deref() {
            None | Some("") | Some("csv") => ExportFormat::Csv,
            Some("json") => ExportFormat::Json,
            Some("tab") => ExportFormat::Tab,
            Some("xlsx") | Some("xls") => ExportFormat::Xlsx,
            Some(other) => {
                warn!("Unknown export type '{}', writing CSV", other);
                ExportFormat::Csv
            }
        }
    }

    /// Encode `rows` in this format. Rows are never modified.
    pub fn encode(self, rows: &[ExportRow], columns: &Columns) -> BulkResult<Vec<u8>> {
        match self {
            ExportFormat::Json => encode_json(rows),
            ExportFormat::Csv => encode_csv(rows, columns),
            ExportFormat::Tab => Ok(encode_delimited(rows, columns, TAB_DELIMITER)),
            ExportFormat::Xlsx => {
                if columns != &Columns::All {
                    warn!("Column selection is not supported for XLSX, exporting all columns");
                }
                encode_xlsx(rows)
            }
        }
    }
}

/// Column projection for delimited formats.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Columns {
    /// Every key found in any row, in first-seen order.
    #[default]
    All,
    /// Exactly these columns, in this order.
    Named(Vec<String>),
}

impl Columns {
    /// Parse `*` or a comma separated column list.
    pub fn parse(arg: Option<&str>) -> Self {
        match arg.map(str::trim) {
            None | Some("") | Some("*") => Columns::All,
            Some(list) => Columns::Named(
                list.split(',')
                    .map(|c| c.trim().to_string())
                    .filter(|c| !c.is_empty())
                    .collect(),
            ),
        }
    }

    /// Resolve the header row for `rows`.
    pub fn headers(&self, rows: &[ExportRow]) -> Vec<String> {
        match self {
            Columns::Named(names) => names.clone(),
            Columns::All => all_keys(rows),
        }
    }
}

fn all_keys(rows: &[ExportRow]) -> Vec<String> {
    let mut keys: Vec<String> = Vec::new();
    for row in rows {
        for key in row.keys() {
            if !keys.iter().any(|k| k == key) {
                keys.push(key.clone());
            }
        }
    }
    keys
}

/// Text of one cell. Missing and null values are blank.
fn cell_text(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

fn encode_json(rows: &[ExportRow]) -> BulkResult<Vec<u8>> {
    Ok(serde_json::to_vec_pretty(rows)?)
}

fn encode_csv(rows: &[ExportRow], columns: &Columns) -> BulkResult<Vec<u8>> {
    let headers = columns.headers(rows);
    let mut writer = csv::WriterBuilder::new()
        .delimiter(b',')
        .from_writer(Vec::new());

    if headers.is_empty() {
        return Ok(Vec::new());
    }

    writer.write_record(&headers).map_err(csv_error)?;
    for row in rows {
        writer
            .write_record(headers.iter().map(|h| cell_text(row.get(h))))
            .map_err(csv_error)?;
    }

    writer
        .into_inner()
        .map_err(|e| BulkError::Io(io::Error::other(e.to_string())))
}

fn csv_error(e: csv::Error) -> BulkError {
    BulkError::Io(io::Error::other(e))
}

/// Quote a field when it would be ambiguous in delimited text.
fn quote_field(field: &str, delimiter: &str) -> String {
    let needs_quotes = field.contains('"')
        || field.contains('\n')
        || field.contains('\r')
        || field.contains(delimiter)
        || field.starts_with(' ')
        || field.ends_with(' ');
    if needs_quotes {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

fn encode_delimited(rows: &[ExportRow], columns: &Columns, delimiter: &str) -> Vec<u8> {
    let headers = columns.headers(rows);
    if headers.is_empty() {
        return Vec::new();
    }
    let mut out = String::new();

    let header_line: Vec<String> = headers.iter().map(|h| quote_field(h, delimiter)).collect();
    out.push_str(&header_line.join(delimiter));
    out.push('\n');

    for row in rows {
        let line: Vec<String> = headers
            .iter()
            .map(|h| quote_field(&cell_text(row.get(h)), delimiter))
            .collect();
        out.push_str(&line.join(delimiter));
        out.push('\n');
    }

    out.into_bytes()
}

fn xlsx_error(e: XlsxError) -> BulkError {
    BulkError::Io(io::Error::other(e.to_string()))
}

fn encode_xlsx(rows: &[ExportRow]) -> BulkResult<Vec<u8>> {
    let headers = all_keys(rows);
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();

    for (col, header) in headers.iter().enumerate() {
        let col = u16::try_from(col).map_err(|_| BulkError::invalid("too many columns for XLSX"))?;
        sheet.write_string(0, col, header.as_str()).map_err(xlsx_error)?;
    }

    for (index, row) in rows.iter().enumerate() {
        let line = u32::try_from(index + 1).map_err(|_| BulkError::invalid("too many rows for XLSX"))?;
        for (col, header) in headers.iter().enumerate() {
            let col = u16::try_from(col).map_err(|_| BulkError::invalid("too many columns for XLSX"))?;
            match row.get(header) {
                None | Some(Value::Null) => {}
                Some(Value::Bool(b)) => {
                    sheet.write_boolean(line, col, *b).map_err(xlsx_error)?;
                }
                Some(Value::Number(n)) => match n.as_f64() {
                    Some(f) => {
                        sheet.write_number(line, col, f).map_err(xlsx_error)?;
                    }
                    None => {
                        sheet.write_string(line, col, n.to_string()).map_err(xlsx_error)?;
                    }
                },
                Some(other) => {
                    sheet
                        .write_string(line, col, cell_text(Some(other)))
                        .map_err(xlsx_error)?;
                }
            }
        }
    }

    workbook.save_to_buffer().map_err(xlsx_error)
}
