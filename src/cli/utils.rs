//! Shared utilities for CLI commands

use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use tabled::{Table, builder::Builder, settings::Style};

use super::error::{CliError, CliResult};

/// Apply consistent table styling
pub fn apply_table_style(table: &mut Table) {
    table.with(Style::rounded());
}

/// Render an object as a two-column key/value table.
pub fn format_kv_table(object: &Map<String, Value>) -> String {
    let mut builder = Builder::default();
    for (key, value) in object {
        let text = match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        builder.push_record([key.as_str(), text.as_str()]);
    }
    let mut table = builder.build();
    apply_table_style(&mut table);
    table.to_string()
}

/// Parse custom claims typed on a shell.
///
/// Surrounding quotes are dropped and single quotes are read as double
/// quotes, so `'{'role':'admin'}'` is accepted.
pub fn parse_custom_claims(raw: &str) -> CliResult<Value> {
    let mut text = raw.trim();
    for quote in ['\'', '"'] {
        if text.len() >= 2 && text.starts_with(quote) && text.ends_with(quote) {
            text = &text[1..text.len() - 1];
        }
    }
    let normalized = text.replace('\'', "\"");

    match serde_json::from_str::<Value>(&normalized) {
        Ok(value @ Value::Object(_)) => Ok(value),
        _ => Err(CliError::invalid("Provided invalid Custom Claims JSON!")),
    }
}

/// Inline JSON when `arg` parses as an object, otherwise a path to a JSON file.
pub fn json_object_arg(arg: &str) -> CliResult<Map<String, Value>> {
    let value = match serde_json::from_str::<Value>(arg) {
        Ok(value) => value,
        Err(_) => {
            let text = std::fs::read_to_string(arg)
                .map_err(|e| CliError::invalid(format!("{} is neither JSON nor a readable file: {}", arg, e)))?;
            serde_json::from_str(&text)?
        }
    };
    match value {
        Value::Object(map) => Ok(map),
        _ => Err(CliError::invalid("Document data must be a JSON object")),
    }
}

/// Write `bytes` to `path`, creating parent directories.
pub fn write_output(path: &Path, bytes: &[u8]) -> CliResult<PathBuf> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, bytes)?;
    Ok(path.to_path_buf())
}
