//! Conversion between plain JSON and Firestore typed values.
//!
//! Firestore's REST surface wraps every value in a single-key object naming
//! its type (`{"stringValue": "x"}`, `{"integerValue": "42"}`, ...). Plain
//! JSON goes in, typed values go over the wire, plain JSON comes back out.
//! Types without a JSON counterpart decode to strings (timestamps,
//! references, base64 bytes) or objects (geo points).

use serde_json::{Map, Number, Value, json};

use crate::backend::error::{BackendError, BackendResult};

fn invalid(message: String) -> BackendError {
    BackendError::InvalidResponse {
        service: "Firestore",
        message,
    }
}

/// Encode a JSON value as a Firestore value.
pub fn encode_value(value: &Value) -> Value {
    match value {
        Value::Null => json!({ "nullValue": null }),
        Value::Bool(b) => json!({ "booleanValue": b }),
        Value::Number(n) => match n.as_i64() {
            Some(i) => json!({ "integerValue": i.to_string() }),
            None => json!({ "doubleValue": n.as_f64().unwrap_or_default() }),
        },
        Value::String(s) => json!({ "stringValue": s }),
        Value::Array(items) => {
            let values: Vec<Value> = items.iter().map(encode_value).collect();
            json!({ "arrayValue": { "values": values } })
        }
        Value::Object(map) => json!({ "mapValue": { "fields": encode_fields(map) } }),
    }
}

/// Encode every entry of a JSON object.
pub fn encode_fields(map: &Map<String, Value>) -> Map<String, Value> {
    map.iter()
        .map(|(k, v)| (k.clone(), encode_value(v)))
        .collect()
}

/// Decode a Firestore value into plain JSON.
pub fn decode_value(value: &Value) -> BackendResult<Value> {
    let Some((kind, inner)) = value.as_object().and_then(|o| o.iter().next()) else {
        return Err(invalid(format!("expected a typed value, got {}", value)));
    };

    match kind.as_str() {
        "nullValue" => Ok(Value::Null),
        "booleanValue" => inner
            .as_bool()
            .map(Value::Bool)
            .ok_or_else(|| invalid(format!("bad booleanValue {}", inner))),
        "integerValue" => {
            let parsed = match inner {
                Value::String(s) => s.parse::<i64>().ok(),
                Value::Number(n) => n.as_i64(),
                _ => None,
            };
            parsed
                .map(|i| Value::Number(i.into()))
                .ok_or_else(|| invalid(format!("bad integerValue {}", inner)))
        }
        "doubleValue" => match inner {
            Value::Number(n) => Ok(Value::Number(n.clone())),
            // NaN and the infinities arrive as strings and have no JSON number form.
            Value::String(s) => Ok(s
                .parse::<f64>()
                .ok()
                .and_then(Number::from_f64)
                .map(Value::Number)
                .unwrap_or_else(|| Value::String(s.clone()))),
            _ => Err(invalid(format!("bad doubleValue {}", inner))),
        },
        "stringValue" | "timestampValue" | "bytesValue" => Ok(inner.clone()),
        "referenceValue" => Ok(inner
            .as_str()
            .and_then(|r| r.split_once("/documents/").map(|(_, path)| path))
            .map(|path| Value::String(path.to_string()))
            .unwrap_or_else(|| inner.clone())),
        "geoPointValue" => Ok(json!({
            "latitude": inner.get("latitude").cloned().unwrap_or(json!(0.0)),
            "longitude": inner.get("longitude").cloned().unwrap_or(json!(0.0)),
        })),
        "arrayValue" => {
            let values = inner
                .get("values")
                .and_then(Value::as_array)
                .map(|vs| vs.iter().map(decode_value).collect::<BackendResult<Vec<_>>>())
                .transpose()?
                .unwrap_or_default();
            Ok(Value::Array(values))
        }
        "mapValue" => {
            let fields = inner
                .get("fields")
                .and_then(Value::as_object)
                .map(decode_fields)
                .transpose()?
                .unwrap_or_default();
            Ok(Value::Object(fields))
        }
        other => Err(invalid(format!("unknown value type '{}'", other))),
    }
}

/// Decode every entry of a Firestore `fields` map.
pub fn decode_fields(fields: &Map<String, Value>) -> BackendResult<Map<String, Value>> {
    fields
        .iter()
        .map(|(k, v)| decode_value(v).map(|d| (k.clone(), d)))
        .collect()
}

/// Quote a top-level key for use in a field path / update mask.
pub fn field_path(key: &str) -> String {
    let mut chars = key.chars();
    let simple = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
    if simple {
        key.to_string()
    } else {
        format!("`{}`", key.replace('\\', "\\\\").replace('`', "\\`"))
    }
}
