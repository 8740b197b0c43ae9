use crate::cli::utils::*;
use serde_json::json;
use tempfile::TempDir;

#[test]
fn test_parse_custom_claims_plain_json() {
    let claims = parse_custom_claims(r#"{"role":"admin"}"#).unwrap();
    assert_eq!(claims, json!({"role": "admin"}));
}

#[test]
fn test_parse_custom_claims_single_quotes() {
    let claims = parse_custom_claims("{'role':'admin','level':2}").unwrap();
    assert_eq!(claims, json!({"role": "admin", "level": 2}));
}

#[test]
fn test_parse_custom_claims_strips_surrounding_quotes() {
    let claims = parse_custom_claims(r#"'{"premium":true}'"#).unwrap();
    assert_eq!(claims, json!({"premium": true}));
    let claims = parse_custom_claims(r#""{'premium':true}""#).unwrap();
    assert_eq!(claims, json!({"premium": true}));
}

#[test]
fn test_parse_custom_claims_rejects_garbage() {
    for raw in ["{role:admin}", "[1,2]", "", "'admin'"] {
        let err = parse_custom_claims(raw).unwrap_err();
        assert_eq!(err.to_string(), "Provided invalid Custom Claims JSON!");
    }
}

#[test]
fn test_json_object_arg_inline_and_file() {
    let inline = json_object_arg(r#"{"name":"Ada"}"#).unwrap();
    assert_eq!(inline["name"], "Ada");

    let dir = TempDir::new().unwrap();
    let path = dir.path().join("doc.json");
    std::fs::write(&path, r#"{"name":"Bob"}"#).unwrap();
    let from_file = json_object_arg(path.to_str().unwrap()).unwrap();
    assert_eq!(from_file["name"], "Bob");
}

#[test]
fn test_json_object_arg_rejects_non_objects_and_missing_files() {
    assert!(json_object_arg("[1]").is_err());
    assert!(json_object_arg("/no/such/file.json").is_err());
}

#[test]
fn test_write_output_creates_parents() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("a/b/out.csv");
    write_output(&path, b"id\n1\n").unwrap();
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "id\n1\n");
}

#[test]
fn test_format_kv_table_lists_keys() {
    let object = json!({"uid": "u1", "disabled": false});
    let table = format_kv_table(object.as_object().unwrap());
    assert!(table.contains("uid"));
    assert!(table.contains("u1"));
    assert!(table.contains("false"));
}
