/// Serde utility functions for common patterns
use serde::{Deserializer, Serializer};
use serde_json::Value;
use std::fmt;

/// Deserialize a field that carries JSON encoded inside a string.
///
/// - Missing field or `null` → `None`
/// - Empty string → `None`
/// - `"{\"role\":\"admin\"}"` → `Some(json!({"role": "admin"}))`
///
/// Usage:
/// ```ignore
/// use serde::Deserialize;
///
/// #[derive(Deserialize)]
/// struct Example {
///     #[serde(default, deserialize_with = "crate::serde_utils::json_in_string")]
///     custom_attributes: Option<serde_json::Value>,
/// }
/// ```
pub fn json_in_string<'de, D>(de: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    struct JsonInStringVisitor;

    impl<'de> serde::de::Visitor<'de> for JsonInStringVisitor {
        type Value = Option<Value>;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            formatter.write_str("a string containing JSON")
        }

        fn visit_none<E>(self) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            Ok(None)
        }

        fn visit_unit<E>(self) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            Ok(None)
        }

        fn visit_some<D>(self, deserializer: D) -> Result<Self::Value, D::Error>
        where
            D: Deserializer<'de>,
        {
            deserializer.deserialize_str(self)
        }

        fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            if v.trim().is_empty() {
                return Ok(None);
            }
            serde_json::from_str(v).map(Some).map_err(E::custom)
        }
    }

    de.deserialize_option(JsonInStringVisitor)
}

/// Serialize an optional JSON value back into its string form.
pub fn to_json_string<S>(value: &Option<Value>, ser: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match value {
        Some(v) => ser.serialize_str(&v.to_string()),
        None => ser.serialize_none(),
    }
}
