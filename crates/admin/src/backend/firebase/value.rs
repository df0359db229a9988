//! Firestore's JSON value encoding.
//!
//! Firestore wraps every field in a single-key object naming its type:
//! `{"stringValue": "Sneaker"}`, `{"doubleValue": 12500}`,
//! `{"integerValue": "3"}`, `{"timestampValue": "2024-01-01T00:00:00Z"}`.

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Map, Value, json};

use crate::backend::{BackendError, FieldValue, Fields};

/// Encode a field value. Server timestamps have no value encoding; they are
/// sent as field transforms instead.
#[must_use]
pub fn encode(value: &FieldValue) -> Option<Value> {
    let encoded = match value {
        FieldValue::Null => json!({ "nullValue": null }),
        FieldValue::Bool(b) => json!({ "booleanValue": b }),
        FieldValue::Integer(n) => json!({ "integerValue": n.to_string() }),
        FieldValue::Double(n) => json!({ "doubleValue": n }),
        FieldValue::String(s) => json!({ "stringValue": s }),
        FieldValue::Timestamp(ts) => {
            json!({ "timestampValue": ts.to_rfc3339_opts(SecondsFormat::Micros, true) })
        }
        FieldValue::ServerTimestamp => return None,
    };
    Some(encoded)
}

/// Encode a document body, skipping server timestamp sentinels.
#[must_use]
pub fn encode_fields(fields: &Fields) -> Map<String, Value> {
    fields
        .iter()
        .filter_map(|(name, value)| encode(value).map(|v| (name.clone(), v)))
        .collect()
}

/// Decode a field value.
///
/// Returns `Ok(None)` for types the dashboard never writes (maps, arrays,
/// references, bytes, geo points).
///
/// # Errors
///
/// Returns [`BackendError`] if a known type carries a malformed payload.
pub fn decode(value: &Value) -> Result<Option<FieldValue>, BackendError> {
    let Some((kind, payload)) = value.as_object().and_then(|obj| obj.iter().next()) else {
        return Err(BackendError::malformed(format!("not a typed value: {value}")));
    };

    let decoded = match kind.as_str() {
        "nullValue" => FieldValue::Null,
        "booleanValue" => FieldValue::Bool(
            payload
                .as_bool()
                .ok_or_else(|| BackendError::malformed("booleanValue is not a boolean"))?,
        ),
        "integerValue" => FieldValue::Integer(parse_integer(payload)?),
        "doubleValue" => FieldValue::Double(
            payload
                .as_f64()
                .or_else(|| payload.as_str().and_then(|s| s.parse().ok()))
                .ok_or_else(|| BackendError::malformed("doubleValue is not a number"))?,
        ),
        "stringValue" => FieldValue::String(
            payload
                .as_str()
                .ok_or_else(|| BackendError::malformed("stringValue is not a string"))?
                .to_string(),
        ),
        "timestampValue" => {
            let raw = payload
                .as_str()
                .ok_or_else(|| BackendError::malformed("timestampValue is not a string"))?;
            let ts = DateTime::parse_from_rfc3339(raw)
                .map_err(|e| BackendError::malformed(format!("timestampValue {raw}: {e}")))?;
            FieldValue::Timestamp(ts.with_timezone(&Utc))
        }
        _ => return Ok(None),
    };
    Ok(Some(decoded))
}

/// Decode a document's field map, dropping unsupported types.
///
/// # Errors
///
/// Returns [`BackendError`] if any supported value is malformed.
pub fn decode_fields(fields: &Map<String, Value>) -> Result<Fields, BackendError> {
    let mut decoded = Fields::new();
    for (name, value) in fields {
        if let Some(field) = decode(value)? {
            decoded.insert(name.clone(), field);
        }
    }
    Ok(decoded)
}

fn parse_integer(payload: &Value) -> Result<i64, BackendError> {
    payload
        .as_str()
        .and_then(|s| s.parse().ok())
        .or_else(|| payload.as_i64())
        .ok_or_else(|| BackendError::malformed("integerValue is not an integer"))
}

/// Quote a field path segment unless it is a plain identifier.
#[must_use]
pub fn field_path(name: &str) -> String {
    let mut chars = name.chars();
    let simple = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
    if simple {
        name.to_string()
    } else {
        format!("`{}`", name.replace('\\', "\\\\").replace('`', "\\`"))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn test_encode_product_body() {
        let mut fields = Fields::new();
        fields.insert("name".to_string(), FieldValue::from("Chelsea Boot"));
        fields.insert("price".to_string(), FieldValue::Double(12500.0));
        fields.insert("createdAt".to_string(), FieldValue::ServerTimestamp);

        let encoded = encode_fields(&fields);
        assert_eq!(encoded.len(), 2);
        assert_eq!(encoded["name"], json!({ "stringValue": "Chelsea Boot" }));
        assert_eq!(encoded["price"], json!({ "doubleValue": 12500.0 }));
        assert!(!encoded.contains_key("createdAt"));
    }

    #[test]
    fn test_decode_known_types() {
        assert_eq!(
            decode(&json!({ "integerValue": "42" })).unwrap(),
            Some(FieldValue::Integer(42))
        );
        assert_eq!(
            decode(&json!({ "doubleValue": 1.5 })).unwrap(),
            Some(FieldValue::Double(1.5))
        );
        assert_eq!(
            decode(&json!({ "nullValue": null })).unwrap(),
            Some(FieldValue::Null)
        );
        assert_eq!(
            decode(&json!({ "timestampValue": "2024-03-01T10:00:00.123456Z" })).unwrap(),
            Some(FieldValue::Timestamp(
                Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap()
                    + chrono::Duration::microseconds(123_456)
            ))
        );
    }

    #[test]
    fn test_decode_skips_unsupported_types() {
        assert_eq!(decode(&json!({ "mapValue": { "fields": {} } })).unwrap(), None);
    }

    #[test]
    fn test_decode_rejects_malformed_payloads() {
        assert!(decode(&json!({ "timestampValue": "yesterday" })).is_err());
        assert!(decode(&json!("bare string")).is_err());
    }

    #[test]
    fn test_field_path_quoting() {
        assert_eq!(field_path("createdAt"), "createdAt");
        assert_eq!(field_path("image-base64"), "`image-base64`");
    }
}
