//! Canonical JSON encoder for snapshot digests.
//!
//! Two encodings of the same value must produce identical bytes, otherwise
//! rollback comparisons and push-duplicate checks turn into false mismatches.

use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CanonJsonError {
    #[error("json encode failed: {0}")]
    Json(#[from] serde_json::Error),
}

/// Serialize a value to canonical JSON bytes.
///
/// Canonical rules:
/// - object keys sorted by UTF-8 byte order, recursively
/// - no insignificant whitespace
/// - non-finite floats encode as `null` (serde_json behavior), so they are
///   deterministic even though they lose the original bit pattern
pub fn to_canon_json_bytes<T: Serialize>(value: &T) -> Result<Vec<u8>, CanonJsonError> {
    let value = serde_json::to_value(value)?;
    Ok(serde_json::to_vec(&canon_value(value))?)
}

fn canon_value(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map.into_iter().collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            let mut canon = Map::new();
            for (key, value) in entries {
                canon.insert(key, canon_value(value));
            }
            Value::Object(canon)
        }
        Value::Array(values) => Value::Array(values.into_iter().map(canon_value).collect()),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;

    #[test]
    fn canon_json_sorts_keys_recursively() {
        let value = json!({
            "b": 1,
            "a": { "d": 4, "c": 3 },
            "aa": [ {"z": 1, "y": 2} ]
        });

        let bytes = to_canon_json_bytes(&value).unwrap();
        let expected = br#"{"a":{"c":3,"d":4},"aa":[{"y":2,"z":1}],"b":1}"#;
        assert_eq!(bytes, expected);
    }

    #[test]
    fn canon_json_is_deterministic_for_hashmap() {
        let mut map_a = HashMap::new();
        map_a.insert("b".to_string(), 2u32);
        map_a.insert("a".to_string(), 1u32);

        let mut map_b = HashMap::new();
        map_b.insert("a".to_string(), 1u32);
        map_b.insert("b".to_string(), 2u32);

        assert_eq!(
            to_canon_json_bytes(&map_a).unwrap(),
            to_canon_json_bytes(&map_b).unwrap()
        );
    }
}
