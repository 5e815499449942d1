//! Permission key derivation.
//!
//! A grant lives under a deterministic key combining the acting identifier,
//! the tool, and (for parameterized grants) a fingerprint of the argument
//! bag. Key insertion order in the bag never changes the fingerprint.

use std::collections::BTreeMap;

use serde_json::Value;
use sha2::{Digest, Sha256};

/// Derive the storage key for a grant.
///
/// `"<identifier>:<tool>"`, with `":<hash>"` appended when `params` is a
/// non-empty argument bag.
///
/// # Example
///
/// ```rust
/// use toolgate_core::derive_key;
/// use serde_json::json;
///
/// assert_eq!(derive_key("u1", "send_email", &json!({})), "u1:send_email");
/// assert_eq!(
///     derive_key("u1", "pay", &json!({"a": 1, "b": 2})),
///     derive_key("u1", "pay", &json!({"b": 2, "a": 1})),
/// );
/// ```
pub fn derive_key(identifier: &str, tool_name: &str, params: &Value) -> String {
    match params.as_object() {
        Some(map) if !map.is_empty() => {
            format!("{}:{}:{}", identifier, tool_name, hash_params(params))
        }
        _ => format!("{}:{}", identifier, tool_name),
    }
}

/// Fingerprint an argument bag.
///
/// The bag is rewritten to canonical JSON (recursively sorted keys) before
/// hashing with SHA-256, so two logically identical bags always produce the
/// same fingerprint regardless of construction order.
pub fn hash_params(params: &Value) -> String {
    let canonical = canonicalize_json(params);
    let json = serde_json::to_string(&canonical).unwrap_or_default();
    format!("{:x}", Sha256::digest(json.as_bytes()))
}

/// Rewrite a JSON value with recursively sorted object keys.
fn canonicalize_json(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let sorted: BTreeMap<_, _> = map
                .iter()
                .map(|(k, v)| (k.clone(), canonicalize_json(v)))
                .collect();
            Value::Object(sorted.into_iter().collect())
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize_json).collect()),
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_empty_params_omit_hash() {
        assert_eq!(derive_key("u1", "tool", &json!({})), "u1:tool");
        assert_eq!(derive_key("u1", "tool", &Value::Null), "u1:tool");
    }

    #[test]
    fn test_non_empty_params_append_hash() {
        let key = derive_key("u1", "tool", &json!({"a": 1}));
        assert!(key.starts_with("u1:tool:"));
        let hash = key.rsplit(':').next().unwrap();
        assert_eq!(hash.len(), 64); // SHA-256 hex
    }

    #[test]
    fn test_key_is_order_independent() {
        let a = derive_key("u1", "tool", &json!({"a": 1, "b": 2}));
        let b = derive_key("u1", "tool", &json!({"b": 2, "a": 1}));
        assert_eq!(a, b);

        // Nested objects canonicalize too.
        let a = derive_key("u1", "tool", &json!({"outer": {"z": 1, "a": 2}}));
        let b = derive_key("u1", "tool", &json!({"outer": {"a": 2, "z": 1}}));
        assert_eq!(a, b);
    }

    #[test]
    fn test_key_separates_actors_and_tools() {
        let params = json!({"a": 1});
        assert_ne!(
            derive_key("u1", "tool", &params),
            derive_key("u2", "tool", &params)
        );
        assert_ne!(
            derive_key("u1", "tool_a", &params),
            derive_key("u1", "tool_b", &params)
        );
    }

    #[test]
    fn test_different_params_different_keys() {
        assert_ne!(
            derive_key("u1", "tool", &json!({"a": 1})),
            derive_key("u1", "tool", &json!({"a": 2}))
        );
    }

    #[test]
    fn test_array_order_still_matters() {
        // Arrays are positional; only object keys are canonicalized.
        assert_ne!(
            derive_key("u1", "tool", &json!({"list": [1, 2]})),
            derive_key("u1", "tool", &json!({"list": [2, 1]}))
        );
    }
}
