//! Canonical JSON hashing.
//!
//! Two independent implementations must produce byte-identical output for
//! identical input: object keys are sorted, null members are omitted,
//! separators are compact, strings keep JSON escaping. Wire-visible hashes
//! are SHA-256 hex.

use serde_json::Value;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

/// Render a JSON value in canonical form.
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            out.push('{');
            let mut keys: Vec<&String> = map
                .iter()
                .filter(|(_, v)| !v.is_null())
                .map(|(k, _)| k)
                .collect();
            keys.sort();
            for (i, key) in keys.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String((*key).clone()).to_string());
                out.push(':');
                write_canonical(&map[*key], out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}

/// SHA-256 of raw bytes, lowercase hex.
pub fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Canonicalize a JSON value and hash it with SHA-256.
pub fn canonical_hash(value: &Value) -> String {
    sha256_hex(canonical_json(value).as_bytes())
}

/// The message a trust-receipt signature covers.
///
/// Canonical JSON of `{self_hash, session_id, session_nonce}` hashed with
/// SHA-256; the 32 digest bytes are the message. Determinism here is
/// load-bearing for cross-implementation verification.
pub fn binding_message(self_hash: &str, session_id: &str, session_nonce: &str) -> Vec<u8> {
    let body = serde_json::json!({
        "self_hash": self_hash,
        "session_id": session_id,
        "session_nonce": session_nonce,
    });
    let mut hasher = Sha256::new();
    hasher.update(canonical_json(&body).as_bytes());
    hasher.finalize().to_vec()
}

/// Constant-time byte comparison for secrets and hashed-key material.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.ct_eq(b).into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn keys_are_sorted_recursively() {
        let value = json!({"b": 1, "a": {"z": true, "m": [2, 1]}});
        assert_eq!(canonical_json(&value), r#"{"a":{"m":[2,1],"z":true},"b":1}"#);
    }

    #[test]
    fn null_members_are_omitted() {
        let value = json!({"a": null, "b": 2});
        assert_eq!(canonical_json(&value), r#"{"b":2}"#);
    }

    #[test]
    fn nulls_in_arrays_are_kept() {
        let value = json!([1, null, 3]);
        assert_eq!(canonical_json(&value), "[1,null,3]");
    }

    #[test]
    fn strings_keep_json_escaping() {
        let value = json!({"msg": "line\nbreak \"quoted\""});
        assert_eq!(
            canonical_json(&value),
            r#"{"msg":"line\nbreak \"quoted\""}"#
        );
    }

    #[test]
    fn canonical_hash_ignores_insertion_order() {
        let a = json!({"x": 1, "y": 2});
        let b = json!({"y": 2, "x": 1});
        assert_eq!(canonical_hash(&a), canonical_hash(&b));
    }

    #[test]
    fn binding_message_golden_value() {
        // Pinned so independent implementations can cross-check.
        let msg = binding_message("abc123", "session-1", "nonce-1");
        assert_eq!(
            hex::encode(&msg),
            sha256_hex(
                br#"{"self_hash":"abc123","session_id":"session-1","session_nonce":"nonce-1"}"#
            )
        );
        assert_eq!(msg.len(), 32);
    }

    #[test]
    fn binding_message_differs_per_field() {
        let base = binding_message("h", "s", "n");
        assert_ne!(base, binding_message("h2", "s", "n"));
        assert_ne!(base, binding_message("h", "s2", "n"));
        assert_ne!(base, binding_message("h", "s", "n2"));
    }

    #[test]
    fn constant_time_eq_basic() {
        assert!(constant_time_eq(b"abc", b"abc"));
        assert!(!constant_time_eq(b"abc", b"abd"));
        assert!(!constant_time_eq(b"abc", b"abcd"));
    }

    proptest! {
        #[test]
        fn canonical_json_is_stable(keys in proptest::collection::vec("[a-z]{1,8}", 1..6)) {
            let mut forward = serde_json::Map::new();
            for (i, k) in keys.iter().enumerate() {
                forward.insert(k.clone(), json!(i));
            }
            let mut reverse = serde_json::Map::new();
            for (i, k) in keys.iter().enumerate().rev() {
                reverse.insert(k.clone(), json!(i));
            }
            prop_assert_eq!(
                canonical_json(&Value::Object(forward)),
                canonical_json(&Value::Object(reverse))
            );
        }
    }
}
