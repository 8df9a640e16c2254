//! Deterministic cache keys for backend responses.
//!
//! A key is the SHA-256 of a canonical JSON document holding the template
//! source, the template arguments, the model and the prior messages. Object
//! keys are sorted at every depth, so the order in which a caller built `args`
//! never changes the key.

use std::fmt;

use serde_json::{Value, json};
use sha2::{Digest, Sha256};

use crate::core::types::Message;

/// Hex-encoded content hash identifying one cached response.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn response_file_name(&self) -> String {
        format!("{}.response", self.0)
    }

    pub fn query_file_name(&self) -> String {
        format!("{}.query", self.0)
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Compute the key for a backend call.
///
/// `None` and an empty message list produce the same key.
pub fn compute_key(
    template_source: &str,
    args: &Value,
    model: &str,
    messages: Option<&[Message]>,
) -> CacheKey {
    let messages: Vec<Value> = messages
        .unwrap_or_default()
        .iter()
        .map(|message| json!({ "role": message.role.as_str(), "content": message.content }))
        .collect();
    let document = json!({
        "args": args,
        "messages": messages,
        "model": model,
        "templateContent": template_source,
    });
    CacheKey(content_hash(&canonical_json(&document)))
}

/// Full SHA-256 of `content` as lowercase hex.
pub fn content_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hex::encode(hasher.finalize())
}

/// Serialize `value` with object keys sorted at every depth.
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            out.push('{');
            for (i, (key, item)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                write_canonical(item, out);
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_hash_is_full_sha256_hex() {
        let hash = content_hash("test content");
        assert_eq!(hash.len(), 64);
        assert_eq!(hash, content_hash("test content"));
        assert_ne!(hash, content_hash("other content"));
    }

    #[test]
    fn key_is_stable_for_identical_inputs() {
        let args = json!({ "filePath": "a.rs", "fileContent": "fn main() {}" });
        let messages = vec![Message::system("sys"), Message::user("hi")];
        let a = compute_key("tpl", &args, "gpt-4o", Some(&messages));
        let b = compute_key("tpl", &args, "gpt-4o", Some(&messages));
        assert_eq!(a, b);
    }

    #[test]
    fn key_ignores_object_field_order() {
        let first: Value =
            serde_json::from_str(r#"{"b":1,"a":{"y":[1,2],"x":"s"}}"#).expect("parse");
        let second: Value =
            serde_json::from_str(r#"{"a":{"x":"s","y":[1,2]},"b":1}"#).expect("parse");
        assert_eq!(
            compute_key("tpl", &first, "m", None),
            compute_key("tpl", &second, "m", None)
        );
    }

    #[test]
    fn key_changes_with_each_input() {
        let args = json!({ "a": 1 });
        let base = compute_key("tpl", &args, "m", None);
        assert_ne!(base, compute_key("tpl2", &args, "m", None));
        assert_ne!(base, compute_key("tpl", &json!({ "a": 2 }), "m", None));
        assert_ne!(base, compute_key("tpl", &args, "m2", None));
        assert_ne!(
            base,
            compute_key("tpl", &args, "m", Some(&[Message::user("x")]))
        );
    }

    #[test]
    fn absent_messages_equal_empty_messages() {
        let args = json!({});
        assert_eq!(
            compute_key("tpl", &args, "m", None),
            compute_key("tpl", &args, "m", Some(&[]))
        );
    }

    #[test]
    fn array_order_is_significant() {
        assert_ne!(
            canonical_json(&json!([1, 2])),
            canonical_json(&json!([2, 1]))
        );
    }

    #[test]
    fn file_names_follow_cache_layout() {
        let key = compute_key("tpl", &json!({}), "m", None);
        assert_eq!(key.response_file_name(), format!("{key}.response"));
        assert_eq!(key.query_file_name(), format!("{key}.query"));
    }
}
