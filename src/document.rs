//! Structural comparison of discovery documents.
//!
//! Replicas serialize the same metadata with arbitrary key order and number
//! formatting, so comparison walks the JSON tree instead of comparing bytes.

use serde_json::{Map as JsonMap, Number, Value as JsonValue};
use std::collections::BTreeSet;

/// Parsed discovery document. Only JSON objects are accepted at the top level.
#[derive(Clone, Debug, PartialEq)]
pub struct MetadataDocument(JsonMap<String, JsonValue>);

impl MetadataDocument {
    pub fn parse(raw: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice::<JsonMap<String, JsonValue>>(raw).map(Self)
    }

    pub fn into_value(self) -> JsonValue {
        JsonValue::Object(self.0)
    }

    pub fn matches(&self, served: &MetadataDocument) -> bool {
        objects_equal(&self.0, &served.0)
    }

    /// Top-level keys whose presence or value differs, sorted.
    pub fn differing_keys(&self, served: &MetadataDocument) -> Vec<String> {
        let keys: BTreeSet<&String> = self.0.keys().chain(served.0.keys()).collect();
        keys.into_iter()
            .filter(|key| match (self.0.get(*key), served.0.get(*key)) {
                (Some(expected), Some(actual)) => !structurally_equal(expected, actual),
                _ => true,
            })
            .cloned()
            .collect()
    }
}

impl TryFrom<JsonValue> for MetadataDocument {
    type Error = JsonValue;

    fn try_from(value: JsonValue) -> Result<Self, Self::Error> {
        match value {
            JsonValue::Object(map) => Ok(Self(map)),
            other => Err(other),
        }
    }
}

/// Recursive equality over JSON values, insensitive to object key order.
///
/// Numbers compare by value, so `1` and `1.0` are equal.
pub fn structurally_equal(lhs: &JsonValue, rhs: &JsonValue) -> bool {
    match (lhs, rhs) {
        (JsonValue::Null, JsonValue::Null) => true,
        (JsonValue::Bool(a), JsonValue::Bool(b)) => a == b,
        (JsonValue::Number(a), JsonValue::Number(b)) => numbers_equal(a, b),
        (JsonValue::String(a), JsonValue::String(b)) => a == b,
        (JsonValue::Array(a), JsonValue::Array(b)) => {
            a.len() == b.len()
                && a.iter()
                    .zip(b.iter())
                    .all(|(left, right)| structurally_equal(left, right))
        }
        (JsonValue::Object(a), JsonValue::Object(b)) => objects_equal(a, b),
        _ => false,
    }
}

fn objects_equal(lhs: &JsonMap<String, JsonValue>, rhs: &JsonMap<String, JsonValue>) -> bool {
    lhs.len() == rhs.len()
        && lhs.iter().all(|(key, value)| {
            rhs.get(key)
                .is_some_and(|other| structurally_equal(value, other))
        })
}

fn numbers_equal(lhs: &Number, rhs: &Number) -> bool {
    if let (Some(a), Some(b)) = (lhs.as_i64(), rhs.as_i64()) {
        return a == b;
    }
    if let (Some(a), Some(b)) = (lhs.as_u64(), rhs.as_u64()) {
        return a == b;
    }
    match (lhs.as_f64(), rhs.as_f64()) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}
