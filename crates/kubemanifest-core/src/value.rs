//! Typed lookups over the opaque value tree
//!
//! Resource bodies are kept as ordered `serde_json::Value` trees (the
//! `preserve_order` feature keeps manifest key order intact). Spec and status
//! payloads are weakly typed, so every accessor here returns `Option` instead
//! of assuming a shape.

use serde_json::{Map, Value as JsonValue};

/// Optional-returning accessors for nested fields
pub trait ValueExt {
    /// Get a nested value by path segments
    fn lookup(&self, path: &[&str]) -> Option<&JsonValue>;

    /// Get a nested string
    fn lookup_str(&self, path: &[&str]) -> Option<&str> {
        self.lookup(path).and_then(JsonValue::as_str)
    }

    /// Get a nested integer
    ///
    /// Integral floats are accepted since YAML and JSON decoders disagree
    /// on how `3` versus `3.0` come through.
    fn lookup_i64(&self, path: &[&str]) -> Option<i64> {
        self.lookup(path).and_then(|v| match v {
            JsonValue::Number(n) => n
                .as_i64()
                .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
            _ => None,
        })
    }

    /// Get a nested map
    fn lookup_map(&self, path: &[&str]) -> Option<&Map<String, JsonValue>> {
        self.lookup(path).and_then(JsonValue::as_object)
    }
}

impl ValueExt for JsonValue {
    fn lookup(&self, path: &[&str]) -> Option<&JsonValue> {
        get_nested(self, path)
    }
}

impl ValueExt for Map<String, JsonValue> {
    fn lookup(&self, path: &[&str]) -> Option<&JsonValue> {
        let (first, rest) = path.split_first()?;
        self.get(*first).and_then(|v| get_nested(v, rest))
    }
}

fn get_nested<'a>(value: &'a JsonValue, path: &[&str]) -> Option<&'a JsonValue> {
    let Some((key, remaining)) = path.split_first() else {
        return Some(value);
    };

    match value {
        JsonValue::Object(map) => map.get(*key).and_then(|v| get_nested(v, remaining)),
        _ => None,
    }
}
