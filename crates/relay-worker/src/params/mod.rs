//! Parameter dictionary: string keys mapped to typed values.
//!
//! Built from request payloads and room/peer options. Decoding is lenient:
//! values the dictionary cannot represent are skipped instead of failing the
//! whole document. Integer arrays are the exception, where a single bad
//! element drops the key entirely.

mod value;

use std::collections::HashMap;

pub use value::{Value, ValueKind};

#[derive(Debug, thiserror::Error)]
pub enum ParametersError {
    #[error("parameters must be a JSON object, got {found}")]
    NotAnObject { found: &'static str },
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Parameters {
    map: HashMap<String, Value>,
}

impl Parameters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode a JSON object into a fresh dictionary.
    pub fn decode(data: &serde_json::Value) -> Result<Self, ParametersError> {
        let object = data.as_object().ok_or(ParametersError::NotAnObject {
            found: json_type_name(data),
        })?;

        let mut params = Self::new();
        params.decode_map(object);
        Ok(params)
    }

    /// Merge every admissible entry of `object` into this dictionary.
    pub fn decode_map(&mut self, object: &serde_json::Map<String, serde_json::Value>) {
        for (key, json) in object {
            match Value::from_json(json) {
                Some(value) => {
                    self.map.insert(key.clone(), value);
                }
                None => {
                    tracing::trace!(%key, json_type = json_type_name(json), "Skipping unsupported parameter");
                }
            }
        }
    }

    /// Write every stored key into `out`, overwriting existing entries.
    pub fn fill_json(&self, out: &mut serde_json::Map<String, serde_json::Value>) {
        for (key, value) in &self.map {
            out.insert(key.clone(), value.to_json());
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        let mut out = serde_json::Map::new();
        self.fill_json(&mut out);
        serde_json::Value::Object(out)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.map.insert(key.into(), value.into());
    }

    pub fn has(&self, key: &str) -> bool {
        self.map.contains_key(key)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.map.get(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.map.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// # Panics
    ///
    /// Panics if `key` is absent or not a boolean.
    pub fn get_boolean(&self, key: &str) -> bool {
        self.expect_key(key).boolean()
    }

    /// # Panics
    ///
    /// Panics if `key` is absent or not an integer.
    pub fn get_integer(&self, key: &str) -> i32 {
        self.expect_key(key).integer()
    }

    /// # Panics
    ///
    /// Panics if `key` is absent or not a double.
    pub fn get_double(&self, key: &str) -> f64 {
        self.expect_key(key).double()
    }

    /// # Panics
    ///
    /// Panics if `key` is absent or not a string.
    pub fn get_string(&self, key: &str) -> &str {
        self.expect_key(key).string()
    }

    /// # Panics
    ///
    /// Panics if `key` is absent or not an integer array.
    pub fn get_integer_array(&self, key: &str) -> &[i32] {
        self.expect_key(key).integer_array()
    }

    fn expect_key(&self, key: &str) -> &Value {
        match self.map.get(key) {
            Some(value) => value,
            None => panic!("key does not exist [key:{}]", key),
        }
    }
}

fn json_type_name(json: &serde_json::Value) -> &'static str {
    match json {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decode_admits_every_supported_kind() {
        let params = Parameters::decode(&json!({
            "useDtx": true,
            "clockRate": 48000,
            "ratio": 0.5,
            "mimeType": "audio/opus",
            "payloadTypes": [100, 101],
        }))
        .unwrap();

        assert_eq!(params.len(), 5);
        assert!(params.get_boolean("useDtx"));
        assert_eq!(params.get_integer("clockRate"), 48000);
        assert_eq!(params.get_double("ratio"), 0.5);
        assert_eq!(params.get_string("mimeType"), "audio/opus");
        assert_eq!(params.get_integer_array("payloadTypes"), &[100, 101]);
    }

    // Lenient scalars, strict arrays: surprising, but peers rely on it.
    #[test]
    fn decode_leniency_asymmetry() {
        let params = Parameters::decode(&json!({
            "a": [1, 2, 3],
            "b": [1, "x", 3],
            "c": [],
            "d": {"nested": 1},
            "e": true,
        }))
        .unwrap();

        let mut keys: Vec<&str> = params.keys().collect();
        keys.sort_unstable();
        assert_eq!(keys, ["a", "e"]);
        assert_eq!(params.get_integer_array("a"), &[1, 2, 3]);
        assert!(params.get_boolean("e"));
        assert!(!params.has("b"));
        assert!(!params.has("c"));
        assert!(!params.has("d"));
    }

    #[test]
    fn decode_skips_null_and_float_arrays() {
        let params = Parameters::decode(&json!({
            "missing": null,
            "floats": [1.0, 2.0],
            "kept": 1,
        }))
        .unwrap();

        assert!(!params.has("missing"));
        assert!(!params.has("floats"));
        assert!(params.has("kept"));
    }

    #[test]
    fn decode_rejects_non_objects() {
        let err = Parameters::decode(&json!([1, 2])).unwrap_err();
        assert_eq!(err.to_string(), "parameters must be a JSON object, got array");

        assert!(Parameters::decode(&json!(null)).is_err());
    }

    #[test]
    fn encode_round_trips_admissible_input() {
        let input = json!({
            "flag": false,
            "count": -12,
            "gain": 1.5,
            "name": "room",
            "ssrcs": [1111, 2222],
        });

        let params = Parameters::decode(&input).unwrap();
        assert_eq!(params.to_json(), input);
    }

    #[test]
    fn encode_drops_inadmissible_keys() {
        let params = Parameters::decode(&json!({
            "ok": [1],
            "empty": [],
            "mixed": [1, "2"],
        }))
        .unwrap();

        assert_eq!(params.to_json(), json!({"ok": [1]}));
    }

    #[test]
    fn fill_json_preserves_foreign_keys() {
        let mut params = Parameters::new();
        params.set("level", 3);

        let mut out = serde_json::Map::new();
        out.insert("other".to_string(), json!("kept"));
        params.fill_json(&mut out);

        assert_eq!(
            serde_json::Value::Object(out),
            json!({"other": "kept", "level": 3})
        );
    }

    #[test]
    fn set_replaces_across_kinds() {
        let mut params = Parameters::new();
        params.set("x", 1);
        params.set("x", "one");

        assert_eq!(params.len(), 1);
        assert_eq!(params.get("x").map(Value::kind), Some(ValueKind::String));
        assert_eq!(params.get_string("x"), "one");
    }

    #[test]
    fn decode_map_merges_into_existing() {
        let mut params = Parameters::new();
        params.set("keep", true);

        let extra = json!({"added": 2});
        params.decode_map(extra.as_object().unwrap());

        assert!(params.has("keep"));
        assert_eq!(params.get_integer("added"), 2);
    }

    #[test]
    #[should_panic(expected = "key does not exist [key:absent]")]
    fn missing_key_panics() {
        Parameters::new().get_integer("absent");
    }

    #[test]
    #[should_panic(expected = "value kind mismatch")]
    fn wrong_kind_getter_panics() {
        let mut params = Parameters::new();
        params.set("n", 1);
        params.get_string("n");
    }
}
