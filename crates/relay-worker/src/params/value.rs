//! Typed value stored in a [`Parameters`](super::Parameters) dictionary.

use std::fmt;

/// Discriminant of a [`Value`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Boolean,
    Integer,
    Double,
    String,
    IntegerArray,
}

impl ValueKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Boolean => "boolean",
            Self::Integer => "integer",
            Self::Double => "double",
            Self::String => "string",
            Self::IntegerArray => "integer array",
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single dynamically-typed datum.
///
/// Exactly one payload exists per value. The panicking accessors
/// ([`boolean`](Self::boolean), [`integer`](Self::integer), ...) treat a kind
/// mismatch as a caller bug; use the `as_*` accessors when the kind is not
/// known in advance.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Boolean(bool),
    Integer(i32),
    Double(f64),
    String(String),
    IntegerArray(Vec<i32>),
}

impl Value {
    pub fn kind(&self) -> ValueKind {
        match self {
            Self::Boolean(_) => ValueKind::Boolean,
            Self::Integer(_) => ValueKind::Integer,
            Self::Double(_) => ValueKind::Double,
            Self::String(_) => ValueKind::String,
            Self::IntegerArray(_) => ValueKind::IntegerArray,
        }
    }

    /// # Panics
    ///
    /// Panics if the value is not a boolean.
    pub fn boolean(&self) -> bool {
        match self {
            Self::Boolean(b) => *b,
            other => other.kind_mismatch(ValueKind::Boolean),
        }
    }

    /// # Panics
    ///
    /// Panics if the value is not an integer.
    pub fn integer(&self) -> i32 {
        match self {
            Self::Integer(i) => *i,
            other => other.kind_mismatch(ValueKind::Integer),
        }
    }

    /// # Panics
    ///
    /// Panics if the value is not a double.
    pub fn double(&self) -> f64 {
        match self {
            Self::Double(d) => *d,
            other => other.kind_mismatch(ValueKind::Double),
        }
    }

    /// # Panics
    ///
    /// Panics if the value is not a string.
    pub fn string(&self) -> &str {
        match self {
            Self::String(s) => s,
            other => other.kind_mismatch(ValueKind::String),
        }
    }

    /// # Panics
    ///
    /// Panics if the value is not an integer array.
    pub fn integer_array(&self) -> &[i32] {
        match self {
            Self::IntegerArray(v) => v,
            other => other.kind_mismatch(ValueKind::IntegerArray),
        }
    }

    pub fn as_boolean(&self) -> Option<bool> {
        match self {
            Self::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i32> {
        match self {
            Self::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_double(&self) -> Option<f64> {
        match self {
            Self::Double(d) => Some(*d),
            _ => None,
        }
    }

    pub fn as_string(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_integer_array(&self) -> Option<&[i32]> {
        match self {
            Self::IntegerArray(v) => Some(v),
            _ => None,
        }
    }

    /// Classify a JSON value, returning `None` for anything the dictionary
    /// does not admit.
    ///
    /// Arrays are all-or-nothing: one non-integer element (or an empty array)
    /// rejects the whole array.
    pub(crate) fn from_json(json: &serde_json::Value) -> Option<Self> {
        match json {
            serde_json::Value::Bool(b) => Some(Self::Boolean(*b)),
            serde_json::Value::Number(n) if n.is_f64() => n.as_f64().map(Self::Double),
            serde_json::Value::Number(n) => json_i32(n).map(Self::Integer),
            serde_json::Value::String(s) => Some(Self::String(s.clone())),
            serde_json::Value::Array(entries) => {
                if entries.is_empty() {
                    return None;
                }
                entries
                    .iter()
                    .map(|entry| match entry {
                        serde_json::Value::Number(n) if !n.is_f64() => json_i32(n),
                        _ => None,
                    })
                    .collect::<Option<Vec<i32>>>()
                    .map(Self::IntegerArray)
            }
            serde_json::Value::Null | serde_json::Value::Object(_) => None,
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Boolean(b) => serde_json::Value::from(*b),
            Self::Integer(i) => serde_json::Value::from(*i),
            Self::Double(d) => serde_json::Value::from(*d),
            Self::String(s) => serde_json::Value::from(s.as_str()),
            Self::IntegerArray(v) => serde_json::Value::from(v.clone()),
        }
    }

    fn kind_mismatch(&self, wanted: ValueKind) -> ! {
        panic!(
            "value kind mismatch [wanted:{}, actual:{}]",
            wanted,
            self.kind()
        )
    }
}

fn json_i32(n: &serde_json::Number) -> Option<i32> {
    n.as_i64().and_then(|i| i32::try_from(i).ok())
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Boolean(b)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Self::Integer(i)
    }
}

impl From<f64> for Value {
    fn from(d: f64) -> Self {
        Self::Double(d)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<Vec<i32>> for Value {
    fn from(v: Vec<i32>) -> Self {
        Self::IntegerArray(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn kind_matches_variant() {
        assert_eq!(Value::from(true).kind(), ValueKind::Boolean);
        assert_eq!(Value::from(7).kind(), ValueKind::Integer);
        assert_eq!(Value::from(0.5).kind(), ValueKind::Double);
        assert_eq!(Value::from("opus").kind(), ValueKind::String);
        assert_eq!(Value::from(vec![1, 2]).kind(), ValueKind::IntegerArray);
    }

    #[test]
    fn accessors_return_payload() {
        assert!(Value::from(true).boolean());
        assert_eq!(Value::from(-3).integer(), -3);
        assert_eq!(Value::from(1.25).double(), 1.25);
        assert_eq!(Value::from("vp8").string(), "vp8");
        assert_eq!(Value::from(vec![96, 97]).integer_array(), &[96, 97]);
    }

    #[test]
    #[should_panic(expected = "value kind mismatch [wanted:boolean, actual:integer]")]
    fn wrong_kind_access_panics() {
        Value::from(1).boolean();
    }

    #[test]
    #[should_panic(expected = "wanted:integer array")]
    fn wrong_kind_array_access_panics() {
        Value::from("1,2").integer_array();
    }

    #[test]
    fn checked_accessors_do_not_panic() {
        let v = Value::from("x");
        assert_eq!(v.as_string(), Some("x"));
        assert_eq!(v.as_integer(), None);
        assert_eq!(v.as_boolean(), None);
        assert_eq!(v.as_double(), None);
        assert_eq!(v.as_integer_array(), None);
    }

    #[test]
    fn from_json_classifies_numbers() {
        assert_eq!(Value::from_json(&json!(5)), Some(Value::Integer(5)));
        assert_eq!(Value::from_json(&json!(5.0)), Some(Value::Double(5.0)));
        assert_eq!(Value::from_json(&json!(-0.75)), Some(Value::Double(-0.75)));
    }

    #[test]
    fn from_json_drops_out_of_range_integers() {
        assert_eq!(Value::from_json(&json!(i64::from(i32::MAX) + 1)), None);
        assert_eq!(Value::from_json(&json!(u64::MAX)), None);
        assert_eq!(Value::from_json(&json!([1, i64::from(i32::MIN) - 1])), None);
    }

    #[test]
    fn from_json_arrays_are_all_or_nothing() {
        assert_eq!(
            Value::from_json(&json!([1, 2, 3])),
            Some(Value::IntegerArray(vec![1, 2, 3]))
        );
        assert_eq!(Value::from_json(&json!([])), None);
        assert_eq!(Value::from_json(&json!([1, "x"])), None);
        assert_eq!(Value::from_json(&json!([1, 2.5])), None);
        assert_eq!(Value::from_json(&json!([[1]])), None);
    }

    #[test]
    fn from_json_skips_null_and_objects() {
        assert_eq!(Value::from_json(&json!(null)), None);
        assert_eq!(Value::from_json(&json!({"nested": 1})), None);
    }

    #[test]
    fn to_json_is_lossless() {
        for input in [
            json!(false),
            json!(42),
            json!(3.5),
            json!("H264"),
            json!([1, -2, 3]),
        ] {
            let value = Value::from_json(&input).unwrap();
            assert_eq!(value.to_json(), input);
        }
    }
}
