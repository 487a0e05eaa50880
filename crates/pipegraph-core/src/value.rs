//! Scalar values and scalar kinds.
//!
//! [`Value`] is the closed set of leaf values an attribute can hold.
//! [`ScalarKind`] is what a descriptor declares; it decides which values a
//! scalar attribute accepts.
//!
//! Floats are stored as [`OrderedFloat`] so that values have total equality:
//! `is_default` and fingerprinting both rely on `==` being an equivalence.

use std::fmt;

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

/// A leaf value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Float(OrderedFloat<f64>),
    String(String),
}

impl Value {
    /// Short name of the variant, used in error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::String(_) => "string",
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(f.0),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Projects the value into JSON. Non-finite floats become `null`.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Int(i) => serde_json::Value::from(*i),
            Value::Float(f) => serde_json::Number::from_f64(f.0)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::String(s) => serde_json::Value::String(s.clone()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{}", x.0),
            Value::String(s) => write!(f, "{}", s),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i64::from(i))
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(OrderedFloat(f))
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

/// The scalar kind a descriptor declares.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScalarKind {
    Bool,
    Int,
    Float,
    String,
    /// A filesystem path. Output attributes are always of this kind.
    File,
    /// Exclusive choice among a fixed set of strings.
    Choice { values: Vec<String> },
}

impl ScalarKind {
    pub fn name(&self) -> &'static str {
        match self {
            ScalarKind::Bool => "bool",
            ScalarKind::Int => "int",
            ScalarKind::Float => "float",
            ScalarKind::String => "string",
            ScalarKind::File => "file",
            ScalarKind::Choice { .. } => "choice",
        }
    }

    /// Returns `true` if an edge from an output may feed this kind.
    pub fn accepts_path(&self) -> bool {
        matches!(self, ScalarKind::File | ScalarKind::String)
    }

    /// Checks a value against this kind, returning the normalized value.
    ///
    /// Integers are widened into float attributes; every other disagreement
    /// is rejected. Returns `None` when the value does not fit.
    pub fn accept(&self, value: Value) -> Option<Value> {
        match (self, value) {
            (ScalarKind::Bool, v @ Value::Bool(_)) => Some(v),
            (ScalarKind::Int, v @ Value::Int(_)) => Some(v),
            (ScalarKind::Float, v @ Value::Float(_)) => Some(v),
            (ScalarKind::Float, Value::Int(i)) => Some(Value::Float(OrderedFloat(i as f64))),
            (ScalarKind::String | ScalarKind::File, v @ Value::String(_)) => Some(v),
            (ScalarKind::Choice { values }, Value::String(s)) => {
                if values.iter().any(|allowed| *allowed == s) {
                    Some(Value::String(s))
                } else {
                    None
                }
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn int_widens_into_float() {
        assert_eq!(ScalarKind::Float.accept(Value::Int(3)), Some(Value::from(3.0)));
    }

    #[test]
    fn float_does_not_narrow_into_int() {
        assert_eq!(ScalarKind::Int.accept(Value::from(3.5)), None);
    }

    #[test]
    fn choice_rejects_values_outside_the_set() {
        let kind = ScalarKind::Choice {
            values: vec!["info".into(), "debug".into()],
        };
        assert_eq!(kind.accept(Value::from("debug")), Some(Value::from("debug")));
        assert_eq!(kind.accept(Value::from("verbose")), None);
        assert_eq!(kind.accept(Value::Int(1)), None);
    }

    #[test]
    fn file_and_string_accept_strings_only() {
        assert!(ScalarKind::File.accept(Value::from("/a")).is_some());
        assert!(ScalarKind::String.accept(Value::Bool(true)).is_none());
    }

    #[test]
    fn zero_floats_compare_equal() {
        assert_eq!(Value::from(0.0), Value::from(-0.0));
    }

    #[test]
    fn untagged_deserialization_picks_narrowest_variant() {
        let v: Value = serde_json::from_str("50").unwrap();
        assert_eq!(v, Value::Int(50));
        let v: Value = serde_json::from_str("45.5").unwrap();
        assert_eq!(v, Value::from(45.5));
        let v: Value = serde_json::from_str("\"/a\"").unwrap();
        assert_eq!(v, Value::from("/a"));
    }

    #[test]
    fn json_projection() {
        assert_eq!(Value::Int(-1).to_json(), serde_json::json!(-1));
        assert_eq!(Value::from(f64::NAN).to_json(), serde_json::Value::Null);
    }
}
