//! Coercion of decoded JSON values into storage values.
//!
//! This is the only place where a loosely-typed `serde_json::Value` is
//! narrowed into something SQLite can bind. Numbers keep their original text
//! (`serde_json` is built with `arbitrary_precision`), so values beyond the
//! safe-integer boundary can be stored as exact decimal text instead of being
//! rounded through an `f64`.

use rusqlite::ToSql;
use rusqlite::types::{ToSqlOutput, ValueRef};
use serde_json::{Number, Value};

/// Largest integer exactly representable as an `f64` (2^53 - 1).
pub const MAX_SAFE_INTEGER: u64 = 9_007_199_254_740_991;

/// A value ready to be bound to an insert statement.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    /// Stored as INTEGER 0/1.
    Bool(bool),
    /// A JSON string, unchanged.
    String(String),
    Int64(i64),
    Float64(f64),
    /// Text produced by coercion: out-of-range numbers and nested JSON.
    Text(String),
}

impl ToSql for SqlValue {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        let value = match self {
            SqlValue::Null => ValueRef::Null,
            SqlValue::Bool(b) => ValueRef::Integer(i64::from(*b)),
            SqlValue::Int64(i) => ValueRef::Integer(*i),
            SqlValue::Float64(f) => ValueRef::Real(*f),
            SqlValue::String(s) | SqlValue::Text(s) => ValueRef::Text(s.as_bytes()),
        };
        Ok(ToSqlOutput::Borrowed(value))
    }
}

/// Coerce a decoded JSON value into its storage representation.
pub fn coerce(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Bool(*b),
        Value::String(s) => SqlValue::String(s.clone()),
        Value::Number(n) => coerce_number(n),
        Value::Array(_) | Value::Object(_) => SqlValue::Text(canonical_json(value)),
    }
}

fn coerce_number(n: &Number) -> SqlValue {
    // Integer literals that fit i64.
    if let Some(i) = n.as_i64() {
        return if i.unsigned_abs() <= MAX_SAFE_INTEGER {
            SqlValue::Int64(i)
        } else {
            SqlValue::Text(n.to_string())
        };
    }
    // Larger integer literals only parse as u64 and are always out of range.
    if n.is_u64() {
        return SqlValue::Text(n.to_string());
    }

    match n.as_f64() {
        Some(f) if f.is_finite() && f.abs() <= MAX_SAFE_INTEGER as f64 => SqlValue::Float64(f),
        _ => SqlValue::Text(n.to_string()),
    }
}

/// Render `value` as compact JSON with object keys sorted at every depth.
pub fn canonical_json(value: &Value) -> String {
    sorted(value).to_string()
}

fn sorted(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_unstable_by(|(a, _), (b, _)| a.cmp(b));
            Value::Object(
                entries
                    .into_iter()
                    .map(|(key, value)| (key.clone(), sorted(value)))
                    .collect(),
            )
        }
        Value::Array(items) => Value::Array(items.iter().map(sorted).collect()),
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn number(text: &str) -> Value {
        serde_json::from_str(text).unwrap()
    }

    #[test]
    fn test_scalars() {
        assert_eq!(coerce(&Value::Null), SqlValue::Null);
        assert_eq!(coerce(&json!(true)), SqlValue::Bool(true));
        assert_eq!(
            coerce(&json!("hello")),
            SqlValue::String("hello".to_string())
        );
    }

    #[test]
    fn test_safe_integers_stay_integers() {
        assert_eq!(coerce(&number("42")), SqlValue::Int64(42));
        assert_eq!(coerce(&number("-17")), SqlValue::Int64(-17));
        assert_eq!(
            coerce(&number("9007199254740991")),
            SqlValue::Int64(9_007_199_254_740_991)
        );
        assert_eq!(
            coerce(&number("-9007199254740991")),
            SqlValue::Int64(-9_007_199_254_740_991)
        );
    }

    #[test]
    fn test_integers_past_boundary_keep_their_text() {
        assert_eq!(
            coerce(&number("9007199254740992")),
            SqlValue::Text("9007199254740992".to_string())
        );
        assert_eq!(
            coerce(&number("12345678901234567890")),
            SqlValue::Text("12345678901234567890".to_string())
        );
        assert_eq!(
            coerce(&number("-99999999999999999999999")),
            SqlValue::Text("-99999999999999999999999".to_string())
        );
    }

    #[test]
    fn test_floats() {
        assert_eq!(coerce(&number("1.5")), SqlValue::Float64(1.5));
        assert_eq!(coerce(&number("-0.25")), SqlValue::Float64(-0.25));
        assert_eq!(coerce(&number("1e3")), SqlValue::Float64(1000.0));
        assert_eq!(coerce(&number("1e300")), SqlValue::Text("1e300".to_string()));
    }

    #[test]
    fn test_nested_values_become_canonical_json() {
        assert_eq!(
            coerce(&json!({"x": 1})),
            SqlValue::Text(r#"{"x":1}"#.to_string())
        );
        assert_eq!(
            coerce(&json!(["a", null, 2])),
            SqlValue::Text(r#"["a",null,2]"#.to_string())
        );
    }

    #[test]
    fn test_canonical_json_sorts_keys_recursively() {
        let value: Value =
            serde_json::from_str(r#"{"b": [1, {"d": 1, "c": 2}], "a": {"z": true, "y": null}}"#)
                .unwrap();
        assert_eq!(
            canonical_json(&value),
            r#"{"a":{"y":null,"z":true},"b":[1,{"c":2,"d":1}]}"#
        );
    }

    #[test]
    fn test_canonical_json_preserves_number_text() {
        let value: Value = serde_json::from_str(r#"{"n": 12345678901234567890}"#).unwrap();
        assert_eq!(canonical_json(&value), r#"{"n":12345678901234567890}"#);
    }

    #[test]
    fn test_to_sql_binds_bool_as_integer() {
        let output = SqlValue::Bool(true).to_sql().unwrap();
        assert!(matches!(output, ToSqlOutput::Borrowed(ValueRef::Integer(1))));
    }
}
