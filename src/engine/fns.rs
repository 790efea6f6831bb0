//! Pure helper functions exposed to the rendering layer as `fns`, plus the
//! `empty` check used by state derivation.

use crate::types::Value;

/// `empty` semantics:
/// - `null`, `""`, `[]`, `{}` are empty
/// - numbers and booleans are never empty
/// - everything else is not empty
pub fn empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(_) | Value::Number(_) => false,
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
    }
}

/// Helper functions available to templates.
#[derive(Debug, Clone, Copy, Default)]
pub struct Fns;

impl Fns {
    /// Number of keys (objects), items (arrays) or characters (strings).
    pub fn length(&self, value: &Value) -> usize {
        match value {
            Value::Object(map) => map.len(),
            Value::Array(items) => items.len(),
            Value::String(s) => s.chars().count(),
            _ => 0,
        }
    }

    /// Numeric coercion. Non-numeric input yields `NaN`.
    pub fn number(&self, value: &Value) -> f64 {
        match value {
            Value::Null => 0.0,
            Value::Bool(b) => f64::from(u8::from(*b)),
            Value::Number(n) => n.as_f64().unwrap_or(f64::NAN),
            Value::String(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    0.0
                } else {
                    trimmed.parse().unwrap_or(f64::NAN)
                }
            }
            Value::Array(_) | Value::Object(_) => f64::NAN,
        }
    }

    /// String coercion. Strings come back unquoted.
    pub fn string(&self, value: &Value) -> String {
        match value {
            Value::String(s) => s.clone(),
            Value::Array(items) => items
                .iter()
                .map(|item| match item {
                    Value::Null => String::new(),
                    other => self.string(other),
                })
                .collect::<Vec<_>>()
                .join(","),
            Value::Object(_) => "[object Object]".to_string(),
            other => other.to_string(),
        }
    }

    /// JSON encoding.
    pub fn json(&self, value: &Value) -> String {
        serde_json::to_string(value).unwrap_or_default()
    }

    /// Deep equality.
    pub fn eq(&self, a: &Value, b: &Value) -> bool {
        a == b
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_empty_pinned_semantics() {
        assert!(empty(&Value::Null));
        assert!(empty(&json!("")));
        assert!(empty(&json!([])));
        assert!(empty(&json!({})));

        assert!(!empty(&json!(0)));
        assert!(!empty(&json!(0.0)));
        assert!(!empty(&json!(false)));
        assert!(!empty(&json!(" ")));
        assert!(!empty(&json!("x")));
        assert!(!empty(&json!([null])));
        assert!(!empty(&json!({ "a": null })));
    }

    #[test]
    fn test_length() {
        let fns = Fns;
        assert_eq!(fns.length(&json!({ "a": 1, "b": 2 })), 2);
        assert_eq!(fns.length(&json!([1, 2, 3])), 3);
        assert_eq!(fns.length(&json!("héllo")), 5);
        assert_eq!(fns.length(&json!(12)), 0);
    }

    #[test]
    fn test_number() {
        let fns = Fns;
        assert_eq!(fns.number(&json!("42")), 42.0);
        assert_eq!(fns.number(&json!(" 1.5 ")), 1.5);
        assert_eq!(fns.number(&json!("")), 0.0);
        assert_eq!(fns.number(&json!(true)), 1.0);
        assert_eq!(fns.number(&Value::Null), 0.0);
        assert!(fns.number(&json!("abc")).is_nan());
        assert!(fns.number(&json!({})).is_nan());
    }

    #[test]
    fn test_string_and_json() {
        let fns = Fns;
        assert_eq!(fns.string(&json!("hi")), "hi");
        assert_eq!(fns.string(&json!(3)), "3");
        assert_eq!(fns.string(&json!([1, "a", null])), "1,a,");
        assert_eq!(fns.string(&json!({ "a": 1 })), "[object Object]");
        assert_eq!(fns.string(&Value::Null), "null");
        assert_eq!(fns.json(&json!("hi")), "\"hi\"");
        assert_eq!(fns.json(&json!({ "a": [1] })), "{\"a\":[1]}");
    }

    #[test]
    fn test_eq_is_deep() {
        let fns = Fns;
        assert!(fns.eq(&json!({ "a": [1, 2] }), &json!({ "a": [1, 2] })));
        assert!(!fns.eq(&json!({ "a": [1, 2] }), &json!({ "a": [2, 1] })));
        assert!(!fns.eq(&json!(1), &json!("1")));
    }
}
