//! Input row contract
//!
//! Rows arrive from the ingestion pipeline and are read the same way by the
//! filter compiler, the path compiler and the streaming aggregator: one column
//! at a time, by name.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// A column value carried by an input row
///
/// Deserializes from plain JSON: `5` becomes `Long`, `5.5` becomes `Double`,
/// objects become nested `Map`s.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// Explicit null
    Null,
    /// Boolean flag
    Bool(bool),
    /// Integral number
    Long(i64),
    /// Floating point number
    Double(f64),
    /// Text
    String(String),
    /// Nested string-keyed map (e.g. `tags`)
    Map(HashMap<String, Value>),
}

impl Value {
    /// Check for an explicit null
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Numeric view of the value; numeric strings are coerced
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Long(v) => Some(*v as f64),
            Value::Double(v) => Some(*v),
            Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        }
    }

    /// Integral view of the value (no coercion from strings or doubles)
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Long(v) => Some(*v),
            _ => None,
        }
    }

    /// String view of the value
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Look up a key when this value is a map
    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            Value::Map(map) => map.get(key),
            _ => None,
        }
    }

    /// Short type name used in diagnostics
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Long(_) => "long",
            Value::Double(_) => "double",
            Value::String(_) => "string",
            Value::Map(_) => "map",
        }
    }

    /// Render the value as a grouping dimension; null becomes `None`
    pub fn to_dimension(&self) -> Option<String> {
        match self {
            Value::Null => None,
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Long(v) => write!(f, "{}", v),
            Value::Double(v) => write!(f, "{}", v),
            Value::String(s) => write!(f, "{}", s),
            // Through serde_json::Value so keys come out sorted at every level
            Value::Map(_) => match serde_json::to_value(self) {
                Ok(json) => write!(f, "{}", json),
                Err(_) => write!(f, "{{...}}"),
            },
        }
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

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Long(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<HashMap<String, Value>> for Value {
    fn from(map: HashMap<String, Value>) -> Self {
        Value::Map(map)
    }
}

/// A row readable column by column
///
/// Implementations must be cheap to query repeatedly; compiled filters and
/// paths resolve columns at evaluation time, never at compile time.
pub trait InputRow {
    /// Get a column value, `None` when the column is absent
    fn get_column(&self, name: &str) -> Option<&Value>;
}

impl InputRow for HashMap<String, Value> {
    fn get_column(&self, name: &str) -> Option<&Value> {
        self.get(name)
    }
}

impl InputRow for BTreeMap<String, Value> {
    fn get_column(&self, name: &str) -> Option<&Value> {
        self.get(name)
    }
}

/// Build a row from `(column, value)` pairs
pub fn row_of<I, K, V>(pairs: I) -> HashMap<String, Value>
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<Value>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_json_row() {
        let row: HashMap<String, Value> = serde_json::from_str(
            r#"{"a": 1, "b": 2.5, "c": "x", "d": true, "e": null, "tags": {"k": "v"}}"#,
        )
        .unwrap();

        assert_eq!(row.get_column("a"), Some(&Value::Long(1)));
        assert_eq!(row.get_column("b"), Some(&Value::Double(2.5)));
        assert_eq!(row.get_column("c"), Some(&Value::String("x".into())));
        assert_eq!(row.get_column("d"), Some(&Value::Bool(true)));
        assert_eq!(row.get_column("e"), Some(&Value::Null));
        assert_eq!(
            row.get_column("tags").and_then(|t| t.get("k")),
            Some(&Value::String("v".into()))
        );
        assert!(row.get_column("missing").is_none());
    }

    #[test]
    fn test_numeric_coercion() {
        assert_eq!(Value::Long(3).as_f64(), Some(3.0));
        assert_eq!(Value::String(" 4.5 ".into()).as_f64(), Some(4.5));
        assert_eq!(Value::String("abc".into()).as_f64(), None);
        assert_eq!(Value::Bool(true).as_f64(), None);
    }

    #[test]
    fn test_equal_maps_render_identically() {
        let pairs: Vec<(String, Value)> = (0..8)
            .map(|i| (format!("key{}", i), Value::Long(i)))
            .collect();
        let nested = Value::Map(pairs.iter().cloned().collect());
        let render = || {
            let mut map: HashMap<String, Value> = pairs.iter().cloned().rev().collect();
            map.insert("nested".to_string(), nested.clone());
            Value::Map(map).to_dimension()
        };

        let first = render();
        assert!(first.as_deref().map_or(false, |s| s.starts_with("{\"key0\":0,\"key1\":1")));
        for _ in 0..20 {
            assert_eq!(render(), first);
        }
    }

    #[test]
    fn test_dimension_rendering() {
        assert_eq!(Value::from("A").to_dimension(), Some("A".to_string()));
        assert_eq!(Value::Long(7).to_dimension(), Some("7".to_string()));
        assert_eq!(Value::Null.to_dimension(), None);
    }
}
