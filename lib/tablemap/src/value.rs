//! Values bound to statement parameters and returned in result rows.

use serde::de::Error as _;
use serde_json::Number;

use crate::MapperError;

/// A value that can be bound to a statement parameter or read back from a row.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Integer(i64),
    Real(f64),
    Bool(bool),
    Text(String),
    Blob(Vec<u8>),
}

impl Value {
    /// Convert a serialized field into a bindable value.
    ///
    /// Arrays and objects are stored as JSON text.
    pub fn from_json(value: serde_json::Value) -> Result<Self, MapperError> {
        let value = match value {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Integer(i)
                } else if n.is_u64() {
                    return Err(MapperError::SerializationError(serde_json::Error::custom(
                        format!("integer {} does not fit in a signed 64-bit column", n),
                    )));
                } else if let Some(f) = n.as_f64() {
                    Value::Real(f)
                } else {
                    Value::Text(n.to_string())
                }
            }
            serde_json::Value::String(s) => Value::Text(s),
            complex @ (serde_json::Value::Array(_) | serde_json::Value::Object(_)) => {
                Value::Text(serde_json::to_string(&complex)?)
            }
        };

        Ok(value)
    }

    /// Convert a serialized field into the value stored in a column of
    /// `column_type`.
    ///
    /// `json` columns hold the JSON text of any non-null value, scalars
    /// included. Other columns only take scalars; an array or object there
    /// would not read back, so it is rejected.
    pub fn for_column(
        column: &str,
        column_type: &str,
        value: serde_json::Value,
    ) -> Result<Self, MapperError> {
        match value {
            serde_json::Value::Null => Ok(Value::Null),
            value if column_type == "json" => Ok(Value::Text(serde_json::to_string(&value)?)),
            serde_json::Value::Array(_) | serde_json::Value::Object(_) => {
                Err(MapperError::SerializationError(serde_json::Error::custom(format!(
                    "column {} has type {} but holds a nested value; mark the field #[column(json)]",
                    column, column_type
                ))))
            }
            scalar => Value::from_json(scalar),
        }
    }

    /// Convert a value read from a row back into its serialized form.
    ///
    /// `column_type` is one of the tags produced by the derive macro (`text`,
    /// `integer`, `real`, `boolean`, `json`).
    pub fn into_json(self, column_type: &str) -> Result<serde_json::Value, MapperError> {
        let value = match self {
            Value::Null => serde_json::Value::Null,
            Value::Integer(i) if column_type == "boolean" => serde_json::Value::Bool(i != 0),
            Value::Integer(i) => serde_json::Value::Number(i.into()),
            Value::Real(f) => Number::from_f64(f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::Bool(b) => serde_json::Value::Bool(b),
            Value::Text(s) if column_type == "json" => serde_json::from_str(&s)?,
            Value::Text(s) => serde_json::Value::String(s),
            Value::Blob(bytes) => serde_json::Value::Array(
                bytes
                    .into_iter()
                    .map(|b| serde_json::Value::Number(b.into()))
                    .collect(),
            ),
        };

        Ok(value)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<&String> for Value {
    fn from(s: &String) -> Self {
        Value::Text(s.clone())
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Integer(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Integer(n.into())
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Real(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<Vec<u8>> for Value {
    fn from(bytes: Vec<u8>) -> Self {
        Value::Blob(bytes)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Value::Null)
    }
}

/// One result row: column names mapped to values, in result-set order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    columns: Vec<(String, Value)>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            columns: Vec::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, column: impl Into<String>, value: Value) {
        self.columns.push((column.into(), value));
    }

    /// First value stored under `column`.
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.columns
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }

    /// Remove and return the first value stored under `column`.
    pub fn take(&mut self, column: &str) -> Option<Value> {
        let idx = self.columns.iter().position(|(name, _)| name == column)?;
        Some(self.columns.remove(idx).1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.columns.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

impl<K: Into<String>> FromIterator<(K, Value)> for Row {
    fn from_iter<I: IntoIterator<Item = (K, Value)>>(iter: I) -> Self {
        Self {
            columns: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn integers_and_text_convert_directly() {
        assert_eq!(
            Value::from_json(json!(42)).unwrap(),
            Value::Integer(42)
        );
        assert_eq!(
            Value::from_json(json!("bolt")).unwrap(),
            Value::Text("bolt".into())
        );
        assert_eq!(Value::from_json(json!(null)).unwrap(), Value::Null);
    }

    #[test]
    fn unsigned_overflow_is_rejected() {
        let err = Value::from_json(json!(u64::MAX)).unwrap_err();
        assert!(matches!(err, MapperError::SerializationError(_)));
    }

    #[test]
    fn complex_values_are_stored_as_json_text() {
        let value = Value::from_json(json!(["a", "b"])).unwrap();
        assert_eq!(value, Value::Text(r#"["a","b"]"#.into()));
        assert_eq!(value.into_json("json").unwrap(), json!(["a", "b"]));
    }

    #[test]
    fn json_columns_encode_every_value_as_json_text() {
        let value = Value::for_column("body", "json", json!("hello")).unwrap();
        assert_eq!(value, Value::Text(r#""hello""#.into()));
        assert_eq!(value.into_json("json").unwrap(), json!("hello"));

        let value = Value::for_column("dims", "json", json!({"w": 1, "h": 2})).unwrap();
        assert_eq!(value, Value::Text(r#"{"w":1,"h":2}"#.into()));
        assert_eq!(value.into_json("json").unwrap(), json!({"w": 1, "h": 2}));

        assert_eq!(Value::for_column("body", "json", json!(null)).unwrap(), Value::Null);
    }

    #[test]
    fn nested_values_need_a_json_column() {
        let err = Value::for_column("dims", "text", json!({"w": 1})).unwrap_err();
        assert!(matches!(err, MapperError::SerializationError(_)));
        assert!(err.to_string().contains("dims"));

        assert!(Value::for_column("tags", "text", json!(["a"])).is_err());
        assert_eq!(
            Value::for_column("qty", "integer", json!(3)).unwrap(),
            Value::Integer(3)
        );
    }

    #[test]
    fn boolean_columns_read_back_from_integers() {
        assert_eq!(Value::Integer(1).into_json("boolean").unwrap(), json!(true));
        assert_eq!(Value::Integer(0).into_json("boolean").unwrap(), json!(false));
        assert_eq!(Value::Integer(0).into_json("integer").unwrap(), json!(0));
    }

    #[test]
    fn row_lookup_by_column_name() {
        let mut row: Row = [("rowid", Value::Integer(1)), ("name", Value::from("bolt"))]
            .into_iter()
            .collect();
        assert_eq!(row.len(), 2);
        assert_eq!(row.get("name"), Some(&Value::Text("bolt".into())));
        assert_eq!(row.take("rowid"), Some(Value::Integer(1)));
        assert!(row.get("rowid").is_none());
        assert!(row.get("missing").is_none());
    }
}
