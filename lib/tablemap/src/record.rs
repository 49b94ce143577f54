//! Record contract for types managed by a [`TableMapper`](crate::TableMapper).
//!
//! Types implementing `Record` expose their persisted fields as static column
//! descriptors and can be hydrated from a result row. Add `#[derive(Record)]`
//! to generate the implementation together with a matching prototype type.

use serde::{Serialize, de::DeserializeOwned};

use crate::{MapperError, ROWID, Row, Value};

/// Trait for row-shaped records.
///
/// # Example
///
/// ```text
/// #[derive(Record, Serialize, Deserialize, Clone, Debug, PartialEq)]
/// pub struct Widget {
///     pub rowid: Option<i64>,
///     pub name: String,
///     pub color: String,
/// }
/// // Generates `impl Record for Widget` and `WidgetPrototype`.
/// ```
///
/// # Columns
///
/// Columns are the record's fields in declaration order, minus `rowid`.
/// Use `#[column(skip)]` to exclude a field from storage (it must deserialize
/// from a missing key, e.g. via `#[serde(default)]`) and
/// `#[column(name = "custom_name")]` to override a column name. JSON keys
/// follow the type's serde naming.
pub trait Record: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Prototype type used to filter reads.
    type Prototype: Prototype<Record = Self>;

    /// The Rust type name, for diagnostics.
    fn type_name() -> &'static str;

    /// Default table name (lower-cased type name unless overridden).
    fn table_name() -> &'static str;

    /// Column names in order, excluding `rowid`.
    fn columns() -> &'static [&'static str];

    /// Column types in order (database-agnostic).
    /// Values: "text", "integer", "real", "boolean", "json"
    fn column_types() -> &'static [&'static str];

    /// JSON key names in order. Corresponds 1:1 with columns().
    fn json_keys() -> &'static [&'static str];

    fn rowid(&self) -> Option<i64>;

    fn set_rowid(&mut self, rowid: Option<i64>);

    /// Number of columns.
    fn column_count() -> usize {
        Self::columns().len()
    }

    /// Current field values in column order, encoded for each column's type.
    fn values(&self) -> Result<Vec<Value>, MapperError> {
        let mut obj = match serde_json::to_value(self)? {
            serde_json::Value::Object(obj) => obj,
            _ => {
                return Err(MapperError::ConfigurationError {
                    record: Self::type_name().to_string(),
                    reason: "record does not serialize to an object".to_string(),
                });
            }
        };

        Self::columns()
            .iter()
            .zip(Self::json_keys())
            .zip(Self::column_types())
            .map(|((column, key), column_type)| {
                let value = obj.remove(*key).unwrap_or(serde_json::Value::Null);
                Value::for_column(column, column_type, value)
            })
            .collect()
    }

    /// Build a fresh record from a result row, including `rowid`.
    ///
    /// Null values are omitted so optional fields fall back to serde defaults.
    fn from_row(mut row: Row) -> Result<Self, MapperError> {
        let mut obj = serde_json::Map::new();

        let rowid = row.take(ROWID).unwrap_or(Value::Null);
        obj.insert(ROWID.to_string(), rowid.into_json("integer")?);

        let fields = Self::columns()
            .iter()
            .zip(Self::json_keys())
            .zip(Self::column_types());
        for ((column, json_key), column_type) in fields {
            let value = row.take(column).unwrap_or(Value::Null);
            if !value.is_null() {
                obj.insert((*json_key).to_string(), value.into_json(column_type)?);
            }
        }

        Ok(serde_json::from_value(serde_json::Value::Object(obj))?)
    }
}

/// A query prototype: which columns a read constrains, and to what.
///
/// Generated by `#[derive(Record)]` as `<Name>Prototype`, with a
/// [`Match`] per field. `Default` leaves every field unconstrained.
pub trait Prototype: Default + Clone + Send + Sync + 'static {
    type Record: Record;

    /// `(column, value)` pairs for every constrained field; `rowid` first,
    /// then declaration order.
    fn predicates(&self) -> Result<Vec<(&'static str, Value)>, MapperError>;
}

/// A prototype field: either unconstrained or an exact value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Match<T> {
    Any,
    Exactly(T),
}

impl<T> Match<T> {
    pub fn is_any(&self) -> bool {
        matches!(self, Match::Any)
    }

    pub fn as_exact(&self) -> Option<&T> {
        match self {
            Match::Any => None,
            Match::Exactly(value) => Some(value),
        }
    }
}

impl<T: Serialize> Match<T> {
    /// The value bound for this field, encoded the way `column` stores it,
    /// or `None` when unconstrained.
    pub fn to_value(&self, column: &str, column_type: &str) -> Result<Option<Value>, MapperError> {
        match self {
            Match::Any => Ok(None),
            Match::Exactly(value) => {
                let value = serde_json::to_value(value)?;
                Ok(Some(Value::for_column(column, column_type, value)?))
            }
        }
    }
}

impl<T> Default for Match<T> {
    fn default() -> Self {
        Match::Any
    }
}

impl<T> From<T> for Match<T> {
    fn from(value: T) -> Self {
        Match::Exactly(value)
    }
}
