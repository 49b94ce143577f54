//! Value binding and row decoding for SQLite statements.

use sqlx::sqlite::{SqliteArguments, SqliteRow, SqliteValueRef};
use sqlx::{Arguments, Column, Decode, Row as _, Sqlite, TypeInfo, ValueRef};
use tablemap::{ExecutorError, Row, Value};

/// Bind statement parameters to SqliteArguments, in order.
pub fn bind_values<'q>(values: Vec<Value>) -> Result<SqliteArguments<'q>, ExecutorError> {
    let mut args = SqliteArguments::default();

    for value in values {
        match value {
            Value::Null => args.add(None::<String>),
            Value::Integer(n) => args.add(n),
            Value::Real(n) => args.add(n),
            Value::Bool(b) => args.add(b),
            Value::Text(s) => args.add(s),
            Value::Blob(bytes) => args.add(bytes),
        }
        .map_err(ExecutorError::new)?;
    }

    Ok(args)
}

/// Decode a SQLite row into column-name/value pairs.
///
/// Columns created by the mapper carry no declared type, so each value is
/// decoded by its storage class.
pub fn decode_row(row: &SqliteRow) -> Result<Row, ExecutorError> {
    let mut decoded = Row::with_capacity(row.columns().len());

    for (idx, column) in row.columns().iter().enumerate() {
        let raw = row.try_get_raw(idx).map_err(ExecutorError::new)?;
        decoded.push(column.name(), decode_value(raw)?);
    }

    Ok(decoded)
}

fn decode_value(raw: SqliteValueRef<'_>) -> Result<Value, ExecutorError> {
    if raw.is_null() {
        return Ok(Value::Null);
    }

    let storage_class = raw.type_info().name().to_ascii_uppercase();
    let value = match storage_class.as_str() {
        "INTEGER" | "INT" | "INT8" | "BIGINT" | "BOOLEAN" => {
            Value::Integer(<i64 as Decode<'_, Sqlite>>::decode(raw).map_err(ExecutorError::new)?)
        }
        "REAL" | "FLOAT" | "DOUBLE" => {
            Value::Real(<f64 as Decode<'_, Sqlite>>::decode(raw).map_err(ExecutorError::new)?)
        }
        "BLOB" => Value::Blob(<Vec<u8> as Decode<'_, Sqlite>>::decode(raw).map_err(ExecutorError::new)?),
        // Default: treat as text (TEXT, DATETIME, NUMERIC, etc.)
        _ => Value::Text(<String as Decode<'_, Sqlite>>::decode(raw).map_err(ExecutorError::new)?),
    };

    Ok(value)
}
