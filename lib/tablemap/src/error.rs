use std::error::Error as StdError;

use thiserror::Error;

/// Failure reported by an [`Executor`](crate::Executor) implementation.
///
/// Wraps whatever the underlying engine raised; the mapper adds the
/// operation and table before handing it back to the caller.
#[derive(Error, Debug)]
#[error("{source}")]
pub struct ExecutorError {
    source: Box<dyn StdError + Send + Sync>,
}

impl ExecutorError {
    pub fn new(source: impl Into<Box<dyn StdError + Send + Sync>>) -> Self {
        Self {
            source: source.into(),
        }
    }

    pub fn into_inner(self) -> Box<dyn StdError + Send + Sync> {
        self.source
    }
}

#[derive(Error, Debug)]
pub enum MapperError {
    #[error("Configuration error for {record}: {reason}")]
    ConfigurationError { record: String, reason: String },

    #[error("Schema error on {table} ({operation}): {reason}")]
    SchemaError {
        operation: &'static str,
        table: String,
        reason: String,
    },

    #[error("Write error on {table} ({operation}): {reason}")]
    WriteError {
        operation: &'static str,
        table: String,
        reason: String,
    },

    #[error("Query error on {table}: {reason}")]
    QueryError { table: String, reason: String },

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

impl MapperError {
    pub(crate) fn schema(operation: &'static str, table: &str, reason: impl ToString) -> Self {
        MapperError::SchemaError {
            operation,
            table: table.to_string(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn write(operation: &'static str, table: &str, reason: impl ToString) -> Self {
        MapperError::WriteError {
            operation,
            table: table.to_string(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn query(table: &str, reason: impl ToString) -> Self {
        MapperError::QueryError {
            table: table.to_string(),
            reason: reason.to_string(),
        }
    }
}
