//! Statement execution seam between the mapper and a database backend.

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::{ExecutorError, Row, Statement};

/// Lazily fetched result rows.
pub type RowStream<'e> = BoxStream<'e, Result<Row, ExecutorError>>;

/// Trait for running statements against an open transactional context.
///
/// Implemented by backend transaction/connection wrappers. The mapper never
/// commits, rolls back or closes an executor; that is left to its owner.
#[async_trait]
pub trait Executor: Send {
    /// Execute a statement and return the number of rows affected.
    async fn execute(&mut self, statement: Statement) -> Result<u64, ExecutorError>;

    /// Execute a statement and return its first result row, if any.
    async fn fetch_optional(&mut self, statement: Statement)
    -> Result<Option<Row>, ExecutorError>;

    /// Execute a statement and stream its result rows.
    ///
    /// Nothing runs until the stream is first polled. A failure is yielded as
    /// the next item and ends the stream.
    fn fetch<'e>(&'e mut self, statement: Statement) -> RowStream<'e>;
}
