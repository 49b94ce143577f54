//! Table mapper: schema setup and CRUD for one record type.

use std::collections::HashSet;
use std::marker::PhantomData;

use futures::future;
use futures::stream::{BoxStream, StreamExt, TryStreamExt};
use tracing::{debug, warn};

use crate::statement::{self, ROWID, Statement, Window, is_safe_identifier};
use crate::{Executor, MapperError, Prototype, Query, Record, Value};

/// Lazily hydrated records produced by [`TableMapper::read`].
pub type RecordStream<'e, R> = BoxStream<'e, Result<R, MapperError>>;

/// Result of an update or delete.
#[must_use]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// The statement ran. Zero rows affected means no row had the rowid.
    Applied { rows_affected: u64 },
    /// Nothing was sent to the database.
    Skipped(SkipReason),
}

impl WriteOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, WriteOutcome::Applied { .. })
    }

    pub fn rows_affected(&self) -> Option<u64> {
        match self {
            WriteOutcome::Applied { rows_affected } => Some(*rows_affected),
            WriteOutcome::Skipped(_) => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The record has never been persisted, so there is no row to address.
    MissingRowid,
}

/// Maps a [`Record`] type onto one table.
///
/// The mapper holds only the table name; every operation takes the executor
/// to run against, and the caller owns that executor's transaction. A mapper
/// can be shared freely between concurrent units of work.
///
/// # Example
///
/// ```text
/// let widgets = TableMapper::<Widget>::new()?;
/// let mut tx = pool.begin().await?;
/// widgets.ensure_table(&mut tx, &[]).await?;
/// widgets.create(&mut tx, &mut widget).await?;
/// tx.commit().await?;
/// ```
#[derive(Debug)]
pub struct TableMapper<R: Record> {
    table: String,
    _marker: PhantomData<fn() -> R>,
}

impl<R: Record> Clone for TableMapper<R> {
    fn clone(&self) -> Self {
        Self {
            table: self.table.clone(),
            _marker: PhantomData,
        }
    }
}

impl<R: Record> TableMapper<R> {
    /// Bind to the record type's default table.
    pub fn new() -> Result<Self, MapperError> {
        Self::for_table(R::table_name())
    }

    /// Bind to an explicit table name.
    pub fn for_table(table: impl Into<String>) -> Result<Self, MapperError> {
        let table = table.into();
        let invalid = |reason: String| MapperError::ConfigurationError {
            record: R::type_name().to_string(),
            reason,
        };

        if !is_safe_identifier(&table) {
            return Err(invalid(format!("table name {:?} is not a safe identifier", table)));
        }

        let columns = R::columns();
        if columns.is_empty() {
            return Err(invalid("record has no persisted fields".to_string()));
        }
        if columns.len() != R::json_keys().len() || columns.len() != R::column_types().len() {
            return Err(invalid("column descriptors are misaligned".to_string()));
        }

        let mut seen = HashSet::new();
        for column in columns {
            if !is_safe_identifier(column) {
                return Err(invalid(format!("column {:?} is not a safe identifier", column)));
            }
            if column.eq_ignore_ascii_case(ROWID) {
                return Err(invalid(format!("column {:?} shadows the row identifier", column)));
            }
            if !seen.insert(column.to_ascii_lowercase()) {
                return Err(invalid(format!("column {:?} is declared twice", column)));
            }
        }

        Ok(Self {
            table,
            _marker: PhantomData,
        })
    }

    pub fn table_name(&self) -> &str {
        &self.table
    }

    /// Persisted columns in declaration order, excluding `rowid`.
    pub fn columns(&self) -> &'static [&'static str] {
        R::columns()
    }

    /// Create the table if it does not exist, optionally with a composite primary key.
    pub async fn ensure_table<E>(
        &self,
        executor: &mut E,
        primary_key: &[&str],
    ) -> Result<(), MapperError>
    where
        E: Executor + ?Sized,
    {
        const OPERATION: &str = "create table";

        if let Some(column) = primary_key.iter().find(|c| !is_safe_identifier(c)) {
            return Err(MapperError::schema(
                OPERATION,
                &self.table,
                format!("primary key column {:?} is not a safe identifier", column),
            ));
        }

        let statement = statement::create_table(&self.table, R::columns(), primary_key);
        self.trace(OPERATION, &statement);
        executor
            .execute(statement)
            .await
            .map_err(|e| MapperError::schema(OPERATION, &self.table, e))?;
        Ok(())
    }

    /// Create a (unique) index over `columns` if one named `name` does not exist.
    pub async fn ensure_index<E>(
        &self,
        executor: &mut E,
        name: &str,
        columns: &[&str],
        unique: bool,
    ) -> Result<(), MapperError>
    where
        E: Executor + ?Sized,
    {
        const OPERATION: &str = "create index";

        if !is_safe_identifier(name) {
            return Err(MapperError::schema(
                OPERATION,
                &self.table,
                format!("index name {:?} is not a safe identifier", name),
            ));
        }
        if columns.is_empty() {
            return Err(MapperError::schema(
                OPERATION,
                &self.table,
                format!("index {} has no columns", name),
            ));
        }
        if let Some(column) = columns.iter().find(|c| !is_safe_identifier(c)) {
            return Err(MapperError::schema(
                OPERATION,
                &self.table,
                format!("index column {:?} is not a safe identifier", column),
            ));
        }

        let statement = statement::create_index(name, &self.table, columns, unique);
        self.trace(OPERATION, &statement);
        executor
            .execute(statement)
            .await
            .map_err(|e| MapperError::schema(OPERATION, &self.table, e))?;
        Ok(())
    }

    /// Insert the record and store the assigned rowid on it.
    ///
    /// On failure the record's rowid is left untouched.
    pub async fn create<E>(&self, executor: &mut E, record: &mut R) -> Result<i64, MapperError>
    where
        E: Executor + ?Sized,
    {
        const OPERATION: &str = "insert";

        let statement = statement::insert(&self.table, R::columns(), record.values()?);
        self.trace(OPERATION, &statement);

        let row = executor
            .fetch_optional(statement)
            .await
            .map_err(|e| MapperError::write(OPERATION, &self.table, e))?
            .ok_or_else(|| MapperError::write(OPERATION, &self.table, "no rowid returned"))?;

        let rowid = match row.get(ROWID) {
            Some(Value::Integer(rowid)) => *rowid,
            other => {
                return Err(MapperError::write(
                    OPERATION,
                    &self.table,
                    format!("unexpected rowid value {:?}", other),
                ));
            }
        };

        record.set_rowid(Some(rowid));
        Ok(rowid)
    }

    /// Stream the records matching `query`.
    ///
    /// The statement is built eagerly (so prototype and order-by problems are
    /// reported here) but runs only when the stream is first polled. Execution
    /// and fetch failures arrive as `QueryError` items; a row that does not
    /// hydrate into `R` arrives as a `SerializationError` item. The stream
    /// ends after the first error.
    pub fn read<'e, E>(
        &self,
        executor: &'e mut E,
        query: &Query<R>,
    ) -> Result<RecordStream<'e, R>, MapperError>
    where
        E: Executor + ?Sized,
    {
        let statement = self.select(query)?;
        self.trace("select", &statement);

        let table = self.table.clone();
        let records = executor
            .fetch(statement)
            .map(move |row| {
                let row = row.map_err(|e| MapperError::query(&table, e))?;
                R::from_row(row)
            })
            .scan(false, |failed, record| {
                if *failed {
                    return future::ready(None);
                }
                *failed = record.is_err();
                future::ready(Some(record))
            });

        Ok(records.boxed())
    }

    /// Collect every record matching `query`.
    pub async fn read_all<E>(&self, executor: &mut E, query: &Query<R>) -> Result<Vec<R>, MapperError>
    where
        E: Executor + ?Sized,
    {
        self.read(executor, query)?.try_collect().await
    }

    /// Replace every column of the row addressed by the record's rowid.
    pub async fn update<E>(&self, executor: &mut E, record: &R) -> Result<WriteOutcome, MapperError>
    where
        E: Executor + ?Sized,
    {
        const OPERATION: &str = "update";

        let Some(rowid) = record.rowid() else {
            return Ok(self.skip(OPERATION));
        };

        let statement = statement::update(&self.table, R::columns(), record.values()?, rowid);
        self.trace(OPERATION, &statement);
        let rows_affected = executor
            .execute(statement)
            .await
            .map_err(|e| MapperError::write(OPERATION, &self.table, e))?;

        Ok(WriteOutcome::Applied { rows_affected })
    }

    /// Delete the row addressed by the record's rowid.
    pub async fn delete<E>(&self, executor: &mut E, record: &R) -> Result<WriteOutcome, MapperError>
    where
        E: Executor + ?Sized,
    {
        const OPERATION: &str = "delete";

        let Some(rowid) = record.rowid() else {
            return Ok(self.skip(OPERATION));
        };

        let statement = statement::delete(&self.table, rowid);
        self.trace(OPERATION, &statement);
        let rows_affected = executor
            .execute(statement)
            .await
            .map_err(|e| MapperError::write(OPERATION, &self.table, e))?;

        Ok(WriteOutcome::Applied { rows_affected })
    }

    fn select(&self, query: &Query<R>) -> Result<Statement, MapperError> {
        let predicates = match &query.prototype {
            Some(prototype) => prototype.predicates()?,
            None => Vec::new(),
        };

        let order_by = match &query.order_by {
            Some((column, order)) => {
                if !is_safe_identifier(column) {
                    return Err(MapperError::query(
                        &self.table,
                        format!("order-by column {:?} is not a safe identifier", column),
                    ));
                }
                Some((column.as_str(), *order))
            }
            None => None,
        };

        let window = Window {
            order_by,
            limit: query.limit,
            offset: query.offset,
        };
        Ok(statement::select(&self.table, predicates, window))
    }

    fn skip(&self, operation: &'static str) -> WriteOutcome {
        warn!(table = %self.table, operation, "record has no rowid, skipping");
        WriteOutcome::Skipped(SkipReason::MissingRowid)
    }

    fn trace(&self, operation: &'static str, statement: &Statement) {
        debug!(
            table = %self.table,
            operation,
            sql = %statement.sql,
            params = statement.params.len(),
            "executing statement"
        );
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use async_trait::async_trait;
    use futures::stream;
    use serde::{Deserialize, Serialize};

    use super::*;
    use crate::{ExecutorError, Match, Order, Row, RowStream};

    #[derive(tablemap::Record, Serialize, Deserialize, Clone, Debug, PartialEq)]
    struct Widget {
        rowid: Option<i64>,
        name: String,
        color: String,
    }

    #[derive(tablemap::Record, Serialize, Deserialize, Clone, Debug)]
    struct Bare {
        rowid: Option<i64>,
    }

    #[derive(tablemap::Record, Serialize, Deserialize, Clone, Debug)]
    struct Clash {
        rowid: Option<i64>,
        #[column(name = "ROWID")]
        other: i64,
    }

    fn widget(name: &str, color: &str) -> Widget {
        Widget {
            rowid: None,
            name: name.into(),
            color: color.into(),
        }
    }

    fn widget_row(rowid: i64, name: &str, color: &str) -> Row {
        [
            ("rowid", Value::Integer(rowid)),
            ("name", Value::from(name)),
            ("color", Value::from(color)),
        ]
        .into_iter()
        .collect()
    }

    /// Records every statement and replays canned responses.
    #[derive(Default)]
    struct RecordingExecutor {
        statements: Vec<Statement>,
        rows: VecDeque<Result<Row, String>>,
        rows_affected: u64,
        failure: Option<String>,
    }

    impl RecordingExecutor {
        fn failing(message: &str) -> Self {
            Self {
                failure: Some(message.to_string()),
                ..Default::default()
            }
        }

        fn check(&self) -> Result<(), ExecutorError> {
            match &self.failure {
                Some(message) => Err(ExecutorError::new(message.clone())),
                None => Ok(()),
            }
        }
    }

    #[async_trait]
    impl Executor for RecordingExecutor {
        async fn execute(&mut self, statement: Statement) -> Result<u64, ExecutorError> {
            self.statements.push(statement);
            self.check()?;
            Ok(self.rows_affected)
        }

        async fn fetch_optional(
            &mut self,
            statement: Statement,
        ) -> Result<Option<Row>, ExecutorError> {
            self.statements.push(statement);
            self.check()?;
            self.rows
                .pop_front()
                .transpose()
                .map_err(ExecutorError::new)
        }

        fn fetch<'e>(&'e mut self, statement: Statement) -> RowStream<'e> {
            self.statements.push(statement);
            let rows: Vec<Result<Row, ExecutorError>> = match self.check() {
                Err(e) => vec![Err(e)],
                Ok(()) => self
                    .rows
                    .drain(..)
                    .map(|row| row.map_err(ExecutorError::new))
                    .collect(),
            };
            stream::iter(rows).boxed()
        }
    }

    #[test]
    fn new_binds_lowercased_type_name() {
        let mapper = TableMapper::<Widget>::new().unwrap();
        assert_eq!(mapper.table_name(), "widget");
        assert_eq!(mapper.columns(), &["name", "color"]);
    }

    #[test]
    fn construction_rejects_invalid_record_types() {
        assert!(matches!(
            TableMapper::<Bare>::new(),
            Err(MapperError::ConfigurationError { .. })
        ));
        assert!(matches!(
            TableMapper::<Clash>::new(),
            Err(MapperError::ConfigurationError { .. })
        ));
        assert!(matches!(
            TableMapper::<Widget>::for_table("widget; DROP TABLE widget"),
            Err(MapperError::ConfigurationError { .. })
        ));
    }

    #[tokio::test]
    async fn ensure_table_and_index_issue_idempotent_ddl() {
        let mapper = TableMapper::<Widget>::new().unwrap();
        let mut executor = RecordingExecutor::default();

        mapper.ensure_table(&mut executor, &["name"]).await.unwrap();
        mapper
            .ensure_index(&mut executor, "widget_color", &["color"], false)
            .await
            .unwrap();
        mapper
            .ensure_index(&mut executor, "widget_pair", &["name", "color"], true)
            .await
            .unwrap();

        let sql: Vec<&str> = executor.statements.iter().map(|s| s.sql.as_str()).collect();
        assert_eq!(
            sql,
            vec![
                "CREATE TABLE IF NOT EXISTS widget(name, color, PRIMARY KEY (name));",
                "CREATE INDEX IF NOT EXISTS widget_color ON widget (color);",
                "CREATE UNIQUE INDEX IF NOT EXISTS widget_pair ON widget (name, color);",
            ]
        );
    }

    #[tokio::test]
    async fn schema_failures_are_schema_errors() {
        let mapper = TableMapper::<Widget>::new().unwrap();
        let mut executor = RecordingExecutor::failing("table exists with other columns");

        let err = mapper.ensure_table(&mut executor, &[]).await.unwrap_err();
        assert!(matches!(err, MapperError::SchemaError { .. }));

        let err = mapper
            .ensure_index(&mut executor, "bad name", &["color"], false)
            .await
            .unwrap_err();
        assert!(matches!(err, MapperError::SchemaError { .. }));
        // the unsafe index name never reached the executor
        assert_eq!(executor.statements.len(), 1);
    }

    #[tokio::test]
    async fn create_sets_rowid_from_returned_row() {
        let mapper = TableMapper::<Widget>::new().unwrap();
        let mut executor = RecordingExecutor::default();
        executor
            .rows
            .push_back(Ok([("rowid", Value::Integer(1))].into_iter().collect()));

        let mut record = widget("bolt", "red");
        let rowid = mapper.create(&mut executor, &mut record).await.unwrap();

        assert_eq!(rowid, 1);
        assert_eq!(record.rowid, Some(1));
        assert_eq!(
            executor.statements[0],
            Statement {
                sql: "INSERT INTO widget (name, color) VALUES (?, ?) RETURNING rowid;".into(),
                params: vec![Value::from("bolt"), Value::from("red")],
            }
        );
    }

    #[tokio::test]
    async fn failed_create_leaves_rowid_unset() {
        let mapper = TableMapper::<Widget>::new().unwrap();

        let mut executor = RecordingExecutor::failing("UNIQUE constraint failed");
        let mut record = widget("bolt", "red");
        let err = mapper.create(&mut executor, &mut record).await.unwrap_err();
        assert!(matches!(err, MapperError::WriteError { .. }));
        assert_eq!(record.rowid, None);

        let mut executor = RecordingExecutor::default();
        let err = mapper.create(&mut executor, &mut record).await.unwrap_err();
        assert!(matches!(err, MapperError::WriteError { .. }));
        assert_eq!(record.rowid, None);
    }

    #[tokio::test]
    async fn read_builds_wildcard_query_and_hydrates() {
        let mapper = TableMapper::<Widget>::new().unwrap();
        let mut executor = RecordingExecutor::default();
        executor.rows.push_back(Ok(widget_row(1, "bolt", "red")));

        let query = Query::<Widget>::new().matching(WidgetPrototype {
            name: Match::Exactly("bolt".to_string()),
            ..Default::default()
        });
        let records = mapper.read_all(&mut executor, &query).await.unwrap();

        assert_eq!(
            records,
            vec![Widget {
                rowid: Some(1),
                ..widget("bolt", "red")
            }]
        );
        assert_eq!(
            executor.statements[0],
            Statement {
                sql: "SELECT rowid, * FROM widget WHERE name=?;".into(),
                params: vec![Value::from("bolt")],
            }
        );
    }

    #[tokio::test]
    async fn read_applies_order_and_paging() {
        let mapper = TableMapper::<Widget>::new().unwrap();
        let mut executor = RecordingExecutor::default();

        let query = Query::<Widget>::new()
            .order_by("color", Order::Desc)
            .limit(2)
            .offset(4);
        let records = mapper.read_all(&mut executor, &query).await.unwrap();

        assert!(records.is_empty());
        assert_eq!(
            executor.statements[0].sql,
            "SELECT rowid, * FROM widget ORDER BY color DESC LIMIT 2 OFFSET 4;"
        );
    }

    #[tokio::test]
    async fn read_rejects_unsafe_order_by_before_executing() {
        let mapper = TableMapper::<Widget>::new().unwrap();
        let mut executor = RecordingExecutor::default();

        let query = Query::<Widget>::new().order_by("color; DROP TABLE widget", Order::Asc);
        let err = mapper.read(&mut executor, &query).err().unwrap();

        assert!(matches!(err, MapperError::QueryError { .. }));
        assert!(executor.statements.is_empty());
    }

    #[tokio::test]
    async fn read_surfaces_fetch_failure_mid_stream() {
        let mapper = TableMapper::<Widget>::new().unwrap();
        let mut executor = RecordingExecutor::default();
        executor.rows.push_back(Ok(widget_row(1, "bolt", "red")));
        executor.rows.push_back(Err("disk I/O error".to_string()));

        let mut stream = mapper.read(&mut executor, &Query::new()).unwrap();
        assert_eq!(stream.next().await.unwrap().unwrap().rowid, Some(1));
        assert!(matches!(
            stream.next().await.unwrap(),
            Err(MapperError::QueryError { .. })
        ));
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn read_stops_after_fetch_failure() {
        let mapper = TableMapper::<Widget>::new().unwrap();
        let mut executor = RecordingExecutor::default();
        executor.rows.push_back(Err("disk I/O error".to_string()));
        executor.rows.push_back(Ok(widget_row(2, "nut", "red")));

        let items: Vec<_> = mapper
            .read(&mut executor, &Query::new())
            .unwrap()
            .collect()
            .await;
        assert_eq!(items.len(), 1);
        assert!(matches!(items[0], Err(MapperError::QueryError { .. })));
    }

    #[tokio::test]
    async fn read_stops_after_row_that_does_not_hydrate() {
        let mapper = TableMapper::<Widget>::new().unwrap();
        let mut executor = RecordingExecutor::default();
        let bad_row: Row = [
            ("rowid", Value::Integer(1)),
            ("name", Value::Integer(7)),
            ("color", Value::from("red")),
        ]
        .into_iter()
        .collect();
        executor.rows.push_back(Ok(bad_row));
        executor.rows.push_back(Ok(widget_row(2, "nut", "red")));

        let items: Vec<_> = mapper
            .read(&mut executor, &Query::new())
            .unwrap()
            .collect()
            .await;
        assert_eq!(items.len(), 1);
        assert!(matches!(items[0], Err(MapperError::SerializationError(_))));
    }

    #[tokio::test]
    async fn update_replaces_all_columns() {
        let mapper = TableMapper::<Widget>::new().unwrap();
        let mut executor = RecordingExecutor {
            rows_affected: 1,
            ..Default::default()
        };

        let record = Widget {
            rowid: Some(1),
            ..widget("bolt", "blue")
        };
        let outcome = mapper.update(&mut executor, &record).await.unwrap();

        assert_eq!(outcome, WriteOutcome::Applied { rows_affected: 1 });
        assert_eq!(
            executor.statements[0],
            Statement {
                sql: "UPDATE widget SET name=?, color=? WHERE rowid = ?;".into(),
                params: vec![Value::from("bolt"), Value::from("blue"), Value::Integer(1)],
            }
        );
    }

    #[tokio::test]
    async fn delete_addresses_rowid() {
        let mapper = TableMapper::<Widget>::new().unwrap();
        let mut executor = RecordingExecutor::default();

        let record = Widget {
            rowid: Some(9),
            ..widget("bolt", "red")
        };
        let outcome = mapper.delete(&mut executor, &record).await.unwrap();

        assert_eq!(outcome.rows_affected(), Some(0));
        assert_eq!(
            executor.statements[0],
            Statement {
                sql: "DELETE FROM widget WHERE rowid = ?;".into(),
                params: vec![Value::Integer(9)],
            }
        );
    }

    #[tokio::test]
    async fn update_and_delete_without_rowid_are_skipped() {
        let mapper = TableMapper::<Widget>::new().unwrap();
        let mut executor = RecordingExecutor::failing("must not be called");
        let record = widget("bolt", "red");

        let outcome = mapper.update(&mut executor, &record).await.unwrap();
        assert_eq!(outcome, WriteOutcome::Skipped(SkipReason::MissingRowid));
        assert!(!outcome.is_applied());

        let outcome = mapper.delete(&mut executor, &record).await.unwrap();
        assert_eq!(outcome, WriteOutcome::Skipped(SkipReason::MissingRowid));
        assert!(executor.statements.is_empty());
    }

    #[tokio::test]
    async fn write_failures_are_write_errors() {
        let mapper = TableMapper::<Widget>::new().unwrap();
        let mut executor = RecordingExecutor::failing("database is locked");
        let record = Widget {
            rowid: Some(1),
            ..widget("bolt", "red")
        };

        assert!(matches!(
            mapper.update(&mut executor, &record).await,
            Err(MapperError::WriteError { .. })
        ));
        assert!(matches!(
            mapper.delete(&mut executor, &record).await,
            Err(MapperError::WriteError { .. })
        ));
    }
}
