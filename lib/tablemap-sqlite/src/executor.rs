//! SQLite implementation of Executor.

const DEFAULT_MAX_CONNECTIONS: u32 = 16;

use std::ops::Deref;
use std::str::FromStr;

use async_stream::try_stream;
use async_trait::async_trait;
use futures::{Stream, StreamExt, TryStreamExt};
use sqlx::pool::PoolConnection;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Sqlite, SqliteConnection, Transaction};
use tablemap::{ConnectionConfig, Executor, ExecutorError, Row, RowStream, Statement};
use tracing::debug;

use crate::{bind_values, decode_row};

/// Pool settings for [`SqlitePool::connect_with`].
#[derive(Debug, Clone, Copy)]
pub struct SqliteOptions {
    /// Upper bound on pooled connections. In-memory databases always use one.
    pub max_connections: u32,
}

impl Default for SqliteOptions {
    fn default() -> Self {
        Self {
            max_connections: DEFAULT_MAX_CONNECTIONS,
        }
    }
}

/// Wrapper around sqlx::SqlitePool that hands out executors.
#[derive(Clone, Debug)]
pub struct SqlitePool(sqlx::SqlitePool);

impl SqlitePool {
    /// Create a new SqlitePool from an sqlx SqlitePool.
    pub fn new(pool: sqlx::SqlitePool) -> Self {
        Self(pool)
    }

    /// Connect to a SQLite database with default options.
    pub async fn connect(config: impl Into<ConnectionConfig>) -> Result<Self, ExecutorError> {
        Self::connect_with(config, SqliteOptions::default()).await
    }

    /// Connect to a SQLite database, creating the file if it is missing.
    pub async fn connect_with(
        config: impl Into<ConnectionConfig>,
        options: SqliteOptions,
    ) -> Result<Self, ExecutorError> {
        let config = config.into();
        let url = config.url();

        let connect_options = SqliteConnectOptions::from_str(&url)
            .map_err(ExecutorError::new)?
            .create_if_missing(true);

        let pool_options = if is_in_memory(&url) {
            // the database lives only as long as its connection
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(options.max_connections)
        };

        let pool = pool_options
            .connect_with(connect_options)
            .await
            .map_err(ExecutorError::new)?;

        debug!(url = %url, "connected to sqlite");
        Ok(Self(pool))
    }

    /// Begin a transaction. Commit or roll it back explicitly; dropping it rolls back.
    pub async fn begin(&self) -> Result<SqliteTransaction, ExecutorError> {
        let tx = self.0.begin().await.map_err(ExecutorError::new)?;
        debug!("began sqlite transaction");
        Ok(SqliteTransaction { tx })
    }

    /// Check out a connection in autocommit mode.
    pub async fn acquire(&self) -> Result<SqliteSession, ExecutorError> {
        let conn = self.0.acquire().await.map_err(ExecutorError::new)?;
        Ok(SqliteSession { conn })
    }

    /// Get the inner sqlx::SqlitePool.
    pub fn inner(&self) -> &sqlx::SqlitePool {
        &self.0
    }
}

impl Deref for SqlitePool {
    type Target = sqlx::SqlitePool;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

fn is_in_memory(url: &str) -> bool {
    url.contains(":memory:") || url.contains("mode=memory")
}

async fn execute_on(
    conn: &mut SqliteConnection,
    statement: Statement,
) -> Result<u64, ExecutorError> {
    let Statement { sql, params } = statement;
    let args = bind_values(params)?;

    let result = sqlx::query_with(&sql, args)
        .execute(conn)
        .await
        .map_err(ExecutorError::new)?;

    Ok(result.rows_affected())
}

async fn fetch_optional_on(
    conn: &mut SqliteConnection,
    statement: Statement,
) -> Result<Option<Row>, ExecutorError> {
    let Statement { sql, params } = statement;
    let args = bind_values(params)?;

    let row = sqlx::query_with(&sql, args)
        .fetch_optional(conn)
        .await
        .map_err(ExecutorError::new)?;

    row.as_ref().map(decode_row).transpose()
}

fn stream_on<'e>(
    conn: &'e mut SqliteConnection,
    statement: Statement,
) -> impl Stream<Item = Result<Row, ExecutorError>> + Send + 'e {
    try_stream! {
        let Statement { sql, params } = statement;
        let args = bind_values(params)?;

        let mut rows = sqlx::query_with(&sql, args).fetch(conn);
        while let Some(row) = rows.try_next().await.map_err(ExecutorError::new)? {
            yield decode_row(&row)?;
        }
    }
}

/// SQLite transaction wrapper implementing Executor.
pub struct SqliteTransaction {
    tx: Transaction<'static, Sqlite>,
}

impl SqliteTransaction {
    /// Commit the transaction.
    pub async fn commit(self) -> Result<(), ExecutorError> {
        self.tx.commit().await.map_err(ExecutorError::new)?;
        debug!("committed sqlite transaction");
        Ok(())
    }

    /// Rollback the transaction.
    pub async fn rollback(self) -> Result<(), ExecutorError> {
        self.tx.rollback().await.map_err(ExecutorError::new)?;
        debug!("rolled back sqlite transaction");
        Ok(())
    }
}

#[async_trait]
impl Executor for SqliteTransaction {
    async fn execute(&mut self, statement: Statement) -> Result<u64, ExecutorError> {
        execute_on(&mut self.tx, statement).await
    }

    async fn fetch_optional(
        &mut self,
        statement: Statement,
    ) -> Result<Option<Row>, ExecutorError> {
        fetch_optional_on(&mut self.tx, statement).await
    }

    fn fetch<'e>(&'e mut self, statement: Statement) -> RowStream<'e> {
        stream_on(&mut self.tx, statement).boxed()
    }
}

/// Pooled connection in autocommit mode implementing Executor.
///
/// Every statement commits on its own.
pub struct SqliteSession {
    conn: PoolConnection<Sqlite>,
}

#[async_trait]
impl Executor for SqliteSession {
    async fn execute(&mut self, statement: Statement) -> Result<u64, ExecutorError> {
        execute_on(&mut self.conn, statement).await
    }

    async fn fetch_optional(
        &mut self,
        statement: Statement,
    ) -> Result<Option<Row>, ExecutorError> {
        fetch_optional_on(&mut self.conn, statement).await
    }

    fn fetch<'e>(&'e mut self, statement: Statement) -> RowStream<'e> {
        stream_on(&mut self.conn, statement).boxed()
    }
}
