//! SQLite implementation for tablemap.
//!
//! This crate provides SQLite-backed executors for the tablemap mapper. It
//! binds [`Value`] parameters positionally and decodes every result column by
//! its storage class, so record types only need `#[derive(Record)]`.
//!
//! # Usage
//!
//! `#[derive(Record)]` expands to paths under `tablemap::`, so a crate that
//! derives records depends on `tablemap` directly and takes the derive from
//! there. The backend types come from this crate.
//!
//! ```text
//! # Cargo.toml
//! [dependencies]
//! tablemap = "0.1"
//! tablemap-sqlite = "0.1"
//! ```
//!
//! ```text
//! use tablemap::{Query, Record, TableMapper};
//! use tablemap_sqlite::SqlitePool;
//!
//! #[derive(Record, Serialize, Deserialize, Clone, Debug)]
//! pub struct Widget {
//!     pub rowid: Option<i64>,
//!     pub name: String,
//!     pub color: String,
//! }
//!
//! let pool = SqlitePool::connect("sqlite://widgets.db").await?;
//! let widgets = TableMapper::<Widget>::new()?;
//!
//! let mut tx = pool.begin().await?;
//! widgets.ensure_table(&mut tx, &[]).await?;
//! widgets.create(&mut tx, &mut widget).await?;
//! tx.commit().await?;
//! ```

#![cfg_attr(
    test,
    allow(clippy::unwrap_used, clippy::expect_used, clippy::unwrap_in_result)
)]

mod bind;
mod executor;

pub use bind::{bind_values, decode_row};
pub use executor::{SqliteOptions, SqlitePool, SqliteSession, SqliteTransaction};

// Re-export core types for convenience. The `Record` derive is not among
// them; it has to be named through `tablemap`.
pub use tablemap::{
    ConnectionConfig, Executor, ExecutorError, MapperError, Match, Order, Prototype, Query,
    RecordStream, Row, SkipReason, Statement, TableMapper, Value, WriteOutcome,
};
