//! Tablemap - map plain record types onto relational tables.
//!
//! A record type derives its table schema from its declared fields, and a
//! [`TableMapper`] issues parameterized CRUD statements for it through a
//! caller-supplied [`Executor`].
//!
//! # Core Concepts
//!
//! - **Record**: a struct with named fields and an engine-assigned `rowid`.
//! - **Prototype**: a generated companion struct whose [`Match`] fields select
//!   rows; [`Match::Any`] leaves a column unconstrained.
//! - **Executor**: runs statements inside a transaction the caller owns. The
//!   mapper never commits, rolls back, caches or retries.
//!
//! # Traits
//!
//! - [`Record`]: Types persisted by a mapper (use `#[derive(Record)]`)
//! - [`Prototype`]: Generated query prototypes
//! - [`Executor`]: Backend statement execution

#![cfg_attr(
    test,
    allow(clippy::unwrap_used, clippy::expect_used, clippy::unwrap_in_result)
)]

// Lets the derive macro's `tablemap::` paths resolve inside this crate's tests.
extern crate self as tablemap;

mod config;
mod error;
mod executor;
mod mapper;
mod query;
mod record;
pub mod statement;
mod value;

pub use config::ConnectionConfig;
pub use error::{ExecutorError, MapperError};
pub use executor::{Executor, RowStream};
pub use mapper::{RecordStream, SkipReason, TableMapper, WriteOutcome};
pub use query::{Order, Query};
pub use record::{Match, Prototype, Record};
pub use statement::{ROWID, Statement};
pub use value::{Row, Value};

// Re-export derive macro
pub use tablemap_derive::Record;
