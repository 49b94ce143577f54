//! SQL text generation for the statements the mapper issues.
//!
//! Identifiers are interpolated into statement text unquoted, so every table,
//! column, index and order-by name must pass [`is_safe_identifier`] before it
//! reaches these builders. Values are always bound as positional `?` parameters.

use crate::{Order, Value};

/// Name of the engine-assigned row identifier column.
pub const ROWID: &str = "rowid";

/// SQL text plus the positional parameters bound to its placeholders.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<Value>,
}

impl Statement {
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
        }
    }

    /// Append a positional parameter.
    pub fn bind(mut self, value: impl Into<Value>) -> Self {
        self.params.push(value.into());
        self
    }
}

/// `[A-Za-z_][A-Za-z0-9_]*`
pub fn is_safe_identifier(ident: &str) -> bool {
    let mut chars = ident.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn placeholders(count: usize) -> String {
    vec!["?"; count].join(", ")
}

/// `CREATE TABLE IF NOT EXISTS <table>(<cols>[, PRIMARY KEY (<pk>)]);`
pub fn create_table(table: &str, columns: &[&str], primary_key: &[&str]) -> Statement {
    let mut sql = format!("CREATE TABLE IF NOT EXISTS {}({}", table, columns.join(", "));
    if !primary_key.is_empty() {
        sql.push_str(&format!(", PRIMARY KEY ({})", primary_key.join(", ")));
    }
    sql.push_str(");");
    Statement::new(sql)
}

/// `CREATE [UNIQUE] INDEX IF NOT EXISTS <name> ON <table> (<cols>);`
pub fn create_index(name: &str, table: &str, columns: &[&str], unique: bool) -> Statement {
    let kind = if unique { "CREATE UNIQUE INDEX" } else { "CREATE INDEX" };
    Statement::new(format!(
        "{} IF NOT EXISTS {} ON {} ({});",
        kind,
        name,
        table,
        columns.join(", ")
    ))
}

/// `INSERT INTO <table> (<cols>) VALUES (?, ...) RETURNING rowid;`
pub fn insert(table: &str, columns: &[&str], values: Vec<Value>) -> Statement {
    Statement {
        sql: format!(
            "INSERT INTO {} ({}) VALUES ({}) RETURNING {};",
            table,
            columns.join(", "),
            placeholders(values.len()),
            ROWID
        ),
        params: values,
    }
}

/// Ordering and paging for a select.
///
/// A `limit` of zero means unbounded, in which case `offset` is ignored.
#[derive(Debug, Clone, Copy, Default)]
pub struct Window<'a> {
    pub order_by: Option<(&'a str, Order)>,
    pub limit: u64,
    pub offset: u64,
}

/// `SELECT rowid, * FROM <table> [WHERE ...] [ORDER BY ...] [LIMIT n OFFSET m];`
///
/// Each predicate becomes `<col>=?` in the given order, except a `Null` value,
/// which becomes `<col> IS NULL` and binds nothing.
pub fn select(table: &str, predicates: Vec<(&str, Value)>, window: Window<'_>) -> Statement {
    let mut sql = format!("SELECT {}, * FROM {}", ROWID, table);
    let mut params = Vec::with_capacity(predicates.len());

    let clauses: Vec<String> = predicates
        .into_iter()
        .map(|(column, value)| {
            if value.is_null() {
                format!("{} IS NULL", column)
            } else {
                params.push(value);
                format!("{}=?", column)
            }
        })
        .collect();

    if !clauses.is_empty() {
        sql.push_str(&format!(" WHERE {}", clauses.join(" AND ")));
    }

    if let Some((column, order)) = window.order_by {
        sql.push_str(&format!(" ORDER BY {} {}", column, order.as_sql()));
    }

    if window.limit > 0 {
        sql.push_str(&format!(" LIMIT {} OFFSET {}", window.limit, window.offset));
    }

    sql.push(';');
    Statement { sql, params }
}

/// `UPDATE <table> SET <col>=?, ... WHERE rowid = ?;`
pub fn update(table: &str, columns: &[&str], values: Vec<Value>, rowid: i64) -> Statement {
    let assignments: Vec<String> = columns.iter().map(|c| format!("{}=?", c)).collect();
    let mut params = values;
    params.push(Value::Integer(rowid));
    Statement {
        sql: format!(
            "UPDATE {} SET {} WHERE {} = ?;",
            table,
            assignments.join(", "),
            ROWID
        ),
        params,
    }
}

/// `DELETE FROM <table> WHERE rowid = ?;`
pub fn delete(table: &str, rowid: i64) -> Statement {
    Statement::new(format!("DELETE FROM {} WHERE {} = ?;", table, ROWID)).bind(rowid)
}
