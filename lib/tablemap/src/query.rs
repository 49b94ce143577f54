//! Read query builder.
//!
//! A [`Query`] carries an optional prototype plus ordering and paging. The
//! mapper turns it into a single-table `SELECT`.

use crate::Record;

/// Sort order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Order {
    #[default]
    Asc,
    Desc,
}

impl Order {
    pub fn as_sql(self) -> &'static str {
        match self {
            Order::Asc => "ASC",
            Order::Desc => "DESC",
        }
    }
}

/// A read against the mapper's table.
///
/// # Example
///
/// ```text
/// let query = Query::<Widget>::new()
///     .matching(WidgetPrototype { color: "red".to_string().into(), ..Default::default() })
///     .order_by("name", Order::Asc)
///     .limit(10);
/// ```
#[derive(Debug, Clone)]
pub struct Query<R: Record> {
    /// Rows must match every concrete field of this prototype.
    pub prototype: Option<R::Prototype>,
    /// Maximum number of results, zero for unbounded.
    pub limit: u64,
    /// Rows to skip. Only applied when `limit` is nonzero.
    pub offset: u64,
    /// Column to sort by. Checked for identifier safety, not for existence.
    pub order_by: Option<(String, Order)>,
}

impl<R: Record> Query<R> {
    /// Match every row.
    pub fn new() -> Self {
        Self {
            prototype: None,
            limit: 0,
            offset: 0,
            order_by: None,
        }
    }

    /// Restrict results to rows matching the prototype.
    pub fn matching(mut self, prototype: impl Into<R::Prototype>) -> Self {
        self.prototype = Some(prototype.into());
        self
    }

    /// Set the maximum number of results.
    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = limit;
        self
    }

    /// Set the offset for pagination.
    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = offset;
        self
    }

    /// Set the order-by column.
    pub fn order_by(mut self, column: impl Into<String>, order: Order) -> Self {
        self.order_by = Some((column.into(), order));
        self
    }
}

impl<R: Record> Default for Query<R> {
    fn default() -> Self {
        Self::new()
    }
}
