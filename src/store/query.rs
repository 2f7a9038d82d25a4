//! Typed read queries for the PostgREST dialect.
//!
//! A [`Query`] names a collection, an ordered list of equality filters, and an
//! optional sort. It renders to the query-string pairs PostgREST expects:
//!
//! ```text
//! Query::new("scans").filter_eq("user_id", "u_1").order_by("created_at", Direction::Descending)
//!   => ?user_id=eq.u_1&order=created_at.desc
//! ```

use std::fmt;

/// Sort direction for an ordered query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    Descending,
}

impl Direction {
    fn as_str(self) -> &'static str {
        match self {
            Direction::Ascending => "asc",
            Direction::Descending => "desc",
        }
    }
}

/// Equality filter on a single column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filter {
    pub column: String,
    pub value: String,
}

/// Sort specification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    pub column: String,
    pub direction: Direction,
}

impl fmt::Display for Order {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.column, self.direction.as_str())
    }
}

/// A read against one collection of the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    collection: String,
    filters: Vec<Filter>,
    order: Option<Order>,
}

impl Query {
    /// Start a query against `collection` with no filters and no ordering.
    pub fn new(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            filters: Vec::new(),
            order: None,
        }
    }

    /// Add an equality filter. Filters are rendered in insertion order.
    pub fn filter_eq(mut self, column: impl Into<String>, value: impl Into<String>) -> Self {
        self.filters.push(Filter {
            column: column.into(),
            value: value.into(),
        });
        self
    }

    /// Set the sort column and direction, replacing any previous ordering.
    pub fn order_by(mut self, column: impl Into<String>, direction: Direction) -> Self {
        self.order = Some(Order {
            column: column.into(),
            direction,
        });
        self
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn filters(&self) -> &[Filter] {
        &self.filters
    }

    pub fn order(&self) -> Option<&Order> {
        self.order.as_ref()
    }

    /// Render the query-string pairs, filters first, then `order`.
    ///
    /// Values are not percent-encoded here; the HTTP client encodes them.
    pub fn to_pairs(&self) -> Vec<(String, String)> {
        let mut pairs: Vec<(String, String)> = self
            .filters
            .iter()
            .map(|f| (f.column.clone(), format!("eq.{}", f.value)))
            .collect();

        if let Some(order) = &self.order {
            pairs.push(("order".to_string(), order.to_string()));
        }

        pairs
    }
}
