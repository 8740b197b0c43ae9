//! Server-side query construction for collection exports.

use serde::Deserialize;
use serde_json::Value;
use std::fmt;

use super::error::{BulkError, BulkResult};

/// One `{key, filter, value}` clause as given on the command line.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FilterClause {
    pub key: String,
    pub filter: String,
    pub value: Value,
}

/// Comparison operators understood by the document database.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    Equal,
    NotEqual,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
    ArrayContains,
    ArrayContainsAny,
    In,
    NotIn,
}

impl FilterOp {
    /// Parse an operator token in SDK (`>=`) or REST (`GREATER_THAN_OR_EQUAL`) spelling.
    pub fn parse(token: &str) -> BulkResult<Self> {
        let op = match token.trim() {
            "==" | "=" | "EQUAL" => FilterOp::Equal,
            "!=" | "NOT_EQUAL" => FilterOp::NotEqual,
            "<" | "LESS_THAN" => FilterOp::LessThan,
            "<=" | "LESS_THAN_OR_EQUAL" => FilterOp::LessThanOrEqual,
            ">" | "GREATER_THAN" => FilterOp::GreaterThan,
            ">=" | "GREATER_THAN_OR_EQUAL" => FilterOp::GreaterThanOrEqual,
            "array-contains" | "ARRAY_CONTAINS" => FilterOp::ArrayContains,
            "array-contains-any" | "ARRAY_CONTAINS_ANY" => FilterOp::ArrayContainsAny,
            "in" | "IN" => FilterOp::In,
            "not-in" | "NOT_IN" => FilterOp::NotIn,
            other => {
                return Err(BulkError::invalid(format!(
                    "unsupported filter operator '{}'",
                    other
                )));
            }
        };
        Ok(op)
    }

    /// REST operator name.
    pub fn as_str(self) -> &'static str {
        match self {
            FilterOp::Equal => "EQUAL",
            FilterOp::NotEqual => "NOT_EQUAL",
            FilterOp::LessThan => "LESS_THAN",
            FilterOp::LessThanOrEqual => "LESS_THAN_OR_EQUAL",
            FilterOp::GreaterThan => "GREATER_THAN",
            FilterOp::GreaterThanOrEqual => "GREATER_THAN_OR_EQUAL",
            FilterOp::ArrayContains => "ARRAY_CONTAINS",
            FilterOp::ArrayContainsAny => "ARRAY_CONTAINS_ANY",
            FilterOp::In => "IN",
            FilterOp::NotIn => "NOT_IN",
        }
    }
}

impl fmt::Display for FilterOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single field predicate.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldFilter {
    pub field: String,
    pub op: FilterOp,
    pub value: Value,
}

/// Sort direction of an ordering clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    Ascending,
    #[default]
    Descending,
}

impl Direction {
    /// Parse `asc`/`desc`; a missing direction means descending.
    pub fn parse(arg: Option<&str>) -> BulkResult<Self> {
        match arg.map(|a| a.trim().to_ascii_lowercase()).as_deref() {
            None | Some("") => Ok(Direction::default()),
            Some("asc") | Some("ascending") => Ok(Direction::Ascending),
            Some("desc") | Some("descending") => Ok(Direction::Descending),
            Some(other) => Err(BulkError::invalid(format!(
                "sort direction must be asc or desc, got '{}'",
                other
            ))),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Ascending => "ASCENDING",
            Direction::Descending => "DESCENDING",
        }
    }
}

/// Ordering on one field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    pub field: String,
    pub direction: Direction,
}

/// Which documents a query ranges over.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryTarget {
    /// A collection path such as `users` or `users/u1/orders`.
    Collection(String),
    /// Every collection with this id, at any depth.
    CollectionGroup(String),
}

/// A structured server-side query: AND-chained filters, at most one
/// ordering and an optional limit.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub target: QueryTarget,
    pub filters: Vec<FieldFilter>,
    pub order_by: Option<OrderBy>,
    pub limit: Option<u32>,
}

impl Query {
    pub fn new(target: QueryTarget) -> Self {
        Self {
            target,
            filters: Vec::new(),
            order_by: None,
            limit: None,
        }
    }

    pub fn filter(mut self, field: impl Into<String>, op: FilterOp, value: Value) -> Self {
        self.filters.push(FieldFilter {
            field: field.into(),
            op,
            value,
        });
        self
    }

    pub fn order_by(mut self, field: impl Into<String>, direction: Direction) -> Self {
        self.order_by = Some(OrderBy {
            field: field.into(),
            direction,
        });
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Parse the serialized filter list: a JSON array of `{key, filter, value}`.
pub fn parse_filters(raw: Option<&str>) -> BulkResult<Vec<FilterClause>> {
    match raw.map(str::trim) {
        None | Some("") => Ok(Vec::new()),
        Some(json) => serde_json::from_str(json)
            .map_err(|e| BulkError::invalid(format!("invalid query: {}", e))),
    }
}

/// Build a query from command-line pieces.
pub fn build_query(
    target: QueryTarget,
    filters: &[FilterClause],
    sort: Option<&str>,
    sort_direction: Option<&str>,
    limit: Option<u32>,
) -> BulkResult<Query> {
    let mut query = Query::new(target);

    for clause in filters {
        if clause.key.trim().is_empty() {
            return Err(BulkError::invalid("filter key must not be empty"));
        }
        query = query.filter(&clause.key, FilterOp::parse(&clause.filter)?, clause.value.clone());
    }

    if let Some(field) = sort.map(str::trim).filter(|s| !s.is_empty()) {
        query = query.order_by(field, Direction::parse(sort_direction)?);
    }

    if let Some(l) = limit {
        query = query.limit(l);
    }

    Ok(query)
}
