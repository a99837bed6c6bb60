use std::fmt::{Display, Formatter};

use crate::api::Reference;
use crate::error::DocstoreResult;
use crate::model::ResourcePath;
use crate::value::Value;

/// Single-field comparison operators supported by the backend contract.
///
/// There are no composite or OR predicates; filters combine conjunctively in
/// the order they were supplied.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FilterOperator {
    Equal,
    NotEqual,
    GreaterThan,
    GreaterThanOrEqual,
    LessThan,
    LessThanOrEqual,
}

impl FilterOperator {
    pub fn token(&self) -> &'static str {
        match self {
            FilterOperator::Equal => "==",
            FilterOperator::NotEqual => "!=",
            FilterOperator::GreaterThan => ">",
            FilterOperator::GreaterThanOrEqual => ">=",
            FilterOperator::LessThan => "<",
            FilterOperator::LessThanOrEqual => "<=",
        }
    }
}

/// One field comparison applied to a query.
#[derive(Clone, Debug, PartialEq)]
pub struct Filter {
    field: String,
    operator: FilterOperator,
    value: Value,
}

impl Filter {
    pub fn new(field: impl Into<String>, operator: FilterOperator, value: Value) -> Self {
        Self {
            field: field.into(),
            operator,
            value,
        }
    }

    /// Shorthand for the most common equality filter.
    pub fn equal(field: impl Into<String>, value: Value) -> Self {
        Self::new(field, FilterOperator::Equal, value)
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn operator(&self) -> FilterOperator {
        self.operator
    }

    pub fn value(&self) -> &Value {
        &self.value
    }
}

impl Display for Filter {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}{}{}",
            self.field,
            self.operator.token(),
            self.value.canonical_string()
        )
    }
}

/// Immutable description of a read against one collection.
///
/// The target reference is resolved at build time, so a descriptor always
/// carries a fully-qualified path and an unresolved nested reference is
/// rejected before it can reach the backend.
#[derive(Clone, Debug, PartialEq)]
pub struct QueryDescriptor {
    path: ResourcePath,
    filters: Vec<Filter>,
    order_by: Vec<String>,
    descending: bool,
    limit: Option<u32>,
}

impl QueryDescriptor {
    /// Builds a descriptor for `reference`. Filters apply in the supplied
    /// order; ordering keys apply in sequence and share the single
    /// `descending` flag.
    pub fn build(
        reference: &Reference,
        filters: Vec<Filter>,
        order_by: Vec<String>,
        descending: bool,
        limit: Option<u32>,
    ) -> DocstoreResult<Self> {
        Ok(Self {
            path: reference.resolve()?,
            filters,
            order_by,
            descending,
            limit,
        })
    }

    /// A descriptor that scans the whole collection.
    pub fn collection(reference: &Reference) -> DocstoreResult<Self> {
        Self::build(reference, Vec::new(), Vec::new(), false, None)
    }

    pub fn path(&self) -> &ResourcePath {
        &self.path
    }

    pub fn filters(&self) -> &[Filter] {
        &self.filters
    }

    pub fn order_by(&self) -> &[String] {
        &self.order_by
    }

    pub fn descending(&self) -> bool {
        self.descending
    }

    pub fn limit(&self) -> Option<u32> {
        self.limit
    }

    /// Deterministic key identifying this query for listener de-duplication.
    ///
    /// Two descriptors built from the same reference, filters, ordering and
    /// limit produce the same key; any difference in those inputs (including
    /// filter order) produces a different key.
    pub fn cache_key(&self) -> String {
        let mut key = self.path.canonical_string();
        for filter in &self.filters {
            key.push('|');
            key.push_str(&filter.to_string());
        }
        if !self.order_by.is_empty() {
            key.push_str("|order=");
            key.push_str(&self.order_by.join(","));
            key.push_str(if self.descending { ":desc" } else { ":asc" });
        }
        if let Some(limit) = self.limit {
            key.push_str("|limit=");
            key.push_str(&limit.to_string());
        }
        key
    }
}

impl Display for QueryDescriptor {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "QueryDescriptor({})", self.cache_key())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_filter() -> Filter {
        Filter::equal("status", Value::from_string("active"))
    }

    #[test]
    fn identical_inputs_share_a_cache_key() {
        let games = Reference::root("games");
        let build = || {
            QueryDescriptor::build(
                &games,
                vec![status_filter(), Filter::new("round", FilterOperator::GreaterThan, Value::from_integer(3))],
                vec!["createdAt".into()],
                true,
                Some(10),
            )
            .unwrap()
        };
        assert_eq!(build().cache_key(), build().cache_key());
    }

    #[test]
    fn filter_order_changes_the_key() {
        let games = Reference::root("games");
        let round = Filter::new("round", FilterOperator::GreaterThan, Value::from_integer(3));
        let forward = QueryDescriptor::build(
            &games,
            vec![status_filter(), round.clone()],
            Vec::new(),
            false,
            None,
        )
        .unwrap();
        let reversed = QueryDescriptor::build(
            &games,
            vec![round, status_filter()],
            Vec::new(),
            false,
            None,
        )
        .unwrap();
        assert_ne!(forward.cache_key(), reversed.cache_key());
    }

    #[test]
    fn direction_and_limit_are_part_of_the_key() {
        let games = Reference::root("games");
        let ascending =
            QueryDescriptor::build(&games, Vec::new(), vec!["createdAt".into()], false, None)
                .unwrap();
        let descending =
            QueryDescriptor::build(&games, Vec::new(), vec!["createdAt".into()], true, None)
                .unwrap();
        assert_ne!(ascending.cache_key(), descending.cache_key());

        let limited = QueryDescriptor::build(&games, Vec::new(), Vec::new(), false, Some(5)).unwrap();
        assert_ne!(
            limited.cache_key(),
            QueryDescriptor::collection(&games).unwrap().cache_key()
        );
    }

    #[test]
    fn unresolved_reference_fails_at_build_time() {
        let moves = Reference::nested(Reference::root("games"), None, "moves");
        let err = QueryDescriptor::collection(&moves).unwrap_err();
        assert_eq!(err.code_str(), "docstore/incomplete-reference");
    }
}
