//! Row predicates understood by every `Store`.

use crate::value::Value;

/// A predicate over the columns of one table.
///
/// Stores translate filters into their own query language; the SQLite store
/// renders them as a parameterized `WHERE` clause.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// Every row.
    All,
    /// `column = value`
    Eq(&'static str, Value),
    /// `column IN (values)`; an empty list matches nothing.
    In(&'static str, Vec<Value>),
    /// `column LIKE pattern` with `%` and `_` wildcards.
    Like(&'static str, String),
    /// Every nested filter matches.
    And(Vec<Filter>),
}

impl Filter {
    /// `column = value`
    pub fn eq(column: &'static str, value: impl Into<Value>) -> Self {
        Filter::Eq(column, value.into())
    }

    /// `column IN (values)`
    pub fn is_in<V: Into<Value>>(
        column: &'static str,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        Filter::In(column, values.into_iter().map(Into::into).collect())
    }

    /// Rows whose text column contains `needle`.
    pub fn contains(column: &'static str, needle: &str) -> Self {
        Filter::Like(column, format!("%{needle}%"))
    }

    /// Combine with another filter.
    #[must_use]
    pub fn and(self, other: Filter) -> Self {
        match (self, other) {
            (Filter::All, f) | (f, Filter::All) => f,
            (Filter::And(mut left), Filter::And(right)) => {
                left.extend(right);
                Filter::And(left)
            }
            (Filter::And(mut left), f) => {
                left.push(f);
                Filter::And(left)
            }
            (f, other) => Filter::And(vec![f, other]),
        }
    }
}
