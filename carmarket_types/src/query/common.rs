//! Shared query infrastructure: the [`Query`] trait, [`QueryCommon`] fields, and
//! the parameterized SQL fragment ([`SqlFilter`]) every query renders to.

use std::str::FromStr;

use crate::errors::Error;

/// Trait implemented by all query builders. Provides SQL rendering and shared
/// builder methods for result limits and sort direction.
pub trait Query {
    /// Renders this query's constraints as a parameterized WHERE fragment.
    fn to_sql(&self) -> SqlFilter;

    /// Returns a mutable reference to the common query fields.
    fn get_common(&mut self) -> &mut QueryCommon;

    /// Caps the number of rows fetched from the store.
    fn with_limit(mut self, limit: i64) -> Self
    where
        Self: Sized,
    {
        self.get_common().limit = Some(limit);
        self
    }

    /// Sets the sort direction (ascending or descending).
    fn with_sort_direction(mut self, sort_direction: SortDirection) -> Self
    where
        Self: Sized,
    {
        self.get_common().sort_direction = sort_direction;
        self
    }
}

/// Sort order for store results.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub enum SortDirection {
    /// Ascending order (smallest first). This is the default.
    #[default]
    Asc,
    /// Descending order (largest first).
    Desc,
}

impl SortDirection {
    pub fn as_sql(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

impl FromStr for SortDirection {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "asc" => Ok(SortDirection::Asc),
            "desc" => Ok(SortDirection::Desc),
            _ => Err(Error::UnknownVariant {
                kind: "sort direction",
                value: s.to_string(),
            }),
        }
    }
}

/// Fields shared by all query types.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct QueryCommon {
    /// Maximum rows to fetch. `None` fetches everything that matches.
    pub limit: Option<i64>,
    /// Sort direction. Defaults to ascending.
    pub sort_direction: SortDirection,
}

/// A bound query parameter.
#[derive(Clone, Debug, PartialEq)]
pub enum SqlParam {
    Text(String),
    Integer(i64),
    Real(f64),
}

/// A WHERE fragment with numbered placeholders (`?1`, `?2`, ...) and the
/// values bound to them, in order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SqlFilter {
    pub clauses: Vec<String>,
    pub params: Vec<SqlParam>,
}

impl SqlFilter {
    /// Binds a value and returns its 1-based placeholder index.
    pub fn bind(&mut self, param: SqlParam) -> usize {
        self.params.push(param);
        self.params.len()
    }

    pub fn push(&mut self, clause: impl Into<String>) {
        self.clauses.push(clause.into());
    }

    /// Full WHERE clause; `WHERE 1=1` when there are no constraints.
    pub fn where_clause(&self) -> String {
        if self.clauses.is_empty() {
            "WHERE 1=1".to_string()
        } else {
            format!("WHERE {}", self.clauses.join(" AND "))
        }
    }
}

/// SQL scalar function the store registers for Unicode lowercasing.
/// SQLite's own `LIKE` folds ASCII letters only.
pub const CASE_FOLD_FN: &str = "carmarket_lower";

/// Case-insensitive substring match of `column` against the bound pattern
/// `?n`, which must come from [`like_contains`].
pub(crate) fn like_ci(column: &str, n: usize) -> String {
    format!("{CASE_FOLD_FN}({column}) LIKE ?{n} ESCAPE '\\'")
}

/// `LIKE` pattern matching `needle` literally anywhere in a lowercased value.
pub(crate) fn like_contains(needle: &str) -> String {
    let mut pattern = String::with_capacity(needle.len() + 2);
    pattern.push('%');
    for c in needle.to_lowercase().chars() {
        if matches!(c, '\\' | '%' | '_') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

/// Case-insensitive substring test used by the in-memory predicates.
pub(crate) fn contains_ci(haystack: Option<&str>, needle: &str) -> bool {
    haystack.is_some_and(|h| h.to_lowercase().contains(&needle.to_lowercase()))
}
