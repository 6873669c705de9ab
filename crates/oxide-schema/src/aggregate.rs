//! Aggregate select expressions.
//!
//! These render the `select` part of an
//! [`AggregateQuery`](crate::query::AggregateQuery):
//!
//! ```
//! use oxide_schema::aggregate::{count_all, sum};
//!
//! assert_eq!(count_all().to_sql(), "COUNT(*)");
//! assert_eq!(sum("amount").alias("total").to_sql(), r#"SUM("amount") AS "total""#);
//! ```

use crate::column::quote_identifier;

/// Aggregate function name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateFunction {
    /// `COUNT`
    Count,
    /// `SUM`
    Sum,
    /// `AVG`
    Avg,
    /// `MAX`
    Max,
    /// `MIN`
    Min,
}

impl AggregateFunction {
    /// Returns the SQL function name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Count => "COUNT",
            Self::Sum => "SUM",
            Self::Avg => "AVG",
            Self::Max => "MAX",
            Self::Min => "MIN",
        }
    }
}

/// One aggregate select expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Aggregate {
    /// Function applied.
    pub function: AggregateFunction,
    /// Column argument; `None` means `*`.
    pub column: Option<String>,
    /// Whether to aggregate only distinct values.
    pub distinct: bool,
    /// Result column name.
    pub alias: Option<String>,
}

impl Aggregate {
    fn over(function: AggregateFunction, column: &str) -> Self {
        Self {
            function,
            column: Some(column.to_string()),
            distinct: false,
            alias: None,
        }
    }

    /// Names the result column.
    #[must_use]
    pub fn alias(mut self, alias: &str) -> Self {
        self.alias = Some(alias.to_string());
        self
    }

    /// Returns the SQL representation of this aggregate.
    #[must_use]
    pub fn to_sql(&self) -> String {
        let argument = match (&self.column, self.distinct) {
            (None, _) => "*".to_string(),
            (Some(column), false) => quote_identifier(column),
            (Some(column), true) => format!("DISTINCT {}", quote_identifier(column)),
        };
        let mut sql = format!("{}({argument})", self.function.as_str());
        if let Some(alias) = &self.alias {
            sql.push_str(" AS ");
            sql.push_str(&quote_identifier(alias));
        }
        sql
    }
}

/// `COUNT(*)`.
#[must_use]
pub const fn count_all() -> Aggregate {
    Aggregate {
        function: AggregateFunction::Count,
        column: None,
        distinct: false,
        alias: None,
    }
}

/// `COUNT(column)`.
#[must_use]
pub fn count(column: &str) -> Aggregate {
    Aggregate::over(AggregateFunction::Count, column)
}

/// `COUNT(DISTINCT column)`.
#[must_use]
pub fn count_distinct(column: &str) -> Aggregate {
    Aggregate {
        distinct: true,
        ..Aggregate::over(AggregateFunction::Count, column)
    }
}

/// `SUM(column)`.
#[must_use]
pub fn sum(column: &str) -> Aggregate {
    Aggregate::over(AggregateFunction::Sum, column)
}

/// `AVG(column)`.
#[must_use]
pub fn avg(column: &str) -> Aggregate {
    Aggregate::over(AggregateFunction::Avg, column)
}

/// `MAX(column)`.
#[must_use]
pub fn max(column: &str) -> Aggregate {
    Aggregate::over(AggregateFunction::Max, column)
}

/// `MIN(column)`.
#[must_use]
pub fn min(column: &str) -> Aggregate {
    Aggregate::over(AggregateFunction::Min, column)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_count_variants() {
        assert_eq!(count_all().to_sql(), "COUNT(*)");
        assert_eq!(count("id").to_sql(), r#"COUNT("id")"#);
        assert_eq!(count_distinct("user_id").to_sql(), r#"COUNT(DISTINCT "user_id")"#);
    }

    #[test]
    fn test_functions() {
        assert_eq!(sum("amount").to_sql(), r#"SUM("amount")"#);
        assert_eq!(avg("price").to_sql(), r#"AVG("price")"#);
        assert_eq!(max("created_at").to_sql(), r#"MAX("created_at")"#);
        assert_eq!(min("id").to_sql(), r#"MIN("id")"#);
    }

    #[test]
    fn test_alias() {
        assert_eq!(count_all().alias("n").to_sql(), r#"COUNT(*) AS "n""#);
    }
}
