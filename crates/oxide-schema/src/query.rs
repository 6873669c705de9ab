//! Query descriptors and parameterized statement building.
//!
//! Values are never interpolated into SQL. Filter and having fragments are
//! caller-written SQL with `?` placeholders whose values travel alongside in
//! a [`Clause`]; only identifiers taken from the model are emitted inline.

use indexmap::IndexMap;

use crate::aggregate::Aggregate;
use crate::column::quote_identifier;
use crate::error::{Result, SchemaError};
use crate::model::TableModel;
use crate::param::{SqlValue, ToSqlValue};

/// Row values keyed by logical column name.
pub type SqlRow = IndexMap<String, SqlValue>;

/// A caller-supplied SQL fragment with its positional parameters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Clause {
    /// SQL text with `?` placeholders.
    pub sql: String,
    /// One value per placeholder, in order.
    pub values: Vec<SqlValue>,
}

impl Clause {
    /// Creates a clause without parameters.
    #[must_use]
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            values: Vec::new(),
        }
    }

    /// Appends the value for the next placeholder.
    #[must_use]
    pub fn bind(mut self, value: impl ToSqlValue) -> Self {
        self.values.push(value.to_sql_value());
        self
    }
}

impl From<&str> for Clause {
    fn from(sql: &str) -> Self {
        Self::new(sql)
    }
}

/// Order direction for sorting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderDirection {
    /// Ascending order (ASC)
    Asc,
    /// Descending order (DESC)
    Desc,
}

/// An ordering specification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    /// Column (or result alias) to order by.
    pub column: String,
    /// Order direction.
    pub direction: OrderDirection,
}

impl OrderBy {
    /// Creates a new ascending order specification.
    #[must_use]
    pub fn asc(column: &str) -> Self {
        Self {
            column: column.to_string(),
            direction: OrderDirection::Asc,
        }
    }

    /// Creates a new descending order specification.
    #[must_use]
    pub fn desc(column: &str) -> Self {
        Self {
            column: column.to_string(),
            direction: OrderDirection::Desc,
        }
    }

    /// Parses `"name"` as ascending and `"-name"` as descending.
    #[must_use]
    pub fn parse(spec: &str) -> Self {
        spec.strip_prefix('-').map_or_else(|| Self::asc(spec), Self::desc)
    }

    fn to_sql(&self, model: &TableModel) -> String {
        let direction = match self.direction {
            OrderDirection::Asc => "ASC",
            OrderDirection::Desc => "DESC",
        };
        format!("{} {direction}", column_ref(model, &self.column))
    }
}

/// Model columns are referenced by their quoted physical name; anything
/// else (an aggregate alias, an expression) is emitted as written.
fn column_ref(model: &TableModel, name: &str) -> String {
    model.get_column(name).map_or_else(
        || name.to_string(),
        |c| quote_identifier(c.physical_name()),
    )
}

/// Filter, order and paging for select and delete.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    /// WHERE fragment.
    pub filter: Option<Clause>,
    /// ORDER BY terms.
    pub order: Vec<OrderBy>,
    /// LIMIT.
    pub limit: Option<u64>,
    /// OFFSET.
    pub offset: Option<u64>,
}

impl Query {
    /// Creates a query matching every row.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the WHERE fragment.
    #[must_use]
    pub fn filter(mut self, clause: impl Into<Clause>) -> Self {
        self.filter = Some(clause.into());
        self
    }

    /// Adds an ordering; prefix with `-` for descending.
    #[must_use]
    pub fn order_by(mut self, spec: &str) -> Self {
        self.order.push(OrderBy::parse(spec));
        self
    }

    /// Limits the number of rows.
    #[must_use]
    pub const fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Skips rows.
    #[must_use]
    pub const fn offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }
}

/// Descriptor for grouped aggregate queries.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AggregateQuery {
    /// Select expressions; empty selects `*`.
    pub select: Vec<String>,
    /// WHERE fragment.
    pub filter: Option<Clause>,
    /// GROUP BY columns.
    pub group: Vec<String>,
    /// HAVING fragment.
    pub having: Option<Clause>,
    /// ORDER BY terms.
    pub order: Vec<OrderBy>,
    /// LIMIT.
    pub limit: Option<u64>,
    /// OFFSET.
    pub offset: Option<u64>,
}

impl AggregateQuery {
    /// Creates an empty aggregate query.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a raw select expression.
    #[must_use]
    pub fn select(mut self, expression: impl Into<String>) -> Self {
        self.select.push(expression.into());
        self
    }

    /// Adds an aggregate select expression.
    #[must_use]
    pub fn aggregate(mut self, aggregate: &Aggregate) -> Self {
        self.select.push(aggregate.to_sql());
        self
    }

    /// Sets the WHERE fragment.
    #[must_use]
    pub fn filter(mut self, clause: impl Into<Clause>) -> Self {
        self.filter = Some(clause.into());
        self
    }

    /// Adds a GROUP BY column.
    #[must_use]
    pub fn group_by(mut self, column: &str) -> Self {
        self.group.push(column.to_string());
        self
    }

    /// Sets the HAVING fragment.
    #[must_use]
    pub fn having(mut self, clause: impl Into<Clause>) -> Self {
        self.having = Some(clause.into());
        self
    }

    /// Adds an ordering; prefix with `-` for descending.
    #[must_use]
    pub fn order_by(mut self, spec: &str) -> Self {
        self.order.push(OrderBy::parse(spec));
        self
    }

    /// Limits the number of rows.
    #[must_use]
    pub const fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Skips rows.
    #[must_use]
    pub const fn offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }
}

/// SQL text plus the values for its placeholders, in order.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    /// SQL text.
    pub sql: String,
    /// Positional parameters.
    pub params: Vec<SqlValue>,
}

fn push_filter(sql: &mut String, params: &mut Vec<SqlValue>, keyword: &str, clause: Option<&Clause>) {
    if let Some(clause) = clause {
        sql.push(' ');
        sql.push_str(keyword);
        sql.push(' ');
        sql.push_str(&clause.sql);
        params.extend(clause.values.iter().cloned());
    }
}

fn push_tail(sql: &mut String, model: &TableModel, order: &[OrderBy], limit: Option<u64>, offset: Option<u64>) {
    if !order.is_empty() {
        let parts: Vec<String> = order.iter().map(|o| o.to_sql(model)).collect();
        sql.push_str(" ORDER BY ");
        sql.push_str(&parts.join(", "));
    }

    // SQLite only accepts OFFSET after a LIMIT; -1 means unbounded.
    match (limit, offset) {
        (Some(limit), _) => sql.push_str(&format!(" LIMIT {limit}")),
        (None, Some(_)) => sql.push_str(" LIMIT -1"),
        (None, None) => {}
    }
    if let Some(offset) = offset {
        sql.push_str(&format!(" OFFSET {offset}"));
    }
}

/// `SELECT * FROM ... [WHERE] [ORDER BY] [LIMIT] [OFFSET]`.
#[must_use]
pub fn build_select(model: &TableModel, query: &Query) -> Statement {
    let mut sql = format!("SELECT * FROM {}", model.qualified_name());
    let mut params = Vec::new();
    push_filter(&mut sql, &mut params, "WHERE", query.filter.as_ref());
    push_tail(&mut sql, model, &query.order, query.limit, query.offset);
    Statement { sql, params }
}

/// `DELETE FROM ... [WHERE]`.
///
/// SQLite only takes ORDER BY and LIMIT on a DELETE when built with
/// `SQLITE_ENABLE_UPDATE_DELETE_LIMIT`, so an ordered or paged delete picks
/// its rows by `rowid` in a subselect instead.
#[must_use]
pub fn build_delete(model: &TableModel, query: &Query) -> Statement {
    let table = model.qualified_name();
    let paged = !query.order.is_empty() || query.limit.is_some() || query.offset.is_some();
    if !paged {
        let mut sql = format!("DELETE FROM {table}");
        let mut params = Vec::new();
        push_filter(&mut sql, &mut params, "WHERE", query.filter.as_ref());
        return Statement { sql, params };
    }

    let mut subselect = format!("SELECT rowid FROM {table}");
    let mut params = Vec::new();
    push_filter(&mut subselect, &mut params, "WHERE", query.filter.as_ref());
    push_tail(&mut subselect, model, &query.order, query.limit, query.offset);
    Statement {
        sql: format!("DELETE FROM {table} WHERE rowid IN ({subselect})"),
        params,
    }
}

/// Single-row lookup by primary key.
pub fn build_find_by_key(model: &TableModel, key: SqlValue) -> Result<Statement> {
    let pk = model
        .primary_key()
        .ok_or_else(|| SchemaError::MissingPrimaryKey(model.table_name.clone()))?;
    Ok(Statement {
        sql: format!(
            "SELECT * FROM {} WHERE {} = ? LIMIT 1",
            model.qualified_name(),
            quote_identifier(pk.physical_name())
        ),
        params: vec![key],
    })
}

/// `INSERT` of every column except an auto-incrementing primary key.
///
/// Columns missing from `row` are bound as NULL.
#[must_use]
pub fn build_insert(model: &TableModel, row: &SqlRow) -> Statement {
    let columns: Vec<_> = model
        .columns
        .iter()
        .filter(|c| !(c.is_primary_key && c.auto_increment))
        .collect();

    if columns.is_empty() {
        return Statement {
            sql: format!("INSERT INTO {} DEFAULT VALUES", model.qualified_name()),
            params: Vec::new(),
        };
    }

    let names: Vec<String> = columns
        .iter()
        .map(|c| quote_identifier(c.physical_name()))
        .collect();
    let placeholders = vec!["?"; columns.len()];
    let params = columns
        .iter()
        .map(|c| row.get(&c.name).cloned().unwrap_or(SqlValue::Null))
        .collect();

    Statement {
        sql: format!(
            "INSERT INTO {} ({}) VALUES ({})",
            model.qualified_name(),
            names.join(", "),
            placeholders.join(", ")
        ),
        params,
    }
}

/// `UPDATE` of every supplied non-key column, addressed by primary key.
///
/// Parameters are the SET values in column order followed by the key.
pub fn build_update(model: &TableModel, row: &SqlRow) -> Result<Statement> {
    let missing_key = || SchemaError::MissingPrimaryKey(model.table_name.clone());
    let pk = model.primary_key().ok_or_else(missing_key)?;
    let key = row
        .get(&pk.name)
        .filter(|v| !v.is_null())
        .cloned()
        .ok_or_else(missing_key)?;

    let mut assignments = Vec::new();
    let mut params = Vec::new();
    for column in model.columns.iter().filter(|c| !c.is_primary_key) {
        if let Some(value) = row.get(&column.name) {
            assignments.push(format!("{} = ?", quote_identifier(column.physical_name())));
            params.push(value.clone());
        }
    }
    if assignments.is_empty() {
        return Err(SchemaError::NothingToUpdate(model.table_name.clone()));
    }
    params.push(key);

    Ok(Statement {
        sql: format!(
            "UPDATE {} SET {} WHERE {} = ?",
            model.qualified_name(),
            assignments.join(", "),
            quote_identifier(pk.physical_name())
        ),
        params,
    })
}

/// `SELECT COUNT(*) ... WHERE`; counting needs an explicit filter.
#[must_use]
pub fn build_count(model: &TableModel, filter: &Clause) -> Statement {
    Statement {
        sql: format!(
            "SELECT COUNT(*) FROM {} WHERE {}",
            model.qualified_name(),
            filter.sql
        ),
        params: filter.values.clone(),
    }
}

/// Grouped aggregate select.
///
/// Parameters are the WHERE values followed by the HAVING values, matching
/// placeholder order in the emitted text.
#[must_use]
pub fn build_aggregate(model: &TableModel, query: &AggregateQuery) -> Statement {
    let select = if query.select.is_empty() {
        "*".to_string()
    } else {
        query.select.join(", ")
    };
    let mut sql = format!("SELECT {select} FROM {}", model.qualified_name());
    let mut params = Vec::new();

    push_filter(&mut sql, &mut params, "WHERE", query.filter.as_ref());
    if !query.group.is_empty() {
        let groups: Vec<String> = query.group.iter().map(|g| column_ref(model, g)).collect();
        sql.push_str(" GROUP BY ");
        sql.push_str(&groups.join(", "));
    }
    push_filter(&mut sql, &mut params, "HAVING", query.having.as_ref());
    push_tail(&mut sql, model, &query.order, query.limit, query.offset);

    Statement { sql, params }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::{count_all, sum};
    use crate::column::{Column, ColumnType};

    fn model() -> TableModel {
        TableModel::new("orders")
            .column(
                Column::new("id", ColumnType::Integer)
                    .primary_key()
                    .auto_increment(),
            )
            .column(Column::new("customer", ColumnType::String))
            .column(Column::new("total", ColumnType::Number))
            .column(Column::new("placedAt", ColumnType::Integer).mapped_to("placed_at"))
    }

    fn row(values: &[(&str, SqlValue)]) -> SqlRow {
        values
            .iter()
            .map(|(k, v)| ((*k).to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_basic_select() {
        let stmt = build_select(&model(), &Query::new());
        assert_eq!(stmt.sql, r#"SELECT * FROM "main"."orders""#);
        assert!(stmt.params.is_empty());
    }

    #[test]
    fn test_select_with_everything() {
        let query = Query::new()
            .filter(Clause::new("customer = ? AND total > ?").bind("ann").bind(10.0))
            .order_by("-placedAt")
            .order_by("customer")
            .limit(5)
            .offset(10);
        let stmt = build_select(&model(), &query);
        assert_eq!(
            stmt.sql,
            r#"SELECT * FROM "main"."orders" WHERE customer = ? AND total > ? ORDER BY "placed_at" DESC, "customer" ASC LIMIT 5 OFFSET 10"#
        );
        assert_eq!(
            stmt.params,
            vec![SqlValue::Text("ann".into()), SqlValue::Float(10.0)]
        );
    }

    #[test]
    fn test_offset_without_limit() {
        let stmt = build_select(&model(), &Query::new().offset(3));
        assert!(stmt.sql.ends_with(" LIMIT -1 OFFSET 3"));
    }

    #[test]
    fn test_delete_shape() {
        let query = Query::new().filter(Clause::new("id = ?").bind(4_i64));
        let stmt = build_delete(&model(), &query);
        assert_eq!(stmt.sql, r#"DELETE FROM "main"."orders" WHERE id = ?"#);
        assert_eq!(stmt.params, vec![SqlValue::Int(4)]);
    }

    #[test]
    fn test_paged_delete_uses_rowid_subselect() {
        let query = Query::new()
            .filter(Clause::new("customer = ?").bind("ann"))
            .order_by("-placedAt")
            .limit(2);
        let stmt = build_delete(&model(), &query);
        assert_eq!(
            stmt.sql,
            r#"DELETE FROM "main"."orders" WHERE rowid IN (SELECT rowid FROM "main"."orders" WHERE customer = ? ORDER BY "placed_at" DESC LIMIT 2)"#
        );
        assert_eq!(stmt.params, vec![SqlValue::Text("ann".into())]);

        let stmt = build_delete(&model(), &Query::new().offset(1));
        assert_eq!(
            stmt.sql,
            r#"DELETE FROM "main"."orders" WHERE rowid IN (SELECT rowid FROM "main"."orders" LIMIT -1 OFFSET 1)"#
        );
        assert!(stmt.params.is_empty());
    }

    #[test]
    fn test_insert_skips_auto_increment_key() {
        let values = row(&[
            ("customer", SqlValue::Text("ann".into())),
            ("total", SqlValue::Float(1.5)),
            ("placedAt", SqlValue::Int(7)),
        ]);
        let stmt = build_insert(&model(), &values);
        assert_eq!(
            stmt.sql,
            r#"INSERT INTO "main"."orders" ("customer", "total", "placed_at") VALUES (?, ?, ?)"#
        );
        assert_eq!(stmt.params.len(), 3);
        assert_eq!(stmt.params[2], SqlValue::Int(7));
    }

    #[test]
    fn test_insert_keeps_manual_key() {
        let model = TableModel::new("tags")
            .column(Column::new("slug", ColumnType::String).primary_key())
            .column(Column::new("label", ColumnType::String));
        let stmt = build_insert(&model, &row(&[("slug", SqlValue::Text("a".into()))]));
        assert_eq!(
            stmt.sql,
            r#"INSERT INTO "main"."tags" ("slug", "label") VALUES (?, ?)"#
        );
        assert_eq!(stmt.params[1], SqlValue::Null);
    }

    #[test]
    fn test_update_puts_key_last() {
        let values = row(&[
            ("id", SqlValue::Int(9)),
            ("customer", SqlValue::Text("bo".into())),
            ("placedAt", SqlValue::Int(3)),
        ]);
        let stmt = build_update(&model(), &values).unwrap();
        assert_eq!(
            stmt.sql,
            r#"UPDATE "main"."orders" SET "customer" = ?, "placed_at" = ? WHERE "id" = ?"#
        );
        assert_eq!(
            stmt.params,
            vec![SqlValue::Text("bo".into()), SqlValue::Int(3), SqlValue::Int(9)]
        );
        assert_eq!(stmt.sql.matches('?').count(), stmt.params.len());
    }

    #[test]
    fn test_update_requires_key() {
        let values = row(&[("customer", SqlValue::Text("bo".into()))]);
        assert!(matches!(
            build_update(&model(), &values),
            Err(SchemaError::MissingPrimaryKey(_))
        ));

        let keyless = TableModel::new("logs").column(Column::new("line", ColumnType::String));
        assert!(matches!(
            build_update(&keyless, &values),
            Err(SchemaError::MissingPrimaryKey(_))
        ));
    }

    #[test]
    fn test_count() {
        let stmt = build_count(&model(), &Clause::new("total > ?").bind(0_i64));
        assert_eq!(
            stmt.sql,
            r#"SELECT COUNT(*) FROM "main"."orders" WHERE total > ?"#
        );
        assert_eq!(stmt.params, vec![SqlValue::Int(0)]);
    }

    #[test]
    fn test_aggregate_param_order() {
        let query = AggregateQuery::new()
            .select("customer")
            .aggregate(&sum("total").alias("spent"))
            .aggregate(&count_all())
            .filter(Clause::new("placed_at > ?").bind(100_i64))
            .group_by("customer")
            .having(Clause::new("SUM(total) > ?").bind(50_i64))
            .order_by("-spent")
            .limit(3);
        let stmt = build_aggregate(&model(), &query);
        assert_eq!(
            stmt.sql,
            r#"SELECT customer, SUM("total") AS "spent", COUNT(*) FROM "main"."orders" WHERE placed_at > ? GROUP BY "customer" HAVING SUM(total) > ? ORDER BY spent DESC LIMIT 3"#
        );
        assert_eq!(stmt.params, vec![SqlValue::Int(100), SqlValue::Int(50)]);
    }

    #[test]
    fn test_find_by_key() {
        let stmt = build_find_by_key(&model(), SqlValue::Int(1)).unwrap();
        assert_eq!(
            stmt.sql,
            r#"SELECT * FROM "main"."orders" WHERE "id" = ? LIMIT 1"#
        );
    }

    #[test]
    fn test_order_parse() {
        assert_eq!(OrderBy::parse("-name").direction, OrderDirection::Desc);
        assert_eq!(OrderBy::parse("name"), OrderBy::asc("name"));
    }
}
