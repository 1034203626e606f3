//! Query builders for SELECT, INSERT, UPDATE and DELETE statements.
//!
//! Builders are plain values: they are assembled incrementally, handed to the
//! session and rendered for the connection's dialect at execution time. Every
//! builder implements [`BuildQuery`].

use std::collections::HashMap;

use persistent_core::{Dialect, Value};

use crate::expr::{Expr, resolve_column};

/// Property name (or class name) → SQL column (or table) expression.
///
/// Values are already quoted for the target dialect.
pub type AliasMap = HashMap<String, String>;

/// Anything that renders to SQL plus bound parameters.
pub trait BuildQuery {
    /// Render for `dialect`.
    fn build_with_dialect(&self, dialect: Dialect) -> (String, Vec<Value>);

    /// Render with the default dialect (Postgres).
    fn build(&self) -> (String, Vec<Value>) {
        self.build_with_dialect(Dialect::default())
    }
}

impl<Q: BuildQuery + ?Sized> BuildQuery for &Q {
    fn build_with_dialect(&self, dialect: Dialect) -> (String, Vec<Value>) {
        (**self).build_with_dialect(dialect)
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Order {
    /// Ascending.
    #[default]
    Asc,
    /// Descending.
    Desc,
}

impl Order {
    const fn as_str(self) -> &'static str {
        match self {
            Order::Asc => "ASC",
            Order::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum JoinKind {
    Inner,
    Left,
}

#[derive(Debug, Clone)]
struct Join {
    kind: JoinKind,
    table: String,
    on: Expr,
}

fn push_where(sql: &mut String, filter: Option<&Expr>, dialect: Dialect, aliases: &AliasMap, params: &mut Vec<Value>) {
    if let Some(filter) = filter {
        sql.push_str(" WHERE ");
        sql.push_str(&filter.build(dialect, aliases, params));
    }
}

fn and_filter(existing: Option<Expr>, expr: Expr) -> Option<Expr> {
    Some(match existing {
        Some(existing) => existing.and(expr),
        None => expr,
    })
}

// ============================================================================
// SELECT
// ============================================================================

/// SELECT query builder.
///
/// Result columns are SQL fragments emitted as given; filters and ORDER BY terms
/// resolve property names through the alias map.
///
/// # Example
///
/// ```
/// use persistent_query::{BuildQuery, Dialect, Expr, Order, SelectQuery};
///
/// let (sql, params) = SelectQuery::new()
///     .columns(["\"id\"", "\"name\""])
///     .from("person")
///     .filter(Expr::col("name").like("A%"))
///     .order_by("id", Order::Desc)
///     .limit(10)
///     .build_with_dialect(Dialect::Sqlite);
///
/// assert_eq!(
///     sql,
///     "SELECT \"id\", \"name\" FROM \"person\" WHERE (\"name\" LIKE ?1) ORDER BY \"id\" DESC LIMIT 10"
/// );
/// assert_eq!(params.len(), 1);
/// ```
#[derive(Debug, Clone, Default)]
pub struct SelectQuery {
    columns: Vec<String>,
    distinct: bool,
    from: Option<String>,
    joins: Vec<Join>,
    filter: Option<Expr>,
    order_by: Vec<(String, Order)>,
    limit: Option<u64>,
    offset: Option<u64>,
    aliases: AliasMap,
}

impl SelectQuery {
    /// Create an empty SELECT.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one result column fragment.
    #[must_use]
    pub fn column(mut self, column: impl Into<String>) -> Self {
        self.columns.push(column.into());
        self
    }

    /// Add result column fragments.
    #[must_use]
    pub fn columns<S: Into<String>>(mut self, columns: impl IntoIterator<Item = S>) -> Self {
        self.columns.extend(columns.into_iter().map(Into::into));
        self
    }

    /// SELECT DISTINCT.
    #[must_use]
    pub fn distinct(mut self) -> Self {
        self.distinct = true;
        self
    }

    /// Table to select from.
    #[must_use]
    pub fn from(mut self, table: impl Into<String>) -> Self {
        self.from = Some(table.into());
        self
    }

    /// INNER JOIN `table` ON `on`.
    #[must_use]
    pub fn inner_join(mut self, table: impl Into<String>, on: Expr) -> Self {
        self.joins.push(Join {
            kind: JoinKind::Inner,
            table: table.into(),
            on,
        });
        self
    }

    /// LEFT JOIN `table` ON `on`.
    #[must_use]
    pub fn left_join(mut self, table: impl Into<String>, on: Expr) -> Self {
        self.joins.push(Join {
            kind: JoinKind::Left,
            table: table.into(),
            on,
        });
        self
    }

    /// Add a WHERE condition; repeated calls are ANDed.
    #[must_use]
    pub fn filter(mut self, expr: Expr) -> Self {
        self.filter = and_filter(self.filter.take(), expr);
        self
    }

    /// Add an ORDER BY term.
    #[must_use]
    pub fn order_by(mut self, column: impl Into<String>, order: Order) -> Self {
        self.order_by.push((column.into(), order));
        self
    }

    /// LIMIT.
    #[must_use]
    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// OFFSET.
    #[must_use]
    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Replace the alias map.
    #[must_use]
    pub fn set_aliases(mut self, aliases: AliasMap) -> Self {
        self.aliases = aliases;
        self
    }

    /// Current alias map.
    pub fn aliases(&self) -> &AliasMap {
        &self.aliases
    }

    /// Table selected from, if set.
    pub fn table(&self) -> Option<&str> {
        self.from.as_deref()
    }
}

impl BuildQuery for SelectQuery {
    fn build_with_dialect(&self, dialect: Dialect) -> (String, Vec<Value>) {
        let mut params = Vec::new();
        let mut sql = String::from("SELECT ");
        if self.distinct {
            sql.push_str("DISTINCT ");
        }
        if self.columns.is_empty() {
            sql.push('*');
        } else {
            sql.push_str(&self.columns.join(", "));
        }

        if let Some(table) = &self.from {
            sql.push_str(" FROM ");
            sql.push_str(&dialect.quote_identifier(table));
        }

        for join in &self.joins {
            let keyword = match join.kind {
                JoinKind::Inner => "INNER JOIN",
                JoinKind::Left => "LEFT JOIN",
            };
            let on = join.on.build(dialect, &self.aliases, &mut params);
            sql.push_str(&format!(" {keyword} {} ON {on}", dialect.quote_identifier(&join.table)));
        }

        push_where(&mut sql, self.filter.as_ref(), dialect, &self.aliases, &mut params);

        if !self.order_by.is_empty() {
            let terms: Vec<_> = self
                .order_by
                .iter()
                .map(|(column, order)| {
                    format!("{} {}", resolve_column(column, dialect, &self.aliases), order.as_str())
                })
                .collect();
            sql.push_str(" ORDER BY ");
            sql.push_str(&terms.join(", "));
        }

        if let Some(limit) = self.limit {
            sql.push_str(&format!(" LIMIT {limit}"));
        }
        if let Some(offset) = self.offset {
            sql.push_str(&format!(" OFFSET {offset}"));
        }

        (sql, params)
    }
}

// ============================================================================
// INSERT
// ============================================================================

/// INSERT query builder for a single row.
#[derive(Debug, Clone)]
pub struct InsertQuery {
    table: String,
    values: Vec<(String, Value)>,
}

impl InsertQuery {
    /// INSERT INTO `table`.
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            values: Vec::new(),
        }
    }

    /// Set a column value.
    #[must_use]
    pub fn value(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.push((column.into(), value.into()));
        self
    }

    /// Number of columns set.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether no column is set.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl BuildQuery for InsertQuery {
    fn build_with_dialect(&self, dialect: Dialect) -> (String, Vec<Value>) {
        let table = dialect.quote_identifier(&self.table);
        if self.values.is_empty() {
            return (format!("INSERT INTO {table} DEFAULT VALUES"), Vec::new());
        }

        let columns: Vec<_> = self
            .values
            .iter()
            .map(|(column, _)| dialect.quote_identifier(column))
            .collect();
        let placeholders: Vec<_> = (1..=self.values.len()).map(|i| dialect.placeholder(i)).collect();
        let params = self.values.iter().map(|(_, v)| v.clone()).collect();

        let sql = format!(
            "INSERT INTO {table} ({}) VALUES ({})",
            columns.join(", "),
            placeholders.join(", ")
        );
        (sql, params)
    }
}

// ============================================================================
// UPDATE
// ============================================================================

/// UPDATE query builder.
///
/// SET targets and filters resolve property names through the alias map, so a
/// query built from a class definition can be written in property names.
#[derive(Debug, Clone)]
pub struct UpdateQuery {
    table: String,
    sets: Vec<(String, Value)>,
    filter: Option<Expr>,
    aliases: AliasMap,
}

impl UpdateQuery {
    /// UPDATE `table`.
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            sets: Vec::new(),
            filter: None,
            aliases: AliasMap::new(),
        }
    }

    /// SET `column` = `value`.
    #[must_use]
    pub fn set(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.sets.push((column.into(), value.into()));
        self
    }

    /// Add a WHERE condition; repeated calls are ANDed.
    #[must_use]
    pub fn filter(mut self, expr: Expr) -> Self {
        self.filter = and_filter(self.filter.take(), expr);
        self
    }

    /// Replace the alias map.
    #[must_use]
    pub fn set_aliases(mut self, aliases: AliasMap) -> Self {
        self.aliases = aliases;
        self
    }

    /// Whether no SET clause was added.
    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }
}

impl BuildQuery for UpdateQuery {
    /// Renders an empty string when there is nothing to set.
    fn build_with_dialect(&self, dialect: Dialect) -> (String, Vec<Value>) {
        if self.sets.is_empty() {
            return (String::new(), Vec::new());
        }
        let mut params = Vec::new();
        let assignments: Vec<_> = self
            .sets
            .iter()
            .map(|(column, value)| {
                params.push(value.clone());
                format!(
                    "{} = {}",
                    resolve_column(column, dialect, &self.aliases),
                    dialect.placeholder(params.len())
                )
            })
            .collect();

        let mut sql = format!(
            "UPDATE {} SET {}",
            dialect.quote_identifier(&self.table),
            assignments.join(", ")
        );
        push_where(&mut sql, self.filter.as_ref(), dialect, &self.aliases, &mut params);
        (sql, params)
    }
}

// ============================================================================
// DELETE
// ============================================================================

/// DELETE query builder.
#[derive(Debug, Clone)]
pub struct DeleteQuery {
    table: String,
    filter: Option<Expr>,
    aliases: AliasMap,
}

impl DeleteQuery {
    /// DELETE FROM `table`.
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            filter: None,
            aliases: AliasMap::new(),
        }
    }

    /// Add a WHERE condition; repeated calls are ANDed.
    #[must_use]
    pub fn filter(mut self, expr: Expr) -> Self {
        self.filter = and_filter(self.filter.take(), expr);
        self
    }

    /// Replace the alias map.
    #[must_use]
    pub fn set_aliases(mut self, aliases: AliasMap) -> Self {
        self.aliases = aliases;
        self
    }
}

impl BuildQuery for DeleteQuery {
    fn build_with_dialect(&self, dialect: Dialect) -> (String, Vec<Value>) {
        let mut params = Vec::new();
        let mut sql = format!("DELETE FROM {}", dialect.quote_identifier(&self.table));
        push_where(&mut sql, self.filter.as_ref(), dialect, &self.aliases, &mut params);
        (sql, params)
    }
}

// ============================================================================
// Raw SQL
// ============================================================================

/// Raw SQL with positional parameters, for statements the builders do not cover.
///
/// The SQL is used as is, so placeholders must already match the dialect.
#[derive(Debug, Clone)]
pub struct RawQuery {
    sql: String,
    params: Vec<Value>,
}

impl RawQuery {
    /// Create a raw query.
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
        }
    }

    /// Bind a parameter value.
    #[must_use]
    pub fn bind(mut self, value: impl Into<Value>) -> Self {
        self.params.push(value.into());
        self
    }

    /// Bind multiple parameter values.
    #[must_use]
    pub fn bind_all(mut self, values: impl IntoIterator<Item = Value>) -> Self {
        self.params.extend(values);
        self
    }
}

impl BuildQuery for RawQuery {
    fn build_with_dialect(&self, _dialect: Dialect) -> (String, Vec<Value>) {
        (self.sql.clone(), self.params.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn person_aliases() -> AliasMap {
        AliasMap::from([
            ("id".to_string(), "\"person\".\"id\"".to_string()),
            ("name".to_string(), "\"person\".\"full_name\"".to_string()),
            ("Person".to_string(), "\"person\"".to_string()),
        ])
    }

    #[test]
    fn test_select_resolves_aliases() {
        let (sql, params) = SelectQuery::new()
            .columns(["\"person\".\"id\"", "\"person\".\"full_name\""])
            .from("person")
            .set_aliases(person_aliases())
            .filter(Expr::col("name").eq("Ann"))
            .order_by("id", Order::Asc)
            .build();

        assert_eq!(
            sql,
            "SELECT \"person\".\"id\", \"person\".\"full_name\" FROM \"person\" \
             WHERE (\"person\".\"full_name\" = $1) ORDER BY \"person\".\"id\" ASC"
        );
        assert_eq!(params, vec![Value::Text("Ann".into())]);
    }

    #[test]
    fn test_select_join_and_filters_share_numbering() {
        let (sql, params) = SelectQuery::new()
            .from("tag")
            .inner_join("person_tag", Expr::col("person_tag.tag_id").eq_col("tag.id"))
            .filter(Expr::col("person_tag.person_id").eq(7_i64))
            .filter(Expr::col("tag.label").ne("x"))
            .offset(5)
            .build_with_dialect(Dialect::Sqlite);

        assert_eq!(
            sql,
            "SELECT * FROM \"tag\" INNER JOIN \"person_tag\" ON (\"person_tag\".\"tag_id\" = \"tag\".\"id\") \
             WHERE ((\"person_tag\".\"person_id\" = ?1) AND (\"tag\".\"label\" <> ?2)) OFFSET 5"
        );
        assert_eq!(params.len(), 2);
    }

    #[test]
    fn test_insert_columns_and_default_values() {
        let (sql, params) = InsertQuery::new("person")
            .value("full_name", "Ann")
            .value("age", 30)
            .build_with_dialect(Dialect::Mysql);
        assert_eq!(sql, "INSERT INTO `person` (`full_name`, `age`) VALUES (?, ?)");
        assert_eq!(params.len(), 2);

        let (sql, params) = InsertQuery::new("counter").build();
        assert_eq!(sql, "INSERT INTO \"counter\" DEFAULT VALUES");
        assert!(params.is_empty());
    }

    #[test]
    fn test_update_placeholders_follow_set_clauses() {
        let aliases = AliasMap::from([("name".to_string(), "\"full_name\"".to_string())]);
        let (sql, params) = UpdateQuery::new("person")
            .set_aliases(aliases)
            .set("name", "Bo")
            .filter(Expr::col("id").eq(3_i64))
            .build();
        assert_eq!(sql, "UPDATE \"person\" SET \"full_name\" = $1 WHERE (\"id\" = $2)");
        assert_eq!(params, vec![Value::Text("Bo".into()), Value::BigInt(3)]);
    }

    #[test]
    fn test_empty_update_renders_nothing() {
        let (sql, params) = UpdateQuery::new("person").build();
        assert!(sql.is_empty());
        assert!(params.is_empty());
    }

    #[test]
    fn test_delete_with_filter() {
        let (sql, params) = DeleteQuery::new("address")
            .filter(Expr::col("person_id").eq(1_i64))
            .build_with_dialect(Dialect::Sqlite);
        assert_eq!(sql, "DELETE FROM \"address\" WHERE (\"person_id\" = ?1)");
        assert_eq!(params.len(), 1);
    }

    #[test]
    fn test_raw_query_passthrough() {
        let (sql, params) = RawQuery::new("SELECT nextval('seq')").bind(1_i64).build();
        assert_eq!(sql, "SELECT nextval('seq')");
        assert_eq!(params, vec![Value::BigInt(1)]);
    }
}
