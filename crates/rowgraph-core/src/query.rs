//! SELECT compilation.
//!
//! A [`SelectQuery`] owns a join graph and the caller's WHERE, GROUP BY,
//! ORDER BY and LIMIT fragments, and renders them into one statement. Every
//! selected column is labelled `alias.column`, which is what the row mapper
//! keys on.

use crate::error::{Error, Result};
use crate::graph::JoinGraph;
use crate::schema::Entity;
use crate::value::{SqlExpression, SqlValue, ToSqlValue};

/// A SELECT over a join graph.
///
/// # Example
///
/// ```ignore
/// let query = SelectQuery::of::<EventWithPersons>()?
///     .filter("persons.firstname=?", vec!["John".to_sql_value()])
///     .order_by("`event`.date DESC")
///     .limit(10);
/// let expr = query.to_expression();
/// ```
#[derive(Debug, Clone)]
pub struct SelectQuery {
    graph: JoinGraph,
    filters: Vec<SqlExpression>,
    group_by: Vec<String>,
    order_by: Vec<String>,
    limit: Option<u64>,
    offset: Option<u64>,
}

impl SelectQuery {
    #[must_use]
    pub const fn new(graph: JoinGraph) -> Self {
        Self {
            graph,
            filters: Vec::new(),
            group_by: Vec::new(),
            order_by: Vec::new(),
            limit: None,
            offset: None,
        }
    }

    /// A query over the join graph of an entity type.
    ///
    /// # Errors
    ///
    /// Returns the graph construction error for `E`.
    pub fn of<E: Entity>() -> Result<Self> {
        JoinGraph::of::<E>().map(Self::new)
    }

    #[must_use]
    pub const fn graph(&self) -> &JoinGraph {
        &self.graph
    }

    /// Adds a WHERE fragment with `?` placeholders. Fragments are ANDed.
    #[must_use]
    pub fn filter(mut self, sql: &str, params: Vec<SqlValue>) -> Self {
        self.filters.push(SqlExpression::with_params(sql, params));
        self
    }

    /// Restricts the root entity to the given primary key values.
    ///
    /// # Errors
    ///
    /// Fails when the root has no primary key or `values` does not match
    /// its arity.
    pub fn filter_primary_key(self, values: Vec<SqlValue>) -> Result<Self> {
        let root = self.graph.root();
        let keys: Vec<String> = root.primary_key().map(|c| c.name.clone()).collect();
        let entity = root.entity.clone().unwrap_or_else(|| root.alias.clone());
        if keys.is_empty() {
            return Err(Error::MissingPrimaryKey(entity));
        }
        if keys.len() != values.len() {
            return Err(Error::PrimaryKeyArity {
                entity,
                expected: keys.len(),
                found: values.len(),
            });
        }
        let alias = root.alias.clone();
        let sql = keys
            .iter()
            .map(|k| format!("`{alias}`.{k} = ?"))
            .collect::<Vec<_>>()
            .join(" AND ");
        Ok(self.filter(&sql, values))
    }

    /// Convenience for a single-column key.
    ///
    /// # Errors
    ///
    /// Same as [`SelectQuery::filter_primary_key`].
    pub fn filter_id<V: ToSqlValue>(self, id: V) -> Result<Self> {
        self.filter_primary_key(vec![id.to_sql_value()])
    }

    #[must_use]
    pub fn group_by(mut self, expr: &str) -> Self {
        self.group_by.push(expr.to_string());
        self
    }

    #[must_use]
    pub fn order_by(mut self, expr: &str) -> Self {
        self.order_by.push(expr.to_string());
        self
    }

    #[must_use]
    pub const fn limit(mut self, n: u64) -> Self {
        self.limit = Some(n);
        self
    }

    #[must_use]
    pub const fn offset(mut self, n: u64) -> Self {
        self.offset = Some(n);
        self
    }

    /// Renders the statement text.
    #[must_use]
    pub fn to_sql(&self) -> String {
        let mut columns = Vec::new();
        for node in self.graph.nodes() {
            for column in &node.columns {
                let label = node.label(&column.name);
                let expr = match &column.select {
                    Some(select) => select.replace("{this}", &format!("`{}`", node.alias)),
                    None => format!("`{}`.{}", node.alias, column.name),
                };
                columns.push(format!(" {expr} AS `{label}`"));
            }
        }

        let mut sql = String::from("SELECT\n");
        sql.push_str(&columns.join(",\n"));
        sql.push_str("\nFROM ");
        sql.push_str(&self.graph.root().table);

        for node in self.graph.nodes() {
            for join in &node.joins {
                sql.push_str("\n ");
                sql.push_str(&join.to_sql());
            }
        }

        match self.filters.as_slice() {
            [] => {}
            [single] => {
                sql.push_str("\nWHERE ");
                sql.push_str(single.sql());
            }
            many => {
                sql.push_str("\nWHERE ");
                let parts: Vec<String> = many.iter().map(|f| format!("({})", f.sql())).collect();
                sql.push_str(&parts.join("\n AND "));
            }
        }

        if !self.group_by.is_empty() {
            sql.push_str("\nGROUP BY ");
            sql.push_str(&self.group_by.join(", "));
        }

        if !self.order_by.is_empty() {
            sql.push_str("\nORDER BY ");
            sql.push_str(&self.order_by.join(", "));
        }

        match (self.limit, self.offset) {
            (Some(limit), Some(offset)) => {
                sql.push_str(&format!("\nLIMIT {limit} OFFSET {offset}"));
            }
            (Some(limit), None) => sql.push_str(&format!("\nLIMIT {limit}")),
            // SQLite needs a LIMIT before OFFSET; -1 means no limit.
            (None, Some(offset)) => sql.push_str(&format!("\nLIMIT -1 OFFSET {offset}")),
            (None, None) => {}
        }

        sql
    }

    /// Renders the statement with its parameters in fragment order.
    #[must_use]
    pub fn to_expression(&self) -> SqlExpression {
        let params = self
            .filters
            .iter()
            .flat_map(|f| f.params().iter().cloned())
            .collect();
        SqlExpression::with_params(self.to_sql(), params)
    }
}
