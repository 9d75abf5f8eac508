//! INSERT, UPDATE, DELETE and upsert statements for a single entity.
//!
//! Only the entity's own table is written: embedded fields are flattened
//! into it, computed columns are skipped and links are left alone.

use crate::error::{Error, Result};
use crate::graph::JoinGraph;
use crate::schema::{Catalog, Entity};
use crate::value::{SqlExpression, SqlValue};

/// An INSERT plus the key column the database will generate, if any.
#[derive(Debug, Clone, PartialEq)]
pub struct InsertStatement {
    pub expression: SqlExpression,
    /// Set when the entity has a single primary key whose value was NULL.
    pub generated_key: Option<String>,
}

/// The writable columns of one instance, split into key and non-key.
struct Row {
    entity: String,
    table: String,
    keys: Vec<(String, SqlValue)>,
    columns: Vec<(String, SqlValue)>,
}

impl Row {
    fn of<E: Entity>(entity: &E) -> Result<Self> {
        let catalog = Catalog::of::<E>();
        let node = JoinGraph::table_node(&catalog, E::NAME)?;

        let mut values = Vec::new();
        entity.values("", &mut values);

        let mut keys = Vec::new();
        let mut columns = Vec::new();
        for column in node.columns.iter().filter(|c| c.select.is_none()) {
            let Some(position) = values.iter().position(|(name, _)| *name == column.name) else {
                continue;
            };
            let (name, value) = values.swap_remove(position);
            if column.primary_key {
                keys.push((name, value));
            } else {
                columns.push((name, value));
            }
        }

        Ok(Self {
            entity: E::NAME.to_string(),
            table: node.table,
            keys,
            columns,
        })
    }

    fn require_keys(&self) -> Result<()> {
        if self.keys.is_empty() {
            return Err(Error::MissingPrimaryKey(self.entity.clone()));
        }
        if let Some((column, _)) = self.keys.iter().find(|(_, v)| v.is_null()) {
            return Err(Error::UnsetPrimaryKey {
                entity: self.entity.clone(),
                column: column.clone(),
            });
        }
        Ok(())
    }

    /// Key and non-key columns to insert; NULL keys are left to the database.
    fn insert_columns(&self) -> Vec<(String, SqlValue)> {
        self.keys
            .iter()
            .filter(|(_, v)| !v.is_null())
            .chain(&self.columns)
            .cloned()
            .collect()
    }

    fn where_keys(&self) -> (String, Vec<SqlValue>) {
        let sql = self
            .keys
            .iter()
            .map(|(k, _)| format!("{k} = ?"))
            .collect::<Vec<_>>()
            .join(" AND ");
        (sql, self.keys.iter().map(|(_, v)| v.clone()).collect())
    }
}

fn insert_sql(table: &str, columns: &[(String, SqlValue)]) -> (String, Vec<SqlValue>) {
    if columns.is_empty() {
        return (format!("INSERT INTO {table} DEFAULT VALUES"), Vec::new());
    }
    let names: Vec<&str> = columns.iter().map(|(n, _)| n.as_str()).collect();
    let placeholders: Vec<&str> = columns.iter().map(|_| "?").collect();
    (
        format!(
            "INSERT INTO {table} ({}) VALUES ({})",
            names.join(", "),
            placeholders.join(", ")
        ),
        columns.iter().map(|(_, v)| v.clone()).collect(),
    )
}

/// Builds the INSERT for an instance.
///
/// # Errors
///
/// Returns the catalog error when `E` has no table.
pub fn insert<E: Entity>(entity: &E) -> Result<InsertStatement> {
    let row = Row::of(entity)?;
    let (sql, params) = insert_sql(&row.table, &row.insert_columns());
    let generated_key = match row.keys.as_slice() {
        [(column, SqlValue::Null)] => Some(column.clone()),
        _ => None,
    };
    Ok(InsertStatement {
        expression: SqlExpression::with_params(sql, params),
        generated_key,
    })
}

/// Builds the UPDATE of all non-key columns, keyed on the primary key.
///
/// # Errors
///
/// Fails when a key is missing or NULL, or when there is no non-key
/// column to set.
pub fn update<E: Entity>(entity: &E) -> Result<SqlExpression> {
    let row = Row::of(entity)?;
    row.require_keys()?;
    if row.columns.is_empty() {
        return Err(Error::NothingToUpdate(row.entity));
    }

    let assignments: Vec<String> = row.columns.iter().map(|(c, _)| format!("{c} = ?")).collect();
    let (where_sql, key_params) = row.where_keys();
    let mut params: Vec<SqlValue> = row.columns.iter().map(|(_, v)| v.clone()).collect();
    params.extend(key_params);

    Ok(SqlExpression::with_params(
        format!(
            "UPDATE {} SET {} WHERE {where_sql}",
            row.table,
            assignments.join(", ")
        ),
        params,
    ))
}

/// Builds the DELETE of an instance by primary key.
///
/// # Errors
///
/// Fails when the entity has no primary key or a key value is NULL.
pub fn delete<E: Entity>(entity: &E) -> Result<SqlExpression> {
    let row = Row::of(entity)?;
    row.require_keys()?;
    let (where_sql, params) = row.where_keys();
    Ok(SqlExpression::with_params(
        format!("DELETE FROM {} WHERE {where_sql}", row.table),
        params,
    ))
}

/// Builds an `INSERT ... ON CONFLICT (keys) DO UPDATE` for an instance.
///
/// # Errors
///
/// Returns [`Error::MissingPrimaryKey`] when the entity has no key.
pub fn upsert<E: Entity>(entity: &E) -> Result<SqlExpression> {
    let row = Row::of(entity)?;
    if row.keys.is_empty() {
        return Err(Error::MissingPrimaryKey(row.entity));
    }
    // Keys are always listed: DEFAULT VALUES cannot take an upsert clause.
    let all: Vec<(String, SqlValue)> = row.keys.iter().chain(&row.columns).cloned().collect();
    let (mut sql, params) = insert_sql(&row.table, &all);

    let conflict: Vec<&str> = row.keys.iter().map(|(k, _)| k.as_str()).collect();
    sql.push_str(" ON CONFLICT (");
    sql.push_str(&conflict.join(", "));
    sql.push(')');

    if row.columns.is_empty() {
        sql.push_str(" DO NOTHING");
    } else {
        let updates: Vec<String> = row
            .columns
            .iter()
            .map(|(col, _)| format!("{col} = excluded.{col}"))
            .collect();
        sql.push_str(" DO UPDATE SET ");
        sql.push_str(&updates.join(", "));
    }

    Ok(SqlExpression::with_params(sql, params))
}
