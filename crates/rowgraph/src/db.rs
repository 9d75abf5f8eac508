//! Statement execution on SQLite.
//!
//! Every helper takes any sqlx executor: a `&SqlitePool`, a
//! `&mut SqliteConnection` or `&mut *transaction`.

use futures::future::BoxFuture;
use rowgraph_core::{Record, ResultSet, SelectQuery, SqlExpression, SqlValue, decode};
use sqlx::query::Query;
use sqlx::sqlite::{SqliteArguments, SqliteConnection, SqlitePool, SqliteRow};
use sqlx::{Column, Executor, Row, Sqlite, TypeInfo, ValueRef};
use tracing::{debug, warn};

use crate::error::Result;

/// Binds a SqlValue parameter to a query.
fn bind_param<'q>(
    query: Query<'q, Sqlite, SqliteArguments<'q>>,
    value: SqlValue,
) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    match value {
        SqlValue::Null => query.bind(Option::<i64>::None),
        SqlValue::Bool(b) => query.bind(b),
        SqlValue::Int(i) => query.bind(i),
        SqlValue::Float(f) => query.bind(f),
        SqlValue::Text(s) => query.bind(s),
        SqlValue::Blob(b) => query.bind(b),
    }
}

pub(crate) fn prepare(expression: &SqlExpression) -> Query<'_, Sqlite, SqliteArguments<'_>> {
    expression
        .params()
        .iter()
        .cloned()
        .fold(sqlx::query(expression.sql()), bind_param)
}

/// SQLite storage class of one result value.
enum Storage {
    Null,
    Integer,
    Real,
    Blob,
    Text,
}

fn storage_of(row: &SqliteRow, index: usize) -> Result<Storage> {
    let raw = row.try_get_raw(index)?;
    if raw.is_null() {
        return Ok(Storage::Null);
    }
    let storage = match raw.type_info().name() {
        "INTEGER" | "BOOLEAN" => Storage::Integer,
        "REAL" => Storage::Real,
        "BLOB" => Storage::Blob,
        _ => Storage::Text,
    };
    Ok(storage)
}

fn decode_value(row: &SqliteRow, index: usize) -> Result<SqlValue> {
    let value = match storage_of(row, index)? {
        Storage::Null => SqlValue::Null,
        Storage::Integer => SqlValue::Int(row.try_get_unchecked(index)?),
        Storage::Real => SqlValue::Float(row.try_get_unchecked(index)?),
        Storage::Blob => SqlValue::Blob(row.try_get_unchecked(index)?),
        Storage::Text => SqlValue::Text(row.try_get_unchecked(index)?),
    };
    Ok(value)
}

/// Runs a SELECT and decodes every row dynamically, by storage class.
///
/// The column labels come from the first row, so an empty result has no
/// columns.
pub async fn fetch_result_set<'c, X>(executor: X, expression: &SqlExpression) -> Result<ResultSet>
where
    X: Executor<'c, Database = Sqlite>,
{
    debug!(sql = %expression.sql(), params = expression.params().len(), "Fetching rows");
    let rows = prepare(expression).fetch_all(executor).await?;
    debug!(rows = rows.len(), "Fetched rows");

    let columns = rows
        .first()
        .map(|row| row.columns().iter().map(|c| c.name().to_string()).collect())
        .unwrap_or_default();
    let mut result = ResultSet::new(columns);
    for row in &rows {
        let values = (0..row.len())
            .map(|index| decode_value(row, index))
            .collect::<Result<Vec<_>>>()?;
        result.push_row(values);
    }
    Ok(result)
}

/// Runs a join query and decodes it into root records.
pub async fn fetch_records<'c, X>(executor: X, query: &SelectQuery) -> Result<Vec<Record>>
where
    X: Executor<'c, Database = Sqlite>,
{
    let result = fetch_result_set(executor, &query.to_expression()).await?;
    if result.is_empty() {
        return Ok(Vec::new());
    }
    let records = decode(query.graph(), &result)?;
    debug!(records = records.len(), "Decoded records");
    Ok(records)
}

/// Runs a single statement and returns the number of affected rows.
pub async fn execute_statement<'c, X>(executor: X, expression: &SqlExpression) -> Result<u64>
where
    X: Executor<'c, Database = Sqlite>,
{
    debug!(sql = %expression.sql(), params = expression.params().len(), "Executing statement");
    let result = prepare(expression).execute(executor).await?;
    Ok(result.rows_affected())
}

/// Runs a DDL script, which may hold several `;`-separated statements.
pub async fn execute_ddl<'c, X>(executor: X, script: &'c str) -> Result<()>
where
    X: Executor<'c, Database = Sqlite>,
{
    debug!(bytes = script.len(), "Executing DDL script");
    sqlx::raw_sql(script).execute(executor).await?;
    Ok(())
}

/// Runs `f` inside a transaction: committed when `f` returns `Ok`, rolled
/// back when it returns `Err`.
///
/// # Example
///
/// ```ignore
/// let user = run_in_transaction(&pool, |conn| {
///     Box::pin(async move {
///         let mut user = User { id: None, name: "Ann".into() };
///         rowgraph::insert(&mut *conn, &mut user).await?;
///         Ok(user)
///     })
/// })
/// .await?;
/// ```
pub async fn run_in_transaction<T, F>(pool: &SqlitePool, f: F) -> Result<T>
where
    F: for<'t> FnOnce(&'t mut SqliteConnection) -> BoxFuture<'t, Result<T>>,
{
    let mut tx = pool.begin().await?;
    let outcome = f(&mut *tx).await;
    match outcome {
        Ok(value) => {
            tx.commit().await?;
            debug!("Transaction committed");
            Ok(value)
        }
        Err(error) => {
            warn!(error = %error, "Rolling back transaction");
            if let Err(rollback) = tx.rollback().await {
                warn!(error = %rollback, "Rollback failed");
            }
            Err(error)
        }
    }
}
