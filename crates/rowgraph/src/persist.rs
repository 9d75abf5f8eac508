//! Writing single entities.
//!
//! Only the entity's own table is touched; linked records are persisted
//! separately by the caller.

use rowgraph_core::{Entity, statement};
use sqlx::{Executor, Sqlite};
use tracing::debug;

use crate::db::{execute_statement, prepare};
use crate::error::Result;

/// Inserts an entity. When its single primary key was NULL, the key
/// generated by SQLite is stored back into the entity.
///
/// Returns the rowid of the inserted row.
pub async fn insert<'c, X, E>(executor: X, entity: &mut E) -> Result<i64>
where
    X: Executor<'c, Database = Sqlite>,
    E: Entity,
{
    let statement = statement::insert(entity)?;
    let expression = &statement.expression;
    debug!(sql = %expression.sql(), params = expression.params().len(), "Executing insert");
    let result = prepare(expression).execute(executor).await?;
    let id = result.last_insert_rowid();

    if let Some(column) = &statement.generated_key {
        let stored = entity.set_generated_id(id)?;
        debug!(entity = E::NAME, column = %column, id, stored, "Generated key");
    }
    Ok(id)
}

/// Updates all non-key columns of an entity; returns the affected row count.
pub async fn update<'c, X, E>(executor: X, entity: &E) -> Result<u64>
where
    X: Executor<'c, Database = Sqlite>,
    E: Entity,
{
    execute_statement(executor, &statement::update(entity)?).await
}

/// Deletes an entity by primary key; returns the affected row count.
pub async fn delete<'c, X, E>(executor: X, entity: &E) -> Result<u64>
where
    X: Executor<'c, Database = Sqlite>,
    E: Entity,
{
    execute_statement(executor, &statement::delete(entity)?).await
}

/// Inserts an entity, or updates it when its primary key already exists.
pub async fn upsert<'c, X, E>(executor: X, entity: &E) -> Result<u64>
where
    X: Executor<'c, Database = Sqlite>,
    E: Entity,
{
    execute_statement(executor, &statement::upsert(entity)?).await
}
