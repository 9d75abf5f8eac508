//! Typed join queries.

use std::marker::PhantomData;

use rowgraph_core::{Entity, Record, SelectQuery, SqlExpression, SqlValue, ToSqlValue};
use sqlx::{Executor, Sqlite};

use crate::db::fetch_records;
use crate::error::{Error, Result};

/// A join query returning entities of type `E`.
///
/// Fragments refer to columns through their node aliases: the root table
/// name for the queried entity, the link field names for joined ones.
///
/// # Example
///
/// ```ignore
/// let events = Query::<EventWithPersons>::new()?
///     .filter("persons.firstname = ?", vec!["John".to_sql_value()])
///     .order_by("`event`.date")
///     .execute(&pool)
///     .await?;
/// ```
#[derive(Debug, Clone)]
pub struct Query<E: Entity> {
    select: SelectQuery,
    _marker: PhantomData<fn() -> E>,
}

impl<E: Entity> Query<E> {
    /// A query over everything reachable from `E`.
    pub fn new() -> Result<Self> {
        Ok(Self::from_select(SelectQuery::of::<E>()?))
    }

    /// Wraps a select built elsewhere; its root must be `E`.
    #[must_use]
    pub fn from_select(select: SelectQuery) -> Self {
        Self {
            select,
            _marker: PhantomData,
        }
    }

    #[must_use]
    pub fn filter(mut self, sql: &str, params: Vec<SqlValue>) -> Self {
        self.select = self.select.filter(sql, params);
        self
    }

    /// Restricts the root entity to one primary key value.
    pub fn filter_id<V: ToSqlValue>(mut self, id: V) -> Result<Self> {
        self.select = self.select.filter_id(id)?;
        Ok(self)
    }

    #[must_use]
    pub fn group_by(mut self, expr: &str) -> Self {
        self.select = self.select.group_by(expr);
        self
    }

    #[must_use]
    pub fn order_by(mut self, expr: &str) -> Self {
        self.select = self.select.order_by(expr);
        self
    }

    /// Limits the number of joined rows, not of root entities.
    #[must_use]
    pub fn limit(mut self, n: u64) -> Self {
        self.select = self.select.limit(n);
        self
    }

    #[must_use]
    pub fn offset(mut self, n: u64) -> Self {
        self.select = self.select.offset(n);
        self
    }

    #[must_use]
    pub fn select(&self) -> &SelectQuery {
        &self.select
    }

    #[must_use]
    pub fn to_expression(&self) -> SqlExpression {
        self.select.to_expression()
    }

    /// Runs the query and returns the untyped record trees.
    pub async fn records<'c, X>(&self, executor: X) -> Result<Vec<Record>>
    where
        X: Executor<'c, Database = Sqlite>,
    {
        fetch_records(executor, &self.select).await
    }

    /// Runs the query and hydrates every root entity.
    pub async fn execute<'c, X>(&self, executor: X) -> Result<Vec<E>>
    where
        X: Executor<'c, Database = Sqlite>,
    {
        let records = self.records(executor).await?;
        let entities = records
            .iter()
            .map(|record| E::from_record(record, ""))
            .collect::<rowgraph_core::Result<Vec<_>>>()?;
        Ok(entities)
    }

    /// Returns the first root entity, or `None`.
    ///
    /// All rows are fetched: a SQL LIMIT would also cut the joined children.
    pub async fn first<'c, X>(&self, executor: X) -> Result<Option<E>>
    where
        X: Executor<'c, Database = Sqlite>,
    {
        let records = self.records(executor).await?;
        records
            .first()
            .map(|record| E::from_record(record, ""))
            .transpose()
            .map_err(Error::from)
    }

    /// Returns the only root entity.
    ///
    /// Fails with [`Error::NotFound`] or [`Error::MultipleRowsReturned`].
    pub async fn get<'c, X>(&self, executor: X) -> Result<E>
    where
        X: Executor<'c, Database = Sqlite>,
    {
        let records = self.records(executor).await?;
        match records.as_slice() {
            [] => Err(Error::NotFound),
            [record] => Ok(E::from_record(record, "")?),
            many => Err(Error::MultipleRowsReturned(many.len())),
        }
    }
}

/// Loads one entity, with everything it links to, by primary key.
///
/// # Example
///
/// ```ignore
/// let event = find_by_id::<EventWithPersons>(&pool, 1).await?;
/// ```
pub async fn find_by_id<'c, E: Entity>(
    executor: impl Executor<'c, Database = Sqlite>,
    id: impl ToSqlValue,
) -> Result<Option<E>> {
    Query::<E>::new()?.filter_id(id)?.first(executor).await
}
