//! # rowgraph-core
//!
//! Compiles graphs of related record types into a single multi-join SELECT,
//! and decodes the flat result rows back into trees of records.
//!
//! This crate provides:
//! - Entity metadata ([`EntityDef`], [`Catalog`], the [`Entity`] trait)
//! - A schema introspector building a [`JoinGraph`] from a root entity
//! - A query builder ([`SelectQuery`]) with deterministic column aliasing
//! - A row mapper ([`decode`]) that merges the duplicate parent rows
//!   produced by one-to-many joins
//! - INSERT / UPDATE / DELETE / upsert builders for single instances
//!
//! Nothing here touches a database; see the `rowgraph` crate for execution.
//!
//! ## Example
//!
//! ```ignore
//! use rowgraph_core::{SelectQuery, ToSqlValue};
//!
//! #[derive(Entity)]
//! #[table(name = "event")]
//! struct Event {
//!     #[column(primary_key)]
//!     id: Option<i64>,
//!     title: String,
//!     #[relation(linktable = "event_person")]
//!     persons: Vec<Person>,
//! }
//!
//! let expr = SelectQuery::of::<Event>()?
//!     .filter("persons.firstname=?", vec!["John".to_sql_value()])
//!     .to_expression();
//!
//! // SELECT
//! //  `event`.id AS `event.id`,
//! //  `event`.title AS `event.title`,
//! //  `persons`.id AS `persons.id`,
//! //  ...
//! // FROM event
//! //  LEFT JOIN event_person AS `event_person` ON `event`.id = `event_person`.event_id
//! //  LEFT JOIN person AS `persons` ON `event_person`.person_id = `persons`.id
//! // WHERE persons.firstname=?
//! ```

pub mod error;
pub mod graph;
pub mod mapper;
pub mod query;
pub mod schema;
pub mod statement;
pub mod value;

pub use error::{Error, Result, ValueError};
pub use graph::{Join, JoinGraph, Node, NodeKind, SelectColumn};
pub use mapper::{Record, ResultSet, decode};
pub use query::SelectQuery;
pub use schema::{Catalog, Entity, EntityDef, FieldDef, FieldKind, Related, ValueList};
pub use statement::InsertStatement;
pub use value::{FromSqlValue, SqlExpression, SqlValue, ToSqlValue};

/// Decodes a result set straight into entities of type `E`.
///
/// # Errors
///
/// Propagates [`decode`] and [`Entity::from_record`] failures.
pub fn hydrate<E: Entity>(graph: &JoinGraph, result: &ResultSet) -> Result<Vec<E>> {
    decode(graph, result)?
        .iter()
        .map(|record| E::from_record(record, ""))
        .collect()
}
