//! # rowgraph
//!
//! Runs rowgraph join queries and entity statements against SQLite via sqlx.
//!
//! This crate provides:
//! - [`Query`] for typed, chainable join queries
//! - [`find_by_id`] to load one entity with everything it links to
//! - [`insert`], [`update`], [`delete`] and [`upsert`] for single entities
//! - [`execute_ddl`] and [`run_in_transaction`] helpers
//!
//! Pools and connections are created by the caller. Every helper accepts
//! any sqlx executor.
//!
//! ## Quick Start
//!
//! ```ignore
//! use rowgraph::{Entity, Query, ToSqlValue};
//! use sqlx::SqlitePool;
//!
//! #[derive(Entity)]
//! #[table(name = "person")]
//! struct Person {
//!     #[column(primary_key)]
//!     id: Option<i64>,
//!     firstname: String,
//!     #[relation]
//!     email_addresses: Vec<EmailAddress>,
//! }
//!
//! async fn example(pool: &SqlitePool) -> rowgraph::Result<()> {
//!     let mut person = Person { id: None, firstname: "John".into(), email_addresses: vec![] };
//!     rowgraph::insert(pool, &mut person).await?;
//!
//!     let johns = Query::<Person>::new()?
//!         .filter("`person`.firstname = ?", vec!["John".to_sql_value()])
//!         .execute(pool)
//!         .await?;
//!     Ok(())
//! }
//! ```
//!
//! The derive expands to paths under `rowgraph_core`, so crates deriving
//! [`Entity`] depend on `rowgraph-core` as well.

mod db;
mod error;
mod persist;
mod query;

pub use db::{execute_ddl, execute_statement, fetch_records, fetch_result_set, run_in_transaction};
pub use error::{Error, Result};
pub use persist::{delete, insert, update, upsert};
pub use query::{Query, find_by_id};

pub use rowgraph_core::{
    Catalog, JoinGraph, Record, ResultSet, SelectQuery, SqlExpression, SqlValue, ToSqlValue,
};
pub use rowgraph_core::Entity;
pub use rowgraph_derive::Entity;
