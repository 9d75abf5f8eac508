//! Error types for query execution.

use thiserror::Error;

/// Errors raised while running statements against the database.
#[derive(Debug, Error)]
pub enum Error {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Schema, statement or decoding error.
    #[error(transparent)]
    Core(#[from] rowgraph_core::Error),

    /// No entity matched the query.
    #[error("entity not found")]
    NotFound,

    /// Several root entities matched when exactly one was expected.
    #[error("{0} entities returned when one was expected")]
    MultipleRowsReturned(usize),
}

/// Result type alias for execution helpers.
pub type Result<T> = std::result::Result<T, Error>;
