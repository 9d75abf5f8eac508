//! Error types for schema introspection, statement building and row mapping.

use thiserror::Error;

use crate::value::SqlValue;

/// A column value could not be converted to the requested Rust type.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("expected {expected}, found {found}")]
pub struct ValueError {
    /// The SQL type the target Rust type accepts.
    pub expected: &'static str,
    /// What was actually found.
    pub found: &'static str,
}

impl ValueError {
    #[must_use]
    pub const fn new(expected: &'static str, found: &SqlValue) -> Self {
        Self {
            expected,
            found: found.type_name(),
        }
    }

    #[must_use]
    pub const fn unparsable(expected: &'static str) -> Self {
        Self {
            expected,
            found: "unparsable TEXT",
        }
    }
}

/// Errors raised while describing, compiling or decoding entities.
#[derive(Debug, Error)]
pub enum Error {
    /// An entity name is not present in the catalog.
    #[error("unknown entity: {0}")]
    UnknownEntity(String),

    /// Neither the entity nor any unprefixed embed declares a table.
    #[error("entity {0} has no table")]
    MissingTable(String),

    /// A join or statement needs a primary key the entity does not declare.
    #[error("entity {0} has no primary key")]
    MissingPrimaryKey(String),

    /// The entity links back to one of its own ancestors.
    #[error("link cycle: {entity} is reached again at alias `{alias}`")]
    Cycle {
        /// The entity seen twice.
        entity: String,
        /// Alias at which the cycle closes.
        alias: String,
    },

    /// An entity node of a join graph selects no column, so its rows have
    /// no identity.
    #[error("entity {entity} selects no columns at alias `{alias}`")]
    NoColumns {
        /// Entity name.
        entity: String,
        /// Alias of the node.
        alias: String,
    },

    /// Two nodes in one join graph ended up with the same alias.
    #[error("duplicate alias `{0}`")]
    DuplicateAlias(String),

    /// Wrong number of primary key values for an entity.
    #[error("entity {entity} has {expected} primary key column(s), got {found} value(s)")]
    PrimaryKeyArity {
        /// Entity name.
        entity: String,
        /// Number of key columns.
        expected: usize,
        /// Number of values supplied.
        found: usize,
    },

    /// An UPDATE / DELETE needs the primary key but it is NULL.
    #[error("primary key column {column} of {entity} is not set")]
    UnsetPrimaryKey {
        /// Entity name.
        entity: String,
        /// The NULL key column.
        column: String,
    },

    /// An UPDATE with nothing but key columns.
    #[error("entity {0} has no columns to update")]
    NothingToUpdate(String),

    /// The result set lacks a column the join graph expects.
    #[error("missing column `{0}` in result set")]
    MissingColumn(String),

    /// A column value could not be converted.
    #[error("column `{column}`: {source}")]
    Value {
        /// Record key of the offending column.
        column: String,
        /// Underlying conversion failure.
        #[source]
        source: ValueError,
    },
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, Error>;
