//! Entity metadata.
//!
//! An entity is described at runtime by an [`EntityDef`]: its table, its
//! columns, the entities it embeds and the entities it links to. The
//! `#[derive(Entity)]` macro generates these descriptions; they can also be
//! written by hand or loaded from JSON through the serde impls on
//! [`Catalog`].

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::mapper::Record;
use crate::value::{FromSqlValue, SqlValue};

/// Description of one entity type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityDef {
    /// Entity name, unique within a catalog.
    pub name: String,
    /// Table name. `None` inherits the table of the first unprefixed embed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table: Option<String>,
    /// Fields in declaration order.
    #[serde(default)]
    pub fields: Vec<FieldDef>,
}

impl EntityDef {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            table: None,
            fields: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }

    #[must_use]
    pub fn with_field(mut self, field: FieldDef) -> Self {
        self.fields.push(field);
        self
    }
}

/// One field of an entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDef {
    /// Field name. For links this is also the record key of the children.
    pub name: String,
    #[serde(flatten)]
    pub kind: FieldKind,
}

/// How a field maps onto the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FieldKind {
    /// A column of the entity's own table.
    Column {
        column: String,
        #[serde(default)]
        primary_key: bool,
        /// Raw select expression replacing the column; `{this}` is the
        /// quoted alias of the owning node. Such columns are read-only.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        select: Option<String>,
    },
    /// The fields of another entity, stored in the same table.
    Embed {
        entity: String,
        /// Prepended to every column and link name of the embedded entity.
        #[serde(default)]
        prefix: String,
    },
    /// A related entity, joined in.
    Link {
        entity: String,
        /// Collection (`Vec`) rather than a single optional record.
        #[serde(default)]
        many: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        linktable: Option<String>,
        /// Overrides the default foreign key column name.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        foreign_key: Option<String>,
        /// Link table column referencing the target (default `{target}_id`).
        #[serde(default, skip_serializing_if = "Option::is_none")]
        link_key: Option<String>,
    },
    /// Scalar values fetched from one column of a link table.
    Values {
        linktable: String,
        column: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        foreign_key: Option<String>,
    },
}

impl FieldDef {
    /// A plain column named after the field.
    #[must_use]
    pub fn column(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            kind: FieldKind::Column {
                column: name.clone(),
                primary_key: false,
                select: None,
            },
            name,
        }
    }

    /// A primary key column named after the field.
    #[must_use]
    pub fn primary_key(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            kind: FieldKind::Column {
                column: name.clone(),
                primary_key: true,
                select: None,
            },
            name,
        }
    }

    /// A read-only column computed by a select expression.
    #[must_use]
    pub fn computed(name: impl Into<String>, select: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            kind: FieldKind::Column {
                column: name.clone(),
                primary_key: false,
                select: Some(select.into()),
            },
            name,
        }
    }

    #[must_use]
    pub fn embed(
        name: impl Into<String>,
        entity: impl Into<String>,
        prefix: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            kind: FieldKind::Embed {
                entity: entity.into(),
                prefix: prefix.into(),
            },
        }
    }

    /// A link with default key columns.
    #[must_use]
    pub fn link(
        name: impl Into<String>,
        entity: impl Into<String>,
        many: bool,
        linktable: Option<&str>,
    ) -> Self {
        Self {
            name: name.into(),
            kind: FieldKind::Link {
                entity: entity.into(),
                many,
                linktable: linktable.map(str::to_string),
                foreign_key: None,
                link_key: None,
            },
        }
    }

    #[must_use]
    pub fn values(
        name: impl Into<String>,
        linktable: impl Into<String>,
        column: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            kind: FieldKind::Values {
                linktable: linktable.into(),
                column: column.into(),
                foreign_key: None,
            },
        }
    }
}

/// A set of entity definitions, closed under embeds and links.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Catalog {
    entities: Vec<EntityDef>,
}

impl Catalog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The catalog of everything reachable from `E`.
    #[must_use]
    pub fn of<E: Entity>() -> Self {
        let mut catalog = Self::new();
        E::describe(&mut catalog);
        catalog
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.entities.iter().any(|e| e.name == name)
    }

    /// Adds a definition, replacing any previous one with the same name.
    pub fn insert(&mut self, def: EntityDef) {
        if let Some(existing) = self.entities.iter_mut().find(|e| e.name == def.name) {
            *existing = def;
            return;
        }
        self.entities.push(def);
    }

    /// Looks up a definition by entity name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownEntity`] when no definition has that name.
    pub fn get(&self, name: &str) -> Result<&EntityDef> {
        self.entities
            .iter()
            .find(|e| e.name == name)
            .ok_or_else(|| Error::UnknownEntity(name.to_string()))
    }

    #[must_use]
    pub fn entities(&self) -> &[EntityDef] {
        &self.entities
    }

    /// Resolves the table of an entity, following unprefixed embeds.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownEntity`] for names missing from the catalog and
    /// [`Error::MissingTable`] when no table is declared along the embed chain.
    pub fn table_of(&self, name: &str) -> Result<String> {
        let mut visited: Vec<&str> = Vec::new();
        let mut current = self.get(name)?;
        loop {
            if let Some(table) = &current.table {
                return Ok(table.clone());
            }
            visited.push(&current.name);
            let base = current.fields.iter().find_map(|f| match &f.kind {
                FieldKind::Embed { entity, prefix } if prefix.is_empty() => Some(entity.as_str()),
                _ => None,
            });
            match base {
                Some(base) if !visited.contains(&base) => current = self.get(base)?,
                _ => return Err(Error::MissingTable(name.to_string())),
            }
        }
    }
}

/// A record type that can be queried, hydrated and persisted.
///
/// Normally implemented with `#[derive(Entity)]`.
pub trait Entity: Sized {
    /// Entity name inside a [`Catalog`].
    const NAME: &'static str;

    /// Adds this entity's definition, and those of everything it embeds or
    /// links to, unless already present.
    fn describe(catalog: &mut Catalog);

    /// Builds an instance from a decoded record. `prefix` is prepended to
    /// every column and link key (non-empty for prefixed embeds).
    ///
    /// # Errors
    ///
    /// Fails when a column is missing from the record or cannot be
    /// converted to the field's type.
    fn from_record(record: &Record, prefix: &str) -> Result<Self>;

    /// Appends `(column, value)` for every writable column, embeds
    /// flattened, links skipped.
    fn values(&self, prefix: &str, out: &mut Vec<(String, SqlValue)>);

    /// Stores a database-generated key. Returns `false` when the entity has
    /// no single key to store it in.
    ///
    /// # Errors
    ///
    /// Fails when the key field cannot hold an integer.
    fn set_generated_id(&mut self, id: i64) -> Result<bool> {
        let _ = id;
        Ok(false)
    }
}

/// Field types that hold linked entities: `Vec<T>` and `Option<T>`.
pub trait Related: Sized {
    type Target: Entity;

    /// Whether the link is a collection.
    const MANY: bool;

    /// Builds the field from the linked records of one parent.
    ///
    /// # Errors
    ///
    /// Propagates the first [`Entity::from_record`] failure.
    fn from_records(records: &[Record]) -> Result<Self>;
}

impl<T: Entity> Related for Vec<T> {
    type Target = T;
    const MANY: bool = true;

    fn from_records(records: &[Record]) -> Result<Self> {
        records.iter().map(|r| T::from_record(r, "")).collect()
    }
}

impl<T: Entity> Related for Option<T> {
    type Target = T;
    const MANY: bool = false;

    fn from_records(records: &[Record]) -> Result<Self> {
        records.first().map(|r| T::from_record(r, "")).transpose()
    }
}

/// Field types that hold values fetched through a link table.
pub trait ValueList: Sized {
    /// Converts the values fetched under `key`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Value`] for the first value that does not convert.
    fn from_values(key: &str, values: &[SqlValue]) -> Result<Self>;
}

impl<V: FromSqlValue> ValueList for Vec<V> {
    fn from_values(key: &str, values: &[SqlValue]) -> Result<Self> {
        values
            .iter()
            .map(|v| {
                V::from_sql_value(v.clone()).map_err(|source| Error::Value {
                    column: key.to_string(),
                    source,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> Catalog {
        let mut catalog = Catalog::new();
        catalog.insert(
            EntityDef::new("Event")
                .with_table("event")
                .with_field(FieldDef::primary_key("id"))
                .with_field(FieldDef::column("title")),
        );
        catalog.insert(
            EntityDef::new("EventWithPersons")
                .with_field(FieldDef::embed("event", "Event", ""))
                .with_field(FieldDef::link("persons", "Person", true, Some("event_person"))),
        );
        catalog.insert(
            EntityDef::new("Address")
                .with_field(FieldDef::column("street")),
        );
        catalog
    }

    #[test]
    fn test_table_inherited_through_embed() {
        let catalog = catalog();
        assert_eq!(catalog.table_of("Event").unwrap(), "event");
        assert_eq!(catalog.table_of("EventWithPersons").unwrap(), "event");
    }

    #[test]
    fn test_table_missing() {
        let err = catalog().table_of("Address").unwrap_err();
        assert!(matches!(err, Error::MissingTable(name) if name == "Address"));
    }

    #[test]
    fn test_prefixed_embed_does_not_provide_table() {
        let mut catalog = catalog();
        catalog.insert(
            EntityDef::new("Shipment").with_field(FieldDef::embed("event", "Event", "ev_")),
        );
        assert!(catalog.table_of("Shipment").is_err());
    }

    #[test]
    fn test_self_embedding_terminates() {
        let mut catalog = Catalog::new();
        catalog.insert(EntityDef::new("Loop").with_field(FieldDef::embed("inner", "Loop", "")));
        assert!(matches!(
            catalog.table_of("Loop"),
            Err(Error::MissingTable(_))
        ));
    }

    #[test]
    fn test_insert_replaces_by_name() {
        let mut catalog = catalog();
        catalog.insert(EntityDef::new("Event").with_table("events"));
        assert_eq!(catalog.entities().len(), 3);
        assert_eq!(catalog.table_of("Event").unwrap(), "events");
    }

    #[test]
    fn test_unknown_entity() {
        assert!(matches!(
            catalog().get("Nope"),
            Err(Error::UnknownEntity(name)) if name == "Nope"
        ));
    }

    #[test]
    fn test_catalog_json_format() {
        let json = r#"{
            "entities": [
                {
                    "name": "Article",
                    "table": "article",
                    "fields": [
                        {"name": "id", "kind": "column", "column": "id", "primary_key": true},
                        {
                            "name": "tags",
                            "kind": "values",
                            "linktable": "article_tag",
                            "column": "tag"
                        },
                        {"name": "author", "kind": "link", "entity": "Person"}
                    ]
                }
            ]
        }"#;
        let catalog: Catalog = serde_json::from_str(json).unwrap();
        let article = catalog.get("Article").unwrap();
        assert_eq!(article.fields[0], FieldDef::primary_key("id"));
        assert_eq!(article.fields[1], FieldDef::values("tags", "article_tag", "tag"));
        assert_eq!(article.fields[2], FieldDef::link("author", "Person", false, None));

        let text = serde_json::to_string(&catalog).unwrap();
        let back: Catalog = serde_json::from_str(&text).unwrap();
        assert_eq!(back, catalog);
    }
}
