//! Schema introspection: from a catalog and a root entity to a join graph.
//!
//! Every node of the graph is one aliased table in the final SELECT. The root
//! node is aliased by its table name; a linked node is aliased by its field
//! name under the root and by `parent.field` deeper down, which keeps the
//! column labels (`alias.column`) unique and stable.

use std::collections::HashSet;
use std::fmt;

use crate::error::{Error, Result};
use crate::schema::{Catalog, Entity, FieldDef, FieldKind};

/// How a node hangs off its parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// The queried entity.
    Root,
    /// A single related record (`Option<T>`).
    One,
    /// A collection of related records (`Vec<T>`).
    Many,
    /// Scalar values from one link table column.
    Values,
}

/// A column selected for a node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectColumn {
    /// Column name, embed prefixes applied. Also the record key.
    pub name: String,
    /// Raw select expression, if the column is computed.
    pub select: Option<String>,
    pub primary_key: bool,
}

/// A `LEFT JOIN` clause.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Join {
    pub table: String,
    pub alias: String,
    pub on: String,
}

impl Join {
    #[must_use]
    pub fn to_sql(&self) -> String {
        format!("LEFT JOIN {} AS `{}` ON {}", self.table, self.alias, self.on)
    }
}

/// One aliased table of the join graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub alias: String,
    pub table: String,
    /// Entity mapped by this node; `None` for value links.
    pub entity: Option<String>,
    pub parent: Option<usize>,
    /// Record key under which the parent stores this node's records.
    pub field: String,
    pub kind: NodeKind,
    pub columns: Vec<SelectColumn>,
    /// Joins that bring this node into the query, in order.
    pub joins: Vec<Join>,
}

impl Node {
    fn root(entity: &str, table: String) -> Self {
        Self {
            alias: table.clone(),
            table,
            entity: Some(entity.to_string()),
            parent: None,
            field: String::new(),
            kind: NodeKind::Root,
            columns: Vec::new(),
            joins: Vec::new(),
        }
    }

    /// Result-set label of one of this node's columns.
    #[must_use]
    pub fn label(&self, column: &str) -> String {
        format!("{}.{}", self.alias, column)
    }

    /// Primary key columns, in declaration order.
    pub fn primary_key(&self) -> impl Iterator<Item = &SelectColumn> {
        self.columns.iter().filter(|c| c.primary_key)
    }

    fn display_name(&self) -> String {
        self.entity.clone().unwrap_or_else(|| self.alias.clone())
    }
}

/// The join graph of a root entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinGraph {
    nodes: Vec<Node>,
}

impl JoinGraph {
    /// Builds the graph for `root` from a catalog.
    ///
    /// # Errors
    ///
    /// Fails for unknown entities, entities without a table, joins that
    /// need a missing primary key, link cycles, duplicate aliases and
    /// entity nodes that select no column.
    pub fn build(catalog: &Catalog, root: &str) -> Result<Self> {
        let mut builder = GraphBuilder::new(catalog);
        builder.add_node(Node::root(root, catalog.table_of(root)?))?;
        let pending = builder.collect_node(0, root)?;
        builder.link_children(0, root, pending, &mut Vec::new())?;
        Ok(Self {
            nodes: builder.nodes,
        })
    }

    /// Builds the graph for an entity type.
    ///
    /// # Errors
    ///
    /// See [`JoinGraph::build`].
    pub fn of<E: Entity>() -> Result<Self> {
        Self::build(&Catalog::of::<E>(), E::NAME)
    }

    /// The root node of `entity` alone: its table and flattened columns,
    /// links ignored.
    ///
    /// # Errors
    ///
    /// Fails for unknown entities, entities without a table and embed
    /// cycles.
    pub fn table_node(catalog: &Catalog, entity: &str) -> Result<Node> {
        let mut builder = GraphBuilder::new(catalog);
        builder.add_node(Node::root(entity, catalog.table_of(entity)?))?;
        let mut embeds = vec![entity.to_string()];
        builder.collect(0, entity, "", &mut Vec::new(), &mut embeds)?;
        Ok(builder.nodes.swap_remove(0))
    }

    #[must_use]
    pub fn root(&self) -> &Node {
        &self.nodes[0]
    }

    /// Nodes in join order: every parent precedes its children.
    #[must_use]
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Indices of the direct children of a node.
    pub fn children(&self, index: usize) -> impl Iterator<Item = usize> + '_ {
        self.nodes
            .iter()
            .enumerate()
            .filter(move |(_, n)| n.parent == Some(index))
            .map(|(i, _)| i)
    }
}

impl fmt::Display for JoinGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for node in &self.nodes {
            let mut depth = 0;
            let mut cursor = node.parent;
            while let Some(p) = cursor {
                depth += 1;
                cursor = self.nodes[p].parent;
            }
            let kind = match node.kind {
                NodeKind::Root => "root",
                NodeKind::One => "one",
                NodeKind::Many => "many",
                NodeKind::Values => "values",
            };
            let columns: Vec<&str> = node.columns.iter().map(|c| c.name.as_str()).collect();
            writeln!(
                f,
                "{:indent$}{} [{}] {} {} ({})",
                "",
                node.alias,
                kind,
                node.display_name(),
                node.table,
                columns.join(", "),
                indent = depth * 2
            )?;
        }
        Ok(())
    }
}

struct GraphBuilder<'a> {
    catalog: &'a Catalog,
    nodes: Vec<Node>,
    aliases: HashSet<String>,
}

/// A link or value field waiting for its parent's columns to be complete.
struct PendingLink {
    prefix: String,
    field: FieldDef,
}

/// Where a link field attaches to its parent.
struct LinkSite {
    parent: usize,
    parent_alias: String,
    parent_table: String,
    parent_is_root: bool,
    /// Record key of the field, embed prefix applied.
    key: String,
    alias: String,
}

impl LinkSite {
    /// `L` under the root, `parent.L` deeper down.
    fn link_alias(&self, linktable: &str) -> String {
        if self.parent_is_root {
            linktable.to_string()
        } else {
            format!("{}.{linktable}", self.parent_alias)
        }
    }
}

impl<'a> GraphBuilder<'a> {
    fn new(catalog: &'a Catalog) -> Self {
        Self {
            catalog,
            nodes: Vec::new(),
            aliases: HashSet::new(),
        }
    }

    fn claim_alias(&mut self, alias: &str) -> Result<()> {
        if self.aliases.insert(alias.to_string()) {
            Ok(())
        } else {
            Err(Error::DuplicateAlias(alias.to_string()))
        }
    }

    fn add_node(&mut self, node: Node) -> Result<usize> {
        self.claim_alias(&node.alias)?;
        self.nodes.push(node);
        Ok(self.nodes.len() - 1)
    }

    /// Collects the columns of `entity` into node `index` and returns its
    /// links, still to be joined.
    fn collect_node(&mut self, index: usize, entity: &str) -> Result<Vec<PendingLink>> {
        let mut pending = Vec::new();
        let mut embeds = vec![entity.to_string()];
        self.collect(index, entity, "", &mut pending, &mut embeds)?;

        // A node without columns has no identity to decode rows by.
        let node = &self.nodes[index];
        if node.columns.is_empty() {
            return Err(Error::NoColumns {
                entity: entity.to_string(),
                alias: node.alias.clone(),
            });
        }
        Ok(pending)
    }

    /// Joins the pending links of node `index`, depth-first.
    fn link_children(
        &mut self,
        index: usize,
        entity: &str,
        pending: Vec<PendingLink>,
        path: &mut Vec<String>,
    ) -> Result<()> {
        path.push(entity.to_string());
        for link in pending {
            self.add_link(index, &link.prefix, &link.field, path)?;
        }
        path.pop();
        Ok(())
    }

    fn collect(
        &mut self,
        index: usize,
        entity: &str,
        prefix: &str,
        pending: &mut Vec<PendingLink>,
        embeds: &mut Vec<String>,
    ) -> Result<()> {
        let catalog = self.catalog;
        let def = catalog.get(entity)?;
        for field in &def.fields {
            match &field.kind {
                FieldKind::Column {
                    column,
                    primary_key,
                    select,
                } => self.nodes[index].columns.push(SelectColumn {
                    name: format!("{prefix}{column}"),
                    select: select.clone(),
                    primary_key: *primary_key,
                }),
                FieldKind::Embed {
                    entity: inner,
                    prefix: inner_prefix,
                } => {
                    if embeds.contains(inner) {
                        return Err(Error::Cycle {
                            entity: inner.clone(),
                            alias: self.nodes[index].alias.clone(),
                        });
                    }
                    embeds.push(inner.clone());
                    let inner_prefix = format!("{prefix}{inner_prefix}");
                    self.collect(index, inner, &inner_prefix, pending, embeds)?;
                    embeds.pop();
                }
                FieldKind::Link { .. } | FieldKind::Values { .. } => {
                    pending.push(PendingLink {
                        prefix: prefix.to_string(),
                        field: field.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    fn primary_key_of(&self, index: usize) -> Result<String> {
        let node = &self.nodes[index];
        node.primary_key()
            .next()
            .map(|c| c.name.clone())
            .ok_or_else(|| Error::MissingPrimaryKey(node.display_name()))
    }

    fn add_link(
        &mut self,
        parent: usize,
        prefix: &str,
        field: &FieldDef,
        path: &mut Vec<String>,
    ) -> Result<()> {
        let parent_node = &self.nodes[parent];
        let parent_is_root = parent_node.parent.is_none();
        let key = format!("{prefix}{}", field.name);
        let site = LinkSite {
            parent,
            parent_alias: parent_node.alias.clone(),
            parent_table: parent_node.table.clone(),
            parent_is_root,
            alias: if parent_is_root {
                key.clone()
            } else {
                format!("{}.{key}", parent_node.alias)
            },
            key,
        };

        match &field.kind {
            FieldKind::Link {
                entity,
                many,
                linktable,
                foreign_key,
                link_key,
            } => {
                if path.contains(entity) {
                    return Err(Error::Cycle {
                        entity: entity.clone(),
                        alias: site.alias,
                    });
                }
                // The link table alias is claimed before the target's so that
                // alias order follows join order.
                if let Some(linktable) = linktable {
                    self.claim_alias(&site.link_alias(linktable))?;
                }
                let table = self.catalog.table_of(entity)?;
                let index = self.add_node(Node {
                    alias: site.alias.clone(),
                    table,
                    entity: Some(entity.clone()),
                    parent: Some(parent),
                    field: site.key.clone(),
                    kind: if *many { NodeKind::Many } else { NodeKind::One },
                    columns: Vec::new(),
                    joins: Vec::new(),
                })?;
                let pending = self.collect_node(index, entity)?;

                let foreign_key = foreign_key.as_deref();
                let joins = match linktable {
                    Some(linktable) => self.link_table_joins(
                        &site,
                        index,
                        linktable,
                        foreign_key,
                        link_key.as_deref(),
                    )?,
                    None if *many => vec![self.one_to_many_join(&site, index, foreign_key)?],
                    None => vec![self.many_to_one_join(&site, index, foreign_key)?],
                };
                self.nodes[index].joins = joins;
                self.link_children(index, entity, pending, path)
            }
            FieldKind::Values {
                linktable,
                column,
                foreign_key,
            } => self.add_values_node(site, linktable, column, foreign_key.as_deref()),
            FieldKind::Column { .. } | FieldKind::Embed { .. } => Ok(()),
        }
    }

    fn add_values_node(
        &mut self,
        site: LinkSite,
        linktable: &str,
        column: &str,
        foreign_key: Option<&str>,
    ) -> Result<()> {
        let parent_pk = self.primary_key_of(site.parent)?;
        let foreign_key =
            foreign_key.map_or_else(|| format!("{}_id", site.parent_table), str::to_string);
        let on = format!(
            "`{}`.{parent_pk} = `{}`.{foreign_key}",
            site.parent_alias, site.alias
        );
        self.add_node(Node {
            alias: site.alias.clone(),
            table: linktable.to_string(),
            entity: None,
            parent: Some(site.parent),
            field: site.key,
            kind: NodeKind::Values,
            columns: vec![SelectColumn {
                name: column.to_string(),
                select: None,
                primary_key: false,
            }],
            joins: vec![Join {
                table: linktable.to_string(),
                alias: site.alias,
                on,
            }],
        })?;
        Ok(())
    }

    fn link_table_joins(
        &self,
        site: &LinkSite,
        index: usize,
        linktable: &str,
        foreign_key: Option<&str>,
        link_key: Option<&str>,
    ) -> Result<Vec<Join>> {
        let parent_pk = self.primary_key_of(site.parent)?;
        let target_pk = self.primary_key_of(index)?;
        let target_table = &self.nodes[index].table;
        let link_alias = site.link_alias(linktable);
        let foreign_key =
            foreign_key.map_or_else(|| format!("{}_id", site.parent_table), str::to_string);
        let link_key = link_key.map_or_else(|| format!("{target_table}_id"), str::to_string);
        Ok(vec![
            Join {
                table: linktable.to_string(),
                on: format!(
                    "`{}`.{parent_pk} = `{link_alias}`.{foreign_key}",
                    site.parent_alias
                ),
                alias: link_alias.clone(),
            },
            Join {
                table: target_table.clone(),
                alias: site.alias.clone(),
                on: format!("`{link_alias}`.{link_key} = `{}`.{target_pk}", site.alias),
            },
        ])
    }

    fn one_to_many_join(
        &self,
        site: &LinkSite,
        index: usize,
        foreign_key: Option<&str>,
    ) -> Result<Join> {
        let parent_pk = self.primary_key_of(site.parent)?;
        let foreign_key =
            foreign_key.map_or_else(|| format!("{}_id", site.parent_table), str::to_string);
        Ok(Join {
            table: self.nodes[index].table.clone(),
            alias: site.alias.clone(),
            on: format!(
                "`{}`.{parent_pk} = `{}`.{foreign_key}",
                site.parent_alias, site.alias
            ),
        })
    }

    fn many_to_one_join(
        &self,
        site: &LinkSite,
        index: usize,
        foreign_key: Option<&str>,
    ) -> Result<Join> {
        let target_pk = self.primary_key_of(index)?;
        let foreign_key = foreign_key.map_or_else(|| format!("{}_id", site.key), str::to_string);
        Ok(Join {
            table: self.nodes[index].table.clone(),
            alias: site.alias.clone(),
            on: format!(
                "`{}`.{foreign_key} = `{}`.{target_pk}",
                site.parent_alias, site.alias
            ),
        })
    }
}
#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::EntityDef;

    /// event <-> person through event_person, person -> emailaddress.
    fn catalog() -> Catalog {
        let mut catalog = Catalog::new();
        catalog.insert(
            EntityDef::new("PersonRecord")
                .with_table("person")
                .with_field(FieldDef::primary_key("id"))
                .with_field(FieldDef::column("age"))
                .with_field(FieldDef::column("firstname"))
                .with_field(FieldDef::column("lastname")),
        );
        catalog.insert(
            EntityDef::new("Person")
                .with_field(FieldDef::embed("record", "PersonRecord", ""))
                .with_field(FieldDef::link("email_addresses", "EmailAddress", true, None)),
        );
        catalog.insert(
            EntityDef::new("EmailAddress")
                .with_table("emailaddress")
                .with_field(FieldDef::column("person_id"))
                .with_field(FieldDef::column("email"))
                .with_field(FieldDef::column("name")),
        );
        catalog.insert(
            EntityDef::new("Event")
                .with_table("event")
                .with_field(FieldDef::primary_key("id"))
                .with_field(FieldDef::column("title"))
                .with_field(FieldDef::column("date")),
        );
        catalog.insert(
            EntityDef::new("EventWithPersons")
                .with_field(FieldDef::embed("event", "Event", ""))
                .with_field(FieldDef::link("persons", "Person", true, Some("event_person"))),
        );
        catalog
    }

    #[test]
    fn test_root_alias_is_table_name() {
        let graph = JoinGraph::build(&catalog(), "Event").unwrap();
        assert_eq!(graph.nodes().len(), 1);
        assert_eq!(graph.root().alias, "event");
        assert_eq!(graph.root().kind, NodeKind::Root);
        let names: Vec<&str> = graph.root().columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["id", "title", "date"]);
    }

    #[test]
    fn test_many_to_many_through_link_table() {
        let graph = JoinGraph::build(&catalog(), "EventWithPersons").unwrap();
        let aliases: Vec<&str> = graph.nodes().iter().map(|n| n.alias.as_str()).collect();
        assert_eq!(aliases, ["event", "persons", "persons.email_addresses"]);

        let persons = &graph.nodes()[1];
        assert_eq!(persons.kind, NodeKind::Many);
        assert_eq!(persons.table, "person");
        assert_eq!(persons.field, "persons");
        assert_eq!(
            persons.joins.iter().map(Join::to_sql).collect::<Vec<_>>(),
            [
                "LEFT JOIN event_person AS `event_person` ON `event`.id = `event_person`.event_id",
                "LEFT JOIN person AS `persons` ON `event_person`.person_id = `persons`.id",
            ]
        );

        let emails = &graph.nodes()[2];
        assert_eq!(emails.parent, Some(1));
        assert_eq!(
            emails.joins[0].to_sql(),
            "LEFT JOIN emailaddress AS `persons.email_addresses` \
             ON `persons`.id = `persons.email_addresses`.person_id"
        );
        assert_eq!(graph.children(1).collect::<Vec<_>>(), [2]);
    }

    #[test]
    fn test_many_to_one_uses_field_foreign_key() {
        let mut catalog = catalog();
        catalog.insert(
            EntityDef::new("Invitation")
                .with_table("invitation")
                .with_field(FieldDef::primary_key("id"))
                .with_field(FieldDef::link("event", "Event", false, None)),
        );
        let graph = JoinGraph::build(&catalog, "Invitation").unwrap();
        let event = &graph.nodes()[1];
        assert_eq!(event.kind, NodeKind::One);
        assert_eq!(
            event.joins[0].to_sql(),
            "LEFT JOIN event AS `event` ON `invitation`.event_id = `event`.id"
        );
    }

    #[test]
    fn test_foreign_key_overrides() {
        let mut catalog = catalog();
        catalog.insert(
            EntityDef::new("Meeting")
                .with_table("meeting")
                .with_field(FieldDef::primary_key("id"))
                .with_field(FieldDef {
                    name: "attendees".into(),
                    kind: FieldKind::Link {
                        entity: "PersonRecord".into(),
                        many: true,
                        linktable: Some("attendance".into()),
                        foreign_key: Some("meeting_ref".into()),
                        link_key: Some("attendee_ref".into()),
                    },
                }),
        );
        let graph = JoinGraph::build(&catalog, "Meeting").unwrap();
        let joins: Vec<String> = graph.nodes()[1].joins.iter().map(Join::to_sql).collect();
        assert_eq!(
            joins,
            [
                "LEFT JOIN attendance AS `attendance` ON `meeting`.id = `attendance`.meeting_ref",
                "LEFT JOIN person AS `attendees` ON `attendance`.attendee_ref = `attendees`.id",
            ]
        );
    }

    #[test]
    fn test_nested_link_table_alias_is_scoped() {
        let mut catalog = catalog();
        catalog.insert(
            EntityDef::new("PersonWithEvents")
                .with_field(FieldDef::embed("person", "Person", ""))
                .with_field(FieldDef::link("events", "Event", true, Some("event_person"))),
        );
        catalog.insert(
            EntityDef::new("Club")
                .with_table("club")
                .with_field(FieldDef::primary_key("id"))
                .with_field(FieldDef::link("members", "PersonWithEvents", true, None)),
        );
        let graph = JoinGraph::build(&catalog, "Club").unwrap();
        let events = graph
            .nodes()
            .iter()
            .find(|n| n.alias == "members.events")
            .unwrap();
        assert_eq!(events.joins[0].alias, "members.event_person");
        assert_eq!(
            events.joins[1].on,
            "`members.event_person`.event_id = `members.events`.id"
        );
    }

    #[test]
    fn test_prefixed_embed_columns() {
        let mut catalog = catalog();
        catalog.insert(
            EntityDef::new("Address")
                .with_field(FieldDef::column("street"))
                .with_field(FieldDef::column("city")),
        );
        catalog.insert(
            EntityDef::new("Venue")
                .with_table("venue")
                .with_field(FieldDef::primary_key("id"))
                .with_field(FieldDef::embed("visit", "Address", "visit_"))
                .with_field(FieldDef::embed("post", "Address", "post_")),
        );
        let graph = JoinGraph::build(&catalog, "Venue").unwrap();
        let names: Vec<&str> = graph.root().columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["id", "visit_street", "visit_city", "post_street", "post_city"]);
    }

    #[test]
    fn test_values_link() {
        let mut catalog = catalog();
        catalog.insert(
            EntityDef::new("Article")
                .with_table("article")
                .with_field(FieldDef::primary_key("id"))
                .with_field(FieldDef::values("tags", "article_tag", "tag")),
        );
        let graph = JoinGraph::build(&catalog, "Article").unwrap();
        let tags = &graph.nodes()[1];
        assert_eq!(tags.kind, NodeKind::Values);
        assert_eq!(tags.entity, None);
        assert_eq!(tags.label("tag"), "tags.tag");
        assert_eq!(
            tags.joins[0].to_sql(),
            "LEFT JOIN article_tag AS `tags` ON `article`.id = `tags`.article_id"
        );
    }

    #[test]
    fn test_link_cycle_is_rejected() {
        let mut catalog = Catalog::new();
        catalog.insert(
            EntityDef::new("Node")
                .with_table("node")
                .with_field(FieldDef::primary_key("id"))
                .with_field(FieldDef::link("children", "Node", true, None)),
        );
        let err = JoinGraph::build(&catalog, "Node").unwrap_err();
        assert!(matches!(
            err,
            Error::Cycle { entity, alias } if entity == "Node" && alias == "children"
        ));
    }

    #[test]
    fn test_collection_needs_parent_primary_key() {
        let mut catalog = catalog();
        catalog.insert(
            EntityDef::new("Log")
                .with_table("log")
                .with_field(FieldDef::column("line"))
                .with_field(FieldDef::link("entries", "EmailAddress", true, None)),
        );
        let err = JoinGraph::build(&catalog, "Log").unwrap_err();
        assert!(matches!(err, Error::MissingPrimaryKey(name) if name == "Log"));
    }

    #[test]
    fn test_duplicate_alias_is_rejected() {
        let mut catalog = catalog();
        catalog.insert(
            EntityDef::new("Party")
                .with_table("party")
                .with_field(FieldDef::primary_key("id"))
                .with_field(FieldDef::link("guests", "PersonRecord", true, Some("party_person")))
                .with_field(FieldDef::link("hosts", "PersonRecord", true, Some("party_person"))),
        );
        let err = JoinGraph::build(&catalog, "Party").unwrap_err();
        assert!(matches!(err, Error::DuplicateAlias(alias) if alias == "party_person"));
    }

    #[test]
    fn test_root_without_columns_is_rejected() {
        let mut catalog = catalog();
        catalog.insert(
            EntityDef::new("Holder")
                .with_table("holder")
                .with_field(FieldDef::link("event", "Event", false, None)),
        );
        let err = JoinGraph::build(&catalog, "Holder").unwrap_err();
        assert!(matches!(
            err,
            Error::NoColumns { entity, alias } if entity == "Holder" && alias == "holder"
        ));
    }

    #[test]
    fn test_linked_entity_without_columns_is_rejected() {
        let mut catalog = catalog();
        catalog.insert(
            EntityDef::new("Bare")
                .with_table("bare")
                .with_field(FieldDef::values("labels", "bare_label", "label")),
        );
        catalog.insert(
            EntityDef::new("Shelf")
                .with_table("shelf")
                .with_field(FieldDef::primary_key("id"))
                .with_field(FieldDef::link("bare", "Bare", false, None)),
        );
        let err = JoinGraph::build(&catalog, "Shelf").unwrap_err();
        assert!(matches!(err, Error::NoColumns { alias, .. } if alias == "bare"));
    }

    #[test]
    fn test_display_lists_nodes() {
        let graph = JoinGraph::build(&catalog(), "EventWithPersons").unwrap();
        let text = graph.to_string();
        assert!(text.starts_with("event [root] EventWithPersons event (id, title, date)"));
        assert!(text.contains("\n  persons [many] Person person"));
        assert!(text.contains("\n    persons.email_addresses [many] EmailAddress emailaddress"));
    }
}
