//! Row mapping: from flat, column-labelled rows back to record trees.
//!
//! A one-to-many join repeats the parent's columns on every child row. The
//! mapper walks each row node by node, identifies every node instance by its
//! primary key (or by all its columns when it has none), and merges repeats
//! so each parent appears once with all of its children attached.

use std::collections::hash_map::Entry;
use std::collections::{BTreeMap, HashMap, HashSet};

use serde::Serialize;

use crate::error::{Error, Result};
use crate::graph::{JoinGraph, NodeKind};
use crate::value::{FromSqlValue, SqlValue};

/// Column labels plus the rows of a query result.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultSet {
    columns: Vec<String>,
    rows: Vec<Vec<SqlValue>>,
}

impl ResultSet {
    #[must_use]
    pub const fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    pub fn push_row(&mut self, row: Vec<SqlValue>) {
        self.rows.push(row);
    }

    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    #[must_use]
    pub fn rows(&self) -> &[Vec<SqlValue>] {
        &self.rows
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    #[must_use]
    pub fn index_of(&self, label: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == label)
    }
}

/// One decoded entity instance: its column values, linked records and
/// fetched value lists.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Record {
    #[serde(flatten)]
    values: BTreeMap<String, SqlValue>,
    #[serde(flatten)]
    links: BTreeMap<String, Linked>,
    #[serde(flatten)]
    lists: BTreeMap<String, Vec<SqlValue>>,
}

/// Records linked under one key: a single optional record for a one-link,
/// a list for a many-link.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
enum Linked {
    One(Option<Record>),
    Many(Vec<Record>),
}

impl Record {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_value(mut self, key: &str, value: SqlValue) -> Self {
        self.set_value(key, value);
        self
    }

    pub fn set_value(&mut self, key: &str, value: SqlValue) {
        self.values.insert(key.to_string(), value);
    }

    #[must_use]
    pub fn value(&self, key: &str) -> Option<&SqlValue> {
        self.values.get(key)
    }

    /// Reads and converts a column value.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingColumn`] when `key` is absent and
    /// [`Error::Value`] when the value does not convert to `T`.
    pub fn get<T: FromSqlValue>(&self, key: &str) -> Result<T> {
        let value = self
            .values
            .get(key)
            .ok_or_else(|| Error::MissingColumn(key.to_string()))?;
        T::from_sql_value(value.clone()).map_err(|source| Error::Value {
            column: key.to_string(),
            source,
        })
    }

    /// Linked records under `key`; empty when there are none.
    #[must_use]
    pub fn links(&self, key: &str) -> &[Record] {
        match self.links.get(key) {
            Some(Linked::One(Some(record))) => std::slice::from_ref(record),
            Some(Linked::One(None)) | None => &[],
            Some(Linked::Many(records)) => records,
        }
    }

    /// Fetched values under `key`; empty when there are none.
    #[must_use]
    pub fn list(&self, key: &str) -> &[SqlValue] {
        self.lists.get(key).map_or(&[], Vec::as_slice)
    }

    /// Attaches a linked record. A one-link keeps its first record.
    pub fn push_link(&mut self, key: &str, record: Self) {
        match self
            .links
            .entry(key.to_string())
            .or_insert_with(|| Linked::Many(Vec::new()))
        {
            Linked::One(slot) => {
                if slot.is_none() {
                    *slot = Some(record);
                }
            }
            Linked::Many(records) => records.push(record),
        }
    }

    pub fn push_list(&mut self, key: &str, value: SqlValue) {
        self.lists.entry(key.to_string()).or_default().push(value);
    }

    pub fn values(&self) -> impl Iterator<Item = (&str, &SqlValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }
}

struct Instance {
    node: usize,
    record: Record,
    children: Vec<usize>,
}

/// Decodes a result set produced by the SELECT of `graph`.
///
/// Roots are returned in order of first appearance, children in order of
/// first appearance under their parent.
///
/// # Errors
///
/// Returns [`Error::MissingColumn`] when a selected label is absent from
/// `result` or a row is shorter than its labels.
pub fn decode(graph: &JoinGraph, result: &ResultSet) -> Result<Vec<Record>> {
    let nodes = graph.nodes();
    let positions = column_positions(graph, result)?;
    let identities = identity_columns(graph);

    let mut arena: Vec<Instance> = Vec::new();
    let mut roots: Vec<usize> = Vec::new();
    let mut seen: HashMap<(usize, Option<usize>, String), usize> = HashMap::new();
    let mut seen_values: HashSet<(usize, usize, String)> = HashSet::new();

    for row in result.rows() {
        let mut present: Vec<Option<usize>> = vec![None; nodes.len()];

        for (index, node) in nodes.iter().enumerate() {
            // Absent parents imply absent children.
            let parent = match node.parent {
                Some(p) if present[p].is_none() => continue,
                Some(p) => present[p],
                None => None,
            };

            let mut values: Vec<&SqlValue> = Vec::with_capacity(positions[index].len());
            for (&position, column) in positions[index].iter().zip(&node.columns) {
                let value = row
                    .get(position)
                    .ok_or_else(|| Error::MissingColumn(node.label(&column.name)))?;
                values.push(value);
            }

            let identity: Vec<&SqlValue> = identities[index].iter().map(|&i| values[i]).collect();
            if identity.iter().all(|v| v.is_null()) {
                continue;
            }
            let key = identity
                .iter()
                .map(|v| v.to_sql_inline())
                .collect::<Vec<_>>()
                .join("|");

            if node.kind == NodeKind::Values {
                let Some(parent) = parent else { continue };
                if seen_values.insert((index, parent, key)) {
                    arena[parent].record.push_list(&node.field, values[0].clone());
                }
                continue;
            }

            let instance = match seen.entry((index, parent, key)) {
                Entry::Occupied(entry) => *entry.get(),
                Entry::Vacant(entry) => {
                    arena.push(Instance {
                        node: index,
                        record: new_record(graph, index, &values),
                        children: Vec::new(),
                    });
                    let instance = arena.len() - 1;
                    entry.insert(instance);
                    match parent {
                        None => roots.push(instance),
                        Some(parent) => arena[parent].children.push(instance),
                    }
                    instance
                }
            };
            present[index] = Some(instance);
        }
    }

    Ok(roots
        .into_iter()
        .map(|root| assemble(graph, &mut arena, root))
        .collect())
}

/// Result-set index of every column, per node.
fn column_positions(graph: &JoinGraph, result: &ResultSet) -> Result<Vec<Vec<usize>>> {
    graph
        .nodes()
        .iter()
        .map(|node| {
            node.columns
                .iter()
                .map(|column| {
                    let label = node.label(&column.name);
                    result.index_of(&label).ok_or(Error::MissingColumn(label))
                })
                .collect::<Result<Vec<_>>>()
        })
        .collect()
}

/// Identity columns, as offsets into each node's own columns.
fn identity_columns(graph: &JoinGraph) -> Vec<Vec<usize>> {
    graph
        .nodes()
        .iter()
        .map(|node| {
            let keys: Vec<usize> = node
                .columns
                .iter()
                .enumerate()
                .filter(|(_, c)| c.primary_key)
                .map(|(i, _)| i)
                .collect();
            if keys.is_empty() {
                (0..node.columns.len()).collect()
            } else {
                keys
            }
        })
        .collect()
}

/// A record holding one node's values, with an empty slot for each child.
fn new_record(graph: &JoinGraph, index: usize, values: &[&SqlValue]) -> Record {
    let nodes = graph.nodes();
    let mut record = Record::new();
    for (column, value) in nodes[index].columns.iter().zip(values) {
        record.set_value(&column.name, (*value).clone());
    }
    for child in graph.children(index) {
        let child = &nodes[child];
        let field = child.field.clone();
        match child.kind {
            NodeKind::Values => {
                record.lists.insert(field, Vec::new());
            }
            NodeKind::One => {
                record.links.insert(field, Linked::One(None));
            }
            NodeKind::Root | NodeKind::Many => {
                record.links.insert(field, Linked::Many(Vec::new()));
            }
        }
    }
    record
}

fn assemble(graph: &JoinGraph, arena: &mut [Instance], instance: usize) -> Record {
    let mut record = std::mem::take(&mut arena[instance].record);
    let children = std::mem::take(&mut arena[instance].children);
    for child in children {
        let field = graph.nodes()[arena[child].node].field.clone();
        let child_record = assemble(graph, arena, child);
        record.push_link(&field, child_record);
    }
    record
}
