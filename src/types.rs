use serde::{Deserialize, Serialize};
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::fmt;

use crate::errors::{RefIndexError, Result};

/// Identifies a referenceable record by table name and row id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ElementRef {
    pub table: String,
    pub id: i64,
}

impl ElementRef {
    pub fn new(table: impl Into<String>, id: i64) -> Self {
        Self {
            table: table.into(),
            id,
        }
    }

    /// Parses the `table:id` form used on the command line.
    pub fn parse(input: &str) -> Result<Self> {
        let invalid = || RefIndexError::InvalidElement {
            input: input.to_string(),
        };
        let (table, id) = input.rsplit_once(':').ok_or_else(invalid)?;
        let table = table.trim();
        if table.is_empty() {
            return Err(invalid());
        }
        let id = id.trim().parse::<i64>().map_err(|_| invalid())?;
        Ok(Self::new(table, id))
    }
}

impl fmt::Display for ElementRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.table, self.id)
    }
}

/// A directed edge meaning "source record points at target record".
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReferenceEdge {
    pub source_table: String,
    pub source_id: i64,
    pub target_table: String,
    pub target_id: i64,
}

impl ReferenceEdge {
    pub fn source(&self) -> ElementRef {
        ElementRef::new(self.source_table.clone(), self.source_id)
    }

    pub fn target(&self) -> ElementRef {
        ElementRef::new(self.target_table.clone(), self.target_id)
    }
}

/// A row of the reference index as it is stored.
///
/// The source columns are nullable in storage; a row missing either of them
/// cannot be turned into an edge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexRow {
    pub tablename: Option<String>,
    pub recuid: Option<i64>,
    pub ref_table: String,
    pub ref_uid: i64,
    #[serde(default)]
    pub deleted: bool,
}

impl IndexRow {
    /// Builds a live row for the edge `source -> target`.
    pub fn link(source: &ElementRef, target: &ElementRef) -> Self {
        Self {
            tablename: Some(source.table.clone()),
            recuid: Some(source.id),
            ref_table: target.table.clone(),
            ref_uid: target.id,
            deleted: false,
        }
    }

    /// Returns the edge described by this row, or `None` if the row is malformed.
    pub fn to_edge(&self) -> Option<ReferenceEdge> {
        let source_table = self.tablename.as_deref().map(str::trim)?;
        if source_table.is_empty() || self.ref_table.is_empty() {
            return None;
        }
        Some(ReferenceEdge {
            source_table: source_table.to_string(),
            source_id: self.recuid?,
            target_table: self.ref_table.clone(),
            target_id: self.ref_uid,
        })
    }

    /// Whether this row points at `target`.
    pub fn targets(&self, target: &ElementRef) -> bool {
        self.ref_table == target.table && self.ref_uid == target.id
    }
}

/// Accumulated result of a foreign-reference walk, keyed by table and record id.
///
/// A `true` flag marks a confirmed reference. A `false` flag marks a record
/// that is still being expanded, or that was expanded without reaching a
/// page-equivalent record. Keys are never removed during a walk, apart from
/// the origin page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceSet {
    buckets: BTreeMap<String, BTreeMap<i64, bool>>,
    #[serde(default)]
    depth_exhausted: bool,
}

impl ReferenceSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, table: &str, id: i64) -> bool {
        self.get(table, id).is_some()
    }

    pub fn get(&self, table: &str, id: i64) -> Option<bool> {
        self.buckets.get(table)?.get(&id).copied()
    }

    /// Sets the flag for `(table, id)`, inserting the key if needed.
    pub fn mark(&mut self, table: &str, id: i64, confirmed: bool) {
        self.buckets
            .entry(table.to_string())
            .or_default()
            .insert(id, confirmed);
    }

    /// Removes `(table, id)`, dropping the bucket once it is empty.
    pub fn remove(&mut self, table: &str, id: i64) -> Option<bool> {
        match self.buckets.entry(table.to_string()) {
            Entry::Occupied(mut bucket) => {
                let removed = bucket.get_mut().remove(&id);
                if bucket.get().is_empty() {
                    bucket.remove();
                }
                removed
            }
            Entry::Vacant(_) => None,
        }
    }

    pub fn bucket(&self, table: &str) -> Option<&BTreeMap<i64, bool>> {
        self.buckets.get(table)
    }

    /// Number of records recorded for `table`, regardless of their flag.
    pub fn bucket_len(&self, table: &str) -> usize {
        self.buckets.get(table).map_or(0, BTreeMap::len)
    }

    pub fn tables(&self) -> impl Iterator<Item = &str> {
        self.buckets.keys().map(String::as_str)
    }

    /// Iterates over every recorded `(table, id, flag)` in table then id order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, i64, bool)> {
        self.buckets.iter().flat_map(|(table, bucket)| {
            bucket
                .iter()
                .map(move |(id, flag)| (table.as_str(), *id, *flag))
        })
    }

    pub fn len(&self) -> usize {
        self.buckets.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.values().all(BTreeMap::is_empty)
    }

    /// Whether the depth budget left at least one referrer unexpanded.
    ///
    /// When set, the recorded references may be incomplete. A walk started
    /// with a budget of zero reads nothing and does not set the flag.
    pub fn depth_exhausted(&self) -> bool {
        self.depth_exhausted
    }

    pub(crate) fn set_depth_exhausted(&mut self) {
        self.depth_exhausted = true;
    }
}

/// Aggregate statistics about the reference index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexStats {
    pub row_count: u64,
    pub live_row_count: u64,
    pub deleted_row_count: u64,
    pub rows_by_source_table: BTreeMap<String, u64>,
    pub rows_by_target_table: BTreeMap<String, u64>,
    pub db_size_bytes: u64,
}
