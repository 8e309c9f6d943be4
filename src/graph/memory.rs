use crate::errors::Result;
use crate::graph::index::ReferenceIndex;
use crate::types::{ElementRef, IndexRow};

/// A reference index held entirely in memory.
///
/// Rows keep their insertion order, which is the order `referrers` reports.
#[derive(Debug, Clone, Default)]
pub struct MemoryIndex {
    rows: Vec<IndexRow>,
}

impl MemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds an index from `(source, target)` pairs.
    pub fn from_links<'a, I>(links: I) -> Self
    where
        I: IntoIterator<Item = (&'a ElementRef, &'a ElementRef)>,
    {
        let mut index = Self::new();
        for (source, target) in links {
            index.link(source, target);
        }
        index
    }

    /// Records that `source` points at `target`.
    pub fn link(&mut self, source: &ElementRef, target: &ElementRef) {
        self.rows.push(IndexRow::link(source, target));
    }

    /// Appends a raw row, which may be deleted or malformed.
    pub fn push(&mut self, row: IndexRow) {
        self.rows.push(row);
    }

    /// Flags every row originating from `source` as deleted.
    pub fn mark_deleted_by_source(&mut self, source: &ElementRef) -> usize {
        let mut changed = 0;
        for row in self.rows.iter_mut().filter(|r| !r.deleted) {
            if row.tablename.as_deref() == Some(source.table.as_str())
                && row.recuid == Some(source.id)
            {
                row.deleted = true;
                changed += 1;
            }
        }
        changed
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

impl ReferenceIndex for MemoryIndex {
    fn referrers(&self, target: &ElementRef) -> Result<Vec<IndexRow>> {
        Ok(self
            .rows
            .iter()
            .filter(|r| !r.deleted && r.targets(target))
            .cloned()
            .collect())
    }
}

impl Extend<IndexRow> for MemoryIndex {
    fn extend<I: IntoIterator<Item = IndexRow>>(&mut self, iter: I) {
        self.rows.extend(iter);
    }
}
