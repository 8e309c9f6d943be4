use tracing::{debug, warn};

use crate::config::{IndexErrorPolicy, ResolverConfig};
use crate::errors::{RefIndexError, Result};
use crate::graph::index::ReferenceIndex;
use crate::types::*;

/// Finds references to an element that come from pages other than its own.
///
/// The walk follows index edges backwards (from target to source),
/// depth-first. Sources in the page table are leaves; every other source is
/// expanded in turn. A record is marked `false` in the accumulator before it
/// is expanded, so a cycle back to it is cut off.
pub struct ReferenceResolver<'a, I: ReferenceIndex + ?Sized> {
    index: &'a I,
    config: ResolverConfig,
}

impl<'a, I: ReferenceIndex + ?Sized> ReferenceResolver<'a, I> {
    /// Creates a resolver with the default page tables and error policy.
    pub fn new(index: &'a I) -> Self {
        Self::with_config(index, ResolverConfig::default())
    }

    pub fn with_config(index: &'a I, config: ResolverConfig) -> Self {
        Self { index, config }
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Collects every record that references `element`, directly or
    /// transitively, into a fresh set.
    ///
    /// `origin_page` is never reported in the page bucket. With
    /// `max_depth == 0` the index is not read at all. A record left
    /// unexpanded by the depth budget sets
    /// [`ReferenceSet::depth_exhausted`].
    pub fn find_foreign_references(
        &self,
        element: &ElementRef,
        origin_page: i64,
        max_depth: u32,
    ) -> Result<ReferenceSet> {
        let mut visited = ReferenceSet::new();
        self.collect_foreign_references(element, origin_page, max_depth, &mut visited)?;
        debug!(
            element = %element,
            origin_page,
            recorded = visited.len(),
            depth_exhausted = visited.depth_exhausted(),
            "foreign reference walk finished"
        );
        Ok(visited)
    }

    /// Same as [`find_foreign_references`](Self::find_foreign_references),
    /// accumulating into a caller-owned set.
    ///
    /// Records already present in `visited` are not expanded again.
    pub fn collect_foreign_references(
        &self,
        element: &ElementRef,
        origin_page: i64,
        max_depth: u32,
        visited: &mut ReferenceSet,
    ) -> Result<()> {
        if max_depth == 0 {
            return Ok(());
        }

        for edge in self.live_edges(element)? {
            if edge.source_table == self.config.page_table {
                visited.mark(&edge.source_table, edge.source_id, true);
                continue;
            }
            if visited.contains(&edge.source_table, edge.source_id) {
                continue;
            }

            visited.mark(&edge.source_table, edge.source_id, false);
            let source = edge.source();
            if max_depth == 1 {
                // The recursive step stops before reading the index.
                debug!(element = %element, source = %source, "depth budget exhausted");
                visited.set_depth_exhausted();
            } else {
                debug!(element = %element, source = %source, max_depth, "expanding referrer");
            }
            let found =
                self.has_foreign_references_in(&source, origin_page, max_depth - 1, visited)?;
            visited.mark(&edge.source_table, edge.source_id, found);
        }

        visited.remove(&self.config.page_table, origin_page);
        Ok(())
    }

    /// Whether `element` is referenced from any page-equivalent record other
    /// than `origin_page`.
    pub fn has_foreign_references(
        &self,
        element: &ElementRef,
        origin_page: i64,
        max_depth: u32,
    ) -> Result<bool> {
        let mut visited = ReferenceSet::new();
        self.has_foreign_references_in(element, origin_page, max_depth, &mut visited)
    }

    /// Same as [`has_foreign_references`](Self::has_foreign_references),
    /// accumulating into a caller-owned set.
    pub fn has_foreign_references_in(
        &self,
        element: &ElementRef,
        origin_page: i64,
        max_depth: u32,
        visited: &mut ReferenceSet,
    ) -> Result<bool> {
        self.collect_foreign_references(element, origin_page, max_depth, visited)?;
        Ok(self.has_page_references(origin_page, visited))
    }

    /// Drops the origin page again and checks the page-equivalent buckets.
    ///
    /// A bucket counts by its number of entries, whatever their flags.
    fn has_page_references(&self, origin_page: i64, visited: &mut ReferenceSet) -> bool {
        visited.remove(&self.config.page_table, origin_page);
        self.config
            .page_equivalent_tables
            .iter()
            .any(|table| visited.bucket_len(table) > 0)
    }

    /// Reads the live, well-formed edges pointing at `element`.
    fn live_edges(&self, element: &ElementRef) -> Result<Vec<ReferenceEdge>> {
        let rows = match self.index.referrers(element) {
            Ok(rows) => rows,
            Err(e) => match self.config.on_index_error {
                IndexErrorPolicy::Propagate => {
                    return Err(RefIndexError::IndexUnavailable {
                        element: element.to_string(),
                        message: e.to_string(),
                    });
                }
                IndexErrorPolicy::Ignore => {
                    warn!(element = %element, error = %e, "reference index query failed, treating as no referrers");
                    return Ok(Vec::new());
                }
            },
        };

        let mut edges = Vec::with_capacity(rows.len());
        for row in rows.iter().filter(|r| !r.deleted) {
            match row.to_edge() {
                Some(edge) => edges.push(edge),
                None => debug!(element = %element, row = ?row, "skipping malformed index row"),
            }
        }
        Ok(edges)
    }
}
