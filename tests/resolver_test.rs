use std::cell::RefCell;

use refindex::config::{IndexErrorPolicy, ResolverConfig};
use refindex::db::Database;
use refindex::errors::{RefIndexError, Result};
use refindex::graph::{MemoryIndex, ReferenceIndex, ReferenceResolver};
use refindex::types::*;
use tempfile::TempDir;

fn el(table: &str, id: i64) -> ElementRef {
    ElementRef::new(table, id)
}

/// Builds an index from `(source, target)` pairs.
fn index_of(links: &[(ElementRef, ElementRef)]) -> MemoryIndex {
    MemoryIndex::from_links(links.iter().map(|(s, t)| (s, t)))
}

/// The worked example: content:42 lives on page 10, is also placed on page
/// 20, and is referenced by content:43 which sits on page 30.
fn example_links() -> Vec<(ElementRef, ElementRef)> {
    vec![
        (el("pages", 10), el("content", 42)),
        (el("pages", 20), el("content", 42)),
        (el("content", 43), el("content", 42)),
        (el("pages", 30), el("content", 43)),
    ]
}

/// content:1 <- content:2 <- content:3 <- content:4 <- content:5 <- pages:99
fn chain_index() -> MemoryIndex {
    index_of(&[
        (el("content", 2), el("content", 1)),
        (el("content", 3), el("content", 2)),
        (el("content", 4), el("content", 3)),
        (el("content", 5), el("content", 4)),
        (el("pages", 99), el("content", 5)),
    ])
}

/// An index that always fails.
struct BrokenIndex;

impl ReferenceIndex for BrokenIndex {
    fn referrers(&self, _target: &ElementRef) -> Result<Vec<IndexRow>> {
        Err(RefIndexError::Database {
            message: "connection lost".to_string(),
            operation: "get_referrers".to_string(),
        })
    }
}

/// Wraps an index, logging each queried element and failing for one of them.
struct RecordingIndex {
    inner: MemoryIndex,
    fail_on: Option<ElementRef>,
    queried: RefCell<Vec<String>>,
}

impl RecordingIndex {
    fn new(inner: MemoryIndex, fail_on: Option<ElementRef>) -> Self {
        Self {
            inner,
            fail_on,
            queried: RefCell::new(Vec::new()),
        }
    }

    fn queried(&self) -> Vec<String> {
        self.queried.borrow().clone()
    }
}

impl ReferenceIndex for RecordingIndex {
    fn referrers(&self, target: &ElementRef) -> Result<Vec<IndexRow>> {
        self.queried.borrow_mut().push(target.to_string());
        if self.fail_on.as_ref() == Some(target) {
            return Err(RefIndexError::Database {
                message: format!("no rows readable for {target}"),
                operation: "get_referrers".to_string(),
            });
        }
        self.inner.referrers(target)
    }
}

// ---------------------------------------------------------------------------
// find_foreign_references
// ---------------------------------------------------------------------------

#[test]
fn test_worked_example() {
    let index = index_of(&example_links());
    let resolver = ReferenceResolver::new(&index);

    let refs = resolver
        .find_foreign_references(&el("content", 42), 10, 99)
        .expect("walk failed");

    let mut expected = ReferenceSet::new();
    expected.mark("pages", 20, true);
    expected.mark("pages", 30, true);
    expected.mark("content", 43, true);
    assert_eq!(refs, expected);
    assert!(!refs.depth_exhausted());

    assert!(resolver
        .has_foreign_references(&el("content", 42), 10, 99)
        .expect("walk failed"));
}

#[test]
fn test_only_origin_page_is_not_foreign() {
    let index = index_of(&[(el("pages", 10), el("content", 1))]);
    let resolver = ReferenceResolver::new(&index);

    let refs = resolver
        .find_foreign_references(&el("content", 1), 10, 99)
        .expect("walk failed");
    assert!(refs.is_empty(), "origin page must not be reported: {refs:?}");
    assert!(!resolver
        .has_foreign_references(&el("content", 1), 10, 99)
        .expect("walk failed"));
}

#[test]
fn test_element_without_referrers() {
    let index = MemoryIndex::new();
    let resolver = ReferenceResolver::new(&index);

    let refs = resolver
        .find_foreign_references(&el("content", 7), 10, 99)
        .expect("walk failed");
    assert!(refs.is_empty());
    assert_eq!(refs.len(), 0);
    assert!(!resolver
        .has_foreign_references(&el("content", 7), 10, 99)
        .expect("walk failed"));
}

#[test]
fn test_cycle_terminates_and_reports_page_once() {
    let index = index_of(&[
        (el("content", 2), el("content", 1)),
        (el("content", 1), el("content", 2)),
        (el("pages", 20), el("content", 1)),
    ]);
    let resolver = ReferenceResolver::new(&index);

    let refs = resolver
        .find_foreign_references(&el("content", 1), 10, 99)
        .expect("walk failed");

    assert_eq!(refs.bucket_len("pages"), 1);
    assert_eq!(refs.get("pages", 20), Some(true));
    assert_eq!(refs.get("content", 2), Some(true));
}

#[test]
fn test_self_reference_terminates() {
    let index = index_of(&[(el("content", 1), el("content", 1))]);
    let resolver = ReferenceResolver::new(&index);

    let refs = resolver
        .find_foreign_references(&el("content", 1), 10, 99)
        .expect("walk failed");

    assert_eq!(refs.get("content", 1), Some(false));
    assert!(!resolver
        .has_foreign_references(&el("content", 1), 10, 99)
        .expect("walk failed"));
}

#[test]
fn test_depth_limit_hides_distant_page() {
    let index = chain_index();
    let resolver = ReferenceResolver::new(&index);

    let shallow = resolver
        .find_foreign_references(&el("content", 1), 10, 2)
        .expect("walk failed");
    assert!(!shallow.contains("pages", 99));
    assert!(shallow.depth_exhausted(), "a cut-off walk must say so");
    assert!(!resolver
        .has_foreign_references(&el("content", 1), 10, 2)
        .expect("walk failed"));

    let deep = resolver
        .find_foreign_references(&el("content", 1), 10, 10)
        .expect("walk failed");
    assert_eq!(deep.get("pages", 99), Some(true));
    assert!(!deep.depth_exhausted());
    assert!(resolver
        .has_foreign_references(&el("content", 1), 10, 10)
        .expect("walk failed"));
}

#[test]
fn test_zero_depth_reads_nothing() {
    let index = RecordingIndex::new(index_of(&example_links()), None);
    let resolver = ReferenceResolver::new(&index);

    let refs = resolver
        .find_foreign_references(&el("content", 42), 10, 0)
        .expect("walk failed");
    assert!(refs.is_empty());
    assert!(!refs.depth_exhausted());
    assert!(index.queried().is_empty(), "got: {:?}", index.queried());
}

#[test]
fn test_frontier_record_is_never_read() {
    let links = vec![
        (el("content", 2), el("content", 1)),
        (el("content", 3), el("content", 2)),
        (el("pages", 20), el("content", 1)),
    ];
    let index = RecordingIndex::new(index_of(&links), Some(el("content", 3)));
    let resolver = ReferenceResolver::new(&index);

    let refs = resolver
        .find_foreign_references(&el("content", 1), 10, 2)
        .expect("the frontier record must not be queried");

    assert_eq!(index.queried(), vec!["content:1", "content:2"]);
    let recorded: Vec<(&str, i64, bool)> = refs.iter().collect();
    assert_eq!(
        recorded,
        vec![("content", 2, false), ("content", 3, false), ("pages", 20, true)]
    );
    assert!(refs.depth_exhausted());
}

#[test]
fn test_page_reached_by_two_paths_recorded_once() {
    let index = index_of(&[
        (el("content", 2), el("content", 1)),
        (el("content", 3), el("content", 1)),
        (el("pages", 20), el("content", 2)),
        (el("pages", 20), el("content", 3)),
        (el("pages", 20), el("content", 1)),
    ]);
    let resolver = ReferenceResolver::new(&index);

    let refs = resolver
        .find_foreign_references(&el("content", 1), 10, 99)
        .expect("walk failed");

    let pages: Vec<(i64, bool)> = refs
        .bucket("pages")
        .expect("pages bucket")
        .iter()
        .map(|(id, flag)| (*id, *flag))
        .collect();
    assert_eq!(pages, vec![(20, true)]);
}

#[test]
fn test_origin_excluded_however_often_it_links() {
    let index = index_of(&[
        (el("pages", 10), el("content", 1)),
        (el("pages", 10), el("content", 1)),
        (el("content", 2), el("content", 1)),
        (el("pages", 10), el("content", 2)),
        (el("pages", 10), el("content", 2)),
    ]);
    let resolver = ReferenceResolver::new(&index);

    let refs = resolver
        .find_foreign_references(&el("content", 1), 10, 99)
        .expect("walk failed");

    assert!(!refs.contains("pages", 10));
    assert_eq!(refs.get("content", 2), Some(false));
    assert!(!resolver
        .has_foreign_references(&el("content", 1), 10, 99)
        .expect("walk failed"));
}

// ---------------------------------------------------------------------------
// Caller-owned accumulators
// ---------------------------------------------------------------------------

#[test]
fn test_supplied_set_is_reused() {
    let index = index_of(&example_links());
    let resolver = ReferenceResolver::new(&index);

    let mut visited = ReferenceSet::new();
    visited.mark("content", 43, false);

    let foreign = resolver
        .has_foreign_references_in(&el("content", 42), 10, 99, &mut visited)
        .expect("walk failed");

    assert!(foreign);
    // content:43 was already known, so it was not expanded again.
    assert_eq!(visited.get("content", 43), Some(false));
    assert!(!visited.contains("pages", 30));
    assert_eq!(visited.get("pages", 20), Some(true));
}

#[test]
fn test_supplied_set_has_origin_removed() {
    let index = MemoryIndex::new();
    let resolver = ReferenceResolver::new(&index);

    let mut visited = ReferenceSet::new();
    visited.mark("pages", 10, true);

    let foreign = resolver
        .has_foreign_references_in(&el("content", 1), 10, 5, &mut visited)
        .expect("walk failed");
    assert!(!foreign);
    assert!(visited.is_empty());
}

// ---------------------------------------------------------------------------
// Page-equivalent tables
// ---------------------------------------------------------------------------

#[test]
fn test_overlay_reference_counts_as_foreign() {
    let index = index_of(&[
        (el("pages", 10), el("content", 1)),
        (el("pages_language_overlay", 5), el("content", 1)),
    ]);
    let resolver = ReferenceResolver::new(&index);

    let refs = resolver
        .find_foreign_references(&el("content", 1), 10, 99)
        .expect("walk failed");
    assert!(refs.contains("pages_language_overlay", 5));
    assert!(resolver
        .has_foreign_references(&el("content", 1), 10, 99)
        .expect("walk failed"));
}

#[test]
fn test_custom_page_tables() {
    let index = index_of(&[
        (el("article", 2), el("block", 1)),
        (el("site_page", 8), el("article", 2)),
        (el("pages", 30), el("block", 1)),
    ]);
    let config = ResolverConfig {
        page_table: "site_page".to_string(),
        ..ResolverConfig::default()
    }
    .with_page_equivalent_tables(["site_page"]);
    let resolver = ReferenceResolver::with_config(&index, config);

    let refs = resolver
        .find_foreign_references(&el("block", 1), 7, 99)
        .expect("walk failed");
    assert_eq!(refs.get("site_page", 8), Some(true));
    assert_eq!(refs.get("article", 2), Some(true));
    // "pages" is an ordinary table under this configuration.
    assert_eq!(refs.get("pages", 30), Some(true));

    assert!(resolver
        .has_foreign_references(&el("block", 1), 7, 99)
        .expect("walk failed"));
    assert!(!resolver
        .has_foreign_references(&el("block", 1), 8, 99)
        .expect("walk failed"));
}

// ---------------------------------------------------------------------------
// Malformed rows and index failures
// ---------------------------------------------------------------------------

#[test]
fn test_malformed_and_deleted_rows_are_skipped() {
    let mut index = MemoryIndex::new();
    index.push(IndexRow {
        tablename: None,
        recuid: Some(3),
        ref_table: "content".to_string(),
        ref_uid: 1,
        deleted: false,
    });
    index.push(IndexRow {
        tablename: Some("  ".to_string()),
        recuid: Some(4),
        ref_table: "content".to_string(),
        ref_uid: 1,
        deleted: false,
    });
    index.push(IndexRow {
        tablename: Some("pages".to_string()),
        recuid: None,
        ref_table: "content".to_string(),
        ref_uid: 1,
        deleted: false,
    });
    index.push(IndexRow {
        tablename: Some("pages".to_string()),
        recuid: Some(40),
        ref_table: "content".to_string(),
        ref_uid: 1,
        deleted: true,
    });
    index.link(&el("pages", 50), &el("content", 1));

    let resolver = ReferenceResolver::new(&index);
    let refs = resolver
        .find_foreign_references(&el("content", 1), 10, 99)
        .expect("walk failed");

    let recorded: Vec<(&str, i64, bool)> = refs.iter().collect();
    assert_eq!(recorded, vec![("pages", 50, true)]);
}

#[test]
fn test_index_failure_propagates_by_default() {
    let resolver = ReferenceResolver::new(&BrokenIndex);

    let err = resolver
        .find_foreign_references(&el("content", 1), 10, 99)
        .expect_err("walk should fail");
    match err {
        RefIndexError::IndexUnavailable { element, message } => {
            assert_eq!(element, "content:1");
            assert!(message.contains("connection lost"), "got: {message}");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_index_failure_ignored_when_configured() {
    let config = ResolverConfig::default().with_index_error_policy(IndexErrorPolicy::Ignore);
    let resolver = ReferenceResolver::with_config(&BrokenIndex, config);

    let refs = resolver
        .find_foreign_references(&el("content", 1), 10, 99)
        .expect("ignored failures should not error");
    assert!(refs.is_empty());
    assert!(!resolver
        .has_foreign_references(&el("content", 1), 10, 99)
        .expect("ignored failures should not error"));
}

// ---------------------------------------------------------------------------
// SQLite-backed index
// ---------------------------------------------------------------------------

#[test]
fn test_worked_example_on_database() {
    let dir = TempDir::new().expect("failed to create temp dir");
    let db = Database::initialize(&dir.path().join("refindex.db"))
        .expect("failed to initialize database");
    let rows: Vec<IndexRow> = example_links()
        .iter()
        .map(|(s, t)| IndexRow::link(s, t))
        .collect();
    db.insert_rows(&rows).expect("failed to insert rows");

    let resolver = ReferenceResolver::new(&db);
    let refs = resolver
        .find_foreign_references(&el("content", 42), 10, 99)
        .expect("walk failed");

    let recorded: Vec<(&str, i64, bool)> = refs.iter().collect();
    assert_eq!(
        recorded,
        vec![("content", 43, true), ("pages", 20, true), ("pages", 30, true)]
    );

    db.mark_deleted_by_source(&el("pages", 20))
        .expect("failed to delete rows");
    db.mark_deleted_by_source(&el("content", 43))
        .expect("failed to delete rows");
    assert!(!resolver
        .has_foreign_references(&el("content", 42), 10, 99)
        .expect("walk failed"));
}
