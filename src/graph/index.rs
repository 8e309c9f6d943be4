use crate::db::Database;
use crate::errors::Result;
use crate::types::{ElementRef, IndexRow};

/// Read access to the reference index.
///
/// Implementations return the live (non-deleted) rows whose target is
/// `target`, in a stable order. Rows are returned as stored; a source that
/// cannot be read as a record is left for the caller to skip.
pub trait ReferenceIndex {
    fn referrers(&self, target: &ElementRef) -> Result<Vec<IndexRow>>;
}

impl ReferenceIndex for Database {
    fn referrers(&self, target: &ElementRef) -> Result<Vec<IndexRow>> {
        self.get_referrers(target)
    }
}

impl<T: ReferenceIndex + ?Sized> ReferenceIndex for &T {
    fn referrers(&self, target: &ElementRef) -> Result<Vec<IndexRow>> {
        (**self).referrers(target)
    }
}
