use std::fs;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::config::{get_database_path, load_config, save_config, RefIndexConfig};
use crate::db::Database;
use crate::errors::{RefIndexError, Result};
use crate::graph::ReferenceResolver;
use crate::types::*;

/// A reference index project: configuration plus the SQLite index on disk.
pub struct RefIndex {
    db: Database,
    config: RefIndexConfig,
    project_root: PathBuf,
}

/// Result of importing rows into the index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportResult {
    /// Rows written, malformed ones included.
    pub row_count: usize,
    /// Rows written that cannot be read as an edge.
    pub malformed_count: usize,
}

// ---------------------------------------------------------------------------
// Lifecycle
// ---------------------------------------------------------------------------

impl RefIndex {
    /// Initializes a project at the given root.
    ///
    /// Creates the `.refindex` directory, keeps an existing configuration or
    /// writes the default one, and initializes the database.
    pub fn init(project_root: &Path) -> Result<Self> {
        let config = load_config(project_root)?;
        save_config(project_root, &config)?;

        let db = Database::initialize(&get_database_path(project_root))?;
        info!(root = %project_root.display(), "initialized reference index");

        Ok(Self {
            db,
            config,
            project_root: project_root.to_path_buf(),
        })
    }

    /// Opens an existing project at the given root.
    pub fn open(project_root: &Path) -> Result<Self> {
        let config = load_config(project_root)?;
        let db_path = get_database_path(project_root);

        if !db_path.exists() {
            return Err(RefIndexError::Config {
                message: format!(
                    "no reference index found at '{}'; run 'refindex init' first",
                    db_path.display()
                ),
            });
        }

        let db = Database::open(&db_path)?;
        Ok(Self {
            db,
            config,
            project_root: project_root.to_path_buf(),
        })
    }

    /// Returns `true` if a project has been initialized at the given root.
    pub fn is_initialized(project_root: &Path) -> bool {
        get_database_path(project_root).exists()
    }
}

// ---------------------------------------------------------------------------
// Index maintenance
// ---------------------------------------------------------------------------

impl RefIndex {
    pub fn import_rows(&self, rows: &[IndexRow]) -> Result<ImportResult> {
        self.db.insert_rows(rows)?;
        let malformed_count = rows.iter().filter(|r| r.to_edge().is_none()).count();
        info!(rows = rows.len(), malformed = malformed_count, "imported index rows");
        Ok(ImportResult {
            row_count: rows.len(),
            malformed_count,
        })
    }

    /// Imports a JSON array of index rows from `path`.
    pub fn import_file(&self, path: &Path) -> Result<ImportResult> {
        let contents = fs::read_to_string(path).map_err(|e| RefIndexError::Import {
            message: format!("failed to read file: {e}"),
            path: path.display().to_string(),
        })?;
        let rows: Vec<IndexRow> =
            serde_json::from_str(&contents).map_err(|e| RefIndexError::Import {
                message: format!("failed to parse rows: {e}"),
                path: path.display().to_string(),
            })?;
        self.import_rows(&rows)
    }

    /// Soft-deletes every reference held by `source`.
    pub fn remove_source(&self, source: &ElementRef) -> Result<usize> {
        let changed = self.db.mark_deleted_by_source(source)?;
        info!(source = %source, rows = changed, "marked index rows deleted");
        Ok(changed)
    }
}

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

impl RefIndex {
    /// Returns a resolver over this project's index and configuration.
    pub fn resolver(&self) -> ReferenceResolver<'_, Database> {
        ReferenceResolver::with_config(&self.db, self.config.resolver.clone())
    }

    /// Collects foreign references to `element`, using the configured depth
    /// when `max_depth` is `None`.
    pub fn find_foreign_references(
        &self,
        element: &ElementRef,
        origin_page: i64,
        max_depth: Option<u32>,
    ) -> Result<ReferenceSet> {
        let depth = max_depth.unwrap_or(self.config.resolver.max_depth);
        self.resolver()
            .find_foreign_references(element, origin_page, depth)
    }

    pub fn has_foreign_references(
        &self,
        element: &ElementRef,
        origin_page: i64,
        max_depth: Option<u32>,
    ) -> Result<bool> {
        let depth = max_depth.unwrap_or(self.config.resolver.max_depth);
        self.resolver()
            .has_foreign_references(element, origin_page, depth)
    }

    pub fn get_stats(&self) -> Result<IndexStats> {
        self.db.get_stats()
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn get_config(&self) -> &RefIndexConfig {
        &self.config
    }

    pub fn project_root(&self) -> &Path {
        &self.project_root
    }
}
