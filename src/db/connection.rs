use std::path::Path;

use rusqlite::{Connection, OptionalExtension};

use crate::errors::{RefIndexError, Result};

/// The embedded `sys_refindex` schema.
const SCHEMA_SQL: &str = include_str!("schema.sql");

/// Table every reference index database must contain.
pub const INDEX_TABLE: &str = "sys_refindex";

/// SQLite database holding the reference index.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Opens or creates the index at `db_path` and applies the schema.
    ///
    /// Parent directories are created as needed. Existing rows are kept.
    pub fn initialize(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| RefIndexError::Database {
                message: format!("failed to create '{}': {e}", parent.display()),
                operation: "initialize".to_string(),
            })?;
        }

        let db = Self::connect(db_path, "initialize")?;
        db.conn
            .execute_batch(SCHEMA_SQL)
            .map_err(|e| RefIndexError::Database {
                message: format!("failed to create {INDEX_TABLE}: {e}"),
                operation: "initialize".to_string(),
            })?;
        Ok(db)
    }

    /// Opens an index created by [`initialize`](Self::initialize).
    ///
    /// Fails if the file has no `sys_refindex` table.
    pub fn open(db_path: &Path) -> Result<Self> {
        let db = Self::connect(db_path, "open")?;
        if !db.has_index_table()? {
            return Err(RefIndexError::Database {
                message: format!(
                    "'{}' has no {INDEX_TABLE} table; run 'refindex init' first",
                    db_path.display()
                ),
                operation: "open".to_string(),
            });
        }
        Ok(db)
    }

    /// Returns a reference to the underlying SQLite connection.
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Returns the on-disk size of the index in bytes.
    pub fn size(&self) -> Result<u64> {
        let size: i64 = self
            .conn
            .query_row(
                "SELECT page_count * page_size FROM pragma_page_count(), pragma_page_size()",
                [],
                |row| row.get(0),
            )
            .map_err(|e| RefIndexError::Database {
                message: format!("failed to read database size: {e}"),
                operation: "size".to_string(),
            })?;
        Ok(size as u64)
    }

    fn has_index_table(&self) -> Result<bool> {
        self.conn
            .query_row(
                "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1",
                [INDEX_TABLE],
                |_| Ok(()),
            )
            .optional()
            .map(|found| found.is_some())
            .map_err(|e| RefIndexError::Database {
                message: format!("failed to inspect schema: {e}"),
                operation: "open".to_string(),
            })
    }

    /// Opens the connection with WAL journaling.
    fn connect(db_path: &Path, operation: &str) -> Result<Self> {
        let conn = Connection::open(db_path).map_err(|e| RefIndexError::Database {
            message: format!("failed to open '{}': {e}", db_path.display()),
            operation: operation.to_string(),
        })?;

        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA busy_timeout = 30000;
             PRAGMA synchronous = NORMAL;",
        )
        .map_err(|e| RefIndexError::Database {
            message: format!("failed to configure connection: {e}"),
            operation: operation.to_string(),
        })?;

        Ok(Self { conn })
    }
}
