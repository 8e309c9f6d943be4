use std::collections::BTreeMap;

use rusqlite::params;

use super::connection::Database;
use crate::errors::{RefIndexError, Result};
use crate::types::*;

const ROW_COLUMNS: &str = "tablename, recuid, ref_table, ref_uid, deleted";

/// Maps a row from the `sys_refindex` table to an `IndexRow`.
fn row_to_index_row(row: &rusqlite::Row) -> rusqlite::Result<IndexRow> {
    let deleted: i32 = row.get("deleted")?;

    Ok(IndexRow {
        tablename: row.get("tablename")?,
        recuid: row.get("recuid")?,
        ref_table: row.get("ref_table")?,
        ref_uid: row.get("ref_uid")?,
        deleted: deleted != 0,
    })
}

/// Collects mapped rows, tagging any failure with `operation`.
fn collect_rows<I>(rows: I, operation: &str) -> Result<Vec<IndexRow>>
where
    I: Iterator<Item = rusqlite::Result<IndexRow>>,
{
    let mut out = Vec::new();
    for row in rows {
        out.push(row.map_err(|e| RefIndexError::Database {
            message: format!("failed to read index row: {e}"),
            operation: operation.to_string(),
        })?);
    }
    Ok(out)
}

// ---------------------------------------------------------------------------
// Writes
// ---------------------------------------------------------------------------

impl Database {
    /// Appends a single row to the index.
    pub fn insert_row(&self, row: &IndexRow) -> Result<()> {
        self.conn()
            .execute(
                "INSERT INTO sys_refindex (tablename, recuid, ref_table, ref_uid, deleted)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    row.tablename,
                    row.recuid,
                    row.ref_table,
                    row.ref_uid,
                    row.deleted as i32,
                ],
            )
            .map_err(|e| RefIndexError::Database {
                message: format!("failed to insert index row: {e}"),
                operation: "insert_row".to_string(),
            })?;
        Ok(())
    }

    /// Appends a batch of rows inside a single transaction.
    pub fn insert_rows(&self, rows: &[IndexRow]) -> Result<()> {
        let tx = self
            .conn()
            .unchecked_transaction()
            .map_err(|e| RefIndexError::Database {
                message: format!("failed to begin transaction: {e}"),
                operation: "insert_rows".to_string(),
            })?;

        {
            let mut stmt = tx
                .prepare_cached(
                    "INSERT INTO sys_refindex (tablename, recuid, ref_table, ref_uid, deleted)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                )
                .map_err(|e| RefIndexError::Database {
                    message: format!("failed to prepare statement: {e}"),
                    operation: "insert_rows".to_string(),
                })?;

            for row in rows {
                stmt.execute(params![
                    row.tablename,
                    row.recuid,
                    row.ref_table,
                    row.ref_uid,
                    row.deleted as i32,
                ])
                .map_err(|e| RefIndexError::Database {
                    message: format!("failed to insert index row: {e}"),
                    operation: "insert_rows".to_string(),
                })?;
            }
        }

        tx.commit().map_err(|e| RefIndexError::Database {
            message: format!("failed to commit transaction: {e}"),
            operation: "insert_rows".to_string(),
        })
    }

    /// Flags every row originating from `source` as deleted.
    ///
    /// Returns the number of rows that changed.
    pub fn mark_deleted_by_source(&self, source: &ElementRef) -> Result<usize> {
        self.conn()
            .execute(
                "UPDATE sys_refindex SET deleted = 1
                 WHERE tablename = ?1 AND recuid = ?2 AND deleted = 0",
                params![source.table, source.id],
            )
            .map_err(|e| RefIndexError::Database {
                message: format!("failed to mark rows deleted: {e}"),
                operation: "mark_deleted_by_source".to_string(),
            })
    }

    /// Removes all rows from the index.
    pub fn clear(&self) -> Result<()> {
        self.conn()
            .execute_batch("DELETE FROM sys_refindex;")
            .map_err(|e| RefIndexError::Database {
                message: format!("failed to clear database: {e}"),
                operation: "clear".to_string(),
            })
    }
}

// ---------------------------------------------------------------------------
// Reads
// ---------------------------------------------------------------------------

impl Database {
    /// Returns the live rows pointing at `target`, in insertion order.
    pub fn get_referrers(&self, target: &ElementRef) -> Result<Vec<IndexRow>> {
        let sql = format!(
            "SELECT {ROW_COLUMNS} FROM sys_refindex
             WHERE ref_table = ?1 AND ref_uid = ?2 AND deleted = 0
             ORDER BY id"
        );
        let mut stmt = self
            .conn()
            .prepare_cached(&sql)
            .map_err(|e| RefIndexError::Database {
                message: format!("failed to prepare query: {e}"),
                operation: "get_referrers".to_string(),
            })?;

        let rows = stmt
            .query_map(params![target.table, target.id], row_to_index_row)
            .map_err(|e| RefIndexError::Database {
                message: format!("failed to query referrers: {e}"),
                operation: "get_referrers".to_string(),
            })?;

        collect_rows(rows, "get_referrers")
    }

    /// Returns the live rows originating from `source`, in insertion order.
    pub fn get_references_from(&self, source: &ElementRef) -> Result<Vec<IndexRow>> {
        let sql = format!(
            "SELECT {ROW_COLUMNS} FROM sys_refindex
             WHERE tablename = ?1 AND recuid = ?2 AND deleted = 0
             ORDER BY id"
        );
        let mut stmt = self
            .conn()
            .prepare_cached(&sql)
            .map_err(|e| RefIndexError::Database {
                message: format!("failed to prepare query: {e}"),
                operation: "get_references_from".to_string(),
            })?;

        let rows = stmt
            .query_map(params![source.table, source.id], row_to_index_row)
            .map_err(|e| RefIndexError::Database {
                message: format!("failed to query references: {e}"),
                operation: "get_references_from".to_string(),
            })?;

        collect_rows(rows, "get_references_from")
    }
}

// ---------------------------------------------------------------------------
// Statistics
// ---------------------------------------------------------------------------

impl Database {
    /// Returns aggregate statistics about the index.
    pub fn get_stats(&self) -> Result<IndexStats> {
        let (row_count, deleted_row_count): (i64, i64) = self
            .conn()
            .query_row(
                "SELECT COUNT(*), COALESCE(SUM(deleted != 0), 0) FROM sys_refindex",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .map_err(|e| RefIndexError::Database {
                message: format!("failed to count rows: {e}"),
                operation: "get_stats".to_string(),
            })?;

        let rows_by_source_table = self.count_live_rows_by(
            "SELECT COALESCE(tablename, ''), COUNT(*) FROM sys_refindex
             WHERE deleted = 0 GROUP BY tablename",
        )?;
        let rows_by_target_table = self.count_live_rows_by(
            "SELECT ref_table, COUNT(*) FROM sys_refindex
             WHERE deleted = 0 GROUP BY ref_table",
        )?;

        let db_size_bytes = self.size().unwrap_or(0);

        Ok(IndexStats {
            row_count: row_count as u64,
            live_row_count: (row_count - deleted_row_count) as u64,
            deleted_row_count: deleted_row_count as u64,
            rows_by_source_table,
            rows_by_target_table,
            db_size_bytes,
        })
    }

    fn count_live_rows_by(&self, sql: &str) -> Result<BTreeMap<String, u64>> {
        let mut stmt = self
            .conn()
            .prepare(sql)
            .map_err(|e| RefIndexError::Database {
                message: format!("failed to prepare query: {e}"),
                operation: "get_stats".to_string(),
            })?;

        let rows = stmt
            .query_map([], |row| {
                let table: String = row.get(0)?;
                let count: i64 = row.get(1)?;
                Ok((table, count as u64))
            })
            .map_err(|e| RefIndexError::Database {
                message: format!("failed to group rows: {e}"),
                operation: "get_stats".to_string(),
            })?;

        let mut counts = BTreeMap::new();
        for row in rows {
            let (table, count) = row.map_err(|e| RefIndexError::Database {
                message: format!("failed to read stats row: {e}"),
                operation: "get_stats".to_string(),
            })?;
            *counts.entry(table).or_insert(0) += count;
        }
        Ok(counts)
    }
}
