//! Processed source-file registry

use rusqlite::{params, OptionalExtension};

use super::{parse_datetime, Database};
use crate::dedup::{DedupStore, FileMark};
use crate::error::Result;
use crate::models::ProcessedFile;

impl Database {
    /// Look up a registry entry by content hash
    pub fn get_processed_file(&self, hash: &str) -> Result<Option<ProcessedFile>> {
        let conn = self.conn()?;
        let file = conn
            .query_row(
                r#"
                SELECT id, file_name, file_hash, kind, transactions_extracted, success,
                       error_message, processed_at
                FROM processed_files WHERE file_hash = ?
                "#,
                params![hash],
                Self::row_to_processed_file,
            )
            .optional()?;
        Ok(file)
    }

    /// Most recently processed files first
    pub fn list_processed_files(&self, limit: i64) -> Result<Vec<ProcessedFile>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT id, file_name, file_hash, kind, transactions_extracted, success,
                   error_message, processed_at
            FROM processed_files
            ORDER BY processed_at DESC, id DESC
            LIMIT ?
            "#,
        )?;
        let files = stmt
            .query_map(params![limit], Self::row_to_processed_file)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(files)
    }

    pub fn count_processed_files(&self) -> Result<i64> {
        let conn = self.conn()?;
        let count: i64 =
            conn.query_row("SELECT COUNT(*) FROM processed_files", [], |row| row.get(0))?;
        Ok(count)
    }

    fn row_to_processed_file(row: &rusqlite::Row) -> rusqlite::Result<ProcessedFile> {
        let processed_at: String = row.get(7)?;
        Ok(ProcessedFile {
            id: row.get(0)?,
            file_name: row.get(1)?,
            file_hash: row.get(2)?,
            kind: row.get(3)?,
            transactions_extracted: row.get(4)?,
            success: row.get(5)?,
            error_message: row.get(6)?,
            processed_at: parse_datetime(&processed_at),
        })
    }
}

impl DedupStore for Database {
    fn is_processed(&self, hash: &str) -> Result<bool> {
        let conn = self.conn()?;
        let found: Option<i64> = conn
            .query_row(
                "SELECT id FROM processed_files WHERE file_hash = ?",
                params![hash],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    fn mark_processed(&self, hash: &str, mark: &FileMark<'_>) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            r#"
            INSERT OR IGNORE INTO processed_files
                (file_name, file_hash, kind, transactions_extracted, success, error_message)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
            params![
                mark.file_name,
                hash,
                mark.kind,
                mark.transactions_extracted,
                mark.success,
                mark.error_message,
            ],
        )?;
        Ok(())
    }
}
