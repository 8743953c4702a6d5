//! Transaction operations

use rusqlite::{params, OptionalExtension};
use tracing::{debug, info};

use super::transaction_filter::TransactionFilter;
use super::{parse_date_column, parse_datetime, Database};
use crate::error::{Error, Result};
use crate::models::{
    round2, CategoryTotal, Direction, LedgerSummary, Transaction, TransactionEdit,
    TransactionRecord,
};
use crate::normalize::clean_text;
use crate::vocabulary::Vocabulary;

/// Column order expected by `row_to_transaction`
const TRANSACTION_COLUMNS: &str = "id, direction, category, amount, occurred_at, counterparty, \
     description, receipt_number, source, source_file, ai_processed, confidence, needs_review, \
     review_reason, manually_edited, created_at, updated_at";

const INSERT_TRANSACTION: &str = r#"
    INSERT INTO transactions (direction, category, amount, occurred_at, counterparty, description,
                              receipt_number, source, source_file, ai_processed, confidence,
                              needs_review, review_reason, manually_edited)
    VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
"#;

fn parse_text_column<T: std::str::FromStr<Err = String>>(
    index: usize,
    value: &str,
) -> rusqlite::Result<T> {
    value.parse().map_err(|e: String| {
        rusqlite::Error::FromSqlConversionFailure(index, rusqlite::types::Type::Text, e.into())
    })
}

fn insert_record(conn: &rusqlite::Connection, record: &TransactionRecord) -> Result<i64> {
    if record.amount <= 0.0 || !record.amount.is_finite() {
        return Err(Error::InvalidData(format!(
            "Amount must be positive, got {}",
            record.amount
        )));
    }
    conn.execute(
        INSERT_TRANSACTION,
        params![
            record.direction.as_str(),
            record.category,
            record.amount,
            record.occurred_at.to_string(),
            record.counterparty,
            record.description,
            record.receipt_number,
            record.source.as_str(),
            record.source_file,
            record.ai_processed,
            record.confidence,
            record.needs_review,
            record.review_reason,
            record.manually_edited,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

impl Database {
    /// Insert one validated record, returning its ID
    pub fn insert_transaction(&self, record: &TransactionRecord) -> Result<i64> {
        let conn = self.conn()?;
        let id = insert_record(&conn, record)?;
        debug!(id, category = %record.category, "Inserted transaction");
        Ok(id)
    }

    /// Insert a batch of records atomically
    ///
    /// Either every record is stored or none is.
    pub fn insert_transactions(&self, records: &[TransactionRecord]) -> Result<Vec<i64>> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let mut ids = Vec::with_capacity(records.len());
        for record in records {
            ids.push(insert_record(&tx, record)?);
        }

        tx.commit()?;
        info!(count = ids.len(), "Inserted transaction batch");
        Ok(ids)
    }

    /// Column order: see `TRANSACTION_COLUMNS`
    pub(crate) fn row_to_transaction(row: &rusqlite::Row) -> rusqlite::Result<Transaction> {
        let direction: String = row.get(1)?;
        let occurred_at: String = row.get(4)?;
        let source: String = row.get(8)?;
        let created_at: String = row.get(15)?;
        let updated_at: String = row.get(16)?;

        Ok(Transaction {
            id: row.get(0)?,
            record: TransactionRecord {
                direction: parse_text_column(1, &direction)?,
                category: row.get(2)?,
                amount: row.get(3)?,
                occurred_at: parse_date_column(&occurred_at)?,
                counterparty: row.get(5)?,
                description: row.get(6)?,
                receipt_number: row.get(7)?,
                source: parse_text_column(8, &source)?,
                source_file: row.get(9)?,
                ai_processed: row.get(10)?,
                confidence: row.get(11)?,
                needs_review: row.get(12)?,
                review_reason: row.get(13)?,
                manually_edited: row.get(14)?,
            },
            created_at: parse_datetime(&created_at),
            updated_at: parse_datetime(&updated_at),
        })
    }

    /// Get a single transaction by ID
    pub fn get_transaction(&self, id: i64) -> Result<Option<Transaction>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM transactions WHERE id = ?",
            TRANSACTION_COLUMNS
        ))?;

        let transaction = stmt
            .query_row(params![id], |row| Self::row_to_transaction(row))
            .optional()?;

        Ok(transaction)
    }

    /// List transactions, newest first
    pub fn list_transactions(&self, filter: &TransactionFilter) -> Result<Vec<Transaction>> {
        let conn = self.conn()?;
        let built = filter.build();
        let sql = format!(
            "SELECT {} FROM transactions {} ORDER BY occurred_at DESC, id DESC {}",
            TRANSACTION_COLUMNS, built.where_clause, built.limit_clause
        );

        let mut stmt = conn.prepare(&sql)?;
        let transactions = stmt
            .query_map(built.params_refs().as_slice(), |row| {
                Self::row_to_transaction(row)
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(transactions)
    }

    /// Count transactions matching a filter (limit ignored)
    pub fn count_transactions(&self, filter: &TransactionFilter) -> Result<i64> {
        let conn = self.conn()?;
        let built = filter.clone().limit(None).build();
        let sql = format!("SELECT COUNT(*) FROM transactions {}", built.where_clause);
        let count: i64 = conn.query_row(&sql, built.params_refs().as_slice(), |row| row.get(0))?;
        Ok(count)
    }

    /// Apply a human correction
    ///
    /// The resulting category must belong to the resulting direction's
    /// vocabulary and the amount must stay positive. The record leaves the
    /// review queue unless the edit supplies a new review reason.
    pub fn edit_transaction(
        &self,
        id: i64,
        edit: &TransactionEdit,
        vocabulary: &Vocabulary,
    ) -> Result<Transaction> {
        let current = self
            .get_transaction(id)?
            .ok_or_else(|| Error::NotFound(format!("transaction {}", id)))?;
        let mut record = current.record;

        if let Some(direction) = edit.direction {
            record.direction = direction;
        }
        if let Some(ref category) = edit.category {
            record.category = category.trim().to_lowercase();
        }
        if !vocabulary.contains(record.direction, &record.category) {
            return Err(Error::InvalidData(format!(
                "Category '{}' is not a valid {} category",
                record.category, record.direction
            )));
        }

        if let Some(amount) = edit.amount {
            if amount <= 0.0 || !amount.is_finite() {
                return Err(Error::InvalidData(format!(
                    "Amount must be positive, got {}",
                    amount
                )));
            }
            record.amount = round2(amount);
        }
        if let Some(date) = edit.occurred_at {
            record.occurred_at = date;
        }
        if let Some(ref text) = edit.counterparty {
            record.counterparty = clean_text(Some(text));
        }
        if let Some(ref text) = edit.description {
            record.description = clean_text(Some(text));
        }
        if let Some(ref text) = edit.receipt_number {
            record.receipt_number = clean_text(Some(text));
        }

        record.review_reason = edit.review_reason.as_deref().and_then(|r| clean_text(Some(r)));
        record.needs_review = record.review_reason.is_some();
        record.manually_edited = true;

        let conn = self.conn()?;
        conn.execute(
            r#"
            UPDATE transactions SET
                direction = ?, category = ?, amount = ?, occurred_at = ?,
                counterparty = ?, description = ?, receipt_number = ?,
                needs_review = ?, review_reason = ?, manually_edited = 1,
                updated_at = CURRENT_TIMESTAMP
            WHERE id = ?
            "#,
            params![
                record.direction.as_str(),
                record.category,
                record.amount,
                record.occurred_at.to_string(),
                record.counterparty,
                record.description,
                record.receipt_number,
                record.needs_review,
                record.review_reason,
                id,
            ],
        )?;
        drop(conn);

        info!(id, category = %record.category, "Transaction edited");
        self.get_transaction(id)?
            .ok_or_else(|| Error::NotFound(format!("transaction {}", id)))
    }

    /// Delete a transaction; returns whether a row was removed
    pub fn delete_transaction(&self, id: i64) -> Result<bool> {
        let conn = self.conn()?;
        let deleted = conn.execute("DELETE FROM transactions WHERE id = ?", params![id])?;
        Ok(deleted > 0)
    }

    /// Totals over the transactions a filter selects (limit ignored)
    pub fn summary(&self, filter: &TransactionFilter) -> Result<LedgerSummary> {
        let conn = self.conn()?;
        let built = filter.clone().limit(None).build();
        let sql = format!(
            r#"
            SELECT direction, category, COUNT(*), SUM(amount), SUM(needs_review)
            FROM transactions {}
            GROUP BY direction, category
            "#,
            built.where_clause
        );

        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(built.params_refs().as_slice(), |row| {
                let direction: String = row.get(0)?;
                Ok((
                    parse_text_column::<Direction>(0, &direction)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, i64>(2)?,
                    row.get::<_, f64>(3)?,
                    row.get::<_, i64>(4)?,
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut summary = LedgerSummary::default();
        for (direction, category, count, total, review) in rows {
            match direction {
                Direction::Income => {
                    summary.total_income += total;
                    summary.income_count += count;
                }
                Direction::Expense => {
                    summary.total_expense += total;
                    summary.expense_count += count;
                }
            }
            summary.needs_review_count += review;
            summary.by_category.push(CategoryTotal {
                direction,
                category,
                count,
                total: round2(total),
            });
        }

        summary.total_income = round2(summary.total_income);
        summary.total_expense = round2(summary.total_expense);
        summary.balance = round2(summary.total_income - summary.total_expense);
        summary.by_category.sort_by(|a, b| {
            b.total
                .partial_cmp(&a.total)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        Ok(summary)
    }
}
