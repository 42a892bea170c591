//! Transaction operations

use chrono::NaiveDate;
use rusqlite::params;
use serde::Serialize;
use tracing::debug;

use super::{parse_date_column, Database};
use crate::error::Result;
use crate::models::{NewTransaction, TransactionRecord};

/// Outcome of a bulk import
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub inserted: usize,
    /// Rows whose import hash was already stored
    pub skipped: usize,
}

const TRANSACTION_COLUMNS: &str = "id, user_id, date, description, merchant, amount, category";

impl Database {
    /// Insert a batch of transactions in one SQLite transaction
    pub fn import_transactions(&self, txs: &[NewTransaction]) -> Result<ImportSummary> {
        let mut conn = self.conn()?;
        let db_tx = conn.transaction()?;
        let mut summary = ImportSummary::default();

        {
            let mut stmt = db_tx.prepare(
                r#"
                INSERT OR IGNORE INTO transactions (user_id, date, description, merchant, amount, category, import_hash)
                VALUES (?, ?, ?, ?, ?, ?, ?)
                "#,
            )?;
            for tx in txs {
                let changed = stmt.execute(params![
                    tx.user_id,
                    tx.date.to_string(),
                    tx.description,
                    tx.merchant,
                    tx.amount,
                    tx.category,
                    tx.import_hash,
                ])?;
                if changed == 0 {
                    summary.skipped += 1;
                } else {
                    summary.inserted += 1;
                }
            }
        }

        db_tx.commit()?;
        debug!(
            inserted = summary.inserted,
            skipped = summary.skipped,
            "Imported transactions"
        );
        Ok(summary)
    }

    /// Transactions dated `since` or later, oldest first
    pub fn transactions_since(&self, user_id: i64, since: NaiveDate) -> Result<Vec<TransactionRecord>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM transactions WHERE user_id = ? AND date >= ? ORDER BY date, id",
            TRANSACTION_COLUMNS
        ))?;

        let txs = stmt
            .query_map(params![user_id, since.to_string()], Self::row_to_transaction)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(txs)
    }

    /// Transactions in an inclusive date range, oldest first
    pub fn transactions_between(
        &self,
        user_id: i64,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<TransactionRecord>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM transactions WHERE user_id = ? AND date >= ? AND date <= ? ORDER BY date, id",
            TRANSACTION_COLUMNS
        ))?;

        let txs = stmt
            .query_map(
                params![user_id, start.to_string(), end.to_string()],
                Self::row_to_transaction,
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(txs)
    }

    /// Transactions that were stored without a category, oldest first
    pub fn uncategorized_transactions(&self, user_id: i64) -> Result<Vec<TransactionRecord>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM transactions WHERE user_id = ? AND category IS NULL ORDER BY date, id",
            TRANSACTION_COLUMNS
        ))?;

        let txs = stmt
            .query_map(params![user_id], Self::row_to_transaction)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(txs)
    }

    /// Write back categories assigned to uncategorized transactions
    ///
    /// Rows that already carry a category are left alone. Returns the
    /// number of rows updated.
    pub fn update_transaction_categories(&self, txs: &[TransactionRecord]) -> Result<usize> {
        let mut conn = self.conn()?;
        let db_tx = conn.transaction()?;
        let mut updated = 0;

        {
            let mut stmt = db_tx.prepare(
                "UPDATE transactions SET category = ? WHERE id = ? AND category IS NULL",
            )?;
            for tx in txs {
                if let Some(category) = &tx.category {
                    updated += stmt.execute(params![category, tx.id])?;
                }
            }
        }

        db_tx.commit()?;
        debug!(updated, "Stored assigned categories");
        Ok(updated)
    }

    pub(crate) fn row_to_transaction(row: &rusqlite::Row) -> rusqlite::Result<TransactionRecord> {
        let date: String = row.get(2)?;
        Ok(TransactionRecord {
            id: row.get(0)?,
            user_id: row.get(1)?,
            date: parse_date_column(&date, 2)?,
            description: row.get(3)?,
            merchant: row.get(4)?,
            amount: row.get(5)?,
            category: row.get(6)?,
        })
    }
}
