//! Income operations

use std::collections::BTreeMap;

use chrono::NaiveDate;
use rusqlite::params;
use tracing::debug;

use super::{Database, ImportSummary};
use crate::error::Result;
use crate::models::{IncomeAggregate, NewIncome};

impl Database {
    /// Insert a batch of incomes, skipping rows already imported
    pub fn import_incomes(&self, incomes: &[NewIncome]) -> Result<ImportSummary> {
        let mut conn = self.conn()?;
        let db_tx = conn.transaction()?;
        let mut summary = ImportSummary::default();

        {
            let mut stmt = db_tx.prepare(
                r#"
                INSERT OR IGNORE INTO incomes (user_id, date, source, amount, import_hash)
                VALUES (?, ?, ?, ?, ?)
                "#,
            )?;
            for income in incomes {
                let changed = stmt.execute(params![
                    income.user_id,
                    income.date.to_string(),
                    income.source,
                    income.amount,
                    income.import_hash,
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
            "Imported incomes"
        );
        Ok(summary)
    }

    /// Total income and per-source totals in an inclusive date range
    pub fn income_aggregate(
        &self,
        user_id: i64,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<IncomeAggregate> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT source, SUM(amount)
            FROM incomes
            WHERE user_id = ? AND date >= ? AND date <= ?
            GROUP BY source
            "#,
        )?;

        let by_source: BTreeMap<String, f64> = stmt
            .query_map(params![user_id, start.to_string(), end.to_string()], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, f64>(1)?))
            })?
            .collect::<std::result::Result<_, _>>()?;

        Ok(IncomeAggregate {
            total_income: by_source.values().sum(),
            by_source,
        })
    }
}
