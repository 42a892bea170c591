//! Learning profile persistence
//!
//! A correction reads the user's profile, applies it and appends to the log
//! inside one `BEGIN IMMEDIATE` transaction, so concurrent corrections for the
//! same user serialize on SQLite's write lock.

use chrono::Utc;
use rusqlite::{params, Connection, TransactionBehavior};
use tracing::info;

use super::{parse_datetime, Database};
use crate::config::LearningConfig;
use crate::error::Result;
use crate::learning::{CategoryStats, LearningProfile, LearningStore};
use crate::models::{Correction, CorrectionEntry};

fn load_profile(conn: &Connection, user_id: i64) -> Result<LearningProfile> {
    let mut stmt = conn.prepare(
        "SELECT category, frequency, accuracy FROM category_learning WHERE user_id = ?",
    )?;

    let categories = stmt
        .query_map(params![user_id], |row| {
            Ok((
                row.get::<_, String>(0)?,
                CategoryStats {
                    frequency: row.get(1)?,
                    accuracy: row.get(2)?,
                },
            ))
        })?
        .collect::<std::result::Result<_, _>>()?;

    Ok(LearningProfile { categories })
}

impl LearningStore for Database {
    fn profile(&self, user_id: i64) -> Result<LearningProfile> {
        let conn = self.conn()?;
        load_profile(&conn, user_id)
    }

    fn record_correction(
        &self,
        correction: &Correction,
        config: &LearningConfig,
    ) -> Result<LearningProfile> {
        let mut conn = self.conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let mut profile = load_profile(&tx, correction.user_id)?;
        profile.apply_correction(
            &correction.original_category,
            &correction.correct_category,
            config,
        );

        {
            let mut upsert = tx.prepare(
                r#"
                INSERT INTO category_learning (user_id, category, frequency, accuracy, updated_at)
                VALUES (?, ?, ?, ?, CURRENT_TIMESTAMP)
                ON CONFLICT(user_id, category) DO UPDATE SET
                    frequency = excluded.frequency,
                    accuracy = excluded.accuracy,
                    updated_at = excluded.updated_at
                "#,
            )?;
            for category in [&correction.correct_category, &correction.original_category] {
                if let Some(stats) = profile.get(category) {
                    upsert.execute(params![
                        correction.user_id,
                        category,
                        stats.frequency,
                        stats.accuracy
                    ])?;
                }
            }
        }

        tx.execute(
            r#"
            INSERT INTO category_corrections
                (user_id, original_description, original_category, correct_category, amount, merchant, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
            params![
                correction.user_id,
                correction.original_description,
                correction.original_category,
                correction.correct_category,
                correction.amount,
                correction.merchant,
                Utc::now().to_rfc3339(),
            ],
        )?;

        tx.commit()?;

        info!(
            user_id = correction.user_id,
            "Learned from user correction: {} -> {}",
            correction.original_category,
            correction.correct_category
        );
        Ok(profile)
    }

    fn corrections(&self, user_id: i64) -> Result<Vec<CorrectionEntry>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT original_description, original_category, correct_category, amount, merchant, created_at
            FROM category_corrections
            WHERE user_id = ?
            ORDER BY id
            "#,
        )?;

        let entries = stmt
            .query_map(params![user_id], |row| {
                let created_at: String = row.get(5)?;
                Ok(CorrectionEntry {
                    original_description: row.get(0)?,
                    original_category: row.get(1)?,
                    correct_category: row.get(2)?,
                    amount: row.get(3)?,
                    merchant: row.get(4)?,
                    timestamp: parse_datetime(&created_at),
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(entries)
    }
}
