//! Budget and savings balance operations

use chrono::NaiveDate;
use rusqlite::{params, OptionalExtension};
use tracing::info;

use super::{parse_date_column, Database};
use crate::classifier::round2;
use crate::error::{Error, Result};
use crate::models::{Budget, BudgetSpending, DatePeriod};

impl Database {
    /// Create a category budget over an inclusive date range
    pub fn create_budget(
        &self,
        user_id: i64,
        category: &str,
        amount: f64,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<i64> {
        if !amount.is_finite() || amount < 0.0 {
            return Err(Error::MalformedInput(format!(
                "Budget amount must be a non-negative number, got {}",
                amount
            )));
        }
        if end_date < start_date {
            return Err(Error::MalformedInput(format!(
                "Budget ends ({}) before it starts ({})",
                end_date, start_date
            )));
        }

        let conn = self.conn()?;
        conn.execute(
            r#"
            INSERT INTO budgets (user_id, category, amount, start_date, end_date)
            VALUES (?, ?, ?, ?, ?)
            "#,
            params![
                user_id,
                category,
                amount,
                start_date.to_string(),
                end_date.to_string()
            ],
        )?;

        let id = conn.last_insert_rowid();
        info!(user_id, budget_id = id, "Created {} budget of ${:.2}", category, amount);
        Ok(id)
    }

    pub fn list_budgets(&self, user_id: i64) -> Result<Vec<Budget>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT id, user_id, category, amount, start_date, end_date
            FROM budgets
            WHERE user_id = ?
            ORDER BY start_date, id
            "#,
        )?;

        let budgets = stmt
            .query_map(params![user_id], Self::row_to_budget)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(budgets)
    }

    pub fn get_budget(&self, budget_id: i64) -> Result<Option<Budget>> {
        let conn = self.conn()?;
        let budget = conn
            .query_row(
                r#"
                SELECT id, user_id, category, amount, start_date, end_date
                FROM budgets
                WHERE id = ?
                "#,
                params![budget_id],
                Self::row_to_budget,
            )
            .optional()?;
        Ok(budget)
    }

    /// Spending against a budget: the budget owner's expenses in its
    /// category within its period
    pub fn budget_spending(&self, budget_id: i64) -> Result<BudgetSpending> {
        let budget = self
            .get_budget(budget_id)?
            .ok_or_else(|| Error::NotFound(format!("budget {}", budget_id)))?;

        let conn = self.conn()?;
        let spent: f64 = conn.query_row(
            r#"
            SELECT COALESCE(SUM(amount), 0)
            FROM transactions
            WHERE user_id = ? AND category = ? AND date >= ? AND date <= ?
            "#,
            params![
                budget.user_id,
                budget.category,
                budget.start_date.to_string(),
                budget.end_date.to_string()
            ],
            |row| row.get(0),
        )?;

        let percentage_used = if budget.amount > 0.0 {
            round2(spent / budget.amount * 100.0)
        } else {
            0.0
        };

        Ok(BudgetSpending {
            budget_id: budget.id,
            amount: budget.amount,
            spent: round2(spent),
            remaining: round2(budget.amount - spent),
            percentage_used,
            category: budget.category,
            period: DatePeriod {
                start: budget.start_date,
                end: budget.end_date,
            },
        })
    }

    pub fn delete_budget(&self, budget_id: i64) -> Result<bool> {
        let conn = self.conn()?;
        let changed = conn.execute("DELETE FROM budgets WHERE id = ?", params![budget_id])?;
        Ok(changed > 0)
    }

    /// Record the user's current savings balance
    pub fn set_savings_balance(&self, user_id: i64, balance: f64) -> Result<()> {
        if !balance.is_finite() {
            return Err(Error::MalformedInput(format!(
                "Savings balance must be a number, got {}",
                balance
            )));
        }

        let conn = self.conn()?;
        conn.execute(
            r#"
            INSERT INTO savings_balances (user_id, balance, updated_at)
            VALUES (?, ?, CURRENT_TIMESTAMP)
            ON CONFLICT(user_id) DO UPDATE SET
                balance = excluded.balance,
                updated_at = excluded.updated_at
            "#,
            params![user_id, balance],
        )?;
        Ok(())
    }

    pub fn savings_balance(&self, user_id: i64) -> Result<Option<f64>> {
        let conn = self.conn()?;
        let balance = conn
            .query_row(
                "SELECT balance FROM savings_balances WHERE user_id = ?",
                params![user_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(balance)
    }

    fn row_to_budget(row: &rusqlite::Row) -> rusqlite::Result<Budget> {
        let start: String = row.get(4)?;
        let end: String = row.get(5)?;
        Ok(Budget {
            id: row.get(0)?,
            user_id: row.get(1)?,
            category: row.get(2)?,
            amount: row.get(3)?,
            start_date: parse_date_column(&start, 4)?,
            end_date: parse_date_column(&end, 5)?,
        })
    }
}
