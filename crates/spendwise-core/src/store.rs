//! Record store collaborator
//!
//! The engine never owns financial records. It asks a [`FinanceStore`] for
//! already-persisted data and treats every failure as "data unavailable".

use chrono::NaiveDate;

use crate::error::Result;
use crate::models::{Budget, BudgetSpending, IncomeAggregate, TransactionRecord};

pub trait FinanceStore: Send + Sync {
    /// Expense transactions dated `since` or later, oldest first
    fn fetch_transactions(&self, user_id: i64, since: NaiveDate) -> Result<Vec<TransactionRecord>>;

    /// Expense transactions in an inclusive date range, oldest first
    fn fetch_transactions_between(
        &self,
        user_id: i64,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<TransactionRecord>> {
        Ok(self
            .fetch_transactions(user_id, start)?
            .into_iter()
            .filter(|tx| tx.date <= end)
            .collect())
    }

    fn fetch_budgets(&self, user_id: i64) -> Result<Vec<Budget>>;

    fn fetch_budget_spending(&self, budget_id: i64) -> Result<BudgetSpending>;

    /// Income totals in an inclusive date range
    fn fetch_income_aggregate(
        &self,
        user_id: i64,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<IncomeAggregate>;

    /// Tracked savings balance, if the store keeps one
    fn fetch_savings_balance(&self, _user_id: i64) -> Result<Option<f64>> {
        Ok(None)
    }
}
