//! Spending pattern and financial health commands

use anyhow::Result;
use spendwise_core::FinanceEngine;

use super::print_json;

pub fn cmd_patterns(engine: &FinanceEngine, user_id: i64, days: Option<i64>) -> Result<()> {
    print_json(&engine.analyze_spending_patterns(user_id, days))
}

pub fn cmd_health(engine: &FinanceEngine, user_id: i64) -> Result<()> {
    print_json(&engine.calculate_health_score(user_id))
}
