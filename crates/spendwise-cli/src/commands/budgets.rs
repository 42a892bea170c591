//! Budget and savings commands

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use spendwise_core::Database;

use super::print_json;

pub fn cmd_budget_list(db: &Database, user_id: i64) -> Result<()> {
    let budgets = db.list_budgets(user_id).context("Failed to list budgets")?;
    print_json(&budgets)
}

pub fn cmd_budget_add(
    db: &Database,
    user_id: i64,
    category: &str,
    amount: f64,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<()> {
    let id = db
        .create_budget(user_id, category, amount, start, end)
        .context("Failed to create budget")?;
    println!("Created budget {} ({} ${:.2}, {} to {})", id, category, amount, start, end);
    Ok(())
}

pub fn cmd_budget_spending(db: &Database, budget_id: i64) -> Result<()> {
    let spending = db
        .budget_spending(budget_id)
        .with_context(|| format!("Failed to load budget {}", budget_id))?;
    print_json(&spending)
}

pub fn cmd_budget_delete(db: &Database, budget_id: i64) -> Result<()> {
    if !db.delete_budget(budget_id)? {
        bail!("Budget {} not found", budget_id);
    }
    println!("Deleted budget {}", budget_id);
    Ok(())
}

pub fn cmd_savings(db: &Database, user_id: i64, balance: Option<f64>) -> Result<()> {
    if let Some(balance) = balance {
        db.set_savings_balance(user_id, balance)
            .context("Failed to set savings balance")?;
        println!("Savings balance set to ${:.2}", balance);
        return Ok(());
    }

    match db.savings_balance(user_id)? {
        Some(balance) => println!("Savings balance: ${:.2}", balance),
        None => println!("No savings balance recorded (emergency fund score is an estimate)"),
    }
    Ok(())
}
