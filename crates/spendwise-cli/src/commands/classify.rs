//! Classification and learning commands

use anyhow::{bail, Result};
use spendwise_core::{Correction, FinanceEngine};

use super::print_json;

pub fn cmd_categorize(
    engine: &FinanceEngine,
    user_id: i64,
    description: &str,
    amount: f64,
    merchant: Option<&str>,
) -> Result<()> {
    let result = engine.categorize(description, amount, merchant, Some(user_id));
    print_json(&result)
}

pub fn cmd_suggest(engine: &FinanceEngine, text: &str) -> Result<()> {
    print_json(&engine.get_category_suggestions(text))
}

pub fn cmd_learn(
    engine: &FinanceEngine,
    user_id: i64,
    description: &str,
    from: &str,
    to: &str,
    amount: f64,
    merchant: Option<String>,
) -> Result<()> {
    let outcome = engine.learn_from_correction(&Correction {
        user_id,
        original_description: description.to_string(),
        original_category: from.to_string(),
        correct_category: to.to_string(),
        amount,
        merchant,
    });

    print_json(&outcome)?;
    if !outcome.learned {
        bail!("Correction was not recorded");
    }
    Ok(())
}

pub fn cmd_corrections(engine: &FinanceEngine, user_id: i64) -> Result<()> {
    print_json(&engine.corrections(user_id))
}
