//! Subscription commands

use anyhow::Result;
use spendwise_core::FinanceEngine;

use super::print_json;

pub fn cmd_subscriptions(engine: &FinanceEngine, user_id: i64, days: Option<i64>) -> Result<()> {
    print_json(&engine.detect_subscriptions(user_id, days))
}

pub fn cmd_alternatives(engine: &FinanceEngine, service: &str, max_cost: Option<f64>) -> Result<()> {
    let offers = engine.get_alternative_services(service, max_cost);
    if offers.is_empty() {
        eprintln!("No alternatives known for '{}'", service);
    }
    print_json(&offers)
}

pub fn cmd_changes(engine: &FinanceEngine, user_id: i64, days: Option<i64>) -> Result<()> {
    print_json(&engine.track_subscription_changes(user_id, days))
}
