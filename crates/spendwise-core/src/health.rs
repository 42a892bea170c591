//! Financial health scoring
//!
//! Five independent sub-scores in [0, 100], combined with fixed weights:
//!
//! | Component        | Weight | Input |
//! |------------------|--------|-------|
//! | savings rate     | 0.30   | income vs expenses, month to date |
//! | budget adherence | 0.25   | % used of each active budget |
//! | income stability | 0.20   | CV of up to 6 monthly income totals |
//! | expense control  | 0.15   | average charge growth vs the prior 30 days |
//! | emergency fund   | 0.10   | savings vs 6 months of expenses |
//!
//! The scoring functions are pure; [`HealthScorer`] gathers their inputs from
//! a [`FinanceStore`]. A failing fetch zeroes only its own component.

use std::collections::BTreeMap;

use chrono::{Datelike, Duration, Months, NaiveDate, Utc};
use tracing::{debug, warn};

use crate::config::{Band, BudgetCurve, ComponentValues, HealthConfig, TierCutoffs};
use crate::detect::mean_and_std_dev;
use crate::error::{Error, Result};
use crate::models::{
    Budget, ComponentScore, HealthComponents, HealthLevel, HealthReport, Priority, Recommendation,
    RecommendationType, TransactionRecord,
};
use crate::store::FinanceStore;

/// Category guess for a transaction stored without one
pub type Categorize<'a> = dyn Fn(&TransactionRecord) -> Option<String> + 'a;

/// Score at a 0% savings rate; negative rates subtract from it
const NEGATIVE_SAVINGS_BASE: f64 = 50.0;

// =============================================================================
// Pure scoring
// =============================================================================

/// Savings rate in percent, `None` without income
pub fn savings_rate(income: f64, expenses: f64) -> Option<f64> {
    if income > 0.0 && expenses.is_finite() {
        Some((income - expenses) / income * 100.0)
    } else {
        None
    }
}

/// Savings rate score with the default bands
pub fn savings_rate_score(income: f64, expenses: f64) -> f64 {
    score_savings_rate(&HealthConfig::default(), income, expenses)
}

pub fn score_savings_rate(config: &HealthConfig, income: f64, expenses: f64) -> f64 {
    let Some(rate) = savings_rate(income, expenses) else {
        return 0.0;
    };
    at_least(&config.bands.savings_rate, rate)
        .unwrap_or_else(|| (NEGATIVE_SAVINGS_BASE + rate).max(0.0))
        .clamp(0.0, 100.0)
}

/// Score for one budget given its percentage used
pub fn budget_score(curve: &BudgetCurve, percentage_used: f64) -> f64 {
    let pct = percentage_used.max(0.0);
    let score = if pct <= curve.comfort_percent {
        100.0
    } else if pct <= 100.0 {
        curve.near_limit_base - (pct - curve.comfort_percent) * curve.near_limit_slope
    } else {
        curve.over_limit_base - (pct - 100.0) * curve.over_limit_slope
    };
    score.clamp(0.0, 100.0)
}

/// Average budget score, neutral without budgets
pub fn score_budget_adherence(config: &HealthConfig, percentages_used: &[f64]) -> f64 {
    let scores: Vec<f64> = percentages_used
        .iter()
        .filter(|p| p.is_finite())
        .map(|&p| budget_score(&config.budget, p))
        .collect();
    if scores.is_empty() {
        return config.neutral.budget_adherence;
    }
    scores.iter().sum::<f64>() / scores.len() as f64
}

/// Coefficient of variation in percent (stddev / mean × 100)
pub fn coefficient_of_variation(values: &[f64]) -> Option<f64> {
    let (mean, std_dev) = mean_and_std_dev(values);
    if values.is_empty() || mean <= 0.0 {
        return None;
    }
    Some(std_dev / mean * 100.0)
}

/// Income stability from monthly income totals
///
/// Months without income are ignored; fewer than two months is neutral.
pub fn score_income_stability(config: &HealthConfig, monthly_incomes: &[f64]) -> f64 {
    let incomes: Vec<f64> = monthly_incomes
        .iter()
        .copied()
        .filter(|v| v.is_finite() && *v > 0.0)
        .collect();
    if incomes.len() < 2 {
        return config.neutral.income_stability;
    }

    match coefficient_of_variation(&incomes) {
        Some(cv) => below(&config.bands.income_cv, cv).unwrap_or(config.bands.income_cv_floor),
        None => config.neutral.income_stability,
    }
}

/// Expense control from the average charge of this period and the prior one
pub fn score_expense_control(
    config: &HealthConfig,
    current_average: f64,
    previous_average: Option<f64>,
) -> f64 {
    let previous = match previous_average {
        Some(p) if p > 0.0 && p.is_finite() => p,
        _ => return config.neutral.expense_control,
    };

    let growth = (current_average - previous) / previous * 100.0;
    at_most(&config.bands.expense_growth, growth).unwrap_or(config.bands.expense_growth_floor)
}

/// Emergency fund score
///
/// Returns the score and whether it rests on the estimated buffer rather
/// than a tracked savings balance.
pub fn score_emergency_fund(
    config: &HealthConfig,
    average_monthly_expenses: f64,
    savings_balance: Option<f64>,
) -> (f64, bool) {
    let w = &config.windows;
    if !average_monthly_expenses.is_finite() || average_monthly_expenses <= 0.0 {
        return (config.neutral.emergency_fund, savings_balance.is_none());
    }

    let target = average_monthly_expenses * w.emergency_target_months;
    let (savings, provisional) = match savings_balance {
        Some(balance) => (balance.max(0.0), false),
        None => (
            average_monthly_expenses * w.provisional_savings_rate * w.provisional_months,
            true,
        ),
    };

    let ratio = savings / target * 100.0;
    let score =
        at_least(&config.bands.emergency_ratio, ratio).unwrap_or(config.bands.emergency_ratio_floor);
    (score, provisional)
}

/// Tier of a composite score with the default cutoffs
pub fn health_level(score: f64) -> HealthLevel {
    tier(&HealthConfig::default().tiers, score)
}

pub fn tier(cutoffs: &TierCutoffs, score: f64) -> HealthLevel {
    if score >= cutoffs.excellent {
        HealthLevel::Excellent
    } else if score >= cutoffs.good {
        HealthLevel::Good
    } else if score >= cutoffs.fair {
        HealthLevel::Fair
    } else {
        HealthLevel::Poor
    }
}

/// Σ score × weight, each score clamped to [0, 100]
pub fn composite_score(scores: &ComponentValues, weights: &ComponentValues) -> f64 {
    let total = scores.savings_rate.clamp(0.0, 100.0) * weights.savings_rate
        + scores.budget_adherence.clamp(0.0, 100.0) * weights.budget_adherence
        + scores.income_stability.clamp(0.0, 100.0) * weights.income_stability
        + scores.expense_control.clamp(0.0, 100.0) * weights.expense_control
        + scores.emergency_fund.clamp(0.0, 100.0) * weights.emergency_fund;
    round1(total).clamp(0.0, 100.0)
}

/// Recommendations for every component below its threshold, most urgent first
pub fn recommendations(config: &HealthConfig, scores: &ComponentValues) -> Vec<Recommendation> {
    let below = &config.recommend_below;
    let mut recs = Vec::new();

    if scores.savings_rate < below.savings_rate {
        recs.push(Recommendation {
            kind: RecommendationType::Savings,
            priority: Priority::High,
            title: "Increase Your Savings Rate".to_string(),
            description: "Try to save at least 10% of your income each month".to_string(),
            action: "Set up automatic transfers to savings account".to_string(),
        });
    }

    if scores.budget_adherence < below.budget_adherence {
        recs.push(Recommendation {
            kind: RecommendationType::Budget,
            priority: Priority::High,
            title: "Improve Budget Adherence".to_string(),
            description: "You're consistently overspending in some categories".to_string(),
            action: "Review and adjust your budget limits".to_string(),
        });
    }

    if scores.income_stability < below.income_stability {
        recs.push(Recommendation {
            kind: RecommendationType::Income,
            priority: Priority::Medium,
            title: "Stabilize Your Income".to_string(),
            description: "Your income varies significantly month to month".to_string(),
            action: "Consider building multiple income streams or emergency savings".to_string(),
        });
    }

    if scores.expense_control < below.expense_control {
        recs.push(Recommendation {
            kind: RecommendationType::Expenses,
            priority: Priority::Medium,
            title: "Control Your Spending".to_string(),
            description: "Your expenses are increasing faster than income".to_string(),
            action: "Review subscriptions and discretionary spending".to_string(),
        });
    }

    if scores.emergency_fund < below.emergency_fund {
        recs.push(Recommendation {
            kind: RecommendationType::Emergency,
            priority: Priority::High,
            title: "Build Emergency Fund".to_string(),
            description: "You should have 3-6 months of expenses saved".to_string(),
            action: "Start with $500 and build gradually".to_string(),
        });
    }

    recs.sort_by(|a, b| b.priority.rank().cmp(&a.priority.rank()));
    recs
}

/// First band whose limit the value reaches (`value >= limit`)
fn at_least(bands: &[Band], value: f64) -> Option<f64> {
    bands.iter().find(|b| value >= b.limit).map(|b| b.score)
}

/// First band whose limit the value stays under (`value < limit`)
fn below(bands: &[Band], value: f64) -> Option<f64> {
    bands.iter().find(|b| value < b.limit).map(|b| b.score)
}

/// First band whose limit the value does not exceed (`value <= limit`)
fn at_most(bands: &[Band], value: f64) -> Option<f64> {
    bands.iter().find(|b| value <= b.limit).map(|b| b.score)
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

// =============================================================================
// Scorer
// =============================================================================

/// Gathers sub-score inputs from a store and builds the report
pub struct HealthScorer {
    config: HealthConfig,
}

impl HealthScorer {
    pub fn new(config: HealthConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &HealthConfig {
        &self.config
    }

    /// Build the health report for a user as of a given day
    ///
    /// `categorize` names the category of a charge stored without one, so
    /// uncategorized spending still counts against budgets.
    pub fn score(
        &self,
        store: &dyn FinanceStore,
        categorize: &Categorize<'_>,
        user_id: i64,
        as_of: NaiveDate,
    ) -> Result<HealthReport> {
        let month_start = as_of
            .with_day(1)
            .ok_or_else(|| Error::MalformedInput(format!("invalid date: {}", as_of)))?;

        let savings = component("savings_rate", user_id, || {
            self.savings_input(store, user_id, month_start, as_of)
        });
        let budget = component("budget_adherence", user_id, || {
            self.budget_input(store, categorize, user_id, as_of)
        });
        let stability = component("income_stability", user_id, || {
            self.stability_input(store, user_id, month_start, as_of)
        });
        let expense = component("expense_control", user_id, || {
            self.expense_input(store, user_id, month_start, as_of)
        });
        let (emergency, provisional) = self
            .emergency_input(store, user_id, as_of)
            .unwrap_or_else(|e| {
                warn!(user_id, component = "emergency_fund", error = %e, "Component unavailable, scoring 0");
                (0.0, false)
            });

        let scores = ComponentValues {
            savings_rate: round1(savings),
            budget_adherence: round1(budget),
            income_stability: round1(stability),
            expense_control: round1(expense),
            emergency_fund: round1(emergency),
        };
        debug!(user_id, ?scores, "Health components computed");

        let total_score = composite_score(&scores, &self.config.weights);
        let health_level = tier(&self.config.tiers, total_score);
        let w = &self.config.weights;

        Ok(HealthReport {
            total_score,
            health_level,
            color: health_level.color().to_string(),
            components: HealthComponents {
                savings_rate: component_score(scores.savings_rate, w.savings_rate, "Savings Rate"),
                budget_adherence: component_score(
                    scores.budget_adherence,
                    w.budget_adherence,
                    "Budget Adherence",
                ),
                income_stability: component_score(
                    scores.income_stability,
                    w.income_stability,
                    "Income Stability",
                ),
                expense_control: component_score(
                    scores.expense_control,
                    w.expense_control,
                    "Expense Control",
                ),
                emergency_fund: ComponentScore {
                    provisional,
                    ..component_score(scores.emergency_fund, w.emergency_fund, "Emergency Fund")
                },
            },
            recommendations: recommendations(&self.config, &scores),
            calculated_at: Utc::now(),
        })
    }

    fn savings_input(
        &self,
        store: &dyn FinanceStore,
        user_id: i64,
        month_start: NaiveDate,
        as_of: NaiveDate,
    ) -> Result<f64> {
        let income = store.fetch_income_aggregate(user_id, month_start, as_of)?;
        let expenses: f64 = store
            .fetch_transactions_between(user_id, month_start, as_of)?
            .iter()
            .map(|tx| tx.amount)
            .sum();
        Ok(score_savings_rate(&self.config, income.total_income, expenses))
    }

    fn budget_input(
        &self,
        store: &dyn FinanceStore,
        categorize: &Categorize<'_>,
        user_id: i64,
        as_of: NaiveDate,
    ) -> Result<f64> {
        let mut percentages = Vec::new();
        for budget in store.fetch_budgets(user_id)? {
            if as_of < budget.start_date || as_of > budget.end_date {
                continue;
            }
            match budget_percentage(store, categorize, &budget) {
                Ok(pct) => percentages.push(pct),
                Err(Error::ComputationDegenerate(reason)) => {
                    debug!(budget_id = budget.id, reason = %reason, "Skipping budget");
                }
                Err(e) => warn!(budget_id = budget.id, error = %e, "Budget spending unavailable"),
            }
        }
        Ok(score_budget_adherence(&self.config, &percentages))
    }

    fn stability_input(
        &self,
        store: &dyn FinanceStore,
        user_id: i64,
        month_start: NaiveDate,
        as_of: NaiveDate,
    ) -> Result<f64> {
        let mut monthly = Vec::new();
        for back in 0..self.config.windows.income_months {
            let Some(start) = month_start.checked_sub_months(Months::new(back)) else {
                break;
            };
            let end = if back == 0 {
                as_of
            } else {
                start
                    .checked_add_months(Months::new(1))
                    .and_then(|next| next.pred_opt())
                    .unwrap_or(start)
            };
            monthly.push(store.fetch_income_aggregate(user_id, start, end)?.total_income);
        }
        Ok(score_income_stability(&self.config, &monthly))
    }

    fn expense_input(
        &self,
        store: &dyn FinanceStore,
        user_id: i64,
        month_start: NaiveDate,
        as_of: NaiveDate,
    ) -> Result<f64> {
        let previous_start = month_start - Duration::days(self.config.windows.prior_period_days);
        let previous_end = month_start - Duration::days(1);

        let current = average_amount(&store.fetch_transactions_between(user_id, month_start, as_of)?);
        let previous =
            average_amount(&store.fetch_transactions_between(user_id, previous_start, previous_end)?);

        Ok(score_expense_control(
            &self.config,
            current.unwrap_or(0.0),
            previous,
        ))
    }

    fn emergency_input(
        &self,
        store: &dyn FinanceStore,
        user_id: i64,
        as_of: NaiveDate,
    ) -> Result<(f64, bool)> {
        let since = as_of - Duration::days(self.config.windows.expense_lookback_days);
        let transactions = store.fetch_transactions_between(user_id, since, as_of)?;

        let mut by_month: BTreeMap<(i32, u32), f64> = BTreeMap::new();
        for tx in &transactions {
            *by_month.entry((tx.date.year(), tx.date.month())).or_insert(0.0) += tx.amount;
        }
        let average = if by_month.is_empty() {
            0.0
        } else {
            by_month.values().sum::<f64>() / by_month.len() as f64
        };

        let balance = store.fetch_savings_balance(user_id)?;
        Ok(score_emergency_fund(&self.config, average, balance))
    }
}

/// Percentage of a budget used
///
/// The store reports spending already filed under the budget's category;
/// charges stored without a category are added when `categorize` places
/// them there.
fn budget_percentage(
    store: &dyn FinanceStore,
    categorize: &Categorize<'_>,
    budget: &Budget,
) -> Result<f64> {
    if !budget.amount.is_finite() || budget.amount <= 0.0 {
        return Err(Error::ComputationDegenerate(format!(
            "budget {} has no positive amount",
            budget.id
        )));
    }

    let filed = store.fetch_budget_spending(budget.id)?.spent;
    let unfiled: f64 = store
        .fetch_transactions_between(budget.user_id, budget.start_date, budget.end_date)?
        .iter()
        .filter(|tx| tx.category.is_none())
        .filter(|tx| categorize(tx).as_deref() == Some(budget.category.as_str()))
        .map(|tx| tx.amount)
        .sum();

    Ok((filed + unfiled) / budget.amount * 100.0)
}

fn component<F>(name: &str, user_id: i64, compute: F) -> f64
where
    F: FnOnce() -> Result<f64>,
{
    compute().unwrap_or_else(|e| {
        warn!(user_id, component = name, error = %e, "Component unavailable, scoring 0");
        0.0
    })
}

fn component_score(score: f64, weight: f64, label: &str) -> ComponentScore {
    ComponentScore {
        score,
        weight,
        label: label.to_string(),
        provisional: false,
    }
}

fn average_amount(transactions: &[TransactionRecord]) -> Option<f64> {
    if transactions.is_empty() {
        return None;
    }
    Some(transactions.iter().map(|tx| tx.amount).sum::<f64>() / transactions.len() as f64)
}
