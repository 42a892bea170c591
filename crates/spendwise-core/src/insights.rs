//! Insight generation
//!
//! Turns detected subscriptions and categorized spending into short,
//! human-readable warnings. Every rule is evaluated independently.

use std::collections::BTreeMap;

use crate::classifier::round2;
use crate::config::InsightConfig;
use crate::detect::UNKNOWN_SERVICE;
use crate::models::{
    CategorySpending, InsightKind, Priority, SpendingPatterns, SubscriptionInsight,
    SubscriptionRecord, TransactionRecord,
};

/// Category used for transactions the store never categorized
const UNCATEGORIZED: &str = "Other";

/// Insights about a set of detected subscriptions, most urgent first
pub fn subscription_insights(
    subscriptions: &[SubscriptionRecord],
    total_monthly_cost: f64,
    config: &InsightConfig,
) -> Vec<SubscriptionInsight> {
    let mut insights = Vec::new();
    if subscriptions.is_empty() {
        return insights;
    }

    if total_monthly_cost > config.high_monthly_total {
        insights.push(SubscriptionInsight {
            kind: InsightKind::CostWarning,
            priority: Priority::High,
            title: "High Subscription Costs".to_string(),
            description: format!("You spend ${:.2}/month on subscriptions", total_monthly_cost),
            recommendation: "Review and cancel unused subscriptions".to_string(),
        });
    }

    for sub in subscriptions
        .iter()
        .filter(|s| s.monthly_cost > config.expensive_monthly_cost)
    {
        insights.push(SubscriptionInsight {
            kind: InsightKind::ExpensiveSubscription,
            priority: Priority::Medium,
            title: "Expensive Subscription Detected".to_string(),
            description: format!("{} costs ${:.2}/month", sub.service_name, sub.monthly_cost),
            recommendation: "Look for cheaper alternatives or cancel if unused".to_string(),
        });
    }

    let unused = subscriptions
        .iter()
        .filter(|s| s.confidence < config.unused_confidence)
        .count();
    if unused > 0 {
        insights.push(SubscriptionInsight {
            kind: InsightKind::UnusedSubscriptions,
            priority: Priority::Medium,
            title: "Potentially Unused Subscriptions".to_string(),
            description: format!("{} subscriptions may no longer be used", unused),
            recommendation: "Review these subscriptions and cancel if unnecessary".to_string(),
        });
    }

    let mut by_category: BTreeMap<&str, usize> = BTreeMap::new();
    for sub in subscriptions
        .iter()
        .filter(|s| s.service_name != UNKNOWN_SERVICE)
    {
        *by_category.entry(sub.category.as_str()).or_insert(0) += 1;
    }
    let duplicates: Vec<&str> = by_category
        .into_iter()
        .filter(|&(_, n)| n > 1)
        .map(|(category, _)| category)
        .collect();
    if !duplicates.is_empty() {
        insights.push(SubscriptionInsight {
            kind: InsightKind::DuplicateServices,
            priority: Priority::Low,
            title: "Duplicate Service Categories".to_string(),
            description: format!("You have multiple services in: {}", duplicates.join(", ")),
            recommendation: "Consider consolidating or removing duplicates".to_string(),
        });
    }

    let entertainment = subscriptions
        .iter()
        .filter(|s| s.category == config.entertainment_category)
        .count();
    if entertainment > config.max_entertainment {
        insights.push(SubscriptionInsight {
            kind: InsightKind::Optimization,
            priority: Priority::Medium,
            title: "Streaming Service Optimization".to_string(),
            description: format!("You have {} streaming subscriptions", entertainment),
            recommendation: "Consider rotating services or using family plans".to_string(),
        });
    }

    // Stable: rules of equal priority keep evaluation order
    insights.sort_by(|a, b| b.priority.rank().cmp(&a.priority.rank()));
    insights
}

/// Per-category breakdown of spending, largest total first
pub fn category_breakdown(transactions: &[TransactionRecord]) -> Vec<CategorySpending> {
    let mut totals: BTreeMap<&str, (usize, f64)> = BTreeMap::new();
    for tx in transactions.iter().filter(|tx| tx.amount.is_finite()) {
        let category = tx.category.as_deref().unwrap_or(UNCATEGORIZED);
        let entry = totals.entry(category).or_insert((0, 0.0));
        entry.0 += 1;
        entry.1 += tx.amount;
    }

    let mut breakdown: Vec<CategorySpending> = totals
        .into_iter()
        .map(|(category, (count, total))| CategorySpending {
            category: category.to_string(),
            count,
            total: round2(total),
            avg_amount: round2(total / count as f64),
        })
        .collect();

    breakdown.sort_by(|a, b| b.total.total_cmp(&a.total));
    breakdown
}

/// Spending patterns over a set of transactions
pub fn spending_patterns(
    transactions: &[TransactionRecord],
    config: &InsightConfig,
) -> SpendingPatterns {
    let breakdown = category_breakdown(transactions);
    if breakdown.is_empty() {
        return SpendingPatterns {
            message: Some("No spending data available".to_string()),
            ..Default::default()
        };
    }

    let total_spending: f64 = breakdown.iter().map(|c| c.total).sum();
    let total_count: usize = breakdown.iter().map(|c| c.count).sum();

    // Ties keep the first (largest total) category
    let most_frequent = breakdown
        .iter()
        .fold(None::<&CategorySpending>, |best, c| match best {
            Some(b) if b.count >= c.count => Some(b),
            _ => Some(c),
        })
        .map(|c| c.category.clone());

    SpendingPatterns {
        total_categories: breakdown.len(),
        total_spending: round2(total_spending),
        most_spent_category: breakdown.first().map(|c| c.category.clone()),
        most_frequent_category: most_frequent,
        average_transaction_size: if total_count > 0 {
            round2(total_spending / total_count as f64)
        } else {
            0.0
        },
        insights: spending_insights(&breakdown, config),
        category_breakdown: breakdown,
        message: None,
        error: None,
    }
}

fn spending_insights(breakdown: &[CategorySpending], config: &InsightConfig) -> Vec<String> {
    let mut insights = Vec::new();

    let total: f64 = breakdown.iter().map(|c| c.total).sum();
    if let Some(top) = breakdown.first() {
        if total > 0.0 {
            let share = top.total / total * 100.0;
            if share > config.dominant_category_percent {
                insights.push(format!(
                    "{} accounts for {:.1}% of your spending",
                    top.category, share
                ));
            }
        }
    }

    let small = breakdown
        .iter()
        .filter(|c| c.avg_amount < config.small_average_amount)
        .count();
    if small > config.small_category_count {
        insights.push("You have many small transactions - consider bundling purchases".to_string());
    }

    for c in breakdown
        .iter()
        .filter(|c| c.count == 1 && c.total > config.large_one_time_amount)
    {
        insights.push(format!(
            "Large one-time expense in {}: ${:.2}",
            c.category, c.total
        ));
    }

    insights
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Frequency;
    use chrono::NaiveDate;

    fn sub(service: &str, category: &str, monthly_cost: f64, confidence: f64) -> SubscriptionRecord {
        let date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        SubscriptionRecord {
            service_name: service.to_string(),
            description_key: service.to_string(),
            frequency: Frequency::Monthly,
            expected_frequency: None,
            monthly_cost,
            annual_cost: monthly_cost * 12.0,
            occurrences: 4,
            average_amount: monthly_cost,
            most_common_amount: monthly_cost,
            category: category.to_string(),
            confidence,
            first_charge: date,
            last_charge: date,
            recent_charges: vec![],
        }
    }

    fn tx(category: Option<&str>, amount: f64) -> TransactionRecord {
        TransactionRecord {
            id: 0,
            user_id: 1,
            date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            description: "x".to_string(),
            merchant: None,
            amount,
            category: category.map(String::from),
        }
    }

    fn kinds(insights: &[SubscriptionInsight]) -> Vec<InsightKind> {
        insights.iter().map(|i| i.kind).collect()
    }

    #[test]
    fn test_no_subscriptions_no_insights() {
        assert!(subscription_insights(&[], 500.0, &InsightConfig::default()).is_empty());
    }

    #[test]
    fn test_all_rules_fire_and_sort_by_priority() {
        let subs = vec![
            sub("netflix", "Entertainment", 15.99, 0.9),
            sub("spotify", "Entertainment", 9.99, 0.9),
            sub("hulu", "Entertainment", 11.99, 0.9),
            sub("disney_plus", "Entertainment", 13.99, 0.9),
            sub("unknown", "Other", 180.0, 0.3),
        ];
        let insights = subscription_insights(&subs, 231.96, &InsightConfig::default());

        assert_eq!(
            kinds(&insights),
            vec![
                InsightKind::CostWarning,
                InsightKind::ExpensiveSubscription,
                InsightKind::UnusedSubscriptions,
                InsightKind::Optimization,
                InsightKind::DuplicateServices,
            ]
        );
        assert_eq!(insights[0].description, "You spend $231.96/month on subscriptions");
        assert_eq!(insights[1].description, "unknown costs $180.00/month");
        assert_eq!(insights[3].description, "You have 4 streaming subscriptions");
        assert_eq!(
            insights[4].description,
            "You have multiple services in: Entertainment"
        );
    }

    #[test]
    fn test_one_expensive_insight_per_subscription() {
        let subs = vec![
            sub("gym", "Healthcare", 60.0, 0.9),
            sub("internet", "Bills", 70.0, 0.9),
        ];
        let insights = subscription_insights(&subs, 130.0, &InsightConfig::default());
        assert_eq!(
            kinds(&insights),
            vec![
                InsightKind::ExpensiveSubscription,
                InsightKind::ExpensiveSubscription
            ]
        );
    }

    #[test]
    fn test_unknown_services_are_not_duplicates() {
        let subs = vec![
            sub("unknown", "Other", 10.0, 0.9),
            sub("unknown", "Other", 12.0, 0.9),
        ];
        assert!(subscription_insights(&subs, 22.0, &InsightConfig::default()).is_empty());
    }

    #[test]
    fn test_spending_patterns_empty() {
        let patterns = spending_patterns(&[], &InsightConfig::default());
        assert_eq!(patterns.message.as_deref(), Some("No spending data available"));
        assert_eq!(patterns.total_categories, 0);
    }

    #[test]
    fn test_spending_patterns_breakdown() {
        let txs = vec![
            tx(Some("Food"), 12.0),
            tx(Some("Food"), 8.0),
            tx(Some("Food"), 10.0),
            tx(Some("Bills"), 450.0),
            tx(None, 5.0),
        ];
        let patterns = spending_patterns(&txs, &InsightConfig::default());

        assert_eq!(patterns.total_categories, 3);
        assert_eq!(patterns.total_spending, 485.0);
        assert_eq!(patterns.most_spent_category.as_deref(), Some("Bills"));
        assert_eq!(patterns.most_frequent_category.as_deref(), Some("Food"));
        assert_eq!(patterns.average_transaction_size, 97.0);
        assert_eq!(patterns.category_breakdown[1].avg_amount, 10.0);

        assert!(patterns
            .insights
            .iter()
            .any(|i| i.starts_with("Bills accounts for 92.8%")));
        assert!(patterns
            .insights
            .contains(&"Large one-time expense in Bills: $450.00".to_string()));
    }

    #[test]
    fn test_many_small_categories() {
        let txs: Vec<_> = ["Food", "Transportation", "Entertainment", "Education"]
            .iter()
            .map(|c| tx(Some(c), 5.0))
            .collect();
        let patterns = spending_patterns(&txs, &InsightConfig::default());
        assert!(patterns
            .insights
            .iter()
            .any(|i| i.contains("many small transactions")));
    }
}
