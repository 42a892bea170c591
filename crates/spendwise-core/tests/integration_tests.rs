//! Integration tests for spendwise-core
//!
//! These tests exercise the full import → detect / score workflow against
//! the SQLite store.

use std::sync::Arc;

use chrono::NaiveDate;
use spendwise_core::{
    health::health_level,
    import::{parse_incomes, parse_transactions},
    Correction, Database, FinanceEngine, Frequency, HealthLevel,
};

const USER: i64 = 1;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// Four months of expenses with one obvious subscription (Spotify) plus
/// irregular day-to-day spending
fn expenses_csv() -> &'static str {
    r#"date,description,amount,merchant,category
2024-01-15,SPOTIFY USA,9.99,Spotify,
2024-02-15,SPOTIFY USA,9.99,Spotify,
2024-03-15,SPOTIFY USA,9.99,Spotify,
2024-04-15,SPOTIFY USA,9.99,Spotify,
2024-01-03,WHOLE FOODS MARKET,84.12,Whole Foods,Food
2024-02-11,SHELL OIL 5521,41.00,Shell,Transportation
2024-03-22,BEST BUY 0042,249.99,Best Buy,Shopping
2024-04-02,CITY CINEMA,24.50,,Entertainment"#
}

fn engine_with(db: Database) -> (Arc<Database>, FinanceEngine) {
    let db = Arc::new(db);
    let engine = FinanceEngine::embedded(db.clone(), db.clone()).expect("engine should load");
    (db, engine)
}

fn import_expenses(db: &Database, csv: &str) {
    let txs = parse_transactions(csv.as_bytes(), USER).expect("Failed to parse CSV");
    db.import_transactions(&txs).expect("Failed to import");
}

// =============================================================================
// Subscription detection
// =============================================================================

#[test]
fn test_full_import_and_detect_workflow() {
    let db = Database::in_memory().expect("Failed to create database");
    let txs = parse_transactions(expenses_csv().as_bytes(), USER).unwrap();
    assert_eq!(txs.len(), 8);

    let summary = db.import_transactions(&txs).unwrap();
    assert_eq!(summary.inserted, 8);

    // Re-importing the same file adds nothing
    let again = db.import_transactions(&txs).unwrap();
    assert_eq!(again.inserted, 0);
    assert_eq!(again.skipped, 8);

    let (_, engine) = engine_with(db);
    let report = engine.detect_subscriptions_as_of(USER, Some(180), date(2024, 4, 30));

    assert!(report.error.is_none());
    assert_eq!(report.subscriptions.len(), 1);

    let spotify = &report.subscriptions[0];
    assert_eq!(spotify.service_name, "spotify");
    assert_eq!(spotify.frequency, Frequency::Monthly);
    assert_eq!(spotify.monthly_cost, 9.99);
    assert!(spotify.confidence >= 0.8);
    assert_eq!(spotify.occurrences, 4);

    assert_eq!(report.total_monthly_cost, 9.99);
    assert_eq!(report.analysis_period, "180 days");
}

#[test]
fn test_two_charges_are_not_a_subscription() {
    let db = Database::in_memory().unwrap();
    import_expenses(
        &db,
        "date,description,amount\n2024-03-01,NETFLIX.COM,15.49\n2024-04-01,NETFLIX.COM,15.49\n",
    );

    let (_, engine) = engine_with(db);
    let report = engine.detect_subscriptions_as_of(USER, None, date(2024, 4, 30));
    assert!(report.subscriptions.is_empty());
    assert!(report.insights.is_empty());
}

#[test]
fn test_detection_without_data() {
    let (_, engine) = engine_with(Database::in_memory().unwrap());
    let report = engine.detect_subscriptions_as_of(USER, None, date(2024, 4, 30));
    assert_eq!(
        report.message.as_deref(),
        Some("No expense data available for analysis")
    );
    assert!(report.error.is_none());
}

#[test]
fn test_subscription_changes_between_windows() {
    let db = Database::in_memory().unwrap();
    import_expenses(
        &db,
        r#"date,description,amount
2024-01-10,NETFLIX.COM,15.49
2024-02-10,NETFLIX.COM,15.49
2024-03-10,NETFLIX.COM,15.49
2024-04-05,SPOTIFY USA,9.99
2024-05-05,SPOTIFY USA,9.99
2024-06-05,SPOTIFY USA,9.99
2024-01-12,HULU,7.99
2024-02-12,HULU,7.99
2024-03-12,HULU,7.99
2024-04-12,HULU,9.99
2024-05-12,HULU,9.99
2024-06-12,HULU,9.99"#,
    );

    let (_, engine) = engine_with(db);
    let changes = engine.track_subscription_changes_as_of(USER, Some(90), date(2024, 6, 30));
    assert!(changes.error.is_none());

    let names = |subs: &[spendwise_core::SubscriptionRecord]| {
        subs.iter().map(|s| s.service_name.clone()).collect::<Vec<_>>()
    };
    assert_eq!(names(&changes.new_subscriptions), vec!["spotify"]);
    assert_eq!(names(&changes.cancelled_subscriptions), vec!["netflix"]);

    assert_eq!(changes.price_changes.len(), 1);
    let hulu = &changes.price_changes[0];
    assert_eq!(hulu.service_name, "hulu");
    assert_eq!(hulu.previous_amount, 7.99);
    assert_eq!(hulu.current_amount, 9.99);
    assert!(hulu.change_percent > 0.0);
}

// =============================================================================
// Classification and learning
// =============================================================================

#[test]
fn test_categorize_known_merchant() {
    let (_, engine) = engine_with(Database::in_memory().unwrap());
    let result = engine.categorize("MCDONALD'S #1234", 8.50, Some("McDonald's"), Some(USER));
    assert_eq!(result.category, "Food");
    assert!(result.error.is_none());
    assert!(result.reasoning.contains("Merchant"));
}

#[test]
fn test_learning_persists_and_never_lowers_corrected_category() {
    let (db, engine) = engine_with(Database::in_memory().unwrap());
    let correction = Correction {
        user_id: USER,
        original_description: "Blue Bottle".to_string(),
        original_category: "Shopping".to_string(),
        correct_category: "Food".to_string(),
        amount: 6.5,
        merchant: None,
    };

    let mut last = engine
        .categorize("Blue Bottle", 6.5, None, Some(USER))
        .all_scores["Food"];
    for _ in 0..5 {
        let outcome = engine.learn_from_correction(&correction);
        assert!(outcome.learned);
        assert_eq!(outcome.message, "Learned: Shopping -> Food");

        let score = engine
            .categorize("Blue Bottle", 6.5, None, Some(USER))
            .all_scores["Food"];
        assert!(score >= last);
        last = score;
    }

    // A second engine over the same file sees the same profile
    let (_, reopened) = engine_with((*db).clone());
    assert_eq!(reopened.corrections(USER).len(), 5);
    assert_eq!(
        reopened
            .categorize("Blue Bottle", 6.5, None, Some(USER))
            .all_scores["Food"],
        last
    );
}

// =============================================================================
// Spending patterns
// =============================================================================

#[test]
fn test_spending_patterns_fill_missing_categories() {
    let db = Database::in_memory().unwrap();
    import_expenses(&db, expenses_csv());

    let (_, engine) = engine_with(db);
    let patterns = engine.analyze_spending_patterns_as_of(USER, Some(120), date(2024, 4, 30));

    assert!(patterns.error.is_none());
    assert_eq!(patterns.total_spending, 439.57);
    assert_eq!(patterns.most_spent_category.as_deref(), Some("Shopping"));
    let counted: usize = patterns.category_breakdown.iter().map(|c| c.count).sum();
    assert_eq!(counted, 8);
}

// =============================================================================
// Financial health
// =============================================================================

#[test]
fn test_health_all_components_perfect() {
    let db = Database::in_memory().unwrap();

    let incomes = parse_incomes(
        r#"date,source,amount
2024-01-01,Salary,5000
2024-02-01,Salary,5000
2024-03-01,Salary,5000
2024-04-01,Salary,5000
2024-05-01,Salary,5000
2024-06-01,Salary,5000"#
            .as_bytes(),
        USER,
    )
    .unwrap();
    db.import_incomes(&incomes).unwrap();

    import_expenses(
        &db,
        r#"date,description,amount,merchant,category
2024-05-05,GROCER,150,,Food
2024-05-12,GROCER,150,,Food
2024-05-19,GROCER,150,,Food
2024-06-05,GROCER,100,,Food
2024-06-12,GROCER,100,,Food
2024-06-19,GROCER,100,,Food"#,
    );
    db.create_budget(USER, "Food", 1000.0, date(2024, 6, 1), date(2024, 6, 30))
        .unwrap();
    db.set_savings_balance(USER, 100_000.0).unwrap();

    let (_, engine) = engine_with(db);
    let outcome = engine.calculate_health_score_as_of(USER, date(2024, 6, 20));
    let report = outcome.report().expect("health report");

    assert_eq!(report.total_score, 100.0);
    assert_eq!(report.health_level, HealthLevel::Excellent);
    assert_eq!(report.color, "#10B981");
    assert!(!report.components.emergency_fund.provisional);
    assert!(report.recommendations.is_empty());
    assert!(report.components.iter().all(|c| c.score == 100.0));
}

#[test]
fn test_uncategorized_expenses_count_against_budget() {
    let db = Database::in_memory().unwrap();
    import_expenses(
        &db,
        r#"date,description,amount,merchant
2024-06-03,MCDONALD'S #1234,40.00,McDonald's
2024-06-10,MCDONALD'S #1234,40.00,McDonald's
2024-06-17,MCDONALD'S #1234,40.00,McDonald's"#,
    );
    let budget = db
        .create_budget(USER, "Food", 50.0, date(2024, 6, 1), date(2024, 6, 30))
        .unwrap();
    // Nothing is filed under Food in the store itself
    assert_eq!(db.budget_spending(budget).unwrap().spent, 0.0);

    let (_, engine) = engine_with(db);
    let report = engine
        .calculate_health_score_as_of(USER, date(2024, 6, 20))
        .report()
        .cloned()
        .expect("health report");

    // 120 of 50 spent: 240% → 50 - 140 × 0.3
    assert_eq!(report.components.budget_adherence.score, 8.0);
}

#[test]
fn test_health_without_savings_balance_is_provisional() {
    let db = Database::in_memory().unwrap();
    import_expenses(&db, "date,description,amount\n2024-06-03,RENT,1500\n");

    let (_, engine) = engine_with(db);
    let report = engine
        .calculate_health_score_as_of(USER, date(2024, 6, 20))
        .report()
        .cloned()
        .expect("health report");

    assert!(report.components.emergency_fund.provisional);
    // Spending with no income
    assert_eq!(report.components.savings_rate.score, 0.0);
    assert_eq!(report.health_level, health_level(report.total_score));
}
