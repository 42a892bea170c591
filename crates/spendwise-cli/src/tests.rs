//! CLI command tests
//!
//! This module contains all tests for the CLI commands.

use std::io::Write;

use chrono::NaiveDate;
use clap::Parser;
use std::sync::Arc;

use spendwise_core::{Database, FinanceEngine, FinanceStore, LearningStore};

use crate::cli::{BudgetAction, Cli, Commands, ImportKind};
use crate::commands;

fn setup_test_db() -> Database {
    Database::in_memory().unwrap()
}

/// Engine over `db` using only the built-in configuration
fn embedded_engine(db: &Database) -> FinanceEngine {
    let db = Arc::new(db.clone());
    FinanceEngine::embedded(db.clone(), db).unwrap()
}

fn write_csv(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

// ========== Argument Parsing Tests ==========

#[test]
fn test_parse_global_flags() {
    let cli = Cli::try_parse_from([
        "spendwise", "--db", "test.db", "--user", "7", "-v", "health",
    ])
    .unwrap();
    assert_eq!(cli.db.to_str(), Some("test.db"));
    assert_eq!(cli.user, 7);
    assert!(cli.verbose);
    assert!(cli.config_dir.is_none());
    assert!(matches!(cli.command, Commands::Health));
}

#[test]
fn test_parse_defaults() {
    let cli = Cli::try_parse_from(["spendwise", "subscriptions"]).unwrap();
    assert_eq!(cli.db.to_str(), Some("spendwise.db"));
    assert_eq!(cli.user, 1);
    assert!(matches!(cli.command, Commands::Subscriptions { days: None }));
}

#[test]
fn test_parse_import_kind() {
    let cli = Cli::try_parse_from([
        "spendwise", "import", "--file", "in.csv", "--kind", "incomes",
    ])
    .unwrap();
    match cli.command {
        Commands::Import { kind, .. } => assert_eq!(kind, ImportKind::Incomes),
        _ => panic!("expected import"),
    }
}

#[test]
fn test_parse_budget_add_dates() {
    let cli = Cli::try_parse_from([
        "spendwise", "budget", "add", "Food", "400", "--start", "2024-06-01", "--end",
        "2024-06-30",
    ])
    .unwrap();
    match cli.command {
        Commands::Budget {
            action: Some(BudgetAction::Add { category, amount, start, end }),
        } => {
            assert_eq!(category, "Food");
            assert_eq!(amount, 400.0);
            assert_eq!(start, date(2024, 6, 1));
            assert_eq!(end, date(2024, 6, 30));
        }
        _ => panic!("expected budget add"),
    }

    assert!(Cli::try_parse_from([
        "spendwise", "budget", "add", "Food", "400", "--start", "June", "--end", "2024-06-30",
    ])
    .is_err());
}

#[test]
fn test_parse_learn() {
    let cli = Cli::try_parse_from([
        "spendwise", "learn", "UBER EATS", "--from", "Transportation", "--to", "Food",
        "--amount", "23.50",
    ])
    .unwrap();
    match cli.command {
        Commands::Learn { from, to, amount, merchant, .. } => {
            assert_eq!(from, "Transportation");
            assert_eq!(to, "Food");
            assert_eq!(amount, 23.5);
            assert!(merchant.is_none());
        }
        _ => panic!("expected learn"),
    }
}

// ========== Import Command Tests ==========

#[test]
fn test_cmd_import_expenses_and_duplicates() {
    let db = setup_test_db();
    let csv = write_csv(
        "date,description,amount\n2024-01-15,SPOTIFY USA,9.99\n2024-02-15,SPOTIFY USA,9.99\n",
    );

    let first = commands::import_file(&db, csv.path(), ImportKind::Expenses, 1).unwrap();
    assert_eq!(first.inserted, 2);

    let engine = embedded_engine(&db);
    assert!(commands::cmd_import(&db, &engine, csv.path(), ImportKind::Expenses, 1).is_ok());
    let txs = db.transactions_since(1, date(2024, 1, 1)).unwrap();
    assert_eq!(txs.len(), 2);
}

#[test]
fn test_cmd_import_categorizes_expenses_for_budgets() {
    let db = setup_test_db();
    let engine = embedded_engine(&db);
    let csv = write_csv(
        "date,description,amount,merchant,category\n\
         2024-06-03,MCDONALD'S #1234,40.00,McDonald's,\n\
         2024-06-04,SHELL OIL 5521,30.00,Shell,Transportation\n",
    );
    let id = db
        .create_budget(1, "Food", 50.0, date(2024, 6, 1), date(2024, 6, 30))
        .unwrap();

    commands::cmd_import(&db, &engine, csv.path(), ImportKind::Expenses, 1).unwrap();

    assert!(db.uncategorized_transactions(1).unwrap().is_empty());
    let spending = db.fetch_budget_spending(id).unwrap();
    assert_eq!(spending.spent, 40.0);
    assert_eq!(spending.percentage_used, 80.0);

    let txs = db.transactions_since(1, date(2024, 6, 1)).unwrap();
    let shell = txs.iter().find(|tx| tx.description.starts_with("SHELL")).unwrap();
    assert_eq!(shell.category.as_deref(), Some("Transportation"));
}

#[test]
fn test_cmd_import_incomes() {
    let db = setup_test_db();
    let csv = write_csv("date,source,amount\n2024-01-01,Salary,5000\n");

    let summary = commands::import_file(&db, csv.path(), ImportKind::Incomes, 1).unwrap();
    assert_eq!(summary.inserted, 1);
    let agg = db
        .income_aggregate(1, date(2024, 1, 1), date(2024, 1, 31))
        .unwrap();
    assert_eq!(agg.total_income, 5000.0);
}

#[test]
fn test_cmd_import_missing_file() {
    let db = setup_test_db();
    let engine = embedded_engine(&db);
    let result = commands::cmd_import(
        &db,
        &engine,
        std::path::Path::new("/nonexistent/expenses.csv"),
        ImportKind::Expenses,
        1,
    );
    assert!(result.is_err());
}

#[test]
fn test_cmd_import_malformed_csv() {
    let db = setup_test_db();
    let csv = write_csv("date,description,amount\nyesterday,COFFEE,4.50\n");
    let engine = embedded_engine(&db);
    assert!(commands::cmd_import(&db, &engine, csv.path(), ImportKind::Expenses, 1).is_err());
}

// ========== Budget Command Tests ==========

#[test]
fn test_cmd_budget_lifecycle() {
    let db = setup_test_db();
    commands::cmd_budget_add(&db, 1, "Food", 300.0, date(2024, 6, 1), date(2024, 6, 30)).unwrap();

    let budgets = db.list_budgets(1).unwrap();
    assert_eq!(budgets.len(), 1);
    let id = budgets[0].id;

    assert!(commands::cmd_budget_list(&db, 1).is_ok());
    assert!(commands::cmd_budget_spending(&db, id).is_ok());
    assert!(commands::cmd_budget_delete(&db, id).is_ok());
    assert!(commands::cmd_budget_delete(&db, id).is_err());
    assert!(commands::cmd_budget_spending(&db, id).is_err());
}

#[test]
fn test_cmd_budget_rejects_inverted_period() {
    let db = setup_test_db();
    let result = commands::cmd_budget_add(&db, 1, "Food", 300.0, date(2024, 6, 30), date(2024, 6, 1));
    assert!(result.is_err());
}

#[test]
fn test_cmd_savings() {
    let db = setup_test_db();
    assert!(commands::cmd_savings(&db, 1, None).is_ok());
    commands::cmd_savings(&db, 1, Some(2500.0)).unwrap();
    assert_eq!(db.savings_balance(1).unwrap(), Some(2500.0));
}

// ========== Engine Command Tests ==========

#[test]
fn test_cmd_learn_records_correction() {
    let db = setup_test_db();
    let engine = embedded_engine(&db);

    commands::cmd_learn(&engine, 1, "UBER EATS", "Transportation", "Food", 23.5, None).unwrap();
    assert_eq!(db.corrections(1).unwrap().len(), 1);
    assert_eq!(db.profile(1).unwrap().get("Food").unwrap().frequency, 1);
}

#[test]
fn test_cmd_learn_unknown_category_fails() {
    let db = setup_test_db();
    let engine = embedded_engine(&db);

    let result = commands::cmd_learn(&engine, 1, "UBER EATS", "Transportation", "Snacks", 23.5, None);
    assert!(result.is_err());
    assert!(db.corrections(1).unwrap().is_empty());
}

#[test]
fn test_engine_commands_on_empty_database() {
    let db = setup_test_db();
    let engine = embedded_engine(&db);

    assert!(commands::cmd_categorize(&engine, 1, "NETFLIX.COM", 15.49, None).is_ok());
    assert!(commands::cmd_suggest(&engine, "groc").is_ok());
    assert!(commands::cmd_corrections(&engine, 1).is_ok());
    assert!(commands::cmd_subscriptions(&engine, 1, None).is_ok());
    assert!(commands::cmd_alternatives(&engine, "netflix", Some(10.0)).is_ok());
    assert!(commands::cmd_changes(&engine, 1, Some(30)).is_ok());
    assert!(commands::cmd_patterns(&engine, 1, None).is_ok());
    assert!(commands::cmd_health(&engine, 1).is_ok());
}

#[test]
fn test_engine_with_missing_config_dir_uses_defaults() {
    let db = setup_test_db();
    let dir = tempfile::tempdir().unwrap();
    let engine = commands::engine_for(&db, Some(dir.path())).unwrap();
    assert!(engine.taxonomy().contains("Food"));
}

#[test]
fn test_cmd_init_creates_database() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("spendwise.db");
    commands::cmd_init(&path).unwrap();
    assert!(path.exists());
}
