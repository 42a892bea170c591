//! Core command implementations and shared utilities
//!
//! This module contains:
//! - `open_db` - Shared utility to open the database
//! - `open_engine` / `engine_for` - Build the engine over a database
//! - `print_json` - Print an engine result
//! - `cmd_init` - Initialize the database

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Serialize;
use spendwise_core::{Database, FinanceEngine};

pub fn open_db(db_path: &Path) -> Result<Database> {
    let path_str = db_path
        .to_str()
        .with_context(|| format!("Database path is not valid UTF-8: {}", db_path.display()))?;
    Database::new(path_str).context("Failed to open database")
}

/// Engine reading records and learning profiles from `db`
pub fn engine_for(db: &Database, config_dir: Option<&Path>) -> Result<FinanceEngine> {
    let db = Arc::new(db.clone());
    FinanceEngine::load(db.clone(), db, config_dir).context("Failed to load engine configuration")
}

pub fn open_engine(db_path: &Path, config_dir: Option<&Path>) -> Result<FinanceEngine> {
    let db = open_db(db_path)?;
    engine_for(&db, config_dir)
}

pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!(
        "{}",
        serde_json::to_string_pretty(value).context("Failed to serialize result")?
    );
    Ok(())
}

pub fn cmd_init(db_path: &Path) -> Result<()> {
    println!("Initializing database at {}...", db_path.display());

    open_db(db_path)?;

    println!("Database initialized successfully!");
    println!();
    println!("Next steps:");
    println!("  1. Import expenses: spendwise import --file expenses.csv");
    println!("  2. Import incomes:  spendwise import --file incomes.csv --kind incomes");
    println!("  3. Check your health score: spendwise health");

    Ok(())
}
