//! CLI argument definitions using clap
//!
//! This module contains all the clap structs and enums for parsing CLI arguments.
//! The actual command implementations are in the `commands` module.

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};

/// Spendwise - Financial intelligence for your transactions
#[derive(Parser)]
#[command(name = "spendwise")]
#[command(about = "Categorize spending, find subscriptions and score financial health", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Database path
    #[arg(long, default_value = "spendwise.db", global = true)]
    pub db: PathBuf,

    /// Directory with taxonomy.toml, services.toml and engine.toml overrides
    #[arg(long, global = true)]
    pub config_dir: Option<PathBuf>,

    /// User whose data the command reads and writes
    #[arg(long, default_value_t = 1, global = true)]
    pub user: i64,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// What a CSV file holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ImportKind {
    /// date,description,amount[,merchant][,category]
    Expenses,
    /// date,source,amount
    Incomes,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize the database
    Init,

    /// Import expenses or incomes from CSV
    Import {
        /// CSV file to import
        #[arg(short, long)]
        file: PathBuf,

        /// Contents of the file
        #[arg(short, long, value_enum, default_value = "expenses")]
        kind: ImportKind,
    },

    /// Manage budgets
    Budget {
        #[command(subcommand)]
        action: Option<BudgetAction>,
    },

    /// Show or set the tracked savings balance
    Savings {
        /// New balance (omit to show the current one)
        #[arg(allow_hyphen_values = true)]
        balance: Option<f64>,
    },

    /// Categorize a transaction description
    Categorize {
        /// Transaction description
        description: String,

        /// Transaction amount
        #[arg(allow_hyphen_values = true)]
        amount: f64,

        /// Merchant name, if known
        #[arg(short, long)]
        merchant: Option<String>,
    },

    /// Suggest categories for partially typed text
    Suggest {
        /// Text typed so far
        text: String,
    },

    /// Teach the classifier a corrected category
    Learn {
        /// Transaction description
        description: String,

        /// Category that was predicted
        #[arg(long)]
        from: String,

        /// Category that is correct
        #[arg(long)]
        to: String,

        /// Transaction amount
        #[arg(long, allow_hyphen_values = true)]
        amount: f64,

        /// Merchant name, if known
        #[arg(short, long)]
        merchant: Option<String>,
    },

    /// Show the correction log
    Corrections,

    /// Detect recurring charges
    Subscriptions {
        /// Look-back window in days
        #[arg(short, long)]
        days: Option<i64>,
    },

    /// Cheaper alternatives to a service
    Alternatives {
        /// Service name (e.g. netflix)
        service: String,

        /// Drop offers costing more than this
        #[arg(long)]
        max_cost: Option<f64>,
    },

    /// Compare subscriptions with the preceding window
    Changes {
        /// Window length in days
        #[arg(short, long)]
        days: Option<i64>,
    },

    /// Per-category spending breakdown
    Patterns {
        /// Look-back window in days
        #[arg(short, long)]
        days: Option<i64>,
    },

    /// Composite financial health score
    Health,
}

#[derive(Subcommand)]
pub enum BudgetAction {
    /// List budgets
    List,

    /// Add a category budget
    Add {
        /// Category the budget limits
        category: String,

        /// Budget amount
        amount: f64,

        /// First day of the budget period (YYYY-MM-DD)
        #[arg(long)]
        start: NaiveDate,

        /// Last day of the budget period (YYYY-MM-DD)
        #[arg(long)]
        end: NaiveDate,
    },

    /// Show spending against a budget
    Spending {
        /// Budget ID
        id: i64,
    },

    /// Delete a budget
    Delete {
        /// Budget ID
        id: i64,
    },
}
