//! Spendwise CLI - Financial intelligence engine
//!
//! Usage:
//!   spendwise init                     Initialize database
//!   spendwise import --file CSV        Import expenses (or --kind incomes)
//!   spendwise categorize "desc" 12.50  Categorize a transaction
//!   spendwise subscriptions            Detect recurring charges
//!   spendwise health                   Financial health score

mod cli;
mod commands;

#[cfg(test)]
mod tests;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::*;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).compact().with_writer(std::io::stderr))
        .init();

    let config_dir = cli.config_dir.as_deref();
    let user = cli.user;

    match cli.command {
        Commands::Init => commands::cmd_init(&cli.db),
        Commands::Import { file, kind } => {
            let db = commands::open_db(&cli.db)?;
            let engine = commands::engine_for(&db, config_dir)?;
            commands::cmd_import(&db, &engine, &file, kind, user)
        }
        Commands::Budget { action } => {
            let db = commands::open_db(&cli.db)?;
            match action {
                None | Some(BudgetAction::List) => commands::cmd_budget_list(&db, user),
                Some(BudgetAction::Add {
                    category,
                    amount,
                    start,
                    end,
                }) => commands::cmd_budget_add(&db, user, &category, amount, start, end),
                Some(BudgetAction::Spending { id }) => commands::cmd_budget_spending(&db, id),
                Some(BudgetAction::Delete { id }) => commands::cmd_budget_delete(&db, id),
            }
        }
        Commands::Savings { balance } => {
            let db = commands::open_db(&cli.db)?;
            commands::cmd_savings(&db, user, balance)
        }
        Commands::Categorize {
            description,
            amount,
            merchant,
        } => {
            let engine = commands::open_engine(&cli.db, config_dir)?;
            commands::cmd_categorize(&engine, user, &description, amount, merchant.as_deref())
        }
        Commands::Suggest { text } => {
            let engine = commands::open_engine(&cli.db, config_dir)?;
            commands::cmd_suggest(&engine, &text)
        }
        Commands::Learn {
            description,
            from,
            to,
            amount,
            merchant,
        } => {
            let engine = commands::open_engine(&cli.db, config_dir)?;
            commands::cmd_learn(&engine, user, &description, &from, &to, amount, merchant)
        }
        Commands::Corrections => {
            let engine = commands::open_engine(&cli.db, config_dir)?;
            commands::cmd_corrections(&engine, user)
        }
        Commands::Subscriptions { days } => {
            let engine = commands::open_engine(&cli.db, config_dir)?;
            commands::cmd_subscriptions(&engine, user, days)
        }
        Commands::Alternatives { service, max_cost } => {
            let engine = commands::open_engine(&cli.db, config_dir)?;
            commands::cmd_alternatives(&engine, &service, max_cost)
        }
        Commands::Changes { days } => {
            let engine = commands::open_engine(&cli.db, config_dir)?;
            commands::cmd_changes(&engine, user, days)
        }
        Commands::Patterns { days } => {
            let engine = commands::open_engine(&cli.db, config_dir)?;
            commands::cmd_patterns(&engine, user, days)
        }
        Commands::Health => {
            let engine = commands::open_engine(&cli.db, config_dir)?;
            commands::cmd_health(&engine, user)
        }
    }
}
