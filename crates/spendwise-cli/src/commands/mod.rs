//! CLI command implementations
//!
//! Commands are organized by domain:
//! - `core` - Init and shared utilities (open_db, open_engine, print_json)
//! - `import` - CSV import of expenses and incomes
//! - `budgets` - Budget and savings balance commands
//! - `classify` - Categorize, suggest, learn, corrections
//! - `subscriptions` - Detection, alternatives, change tracking
//! - `health` - Spending patterns and financial health

pub mod budgets;
pub mod classify;
pub mod core;
pub mod health;
pub mod import;
pub mod subscriptions;

// Re-export command functions for main.rs
pub use budgets::*;
pub use classify::*;
pub use core::*;
pub use health::*;
pub use import::*;
pub use subscriptions::*;
