//! Spendwise Core Library
//!
//! Financial intelligence for the Spendwise personal finance tracker:
//! - Category classification with per-user learning from corrections
//! - Recurring charge (subscription) detection, insights and change tracking
//! - Spending pattern analysis
//! - Composite financial health scoring
//! - CSV import and a SQLite reference store

pub mod classifier;
pub mod config;
pub mod db;
pub mod detect;
pub mod engine;
pub mod error;
pub mod health;
pub mod import;
pub mod insights;
pub mod learning;
pub mod models;
pub mod normalize;
pub mod store;
pub mod taxonomy;

pub use classifier::CategoryClassifier;
pub use config::EngineConfig;
pub use db::{Database, ImportSummary};
pub use detect::SubscriptionDetector;
pub use engine::FinanceEngine;
pub use error::{Error, Result};
pub use health::HealthScorer;
pub use learning::{CategoryStats, LearningProfile, LearningStore, MemoryLearningStore};
pub use models::*;
pub use normalize::Normalizer;
pub use store::FinanceStore;
pub use taxonomy::{ServiceCatalog, Taxonomy};
