//! SQLite record store with connection pooling and migrations
//!
//! This module is organized by domain:
//! - `transactions` - Expense import and window queries
//! - `incomes` - Income import and aggregates
//! - `budgets` - Budgets, budget spending and savings balances
//! - `learning` - Learning profiles and the correction log
//!
//! [`Database`] implements both [`crate::store::FinanceStore`] and
//! [`crate::learning::LearningStore`], so one file backs the whole engine.

use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::models::{BudgetSpending, IncomeAggregate, TransactionRecord};
use crate::store::FinanceStore;

mod budgets;
mod incomes;
mod learning;
mod transactions;

pub use transactions::ImportSummary;

pub type DbPool = Pool<SqliteConnectionManager>;
pub type DbConn = PooledConnection<SqliteConnectionManager>;

/// How long a connection waits on a locked database before failing
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Parse a stored timestamp (RFC 3339, or SQLite's `YYYY-MM-DD HH:MM:SS`)
pub(crate) fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| {
            chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").map(|dt| dt.and_utc())
        })
        .unwrap_or_else(|_| Utc::now())
}

/// Parse a stored `YYYY-MM-DD` date inside a row mapper
pub(crate) fn parse_date_column(s: &str, idx: usize) -> rusqlite::Result<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

/// Database wrapper with connection pooling
#[derive(Clone)]
pub struct Database {
    pool: DbPool,
    /// Path to the database file
    db_path: String,
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("db_path", &self.db_path)
            .finish()
    }
}

impl Database {
    /// Open (or create) a database file and run migrations
    pub fn new(path: &str) -> Result<Self> {
        let manager = SqliteConnectionManager::file(path).with_init(|conn| {
            conn.busy_timeout(BUSY_TIMEOUT)?;
            conn.execute_batch("PRAGMA foreign_keys = ON;")
        });
        let pool = Pool::builder().max_size(10).build(manager)?;

        let db = Self {
            pool,
            db_path: path.to_string(),
        };
        db.run_migrations()?;

        debug!(path = %db.db_path, "Database opened");
        Ok(db)
    }

    /// Get the path to the database file
    pub fn path(&self) -> &str {
        &self.db_path
    }

    /// Create a throwaway database (for testing)
    ///
    /// Uses a unique temporary file rather than `:memory:` so every pooled
    /// connection sees the same data.
    pub fn in_memory() -> Result<Self> {
        use std::sync::atomic::{AtomicU64, Ordering};
        static COUNTER: AtomicU64 = AtomicU64::new(0);

        let id = COUNTER.fetch_add(1, Ordering::SeqCst);
        let path = std::env::temp_dir().join(format!(
            "spendwise_test_{}_{}.db",
            std::process::id(),
            id
        ));

        // Remove any leftover file from an earlier run
        let _ = std::fs::remove_file(&path);

        let path = path
            .to_str()
            .ok_or_else(|| Error::Config("temporary directory is not valid UTF-8".to_string()))?
            .to_string();
        Self::new(&path)
    }

    /// Get a connection from the pool
    pub fn conn(&self) -> Result<DbConn> {
        Ok(self.pool.get()?)
    }

    /// Run database migrations
    fn run_migrations(&self) -> Result<()> {
        let conn = self.conn()?;

        conn.execute_batch(
            r#"
            -- WAL mode: readers don't block writers
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;

            -- Expense transactions (amount positive for money spent)
            CREATE TABLE IF NOT EXISTS transactions (
                id INTEGER PRIMARY KEY,
                user_id INTEGER NOT NULL,
                date DATE NOT NULL,
                description TEXT NOT NULL,
                merchant TEXT,
                amount REAL NOT NULL,
                category TEXT,
                import_hash TEXT UNIQUE,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            );

            CREATE INDEX IF NOT EXISTS idx_transactions_user_date ON transactions(user_id, date);
            CREATE INDEX IF NOT EXISTS idx_transactions_category ON transactions(user_id, category);

            -- Income entries
            CREATE TABLE IF NOT EXISTS incomes (
                id INTEGER PRIMARY KEY,
                user_id INTEGER NOT NULL,
                date DATE NOT NULL,
                source TEXT NOT NULL,
                amount REAL NOT NULL,
                import_hash TEXT UNIQUE,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            );

            CREATE INDEX IF NOT EXISTS idx_incomes_user_date ON incomes(user_id, date);

            -- Category budgets over an inclusive date range
            CREATE TABLE IF NOT EXISTS budgets (
                id INTEGER PRIMARY KEY,
                user_id INTEGER NOT NULL,
                category TEXT NOT NULL,
                amount REAL NOT NULL,
                start_date DATE NOT NULL,
                end_date DATE NOT NULL,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            );

            CREATE INDEX IF NOT EXISTS idx_budgets_user ON budgets(user_id);

            -- Learning profile: one row per (user, category)
            CREATE TABLE IF NOT EXISTS category_learning (
                user_id INTEGER NOT NULL,
                category TEXT NOT NULL,
                frequency INTEGER NOT NULL DEFAULT 0,
                accuracy REAL NOT NULL,
                updated_at DATETIME DEFAULT CURRENT_TIMESTAMP,
                PRIMARY KEY (user_id, category)
            );

            -- Append-only correction log
            CREATE TABLE IF NOT EXISTS category_corrections (
                id INTEGER PRIMARY KEY,
                user_id INTEGER NOT NULL,
                original_description TEXT NOT NULL,
                original_category TEXT NOT NULL,
                correct_category TEXT NOT NULL,
                amount REAL NOT NULL,
                merchant TEXT,
                created_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_corrections_user ON category_corrections(user_id);

            -- Tracked savings balance per user
            CREATE TABLE IF NOT EXISTS savings_balances (
                user_id INTEGER PRIMARY KEY,
                balance REAL NOT NULL,
                updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
            );
            "#,
        )?;

        info!("Database migrations complete");
        Ok(())
    }
}

impl FinanceStore for Database {
    fn fetch_transactions(&self, user_id: i64, since: NaiveDate) -> Result<Vec<TransactionRecord>> {
        self.transactions_since(user_id, since)
    }

    fn fetch_transactions_between(
        &self,
        user_id: i64,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<TransactionRecord>> {
        self.transactions_between(user_id, start, end)
    }

    fn fetch_budgets(&self, user_id: i64) -> Result<Vec<crate::models::Budget>> {
        self.list_budgets(user_id)
    }

    fn fetch_budget_spending(&self, budget_id: i64) -> Result<BudgetSpending> {
        self.budget_spending(budget_id)
    }

    fn fetch_income_aggregate(
        &self,
        user_id: i64,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<IncomeAggregate> {
        self.income_aggregate(user_id, start, end)
    }

    fn fetch_savings_balance(&self, user_id: i64) -> Result<Option<f64>> {
        self.savings_balance(user_id)
    }
}
