//! Error types for Spendwise

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Database pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("CSV parsing error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Regex error: {0}")]
    Regex(#[from] regex::Error),

    #[error("Invalid configuration: {0}")]
    Config(String),

    /// A collaborator returned nothing usable (empty store, no connection)
    #[error("Data unavailable: {0}")]
    DataUnavailable(String),

    /// Caller-supplied value could not be interpreted (non-finite amount, bad date)
    #[error("Malformed input: {0}")]
    MalformedInput(String),

    /// A computation hit a degenerate denominator (zero income, zero budget)
    #[error("Degenerate computation: {0}")]
    ComputationDegenerate(String),

    #[error("Not found: {0}")]
    NotFound(String),
}

pub type Result<T> = std::result::Result<T, Error>;
