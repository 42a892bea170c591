//! Import command implementation

use std::fs::File;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::debug;
use spendwise_core::{
    import::{parse_incomes, parse_transactions},
    Database, FinanceEngine, ImportSummary,
};

use crate::cli::ImportKind;

pub fn cmd_import(
    db: &Database,
    engine: &FinanceEngine,
    file: &Path,
    kind: ImportKind,
    user_id: i64,
) -> Result<()> {
    let summary = import_file(db, file, kind, user_id)?;

    println!(
        "Imported {} {} from {} ({} duplicates skipped)",
        summary.inserted,
        match kind {
            ImportKind::Expenses => "expenses",
            ImportKind::Incomes => "incomes",
        },
        file.display(),
        summary.skipped
    );

    if kind == ImportKind::Expenses {
        let categorized = categorize_imported(db, engine, user_id)?;
        if categorized > 0 {
            println!("Categorized {} uncategorized expenses", categorized);
        }
    }
    Ok(())
}

pub fn import_file(
    db: &Database,
    file: &Path,
    kind: ImportKind,
    user_id: i64,
) -> Result<ImportSummary> {
    debug!(file = %file.display(), ?kind, user_id, "Importing CSV");
    let csv_file =
        File::open(file).with_context(|| format!("Failed to open file: {}", file.display()))?;

    let summary = match kind {
        ImportKind::Expenses => {
            let txs = parse_transactions(csv_file, user_id).context("Failed to parse CSV")?;
            db.import_transactions(&txs)
                .context("Failed to store transactions")?
        }
        ImportKind::Incomes => {
            let incomes = parse_incomes(csv_file, user_id).context("Failed to parse CSV")?;
            db.import_incomes(&incomes).context("Failed to store incomes")?
        }
    };

    Ok(summary)
}

/// Store the classifier's category on every expense imported without one
pub fn categorize_imported(db: &Database, engine: &FinanceEngine, user_id: i64) -> Result<usize> {
    let mut pending = db
        .uncategorized_transactions(user_id)
        .context("Failed to load uncategorized expenses")?;
    if pending.is_empty() {
        return Ok(0);
    }

    engine.assign_categories(user_id, &mut pending);
    db.update_transaction_categories(&pending)
        .context("Failed to store categories")
}
