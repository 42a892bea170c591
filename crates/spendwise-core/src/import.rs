//! CSV import of expenses and incomes
//!
//! Expenses: `date,description,amount[,merchant][,category]`
//! Incomes:  `date,source,amount`
//!
//! Columns are located by header name (case-insensitive), so extra columns
//! and any column order are accepted. Expense amounts are positive for money
//! spent.

use std::io::Read;

use chrono::NaiveDate;
use csv::{ReaderBuilder, StringRecord};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::error::{Error, Result};
use crate::models::{NewIncome, NewTransaction};

/// Parse an expense CSV for a user
pub fn parse_transactions<R: Read>(reader: R, user_id: i64) -> Result<Vec<NewTransaction>> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = rdr.headers()?.clone();
    let date_col = require_column(&headers, "date")?;
    let description_col = require_column(&headers, "description")?;
    let amount_col = require_column(&headers, "amount")?;
    let merchant_col = find_column(&headers, "merchant");
    let category_col = find_column(&headers, "category");

    let mut transactions = Vec::new();
    for (index, result) in rdr.records().enumerate() {
        let record = result?;
        let row = index + 2;

        let date = parse_date(field(&record, date_col, "date", row)?)?;
        let description = field(&record, description_col, "description", row)?.to_string();
        let amount = parse_amount(field(&record, amount_col, "amount", row)?)?;
        let merchant = optional_field(&record, merchant_col);
        let category = optional_field(&record, category_col);

        let import_hash = generate_hash(user_id, &date, &description, amount);
        transactions.push(NewTransaction {
            user_id,
            date,
            description,
            merchant,
            amount,
            category,
            import_hash,
        });
    }

    debug!("Parsed {} transactions", transactions.len());
    Ok(transactions)
}

/// Parse an income CSV for a user
pub fn parse_incomes<R: Read>(reader: R, user_id: i64) -> Result<Vec<NewIncome>> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = rdr.headers()?.clone();
    let date_col = require_column(&headers, "date")?;
    let source_col = require_column(&headers, "source")?;
    let amount_col = require_column(&headers, "amount")?;

    let mut incomes = Vec::new();
    for (index, result) in rdr.records().enumerate() {
        let record = result?;
        let row = index + 2;

        let date = parse_date(field(&record, date_col, "date", row)?)?;
        let source = field(&record, source_col, "source", row)?.to_string();
        let amount = parse_amount(field(&record, amount_col, "amount", row)?)?;

        let import_hash = generate_hash(user_id, &date, &source, amount);
        incomes.push(NewIncome {
            user_id,
            date,
            source,
            amount,
            import_hash,
        });
    }

    debug!("Parsed {} incomes", incomes.len());
    Ok(incomes)
}

fn find_column(headers: &StringRecord, name: &str) -> Option<usize> {
    headers.iter().position(|h| h.eq_ignore_ascii_case(name))
}

fn require_column(headers: &StringRecord, name: &str) -> Result<usize> {
    find_column(headers, name)
        .ok_or_else(|| Error::MalformedInput(format!("Missing '{}' column", name)))
}

fn field<'r>(record: &'r StringRecord, col: usize, name: &str, row: usize) -> Result<&'r str> {
    record
        .get(col)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| Error::MalformedInput(format!("Missing {} on row {}", name, row)))
}

fn optional_field(record: &StringRecord, col: Option<usize>) -> Option<String> {
    col.and_then(|c| record.get(c))
        .filter(|v| !v.is_empty())
        .map(String::from)
}

/// Dedup hash over the identifying fields of a row
fn generate_hash(user_id: i64, date: &NaiveDate, text: &str, amount: f64) -> String {
    let mut hasher = Sha256::new();
    hasher.update(user_id.to_be_bytes());
    hasher.update(date.to_string().as_bytes());
    hasher.update(text.as_bytes());
    hasher.update(amount.to_be_bytes());
    hex::encode(hasher.finalize())
}

/// Parse a date string in various common formats
pub fn parse_date(s: &str) -> Result<NaiveDate> {
    let s = s.trim();

    let formats = [
        "%Y-%m-%d", // 2024-01-15
        "%m/%d/%Y", // 01/15/2024
        "%m/%d/%y", // 01/15/24
        "%m-%d-%Y", // 01-15-2024
    ];

    for fmt in formats {
        if let Ok(date) = NaiveDate::parse_from_str(s, fmt) {
            return Ok(date);
        }
    }

    Err(Error::MalformedInput(format!("Unable to parse date: {}", s)))
}

/// Parse an amount string, handling currency symbols and commas
pub fn parse_amount(s: &str) -> Result<f64> {
    let cleaned: String = s
        .trim()
        .replace(['$', ',', ' '], "")
        .replace('(', "-")
        .replace(')', "");

    match cleaned.parse::<f64>() {
        Ok(amount) if amount.is_finite() => Ok(amount),
        _ => Err(Error::MalformedInput(format!("Unable to parse amount: {}", s))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_date() {
        let expected = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
        assert_eq!(parse_date("2024-01-15").unwrap(), expected);
        assert_eq!(parse_date("01/15/2024").unwrap(), expected);
        assert!(matches!(
            parse_date("next tuesday"),
            Err(Error::MalformedInput(_))
        ));
    }

    #[test]
    fn test_parse_amount() {
        assert_eq!(parse_amount("$1,234.56").unwrap(), 1234.56);
        assert_eq!(parse_amount("(100.00)").unwrap(), -100.00);
        assert!(parse_amount("NaN").is_err());
        assert!(parse_amount("twelve").is_err());
    }

    #[test]
    fn test_parse_transactions() {
        let csv = "Date,Description,Amount,Merchant,Category
2024-01-15,SPOTIFY USA,9.99,Spotify,
2024-01-16,Lunch at McDonalds,12.50,McDonald's,Food";

        let txs = parse_transactions(csv.as_bytes(), 7).unwrap();
        assert_eq!(txs.len(), 2);
        assert_eq!(txs[0].user_id, 7);
        assert_eq!(txs[0].merchant.as_deref(), Some("Spotify"));
        assert_eq!(txs[0].category, None);
        assert_eq!(txs[1].category.as_deref(), Some("Food"));
        assert_eq!(txs[1].amount, 12.5);
        assert_eq!(txs[0].import_hash.len(), 64);
        assert_ne!(txs[0].import_hash, txs[1].import_hash);
    }

    #[test]
    fn test_parse_transactions_minimal_columns() {
        let csv = "amount,description,date\n4.50,COFFEE,01/02/2024\n";
        let txs = parse_transactions(csv.as_bytes(), 1).unwrap();
        assert_eq!(txs.len(), 1);
        assert_eq!(txs[0].description, "COFFEE");
        assert!(txs[0].merchant.is_none());
    }

    #[test]
    fn test_parse_transactions_missing_column() {
        let csv = "date,amount\n2024-01-01,5.00\n";
        assert!(matches!(
            parse_transactions(csv.as_bytes(), 1),
            Err(Error::MalformedInput(_))
        ));
    }

    #[test]
    fn test_hash_depends_on_user() {
        let csv = "date,description,amount\n2024-01-01,RENT,1500\n";
        let a = parse_transactions(csv.as_bytes(), 1).unwrap();
        let b = parse_transactions(csv.as_bytes(), 2).unwrap();
        assert_ne!(a[0].import_hash, b[0].import_hash);
    }

    #[test]
    fn test_parse_incomes() {
        let csv = "date,source,amount\n2024-01-01,Salary,5000\n2024-01-15,Freelance,$750.00\n";
        let incomes = parse_incomes(csv.as_bytes(), 1).unwrap();
        assert_eq!(incomes.len(), 2);
        assert_eq!(incomes[1].source, "Freelance");
        assert_eq!(incomes[1].amount, 750.0);
    }
}
