// 💳 Transaction model + batch I/O
// Cleaned rows come in, categorized rows go out. Identity is a content hash,
// so reprocessing the same row always yields the same txn_id.

use crate::bank_category::BankCategoryMapper;
use crate::categorize::{CategoryAssignment, CategorySource};
use crate::error::{Error, Result};
use crate::merchant::MerchantExtractor;
use crate::normalize::normalize_text;
use chrono::NaiveDate;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use tracing::{debug, warn};

/// Columns every cleaned batch must carry
pub const REQUIRED_COLUMNS: &[&str] = &["date", "description", "amount_signed", "amount_spend"];

/// Columns read into typed fields; anything else rides along in `extra`
const KNOWN_COLUMNS: &[&str] = &[
    "date",
    "description",
    "amount_signed",
    "amount_spend",
    "bank_category",
    "source",
];

// ============================================================================
// TRANSACTION
// ============================================================================

/// One cleaned input row
///
/// `amount_spend` is derived from `amount_signed` and cannot be set directly,
/// so `amount_spend == max(0, -amount_signed)` always holds.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Transaction {
    pub date: NaiveDate,
    pub description: String,
    amount_signed: f64,
    amount_spend: f64,
    pub bank_category: Option<String>,
    /// Which input file this row came from
    pub source: Option<String>,
    /// Other input columns as (header, value), in input order
    pub extra: Vec<(String, String)>,
}

impl Transaction {
    pub fn new(date: NaiveDate, description: impl Into<String>, amount_signed: f64) -> Self {
        Transaction {
            date,
            description: description.into(),
            amount_signed,
            amount_spend: spend_from_signed(amount_signed),
            bank_category: None,
            source: None,
            extra: Vec::new(),
        }
    }

    /// Builder pattern: add bank category label
    pub fn with_bank_category(mut self, label: impl Into<String>) -> Self {
        self.bank_category = Some(label.into());
        self
    }

    /// Builder pattern: add source file identifier
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Builder pattern: carry an extra input column through to the output
    pub fn with_extra(mut self, column: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra.push((column.into(), value.into()));
        self
    }

    /// Value of an extra input column
    pub fn extra(&self, column: &str) -> Option<&str> {
        self.extra
            .iter()
            .find(|(c, _)| c == column)
            .map(|(_, v)| v.as_str())
    }

    /// Negative = money out, positive = credit/income
    pub fn amount_signed(&self) -> f64 {
        self.amount_signed
    }

    /// Money out as a positive number; 0 for credits
    pub fn amount_spend(&self) -> f64 {
        self.amount_spend
    }

    pub fn is_credit(&self) -> bool {
        self.amount_signed > 0.0
    }
}

fn spend_from_signed(amount_signed: f64) -> f64 {
    (-amount_signed).max(0.0)
}

// ============================================================================
// TRANSACTION IDENTITY
// ============================================================================

/// Content hash identifying a transaction for one-off overrides
///
/// SHA-256 over (ISO date, amount to 2 decimals, normalized description).
/// Each field is length-prefixed so a description containing the separator
/// cannot collide with a different split of the same bytes.
pub fn compute_txn_id(date: NaiveDate, amount_signed: f64, description_norm: &str) -> String {
    let mut hasher = Sha256::new();
    for field in [
        date.format("%Y-%m-%d").to_string(),
        format!("{:.2}", amount_signed),
        description_norm.to_string(),
    ] {
        hasher.update(format!("{}:{};", field.len(), field));
    }
    format!("{:x}", hasher.finalize())
}

// ============================================================================
// NORMALIZED + CATEGORIZED ROWS
// ============================================================================

/// Transaction plus the derived comparison fields
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizedTransaction {
    pub txn: Transaction,
    pub description_norm: String,
    pub merchant: String,
    pub bank_category_clean: String,
    pub txn_id: String,
}

impl NormalizedTransaction {
    pub fn from_transaction(
        txn: Transaction,
        extractor: &dyn MerchantExtractor,
        bank_mapper: &BankCategoryMapper,
    ) -> Self {
        let description_norm = normalize_text(&txn.description);
        let merchant = extractor.extract_merchant(&description_norm);
        let bank_category_clean = bank_mapper.map(txn.bank_category.as_deref());
        let txn_id = compute_txn_id(txn.date, txn.amount_signed, &description_norm);

        NormalizedTransaction {
            txn,
            description_norm,
            merchant,
            bank_category_clean,
            txn_id,
        }
    }
}

/// Final output row: normalized transaction + category decision
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategorizedTransaction {
    pub row: NormalizedTransaction,
    pub category: String,
    pub category_source: CategorySource,
}

impl CategorizedTransaction {
    pub fn new(row: NormalizedTransaction, assignment: CategoryAssignment) -> Self {
        CategorizedTransaction {
            row,
            category: assignment.category,
            category_source: assignment.source,
        }
    }

    pub fn date(&self) -> NaiveDate {
        self.row.txn.date
    }

    pub fn amount_spend(&self) -> f64 {
        self.row.txn.amount_spend()
    }
}

// ============================================================================
// BATCH READ
// ============================================================================

/// Load a cleaned batch from a CSV file
pub fn load_batch(path: &Path) -> Result<Vec<Transaction>> {
    let file = File::open(path)?;
    let source = path
        .file_name()
        .and_then(|n| n.to_str())
        .map(|s| s.to_string());
    let mut txns = read_batch(file)?;

    // Rows without their own source column inherit the file name
    if let Some(source) = source {
        for txn in txns.iter_mut().filter(|t| t.source.is_none()) {
            txn.source = Some(source.clone());
        }
    }

    Ok(txns)
}

/// Read a cleaned batch from any CSV reader
///
/// Fails before touching any row if a required column is missing.
/// Rows with an unparseable date or amount are skipped with a warning.
/// Bytes that are not valid UTF-8 are replaced, never fatal.
/// Columns beyond the known ones are kept on each row in `extra`.
pub fn read_batch<R: Read>(reader: R) -> Result<Vec<Transaction>> {
    let mut rdr = csv::ReaderBuilder::new().flexible(true).from_reader(reader);

    let raw_headers: Vec<String> = rdr
        .byte_headers()?
        .iter()
        .map(|h| String::from_utf8_lossy(h).trim().to_string())
        .collect();
    let headers: Vec<String> = raw_headers.iter().map(|h| h.to_lowercase()).collect();
    let column = |name: &str| headers.iter().position(|h| h == name);

    let missing: Vec<String> = REQUIRED_COLUMNS
        .iter()
        .filter(|c| column(**c).is_none())
        .map(|c| c.to_string())
        .collect();
    if !missing.is_empty() {
        return Err(Error::MissingColumns(missing));
    }

    // Checked above
    let date_idx = column("date").unwrap_or_default();
    let desc_idx = column("description").unwrap_or_default();
    let signed_idx = column("amount_signed").unwrap_or_default();
    let spend_idx = column("amount_spend").unwrap_or_default();
    let bank_idx = column("bank_category");
    let source_idx = column("source");
    let extra_cols: Vec<(usize, &String)> = raw_headers
        .iter()
        .enumerate()
        .filter(|(i, _)| !KNOWN_COLUMNS.contains(&headers[*i].as_str()))
        .collect();

    let mut txns = Vec::new();
    let mut skipped = 0usize;

    for (line, result) in rdr.byte_records().enumerate() {
        let record = result?;
        let line = line + 2;
        let field = |idx: usize| -> String {
            record
                .get(idx)
                .map(|b| String::from_utf8_lossy(b).trim().to_string())
                .unwrap_or_default()
        };

        if record.iter().any(|b| std::str::from_utf8(b).is_err()) {
            warn!(line, "Row contains invalid UTF-8; replacing bad bytes");
        }

        let Some(date) = parse_date(&field(date_idx)) else {
            warn!(line, value = %field(date_idx), "Skipping row with unparseable date");
            skipped += 1;
            continue;
        };
        let Some(amount_signed) = parse_amount(&field(signed_idx)) else {
            warn!(line, value = %field(signed_idx), "Skipping row with unparseable amount");
            skipped += 1;
            continue;
        };

        let mut txn = Transaction::new(date, field(desc_idx), amount_signed);

        if let Some(spend) = parse_amount(&field(spend_idx)) {
            if (spend - txn.amount_spend()).abs() > 0.005 {
                debug!(
                    line,
                    given = spend,
                    derived = txn.amount_spend(),
                    "amount_spend disagrees with amount_signed; using derived value"
                );
            }
        }

        if let Some(label) = bank_idx.map(&field).filter(|s| !s.is_empty()) {
            txn = txn.with_bank_category(label);
        }
        if let Some(source) = source_idx.map(&field).filter(|s| !s.is_empty()) {
            txn = txn.with_source(source);
        }
        for (idx, name) in &extra_cols {
            txn = txn.with_extra(name.as_str(), field(*idx));
        }

        txns.push(txn);
    }

    debug!(rows = txns.len(), skipped, "Read transaction batch");
    Ok(txns)
}

fn parse_date(s: &str) -> Option<NaiveDate> {
    // Accept "2024-03-05" and "2024-03-05 00:00:00"
    let day = s.get(..10).unwrap_or(s);
    NaiveDate::parse_from_str(day, "%Y-%m-%d").ok()
}

fn parse_amount(s: &str) -> Option<f64> {
    s.replace(',', "").parse::<f64>().ok().filter(|v| v.is_finite())
}

// ============================================================================
// BATCH WRITE
// ============================================================================

const OUTPUT_COLUMNS: &[&str] = &[
    "date",
    "description",
    "merchant",
    "amount_signed",
    "amount_spend",
    "category",
    "category_source",
    "bank_category",
    "bank_category_clean",
    "description_norm",
    "txn_id",
    "source",
];

/// Write a categorized batch as CSV
///
/// Fixed columns first, then every extra input column in first-seen order.
/// Rows without a given extra column get an empty cell.
pub fn write_categorized<W: Write>(writer: W, rows: &[CategorizedTransaction]) -> Result<()> {
    let mut extra_cols: Vec<&str> = Vec::new();
    for r in rows {
        for (name, _) in &r.row.txn.extra {
            if !extra_cols.contains(&name.as_str()) {
                extra_cols.push(name);
            }
        }
    }

    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(OUTPUT_COLUMNS.iter().copied().chain(extra_cols.iter().copied()))?;

    for r in rows {
        let txn = &r.row.txn;
        let mut record = vec![
            txn.date.format("%Y-%m-%d").to_string(),
            txn.description.clone(),
            r.row.merchant.clone(),
            format!("{:.2}", txn.amount_signed()),
            format!("{:.2}", txn.amount_spend()),
            r.category.clone(),
            r.category_source.as_str().to_string(),
            txn.bank_category.clone().unwrap_or_default(),
            r.row.bank_category_clean.clone(),
            r.row.description_norm.clone(),
            r.row.txn_id.clone(),
            txn.source.clone().unwrap_or_default(),
        ];
        record.extend(
            extra_cols
                .iter()
                .map(|name| txn.extra(name).unwrap_or_default().to_string()),
        );
        wtr.write_record(&record)?;
    }

    wtr.flush()?;
    Ok(())
}

// ============================================================================
// TESTS
// ============================================================================
