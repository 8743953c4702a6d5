//! Tabular (CSV) import
//!
//! Bank exports vary in delimiter, encoding and header names. The reader
//! detects the delimiter, decodes UTF-8 with a Latin-1 fallback, and maps
//! headers through alias lists. Each row's signed amount decides direction.

use std::path::Path;

use chrono::NaiveDate;
use csv::ReaderBuilder;
use tracing::debug;

use crate::error::{Error, Result};
use crate::models::Direction;
use crate::normalize::{clean_amount, clean_text, parse_date};

/// Delimiters tried, in order
const DELIMITERS: &[u8] = b",;\t|";

const DATE_ALIASES: &[&str] = &[
    "fecha",
    "date",
    "fecha_transaccion",
    "transaction_date",
    "día",
    "dia",
];
const AMOUNT_ALIASES: &[&str] = &["monto", "amount", "importe", "total", "valor", "precio"];
const DESCRIPTION_ALIASES: &[&str] = &["descripcion", "descripción", "description", "concepto", "detalle", "detail"];
const CATEGORY_ALIASES: &[&str] = &["categoria", "categoría", "category", "tipo", "type", "rubro"];
const COUNTERPARTY_ALIASES: &[&str] = &[
    "emisor",
    "receptor",
    "proveedor",
    "supplier",
    "vendedor",
    "cliente",
];

/// One row of a tabular export, before categorization
#[derive(Debug, Clone, PartialEq)]
pub struct TabularRow {
    pub direction: Direction,
    /// Absolute value; always > 0
    pub amount: f64,
    pub occurred_at: Option<NaiveDate>,
    pub description: Option<String>,
    pub counterparty: Option<String>,
    /// Category column as given, unvalidated
    pub category: Option<String>,
}

/// Result of reading a tabular file
#[derive(Debug, Clone)]
pub struct TabularImport {
    pub rows: Vec<TabularRow>,
    /// Rows dropped for a missing, zero or unparseable amount
    pub skipped: usize,
    pub delimiter: char,
}

/// Column positions resolved from the header row
#[derive(Debug, Default, PartialEq)]
struct ColumnMap {
    date: Option<usize>,
    amount: Option<usize>,
    description: Option<usize>,
    category: Option<usize>,
    counterparty: Option<usize>,
}

impl ColumnMap {
    fn from_headers(headers: &csv::StringRecord) -> Self {
        let normalized: Vec<String> = headers
            .iter()
            .map(|h| h.trim().trim_start_matches('\u{feff}').to_lowercase())
            .collect();
        let find = |aliases: &[&str]| normalized.iter().position(|h| aliases.contains(&h.as_str()));
        Self {
            date: find(DATE_ALIASES),
            amount: find(AMOUNT_ALIASES),
            description: find(DESCRIPTION_ALIASES),
            category: find(CATEGORY_ALIASES),
            counterparty: find(COUNTERPARTY_ALIASES),
        }
    }
}

/// Decode bytes as UTF-8, falling back to Latin-1
pub fn decode_text(bytes: &[u8]) -> String {
    let bytes = bytes.strip_prefix(b"\xef\xbb\xbf").unwrap_or(bytes);
    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => {
            debug!("Input is not UTF-8, decoding as Latin-1");
            bytes.iter().map(|&b| b as char).collect()
        }
    }
}

/// First delimiter that yields more than one column and at least one row
pub fn detect_delimiter(text: &str) -> Option<u8> {
    DELIMITERS.iter().copied().find(|&delimiter| {
        let mut reader = ReaderBuilder::new()
            .delimiter(delimiter)
            .flexible(true)
            .from_reader(text.as_bytes());
        let columns = match reader.headers() {
            Ok(h) => h.len(),
            Err(_) => return false,
        };
        columns > 1 && reader.records().next().is_some_and(|r| r.is_ok())
    })
}

/// Read a tabular export from raw bytes
pub fn read_tabular(bytes: &[u8]) -> Result<TabularImport> {
    let text = decode_text(bytes);
    let delimiter = detect_delimiter(&text)
        .ok_or_else(|| Error::Import("Could not detect a delimiter with data rows".into()))?;

    let mut reader = ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());

    let columns = ColumnMap::from_headers(reader.headers()?);
    let amount_col = columns.amount.ok_or_else(|| {
        Error::Import(format!(
            "No amount column found (expected one of: {})",
            AMOUNT_ALIASES.join(", ")
        ))
    })?;

    let cell = |record: &csv::StringRecord, col: Option<usize>| -> Option<String> {
        col.and_then(|i| record.get(i)).and_then(|v| clean_text(Some(v)))
    };

    let mut rows = Vec::new();
    let mut skipped = 0;

    for result in reader.records() {
        let record = result?;

        let amount = match record.get(amount_col).and_then(clean_amount) {
            Some(a) if a != 0.0 => a,
            _ => {
                skipped += 1;
                continue;
            }
        };

        rows.push(TabularRow {
            direction: Direction::from_signed(amount),
            amount: amount.abs(),
            occurred_at: cell(&record, columns.date).and_then(|d| parse_date(&d)),
            description: cell(&record, columns.description),
            counterparty: cell(&record, columns.counterparty),
            category: cell(&record, columns.category),
        });
    }

    debug!(
        rows = rows.len(),
        skipped,
        delimiter = %(delimiter as char),
        "Read tabular file"
    );

    Ok(TabularImport {
        rows,
        skipped,
        delimiter: delimiter as char,
    })
}

/// Read a tabular export from disk
pub fn read_tabular_file(path: &Path) -> Result<TabularImport> {
    let bytes = std::fs::read(path)?;
    read_tabular(&bytes)
}
