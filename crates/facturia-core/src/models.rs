//! Domain models for FacturIA

use std::path::Path;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Whether money came in or went out
///
/// The direction selects which category vocabulary applies. Amounts are always
/// stored positive; the direction carries the sign.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Income,
    Expense,
}

impl Direction {
    /// Wire token used by the classification backend and the database
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Income => "ingreso",
            Self::Expense => "egreso",
        }
    }

    pub fn all() -> &'static [Direction] {
        &[Self::Income, Self::Expense]
    }

    /// Direction implied by the sign of a tabular amount
    pub fn from_signed(amount: f64) -> Self {
        if amount < 0.0 {
            Self::Expense
        } else {
            Self::Income
        }
    }
}

impl std::str::FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "ingreso" | "income" => Ok(Self::Income),
            "egreso" | "expense" => Ok(Self::Expense),
            _ => Err(format!("Unknown direction: {}", s)),
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Provenance of a record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Pdf,
    Image,
    Tabular,
}

impl Source {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Image => "image",
            Self::Tabular => "tabular",
        }
    }
}

impl std::str::FromStr for Source {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pdf" => Ok(Self::Pdf),
            "image" | "imagen" => Ok(Self::Image),
            "tabular" | "csv" => Ok(Self::Tabular),
            _ => Err(format!("Unknown source: {}", s)),
        }
    }
}

impl std::fmt::Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A validated transaction, ready to persist
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub direction: Direction,
    /// Member of the direction's vocabulary
    pub category: String,
    /// Always > 0
    pub amount: f64,
    pub occurred_at: NaiveDate,
    pub counterparty: Option<String>,
    pub description: Option<String>,
    pub receipt_number: Option<String>,
    pub source: Source,
    /// Name of the attachment the record came from
    pub source_file: Option<String>,
    pub ai_processed: bool,
    /// Present only when `ai_processed`
    pub confidence: Option<f64>,
    pub needs_review: bool,
    /// Non-empty whenever `needs_review` is set
    pub review_reason: Option<String>,
    pub manually_edited: bool,
}

impl TransactionRecord {
    /// Flag the record for human review, accumulating reasons
    pub fn flag_review(&mut self, reason: impl Into<String>) {
        let reason = reason.into();
        self.needs_review = true;
        self.review_reason = Some(match self.review_reason.take() {
            Some(existing) if !existing.is_empty() => format!("{}; {}", existing, reason),
            _ => reason,
        });
    }

    /// Amount with the direction's sign applied
    pub fn signed_amount(&self) -> f64 {
        match self.direction {
            Direction::Income => self.amount,
            Direction::Expense => -self.amount,
        }
    }
}

/// A persisted transaction
#[derive(Debug, Clone, Serialize)]
pub struct Transaction {
    pub id: i64,
    #[serde(flatten)]
    pub record: TransactionRecord,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A human correction to a stored transaction
///
/// Only the fields that are `Some` are changed. Applying an edit always marks
/// the transaction as manually edited.
#[derive(Debug, Clone, Default)]
pub struct TransactionEdit {
    pub direction: Option<Direction>,
    pub category: Option<String>,
    pub amount: Option<f64>,
    pub occurred_at: Option<NaiveDate>,
    pub counterparty: Option<String>,
    pub description: Option<String>,
    pub receipt_number: Option<String>,
    /// Keep the record in the review queue with this reason
    pub review_reason: Option<String>,
}

impl TransactionEdit {
    pub fn is_empty(&self) -> bool {
        self.direction.is_none()
            && self.category.is_none()
            && self.amount.is_none()
            && self.occurred_at.is_none()
            && self.counterparty.is_none()
            && self.description.is_none()
            && self.receipt_number.is_none()
            && self.review_reason.is_none()
    }
}

/// Kind of an incoming attachment, decided by file extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachmentKind {
    Pdf,
    Image,
    Tabular,
}

impl AttachmentKind {
    pub fn source(&self) -> Source {
        match self {
            Self::Pdf => Source::Pdf,
            Self::Image => Source::Image,
            Self::Tabular => Source::Tabular,
        }
    }
}

/// Raw attachment as delivered by the mailbox source
#[derive(Debug, Clone)]
pub struct Attachment {
    pub file_name: String,
    pub bytes: Vec<u8>,
    pub sender: Option<String>,
    pub subject: Option<String>,
    /// Text already extracted from the document, if any
    pub extracted_text: Option<String>,
}

impl Attachment {
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            bytes,
            sender: None,
            subject: None,
            extracted_text: None,
        }
    }

    pub fn with_email(mut self, sender: Option<String>, subject: Option<String>) -> Self {
        self.sender = sender;
        self.subject = subject;
        self
    }

    /// Read an attachment from disk
    pub fn from_path(path: &Path) -> std::io::Result<Self> {
        let bytes = std::fs::read(path)?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());
        Ok(Self::new(file_name, bytes))
    }

    fn extension(&self) -> Option<String> {
        Path::new(&self.file_name)
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
    }

    /// `None` for unsupported files
    pub fn kind(&self) -> Option<AttachmentKind> {
        match self.extension()?.as_str() {
            "pdf" => Some(AttachmentKind::Pdf),
            "png" | "jpg" | "jpeg" | "webp" => Some(AttachmentKind::Image),
            "csv" | "tsv" | "txt" => Some(AttachmentKind::Tabular),
            _ => None,
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self.extension().as_deref() {
            Some("pdf") => "application/pdf",
            Some("png") => "image/png",
            Some("jpg") | Some("jpeg") => "image/jpeg",
            Some("webp") => "image/webp",
            Some("csv") => "text/csv",
            _ => "application/octet-stream",
        }
    }

    /// Context line handed to the classifier ("Archivo: ..., Email: ...")
    pub fn context(&self) -> String {
        let mut context = format!("Archivo: {}", self.file_name);
        if let Some(ref subject) = self.subject {
            context.push_str(&format!(", Email: {}", subject));
        }
        if let Some(ref sender) = self.sender {
            context.push_str(&format!(", De: {}", sender));
        }
        context
    }
}

/// Registry entry for a source file that has been handled
#[derive(Debug, Clone, Serialize)]
pub struct ProcessedFile {
    pub id: i64,
    pub file_name: String,
    pub file_hash: String,
    pub kind: String,
    pub transactions_extracted: i64,
    pub success: bool,
    pub error_message: Option<String>,
    pub processed_at: DateTime<Utc>,
}

/// Totals for one category
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CategoryTotal {
    pub direction: Direction,
    pub category: String,
    pub count: i64,
    pub total: f64,
}

/// Ledger-wide totals
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct LedgerSummary {
    pub total_income: f64,
    pub total_expense: f64,
    pub balance: f64,
    pub income_count: i64,
    pub expense_count: i64,
    pub needs_review_count: i64,
    pub by_category: Vec<CategoryTotal>,
}

impl LedgerSummary {
    /// Build totals from a set of records
    pub fn from_records<'a>(records: impl IntoIterator<Item = &'a TransactionRecord>) -> Self {
        let mut summary = Self::default();
        let mut by_category: Vec<CategoryTotal> = Vec::new();

        for record in records {
            match record.direction {
                Direction::Income => {
                    summary.total_income += record.amount;
                    summary.income_count += 1;
                }
                Direction::Expense => {
                    summary.total_expense += record.amount;
                    summary.expense_count += 1;
                }
            }
            if record.needs_review {
                summary.needs_review_count += 1;
            }

            match by_category
                .iter_mut()
                .find(|c| c.direction == record.direction && c.category == record.category)
            {
                Some(entry) => {
                    entry.count += 1;
                    entry.total += record.amount;
                }
                None => by_category.push(CategoryTotal {
                    direction: record.direction,
                    category: record.category.clone(),
                    count: 1,
                    total: record.amount,
                }),
            }
        }

        summary.total_income = round2(summary.total_income);
        summary.total_expense = round2(summary.total_expense);
        summary.balance = round2(summary.total_income - summary.total_expense);
        for entry in &mut by_category {
            entry.total = round2(entry.total);
        }
        by_category.sort_by(|a, b| {
            b.total
                .partial_cmp(&a.total)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        summary.by_category = by_category;
        summary
    }
}

/// Round to cents
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
