//! Keyword categorization for tabular transactions
//!
//! Tabular rows already carry direction and amount; only the category is
//! missing or unreliable. A row whose category is a valid vocabulary member
//! keeps it. Otherwise the lowercased description and counterparty are matched
//! against ordered keyword tables, with the direction's catch-all as fallback.
//!
//! Table order is the tie-break: "pago luz supermercado" matches both
//! `factura_servicios` and `supermercado`, and the category declared first
//! in config wins. A fallback is silent: it does not flag the row for review.

use chrono::NaiveDate;
use regex::Regex;
use tracing::{debug, info};

use crate::config::KeywordTables;
use crate::error::Result;
use crate::import::TabularRow;
use crate::models::{Direction, Source, TransactionRecord};
use crate::normalize::clean_text;
use crate::vocabulary::Vocabulary;

/// One category's keywords, as configured
#[derive(Debug, Clone, PartialEq)]
pub struct KeywordRule {
    pub category: String,
    pub keywords: Vec<String>,
}

/// Keyword rule with its word-boundary pattern compiled
#[derive(Debug, Clone)]
struct CompiledRule {
    category: String,
    pattern: Regex,
}

impl CompiledRule {
    fn compile(rule: &KeywordRule) -> Result<Option<Self>> {
        if rule.keywords.is_empty() {
            return Ok(None);
        }
        let alternation = rule
            .keywords
            .iter()
            .map(|k| regex::escape(k))
            .collect::<Vec<_>>()
            .join("|");
        let pattern = Regex::new(&format!(r"\b(?:{})\b", alternation))?;
        Ok(Some(Self {
            category: rule.category.clone(),
            pattern,
        }))
    }
}

/// Where a row's final category came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CategorySource {
    /// The row's own category was already valid
    Existing,
    Keyword,
    /// No keyword matched; the catch-all was used
    Fallback,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Categorization {
    pub category: String,
    pub source: CategorySource,
}

/// Counts from a batch run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CategorizeStats {
    pub total: usize,
    pub existing: usize,
    pub by_keyword: usize,
    pub fallback: usize,
}

impl CategorizeStats {
    fn record(&mut self, source: CategorySource) {
        self.total += 1;
        match source {
            CategorySource::Existing => self.existing += 1,
            CategorySource::Keyword => self.by_keyword += 1,
            CategorySource::Fallback => self.fallback += 1,
        }
    }
}

/// Keyword-based categorizer
#[derive(Debug, Clone)]
pub struct Categorizer {
    vocabulary: Vocabulary,
    income: Vec<CompiledRule>,
    expense: Vec<CompiledRule>,
}

impl Categorizer {
    pub fn new(vocabulary: Vocabulary, tables: &KeywordTables) -> Result<Self> {
        let compile = |rules: &[KeywordRule]| -> Result<Vec<CompiledRule>> {
            let mut compiled = Vec::new();
            for rule in rules {
                if let Some(c) = CompiledRule::compile(rule)? {
                    compiled.push(c);
                }
            }
            Ok(compiled)
        };
        Ok(Self {
            income: compile(&tables.income)?,
            expense: compile(&tables.expense)?,
            vocabulary,
        })
    }

    pub fn vocabulary(&self) -> &Vocabulary {
        &self.vocabulary
    }

    fn rules(&self, direction: Direction) -> &[CompiledRule] {
        match direction {
            Direction::Income => &self.income,
            Direction::Expense => &self.expense,
        }
    }

    /// Pick a category for one row
    pub fn categorize(
        &self,
        direction: Direction,
        existing: Option<&str>,
        description: Option<&str>,
        counterparty: Option<&str>,
    ) -> Categorization {
        if let Some(existing) = existing {
            if self.vocabulary.contains(direction, existing) {
                return Categorization {
                    category: existing.trim().to_lowercase(),
                    source: CategorySource::Existing,
                };
            }
        }

        let text = format!(
            "{} {}",
            description.unwrap_or_default(),
            counterparty.unwrap_or_default()
        )
        .to_lowercase();

        if let Some(rule) = self
            .rules(direction)
            .iter()
            .find(|rule| rule.pattern.is_match(&text))
        {
            debug!(category = %rule.category, "Keyword match");
            return Categorization {
                category: rule.category.clone(),
                source: CategorySource::Keyword,
            };
        }

        Categorization {
            category: self.vocabulary.catch_all(direction).to_string(),
            source: CategorySource::Fallback,
        }
    }

    /// Turn a tabular row into a record
    ///
    /// Text fields are trimmed, a missing date becomes `processing_date`, and
    /// the category is chosen by [`Categorizer::categorize`].
    pub fn transform(
        &self,
        row: &TabularRow,
        source_file: Option<&str>,
        processing_date: NaiveDate,
    ) -> (TransactionRecord, CategorySource) {
        let description = clean_text(row.description.as_deref());
        let counterparty = clean_text(row.counterparty.as_deref());
        let categorization = self.categorize(
            row.direction,
            row.category.as_deref(),
            description.as_deref(),
            counterparty.as_deref(),
        );

        let record = TransactionRecord {
            direction: row.direction,
            category: categorization.category,
            amount: row.amount.abs(),
            occurred_at: row.occurred_at.unwrap_or(processing_date),
            counterparty,
            description,
            receipt_number: None,
            source: Source::Tabular,
            source_file: source_file.map(|s| s.to_string()),
            ai_processed: false,
            confidence: None,
            needs_review: false,
            review_reason: None,
            manually_edited: false,
        };
        (record, categorization.source)
    }

    /// Transform a batch of rows, returning the records and counts
    pub fn categorize_batch(
        &self,
        rows: &[TabularRow],
        source_file: Option<&str>,
        processing_date: NaiveDate,
    ) -> (Vec<TransactionRecord>, CategorizeStats) {
        let mut stats = CategorizeStats::default();
        let records = rows
            .iter()
            .map(|row| {
                let (record, source) = self.transform(row, source_file, processing_date);
                stats.record(source);
                record
            })
            .collect();

        info!(
            total = stats.total,
            by_keyword = stats.by_keyword,
            uncategorized = stats.fallback,
            "Categorized tabular rows"
        );
        (records, stats)
    }
}
