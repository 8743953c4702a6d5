//! Attachment processing pipeline
//!
//! One entry point per attachment kind:
//! - documents (PDF, image) go through the classification backend and the
//!   response validator
//! - tabular exports go through the CSV reader and the keyword categorizer
//!
//! Every file is identified by content hash. Files already in the dedup store
//! are skipped. Only a stored document is marked processed: one whose
//! classification was unavailable (backend down, retries exhausted, circuit
//! open) or whose response was rejected stays eligible, and a later pass asks
//! the backend for a fresh response.

use std::path::Path;
use std::sync::{Arc, Mutex};

use chrono::{Local, NaiveDate};
use tracing::{debug, info, warn};

use crate::ai::{CallOutcome, ClassificationBackend, ClassificationRequest, ResilientBackend};
use crate::categorize::{CategorizeStats, Categorizer};
use crate::config::{BackendSettings, PipelineConfig};
use crate::db::Database;
use crate::dedup::{content_hash, DedupStore, FileMark};
use crate::error::{Error, Rejection, Result};
use crate::import::read_tabular;
use crate::models::{Attachment, AttachmentKind};
use crate::prompts::PromptLibrary;
use crate::validate::{ResponseValidator, Validation, ValidationContext};

/// Result of processing a PDF or image
#[derive(Debug, Clone, PartialEq)]
pub enum DocumentOutcome {
    /// Same content was handled before
    Duplicate,
    /// No classification this pass; the file stays eligible
    Unavailable,
    /// Response rejected; the file stays eligible
    Rejected(Rejection),
    Stored(i64),
}

/// Result of processing a tabular export
#[derive(Debug, Clone, PartialEq)]
pub enum TabularOutcome {
    Duplicate,
    /// No row carried a usable amount
    Empty { skipped: usize },
    Stored {
        ids: Vec<i64>,
        stats: CategorizeStats,
        skipped: usize,
    },
}

/// Result of processing any attachment
#[derive(Debug, Clone, PartialEq)]
pub enum AttachmentOutcome {
    Document(DocumentOutcome),
    Tabular(TabularOutcome),
    /// File extension not handled by any path
    Unsupported,
}

/// Counts from a directory pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PendingSummary {
    pub files: usize,
    pub stored_transactions: usize,
    pub duplicates: usize,
    pub unavailable: usize,
    pub rejected: usize,
    pub unsupported: usize,
    pub failed: usize,
}

impl PendingSummary {
    fn record(&mut self, outcome: &AttachmentOutcome) {
        match outcome {
            AttachmentOutcome::Document(DocumentOutcome::Stored(_)) => {
                self.stored_transactions += 1
            }
            AttachmentOutcome::Document(DocumentOutcome::Duplicate)
            | AttachmentOutcome::Tabular(TabularOutcome::Duplicate) => self.duplicates += 1,
            AttachmentOutcome::Document(DocumentOutcome::Unavailable) => self.unavailable += 1,
            AttachmentOutcome::Document(DocumentOutcome::Rejected(_)) => self.rejected += 1,
            AttachmentOutcome::Tabular(TabularOutcome::Stored { ids, .. }) => {
                self.stored_transactions += ids.len()
            }
            AttachmentOutcome::Tabular(TabularOutcome::Empty { .. }) => {}
            AttachmentOutcome::Unsupported => self.unsupported += 1,
        }
    }
}

/// Tabular import path: CSV reader, keyword categorizer, ledger
///
/// Needs no classification backend, so it is usable on its own.
pub struct TabularImporter {
    categorizer: Categorizer,
    dedup: Arc<dyn DedupStore>,
    db: Database,
    processing_date: Option<NaiveDate>,
}

impl TabularImporter {
    /// Build an importer; the database doubles as the dedup store
    pub fn new(config: &PipelineConfig, db: Database) -> Result<Self> {
        Ok(Self {
            categorizer: config.categorizer()?,
            dedup: Arc::new(db.clone()),
            db,
            processing_date: None,
        })
    }

    pub fn with_dedup_store(mut self, store: Arc<dyn DedupStore>) -> Self {
        self.dedup = store;
        self
    }

    pub fn with_processing_date(mut self, date: NaiveDate) -> Self {
        self.processing_date = Some(date);
        self
    }

    fn processing_date(&self) -> NaiveDate {
        self.processing_date
            .unwrap_or_else(|| Local::now().date_naive())
    }

    /// Import one tabular export
    pub fn process(&self, attachment: &Attachment) -> Result<TabularOutcome> {
        let hash = content_hash(&attachment.bytes);
        if self.dedup.is_processed(&hash)? {
            info!(file = %attachment.file_name, "Skipping already imported file");
            return Ok(TabularOutcome::Duplicate);
        }

        let import = read_tabular(&attachment.bytes)?;
        let file_name = attachment.file_name.as_str();
        let mark = |count: usize| FileMark {
            file_name,
            kind: "tabular",
            transactions_extracted: count as i64,
            success: true,
            error_message: None,
        };

        if import.rows.is_empty() {
            warn!(
                file = %attachment.file_name,
                skipped = import.skipped,
                "No usable rows in tabular file"
            );
            self.dedup.mark_processed(&hash, &mark(0))?;
            return Ok(TabularOutcome::Empty {
                skipped: import.skipped,
            });
        }

        let (records, stats) = self.categorizer.categorize_batch(
            &import.rows,
            Some(&attachment.file_name),
            self.processing_date(),
        );
        let ids = self.db.insert_transactions(&records)?;
        self.dedup.mark_processed(&hash, &mark(ids.len()))?;

        info!(
            file = %attachment.file_name,
            stored = ids.len(),
            skipped = import.skipped,
            delimiter = %import.delimiter,
            "Imported tabular file"
        );
        Ok(TabularOutcome::Stored {
            ids,
            stats,
            skipped: import.skipped,
        })
    }
}

/// Attachment-to-ledger pipeline over a classification backend
pub struct Pipeline<B> {
    backend: ResilientBackend<B>,
    validator: ResponseValidator,
    tabular: TabularImporter,
    prompts: Mutex<PromptLibrary>,
    dedup: Arc<dyn DedupStore>,
    db: Database,
    settings: BackendSettings,
    processing_date: Option<NaiveDate>,
}

impl<B: ClassificationBackend> Pipeline<B> {
    /// Build a pipeline; the database doubles as the dedup store
    pub fn new(config: &PipelineConfig, backend: B, db: Database) -> Result<Self> {
        Ok(Self {
            backend: ResilientBackend::new(backend, config.retry.clone(), config.breaker.clone()),
            validator: ResponseValidator::new(config.resolver()),
            tabular: TabularImporter::new(config, db.clone())?,
            prompts: Mutex::new(PromptLibrary::new()),
            dedup: Arc::new(db.clone()),
            db,
            settings: config.backend.clone(),
            processing_date: None,
        })
    }

    pub fn with_dedup_store(mut self, store: Arc<dyn DedupStore>) -> Self {
        self.tabular = self.tabular.with_dedup_store(store.clone());
        self.dedup = store;
        self
    }

    pub fn with_prompts(mut self, prompts: PromptLibrary) -> Self {
        self.prompts = Mutex::new(prompts);
        self
    }

    /// Pin the date used for records without one (defaults to today)
    pub fn with_processing_date(mut self, date: NaiveDate) -> Self {
        self.tabular = self.tabular.with_processing_date(date);
        self.processing_date = Some(date);
        self
    }

    pub fn backend(&self) -> &ResilientBackend<B> {
        &self.backend
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    fn processing_date(&self) -> NaiveDate {
        self.processing_date
            .unwrap_or_else(|| Local::now().date_naive())
    }

    /// Classify a PDF or image and store the result
    pub async fn process_document(&self, attachment: &Attachment) -> Result<DocumentOutcome> {
        let kind = match attachment.kind() {
            Some(kind @ (AttachmentKind::Pdf | AttachmentKind::Image)) => kind,
            _ => {
                return Err(Error::InvalidData(format!(
                    "Not a document: {}",
                    attachment.file_name
                )))
            }
        };

        let hash = content_hash(&attachment.bytes);
        if self.dedup.is_processed(&hash)? {
            info!(file = %attachment.file_name, "Skipping already processed document");
            return Ok(DocumentOutcome::Duplicate);
        }

        let prompt = {
            let mut prompts = self.prompts.lock().unwrap_or_else(|e| e.into_inner());
            prompts.classification_prompt(
                self.validator.resolver().vocabulary(),
                attachment,
                self.settings.max_text_chars,
            )?
        };
        let request =
            ClassificationRequest::new(prompt, attachment.bytes.clone(), attachment.mime_type());

        let raw = match self.backend.classify(&request).await {
            CallOutcome::Response(text) => text,
            CallOutcome::Exhausted {
                attempts,
                last_error,
            } => {
                warn!(
                    file = %attachment.file_name,
                    attempts,
                    error = %last_error,
                    "Classification unavailable, leaving document for a later pass"
                );
                return Ok(DocumentOutcome::Unavailable);
            }
            CallOutcome::CircuitOpen => {
                warn!(file = %attachment.file_name, "Circuit open, leaving document for a later pass");
                return Ok(DocumentOutcome::Unavailable);
            }
        };
        debug!(file = %attachment.file_name, chars = raw.len(), "Received classification");

        let ctx = ValidationContext::new(kind.source(), self.processing_date())
            .with_file(&attachment.file_name);

        match self.validator.validate(&raw, &ctx) {
            Validation::Accepted(record) => {
                let id = self.db.insert_transaction(&record)?;
                self.dedup.mark_processed(
                    &hash,
                    &FileMark {
                        file_name: &attachment.file_name,
                        kind: kind.source().as_str(),
                        transactions_extracted: 1,
                        success: true,
                        error_message: None,
                    },
                )?;
                info!(
                    file = %attachment.file_name,
                    id,
                    direction = %record.direction,
                    category = %record.category,
                    amount = record.amount,
                    needs_review = record.needs_review,
                    "Stored transaction from document"
                );
                Ok(DocumentOutcome::Stored(id))
            }
            Validation::Rejected(rejection) => {
                info!(
                    file = %attachment.file_name,
                    kind = rejection.kind(),
                    "Leaving rejected document for a later pass"
                );
                Ok(DocumentOutcome::Rejected(rejection))
            }
        }
    }

    /// Import a tabular export through the keyword categorizer
    pub fn process_tabular(&self, attachment: &Attachment) -> Result<TabularOutcome> {
        self.tabular.process(attachment)
    }

    /// Route an attachment by its kind
    pub async fn process_attachment(&self, attachment: &Attachment) -> Result<AttachmentOutcome> {
        match attachment.kind() {
            Some(AttachmentKind::Pdf | AttachmentKind::Image) => Ok(AttachmentOutcome::Document(
                self.process_document(attachment).await?,
            )),
            Some(AttachmentKind::Tabular) => {
                Ok(AttachmentOutcome::Tabular(self.process_tabular(attachment)?))
            }
            None => {
                debug!(file = %attachment.file_name, "Unsupported attachment type");
                Ok(AttachmentOutcome::Unsupported)
            }
        }
    }

    /// Process every file in a directory of downloaded attachments
    ///
    /// Files are handled in name order. A failure on one file is logged and
    /// counted; the pass continues.
    pub async fn process_pending_dir(&self, dir: &Path) -> Result<PendingSummary> {
        let mut paths = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if path.is_file() {
                paths.push(path);
            }
        }
        paths.sort();

        let mut summary = PendingSummary::default();
        for path in paths {
            summary.files += 1;
            let attachment = match Attachment::from_path(&path) {
                Ok(a) => a,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Failed to read pending file");
                    summary.failed += 1;
                    continue;
                }
            };

            match self.process_attachment(&attachment).await {
                Ok(outcome) => summary.record(&outcome),
                Err(e) => {
                    warn!(file = %attachment.file_name, error = %e, "Failed to process pending file");
                    summary.failed += 1;
                }
            }
        }

        info!(
            files = summary.files,
            stored = summary.stored_transactions,
            duplicates = summary.duplicates,
            unavailable = summary.unavailable,
            "Pending pass complete"
        );
        Ok(summary)
    }
}
