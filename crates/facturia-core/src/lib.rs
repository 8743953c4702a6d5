//! FacturIA Core Library
//!
//! Turns financial documents into ledger transactions:
//! - Value normalization for amounts, dates and text
//! - Category vocabulary and resolution of free-form category hints
//! - Validation of untrusted classification responses
//! - Keyword categorization of tabular bank exports
//! - Pluggable classification backends behind retry and a circuit breaker
//! - Content-hash deduplication of source files
//! - Encrypted SQLite persistence

pub mod ai;
pub mod categorize;
pub mod config;
pub mod db;
pub mod dedup;
pub mod error;
pub mod import;
pub mod models;
pub mod normalize;
pub mod pipeline;
pub mod prompts;
pub mod validate;
pub mod vocabulary;

pub use ai::{
    BackendClient, BreakerConfig, CallOutcome, CircuitBreaker, ClassificationBackend,
    ClassificationRequest, GeminiBackend, MockBackend, OllamaBackend, ResilientBackend,
    RetryPolicy,
};
pub use categorize::{CategorizeStats, CategorySource, Categorizer, KeywordRule};
pub use config::{BackendSettings, ConfigSource, PipelineConfig};
pub use db::{Database, TransactionFilter};
pub use dedup::{content_hash, DedupStore, MemoryDedupStore};
pub use error::{Error, Rejection, Result};
pub use import::{read_tabular, read_tabular_file, TabularImport, TabularRow};
pub use models::{
    Attachment, AttachmentKind, Direction, LedgerSummary, Source, Transaction, TransactionEdit,
    TransactionRecord,
};
pub use normalize::{clean_amount, normalize_date, normalize_date_iso};
pub use pipeline::{
    AttachmentOutcome, DocumentOutcome, PendingSummary, Pipeline, TabularImporter, TabularOutcome,
};
pub use prompts::{Prompt, PromptId, PromptLibrary};
pub use validate::{ResponseValidator, Validation, ValidationContext};
pub use vocabulary::{CategoryResolver, Vocabulary};
