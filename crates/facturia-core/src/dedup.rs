//! Source-file deduplication
//!
//! Attachments are identified by the SHA-256 of their content, so the same
//! invoice delivered twice (or re-downloaded under another name) is handled
//! once. The store is injected into the pipeline; the database implements it
//! for production and `MemoryDedupStore` serves tests and dry runs.

use std::collections::HashMap;
use std::sync::Mutex;

use sha2::{Digest, Sha256};

use crate::error::Result;

/// Hex-encoded SHA-256 of a file's bytes
pub fn content_hash(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// What happened to a file, as recorded in the store
#[derive(Debug, Clone, PartialEq)]
pub struct FileMark<'a> {
    pub file_name: &'a str,
    pub kind: &'a str,
    pub transactions_extracted: i64,
    pub success: bool,
    pub error_message: Option<&'a str>,
}

/// Registry of already-processed files
pub trait DedupStore: Send + Sync {
    fn is_processed(&self, hash: &str) -> Result<bool>;

    /// Record a file as handled. Marking the same hash twice is a no-op.
    fn mark_processed(&self, hash: &str, mark: &FileMark<'_>) -> Result<()>;
}

/// In-process store
#[derive(Debug, Default)]
pub struct MemoryDedupStore {
    seen: Mutex<HashMap<String, String>>,
}

impl MemoryDedupStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.seen.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl DedupStore for MemoryDedupStore {
    fn is_processed(&self, hash: &str) -> Result<bool> {
        let seen = self.seen.lock().unwrap_or_else(|e| e.into_inner());
        Ok(seen.contains_key(hash))
    }

    fn mark_processed(&self, hash: &str, mark: &FileMark<'_>) -> Result<()> {
        let mut seen = self.seen.lock().unwrap_or_else(|e| e.into_inner());
        seen.entry(hash.to_string())
            .or_insert_with(|| mark.file_name.to_string());
        Ok(())
    }
}
