//! Core command implementations and shared utilities
//!
//! This module contains:
//! - `open_db` - Shared utility to open the database
//! - `load_config` - Pipeline configuration with override resolution
//! - `build_pipeline` - Pipeline over the backend selected by environment
//! - `cmd_init` - Initialize the database

use std::path::Path;

use anyhow::{Context, Result};
use facturia_core::{BackendClient, Database, Pipeline, PipelineConfig};

/// Open database with encryption by default, or unencrypted if --no-encrypt
pub fn open_db(db_path: &Path, no_encrypt: bool) -> Result<Database> {
    let path_str = db_path
        .to_str()
        .context("Database path is not valid UTF-8")?;
    if no_encrypt {
        Database::new_unencrypted(path_str).context("Failed to open database (unencrypted)")
    } else {
        Database::new(path_str).context("Failed to open database")
    }
}

pub fn load_config(config_path: Option<&Path>) -> Result<PipelineConfig> {
    PipelineConfig::load(config_path).context("Failed to load pipeline config")
}

/// Build the document pipeline, failing when no backend is configured
pub fn build_pipeline(config: &PipelineConfig, db: Database) -> Result<Pipeline<BackendClient>> {
    let backend = BackendClient::from_env(config.backend.timeout).context(
        "No classification backend configured. Set GEMINI_API_KEY, or AI_BACKEND=ollama with OLLAMA_HOST",
    )?;
    tracing::info!(backend = backend.name(), "Using classification backend");
    Pipeline::new(config, backend, db).context("Failed to build pipeline")
}

pub fn cmd_init(db_path: &Path, no_encrypt: bool) -> Result<()> {
    println!("🔧 Initializing database at {}...", db_path.display());

    let _db = open_db(db_path, no_encrypt)?;

    if no_encrypt {
        println!("   ⚠️  Encryption: DISABLED (--no-encrypt)");
    } else {
        println!("   🔒 Encryption: ENABLED");
    }

    println!("✅ Database initialized successfully!");
    println!();
    println!("Next steps:");
    println!("  1. Import a bank export: facturia import --file extracto.csv");
    println!("  2. Classify an invoice:  facturia classify --file factura.pdf");

    Ok(())
}
