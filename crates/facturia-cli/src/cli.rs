//! CLI argument definitions using clap
//!
//! This module contains all the clap structs and enums for parsing CLI arguments.
//! The actual command implementations are in the `commands` module.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// FacturIA - Turn invoices, receipts and bank exports into a ledger
#[derive(Parser)]
#[command(name = "facturia")]
#[command(about = "Financial document to transaction pipeline", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Database path
    #[arg(long, default_value = "facturia.db", global = true)]
    pub db: PathBuf,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable database encryption (not recommended for production)
    ///
    /// By default, the database is encrypted using SQLCipher.
    /// Set FACTURIA_DB_KEY environment variable with your passphrase.
    #[arg(long, global = true)]
    pub no_encrypt: bool,

    /// Pipeline config file (vocabulary, keywords, retry)
    ///
    /// Defaults to ~/.local/share/facturia/config.toml if present,
    /// otherwise the built-in configuration.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize the database
    Init,

    /// Import a bank export (CSV) through the keyword categorizer
    Import {
        /// CSV file to import
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Classify a PDF or image with the AI backend and store the result
    Classify {
        /// Document to classify
        #[arg(short, long)]
        file: PathBuf,

        /// Email sender the document came from
        #[arg(long)]
        sender: Option<String>,

        /// Email subject the document came from
        #[arg(long)]
        subject: Option<String>,

        /// Text already extracted from the document
        #[arg(long)]
        text_file: Option<PathBuf>,
    },

    /// Process every downloaded attachment in a directory
    Pending {
        /// Directory of attachments
        #[arg(short, long)]
        dir: PathBuf,
    },

    /// Show and correct transactions
    Transactions {
        #[command(subcommand)]
        action: Option<TransactionsAction>,
    },

    /// Income, expense and balance totals
    Stats {
        /// Start date (YYYY-MM-DD)
        #[arg(long)]
        from: Option<String>,

        /// End date (YYYY-MM-DD)
        #[arg(long)]
        to: Option<String>,

        /// Print the summary as JSON
        #[arg(long)]
        json: bool,
    },

    /// List the category vocabulary
    Categories,

    /// Show database, config and backend status
    Status,
}

#[derive(Subcommand)]
pub enum TransactionsAction {
    /// List transactions, newest first
    List {
        /// Only transactions flagged for review
        #[arg(long)]
        review: bool,

        /// Filter by direction (ingreso, egreso)
        #[arg(long)]
        direction: Option<String>,

        /// Filter by category
        #[arg(long)]
        category: Option<String>,

        /// Number of transactions to show
        #[arg(short, long, default_value = "20")]
        limit: i64,
    },

    /// Correct a transaction
    Edit {
        /// Transaction ID
        id: i64,

        /// New category
        #[arg(long)]
        category: Option<String>,

        /// New amount (positive)
        #[arg(long)]
        amount: Option<f64>,

        /// New direction (ingreso, egreso)
        #[arg(long)]
        direction: Option<String>,

        /// New date (YYYY-MM-DD)
        #[arg(long)]
        date: Option<String>,

        /// New description
        #[arg(long)]
        description: Option<String>,

        /// New counterparty
        #[arg(long)]
        counterparty: Option<String>,

        /// Keep the transaction in the review queue with this note
        #[arg(long)]
        review_reason: Option<String>,
    },

    /// Delete a transaction
    Delete {
        /// Transaction ID
        id: i64,
    },
}
