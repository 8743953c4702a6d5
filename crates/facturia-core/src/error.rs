//! Error types for FacturIA
//!
//! `Error` covers infrastructure failures (database, IO, HTTP, config).
//! `Rejection` is the outcome of a classification response that cannot become
//! a transaction; it is returned as data, never raised.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Database pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("Encryption error: {0}")]
    Encryption(String),

    #[error("CSV parsing error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Import error: {0}")]
    Import(String),

    #[error("Backend error: {0}")]
    Backend(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Regex error: {0}")]
    Regex(#[from] regex::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Hard rejection of a classification response
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Rejection {
    /// No parse strategy produced an object
    #[error("unparseable response: {0}")]
    ParseFailure(String),

    /// A required field (`tipo`, `categoria`, `monto`) is absent or null
    #[error("missing required field '{0}'")]
    MissingField(&'static str),

    /// `tipo` is neither the income nor the expense token
    #[error("invalid direction '{0}'")]
    InvalidDirection(String),

    /// Amount is non-numeric or not strictly positive
    #[error("invalid amount '{0}'")]
    InvalidAmount(String),
}

impl Rejection {
    /// Short stable name, used as a structured log field and in stats
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ParseFailure(_) => "parse_failure",
            Self::MissingField(_) => "missing_field",
            Self::InvalidDirection(_) => "invalid_direction",
            Self::InvalidAmount(_) => "invalid_amount",
        }
    }
}
