/// Error taxonomy shared by the repositories, upstream clients, reconciler,
/// report projector and batch importer.
///
/// Nothing in the core retries: every variant is surfaced to whichever
/// trigger (HTTP request, CLI command, daemon tick) started the work.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BikeshareError {
    /// Unknown station id, empty station table, or a scraped address whose
    /// station name matches nothing we know about.
    #[error("not found: {0}")]
    NotFound(String),

    /// Non-2xx response or an unparsable body from the bike-share provider.
    #[error("upstream error: {0}")]
    Upstream(String),

    /// Malformed station id field, non-integer import filename, or a stored
    /// payload that doesn't have the expected shape.
    #[error("parse error: {0}")]
    Parse(String),

    /// Import file whose contents are not valid JSON.
    #[error("import failed for {path}: {reason}")]
    Import { path: PathBuf, reason: String },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("database error: {0}")]
    Database(#[from] postgres::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BikeshareError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, BikeshareError::NotFound(_))
    }
}

impl From<reqwest::Error> for BikeshareError {
    fn from(e: reqwest::Error) -> Self {
        BikeshareError::Upstream(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, BikeshareError>;
