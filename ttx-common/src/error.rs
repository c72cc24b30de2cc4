//! Common error types for ttx

use std::path::PathBuf;
use thiserror::Error;

/// Common result type for ttx operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across ttx crates
///
/// Everything here is fatal at the process level: per-item failures are
/// modelled separately by the gather crate and never surface as `Error`.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding/decoding error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Ledger or skip log could not be replayed
    #[error("Ledger error in {path:?} at line {line}: {message}")]
    Ledger {
        path: PathBuf,
        line: usize,
        message: String,
    },

    /// Catalog file is malformed beyond recovery
    #[error("Catalog error: {0}")]
    Catalog(String),

    /// Invalid user input or parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}
