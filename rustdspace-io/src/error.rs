//! I/O error types.

use thiserror::Error;

/// Result type for I/O operations.
pub type Result<T> = std::result::Result<T, Error>;

/// I/O error types.
#[derive(Error, Debug)]
pub enum Error {
    /// File I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed JSON document.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A run-number string that cannot be parsed.
    #[error("invalid run string '{text}': {reason}")]
    InvalidRunString { text: String, reason: String },

    /// A calibration table row that cannot be parsed.
    #[error("invalid calibration table at line {line}: {reason}")]
    InvalidCalFile { line: usize, reason: String },

    /// A logical run-number key absent from the mapping.
    #[error("no run numbers found for key '{key}'; {context}")]
    MissingKey { key: String, context: String },

    /// A run number outside every mapping entry's range.
    #[error("run {run} is not covered by any mapping entry")]
    UncoveredRun { run: u32 },

    /// Core library error.
    #[error("core error: {0}")]
    Core(#[from] rustdspace_core::Error),
}
