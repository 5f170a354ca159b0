//! Dataset loading
//!
//! Only the BAL (Bundle Adjustment in the Large) text format is supported.

use thiserror::Error;
use tracing::error;

pub mod bal;

pub use bal::{BalCamera, BalDataset, BalLoader, BalObservation, BalPoint, BalProblem};

/// Errors that can occur while reading a dataset file
#[derive(Error, Debug)]
pub enum IoError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error at line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error("Invalid number format at line {line}: {value}")]
    InvalidNumber { line: usize, value: String },

    #[error("Missing required fields at line {line}")]
    MissingFields { line: usize },
}

impl IoError {
    /// Log the error together with what was being attempted.
    #[must_use]
    pub fn log_with_source<C: std::fmt::Display>(self, context: C) -> Self {
        error!("{} | {}", context, self);
        self
    }
}

/// Result type for dataset loading
pub type IoResult<T> = Result<T, IoError>;
