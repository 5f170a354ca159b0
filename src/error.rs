//! Error types for the lmgraph library
//!
//! Every module owns a focused error enum (`ManifoldError`, `CoreError`,
//! `LinAlgError`, `OptimizerError`, `IoError`). This module gathers them into
//! the crate-wide [`LmGraphError`] so binaries and integration code can use a
//! single `?`-compatible result type.

use crate::{
    core::CoreError, io::IoError, linalg::LinAlgError, manifold::ManifoldError,
    optimizer::OptimizerError,
};
use std::num::{ParseFloatError, ParseIntError};
use thiserror::Error;

/// Main result type used throughout the lmgraph library
pub type LmGraphResult<T> = Result<T, LmGraphError>;

/// Main error type for the lmgraph library
#[derive(Debug, Error)]
pub enum LmGraphError {
    /// Manifold operation errors (malformed algebra input, unsupported maps)
    #[error("Manifold error: {0}")]
    Manifold(#[from] ManifoldError),

    /// Factor graph, values and ordering errors
    #[error("Graph error: {0}")]
    Core(#[from] CoreError),

    /// Linear algebra related errors
    #[error("Linear algebra error: {0}")]
    LinearAlgebra(#[from] LinAlgError),

    /// Optimizer construction and iteration errors
    #[error("Optimizer error: {0}")]
    Optimizer(#[from] OptimizerError),

    /// IO related errors (file loading, parsing, etc.)
    #[error("IO error: {0}")]
    Io(#[from] IoError),

    /// Invalid input parameters
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl From<std::io::Error> for LmGraphError {
    fn from(err: std::io::Error) -> Self {
        LmGraphError::Io(IoError::Io(err))
    }
}

impl From<ParseFloatError> for LmGraphError {
    fn from(err: ParseFloatError) -> Self {
        LmGraphError::InvalidInput(format!("Failed to parse float: {err}"))
    }
}

impl From<ParseIntError> for LmGraphError {
    fn from(err: ParseIntError) -> Self {
        LmGraphError::InvalidInput(format!("Failed to parse integer: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::key::x;
    use std::io::ErrorKind;

    #[test]
    fn test_error_display() {
        let error = LmGraphError::from(ManifoldError::Unsupported {
            group: "SO4",
            operation: "log",
        });
        assert_eq!(
            error.to_string(),
            "Manifold error: log is not supported for SO4"
        );
    }

    #[test]
    fn test_error_from_io() {
        let io_error = std::io::Error::new(ErrorKind::NotFound, "File not found");
        let error = LmGraphError::from(io_error);

        match error {
            LmGraphError::Io(IoError::Io(inner)) => {
                assert!(inner.to_string().contains("File not found"))
            }
            _ => panic!("Expected IO error"),
        }
    }

    #[test]
    fn test_error_from_core_keeps_variant() {
        let error = LmGraphError::from(CoreError::MissingVariable { key: x(3) });
        assert!(matches!(
            error,
            LmGraphError::Core(CoreError::MissingVariable { .. })
        ));
        assert!(error.to_string().contains("x3"));
    }

    #[test]
    fn test_error_from_parse() {
        let parse_error = "abc".parse::<f64>().map_err(LmGraphError::from);
        assert!(matches!(parse_error, Err(LmGraphError::InvalidInput(_))));
    }

    #[test]
    fn test_result_ok() {
        let result: LmGraphResult<i32> = Ok(42);
        assert!(result.is_ok());
        if let Ok(value) = result {
            assert_eq!(value, 42);
        }
    }
}
