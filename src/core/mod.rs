//! Core nonlinear least squares building blocks
//!
//! This module contains the pieces a problem is assembled from:
//! - Variable keys (`x1`, `l3`, ...)
//! - Noise models for whitening residuals
//! - The variable assignment (`Values`) and tangent-space deltas
//! - The factor graph container
//! - Variable elimination orderings

use crate::manifold::ManifoldError;
use thiserror::Error;

pub mod graph;
pub mod key;
pub mod noise;
pub mod ordering;
pub mod values;

pub use graph::FactorGraph;
pub use key::Key;
pub use noise::NoiseModel;
pub use ordering::Ordering;
pub use values::{Value, ValueKind, ValueType, Values, VectorValues};

/// Errors raised while building or evaluating a problem.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoreError {
    /// A factor or ordering names a key that has no value
    #[error("Missing variable {key}")]
    MissingVariable { key: Key },

    /// A key was inserted twice
    #[error("Duplicate key {key}")]
    DuplicateKey { key: Key },

    /// A key is bound to a variable of a different kind
    #[error("Type mismatch for {key}: expected {expected}, found {actual}")]
    TypeMismatch {
        key: Key,
        expected: ValueKind,
        actual: ValueKind,
    },

    /// An ordered key is not referenced by any factor
    #[error("Variable {key} is not constrained by any factor")]
    UnconstrainedVariable { key: Key },

    /// Vector or matrix sizes disagree
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// A point projects from behind the camera
    #[error("Point {point} is behind camera {camera} (depth {depth:.6})")]
    CheiralityViolation { camera: Key, point: Key, depth: f64 },

    /// A noise model has a non-positive or non-finite standard deviation
    #[error("Invalid noise model: sigma {sigma} on axis {axis}")]
    InvalidNoise { axis: usize, sigma: f64 },

    /// A factor lists the same key more than once
    #[error("Factor lists {key} more than once")]
    RepeatedFactorKey { key: Key },

    /// A key string could not be parsed
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    /// Manifold operation failed while evaluating a factor
    #[error(transparent)]
    Manifold(#[from] ManifoldError),
}

/// Result type for graph, values and ordering operations.
pub type CoreResult<T> = Result<T, CoreError>;
