//! Linear algebra for the inner Levenberg-Marquardt step.
//!
//! This module turns a linearized factor graph into a damped block system
//! `(H + λD) δ = g` and solves it:
//! - [`GaussianFactorGraph`]: whitened Jacobian factors and the block Hessian
//! - [`EliminationSolver`]: block Cholesky that eliminates in ordering order
//! - [`SparseCholeskySolver`]: faer sparse `Llt` on the assembled matrix

use nalgebra::DVector;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

pub mod cholesky;
pub mod elimination;
pub mod gaussian;

pub use cholesky::SparseCholeskySolver;
pub use elimination::EliminationSolver;
pub use gaussian::{BlockSystem, GaussianFactorGraph, JacobianFactor};

/// Lower clamp for the diagonal damping entries.
pub const MIN_DIAGONAL: f64 = 1e-6;

/// Upper clamp for the diagonal damping entries.
pub const MAX_DIAGONAL: f64 = 1e32;

/// Linear algebra specific error types
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LinAlgError {
    /// A pivot block was not positive definite
    #[error("Matrix is not positive definite (block {block})")]
    NotPositiveDefinite { block: usize },

    /// Sizes of the system and its parts disagree
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// The sparse factorization failed
    #[error("Factorization failed: {0}")]
    FactorizationFailed(String),

    /// The sparse matrix could not be built
    #[error("Matrix construction failed: {0}")]
    MatrixConstruction(String),
}

/// Result type for linear algebra operations
pub type LinAlgResult<T> = Result<T, LinAlgError>;

/// Available linear solver back ends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LinearSolverType {
    #[default]
    Elimination,
    SparseCholesky,
}

impl fmt::Display for LinearSolverType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinearSolverType::Elimination => write!(f, "elimination"),
            LinearSolverType::SparseCholesky => write!(f, "sparse-cholesky"),
        }
    }
}

impl FromStr for LinearSolverType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "elimination" => Ok(LinearSolverType::Elimination),
            "sparse-cholesky" | "cholesky" => Ok(LinearSolverType::SparseCholesky),
            other => Err(format!("unknown linear solver '{other}'")),
        }
    }
}

impl LinearSolverType {
    /// Fresh solver instance of this type.
    pub fn create(self) -> Box<dyn LinearSolver> {
        match self {
            LinearSolverType::Elimination => Box::new(EliminationSolver::new()),
            LinearSolverType::SparseCholesky => Box::new(SparseCholeskySolver::new()),
        }
    }
}

/// Levenberg-Marquardt damping `λ D`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Damping {
    pub lambda: f64,
    /// Scale by `diag(H)` (clamped) instead of the identity.
    pub diagonal: bool,
}

impl Damping {
    pub fn identity(lambda: f64) -> Self {
        Damping {
            lambda,
            diagonal: false,
        }
    }

    /// Damping added to a Hessian diagonal entry `h`.
    pub fn term(&self, h: f64) -> f64 {
        if self.diagonal {
            self.lambda * h.clamp(MIN_DIAGONAL, MAX_DIAGONAL)
        } else {
            self.lambda
        }
    }
}

/// Solver for the damped normal equations of a [`BlockSystem`].
pub trait LinearSolver: Send {
    /// Solve `(H + λD) δ = g`, returning δ stacked in ordering order.
    fn solve(&mut self, system: &BlockSystem, damping: &Damping) -> LinAlgResult<DVector<f64>>;

    fn name(&self) -> &'static str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_damping_term() {
        assert_eq!(Damping::identity(2.0).term(100.0), 2.0);
        let diagonal = Damping {
            lambda: 2.0,
            diagonal: true,
        };
        assert_eq!(diagonal.term(100.0), 200.0);
        assert_eq!(diagonal.term(0.0), 2.0 * MIN_DIAGONAL);
    }

    #[test]
    fn test_solver_type_parse() {
        assert_eq!(
            "sparse-cholesky".parse::<LinearSolverType>(),
            Ok(LinearSolverType::SparseCholesky)
        );
        assert_eq!(LinearSolverType::default().to_string(), "elimination");
        assert!("qr".parse::<LinearSolverType>().is_err());
    }
}
