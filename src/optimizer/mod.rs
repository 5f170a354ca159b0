//! Nonlinear optimization over a factor graph.
//!
//! The optimizer is a small state machine. Each call to `iterate` linearizes
//! the graph at the current values, solves the damped normal equations in
//! the chosen elimination order and retracts the step onto the manifold.
//! The candidate is committed only if it does not increase the error.
//!
//! ```text
//! Initialized ──iterate──▶ Iterating ──▶ Converged(reason)
//!                              │
//!                              └────────▶ Failed(reason)
//! ```

use crate::core::{CoreError, Values};
use crate::linalg::LinAlgError;
use std::fmt;
use thiserror::Error;

pub mod levenberg_marquardt;

pub use levenberg_marquardt::{
    LevenbergMarquardt, LevenbergMarquardtConfig, LevenbergMarquardtSummary,
};

/// Errors that abort an optimization.
///
/// Non-convergence is not an error: it is reported as
/// [`OptimizerState::Failed`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum OptimizerError {
    /// The graph, values or ordering could not be evaluated
    #[error(transparent)]
    Core(#[from] CoreError),

    /// The linear system could not be built
    #[error(transparent)]
    LinearAlgebra(#[from] LinAlgError),

    /// A configuration value is out of range
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Result type for optimizer operations
pub type OptimizerResult<T> = Result<T, OptimizerError>;

/// Why an optimization converged
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConvergenceReason {
    /// The error fell to the error tolerance
    ErrorTolerance,
    /// The relative error decrease fell below the relative tolerance
    RelativeDecrease,
    /// The absolute error decrease fell below the absolute tolerance
    AbsoluteDecrease,
    /// The step norm fell below the step tolerance
    StepNorm,
}

/// Why an optimization stopped without converging
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    MaxIterations,
    /// No damping within bounds produced an acceptable step
    DampingExhausted,
    /// The damped system could not be solved at any damping
    LinearSolve(String),
}

/// Optimizer state machine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OptimizerState {
    Initialized,
    Iterating,
    Converged(ConvergenceReason),
    Failed(FailureReason),
}

impl OptimizerState {
    /// `Converged` and `Failed` are final.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OptimizerState::Converged(_) | OptimizerState::Failed(_)
        )
    }

    pub fn is_converged(&self) -> bool {
        matches!(self, OptimizerState::Converged(_))
    }
}

impl fmt::Display for ConvergenceReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConvergenceReason::ErrorTolerance => write!(f, "error tolerance reached"),
            ConvergenceReason::RelativeDecrease => write!(f, "relative decrease below tolerance"),
            ConvergenceReason::AbsoluteDecrease => write!(f, "absolute decrease below tolerance"),
            ConvergenceReason::StepNorm => write!(f, "step norm below tolerance"),
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::MaxIterations => write!(f, "maximum iterations reached"),
            FailureReason::DampingExhausted => write!(f, "damping exhausted"),
            FailureReason::LinearSolve(message) => write!(f, "linear solve failed: {message}"),
        }
    }
}

impl fmt::Display for OptimizerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptimizerState::Initialized => write!(f, "Initialized"),
            OptimizerState::Iterating => write!(f, "Iterating"),
            OptimizerState::Converged(reason) => write!(f, "Converged ({reason})"),
            OptimizerState::Failed(reason) => write!(f, "Failed ({reason})"),
        }
    }
}

/// Outcome of [`LevenbergMarquardt::optimize`].
#[derive(Debug, Clone)]
pub struct OptimizationResult {
    /// Best values found
    pub values: Values,
    /// Error at `values`
    pub error: f64,
    pub initial_error: f64,
    pub iterations: usize,
    /// Terminal state
    pub state: OptimizerState,
    /// Accepted errors, starting with the initial one
    pub history: Vec<f64>,
    pub summary: LevenbergMarquardtSummary,
}
