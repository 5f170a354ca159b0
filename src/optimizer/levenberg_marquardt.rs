//! Levenberg-Marquardt algorithm implementation.
//!
//! The Levenberg-Marquardt algorithm interpolates between Gauss-Newton and
//! gradient descent by adding a damping term to the normal equations:
//!
//! ```text
//! (JᵀJ + λD) δ = Jᵀb
//! ```
//!
//! A step is committed when the error does not increase, after which λ is
//! divided by the damping factor. A rejected step multiplies λ and retries
//! with the same linearization.
//!
//! This implementation includes:
//! - Parallel per-factor linearization with a deterministic reduction
//! - Identity or clamped `diag(JᵀJ)` damping
//! - Block elimination or sparse Cholesky linear solvers
//! - An optimization summary table

use crate::core::{CoreError, FactorGraph, Ordering, Values, VectorValues};
use crate::linalg::{BlockSystem, Damping, LinearSolver, LinearSolverType};
use crate::optimizer::{
    ConvergenceReason, FailureReason, OptimizationResult, OptimizerError, OptimizerResult,
    OptimizerState,
};
use std::fmt;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Smallest damping the optimizer will decrease to.
pub const MIN_DAMPING: f64 = 1e-32;

/// Configuration for the Levenberg-Marquardt optimizer.
#[derive(Debug, Clone, PartialEq)]
pub struct LevenbergMarquardtConfig {
    /// Starting damping λ
    pub initial_damping: f64,
    /// Converge when (previous − new) / previous falls below this
    pub relative_tolerance: f64,
    /// Converge when previous − new falls below this
    pub absolute_tolerance: f64,
    /// Converge when the error falls to this value
    pub error_tolerance: f64,
    /// Converge when ‖δ‖ falls below this
    pub step_tolerance: f64,
    pub max_iterations: usize,
    /// Multiplier applied to λ on rejection and divisor on acceptance
    pub damping_factor: f64,
    pub max_damping: f64,
    /// Rejected attempts allowed within one iteration
    pub max_damping_retries: usize,
    /// Scale damping by clamped `diag(JᵀJ)` instead of the identity
    pub diagonal_damping: bool,
    pub linear_solver_type: LinearSolverType,
    /// Log every iteration at INFO instead of DEBUG
    pub verbose: bool,
}

impl Default for LevenbergMarquardtConfig {
    fn default() -> Self {
        Self {
            initial_damping: 1e-5,
            relative_tolerance: 1e-5,
            absolute_tolerance: 1e-5,
            error_tolerance: 0.0,
            step_tolerance: 1e-9,
            max_iterations: 100,
            damping_factor: 10.0,
            max_damping: 1e32,
            max_damping_retries: 10,
            diagonal_damping: false,
            linear_solver_type: LinearSolverType::default(),
            verbose: false,
        }
    }
}

impl LevenbergMarquardtConfig {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the initial damping parameter
    pub fn with_initial_damping(mut self, damping: f64) -> Self {
        self.initial_damping = damping;
        self
    }

    /// Set the relative error decrease tolerance
    pub fn with_relative_tolerance(mut self, tolerance: f64) -> Self {
        self.relative_tolerance = tolerance;
        self
    }

    /// Set the absolute error decrease tolerance
    pub fn with_absolute_tolerance(mut self, tolerance: f64) -> Self {
        self.absolute_tolerance = tolerance;
        self
    }

    /// Set the error value at which to stop
    pub fn with_error_tolerance(mut self, tolerance: f64) -> Self {
        self.error_tolerance = tolerance;
        self
    }

    /// Set the step norm tolerance
    pub fn with_step_tolerance(mut self, tolerance: f64) -> Self {
        self.step_tolerance = tolerance;
        self
    }

    /// Set the maximum number of iterations
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Set the damping adjustment factor
    pub fn with_damping_factor(mut self, factor: f64) -> Self {
        self.damping_factor = factor;
        self
    }

    /// Set the damping bound and the retries allowed per iteration
    pub fn with_damping_limits(mut self, max_damping: f64, max_retries: usize) -> Self {
        self.max_damping = max_damping;
        self.max_damping_retries = max_retries;
        self
    }

    /// Enable or disable `diag(JᵀJ)` damping
    pub fn with_diagonal_damping(mut self, diagonal: bool) -> Self {
        self.diagonal_damping = diagonal;
        self
    }

    /// Set the linear solver type
    pub fn with_linear_solver_type(mut self, solver: LinearSolverType) -> Self {
        self.linear_solver_type = solver;
        self
    }

    /// Enable or disable per-iteration INFO logging
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    fn validate(&self) -> OptimizerResult<()> {
        let invalid = |message: &str| Err(OptimizerError::InvalidConfig(message.to_string()));
        if !(self.initial_damping > 0.0 && self.initial_damping.is_finite()) {
            return invalid("initial damping must be positive and finite");
        }
        if !(self.damping_factor > 1.0) {
            return invalid("damping factor must be greater than one");
        }
        if !(self.max_damping >= self.initial_damping) {
            return invalid("max damping must not be below the initial damping");
        }
        if self.max_damping_retries == 0 {
            return invalid("at least one damping attempt is required");
        }
        if self.relative_tolerance < 0.0
            || self.absolute_tolerance < 0.0
            || self.step_tolerance < 0.0
        {
            return invalid("tolerances must be non-negative");
        }
        Ok(())
    }
}

/// Summary statistics for the Levenberg-Marquardt optimization process.
#[derive(Debug, Clone)]
pub struct LevenbergMarquardtSummary {
    /// Initial error value
    pub initial_error: f64,
    /// Final error value
    pub final_error: f64,
    /// Total number of iterations performed
    pub iterations: usize,
    /// Number of accepted steps
    pub accepted_steps: usize,
    /// Number of rejected attempts (error increased or solve failed)
    pub rejected_steps: usize,
    /// Final damping parameter value
    pub final_damping: f64,
    /// Norm of the last accepted step
    pub final_step_norm: f64,
    /// Linear solver used
    pub linear_solver: LinearSolverType,
    /// Total time spent iterating
    pub total_time: Duration,
    /// How the optimization ended
    pub termination: OptimizerState,
}

impl fmt::Display for LevenbergMarquardtSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Levenberg-Marquardt Optimization Summary ===")?;
        writeln!(f, "Initial error:             {:.6e}", self.initial_error)?;
        writeln!(f, "Final error:               {:.6e}", self.final_error)?;
        writeln!(
            f,
            "Error reduction:           {:.6e} ({:.2}%)",
            self.initial_error - self.final_error,
            100.0 * (self.initial_error - self.final_error) / self.initial_error.max(1e-12)
        )?;
        writeln!(f, "Total iterations:          {}", self.iterations)?;
        writeln!(f, "Accepted steps:            {}", self.accepted_steps)?;
        writeln!(f, "Rejected steps:            {}", self.rejected_steps)?;
        writeln!(f, "Final damping parameter:   {:.6e}", self.final_damping)?;
        writeln!(f, "Final step norm:           {:.6e}", self.final_step_norm)?;
        writeln!(f, "Linear solver:             {}", self.linear_solver)?;
        writeln!(f, "Total time:                {:?}", self.total_time)?;
        writeln!(f, "Termination:               {}", self.termination)?;
        Ok(())
    }
}

/// Outcome of one damped solve attempt.
enum Attempt {
    Accepted {
        values: Values,
        error: f64,
        step_norm: f64,
    },
    Rejected {
        error: Option<f64>,
        solve_failure: Option<String>,
    },
}

/// Levenberg-Marquardt optimizer owning one problem.
///
/// # Example
///
/// ```
/// use lmgraph::core::{FactorGraph, NoiseModel, Ordering, Values, key::l};
/// use lmgraph::factors::PriorFactor;
/// use lmgraph::manifold::Point2;
/// use lmgraph::optimizer::LevenbergMarquardt;
/// use std::sync::Arc;
///
/// let mut graph = FactorGraph::new();
/// graph.add(PriorFactor::new(l(1), Point2::from_xy(2.0, 5.0), Arc::new(NoiseModel::unit(2))));
///
/// let mut values = Values::new();
/// values.insert(l(1), Point2::from_xy(0.0, 0.0))?;
///
/// let ordering = Ordering::from_keys([l(1)])?;
/// let mut optimizer = LevenbergMarquardt::new(graph, ordering, values, 1e-5)?;
/// let result = optimizer.optimize()?;
/// assert!(result.error < 1e-9);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct LevenbergMarquardt {
    graph: FactorGraph,
    ordering: Ordering,
    values: Values,
    config: LevenbergMarquardtConfig,
    solver: Box<dyn LinearSolver>,
    damping: f64,
    error: f64,
    initial_error: f64,
    iterations: usize,
    state: OptimizerState,
    history: Vec<f64>,
    accepted_steps: usize,
    rejected_steps: usize,
    last_step_norm: f64,
    elapsed: Duration,
}

impl LevenbergMarquardt {
    /// Create an optimizer with default configuration and the given relative tolerance.
    pub fn new(
        graph: FactorGraph,
        ordering: Ordering,
        values: Values,
        relative_tolerance: f64,
    ) -> OptimizerResult<Self> {
        let config = LevenbergMarquardtConfig::default().with_relative_tolerance(relative_tolerance);
        Self::with_config(graph, ordering, values, config)
    }

    /// Create an optimizer with the given configuration.
    ///
    /// Fails if the ordering is not a permutation of the graph's variables,
    /// if a variable has no value, or if the initial error cannot be
    /// evaluated.
    pub fn with_config(
        graph: FactorGraph,
        ordering: Ordering,
        values: Values,
        config: LevenbergMarquardtConfig,
    ) -> OptimizerResult<Self> {
        config.validate()?;
        ordering.validate(&graph, &values)?;
        let error = graph.error(&values)?;
        debug!(
            "Levenberg-Marquardt on {} factors, {} variables, initial error {:.6e}",
            graph.len(),
            ordering.len(),
            error
        );
        Ok(Self {
            solver: config.linear_solver_type.create(),
            damping: config.initial_damping,
            graph,
            ordering,
            values,
            config,
            error,
            initial_error: error,
            iterations: 0,
            state: OptimizerState::Initialized,
            history: vec![error],
            accepted_steps: 0,
            rejected_steps: 0,
            last_step_norm: 0.0,
            elapsed: Duration::ZERO,
        })
    }

    pub fn values(&self) -> &Values {
        &self.values
    }

    pub fn error(&self) -> f64 {
        self.error
    }

    pub fn damping(&self) -> f64 {
        self.damping
    }

    pub fn state(&self) -> &OptimizerState {
        &self.state
    }

    pub fn iterations(&self) -> usize {
        self.iterations
    }

    pub fn ordering(&self) -> &Ordering {
        &self.ordering
    }

    pub fn graph(&self) -> &FactorGraph {
        &self.graph
    }

    pub fn config(&self) -> &LevenbergMarquardtConfig {
        &self.config
    }

    /// Accepted errors so far, starting with the initial one.
    pub fn history(&self) -> &[f64] {
        &self.history
    }

    /// Perform one iteration. A terminal state is returned unchanged.
    pub fn iterate(&mut self) -> OptimizerResult<&OptimizerState> {
        if self.state.is_terminal() {
            return Ok(&self.state);
        }
        if self.error <= self.config.error_tolerance {
            self.state = OptimizerState::Converged(ConvergenceReason::ErrorTolerance);
            return Ok(&self.state);
        }
        if self.iterations >= self.config.max_iterations {
            self.state = OptimizerState::Failed(FailureReason::MaxIterations);
            return Ok(&self.state);
        }

        let started = Instant::now();
        self.state = OptimizerState::Iterating;
        self.iterations += 1;

        let linear = self.graph.linearize(&self.values, &self.ordering)?;
        let system = match linear.hessian(&self.ordering) {
            Ok(system) => system,
            Err(e) => {
                warn!("Iteration {}: cannot build linear system: {}", self.iterations, e);
                self.state = OptimizerState::Failed(FailureReason::LinearSolve(e.to_string()));
                self.elapsed += started.elapsed();
                return Ok(&self.state);
            }
        };

        let mut attempts = 0;
        loop {
            attempts += 1;
            match self.attempt(&system)? {
                Attempt::Accepted {
                    values,
                    error,
                    step_norm,
                } => {
                    let previous = self.error;
                    self.values = values;
                    self.error = error;
                    self.last_step_norm = step_norm;
                    self.damping = (self.damping / self.config.damping_factor).max(MIN_DAMPING);
                    self.history.push(error);
                    self.accepted_steps += 1;
                    self.log_iteration(previous, step_norm);
                    self.state = self.check_convergence(previous, error, step_norm);
                    break;
                }
                Attempt::Rejected {
                    error,
                    solve_failure,
                } => {
                    self.rejected_steps += 1;
                    debug!(
                        "Iteration {}: rejected attempt {} at lambda {:.3e} (candidate error {})",
                        self.iterations,
                        attempts,
                        self.damping,
                        error.map_or_else(|| "n/a".to_string(), |e| format!("{e:.6e}"))
                    );
                    self.damping *= self.config.damping_factor;
                    if attempts >= self.config.max_damping_retries
                        || self.damping > self.config.max_damping
                    {
                        let reason = match solve_failure {
                            Some(message) => FailureReason::LinearSolve(message),
                            None => FailureReason::DampingExhausted,
                        };
                        warn!("Iteration {}: {}", self.iterations, reason);
                        self.state = OptimizerState::Failed(reason);
                        break;
                    }
                }
            }
        }

        self.elapsed += started.elapsed();
        Ok(&self.state)
    }

    /// Run [`LevenbergMarquardt::iterate`] until the state is terminal.
    pub fn optimize(&mut self) -> OptimizerResult<OptimizationResult> {
        while !self.state.is_terminal() {
            self.iterate()?;
        }
        let summary = self.summary();
        if self.config.verbose {
            info!("\n{}", summary);
        }
        Ok(OptimizationResult {
            values: self.values.clone(),
            error: self.error,
            initial_error: self.initial_error,
            iterations: self.iterations,
            state: self.state.clone(),
            history: self.history.clone(),
            summary,
        })
    }

    pub fn summary(&self) -> LevenbergMarquardtSummary {
        LevenbergMarquardtSummary {
            initial_error: self.initial_error,
            final_error: self.error,
            iterations: self.iterations,
            accepted_steps: self.accepted_steps,
            rejected_steps: self.rejected_steps,
            final_damping: self.damping,
            final_step_norm: self.last_step_norm,
            linear_solver: self.config.linear_solver_type,
            total_time: self.elapsed,
            termination: self.state.clone(),
        }
    }

    /// Solve at the current damping, retract and evaluate the candidate.
    fn attempt(&mut self, system: &BlockSystem) -> OptimizerResult<Attempt> {
        let damping = Damping {
            lambda: self.damping,
            diagonal: self.config.diagonal_damping,
        };
        let step = match self.solver.solve(system, &damping) {
            Ok(step) => step,
            Err(e) => {
                return Ok(Attempt::Rejected {
                    error: None,
                    solve_failure: Some(e.to_string()),
                });
            }
        };
        let delta = VectorValues::from_ordered(&step, &self.ordering, &self.values)?;
        let evaluated = self
            .values
            .retract(&delta)
            .and_then(|candidate| Ok((self.graph.error(&candidate)?, candidate)));
        let (error, candidate) = match evaluated {
            Ok(evaluated) => evaluated,
            Err(CoreError::CheiralityViolation { camera, point, .. }) => {
                debug!("Candidate moves {} behind {}", point, camera);
                return Ok(Attempt::Rejected {
                    error: None,
                    solve_failure: None,
                });
            }
            Err(CoreError::Manifold(e)) => {
                debug!("Candidate cannot be evaluated: {}", e);
                return Ok(Attempt::Rejected {
                    error: None,
                    solve_failure: None,
                });
            }
            Err(e) => return Err(e.into()),
        };

        if error <= self.error {
            Ok(Attempt::Accepted {
                values: candidate,
                error,
                step_norm: delta.norm(),
            })
        } else {
            Ok(Attempt::Rejected {
                error: Some(error),
                solve_failure: None,
            })
        }
    }

    /// State after an accepted step from `previous` to `error`.
    fn check_convergence(&self, previous: f64, error: f64, step_norm: f64) -> OptimizerState {
        let decrease = previous - error;
        let relative = if previous > 0.0 { decrease / previous } else { 0.0 };
        if error <= self.config.error_tolerance {
            OptimizerState::Converged(ConvergenceReason::ErrorTolerance)
        } else if decrease < self.config.absolute_tolerance {
            OptimizerState::Converged(ConvergenceReason::AbsoluteDecrease)
        } else if relative < self.config.relative_tolerance {
            OptimizerState::Converged(ConvergenceReason::RelativeDecrease)
        } else if step_norm < self.config.step_tolerance {
            OptimizerState::Converged(ConvergenceReason::StepNorm)
        } else if self.iterations >= self.config.max_iterations {
            OptimizerState::Failed(FailureReason::MaxIterations)
        } else {
            OptimizerState::Iterating
        }
    }

    fn log_iteration(&self, previous: f64, step_norm: f64) {
        if self.config.verbose {
            info!(
                "iter {:>4}: error {:.6e} -> {:.6e}, lambda {:.3e}, |step| {:.3e}",
                self.iterations, previous, self.error, self.damping, step_norm
            );
        } else {
            debug!(
                "iter {:>4}: error {:.6e} -> {:.6e}, lambda {:.3e}, |step| {:.3e}",
                self.iterations, previous, self.error, self.damping, step_norm
            );
        }
    }
}
