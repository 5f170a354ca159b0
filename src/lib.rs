//! # lmgraph
//!
//! Nonlinear least squares over manifold-valued variables, built for
//! robotics and vision problems such as landmark SLAM, pose graphs,
//! rotation averaging and bundle adjustment.
//!
//! ## Features
//!
//! - **Lie groups**: `SO3`, `SE3`, `SO4` and vector spaces `Rn`, with
//!   exponential map, Cayley chart and adjoints
//! - **Factor graphs**: heterogeneous variables under symbolic keys, prior,
//!   between, landmark and reprojection factors with Gaussian noise models
//! - **Elimination orderings**: natural, minimum degree and constrained
//!   (points first for bundle adjustment)
//! - **Levenberg-Marquardt**: an explicit state machine with adaptive
//!   damping and several convergence criteria
//! - **Linear solvers**: block Cholesky elimination in ordering order, or
//!   a sparse Cholesky factorization on faer
//!
//! ## Example
//!
//! ```
//! use lmgraph::core::key::x;
//! use lmgraph::core::{FactorGraph, NoiseModel, Ordering, Values};
//! use lmgraph::factors::PriorFactor;
//! use lmgraph::manifold::Point2;
//! use lmgraph::optimizer::LevenbergMarquardt;
//! use std::sync::Arc;
//!
//! let mut graph = FactorGraph::new();
//! graph.add(PriorFactor::new(x(1), Point2::from_xy(1.0, 2.0), Arc::new(NoiseModel::unit(2))));
//!
//! let mut values = Values::new();
//! values.insert(x(1), Point2::from_xy(0.0, 0.0))?;
//!
//! let ordering = Ordering::natural(&values);
//! let mut optimizer = LevenbergMarquardt::new(graph, ordering, values, 1e-6)?;
//! let result = optimizer.optimize()?;
//! assert!(result.error < 1e-12);
//! # Ok::<(), lmgraph::LmGraphError>(())
//! ```

pub mod core;
pub mod error;
pub mod factors;
pub mod io;
pub mod linalg;
pub mod logger;
pub mod manifold;
pub mod optimizer;
pub mod urban;

pub use core::{FactorGraph, Key, NoiseModel, Ordering, Values};
pub use error::{LmGraphError, LmGraphResult};
pub use factors::{BetweenFactor, Factor, MeasurementFactor, PriorFactor, ProjectionFactor};
pub use io::BalLoader;
pub use linalg::{LinearSolverType, SparseCholeskySolver};
pub use logger::{init_logger, init_logger_with_level};
pub use manifold::{LieGroup, SE3, SO3, SO4, Tangent};
pub use optimizer::{LevenbergMarquardt, LevenbergMarquardtConfig, OptimizerState};
pub use urban::UrbanGraph;
