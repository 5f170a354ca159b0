//! Bundle Adjustment Binary
//!
//! Loads a BAL (Bundle Adjustment in the Large) file and refines cameras,
//! calibrations and points with Levenberg-Marquardt.
//!
//! # Usage
//! ```bash
//! cargo run --release --bin bundle_adjustment -- path/to/problem.txt
//!
//! # Sparse Cholesky with diagonal damping:
//! cargo run --release --bin bundle_adjustment -- problem.txt --solver sparse-cholesky --diagonal-damping
//! ```

use clap::Parser;
use lmgraph::init_logger;
use lmgraph::io::BalLoader;
use lmgraph::linalg::LinearSolverType;
use lmgraph::optimizer::{LevenbergMarquardt, LevenbergMarquardtConfig};
use std::error::Error;
use std::path::PathBuf;
use std::time::Instant;
use tracing::info;

/// Bundle adjustment optimization for BAL datasets
#[derive(Parser)]
#[command(name = "bundle_adjustment")]
#[command(about = "Bundle adjustment optimization for BAL datasets")]
struct Args {
    /// BAL file path
    #[arg(value_name = "FILE")]
    file: PathBuf,

    /// Maximum number of iterations
    #[arg(long, default_value_t = 50)]
    max_iterations: usize,

    /// Relative error decrease at which to stop
    #[arg(long, default_value_t = 1e-6)]
    tolerance: f64,

    /// Linear solver: elimination or sparse-cholesky
    #[arg(long, default_value_t = LinearSolverType::SparseCholesky)]
    solver: LinearSolverType,

    /// Scale damping by diag(JᵀJ)
    #[arg(long)]
    diagonal_damping: bool,

    /// Log every iteration
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();

    init_logger();

    info!("LMGRAPH BUNDLE ADJUSTMENT");

    info!("Loading BAL dataset: {}", args.file.display());
    let start_load = Instant::now();
    let dataset = BalLoader::load(&args.file)?;
    info!("Dataset statistics:");
    info!("  Cameras: {}", dataset.cameras.len());
    info!("  Points: {}", dataset.points.len());
    info!("  Observations: {}", dataset.observations.len());
    info!("  Load time: {:?}", start_load.elapsed());

    let problem = dataset.build_problem()?;
    info!("{}", problem.graph.statistics());

    let config = LevenbergMarquardtConfig::new()
        .with_max_iterations(args.max_iterations)
        .with_relative_tolerance(args.tolerance)
        .with_linear_solver_type(args.solver)
        .with_diagonal_damping(args.diagonal_damping)
        .with_verbose(args.verbose);

    let mut optimizer =
        LevenbergMarquardt::with_config(problem.graph, problem.ordering, problem.values, config)?;
    let result = optimizer.optimize()?;

    let observations = dataset.observations.len().max(1) as f64;
    info!("{}", result.summary);
    info!(
        "RMS reprojection error: {:.4} -> {:.4} px",
        (2.0 * result.initial_error / observations).sqrt(),
        (2.0 * result.error / observations).sqrt()
    );
    Ok(())
}
