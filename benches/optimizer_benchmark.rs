//! Optimizer benchmarks
//!
//! - `so4_exp`: closed-form SO(4) exponential of a random tangent vector
//! - `urban_lm`: Levenberg-Marquardt on a synthetic urban trajectory with
//!   perturbed initial values, once per linear solver

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use lmgraph::core::key::{l, x};
use lmgraph::core::{NoiseModel, Ordering, Values};
use lmgraph::linalg::LinearSolverType;
use lmgraph::manifold::{SO4Tangent, Tangent};
use lmgraph::optimizer::{LevenbergMarquardt, LevenbergMarquardtConfig};
use lmgraph::urban::{UrbanGraph, ValuesExt, navlab_rotation};
use nalgebra::{Vector3, Vector6};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::f64::consts::PI;
use std::hint::black_box;
use std::sync::Arc;

/// Straight drive along world y with landmarks on both sides of the road.
fn urban_problem(num_poses: u64) -> (UrbanGraph, Values) {
    let mut rng = StdRng::seed_from_u64(7);
    let sensor = Arc::new(NoiseModel::unit(4));
    let mut graph = UrbanGraph::new();
    let mut values = Values::new();
    graph.add_origin_constraint(1);

    let num_landmarks = num_poses + 4;
    for j in 1..=num_landmarks {
        let side = if j % 2 == 0 { 2.0 } else { -2.0 };
        let along = (j / 2) as f64 * 2.0;
        let noisy_x = side + rng.random_range(-0.3..0.3);
        let noisy_y = along + rng.random_range(-0.3..0.3);
        let _ = values.add_landmark(l(j), noisy_x, noisy_y);
    }

    for i in 1..=num_poses {
        let y = (i - 1) as f64;
        let noise = Vector3::new(rng.random_range(-0.2..0.2), rng.random_range(-0.2..0.2), 0.0);
        let _ = values.add_robot_pose(x(i), &navlab_rotation(), Vector3::new(0.0, y, 0.0) + noise);
        if i < num_poses {
            let _ = graph.add_odometry(1.0, 0.0, 0.01, PI / 180.0, i);
        }
        for j in 1..=num_landmarks {
            let side = if j % 2 == 0 { 2.0 } else { -2.0 };
            let along = (j / 2) as f64 * 2.0 - y;
            if (0.0..=10.0).contains(&along) {
                // body x forward (world y), body y right (world x)
                let _ = graph.add_measurement(&sensor, along, side, 0.2, i, j);
            }
        }
    }
    (graph, values)
}

fn bench_so4_exp(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(42);
    let tangent = SO4Tangent::new(Vector6::from_fn(|_, _| rng.random_range(-1.0..1.0)));
    c.bench_function("so4_exp", |b| b.iter(|| black_box(&tangent).exp()));
}

fn bench_urban_lm(c: &mut Criterion) {
    let (graph, values) = urban_problem(30);
    let graph = graph.into_graph();
    let ordering = Ordering::minimum_degree(&graph);

    let mut group = c.benchmark_group("urban_lm");
    for solver in [LinearSolverType::Elimination, LinearSolverType::SparseCholesky] {
        group.bench_with_input(BenchmarkId::from_parameter(solver), &solver, |b, &solver| {
            b.iter(|| {
                let config = LevenbergMarquardtConfig::new()
                    .with_linear_solver_type(solver)
                    .with_max_iterations(20);
                if let Ok(mut optimizer) = LevenbergMarquardt::with_config(
                    graph.clone(),
                    ordering.clone(),
                    values.clone(),
                    config,
                ) {
                    black_box(optimizer.optimize().ok());
                }
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_so4_exp, bench_urban_lm);
criterion_main!(benches);
