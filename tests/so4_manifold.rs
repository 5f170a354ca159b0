//! SO(4) rotation averaging
//!
//! Four rotations connected in a loop by exact relative measurements, with
//! the first one anchored by a prior. Starting from perturbed values the
//! optimizer must recover the ground truth through the Cayley chart.

use lmgraph::core::key::r;
use lmgraph::core::{FactorGraph, NoiseModel, Ordering, Values};
use lmgraph::factors::{BetweenFactor, PriorFactor};
use lmgraph::linalg::LinearSolverType;
use lmgraph::manifold::{LieGroup, ManifoldError, SO4, SO4Tangent};
use lmgraph::optimizer::{LevenbergMarquardt, LevenbergMarquardtConfig};
use nalgebra::{Matrix4, Vector6};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;

const TOLERANCE: f64 = 1e-12;

fn truth(rng: &mut StdRng) -> Vec<SO4> {
    (0..4).map(|_| SO4::random(rng)).collect()
}

fn averaging_graph(rotations: &[SO4]) -> FactorGraph {
    let noise = Arc::new(NoiseModel::unit(6));
    let mut graph = FactorGraph::new();
    graph.add(PriorFactor::new(r(0), rotations[0].clone(), noise.clone()));
    let n = rotations.len();
    for i in 0..n {
        let j = (i + 1) % n;
        graph.add(BetweenFactor::new(
            r(i as u64),
            r(j as u64),
            rotations[i].between(&rotations[j]),
            noise.clone(),
        ));
    }
    graph
}

fn perturbed(rotations: &[SO4], rng: &mut StdRng) -> Result<Values, Box<dyn std::error::Error>> {
    let mut values = Values::new();
    for (i, rotation) in rotations.iter().enumerate() {
        let delta = SO4Tangent::new(Vector6::from_fn(|_, _| rng.random_range(-0.1..0.1)));
        values.insert(r(i as u64), rotation.retract(&delta)?)?;
    }
    Ok(values)
}

#[test]
fn test_rotation_averaging_recovers_truth() -> Result<(), Box<dyn std::error::Error>> {
    let mut rng = StdRng::seed_from_u64(11);
    let rotations = truth(&mut rng);
    let graph = averaging_graph(&rotations);
    let initial = perturbed(&rotations, &mut rng)?;
    assert!(graph.error(&initial)? > 1e-4);

    for solver in [LinearSolverType::Elimination, LinearSolverType::SparseCholesky] {
        let config = LevenbergMarquardtConfig::new()
            .with_relative_tolerance(1e-12)
            .with_absolute_tolerance(1e-20)
            .with_linear_solver_type(solver);
        let ordering = Ordering::minimum_degree(&graph);
        let mut optimizer =
            LevenbergMarquardt::with_config(graph.clone(), ordering, initial.clone(), config)?;
        let result = optimizer.optimize()?;

        assert!(result.state.is_converged(), "{solver}: {}", result.state);
        assert!(result.error < 1e-12);
        for (i, rotation) in rotations.iter().enumerate() {
            let estimate = result.values.rot4(r(i as u64))?;
            assert!(estimate.is_approx(rotation, 1e-5));
            assert!(estimate.is_valid(1e-9));
        }
    }
    Ok(())
}

#[test]
fn test_values_retract_rot4_uses_cayley_chart() -> Result<(), Box<dyn std::error::Error>> {
    let mut rng = StdRng::seed_from_u64(3);
    let start = SO4::random(&mut rng);
    let mut values = Values::new();
    values.insert(r(0), start.clone())?;

    let delta = [0.1, -0.2, 0.05, 0.3, 0.0, -0.1];
    let moved = values.retract_key(r(0), &delta)?;
    let back = values.local_coordinates(&moved)?;
    let back = back.get(r(0)).map(|v| v.as_slice().to_vec()).unwrap_or_default();
    for (a, b) in back.iter().zip(delta) {
        assert!((a - b).abs() < 1e-9);
    }
    Ok(())
}

#[test]
fn test_half_turn_is_outside_the_chart() {
    let half_turn = SO4::from_matrix(-Matrix4::identity());
    match half_turn {
        Ok(element) => assert!(matches!(
            element.chart_local(),
            Err(ManifoldError::SingularChart(_))
        )),
        Err(e) => panic!("-I is a valid SO(4) element: {e}"),
    }
}

#[test]
fn test_log_is_unsupported() {
    let result = SO4::identity().log();
    assert!(matches!(result, Err(ManifoldError::Unsupported { .. })));
    assert!(SO4::identity().is_approx(&SO4::identity(), TOLERANCE));
}
