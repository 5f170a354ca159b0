//! Unit tests for factor implementations
//!
//! Residual values, analytic against numerical Jacobians, and the error cases
//! every factor shares.

use super::*;
use crate::core::key::{c, k, l, p, x};
use crate::core::{CoreError, ValueKind};
use crate::manifold::{LieGroup, Point2, Point3, SE3, SO4, SO4Tangent};
use nalgebra::{Matrix3, Vector2, Vector3};
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::sync::Arc;

const TOLERANCE: f64 = 1e-9;

fn navlab_rotation() -> Matrix3<f64> {
    Matrix3::new(0.0, 1.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, -1.0)
}

fn urban_values() -> Result<Values, CoreError> {
    let mut values = Values::new();
    values.insert(
        x(1),
        SE3::from_rotation_translation(&navlab_rotation(), Vector3::zeros()),
    )?;
    values.insert(l(1), Point2::from_xy(2.0, 5.0))?;
    Ok(values)
}

#[test]
fn test_single_measurement_error() -> Result<(), Box<dyn std::error::Error>> {
    let values = urban_values()?;
    let factor = MeasurementFactor::new(x(1), l(1), 4.0, 2.0, Arc::new(NoiseModel::isotropic(2, 0.2)?));
    assert!((factor.error(&values)? - 12.5).abs() < TOLERANCE);
    Ok(())
}

#[test]
fn test_measurement_jacobians_match_numerical() -> Result<(), Box<dyn std::error::Error>> {
    let mut rng = StdRng::seed_from_u64(3);
    let mut values = Values::new();
    values.insert(x(1), SE3::random(&mut rng))?;
    values.insert(l(1), Point2::from_xy(1.5, -3.0))?;
    let factor = MeasurementFactor::new(x(1), l(1), 0.3, 0.7, Arc::new(NoiseModel::unit(2)));

    let analytic = factor.jacobians(&values)?;
    let numerical = numerical_jacobians(&factor, &values)?;
    for (a, n) in analytic.iter().zip(&numerical) {
        assert_eq!(a.shape(), n.shape());
        assert!((a - n).amax() < 1e-7);
    }
    Ok(())
}

#[test]
fn test_linearize_whitens_blocks_and_rhs() -> Result<(), Box<dyn std::error::Error>> {
    let values = urban_values()?;
    let factor = MeasurementFactor::new(x(1), l(1), 4.0, 2.0, Arc::new(NoiseModel::isotropic(2, 0.2)?));
    let linear = factor.linearize(&values)?;
    let raw = factor.jacobians(&values)?;

    assert_eq!(linear.keys(), &[x(1), l(1)]);
    assert!((linear.rhs()[0] + 5.0).abs() < TOLERANCE);
    assert!((&linear.blocks()[0] - &raw[0] * 5.0).amax() < TOLERANCE);
    Ok(())
}

#[test]
fn test_prior_factor_is_zero_at_prior() -> Result<(), Box<dyn std::error::Error>> {
    let mut rng = StdRng::seed_from_u64(4);
    let pose = SE3::random(&mut rng);
    let mut values = Values::new();
    values.insert(x(0), pose.clone())?;

    let factor = PriorFactor::new(x(0), pose, Arc::new(NoiseModel::isotropic(6, 1e-3)?));
    assert!(factor.error(&values)? < TOLERANCE);

    let jacobian = &factor.jacobians(&values)?[0];
    assert!((jacobian - DMatrix::<f64>::identity(6, 6)).amax() < 1e-6);
    Ok(())
}

#[test]
fn test_between_factor_on_so4() -> Result<(), Box<dyn std::error::Error>> {
    let delta = SO4Tangent::from_components(0.1, 0.0, -0.2, 0.05, 0.1, 0.0);
    let measured = SO4::chart_retract(&delta)?;
    let mut values = Values::new();
    values.insert(p(1), SO4::identity())?;
    values.insert(p(2), measured.clone())?;

    let factor = BetweenFactor::new(p(1), p(2), measured, Arc::new(NoiseModel::unit(6)));
    assert!(factor.error(&values)? < TOLERANCE);

    let linear = factor.linearize(&values)?;
    assert_eq!(linear.blocks().len(), 2);
    assert!(linear.blocks().iter().all(|b| b.shape() == (6, 6)));
    Ok(())
}

#[test]
fn test_wrong_kind_is_type_mismatch() -> Result<(), Box<dyn std::error::Error>> {
    let mut values = Values::new();
    values.insert(x(1), Point2::identity())?;
    values.insert(l(1), Point2::identity())?;
    let factor = MeasurementFactor::new(x(1), l(1), 0.0, 0.0, Arc::new(NoiseModel::unit(2)));
    assert_eq!(
        factor.error(&values),
        Err(CoreError::TypeMismatch {
            key: x(1),
            expected: ValueKind::Pose3,
            actual: ValueKind::Point2
        })
    );
    Ok(())
}

#[test]
fn test_projection_factor() -> Result<(), Box<dyn std::error::Error>> {
    let mut values = Values::new();
    values.insert(c(0), SE3::identity())?;
    values.insert(k(0), Point3::from_xyz(500.0, 0.0, 0.0))?;
    values.insert(p(0), Point3::from_xyz(0.1, -0.2, -2.0))?;

    let factor = ProjectionFactor::new(
        c(0),
        k(0),
        p(0),
        Vector2::new(25.0, -50.0),
        Arc::new(NoiseModel::unit(2)),
    );
    assert!((factor.project(&values)? - Vector2::new(25.0, -50.0)).norm() < TOLERANCE);
    assert!(factor.error(&values)? < TOLERANCE);

    let blocks = factor.jacobians(&values)?;
    assert_eq!(blocks[0].shape(), (2, 6));
    assert_eq!(blocks[1].shape(), (2, 3));
    assert_eq!(blocks[2].shape(), (2, 3));
    Ok(())
}

#[test]
fn test_projection_behind_camera() -> Result<(), Box<dyn std::error::Error>> {
    let mut values = Values::new();
    values.insert(c(0), SE3::identity())?;
    values.insert(k(0), Point3::from_xyz(500.0, 0.0, 0.0))?;
    values.insert(p(0), Point3::from_xyz(0.0, 0.0, 2.0))?;

    let factor = ProjectionFactor::new(c(0), k(0), p(0), Vector2::zeros(), Arc::new(NoiseModel::unit(2)));
    assert!(matches!(
        factor.error(&values),
        Err(CoreError::CheiralityViolation { camera, point, .. }) if camera == c(0) && point == p(0)
    ));
    Ok(())
}
