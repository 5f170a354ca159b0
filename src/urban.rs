//! Urban robot scenario
//!
//! A vehicle drives through a street and observes landmarks on the ground
//! plane. Robot poses are `x(i)` (`SE3`) and landmarks are `l(j)` (`Point2`).
//! The vehicle body frame follows the Navlab convention: x forward, y right,
//! z down.
//!
//! ```
//! use lmgraph::core::NoiseModel;
//! use lmgraph::urban::UrbanGraph;
//! use std::sync::Arc;
//!
//! let sensor = Arc::new(NoiseModel::unit(4));
//! let mut graph = UrbanGraph::new();
//! graph.add_origin_constraint(1);
//! graph.add_measurement(&sensor, 5.0, 2.0, 0.2, 1, 1)?;
//! graph.add_odometry(1.0, 0.0, 0.01, std::f64::consts::PI / 180.0, 1)?;
//! assert_eq!(graph.len(), 3);
//! # Ok::<(), lmgraph::core::CoreError>(())
//! ```

use crate::core::key::{l, x};
use crate::core::{CoreResult, FactorGraph, NoiseModel, Values};
use crate::factors::{BetweenFactor, MeasurementFactor, PriorFactor};
use crate::manifold::{SE3, SO3};
use nalgebra::{Matrix3, Vector3};
use std::sync::Arc;

pub use crate::core::values::ValuesExt;

/// Standard deviation of the origin prior.
pub const ORIGIN_SIGMA: f64 = 1e-6;

/// Rotation from the Navlab body frame to a world frame with z up and the
/// robot looking along world y.
pub fn navlab_rotation() -> Matrix3<f64> {
    Matrix3::new(0.0, 1.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, -1.0)
}

/// Factor graph builder for the urban scenario.
#[derive(Debug, Clone)]
pub struct UrbanGraph {
    graph: FactorGraph,
    origin: SE3,
}

impl Default for UrbanGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl UrbanGraph {
    /// Empty graph whose origin is the Navlab frame at the world origin.
    pub fn new() -> Self {
        UrbanGraph {
            graph: FactorGraph::new(),
            origin: SE3::from_rotation_translation(&navlab_rotation(), Vector3::zeros()),
        }
    }

    /// Use `origin` for later origin constraints.
    pub fn with_origin(mut self, origin: SE3) -> Self {
        self.origin = origin;
        self
    }

    pub fn origin(&self) -> &SE3 {
        &self.origin
    }

    /// Landmark `landmark` seen at `(dx, dy)` in the frame of robot pose `pose`.
    ///
    /// `sensor` weights the observation when it is two-dimensional; any
    /// other sensor model falls back to an isotropic `sigma`, which must then
    /// be positive.
    pub fn add_measurement(
        &mut self,
        sensor: &Arc<NoiseModel>,
        dx: f64,
        dy: f64,
        sigma: f64,
        pose: u64,
        landmark: u64,
    ) -> CoreResult<()> {
        let noise = if sensor.dim() == 2 {
            Arc::clone(sensor)
        } else {
            Arc::new(NoiseModel::isotropic(2, sigma)?)
        };
        self.graph
            .add(MeasurementFactor::new(x(pose), l(landmark), dx, dy, noise));
        Ok(())
    }

    /// Odometry from `x(from)` to `x(from + 1)`: `dx` forward and `dyaw`
    /// about the body z axis.
    pub fn add_odometry(
        &mut self,
        dx: f64,
        dyaw: f64,
        sigma_translation: f64,
        sigma_yaw: f64,
        from: u64,
    ) -> CoreResult<()> {
        let measured = SE3::new(
            Vector3::new(dx, 0.0, 0.0),
            SO3::from_axis_angle(&Vector3::z(), dyaw),
        );
        let noise = NoiseModel::diagonal(&[
            sigma_translation,
            sigma_translation,
            sigma_translation,
            sigma_yaw,
            sigma_yaw,
            sigma_yaw,
        ])?;
        self.graph
            .add(BetweenFactor::new(x(from), x(from + 1), measured, Arc::new(noise)));
        Ok(())
    }

    /// Pin robot pose `pose` to the graph origin.
    pub fn add_origin_constraint(&mut self, pose: u64) {
        self.graph.add(PriorFactor::new(
            x(pose),
            self.origin.clone(),
            Arc::new(NoiseModel::Isotropic {
                dim: 6,
                sigma: ORIGIN_SIGMA,
            }),
        ));
    }

    pub fn len(&self) -> usize {
        self.graph.len()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.is_empty()
    }

    pub fn error(&self, values: &Values) -> CoreResult<f64> {
        self.graph.error(values)
    }

    pub fn graph(&self) -> &FactorGraph {
        &self.graph
    }

    pub fn into_graph(self) -> FactorGraph {
        self.graph
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifold::LieGroup;

    #[test]
    fn test_add_odometry_error() -> Result<(), Box<dyn std::error::Error>> {
        let mut graph = UrbanGraph::new();
        graph.add_odometry(2.0, 0.0, 0.01, std::f64::consts::PI / 180.0, 1)?;
        assert_eq!(graph.len(), 1);

        let mut values = Values::new();
        values.add_robot_pose(x(1), &navlab_rotation(), Vector3::zeros())?;
        values.add_robot_pose(x(2), &navlab_rotation(), Vector3::new(0.0, 1.0, 0.0))?;

        // one metre short along the body x axis
        let expected = 0.5 / 0.01 / 0.01;
        assert!((graph.error(&values)? - expected).abs() < 1e-6);
        Ok(())
    }

    #[test]
    fn test_origin_constraint() -> Result<(), Box<dyn std::error::Error>> {
        let mut graph = UrbanGraph::new();
        graph.add_origin_constraint(1);
        let mut values = Values::new();
        values.add_robot_pose(x(1), &navlab_rotation(), Vector3::zeros())?;
        assert!(graph.error(&values)? < 1e-12);

        let shifted = UrbanGraph::new().with_origin(SE3::new(Vector3::new(1.0, 0.0, 0.0), SO3::identity()));
        assert_eq!(shifted.origin().translation(), Vector3::new(1.0, 0.0, 0.0));
        Ok(())
    }

    #[test]
    fn test_two_dimensional_sensor_is_used() -> Result<(), Box<dyn std::error::Error>> {
        let sensor = Arc::new(NoiseModel::isotropic(2, 1.0)?);
        let mut graph = UrbanGraph::new();
        graph.add_measurement(&sensor, 4.0, 2.0, 0.2, 1, 1)?;

        let mut values = Values::new();
        values.add_robot_pose(x(1), &navlab_rotation(), Vector3::zeros())?;
        values.add_landmark(l(1), 2.0, 5.0)?;
        assert!((graph.error(&values)? - 0.5).abs() < 1e-9);
        Ok(())
    }
}
