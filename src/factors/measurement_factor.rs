use super::Factor;
use crate::core::{CoreResult, Key, NoiseModel, Values};
use crate::manifold::so3::skew;
use nalgebra::{DMatrix, DVector, Vector3};
use std::sync::Arc;

/// Planar landmark observed from a 3D robot pose.
///
/// The landmark `(lx, ly)` lives on the ground plane. It is expressed in the
/// robot frame and compared with the measured offset:
///
/// ```text
/// p = Rᵀ ([lx, ly, 0] − t)
/// r = (p.x − dx, p.y − dy)
/// ```
///
/// Jacobians are analytic. For a right perturbation `[ρ; θ]` of the pose the
/// local point moves by `−ρ + [p]× θ`, and the landmark block is the first
/// two columns of `Rᵀ`.
#[derive(Debug, Clone)]
pub struct MeasurementFactor {
    keys: [Key; 2],
    measured: [f64; 2],
    noise: Arc<NoiseModel>,
}

impl MeasurementFactor {
    pub fn new(pose: Key, landmark: Key, dx: f64, dy: f64, noise: Arc<NoiseModel>) -> Self {
        MeasurementFactor {
            keys: [pose, landmark],
            measured: [dx, dy],
            noise,
        }
    }

    pub fn measured(&self) -> (f64, f64) {
        (self.measured[0], self.measured[1])
    }

    fn local_point(&self, values: &Values) -> CoreResult<Vector3<f64>> {
        let pose = values.pose3(self.keys[0])?;
        let landmark = values.point2(self.keys[1])?.vector();
        Ok(pose.transform_to(&Vector3::new(landmark.x, landmark.y, 0.0)))
    }
}

impl Factor for MeasurementFactor {
    fn keys(&self) -> &[Key] {
        &self.keys
    }

    fn dim(&self) -> usize {
        2
    }

    fn noise(&self) -> &NoiseModel {
        &self.noise
    }

    fn unwhitened_error(&self, values: &Values) -> CoreResult<DVector<f64>> {
        let p = self.local_point(values)?;
        Ok(DVector::from_column_slice(&[
            p.x - self.measured[0],
            p.y - self.measured[1],
        ]))
    }

    fn jacobians(&self, values: &Values) -> CoreResult<Vec<DMatrix<f64>>> {
        let p = self.local_point(values)?;
        let rotation_t = values.pose3(self.keys[0])?.rotation_matrix().transpose();
        let p_hat = skew(&p);

        let mut pose_block = DMatrix::zeros(2, 6);
        for row in 0..2 {
            pose_block[(row, row)] = -1.0;
            for col in 0..3 {
                pose_block[(row, 3 + col)] = p_hat[(row, col)];
            }
        }
        let landmark_block = DMatrix::from_fn(2, 2, |row, col| rotation_t[(row, col)]);
        Ok(vec![pose_block, landmark_block])
    }
}
