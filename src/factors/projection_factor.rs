use super::Factor;
use crate::core::{CoreError, CoreResult, Key, NoiseModel, Values};
use nalgebra::{DVector, Vector2};
use std::sync::Arc;

/// Reprojection error of a BAL camera with two-term radial distortion.
///
/// Connects a camera pose (`SE3`, world to camera), its calibration
/// `[f, k1, k2]` (`Point3`) and a structure point (`Point3`). The camera
/// looks down its negative z axis:
///
/// ```text
/// P = R X + t
/// p = −P.xy / P.z
/// r(p) = 1 + k1‖p‖² + k2‖p‖⁴
/// residual = f r(p) p − measured
/// ```
///
/// Points with `P.z ≥ 0` are behind the camera and yield
/// [`CoreError::CheiralityViolation`].
#[derive(Debug, Clone)]
pub struct ProjectionFactor {
    keys: [Key; 3],
    measured: Vector2<f64>,
    noise: Arc<NoiseModel>,
}

impl ProjectionFactor {
    pub fn new(
        camera: Key,
        calibration: Key,
        point: Key,
        measured: Vector2<f64>,
        noise: Arc<NoiseModel>,
    ) -> Self {
        ProjectionFactor {
            keys: [camera, calibration, point],
            measured,
            noise,
        }
    }

    pub fn measured(&self) -> &Vector2<f64> {
        &self.measured
    }

    /// Predicted image coordinates of the point.
    pub fn project(&self, values: &Values) -> CoreResult<Vector2<f64>> {
        let [camera_key, calibration_key, point_key] = self.keys;
        let camera = values.pose3(camera_key)?;
        let calibration = values.point3(calibration_key)?.vector();
        let point = values.point3(point_key)?.vector();

        let in_camera = camera.transform_from(point);
        if in_camera.z >= 0.0 {
            return Err(CoreError::CheiralityViolation {
                camera: camera_key,
                point: point_key,
                depth: in_camera.z,
            });
        }
        let p = -in_camera.xy() / in_camera.z;
        let (f, k1, k2) = (calibration[0], calibration[1], calibration[2]);
        let r2 = p.norm_squared();
        let distortion = 1.0 + k1 * r2 + k2 * r2 * r2;
        Ok(p * (f * distortion))
    }
}

impl Factor for ProjectionFactor {
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
        let residual = self.project(values)? - self.measured;
        Ok(DVector::from_column_slice(residual.as_slice()))
    }
}
