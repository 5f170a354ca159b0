//! SO(3) - Special Orthogonal Group in 3D
//!
//! SO(3) elements are represented using nalgebra's UnitQuaternion internally.
//! SO(3) tangent elements are axis-angle vectors in R³, where the direction
//! gives the axis of rotation and the magnitude gives the angle.

use crate::manifold::{
    LieGroup, ManifoldError, ManifoldResult, SKEW_TOLERANCE, Tangent, check_dimension,
};
use nalgebra::{DVector, Matrix3, Quaternion, Rotation3, Unit, UnitQuaternion, Vector3};
use rand::Rng;
use std::f64::consts::PI;
use std::fmt;

/// Skew-symmetric matrix [v]× such that [v]× w = v × w.
pub fn skew(v: &Vector3<f64>) -> Matrix3<f64> {
    Matrix3::new(0.0, -v.z, v.y, v.z, 0.0, -v.x, -v.y, v.x, 0.0)
}

/// SO(3) group element representing rotations in 3D.
#[derive(Clone, Debug, PartialEq)]
pub struct SO3 {
    /// Internal representation as a unit quaternion
    quaternion: UnitQuaternion<f64>,
}

impl fmt::Display for SO3 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let q = self.quaternion.quaternion();
        write!(
            f,
            "SO3(quaternion: [w: {:.4}, x: {:.4}, y: {:.4}, z: {:.4}])",
            q.w, q.i, q.j, q.k
        )
    }
}

/// SO(3) tangent space element: an axis-angle vector [θx, θy, θz].
#[derive(Clone, Debug, PartialEq)]
pub struct SO3Tangent {
    data: Vector3<f64>,
}

impl fmt::Display for SO3Tangent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "so3(axis-angle: [{:.4}, {:.4}, {:.4}])",
            self.data.x, self.data.y, self.data.z
        )
    }
}

impl SO3 {
    /// Create a new SO(3) element from a unit quaternion.
    pub fn new(quaternion: UnitQuaternion<f64>) -> Self {
        SO3 { quaternion }
    }

    /// Create SO(3) from quaternion coefficients.
    pub fn from_quaternion_coeffs(x: f64, y: f64, z: f64, w: f64) -> Self {
        SO3::new(UnitQuaternion::from_quaternion(Quaternion::new(w, x, y, z)))
    }

    /// Create SO(3) from a rotation matrix.
    ///
    /// The matrix is projected onto the closest rotation first.
    pub fn from_rotation_matrix(matrix: &Matrix3<f64>) -> Self {
        let rotation = Rotation3::from_matrix(matrix);
        SO3::new(UnitQuaternion::from_rotation_matrix(&rotation))
    }

    /// Create SO(3) from Euler angles (roll, pitch, yaw).
    pub fn from_euler_angles(roll: f64, pitch: f64, yaw: f64) -> Self {
        SO3::new(UnitQuaternion::from_euler_angles(roll, pitch, yaw))
    }

    /// Create SO(3) from axis-angle representation.
    pub fn from_axis_angle(axis: &Vector3<f64>, angle: f64) -> Self {
        let unit_axis = Unit::new_normalize(*axis);
        SO3::new(UnitQuaternion::from_axis_angle(&unit_axis, angle))
    }

    /// Create SO(3) from scaled axis (axis-angle vector).
    pub fn from_scaled_axis(axis_angle: Vector3<f64>) -> Self {
        SO3::new(UnitQuaternion::from_scaled_axis(axis_angle))
    }

    /// Get the quaternion representation.
    pub fn quaternion(&self) -> UnitQuaternion<f64> {
        self.quaternion
    }

    /// Get the rotation matrix (3x3).
    pub fn rotation_matrix(&self) -> Matrix3<f64> {
        self.quaternion.to_rotation_matrix().into_inner()
    }

    /// Rotate a vector: R v.
    pub fn act(&self, vector: &Vector3<f64>) -> Vector3<f64> {
        self.quaternion * vector
    }

    /// Rotation angle in [0, π].
    pub fn angle(&self) -> f64 {
        self.quaternion.angle()
    }
}

impl LieGroup for SO3 {
    type TangentVector = SO3Tangent;
    type JacobianMatrix = Matrix3<f64>;
    type LieAlgebra = Matrix3<f64>;

    const DIM: usize = 3;
    const DOF: usize = 3;
    const REP_SIZE: usize = 4;

    fn identity() -> Self {
        SO3 {
            quaternion: UnitQuaternion::identity(),
        }
    }

    fn inverse(&self) -> Self {
        SO3 {
            quaternion: self.quaternion.inverse(),
        }
    }

    fn compose(&self, other: &Self) -> Self {
        SO3 {
            quaternion: self.quaternion * other.quaternion,
        }
    }

    /// θu = Log(q) = (2 / ‖v‖) · v · atan2(‖v‖, w), taking the shorter arc.
    fn log(&self) -> ManifoldResult<SO3Tangent> {
        let q = self.quaternion.quaternion();
        let sin_angle_squared = q.i * q.i + q.j * q.j + q.k * q.k;

        let log_coeff = if sin_angle_squared > f64::EPSILON {
            let sin_angle = sin_angle_squared.sqrt();
            let cos_angle = q.w;
            let two_angle = 2.0
                * if cos_angle < 0.0 {
                    f64::atan2(-sin_angle, -cos_angle)
                } else {
                    f64::atan2(sin_angle, cos_angle)
                };
            two_angle / sin_angle
        } else {
            // Small-angle approximation
            2.0 / q.w
        };

        Ok(SO3Tangent::new(Vector3::new(
            q.i * log_coeff,
            q.j * log_coeff,
            q.k * log_coeff,
        )))
    }

    fn adjoint(&self) -> Matrix3<f64> {
        self.rotation_matrix()
    }

    fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let axis = crate::manifold::random_unit3(rng);
        SO3::from_scaled_axis(axis * rng.random_range(-PI..PI))
    }

    fn is_valid(&self, tolerance: f64) -> bool {
        (self.quaternion.quaternion().norm() - 1.0).abs() < tolerance
    }

    fn is_approx(&self, other: &Self, tolerance: f64) -> bool {
        (self.rotation_matrix() - other.rotation_matrix()).amax() <= tolerance
    }
}

impl SO3Tangent {
    /// Create a new SO3Tangent from axis-angle vector.
    pub fn new(axis_angle: Vector3<f64>) -> Self {
        SO3Tangent { data: axis_angle }
    }

    /// Create SO3Tangent from individual components.
    pub fn from_components(x: f64, y: f64, z: f64) -> Self {
        SO3Tangent::new(Vector3::new(x, y, z))
    }

    /// Get the axis-angle vector.
    pub fn axis_angle(&self) -> Vector3<f64> {
        self.data
    }

    /// Get the rotation angle (norm of the axis-angle vector).
    pub fn angle(&self) -> f64 {
        self.data.norm()
    }

    /// Right Jacobian Jr(θ) of the exponential map.
    ///
    /// Jr(θ) = I - (1 - cos θ)/θ² [θ]× + (θ - sin θ)/θ³ [θ]ײ
    pub fn right_jacobian(&self) -> Matrix3<f64> {
        let theta = self.angle();
        let theta_hat = skew(&self.data);
        if theta < 1e-6 {
            return Matrix3::identity() - theta_hat * 0.5 + theta_hat * theta_hat / 6.0;
        }
        let theta2 = theta * theta;
        Matrix3::identity() - theta_hat * ((1.0 - theta.cos()) / theta2)
            + theta_hat * theta_hat * ((theta - theta.sin()) / (theta2 * theta))
    }
}

impl Tangent<SO3> for SO3Tangent {
    fn exp(&self) -> ManifoldResult<SO3> {
        Ok(SO3::from_scaled_axis(self.data))
    }

    fn hat(&self) -> Matrix3<f64> {
        skew(&self.data)
    }

    fn vee(algebra: &Matrix3<f64>) -> ManifoldResult<Self> {
        let asymmetry = (algebra + algebra.transpose()).amax();
        if asymmetry > SKEW_TOLERANCE * algebra.amax().max(1.0) {
            return Err(ManifoldError::NotSkewSymmetric { asymmetry });
        }
        Ok(SO3Tangent::from_components(
            algebra[(2, 1)],
            algebra[(0, 2)],
            algebra[(1, 0)],
        ))
    }

    fn zero() -> Self {
        SO3Tangent::new(Vector3::zeros())
    }

    fn generator(i: usize) -> Matrix3<f64> {
        let mut e = Vector3::zeros();
        e[i] = 1.0;
        skew(&e)
    }

    fn from_slice(data: &[f64]) -> ManifoldResult<Self> {
        check_dimension(3, data)?;
        Ok(SO3Tangent::new(Vector3::from_column_slice(data)))
    }

    fn to_dvector(&self) -> DVector<f64> {
        DVector::from_column_slice(self.data.as_slice())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    const TOLERANCE: f64 = 1e-12;

    #[test]
    fn test_so3_identity() {
        let so3 = SO3::identity();
        assert_eq!(so3.rotation_matrix(), Matrix3::identity());
        assert!(so3.is_valid(TOLERANCE));
    }

    #[test]
    fn test_so3_exp_log() -> Result<(), Box<dyn std::error::Error>> {
        let tangent = SO3Tangent::from_components(0.3, -0.2, 0.9);
        let so3 = tangent.exp()?;
        let back = so3.log()?;
        assert!((back.axis_angle() - tangent.axis_angle()).norm() < TOLERANCE);
        Ok(())
    }

    #[test]
    fn test_so3_log_near_pi() -> Result<(), Box<dyn std::error::Error>> {
        let so3 = SO3::from_axis_angle(&Vector3::z(), PI - 1e-6);
        let log = so3.log()?;
        assert!((log.angle() - (PI - 1e-6)).abs() < 1e-9);
        Ok(())
    }

    #[test]
    fn test_so3_hat_vee_roundtrip() -> Result<(), Box<dyn std::error::Error>> {
        let tangent = SO3Tangent::from_components(1.5, -2.0, 0.25);
        let back = SO3Tangent::vee(&tangent.hat())?;
        assert_eq!(back, tangent);
        assert!(SO3Tangent::vee(&Matrix3::identity()).is_err());
        Ok(())
    }

    #[test]
    fn test_so3_retract_local() -> Result<(), Box<dyn std::error::Error>> {
        let mut rng = StdRng::seed_from_u64(4);
        let so3 = SO3::random(&mut rng);
        let delta = SO3Tangent::from_components(0.05, 0.1, -0.2);
        let moved = so3.retract(&delta)?;
        let back = so3.local(&moved)?;
        assert!((back.axis_angle() - delta.axis_angle()).norm() < 1e-10);
        Ok(())
    }

    #[test]
    fn test_so3_compose_inverse() {
        let mut rng = StdRng::seed_from_u64(8);
        let a = SO3::random(&mut rng);
        let b = SO3::random(&mut rng);
        assert!(a.compose(&a.inverse()).is_approx(&SO3::identity(), 1e-12));
        let expected = a.rotation_matrix() * b.rotation_matrix();
        assert!((a.compose(&b).rotation_matrix() - expected).amax() < 1e-12);
    }

    #[test]
    fn test_so3_adjoint() -> Result<(), Box<dyn std::error::Error>> {
        let mut rng = StdRng::seed_from_u64(10);
        let so3 = SO3::random(&mut rng);
        let tangent = SO3Tangent::from_components(0.1, 0.2, 0.3);
        let conjugated = so3.rotation_matrix() * tangent.hat() * so3.rotation_matrix().transpose();
        let expected = SO3Tangent::vee(&conjugated)?;
        assert!((so3.adjoint() * tangent.axis_angle() - expected.axis_angle()).norm() < 1e-12);
        Ok(())
    }

    #[test]
    fn test_so3_right_jacobian_numerical() -> Result<(), Box<dyn std::error::Error>> {
        let tangent = SO3Tangent::from_components(0.4, -0.3, 0.7);
        let base = tangent.exp()?;
        let jr = tangent.right_jacobian();
        let h = 1e-6;
        for i in 0..3 {
            let mut step = Vector3::zeros();
            step[i] = h;
            let plus = SO3Tangent::new(tangent.axis_angle() + step).exp()?;
            let minus = SO3Tangent::new(tangent.axis_angle() - step).exp()?;
            let column = (base.local(&plus)?.axis_angle() - base.local(&minus)?.axis_angle())
                / (2.0 * h);
            assert!((column - jr.column(i)).norm() < 1e-8);
        }
        Ok(())
    }

    #[test]
    fn test_so3_from_rotation_matrix() {
        let so3 = SO3::from_euler_angles(0.1, 0.2, 0.3);
        let back = SO3::from_rotation_matrix(&so3.rotation_matrix());
        assert!(back.is_approx(&so3, 1e-12));
    }
}
