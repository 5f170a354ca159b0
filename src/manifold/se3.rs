//! SE(3) - Special Euclidean Group in 3D
//!
//! SE(3) elements are rigid body transformations stored as an SO(3) rotation
//! and a translation vector. The tangent vector is ordered `[ρ; θ]`:
//! translation part first, rotation part second.
//!
//! ```text
//! exp([ρ; θ]) = ( Exp(θ), V(θ) ρ )
//! V(θ)        = I + (1 - cos θ)/θ² [θ]× + (θ - sin θ)/θ³ [θ]ײ
//! ```

use crate::manifold::so3::{SO3, SO3Tangent, skew};
use crate::manifold::{
    LieGroup, ManifoldError, ManifoldResult, SKEW_TOLERANCE, Tangent, check_dimension,
};
use nalgebra::{DVector, Isometry3, Matrix3, Matrix4, Matrix6, Translation3, Vector3, Vector6};
use rand::Rng;
use std::fmt;

/// SE(3) group element representing rigid body transformations in 3D.
#[derive(Clone, Debug, PartialEq)]
pub struct SE3 {
    rotation: SO3,
    translation: Vector3<f64>,
}

impl fmt::Display for SE3 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let t = &self.translation;
        let q = self.rotation.quaternion();
        write!(
            f,
            "SE3(translation: [{:.4}, {:.4}, {:.4}], rotation: [w: {:.4}, x: {:.4}, y: {:.4}, z: {:.4}])",
            t.x, t.y, t.z, q.w, q.i, q.j, q.k
        )
    }
}

/// SE(3) tangent space element `[ρ; θ]`.
#[derive(Clone, Debug, PartialEq)]
pub struct SE3Tangent {
    data: Vector6<f64>,
}

impl fmt::Display for SE3Tangent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let d = &self.data;
        write!(
            f,
            "se3(rho: [{:.4}, {:.4}, {:.4}], theta: [{:.4}, {:.4}, {:.4}])",
            d[0], d[1], d[2], d[3], d[4], d[5]
        )
    }
}

/// V(θ), the left Jacobian of SO(3), which maps ρ to the SE(3) translation.
fn v_matrix(theta: &Vector3<f64>) -> Matrix3<f64> {
    let angle = theta.norm();
    let theta_hat = skew(theta);
    let theta_hat2 = theta_hat * theta_hat;
    if angle < 1e-6 {
        return Matrix3::identity() + theta_hat * 0.5 + theta_hat2 / 6.0;
    }
    let angle2 = angle * angle;
    Matrix3::identity()
        + theta_hat * ((1.0 - angle.cos()) / angle2)
        + theta_hat2 * ((angle - angle.sin()) / (angle2 * angle))
}

/// V(θ)⁻¹ in closed form.
fn v_matrix_inverse(theta: &Vector3<f64>) -> Matrix3<f64> {
    let angle = theta.norm();
    let theta_hat = skew(theta);
    let theta_hat2 = theta_hat * theta_hat;
    if angle < 1e-6 {
        return Matrix3::identity() - theta_hat * 0.5 + theta_hat2 / 12.0;
    }
    let half = 0.5 * angle;
    let coefficient = (1.0 - half / half.tan()) / (angle * angle);
    Matrix3::identity() - theta_hat * 0.5 + theta_hat2 * coefficient
}

impl SE3 {
    /// Create a new SE(3) element from translation and rotation.
    pub fn new(translation: Vector3<f64>, rotation: SO3) -> Self {
        SE3 {
            rotation,
            translation,
        }
    }

    /// Create SE(3) from a rotation matrix and a translation.
    pub fn from_rotation_translation(rotation: &Matrix3<f64>, translation: Vector3<f64>) -> Self {
        SE3::new(translation, SO3::from_rotation_matrix(rotation))
    }

    /// Create SE(3) from an axis-angle rotation and a translation.
    pub fn from_axis_angle_translation(axis_angle: Vector3<f64>, translation: Vector3<f64>) -> Self {
        SE3::new(translation, SO3::from_scaled_axis(axis_angle))
    }

    /// Create SE(3) from a nalgebra isometry.
    pub fn from_isometry(isometry: &Isometry3<f64>) -> Self {
        SE3::new(isometry.translation.vector, SO3::new(isometry.rotation))
    }

    /// Convert to a nalgebra isometry.
    pub fn isometry(&self) -> Isometry3<f64> {
        Isometry3::from_parts(
            Translation3::from(self.translation),
            self.rotation.quaternion(),
        )
    }

    /// Get the rotation part.
    pub fn rotation(&self) -> &SO3 {
        &self.rotation
    }

    /// Get the rotation matrix (3x3).
    pub fn rotation_matrix(&self) -> Matrix3<f64> {
        self.rotation.rotation_matrix()
    }

    /// Get the translation part.
    pub fn translation(&self) -> Vector3<f64> {
        self.translation
    }

    /// Get the homogeneous transformation matrix (4x4).
    pub fn matrix(&self) -> Matrix4<f64> {
        self.isometry().to_homogeneous()
    }

    /// Transform a point from the local frame to the world frame: R p + t.
    pub fn transform_from(&self, point: &Vector3<f64>) -> Vector3<f64> {
        self.rotation.act(point) + self.translation
    }

    /// Transform a world point into the local frame: Rᵀ (p - t).
    pub fn transform_to(&self, point: &Vector3<f64>) -> Vector3<f64> {
        self.rotation.inverse().act(&(point - self.translation))
    }
}

impl LieGroup for SE3 {
    type TangentVector = SE3Tangent;
    type JacobianMatrix = Matrix6<f64>;
    type LieAlgebra = Matrix4<f64>;

    const DIM: usize = 3;
    const DOF: usize = 6;
    const REP_SIZE: usize = 7;

    fn identity() -> Self {
        SE3::new(Vector3::zeros(), SO3::identity())
    }

    fn inverse(&self) -> Self {
        let rotation_inverse = self.rotation.inverse();
        let translation = -rotation_inverse.act(&self.translation);
        SE3::new(translation, rotation_inverse)
    }

    fn compose(&self, other: &Self) -> Self {
        SE3::new(
            self.rotation.act(&other.translation) + self.translation,
            self.rotation.compose(&other.rotation),
        )
    }

    fn log(&self) -> ManifoldResult<SE3Tangent> {
        let theta = self.rotation.log()?.axis_angle();
        let rho = v_matrix_inverse(&theta) * self.translation;
        Ok(SE3Tangent::new(rho, theta))
    }

    /// Ad = [[R, [t]× R], [0, R]] for the `[ρ; θ]` ordering.
    fn adjoint(&self) -> Matrix6<f64> {
        let rotation = self.rotation_matrix();
        let mut adjoint = Matrix6::zeros();
        adjoint.fixed_view_mut::<3, 3>(0, 0).copy_from(&rotation);
        adjoint.fixed_view_mut::<3, 3>(3, 3).copy_from(&rotation);
        adjoint
            .fixed_view_mut::<3, 3>(0, 3)
            .copy_from(&(skew(&self.translation) * rotation));
        adjoint
    }

    fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let translation = Vector3::new(
            rng.random_range(-1.0..1.0),
            rng.random_range(-1.0..1.0),
            rng.random_range(-1.0..1.0),
        );
        SE3::new(translation, SO3::random(rng))
    }

    fn is_valid(&self, tolerance: f64) -> bool {
        self.rotation.is_valid(tolerance) && self.translation.iter().all(|v| v.is_finite())
    }

    fn is_approx(&self, other: &Self, tolerance: f64) -> bool {
        self.rotation.is_approx(&other.rotation, tolerance)
            && (self.translation - other.translation).amax() <= tolerance
    }
}

impl SE3Tangent {
    /// Create a tangent vector from its translational and rotational parts.
    pub fn new(rho: Vector3<f64>, theta: Vector3<f64>) -> Self {
        SE3Tangent {
            data: Vector6::new(rho.x, rho.y, rho.z, theta.x, theta.y, theta.z),
        }
    }

    /// Translational part ρ.
    pub fn rho(&self) -> Vector3<f64> {
        self.data.fixed_rows::<3>(0).into_owned()
    }

    /// Rotational part θ.
    pub fn theta(&self) -> Vector3<f64> {
        self.data.fixed_rows::<3>(3).into_owned()
    }

    /// All six coefficients.
    pub fn coefficients(&self) -> Vector6<f64> {
        self.data
    }
}

impl Tangent<SE3> for SE3Tangent {
    fn exp(&self) -> ManifoldResult<SE3> {
        let theta = self.theta();
        let rotation = SO3Tangent::new(theta).exp()?;
        Ok(SE3::new(v_matrix(&theta) * self.rho(), rotation))
    }

    fn hat(&self) -> Matrix4<f64> {
        let mut algebra = Matrix4::zeros();
        algebra
            .fixed_view_mut::<3, 3>(0, 0)
            .copy_from(&skew(&self.theta()));
        algebra.fixed_view_mut::<3, 1>(0, 3).copy_from(&self.rho());
        algebra
    }

    fn vee(algebra: &Matrix4<f64>) -> ManifoldResult<Self> {
        let block = algebra.fixed_view::<3, 3>(0, 0);
        let asymmetry = (&block + block.transpose()).amax().max(algebra.row(3).amax());
        if asymmetry > SKEW_TOLERANCE * algebra.amax().max(1.0) {
            return Err(ManifoldError::NotSkewSymmetric { asymmetry });
        }
        Ok(SE3Tangent::new(
            Vector3::new(algebra[(0, 3)], algebra[(1, 3)], algebra[(2, 3)]),
            Vector3::new(algebra[(2, 1)], algebra[(0, 2)], algebra[(1, 0)]),
        ))
    }

    fn zero() -> Self {
        SE3Tangent {
            data: Vector6::zeros(),
        }
    }

    fn generator(i: usize) -> Matrix4<f64> {
        let mut data = Vector6::zeros();
        data[i] = 1.0;
        SE3Tangent { data }.hat()
    }

    fn from_slice(data: &[f64]) -> ManifoldResult<Self> {
        check_dimension(6, data)?;
        Ok(SE3Tangent {
            data: Vector6::from_column_slice(data),
        })
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
    fn test_se3_identity() {
        let se3 = SE3::identity();
        assert_eq!(se3.matrix(), Matrix4::identity());
    }

    #[test]
    fn test_se3_exp_log() -> Result<(), Box<dyn std::error::Error>> {
        let tangent = SE3Tangent::new(Vector3::new(1.0, -0.5, 2.0), Vector3::new(0.2, 0.4, -0.1));
        let se3 = tangent.exp()?;
        let back = se3.log()?;
        assert!((back.coefficients() - tangent.coefficients()).norm() < 1e-10);
        Ok(())
    }

    #[test]
    fn test_se3_exp_matches_matrix_exponential() -> Result<(), Box<dyn std::error::Error>> {
        let tangent = SE3Tangent::new(Vector3::new(0.3, 0.1, -0.7), Vector3::new(0.5, -0.2, 0.9));
        let x = tangent.hat();
        let mut expected = Matrix4::identity();
        let mut term = Matrix4::identity();
        for k in 1..30 {
            term = term * x / k as f64;
            expected += term;
        }
        assert!((tangent.exp()?.matrix() - expected).amax() < 1e-10);
        Ok(())
    }

    #[test]
    fn test_se3_hat_vee_roundtrip() -> Result<(), Box<dyn std::error::Error>> {
        let tangent = SE3Tangent::new(Vector3::new(1.0, 2.0, 3.0), Vector3::new(-0.1, 0.2, -0.3));
        assert_eq!(SE3Tangent::vee(&tangent.hat())?, tangent);
        assert!(SE3Tangent::vee(&Matrix4::identity()).is_err());
        Ok(())
    }

    #[test]
    fn test_se3_compose_inverse() {
        let mut rng = StdRng::seed_from_u64(12);
        let a = SE3::random(&mut rng);
        let b = SE3::random(&mut rng);
        assert!(a.compose(&a.inverse()).is_approx(&SE3::identity(), 1e-12));
        assert!((a.compose(&b).matrix() - a.matrix() * b.matrix()).amax() < 1e-12);
    }

    #[test]
    fn test_se3_transform_to_from() {
        let mut rng = StdRng::seed_from_u64(14);
        let pose = SE3::random(&mut rng);
        let point = Vector3::new(1.0, 2.0, 3.0);
        let local = pose.transform_to(&point);
        assert!((pose.transform_from(&local) - point).norm() < TOLERANCE);
    }

    #[test]
    fn test_se3_retract_local() -> Result<(), Box<dyn std::error::Error>> {
        let mut rng = StdRng::seed_from_u64(15);
        let pose = SE3::random(&mut rng);
        let delta = SE3Tangent::new(Vector3::new(0.1, -0.2, 0.05), Vector3::new(0.02, 0.01, -0.03));
        let moved = pose.retract(&delta)?;
        let back = pose.local(&moved)?;
        assert!((back.coefficients() - delta.coefficients()).norm() < 1e-10);
        Ok(())
    }

    #[test]
    fn test_se3_adjoint() -> Result<(), Box<dyn std::error::Error>> {
        let mut rng = StdRng::seed_from_u64(16);
        let pose = SE3::random(&mut rng);
        let tangent = SE3Tangent::new(Vector3::new(0.3, 0.2, 0.1), Vector3::new(0.1, -0.2, 0.3));
        let conjugated = pose.matrix() * tangent.hat() * pose.inverse().matrix();
        let expected = SE3Tangent::vee(&conjugated)?;
        let actual = pose.adjoint() * tangent.coefficients();
        assert!((actual - expected.coefficients()).norm() < 1e-10);
        Ok(())
    }
}
