//! Manifold representations for optimization on non-Euclidean spaces.
//!
//! This module provides the variable types the optimizer can estimate:
//! - **SO(4)**: rotations in 4D, updated through a Cayley chart
//! - **SO(3)**: rotations in 3D
//! - **SE(3)**: rigid body transformations
//! - **Rⁿ**: plain vectors (landmarks, calibration parameters)
//!
//! Lie group M,° | size | dim | X ∈ M            | Constraint       | T_X M       | Chart retract
//! ------------- | ---- | --- | ---------------- | ---------------- | ----------- | ------------------------
//! n-D vector    | n    | n   | v ∈ Rⁿ           | none             | v ∈ Rⁿ      | v + δ
//! Rotation      | 4    | 3   | q ∈ S³           | q*q = 1          | θ ∈ R³      | q ∘ exp(θ)
//! Rigid motion  | 7    | 6   | M = [R t; 0 1]   | RᵀR = I          | [ρ θ] ∈ R⁶  | M ∘ exp([ρ θ])
//! Rotation      | 16   | 6   | Q ∈ R⁴ˣ⁴         | QᵀQ = I, det = 1 | ξ ∈ R⁶      | Q ∘ cay(ξ)
//!
//! # Charts
//!
//! The optimizer never calls `exp`/`log` directly. It moves variables with
//! [`LieGroup::retract`] and measures differences with [`LieGroup::local`],
//! both of which go through the chart at the origin
//! ([`LieGroup::chart_retract`] / [`LieGroup::chart_local`]) and right
//! composition:
//!
//! ```text
//! retract(X, δ) = X ∘ chart_retract(δ)
//! local(X, Y)   = chart_local(X⁻¹ ∘ Y)
//! ```
//!
//! For most groups the chart is the exponential map. SO(4) has no closed-form
//! logarithm, so it uses the Cayley transform instead, which is cheap and
//! exactly invertible near the origin.
//!
//! # Example
//!
//! ```
//! use lmgraph::manifold::{LieGroup, Tangent, so4::{SO4, SO4Tangent}};
//!
//! let delta = SO4Tangent::from_components(0.1, -0.2, 0.05, 0.3, 0.0, -0.1);
//! let q = SO4::identity().retract(&delta)?;
//! let back = SO4::identity().local(&q)?;
//! assert!((back.coefficients() - delta.coefficients()).norm() < 1e-12);
//! # Ok::<(), lmgraph::manifold::ManifoldError>(())
//! ```

use nalgebra::DVector;
use rand::Rng;
use std::fmt::Debug;
use thiserror::Error;

pub mod rn;
pub mod se3;
pub mod so3;
pub mod so4;

pub use rn::{Point2, Point3, Rn, RnTangent};
pub use se3::{SE3, SE3Tangent};
pub use so3::{SO3, SO3Tangent};
pub use so4::{SO4, SO4Tangent};

/// Tolerance used when checking that a Lie algebra matrix is skew-symmetric.
pub const SKEW_TOLERANCE: f64 = 1e-9;

/// Errors that can occur during manifold operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ManifoldError {
    /// Invalid tangent vector dimension
    #[error("Invalid tangent dimension: expected {expected}, got {actual}")]
    InvalidTangentDimension { expected: usize, actual: usize },

    /// Vee was handed a matrix that is not in the Lie algebra
    #[error("Matrix is not skew-symmetric (asymmetry {asymmetry:.3e})")]
    NotSkewSymmetric { asymmetry: f64 },

    /// The generator eigenvalues are not of the form {±ai, ±bi}
    #[error("Wrong eigenvalue structure: {0}")]
    EigenStructure(String),

    /// The operation has no implementation for this group
    #[error("{operation} is not supported for {group}")]
    Unsupported {
        group: &'static str,
        operation: &'static str,
    },

    /// The chart cannot represent the element (e.g. a Cayley half-turn)
    #[error("Chart is singular: {0}")]
    SingularChart(String),

    /// Invalid manifold element
    #[error("Invalid manifold element: {0}")]
    InvalidElement(String),
}

/// Result type for manifold operations.
pub type ManifoldResult<T> = Result<T, ManifoldError>;

/// Core trait for Lie group operations.
///
/// Provides the group structure (identity, composition, inverse), the
/// logarithm and adjoint, and the chart pair used by the optimizer to update
/// variables and to compute residuals.
///
/// # Dimensions
///
/// - `DIM`: dimension of the space the group acts on (e.g., 3 for SE(3))
/// - `DOF`: degrees of freedom, the tangent space dimension (e.g., 6 for SE(3))
/// - `REP_SIZE`: size of the underlying data representation (e.g., 7 for SE(3))
pub trait LieGroup: Clone + Debug + PartialEq + Send + Sync + 'static {
    /// The tangent space vector type
    type TangentVector: Tangent<Self>;

    /// Square matrix acting on tangent vectors (adjoint, Jacobians)
    type JacobianMatrix: Clone + Debug + PartialEq;

    /// Matrix representation of the Lie algebra
    type LieAlgebra: Clone + Debug + PartialEq;

    /// Space dimension - dimension of the ambient space that the group acts on
    const DIM: usize;

    /// Degrees of freedom - dimension of the tangent space
    const DOF: usize;

    /// Representation size - size of the underlying data representation
    const REP_SIZE: usize;

    /// Get the identity element of the group.
    fn identity() -> Self;

    /// Compute the inverse g⁻¹ such that g ∘ g⁻¹ = e.
    fn inverse(&self) -> Self;

    /// Compose this element with another: g₁ ∘ g₂.
    fn compose(&self, other: &Self) -> Self;

    /// Compute g₁⁻¹ ∘ g₂ (relative transformation).
    fn between(&self, other: &Self) -> Self {
        self.inverse().compose(other)
    }

    /// Logarithmic map from the group to the tangent space.
    ///
    /// Groups without a closed-form logarithm return
    /// [`ManifoldError::Unsupported`] rather than an approximation.
    fn log(&self) -> ManifoldResult<Self::TangentVector>;

    /// Adjoint matrix Ad(g), satisfying (Ad(g) φ)^ = g φ^ g⁻¹.
    fn adjoint(&self) -> Self::JacobianMatrix;

    /// Generate a random element (used for testing and initialization).
    fn random<R: Rng + ?Sized>(rng: &mut R) -> Self;

    /// Check if the element satisfies the group constraint within `tolerance`.
    fn is_valid(&self, tolerance: f64) -> bool;

    /// Element-wise comparison of the underlying representation.
    fn is_approx(&self, other: &Self, tolerance: f64) -> bool;

    /// Chart at the origin: tangent vector to group element.
    ///
    /// Defaults to the exponential map.
    fn chart_retract(tangent: &Self::TangentVector) -> ManifoldResult<Self> {
        tangent.exp()
    }

    /// Chart at the origin: group element to tangent vector.
    ///
    /// Defaults to the logarithmic map. Must invert [`LieGroup::chart_retract`].
    fn chart_local(&self) -> ManifoldResult<Self::TangentVector> {
        self.log()
    }

    /// Move this element by a tangent-space step: X ∘ chart_retract(δ).
    fn retract(&self, tangent: &Self::TangentVector) -> ManifoldResult<Self> {
        Ok(self.compose(&Self::chart_retract(tangent)?))
    }

    /// Tangent-space difference from this element to `other`: chart_local(X⁻¹ ∘ Y).
    fn local(&self, other: &Self) -> ManifoldResult<Self::TangentVector> {
        self.between(other).chart_local()
    }

    /// [`LieGroup::retract`] with the step given as a raw slice.
    fn retract_slice(&self, delta: &[f64]) -> ManifoldResult<Self> {
        self.retract(&Self::TangentVector::from_slice(delta)?)
    }

    /// [`LieGroup::local`] returned as a dynamically sized vector.
    fn local_vector(&self, other: &Self) -> ManifoldResult<DVector<f64>> {
        Ok(self.local(other)?.to_dvector())
    }
}

/// Trait for Lie algebra (tangent space) operations.
///
/// # Type Parameters
///
/// - `G`: The associated Lie group type
pub trait Tangent<G: LieGroup>: Clone + Debug + PartialEq {
    /// Dimension of the tangent space (same as Lie group DOF)
    const DIM: usize = G::DOF;

    /// Exponential map to the Lie group: exp(φ^∧).
    fn exp(&self) -> ManifoldResult<G>;

    /// Hat operator: φ^∧ (vector to Lie algebra matrix).
    fn hat(&self) -> G::LieAlgebra;

    /// Vee operator: X^∨ (Lie algebra matrix to vector).
    ///
    /// Exact left inverse of [`Tangent::hat`]. Fails when `algebra` is not
    /// an element of the Lie algebra.
    fn vee(algebra: &G::LieAlgebra) -> ManifoldResult<Self>;

    /// Zero tangent vector.
    fn zero() -> Self;

    /// Generator matrix Gᵢ = hat(eᵢ).
    ///
    /// # Panics
    /// Panics if `i >= G::DOF`.
    fn generator(i: usize) -> G::LieAlgebra;

    /// Build a tangent vector from raw coefficients.
    fn from_slice(data: &[f64]) -> ManifoldResult<Self>;

    /// Coefficients as a dynamically sized vector.
    fn to_dvector(&self) -> DVector<f64>;

    /// Check if the tangent vector is approximately zero.
    fn is_zero(&self, tolerance: f64) -> bool {
        self.to_dvector().amax() <= tolerance
    }
}

/// Check a coefficient slice against the expected tangent dimension.
pub(crate) fn check_dimension(expected: usize, data: &[f64]) -> ManifoldResult<()> {
    if data.len() != expected {
        return Err(ManifoldError::InvalidTangentDimension {
            expected,
            actual: data.len(),
        });
    }
    Ok(())
}

/// Draw a direction uniformly distributed on the unit sphere.
pub(crate) fn random_unit3<R: Rng + ?Sized>(rng: &mut R) -> nalgebra::Vector3<f64> {
    let z: f64 = rng.random_range(-1.0..=1.0);
    let phi: f64 = rng.random_range(0.0..std::f64::consts::TAU);
    let r = (1.0 - z * z).max(0.0).sqrt();
    nalgebra::Vector3::new(r * phi.cos(), r * phi.sin(), z)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn test_check_dimension() {
        assert!(check_dimension(3, &[0.0, 1.0, 2.0]).is_ok());
        assert_eq!(
            check_dimension(6, &[0.0]),
            Err(ManifoldError::InvalidTangentDimension {
                expected: 6,
                actual: 1
            })
        );
    }

    #[test]
    fn test_random_unit3_is_unit() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..100 {
            let v = random_unit3(&mut rng);
            assert!((v.norm() - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn test_manifold_error_display() {
        let err = ManifoldError::NotSkewSymmetric { asymmetry: 0.5 };
        assert!(err.to_string().contains("not skew-symmetric"));
    }
}
