//! SO(4) - Special Orthogonal Group in 4D
//!
//! SO(4) elements are stored as 4×4 orthogonal matrices with unit
//! determinant. The tangent space is R⁶ with the hat convention
//!
//! ```text
//!        ⎡  0   -ξ₂   ξ₁  -ξ₃ ⎤
//! ξ^  =  ⎢  ξ₂   0   -ξ₀  -ξ₄ ⎥
//!        ⎢ -ξ₁   ξ₀   0   -ξ₅ ⎥
//!        ⎣  ξ₃   ξ₄   ξ₅   0  ⎦
//! ```
//!
//! so the upper-left 3×3 block is the SO(3) subgroup.
//!
//! The exponential map is closed form but needs the two rotation rates
//! `a ≥ b ≥ 0` of the generator, obtained from its eigenvalues {±ai, ±bi}.
//! There is no closed-form logarithm, so `log` is unsupported and the
//! optimizer chart is the Cayley transform:
//!
//! ```text
//! chart_retract(ξ) = (I + X)(I - X)⁻¹,  X = (ξ/2)^
//! chart_local(Q)   = -2 · vee((I - Q)(I + Q)⁻¹)
//! ```

use crate::manifold::{
    LieGroup, ManifoldError, ManifoldResult, SKEW_TOLERANCE, Tangent, check_dimension,
    random_unit3,
};
use nalgebra::{DVector, Matrix3, Matrix4, Matrix4x3, Matrix6, SMatrix, SVector, Vector6};
use rand::Rng;
use std::f64::consts::PI;
use std::fmt;
use std::sync::LazyLock;

/// Rotation rates whose gap relative to the larger rate is below this are
/// treated as an isoclinic rotation.
const ISOCLINIC_TOLERANCE: f64 = 1e-5;

/// Rotation rates below this are treated as zero.
const RATE_ZERO_TOLERANCE: f64 = 1e-10;

/// Relative tolerance on the eigenvalue structure check.
const EIGEN_TOLERANCE: f64 = 1e-9;

/// Column-major vectorized generators, one per tangent direction.
pub type VecJacobian = SMatrix<f64, 16, 6>;

/// Jacobian of [`SO4::top_left`], one 3-row block per column.
pub type TopLeftJacobian = SMatrix<f64, 9, 6>;

/// Jacobian of [`SO4::stiefel`], one 4-row block per column.
pub type StiefelJacobian = SMatrix<f64, 12, 6>;

/// The six generators Gᵢ = hat(eᵢ).
static GENERATORS: LazyLock<[Matrix4<f64>; 6]> = LazyLock::new(|| {
    std::array::from_fn(|i| {
        let mut xi = Vector6::zeros();
        xi[i] = 1.0;
        hat_matrix(&xi)
    })
});

/// P = [vec(G₀) … vec(G₅)], the 16×6 projection used by [`SO4::vec_jacobian`].
static P_MATRIX: LazyLock<VecJacobian> = LazyLock::new(|| {
    let mut p = VecJacobian::zeros();
    for (i, generator) in GENERATORS.iter().enumerate() {
        p.set_column(i, &SVector::<f64, 16>::from_column_slice(generator.as_slice()));
    }
    p
});

fn hat_matrix(xi: &Vector6<f64>) -> Matrix4<f64> {
    let mut y = Matrix4::zeros();
    y[(0, 1)] = -xi[2];
    y[(0, 2)] = xi[1];
    y[(1, 2)] = -xi[0];
    y[(0, 3)] = -xi[3];
    y[(1, 3)] = -xi[4];
    y[(2, 3)] = -xi[5];
    y - y.transpose()
}

/// Reads the coefficients off the upper triangle without checking skewness.
fn vee_components(x: &Matrix4<f64>) -> Vector6<f64> {
    Vector6::new(
        -x[(1, 2)],
        x[(0, 2)],
        -x[(0, 1)],
        -x[(0, 3)],
        -x[(1, 3)],
        -x[(2, 3)],
    )
}

/// Rotation rates `(a, b)` with `a ≥ b ≥ 0` of a 4×4 generator.
///
/// The eigenvalues are sorted by decreasing magnitude of their imaginary
/// part and must have the structure {±ai, ±bi} with zero real parts. Any
/// other structure (a non-skew or corrupted generator) is an error.
///
/// All eigen-decomposition access for SO(4) goes through this function.
pub fn rotation_rates(x: &Matrix4<f64>) -> ManifoldResult<(f64, f64)> {
    // The Schur iteration does not terminate on the zero matrix.
    if x.amax() == 0.0 {
        return Ok((0.0, 0.0));
    }
    let tolerance = EIGEN_TOLERANCE * x.amax().max(1.0);

    let mut eigenvalues: Vec<_> = x.complex_eigenvalues().iter().copied().collect();
    eigenvalues.sort_by(|lhs, rhs| rhs.im.abs().total_cmp(&lhs.im.abs()));

    if let Some(e) = eigenvalues.iter().find(|e| e.re.abs() > tolerance) {
        return Err(ManifoldError::EigenStructure(format!(
            "eigenvalue {:.3e}{:+.3e}i has a nonzero real part",
            e.re, e.im
        )));
    }

    let a = eigenvalues[0].im.abs();
    let b = eigenvalues[2].im.abs();
    let paired = (eigenvalues[1].im.abs() - a).abs() <= tolerance
        && (eigenvalues[3].im.abs() - b).abs() <= tolerance;
    let mut imaginary: Vec<f64> = eigenvalues.iter().map(|e| e.im).collect();
    imaginary.sort_by(f64::total_cmp);
    let conjugate =
        (imaginary[0] + imaginary[3]).abs() <= tolerance && (imaginary[1] + imaginary[2]).abs() <= tolerance;

    if !paired || !conjugate {
        return Err(ManifoldError::EigenStructure(format!(
            "expected {{±ai, ±bi}}, got imaginary parts {imaginary:?}"
        )));
    }

    Ok((a, b))
}

/// Derivatives of the first three columns of Q·hat(ξ) with respect to ξ.
///
/// `columns` holds the leading `R` rows of the four columns m₁, m₂, m₃, q
/// of Q. Entry `[c][i]` is the derivative of column `c` along ξᵢ.
fn column_jacobian_blocks<const R: usize>(
    columns: [SVector<f64, R>; 4],
) -> [[SVector<f64, R>; 6]; 3] {
    let [m1, m2, m3, q] = columns;
    let z = SVector::<f64, R>::zeros();
    [
        [z, -m3, m2, q, z, z],
        [m3, z, -m1, z, q, z],
        [-m2, m1, z, z, z, q],
    ]
}

/// SO(4) group element: a 4×4 rotation matrix.
#[derive(Clone, Debug, PartialEq)]
pub struct SO4 {
    matrix: Matrix4<f64>,
}

impl fmt::Display for SO4 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SO4{:.4}", self.matrix)
    }
}

/// SO(4) tangent space element in so(4) ≅ R⁶.
#[derive(Clone, Debug, PartialEq)]
pub struct SO4Tangent {
    data: Vector6<f64>,
}

impl fmt::Display for SO4Tangent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let d = &self.data;
        write!(
            f,
            "so4([{:.4}, {:.4}, {:.4}, {:.4}, {:.4}, {:.4}])",
            d[0], d[1], d[2], d[3], d[4], d[5]
        )
    }
}

impl SO4 {
    /// Create an SO(4) element from a rotation matrix.
    ///
    /// The matrix must be orthogonal with unit determinant to within `1e-6`.
    pub fn from_matrix(matrix: Matrix4<f64>) -> ManifoldResult<Self> {
        let candidate = SO4 { matrix };
        if !candidate.is_valid(1e-6) {
            return Err(ManifoldError::InvalidElement(
                "matrix is not a proper 4D rotation".to_string(),
            ));
        }
        Ok(candidate)
    }

    /// Embed a 3D rotation in the upper-left block.
    pub fn from_rotation3(rotation: &Matrix3<f64>) -> Self {
        let mut matrix = Matrix4::identity();
        matrix.fixed_view_mut::<3, 3>(0, 0).copy_from(rotation);
        SO4 { matrix }
    }

    /// Exponential of an arbitrary generator matrix.
    ///
    /// Uses [`rotation_rates`] to pick the branch of the closed form. A
    /// matrix without the {±ai, ±bi} eigenvalue structure is rejected.
    pub fn exp_generator(x: &Matrix4<f64>) -> ManifoldResult<Self> {
        let identity = Matrix4::identity();
        if x.amax() == 0.0 {
            return Ok(SO4 { matrix: identity });
        }
        let (a, b) = rotation_rates(x)?;

        let x2 = x * x;
        let x3 = x2 * x;

        let matrix = if a < RATE_ZERO_TOLERANCE {
            identity + x + x2 * 0.5
        } else if b < RATE_ZERO_TOLERANCE {
            // Single-plane rotation
            let a2 = a * a;
            let c2 = (1.0 - a.cos()) / a2;
            let c3 = (a - a.sin()) / (a2 * a);
            identity + x + x2 * c2 + x3 * c3
        } else if (a - b).abs() < ISOCLINIC_TOLERANCE * a {
            // The general form divides by b² − a²; the mean rate is accurate
            // to second order in the gap.
            let a = 0.5 * (a + b);
            let (sin_a, cos_a) = a.sin_cos();
            let c0 = (a * sin_a + 2.0 * cos_a) / 2.0;
            let c1 = (3.0 * sin_a - a * cos_a) / (2.0 * a);
            let c2 = sin_a / (2.0 * a);
            let c3 = (sin_a - a * cos_a) / (2.0 * a * a * a);
            identity * c0 + x * c1 + x2 * c2 + x3 * c3
        } else {
            let (sin_a, cos_a) = a.sin_cos();
            let (sin_b, cos_b) = b.sin_cos();
            let (a2, b2) = (a * a, b * b);
            let (a3, b3) = (a2 * a, b2 * b);
            let denominator = b2 - a2;
            let c0 = (b2 * cos_a - a2 * cos_b) / denominator;
            let c1 = (b3 * sin_a - a3 * sin_b) / (a * b * denominator);
            let c2 = (cos_a - cos_b) / denominator;
            let c3 = (b * sin_a - a * sin_b) / (a * b * denominator);
            identity * c0 + x * c1 + x2 * c2 + x3 * c3
        };

        Ok(SO4 { matrix })
    }

    /// Get the rotation matrix (4x4).
    pub fn matrix(&self) -> &Matrix4<f64> {
        &self.matrix
    }

    /// Column-major vectorization of the matrix.
    pub fn vec(&self) -> SVector<f64, 16> {
        SVector::<f64, 16>::from_column_slice(self.matrix.as_slice())
    }

    /// Jacobian of [`SO4::vec`] with respect to a chart perturbation: (I₄ ⊗ Q)·P.
    pub fn vec_jacobian(&self) -> VecJacobian {
        let mut jacobian = VecJacobian::zeros();
        for block in 0..4 {
            let rows = P_MATRIX.fixed_view::<4, 6>(4 * block, 0);
            jacobian
                .fixed_view_mut::<4, 6>(4 * block, 0)
                .copy_from(&(self.matrix * rows));
        }
        jacobian
    }

    /// Upper-left 3×3 block.
    pub fn top_left(&self) -> Matrix3<f64> {
        self.matrix.fixed_view::<3, 3>(0, 0).into_owned()
    }

    /// Jacobian of vec([`SO4::top_left`]) with respect to a chart perturbation.
    pub fn top_left_jacobian(&self) -> TopLeftJacobian {
        let columns = std::array::from_fn(|j| self.matrix.fixed_view::<3, 1>(0, j).into_owned());
        let mut jacobian = TopLeftJacobian::zeros();
        for (column, blocks) in column_jacobian_blocks::<3>(columns).iter().enumerate() {
            for (i, block) in blocks.iter().enumerate() {
                jacobian.fixed_view_mut::<3, 1>(3 * column, i).copy_from(block);
            }
        }
        jacobian
    }

    /// Projection onto the Stiefel manifold V(4, 3): the first three columns.
    pub fn stiefel(&self) -> Matrix4x3<f64> {
        self.matrix.fixed_columns::<3>(0).into_owned()
    }

    /// Jacobian of vec([`SO4::stiefel`]) with respect to a chart perturbation.
    pub fn stiefel_jacobian(&self) -> StiefelJacobian {
        let columns = std::array::from_fn(|j| self.matrix.column(j).into_owned());
        let mut jacobian = StiefelJacobian::zeros();
        for (column, blocks) in column_jacobian_blocks::<4>(columns).iter().enumerate() {
            for (i, block) in blocks.iter().enumerate() {
                jacobian.fixed_view_mut::<4, 1>(4 * column, i).copy_from(block);
            }
        }
        jacobian
    }

    /// Jacobian of the logarithm. SO(4) has no closed-form logarithm.
    pub fn log_jacobian(&self) -> ManifoldResult<Matrix6<f64>> {
        Err(ManifoldError::Unsupported {
            group: "SO4",
            operation: "log Jacobian",
        })
    }
}

impl LieGroup for SO4 {
    type TangentVector = SO4Tangent;
    type JacobianMatrix = Matrix6<f64>;
    type LieAlgebra = Matrix4<f64>;

    const DIM: usize = 4;
    const DOF: usize = 6;
    const REP_SIZE: usize = 16;

    fn identity() -> Self {
        SO4 {
            matrix: Matrix4::identity(),
        }
    }

    fn inverse(&self) -> Self {
        SO4 {
            matrix: self.matrix.transpose(),
        }
    }

    fn compose(&self, other: &Self) -> Self {
        SO4 {
            matrix: self.matrix * other.matrix,
        }
    }

    fn between(&self, other: &Self) -> Self {
        SO4 {
            matrix: self.matrix.transpose() * other.matrix,
        }
    }

    fn log(&self) -> ManifoldResult<SO4Tangent> {
        Err(ManifoldError::Unsupported {
            group: "SO4",
            operation: "log",
        })
    }

    /// Column i is vee(Q Gᵢ Qᵀ).
    fn adjoint(&self) -> Matrix6<f64> {
        let mut adjoint = Matrix6::zeros();
        for (i, generator) in GENERATORS.iter().enumerate() {
            let conjugated = self.matrix * generator * self.matrix.transpose();
            adjoint.set_column(i, &vee_components(&conjugated));
        }
        adjoint
    }

    /// Composes two random single-plane rotations through the exponential map.
    fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let omega1 = random_unit3(rng) * rng.random_range(-PI..=PI);
        let omega2 = random_unit3(rng) * rng.random_range(-PI..=PI);
        let tangent = SO4Tangent::new(Vector6::new(
            omega1.x, omega1.y, omega1.z, omega2.x, omega2.y, omega2.z,
        ));
        // hat() is exactly skew-symmetric, so its eigenvalues are {±ai, ±bi}
        // and the rate check in exp cannot fail.
        tangent
            .exp()
            .expect("exponential of an exactly skew-symmetric generator")
    }

    fn is_valid(&self, tolerance: f64) -> bool {
        let orthogonality = (self.matrix.transpose() * self.matrix - Matrix4::identity()).amax();
        orthogonality <= tolerance && (self.matrix.determinant() - 1.0).abs() <= tolerance
    }

    fn is_approx(&self, other: &Self, tolerance: f64) -> bool {
        (self.matrix - other.matrix).amax() <= tolerance
    }

    fn chart_retract(tangent: &SO4Tangent) -> ManifoldResult<Self> {
        SO4::chart_retract_matrix(&tangent.data)
    }

    fn chart_local(&self) -> ManifoldResult<SO4Tangent> {
        let identity = Matrix4::identity();
        let plus = identity + self.matrix;
        let plus_inverse = plus.try_inverse().ok_or_else(|| {
            ManifoldError::SingularChart(
                "I + Q is singular, the rotation contains a half-turn".to_string(),
            )
        })?;
        let x = (identity - self.matrix) * plus_inverse;
        let xi = SO4Tangent::vee(&x)?;
        Ok(SO4Tangent::new(xi.data * -2.0))
    }
}

impl SO4 {
    /// Cayley map (I + X)(I - X)⁻¹ with X = hat(ξ/2).
    fn chart_retract_matrix(xi: &Vector6<f64>) -> ManifoldResult<Self> {
        let x = hat_matrix(&(xi * 0.5));
        let identity = Matrix4::identity();
        // I - X has eigenvalues 1 ∓ iλ for skew X.
        let minus_inverse = (identity - x).try_inverse().ok_or_else(|| {
            ManifoldError::SingularChart(format!("I - X is singular for ξ = {}", xi.transpose()))
        })?;
        Ok(SO4 {
            matrix: (identity + x) * minus_inverse,
        })
    }
}

impl SO4Tangent {
    /// Create a new tangent vector from its six coefficients.
    pub fn new(data: Vector6<f64>) -> Self {
        SO4Tangent { data }
    }

    /// Create a tangent vector from individual components.
    pub fn from_components(x0: f64, x1: f64, x2: f64, x3: f64, x4: f64, x5: f64) -> Self {
        SO4Tangent::new(Vector6::new(x0, x1, x2, x3, x4, x5))
    }

    /// Get the coefficients.
    pub fn coefficients(&self) -> Vector6<f64> {
        self.data
    }

    /// Right Jacobian of the exponential map. SO(4) has no closed form for it.
    pub fn exp_jacobian(&self) -> ManifoldResult<Matrix6<f64>> {
        Err(ManifoldError::Unsupported {
            group: "SO4",
            operation: "exp Jacobian",
        })
    }
}

impl Tangent<SO4> for SO4Tangent {
    fn exp(&self) -> ManifoldResult<SO4> {
        SO4::exp_generator(&self.hat())
    }

    fn hat(&self) -> Matrix4<f64> {
        hat_matrix(&self.data)
    }

    fn vee(algebra: &Matrix4<f64>) -> ManifoldResult<Self> {
        let asymmetry = (algebra + algebra.transpose()).amax();
        if asymmetry > SKEW_TOLERANCE * algebra.amax().max(1.0) {
            return Err(ManifoldError::NotSkewSymmetric { asymmetry });
        }
        Ok(SO4Tangent::new(vee_components(algebra)))
    }

    fn zero() -> Self {
        SO4Tangent::new(Vector6::zeros())
    }

    fn generator(i: usize) -> Matrix4<f64> {
        GENERATORS[i]
    }

    fn from_slice(data: &[f64]) -> ManifoldResult<Self> {
        check_dimension(6, data)?;
        Ok(SO4Tangent::new(Vector6::from_column_slice(data)))
    }

    fn to_dvector(&self) -> DVector<f64> {
        DVector::from_column_slice(self.data.as_slice())
    }
}
