//! Rⁿ - Euclidean vector space as a (commutative) Lie group under addition
//!
//! Landmarks, 3D points and camera calibration blocks live here. The group
//! operation is addition, so exp, log and the chart are all the identity map
//! and the adjoint is the identity matrix.

use crate::manifold::{LieGroup, ManifoldResult, Tangent, check_dimension};
use nalgebra::{DVector, SMatrix, SVector, Vector2, Vector3};
use rand::Rng;
use std::fmt;

/// Rⁿ group element.
#[derive(Clone, Debug, PartialEq)]
pub struct Rn<const N: usize> {
    data: SVector<f64, N>,
}

/// Rⁿ tangent vector.
#[derive(Clone, Debug, PartialEq)]
pub struct RnTangent<const N: usize> {
    data: SVector<f64, N>,
}

/// A 2D point (e.g. a planar landmark).
pub type Point2 = Rn<2>;

/// A 3D point (e.g. a structure point or camera calibration).
pub type Point3 = Rn<3>;

impl<const N: usize> fmt::Display for Rn<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "R{}(", N)?;
        for (i, v) in self.data.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{:.4}", v)?;
        }
        write!(f, ")")
    }
}

impl<const N: usize> Rn<N> {
    pub fn new(data: SVector<f64, N>) -> Self {
        Rn { data }
    }

    pub fn from_slice(data: &[f64]) -> ManifoldResult<Self> {
        check_dimension(N, data)?;
        Ok(Rn {
            data: SVector::from_column_slice(data),
        })
    }

    pub fn vector(&self) -> &SVector<f64, N> {
        &self.data
    }
}

impl Point2 {
    pub fn from_xy(x: f64, y: f64) -> Self {
        Rn::new(Vector2::new(x, y))
    }
}

impl Point3 {
    pub fn from_xyz(x: f64, y: f64, z: f64) -> Self {
        Rn::new(Vector3::new(x, y, z))
    }
}

impl<const N: usize> LieGroup for Rn<N> {
    type TangentVector = RnTangent<N>;
    type JacobianMatrix = SMatrix<f64, N, N>;
    type LieAlgebra = SVector<f64, N>;

    const DIM: usize = N;
    const DOF: usize = N;
    const REP_SIZE: usize = N;

    fn identity() -> Self {
        Rn {
            data: SVector::zeros(),
        }
    }

    fn inverse(&self) -> Self {
        Rn { data: -self.data }
    }

    fn compose(&self, other: &Self) -> Self {
        Rn {
            data: self.data + other.data,
        }
    }

    fn log(&self) -> ManifoldResult<RnTangent<N>> {
        Ok(RnTangent { data: self.data })
    }

    fn adjoint(&self) -> SMatrix<f64, N, N> {
        SMatrix::identity()
    }

    fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Rn {
            data: SVector::from_fn(|_, _| rng.random_range(-1.0..1.0)),
        }
    }

    fn is_valid(&self, _tolerance: f64) -> bool {
        self.data.iter().all(|v| v.is_finite())
    }

    fn is_approx(&self, other: &Self, tolerance: f64) -> bool {
        (self.data - other.data).amax() <= tolerance
    }
}

impl<const N: usize> RnTangent<N> {
    pub fn new(data: SVector<f64, N>) -> Self {
        RnTangent { data }
    }

    pub fn vector(&self) -> &SVector<f64, N> {
        &self.data
    }
}

impl<const N: usize> Tangent<Rn<N>> for RnTangent<N> {
    fn exp(&self) -> ManifoldResult<Rn<N>> {
        Ok(Rn { data: self.data })
    }

    fn hat(&self) -> SVector<f64, N> {
        self.data
    }

    fn vee(algebra: &SVector<f64, N>) -> ManifoldResult<Self> {
        Ok(RnTangent { data: *algebra })
    }

    fn zero() -> Self {
        RnTangent {
            data: SVector::zeros(),
        }
    }

    fn generator(i: usize) -> SVector<f64, N> {
        let mut e = SVector::zeros();
        e[i] = 1.0;
        e
    }

    fn from_slice(data: &[f64]) -> ManifoldResult<Self> {
        check_dimension(N, data)?;
        Ok(RnTangent {
            data: SVector::from_column_slice(data),
        })
    }

    fn to_dvector(&self) -> DVector<f64> {
        DVector::from_column_slice(self.data.as_slice())
    }
}
