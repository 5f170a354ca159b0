//! Gaussian noise models
//!
//! A noise model whitens a residual `r` into `Σ^{-1/2} r` so that every
//! factor contributes `½‖Σ^{-1/2} r‖²` to the total error. Models are
//! immutable and shared between factors through `Arc`.

use crate::core::{CoreError, CoreResult};
use nalgebra::{DMatrix, DVector};

/// Zero-mean Gaussian noise with a diagonal covariance.
#[derive(Debug, Clone, PartialEq)]
pub enum NoiseModel {
    /// Identity covariance
    Unit(usize),
    /// The same standard deviation on every axis
    Isotropic { dim: usize, sigma: f64 },
    /// One standard deviation per axis
    Diagonal(DVector<f64>),
}

impl NoiseModel {
    pub fn unit(dim: usize) -> Self {
        NoiseModel::Unit(dim)
    }

    /// `sigma` must be positive and finite.
    pub fn isotropic(dim: usize, sigma: f64) -> CoreResult<Self> {
        check_sigma(0, sigma)?;
        Ok(NoiseModel::Isotropic { dim, sigma })
    }

    /// Every entry of `sigmas` must be positive and finite.
    pub fn diagonal(sigmas: &[f64]) -> CoreResult<Self> {
        for (axis, &sigma) in sigmas.iter().enumerate() {
            check_sigma(axis, sigma)?;
        }
        Ok(NoiseModel::Diagonal(DVector::from_column_slice(sigmas)))
    }

    /// Residual dimension the model applies to.
    pub fn dim(&self) -> usize {
        match self {
            NoiseModel::Unit(dim) => *dim,
            NoiseModel::Isotropic { dim, .. } => *dim,
            NoiseModel::Diagonal(sigmas) => sigmas.len(),
        }
    }

    /// Standard deviation of axis `i`.
    pub fn sigma(&self, i: usize) -> f64 {
        match self {
            NoiseModel::Unit(_) => 1.0,
            NoiseModel::Isotropic { sigma, .. } => *sigma,
            NoiseModel::Diagonal(sigmas) => sigmas[i],
        }
    }

    /// Scale a residual by the inverse standard deviations.
    pub fn whiten(&self, residual: &DVector<f64>) -> CoreResult<DVector<f64>> {
        self.check(residual.len())?;
        Ok(DVector::from_fn(residual.len(), |i, _| {
            residual[i] / self.sigma(i)
        }))
    }

    /// Scale the rows of a Jacobian block by the inverse standard deviations.
    pub fn whiten_matrix(&self, jacobian: &DMatrix<f64>) -> CoreResult<DMatrix<f64>> {
        self.check(jacobian.nrows())?;
        let mut whitened = jacobian.clone();
        for (i, mut row) in whitened.row_iter_mut().enumerate() {
            row /= self.sigma(i);
        }
        Ok(whitened)
    }

    fn check(&self, actual: usize) -> CoreResult<()> {
        if actual != self.dim() {
            return Err(CoreError::DimensionMismatch {
                expected: self.dim(),
                actual,
            });
        }
        Ok(())
    }
}

fn check_sigma(axis: usize, sigma: f64) -> CoreResult<()> {
    if sigma > 0.0 && sigma.is_finite() {
        Ok(())
    } else {
        Err(CoreError::InvalidNoise { axis, sigma })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::dvector;

    #[test]
    fn test_isotropic_whiten() -> Result<(), Box<dyn std::error::Error>> {
        let noise = NoiseModel::isotropic(2, 0.2)?;
        let whitened = noise.whiten(&dvector![1.0, -0.5])?;
        assert!((whitened - dvector![5.0, -2.5]).norm() < 1e-12);
        Ok(())
    }

    #[test]
    fn test_diagonal_whiten_matrix() -> Result<(), Box<dyn std::error::Error>> {
        let noise = NoiseModel::diagonal(&[0.5, 2.0])?;
        let jacobian = DMatrix::from_row_slice(2, 2, &[1.0, 2.0, 4.0, 8.0]);
        let whitened = noise.whiten_matrix(&jacobian)?;
        assert_eq!(whitened, DMatrix::from_row_slice(2, 2, &[2.0, 4.0, 2.0, 4.0]));
        Ok(())
    }

    #[test]
    fn test_rejects_invalid_sigma() {
        assert_eq!(
            NoiseModel::isotropic(2, 0.0),
            Err(CoreError::InvalidNoise { axis: 0, sigma: 0.0 })
        );
        assert!(NoiseModel::isotropic(2, -1.0).is_err());
        assert!(NoiseModel::isotropic(2, f64::NAN).is_err());
        assert_eq!(
            NoiseModel::diagonal(&[1.0, f64::INFINITY]),
            Err(CoreError::InvalidNoise {
                axis: 1,
                sigma: f64::INFINITY
            })
        );
    }

    #[test]
    fn test_dimension_mismatch() {
        let noise = NoiseModel::unit(3);
        assert_eq!(
            noise.whiten(&dvector![1.0]),
            Err(CoreError::DimensionMismatch {
                expected: 3,
                actual: 1
            })
        );
    }
}
