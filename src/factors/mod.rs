//! Factor implementations for the factor graph
//!
//! A factor is a probabilistic constraint on one or more variables. It
//! produces a residual that is whitened by its noise model, so the factor's
//! contribution to the total error is `½‖Σ^{-1/2} r(x)‖²`.
//!
//! # Module Structure
//!
//! - `prior_factor`: unary prior on any stored Lie group
//! - `between_factor`: relative measurement between two variables of one group
//! - `measurement_factor`: planar landmark observation from a 3D pose
//! - `projection_factor`: BAL camera projection with radial distortion
//!
//! Jacobians are always taken with respect to each variable's local chart
//! coordinates. Factors without a closed form fall back to central
//! differences through [`Values::retract_key`].

use crate::core::{CoreResult, Key, NoiseModel, Values};
use crate::linalg::JacobianFactor;
use nalgebra::{DMatrix, DVector};
use std::fmt;

pub mod between_factor;
pub mod measurement_factor;
pub mod prior_factor;
pub mod projection_factor;

pub use between_factor::BetweenFactor;
pub use measurement_factor::MeasurementFactor;
pub use prior_factor::PriorFactor;
pub use projection_factor::ProjectionFactor;

/// Step used by numerical differentiation in chart coordinates.
pub const NUMERICAL_STEP: f64 = 1e-6;

/// Nonlinear factor interface.
pub trait Factor: fmt::Debug + Send + Sync {
    /// Keys of the variables this factor connects, in Jacobian block order.
    fn keys(&self) -> &[Key];

    /// Residual dimension.
    fn dim(&self) -> usize;

    fn noise(&self) -> &NoiseModel;

    /// Residual before whitening.
    fn unwhitened_error(&self, values: &Values) -> CoreResult<DVector<f64>>;

    /// Unwhitened Jacobian blocks, one per key.
    ///
    /// The default implementation uses central differences in each
    /// variable's chart.
    fn jacobians(&self, values: &Values) -> CoreResult<Vec<DMatrix<f64>>> {
        numerical_jacobians(self, values)
    }

    fn whitened_error(&self, values: &Values) -> CoreResult<DVector<f64>> {
        self.noise().whiten(&self.unwhitened_error(values)?)
    }

    /// ½‖whitened residual‖²
    fn error(&self, values: &Values) -> CoreResult<f64> {
        Ok(0.5 * self.whitened_error(values)?.norm_squared())
    }

    /// Whitened Jacobian blocks and right-hand side `b = −whitened residual`.
    fn linearize(&self, values: &Values) -> CoreResult<JacobianFactor> {
        let residual = self.whitened_error(values)?;
        let blocks = self
            .jacobians(values)?
            .iter()
            .map(|jacobian| self.noise().whiten_matrix(jacobian))
            .collect::<CoreResult<Vec<_>>>()?;
        Ok(JacobianFactor::new(self.keys().to_vec(), blocks, -residual))
    }
}

/// Central-difference Jacobians of [`Factor::unwhitened_error`].
pub fn numerical_jacobians<F: Factor + ?Sized>(
    factor: &F,
    values: &Values,
) -> CoreResult<Vec<DMatrix<f64>>> {
    let local = values.restrict(factor.keys())?;
    let rows = factor.dim();
    let mut blocks = Vec::with_capacity(factor.keys().len());
    for &key in factor.keys() {
        let dim = local.get(key)?.dim();
        let mut block = DMatrix::zeros(rows, dim);
        let mut delta = vec![0.0; dim];
        for j in 0..dim {
            delta[j] = NUMERICAL_STEP;
            let plus = factor.unwhitened_error(&local.retract_key(key, &delta)?)?;
            delta[j] = -NUMERICAL_STEP;
            let minus = factor.unwhitened_error(&local.retract_key(key, &delta)?)?;
            delta[j] = 0.0;
            block
                .column_mut(j)
                .copy_from(&((plus - minus) / (2.0 * NUMERICAL_STEP)));
        }
        blocks.push(block);
    }
    Ok(blocks)
}

#[cfg(test)]
mod tests;
