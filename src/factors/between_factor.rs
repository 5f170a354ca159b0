use super::Factor;
use crate::core::{CoreResult, Key, NoiseModel, ValueType, Values};
use nalgebra::DVector;
use std::sync::Arc;

/// Generic between factor for relative measurements on a Lie group.
///
/// Represents a relative measurement `Z` between two variables `X₁` and `X₂`
/// of the same group. Odometry on SE(3), relative rotations on SO(4) and
/// displacements between points all use this factor.
///
/// # Mathematical Formulation
///
/// ```text
/// r = local(Z, X₁⁻¹ ∘ X₂) = chart_local(Z⁻¹ ∘ X₁⁻¹ ∘ X₂)
/// ```
///
/// The residual dimension is the group's DOF and is zero exactly when the
/// predicted relative transform equals the measurement.
///
/// # Jacobian Computation
///
/// The chart of a group need not be the exponential map (SO(4) uses the
/// Cayley transform), so the Jacobian blocks are taken by central
/// differences in each variable's chart.
///
/// # Example
///
/// ```
/// use lmgraph::core::{NoiseModel, Values, key::x};
/// use lmgraph::factors::{BetweenFactor, Factor};
/// use lmgraph::manifold::{LieGroup, SE3};
/// use nalgebra::Vector3;
/// use std::sync::Arc;
///
/// let step = SE3::from_axis_angle_translation(Vector3::zeros(), Vector3::new(1.0, 0.0, 0.0));
/// let factor = BetweenFactor::new(x(1), x(2), step.clone(), Arc::new(NoiseModel::unit(6)));
///
/// let mut values = Values::new();
/// values.insert(x(1), SE3::identity())?;
/// values.insert(x(2), step)?;
/// assert!(factor.error(&values)? < 1e-12);
/// # Ok::<(), lmgraph::core::CoreError>(())
/// ```
#[derive(Debug, Clone)]
pub struct BetweenFactor<G: ValueType> {
    keys: [Key; 2],
    measured: G,
    noise: Arc<NoiseModel>,
}

impl<G: ValueType> BetweenFactor<G> {
    pub fn new(first: Key, second: Key, measured: G, noise: Arc<NoiseModel>) -> Self {
        BetweenFactor {
            keys: [first, second],
            measured,
            noise,
        }
    }

    pub fn measured(&self) -> &G {
        &self.measured
    }
}

impl<G: ValueType> Factor for BetweenFactor<G> {
    fn keys(&self) -> &[Key] {
        &self.keys
    }

    fn dim(&self) -> usize {
        G::DOF
    }

    fn noise(&self) -> &NoiseModel {
        &self.noise
    }

    fn unwhitened_error(&self, values: &Values) -> CoreResult<DVector<f64>> {
        let first = values.get_as::<G>(self.keys[0])?;
        let second = values.get_as::<G>(self.keys[1])?;
        Ok(self.measured.local_vector(&first.between(second))?)
    }
}
