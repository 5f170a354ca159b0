use super::Factor;
use crate::core::{CoreResult, Key, NoiseModel, ValueType, Values};
use nalgebra::DVector;
use std::sync::Arc;

/// Unary prior pulling a variable towards a fixed element.
///
/// The residual is the chart coordinates of the current value around the
/// prior:
///
/// ```text
/// r = local(prior, x) = chart_local(prior⁻¹ ∘ x)
/// ```
///
/// Priors fix the gauge of a problem (e.g. pinning the first pose of a
/// trajectory to the origin).
#[derive(Debug, Clone)]
pub struct PriorFactor<G: ValueType> {
    keys: [Key; 1],
    prior: G,
    noise: Arc<NoiseModel>,
}

impl<G: ValueType> PriorFactor<G> {
    pub fn new(key: Key, prior: G, noise: Arc<NoiseModel>) -> Self {
        PriorFactor {
            keys: [key],
            prior,
            noise,
        }
    }

    pub fn prior(&self) -> &G {
        &self.prior
    }
}

impl<G: ValueType> Factor for PriorFactor<G> {
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
        let value = values.get_as::<G>(self.keys[0])?;
        Ok(self.prior.local_vector(value)?)
    }
}
