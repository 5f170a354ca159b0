//! Nonlinear factor graph container

use crate::core::{CoreError, CoreResult, Key, Ordering, Values};
use crate::factors::Factor;
use crate::linalg::GaussianFactorGraph;
use nalgebra::DVector;
use rayon::prelude::*;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

/// Statistics about a factor graph
#[derive(Debug, Clone, PartialEq)]
pub struct FactorGraphStatistics {
    pub num_factors: usize,
    pub num_variables: usize,
    pub residual_dimension: usize,
}

impl fmt::Display for FactorGraphStatistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "FactorGraph Statistics:\n\
             Factors: {}\n\
             Variables: {}\n\
             Residual dimension: {}",
            self.num_factors, self.num_variables, self.residual_dimension
        )
    }
}

/// Ordered collection of nonlinear factors.
///
/// Insertion order is the summation order of the total error, so two graphs
/// built the same way evaluate to the same bits.
#[derive(Debug, Clone, Default)]
pub struct FactorGraph {
    factors: Vec<Arc<dyn Factor>>,
}

impl FactorGraph {
    /// Creates a new, empty factor graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a factor and return its index.
    pub fn add(&mut self, factor: impl Factor + 'static) -> usize {
        self.add_shared(Arc::new(factor))
    }

    /// Append an already shared factor and return its index.
    pub fn add_shared(&mut self, factor: Arc<dyn Factor>) -> usize {
        self.factors.push(factor);
        self.factors.len() - 1
    }

    pub fn len(&self) -> usize {
        self.factors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factors.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Arc<dyn Factor>> {
        self.factors.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Factor>> {
        self.factors.iter()
    }

    /// Every key referenced by at least one factor.
    pub fn keys(&self) -> BTreeSet<Key> {
        self.factors
            .iter()
            .flat_map(|factor| factor.keys().iter().copied())
            .collect()
    }

    /// ½ Σ‖whitened residual‖², accumulated in insertion order.
    pub fn error(&self, values: &Values) -> CoreResult<f64> {
        let mut total = 0.0;
        for factor in &self.factors {
            total += factor.error(values)?;
        }
        Ok(total)
    }

    /// All whitened residuals stacked in insertion order.
    pub fn error_vector(&self, values: &Values) -> CoreResult<DVector<f64>> {
        let residuals = self
            .factors
            .iter()
            .map(|factor| factor.whitened_error(values))
            .collect::<CoreResult<Vec<_>>>()?;
        let dim = residuals.iter().map(|r| r.len()).sum();
        let mut stacked = DVector::zeros(dim);
        let mut offset = 0;
        for residual in residuals {
            stacked.rows_mut(offset, residual.len()).copy_from(&residual);
            offset += residual.len();
        }
        Ok(stacked)
    }

    /// Linearize every factor at `values`.
    ///
    /// Factors are linearized in parallel; the result keeps factor order.
    pub fn linearize(&self, values: &Values, ordering: &Ordering) -> CoreResult<GaussianFactorGraph> {
        for factor in &self.factors {
            if let Some(&key) = factor.keys().iter().find(|k| ordering.position(**k).is_none()) {
                return Err(CoreError::MissingVariable { key });
            }
        }
        let factors = self
            .factors
            .par_iter()
            .map(|factor| factor.linearize(values))
            .collect::<CoreResult<Vec<_>>>()?;
        Ok(GaussianFactorGraph::from_factors(factors))
    }

    pub fn statistics(&self) -> FactorGraphStatistics {
        FactorGraphStatistics {
            num_factors: self.len(),
            num_variables: self.keys().len(),
            residual_dimension: self.factors.iter().map(|f| f.dim()).sum(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::NoiseModel;
    use crate::core::key::{l, x};
    use crate::factors::PriorFactor;
    use crate::manifold::{LieGroup, Point2};

    fn prior(key: Key, x: f64, y: f64, sigma: f64) -> PriorFactor<Point2> {
        PriorFactor::new(
            key,
            Point2::from_xy(x, y),
            Arc::new(NoiseModel::Isotropic { dim: 2, sigma }),
        )
    }

    #[test]
    fn test_error_sums_in_order() -> Result<(), Box<dyn std::error::Error>> {
        let mut graph = FactorGraph::new();
        graph.add(prior(l(1), 1.0, 0.0, 1.0));
        graph.add(prior(l(1), 0.0, 2.0, 0.5));

        let mut values = Values::new();
        values.insert(l(1), Point2::identity())?;

        // 0.5 * 1 + 0.5 * (2 / 0.5)^2
        assert!((graph.error(&values)? - 8.5).abs() < 1e-12);
        assert_eq!(graph.error_vector(&values)?.len(), 4);
        assert_eq!(graph.statistics().residual_dimension, 4);
        Ok(())
    }

    #[test]
    fn test_missing_value_is_reported() {
        let mut graph = FactorGraph::new();
        graph.add(prior(l(2), 1.0, 0.0, 1.0));
        assert_eq!(
            graph.error(&Values::new()),
            Err(CoreError::MissingVariable { key: l(2) })
        );
    }

    #[test]
    fn test_linearize_requires_ordered_keys() -> Result<(), Box<dyn std::error::Error>> {
        let mut graph = FactorGraph::new();
        graph.add(prior(l(1), 1.0, 0.0, 1.0));
        let mut values = Values::new();
        values.insert(l(1), Point2::identity())?;
        values.insert(x(1), Point2::identity())?;

        let ordering = Ordering::from_keys([x(1)])?;
        assert!(matches!(
            graph.linearize(&values, &ordering),
            Err(CoreError::MissingVariable { key }) if key == l(1)
        ));

        let linear = graph.linearize(&values, &Ordering::from_keys([l(1)])?)?;
        assert_eq!(linear.len(), 1);
        Ok(())
    }
}
