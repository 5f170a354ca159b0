//! Variable elimination orderings
//!
//! The ordering decides where each variable's block sits in the linear system
//! and the order in which the elimination solver removes variables. It
//! changes fill-in and cost, never the solution.

use crate::core::{CoreError, CoreResult, FactorGraph, Key, Values};
use std::collections::{BTreeMap, BTreeSet};
use std::ops::Index;

/// A permutation of the variables of a problem.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Ordering {
    keys: Vec<Key>,
    positions: BTreeMap<Key, usize>,
}

impl Ordering {
    /// Explicit order. Fails on a repeated key.
    pub fn from_keys(keys: impl IntoIterator<Item = Key>) -> CoreResult<Self> {
        let mut ordering = Ordering::default();
        for key in keys {
            ordering.push(key)?;
        }
        Ok(ordering)
    }

    /// Sorted key order of an assignment.
    pub fn natural(values: &Values) -> Self {
        let keys: Vec<Key> = values.keys().collect();
        let positions = keys.iter().enumerate().map(|(i, k)| (*k, i)).collect();
        Ordering { keys, positions }
    }

    /// Greedy minimum-degree order over the variable adjacency graph.
    pub fn minimum_degree(graph: &FactorGraph) -> Self {
        Self::constrained_first(graph, &[])
    }

    /// `first` eliminated before everything else, each group in minimum-degree order.
    ///
    /// Keys of `first` that no factor references are skipped.
    pub fn constrained_first(graph: &FactorGraph, first: &[Key]) -> Self {
        let mut adjacency = adjacency(graph);
        let constrained: BTreeSet<Key> = first
            .iter()
            .copied()
            .filter(|k| adjacency.contains_key(k))
            .collect();

        let mut ordering = Ordering::default();
        eliminate_greedy(&mut adjacency, &constrained, &mut ordering);
        let rest: BTreeSet<Key> = adjacency.keys().copied().collect();
        eliminate_greedy(&mut adjacency, &rest, &mut ordering);
        ordering
    }

    fn push(&mut self, key: Key) -> CoreResult<()> {
        if self.positions.contains_key(&key) {
            return Err(CoreError::DuplicateKey { key });
        }
        self.positions.insert(key, self.keys.len());
        self.keys.push(key);
        Ok(())
    }

    /// Index of `key` in the ordering.
    pub fn position(&self, key: Key) -> Option<usize> {
        self.positions.get(&key).copied()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = Key> + '_ {
        self.keys.iter().copied()
    }

    pub fn as_slice(&self) -> &[Key] {
        &self.keys
    }

    /// Check that the ordering is a permutation of exactly the graph's
    /// variables and that all of them have values. A factor may name each
    /// variable at most once.
    pub fn validate(&self, graph: &FactorGraph, values: &Values) -> CoreResult<()> {
        for factor in graph.iter() {
            let keys = factor.keys();
            let repeated = keys
                .iter()
                .enumerate()
                .find_map(|(i, key)| keys[..i].contains(key).then_some(*key));
            if let Some(key) = repeated {
                return Err(CoreError::RepeatedFactorKey { key });
            }
        }
        let graph_keys = graph.keys();
        if let Some(&key) = graph_keys.iter().find(|k| !self.positions.contains_key(*k)) {
            return Err(CoreError::MissingVariable { key });
        }
        for &key in &self.keys {
            if !values.contains(key) {
                return Err(CoreError::MissingVariable { key });
            }
            if !graph_keys.contains(&key) {
                return Err(CoreError::UnconstrainedVariable { key });
            }
        }
        Ok(())
    }
}

impl Index<usize> for Ordering {
    type Output = Key;

    fn index(&self, index: usize) -> &Key {
        &self.keys[index]
    }
}

fn adjacency(graph: &FactorGraph) -> BTreeMap<Key, BTreeSet<Key>> {
    let mut adjacency: BTreeMap<Key, BTreeSet<Key>> = BTreeMap::new();
    for factor in graph.iter() {
        let keys = factor.keys();
        for &a in keys {
            let neighbours = adjacency.entry(a).or_default();
            neighbours.extend(keys.iter().copied().filter(|&b| b != a));
        }
    }
    adjacency
}

/// Eliminate every key of `candidates`, always picking the lowest degree
/// (ties by key). Eliminating a key connects its neighbours into a clique.
fn eliminate_greedy(
    adjacency: &mut BTreeMap<Key, BTreeSet<Key>>,
    candidates: &BTreeSet<Key>,
    ordering: &mut Ordering,
) {
    let mut remaining = candidates.clone();
    loop {
        let Some(key) = remaining
            .iter()
            .min_by_key(|k| (adjacency.get(*k).map_or(0, BTreeSet::len), **k))
            .copied()
        else {
            break;
        };
        remaining.remove(&key);
        let neighbours = adjacency.remove(&key).unwrap_or_default();
        for &a in &neighbours {
            if let Some(set) = adjacency.get_mut(&a) {
                set.remove(&key);
                set.extend(neighbours.iter().copied().filter(|&b| b != a));
            }
        }
        ordering.keys.push(key);
        ordering.positions.insert(key, ordering.keys.len() - 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::NoiseModel;
    use crate::core::key::{l, x};
    use crate::factors::BetweenFactor;
    use crate::manifold::{LieGroup, Point2};
    use std::sync::Arc;

    fn star_graph() -> FactorGraph {
        let noise = Arc::new(NoiseModel::unit(2));
        let mut graph = FactorGraph::new();
        for i in 1..=4 {
            graph.add(BetweenFactor::new(
                x(0),
                l(i),
                Point2::identity(),
                noise.clone(),
            ));
        }
        graph
    }

    #[test]
    fn test_from_keys_rejects_duplicates() {
        assert_eq!(
            Ordering::from_keys([x(1), l(1), x(1)]),
            Err(CoreError::DuplicateKey { key: x(1) })
        );
    }

    #[test]
    fn test_minimum_degree_eliminates_leaves_first() {
        let ordering = Ordering::minimum_degree(&star_graph());
        assert_eq!(ordering.as_slice(), &[l(1), l(2), l(3), l(4), x(0)]);
        assert_eq!(ordering.position(x(0)), Some(4));
        assert_eq!(ordering[0], l(1));
    }

    #[test]
    fn test_constrained_first_puts_named_keys_first() {
        let ordering = Ordering::constrained_first(&star_graph(), &[x(0), x(99)]);
        assert_eq!(ordering[0], x(0));
        assert_eq!(ordering.len(), 5);
    }

    #[test]
    fn test_validate() -> Result<(), Box<dyn std::error::Error>> {
        let graph = star_graph();
        let mut values = Values::new();
        for key in [x(0), l(1), l(2), l(3), l(4), l(5)] {
            values.insert(key, Point2::identity())?;
        }

        Ordering::minimum_degree(&graph).validate(&graph, &values)?;

        let missing = Ordering::from_keys([x(0), l(1), l(2), l(3)])?;
        assert_eq!(
            missing.validate(&graph, &values),
            Err(CoreError::MissingVariable { key: l(4) })
        );

        let extra = Ordering::from_keys([x(0), l(1), l(2), l(3), l(4), l(5)])?;
        assert_eq!(
            extra.validate(&graph, &values),
            Err(CoreError::UnconstrainedVariable { key: l(5) })
        );
        Ok(())
    }

    #[test]
    fn test_validate_rejects_repeated_factor_key() -> Result<(), Box<dyn std::error::Error>> {
        let mut graph = star_graph();
        graph.add(BetweenFactor::new(
            l(1),
            l(1),
            Point2::identity(),
            Arc::new(NoiseModel::unit(2)),
        ));
        let mut values = Values::new();
        for key in [x(0), l(1), l(2), l(3), l(4)] {
            values.insert(key, Point2::identity())?;
        }
        assert_eq!(
            Ordering::minimum_degree(&graph).validate(&graph, &values),
            Err(CoreError::RepeatedFactorKey { key: l(1) })
        );
        Ok(())
    }
}
