//! Linearized factor graph and its block normal equations

use crate::core::{Key, Ordering, VectorValues};
use crate::linalg::{Damping, LinAlgError, LinAlgResult};
use nalgebra::{DMatrix, DVector};
use std::collections::BTreeMap;

/// One linearized factor: `½‖Σ_k A_k δ_k − b‖²`.
///
/// Blocks and right-hand side are already whitened, with `b = −r`.
#[derive(Debug, Clone, PartialEq)]
pub struct JacobianFactor {
    keys: Vec<Key>,
    blocks: Vec<DMatrix<f64>>,
    rhs: DVector<f64>,
}

impl JacobianFactor {
    pub fn new(keys: Vec<Key>, blocks: Vec<DMatrix<f64>>, rhs: DVector<f64>) -> Self {
        JacobianFactor { keys, blocks, rhs }
    }

    pub fn keys(&self) -> &[Key] {
        &self.keys
    }

    pub fn blocks(&self) -> &[DMatrix<f64>] {
        &self.blocks
    }

    pub fn rhs(&self) -> &DVector<f64> {
        &self.rhs
    }

    /// `½‖Aδ − b‖²`; keys without a delta contribute nothing.
    pub fn error_at(&self, delta: &VectorValues) -> f64 {
        let mut residual = -&self.rhs;
        for (key, block) in self.keys.iter().zip(&self.blocks) {
            if let Some(d) = delta.get(*key) {
                residual += block * d;
            }
        }
        0.5 * residual.norm_squared()
    }
}

/// Damped normal equations in block form, indexed by ordering position.
///
/// Only the lower triangle is kept: `lower[(j, i)]` with `j > i` holds
/// `H_ji`.
#[derive(Debug, Clone, PartialEq)]
pub struct BlockSystem {
    dims: Vec<usize>,
    offsets: Vec<usize>,
    diagonal: Vec<DMatrix<f64>>,
    lower: BTreeMap<(usize, usize), DMatrix<f64>>,
    gradient: Vec<DVector<f64>>,
}

impl BlockSystem {
    /// Number of variables (block rows).
    pub fn num_blocks(&self) -> usize {
        self.dims.len()
    }

    /// Total scalar dimension.
    pub fn dim(&self) -> usize {
        self.dims.iter().sum()
    }

    pub fn block_dims(&self) -> &[usize] {
        &self.dims
    }

    pub fn offsets(&self) -> &[usize] {
        &self.offsets
    }

    pub fn diagonal_block(&self, i: usize) -> &DMatrix<f64> {
        &self.diagonal[i]
    }

    /// `H_ii + λD_i`.
    pub fn damped_diagonal_block(&self, i: usize, damping: &Damping) -> DMatrix<f64> {
        let mut block = self.diagonal[i].clone();
        for k in 0..block.nrows() {
            block[(k, k)] += damping.term(self.diagonal[i][(k, k)]);
        }
        block
    }

    /// Strictly lower blocks `((row, col), H_row,col)` with `row > col`.
    pub fn lower_blocks(&self) -> impl Iterator<Item = ((usize, usize), &DMatrix<f64>)> {
        self.lower.iter().map(|(k, v)| (*k, v))
    }

    pub fn gradient_block(&self, i: usize) -> &DVector<f64> {
        &self.gradient[i]
    }

    /// Stacked right-hand side `Jᵀb`.
    pub fn gradient(&self) -> DVector<f64> {
        let mut stacked = DVector::zeros(self.dim());
        for (i, g) in self.gradient.iter().enumerate() {
            stacked.rows_mut(self.offsets[i], g.len()).copy_from(g);
        }
        stacked
    }

    /// Dense symmetric `H + λD`.
    pub fn to_dense(&self, damping: &Damping) -> DMatrix<f64> {
        let n = self.dim();
        let mut dense = DMatrix::zeros(n, n);
        for i in 0..self.num_blocks() {
            let (o, d) = (self.offsets[i], self.dims[i]);
            dense
                .view_mut((o, o), (d, d))
                .copy_from(&self.damped_diagonal_block(i, damping));
        }
        for (&(row, col), block) in &self.lower {
            let (ro, co) = (self.offsets[row], self.offsets[col]);
            dense.view_mut((ro, co), block.shape()).copy_from(block);
            dense
                .view_mut((co, ro), (block.ncols(), block.nrows()))
                .copy_from(&block.transpose());
        }
        dense
    }
}

/// One [`JacobianFactor`] per nonlinear factor, in factor order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GaussianFactorGraph {
    factors: Vec<JacobianFactor>,
}

impl GaussianFactorGraph {
    pub fn from_factors(factors: Vec<JacobianFactor>) -> Self {
        GaussianFactorGraph { factors }
    }

    pub fn len(&self) -> usize {
        self.factors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factors.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &JacobianFactor> {
        self.factors.iter()
    }

    /// Linear model error `½‖Jδ − b‖²`.
    pub fn error_at(&self, delta: &VectorValues) -> f64 {
        self.factors.iter().map(|f| f.error_at(delta)).sum()
    }

    /// Accumulate `JᵀJ` and `Jᵀb` in factor order.
    pub fn hessian(&self, ordering: &Ordering) -> LinAlgResult<BlockSystem> {
        let n = ordering.len();
        let mut dims: Vec<Option<usize>> = vec![None; n];
        for factor in &self.factors {
            for (key, block) in factor.keys.iter().zip(&factor.blocks) {
                let position = ordering.position(*key).ok_or_else(|| {
                    LinAlgError::MatrixConstruction(format!("{key} is not in the ordering"))
                })?;
                match dims[position] {
                    Some(dim) if dim != block.ncols() => {
                        return Err(LinAlgError::DimensionMismatch {
                            expected: dim,
                            actual: block.ncols(),
                        });
                    }
                    _ => dims[position] = Some(block.ncols()),
                }
            }
        }
        let dims = dims
            .into_iter()
            .enumerate()
            .map(|(i, d)| {
                d.ok_or_else(|| {
                    LinAlgError::MatrixConstruction(format!(
                        "{} is not touched by any factor",
                        ordering[i]
                    ))
                })
            })
            .collect::<LinAlgResult<Vec<_>>>()?;
        let offsets = dims
            .iter()
            .scan(0, |acc, d| {
                let offset = *acc;
                *acc += d;
                Some(offset)
            })
            .collect();

        let mut diagonal: Vec<DMatrix<f64>> = dims.iter().map(|&d| DMatrix::zeros(d, d)).collect();
        let mut gradient: Vec<DVector<f64>> = dims.iter().map(|&d| DVector::zeros(d)).collect();
        let mut lower: BTreeMap<(usize, usize), DMatrix<f64>> = BTreeMap::new();

        for factor in &self.factors {
            let positions: Vec<usize> = factor
                .keys
                .iter()
                .filter_map(|k| ordering.position(*k))
                .collect();
            for (a, block_a) in factor.blocks.iter().enumerate() {
                let pa = positions[a];
                gradient[pa] += block_a.transpose() * &factor.rhs;
                diagonal[pa] += block_a.transpose() * block_a;
                for (b, block_b) in factor.blocks.iter().enumerate() {
                    let pb = positions[b];
                    if pa > pb {
                        *lower
                            .entry((pa, pb))
                            .or_insert_with(|| DMatrix::zeros(dims[pa], dims[pb])) +=
                            block_a.transpose() * block_b;
                    } else if pa == pb && a != b {
                        // the same variable under two blocks
                        diagonal[pa] += block_a.transpose() * block_b;
                    }
                }
            }
        }

        Ok(BlockSystem {
            dims,
            offsets,
            diagonal,
            lower,
            gradient,
        })
    }
}
