//! Block Cholesky elimination in ordering order
//!
//! Variables are eliminated one block at a time, in the order of the
//! [`Ordering`](crate::core::Ordering) the system was built with. Eliminating
//! block `i` updates every pair of its remaining neighbours, and a pair that
//! had no block yet becomes fill-in. The ordering changes how much fill-in
//! appears, never the solution.

use crate::linalg::{BlockSystem, Damping, LinAlgError, LinAlgResult, LinearSolver};
use nalgebra::{Cholesky, DMatrix, DVector, Dyn};
use std::collections::BTreeMap;
use tracing::debug;

/// Right-looking block Cholesky factorization `H + λD = L Lᵀ`.
#[derive(Debug, Clone, Default)]
pub struct EliminationSolver {
    fill_in: usize,
}

/// Lower factor: one dense Cholesky per diagonal block and the sub-diagonal
/// blocks of each block column.
struct BlockFactor {
    diagonal: Vec<Cholesky<f64, Dyn>>,
    columns: Vec<BTreeMap<usize, DMatrix<f64>>>,
}

impl EliminationSolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of off-diagonal blocks created by the last factorization.
    pub fn fill_in(&self) -> usize {
        self.fill_in
    }

    fn factorize(&mut self, system: &BlockSystem, damping: &Damping) -> LinAlgResult<BlockFactor> {
        let n = system.num_blocks();
        let mut pending: Vec<DMatrix<f64>> = (0..n)
            .map(|i| system.damped_diagonal_block(i, damping))
            .collect();
        let mut columns: Vec<BTreeMap<usize, DMatrix<f64>>> = vec![BTreeMap::new(); n];
        for ((row, col), block) in system.lower_blocks() {
            columns[col].insert(row, block.clone());
        }

        let mut diagonal = Vec::with_capacity(n);
        let mut fill_in = 0;
        for i in 0..n {
            let pivot = std::mem::replace(&mut pending[i], DMatrix::zeros(0, 0));
            let cholesky = pivot_cholesky(pivot, i)?;

            // L_ji = H_ji L_ii⁻ᵀ
            let l_ii = cholesky.l();
            let mut column = std::mem::take(&mut columns[i]);
            for block in column.values_mut() {
                let solved = l_ii
                    .solve_lower_triangular(&block.transpose())
                    .ok_or(LinAlgError::NotPositiveDefinite { block: i })?;
                *block = solved.transpose();
            }

            // Schur update of the trailing blocks
            for (&j, l_ji) in &column {
                pending[j] -= l_ji * l_ji.transpose();
                for (&k, l_ki) in column.range(..j) {
                    let update = l_ji * l_ki.transpose();
                    match columns[k].get_mut(&j) {
                        Some(existing) => *existing -= update,
                        None => {
                            columns[k].insert(j, -update);
                            fill_in += 1;
                        }
                    }
                }
            }

            columns[i] = column;
            diagonal.push(cholesky);
        }

        self.fill_in = fill_in;
        debug!("Block elimination of {} variables, fill-in {}", n, fill_in);
        Ok(BlockFactor { diagonal, columns })
    }
}

/// Dense Cholesky of one pivot block. A zero or non-finite pivot is rejected.
fn pivot_cholesky(pivot: DMatrix<f64>, block: usize) -> LinAlgResult<Cholesky<f64, Dyn>> {
    let cholesky = Cholesky::new(pivot).ok_or(LinAlgError::NotPositiveDefinite { block })?;
    if cholesky
        .l_dirty()
        .diagonal()
        .iter()
        .any(|d| !d.is_finite() || *d <= 0.0)
    {
        return Err(LinAlgError::NotPositiveDefinite { block });
    }
    Ok(cholesky)
}

impl LinearSolver for EliminationSolver {
    fn solve(&mut self, system: &BlockSystem, damping: &Damping) -> LinAlgResult<DVector<f64>> {
        let factor = self.factorize(system, damping)?;
        let n = system.num_blocks();

        // Forward substitution L y = g
        let mut rhs: Vec<DVector<f64>> = (0..n).map(|i| system.gradient_block(i).clone()).collect();
        let mut y = Vec::with_capacity(n);
        for i in 0..n {
            let y_i = factor.diagonal[i]
                .l_dirty()
                .solve_lower_triangular(&rhs[i])
                .ok_or(LinAlgError::NotPositiveDefinite { block: i })?;
            for (&j, l_ji) in &factor.columns[i] {
                rhs[j] -= l_ji * &y_i;
            }
            y.push(y_i);
        }

        // Back substitution Lᵀ x = y
        let mut x: Vec<DVector<f64>> = vec![DVector::zeros(0); n];
        for i in (0..n).rev() {
            let mut s = y[i].clone();
            for (&j, l_ji) in &factor.columns[i] {
                s -= l_ji.transpose() * &x[j];
            }
            x[i] = factor.diagonal[i]
                .l_dirty()
                .tr_solve_lower_triangular(&s)
                .ok_or(LinAlgError::NotPositiveDefinite { block: i })?;
        }

        let mut delta = DVector::zeros(system.dim());
        for (i, x_i) in x.iter().enumerate() {
            delta.rows_mut(system.offsets()[i], x_i.len()).copy_from(x_i);
        }
        Ok(delta)
    }

    fn name(&self) -> &'static str {
        "elimination"
    }
}
