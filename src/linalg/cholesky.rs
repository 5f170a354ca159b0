use crate::linalg::{BlockSystem, Damping, LinAlgError, LinAlgResult, LinearSolver};
use faer::sparse::{SparseColMat, Triplet};
use faer::{
    Mat, Side,
    linalg::solvers::Solve,
    sparse::linalg::solvers::{Llt, SymbolicLlt},
};
use nalgebra::DVector;

/// Sparse Cholesky back end on faer.
///
/// Assembles the damped block system into a `SparseColMat` and factors it
/// with a lower `Llt`. The symbolic analysis is kept and reused while the
/// sparsity pattern stays the same, which is the case across the iterations
/// of one optimization.
#[derive(Debug, Clone, Default)]
pub struct SparseCholeskySolver {
    symbolic_pattern: Option<(Vec<(usize, usize)>, SymbolicLlt<usize>)>,
}

impl SparseCholeskySolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Triplets of the full symmetric `H + λD`.
    fn triplets(system: &BlockSystem, damping: &Damping) -> Vec<Triplet<usize, usize, f64>> {
        let offsets = system.offsets();
        let mut triplets = Vec::new();
        for i in 0..system.num_blocks() {
            let block = system.damped_diagonal_block(i, damping);
            let o = offsets[i];
            for col in 0..block.ncols() {
                for row in 0..block.nrows() {
                    triplets.push(Triplet::new(o + row, o + col, block[(row, col)]));
                }
            }
        }
        for ((block_row, block_col), block) in system.lower_blocks() {
            let (ro, co) = (offsets[block_row], offsets[block_col]);
            for col in 0..block.ncols() {
                for row in 0..block.nrows() {
                    let value = block[(row, col)];
                    triplets.push(Triplet::new(ro + row, co + col, value));
                    triplets.push(Triplet::new(co + col, ro + row, value));
                }
            }
        }
        triplets
    }
}

impl LinearSolver for SparseCholeskySolver {
    fn solve(&mut self, system: &BlockSystem, damping: &Damping) -> LinAlgResult<DVector<f64>> {
        let n = system.dim();
        let triplets = Self::triplets(system, damping);
        let pattern: Vec<(usize, usize)> = triplets.iter().map(|t| (t.row, t.col)).collect();
        let a = SparseColMat::try_new_from_triplets(n, n, &triplets).map_err(|e| {
            LinAlgError::MatrixConstruction(format!("Failed to assemble Hessian: {:?}", e))
        })?;

        let symbolic = match &self.symbolic_pattern {
            Some((cached, symbolic)) if *cached == pattern => symbolic.clone(),
            _ => {
                let symbolic = SymbolicLlt::try_new(a.symbolic(), Side::Lower).map_err(|e| {
                    LinAlgError::FactorizationFailed(format!("Symbolic Cholesky failed: {:?}", e))
                })?;
                self.symbolic_pattern = Some((pattern, symbolic.clone()));
                symbolic
            }
        };

        let cholesky = Llt::try_new_with_symbolic(symbolic, a.as_ref(), Side::Lower)
            .map_err(|_| LinAlgError::NotPositiveDefinite { block: 0 })?;

        let mut b = Mat::zeros(n, 1);
        let gradient = system.gradient();
        for i in 0..n {
            b[(i, 0)] = gradient[i];
        }
        let x = cholesky.solve(&b);
        Ok(DVector::from_fn(n, |i, _| x[(i, 0)]))
    }

    fn name(&self) -> &'static str {
        "sparse-cholesky"
    }
}
