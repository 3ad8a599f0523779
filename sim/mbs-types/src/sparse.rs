//! Sparse triplet assembly.
//!
//! Every subsystem, constraint and force element contributes small dense
//! blocks to the global matrices (`M`, `W_g`, `W_N`, ...). Contributions are
//! collected as `(row, col, value)` triplets in a [`CooBuilder`] and
//! converted once into a compressed format. Duplicate entries are summed on
//! conversion.
//!
//! # Sparsity Pattern
//!
//! For a system with `nu` generalized velocities and `m` multipliers, a
//! generalized force direction matrix `W` is `nu × m`. Each column only has
//! nonzeros in the velocity rows of the (at most two) subsystems the element
//! couples.

use nalgebra::{DMatrix, DVector};
use nalgebra_sparse::{CooMatrix, CscMatrix};

/// Entries with magnitude below this are not stored.
const DROP_TOLERANCE: f64 = 1e-15;

/// Append-only sparse triplet collector.
#[derive(Debug, Clone)]
pub struct CooBuilder {
    coo: CooMatrix<f64>,
}

impl CooBuilder {
    /// Empty `nrows × ncols` matrix.
    #[must_use]
    pub fn new(nrows: usize, ncols: usize) -> Self {
        Self {
            coo: CooMatrix::new(nrows, ncols),
        }
    }

    /// Number of rows.
    #[must_use]
    pub fn nrows(&self) -> usize {
        self.coo.nrows()
    }

    /// Number of columns.
    #[must_use]
    pub fn ncols(&self) -> usize {
        self.coo.ncols()
    }

    /// Number of stored triplets (duplicates counted separately).
    #[must_use]
    pub fn nnz(&self) -> usize {
        self.coo.nnz()
    }

    /// Add a single entry.
    ///
    /// # Panics
    ///
    /// Panics if `(row, col)` lies outside the matrix.
    pub fn push(&mut self, row: usize, col: usize, value: f64) {
        if value.abs() > DROP_TOLERANCE {
            self.coo.push(row, col, value);
        }
    }

    /// Scatter a dense block onto the given global row and column indices.
    ///
    /// Entry `(i, j)` of `block` lands at `(rows[i], cols[j])`.
    pub fn extend_dense(&mut self, block: &DMatrix<f64>, rows: &[usize], cols: &[usize]) {
        debug_assert_eq!(block.nrows(), rows.len());
        debug_assert_eq!(block.ncols(), cols.len());
        for (j, &col) in cols.iter().enumerate() {
            for (i, &row) in rows.iter().enumerate() {
                self.push(row, col, block[(i, j)]);
            }
        }
    }

    /// Add a dense block with its top-left corner at `(row0, col0)`.
    pub fn extend_block_at(&mut self, block: &DMatrix<f64>, row0: usize, col0: usize) {
        for j in 0..block.ncols() {
            for i in 0..block.nrows() {
                self.push(row0 + i, col0 + j, block[(i, j)]);
            }
        }
    }

    /// Add `scale · B` (or `scale · Bᵀ`) with its top-left corner at
    /// `(row0, col0)`.
    pub fn extend_csc(
        &mut self,
        b: &CscMatrix<f64>,
        scale: f64,
        transpose: bool,
        row0: usize,
        col0: usize,
    ) {
        for (i, j, &v) in b.triplet_iter() {
            if transpose {
                self.push(row0 + j, col0 + i, scale * v);
            } else {
                self.push(row0 + i, col0 + j, scale * v);
            }
        }
    }

    /// Convert to compressed sparse column format.
    #[must_use]
    pub fn into_csc(self) -> CscMatrix<f64> {
        CscMatrix::from(&self.coo)
    }

    /// Dense copy (for small systems and tests).
    #[must_use]
    pub fn to_dense(&self) -> DMatrix<f64> {
        let mut dense = DMatrix::zeros(self.nrows(), self.ncols());
        for (i, j, &v) in self.coo.triplet_iter() {
            dense[(i, j)] += v;
        }
        dense
    }
}

/// Sparse matrix-vector product `A x`.
#[must_use]
pub fn spmv(a: &CscMatrix<f64>, x: &DVector<f64>) -> DVector<f64> {
    debug_assert_eq!(a.ncols(), x.len());
    let mut y = DVector::zeros(a.nrows());
    for (i, j, &v) in a.triplet_iter() {
        y[i] += v * x[j];
    }
    y
}

/// Transposed sparse matrix-vector product `Aᵀ x`.
#[must_use]
pub fn spmv_t(a: &CscMatrix<f64>, x: &DVector<f64>) -> DVector<f64> {
    debug_assert_eq!(a.nrows(), x.len());
    let mut y = DVector::zeros(a.ncols());
    for (i, j, &v) in a.triplet_iter() {
        y[j] += v * x[i];
    }
    y
}

/// Dense copy of a compressed sparse column matrix.
#[must_use]
pub fn csc_to_dense(a: &CscMatrix<f64>) -> DMatrix<f64> {
    let mut dense = DMatrix::zeros(a.nrows(), a.ncols());
    for (i, j, &v) in a.triplet_iter() {
        dense[(i, j)] += v;
    }
    dense
}
