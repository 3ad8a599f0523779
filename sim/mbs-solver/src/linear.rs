//! The per-step saddle-point system.
//!
//! ```text
//! ⎡  M    -W_g  -W_γ ⎤ ⎡ u   ⎤   ⎡ b_u ⎤
//! ⎢ -W_gᵀ   0     0  ⎥ ⎢ P_g ⎥ = ⎢ χ_g ⎥
//! ⎣ -W_γᵀ   0     0  ⎦ ⎣ P_γ ⎦   ⎣ χ_γ ⎦
//! ```
//!
//! The matrix only depends on the half-step configuration, so it is
//! factorized once per step and reused for every fixed-point iteration.

use nalgebra::{DVector, Dyn, LU};
use nalgebra_sparse::CscMatrix;

use mbs_types::{CooBuilder, MbsError, Result};

/// Factorized saddle-point matrix of one time step.
#[derive(Debug, Clone)]
pub struct SaddlePointSystem {
    nu: usize,
    nla_g: usize,
    nla_gamma: usize,
    lu: LU<f64, Dyn, Dyn>,
}

impl SaddlePointSystem {
    /// Assemble and factorize `A` from `M`, `W_g` and `W_γ`.
    ///
    /// Redundant or conflicting constraints make `A` singular and are
    /// reported as [`MbsError::SingularMatrix`].
    pub fn new(m: &CscMatrix<f64>, w_g: &CscMatrix<f64>, w_gamma: &CscMatrix<f64>) -> Result<Self> {
        let nu = m.nrows();
        for (what, rows) in [("M", m.ncols()), ("W_g", w_g.nrows()), ("W_gamma", w_gamma.nrows())] {
            if rows != nu {
                return Err(MbsError::DimensionMismatch {
                    what,
                    expected: nu,
                    actual: rows,
                });
            }
        }
        let (nla_g, nla_gamma) = (w_g.ncols(), w_gamma.ncols());
        let dim = nu + nla_g + nla_gamma;

        let mut coo = CooBuilder::new(dim, dim);
        coo.extend_csc(m, 1.0, false, 0, 0);
        coo.extend_csc(w_g, -1.0, false, 0, nu);
        coo.extend_csc(w_g, -1.0, true, nu, 0);
        coo.extend_csc(w_gamma, -1.0, false, 0, nu + nla_g);
        coo.extend_csc(w_gamma, -1.0, true, nu + nla_g, 0);

        let lu = coo.to_dense().lu();
        if !lu.is_invertible() {
            return Err(MbsError::SingularMatrix { dim });
        }
        Ok(Self {
            nu,
            nla_g,
            nla_gamma,
            lu,
        })
    }

    /// Dimension of `A`.
    #[must_use]
    pub fn dim(&self) -> usize {
        self.nu + self.nla_g + self.nla_gamma
    }

    /// Number of velocity unknowns.
    #[must_use]
    pub fn nu(&self) -> usize {
        self.nu
    }

    /// Solve `A x = b`.
    pub fn solve(&self, b: &DVector<f64>) -> Result<DVector<f64>> {
        if b.len() != self.dim() {
            return Err(MbsError::DimensionMismatch {
                what: "saddle-point right-hand side",
                expected: self.dim(),
                actual: b.len(),
            });
        }
        self.lu.solve(b).ok_or(MbsError::SingularMatrix { dim: self.dim() })
    }

    /// Split a solution into `(u, P_g, P_γ)`.
    #[must_use]
    pub fn split(&self, x: &DVector<f64>) -> (DVector<f64>, DVector<f64>, DVector<f64>) {
        (
            x.rows(0, self.nu).into_owned(),
            x.rows(self.nu, self.nla_g).into_owned(),
            x.rows(self.nu + self.nla_g, self.nla_gamma).into_owned(),
        )
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn csc(nrows: usize, ncols: usize, entries: &[(usize, usize, f64)]) -> CscMatrix<f64> {
        let mut coo = CooBuilder::new(nrows, ncols);
        for &(i, j, v) in entries {
            coo.push(i, j, v);
        }
        coo.into_csc()
    }

    #[test]
    fn test_unconstrained_system_is_mass_matrix() {
        let m = csc(2, 2, &[(0, 0, 2.0), (1, 1, 4.0)]);
        let empty = csc(2, 0, &[]);
        let a = SaddlePointSystem::new(&m, &empty, &empty).unwrap();
        assert_eq!(a.dim(), 2);
        let x = a.solve(&DVector::from_vec(vec![2.0, 2.0])).unwrap();
        assert_relative_eq!(x, DVector::from_vec(vec![1.0, 0.5]), epsilon = 1e-14);
    }

    #[test]
    fn test_constraint_enforces_velocity_and_returns_percussion() {
        // Two unit masses, constraint u0 - u1 = 0.
        let m = csc(2, 2, &[(0, 0, 1.0), (1, 1, 1.0)]);
        let w_g = csc(2, 1, &[(0, 0, 1.0), (1, 0, -1.0)]);
        let empty = csc(2, 0, &[]);
        let a = SaddlePointSystem::new(&m, &w_g, &empty).unwrap();

        let b = DVector::from_vec(vec![1.0, 0.0, 0.0]);
        let x = a.solve(&b).unwrap();
        let (u, p_g, p_gamma) = a.split(&x);
        assert_relative_eq!(u[0], 0.5, epsilon = 1e-14);
        assert_relative_eq!(u[1], 0.5, epsilon = 1e-14);
        assert_relative_eq!(p_g[0], -0.5, epsilon = 1e-14);
        assert_eq!(p_gamma.len(), 0);
    }

    #[test]
    fn test_velocity_constraint_block() {
        let m = csc(1, 1, &[(0, 0, 3.0)]);
        let empty = csc(1, 0, &[]);
        let w_gamma = csc(1, 1, &[(0, 0, 1.0)]);
        let a = SaddlePointSystem::new(&m, &empty, &w_gamma).unwrap();
        // -(u + χ) = χ_γ with χ_γ = -2 prescribes u = 2.
        let x = a.solve(&DVector::from_vec(vec![0.0, -2.0])).unwrap();
        assert_relative_eq!(x[0], 2.0, epsilon = 1e-14);
        assert_relative_eq!(x[1], 6.0, epsilon = 1e-14);
    }

    #[test]
    fn test_redundant_constraints_are_singular() {
        let m = csc(2, 2, &[(0, 0, 1.0), (1, 1, 1.0)]);
        let w_g = csc(2, 2, &[(0, 0, 1.0), (0, 1, 1.0)]);
        let empty = csc(2, 0, &[]);
        let err = SaddlePointSystem::new(&m, &w_g, &empty).unwrap_err();
        assert_eq!(err, MbsError::SingularMatrix { dim: 4 });
    }

    #[test]
    fn test_rhs_dimension_checked() {
        let m = csc(1, 1, &[(0, 0, 1.0)]);
        let empty = csc(1, 0, &[]);
        let a = SaddlePointSystem::new(&m, &empty, &empty).unwrap();
        assert!(matches!(
            a.solve(&DVector::zeros(3)),
            Err(MbsError::DimensionMismatch { .. })
        ));
    }
}
