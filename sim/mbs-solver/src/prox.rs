//! Contact resolution by proximal point projection.
//!
//! Within one step the percussions are updated by
//!
//! ```text
//! P_N ← prox_ℝ₀⁺(P_N - r_N ∘ ξ_N(u))
//! P_F ← prox_B(μ P_N)(P_F - r_F ∘ ξ_F(u))
//! ```
//!
//! over the active contacts only, with `ξ_N = W_Nᵀ u + ξ_N0` and
//! `ξ_F = W_Fᵀ u + ξ_F0`. The friction disk uses the normal percussion of
//! the same sweep.

use nalgebra::DVector;
use nalgebra_sparse::CscMatrix;

use mbs_math::prox::{prox_r0, prox_sphere};
use mbs_types::sparse::{csc_to_dense, spmv, spmv_t};

use crate::options::ProxScaling;

/// Diagonal entries below this are treated as zero.
const DELASSUS_EPS: f64 = 1e-12;

/// Closed contacts: `g_N ≤ 0`.
#[must_use]
pub fn active_normal_set(g_n: &DVector<f64>) -> Vec<bool> {
    g_n.iter().map(|&g| g <= 0.0).collect()
}

/// Friction directions attached to closed contacts.
///
/// `connectivity[i]` lists the friction indices of normal contact `i`.
#[must_use]
pub fn compute_i_f(i_n: &[bool], connectivity: &[Vec<usize>], nla_f: usize) -> Vec<bool> {
    let mut i_f = vec![false; nla_f];
    for (_, dirs) in i_n.iter().zip(connectivity).filter(|(active, _)| **active) {
        for &k in dirs {
            i_f[k] = true;
        }
    }
    i_f
}

/// Prox radius per column of `W`.
///
/// With [`ProxScaling::Delassus`], each radius is `alpha` divided by the
/// matching diagonal entry of `Wᵀ M⁻¹ W`. If `M` cannot be factorized or
/// an entry vanishes, `alpha` is used instead.
#[must_use]
pub fn estimate_prox_parameter(scaling: ProxScaling, w: &CscMatrix<f64>, m: &CscMatrix<f64>) -> DVector<f64> {
    let n = w.ncols();
    let alpha = match scaling {
        ProxScaling::Constant(r) => return DVector::from_element(n, r),
        ProxScaling::Delassus { alpha } => alpha,
    };
    if n == 0 {
        return DVector::zeros(0);
    }

    let w = csc_to_dense(w);
    let m_inv_w = csc_to_dense(m).cholesky().map(|chol| chol.solve(&w));
    let Some(m_inv_w) = m_inv_w else {
        return DVector::from_element(n, alpha);
    };
    DVector::from_iterator(
        n,
        (0..n).map(|j| {
            let d = w.column(j).dot(&m_inv_w.column(j));
            if d.is_finite() && d > DELASSUS_EPS { alpha / d } else { alpha }
        }),
    )
}

/// Contact data of one step, evaluated at the half-step configuration.
#[derive(Debug, Clone)]
pub struct ContactProblem {
    /// Normal force directions `W_N`.
    pub w_n: CscMatrix<f64>,
    /// Friction force directions `W_F`.
    pub w_f: CscMatrix<f64>,
    /// Constant part of the normal velocity measure.
    pub xi_n0: DVector<f64>,
    /// Constant part of the friction velocity measure.
    pub xi_f0: DVector<f64>,
    /// Closed contacts.
    pub i_n: Vec<bool>,
    /// Friction directions of closed contacts.
    pub i_f: Vec<bool>,
    /// Normal prox radii.
    pub r_n: DVector<f64>,
    /// Friction prox radii, one per friction direction.
    pub r_f: DVector<f64>,
    /// Friction coefficients per normal contact.
    pub mu: DVector<f64>,
    /// Friction indices per normal contact.
    pub connectivity: Vec<Vec<usize>>,
}

impl ContactProblem {
    /// Normal velocity measure `ξ_N = W_Nᵀ u + ξ_N0`.
    #[must_use]
    pub fn xi_n(&self, u: &DVector<f64>) -> DVector<f64> {
        spmv_t(&self.w_n, u) + &self.xi_n0
    }

    /// Friction velocity measure `ξ_F = W_Fᵀ u + ξ_F0`.
    #[must_use]
    pub fn xi_f(&self, u: &DVector<f64>) -> DVector<f64> {
        spmv_t(&self.w_f, u) + &self.xi_f0
    }

    /// One projection sweep given the trial velocity `u`.
    ///
    /// Entries of inactive contacts are left untouched.
    pub fn project(&self, u: &DVector<f64>, p_n: &mut DVector<f64>, p_f: &mut DVector<f64>) {
        let xi_n = self.xi_n(u);
        for (i, _) in self.i_n.iter().enumerate().filter(|(_, active)| **active) {
            p_n[i] = prox_r0(p_n[i] - self.r_n[i] * xi_n[i]);
        }

        let xi_f = self.xi_f(u);
        for (i, dirs) in self.connectivity.iter().enumerate() {
            if !self.i_n[i] || dirs.is_empty() {
                continue;
            }
            let trial = DVector::from_iterator(dirs.len(), dirs.iter().map(|&k| p_f[k] - self.r_f[k] * xi_f[k]));
            let projected = prox_sphere(&trial, self.mu[i] * p_n[i]);
            for (&k, &v) in dirs.iter().zip(projected.iter()) {
                p_f[k] = v;
            }
        }
    }

    /// Generalized contact percussion `W_N P_N + W_F P_F` over the active
    /// sets.
    #[must_use]
    pub fn forcing(&self, p_n: &DVector<f64>, p_f: &DVector<f64>) -> DVector<f64> {
        spmv(&self.w_n, &mask(p_n, &self.i_n)) + spmv(&self.w_f, &mask(p_f, &self.i_f))
    }

    /// Percussions restricted to the active sets.
    #[must_use]
    pub fn restrict(&self, p_n: &DVector<f64>, p_f: &DVector<f64>) -> (DVector<f64>, DVector<f64>) {
        (mask(p_n, &self.i_n), mask(p_f, &self.i_f))
    }
}

/// Zero every entry whose flag is unset.
fn mask(v: &DVector<f64>, active: &[bool]) -> DVector<f64> {
    DVector::from_iterator(v.len(), v.iter().zip(active).map(|(&x, &a)| if a { x } else { 0.0 }))
}
