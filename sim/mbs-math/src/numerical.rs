//! Finite-difference Jacobians.
//!
//! Used as the fallback for second-order constraint derivatives that have no
//! analytic form, and to check analytic Jacobians in tests.

use std::convert::Infallible;

use nalgebra::{DMatrix, DVector};

/// Default perturbation size.
pub const DEFAULT_EPS: f64 = 1e-6;

/// Finite-difference scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DiffMethod {
    /// `(f(x + εe_k) - f(x)) / ε`.
    Forward,
    /// `(f(x + εe_k) - f(x - εe_k)) / 2ε`.
    #[default]
    Central,
}

/// Jacobian `∂f/∂x` of a vector-valued function by finite differences.
///
/// The result has `f(x).len()` rows and `x.len()` columns.
pub fn approx_fprime<F>(x: &DVector<f64>, f: F, method: DiffMethod) -> DMatrix<f64>
where
    F: Fn(&DVector<f64>) -> DVector<f64>,
{
    match try_approx_fprime(x, |x| Ok::<_, Infallible>(f(x)), method) {
        Ok(jac) => jac,
        Err(never) => match never {},
    }
}

/// Fallible variant of [`approx_fprime`].
///
/// The first error returned by `f` aborts the evaluation.
pub fn try_approx_fprime<F, E>(x: &DVector<f64>, f: F, method: DiffMethod) -> Result<DMatrix<f64>, E>
where
    F: Fn(&DVector<f64>) -> Result<DVector<f64>, E>,
{
    let eps = DEFAULT_EPS;
    let f0 = f(x)?;
    let mut jac = DMatrix::zeros(f0.len(), x.len());
    let mut xp = x.clone();

    for k in 0..x.len() {
        let xk = x[k];
        let column = match method {
            DiffMethod::Forward => {
                xp[k] = xk + eps;
                let fp = f(&xp)?;
                (fp - &f0) / eps
            }
            DiffMethod::Central => {
                xp[k] = xk + eps;
                let fp = f(&xp)?;
                xp[k] = xk - eps;
                let fm = f(&xp)?;
                (fp - fm) / (2.0 * eps)
            }
        };
        xp[k] = xk;
        jac.set_column(k, &column);
    }
    Ok(jac)
}

/// Derivative of a matrix-valued function, one slice per input component.
///
/// Entry `k` of the result is `∂F/∂x_k` (central differences).
pub fn approx_fprime_matrix<F>(x: &DVector<f64>, f: F) -> Vec<DMatrix<f64>>
where
    F: Fn(&DVector<f64>) -> DMatrix<f64>,
{
    let eps = DEFAULT_EPS;
    let mut xp = x.clone();
    (0..x.len())
        .map(|k| {
            let xk = x[k];
            xp[k] = xk + eps;
            let fp = f(&xp);
            xp[k] = xk - eps;
            let fm = f(&xp);
            xp[k] = xk;
            (fp - fm) / (2.0 * eps)
        })
        .collect()
}
