//! Consistency checks between analytic and numerical Jacobians.
//!
//! Every subsystem and constraint hands out analytic derivatives that the
//! assembler trusts blindly. These helpers differentiate the zeroth-order
//! quantities numerically (central differences) and report every Jacobian
//! whose relative deviation exceeds a tolerance. An empty report means the
//! implementation is consistent at the sampled state.
//!
//! # Example
//!
//! ```
//! use mbs_system::bodies::PointMass;
//! use mbs_system::conformance::check_point_jacobians;
//! use mbs_system::FrameId;
//! use nalgebra::{DVector, Vector3};
//!
//! let pm = PointMass::new(1.0, Vector3::zeros(), Vector3::zeros());
//! let q = DVector::from_vec(vec![1.0, 2.0, 3.0]);
//! let u = DVector::from_vec(vec![0.5, 0.0, -1.0]);
//! let u_dot = DVector::zeros(3);
//! let report = check_point_jacobians(&pm, 0.0, &q, &u, &u_dot, FrameId::BODY, &Vector3::x(), 1e-6);
//! assert!(report.is_empty());
//! ```

use nalgebra::{DMatrix, DVector, Matrix3, Vector3};

use mbs_math::{DiffMethod, approx_fprime, approx_fprime_matrix, ax2skew};
use mbs_types::Result;

use crate::constraints::{BilateralConstraint, numerical_jacobian};
use crate::subsystem::{Bodies, FrameId, Orientable, Subsystem, to_dmatrix};

/// Time step of the finite difference in `t`.
const TIME_EPS: f64 = 1e-6;

/// A Jacobian that disagrees with its numerical counterpart.
#[derive(Debug, Clone, PartialEq)]
pub struct JacobianMismatch {
    /// Which derivative failed.
    pub jacobian: &'static str,
    /// Maximum deviation, relative to `max(1, |numerical|_∞)`.
    /// Infinite if the shapes differ.
    pub max_error: f64,
}

/// Collects mismatches above a tolerance.
struct Report {
    tol: f64,
    mismatches: Vec<JacobianMismatch>,
}

impl Report {
    fn new(tol: f64) -> Self {
        Self {
            tol,
            mismatches: Vec::new(),
        }
    }

    fn compare(&mut self, jacobian: &'static str, analytic: &DMatrix<f64>, numeric: &DMatrix<f64>) {
        let max_error = if analytic.shape() == numeric.shape() {
            let scale = numeric.amax().max(1.0);
            (analytic - numeric).amax() / scale
        } else {
            f64::INFINITY
        };
        if max_error.is_nan() || max_error > self.tol {
            self.mismatches.push(JacobianMismatch {
                jacobian,
                max_error,
            });
        }
    }

    fn compare_vec(&mut self, jacobian: &'static str, analytic: &DVector<f64>, numeric: &DVector<f64>) {
        self.compare(
            jacobian,
            &DMatrix::from_column_slice(analytic.len(), 1, analytic.as_slice()),
            &DMatrix::from_column_slice(numeric.len(), 1, numeric.as_slice()),
        );
    }

    fn compare_slices(&mut self, jacobian: &'static str, analytic: &[DMatrix<f64>], numeric: &[DMatrix<f64>]) {
        if analytic.len() != numeric.len() {
            self.mismatches.push(JacobianMismatch {
                jacobian,
                max_error: f64::INFINITY,
            });
            return;
        }
        let before = self.mismatches.len();
        for (a, n) in analytic.iter().zip(numeric) {
            self.compare(jacobian, a, n);
        }
        // One entry per derivative is enough.
        if self.mismatches.len() > before + 1 {
            let worst = self.mismatches[before..]
                .iter()
                .map(|m| m.max_error)
                .fold(0.0, f64::max);
            self.mismatches.truncate(before);
            self.mismatches.push(JacobianMismatch {
                jacobian,
                max_error: worst,
            });
        }
    }

    fn finish(self) -> Vec<JacobianMismatch> {
        self.mismatches
    }
}

fn vec3(v: Vector3<f64>) -> DVector<f64> {
    DVector::from_column_slice(v.as_slice())
}

fn mat3(m: Matrix3<f64>) -> DMatrix<f64> {
    DMatrix::from_column_slice(3, 3, m.as_slice())
}

fn time_derivative<F>(t: f64, f: F) -> DVector<f64>
where
    F: Fn(f64) -> DVector<f64>,
{
    (f(t + TIME_EPS) - f(t - TIME_EPS)) / (2.0 * TIME_EPS)
}

/// Check the point kinematics of a subsystem at `(t, q, u, u_dot)`.
///
/// Covers `r_OP_q`, `v_P_q`, `J_P`, `J_P_q`, `a_P_q`, `a_P_u` and the
/// consistency `a_P = ∂v_P/∂t + v_P_q q̇ + J_P u̇`.
#[allow(clippy::too_many_arguments)]
#[must_use]
pub fn check_point_jacobians<S>(
    sub: &S,
    t: f64,
    q: &DVector<f64>,
    u: &DVector<f64>,
    u_dot: &DVector<f64>,
    frame: FrameId,
    offset: &Vector3<f64>,
    tol: f64,
) -> Vec<JacobianMismatch>
where
    S: Subsystem + ?Sized,
{
    let mut report = Report::new(tol);
    let fd = DiffMethod::Central;

    let r_q = approx_fprime(q, |x| vec3(sub.r_op(t, x, frame, offset)), fd);
    report.compare("r_op_q", &to_dmatrix(&sub.r_op_q(t, q, frame, offset)), &r_q);

    let v_q = approx_fprime(q, |x| vec3(sub.v_p(t, x, u, frame, offset)), fd);
    report.compare("v_p_q", &to_dmatrix(&sub.v_p_q(t, q, u, frame, offset)), &v_q);

    let j = approx_fprime(u, |x| vec3(sub.v_p(t, q, x, frame, offset)), fd);
    report.compare("j_p", &to_dmatrix(&sub.j_p(t, q, frame, offset)), &j);

    let j_q = approx_fprime_matrix(q, |x| to_dmatrix(&sub.j_p(t, x, frame, offset)));
    let j_q_analytic: Vec<_> = sub.j_p_q(t, q, frame, offset).iter().map(to_dmatrix).collect();
    report.compare_slices("j_p_q", &j_q_analytic, &j_q);

    let a_q = approx_fprime(q, |x| vec3(sub.a_p(t, x, u, u_dot, frame, offset)), fd);
    report.compare("a_p_q", &to_dmatrix(&sub.a_p_q(t, q, u, u_dot, frame, offset)), &a_q);

    let a_u = approx_fprime(u, |x| vec3(sub.a_p(t, q, x, u_dot, frame, offset)), fd);
    report.compare("a_p_u", &to_dmatrix(&sub.a_p_u(t, q, u, u_dot, frame, offset)), &a_u);

    let v_t = time_derivative(t, |s| vec3(sub.v_p(s, q, u, frame, offset)));
    let a = v_t + &v_q * sub.q_dot(t, q, u) + &j * u_dot;
    report.compare_vec("a_p", &vec3(sub.a_p(t, q, u, u_dot, frame, offset)), &a);

    report.finish()
}

/// Check the orientation kinematics of a subsystem at `(t, q, u, u_dot)`.
///
/// Covers `A_IK_q`, `K_Ω_q`, `K_J_R`, `K_J_R_q`, `K_Ψ_q`, `K_Ψ_u` and the
/// consistency `K_Ω̃ = A_IKᵀ Ȧ_IK`.
#[must_use]
pub fn check_orientation_jacobians<S>(
    sub: &S,
    t: f64,
    q: &DVector<f64>,
    u: &DVector<f64>,
    u_dot: &DVector<f64>,
    frame: FrameId,
    tol: f64,
) -> Vec<JacobianMismatch>
where
    S: Subsystem + Orientable + ?Sized,
{
    let mut report = Report::new(tol);
    let fd = DiffMethod::Central;

    let a_q = approx_fprime_matrix(q, |x| mat3(sub.a_ik(t, x, frame)));
    let a_q_analytic: Vec<_> = sub.a_ik_q(t, q, frame).into_iter().map(mat3).collect();
    report.compare_slices("a_ik_q", &a_q_analytic, &a_q);

    let omega_q = approx_fprime(q, |x| vec3(sub.k_omega(t, x, u, frame)), fd);
    report.compare("k_omega_q", &to_dmatrix(&sub.k_omega_q(t, q, u, frame)), &omega_q);

    let j_r = approx_fprime(u, |x| vec3(sub.k_omega(t, q, x, frame)), fd);
    report.compare("k_j_r", &to_dmatrix(&sub.k_j_r(t, q, frame)), &j_r);

    let j_r_q = approx_fprime_matrix(q, |x| to_dmatrix(&sub.k_j_r(t, x, frame)));
    let j_r_q_analytic: Vec<_> = sub.k_j_r_q(t, q, frame).iter().map(to_dmatrix).collect();
    report.compare_slices("k_j_r_q", &j_r_q_analytic, &j_r_q);

    let psi_q = approx_fprime(q, |x| vec3(sub.k_psi(t, x, u, u_dot, frame)), fd);
    report.compare("k_psi_q", &to_dmatrix(&sub.k_psi_q(t, q, u, u_dot, frame)), &psi_q);

    let psi_u = approx_fprime(u, |x| vec3(sub.k_psi(t, q, x, u_dot, frame)), fd);
    report.compare("k_psi_u", &to_dmatrix(&sub.k_psi_u(t, q, u, u_dot, frame)), &psi_u);

    let q_dot = sub.q_dot(t, q, u);
    let a_dot = a_q
        .iter()
        .zip(q_dot.iter())
        .fold(DMatrix::zeros(3, 3), |acc, (a_qk, qk)| acc + a_qk * *qk);
    let omega_tilde = mat3(sub.a_ik(t, q, frame)).transpose() * a_dot;
    report.compare("k_omega", &mat3(ax2skew(&sub.k_omega(t, q, u, frame))), &omega_tilde);

    report.finish()
}

/// Check the Jacobians of a bilateral constraint at a global state.
///
/// `W_g` is always checked against `∂ġ/∂u`. The second-order Jacobians are
/// only checked if the constraint reports analytic ones.
#[allow(clippy::too_many_arguments)]
pub fn check_constraint_jacobians(
    c: &dyn BilateralConstraint,
    bodies: &Bodies,
    t: f64,
    q: &DVector<f64>,
    u: &DVector<f64>,
    u_dot: &DVector<f64>,
    la_g: &DVector<f64>,
    tol: f64,
) -> Result<Vec<JacobianMismatch>> {
    let mut report = Report::new(tol);
    let (q_dof, u_dof) = (c.q_dof(), c.u_dof());

    let w_g_t = numerical_jacobian(&u_dof, u, |x| c.g_dot(bodies, t, q, x))?;
    report.compare("w_g", &c.w_g(bodies, t, q)?.transpose(), &w_g_t);

    if !c.has_analytic_jacobian() {
        return Ok(report.finish());
    }

    let g_q = numerical_jacobian(&q_dof, q, |x| c.g(bodies, t, x))?;
    report.compare("g_q", &c.g_q(bodies, t, q)?, &g_q);

    let g_dot_q = numerical_jacobian(&q_dof, q, |x| c.g_dot(bodies, t, x, u))?;
    report.compare("g_dot_q", &c.g_dot_q(bodies, t, q, u)?, &g_dot_q);

    let g_ddot_q = numerical_jacobian(&q_dof, q, |x| c.g_ddot(bodies, t, x, u, u_dot))?;
    report.compare("g_ddot_q", &c.g_ddot_q(bodies, t, q, u, u_dot)?, &g_ddot_q);

    let g_ddot_u = numerical_jacobian(&u_dof, u, |x| c.g_ddot(bodies, t, q, x, u_dot))?;
    report.compare("g_ddot_u", &c.g_ddot_u(bodies, t, q, u, u_dot)?, &g_ddot_u);

    let wla_g_q = numerical_jacobian(&q_dof, q, |x| Ok(c.w_g(bodies, t, x)? * la_g))?;
    report.compare("wla_g_q", &c.wla_g_q(bodies, t, q, la_g)?, &wla_g_q);

    Ok(report.finish())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;

    #[test]
    fn test_report_flags_shape_mismatch() {
        let mut report = Report::new(1e-6);
        report.compare("x", &DMatrix::zeros(2, 2), &DMatrix::zeros(2, 3));
        let out = report.finish();
        assert_eq!(out.len(), 1);
        assert!(out[0].max_error.is_infinite());
    }

    #[test]
    fn test_report_is_relative_for_large_entries() {
        let mut report = Report::new(1e-6);
        let a = DMatrix::from_element(1, 1, 1e6);
        let n = DMatrix::from_element(1, 1, 1e6 + 0.1);
        report.compare("x", &a, &n);
        assert!(report.finish().is_empty());
    }

    #[test]
    fn test_report_collapses_slices() {
        let mut report = Report::new(1e-6);
        let a = vec![DMatrix::zeros(1, 1); 3];
        let n = vec![
            DMatrix::from_element(1, 1, 0.1),
            DMatrix::from_element(1, 1, 0.3),
            DMatrix::zeros(1, 1),
        ];
        report.compare_slices("x", &a, &n);
        let out = report.finish();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].max_error, 0.3);
    }

    #[test]
    fn test_nan_is_reported() {
        let mut report = Report::new(1e-6);
        report.compare("x", &DMatrix::from_element(1, 1, f64::NAN), &DMatrix::zeros(1, 1));
        assert_eq!(report.finish().len(), 1);
    }
}
