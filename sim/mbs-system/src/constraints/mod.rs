//! Bilateral constraints.
//!
//! A bilateral constraint couples two subsystems through a holonomic
//! constraint `g(t, q) = 0` with `m` rows, enforced by Lagrange multipliers
//! (percussions) in the same linear system as the dynamics:
//!
//! - [`Rod`] - distance between two points (1 row)
//! - [`RigidConnection`] - fixed relative pose (6 rows)
//! - [`Revolute`] - rotation about one axis (5 rows), also a
//!   [`RotationalTransmission`]
//!
//! Velocity-level constraints `γ(t, q, u) = 0` that are not derivatives of a
//! position constraint implement [`VelocityConstraint`], e.g.
//! [`PointVelocity`].
//!
//! # Local layout
//!
//! All local quantities follow the binding order: the first `nq1` columns
//! (or `nu1` rows of `W_g`) belong to the first subsystem. The assembler
//! scatters them with [`BilateralConstraint::q_dof`] and
//! [`BilateralConstraint::u_dof`].
//!
//! # Second-order Jacobians
//!
//! `g_q`, `g_dot_q`, `g_ddot_q`, `g_ddot_u` and `wla_g_q` are only needed by
//! Newton-type solvers. Constraints that implement them analytically report
//! [`BilateralConstraint::has_analytic_jacobian`]; for the others the
//! assembler falls back to [`numerical_jacobian`] explicitly.

mod pose;
mod revolute;
mod rigid_connection;
mod rod;
mod velocity;

pub use revolute::Revolute;
pub use rigid_connection::RigidConnection;
pub use rod::Rod;
pub use velocity::{PointVelocity, VelocityConstraint};

use nalgebra::{DMatrix, DVector};

use mbs_math::{DiffMethod, try_approx_fprime};
use mbs_types::{MbsError, Result};

use crate::subsystem::Bodies;

/// A holonomic bilateral constraint between two subsystems.
#[allow(clippy::too_many_arguments)]
pub trait BilateralConstraint {
    /// Human-readable name used in diagnostics.
    fn name(&self) -> &str;

    /// Number of constraint rows.
    fn nla_g(&self) -> usize;

    /// Initial multipliers.
    fn la_g0(&self) -> DVector<f64> {
        DVector::zeros(self.nla_g())
    }

    /// Global coordinate indices, in local order.
    fn q_dof(&self) -> Vec<usize>;

    /// Global velocity indices, in local order.
    fn u_dof(&self) -> Vec<usize>;

    /// Constraint residual `g`.
    fn g(&self, bodies: &Bodies, t: f64, q: &DVector<f64>) -> Result<DVector<f64>>;

    /// `ġ = W_gᵀ u + χ_g`.
    fn g_dot(&self, bodies: &Bodies, t: f64, q: &DVector<f64>, u: &DVector<f64>)
    -> Result<DVector<f64>>;

    /// `g̈`.
    fn g_ddot(
        &self,
        bodies: &Bodies,
        t: f64,
        q: &DVector<f64>,
        u: &DVector<f64>,
        u_dot: &DVector<f64>,
    ) -> Result<DVector<f64>>;

    /// Generalized force directions `W_g = (∂ġ/∂u)ᵀ`, local `nu × nla_g`.
    fn w_g(&self, bodies: &Bodies, t: f64, q: &DVector<f64>) -> Result<DMatrix<f64>>;

    /// Whether the second-order Jacobians below are implemented.
    fn has_analytic_jacobian(&self) -> bool;

    /// `∂g/∂q`, local `nla_g × nq`.
    fn g_q(&self, _bodies: &Bodies, _t: f64, _q: &DVector<f64>) -> Result<DMatrix<f64>> {
        Err(self.missing("g_q"))
    }

    /// `∂ġ/∂q`, local `nla_g × nq`.
    fn g_dot_q(
        &self,
        _bodies: &Bodies,
        _t: f64,
        _q: &DVector<f64>,
        _u: &DVector<f64>,
    ) -> Result<DMatrix<f64>> {
        Err(self.missing("g_dot_q"))
    }

    /// `∂g̈/∂q`, local `nla_g × nq`.
    fn g_ddot_q(
        &self,
        _bodies: &Bodies,
        _t: f64,
        _q: &DVector<f64>,
        _u: &DVector<f64>,
        _u_dot: &DVector<f64>,
    ) -> Result<DMatrix<f64>> {
        Err(self.missing("g_ddot_q"))
    }

    /// `∂g̈/∂u`, local `nla_g × nu`.
    fn g_ddot_u(
        &self,
        _bodies: &Bodies,
        _t: f64,
        _q: &DVector<f64>,
        _u: &DVector<f64>,
        _u_dot: &DVector<f64>,
    ) -> Result<DMatrix<f64>> {
        Err(self.missing("g_ddot_u"))
    }

    /// `∂(W_g λ)/∂q`, local `nu × nq`.
    fn wla_g_q(
        &self,
        _bodies: &Bodies,
        _t: f64,
        _q: &DVector<f64>,
        _la_g: &DVector<f64>,
    ) -> Result<DMatrix<f64>> {
        Err(self.missing("wla_g_q"))
    }

    /// Error for a second-order Jacobian that is not implemented.
    fn missing(&self, jacobian: &'static str) -> MbsError {
        MbsError::MissingAnalyticJacobian {
            constraint: self.name().to_owned(),
            jacobian,
        }
    }
}

/// A rotational degree of freedom exposed by a joint, used to drive it.
pub trait RotationalTransmission: BilateralConstraint {
    /// Joint angle.
    fn angle(&self, bodies: &Bodies, t: f64, q: &DVector<f64>) -> Result<f64>;

    /// Joint angle rate.
    fn angle_dot(&self, bodies: &Bodies, t: f64, q: &DVector<f64>, u: &DVector<f64>)
    -> Result<f64>;

    /// Generalized force direction of a joint torque, local length `nu`.
    fn w_angle(&self, bodies: &Bodies, t: f64, q: &DVector<f64>) -> Result<DVector<f64>>;
}

/// Finite-difference Jacobian of `f` with respect to the coordinates listed
/// in `dof`, evaluated around the global vector `x`.
///
/// This is the single fallback for constraints without analytic
/// second-order Jacobians.
pub fn numerical_jacobian<F>(dof: &[usize], x: &DVector<f64>, f: F) -> Result<DMatrix<f64>>
where
    F: Fn(&DVector<f64>) -> Result<DVector<f64>>,
{
    let local = DVector::from_iterator(dof.len(), dof.iter().map(|&i| x[i]));
    try_approx_fprime(
        &local,
        |xl| {
            let mut xg = x.clone();
            for (k, &i) in dof.iter().enumerate() {
                xg[i] = xl[k];
            }
            f(&xg)
        },
        DiffMethod::Central,
    )
}
