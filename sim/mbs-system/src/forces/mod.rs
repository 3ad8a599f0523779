//! Force elements.
//!
//! Two channels feed external forcing into the equations of motion:
//!
//! - [`ForceElement`] contributes directly to the generalized force `h`:
//!   [`Force`], [`KForce`] and the [`Motor`] decorator.
//! - [`ComplianceElement`] contributes `W_c λ_c`, a smooth force law with its
//!   own multipliers that are reported in the solution: [`SpringDamper`].
//!
//! As for constraints, every element returns local quantities ordered by its
//! [`ForceElement::u_dof`] list.

mod force;
mod motor;
mod spring_damper;

pub use force::{Force, KForce};
pub use motor::Motor;
pub use spring_damper::SpringDamper;

use nalgebra::{DMatrix, DVector};

use mbs_types::{MbsError, Result};

use crate::subsystem::Bodies;

/// An element contributing to the generalized force vector `h`.
pub trait ForceElement {
    /// Human-readable name used in diagnostics.
    fn name(&self) -> &str;

    /// Global coordinate indices, in local order.
    fn q_dof(&self) -> Vec<usize>;

    /// Global velocity indices, in local order.
    fn u_dof(&self) -> Vec<usize>;

    /// Generalized force, local length `nu`.
    fn h(&self, bodies: &Bodies, t: f64, q: &DVector<f64>, u: &DVector<f64>) -> Result<DVector<f64>>;

    /// `∂h/∂q`, local `nu × nq`.
    fn h_q(
        &self,
        _bodies: &Bodies,
        _t: f64,
        _q: &DVector<f64>,
        _u: &DVector<f64>,
    ) -> Result<DMatrix<f64>> {
        Err(MbsError::MissingAnalyticJacobian {
            constraint: self.name().to_owned(),
            jacobian: "h_q",
        })
    }

    /// Potential energy. Elements without a potential return zero.
    fn e_pot(&self, _bodies: &Bodies, _t: f64, _q: &DVector<f64>) -> Result<f64> {
        Ok(0.0)
    }
}

/// An element contributing `W_c λ_c` with `λ_c = λ_c(t, q, u)`.
pub trait ComplianceElement {
    /// Human-readable name used in diagnostics.
    fn name(&self) -> &str;

    /// Number of force components.
    fn nla_c(&self) -> usize;

    /// Initial force components.
    fn la_c0(&self) -> DVector<f64> {
        DVector::zeros(self.nla_c())
    }

    /// Global coordinate indices, in local order.
    fn q_dof(&self) -> Vec<usize>;

    /// Global velocity indices, in local order.
    fn u_dof(&self) -> Vec<usize>;

    /// Force components `λ_c`.
    fn la_c(&self, bodies: &Bodies, t: f64, q: &DVector<f64>, u: &DVector<f64>) -> Result<DVector<f64>>;

    /// Generalized force directions, local `nu × nla_c`.
    fn w_c(&self, bodies: &Bodies, t: f64, q: &DVector<f64>) -> Result<DMatrix<f64>>;

    /// Potential energy. Elements without a potential return zero.
    fn e_pot(&self, _bodies: &Bodies, _t: f64, _q: &DVector<f64>) -> Result<f64> {
        Ok(0.0)
    }
}
