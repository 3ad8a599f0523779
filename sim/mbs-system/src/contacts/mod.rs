//! Unilateral contacts with Coulomb friction.
//!
//! A contact element owns `nla_N` normal contacts and `nla_F` friction
//! directions. Its local connectivity lists, per normal contact, the local
//! friction indices attached to it (empty for frictionless contacts). The
//! assembler shifts both into the global numbering.
//!
//! All velocity quantities are affine in `u`:
//! `ġ_N = W_Nᵀ u + χ_N` and `γ_F = W_Fᵀ u + χ_F`, so the constant parts are
//! obtained by evaluating at `u = 0`.

mod sphere_to_plane;

pub use sphere_to_plane::{Friction, SphereToPlane};

use nalgebra::{DMatrix, DVector};

use mbs_types::Result;

use crate::subsystem::Bodies;

/// A set of normal contacts with their friction directions.
pub trait Contact {
    /// Human-readable name used in diagnostics.
    fn name(&self) -> &str;

    /// Number of normal contacts.
    fn nla_n(&self) -> usize;

    /// Number of friction directions.
    fn nla_f(&self) -> usize;

    /// Initial normal forces.
    fn la_n0(&self) -> DVector<f64> {
        DVector::zeros(self.nla_n())
    }

    /// Initial friction forces.
    fn la_f0(&self) -> DVector<f64> {
        DVector::zeros(self.nla_f())
    }

    /// Global coordinate indices, in local order.
    fn q_dof(&self) -> Vec<usize>;

    /// Global velocity indices, in local order.
    fn u_dof(&self) -> Vec<usize>;

    /// Signed gaps; `≤ 0` means closed.
    fn g_n(&self, bodies: &Bodies, t: f64, q: &DVector<f64>) -> Result<DVector<f64>>;

    /// Normal relative velocities `ġ_N`.
    fn g_n_dot(&self, bodies: &Bodies, t: f64, q: &DVector<f64>, u: &DVector<f64>) -> Result<DVector<f64>>;

    /// Normal force directions, local `nu × nla_N`.
    fn w_n(&self, bodies: &Bodies, t: f64, q: &DVector<f64>) -> Result<DMatrix<f64>>;

    /// Tangential relative velocities `γ_F`.
    fn gamma_f(&self, bodies: &Bodies, t: f64, q: &DVector<f64>, u: &DVector<f64>) -> Result<DVector<f64>>;

    /// Friction force directions, local `nu × nla_F`.
    fn w_f(&self, bodies: &Bodies, t: f64, q: &DVector<f64>) -> Result<DMatrix<f64>>;

    /// Friction coefficient per normal contact.
    fn mu(&self) -> DVector<f64>;

    /// Normal restitution coefficient per normal contact.
    fn e_n(&self) -> DVector<f64>;

    /// Tangential restitution coefficient per friction direction.
    fn e_f(&self) -> DVector<f64>;

    /// Local friction indices per normal contact.
    fn nf_connectivity(&self) -> Vec<Vec<usize>>;
}
