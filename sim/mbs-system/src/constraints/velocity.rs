//! Velocity-level constraints.

use std::sync::Arc;

use nalgebra::{DMatrix, DVector, Vector3};

use mbs_types::{MbsError, Result};

use crate::binding::BodyBinding;
use crate::bodies::TimeScalar;
use crate::subsystem::{Attachment, Bodies, SubsystemId};

/// A constraint `γ(t, q, u) = W_γᵀ u + χ_γ = 0`, linear in the velocities.
pub trait VelocityConstraint {
    /// Human-readable name used in diagnostics.
    fn name(&self) -> &str;

    /// Number of constraint rows.
    fn nla_gamma(&self) -> usize;

    /// Initial multipliers.
    fn la_gamma0(&self) -> DVector<f64> {
        DVector::zeros(self.nla_gamma())
    }

    /// Global coordinate indices, in local order.
    fn q_dof(&self) -> Vec<usize>;

    /// Global velocity indices, in local order.
    fn u_dof(&self) -> Vec<usize>;

    /// Residual `γ`.
    fn gamma(&self, bodies: &Bodies, t: f64, q: &DVector<f64>, u: &DVector<f64>)
    -> Result<DVector<f64>>;

    /// Generalized force directions `W_γ = (∂γ/∂u)ᵀ`, local `nu × nla_γ`.
    fn w_gamma(&self, bodies: &Bodies, t: f64, q: &DVector<f64>) -> Result<DMatrix<f64>>;
}

/// Prescribes the velocity of a point along a fixed inertial direction:
/// `γ = d · v_P - v(t)`.
#[derive(Clone)]
pub struct PointVelocity {
    name: String,
    binding: BodyBinding,
    direction: Vector3<f64>,
    speed: TimeScalar,
}

impl std::fmt::Debug for PointVelocity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PointVelocity")
            .field("name", &self.name)
            .field("binding", &self.binding)
            .field("direction", &self.direction)
            .finish_non_exhaustive()
    }
}

impl PointVelocity {
    /// Prescribe `speed(t)` along `direction` (normalized here).
    pub fn new<F>(
        bodies: &Bodies,
        id: SubsystemId,
        attachment: Attachment,
        direction: Vector3<f64>,
        speed: F,
    ) -> Result<Self>
    where
        F: Fn(f64) -> f64 + Send + Sync + 'static,
    {
        let direction = direction
            .try_normalize(f64::EPSILON)
            .ok_or_else(|| MbsError::degenerate("velocity constraint direction has zero length"))?;
        Ok(Self {
            name: "point_velocity".to_owned(),
            binding: BodyBinding::new(bodies, id, attachment)?,
            direction,
            speed: Arc::new(speed),
        })
    }

    /// Set the diagnostic name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Unit direction `d`.
    #[must_use]
    pub fn direction(&self) -> Vector3<f64> {
        self.direction
    }
}

impl VelocityConstraint for PointVelocity {
    fn name(&self) -> &str {
        &self.name
    }

    fn nla_gamma(&self) -> usize {
        1
    }

    fn q_dof(&self) -> Vec<usize> {
        self.binding.q_dof()
    }

    fn u_dof(&self) -> Vec<usize> {
        self.binding.u_dof()
    }

    fn gamma(&self, bodies: &Bodies, t: f64, q: &DVector<f64>, u: &DVector<f64>) -> Result<DVector<f64>> {
        let side = self.binding.anchor.side(bodies, q, Some(u), None)?;
        Ok(DVector::from_element(
            1,
            self.direction.dot(&side.v(t)) - (self.speed)(t),
        ))
    }

    fn w_gamma(&self, bodies: &Bodies, t: f64, q: &DVector<f64>) -> Result<DMatrix<f64>> {
        let side = self.binding.anchor.side(bodies, q, None, None)?;
        let w = side.j(t).tr_mul(&self.direction);
        Ok(DMatrix::from_column_slice(w.len(), 1, w.as_slice()))
    }
}
