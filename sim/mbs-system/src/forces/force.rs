//! Point forces.

use std::sync::Arc;

use nalgebra::{DMatrix, DVector, Vector3};

use mbs_types::Result;

use crate::binding::BodyBinding;
use crate::bodies::TimeVector;
use crate::forces::ForceElement;
use crate::subsystem::{Attachment, Bodies, SubsystemId};

/// Force with inertial components acting at a point, `h = J_Pᵀ F(t)`.
#[derive(Clone)]
pub struct Force {
    name: String,
    binding: BodyBinding,
    force: TimeVector,
}

impl std::fmt::Debug for Force {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Force")
            .field("name", &self.name)
            .field("binding", &self.binding)
            .finish_non_exhaustive()
    }
}

impl Force {
    /// Time-dependent force.
    pub fn new<F>(bodies: &Bodies, id: SubsystemId, attachment: Attachment, force: F) -> Result<Self>
    where
        F: Fn(f64) -> Vector3<f64> + Send + Sync + 'static,
    {
        Ok(Self {
            name: "force".to_owned(),
            binding: BodyBinding::new(bodies, id, attachment)?,
            force: Arc::new(force),
        })
    }

    /// Constant force.
    pub fn constant(bodies: &Bodies, id: SubsystemId, attachment: Attachment, force: Vector3<f64>) -> Result<Self> {
        Self::new(bodies, id, attachment, move |_| force)
    }

    /// Set the diagnostic name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Force at time `t`.
    #[must_use]
    pub fn force(&self, t: f64) -> Vector3<f64> {
        (self.force)(t)
    }
}

impl ForceElement for Force {
    fn name(&self) -> &str {
        &self.name
    }

    fn q_dof(&self) -> Vec<usize> {
        self.binding.q_dof()
    }

    fn u_dof(&self) -> Vec<usize> {
        self.binding.u_dof()
    }

    fn h(&self, bodies: &Bodies, t: f64, q: &DVector<f64>, _u: &DVector<f64>) -> Result<DVector<f64>> {
        let side = self.binding.anchor.side(bodies, q, None, None)?;
        Ok(side.j(t).tr_mul(&self.force(t)))
    }

    fn h_q(&self, bodies: &Bodies, t: f64, q: &DVector<f64>, _u: &DVector<f64>) -> Result<DMatrix<f64>> {
        let side = self.binding.anchor.side(bodies, q, None, None)?;
        let f = self.force(t);
        let j_q = side.j_q(t);
        let nu = self.binding.anchor.u_dof.len();
        let mut h_q = DMatrix::zeros(nu, j_q.len());
        for (k, j_qk) in j_q.iter().enumerate() {
            h_q.set_column(k, &j_qk.tr_mul(&f));
        }
        Ok(h_q)
    }

    /// `E_pot = -F · r_OP`, exact for constant forces.
    fn e_pot(&self, bodies: &Bodies, t: f64, q: &DVector<f64>) -> Result<f64> {
        let side = self.binding.anchor.side(bodies, q, None, None)?;
        Ok(-self.force(t).dot(&side.r(t)))
    }
}

/// Force with body-fixed components acting at a point,
/// `h = J_Pᵀ A_IK K_F(t)`.
#[derive(Clone)]
pub struct KForce {
    name: String,
    binding: BodyBinding,
    force: TimeVector,
}

impl std::fmt::Debug for KForce {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KForce")
            .field("name", &self.name)
            .field("binding", &self.binding)
            .finish_non_exhaustive()
    }
}

impl KForce {
    /// Time-dependent body-fixed force. The subsystem must be orientable.
    pub fn new<F>(bodies: &Bodies, id: SubsystemId, attachment: Attachment, force: F) -> Result<Self>
    where
        F: Fn(f64) -> Vector3<f64> + Send + Sync + 'static,
    {
        bodies.get(id)?.orientable()?;
        Ok(Self {
            name: "k_force".to_owned(),
            binding: BodyBinding::new(bodies, id, attachment)?,
            force: Arc::new(force),
        })
    }

    /// Set the diagnostic name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

impl ForceElement for KForce {
    fn name(&self) -> &str {
        &self.name
    }

    fn q_dof(&self) -> Vec<usize> {
        self.binding.q_dof()
    }

    fn u_dof(&self) -> Vec<usize> {
        self.binding.u_dof()
    }

    fn h(&self, bodies: &Bodies, t: f64, q: &DVector<f64>, _u: &DVector<f64>) -> Result<DVector<f64>> {
        let side = self.binding.anchor.side(bodies, q, None, None)?;
        let f = side.a_ib(t)? * (self.force)(t);
        Ok(side.j(t).tr_mul(&f))
    }

    fn h_q(&self, bodies: &Bodies, t: f64, q: &DVector<f64>, _u: &DVector<f64>) -> Result<DMatrix<f64>> {
        let side = self.binding.anchor.side(bodies, q, None, None)?;
        let k_f = (self.force)(t);
        let f = side.a_ib(t)? * k_f;
        let j = side.j(t);
        let j_q = side.j_q(t);
        let a_q = side.a_ib_q(t)?;
        let mut h_q = DMatrix::zeros(j.ncols(), j_q.len());
        for (k, (j_qk, a_qk)) in j_q.iter().zip(&a_q).enumerate() {
            h_q.set_column(k, &(j_qk.tr_mul(&f) + j.tr_mul(&(a_qk * k_f))));
        }
        Ok(h_q)
    }
}
