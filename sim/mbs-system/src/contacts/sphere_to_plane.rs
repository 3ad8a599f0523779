//! Sphere against a plane.

use nalgebra::{DMatrix, DVector, Matrix3xX, Vector3};

use mbs_math::ax2skew;
use mbs_types::{MbsError, Result};

use crate::binding::{BodyBinding, Side};
use crate::bodies::Frame;
use crate::contacts::Contact;
use crate::subsystem::{Attachment, Bodies, SubsystemId};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Tangential directions resisted by friction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Friction {
    /// Frictionless contact.
    #[default]
    None,
    /// Friction along the plane's first tangent only.
    Planar,
    /// Friction in the whole tangent plane.
    Spatial,
}

impl Friction {
    /// Number of friction directions.
    #[must_use]
    pub fn directions(self) -> usize {
        match self {
            Self::None => 0,
            Self::Planar => 1,
            Self::Spatial => 2,
        }
    }
}

/// A sphere attached to a subsystem touching a plane.
///
/// The plane passes through the origin of `plane` with normal along its
/// third axis; the first two axes span the friction directions. With zero
/// radius the sphere degenerates to a point.
#[derive(Debug, Clone)]
pub struct SphereToPlane {
    name: String,
    plane: Frame,
    binding: BodyBinding,
    radius: f64,
    friction: Friction,
    mu: f64,
    e_n: f64,
    e_f: f64,
}

impl SphereToPlane {
    /// Frictionless, perfectly plastic contact of the sphere centered at
    /// `center` against `plane`.
    pub fn new(bodies: &Bodies, plane: Frame, center: (SubsystemId, Attachment), radius: f64) -> Result<Self> {
        if !(radius.is_finite() && radius >= 0.0) {
            return Err(MbsError::invalid_config(format!(
                "sphere radius must be finite and non-negative, got {radius}"
            )));
        }
        Ok(Self {
            name: "sphere_to_plane".to_owned(),
            plane,
            binding: BodyBinding::new(bodies, center.0, center.1)?,
            radius,
            friction: Friction::None,
            mu: 0.0,
            e_n: 0.0,
            e_f: 0.0,
        })
    }

    /// Coulomb friction with coefficient `mu`.
    pub fn with_friction(mut self, friction: Friction, mu: f64) -> Result<Self> {
        if !(mu.is_finite() && mu >= 0.0) {
            return Err(MbsError::invalid_config(format!(
                "friction coefficient must be finite and non-negative, got {mu}"
            )));
        }
        self.friction = friction;
        self.mu = if friction == Friction::None { 0.0 } else { mu };
        Ok(self)
    }

    /// Normal and tangential restitution coefficients in `[0, 1]`.
    pub fn with_restitution(mut self, e_n: f64, e_f: f64) -> Result<Self> {
        for (label, e) in [("normal", e_n), ("tangential", e_f)] {
            if !(0.0..=1.0).contains(&e) {
                return Err(MbsError::invalid_config(format!(
                    "{label} restitution must lie in [0, 1], got {e}"
                )));
            }
        }
        self.e_n = e_n;
        self.e_f = e_f;
        Ok(self)
    }

    /// Set the diagnostic name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Friction model.
    #[must_use]
    pub fn friction(&self) -> Friction {
        self.friction
    }

    fn normal(&self) -> Vector3<f64> {
        self.plane.orientation().column(2).into_owned()
    }

    fn tangents(&self) -> impl Iterator<Item = Vector3<f64>> + '_ {
        let a = self.plane.orientation();
        (0..self.friction.directions()).map(move |i| a.column(i).into_owned())
    }

    /// Jacobian of the material point of the sphere currently touching the
    /// plane. Rolling only contributes if the body has an orientation.
    fn contact_jacobian(&self, side: &Side<'_>, t: f64) -> Result<Matrix3xX<f64>> {
        let j = side.j(t);
        if self.radius > 0.0 && side.orientable().is_ok() {
            Ok(j + ax2skew(&self.normal()) * side.j_r(t)? * self.radius)
        } else {
            Ok(j)
        }
    }

    fn contact_velocity(&self, side: &Side<'_>, t: f64) -> Result<Vector3<f64>> {
        let v = side.v(t);
        if self.radius > 0.0 && side.orientable().is_ok() {
            Ok(v + self.normal().cross(&side.omega(t)?) * self.radius)
        } else {
            Ok(v)
        }
    }
}

impl Contact for SphereToPlane {
    fn name(&self) -> &str {
        &self.name
    }

    fn nla_n(&self) -> usize {
        1
    }

    fn nla_f(&self) -> usize {
        self.friction.directions()
    }

    fn q_dof(&self) -> Vec<usize> {
        self.binding.q_dof()
    }

    fn u_dof(&self) -> Vec<usize> {
        self.binding.u_dof()
    }

    fn g_n(&self, bodies: &Bodies, t: f64, q: &DVector<f64>) -> Result<DVector<f64>> {
        let side = self.binding.anchor.side(bodies, q, None, None)?;
        let gap = self.normal().dot(&(side.r(t) - self.plane.position(t))) - self.radius;
        Ok(DVector::from_element(1, gap))
    }

    fn g_n_dot(&self, bodies: &Bodies, t: f64, q: &DVector<f64>, u: &DVector<f64>) -> Result<DVector<f64>> {
        let side = self.binding.anchor.side(bodies, q, Some(u), None)?;
        let rate = self.normal().dot(&(side.v(t) - self.plane.velocity(t)));
        Ok(DVector::from_element(1, rate))
    }

    fn w_n(&self, bodies: &Bodies, t: f64, q: &DVector<f64>) -> Result<DMatrix<f64>> {
        let side = self.binding.anchor.side(bodies, q, None, None)?;
        let w = side.j(t).tr_mul(&self.normal());
        Ok(DMatrix::from_column_slice(w.len(), 1, w.as_slice()))
    }

    fn gamma_f(&self, bodies: &Bodies, t: f64, q: &DVector<f64>, u: &DVector<f64>) -> Result<DVector<f64>> {
        let side = self.binding.anchor.side(bodies, q, Some(u), None)?;
        let v_rel = self.contact_velocity(&side, t)? - self.plane.velocity(t);
        Ok(DVector::from_iterator(
            self.nla_f(),
            self.tangents().map(|t_i| t_i.dot(&v_rel)),
        ))
    }

    fn w_f(&self, bodies: &Bodies, t: f64, q: &DVector<f64>) -> Result<DMatrix<f64>> {
        let side = self.binding.anchor.side(bodies, q, None, None)?;
        let j_c = self.contact_jacobian(&side, t)?;
        let mut w = DMatrix::zeros(j_c.ncols(), self.nla_f());
        for (i, t_i) in self.tangents().enumerate() {
            w.set_column(i, &j_c.tr_mul(&t_i));
        }
        Ok(w)
    }

    fn mu(&self) -> DVector<f64> {
        DVector::from_element(1, self.mu)
    }

    fn e_n(&self) -> DVector<f64> {
        DVector::from_element(1, self.e_n)
    }

    fn e_f(&self) -> DVector<f64> {
        DVector::from_element(self.nla_f(), self.e_f)
    }

    fn nf_connectivity(&self) -> Vec<Vec<usize>> {
        vec![(0..self.nla_f()).collect()]
    }
}
