//! Linear spring-damper between two points.

use nalgebra::{DMatrix, DVector, Vector3};

use mbs_types::{MbsError, Result};

use crate::binding::{PairBinding, Side};
use crate::forces::ComplianceElement;
use crate::subsystem::{Attachment, Bodies, SubsystemId};

/// Minimum admissible length.
const MIN_LENGTH: f64 = 1e-6;

/// Force law `λ_c = -(k (l - l0) + d l̇)` along the line of action.
///
/// The free length `l0` defaults to the distance in the initial
/// configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct SpringDamper {
    name: String,
    binding: PairBinding,
    stiffness: f64,
    damping: f64,
    free_length: f64,
}

/// Length and unit direction from point 1 to point 2.
fn line(s1: &Side<'_>, s2: &Side<'_>, t: f64) -> Result<(f64, Vector3<f64>)> {
    let r12 = s2.r(t) - s1.r(t);
    let l = r12.norm();
    if l < MIN_LENGTH {
        return Err(MbsError::degenerate(format!(
            "spring-damper endpoints coincide (distance {l:e} < {MIN_LENGTH:e})"
        )));
    }
    Ok((l, r12 / l))
}

impl SpringDamper {
    /// Spring-damper between two attachment points.
    pub fn new(
        bodies: &Bodies,
        point1: (SubsystemId, Attachment),
        point2: (SubsystemId, Attachment),
        stiffness: f64,
        damping: f64,
    ) -> Result<Self> {
        if !(stiffness.is_finite() && damping.is_finite()) || stiffness < 0.0 || damping < 0.0 {
            return Err(MbsError::invalid_config(format!(
                "spring-damper coefficients must be non-negative (k = {stiffness}, d = {damping})"
            )));
        }
        let binding = PairBinding::at_points(bodies, point1, point2)?;
        let [s1, s2] = binding.sides(bodies, &bodies.q0(), None, None)?;
        let (free_length, _) = line(&s1, &s2, bodies.t0())?;
        Ok(Self {
            name: "spring_damper".to_owned(),
            binding,
            stiffness,
            damping,
            free_length,
        })
    }

    /// Override the free length.
    #[must_use]
    pub fn with_free_length(mut self, l0: f64) -> Self {
        self.free_length = l0;
        self
    }

    /// Set the diagnostic name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Free length `l0`.
    #[must_use]
    pub fn free_length(&self) -> f64 {
        self.free_length
    }
}

impl ComplianceElement for SpringDamper {
    fn name(&self) -> &str {
        &self.name
    }

    fn nla_c(&self) -> usize {
        1
    }

    fn q_dof(&self) -> Vec<usize> {
        self.binding.q_dof()
    }

    fn u_dof(&self) -> Vec<usize> {
        self.binding.u_dof()
    }

    fn la_c(&self, bodies: &Bodies, t: f64, q: &DVector<f64>, u: &DVector<f64>) -> Result<DVector<f64>> {
        let [s1, s2] = self.binding.sides(bodies, q, Some(u), None)?;
        let (l, n) = line(&s1, &s2, t)?;
        let l_dot = n.dot(&(s2.v(t) - s1.v(t)));
        Ok(DVector::from_element(
            1,
            -(self.stiffness * (l - self.free_length) + self.damping * l_dot),
        ))
    }

    fn w_c(&self, bodies: &Bodies, t: f64, q: &DVector<f64>) -> Result<DMatrix<f64>> {
        let [s1, s2] = self.binding.sides(bodies, q, None, None)?;
        let (_, n) = line(&s1, &s2, t)?;
        let w1 = -s1.j(t).tr_mul(&n);
        let w2 = s2.j(t).tr_mul(&n);
        let mut w = DMatrix::zeros(w1.len() + w2.len(), 1);
        w.view_mut((0, 0), (w1.len(), 1)).copy_from(&w1);
        w.view_mut((w1.len(), 0), (w2.len(), 1)).copy_from(&w2);
        Ok(w)
    }

    fn e_pot(&self, bodies: &Bodies, t: f64, q: &DVector<f64>) -> Result<f64> {
        let [s1, s2] = self.binding.sides(bodies, q, None, None)?;
        let (l, _) = line(&s1, &s2, t)?;
        Ok(0.5 * self.stiffness * (l - self.free_length).powi(2))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use crate::bodies::PointMass;
    use approx::assert_relative_eq;

    fn pair(stiffness: f64, damping: f64) -> (Bodies, SpringDamper) {
        let mut bodies = Bodies::new(0.0);
        let a = bodies.push(Box::new(PointMass::new(1.0, Vector3::zeros(), Vector3::zeros())));
        let b = bodies.push(Box::new(PointMass::new(1.0, Vector3::new(2.0, 0.0, 0.0), Vector3::zeros())));
        let sd = SpringDamper::new(&bodies, (a, Attachment::origin()), (b, Attachment::origin()), stiffness, damping)
            .unwrap();
        (bodies, sd)
    }

    #[test]
    fn test_free_length_defaults_to_initial_distance() {
        let (bodies, sd) = pair(10.0, 0.0);
        assert_relative_eq!(sd.free_length(), 2.0);
        let la = sd.la_c(&bodies, 0.0, &bodies.q0(), &bodies.u0()).unwrap();
        assert_relative_eq!(la[0], 0.0);
    }

    #[test]
    fn test_stretched_spring_pulls_points_together() {
        let (bodies, sd) = pair(10.0, 0.0);
        let sd = sd.with_free_length(1.0);
        let q = bodies.q0();
        let la = sd.la_c(&bodies, 0.0, &q, &bodies.u0()).unwrap();
        assert_relative_eq!(la[0], -10.0);

        let f = sd.w_c(&bodies, 0.0, &q).unwrap() * la;
        assert_relative_eq!(f, DVector::from_vec(vec![10.0, 0.0, 0.0, -10.0, 0.0, 0.0]));
        assert_relative_eq!(sd.e_pot(&bodies, 0.0, &q).unwrap(), 5.0);
    }

    #[test]
    fn test_damper_opposes_separation() {
        let (bodies, sd) = pair(0.0, 4.0);
        let u = DVector::from_vec(vec![0.0, 0.0, 0.0, 0.5, 1.0, 0.0]);
        let la = sd.la_c(&bodies, 0.0, &bodies.q0(), &u).unwrap();
        assert_relative_eq!(la[0], -2.0);
    }

    #[test]
    fn test_invalid_construction() {
        let mut bodies = Bodies::new(0.0);
        let a = bodies.push(Box::new(PointMass::new(1.0, Vector3::zeros(), Vector3::zeros())));
        let b = bodies.push(Box::new(PointMass::new(1.0, Vector3::zeros(), Vector3::zeros())));
        let err = SpringDamper::new(&bodies, (a, Attachment::origin()), (b, Attachment::origin()), 1.0, 0.0)
            .unwrap_err();
        assert!(matches!(err, MbsError::DegenerateConstraint { .. }));

        let err = SpringDamper::new(&bodies, (a, Attachment::origin()), (b, Attachment::at(Vector3::x())), -1.0, 0.0)
            .unwrap_err();
        assert!(err.is_config_error());
    }
}
