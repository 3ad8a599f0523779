//! Distance constraint between two points.

use nalgebra::{DMatrix, DVector};

use mbs_types::{MbsError, Result};

use crate::binding::PairBinding;
use crate::constraints::BilateralConstraint;
use crate::constraints::pose::{add_block, set_row};
use crate::subsystem::{Attachment, Bodies, SubsystemId};

/// Minimum admissible rod length.
const MIN_LENGTH: f64 = 1e-6;

/// Keeps the distance between two points at its initial value.
///
/// `g = |r_P2 - r_P1|² - d²` with `d` measured in the initial configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct Rod {
    name: String,
    binding: PairBinding,
    length: f64,
}

impl Rod {
    /// Build a rod between two attachment points.
    ///
    /// Fails if the points coincide in the initial configuration.
    pub fn new(
        bodies: &Bodies,
        point1: (SubsystemId, Attachment),
        point2: (SubsystemId, Attachment),
    ) -> Result<Self> {
        let binding = PairBinding::at_points(bodies, point1, point2)?;
        let q0 = bodies.q0();
        let [s1, s2] = binding.sides(bodies, &q0, None, None)?;
        let t0 = bodies.t0();
        let length = (s2.r(t0) - s1.r(t0)).norm();
        if length < MIN_LENGTH {
            return Err(MbsError::degenerate(format!(
                "rod endpoints coincide (distance {length:e} < {MIN_LENGTH:e})"
            )));
        }
        Ok(Self {
            name: "rod".to_owned(),
            binding,
            length,
        })
    }

    /// Set the diagnostic name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Prescribed distance.
    #[must_use]
    pub fn length(&self) -> f64 {
        self.length
    }
}

impl BilateralConstraint for Rod {
    fn name(&self) -> &str {
        &self.name
    }

    fn nla_g(&self) -> usize {
        1
    }

    fn q_dof(&self) -> Vec<usize> {
        self.binding.q_dof()
    }

    fn u_dof(&self) -> Vec<usize> {
        self.binding.u_dof()
    }

    fn g(&self, bodies: &Bodies, t: f64, q: &DVector<f64>) -> Result<DVector<f64>> {
        let [s1, s2] = self.binding.sides(bodies, q, None, None)?;
        let r12 = s2.r(t) - s1.r(t);
        Ok(DVector::from_element(1, r12.dot(&r12) - self.length * self.length))
    }

    fn g_dot(&self, bodies: &Bodies, t: f64, q: &DVector<f64>, u: &DVector<f64>) -> Result<DVector<f64>> {
        let [s1, s2] = self.binding.sides(bodies, q, Some(u), None)?;
        let r12 = s2.r(t) - s1.r(t);
        let v12 = s2.v(t) - s1.v(t);
        Ok(DVector::from_element(1, 2.0 * r12.dot(&v12)))
    }

    fn g_ddot(
        &self,
        bodies: &Bodies,
        t: f64,
        q: &DVector<f64>,
        u: &DVector<f64>,
        u_dot: &DVector<f64>,
    ) -> Result<DVector<f64>> {
        let [s1, s2] = self.binding.sides(bodies, q, Some(u), Some(u_dot))?;
        let r12 = s2.r(t) - s1.r(t);
        let v12 = s2.v(t) - s1.v(t);
        let a12 = s2.a(t) - s1.a(t);
        Ok(DVector::from_element(
            1,
            2.0 * v12.dot(&v12) + 2.0 * r12.dot(&a12),
        ))
    }

    fn w_g(&self, bodies: &Bodies, t: f64, q: &DVector<f64>) -> Result<DMatrix<f64>> {
        let [s1, s2] = self.binding.sides(bodies, q, None, None)?;
        let r12 = s2.r(t) - s1.r(t);
        let nu1 = self.binding.nu1();
        let w1 = s1.j(t).tr_mul(&r12) * -2.0;
        let w2 = s2.j(t).tr_mul(&r12) * 2.0;
        let mut w = DMatrix::zeros(w1.len() + w2.len(), 1);
        w.view_mut((0, 0), (nu1, 1)).copy_from(&w1);
        w.view_mut((nu1, 0), (w2.len(), 1)).copy_from(&w2);
        Ok(w)
    }

    fn has_analytic_jacobian(&self) -> bool {
        true
    }

    fn g_q(&self, bodies: &Bodies, t: f64, q: &DVector<f64>) -> Result<DMatrix<f64>> {
        let [s1, s2] = self.binding.sides(bodies, q, None, None)?;
        let r12 = s2.r(t) - s1.r(t);
        let nq1 = self.binding.nq1();
        let row1 = s1.r_q(t).tr_mul(&r12) * -2.0;
        let row2 = s2.r_q(t).tr_mul(&r12) * 2.0;
        let mut m = DMatrix::zeros(1, row1.len() + row2.len());
        set_row(&mut m, 0, 0, &row1);
        set_row(&mut m, 0, nq1, &row2);
        Ok(m)
    }

    fn g_dot_q(
        &self,
        bodies: &Bodies,
        t: f64,
        q: &DVector<f64>,
        u: &DVector<f64>,
    ) -> Result<DMatrix<f64>> {
        let [s1, s2] = self.binding.sides(bodies, q, Some(u), None)?;
        let r12 = s2.r(t) - s1.r(t);
        let v12 = s2.v(t) - s1.v(t);
        let nq1 = self.binding.nq1();
        let row1 = (s1.r_q(t).tr_mul(&v12) + s1.v_q(t).tr_mul(&r12)) * -2.0;
        let row2 = (s2.r_q(t).tr_mul(&v12) + s2.v_q(t).tr_mul(&r12)) * 2.0;
        let mut m = DMatrix::zeros(1, row1.len() + row2.len());
        set_row(&mut m, 0, 0, &row1);
        set_row(&mut m, 0, nq1, &row2);
        Ok(m)
    }

    fn g_ddot_q(
        &self,
        bodies: &Bodies,
        t: f64,
        q: &DVector<f64>,
        u: &DVector<f64>,
        u_dot: &DVector<f64>,
    ) -> Result<DMatrix<f64>> {
        let [s1, s2] = self.binding.sides(bodies, q, Some(u), Some(u_dot))?;
        let r12 = s2.r(t) - s1.r(t);
        let v12 = s2.v(t) - s1.v(t);
        let a12 = s2.a(t) - s1.a(t);
        let nq1 = self.binding.nq1();
        let row1 = -(s1.v_q(t).tr_mul(&v12) * 4.0
            + s1.r_q(t).tr_mul(&a12) * 2.0
            + s1.a_q(t).tr_mul(&r12) * 2.0);
        let row2 = s2.v_q(t).tr_mul(&v12) * 4.0
            + s2.r_q(t).tr_mul(&a12) * 2.0
            + s2.a_q(t).tr_mul(&r12) * 2.0;
        let mut m = DMatrix::zeros(1, row1.len() + row2.len());
        set_row(&mut m, 0, 0, &row1);
        set_row(&mut m, 0, nq1, &row2);
        Ok(m)
    }

    fn g_ddot_u(
        &self,
        bodies: &Bodies,
        t: f64,
        q: &DVector<f64>,
        u: &DVector<f64>,
        u_dot: &DVector<f64>,
    ) -> Result<DMatrix<f64>> {
        let [s1, s2] = self.binding.sides(bodies, q, Some(u), Some(u_dot))?;
        let r12 = s2.r(t) - s1.r(t);
        let v12 = s2.v(t) - s1.v(t);
        let nu1 = self.binding.nu1();
        let row1 = -(s1.j(t).tr_mul(&v12) * 4.0 + s1.a_u(t).tr_mul(&r12) * 2.0);
        let row2 = s2.j(t).tr_mul(&v12) * 4.0 + s2.a_u(t).tr_mul(&r12) * 2.0;
        let mut m = DMatrix::zeros(1, row1.len() + row2.len());
        set_row(&mut m, 0, 0, &row1);
        set_row(&mut m, 0, nu1, &row2);
        Ok(m)
    }

    fn wla_g_q(
        &self,
        bodies: &Bodies,
        t: f64,
        q: &DVector<f64>,
        la_g: &DVector<f64>,
    ) -> Result<DMatrix<f64>> {
        let [s1, s2] = self.binding.sides(bodies, q, None, None)?;
        let r12 = s2.r(t) - s1.r(t);
        let (nq1, nu1) = (self.binding.nq1(), self.binding.nu1());
        let (r1_q, r2_q) = (s1.r_q(t), s2.r_q(t));
        let (j1, j2) = (s1.j(t), s2.j(t));
        let (nq2, nu2) = (r2_q.ncols(), j2.ncols());
        let scale = 2.0 * la_g[0];

        let mut b11 = j1.transpose() * &r1_q;
        for (k, j1_qk) in s1.j_q(t).iter().enumerate() {
            let col = b11.column(k) - j1_qk.tr_mul(&r12);
            b11.set_column(k, &col);
        }
        let b12 = -(j1.transpose() * &r2_q);
        let b21 = -(j2.transpose() * &r1_q);
        let mut b22 = j2.transpose() * &r2_q;
        for (k, j2_qk) in s2.j_q(t).iter().enumerate() {
            let col = b22.column(k) + j2_qk.tr_mul(&r12);
            b22.set_column(k, &col);
        }

        let mut m = DMatrix::zeros(nu1 + nu2, nq1 + nq2);
        add_block(&mut m, 0, 0, &(b11 * scale));
        add_block(&mut m, 0, nq1, &(b12 * scale));
        add_block(&mut m, nu1, 0, &(b21 * scale));
        add_block(&mut m, nu1, nq1, &(b22 * scale));
        Ok(m)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use crate::bodies::{Frame, PointMass, RigidBodyQuaternion};
    use crate::conformance::check_constraint_jacobians;
    use approx::assert_relative_eq;
    use mbs_math::exp_so3;
    use nalgebra::{Matrix3, Vector3};

    #[test]
    fn test_pendulum_rod() {
        let mut bodies = Bodies::new(0.0);
        let origin = bodies.push(Box::new(Frame::origin()));
        let bob = bodies.push(Box::new(PointMass::new(1.0, Vector3::new(2.0, 0.0, 0.0), Vector3::zeros())));
        let rod = Rod::new(&bodies, (origin, Attachment::origin()), (bob, Attachment::origin())).unwrap();

        assert_relative_eq!(rod.length(), 2.0, epsilon = 1e-14);
        let q = bodies.q0();
        assert_relative_eq!(rod.g(&bodies, 0.0, &q).unwrap()[0], 0.0, epsilon = 1e-14);

        // Tangential velocity keeps the distance.
        let u = DVector::from_vec(vec![0.0, 3.0, 0.0]);
        assert_relative_eq!(rod.g_dot(&bodies, 0.0, &q, &u).unwrap()[0], 0.0, epsilon = 1e-14);

        let w = rod.w_g(&bodies, 0.0, &q).unwrap();
        assert_relative_eq!(w[(0, 0)], 4.0, epsilon = 1e-14);
    }

    #[test]
    fn test_coincident_points_rejected() {
        let mut bodies = Bodies::new(0.0);
        let origin = bodies.push(Box::new(Frame::origin()));
        let pm = bodies.push(Box::new(PointMass::new(1.0, Vector3::new(0.0, 0.0, 1e-8), Vector3::zeros())));
        let err = Rod::new(&bodies, (origin, Attachment::origin()), (pm, Attachment::origin())).unwrap_err();
        assert!(err.is_config_error());
        assert!(matches!(err, MbsError::DegenerateConstraint { .. }));
    }

    #[test]
    fn test_jacobians_conform_between_rigid_bodies() {
        let mut bodies = Bodies::new(0.0);
        let b1 = bodies.push(Box::new(
            RigidBodyQuaternion::new(1.0, Matrix3::identity())
                .with_pose(Vector3::zeros(), exp_so3(&Vector3::new(0.2, -0.1, 0.4))),
        ));
        let b2 = bodies.push(Box::new(
            RigidBodyQuaternion::new(1.0, Matrix3::identity())
                .with_pose(Vector3::new(1.0, 1.0, 0.0), exp_so3(&Vector3::new(0.0, 0.5, 0.0))),
        ));
        let rod = Rod::new(
            &bodies,
            (b1, Attachment::at(Vector3::new(0.3, 0.0, 0.1))),
            (b2, Attachment::at(Vector3::new(-0.2, 0.4, 0.0))),
        )
        .unwrap();

        let q = bodies.q0();
        let u = DVector::from_fn(12, |i, _| 0.3 - 0.05 * i as f64);
        let u_dot = DVector::from_fn(12, |i, _| (i as f64).cos());
        let la = DVector::from_element(1, 1.7);
        let report = check_constraint_jacobians(&rod, &bodies, 0.0, &q, &u, &u_dot, &la, 1e-6).unwrap();
        assert!(report.is_empty(), "{report:?}");
    }
}
