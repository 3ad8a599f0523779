//! Revolute joint.

use nalgebra::{DMatrix, DVector, Vector3};

use mbs_math::smallest_rotation;
use mbs_types::{MbsError, Result};

use crate::binding::PairBinding;
use crate::constraints::pose::PoseRows;
use crate::constraints::{BilateralConstraint, RotationalTransmission};
use crate::subsystem::{Bodies, FrameId, SubsystemId};

/// Orientation rows `e_z¹·e_x²` and `e_z¹·e_y²`.
const AXIS_PAIRS: &[(usize, usize)] = &[(2, 0), (2, 1)];

/// Five-row joint leaving rotation about a single axis free.
///
/// The joint frame `B` has its `z` axis along the rotation axis. Its
/// orientation is the smallest rotation mapping `e_z` onto the axis.
#[derive(Debug, Clone, PartialEq)]
pub struct Revolute {
    name: String,
    rows: PoseRows,
}

impl Revolute {
    /// Joint at the inertial point `r_OB0` rotating about `axis`, both given
    /// in the initial configuration.
    pub fn new(
        bodies: &Bodies,
        body1: (SubsystemId, FrameId),
        body2: (SubsystemId, FrameId),
        r_ob0: &Vector3<f64>,
        axis: &Vector3<f64>,
    ) -> Result<Self> {
        let a_ib0 = smallest_rotation(&Vector3::z(), axis)
            .ok_or_else(|| MbsError::degenerate("revolute axis has zero length"))?;
        Ok(Self {
            name: "revolute".to_owned(),
            rows: PoseRows {
                binding: PairBinding::at_common_frame(bodies, body1, body2, r_ob0, &a_ib0)?,
                pairs: AXIS_PAIRS,
            },
        })
    }

    /// Set the diagnostic name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// The binding to both subsystems.
    #[must_use]
    pub fn binding(&self) -> &PairBinding {
        &self.rows.binding
    }
}

impl BilateralConstraint for Revolute {
    fn name(&self) -> &str {
        &self.name
    }

    fn nla_g(&self) -> usize {
        self.rows.nla()
    }

    fn q_dof(&self) -> Vec<usize> {
        self.rows.binding.q_dof()
    }

    fn u_dof(&self) -> Vec<usize> {
        self.rows.binding.u_dof()
    }

    fn g(&self, bodies: &Bodies, t: f64, q: &DVector<f64>) -> Result<DVector<f64>> {
        self.rows.g(bodies, t, q)
    }

    fn g_dot(&self, bodies: &Bodies, t: f64, q: &DVector<f64>, u: &DVector<f64>) -> Result<DVector<f64>> {
        self.rows.g_dot(bodies, t, q, u)
    }

    fn g_ddot(
        &self,
        bodies: &Bodies,
        t: f64,
        q: &DVector<f64>,
        u: &DVector<f64>,
        u_dot: &DVector<f64>,
    ) -> Result<DVector<f64>> {
        self.rows.g_ddot(bodies, t, q, u, u_dot)
    }

    fn w_g(&self, bodies: &Bodies, t: f64, q: &DVector<f64>) -> Result<DMatrix<f64>> {
        self.rows.w_g(bodies, t, q)
    }

    fn has_analytic_jacobian(&self) -> bool {
        false
    }
}

impl RotationalTransmission for Revolute {
    fn angle(&self, bodies: &Bodies, t: f64, q: &DVector<f64>) -> Result<f64> {
        let [s1, s2] = self.rows.binding.sides(bodies, q, None, None)?;
        let (a1, a2) = (s1.a_ib(t)?, s2.a_ib(t)?);
        let e_x2 = a2.column(0);
        Ok(a1.column(1).dot(&e_x2).atan2(a1.column(0).dot(&e_x2)))
    }

    fn angle_dot(&self, bodies: &Bodies, t: f64, q: &DVector<f64>, u: &DVector<f64>) -> Result<f64> {
        let [s1, s2] = self.rows.binding.sides(bodies, q, Some(u), None)?;
        let e_z1 = s1.a_ib(t)?.column(2).into_owned();
        Ok(e_z1.dot(&(s2.omega(t)? - s1.omega(t)?)))
    }

    fn w_angle(&self, bodies: &Bodies, t: f64, q: &DVector<f64>) -> Result<DVector<f64>> {
        let [s1, s2] = self.rows.binding.sides(bodies, q, None, None)?;
        let e_z1 = s1.a_ib(t)?.column(2).into_owned();
        let w1 = -s1.j_r(t)?.tr_mul(&e_z1);
        let w2 = s2.j_r(t)?.tr_mul(&e_z1);
        let mut w = DVector::zeros(w1.len() + w2.len());
        w.rows_mut(0, w1.len()).copy_from(&w1);
        w.rows_mut(w1.len(), w2.len()).copy_from(&w2);
        Ok(w)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use crate::bodies::{Frame, RigidBodyQuaternion, pose_to_q};
    use crate::constraints::numerical_jacobian;
    use approx::assert_relative_eq;
    use mbs_math::{basic_rotation_z, exp_so3};
    use nalgebra::Matrix3;

    fn hinge(axis: Vector3<f64>) -> (Bodies, Revolute) {
        let mut bodies = Bodies::new(0.0);
        let origin = bodies.push(Box::new(Frame::origin()));
        let body = bodies.push(Box::new(
            RigidBodyQuaternion::new(1.0, Matrix3::identity())
                .with_pose(Vector3::new(0.0, 0.0, 1.0), exp_so3(&Vector3::new(0.3, -0.2, 0.1))),
        ));
        let joint = Revolute::new(
            &bodies,
            (origin, FrameId::BODY),
            (body, FrameId::BODY),
            &Vector3::new(0.0, 0.0, 1.0),
            &axis,
        )
        .unwrap();
        (bodies, joint)
    }

    #[test]
    fn test_rotation_about_axis_is_free() {
        let (bodies, joint) = hinge(Vector3::z());
        let q0 = bodies.q0();
        assert_eq!(joint.nla_g(), 5);
        assert_relative_eq!(joint.g(&bodies, 0.0, &q0).unwrap().norm(), 0.0, epsilon = 1e-12);
        assert_relative_eq!(joint.angle(&bodies, 0.0, &q0).unwrap(), 0.0, epsilon = 1e-12);

        let a0 = exp_so3(&Vector3::new(0.3, -0.2, 0.1));
        let q = pose_to_q(&Vector3::new(0.0, 0.0, 1.0), &(basic_rotation_z(0.5) * a0));
        assert_relative_eq!(joint.g(&bodies, 0.0, &q).unwrap().norm(), 0.0, epsilon = 1e-12);
        assert_relative_eq!(joint.angle(&bodies, 0.0, &q).unwrap(), 0.5, epsilon = 1e-12);
    }

    #[test]
    fn test_angle_rate_and_torque_direction() {
        let (bodies, joint) = hinge(Vector3::z());
        let q = bodies.q0();
        let a0 = exp_so3(&Vector3::new(0.3, -0.2, 0.1));
        // Body-fixed angular velocity equivalent to 2 rad/s about inertial z.
        let k_omega = a0.transpose() * Vector3::new(0.0, 0.0, 2.0);
        let u = DVector::from_vec(vec![0.0, 0.0, 0.0, k_omega.x, k_omega.y, k_omega.z]);
        assert_relative_eq!(joint.angle_dot(&bodies, 0.0, &q, &u).unwrap(), 2.0, epsilon = 1e-12);
        assert_relative_eq!(joint.g_dot(&bodies, 0.0, &q, &u).unwrap().norm(), 0.0, epsilon = 1e-12);

        let w = joint.w_angle(&bodies, 0.0, &q).unwrap();
        assert_relative_eq!(w.dot(&u), 2.0, epsilon = 1e-12);
    }

    #[test]
    fn test_degenerate_axis() {
        let mut bodies = Bodies::new(0.0);
        let origin = bodies.push(Box::new(Frame::origin()));
        let body = bodies.push(Box::new(RigidBodyQuaternion::new(1.0, Matrix3::identity())));
        let err = Revolute::new(
            &bodies,
            (origin, FrameId::BODY),
            (body, FrameId::BODY),
            &Vector3::zeros(),
            &Vector3::zeros(),
        )
        .unwrap_err();
        assert!(matches!(err, MbsError::DegenerateConstraint { .. }));
    }

    #[test]
    fn test_second_order_jacobians_fall_back_to_finite_differences() {
        let (bodies, joint) = hinge(Vector3::new(1.0, 1.0, 0.0));
        let mut q = bodies.q0();
        q[0] += 0.02;
        q[5] -= 0.05;

        let err = joint.g_q(&bodies, 0.0, &q).unwrap_err();
        assert!(matches!(err, MbsError::MissingAnalyticJacobian { .. }));

        let numeric = numerical_jacobian(&joint.q_dof(), &q, |x| joint.g(&bodies, 0.0, x)).unwrap();
        let analytic = joint.rows.g_q(&bodies, 0.0, &q).unwrap();
        assert_relative_eq!(numeric, analytic, epsilon = 1e-6);
    }
}
