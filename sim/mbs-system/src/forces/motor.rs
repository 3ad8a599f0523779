//! Torque drive on a joint.

use std::sync::Arc;

use nalgebra::{DMatrix, DVector};

use mbs_types::Result;

use crate::bodies::TimeScalar;
use crate::constraints::{BilateralConstraint, RotationalTransmission};
use crate::forces::ForceElement;
use crate::subsystem::Bodies;

/// Decorator driving a joint with a prescribed torque `τ(t)`.
///
/// The motor is the wrapped joint as far as constraints are concerned and
/// additionally contributes `h = w_angle τ(t)` as a force element.
#[derive(Clone)]
pub struct Motor<T> {
    inner: T,
    tau: TimeScalar,
}

impl<T: std::fmt::Debug> std::fmt::Debug for Motor<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Motor")
            .field("inner", &self.inner)
            .finish_non_exhaustive()
    }
}

impl<T: RotationalTransmission> Motor<T> {
    /// Drive `inner` with torque `tau(t)`.
    pub fn new<F>(inner: T, tau: F) -> Self
    where
        F: Fn(f64) -> f64 + Send + Sync + 'static,
    {
        Self {
            inner,
            tau: Arc::new(tau),
        }
    }

    /// Drive `inner` with a constant torque.
    pub fn constant(inner: T, tau: f64) -> Self {
        Self::new(inner, move |_| tau)
    }

    /// The driven joint.
    pub fn inner(&self) -> &T {
        &self.inner
    }

    /// Torque at time `t`.
    pub fn tau(&self, t: f64) -> f64 {
        (self.tau)(t)
    }
}

impl<T: RotationalTransmission> BilateralConstraint for Motor<T> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn nla_g(&self) -> usize {
        self.inner.nla_g()
    }

    fn la_g0(&self) -> DVector<f64> {
        self.inner.la_g0()
    }

    fn q_dof(&self) -> Vec<usize> {
        self.inner.q_dof()
    }

    fn u_dof(&self) -> Vec<usize> {
        self.inner.u_dof()
    }

    fn g(&self, bodies: &Bodies, t: f64, q: &DVector<f64>) -> Result<DVector<f64>> {
        self.inner.g(bodies, t, q)
    }

    fn g_dot(&self, bodies: &Bodies, t: f64, q: &DVector<f64>, u: &DVector<f64>) -> Result<DVector<f64>> {
        self.inner.g_dot(bodies, t, q, u)
    }

    fn g_ddot(
        &self,
        bodies: &Bodies,
        t: f64,
        q: &DVector<f64>,
        u: &DVector<f64>,
        u_dot: &DVector<f64>,
    ) -> Result<DVector<f64>> {
        self.inner.g_ddot(bodies, t, q, u, u_dot)
    }

    fn w_g(&self, bodies: &Bodies, t: f64, q: &DVector<f64>) -> Result<DMatrix<f64>> {
        self.inner.w_g(bodies, t, q)
    }

    fn has_analytic_jacobian(&self) -> bool {
        self.inner.has_analytic_jacobian()
    }

    fn g_q(&self, bodies: &Bodies, t: f64, q: &DVector<f64>) -> Result<DMatrix<f64>> {
        self.inner.g_q(bodies, t, q)
    }

    fn g_dot_q(
        &self,
        bodies: &Bodies,
        t: f64,
        q: &DVector<f64>,
        u: &DVector<f64>,
    ) -> Result<DMatrix<f64>> {
        self.inner.g_dot_q(bodies, t, q, u)
    }

    fn g_ddot_q(
        &self,
        bodies: &Bodies,
        t: f64,
        q: &DVector<f64>,
        u: &DVector<f64>,
        u_dot: &DVector<f64>,
    ) -> Result<DMatrix<f64>> {
        self.inner.g_ddot_q(bodies, t, q, u, u_dot)
    }

    fn g_ddot_u(
        &self,
        bodies: &Bodies,
        t: f64,
        q: &DVector<f64>,
        u: &DVector<f64>,
        u_dot: &DVector<f64>,
    ) -> Result<DMatrix<f64>> {
        self.inner.g_ddot_u(bodies, t, q, u, u_dot)
    }

    fn wla_g_q(
        &self,
        bodies: &Bodies,
        t: f64,
        q: &DVector<f64>,
        la_g: &DVector<f64>,
    ) -> Result<DMatrix<f64>> {
        self.inner.wla_g_q(bodies, t, q, la_g)
    }
}

impl<T: RotationalTransmission> ForceElement for Motor<T> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn q_dof(&self) -> Vec<usize> {
        self.inner.q_dof()
    }

    fn u_dof(&self) -> Vec<usize> {
        self.inner.u_dof()
    }

    fn h(&self, bodies: &Bodies, t: f64, q: &DVector<f64>, _u: &DVector<f64>) -> Result<DVector<f64>> {
        Ok(self.inner.w_angle(bodies, t, q)? * self.tau(t))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use crate::bodies::{Frame, RigidBodyQuaternion};
    use crate::constraints::Revolute;
    use crate::subsystem::FrameId;
    use approx::assert_relative_eq;
    use nalgebra::{Matrix3, Vector3};

    fn driven() -> (Bodies, Motor<Revolute>) {
        let mut bodies = Bodies::new(0.0);
        let origin = bodies.push(Box::new(Frame::origin()));
        let rotor = bodies.push(Box::new(
            RigidBodyQuaternion::new(1.0, Matrix3::identity()).with_pose(Vector3::x(), Matrix3::identity()),
        ));
        let joint = Revolute::new(
            &bodies,
            (origin, FrameId::BODY),
            (rotor, FrameId::BODY),
            &Vector3::x(),
            &Vector3::z(),
        )
        .unwrap();
        (bodies, Motor::new(joint, |t| 2.0 + t))
    }

    #[test]
    fn test_motor_forwards_constraint() {
        let (bodies, motor) = driven();
        let q = bodies.q0();
        assert_eq!(BilateralConstraint::name(&motor), "revolute");
        assert_eq!(motor.nla_g(), 5);
        assert_eq!(
            motor.w_g(&bodies, 0.0, &q).unwrap(),
            motor.inner().w_g(&bodies, 0.0, &q).unwrap()
        );
    }

    #[test]
    fn test_motor_torque_power() {
        let (bodies, motor) = driven();
        let q = bodies.q0();
        let u = DVector::from_vec(vec![0.0, 0.0, 0.0, 0.1, -0.2, 1.5]);
        let t = 1.0;
        let h = motor.h(&bodies, t, &q, &u).unwrap();
        let rate = motor.inner().angle_dot(&bodies, t, &q, &u).unwrap();
        assert_relative_eq!(h.dot(&u), motor.tau(t) * rate, epsilon = 1e-12);
        assert_relative_eq!(h[5], 3.0, epsilon = 1e-12);
    }
}
