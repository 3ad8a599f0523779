//! Rigid connection: no relative motion between two frames.

use nalgebra::{DMatrix, DVector, Matrix3, Vector3};

use mbs_types::Result;

use crate::binding::PairBinding;
use crate::constraints::BilateralConstraint;
use crate::constraints::pose::PoseRows;
use crate::subsystem::{Bodies, FrameId, SubsystemId};

/// Orientation rows `e_x¹·e_y²`, `e_y¹·e_z²`, `e_z¹·e_x²`.
const ROLL_PAIRS: &[(usize, usize)] = &[(0, 1), (1, 2), (2, 0)];

/// Six-row constraint fixing the relative pose of two subsystems.
///
/// The connection frame `B` is captured once in the initial configuration,
/// so the residual measures drift from that relative pose.
#[derive(Debug, Clone, PartialEq)]
pub struct RigidConnection {
    name: String,
    rows: PoseRows,
}

impl RigidConnection {
    /// Connect two subsystems with `B` placed at the first subsystem's frame
    /// in the initial configuration.
    pub fn new(
        bodies: &Bodies,
        body1: (SubsystemId, FrameId),
        body2: (SubsystemId, FrameId),
    ) -> Result<Self> {
        let t0 = bodies.t0();
        let slot = bodies.get(body1.0)?;
        let q0 = slot.subsystem.q0();
        let r_ob0 = slot.subsystem.r_op(t0, &q0, body1.1, &Vector3::zeros());
        let a_ib0 = slot.orientable()?.a_ik(t0, &q0, body1.1);
        Self::at_pose(bodies, body1, body2, &r_ob0, &a_ib0)
    }

    /// Connect two subsystems at the inertial pose `(r_OB0, A_IB0)`.
    pub fn at_pose(
        bodies: &Bodies,
        body1: (SubsystemId, FrameId),
        body2: (SubsystemId, FrameId),
        r_ob0: &Vector3<f64>,
        a_ib0: &Matrix3<f64>,
    ) -> Result<Self> {
        Ok(Self {
            name: "rigid_connection".to_owned(),
            rows: PoseRows {
                binding: PairBinding::at_common_frame(bodies, body1, body2, r_ob0, a_ib0)?,
                pairs: ROLL_PAIRS,
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

impl BilateralConstraint for RigidConnection {
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
        true
    }

    fn g_q(&self, bodies: &Bodies, t: f64, q: &DVector<f64>) -> Result<DMatrix<f64>> {
        self.rows.g_q(bodies, t, q)
    }

    fn g_dot_q(
        &self,
        bodies: &Bodies,
        t: f64,
        q: &DVector<f64>,
        u: &DVector<f64>,
    ) -> Result<DMatrix<f64>> {
        self.rows.g_dot_q(bodies, t, q, u)
    }

    fn g_ddot_q(
        &self,
        bodies: &Bodies,
        t: f64,
        q: &DVector<f64>,
        u: &DVector<f64>,
        u_dot: &DVector<f64>,
    ) -> Result<DMatrix<f64>> {
        self.rows.g_ddot_q(bodies, t, q, u, u_dot)
    }

    fn g_ddot_u(
        &self,
        bodies: &Bodies,
        t: f64,
        q: &DVector<f64>,
        u: &DVector<f64>,
        u_dot: &DVector<f64>,
    ) -> Result<DMatrix<f64>> {
        self.rows.g_ddot_u(bodies, t, q, u, u_dot)
    }

    fn wla_g_q(
        &self,
        bodies: &Bodies,
        t: f64,
        q: &DVector<f64>,
        la_g: &DVector<f64>,
    ) -> Result<DMatrix<f64>> {
        self.rows.wla_g_q(bodies, t, q, la_g)
    }
}
