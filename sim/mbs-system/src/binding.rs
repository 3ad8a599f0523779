//! Bindings between elements and the subsystems they act on.
//!
//! A binding is created once, when an element is built, and records which
//! subsystems the element couples, where on each subsystem it attaches and
//! the fixed relative-frame data captured in the initial configuration. All
//! element evaluations are pure functions of the global state and the
//! binding.

use nalgebra::{DVector, Matrix3, Matrix3xX, Vector3};

use mbs_types::{DofRange, MbsError, Result};

use crate::subsystem::{Attachment, Bodies, FrameId, Orientable, Subsystem, SubsystemId};

/// Attachment of an element to one subsystem.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Anchor {
    /// The subsystem.
    pub id: SubsystemId,
    /// Material frame on the subsystem.
    pub frame: FrameId,
    /// Body-fixed offset of the attachment point from the material frame.
    pub k_r_pb: Vector3<f64>,
    /// Body-fixed orientation of the attached frame, `A_KB`.
    pub a_kb: Matrix3<f64>,
    /// Global indices of the subsystem's coordinates.
    pub q_dof: DofRange,
    /// Global indices of the subsystem's velocities.
    pub u_dof: DofRange,
}

impl Anchor {
    /// Anchor at a point with the attached frame aligned to the body frame.
    pub fn at_point(bodies: &Bodies, id: SubsystemId, attachment: Attachment) -> Result<Self> {
        let slot = bodies.get(id)?;
        Ok(Self {
            id,
            frame: attachment.frame,
            k_r_pb: attachment.offset,
            a_kb: Matrix3::identity(),
            q_dof: slot.q_dof,
            u_dof: slot.u_dof,
        })
    }

    /// Anchor at an inertial pose `(r_OB0, A_IB0)` given in the initial
    /// configuration. The subsystem must be orientable.
    pub fn at_pose(
        bodies: &Bodies,
        id: SubsystemId,
        frame: FrameId,
        r_ob0: &Vector3<f64>,
        a_ib0: &Matrix3<f64>,
    ) -> Result<Self> {
        let slot = bodies.get(id)?;
        let orientable = slot.orientable()?;
        let t0 = bodies.t0();
        let q0 = slot.subsystem.q0();
        let a_ik0 = orientable.a_ik(t0, &q0, frame);
        let r_op0 = slot.subsystem.r_op(t0, &q0, frame, &Vector3::zeros());
        Ok(Self {
            id,
            frame,
            k_r_pb: a_ik0.transpose() * (r_ob0 - r_op0),
            a_kb: a_ik0.transpose() * a_ib0,
            q_dof: slot.q_dof,
            u_dof: slot.u_dof,
        })
    }

    /// Evaluation view with the local state gathered from global vectors.
    pub fn side<'a>(
        &self,
        bodies: &'a Bodies,
        q: &DVector<f64>,
        u: Option<&DVector<f64>>,
        u_dot: Option<&DVector<f64>>,
    ) -> Result<Side<'a>> {
        let slot = bodies.get(self.id)?;
        let gather = |v: Option<&DVector<f64>>| {
            v.map_or_else(|| DVector::zeros(self.u_dof.len()), |v| self.u_dof.gather(v))
        };
        Ok(Side {
            subsystem: slot.subsystem.as_ref(),
            frame: self.frame,
            k_r_pb: self.k_r_pb,
            a_kb: self.a_kb,
            q: self.q_dof.gather(q),
            u: gather(u),
            u_dot: gather(u_dot),
        })
    }
}

/// One subsystem anchor.
#[derive(Debug, Clone, PartialEq)]
pub struct BodyBinding {
    /// The anchor.
    pub anchor: Anchor,
}

impl BodyBinding {
    /// Bind to a point of a subsystem.
    pub fn new(bodies: &Bodies, id: SubsystemId, attachment: Attachment) -> Result<Self> {
        Ok(Self {
            anchor: Anchor::at_point(bodies, id, attachment)?,
        })
    }

    /// Global coordinate indices.
    #[must_use]
    pub fn q_dof(&self) -> Vec<usize> {
        self.anchor.q_dof.to_vec()
    }

    /// Global velocity indices.
    #[must_use]
    pub fn u_dof(&self) -> Vec<usize> {
        self.anchor.u_dof.to_vec()
    }
}

/// Two subsystem anchors.
///
/// Local quantities are ordered `(subsystem 1, subsystem 2)`: the first
/// `nq1` (`nu1`) entries belong to the first anchor.
#[derive(Debug, Clone, PartialEq)]
pub struct PairBinding {
    /// Anchors on both subsystems.
    pub anchors: [Anchor; 2],
}

impl PairBinding {
    /// Bind two points.
    pub fn at_points(
        bodies: &Bodies,
        (id1, at1): (SubsystemId, Attachment),
        (id2, at2): (SubsystemId, Attachment),
    ) -> Result<Self> {
        Ok(Self {
            anchors: [
                Anchor::at_point(bodies, id1, at1)?,
                Anchor::at_point(bodies, id2, at2)?,
            ],
        })
    }

    /// Bind both subsystems to a common inertial frame `(r_OB0, A_IB0)` in
    /// the initial configuration. Both subsystems must be orientable.
    pub fn at_common_frame(
        bodies: &Bodies,
        (id1, frame1): (SubsystemId, FrameId),
        (id2, frame2): (SubsystemId, FrameId),
        r_ob0: &Vector3<f64>,
        a_ib0: &Matrix3<f64>,
    ) -> Result<Self> {
        Ok(Self {
            anchors: [
                Anchor::at_pose(bodies, id1, frame1, r_ob0, a_ib0)?,
                Anchor::at_pose(bodies, id2, frame2, r_ob0, a_ib0)?,
            ],
        })
    }

    /// Coordinate count of the first subsystem.
    #[must_use]
    pub fn nq1(&self) -> usize {
        self.anchors[0].q_dof.len()
    }

    /// Velocity count of the first subsystem.
    #[must_use]
    pub fn nu1(&self) -> usize {
        self.anchors[0].u_dof.len()
    }

    /// Concatenated global coordinate indices.
    #[must_use]
    pub fn q_dof(&self) -> Vec<usize> {
        self.anchors.iter().flat_map(|a| a.q_dof.indices()).collect()
    }

    /// Concatenated global velocity indices.
    #[must_use]
    pub fn u_dof(&self) -> Vec<usize> {
        self.anchors.iter().flat_map(|a| a.u_dof.indices()).collect()
    }

    /// Evaluation views of both anchors.
    pub fn sides<'a>(
        &self,
        bodies: &'a Bodies,
        q: &DVector<f64>,
        u: Option<&DVector<f64>>,
        u_dot: Option<&DVector<f64>>,
    ) -> Result<[Side<'a>; 2]> {
        Ok([
            self.anchors[0].side(bodies, q, u, u_dot)?,
            self.anchors[1].side(bodies, q, u, u_dot)?,
        ])
    }
}

// ============================================================================
// Evaluation view
// ============================================================================

/// Kinematics of an attached point `B` and frame `A_IB = A_IK A_KB`,
/// evaluated at a fixed local state.
///
/// Angular quantities returned here are in inertial components.
pub struct Side<'a> {
    subsystem: &'a dyn Subsystem,
    frame: FrameId,
    k_r_pb: Vector3<f64>,
    a_kb: Matrix3<f64>,
    q: DVector<f64>,
    u: DVector<f64>,
    u_dot: DVector<f64>,
}

impl Side<'_> {
    /// Local coordinates.
    #[must_use]
    pub fn q(&self) -> &DVector<f64> {
        &self.q
    }

    /// Local velocities.
    #[must_use]
    pub fn u(&self) -> &DVector<f64> {
        &self.u
    }

    /// Position `r_OB`.
    #[must_use]
    pub fn r(&self, t: f64) -> Vector3<f64> {
        self.subsystem.r_op(t, &self.q, self.frame, &self.k_r_pb)
    }

    /// `∂r_OB/∂q`.
    #[must_use]
    pub fn r_q(&self, t: f64) -> Matrix3xX<f64> {
        self.subsystem.r_op_q(t, &self.q, self.frame, &self.k_r_pb)
    }

    /// Velocity `v_B`.
    #[must_use]
    pub fn v(&self, t: f64) -> Vector3<f64> {
        self.subsystem.v_p(t, &self.q, &self.u, self.frame, &self.k_r_pb)
    }

    /// `∂v_B/∂q`.
    #[must_use]
    pub fn v_q(&self, t: f64) -> Matrix3xX<f64> {
        self.subsystem.v_p_q(t, &self.q, &self.u, self.frame, &self.k_r_pb)
    }

    /// Acceleration `a_B`.
    #[must_use]
    pub fn a(&self, t: f64) -> Vector3<f64> {
        self.subsystem
            .a_p(t, &self.q, &self.u, &self.u_dot, self.frame, &self.k_r_pb)
    }

    /// `∂a_B/∂q`.
    #[must_use]
    pub fn a_q(&self, t: f64) -> Matrix3xX<f64> {
        self.subsystem
            .a_p_q(t, &self.q, &self.u, &self.u_dot, self.frame, &self.k_r_pb)
    }

    /// `∂a_B/∂u`.
    #[must_use]
    pub fn a_u(&self, t: f64) -> Matrix3xX<f64> {
        self.subsystem
            .a_p_u(t, &self.q, &self.u, &self.u_dot, self.frame, &self.k_r_pb)
    }

    /// Translational Jacobian `J_B`.
    #[must_use]
    pub fn j(&self, t: f64) -> Matrix3xX<f64> {
        self.subsystem.j_p(t, &self.q, self.frame, &self.k_r_pb)
    }

    /// `∂J_B/∂q`, one matrix per coordinate.
    #[must_use]
    pub fn j_q(&self, t: f64) -> Vec<Matrix3xX<f64>> {
        self.subsystem.j_p_q(t, &self.q, self.frame, &self.k_r_pb)
    }

    /// Orientation capability of the underlying subsystem.
    pub fn orientable(&self) -> Result<&dyn Orientable> {
        self.subsystem
            .as_orientable()
            .ok_or_else(|| MbsError::MissingCapability {
                subsystem: self.subsystem.name().to_owned(),
                capability: "an orientation",
            })
    }

    /// Orientation `A_IB`.
    pub fn a_ib(&self, t: f64) -> Result<Matrix3<f64>> {
        Ok(self.orientable()?.a_ik(t, &self.q, self.frame) * self.a_kb)
    }

    /// `∂A_IB/∂q`, one matrix per coordinate.
    pub fn a_ib_q(&self, t: f64) -> Result<Vec<Matrix3<f64>>> {
        Ok(self
            .orientable()?
            .a_ik_q(t, &self.q, self.frame)
            .iter()
            .map(|a| a * self.a_kb)
            .collect())
    }

    /// `∂e_i/∂q` for column `i` of `A_IB`, `3 × nq`.
    pub fn e_q(&self, t: f64, i: usize) -> Result<Matrix3xX<f64>> {
        let a_q = self.a_ib_q(t)?;
        let mut m = Matrix3xX::zeros(a_q.len());
        for (k, a) in a_q.iter().enumerate() {
            m.set_column(k, &a.column(i));
        }
        Ok(m)
    }

    /// Inertial angular velocity `Ω = A_IK K_Ω`.
    pub fn omega(&self, t: f64) -> Result<Vector3<f64>> {
        let o = self.orientable()?;
        Ok(o.a_ik(t, &self.q, self.frame) * o.k_omega(t, &self.q, &self.u, self.frame))
    }

    /// `∂Ω/∂q`.
    pub fn omega_q(&self, t: f64) -> Result<Matrix3xX<f64>> {
        let o = self.orientable()?;
        let k_omega = o.k_omega(t, &self.q, &self.u, self.frame);
        Ok(rotate_q(
            &o.a_ik(t, &self.q, self.frame),
            &o.a_ik_q(t, &self.q, self.frame),
            &k_omega,
            &o.k_omega_q(t, &self.q, &self.u, self.frame),
        ))
    }

    /// Inertial angular acceleration `Ψ = A_IK K_Ψ`.
    pub fn psi(&self, t: f64) -> Result<Vector3<f64>> {
        let o = self.orientable()?;
        Ok(o.a_ik(t, &self.q, self.frame) * o.k_psi(t, &self.q, &self.u, &self.u_dot, self.frame))
    }

    /// `∂Ψ/∂q`.
    pub fn psi_q(&self, t: f64) -> Result<Matrix3xX<f64>> {
        let o = self.orientable()?;
        let k_psi = o.k_psi(t, &self.q, &self.u, &self.u_dot, self.frame);
        Ok(rotate_q(
            &o.a_ik(t, &self.q, self.frame),
            &o.a_ik_q(t, &self.q, self.frame),
            &k_psi,
            &o.k_psi_q(t, &self.q, &self.u, &self.u_dot, self.frame),
        ))
    }

    /// `∂Ψ/∂u`.
    pub fn psi_u(&self, t: f64) -> Result<Matrix3xX<f64>> {
        let o = self.orientable()?;
        Ok(o.a_ik(t, &self.q, self.frame) * o.k_psi_u(t, &self.q, &self.u, &self.u_dot, self.frame))
    }

    /// Inertial rotational Jacobian `J_R = A_IK K_J_R`.
    pub fn j_r(&self, t: f64) -> Result<Matrix3xX<f64>> {
        let o = self.orientable()?;
        Ok(o.a_ik(t, &self.q, self.frame) * o.k_j_r(t, &self.q, self.frame))
    }

    /// `∂J_R/∂q`, one matrix per coordinate.
    pub fn j_r_q(&self, t: f64) -> Result<Vec<Matrix3xX<f64>>> {
        let o = self.orientable()?;
        let a_ik = o.a_ik(t, &self.q, self.frame);
        let k_j_r = o.k_j_r(t, &self.q, self.frame);
        Ok(o.a_ik_q(t, &self.q, self.frame)
            .iter()
            .zip(o.k_j_r_q(t, &self.q, self.frame))
            .map(|(a_q, k_j_r_q)| a_q * &k_j_r + a_ik * k_j_r_q)
            .collect())
    }
}

/// `∂(A x)/∂q = Σ_k (∂A/∂q_k) x e_kᵀ + A ∂x/∂q`.
fn rotate_q(
    a: &Matrix3<f64>,
    a_q: &[Matrix3<f64>],
    x: &Vector3<f64>,
    x_q: &Matrix3xX<f64>,
) -> Matrix3xX<f64> {
    let mut m = a * x_q;
    for (k, a_qk) in a_q.iter().enumerate() {
        let col = m.column(k) + a_qk * x;
        m.set_column(k, &col);
    }
    m
}
