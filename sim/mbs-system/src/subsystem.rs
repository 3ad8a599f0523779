//! The subsystem contract.
//!
//! Every body that takes part in a system exposes the kinematics of its
//! material points through [`KinematicPoint`], optionally its orientation
//! through [`Orientable`], and its degree-of-freedom bookkeeping and inertia
//! through [`Subsystem`].
//!
//! All methods receive the subsystem's *local* coordinates: `q` has length
//! [`Subsystem::nq`] and `u` has length [`Subsystem::nu`]. Jacobians with
//! respect to `q` have `nq` columns, Jacobians with respect to `u` have `nu`
//! columns. Three-index quantities (the derivative of a Jacobian with
//! respect to `q`) are returned as one matrix per coordinate, indexed by the
//! coordinate.
//!
//! # Consistency
//!
//! The analytic Jacobians must agree with numerical differentiation of the
//! corresponding zeroth-order quantities. Nothing in the type system enforces
//! this; use [`crate::conformance`] in the tests of every new subsystem.

use nalgebra::{DMatrix, DVector, Matrix3, Matrix3xX, Vector3};

use mbs_types::{DofRange, MbsError, Result};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Index of a subsystem within a [`Bodies`] registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SubsystemId(pub usize);

/// Parametric location of a material frame on a subsystem.
///
/// Rigid bodies have a single frame and ignore the value; continuous
/// bodies (beams) would interpret it as the centerline coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FrameId(pub f64);

impl FrameId {
    /// The body frame of a rigid body.
    pub const BODY: Self = Self(0.0);
}

/// A material point: frame plus a body-fixed offset `K_r_SP`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Attachment {
    /// Material frame the offset is expressed in.
    pub frame: FrameId,
    /// Offset from the frame origin, body-fixed components.
    pub offset: Vector3<f64>,
}

impl Attachment {
    /// The origin of the body frame.
    #[must_use]
    pub fn origin() -> Self {
        Self::default()
    }

    /// A point at the given body-fixed offset from the body frame origin.
    #[must_use]
    pub fn at(offset: Vector3<f64>) -> Self {
        Self {
            frame: FrameId::BODY,
            offset,
        }
    }
}

// ============================================================================
// Capability traits
// ============================================================================

/// Kinematics of a material point `P` of a subsystem.
#[allow(clippy::too_many_arguments)]
pub trait KinematicPoint {
    /// Position `r_OP`.
    fn r_op(&self, t: f64, q: &DVector<f64>, frame: FrameId, k_r_sp: &Vector3<f64>)
    -> Vector3<f64>;

    /// `∂r_OP/∂q`, `3 × nq`.
    fn r_op_q(
        &self,
        t: f64,
        q: &DVector<f64>,
        frame: FrameId,
        k_r_sp: &Vector3<f64>,
    ) -> Matrix3xX<f64>;

    /// Velocity `v_P`.
    fn v_p(
        &self,
        t: f64,
        q: &DVector<f64>,
        u: &DVector<f64>,
        frame: FrameId,
        k_r_sp: &Vector3<f64>,
    ) -> Vector3<f64>;

    /// `∂v_P/∂q`, `3 × nq`.
    fn v_p_q(
        &self,
        t: f64,
        q: &DVector<f64>,
        u: &DVector<f64>,
        frame: FrameId,
        k_r_sp: &Vector3<f64>,
    ) -> Matrix3xX<f64>;

    /// Acceleration `a_P`.
    fn a_p(
        &self,
        t: f64,
        q: &DVector<f64>,
        u: &DVector<f64>,
        u_dot: &DVector<f64>,
        frame: FrameId,
        k_r_sp: &Vector3<f64>,
    ) -> Vector3<f64>;

    /// `∂a_P/∂q`, `3 × nq`.
    fn a_p_q(
        &self,
        t: f64,
        q: &DVector<f64>,
        u: &DVector<f64>,
        u_dot: &DVector<f64>,
        frame: FrameId,
        k_r_sp: &Vector3<f64>,
    ) -> Matrix3xX<f64>;

    /// `∂a_P/∂u`, `3 × nu`.
    fn a_p_u(
        &self,
        t: f64,
        q: &DVector<f64>,
        u: &DVector<f64>,
        u_dot: &DVector<f64>,
        frame: FrameId,
        k_r_sp: &Vector3<f64>,
    ) -> Matrix3xX<f64>;

    /// Translational Jacobian `J_P = ∂v_P/∂u`, `3 × nu`.
    fn j_p(&self, t: f64, q: &DVector<f64>, frame: FrameId, k_r_sp: &Vector3<f64>)
    -> Matrix3xX<f64>;

    /// `∂J_P/∂q`: one `3 × nu` matrix per coordinate.
    fn j_p_q(
        &self,
        t: f64,
        q: &DVector<f64>,
        frame: FrameId,
        k_r_sp: &Vector3<f64>,
    ) -> Vec<Matrix3xX<f64>>;
}

/// Orientation of a material frame `K` of a subsystem.
///
/// Angular velocity and acceleration are given in body-fixed components.
pub trait Orientable {
    /// Rotation `A_IK` from body-fixed to inertial components.
    fn a_ik(&self, t: f64, q: &DVector<f64>, frame: FrameId) -> Matrix3<f64>;

    /// `∂A_IK/∂q`: one `3 × 3` matrix per coordinate.
    fn a_ik_q(&self, t: f64, q: &DVector<f64>, frame: FrameId) -> Vec<Matrix3<f64>>;

    /// Body-fixed angular velocity `K_Ω`.
    fn k_omega(&self, t: f64, q: &DVector<f64>, u: &DVector<f64>, frame: FrameId)
    -> Vector3<f64>;

    /// `∂K_Ω/∂q`, `3 × nq`.
    fn k_omega_q(
        &self,
        t: f64,
        q: &DVector<f64>,
        u: &DVector<f64>,
        frame: FrameId,
    ) -> Matrix3xX<f64>;

    /// Body-fixed angular acceleration `K_Ψ`.
    fn k_psi(
        &self,
        t: f64,
        q: &DVector<f64>,
        u: &DVector<f64>,
        u_dot: &DVector<f64>,
        frame: FrameId,
    ) -> Vector3<f64>;

    /// `∂K_Ψ/∂q`, `3 × nq`.
    fn k_psi_q(
        &self,
        t: f64,
        q: &DVector<f64>,
        u: &DVector<f64>,
        u_dot: &DVector<f64>,
        frame: FrameId,
    ) -> Matrix3xX<f64>;

    /// `∂K_Ψ/∂u`, `3 × nu`.
    fn k_psi_u(
        &self,
        t: f64,
        q: &DVector<f64>,
        u: &DVector<f64>,
        u_dot: &DVector<f64>,
        frame: FrameId,
    ) -> Matrix3xX<f64>;

    /// Rotational Jacobian `K_J_R = ∂K_Ω/∂u`, `3 × nu`.
    fn k_j_r(&self, t: f64, q: &DVector<f64>, frame: FrameId) -> Matrix3xX<f64>;

    /// `∂K_J_R/∂q`: one `3 × nu` matrix per coordinate.
    fn k_j_r_q(&self, t: f64, q: &DVector<f64>, frame: FrameId) -> Vec<Matrix3xX<f64>>;
}

/// Degree-of-freedom bookkeeping, inertia and internal forces.
pub trait Subsystem: KinematicPoint {
    /// Human-readable name used in diagnostics.
    fn name(&self) -> &str;

    /// Number of generalized coordinates.
    fn nq(&self) -> usize;

    /// Number of generalized velocities.
    fn nu(&self) -> usize;

    /// Initial generalized coordinates.
    fn q0(&self) -> DVector<f64>;

    /// Initial generalized velocities.
    fn u0(&self) -> DVector<f64>;

    /// Kinematic differential equation `q̇ = B(q) u`.
    fn q_dot(&self, t: f64, q: &DVector<f64>, u: &DVector<f64>) -> DVector<f64> {
        self.q_dot_u(t, q) * u
    }

    /// `B(q) = ∂q̇/∂u`, `nq × nu`.
    fn q_dot_u(&self, t: f64, q: &DVector<f64>) -> DMatrix<f64>;

    /// Mass matrix, `nu × nu`. Massless subsystems return `None`.
    fn mass_matrix(&self, _t: f64, _q: &DVector<f64>) -> Option<DMatrix<f64>> {
        None
    }

    /// Internal and gyroscopic generalized forces, length `nu`.
    fn h(&self, _t: f64, _q: &DVector<f64>, _u: &DVector<f64>) -> Option<DVector<f64>> {
        None
    }

    /// Post-step projection, e.g. renormalization of redundant coordinates.
    fn step_callback(&self, _t: f64, _q: &mut DVector<f64>, _u: &mut DVector<f64>) {}

    /// Orientation capability, if the subsystem has one.
    fn as_orientable(&self) -> Option<&dyn Orientable> {
        None
    }
}

// ============================================================================
// Registry
// ============================================================================

/// A subsystem together with its slots in the global coordinate vectors.
pub struct BodySlot {
    /// The subsystem.
    pub subsystem: Box<dyn Subsystem>,
    /// Global indices of its generalized coordinates.
    pub q_dof: DofRange,
    /// Global indices of its generalized velocities.
    pub u_dof: DofRange,
}

impl std::fmt::Debug for BodySlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BodySlot")
            .field("name", &self.subsystem.name())
            .field("q_dof", &self.q_dof)
            .field("u_dof", &self.u_dof)
            .finish()
    }
}

impl BodySlot {
    /// Local coordinates of this subsystem.
    #[must_use]
    pub fn local_q(&self, q: &DVector<f64>) -> DVector<f64> {
        self.q_dof.gather(q)
    }

    /// Local velocities (or accelerations) of this subsystem.
    #[must_use]
    pub fn local_u(&self, u: &DVector<f64>) -> DVector<f64> {
        self.u_dof.gather(u)
    }

    /// Orientation capability or a [`MbsError::MissingCapability`] error.
    pub fn orientable(&self) -> Result<&dyn Orientable> {
        self.subsystem
            .as_orientable()
            .ok_or_else(|| MbsError::MissingCapability {
                subsystem: self.subsystem.name().to_owned(),
                capability: "an orientation",
            })
    }
}

/// Append-only registry of subsystems.
///
/// Coordinates are assigned in insertion order, so the global index ranges
/// of existing subsystems never change.
#[derive(Debug, Default)]
pub struct Bodies {
    t0: f64,
    slots: Vec<BodySlot>,
    nq: usize,
    nu: usize,
}

impl Bodies {
    /// Empty registry with initial time `t0`.
    #[must_use]
    pub fn new(t0: f64) -> Self {
        Self {
            t0,
            ..Self::default()
        }
    }

    /// Initial time at which elements capture their reference configuration.
    #[must_use]
    pub fn t0(&self) -> f64 {
        self.t0
    }

    /// Register a subsystem and assign its global index ranges.
    pub fn push(&mut self, subsystem: Box<dyn Subsystem>) -> SubsystemId {
        let q_dof = DofRange::new(self.nq, subsystem.nq());
        let u_dof = DofRange::new(self.nu, subsystem.nu());
        self.nq += q_dof.len();
        self.nu += u_dof.len();
        self.slots.push(BodySlot {
            subsystem,
            q_dof,
            u_dof,
        });
        SubsystemId(self.slots.len() - 1)
    }

    /// Look up a subsystem.
    pub fn get(&self, id: SubsystemId) -> Result<&BodySlot> {
        self.slots.get(id.0).ok_or(MbsError::UnknownSubsystem(id.0))
    }

    /// Iterate over all registered subsystems.
    pub fn iter(&self) -> impl Iterator<Item = &BodySlot> {
        self.slots.iter()
    }

    /// Number of registered subsystems.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Total number of generalized coordinates.
    #[must_use]
    pub fn nq(&self) -> usize {
        self.nq
    }

    /// Total number of generalized velocities.
    #[must_use]
    pub fn nu(&self) -> usize {
        self.nu
    }

    /// Initial coordinates of all subsystems.
    #[must_use]
    pub fn q0(&self) -> DVector<f64> {
        let mut q0 = DVector::zeros(self.nq);
        for slot in &self.slots {
            slot.q_dof.scatter(&slot.subsystem.q0(), &mut q0);
        }
        q0
    }

    /// Initial velocities of all subsystems.
    #[must_use]
    pub fn u0(&self) -> DVector<f64> {
        let mut u0 = DVector::zeros(self.nu);
        for slot in &self.slots {
            slot.u_dof.scatter(&slot.subsystem.u0(), &mut u0);
        }
        u0
    }
}

/// Dense `DMatrix` copy of a `3 × n` matrix.
#[must_use]
pub fn to_dmatrix(m: &Matrix3xX<f64>) -> DMatrix<f64> {
    DMatrix::from_column_slice(3, m.ncols(), m.as_slice())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use crate::bodies::{Frame, PointMass};

    #[test]
    fn test_registry_assigns_contiguous_ranges() {
        let mut bodies = Bodies::new(0.0);
        let origin = bodies.push(Box::new(Frame::origin()));
        let a = bodies.push(Box::new(PointMass::new(1.0, Vector3::zeros(), Vector3::zeros())));
        let b = bodies.push(Box::new(PointMass::new(2.0, Vector3::x(), Vector3::zeros())));

        assert_eq!(bodies.get(origin).unwrap().q_dof, DofRange::new(0, 0));
        assert_eq!(bodies.get(a).unwrap().q_dof, DofRange::new(0, 3));
        assert_eq!(bodies.get(b).unwrap().u_dof, DofRange::new(3, 3));
        assert_eq!(bodies.nq(), 6);
        assert_eq!(bodies.q0()[3], 1.0);
    }

    #[test]
    fn test_unknown_subsystem() {
        let bodies = Bodies::new(0.0);
        assert_eq!(
            bodies.get(SubsystemId(3)).unwrap_err(),
            MbsError::UnknownSubsystem(3)
        );
    }

    #[test]
    fn test_point_mass_is_not_orientable() {
        let mut bodies = Bodies::new(0.0);
        let id = bodies.push(Box::new(PointMass::new(1.0, Vector3::zeros(), Vector3::zeros())));
        let err = bodies.get(id).unwrap().orientable().err().unwrap();
        assert!(matches!(err, MbsError::MissingCapability { .. }));
    }
}
