//! Rigid body with a quaternion orientation parametrization.
//!
//! Coordinates `q = (r_OS, P)` with the center of mass `S` and a
//! (non-normalized) quaternion `P`, velocities `u = (v_S, K_Ω)` with the
//! body-fixed angular velocity. Hence `nq = 7` and `nu = 6`; the quaternion
//! is renormalized after every accepted step.

use nalgebra::{DMatrix, DVector, Matrix3, Matrix3xX, Vector3, Vector4};

use mbs_math::{ax2skew, exp_so3_quat, exp_so3_quat_p, quat_from_matrix, t_so3_inv_quat};

use crate::subsystem::{FrameId, KinematicPoint, Orientable, Subsystem};

/// Rigid body parametrized by center of mass position and quaternion.
#[derive(Debug, Clone)]
pub struct RigidBodyQuaternion {
    name: String,
    mass: f64,
    k_theta_s: Matrix3<f64>,
    q0: DVector<f64>,
    u0: DVector<f64>,
}

/// Generalized coordinates for a pose.
#[must_use]
pub fn pose_to_q(r_os: &Vector3<f64>, a_ik: &Matrix3<f64>) -> DVector<f64> {
    let p = quat_from_matrix(a_ik);
    DVector::from_vec(vec![r_os.x, r_os.y, r_os.z, p[0], p[1], p[2], p[3]])
}

impl RigidBodyQuaternion {
    /// Body at rest at the origin with identity orientation.
    ///
    /// `k_theta_s` is the inertia tensor about the center of mass in
    /// body-fixed components.
    #[must_use]
    pub fn new(mass: f64, k_theta_s: Matrix3<f64>) -> Self {
        Self {
            name: "rigid_body".to_owned(),
            mass,
            k_theta_s,
            q0: pose_to_q(&Vector3::zeros(), &Matrix3::identity()),
            u0: DVector::zeros(6),
        }
    }

    /// Set the diagnostic name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Initial pose.
    #[must_use]
    pub fn with_pose(mut self, r_os: Vector3<f64>, a_ik: Matrix3<f64>) -> Self {
        self.q0 = pose_to_q(&r_os, &a_ik);
        self
    }

    /// Initial velocity of the center of mass and body-fixed angular velocity.
    #[must_use]
    pub fn with_velocity(mut self, v_s: Vector3<f64>, k_omega: Vector3<f64>) -> Self {
        self.u0 = DVector::from_vec(vec![v_s.x, v_s.y, v_s.z, k_omega.x, k_omega.y, k_omega.z]);
        self
    }

    /// Mass.
    #[must_use]
    pub fn mass(&self) -> f64 {
        self.mass
    }

    /// Inertia about the center of mass, body-fixed components.
    #[must_use]
    pub fn inertia(&self) -> Matrix3<f64> {
        self.k_theta_s
    }
}

fn quat(q: &DVector<f64>) -> Vector4<f64> {
    Vector4::new(q[3], q[4], q[5], q[6])
}

fn head(v: &DVector<f64>) -> Vector3<f64> {
    Vector3::new(v[0], v[1], v[2])
}

fn tail(v: &DVector<f64>) -> Vector3<f64> {
    Vector3::new(v[3], v[4], v[5])
}

/// `3 × 7` matrix with `∂A/∂P_k · x` in the quaternion columns.
fn quat_columns(q: &DVector<f64>, x: &Vector3<f64>) -> Matrix3xX<f64> {
    let a_p = exp_so3_quat_p(&quat(q));
    let mut m = Matrix3xX::zeros(7);
    for (k, a_pk) in a_p.iter().enumerate() {
        m.set_column(3 + k, &(a_pk * x));
    }
    m
}

impl KinematicPoint for RigidBodyQuaternion {
    fn r_op(&self, _t: f64, q: &DVector<f64>, _frame: FrameId, k_r_sp: &Vector3<f64>) -> Vector3<f64> {
        head(q) + exp_so3_quat(&quat(q)) * k_r_sp
    }

    fn r_op_q(&self, _t: f64, q: &DVector<f64>, _frame: FrameId, k_r_sp: &Vector3<f64>) -> Matrix3xX<f64> {
        let mut m = quat_columns(q, k_r_sp);
        m.fixed_view_mut::<3, 3>(0, 0).copy_from(&Matrix3::identity());
        m
    }

    fn v_p(
        &self,
        _t: f64,
        q: &DVector<f64>,
        u: &DVector<f64>,
        _frame: FrameId,
        k_r_sp: &Vector3<f64>,
    ) -> Vector3<f64> {
        head(u) + exp_so3_quat(&quat(q)) * tail(u).cross(k_r_sp)
    }

    fn v_p_q(
        &self,
        _t: f64,
        q: &DVector<f64>,
        u: &DVector<f64>,
        _frame: FrameId,
        k_r_sp: &Vector3<f64>,
    ) -> Matrix3xX<f64> {
        quat_columns(q, &tail(u).cross(k_r_sp))
    }

    fn a_p(
        &self,
        _t: f64,
        q: &DVector<f64>,
        u: &DVector<f64>,
        u_dot: &DVector<f64>,
        _frame: FrameId,
        k_r_sp: &Vector3<f64>,
    ) -> Vector3<f64> {
        let omega = tail(u);
        let psi = tail(u_dot);
        head(u_dot)
            + exp_so3_quat(&quat(q)) * (psi.cross(k_r_sp) + omega.cross(&omega.cross(k_r_sp)))
    }

    fn a_p_q(
        &self,
        _t: f64,
        q: &DVector<f64>,
        u: &DVector<f64>,
        u_dot: &DVector<f64>,
        _frame: FrameId,
        k_r_sp: &Vector3<f64>,
    ) -> Matrix3xX<f64> {
        let omega = tail(u);
        let psi = tail(u_dot);
        quat_columns(q, &(psi.cross(k_r_sp) + omega.cross(&omega.cross(k_r_sp))))
    }

    fn a_p_u(
        &self,
        _t: f64,
        q: &DVector<f64>,
        u: &DVector<f64>,
        _u_dot: &DVector<f64>,
        _frame: FrameId,
        k_r_sp: &Vector3<f64>,
    ) -> Matrix3xX<f64> {
        // ∂/∂ω [ω × (ω × r)] = (ω·r) I + ω rᵀ - 2 r ωᵀ
        let omega = tail(u);
        let d = Matrix3::identity() * omega.dot(k_r_sp) + omega * k_r_sp.transpose()
            - k_r_sp * omega.transpose() * 2.0;
        let mut m = Matrix3xX::zeros(6);
        m.fixed_view_mut::<3, 3>(0, 3)
            .copy_from(&(exp_so3_quat(&quat(q)) * d));
        m
    }

    fn j_p(&self, _t: f64, q: &DVector<f64>, _frame: FrameId, k_r_sp: &Vector3<f64>) -> Matrix3xX<f64> {
        let mut m = Matrix3xX::zeros(6);
        m.fixed_view_mut::<3, 3>(0, 0).copy_from(&Matrix3::identity());
        m.fixed_view_mut::<3, 3>(0, 3)
            .copy_from(&(-exp_so3_quat(&quat(q)) * ax2skew(k_r_sp)));
        m
    }

    fn j_p_q(
        &self,
        _t: f64,
        q: &DVector<f64>,
        _frame: FrameId,
        k_r_sp: &Vector3<f64>,
    ) -> Vec<Matrix3xX<f64>> {
        let r_tilde = ax2skew(k_r_sp);
        let mut out = vec![Matrix3xX::zeros(6); 7];
        for (k, a_pk) in exp_so3_quat_p(&quat(q)).iter().enumerate() {
            out[3 + k]
                .fixed_view_mut::<3, 3>(0, 3)
                .copy_from(&(-(a_pk * r_tilde)));
        }
        out
    }
}

impl Orientable for RigidBodyQuaternion {
    fn a_ik(&self, _t: f64, q: &DVector<f64>, _frame: FrameId) -> Matrix3<f64> {
        exp_so3_quat(&quat(q))
    }

    fn a_ik_q(&self, _t: f64, q: &DVector<f64>, _frame: FrameId) -> Vec<Matrix3<f64>> {
        let mut out = vec![Matrix3::zeros(); 7];
        out[3..].copy_from_slice(&exp_so3_quat_p(&quat(q)));
        out
    }

    fn k_omega(&self, _t: f64, _q: &DVector<f64>, u: &DVector<f64>, _frame: FrameId) -> Vector3<f64> {
        tail(u)
    }

    fn k_omega_q(&self, _t: f64, _q: &DVector<f64>, _u: &DVector<f64>, _frame: FrameId) -> Matrix3xX<f64> {
        Matrix3xX::zeros(7)
    }

    fn k_psi(
        &self,
        _t: f64,
        _q: &DVector<f64>,
        _u: &DVector<f64>,
        u_dot: &DVector<f64>,
        _frame: FrameId,
    ) -> Vector3<f64> {
        tail(u_dot)
    }

    fn k_psi_q(
        &self,
        _t: f64,
        _q: &DVector<f64>,
        _u: &DVector<f64>,
        _u_dot: &DVector<f64>,
        _frame: FrameId,
    ) -> Matrix3xX<f64> {
        Matrix3xX::zeros(7)
    }

    fn k_psi_u(
        &self,
        _t: f64,
        _q: &DVector<f64>,
        _u: &DVector<f64>,
        _u_dot: &DVector<f64>,
        _frame: FrameId,
    ) -> Matrix3xX<f64> {
        Matrix3xX::zeros(6)
    }

    fn k_j_r(&self, _t: f64, _q: &DVector<f64>, _frame: FrameId) -> Matrix3xX<f64> {
        let mut m = Matrix3xX::zeros(6);
        m.fixed_view_mut::<3, 3>(0, 3).copy_from(&Matrix3::identity());
        m
    }

    fn k_j_r_q(&self, _t: f64, _q: &DVector<f64>, _frame: FrameId) -> Vec<Matrix3xX<f64>> {
        vec![Matrix3xX::zeros(6); 7]
    }
}

impl Subsystem for RigidBodyQuaternion {
    fn name(&self) -> &str {
        &self.name
    }

    fn nq(&self) -> usize {
        7
    }

    fn nu(&self) -> usize {
        6
    }

    fn q0(&self) -> DVector<f64> {
        self.q0.clone()
    }

    fn u0(&self) -> DVector<f64> {
        self.u0.clone()
    }

    fn q_dot_u(&self, _t: f64, q: &DVector<f64>) -> DMatrix<f64> {
        let mut b = DMatrix::zeros(7, 6);
        b.fixed_view_mut::<3, 3>(0, 0).copy_from(&Matrix3::identity());
        b.fixed_view_mut::<4, 3>(3, 3)
            .copy_from(&t_so3_inv_quat(&quat(q)));
        b
    }

    fn mass_matrix(&self, _t: f64, _q: &DVector<f64>) -> Option<DMatrix<f64>> {
        let mut m = DMatrix::zeros(6, 6);
        m.fixed_view_mut::<3, 3>(0, 0)
            .copy_from(&(Matrix3::identity() * self.mass));
        m.fixed_view_mut::<3, 3>(3, 3).copy_from(&self.k_theta_s);
        Some(m)
    }

    fn h(&self, _t: f64, _q: &DVector<f64>, u: &DVector<f64>) -> Option<DVector<f64>> {
        let omega = tail(u);
        let gyro = -omega.cross(&(self.k_theta_s * omega));
        let mut h = DVector::zeros(6);
        h.fixed_rows_mut::<3>(3).copy_from(&gyro);
        Some(h)
    }

    fn step_callback(&self, _t: f64, q: &mut DVector<f64>, _u: &mut DVector<f64>) {
        let norm = quat(q).norm();
        if norm > 0.0 {
            q.rows_mut(3, 4).unscale_mut(norm);
        }
    }

    fn as_orientable(&self) -> Option<&dyn Orientable> {
        Some(self)
    }
}
