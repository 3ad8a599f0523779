//! Zero-DOF reference frames.

use std::sync::Arc;

use nalgebra::{DMatrix, DVector, Matrix3, Matrix3xX, Vector3};

use mbs_math::orthonormal_basis;
use mbs_types::{MbsError, Result};

use crate::subsystem::{FrameId, KinematicPoint, Orientable, Subsystem};

/// Time-dependent vector, e.g. a prescribed position.
pub type TimeVector = Arc<dyn Fn(f64) -> Vector3<f64> + Send + Sync>;

/// Time-dependent scalar, e.g. a prescribed speed or torque.
pub type TimeScalar = Arc<dyn Fn(f64) -> f64 + Send + Sync>;

/// A frame without degrees of freedom.
///
/// Either fixed in space or translating along a prescribed trajectory
/// (position, velocity and acceleration supplied as functions of time). The
/// orientation is constant. The system origin is a fixed frame at the
/// inertial origin.
#[derive(Clone)]
pub struct Frame {
    name: String,
    r_op: TimeVector,
    v_p: TimeVector,
    a_p: TimeVector,
    a_ik: Matrix3<f64>,
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame")
            .field("name", &self.name)
            .field("r_op(0)", &(self.r_op)(0.0))
            .field("a_ik", &self.a_ik)
            .finish_non_exhaustive()
    }
}

impl Frame {
    /// Inertial origin with identity orientation.
    #[must_use]
    pub fn origin() -> Self {
        Self::fixed(Vector3::zeros(), Matrix3::identity()).with_name("origin")
    }

    /// Frame fixed at `r_op` with orientation `a_ik`.
    #[must_use]
    pub fn fixed(r_op: Vector3<f64>, a_ik: Matrix3<f64>) -> Self {
        Self {
            name: "frame".to_owned(),
            r_op: Arc::new(move |_| r_op),
            v_p: Arc::new(|_| Vector3::zeros()),
            a_p: Arc::new(|_| Vector3::zeros()),
            a_ik,
        }
    }

    /// Fixed plane frame through `point` whose third axis is `normal`.
    ///
    /// The tangent axes are completed by [`orthonormal_basis`]. Fails for a
    /// zero or non-finite normal.
    pub fn plane(point: Vector3<f64>, normal: &Vector3<f64>) -> Result<Self> {
        let norm = normal.norm();
        if !(norm.is_finite() && norm > f64::EPSILON) {
            return Err(MbsError::degenerate(format!("plane normal {normal:?} has no direction")));
        }
        Ok(Self::fixed(point, orthonormal_basis(normal)).with_name("plane"))
    }

    /// Frame translating along a prescribed trajectory.
    ///
    /// `v_p` and `a_p` must be the first and second time derivatives of
    /// `r_op`.
    #[must_use]
    pub fn translating<R, V, A>(r_op: R, v_p: V, a_p: A, a_ik: Matrix3<f64>) -> Self
    where
        R: Fn(f64) -> Vector3<f64> + Send + Sync + 'static,
        V: Fn(f64) -> Vector3<f64> + Send + Sync + 'static,
        A: Fn(f64) -> Vector3<f64> + Send + Sync + 'static,
    {
        Self {
            name: "frame".to_owned(),
            r_op: Arc::new(r_op),
            v_p: Arc::new(v_p),
            a_p: Arc::new(a_p),
            a_ik,
        }
    }

    /// Set the diagnostic name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Constant orientation.
    #[must_use]
    pub fn orientation(&self) -> Matrix3<f64> {
        self.a_ik
    }

    /// Position of the frame origin at time `t`.
    #[must_use]
    pub fn position(&self, t: f64) -> Vector3<f64> {
        (self.r_op)(t)
    }

    /// Velocity of the frame at time `t`.
    #[must_use]
    pub fn velocity(&self, t: f64) -> Vector3<f64> {
        (self.v_p)(t)
    }

    /// Acceleration of the frame at time `t`.
    #[must_use]
    pub fn acceleration(&self, t: f64) -> Vector3<f64> {
        (self.a_p)(t)
    }
}

impl KinematicPoint for Frame {
    fn r_op(&self, t: f64, _q: &DVector<f64>, _frame: FrameId, k_r_sp: &Vector3<f64>) -> Vector3<f64> {
        (self.r_op)(t) + self.a_ik * k_r_sp
    }

    fn r_op_q(&self, _t: f64, _q: &DVector<f64>, _frame: FrameId, _k_r_sp: &Vector3<f64>) -> Matrix3xX<f64> {
        Matrix3xX::zeros(0)
    }

    fn v_p(
        &self,
        t: f64,
        _q: &DVector<f64>,
        _u: &DVector<f64>,
        _frame: FrameId,
        _k_r_sp: &Vector3<f64>,
    ) -> Vector3<f64> {
        (self.v_p)(t)
    }

    fn v_p_q(
        &self,
        _t: f64,
        _q: &DVector<f64>,
        _u: &DVector<f64>,
        _frame: FrameId,
        _k_r_sp: &Vector3<f64>,
    ) -> Matrix3xX<f64> {
        Matrix3xX::zeros(0)
    }

    fn a_p(
        &self,
        t: f64,
        _q: &DVector<f64>,
        _u: &DVector<f64>,
        _u_dot: &DVector<f64>,
        _frame: FrameId,
        _k_r_sp: &Vector3<f64>,
    ) -> Vector3<f64> {
        (self.a_p)(t)
    }

    fn a_p_q(
        &self,
        _t: f64,
        _q: &DVector<f64>,
        _u: &DVector<f64>,
        _u_dot: &DVector<f64>,
        _frame: FrameId,
        _k_r_sp: &Vector3<f64>,
    ) -> Matrix3xX<f64> {
        Matrix3xX::zeros(0)
    }

    fn a_p_u(
        &self,
        _t: f64,
        _q: &DVector<f64>,
        _u: &DVector<f64>,
        _u_dot: &DVector<f64>,
        _frame: FrameId,
        _k_r_sp: &Vector3<f64>,
    ) -> Matrix3xX<f64> {
        Matrix3xX::zeros(0)
    }

    fn j_p(&self, _t: f64, _q: &DVector<f64>, _frame: FrameId, _k_r_sp: &Vector3<f64>) -> Matrix3xX<f64> {
        Matrix3xX::zeros(0)
    }

    fn j_p_q(
        &self,
        _t: f64,
        _q: &DVector<f64>,
        _frame: FrameId,
        _k_r_sp: &Vector3<f64>,
    ) -> Vec<Matrix3xX<f64>> {
        Vec::new()
    }
}

impl Orientable for Frame {
    fn a_ik(&self, _t: f64, _q: &DVector<f64>, _frame: FrameId) -> Matrix3<f64> {
        self.a_ik
    }

    fn a_ik_q(&self, _t: f64, _q: &DVector<f64>, _frame: FrameId) -> Vec<Matrix3<f64>> {
        Vec::new()
    }

    fn k_omega(&self, _t: f64, _q: &DVector<f64>, _u: &DVector<f64>, _frame: FrameId) -> Vector3<f64> {
        Vector3::zeros()
    }

    fn k_omega_q(&self, _t: f64, _q: &DVector<f64>, _u: &DVector<f64>, _frame: FrameId) -> Matrix3xX<f64> {
        Matrix3xX::zeros(0)
    }

    fn k_psi(
        &self,
        _t: f64,
        _q: &DVector<f64>,
        _u: &DVector<f64>,
        _u_dot: &DVector<f64>,
        _frame: FrameId,
    ) -> Vector3<f64> {
        Vector3::zeros()
    }

    fn k_psi_q(
        &self,
        _t: f64,
        _q: &DVector<f64>,
        _u: &DVector<f64>,
        _u_dot: &DVector<f64>,
        _frame: FrameId,
    ) -> Matrix3xX<f64> {
        Matrix3xX::zeros(0)
    }

    fn k_psi_u(
        &self,
        _t: f64,
        _q: &DVector<f64>,
        _u: &DVector<f64>,
        _u_dot: &DVector<f64>,
        _frame: FrameId,
    ) -> Matrix3xX<f64> {
        Matrix3xX::zeros(0)
    }

    fn k_j_r(&self, _t: f64, _q: &DVector<f64>, _frame: FrameId) -> Matrix3xX<f64> {
        Matrix3xX::zeros(0)
    }

    fn k_j_r_q(&self, _t: f64, _q: &DVector<f64>, _frame: FrameId) -> Vec<Matrix3xX<f64>> {
        Vec::new()
    }
}

impl Subsystem for Frame {
    fn name(&self) -> &str {
        &self.name
    }

    fn nq(&self) -> usize {
        0
    }

    fn nu(&self) -> usize {
        0
    }

    fn q0(&self) -> DVector<f64> {
        DVector::zeros(0)
    }

    fn u0(&self) -> DVector<f64> {
        DVector::zeros(0)
    }

    fn q_dot_u(&self, _t: f64, _q: &DVector<f64>) -> DMatrix<f64> {
        DMatrix::zeros(0, 0)
    }

    fn as_orientable(&self) -> Option<&dyn Orientable> {
        Some(self)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use mbs_math::basic_rotation_z;

    #[test]
    fn test_fixed_frame_point() {
        let frame = Frame::fixed(Vector3::new(1.0, 0.0, 0.0), basic_rotation_z(std::f64::consts::FRAC_PI_2));
        let q = DVector::zeros(0);
        let r = frame.r_op(3.0, &q, FrameId::BODY, &Vector3::x());
        assert_relative_eq!(r, Vector3::new(1.0, 1.0, 0.0), epsilon = 1e-14);
        assert_eq!(frame.nq(), 0);
        assert_eq!(frame.j_p(0.0, &q, FrameId::BODY, &Vector3::x()).ncols(), 0);
    }

    #[test]
    fn test_plane_frame() {
        let normal = Vector3::new(0.0, -1.0, 1.0);
        let plane = Frame::plane(Vector3::new(0.0, 0.0, 2.0), &normal).unwrap();
        let a = plane.orientation();
        assert_relative_eq!(a.column(2).into_owned(), normal.normalize(), epsilon = 1e-14);
        assert_relative_eq!(a.transpose() * a, Matrix3::identity(), epsilon = 1e-14);
        assert_relative_eq!(a.determinant(), 1.0, epsilon = 1e-14);
        assert_eq!(plane.position(5.0), Vector3::new(0.0, 0.0, 2.0));

        assert!(Frame::plane(Vector3::zeros(), &Vector3::zeros()).is_err());
        assert!(Frame::plane(Vector3::zeros(), &Vector3::new(f64::NAN, 0.0, 1.0)).is_err());
    }

    #[test]
    fn test_translating_frame() {
        let frame = Frame::translating(
            |t| Vector3::new(t * t, 0.0, 0.0),
            |t| Vector3::new(2.0 * t, 0.0, 0.0),
            |_| Vector3::new(2.0, 0.0, 0.0),
            Matrix3::identity(),
        );
        let q = DVector::zeros(0);
        assert_eq!(frame.position(2.0).x, 4.0);
        assert_eq!(frame.v_p(2.0, &q, &q, FrameId::BODY, &Vector3::zeros()).x, 4.0);
        assert_eq!(frame.a_p(2.0, &q, &q, &q, FrameId::BODY, &Vector3::zeros()).x, 2.0);
    }
}
