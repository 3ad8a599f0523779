//! Point mass with three translational degrees of freedom.

use nalgebra::{DMatrix, DVector, Matrix3, Matrix3xX, Vector3};

use crate::subsystem::{FrameId, KinematicPoint, Subsystem};

/// A point mass, `q = r_OP`, `u = v_P`.
///
/// Offsets `K_r_SP` are applied as inertial translations since the point has
/// no orientation.
#[derive(Debug, Clone)]
pub struct PointMass {
    name: String,
    mass: f64,
    q0: Vector3<f64>,
    u0: Vector3<f64>,
}

impl PointMass {
    /// Point mass at `r0` moving with `v0`.
    #[must_use]
    pub fn new(mass: f64, r0: Vector3<f64>, v0: Vector3<f64>) -> Self {
        Self {
            name: "point_mass".to_owned(),
            mass,
            q0: r0,
            u0: v0,
        }
    }

    /// Set the diagnostic name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Mass.
    #[must_use]
    pub fn mass(&self) -> f64 {
        self.mass
    }
}

fn position(q: &DVector<f64>) -> Vector3<f64> {
    Vector3::new(q[0], q[1], q[2])
}

fn identity_3x3() -> Matrix3xX<f64> {
    let mut j = Matrix3xX::zeros(3);
    j.fixed_view_mut::<3, 3>(0, 0).copy_from(&Matrix3::identity());
    j
}

impl KinematicPoint for PointMass {
    fn r_op(&self, _t: f64, q: &DVector<f64>, _frame: FrameId, k_r_sp: &Vector3<f64>) -> Vector3<f64> {
        position(q) + k_r_sp
    }

    fn r_op_q(&self, _t: f64, _q: &DVector<f64>, _frame: FrameId, _k_r_sp: &Vector3<f64>) -> Matrix3xX<f64> {
        identity_3x3()
    }

    fn v_p(
        &self,
        _t: f64,
        _q: &DVector<f64>,
        u: &DVector<f64>,
        _frame: FrameId,
        _k_r_sp: &Vector3<f64>,
    ) -> Vector3<f64> {
        position(u)
    }

    fn v_p_q(
        &self,
        _t: f64,
        _q: &DVector<f64>,
        _u: &DVector<f64>,
        _frame: FrameId,
        _k_r_sp: &Vector3<f64>,
    ) -> Matrix3xX<f64> {
        Matrix3xX::zeros(3)
    }

    fn a_p(
        &self,
        _t: f64,
        _q: &DVector<f64>,
        _u: &DVector<f64>,
        u_dot: &DVector<f64>,
        _frame: FrameId,
        _k_r_sp: &Vector3<f64>,
    ) -> Vector3<f64> {
        position(u_dot)
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
        Matrix3xX::zeros(3)
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
        Matrix3xX::zeros(3)
    }

    fn j_p(&self, _t: f64, _q: &DVector<f64>, _frame: FrameId, _k_r_sp: &Vector3<f64>) -> Matrix3xX<f64> {
        identity_3x3()
    }

    fn j_p_q(
        &self,
        _t: f64,
        _q: &DVector<f64>,
        _frame: FrameId,
        _k_r_sp: &Vector3<f64>,
    ) -> Vec<Matrix3xX<f64>> {
        vec![Matrix3xX::zeros(3); 3]
    }
}

impl Subsystem for PointMass {
    fn name(&self) -> &str {
        &self.name
    }

    fn nq(&self) -> usize {
        3
    }

    fn nu(&self) -> usize {
        3
    }

    fn q0(&self) -> DVector<f64> {
        DVector::from_column_slice(self.q0.as_slice())
    }

    fn u0(&self) -> DVector<f64> {
        DVector::from_column_slice(self.u0.as_slice())
    }

    fn q_dot(&self, _t: f64, _q: &DVector<f64>, u: &DVector<f64>) -> DVector<f64> {
        u.clone()
    }

    fn q_dot_u(&self, _t: f64, _q: &DVector<f64>) -> DMatrix<f64> {
        DMatrix::identity(3, 3)
    }

    fn mass_matrix(&self, _t: f64, _q: &DVector<f64>) -> Option<DMatrix<f64>> {
        Some(DMatrix::identity(3, 3) * self.mass)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use crate::conformance::check_point_jacobians;

    #[test]
    fn test_point_mass_kinematics() {
        let pm = PointMass::new(2.0, Vector3::new(1.0, 2.0, 3.0), Vector3::new(0.0, 0.0, -1.0));
        let q = pm.q0();
        let u = pm.u0();
        assert_eq!(pm.r_op(0.0, &q, FrameId::BODY, &Vector3::zeros()), Vector3::new(1.0, 2.0, 3.0));
        assert_eq!(pm.v_p(0.0, &q, &u, FrameId::BODY, &Vector3::zeros()).z, -1.0);
        assert_eq!(pm.mass_matrix(0.0, &q).unwrap()[(1, 1)], 2.0);
        assert_eq!(pm.q_dot(0.0, &q, &u), u);
    }

    #[test]
    fn test_point_mass_conformance() {
        let pm = PointMass::new(1.0, Vector3::new(0.3, -0.2, 0.1), Vector3::zeros());
        let q = DVector::from_vec(vec![0.3, -0.2, 0.1]);
        let u = DVector::from_vec(vec![1.0, 2.0, -0.5]);
        let u_dot = DVector::from_vec(vec![0.1, 0.0, -9.81]);
        let report = check_point_jacobians(&pm, 0.0, &q, &u, &u_dot, FrameId::BODY, &Vector3::x(), 1e-6);
        assert!(report.is_empty(), "{report:?}");
    }
}
