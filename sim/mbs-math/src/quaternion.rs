//! Non-unit quaternion rotation parametrization.
//!
//! A quaternion is stored as `P = [p0, p1, p2, p3]` with scalar part first.
//! The rotation matrix is evaluated without normalizing `P`, so that the map
//! is defined (and smooth) for every nonzero quaternion:
//!
//! ```text
//! A(P) = I + 2/(P·P) (p0 p̃ + p̃ p̃)
//! ```

use nalgebra::{Matrix3, Matrix4x3, Rotation3, UnitQuaternion, Vector3, Vector4};

use crate::algebra::{ax2skew, ax2skew_a};

/// Rotation matrix of a (not necessarily unit) quaternion.
#[must_use]
pub fn exp_so3_quat(p: &Vector4<f64>) -> Matrix3<f64> {
    let p0 = p[0];
    let p_tilde = ax2skew(&Vector3::new(p[1], p[2], p[3]));
    let s = p.norm_squared();
    Matrix3::identity() + (p_tilde * p0 + p_tilde * p_tilde) * (2.0 / s)
}

/// Derivative of [`exp_so3_quat`] with respect to each quaternion component.
///
/// Entry `k` is `∂A/∂P_k`.
#[must_use]
pub fn exp_so3_quat_p(p: &Vector4<f64>) -> [Matrix3<f64>; 4] {
    let p0 = p[0];
    let p_tilde = ax2skew(&Vector3::new(p[1], p[2], p[3]));
    let s = p.norm_squared();
    let b = p_tilde * p0 + p_tilde * p_tilde;
    let e = ax2skew_a();

    let db = [
        p_tilde,
        e[0] * p0 + e[0] * p_tilde + p_tilde * e[0],
        e[1] * p0 + e[1] * p_tilde + p_tilde * e[1],
        e[2] * p0 + e[2] * p_tilde + p_tilde * e[2],
    ];

    let mut out = [Matrix3::zeros(); 4];
    for (k, out_k) in out.iter_mut().enumerate() {
        *out_k = db[k] * (2.0 / s) - b * (4.0 * p[k] / (s * s));
    }
    out
}

/// Kinematic map from body-fixed angular velocity to quaternion rate.
///
/// `Ṗ = T(P) K_ω` with `T(P) = ½ [-pᵀ; p0 I + p̃]`. This map preserves
/// `P·P` exactly in continuous time.
#[must_use]
pub fn t_so3_inv_quat(p: &Vector4<f64>) -> Matrix4x3<f64> {
    let p0 = p[0];
    let v = Vector3::new(p[1], p[2], p[3]);
    let lower = Matrix3::identity() * p0 + ax2skew(&v);
    let mut t = Matrix4x3::zeros();
    t.fixed_view_mut::<1, 3>(0, 0).copy_from(&(-v.transpose()));
    t.fixed_view_mut::<3, 3>(1, 0).copy_from(&lower);
    t * 0.5
}

/// Unit quaternion `[p0, p1, p2, p3]` of a rotation matrix.
///
/// The input is assumed orthonormal. The sign is chosen with `p0 ≥ 0`.
#[must_use]
pub fn quat_from_matrix(a: &Matrix3<f64>) -> Vector4<f64> {
    let q = UnitQuaternion::from_rotation_matrix(&Rotation3::from_matrix_unchecked(*a));
    let w = q.scalar();
    let v = q.imag();
    let out = Vector4::new(w, v.x, v.y, v.z);
    if w < 0.0 { -out } else { out }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use crate::rotation::{basic_rotation_z, exp_so3};
    use approx::assert_relative_eq;

    #[test]
    fn test_quat_matches_axis_angle() {
        let axis = Vector3::new(1.0, -2.0, 0.5).normalize();
        let angle: f64 = 1.1;
        let (s, c) = (0.5 * angle).sin_cos();
        let p = Vector4::new(c, s * axis.x, s * axis.y, s * axis.z);

        assert_relative_eq!(exp_so3_quat(&p), exp_so3(&(axis * angle)), epsilon = 1e-12);
    }

    #[test]
    fn test_quat_is_scale_invariant() {
        let p = Vector4::new(0.9, 0.1, -0.3, 0.2);
        assert_relative_eq!(exp_so3_quat(&p), exp_so3_quat(&(p * 3.5)), epsilon = 1e-12);
    }

    #[test]
    fn test_quat_derivative_matches_finite_differences() {
        let p = Vector4::new(0.8, 0.3, -0.4, 0.6);
        let analytic = exp_so3_quat_p(&p);
        let eps = 1e-6;
        for k in 0..4 {
            let mut pp = p;
            let mut pm = p;
            pp[k] += eps;
            pm[k] -= eps;
            let fd = (exp_so3_quat(&pp) - exp_so3_quat(&pm)) / (2.0 * eps);
            assert_relative_eq!(analytic[k], fd, epsilon = 1e-8);
        }
    }

    #[test]
    fn test_rate_preserves_norm() {
        let p = Vector4::new(0.5, 0.5, -0.5, 0.5);
        let omega = Vector3::new(0.3, -1.0, 2.0);
        let p_dot = t_so3_inv_quat(&p) * omega;
        assert_relative_eq!(p.dot(&p_dot), 0.0, epsilon = 1e-14);
    }

    #[test]
    fn test_rate_matches_rotation_derivative() {
        // Ȧ = A K_ω̃ for the body-fixed angular velocity.
        let p = Vector4::new(0.7, 0.1, 0.5, -0.2).normalize();
        let omega = Vector3::new(0.4, -0.6, 1.3);
        let p_dot = t_so3_inv_quat(&p) * omega;
        let a_p = exp_so3_quat_p(&p);
        let a_dot = a_p[0] * p_dot[0] + a_p[1] * p_dot[1] + a_p[2] * p_dot[2] + a_p[3] * p_dot[3];
        assert_relative_eq!(a_dot, exp_so3_quat(&p) * ax2skew(&omega), epsilon = 1e-12);
    }

    #[test]
    fn test_quat_from_matrix_roundtrip() {
        let a = basic_rotation_z(0.8) * exp_so3(&Vector3::new(0.2, 0.3, -0.1));
        let p = quat_from_matrix(&a);
        assert_relative_eq!(p.norm(), 1.0, epsilon = 1e-12);
        assert!(p[0] >= 0.0);
        assert_relative_eq!(exp_so3_quat(&p), a, epsilon = 1e-12);
    }
}
