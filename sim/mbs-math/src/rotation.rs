//! Rotation parametrizations.
//!
//! Axis-angle (rotation vector) exponential, elementary rotations about the
//! coordinate axes, and the smallest rotation that maps one direction onto
//! another.

use nalgebra::{Matrix3, Vector3};

use crate::algebra::ax2skew;

/// Angles below this are treated with the first-order expansion.
const SMALL_ANGLE: f64 = 1e-8;

/// Exponential map `so(3) → SO(3)` (Rodrigues' formula).
///
/// `psi` is the rotation vector: unit axis times angle.
#[must_use]
pub fn exp_so3(psi: &Vector3<f64>) -> Matrix3<f64> {
    let angle = psi.norm();
    let psi_tilde = ax2skew(psi);
    if angle > SMALL_ANGLE {
        let alpha = angle.sin() / angle;
        let beta2 = (1.0 - angle.cos()) / (angle * angle);
        Matrix3::identity() + psi_tilde * alpha + psi_tilde * psi_tilde * beta2
    } else {
        Matrix3::identity() + psi_tilde
    }
}

/// Rotation by `angle` about the inertial x-axis.
#[must_use]
pub fn basic_rotation_x(angle: f64) -> Matrix3<f64> {
    let (s, c) = angle.sin_cos();
    Matrix3::new(
        1.0, 0.0, 0.0, //
        0.0, c, -s, //
        0.0, s, c,
    )
}

/// Rotation by `angle` about the inertial y-axis.
#[must_use]
pub fn basic_rotation_y(angle: f64) -> Matrix3<f64> {
    let (s, c) = angle.sin_cos();
    Matrix3::new(
        c, 0.0, s, //
        0.0, 1.0, 0.0, //
        -s, 0.0, c,
    )
}

/// Rotation by `angle` about the inertial z-axis.
#[must_use]
pub fn basic_rotation_z(angle: f64) -> Matrix3<f64> {
    let (s, c) = angle.sin_cos();
    Matrix3::new(
        c, -s, 0.0, //
        s, c, 0.0, //
        0.0, 0.0, 1.0,
    )
}

/// Rotation of least angle mapping direction `from` onto direction `to`.
///
/// Neither argument needs to be normalized. For antiparallel directions the
/// rotation is a half turn about an axis perpendicular to `from`. Returns
/// `None` when either direction is (numerically) zero.
#[must_use]
pub fn smallest_rotation(from: &Vector3<f64>, to: &Vector3<f64>) -> Option<Matrix3<f64>> {
    let e0 = from.try_normalize(f64::EPSILON)?;
    let e1 = to.try_normalize(f64::EPSILON)?;

    let cos_angle = e0.dot(&e1);
    if cos_angle > -1.0 + 1e-10 {
        let n = e0.cross(&e1);
        Some(
            Matrix3::identity() * cos_angle
                + ax2skew(&n)
                + n * n.transpose() * (1.0 / (1.0 + cos_angle)),
        )
    } else {
        let m = orthonormal_basis(&e0).column(0).into_owned();
        Some(m * m.transpose() * 2.0 - Matrix3::identity())
    }
}

/// Complete a direction to a right-handed orthonormal basis.
///
/// The returned matrix has columns `(t1, t2, n)` with `n = normal / |normal|`.
/// The first tangent is chosen from the coordinate axis least aligned with
/// the normal, so the construction is continuous away from axis switches.
#[must_use]
pub fn orthonormal_basis(normal: &Vector3<f64>) -> Matrix3<f64> {
    let n = normal.normalize();
    let helper = if n.x.abs() <= n.y.abs() && n.x.abs() <= n.z.abs() {
        Vector3::x()
    } else if n.y.abs() <= n.z.abs() {
        Vector3::y()
    } else {
        Vector3::z()
    };
    let t1 = (helper - n * n.dot(&helper)).normalize();
    let t2 = n.cross(&t1);
    Matrix3::from_columns(&[t1, t2, n])
}
