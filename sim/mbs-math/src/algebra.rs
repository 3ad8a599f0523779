//! Skew-symmetric matrices.
//!
//! The skew map `a ↦ ã` satisfies `ã · b = a × b` for all `b`.

use nalgebra::{Matrix3, Vector3};

/// Skew-symmetric matrix `ã` of a vector, so that `ã · b = a × b`.
#[must_use]
pub fn ax2skew(a: &Vector3<f64>) -> Matrix3<f64> {
    Matrix3::new(
        0.0, -a.z, a.y, //
        a.z, 0.0, -a.x, //
        -a.y, a.x, 0.0,
    )
}

/// Derivative of [`ax2skew`] with respect to each component of its argument.
///
/// Entry `k` is `∂ã/∂a_k`, i.e. the skew matrix of the `k`-th unit vector.
#[must_use]
pub fn ax2skew_a() -> [Matrix3<f64>; 3] {
    [
        ax2skew(&Vector3::x()),
        ax2skew(&Vector3::y()),
        ax2skew(&Vector3::z()),
    ]
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_skew_matches_cross_product() {
        let a = Vector3::new(0.3, -1.2, 2.5);
        let b = Vector3::new(-0.7, 0.4, 1.1);

        assert_relative_eq!(ax2skew(&a) * b, a.cross(&b), epsilon = 1e-14);
    }

    #[test]
    fn test_skew_is_antisymmetric() {
        let s = ax2skew(&Vector3::new(4.0, -5.0, 6.0));
        assert_relative_eq!(s + s.transpose(), Matrix3::zeros(), epsilon = 1e-14);
    }

    #[test]
    fn test_skew_derivative_is_linear_part() {
        let a = Vector3::new(0.5, -0.25, 2.0);
        let d = ax2skew_a();
        let rebuilt = d[0] * a.x + d[1] * a.y + d[2] * a.z;
        assert_relative_eq!(rebuilt, ax2skew(&a), epsilon = 1e-14);
    }
}
