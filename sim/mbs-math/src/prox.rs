//! Proximal point maps used by the contact solver.
//!
//! `prox_r0` projects onto the nonnegative reals (unilateral normal law);
//! `prox_sphere` projects onto a closed Euclidean ball (Coulomb friction
//! disk or sphere).

use nalgebra::DVector;

/// Projection onto `ℝ₀⁺`: `max(x, 0)`.
#[inline]
#[must_use]
pub fn prox_r0(x: f64) -> f64 {
    x.max(0.0)
}

/// Projection onto the closed ball of the given radius centered at the
/// origin.
///
/// Returns `x` unchanged when `|x| ≤ radius`, otherwise `radius · x / |x|`.
/// A nonpositive radius maps everything to the origin.
#[must_use]
pub fn prox_sphere(x: &DVector<f64>, radius: f64) -> DVector<f64> {
    let norm = x.norm();
    if norm <= radius {
        x.clone()
    } else if radius <= 0.0 {
        DVector::zeros(x.len())
    } else {
        x * (radius / norm)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use proptest::prelude::*;

    #[test]
    fn test_prox_r0() {
        assert_eq!(prox_r0(-2.0), 0.0);
        assert_eq!(prox_r0(0.0), 0.0);
        assert_eq!(prox_r0(3.5), 3.5);
    }

    #[test]
    fn test_prox_sphere_inside_is_identity() {
        let x = DVector::from_vec(vec![0.3, -0.4]);
        assert_eq!(prox_sphere(&x, 1.0), x);
    }

    #[test]
    fn test_prox_sphere_outside_scales_to_boundary() {
        let x = DVector::from_vec(vec![3.0, 4.0]);
        let y = prox_sphere(&x, 2.0);
        assert_relative_eq!(y.norm(), 2.0, epsilon = 1e-14);
        assert_relative_eq!(y[0] / y[1], 0.75, epsilon = 1e-14);
    }

    #[test]
    fn test_prox_sphere_zero_radius() {
        let x = DVector::from_vec(vec![1.0, -1.0, 2.0]);
        assert_eq!(prox_sphere(&x, 0.0), DVector::zeros(3));
    }

    proptest! {
        #[test]
        fn prop_prox_sphere_stays_in_ball(
            a in -10.0f64..10.0,
            b in -10.0f64..10.0,
            radius in 0.0f64..5.0,
        ) {
            let y = prox_sphere(&DVector::from_vec(vec![a, b]), radius);
            prop_assert!(y.norm() <= radius + 1e-12);
        }

        #[test]
        fn prop_prox_sphere_is_idempotent(
            a in -10.0f64..10.0,
            b in -10.0f64..10.0,
            c in -10.0f64..10.0,
            radius in 0.0f64..5.0,
        ) {
            let once = prox_sphere(&DVector::from_vec(vec![a, b, c]), radius);
            let twice = prox_sphere(&once, radius);
            prop_assert!((once - twice).norm() <= 1e-12);
        }

        #[test]
        fn prop_prox_r0_nonnegative(x in -100.0f64..100.0) {
            prop_assert!(prox_r0(x) >= 0.0);
            prop_assert!(prox_r0(x) >= x);
        }
    }
}
