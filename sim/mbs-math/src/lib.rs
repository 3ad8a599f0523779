//! Algebra and kinematics kernels for multibody dynamics.
//!
//! Pure functions, no state. Everything here is consumed by the subsystem,
//! constraint and solver crates:
//!
//! - [`algebra`]: skew-symmetric matrices and their derivative
//! - [`rotation`]: axis-angle exponential, basic rotations, smallest
//!   rotation between two directions, frames completing a normal
//! - [`quaternion`]: rotation matrices from (possibly non-unit) quaternions
//!   and the quaternion kinematic differential equation
//! - [`prox`]: projections onto the non-negative reals and onto balls, used by
//!   the contact fixed-point iteration
//! - [`numerical`]: finite-difference Jacobians for conformance checks and for
//!   constraints without analytic second-order derivatives
//!
//! # Conventions
//!
//! Rotation matrices map body-fixed components to inertial components and
//! are named `A_IK` in the math (`a_ik` in code). Quaternions are stored
//! scalar first, `p = (p0, p1, p2, p3)`.
//!
//! # Example
//!
//! ```
//! use mbs_math::{algebra::ax2skew, rotation::exp_so3};
//! use nalgebra::Vector3;
//!
//! let psi = Vector3::new(0.0, 0.0, std::f64::consts::FRAC_PI_2);
//! let a_ik = exp_so3(&psi);
//! let ex = a_ik * Vector3::x();
//! assert!((ex - Vector3::y()).norm() < 1e-12);
//!
//! let a = Vector3::new(1.0, 2.0, 3.0);
//! assert!((ax2skew(&a) * a).norm() < 1e-12);
//! ```

#![doc(html_root_url = "https://docs.rs/mbs-math/0.1.0")]
#![deny(clippy::unwrap_used, clippy::expect_used)]
#![warn(missing_docs)]
#![allow(
    clippy::missing_const_for_fn,     // Many functions can't be const due to nalgebra
    clippy::suboptimal_flops,          // mul_add style changes aren't always clearer
    clippy::cast_precision_loss,       // usize to f64 is fine for counts
)]

pub mod algebra;
pub mod numerical;
pub mod prox;
pub mod quaternion;
pub mod rotation;

pub use algebra::{ax2skew, ax2skew_a};
pub use numerical::{DiffMethod, approx_fprime, approx_fprime_matrix, try_approx_fprime};
pub use prox::{prox_r0, prox_sphere};
pub use quaternion::{exp_so3_quat, exp_so3_quat_p, quat_from_matrix, t_so3_inv_quat};
pub use rotation::{
    basic_rotation_x, basic_rotation_y, basic_rotation_z, exp_so3, orthonormal_basis,
    smallest_rotation,
};

// Re-export math types for convenience
pub use nalgebra::{DMatrix, DVector, Matrix3, Matrix3xX, Vector3, Vector4};
