//! Subsystems, elements and system assembly for nonsmooth multibody dynamics.
//!
//! This crate describes *what* is simulated; time integration lives in
//! `mbs-solver`. It is organized around a small set of contracts:
//!
//! - [`Subsystem`] (with the capabilities [`KinematicPoint`] and
//!   [`Orientable`]) - bodies that own generalized coordinates
//! - [`BilateralConstraint`] and [`VelocityConstraint`] - joints enforced
//!   through Lagrange multipliers
//! - [`ForceElement`] and [`ComplianceElement`] - smooth forcing
//! - [`Contact`] - unilateral contacts with Coulomb friction
//!
//! Elements never hold references into the system. Each one is built once
//! against the [`Bodies`] registry and keeps a [`binding`] value with the
//! global index ranges and the relative frame data of its initial
//! configuration; every evaluation is a pure function of `(t, q, u)`.
//!
//! # Example
//!
//! A pendulum: a point mass on a rod hinged at the origin.
//!
//! ```
//! use mbs_system::bodies::PointMass;
//! use mbs_system::constraints::Rod;
//! use mbs_system::{Attachment, System};
//! use nalgebra::Vector3;
//!
//! let mut system = System::new();
//! let bob = system.add_subsystem(PointMass::new(1.0, Vector3::new(1.0, 0.0, 0.0), Vector3::zeros()));
//! let rod = Rod::new(
//!     system.bodies(),
//!     (system.origin(), Attachment::origin()),
//!     (bob, Attachment::origin()),
//! )?;
//! system.add_constraint(rod)?;
//!
//! let q0 = system.q0();
//! assert_eq!(system.g(0.0, &q0)?.len(), 1);
//! assert!(system.g(0.0, &q0)?.norm() < 1e-14);
//! # Ok::<(), mbs_types::MbsError>(())
//! ```

#![doc(html_root_url = "https://docs.rs/mbs-system/0.1.0")]
#![deny(clippy::unwrap_used, clippy::expect_used)]
#![warn(missing_docs)]
#![allow(
    clippy::missing_const_for_fn,     // Many methods can't be const due to nalgebra
    clippy::suboptimal_flops,          // mul_add style changes aren't always clearer
    clippy::cast_precision_loss,       // usize to f64 is fine for counts
    clippy::missing_errors_doc,        // Every fallible method returns MbsError
    clippy::too_many_arguments,        // Kinematics take (t, q, u, u_dot, frame, offset)
)]

pub mod binding;
pub mod bodies;
pub mod conformance;
pub mod constraints;
pub mod contacts;
pub mod forces;
pub mod subsystem;
pub mod system;

pub use constraints::{BilateralConstraint, RotationalTransmission, VelocityConstraint};
pub use contacts::Contact;
pub use forces::{ComplianceElement, ForceElement};
pub use subsystem::{
    Attachment, Bodies, FrameId, KinematicPoint, Orientable, Subsystem, SubsystemId,
};
pub use system::{System, SystemSizes};
