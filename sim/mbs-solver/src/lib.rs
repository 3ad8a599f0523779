//! Nonsmooth time stepping for multibody systems.
//!
//! The [`Moreau`] integrator advances a [`mbs_system::System`] on a fixed
//! grid. Smooth forces and bilateral constraints are handled by one linear
//! saddle-point solve per step. Unilateral contacts with Coulomb friction
//! are resolved at the impulse level by a prox fixed-point iteration
//! that reuses that factorization.
//!
//! - [`options`]: [`SolverOptions`] and [`ProxScaling`]
//! - [`linear`]: the per-step [`SaddlePointSystem`]
//! - [`prox`]: active sets, prox radii and the projection sweep
//! - [`moreau`]: the integrator
//! - [`solution`]: the recorded [`Solution`]
//!
//! # Failure Policy
//!
//! Bad time spans, step sizes or options fail in [`Moreau::new`]. A singular
//! saddle-point matrix or a non-finite state aborts the step. A contact
//! iteration that exhausts its budget aborts the run with
//! [`MbsError::NotConverged`](mbs_types::MbsError::NotConverged) unless
//! [`SolverOptions::continue_with_unconverged`] is set. Either way every
//! accepted step carries a [`StepReport`].
//!
//! # Example
//!
//! A ball dropped onto the ground comes to rest without bouncing.
//!
//! ```
//! use mbs_solver::{Moreau, SolverOptions};
//! use mbs_system::bodies::{Frame, PointMass};
//! use mbs_system::contacts::SphereToPlane;
//! use mbs_system::forces::Force;
//! use mbs_system::{Attachment, System};
//! use nalgebra::Vector3;
//!
//! let mut system = System::new();
//! let ball = system.add_subsystem(PointMass::new(1.0, Vector3::new(0.0, 0.0, 0.2), Vector3::zeros()));
//! system.add_force(Force::constant(system.bodies(), ball, Attachment::origin(), Vector3::new(0.0, 0.0, -9.81))?)?;
//! system.add_contact(SphereToPlane::new(system.bodies(), Frame::origin(), (ball, Attachment::origin()), 0.1)?)?;
//!
//! let solution = Moreau::new(&system, 0.5, 1e-3, SolverOptions::default())?.solve()?;
//! let (_, q, u) = solution.last_state().expect("nonempty");
//! assert!((q[2] - 0.1).abs() < 1e-2);
//! assert!(u[2].abs() < 1e-8);
//! # Ok::<(), mbs_types::MbsError>(())
//! ```

#![doc(html_root_url = "https://docs.rs/mbs-solver/0.1.0")]
#![deny(clippy::unwrap_used, clippy::expect_used)]
#![warn(missing_docs)]
#![allow(
    clippy::missing_const_for_fn,     // Many methods can't be const due to nalgebra
    clippy::suboptimal_flops,          // mul_add style changes aren't always clearer
    clippy::missing_errors_doc,        // Every fallible method returns MbsError
)]

pub mod linear;
pub mod moreau;
pub mod options;
pub mod prox;
pub mod solution;

pub use linear::SaddlePointSystem;
pub use moreau::{Moreau, StepReport, StepResult};
pub use options::{ProxScaling, SolverOptions};
pub use solution::{FIELDS, Solution};
