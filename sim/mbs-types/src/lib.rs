//! Shared types for multibody assembly and time stepping.
//!
//! This crate holds the pieces every other `mbs-*` crate agrees on:
//!
//! - [`MbsError`] - the workspace-wide error type
//! - [`DofRange`] - a contiguous block of global coordinates owned by one
//!   subsystem or one constraint
//! - [`CooBuilder`] - an append-only triplet collector that is converted once
//!   into a compressed sparse matrix
//!
//! # Example
//!
//! ```
//! use mbs_types::{CooBuilder, DofRange};
//! use nalgebra::DMatrix;
//!
//! let body = DofRange::new(3, 2);
//! let mut coo = CooBuilder::new(5, 5);
//! coo.extend_dense(&DMatrix::identity(2, 2), &body.to_vec(), &body.to_vec());
//!
//! let m = coo.to_dense();
//! assert_eq!(m[(3, 3)], 1.0);
//! assert_eq!(m[(4, 4)], 1.0);
//! assert_eq!(m[(0, 0)], 0.0);
//! ```

#![doc(html_root_url = "https://docs.rs/mbs-types/0.1.0")]
#![deny(clippy::unwrap_used, clippy::expect_used)]
#![warn(missing_docs)]
#![allow(
    clippy::missing_const_for_fn,     // Many methods can't be const due to nalgebra
    clippy::suboptimal_flops,          // mul_add style changes aren't always clearer
    clippy::missing_errors_doc,        // Error docs added where non-obvious
)]

mod dof;
mod error;
pub mod sparse;

pub use dof::DofRange;
pub use error::{MbsError, Result};
pub use sparse::CooBuilder;
