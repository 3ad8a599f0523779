//! Discrete bodies implementing the subsystem contract.
//!
//! - [`Frame`] - zero-DOF fixed or translating reference frame
//! - [`PointMass`] - three translational DOF
//! - [`RigidBodyQuaternion`] - rigid body with quaternion orientation

mod frame;
mod point_mass;
mod rigid_body;

pub use frame::{Frame, TimeScalar, TimeVector};
pub use point_mass::PointMass;
pub use rigid_body::{RigidBodyQuaternion, pose_to_q};
