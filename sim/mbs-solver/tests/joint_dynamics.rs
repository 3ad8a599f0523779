//! Joints, drives and compliant elements stepped through the integrator.
//!
//! A welded body, a point on a velocity guide, a motor-driven hinge and a
//! damped spring, each compared against its closed-form motion.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]

use approx::assert_relative_eq;
use nalgebra::{Matrix3, Vector3};

use mbs_solver::{Moreau, SolverOptions};
use mbs_system::bodies::{PointMass, RigidBodyQuaternion};
use mbs_system::constraints::{PointVelocity, Revolute, RigidConnection};
use mbs_system::forces::{Force, Motor, SpringDamper};
use mbs_system::{Attachment, FrameId, RotationalTransmission, System};

const G: f64 = 9.81;

// ============================================================================
// Rigid connection
// ============================================================================

#[test]
fn welded_body_stays_put_and_carries_its_weight() {
    let mass = 2.0;
    let mut system = System::new();
    let body = system.add_subsystem(
        RigidBodyQuaternion::new(mass, Matrix3::from_diagonal(&Vector3::new(0.1, 0.2, 0.3)))
            .with_pose(Vector3::new(1.0, 0.0, 0.0), Matrix3::identity()),
    );
    let weight = Force::constant(system.bodies(), body, Attachment::origin(), Vector3::new(0.0, 0.0, -mass * G)).unwrap();
    system.add_force(weight).unwrap();
    let weld = RigidConnection::new(system.bodies(), (system.origin(), FrameId::BODY), (body, FrameId::BODY)).unwrap();
    system.add_constraint(weld).unwrap();
    assert_eq!(system.sizes().nla_g, 6);

    let q0 = system.q0();
    let solution = Moreau::new(&system, 0.5, 1e-3, SolverOptions::default())
        .unwrap()
        .solve()
        .unwrap();
    for (q, u) in solution.q.iter().zip(&solution.u) {
        assert!(u.norm() < 1e-10, "{u:?}");
        assert!((q - &q0).norm() < 1e-10);
    }

    // Weight at the joint one unit away from the center of mass: a force
    // and a torque of magnitude m g each.
    let la_g = solution.la_g.last().unwrap();
    assert_relative_eq!(la_g.norm(), 2.0_f64.sqrt() * mass * G, epsilon = 1e-8);
}

// ============================================================================
// Velocity constraint
// ============================================================================

#[test]
fn guided_point_follows_prescribed_speed() {
    let mass = 1.5;
    let dt = 1e-3;
    let mut system = System::new();
    let point = system.add_subsystem(PointMass::new(mass, Vector3::zeros(), Vector3::new(0.5, 0.0, 0.0)));
    let weight = Force::constant(system.bodies(), point, Attachment::origin(), Vector3::new(0.0, 0.0, -mass * G)).unwrap();
    system.add_force(weight).unwrap();
    let guide = PointVelocity::new(system.bodies(), point, Attachment::origin(), Vector3::x(), |t| 0.5 + t).unwrap();
    system.add_velocity_constraint(guide).unwrap();

    let solution = Moreau::new(&system, 0.5, dt, SolverOptions::default())
        .unwrap()
        .solve()
        .unwrap();
    assert!(solution.all_converged());

    for k in 1..solution.len() {
        let (t, u) = (solution.t[k], &solution.u[k]);
        // The guide is enforced at the midpoint of each step.
        assert_relative_eq!(u[0], 0.5 + t - 0.5 * dt, epsilon = 1e-12);
        assert_relative_eq!(u[1], 0.0, epsilon = 1e-14);
        // Motion across the guide is untouched.
        assert_relative_eq!(u[2], -G * t, epsilon = 1e-10);
    }
    // Unit acceleration along the guide takes a force of m.
    for la_gamma in &solution.la_gamma[2..] {
        assert_relative_eq!(la_gamma[0], mass, epsilon = 1e-8);
    }
}

// ============================================================================
// Motor
// ============================================================================

#[test]
fn motor_spins_hinged_body_at_constant_acceleration() {
    let (tau, i_zz) = (0.6, 3.0);
    let alpha = tau / i_zz;
    let mut system = System::new();
    let body = system.add_subsystem(RigidBodyQuaternion::new(1.0, Matrix3::from_diagonal(&Vector3::new(1.0, 2.0, i_zz))));
    let hinge = Revolute::new(
        system.bodies(),
        (system.origin(), FrameId::BODY),
        (body, FrameId::BODY),
        &Vector3::zeros(),
        &Vector3::z(),
    )
    .unwrap();
    system.add_motor(Motor::constant(hinge.clone(), tau)).unwrap();
    assert_eq!(system.sizes().nla_g, 5);

    let solution = Moreau::new(&system, 1.0, 1e-3, SolverOptions::default())
        .unwrap()
        .solve()
        .unwrap();

    for (t, u) in solution.t.iter().zip(&solution.u) {
        assert_relative_eq!(u[5], alpha * t, epsilon = 1e-10);
        assert!(u.rows(0, 5).norm() < 1e-10, "{u:?}");
    }
    let (t, q, u) = solution.last_state().unwrap();
    let bodies = system.bodies();
    assert_relative_eq!(hinge.angle(bodies, t, q).unwrap(), 0.5 * alpha * t * t, epsilon = 1e-4);
    assert_relative_eq!(hinge.angle_dot(bodies, t, q, u).unwrap(), alpha * t, epsilon = 1e-10);
}

// ============================================================================
// Spring-damper
// ============================================================================

#[test]
fn damped_spring_settles_at_free_length() {
    let (stiffness, damping, l0) = (100.0, 4.0, 1.0);
    let mut system = System::new();
    let bob = system.add_subsystem(PointMass::new(1.0, Vector3::new(0.0, 0.0, -1.5), Vector3::zeros()));
    let spring = SpringDamper::new(
        system.bodies(),
        (system.origin(), Attachment::origin()),
        (bob, Attachment::origin()),
        stiffness,
        damping,
    )
    .unwrap()
    .with_free_length(l0);
    system.add_compliance(spring).unwrap();

    let solution = Moreau::new(&system, 5.0, 1e-3, SolverOptions::default())
        .unwrap()
        .solve()
        .unwrap();

    let length = |k: usize| solution.q[k].norm();
    // Released stretched, the underdamped bob overshoots the free length.
    assert!((0..solution.len()).any(|k| length(k) < l0 - 0.1));
    // Motion stays on the spring axis.
    for q in &solution.q {
        assert_relative_eq!(q[0], 0.0, epsilon = 1e-14);
        assert_relative_eq!(q[1], 0.0, epsilon = 1e-14);
    }

    // Amplitude decays like exp(-d t / 2m).
    let (_, _, u) = solution.last_state().unwrap();
    assert_relative_eq!(length(solution.len() - 1), l0, epsilon = 1e-3);
    assert!(u.norm() < 1e-2);
    assert!(solution.la_c.last().unwrap()[0].abs() < 0.1);
}
