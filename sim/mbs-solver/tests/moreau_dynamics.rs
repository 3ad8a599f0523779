//! End-to-end trajectories with closed-form references.
//!
//! Free fall, bouncing with full and zero restitution, sticking and sliding
//! on a slope, and a sliding sphere that starts to roll.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]

use approx::assert_relative_eq;
use nalgebra::{Matrix3, Vector3};

use mbs_math::basic_rotation_y;
use mbs_solver::{Moreau, SolverOptions};
use mbs_system::bodies::{Frame, PointMass, RigidBodyQuaternion};
use mbs_system::contacts::{Friction, SphereToPlane};
use mbs_system::forces::Force;
use mbs_system::{Attachment, SubsystemId, System};

const G: f64 = 9.81;
const RADIUS: f64 = 0.1;

fn add_gravity(system: &mut System, id: SubsystemId, mass: f64) {
    let weight = Force::constant(system.bodies(), id, Attachment::origin(), Vector3::new(0.0, 0.0, -mass * G)).unwrap();
    system.add_force(weight).unwrap();
}

/// Point mass above the ground plane `z = 0`.
fn ball_over_ground(z0: f64, v0: Vector3<f64>, e_n: f64, friction: Friction, mu: f64) -> System {
    let mut system = System::new();
    let ball = system.add_subsystem(PointMass::new(1.0, Vector3::new(0.0, 0.0, z0), v0));
    add_gravity(&mut system, ball, 1.0);
    let contact = SphereToPlane::new(system.bodies(), Frame::origin(), (ball, Attachment::origin()), RADIUS)
        .unwrap()
        .with_friction(friction, mu)
        .unwrap()
        .with_restitution(e_n, 0.0)
        .unwrap();
    system.add_contact(contact).unwrap();
    system
}

// ============================================================================
// Free fall
// ============================================================================

#[test]
fn free_fall_matches_ballistic_trajectory() {
    let mass = 2.0;
    let r0 = Vector3::new(0.0, 0.0, 10.0);
    let v0 = Vector3::new(1.0, -0.5, 2.0);
    let mut system = System::new();
    let ball = system.add_subsystem(PointMass::new(mass, r0, v0));
    add_gravity(&mut system, ball, mass);

    let dt = 1e-2;
    let solution = Moreau::new(&system, 1.0, dt, SolverOptions::default())
        .unwrap()
        .solve()
        .unwrap();
    assert_eq!(solution.len(), 101);

    let g = Vector3::new(0.0, 0.0, -G);
    for (t, q) in solution.t.iter().zip(&solution.q) {
        let exact = r0 + v0 * *t + g * (0.5 * t * t);
        let r = Vector3::new(q[0], q[1], q[2]);
        assert!((r - exact).norm() <= dt * dt, "t = {t}: {r:?} vs {exact:?}");
    }
    assert!(solution.all_converged());
    assert_eq!(solution.max_iterations(), 0);
}

#[test]
fn free_fall_conserves_energy() {
    let mut system = System::new();
    let ball = system.add_subsystem(PointMass::new(1.5, Vector3::new(0.0, 0.0, 3.0), Vector3::new(0.3, 0.0, 1.0)));
    add_gravity(&mut system, ball, 1.5);

    let solution = Moreau::new(&system, 0.5, 1e-3, SolverOptions::default())
        .unwrap()
        .solve()
        .unwrap();
    let energy = |k: usize| {
        let (t, q, u) = (solution.t[k], &solution.q[k], &solution.u[k]);
        system.e_kin(t, q, u) + system.e_pot(t, q).unwrap()
    };
    let e0 = energy(0);
    for k in 1..solution.len() {
        assert_relative_eq!(energy(k), e0, epsilon = 1e-9);
    }
}

#[test]
fn spinning_rigid_body_keeps_unit_quaternion() {
    let mut system = System::new();
    let body = system.add_subsystem(
        RigidBodyQuaternion::new(1.0, Matrix3::from_diagonal(&Vector3::new(1.0, 2.0, 3.0)))
            .with_velocity(Vector3::zeros(), Vector3::new(0.3, 4.0, 0.2)),
    );
    add_gravity(&mut system, body, 1.0);

    let solution = Moreau::new(&system, 0.5, 1e-3, SolverOptions::default())
        .unwrap()
        .solve()
        .unwrap();
    for q in &solution.q {
        assert_relative_eq!(q.rows(3, 4).norm(), 1.0, epsilon = 1e-12);
    }
    let (t, q, _) = solution.last_state().unwrap();
    assert_relative_eq!(q[2], -0.5 * G * t * t, epsilon = 1e-9);
}

// ============================================================================
// Bouncing
// ============================================================================

#[test]
fn elastic_bounce_returns_to_initial_height() {
    let z0 = 1.0 + RADIUS;
    let system = ball_over_ground(z0, Vector3::zeros(), 1.0, Friction::None, 0.0);
    let solution = Moreau::new(&system, 1.0, 1e-3, SolverOptions::default())
        .unwrap()
        .solve()
        .unwrap();
    assert!(solution.all_converged());

    // Impact around t = 0.45, apex again around t = 0.90.
    let impact = solution.p_n.iter().position(|p| p[0] > 0.0).unwrap();
    assert!((400..500).contains(&impact), "impact at sample {impact}");
    let apex = solution.q[impact..].iter().map(|q| q[2]).fold(f64::NEG_INFINITY, f64::max);
    assert_relative_eq!(apex, z0, epsilon = 2e-2);

    let lowest = solution.q.iter().map(|q| q[2]).fold(f64::INFINITY, f64::min);
    assert!(lowest > RADIUS - 1e-2);
}

#[test]
fn plastic_impact_comes_to_rest() {
    let system = ball_over_ground(0.5 + RADIUS, Vector3::zeros(), 0.0, Friction::None, 0.0);
    let dt = 1e-3;
    let solution = Moreau::new(&system, 1.0, dt, SolverOptions::default())
        .unwrap()
        .solve()
        .unwrap();
    assert!(solution.all_converged());

    let (_, q, u) = solution.last_state().unwrap();
    assert_relative_eq!(q[2], RADIUS, epsilon = 5e-3);
    assert!(u[2].abs() < 1e-8);
    // Resting contact carries the weight.
    assert_relative_eq!(solution.la_n.last().unwrap()[0], G, epsilon = 1e-6);

    let impact = solution.p_n.iter().position(|p| p[0] > 0.0).unwrap();
    for u in &solution.u[impact..] {
        assert!(u[2].abs() < 1e-8);
    }
}

// ============================================================================
// Friction on a slope
// ============================================================================

const SLOPE: f64 = 0.3;

/// Point mass resting on a plane tilted by `SLOPE` about the y-axis.
fn ball_on_slope(mu: f64) -> System {
    let mut system = System::new();
    let a_ik = basic_rotation_y(SLOPE);
    let normal = a_ik.column(2).into_owned();
    let ball = system.add_subsystem(PointMass::new(1.0, normal * (RADIUS - 1e-6), Vector3::zeros()));
    add_gravity(&mut system, ball, 1.0);
    let contact = SphereToPlane::new(
        system.bodies(),
        Frame::fixed(Vector3::zeros(), a_ik),
        (ball, Attachment::origin()),
        RADIUS,
    )
    .unwrap()
    .with_friction(Friction::Spatial, mu)
    .unwrap();
    system.add_contact(contact).unwrap();
    system
}

#[test]
fn sticks_when_friction_exceeds_slope() {
    assert!(0.5 > SLOPE.tan());
    let system = ball_on_slope(0.5);
    let q0 = system.q0();
    let solution = Moreau::new(&system, 0.5, 1e-3, SolverOptions::default())
        .unwrap()
        .solve()
        .unwrap();
    assert!(solution.all_converged());
    for (u, q) in solution.u.iter().zip(&solution.q) {
        assert!(u.norm() < 1e-8, "{u:?}");
        assert!((q - &q0).norm() < 1e-8);
    }
    // Friction holds the tangential weight component.
    let la_f = solution.la_f.last().unwrap();
    assert_relative_eq!(la_f.norm(), G * SLOPE.sin(), epsilon = 1e-6);
}

#[test]
fn slides_when_friction_is_too_small() {
    let mu = 0.1;
    assert!(mu < SLOPE.tan());
    let system = ball_on_slope(mu);
    let t1 = 0.5;
    let solution = Moreau::new(&system, t1, 1e-3, SolverOptions::default())
        .unwrap()
        .solve()
        .unwrap();
    assert!(solution.all_converged());

    let a_ik = basic_rotation_y(SLOPE);
    let downhill = a_ik.column(0).into_owned();
    let normal = a_ik.column(2).into_owned();
    let acceleration = G * (SLOPE.sin() - mu * SLOPE.cos());

    let (t, _, u) = solution.last_state().unwrap();
    let v = Vector3::new(u[0], u[1], u[2]);
    assert_relative_eq!(v.dot(&downhill), acceleration * t, epsilon = 1e-6);
    assert!(v.dot(&normal).abs() < 1e-8);
    // Sliding friction sits on the cone boundary.
    let (p_n, p_f) = (solution.p_n.last().unwrap(), solution.p_f.last().unwrap());
    assert_relative_eq!(p_f.norm(), mu * p_n[0], epsilon = 1e-9);
}

// ============================================================================
// Rolling
// ============================================================================

#[test]
fn sliding_sphere_starts_rolling() {
    let (mass, v0, mu) = (1.0, 1.0, 0.2);
    let inertia = 0.4 * mass * RADIUS * RADIUS;
    let mut system = System::new();
    let sphere = system.add_subsystem(
        RigidBodyQuaternion::new(mass, Matrix3::identity() * inertia)
            .with_pose(Vector3::new(0.0, 0.0, RADIUS - 1e-6), Matrix3::identity())
            .with_velocity(Vector3::new(v0, 0.0, 0.0), Vector3::zeros()),
    );
    add_gravity(&mut system, sphere, mass);
    let contact = SphereToPlane::new(system.bodies(), Frame::origin(), (sphere, Attachment::origin()), RADIUS)
        .unwrap()
        .with_friction(Friction::Spatial, mu)
        .unwrap();
    system.add_contact(contact).unwrap();

    let solution = Moreau::new(&system, 0.5, 1e-3, SolverOptions::default())
        .unwrap()
        .solve()
        .unwrap();
    assert!(solution.all_converged());

    // Angular momentum about the contact point is conserved.
    let (_, _, u) = solution.last_state().unwrap();
    assert_relative_eq!(u[0], 5.0 / 7.0 * v0, epsilon = 1e-6);
    // Rolling without slipping: v_x = ω_y r.
    assert_relative_eq!(u[0], u[4] * RADIUS, epsilon = 1e-6);
}
