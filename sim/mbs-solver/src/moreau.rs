//! Moreau's midpoint time-stepping scheme.
//!
//! # Algorithm
//!
//! Given the accepted state `(t_n, q_n, u_n)`:
//!
//! 1. Explicit half step `q_{n+½} = q_n + ½ dt q̇(t_n, q_n, u_n)`.
//! 2. Evaluate `M, h, W_g, W_γ, W_c, λ_c, χ_g, χ_γ` at `(t_{n+½}, q_{n+½})`
//!    and factorize the [`SaddlePointSystem`] once.
//! 3. Solve without contact forcing to get a trial velocity.
//! 4. If no contact is closed (`g_N > 0` everywhere) accept the trial
//!    solution. Otherwise iterate the prox projection of [`ContactProblem`]
//!    and re-solve with the contact percussions added, until
//!    `max |u - u0| < atol` or the iteration budget is spent.
//! 5. Second half step `q_{n+1} = q_{n+½} + ½ dt q̇(t_{n+½}, q_{n+½}, u_{n+1})`
//!    followed by the system's step callback.
//!
//! The active set is recomputed from scratch every step. Contacts sitting
//! exactly at `g_N = 0` may enter and leave on alternate steps.
//!
//! # Example
//!
//! ```
//! use mbs_solver::{Moreau, SolverOptions};
//! use mbs_system::bodies::PointMass;
//! use mbs_system::forces::Force;
//! use mbs_system::{Attachment, System};
//! use nalgebra::Vector3;
//!
//! let mut system = System::new();
//! let ball = system.add_subsystem(PointMass::new(1.0, Vector3::new(0.0, 0.0, 1.0), Vector3::zeros()));
//! system.add_force(Force::constant(system.bodies(), ball, Attachment::origin(), Vector3::new(0.0, 0.0, -9.81))?)?;
//!
//! let mut solver = Moreau::new(&system, 0.1, 1e-3, SolverOptions::default())?;
//! let solution = solver.solve()?;
//! assert_eq!(solution.len(), 101);
//! # Ok::<(), mbs_types::MbsError>(())
//! ```

use nalgebra::DVector;
use nalgebra_sparse::CscMatrix;
use tracing::{debug, info, trace, warn};

use mbs_system::System;
use mbs_types::sparse::{spmv, spmv_t};
use mbs_types::{MbsError, Result};

use crate::linear::SaddlePointSystem;
use crate::options::SolverOptions;
use crate::prox::{ContactProblem, active_normal_set, compute_i_f, estimate_prox_parameter};
use crate::solution::{InitialSample, Solution};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Slack when deriving the step count from `(t1 - t0) / dt`.
const GRID_EPS: f64 = 1e-9;

/// Fixed-point diagnostics of one step.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct StepReport {
    /// Whether the contact iteration met its tolerance. Steps without
    /// closed contacts always converge.
    pub converged: bool,
    /// Fixed-point iterations performed.
    pub iterations: usize,
    /// Final `max |u - u0|`; infinite if no iteration ran.
    pub error: f64,
}

impl StepReport {
    fn direct() -> Self {
        Self {
            converged: true,
            iterations: 0,
            error: 0.0,
        }
    }
}

/// An accepted step.
#[derive(Debug, Clone)]
pub struct StepResult {
    /// Fixed-point diagnostics.
    pub report: StepReport,
    /// End time `t_{n+1}`.
    pub t: f64,
    /// Coordinates after the step callback.
    pub q: DVector<f64>,
    /// Velocities after the step callback.
    pub u: DVector<f64>,
    /// Bilateral constraint percussions.
    pub p_g: DVector<f64>,
    /// Velocity constraint percussions.
    pub p_gamma: DVector<f64>,
    /// Compliance forces at the half step.
    pub la_c: DVector<f64>,
    /// Normal percussions, zero outside the active set.
    pub p_n: DVector<f64>,
    /// Friction percussions, zero outside the active set.
    pub p_f: DVector<f64>,
    /// Closed contacts at the half step.
    pub active: Vec<bool>,
    /// Normal velocity measure `ξ_N` at the new velocity, if any contact
    /// was closed.
    pub xi_n: Option<DVector<f64>>,
}

/// The accepted state between steps.
#[derive(Debug, Clone)]
struct State {
    step: usize,
    t: f64,
    q: DVector<f64>,
    u: DVector<f64>,
    p_g: DVector<f64>,
    p_gamma: DVector<f64>,
    p_n: DVector<f64>,
    p_f: DVector<f64>,
}

/// Outcome of the contact iteration.
struct ContactSolve {
    x: DVector<f64>,
    p_n: DVector<f64>,
    p_f: DVector<f64>,
    report: StepReport,
    xi_n: DVector<f64>,
}

/// Moreau integrator over a fixed time grid.
#[derive(Debug)]
pub struct Moreau<'a> {
    system: &'a System,
    options: SolverOptions,
    t0: f64,
    dt: f64,
    n_steps: usize,
    state: State,
}

impl<'a> Moreau<'a> {
    /// Integrator from `system.t0()` to `t1` with step `dt`.
    ///
    /// The grid is `t_k = t0 + k dt` for `k = 0..=n` with the smallest `n`
    /// such that `t_n ≥ t1`. Initial percussions are `λ0 dt`.
    pub fn new(system: &'a System, t1: f64, dt: f64, options: SolverOptions) -> Result<Self> {
        let t0 = system.t0();
        if !t1.is_finite() || t1 <= t0 {
            return Err(MbsError::InvalidTimeSpan { t0, t1 });
        }
        if !dt.is_finite() || dt <= 0.0 {
            return Err(MbsError::InvalidTimestep(dt));
        }
        options.validate()?;

        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let n_steps = (((t1 - t0) / dt - GRID_EPS).ceil() as usize).max(1);

        let state = State {
            step: 0,
            t: t0,
            q: system.q0(),
            u: system.u0(),
            p_g: system.la_g0() * dt,
            p_gamma: system.la_gamma0() * dt,
            p_n: system.la_n0() * dt,
            p_f: system.la_f0() * dt,
        };
        Ok(Self {
            system,
            options,
            t0,
            dt,
            n_steps,
            state,
        })
    }

    /// Step size.
    #[must_use]
    pub fn dt(&self) -> f64 {
        self.dt
    }

    /// Number of steps of the grid.
    #[must_use]
    pub fn n_steps(&self) -> usize {
        self.n_steps
    }

    /// Whether the grid has been traversed.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.state.step >= self.n_steps
    }

    /// Time of the accepted state.
    #[must_use]
    pub fn t(&self) -> f64 {
        self.state.t
    }

    /// Coordinates of the accepted state.
    #[must_use]
    pub fn q(&self) -> &DVector<f64> {
        &self.state.q
    }

    /// Velocities of the accepted state.
    #[must_use]
    pub fn u(&self) -> &DVector<f64> {
        &self.state.u
    }

    /// The solver configuration.
    #[must_use]
    pub fn options(&self) -> &SolverOptions {
        &self.options
    }

    /// Seed the next contact iteration with the given percussions.
    pub fn set_warm_start(&mut self, p_n: DVector<f64>, p_f: DVector<f64>) -> Result<()> {
        let sizes = self.system.sizes();
        for (what, expected, actual) in [("P_N", sizes.nla_n, p_n.len()), ("P_F", sizes.nla_f, p_f.len())] {
            if expected != actual {
                return Err(MbsError::DimensionMismatch { what, expected, actual });
            }
        }
        self.state.p_n = p_n;
        self.state.p_f = p_f;
        Ok(())
    }

    /// Advance one step and accept it.
    ///
    /// An unconverged contact iteration is an error unless
    /// [`SolverOptions::continue_with_unconverged`] is set; in that case
    /// the last iterate is accepted and a warning is logged. The accepted
    /// state is unchanged on error. Stepping past the end of the grid is a
    /// configuration error.
    pub fn step(&mut self) -> Result<StepResult> {
        if self.is_finished() {
            return Err(MbsError::invalid_config(format!(
                "all {} steps up to t = {} are taken",
                self.n_steps, self.state.t
            )));
        }
        let sys = self.system;
        let sizes = sys.sizes();
        let nu = sizes.nu;
        let dt = self.dt;
        let tn = self.state.t;
        let qn = &self.state.q;
        let un = self.state.u.clone();

        #[allow(clippy::cast_precision_loss)]
        let t1 = self.t0 + (self.state.step + 1) as f64 * dt;
        let t12 = tn + 0.5 * dt;
        let q12 = qn + sys.q_dot(tn, qn, &un) * (0.5 * dt);

        let m = sys.m(t12, &q12);
        let h = sys.h(t12, &q12, &un)?;
        let w_g = sys.w_g(t12, &q12)?;
        let w_gamma = sys.w_gamma(t12, &q12)?;
        let w_c = sys.w_c(t12, &q12)?;
        let la_c = sys.la_c(t12, &q12, &un)?;
        let zeros = DVector::zeros(nu);
        let chi_g = sys.g_dot(t12, &q12, &zeros)?;
        let chi_gamma = sys.gamma(t12, &q12, &zeros)?;

        let a = SaddlePointSystem::new(&m, &w_g, &w_gamma)?;
        let mut b = DVector::zeros(a.dim());
        b.rows_mut(0, nu)
            .copy_from(&(spmv(&m, &un) + (h + spmv(&w_c, &la_c)) * dt));
        b.rows_mut(nu, sizes.nla_g).copy_from(&chi_g);
        b.rows_mut(nu + sizes.nla_g, sizes.nla_gamma).copy_from(&chi_gamma);
        let x0 = a.solve(&b)?;

        let active = active_normal_set(&sys.g_n(t12, &q12)?);
        let n_active = active.iter().filter(|&&a| a).count();
        trace!(t = t12, active = n_active, "active set");

        let (x, p_n, p_f, report, xi_n) = if n_active == 0 {
            let (p_n, p_f) = (DVector::zeros(sizes.nla_n), DVector::zeros(sizes.nla_f));
            (x0, p_n, p_f, StepReport::direct(), None)
        } else {
            let problem = self.contact_problem(t12, &q12, &un, &m, active.clone())?;
            let solved = self.fixed_point(&a, &b, x0, &problem)?;
            (solved.x, solved.p_n, solved.p_f, solved.report, Some(solved.xi_n))
        };

        let (mut u, p_g, p_gamma) = a.split(&x);
        let mut q = &q12 + sys.q_dot(t12, &q12, &u) * (0.5 * dt);
        sys.step_callback(t1, &mut q, &mut u);

        if !(q.iter().all(|v| v.is_finite()) && u.iter().all(|v| v.is_finite())) {
            return Err(MbsError::diverged(format!("non-finite state at t = {t1}")));
        }

        if !report.converged {
            let StepReport { iterations, error, .. } = report;
            if !self.options.continue_with_unconverged {
                return Err(MbsError::NotConverged { t: t1, iterations, error });
            }
            warn!(t = t1, iterations, error, "accepting unconverged fixed-point iteration");
        }
        debug!(t = t1, iterations = report.iterations, error = report.error, "step accepted");

        self.state = State {
            step: self.state.step + 1,
            t: t1,
            q: q.clone(),
            u: u.clone(),
            p_g: p_g.clone(),
            p_gamma: p_gamma.clone(),
            p_n: p_n.clone(),
            p_f: p_f.clone(),
        };
        Ok(StepResult {
            report,
            t: t1,
            q,
            u,
            p_g,
            p_gamma,
            la_c,
            p_n,
            p_f,
            active,
            xi_n,
        })
    }

    /// Integrate from the accepted state to the end of the grid.
    pub fn solve(&mut self) -> Result<Solution> {
        let remaining = self.n_steps.saturating_sub(self.state.step);
        info!(steps = remaining, dt = self.dt, t0 = self.state.t, "moreau: start");

        let la_c = self.system.la_c(self.state.t, &self.state.q, &self.state.u)?;
        let mut solution = Solution::start(
            InitialSample {
                t: self.state.t,
                q: self.state.q.clone(),
                u: self.state.u.clone(),
                p_g: self.state.p_g.clone(),
                p_gamma: self.state.p_gamma.clone(),
                la_c,
                p_n: self.state.p_n.clone(),
                p_f: self.state.p_f.clone(),
            },
            self.dt,
        );
        while !self.is_finished() {
            let step = match self.step() {
                Ok(step) => step,
                Err(err) => {
                    if err.is_diverged() {
                        warn!(
                            t = self.state.t,
                            samples = solution.len(),
                            "moreau: state diverged, trajectory discarded"
                        );
                    }
                    return Err(err);
                }
            };
            solution.push(step, self.dt);
        }

        info!(
            t1 = self.state.t,
            max_iterations = solution.max_iterations(),
            converged = solution.all_converged(),
            "moreau: done"
        );
        Ok(solution)
    }

    /// Contact data at the half step.
    fn contact_problem(
        &self,
        t: f64,
        q: &DVector<f64>,
        un: &DVector<f64>,
        m: &CscMatrix<f64>,
        i_n: Vec<bool>,
    ) -> Result<ContactProblem> {
        let sys = self.system;
        let zeros = DVector::zeros(sys.nu());
        let w_n = sys.w_n(t, q)?;
        let w_f = sys.w_f(t, q)?;
        let (e_n, e_f) = (sys.e_n(), sys.e_f());
        let chi_n = sys.g_n_dot(t, q, &zeros)?;
        let chi_f = sys.gamma_f(t, q, &zeros)?;
        let xi_n0 = e_n.component_mul(&spmv_t(&w_n, un)) + e_n.add_scalar(1.0).component_mul(&chi_n);
        let xi_f0 = e_f.component_mul(&spmv_t(&w_f, un)) + e_f.add_scalar(1.0).component_mul(&chi_f);

        let connectivity = sys.nf_connectivity();
        let i_f = compute_i_f(&i_n, &connectivity, sys.sizes().nla_f);
        let r_n = estimate_prox_parameter(self.options.prox_scaling, &w_n, m);
        let r_f = estimate_prox_parameter(self.options.prox_scaling, &w_f, m);

        Ok(ContactProblem {
            w_n,
            w_f,
            xi_n0,
            xi_f0,
            i_n,
            i_f,
            r_n,
            r_f,
            mu: sys.mu(),
            connectivity,
        })
    }

    /// Prox fixed-point iteration, warm-started from the accepted
    /// percussions.
    fn fixed_point(
        &self,
        a: &SaddlePointSystem,
        b: &DVector<f64>,
        x0: DVector<f64>,
        problem: &ContactProblem,
    ) -> Result<ContactSolve> {
        let nu = a.nu();
        let mut p_n = self.state.p_n.clone();
        let mut p_f = self.state.p_f.clone();
        let mut u0 = x0.rows(0, nu).into_owned();
        let mut x = x0;
        let mut report = StepReport {
            converged: false,
            iterations: 0,
            error: f64::INFINITY,
        };

        for _ in 0..self.options.fixed_point_max_iter {
            problem.project(&u0, &mut p_n, &mut p_f);

            let mut bb = b.clone();
            let mut bb_u = bb.rows_mut(0, nu);
            bb_u += problem.forcing(&p_n, &p_f);
            x = a.solve(&bb)?;
            let u = x.rows(0, nu).into_owned();

            report.iterations += 1;
            report.error = (&u - &u0).amax();
            if report.error < self.options.fixed_point_atol {
                report.converged = true;
                break;
            }
            u0 = u;
        }

        let (p_n, p_f) = if report.iterations == 0 {
            (DVector::zeros(p_n.len()), DVector::zeros(p_f.len()))
        } else {
            problem.restrict(&p_n, &p_f)
        };
        let xi_n = problem.xi_n(&x.rows(0, nu).into_owned());
        Ok(ContactSolve {
            x,
            p_n,
            p_f,
            report,
            xi_n,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use mbs_system::{Attachment, SubsystemId};
    use mbs_system::bodies::PointMass;
    use mbs_system::constraints::Rod;
    use mbs_system::forces::Force;
    use nalgebra::Vector3;

    fn falling_ball(z0: f64) -> System {
        ball_system(z0).0
    }

    fn ball_system(z0: f64) -> (System, SubsystemId) {
        let mut system = System::new();
        let ball = system.add_subsystem(PointMass::new(1.0, Vector3::new(0.0, 0.0, z0), Vector3::zeros()));
        let gravity = Force::constant(system.bodies(), ball, Attachment::origin(), Vector3::new(0.0, 0.0, -10.0)).unwrap();
        system.add_force(gravity).unwrap();
        (system, ball)
    }

    #[test]
    fn test_invalid_construction() {
        let system = falling_ball(1.0);
        let err = Moreau::new(&system, 0.0, 0.1, SolverOptions::default()).unwrap_err();
        assert_eq!(err, MbsError::InvalidTimeSpan { t0: 0.0, t1: 0.0 });
        let err = Moreau::new(&system, 1.0, -0.1, SolverOptions::default()).unwrap_err();
        assert_eq!(err, MbsError::InvalidTimestep(-0.1));
        let err = Moreau::new(&system, 1.0, 0.1, SolverOptions::default().with_atol(-1.0)).unwrap_err();
        assert!(err.is_config_error());
    }

    #[test]
    fn test_grid() {
        let system = falling_ball(1.0);
        let solver = Moreau::new(&system, 1.0, 0.1, SolverOptions::default()).unwrap();
        assert_eq!(solver.n_steps(), 10);
        let solver = Moreau::new(&system, 1.05, 0.1, SolverOptions::default()).unwrap();
        assert_eq!(solver.n_steps(), 11);
    }

    #[test]
    fn test_step_stops_at_end_of_grid() {
        let system = falling_ball(1.0);
        let mut solver = Moreau::new(&system, 0.2, 0.1, SolverOptions::default()).unwrap();
        solver.step().unwrap();
        solver.step().unwrap();
        assert!(solver.is_finished());

        let err = solver.step().unwrap_err();
        assert!(err.is_config_error());
        assert_relative_eq!(solver.t(), 0.2, epsilon = 1e-15);
        // A finished run records only its initial sample.
        assert_eq!(solver.solve().unwrap().len(), 1);
    }

    #[test]
    fn test_non_finite_state_is_rejected() {
        let mut system = System::new();
        let ball = system.add_subsystem(PointMass::new(1.0, Vector3::zeros(), Vector3::zeros()));
        let blowup = Force::new(system.bodies(), ball, Attachment::origin(), |t| {
            if t > 0.1 { Vector3::repeat(f64::NAN) } else { Vector3::new(0.0, 0.0, -10.0) }
        })
        .unwrap();
        system.add_force(blowup).unwrap();

        let mut solver = Moreau::new(&system, 1.0, 0.1, SolverOptions::default()).unwrap();
        solver.step().unwrap();
        let err = solver.step().unwrap_err();
        assert!(err.is_diverged());
        // The last finite state stays accepted.
        assert_relative_eq!(solver.t(), 0.1, epsilon = 1e-15);
        assert_relative_eq!(solver.u()[2], -1.0, epsilon = 1e-14);

        // A full run stops at the same step.
        let mut solver = Moreau::new(&system, 1.0, 0.1, SolverOptions::default()).unwrap();
        assert!(solver.solve().unwrap_err().is_diverged());
        assert_relative_eq!(solver.t(), 0.1, epsilon = 1e-15);
    }

    #[test]
    fn test_single_free_step() {
        let system = falling_ball(1.0);
        let mut solver = Moreau::new(&system, 1.0, 0.1, SolverOptions::default()).unwrap();
        let step = solver.step().unwrap();
        assert_eq!(step.report, StepReport::direct());
        assert_relative_eq!(step.t, 0.1);
        assert_relative_eq!(step.u[2], -1.0, epsilon = 1e-14);
        // Half step with u_n = 0, second half step with u_{n+1}.
        assert_relative_eq!(step.q[2], 1.0 - 0.05, epsilon = 1e-14);
        assert!(step.xi_n.is_none());
        assert_relative_eq!(solver.t(), 0.1);
        assert_eq!(solver.u(), &step.u);
    }

    #[test]
    fn test_rod_percussion_balances_gravity() {
        // Ball hanging at rest below the origin.
        let (mut system, ball) = ball_system(-1.0);
        let rod = Rod::new(
            system.bodies(),
            (system.origin(), Attachment::origin()),
            (ball, Attachment::origin()),
        )
        .unwrap();
        system.add_constraint(rod).unwrap();

        let dt = 0.01;
        let mut solver = Moreau::new(&system, 0.1, dt, SolverOptions::default()).unwrap();
        let solution = solver.solve().unwrap();
        assert_eq!(solution.len(), 11);
        let (_, q, u) = solution.last_state().unwrap();
        assert_relative_eq!(q[2], -1.0, epsilon = 1e-12);
        assert_relative_eq!(u.norm(), 0.0, epsilon = 1e-12);
        // Rod force magnitude equals the weight.
        assert_relative_eq!(solution.la_g[5][0].abs() * 2.0, 10.0, epsilon = 1e-9);
    }

    #[test]
    fn test_warm_start_dimensions_checked() {
        let system = falling_ball(1.0);
        let mut solver = Moreau::new(&system, 1.0, 0.1, SolverOptions::default()).unwrap();
        let err = solver.set_warm_start(DVector::zeros(1), DVector::zeros(0)).unwrap_err();
        assert!(matches!(err, MbsError::DimensionMismatch { what: "P_N", .. }));
    }
}
