//! Trajectories produced by the integrator.

use nalgebra::DVector;

use crate::moreau::{StepReport, StepResult};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Names accepted by [`Solution::field`].
pub const FIELDS: [&str; 11] = [
    "q", "u", "la_g", "la_gamma", "la_c", "la_N", "la_F", "P_g", "P_gamma", "P_N", "P_F",
];

/// A time-stepped trajectory.
///
/// Sample `k` holds the state at `t[k]`. Percussions `P_*` are the impulses
/// of the step ending at `t[k]`; the matching forces are `la_* = P_* / dt`.
/// `la_c` is stored as evaluated, since compliance forces are not
/// impulsive. `reports[k]` describes the step from `t[k]` to `t[k + 1]`.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Solution {
    /// Sample times.
    pub t: Vec<f64>,
    /// Generalized coordinates.
    pub q: Vec<DVector<f64>>,
    /// Generalized velocities.
    pub u: Vec<DVector<f64>>,
    /// Bilateral constraint forces.
    pub la_g: Vec<DVector<f64>>,
    /// Velocity constraint forces.
    pub la_gamma: Vec<DVector<f64>>,
    /// Compliance forces.
    pub la_c: Vec<DVector<f64>>,
    /// Normal contact forces.
    pub la_n: Vec<DVector<f64>>,
    /// Friction forces.
    pub la_f: Vec<DVector<f64>>,
    /// Bilateral constraint percussions.
    pub p_g: Vec<DVector<f64>>,
    /// Velocity constraint percussions.
    pub p_gamma: Vec<DVector<f64>>,
    /// Normal contact percussions.
    pub p_n: Vec<DVector<f64>>,
    /// Friction percussions.
    pub p_f: Vec<DVector<f64>>,
    /// Fixed-point diagnostics per step.
    pub reports: Vec<StepReport>,
}

/// Initial sample of a trajectory.
#[derive(Debug, Clone)]
pub(crate) struct InitialSample {
    pub t: f64,
    pub q: DVector<f64>,
    pub u: DVector<f64>,
    pub p_g: DVector<f64>,
    pub p_gamma: DVector<f64>,
    pub la_c: DVector<f64>,
    pub p_n: DVector<f64>,
    pub p_f: DVector<f64>,
}

impl Solution {
    /// Trajectory holding only the initial sample.
    pub(crate) fn start(initial: InitialSample, dt: f64) -> Self {
        let mut solution = Self::default();
        solution.record(
            initial.t,
            initial.q,
            initial.u,
            initial.p_g,
            initial.p_gamma,
            initial.la_c,
            initial.p_n,
            initial.p_f,
            dt,
        );
        solution
    }

    /// Append an accepted step.
    pub(crate) fn push(&mut self, step: StepResult, dt: f64) {
        self.reports.push(step.report);
        self.record(
            step.t,
            step.q,
            step.u,
            step.p_g,
            step.p_gamma,
            step.la_c,
            step.p_n,
            step.p_f,
            dt,
        );
    }

    #[allow(clippy::too_many_arguments)]
    fn record(
        &mut self,
        t: f64,
        q: DVector<f64>,
        u: DVector<f64>,
        p_g: DVector<f64>,
        p_gamma: DVector<f64>,
        la_c: DVector<f64>,
        p_n: DVector<f64>,
        p_f: DVector<f64>,
        dt: f64,
    ) {
        self.t.push(t);
        self.q.push(q);
        self.u.push(u);
        self.la_g.push(&p_g / dt);
        self.la_gamma.push(&p_gamma / dt);
        self.la_c.push(la_c);
        self.la_n.push(&p_n / dt);
        self.la_f.push(&p_f / dt);
        self.p_g.push(p_g);
        self.p_gamma.push(p_gamma);
        self.p_n.push(p_n);
        self.p_f.push(p_f);
    }

    /// Number of samples.
    #[must_use]
    pub fn len(&self) -> usize {
        self.t.len()
    }

    /// Whether the trajectory has no samples.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.t.is_empty()
    }

    /// Samples of a named field, see [`FIELDS`].
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&[DVector<f64>]> {
        let series = match name {
            "q" => &self.q,
            "u" => &self.u,
            "la_g" => &self.la_g,
            "la_gamma" => &self.la_gamma,
            "la_c" => &self.la_c,
            "la_N" => &self.la_n,
            "la_F" => &self.la_f,
            "P_g" => &self.p_g,
            "P_gamma" => &self.p_gamma,
            "P_N" => &self.p_n,
            "P_F" => &self.p_f,
            _ => return None,
        };
        Some(series.as_slice())
    }

    /// Final `(t, q, u)`.
    #[must_use]
    pub fn last_state(&self) -> Option<(f64, &DVector<f64>, &DVector<f64>)> {
        Some((*self.t.last()?, self.q.last()?, self.u.last()?))
    }

    /// Whether every step converged.
    #[must_use]
    pub fn all_converged(&self) -> bool {
        self.reports.iter().all(|r| r.converged)
    }

    /// Largest fixed-point iteration count over all steps.
    #[must_use]
    pub fn max_iterations(&self) -> usize {
        self.reports.iter().map(|r| r.iterations).max().unwrap_or(0)
    }
}
