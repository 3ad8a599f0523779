//! Solver configuration.

use mbs_types::{MbsError, Result};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// How the prox radius of each contact direction is chosen.
///
/// The fixed-point iteration is a contraction only when the radii are small
/// enough relative to the inverse Delassus diagonal. [`ProxScaling::Delassus`]
/// estimates them from `Wᵀ M⁻¹ W`; this is a heuristic, not a bound.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ProxScaling {
    /// The same radius for every direction.
    Constant(f64),
    /// `r_i = alpha / (Wᵀ M⁻¹ W)_ii`, or `alpha` where the diagonal vanishes.
    Delassus {
        /// Scaling factor, typically in `(0, 2)`.
        alpha: f64,
    },
}

impl Default for ProxScaling {
    fn default() -> Self {
        Self::Delassus { alpha: 1.0 }
    }
}

/// Configuration of the Moreau integrator.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SolverOptions {
    /// Absolute tolerance on `max |u - u0|` between fixed-point iterates.
    pub fixed_point_atol: f64,

    /// Maximum number of fixed-point iterations per step.
    pub fixed_point_max_iter: usize,

    /// Prox radius estimation.
    pub prox_scaling: ProxScaling,

    /// Accept steps whose fixed-point iteration did not converge.
    ///
    /// When `false` (default) such a step aborts the run with
    /// [`MbsError::NotConverged`]. When `true` the last iterate is accepted
    /// and a warning is logged; no accuracy bound holds for that step.
    pub continue_with_unconverged: bool,
}

impl Default for SolverOptions {
    fn default() -> Self {
        Self {
            fixed_point_atol: 1e-8,
            fixed_point_max_iter: 1000,
            prox_scaling: ProxScaling::default(),
            continue_with_unconverged: false,
        }
    }
}

impl SolverOptions {
    /// Tight tolerance for reference solutions.
    #[must_use]
    pub fn accurate() -> Self {
        Self {
            fixed_point_atol: 1e-12,
            fixed_point_max_iter: 10_000,
            ..Default::default()
        }
    }

    /// Loose tolerance that keeps running through hard steps.
    #[must_use]
    pub fn interactive() -> Self {
        Self {
            fixed_point_atol: 1e-6,
            fixed_point_max_iter: 100,
            continue_with_unconverged: true,
            ..Default::default()
        }
    }

    /// Set the fixed-point tolerance.
    #[must_use]
    pub const fn with_atol(mut self, atol: f64) -> Self {
        self.fixed_point_atol = atol;
        self
    }

    /// Set the fixed-point iteration budget.
    #[must_use]
    pub const fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.fixed_point_max_iter = max_iter;
        self
    }

    /// Set the prox radius estimation.
    #[must_use]
    pub const fn with_prox_scaling(mut self, scaling: ProxScaling) -> Self {
        self.prox_scaling = scaling;
        self
    }

    /// Accept or reject unconverged steps.
    #[must_use]
    pub const fn with_continue_with_unconverged(mut self, enabled: bool) -> Self {
        self.continue_with_unconverged = enabled;
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if !self.fixed_point_atol.is_finite() || self.fixed_point_atol <= 0.0 {
            return Err(MbsError::invalid_config(format!(
                "fixed-point tolerance must be positive, got {}",
                self.fixed_point_atol
            )));
        }
        match self.prox_scaling {
            ProxScaling::Constant(r) if !r.is_finite() || r <= 0.0 => Err(MbsError::invalid_config(format!(
                "constant prox radius must be positive, got {r}"
            ))),
            ProxScaling::Delassus { alpha } if !alpha.is_finite() || alpha <= 0.0 => {
                Err(MbsError::invalid_config(format!(
                    "prox scaling factor must be positive, got {alpha}"
                )))
            }
            _ => Ok(()),
        }
    }
}
