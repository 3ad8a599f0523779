//! Error types for assembly and time integration.

use thiserror::Error;

/// Result alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, MbsError>;

/// Errors that can occur while building or integrating a multibody system.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum MbsError {
    /// Final time does not lie after the initial time.
    #[error("invalid time span: t1 = {t1} must be greater than t0 = {t0}")]
    InvalidTimeSpan {
        /// Initial time.
        t0: f64,
        /// Requested final time.
        t1: f64,
    },

    /// Invalid timestep.
    #[error("invalid timestep: {0} (must be positive and finite)")]
    InvalidTimestep(f64),

    /// Invalid configuration.
    #[error("invalid configuration: {reason}")]
    InvalidConfig {
        /// Description of the configuration error.
        reason: String,
    },

    /// A constraint or force element cannot be built in the given
    /// configuration.
    #[error("degenerate constraint: {reason}")]
    DegenerateConstraint {
        /// Description of the degeneracy.
        reason: String,
    },

    /// Subsystem index not registered with the system.
    #[error("unknown subsystem: {0}")]
    UnknownSubsystem(usize),

    /// A subsystem lacks a capability an element requires.
    #[error("subsystem '{subsystem}' does not provide {capability}")]
    MissingCapability {
        /// Name of the subsystem.
        subsystem: String,
        /// The capability that was requested.
        capability: &'static str,
    },

    /// A constraint was asked for an analytic second-order Jacobian it does
    /// not implement.
    #[error("constraint '{constraint}' has no analytic {jacobian}")]
    MissingAnalyticJacobian {
        /// Name of the constraint.
        constraint: String,
        /// The Jacobian that was requested.
        jacobian: &'static str,
    },

    /// Vector or matrix dimension mismatch.
    #[error("dimension mismatch for {what}: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// What was being checked.
        what: &'static str,
        /// Expected dimension.
        expected: usize,
        /// Actual dimension.
        actual: usize,
    },

    /// Linear system could not be factorized.
    #[error("singular {dim}x{dim} linear system")]
    SingularMatrix {
        /// Dimension of the square system.
        dim: usize,
    },

    /// Fixed-point iteration exhausted its budget.
    #[error("fixed-point iteration not converged at t = {t} after {iterations} iterations (error = {error:e})")]
    NotConverged {
        /// Time of the failed step.
        t: f64,
        /// Iterations performed.
        iterations: usize,
        /// Final residual `max |u - u0|`.
        error: f64,
    },

    /// Integration diverged (`NaN` or `Inf` detected).
    #[error("integration diverged: {reason}")]
    Diverged {
        /// Description of what went wrong.
        reason: String,
    },
}

impl MbsError {
    /// Create an invalid configuration error.
    #[must_use]
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }

    /// Create a degenerate constraint error.
    #[must_use]
    pub fn degenerate(reason: impl Into<String>) -> Self {
        Self::DegenerateConstraint {
            reason: reason.into(),
        }
    }

    /// Create a diverged error.
    #[must_use]
    pub fn diverged(reason: impl Into<String>) -> Self {
        Self::Diverged {
            reason: reason.into(),
        }
    }

    /// Check if this is a fixed-point non-convergence error.
    #[must_use]
    pub fn is_not_converged(&self) -> bool {
        matches!(self, Self::NotConverged { .. })
    }

    /// Check if this is a divergence error.
    #[must_use]
    pub fn is_diverged(&self) -> bool {
        matches!(self, Self::Diverged { .. })
    }

    /// Check if this error is raised at construction time, before stepping.
    #[must_use]
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidTimeSpan { .. }
                | Self::InvalidTimestep(_)
                | Self::InvalidConfig { .. }
                | Self::DegenerateConstraint { .. }
                | Self::UnknownSubsystem(_)
                | Self::MissingCapability { .. }
        )
    }
}
