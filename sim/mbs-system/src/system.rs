//! System assembly.
//!
//! [`System`] owns all subsystems and elements and evaluates the global
//! quantities consumed by time integrators. Coordinates are assigned when a
//! subsystem is added, multipliers when an element is added; both index
//! spaces only ever grow, so ranges handed out earlier stay valid.
//!
//! Global matrices are collected element by element in a [`CooBuilder`] and
//! compressed once:
//!
//! | quantity  | shape              |
//! |-----------|--------------------|
//! | `M`       | `nu × nu`          |
//! | `W_g`     | `nu × nla_g`       |
//! | `W_γ`     | `nu × nla_γ`       |
//! | `W_c`     | `nu × nla_c`       |
//! | `W_N`     | `nu × nla_N`       |
//! | `W_F`     | `nu × nla_F`       |
//! | `g_q`     | `nla_g × nq`       |
//!
//! # Example
//!
//! ```
//! use mbs_system::bodies::PointMass;
//! use mbs_system::forces::Force;
//! use mbs_system::{Attachment, System};
//! use nalgebra::{DVector, Vector3};
//!
//! let mut system = System::new();
//! let ball = system.add_subsystem(PointMass::new(2.0, Vector3::new(0.0, 0.0, 1.0), Vector3::zeros()));
//! let gravity = Force::constant(system.bodies(), ball, Attachment::origin(), Vector3::new(0.0, 0.0, -19.62))?;
//! system.add_force(gravity)?;
//!
//! let (q, u) = (system.q0(), system.u0());
//! assert_eq!(system.nu(), 3);
//! assert_eq!(system.h(0.0, &q, &u)?, DVector::from_vec(vec![0.0, 0.0, -19.62]));
//! # Ok::<(), mbs_types::MbsError>(())
//! ```

use std::sync::Arc;

use nalgebra::DVector;
use nalgebra_sparse::CscMatrix;
use tracing::debug;

use mbs_types::{CooBuilder, DofRange, MbsError, Result};

use crate::bodies::Frame;
use crate::constraints::{BilateralConstraint, RotationalTransmission, VelocityConstraint, numerical_jacobian};
use crate::contacts::Contact;
use crate::forces::{ComplianceElement, ForceElement, Motor};
use crate::subsystem::{Bodies, Subsystem, SubsystemId};

/// An element with its slice of a multiplier vector.
struct Slot<T: ?Sized> {
    element: Arc<T>,
    la: DofRange,
}

/// A contact element with its normal and friction multiplier slices.
struct ContactSlot {
    element: Arc<dyn Contact>,
    la_n: DofRange,
    la_f: DofRange,
}

/// Multiplier counts per channel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SystemSizes {
    /// Generalized coordinates.
    pub nq: usize,
    /// Generalized velocities.
    pub nu: usize,
    /// Bilateral constraint rows.
    pub nla_g: usize,
    /// Velocity constraint rows.
    pub nla_gamma: usize,
    /// Compliance force components.
    pub nla_c: usize,
    /// Normal contacts.
    pub nla_n: usize,
    /// Friction directions.
    pub nla_f: usize,
}

/// A multibody system: subsystems plus the elements acting on them.
pub struct System {
    bodies: Bodies,
    origin: SubsystemId,
    constraints: Vec<Slot<dyn BilateralConstraint>>,
    velocity_constraints: Vec<Slot<dyn VelocityConstraint>>,
    forces: Vec<Arc<dyn ForceElement>>,
    compliances: Vec<Slot<dyn ComplianceElement>>,
    contacts: Vec<ContactSlot>,
    sizes: SystemSizes,
}

impl std::fmt::Debug for System {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("System")
            .field("bodies", &self.bodies.len())
            .field("constraints", &self.constraints.len())
            .field("velocity_constraints", &self.velocity_constraints.len())
            .field("forces", &self.forces.len())
            .field("compliances", &self.compliances.len())
            .field("contacts", &self.contacts.len())
            .field("sizes", &self.sizes)
            .finish()
    }
}

impl Default for System {
    fn default() -> Self {
        Self::new()
    }
}

/// Add a local vector into a global one, checking the local length.
fn scatter_add(what: &'static str, local: &DVector<f64>, dofs: &[usize], global: &mut DVector<f64>) -> Result<()> {
    if local.len() != dofs.len() {
        return Err(MbsError::DimensionMismatch {
            what,
            expected: dofs.len(),
            actual: local.len(),
        });
    }
    for (k, &i) in dofs.iter().enumerate() {
        global[i] += local[k];
    }
    Ok(())
}

/// Copy a local vector into a multiplier slice, checking the local length.
fn write_range(what: &'static str, local: &DVector<f64>, range: DofRange, global: &mut DVector<f64>) -> Result<()> {
    if local.len() != range.len() {
        return Err(MbsError::DimensionMismatch {
            what,
            expected: range.len(),
            actual: local.len(),
        });
    }
    range.scatter(local, global);
    Ok(())
}

impl System {
    /// Empty system at `t0 = 0` containing only the inertial origin.
    #[must_use]
    pub fn new() -> Self {
        Self::with_t0(0.0)
    }

    /// Empty system whose elements capture their reference configuration
    /// at `t0`.
    #[must_use]
    pub fn with_t0(t0: f64) -> Self {
        let mut bodies = Bodies::new(t0);
        let origin = bodies.push(Box::new(Frame::origin()));
        Self {
            bodies,
            origin,
            constraints: Vec::new(),
            velocity_constraints: Vec::new(),
            forces: Vec::new(),
            compliances: Vec::new(),
            contacts: Vec::new(),
            sizes: SystemSizes::default(),
        }
    }

    /// Initial time.
    #[must_use]
    pub fn t0(&self) -> f64 {
        self.bodies.t0()
    }

    /// The inertial origin frame.
    #[must_use]
    pub fn origin(&self) -> SubsystemId {
        self.origin
    }

    /// The subsystem registry, needed to build elements.
    #[must_use]
    pub fn bodies(&self) -> &Bodies {
        &self.bodies
    }

    /// Dimensions of all index spaces.
    #[must_use]
    pub fn sizes(&self) -> SystemSizes {
        self.sizes
    }

    /// Number of generalized coordinates.
    #[must_use]
    pub fn nq(&self) -> usize {
        self.sizes.nq
    }

    /// Number of generalized velocities.
    #[must_use]
    pub fn nu(&self) -> usize {
        self.sizes.nu
    }

    // ========================================================================
    // Building
    // ========================================================================

    /// Add a subsystem and assign its coordinates.
    pub fn add_subsystem<S: Subsystem + 'static>(&mut self, subsystem: S) -> SubsystemId {
        debug!(name = subsystem.name(), nq = subsystem.nq(), nu = subsystem.nu(), "add subsystem");
        let id = self.bodies.push(Box::new(subsystem));
        self.sizes.nq = self.bodies.nq();
        self.sizes.nu = self.bodies.nu();
        id
    }

    fn check_dofs(&self, name: &str, q_dof: &[usize], u_dof: &[usize]) -> Result<()> {
        let q_ok = q_dof.iter().all(|&i| i < self.sizes.nq);
        let u_ok = u_dof.iter().all(|&i| i < self.sizes.nu);
        if q_ok && u_ok {
            Ok(())
        } else {
            Err(MbsError::invalid_config(format!(
                "element `{name}` references coordinates outside the system"
            )))
        }
    }

    fn push_constraint(&mut self, element: Arc<dyn BilateralConstraint>) -> Result<DofRange> {
        self.check_dofs(element.name(), &element.q_dof(), &element.u_dof())?;
        let la = DofRange::new(self.sizes.nla_g, element.nla_g());
        debug!(name = element.name(), rows = la.len(), "add constraint");
        self.sizes.nla_g += la.len();
        self.constraints.push(Slot { element, la });
        Ok(la)
    }

    /// Add a bilateral constraint; returns its rows in `λ_g`.
    pub fn add_constraint<C: BilateralConstraint + 'static>(&mut self, constraint: C) -> Result<DofRange> {
        self.push_constraint(Arc::new(constraint))
    }

    /// Add a velocity constraint; returns its rows in `λ_γ`.
    pub fn add_velocity_constraint<C: VelocityConstraint + 'static>(&mut self, constraint: C) -> Result<DofRange> {
        self.check_dofs(constraint.name(), &constraint.q_dof(), &constraint.u_dof())?;
        let la = DofRange::new(self.sizes.nla_gamma, constraint.nla_gamma());
        debug!(name = constraint.name(), rows = la.len(), "add velocity constraint");
        self.sizes.nla_gamma += la.len();
        self.velocity_constraints.push(Slot {
            element: Arc::new(constraint),
            la,
        });
        Ok(la)
    }

    /// Add a force element.
    pub fn add_force<F: ForceElement + 'static>(&mut self, force: F) -> Result<()> {
        self.check_dofs(force.name(), &force.q_dof(), &force.u_dof())?;
        debug!(name = force.name(), "add force");
        self.forces.push(Arc::new(force));
        Ok(())
    }

    /// Add a compliance element; returns its components in `λ_c`.
    pub fn add_compliance<C: ComplianceElement + 'static>(&mut self, element: C) -> Result<DofRange> {
        self.check_dofs(element.name(), &element.q_dof(), &element.u_dof())?;
        let la = DofRange::new(self.sizes.nla_c, element.nla_c());
        debug!(name = element.name(), components = la.len(), "add compliance");
        self.sizes.nla_c += la.len();
        self.compliances.push(Slot {
            element: Arc::new(element),
            la,
        });
        Ok(la)
    }

    /// Add a contact element; returns its slices of `λ_N` and `λ_F`.
    pub fn add_contact<C: Contact + 'static>(&mut self, contact: C) -> Result<(DofRange, DofRange)> {
        self.check_dofs(contact.name(), &contact.q_dof(), &contact.u_dof())?;
        let connectivity = contact.nf_connectivity();
        if connectivity.len() != contact.nla_n()
            || connectivity.iter().flatten().any(|&i| i >= contact.nla_f())
        {
            return Err(MbsError::invalid_config(format!(
                "contact `{}` has an inconsistent friction connectivity",
                contact.name()
            )));
        }
        let la_n = DofRange::new(self.sizes.nla_n, contact.nla_n());
        let la_f = DofRange::new(self.sizes.nla_f, contact.nla_f());
        debug!(name = contact.name(), normal = la_n.len(), friction = la_f.len(), "add contact");
        self.sizes.nla_n += la_n.len();
        self.sizes.nla_f += la_f.len();
        self.contacts.push(ContactSlot {
            element: Arc::new(contact),
            la_n,
            la_f,
        });
        Ok((la_n, la_f))
    }

    /// Add a driven joint: the joint's rows join `λ_g` and the drive torque
    /// joins `h`.
    pub fn add_motor<T: RotationalTransmission + 'static>(&mut self, motor: Motor<T>) -> Result<DofRange> {
        let motor = Arc::new(motor);
        let la = self.push_constraint(motor.clone())?;
        self.forces.push(motor);
        Ok(la)
    }

    // ========================================================================
    // Initial values
    // ========================================================================

    /// Initial coordinates.
    #[must_use]
    pub fn q0(&self) -> DVector<f64> {
        self.bodies.q0()
    }

    /// Initial velocities.
    #[must_use]
    pub fn u0(&self) -> DVector<f64> {
        self.bodies.u0()
    }

    /// Initial bilateral multipliers.
    #[must_use]
    pub fn la_g0(&self) -> DVector<f64> {
        let mut la = DVector::zeros(self.sizes.nla_g);
        for s in &self.constraints {
            s.la.scatter(&s.element.la_g0(), &mut la);
        }
        la
    }

    /// Initial velocity-constraint multipliers.
    #[must_use]
    pub fn la_gamma0(&self) -> DVector<f64> {
        let mut la = DVector::zeros(self.sizes.nla_gamma);
        for s in &self.velocity_constraints {
            s.la.scatter(&s.element.la_gamma0(), &mut la);
        }
        la
    }

    /// Initial compliance forces.
    #[must_use]
    pub fn la_c0(&self) -> DVector<f64> {
        let mut la = DVector::zeros(self.sizes.nla_c);
        for s in &self.compliances {
            s.la.scatter(&s.element.la_c0(), &mut la);
        }
        la
    }

    /// Initial normal contact forces.
    #[must_use]
    pub fn la_n0(&self) -> DVector<f64> {
        let mut la = DVector::zeros(self.sizes.nla_n);
        for s in &self.contacts {
            s.la_n.scatter(&s.element.la_n0(), &mut la);
        }
        la
    }

    /// Initial friction forces.
    #[must_use]
    pub fn la_f0(&self) -> DVector<f64> {
        let mut la = DVector::zeros(self.sizes.nla_f);
        for s in &self.contacts {
            s.la_f.scatter(&s.element.la_f0(), &mut la);
        }
        la
    }

    // ========================================================================
    // Kinematics and dynamics
    // ========================================================================

    /// Kinematic differential equation `q̇ = B(q) u`.
    #[must_use]
    pub fn q_dot(&self, t: f64, q: &DVector<f64>, u: &DVector<f64>) -> DVector<f64> {
        let mut q_dot = DVector::zeros(self.sizes.nq);
        for slot in self.bodies.iter() {
            let local = slot.subsystem.q_dot(t, &slot.local_q(q), &slot.local_u(u));
            slot.q_dof.scatter(&local, &mut q_dot);
        }
        q_dot
    }

    /// Mass matrix.
    #[must_use]
    pub fn m(&self, t: f64, q: &DVector<f64>) -> CscMatrix<f64> {
        let mut coo = CooBuilder::new(self.sizes.nu, self.sizes.nu);
        for slot in self.bodies.iter() {
            if let Some(m) = slot.subsystem.mass_matrix(t, &slot.local_q(q)) {
                coo.extend_block_at(&m, slot.u_dof.start, slot.u_dof.start);
            }
        }
        coo.into_csc()
    }

    /// Generalized forces of subsystems and force elements.
    pub fn h(&self, t: f64, q: &DVector<f64>, u: &DVector<f64>) -> Result<DVector<f64>> {
        let mut h = DVector::zeros(self.sizes.nu);
        for slot in self.bodies.iter() {
            if let Some(local) = slot.subsystem.h(t, &slot.local_q(q), &slot.local_u(u)) {
                scatter_add("subsystem h", &local, &slot.u_dof.to_vec(), &mut h)?;
            }
        }
        for f in &self.forces {
            scatter_add("force element h", &f.h(&self.bodies, t, q, u)?, &f.u_dof(), &mut h)?;
        }
        Ok(h)
    }

    /// Kinetic energy `½ uᵀ M u`.
    #[must_use]
    pub fn e_kin(&self, t: f64, q: &DVector<f64>, u: &DVector<f64>) -> f64 {
        0.5 * u.dot(&mbs_types::sparse::spmv(&self.m(t, q), u))
    }

    /// Potential energy of force and compliance elements.
    pub fn e_pot(&self, t: f64, q: &DVector<f64>) -> Result<f64> {
        let mut e = 0.0;
        for f in &self.forces {
            e += f.e_pot(&self.bodies, t, q)?;
        }
        for s in &self.compliances {
            e += s.element.e_pot(&self.bodies, t, q)?;
        }
        Ok(e)
    }

    /// Post-step projection of every subsystem.
    pub fn step_callback(&self, t: f64, q: &mut DVector<f64>, u: &mut DVector<f64>) {
        for slot in self.bodies.iter() {
            let mut q_local = slot.local_q(q);
            let mut u_local = slot.local_u(u);
            slot.subsystem.step_callback(t, &mut q_local, &mut u_local);
            slot.q_dof.scatter(&q_local, q);
            slot.u_dof.scatter(&u_local, u);
        }
    }

    // ========================================================================
    // Bilateral constraints
    // ========================================================================

    /// Constraint residual `g`.
    pub fn g(&self, t: f64, q: &DVector<f64>) -> Result<DVector<f64>> {
        let mut g = DVector::zeros(self.sizes.nla_g);
        for s in &self.constraints {
            write_range("g", &s.element.g(&self.bodies, t, q)?, s.la, &mut g)?;
        }
        Ok(g)
    }

    /// `ġ`.
    pub fn g_dot(&self, t: f64, q: &DVector<f64>, u: &DVector<f64>) -> Result<DVector<f64>> {
        let mut g_dot = DVector::zeros(self.sizes.nla_g);
        for s in &self.constraints {
            write_range("g_dot", &s.element.g_dot(&self.bodies, t, q, u)?, s.la, &mut g_dot)?;
        }
        Ok(g_dot)
    }

    /// `g̈`.
    pub fn g_ddot(&self, t: f64, q: &DVector<f64>, u: &DVector<f64>, u_dot: &DVector<f64>) -> Result<DVector<f64>> {
        let mut g_ddot = DVector::zeros(self.sizes.nla_g);
        for s in &self.constraints {
            let local = s.element.g_ddot(&self.bodies, t, q, u, u_dot)?;
            write_range("g_ddot", &local, s.la, &mut g_ddot)?;
        }
        Ok(g_ddot)
    }

    /// `W_g`.
    pub fn w_g(&self, t: f64, q: &DVector<f64>) -> Result<CscMatrix<f64>> {
        let mut coo = CooBuilder::new(self.sizes.nu, self.sizes.nla_g);
        for s in &self.constraints {
            let w = s.element.w_g(&self.bodies, t, q)?;
            coo.extend_dense(&w, &s.element.u_dof(), &s.la.to_vec());
        }
        Ok(coo.into_csc())
    }

    /// `g_q`. Constraints without analytic Jacobians are differentiated
    /// numerically.
    pub fn g_q(&self, t: f64, q: &DVector<f64>) -> Result<CscMatrix<f64>> {
        let mut coo = CooBuilder::new(self.sizes.nla_g, self.sizes.nq);
        for s in &self.constraints {
            let c = &s.element;
            let q_dof = c.q_dof();
            let g_q = if c.has_analytic_jacobian() {
                c.g_q(&self.bodies, t, q)?
            } else {
                numerical_jacobian(&q_dof, q, |x| c.g(&self.bodies, t, x))?
            };
            coo.extend_dense(&g_q, &s.la.to_vec(), &q_dof);
        }
        Ok(coo.into_csc())
    }

    // ========================================================================
    // Velocity constraints
    // ========================================================================

    /// Velocity constraint residual `γ`.
    pub fn gamma(&self, t: f64, q: &DVector<f64>, u: &DVector<f64>) -> Result<DVector<f64>> {
        let mut gamma = DVector::zeros(self.sizes.nla_gamma);
        for s in &self.velocity_constraints {
            write_range("gamma", &s.element.gamma(&self.bodies, t, q, u)?, s.la, &mut gamma)?;
        }
        Ok(gamma)
    }

    /// `W_γ`.
    pub fn w_gamma(&self, t: f64, q: &DVector<f64>) -> Result<CscMatrix<f64>> {
        let mut coo = CooBuilder::new(self.sizes.nu, self.sizes.nla_gamma);
        for s in &self.velocity_constraints {
            let w = s.element.w_gamma(&self.bodies, t, q)?;
            coo.extend_dense(&w, &s.element.u_dof(), &s.la.to_vec());
        }
        Ok(coo.into_csc())
    }

    // ========================================================================
    // Compliance
    // ========================================================================

    /// Compliance forces `λ_c`.
    pub fn la_c(&self, t: f64, q: &DVector<f64>, u: &DVector<f64>) -> Result<DVector<f64>> {
        let mut la = DVector::zeros(self.sizes.nla_c);
        for s in &self.compliances {
            write_range("la_c", &s.element.la_c(&self.bodies, t, q, u)?, s.la, &mut la)?;
        }
        Ok(la)
    }

    /// `W_c`.
    pub fn w_c(&self, t: f64, q: &DVector<f64>) -> Result<CscMatrix<f64>> {
        let mut coo = CooBuilder::new(self.sizes.nu, self.sizes.nla_c);
        for s in &self.compliances {
            let w = s.element.w_c(&self.bodies, t, q)?;
            coo.extend_dense(&w, &s.element.u_dof(), &s.la.to_vec());
        }
        Ok(coo.into_csc())
    }

    // ========================================================================
    // Contacts
    // ========================================================================

    /// Normal gaps.
    pub fn g_n(&self, t: f64, q: &DVector<f64>) -> Result<DVector<f64>> {
        let mut g_n = DVector::zeros(self.sizes.nla_n);
        for s in &self.contacts {
            write_range("g_N", &s.element.g_n(&self.bodies, t, q)?, s.la_n, &mut g_n)?;
        }
        Ok(g_n)
    }

    /// Normal relative velocities.
    pub fn g_n_dot(&self, t: f64, q: &DVector<f64>, u: &DVector<f64>) -> Result<DVector<f64>> {
        let mut g_n_dot = DVector::zeros(self.sizes.nla_n);
        for s in &self.contacts {
            write_range("g_N_dot", &s.element.g_n_dot(&self.bodies, t, q, u)?, s.la_n, &mut g_n_dot)?;
        }
        Ok(g_n_dot)
    }

    /// `W_N`.
    pub fn w_n(&self, t: f64, q: &DVector<f64>) -> Result<CscMatrix<f64>> {
        let mut coo = CooBuilder::new(self.sizes.nu, self.sizes.nla_n);
        for s in &self.contacts {
            let w = s.element.w_n(&self.bodies, t, q)?;
            coo.extend_dense(&w, &s.element.u_dof(), &s.la_n.to_vec());
        }
        Ok(coo.into_csc())
    }

    /// Tangential relative velocities.
    pub fn gamma_f(&self, t: f64, q: &DVector<f64>, u: &DVector<f64>) -> Result<DVector<f64>> {
        let mut gamma_f = DVector::zeros(self.sizes.nla_f);
        for s in &self.contacts {
            write_range("gamma_F", &s.element.gamma_f(&self.bodies, t, q, u)?, s.la_f, &mut gamma_f)?;
        }
        Ok(gamma_f)
    }

    /// `W_F`.
    pub fn w_f(&self, t: f64, q: &DVector<f64>) -> Result<CscMatrix<f64>> {
        let mut coo = CooBuilder::new(self.sizes.nu, self.sizes.nla_f);
        for s in &self.contacts {
            let w = s.element.w_f(&self.bodies, t, q)?;
            coo.extend_dense(&w, &s.element.u_dof(), &s.la_f.to_vec());
        }
        Ok(coo.into_csc())
    }

    /// Global friction indices per normal contact.
    #[must_use]
    pub fn nf_connectivity(&self) -> Vec<Vec<usize>> {
        self.contacts
            .iter()
            .flat_map(|s| {
                let offset = s.la_f.start;
                s.element
                    .nf_connectivity()
                    .into_iter()
                    .map(move |local| local.into_iter().map(|i| offset + i).collect::<Vec<_>>())
            })
            .collect()
    }

    /// Friction coefficients per normal contact.
    #[must_use]
    pub fn mu(&self) -> DVector<f64> {
        let mut mu = DVector::zeros(self.sizes.nla_n);
        for s in &self.contacts {
            s.la_n.scatter(&s.element.mu(), &mut mu);
        }
        mu
    }

    /// Normal restitution coefficients.
    #[must_use]
    pub fn e_n(&self) -> DVector<f64> {
        let mut e = DVector::zeros(self.sizes.nla_n);
        for s in &self.contacts {
            s.la_n.scatter(&s.element.e_n(), &mut e);
        }
        e
    }

    /// Tangential restitution coefficients.
    #[must_use]
    pub fn e_f(&self) -> DVector<f64> {
        let mut e = DVector::zeros(self.sizes.nla_f);
        for s in &self.contacts {
            s.la_f.scatter(&s.element.e_f(), &mut e);
        }
        e
    }
}
