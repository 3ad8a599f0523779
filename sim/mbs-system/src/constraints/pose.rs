//! Shared kinematics of pose constraints.
//!
//! A pose constraint keeps the attached points of both subsystems together
//! (three position rows `r_B2 - r_B1`) and locks orientation through
//! orthogonality of selected basis vectors of the attached frames: a row for
//! the axis pair `(a, b)` reads `e_a¹ · e_b² = 0`.

use nalgebra::{DMatrix, DVector, Matrix3xX, Vector3};

use mbs_math::ax2skew;
use mbs_types::Result;

use crate::binding::{PairBinding, Side};
use crate::subsystem::Bodies;

/// Position rows plus one orientation row per axis pair.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct PoseRows {
    pub binding: PairBinding,
    pub pairs: &'static [(usize, usize)],
}

/// Frame quantities shared by the orientation rows of one pair.
struct Pair {
    e_a: Vector3<f64>,
    e_b: Vector3<f64>,
    n: Vector3<f64>,
}

impl PoseRows {
    pub fn nla(&self) -> usize {
        3 + self.pairs.len()
    }

    fn dims(&self) -> (usize, usize, usize, usize) {
        let [b1, b2] = &self.binding.anchors;
        (b1.q_dof.len(), b2.q_dof.len(), b1.u_dof.len(), b2.u_dof.len())
    }

    fn pair(s1: &Side<'_>, s2: &Side<'_>, t: f64, (a, b): (usize, usize)) -> Result<Pair> {
        let e_a = s1.a_ib(t)?.column(a).into_owned();
        let e_b = s2.a_ib(t)?.column(b).into_owned();
        Ok(Pair {
            e_a,
            e_b,
            n: e_a.cross(&e_b),
        })
    }

    pub fn g(&self, bodies: &Bodies, t: f64, q: &DVector<f64>) -> Result<DVector<f64>> {
        let [s1, s2] = self.binding.sides(bodies, q, None, None)?;
        let mut g = DVector::zeros(self.nla());
        g.fixed_rows_mut::<3>(0).copy_from(&(s2.r(t) - s1.r(t)));
        for (i, &pair) in self.pairs.iter().enumerate() {
            let p = Self::pair(&s1, &s2, t, pair)?;
            g[3 + i] = p.e_a.dot(&p.e_b);
        }
        Ok(g)
    }

    pub fn g_q(&self, bodies: &Bodies, t: f64, q: &DVector<f64>) -> Result<DMatrix<f64>> {
        let (nq1, nq2, _, _) = self.dims();
        let [s1, s2] = self.binding.sides(bodies, q, None, None)?;
        let mut g_q = DMatrix::zeros(self.nla(), nq1 + nq2);
        g_q.view_mut((0, 0), (3, nq1)).copy_from(&(-s1.r_q(t)));
        g_q.view_mut((0, nq1), (3, nq2)).copy_from(&s2.r_q(t));
        for (i, &(a, b)) in self.pairs.iter().enumerate() {
            let p = Self::pair(&s1, &s2, t, (a, b))?;
            set_row(&mut g_q, 3 + i, 0, &s1.e_q(t, a)?.tr_mul(&p.e_b));
            set_row(&mut g_q, 3 + i, nq1, &s2.e_q(t, b)?.tr_mul(&p.e_a));
        }
        Ok(g_q)
    }

    pub fn g_dot(
        &self,
        bodies: &Bodies,
        t: f64,
        q: &DVector<f64>,
        u: &DVector<f64>,
    ) -> Result<DVector<f64>> {
        let [s1, s2] = self.binding.sides(bodies, q, Some(u), None)?;
        let mut g_dot = DVector::zeros(self.nla());
        g_dot.fixed_rows_mut::<3>(0).copy_from(&(s2.v(t) - s1.v(t)));
        if !self.pairs.is_empty() {
            let omega21 = s1.omega(t)? - s2.omega(t)?;
            for (i, &pair) in self.pairs.iter().enumerate() {
                let p = Self::pair(&s1, &s2, t, pair)?;
                g_dot[3 + i] = p.n.dot(&omega21);
            }
        }
        Ok(g_dot)
    }

    pub fn g_dot_q(
        &self,
        bodies: &Bodies,
        t: f64,
        q: &DVector<f64>,
        u: &DVector<f64>,
    ) -> Result<DMatrix<f64>> {
        let (nq1, nq2, _, _) = self.dims();
        let [s1, s2] = self.binding.sides(bodies, q, Some(u), None)?;
        let mut m = DMatrix::zeros(self.nla(), nq1 + nq2);
        m.view_mut((0, 0), (3, nq1)).copy_from(&(-s1.v_q(t)));
        m.view_mut((0, nq1), (3, nq2)).copy_from(&s2.v_q(t));
        if self.pairs.is_empty() {
            return Ok(m);
        }
        let omega21 = s1.omega(t)? - s2.omega(t)?;
        let (omega1_q, omega2_q) = (s1.omega_q(t)?, s2.omega_q(t)?);
        for (i, &(a, b)) in self.pairs.iter().enumerate() {
            let p = Self::pair(&s1, &s2, t, (a, b))?;
            let (s_a, s_b) = (ax2skew(&p.e_a), ax2skew(&p.e_b));
            let e_a_q = s1.e_q(t, a)?;
            let e_b_q = s2.e_q(t, b)?;
            let row1 = omega1_q.tr_mul(&p.n) - (s_b * e_a_q).tr_mul(&omega21);
            let row2 = (s_a * e_b_q).tr_mul(&omega21) - omega2_q.tr_mul(&p.n);
            set_row(&mut m, 3 + i, 0, &row1);
            set_row(&mut m, 3 + i, nq1, &row2);
        }
        Ok(m)
    }

    pub fn w_g(&self, bodies: &Bodies, t: f64, q: &DVector<f64>) -> Result<DMatrix<f64>> {
        let (_, _, nu1, nu2) = self.dims();
        let [s1, s2] = self.binding.sides(bodies, q, None, None)?;
        let mut w = DMatrix::zeros(nu1 + nu2, self.nla());
        w.view_mut((0, 0), (nu1, 3)).copy_from(&(-s1.j(t).transpose()));
        w.view_mut((nu1, 0), (nu2, 3)).copy_from(&s2.j(t).transpose());
        if self.pairs.is_empty() {
            return Ok(w);
        }
        let (j_r1, j_r2) = (s1.j_r(t)?, s2.j_r(t)?);
        for (i, &pair) in self.pairs.iter().enumerate() {
            let p = Self::pair(&s1, &s2, t, pair)?;
            w.view_mut((0, 3 + i), (nu1, 1)).copy_from(&j_r1.tr_mul(&p.n));
            w.view_mut((nu1, 3 + i), (nu2, 1)).copy_from(&(-j_r2.tr_mul(&p.n)));
        }
        Ok(w)
    }

    pub fn wla_g_q(
        &self,
        bodies: &Bodies,
        t: f64,
        q: &DVector<f64>,
        la_g: &DVector<f64>,
    ) -> Result<DMatrix<f64>> {
        let (nq1, nq2, nu1, nu2) = self.dims();
        let [s1, s2] = self.binding.sides(bodies, q, None, None)?;
        let mut m = DMatrix::zeros(nu1 + nu2, nq1 + nq2);

        let la_r = Vector3::new(la_g[0], la_g[1], la_g[2]);
        for (k, j1_qk) in s1.j_q(t).iter().enumerate() {
            m.view_mut((0, k), (nu1, 1)).copy_from(&(-j1_qk.tr_mul(&la_r)));
        }
        for (k, j2_qk) in s2.j_q(t).iter().enumerate() {
            m.view_mut((nu1, nq1 + k), (nu2, 1))
                .copy_from(&j2_qk.tr_mul(&la_r));
        }
        if self.pairs.is_empty() {
            return Ok(m);
        }

        let (j_r1, j_r2) = (s1.j_r(t)?, s2.j_r(t)?);
        let (j_r1_q, j_r2_q) = (s1.j_r_q(t)?, s2.j_r_q(t)?);
        for (i, &(a, b)) in self.pairs.iter().enumerate() {
            let la = la_g[3 + i];
            let p = Self::pair(&s1, &s2, t, (a, b))?;
            let (s_a, s_b) = (ax2skew(&p.e_a), ax2skew(&p.e_b));
            let n_a_q1 = s_b * s1.e_q(t, a)?;
            let n_b_q2 = s_a * s2.e_q(t, b)?;

            let mut b11 = -(j_r1.transpose() * &n_a_q1);
            for (k, j_qk) in j_r1_q.iter().enumerate() {
                let col = b11.column(k) + j_qk.tr_mul(&p.n);
                b11.set_column(k, &col);
            }
            let mut b22 = -(j_r2.transpose() * &n_b_q2);
            for (k, j_qk) in j_r2_q.iter().enumerate() {
                let col = b22.column(k) - j_qk.tr_mul(&p.n);
                b22.set_column(k, &col);
            }
            let b12 = j_r1.transpose() * &n_b_q2;
            let b21 = j_r2.transpose() * &n_a_q1;

            add_block(&mut m, 0, 0, &(b11 * la));
            add_block(&mut m, 0, nq1, &(b12 * la));
            add_block(&mut m, nu1, 0, &(b21 * la));
            add_block(&mut m, nu1, nq1, &(b22 * la));
        }
        Ok(m)
    }

    pub fn g_ddot(
        &self,
        bodies: &Bodies,
        t: f64,
        q: &DVector<f64>,
        u: &DVector<f64>,
        u_dot: &DVector<f64>,
    ) -> Result<DVector<f64>> {
        let [s1, s2] = self.binding.sides(bodies, q, Some(u), Some(u_dot))?;
        let mut g_ddot = DVector::zeros(self.nla());
        g_ddot.fixed_rows_mut::<3>(0).copy_from(&(s2.a(t) - s1.a(t)));
        if self.pairs.is_empty() {
            return Ok(g_ddot);
        }
        let (omega1, omega2) = (s1.omega(t)?, s2.omega(t)?);
        let omega21 = omega1 - omega2;
        let psi21 = s1.psi(t)? - s2.psi(t)?;
        for (i, &pair) in self.pairs.iter().enumerate() {
            let p = Self::pair(&s1, &s2, t, pair)?;
            let n_dot = omega1.cross(&p.e_a).cross(&p.e_b) + p.e_a.cross(&omega2.cross(&p.e_b));
            g_ddot[3 + i] = n_dot.dot(&omega21) + p.n.dot(&psi21);
        }
        Ok(g_ddot)
    }

    pub fn g_ddot_q(
        &self,
        bodies: &Bodies,
        t: f64,
        q: &DVector<f64>,
        u: &DVector<f64>,
        u_dot: &DVector<f64>,
    ) -> Result<DMatrix<f64>> {
        let (nq1, nq2, _, _) = self.dims();
        let [s1, s2] = self.binding.sides(bodies, q, Some(u), Some(u_dot))?;
        let mut m = DMatrix::zeros(self.nla(), nq1 + nq2);
        m.view_mut((0, 0), (3, nq1)).copy_from(&(-s1.a_q(t)));
        m.view_mut((0, nq1), (3, nq2)).copy_from(&s2.a_q(t));
        if self.pairs.is_empty() {
            return Ok(m);
        }

        let (omega1, omega2) = (s1.omega(t)?, s2.omega(t)?);
        let omega21 = omega1 - omega2;
        let psi21 = s1.psi(t)? - s2.psi(t)?;
        let (omega1_q, omega2_q) = (s1.omega_q(t)?, s2.omega_q(t)?);
        let (psi1_q, psi2_q) = (s1.psi_q(t)?, s2.psi_q(t)?);
        let (s_omega1, s_omega2) = (ax2skew(&omega1), ax2skew(&omega2));

        for (i, &(a, b)) in self.pairs.iter().enumerate() {
            let p = Self::pair(&s1, &s2, t, (a, b))?;
            let (s_a, s_b) = (ax2skew(&p.e_a), ax2skew(&p.e_b));
            let e_a_q = s1.e_q(t, a)?;
            let e_b_q = s2.e_q(t, b)?;
            let x = omega1.cross(&p.e_a).cross(&p.e_b);
            let y = p.e_a.cross(&omega2.cross(&p.e_b));

            // q1: e_a, Ω1 and Ψ1 depend on it.
            let dx1: Matrix3xX<f64> = s_b * s_a * &omega1_q - s_b * s_omega1 * &e_a_q;
            let dy1: Matrix3xX<f64> = -(ax2skew(&omega2.cross(&p.e_b)) * &e_a_q);
            let row1 = (dx1 + dy1).tr_mul(&omega21) + omega1_q.tr_mul(&(x + y))
                - (s_b * &e_a_q).tr_mul(&psi21)
                + psi1_q.tr_mul(&p.n);

            // q2: e_b, Ω2 and Ψ2 depend on it.
            let dx2: Matrix3xX<f64> = ax2skew(&omega1.cross(&p.e_a)) * &e_b_q;
            let dy2: Matrix3xX<f64> = s_a * s_omega2 * &e_b_q - s_a * s_b * &omega2_q;
            let row2 = (dx2 + dy2).tr_mul(&omega21) - omega2_q.tr_mul(&(x + y))
                + (s_a * &e_b_q).tr_mul(&psi21)
                - psi2_q.tr_mul(&p.n);

            set_row(&mut m, 3 + i, 0, &row1);
            set_row(&mut m, 3 + i, nq1, &row2);
        }
        Ok(m)
    }

    pub fn g_ddot_u(
        &self,
        bodies: &Bodies,
        t: f64,
        q: &DVector<f64>,
        u: &DVector<f64>,
        u_dot: &DVector<f64>,
    ) -> Result<DMatrix<f64>> {
        let (_, _, nu1, nu2) = self.dims();
        let [s1, s2] = self.binding.sides(bodies, q, Some(u), Some(u_dot))?;
        let mut m = DMatrix::zeros(self.nla(), nu1 + nu2);
        m.view_mut((0, 0), (3, nu1)).copy_from(&(-s1.a_u(t)));
        m.view_mut((0, nu1), (3, nu2)).copy_from(&s2.a_u(t));
        if self.pairs.is_empty() {
            return Ok(m);
        }

        let (omega1, omega2) = (s1.omega(t)?, s2.omega(t)?);
        let omega21 = omega1 - omega2;
        let (j_r1, j_r2) = (s1.j_r(t)?, s2.j_r(t)?);
        let (psi1_u, psi2_u) = (s1.psi_u(t)?, s2.psi_u(t)?);

        for (i, &pair) in self.pairs.iter().enumerate() {
            let p = Self::pair(&s1, &s2, t, pair)?;
            let (s_a, s_b) = (ax2skew(&p.e_a), ax2skew(&p.e_b));
            let xy = omega1.cross(&p.e_a).cross(&p.e_b) + p.e_a.cross(&omega2.cross(&p.e_b));

            let d_omega1 = xy + (s_b * s_a).tr_mul(&omega21);
            let d_omega2 = -(xy + (s_a * s_b).tr_mul(&omega21));
            let row1 = j_r1.tr_mul(&d_omega1) + psi1_u.tr_mul(&p.n);
            let row2 = j_r2.tr_mul(&d_omega2) - psi2_u.tr_mul(&p.n);

            set_row(&mut m, 3 + i, 0, &row1);
            set_row(&mut m, 3 + i, nu1, &row2);
        }
        Ok(m)
    }
}

/// Write `v` into row `row` starting at column `col0`.
pub(crate) fn set_row(m: &mut DMatrix<f64>, row: usize, col0: usize, v: &DVector<f64>) {
    m.view_mut((row, col0), (1, v.len())).tr_copy_from(v);
}

/// Add `block` with its top-left corner at `(row0, col0)`.
pub(crate) fn add_block(m: &mut DMatrix<f64>, row0: usize, col0: usize, block: &DMatrix<f64>) {
    let mut view = m.view_mut((row0, col0), block.shape());
    view += block;
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use crate::bodies::{RigidBodyQuaternion, pose_to_q};
    use crate::subsystem::FrameId;
    use approx::assert_relative_eq;
    use mbs_math::{DiffMethod, approx_fprime, basic_rotation_y, exp_so3};
    use nalgebra::Matrix3;

    const ROLL: &[(usize, usize)] = &[(0, 1), (1, 2), (2, 0)];
    const TILT: &[(usize, usize)] = &[(2, 0)];
    const POINT: &[(usize, usize)] = &[];

    /// Two bodies bound at a frame through the center of the second one.
    fn pose_rows(pairs: &'static [(usize, usize)]) -> (Bodies, PoseRows) {
        let mut bodies = Bodies::new(0.0);
        let b1 = bodies.push(Box::new(
            RigidBodyQuaternion::new(1.0, Matrix3::identity())
                .with_pose(Vector3::new(-1.0, 0.0, 0.5), exp_so3(&Vector3::new(0.3, -0.2, 0.1))),
        ));
        let b2 = bodies.push(Box::new(
            RigidBodyQuaternion::new(1.0, Matrix3::identity())
                .with_pose(Vector3::new(0.5, 0.5, 0.0), Matrix3::identity()),
        ));
        let binding = PairBinding::at_common_frame(
            &bodies,
            (b1, FrameId::BODY),
            (b2, FrameId::BODY),
            &Vector3::new(0.5, 0.5, 0.0),
            &Matrix3::identity(),
        )
        .unwrap();
        (bodies, PoseRows { binding, pairs })
    }

    fn perturbed(bodies: &Bodies) -> DVector<f64> {
        let mut q = bodies.q0();
        q[1] += 0.05;
        q[4] -= 0.1;
        q[9] += 0.2;
        q[12] -= 0.15;
        q
    }

    #[test]
    fn test_residuals_vanish_at_capture() {
        for pairs in [ROLL, TILT, POINT] {
            let (bodies, rows) = pose_rows(pairs);
            let q0 = bodies.q0();
            let g = rows.g(&bodies, 0.0, &q0).unwrap();
            assert_eq!(g.len(), rows.nla());
            assert_eq!(g.len(), 3 + pairs.len());
            assert_relative_eq!(g.norm(), 0.0, epsilon = 1e-12);
            let g_dot = rows.g_dot(&bodies, 0.0, &q0, &bodies.u0()).unwrap();
            assert_relative_eq!(g_dot.norm(), 0.0, epsilon = 1e-14);
        }
    }

    #[test]
    fn test_orientation_row_measures_tilt() {
        let (bodies, rows) = pose_rows(TILT);
        let angle: f64 = 0.3;
        let mut q = bodies.q0();
        let q2 = pose_to_q(&Vector3::new(0.5, 0.5, 0.0), &basic_rotation_y(angle));
        q.rows_mut(7, 7).copy_from(&q2);

        // Rotating about the frame origin leaves the points together and
        // tips the second x-axis towards the first z-axis.
        let g = rows.g(&bodies, 0.0, &q).unwrap();
        assert_relative_eq!(g.fixed_rows::<3>(0).norm(), 0.0, epsilon = 1e-12);
        assert_relative_eq!(g[3], -angle.sin(), epsilon = 1e-12);
    }

    #[test]
    fn test_position_jacobian_matches_finite_differences() {
        let (bodies, rows) = pose_rows(ROLL);
        let q = perturbed(&bodies);
        let g_q = rows.g_q(&bodies, 0.0, &q).unwrap();
        let fd = approx_fprime(&q, |x| rows.g(&bodies, 0.0, x).unwrap(), DiffMethod::Central);
        assert_eq!(g_q.shape(), (6, 14));
        assert_relative_eq!(g_q, fd, epsilon = 1e-6);
    }

    #[test]
    fn test_w_g_matches_velocity_form() {
        let (bodies, rows) = pose_rows(TILT);
        let q = perturbed(&bodies);
        let u = DVector::from_fn(12, |i, _| (i as f64 * 0.7).sin());
        let w_g = rows.w_g(&bodies, 0.0, &q).unwrap();
        assert_eq!(w_g.shape(), (12, 4));
        let g_dot = rows.g_dot(&bodies, 0.0, &q, &u).unwrap();
        assert_relative_eq!(w_g.tr_mul(&u), g_dot, epsilon = 1e-12);
    }
}
