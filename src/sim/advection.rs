//! Particle advection through the combined basis field.
//!
//! Velocities are accumulated for every particle before any particle
//! moves (a basis's contribution depends on the particle's position, so
//! moving mid-gather would bias later bases), then positions integrate and
//! obstacles project. Each substep completes all four phases in order.

use glam::Vec2;

use super::Simulation;
use crate::basis::{BasisFlags, BasisFlow};

impl Simulation {
    /// Clear and repopulate the particle acceleration grid, and zero every
    /// particle's accumulated velocity for the coming advection phase.
    pub fn rebuild_particle_grid(&mut self) {
        self.accel_particles.clear();
        for (i, &p) in self.particles.positions.iter().enumerate() {
            self.accel_particles.insert(p, i as u32);
        }
        self.particles.velocities.fill(Vec2::ZERO);
    }

    /// Advect all particles by `dt` over the configured number of equal
    /// substeps. Always runs to completion for every particle and substep.
    pub fn advect_particles(&mut self, dt: f32) {
        let substeps = self.config.particle_substeps.max(1);
        let sub_dt = dt / substeps as f32;
        let active = BasisFlags::INTERIOR.union(BasisFlags::DYNAMIC_BOUNDARY_PROJECTION);

        for _ in 0..substeps {
            self.particles.velocities.fill(Vec2::ZERO);

            // accumulate from every contributing basis over the candidate
            // particles in its support's cell range
            for ib in 0..self.bases.len() {
                let b = self.bases[ib];
                if !b.flags.intersects(active) {
                    continue;
                }
                let sup = b.support();
                let (i0, j0, i1, j1) = self.accel_particles.cell_range(
                    Vec2::new(sup.left, sup.bottom),
                    Vec2::new(sup.right, sup.top),
                );
                for cj in j0..=j1 {
                    for ci in i0..=i1 {
                        for &ip in self.accel_particles.cell(ci, cj) {
                            let ip = ip as usize;
                            let p = self.particles.positions[ip];
                            let mut v = Vec2::ZERO;
                            if b.flags.contains(BasisFlags::INTERIOR) {
                                v += b.coeff * self.stretched_basis_velocity(p, &b);
                            }
                            v += b.coeff_boundary * self.templates.evaluate(p, b.freq_lvl, b.center);
                            self.particles.velocities[ip] += v;
                        }
                    }
                }
            }

            // integrate
            for (pos, vel) in self
                .particles
                .positions
                .iter_mut()
                .zip(&self.particles.velocities)
            {
                *pos += sub_dt * *vel;
            }
            for age in self.particles.ages.iter_mut() {
                *age += sub_dt;
            }

            // project out of obstacles, in fixed list order; overlapping
            // obstacles give an order-dependent but deterministic result
            for p in self.particles.positions.iter_mut() {
                for obs in &self.obstacles {
                    let d = obs.phi(*p);
                    if d < 0.0 {
                        *p -= obs.grad_phi(*p) * d;
                    }
                }
            }
        }
    }

    /// Velocity of a basis at a point, honoring obstacle stretching. For a
    /// stretched basis the point is pulled back through the deformed
    /// corner quad into the undeformed support before the template lookup;
    /// points outside the quad contribute zero.
    pub fn stretched_basis_velocity(&self, p: Vec2, b: &BasisFlow) -> Vec2 {
        if !b.stretched {
            return self.templates.evaluate(p, b.freq_lvl, b.center);
        }
        let Some((u, v)) =
            inverse_bilinear(p, b.corner_lb, b.corner_rb, b.corner_lt, b.corner_rt)
        else {
            return Vec2::ZERO;
        };
        let half = b.support_half_size();
        let q = b.center
            + Vec2::new((u - 0.5) * 2.0 * half.x, (v - 0.5) * 2.0 * half.y);
        self.templates.evaluate(q, b.freq_lvl, b.center)
    }
}

/// Invert the bilinear patch spanned by the four corners: find (u, v) in
/// [0,1]^2 with `lerp(lerp(lb, rb, u), lerp(lt, rt, u), v) == p`. Newton
/// iteration from the patch center; `None` when `p` is outside the quad or
/// the patch is degenerate there.
fn inverse_bilinear(p: Vec2, lb: Vec2, rb: Vec2, lt: Vec2, rt: Vec2) -> Option<(f32, f32)> {
    const MARGIN: f32 = 1e-4;
    let mut u = 0.5f32;
    let mut v = 0.5f32;

    for _ in 0..8 {
        let bottom = lb.lerp(rb, u);
        let top = lt.lerp(rt, u);
        let x = bottom.lerp(top, v);
        let r = x - p;
        if r.length_squared() < 1e-14 {
            break;
        }
        let du = (rb - lb).lerp(rt - lt, v);
        let dv = top - bottom;
        let det = du.x * dv.y - du.y * dv.x;
        if det.abs() < 1e-12 {
            return None;
        }
        u -= (r.x * dv.y - r.y * dv.x) / det;
        v -= (du.x * r.y - du.y * r.x) / det;
    }

    if u < -MARGIN || u > 1.0 + MARGIN || v < -MARGIN || v > 1.0 + MARGIN {
        None
    } else {
        Some((u.clamp(0.0, 1.0), v.clamp(0.0, 1.0)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inverse_bilinear_recovers_axis_aligned_coords() {
        let lb = Vec2::new(-1.0, -1.0);
        let rb = Vec2::new(1.0, -1.0);
        let lt = Vec2::new(-1.0, 1.0);
        let rt = Vec2::new(1.0, 1.0);
        let (u, v) = inverse_bilinear(Vec2::new(0.5, -0.5), lb, rb, lt, rt).unwrap();
        assert!((u - 0.75).abs() < 1e-5);
        assert!((v - 0.25).abs() < 1e-5);
    }

    #[test]
    fn inverse_bilinear_rejects_outside_points() {
        let lb = Vec2::new(0.0, 0.0);
        let rb = Vec2::new(1.0, 0.1);
        let lt = Vec2::new(0.1, 1.0);
        let rt = Vec2::new(1.1, 1.1);
        assert!(inverse_bilinear(Vec2::new(3.0, 3.0), lb, rb, lt, rt).is_none());
    }

    #[test]
    fn inverse_bilinear_roundtrip_on_sheared_quad() {
        let lb = Vec2::new(0.0, 0.0);
        let rb = Vec2::new(1.0, 0.2);
        let lt = Vec2::new(0.3, 1.0);
        let rt = Vec2::new(1.2, 1.3);
        let (u0, v0) = (0.4f32, 0.7f32);
        let p = lb.lerp(rb, u0).lerp(lt.lerp(rt, u0), v0);
        let (u, v) = inverse_bilinear(p, lb, rb, lt, rt).unwrap();
        assert!((u - u0).abs() < 1e-4 && (v - v0).abs() < 1e-4);
    }
}
