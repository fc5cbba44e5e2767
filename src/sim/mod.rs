//! Simulation context: one value owning every piece of engine state.
//!
//! Bases, caches, acceleration structures, particles, and obstacles all
//! live here and every operation takes the context by reference; there is
//! no hidden global state. Basis-derived structures (center grid,
//! intersection lists, orthogonal groups, decompressed BB rows) are
//! invalidated on any basis mutation and rebuilt on demand, always on the
//! calling thread and always before the parallel solve region runs.

mod advection;
mod seeding;

use std::path::Path;

use glam::{IVec2, Vec2};

use crate::accel::AccelGrid;
use crate::basis::{BasisFlags, BasisFlow, BasisSupport};
use crate::coeffs::{integrate_basis_basis, CoefficientCache};
use crate::config::SimulationConfig;
use crate::error::EigenfluidError;
use crate::obstacle::Obstacle;
use crate::particles::ParticleBuffer;
use crate::solver::{self, BbEntry};
use crate::template::BasisTemplates;

/// Explicit relative-frequency buckets for the transport lists:
/// componentwise |level difference| clamped to 1 per axis.
pub const NB_TRANSFER_BUCKETS: usize = 4;

#[inline]
fn transfer_bucket(d_lvl: IVec2) -> usize {
    (d_lvl.x.unsigned_abs().min(1) * 2 + d_lvl.y.unsigned_abs().min(1)) as usize
}

pub struct Simulation {
    pub config: SimulationConfig,
    pub particles: ParticleBuffer,
    pub obstacles: Vec<Box<dyn Obstacle>>,
    templates: BasisTemplates,
    bases: Vec<BasisFlow>,
    coeffs: CoefficientCache,
    accel_particles: AccelGrid,
    accel_basis_centers: AccelGrid,
    /// Per row: indices of other bases whose support bounding boxes overlap
    basis_intersections: Vec<Vec<u32>>,
    /// Per bucket, per row: overlapping bases in that relative-frequency bucket
    transport_intersections: Vec<Vec<Vec<u32>>>,
    /// Per row: decompressed BB coefficients for the solver
    bb_rows: Vec<Vec<BbEntry>>,
    groups: Vec<Vec<u32>>,
    basis_structures_dirty: bool,
    vec_x: Vec<f64>,
}

impl Simulation {
    pub fn new(config: SimulationConfig) -> Result<Self, EigenfluidError> {
        let templates = BasisTemplates::new(&config)?;
        let coeffs = CoefficientCache::new(&config);
        let accel_particles = AccelGrid::new(
            config.domain_left,
            config.domain_right,
            config.domain_bottom,
            config.domain_top,
            config.accel_particles_res,
        );
        let accel_basis_centers = AccelGrid::new(
            config.domain_left,
            config.domain_right,
            config.domain_bottom,
            config.domain_top,
            config.accel_basis_res,
        );
        let particles = ParticleBuffer::new(config.particle_capacity());
        Ok(Self {
            config,
            particles,
            obstacles: Vec::new(),
            templates,
            bases: Vec::new(),
            coeffs,
            accel_particles,
            accel_basis_centers,
            basis_intersections: Vec::new(),
            transport_intersections: vec![Vec::new(); NB_TRANSFER_BUCKETS],
            bb_rows: Vec::new(),
            groups: Vec::new(),
            basis_structures_dirty: false,
            vec_x: Vec::new(),
        })
    }

    #[inline]
    pub fn templates(&self) -> &BasisTemplates {
        &self.templates
    }

    #[inline]
    pub fn bases(&self) -> &[BasisFlow] {
        &self.bases
    }

    #[inline]
    pub fn coeff_cache(&self) -> &CoefficientCache {
        &self.coeffs
    }

    /// Mutable basis access. Conservatively invalidates the basis-derived
    /// structures, since the caller may change geometry or membership flags.
    pub fn basis_mut(&mut self, i: usize) -> &mut BasisFlow {
        self.basis_structures_dirty = true;
        &mut self.bases[i]
    }

    /// Insert a basis flow. The anisotropy ratio must have a template and
    /// the self inner product (the solver's diagonal) must come out
    /// positive; both are enforced here so the solver never has to check.
    pub fn add_basis(
        &mut self,
        freq_lvl: IVec2,
        center: Vec2,
        flags: BasisFlags,
    ) -> Result<usize, EigenfluidError> {
        assert!(
            freq_lvl.x >= 0 && freq_lvl.y >= 0,
            "frequency levels are non-negative exponents"
        );
        let mut b = BasisFlow::new(freq_lvl, center, self.config.length_lvl0);
        let ratio = b.aniso_ratio();
        let max = self.templates.max_aniso_lvl();
        if ratio > max {
            return Err(EigenfluidError::UnsupportedAnisotropy { ratio, max });
        }
        b.flags = flags;
        b.norm_squared = integrate_basis_basis(&self.templates, &b, &b, self.config.integral_res);
        assert!(
            b.norm_squared > 0.0,
            "degenerate basis: self inner product must be positive"
        );

        self.bases.push(b);
        self.basis_structures_dirty = true;
        Ok(self.bases.len() - 1)
    }

    pub fn add_obstacle(&mut self, obstacle: Box<dyn Obstacle>) {
        self.obstacles.push(obstacle);
    }

    /// BB coefficient for a basis index pair
    pub fn bb_coeff(&mut self, i: usize, j: usize) -> f32 {
        let (b1, b2) = (self.bases[i], self.bases[j]);
        self.coeffs.bb(&self.templates, &b1, &b2)
    }

    /// BB coefficient for an arbitrary basis pair
    pub fn bb_coeff_pair(&mut self, b1: &BasisFlow, b2: &BasisFlow) -> f32 {
        self.coeffs.bb(&self.templates, b1, b2)
    }

    /// T coefficient for a basis index pair (transported, transporting)
    pub fn t_coeff(&mut self, transported: usize, transporting: usize) -> Vec2 {
        let (bd, bg) = (self.bases[transported], self.bases[transporting]);
        self.coeffs.transport(&self.templates, &bd, &bg)
    }

    /// T coefficient for an arbitrary basis pair
    pub fn t_coeff_pair(&mut self, transported: &BasisFlow, transporting: &BasisFlow) -> Vec2 {
        self.coeffs.transport(&self.templates, transported, transporting)
    }

    pub fn save_coeffs_bb(&mut self, path: &Path) -> Result<(), EigenfluidError> {
        self.coeffs.save_bb(path)
    }

    pub fn save_coeffs_t(&mut self, path: &Path) -> Result<(), EigenfluidError> {
        self.coeffs.save_t(path)
    }

    pub fn load_coeffs_bb(&mut self, path: &Path) -> Result<(), EigenfluidError> {
        self.coeffs.load_bb(path)
    }

    pub fn load_coeffs_t(&mut self, path: &Path) -> Result<(), EigenfluidError> {
        self.coeffs.load_t(path)
    }

    /// Approximately invert the implicit BB matrix for the given right-hand
    /// side, restricted to bases with all bits of `mask`. Solved weights
    /// are written back into each masked basis's `coeff` and also returned.
    ///
    /// All coefficient integration happens here, before the parallel
    /// relaxation runs; the solve itself only reads precomputed rows.
    pub fn invert_bb_matrix(&mut self, rhs: &[f64], mask: BasisFlags) -> Vec<f64> {
        assert_eq!(rhs.len(), self.bases.len(), "one rhs entry per basis");
        self.ensure_basis_structures();

        self.vec_x.resize(self.bases.len(), 0.0);
        solver::solve(
            &mut self.vec_x,
            rhs,
            &self.bases,
            &self.bb_rows,
            &self.groups,
            mask,
            self.config.solver_max_iterations,
        );

        for (i, b) in self.bases.iter_mut().enumerate() {
            if b.flags.contains(mask) {
                b.coeff = self.vec_x[i] as f32;
            }
        }
        self.vec_x.clone()
    }

    /// Transport velocity of every basis: T coefficients against each
    /// overlapping basis in the transport lists, weighted by that basis's
    /// solved coefficient.
    pub fn basis_transport_velocities(&mut self) -> Vec<Vec2> {
        self.ensure_basis_structures();
        let n = self.bases.len();
        let mut out = vec![Vec2::ZERO; n];
        for bucket in 0..NB_TRANSFER_BUCKETS {
            for i in 0..n {
                for idx in 0..self.transport_intersections[bucket][i].len() {
                    let j = self.transport_intersections[bucket][i][idx] as usize;
                    let (bi, bj) = (self.bases[i], self.bases[j]);
                    out[i] += self.coeffs.transport(&self.templates, &bi, &bj) * bj.coeff;
                }
            }
        }
        out
    }

    /// Advance one outer simulation step: rebuild the particle grid, then
    /// advect. Each phase runs to completion before the next starts.
    pub fn step(&mut self, dt: f32) {
        self.rebuild_particle_grid();
        self.advect_particles(dt);
    }

    /// Orthogonal group partition (rebuilt if stale), mainly for inspection
    pub fn orthogonal_groups(&mut self) -> &[Vec<u32>] {
        self.ensure_basis_structures();
        &self.groups
    }

    /// Rebuild every basis-derived structure if any basis changed since the
    /// last rebuild. Single-threaded; the only caller of coefficient
    /// integration besides the public coefficient accessors.
    fn ensure_basis_structures(&mut self) {
        if !self.basis_structures_dirty && self.basis_intersections.len() == self.bases.len() {
            return;
        }
        let n = self.bases.len();

        // bases into the center grid
        self.accel_basis_centers.clear();
        for (i, b) in self.bases.iter().enumerate() {
            self.accel_basis_centers.insert(b.center, i as u32);
        }

        // widest support half extent bounds the candidate search radius
        let mut max_half = Vec2::ZERO;
        for b in &self.bases {
            let sup = b.support();
            max_half.x = max_half.x.max(0.5 * (sup.right - sup.left));
            max_half.y = max_half.y.max(0.5 * (sup.top - sup.bottom));
        }

        self.basis_intersections.resize_with(n, Vec::new);
        for row in &mut self.basis_intersections {
            row.clear();
        }
        for bucket in &mut self.transport_intersections {
            bucket.resize_with(n, Vec::new);
            for row in bucket.iter_mut() {
                row.clear();
            }
        }

        for i in 0..n {
            let sup = self.bases[i].support();
            // a basis whose center lies farther than its own half extent
            // from this bbox cannot overlap it
            let (i0, j0, i1, j1) = self.accel_basis_centers.cell_range(
                Vec2::new(sup.left - max_half.x, sup.bottom - max_half.y),
                Vec2::new(sup.right + max_half.x, sup.top + max_half.y),
            );
            for cj in j0..=j1 {
                for ci in i0..=i1 {
                    for &j in self.accel_basis_centers.cell(ci, cj) {
                        let j = j as usize;
                        if j == i {
                            continue;
                        }
                        let sup_j = self.bases[j].support();
                        if !BasisSupport::intersection_interior_empty(&sup, &sup_j) {
                            self.basis_intersections[i].push(j as u32);
                            let d_lvl = self.bases[j].freq_lvl - self.bases[i].freq_lvl;
                            self.transport_intersections[transfer_bucket(d_lvl)][i]
                                .push(j as u32);
                        }
                    }
                }
            }
        }

        self.groups = solver::orthogonal_groups(&self.bases);

        // decompress BB rows for the solver; may trigger integration, so
        // this stays on the calling thread
        self.bb_rows.resize_with(n, Vec::new);
        for i in 0..n {
            self.bb_rows[i].clear();
            for idx in 0..self.basis_intersections[i].len() {
                let j = self.basis_intersections[i][idx];
                let (bi, bj) = (self.bases[i], self.bases[j as usize]);
                let coeff = self.coeffs.bb(&self.templates, &bi, &bj);
                self.bb_rows[i].push(BbEntry { j, coeff });
            }
        }

        self.basis_structures_dirty = false;
    }
}
