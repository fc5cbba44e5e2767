//! Simulation configuration.
//!
//! All tunables live here so a whole run can be described by one
//! serializable value. Defaults reproduce the reference setup: domain
//! [-1,1]^2 with level-0 supports spanning one world unit.

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Domain bounds
    pub domain_left: f32,
    pub domain_right: f32,
    pub domain_bottom: f32,
    pub domain_top: f32,

    /// World-space extent of a level-0 basis support
    pub length_lvl0: f32,

    /// Highest supported anisotropy ratio (log2 of frequency ratio).
    /// The analytic eigen-expansion tables cover 0..=2.
    pub max_aniso_lvl: u32,

    /// Samples per axis in each dense basis template field
    pub template_res: usize,

    /// Quadrature samples per axis for coefficient integration
    pub integral_res: u32,

    /// Snap step for relative-offset cache keys. Offsets within half a
    /// step of each other collapse to the same cache entry.
    pub coeff_snap_size: f32,

    /// Particle acceleration grid resolution (cells per axis)
    pub accel_particles_res: usize,
    /// Basis-center acceleration grid resolution (cells per axis)
    pub accel_basis_res: usize,

    /// Fixed Gauss-Seidel iteration budget for the BB inversion
    pub solver_max_iterations: usize,

    /// Advection substeps per outer simulation step
    pub particle_substeps: u32,

    /// Particles sampled per seeding call
    pub seed_count: usize,
    /// Seeding calls before the circular particle buffer wraps.
    /// Buffer capacity = seed_count * max_seed_groups.
    pub max_seed_groups: usize,
    /// Seeding disk
    pub seed_center_x: f32,
    pub seed_center_y: f32,
    pub seed_radius: f32,

    /// Outer simulation timestep
    pub dt: f32,
}

impl SimulationConfig {
    /// Total particle buffer capacity
    pub fn particle_capacity(&self) -> usize {
        self.seed_count * self.max_seed_groups
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            domain_left: -1.0,
            domain_right: 1.0,
            domain_bottom: -1.0,
            domain_top: 1.0,
            length_lvl0: 1.0,
            max_aniso_lvl: 2,
            template_res: 64,
            integral_res: 32,
            coeff_snap_size: 0.025,
            accel_particles_res: 32,
            accel_basis_res: 16,
            solver_max_iterations: 10,
            particle_substeps: 4,
            seed_count: 64,
            max_seed_groups: 128,
            seed_center_x: 0.0,
            seed_center_y: 0.0,
            seed_radius: 0.25,
            dt: 1.0 / 60.0,
        }
    }
}
