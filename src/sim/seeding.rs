//! Particle seeding.

use glam::Vec2;
use rand::Rng;

use super::Simulation;

impl Simulation {
    /// One seeding call: draw `seed_count` positions uniformly from the
    /// configured disk and place each in the circular particle buffer.
    /// Samples landing inside any obstacle are skipped without a retry, so
    /// a call near an obstacle yields fewer particles by design.
    pub fn seed_particles(&mut self) {
        let mut rng = rand::thread_rng();
        let center = Vec2::new(self.config.seed_center_x, self.config.seed_center_y);

        for _ in 0..self.config.seed_count {
            // sqrt of the radius sample keeps the disk density uniform
            let r = self.config.seed_radius * rng.gen::<f32>().sqrt();
            let theta = rng.gen::<f32>() * std::f32::consts::TAU;
            let p = center + r * Vec2::new(theta.cos(), theta.sin());

            if self.obstacles.iter().any(|obs| obs.phi(p) <= 0.0) {
                continue;
            }
            self.particles.seed(p);
        }
    }
}
