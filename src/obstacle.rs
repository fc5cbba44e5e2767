//! Obstacles as signed distance fields.
//!
//! The engine only needs two queries from an obstacle: the signed distance
//! (negative inside) and its gradient, a unit vector pointing out of the
//! obstacle. Seeding rejects samples inside, advection projects particles
//! back to the surface along the gradient.

use glam::Vec2;

pub trait Obstacle {
    /// Signed distance to the obstacle surface, negative inside
    fn phi(&self, p: Vec2) -> f32;

    /// Unit gradient of `phi`, pointing away from the obstacle
    fn grad_phi(&self, p: Vec2) -> Vec2;
}

/// Solid disk
pub struct Disk {
    pub center: Vec2,
    pub radius: f32,
}

impl Obstacle for Disk {
    fn phi(&self, p: Vec2) -> f32 {
        (p - self.center).length() - self.radius
    }

    fn grad_phi(&self, p: Vec2) -> Vec2 {
        // degenerate at the exact center; push along +x there
        (p - self.center).normalize_or(Vec2::X)
    }
}

/// Half plane: solid on the side `normal` points away from.
/// `phi(p) = dot(p - origin, normal)`, so points behind the plane are inside.
pub struct HalfPlane {
    pub origin: Vec2,
    /// Unit outward normal
    pub normal: Vec2,
}

impl Obstacle for HalfPlane {
    fn phi(&self, p: Vec2) -> f32 {
        (p - self.origin).dot(self.normal)
    }

    fn grad_phi(&self, _p: Vec2) -> Vec2 {
        self.normal
    }
}
