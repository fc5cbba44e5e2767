//! Dense sampled 2D vector field with bilinear interpolation.
//!
//! The minimal storage contract the engine needs: fill from a function,
//! indexed get/set, and point interpolation. Nodes include both edges of
//! the bounding box, so a field with resolution `n` has `n` samples per
//! axis spaced `(extent) / (n - 1)` apart.

use glam::Vec2;

pub struct VectorField2D {
    pub left: f32,
    pub right: f32,
    pub bottom: f32,
    pub top: f32,
    nx: usize,
    ny: usize,
    data: Vec<Vec2>,
}

impl VectorField2D {
    /// Create a zeroed field. `nx`/`ny` are node counts and must be >= 2.
    pub fn new(left: f32, right: f32, bottom: f32, top: f32, nx: usize, ny: usize) -> Self {
        assert!(nx >= 2 && ny >= 2, "field needs at least 2 nodes per axis");
        Self {
            left,
            right,
            bottom,
            top,
            nx,
            ny,
            data: vec![Vec2::ZERO; nx * ny],
        }
    }

    #[inline]
    pub fn nx(&self) -> usize {
        self.nx
    }

    #[inline]
    pub fn ny(&self) -> usize {
        self.ny
    }

    /// World position of node (i, j)
    #[inline]
    pub fn node_pos(&self, i: usize, j: usize) -> Vec2 {
        Vec2::new(
            self.left + i as f32 / (self.nx - 1) as f32 * (self.right - self.left),
            self.bottom + j as f32 / (self.ny - 1) as f32 * (self.top - self.bottom),
        )
    }

    #[inline]
    pub fn get(&self, i: usize, j: usize) -> Vec2 {
        self.data[j * self.nx + i]
    }

    #[inline]
    pub fn set(&mut self, i: usize, j: usize, v: Vec2) {
        self.data[j * self.nx + i] = v;
    }

    /// Fill every node from a function of its world position
    pub fn populate_with(&mut self, mut f: impl FnMut(f32, f32) -> Vec2) {
        for j in 0..self.ny {
            for i in 0..self.nx {
                let p = self.node_pos(i, j);
                self.data[j * self.nx + i] = f(p.x, p.y);
            }
        }
    }

    /// Add a function of world position onto every node
    pub fn add_with(&mut self, mut f: impl FnMut(f32, f32) -> Vec2) {
        for j in 0..self.ny {
            for i in 0..self.nx {
                let p = self.node_pos(i, j);
                self.data[j * self.nx + i] += f(p.x, p.y);
            }
        }
    }

    /// Is the point inside the field's bounding box (edges inclusive)?
    #[inline]
    pub fn contains(&self, p: Vec2) -> bool {
        p.x >= self.left && p.x <= self.right && p.y >= self.bottom && p.y <= self.top
    }

    /// Bilinear interpolation. Sample coordinates are clamped to the node
    /// lattice, so querying slightly outside the box returns the edge value;
    /// callers that need structural zero outside the box check `contains`
    /// first.
    pub fn interp(&self, p: Vec2) -> Vec2 {
        let x = (p.x - self.left) / (self.right - self.left) * (self.nx - 1) as f32;
        let y = (p.y - self.bottom) / (self.top - self.bottom) * (self.ny - 1) as f32;

        let i0 = (x.floor() as i32).clamp(0, self.nx as i32 - 2) as usize;
        let j0 = (y.floor() as i32).clamp(0, self.ny as i32 - 2) as usize;
        let i1 = i0 + 1;
        let j1 = j0 + 1;

        let tx = (x - i0 as f32).clamp(0.0, 1.0);
        let ty = (y - j0 as f32).clamp(0.0, 1.0);

        let v00 = self.data[j0 * self.nx + i0];
        let v10 = self.data[j0 * self.nx + i1];
        let v01 = self.data[j1 * self.nx + i0];
        let v11 = self.data[j1 * self.nx + i1];

        let v0 = v00 * (1.0 - tx) + v10 * tx;
        let v1 = v01 * (1.0 - tx) + v11 * tx;

        v0 * (1.0 - ty) + v1 * ty
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interp_reproduces_nodes() {
        let mut f = VectorField2D::new(-1.0, 1.0, -1.0, 1.0, 5, 5);
        f.populate_with(|x, y| Vec2::new(x, y));
        for j in 0..5 {
            for i in 0..5 {
                let p = f.node_pos(i, j);
                let v = f.interp(p);
                assert!((v - p).length() < 1e-6, "node ({}, {}) mismatch", i, j);
            }
        }
    }

    #[test]
    fn interp_is_linear_between_nodes() {
        let mut f = VectorField2D::new(0.0, 1.0, 0.0, 1.0, 2, 2);
        f.populate_with(|x, y| Vec2::new(x + y, x - y));
        let p = Vec2::new(0.3, 0.7);
        let v = f.interp(p);
        assert!((v - Vec2::new(1.0, -0.4)).length() < 1e-6);
    }

    #[test]
    fn contains_includes_edges() {
        let f = VectorField2D::new(-0.5, 0.5, -0.25, 0.25, 4, 4);
        assert!(f.contains(Vec2::new(0.5, 0.25)));
        assert!(f.contains(Vec2::new(-0.5, -0.25)));
        assert!(!f.contains(Vec2::new(0.51, 0.0)));
    }
}
