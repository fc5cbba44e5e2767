//! Tracer particle storage.
//!
//! A fixed-capacity circular buffer laid out as parallel arrays. Seeding
//! appends until the buffer fills once, then overwrites the oldest slot in
//! circular order; positions, accumulated velocities, and ages move
//! together.

use glam::Vec2;

pub struct ParticleBuffer {
    pub positions: Vec<Vec2>,
    /// Velocity accumulated from all contributing bases this substep
    pub velocities: Vec<Vec2>,
    pub ages: Vec<f32>,
    capacity: usize,
    cursor: usize,
    looped: bool,
}

impl ParticleBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            positions: Vec::with_capacity(capacity),
            velocities: Vec::with_capacity(capacity),
            ages: Vec::with_capacity(capacity),
            capacity,
            cursor: 0,
            looped: false,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Has the buffer filled once and started recycling slots?
    #[inline]
    pub fn looped(&self) -> bool {
        self.looped
    }

    /// Place one particle: append while the buffer has never filled,
    /// overwrite the oldest slot afterwards.
    pub fn seed(&mut self, p: Vec2) {
        if self.cursor >= self.capacity {
            self.looped = true;
            self.cursor = 0;
        }
        if self.looped {
            self.positions[self.cursor] = p;
            self.velocities[self.cursor] = Vec2::ZERO;
            self.ages[self.cursor] = 0.0;
        } else {
            self.positions.push(p);
            self.velocities.push(Vec2::ZERO);
            self.ages.push(0.0);
        }
        self.cursor += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn appends_until_capacity() {
        let mut buf = ParticleBuffer::new(3);
        for i in 0..3 {
            buf.seed(Vec2::splat(i as f32));
        }
        assert_eq!(buf.len(), 3);
        assert!(!buf.looped());
    }

    #[test]
    fn wraps_and_overwrites_oldest() {
        let mut buf = ParticleBuffer::new(3);
        for i in 0..3 {
            buf.seed(Vec2::splat(i as f32));
            buf.ages[i] = 9.0; // pretend they aged
        }
        buf.seed(Vec2::splat(10.0));
        assert!(buf.looped());
        assert_eq!(buf.len(), 3, "capacity never exceeded");
        assert_eq!(buf.positions[0], Vec2::splat(10.0));
        assert_eq!(buf.ages[0], 0.0, "recycled slot resets age");
        assert_eq!(buf.positions[1], Vec2::splat(1.0), "other slots untouched");

        buf.seed(Vec2::splat(11.0));
        assert_eq!(buf.positions[1], Vec2::splat(11.0), "circular order");
    }
}
