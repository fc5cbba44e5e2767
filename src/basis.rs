//! Basis flow parameters and supports.
//!
//! A basis flow is a divergence-free velocity template at an anisotropic
//! frequency level, translated to a center point. Bases are stored in one
//! contiguous `Vec` on the simulation; a basis's index in that vector is
//! its identity everywhere (solver rows, intersection lists, cache keys).

use glam::{IVec2, Vec2};

/// Capability flags for a basis, tested with an all-bits-set mask.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct BasisFlags(pub u32);

impl BasisFlags {
    pub const NONE: Self = Self(0);
    /// Participates in the interior (obstacle-aware) velocity field
    pub const INTERIOR: Self = Self(1 << 0);
    /// Participates in dynamic boundary projection
    pub const DYNAMIC_BOUNDARY_PROJECTION: Self = Self(1 << 1);

    /// All bits of `mask` set on `self`
    #[inline]
    pub fn contains(self, mask: Self) -> bool {
        self.0 & mask.0 == mask.0
    }

    /// Any bit of `mask` set on `self`
    #[inline]
    pub fn intersects(self, mask: Self) -> bool {
        self.0 & mask.0 != 0
    }

    #[inline]
    pub fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }
}

/// Axis-aligned support rectangle of a basis. Derived on demand, never
/// persisted.
#[derive(Clone, Copy, Debug)]
pub struct BasisSupport {
    pub left: f32,
    pub right: f32,
    pub bottom: f32,
    pub top: f32,
}

impl BasisSupport {
    /// True when the open interiors of the two rectangles do not overlap.
    /// Touching edges count as empty intersection: the basis value is
    /// structurally zero there, so no coefficient needs computing.
    #[inline]
    pub fn intersection_interior_empty(a: &BasisSupport, b: &BasisSupport) -> bool {
        a.left.max(b.left) >= a.right.min(b.right) || a.bottom.max(b.bottom) >= a.top.min(b.top)
    }
}

/// Parameters of one translated basis flow.
#[derive(Clone, Copy, Debug)]
pub struct BasisFlow {
    /// Per-axis log2 frequency (non-negative)
    pub freq_lvl: IVec2,
    /// Center of the support in world coordinates
    pub center: Vec2,
    /// Solved interior weight, written back by the BB inversion
    pub coeff: f32,
    /// Boundary coefficient weight
    pub coeff_boundary: f32,
    pub flags: BasisFlags,
    /// Self inner product <b, b>, the solver's diagonal. Must be positive;
    /// computed from the self BB integral when the basis is inserted.
    pub norm_squared: f32,
    /// World extent of a level-0 support (copied from the config so the
    /// support can be derived without context)
    pub length_lvl0: f32,
    /// Support deformed into a quadrilateral by obstacle stretching
    pub stretched: bool,
    /// Deformed support corners: left-bottom, right-bottom, left-top,
    /// right-top. Only meaningful when `stretched` is set.
    pub corner_lb: Vec2,
    pub corner_rb: Vec2,
    pub corner_lt: Vec2,
    pub corner_rt: Vec2,
}

impl BasisFlow {
    /// A fresh unstretched basis with zero weights and no flags.
    /// `norm_squared` starts at zero and must be filled in before the basis
    /// reaches the solver.
    pub fn new(freq_lvl: IVec2, center: Vec2, length_lvl0: f32) -> Self {
        let mut b = Self {
            freq_lvl,
            center,
            coeff: 0.0,
            coeff_boundary: 0.0,
            flags: BasisFlags::NONE,
            norm_squared: 0.0,
            length_lvl0,
            stretched: false,
            corner_lb: Vec2::ZERO,
            corner_rb: Vec2::ZERO,
            corner_lt: Vec2::ZERO,
            corner_rt: Vec2::ZERO,
        };
        let sup = b.support();
        b.corner_lb = Vec2::new(sup.left, sup.bottom);
        b.corner_rb = Vec2::new(sup.right, sup.bottom);
        b.corner_lt = Vec2::new(sup.left, sup.top);
        b.corner_rt = Vec2::new(sup.right, sup.top);
        b
    }

    /// Half extent of the (unstretched) support on each axis
    #[inline]
    pub fn support_half_size(&self) -> Vec2 {
        Vec2::new(
            0.5 * self.length_lvl0 / (1 << self.freq_lvl.x) as f32,
            0.5 * self.length_lvl0 / (1 << self.freq_lvl.y) as f32,
        )
    }

    /// Axis-aligned support. For a stretched basis this is the bounding box
    /// of the deformed corners, which over-approximates the true quad.
    pub fn support(&self) -> BasisSupport {
        if self.stretched {
            let min_x = self
                .corner_lb
                .x
                .min(self.corner_rb.x)
                .min(self.corner_lt.x)
                .min(self.corner_rt.x);
            let max_x = self
                .corner_lb
                .x
                .max(self.corner_rb.x)
                .max(self.corner_lt.x)
                .max(self.corner_rt.x);
            let min_y = self
                .corner_lb
                .y
                .min(self.corner_rb.y)
                .min(self.corner_lt.y)
                .min(self.corner_rt.y);
            let max_y = self
                .corner_lb
                .y
                .max(self.corner_rb.y)
                .max(self.corner_lt.y)
                .max(self.corner_rt.y);
            BasisSupport {
                left: min_x,
                right: max_x,
                bottom: min_y,
                top: max_y,
            }
        } else {
            let half = self.support_half_size();
            BasisSupport {
                left: self.center.x - half.x,
                right: self.center.x + half.x,
                bottom: self.center.y - half.y,
                top: self.center.y + half.y,
            }
        }
    }

    /// Anisotropy ratio: log2 of the frequency ratio between the axes
    #[inline]
    pub fn aniso_ratio(&self) -> u32 {
        (self.freq_lvl.x - self.freq_lvl.y).unsigned_abs()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_all_bits_semantics() {
        let both = BasisFlags::INTERIOR.union(BasisFlags::DYNAMIC_BOUNDARY_PROJECTION);
        assert!(both.contains(BasisFlags::INTERIOR));
        assert!(both.contains(both));
        assert!(!BasisFlags::INTERIOR.contains(both));
        assert!(BasisFlags::INTERIOR.intersects(both));
        assert!(!BasisFlags::NONE.intersects(both));
    }

    #[test]
    fn support_shrinks_with_level() {
        let b0 = BasisFlow::new(IVec2::new(0, 0), Vec2::ZERO, 1.0);
        let b1 = BasisFlow::new(IVec2::new(1, 2), Vec2::ZERO, 1.0);
        let s0 = b0.support();
        let s1 = b1.support();
        assert!((s0.right - s0.left - 1.0).abs() < 1e-6);
        assert!((s1.right - s1.left - 0.5).abs() < 1e-6);
        assert!((s1.top - s1.bottom - 0.25).abs() < 1e-6);
    }

    #[test]
    fn touching_supports_have_empty_interior_intersection() {
        let a = BasisFlow::new(IVec2::new(0, 0), Vec2::new(0.0, 0.0), 1.0);
        let b = BasisFlow::new(IVec2::new(0, 0), Vec2::new(1.0, 0.0), 1.0);
        assert!(BasisSupport::intersection_interior_empty(
            &a.support(),
            &b.support()
        ));
        let c = BasisFlow::new(IVec2::new(0, 0), Vec2::new(0.9, 0.0), 1.0);
        assert!(!BasisSupport::intersection_interior_empty(
            &a.support(),
            &c.support()
        ));
    }

    #[test]
    fn stretched_support_is_corner_bbox() {
        let mut b = BasisFlow::new(IVec2::new(0, 0), Vec2::ZERO, 1.0);
        b.stretched = true;
        b.corner_rt = Vec2::new(0.8, 0.6);
        let s = b.support();
        assert!((s.right - 0.8).abs() < 1e-6);
        assert!((s.top - 0.6).abs() < 1e-6);
    }
}
