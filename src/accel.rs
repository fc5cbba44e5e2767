//! Uniform-grid spatial acceleration structure.
//!
//! A rectangular bounding box partitioned into `res x res` cells, each
//! owning a reusable index arena. Cells are cleared by truncation so a
//! wholesale per-frame rebuild does not reallocate.
//!
//! Range queries over-approximate geometric overlap: they scan the
//! inclusive cell rectangle covering a bounding box, so false positives
//! are expected and callers filter, but a false negative is a bug.

use glam::{IVec2, Vec2};

pub struct AccelGrid {
    left: f32,
    right: f32,
    bottom: f32,
    top: f32,
    res: usize,
    cells: Vec<Vec<u32>>,
}

impl AccelGrid {
    pub fn new(left: f32, right: f32, bottom: f32, top: f32, res: usize) -> Self {
        assert!(res > 0, "acceleration grid needs at least one cell");
        Self {
            left,
            right,
            bottom,
            top,
            res,
            cells: (0..res * res).map(|_| Vec::new()).collect(),
        }
    }

    #[inline]
    pub fn res(&self) -> usize {
        self.res
    }

    /// Truncate every cell's index list, keeping allocations
    pub fn clear(&mut self) {
        for cell in &mut self.cells {
            cell.clear();
        }
    }

    /// Cell index nearest to a point, by linear scaling from the bounds.
    /// No clamping: a point outside the box yields an out-of-range index,
    /// which callers must either prevent or accept.
    #[inline]
    pub fn nearest_cell(&self, p: Vec2) -> IVec2 {
        IVec2::new(
            ((p.x - self.left) / (self.right - self.left) * self.res as f32).floor() as i32,
            ((p.y - self.bottom) / (self.top - self.bottom) * self.res as f32).floor() as i32,
        )
    }

    #[inline]
    fn clamp_cell(&self, c: IVec2) -> (usize, usize) {
        (
            c.x.clamp(0, self.res as i32 - 1) as usize,
            c.y.clamp(0, self.res as i32 - 1) as usize,
        )
    }

    /// Insert an index into the cell nearest to `p` (clamped into the grid)
    pub fn insert(&mut self, p: Vec2, idx: u32) {
        let (i, j) = self.clamp_cell(self.nearest_cell(p));
        self.cells[j * self.res + i].push(idx);
    }

    #[inline]
    pub fn cell(&self, i: usize, j: usize) -> &[u32] {
        &self.cells[j * self.res + i]
    }

    /// Inclusive cell rectangle covering a bounding box, clamped into the
    /// grid. Always a superset of the cells the box truly touches.
    pub fn cell_range(&self, min: Vec2, max: Vec2) -> (usize, usize, usize, usize) {
        let (i0, j0) = self.clamp_cell(self.nearest_cell(min));
        let (i1, j1) = self.clamp_cell(self.nearest_cell(max));
        (i0, j0, i1, j1)
    }
}
