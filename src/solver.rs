//! Orthogonal-group Gauss-Seidel relaxation for the implicit BB matrix.
//!
//! The matrix is never materialized. Each row carries a precomputed list of
//! intersecting columns with their BB coefficients; everything off that
//! list is structurally zero. Rows are partitioned into orthogonal groups
//! (pairwise support-disjoint bases), so all rows of one group can update
//! concurrently: intra-group coefficients are structurally zero, which
//! means a row never reads a slot written inside its own group. Groups run
//! in fixed order with a join barrier between them; values read from other
//! groups are whatever was last written, the usual Gauss-Seidel staleness
//! tradeoff.
//!
//! The iteration budget is fixed. Non-convergence is not detected.

use rayon::prelude::*;

use crate::basis::{BasisFlags, BasisFlow, BasisSupport};

/// One off-diagonal entry of a row: column index and BB coefficient
#[derive(Clone, Copy, Debug)]
pub struct BbEntry {
    pub j: u32,
    pub coeff: f32,
}

/// Greedy partition of basis indices into orthogonal groups: each basis
/// joins the first group containing no overlapping support.
pub fn orthogonal_groups(bases: &[BasisFlow]) -> Vec<Vec<u32>> {
    let supports: Vec<BasisSupport> = bases.iter().map(|b| b.support()).collect();
    let mut groups: Vec<Vec<u32>> = Vec::new();

    'bases: for i in 0..bases.len() {
        for group in &mut groups {
            let disjoint = group.iter().all(|&j| {
                BasisSupport::intersection_interior_empty(&supports[i], &supports[j as usize])
            });
            if disjoint {
                group.push(i as u32);
                continue 'bases;
            }
        }
        groups.push(vec![i as u32]);
    }

    groups
}

/// Approximately solve `B x = b` for the rows whose basis has every bit of
/// `mask` set. `x` is zero-initialized; unmasked rows stay zero and are
/// skipped as columns. Precondition: `norm_squared > 0` for every masked
/// basis (enforced at basis insertion).
pub fn solve(
    x: &mut [f64],
    b: &[f64],
    bases: &[BasisFlow],
    rows: &[Vec<BbEntry>],
    groups: &[Vec<u32>],
    mask: BasisFlags,
    max_iterations: usize,
) {
    assert_eq!(x.len(), b.len());
    assert_eq!(x.len(), bases.len());
    assert_eq!(x.len(), rows.len());

    x.fill(0.0);

    for _ in 0..max_iterations {
        for group in groups {
            // Fan out over the group's rows; only x slots from other groups
            // are read, so the shared borrow of x is race-free by
            // construction. Updates are joined before the next group.
            let updates: Vec<(usize, f64)> = group
                .par_iter()
                .filter_map(|&id| {
                    let i = id as usize;
                    if !bases[i].flags.contains(mask) {
                        return None;
                    }
                    let mut acc = b[i];
                    for e in &rows[i] {
                        let j = e.j as usize;
                        if bases[j].flags.contains(mask) {
                            acc -= e.coeff as f64 * x[j];
                        }
                    }
                    Some((i, acc / bases[i].norm_squared as f64))
                })
                .collect();

            for (i, v) in updates {
                x[i] = v;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::{IVec2, Vec2};

    fn unit_basis(center: Vec2, flags: BasisFlags) -> BasisFlow {
        let mut b = BasisFlow::new(IVec2::new(0, 0), center, 1.0);
        b.flags = flags;
        b.norm_squared = 1.0;
        b
    }

    #[test]
    fn groups_are_pairwise_disjoint() {
        // overlapping row of bases: neighbors conflict, alternates don't
        let bases: Vec<BasisFlow> = (0..6)
            .map(|i| unit_basis(Vec2::new(i as f32 * 0.6, 0.0), BasisFlags::INTERIOR))
            .collect();
        let groups = orthogonal_groups(&bases);
        for group in &groups {
            for (a, &i) in group.iter().enumerate() {
                for &j in &group[a + 1..] {
                    assert!(
                        BasisSupport::intersection_interior_empty(
                            &bases[i as usize].support(),
                            &bases[j as usize].support()
                        ),
                        "bases {i} and {j} overlap within one group"
                    );
                }
            }
        }
        // every basis appears exactly once
        let mut seen: Vec<u32> = groups.iter().flatten().copied().collect();
        seen.sort_unstable();
        assert_eq!(seen, (0..6).collect::<Vec<u32>>());
    }

    #[test]
    fn identity_system_solves_in_one_iteration() {
        let bases: Vec<BasisFlow> = (0..4)
            .map(|i| unit_basis(Vec2::new(i as f32 * 2.0, 0.0), BasisFlags::INTERIOR))
            .collect();
        let rows = vec![Vec::new(); 4];
        let groups = orthogonal_groups(&bases);
        let b = [1.0, -2.0, 3.0, 0.5];
        let mut x = [0.0; 4];
        solve(&mut x, &b, &bases, &rows, &groups, BasisFlags::INTERIOR, 1);
        assert_eq!(x, b);
    }

    #[test]
    fn unmasked_rows_stay_zero() {
        let mut bases: Vec<BasisFlow> = (0..3)
            .map(|i| unit_basis(Vec2::new(i as f32 * 2.0, 0.0), BasisFlags::INTERIOR))
            .collect();
        bases[1].flags = BasisFlags::NONE;
        let rows = vec![Vec::new(); 3];
        let groups = orthogonal_groups(&bases);
        let b = [1.0, 1.0, 1.0];
        let mut x = [0.0; 3];
        solve(&mut x, &b, &bases, &rows, &groups, BasisFlags::INTERIOR, 5);
        assert_eq!(x, [1.0, 0.0, 1.0]);
    }
}
