//! Basis-basis (BB) and transport (T) coefficient cache.
//!
//! Pairwise interactions are canonicalized before lookup: both frequency
//! levels are normalized by the shared minimum exponent and the relative
//! center offset is scaled into the canonical frame and snapped to a fixed
//! grid, so geometrically identical pairs collide on one cache entry no
//! matter where they sit in the domain. Misses fall back to trapezoid
//! quadrature over the support intersection; hits are a hash lookup.
//!
//! The BB key is intentionally not symmetrized under pair exchange even
//! though <b1, b2> = <b2, b1>: the canonical frame keeps key construction
//! branch-free at the cost of up to twice the entries. Preserved as-is.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use glam::{IVec2, Vec2};
use log::{debug, info};

use crate::basis::{BasisFlow, BasisSupport};
use crate::config::SimulationConfig;
use crate::error::EigenfluidError;
use crate::template::BasisTemplates;

/// Canonical cache key: normalized level pair plus the relative offset
/// quantized to snap-size multiples, so derived Hash/Eq are exact.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CoeffKey {
    pub lvl1: IVec2,
    pub lvl2: IVec2,
    pub qx: i32,
    pub qy: i32,
}

/// Nearest snap-grid multiple, as an integer count of steps
#[inline]
pub fn quantize(v: f32, snap: f32) -> i32 {
    (v / snap).round() as i32
}

pub struct CoefficientCache {
    bb: HashMap<CoeffKey, f32>,
    t: HashMap<CoeffKey, Vec2>,
    snap_size: f32,
    integral_res: u32,
    length_lvl0: f32,
    new_bb_computed: bool,
    new_t_computed: bool,
}

impl CoefficientCache {
    pub fn new(config: &SimulationConfig) -> Self {
        Self {
            bb: HashMap::new(),
            t: HashMap::new(),
            snap_size: config.coeff_snap_size,
            integral_res: config.integral_res,
            length_lvl0: config.length_lvl0,
            new_bb_computed: false,
            new_t_computed: false,
        }
    }

    pub fn bb_len(&self) -> usize {
        self.bb.len()
    }

    pub fn t_len(&self) -> usize {
        self.t.len()
    }

    pub fn bb_entries(&self) -> impl Iterator<Item = (&CoeffKey, &f32)> {
        self.bb.iter()
    }

    pub fn t_entries(&self) -> impl Iterator<Item = (&CoeffKey, &Vec2)> {
        self.t.iter()
    }

    /// Canonicalize a pair: shared base level, normalized levels, and the
    /// relative offset `b2.center - b1.center` scaled into the base frame.
    fn canonicalize(b1: &BasisFlow, b2: &BasisFlow) -> (f32, IVec2, IVec2, Vec2) {
        let base_lvl = b1
            .freq_lvl
            .x
            .min(b1.freq_lvl.y)
            .min(b2.freq_lvl.x.min(b2.freq_lvl.y));
        let base_freq = (2.0f32).powi(base_lvl);
        let norm1 = b1.freq_lvl - IVec2::splat(base_lvl);
        let norm2 = b2.freq_lvl - IVec2::splat(base_lvl);
        let rel_offset = base_freq * (b2.center - b1.center);
        (base_freq, norm1, norm2, rel_offset)
    }

    /// BB coefficient <b1, b2>. Zero without integration or cache growth
    /// when the support interiors are disjoint. The canonical value is
    /// scale-invariant (rescale exponent 0), so the cached value is
    /// returned as-is.
    pub fn bb(&mut self, templates: &BasisTemplates, b1: &BasisFlow, b2: &BasisFlow) -> f32 {
        if BasisSupport::intersection_interior_empty(&b1.support(), &b2.support()) {
            return 0.0;
        }

        let (_base_freq, norm1, norm2, rel_offset) = Self::canonicalize(b1, b2);
        let key = CoeffKey {
            lvl1: norm1,
            lvl2: norm2,
            qx: quantize(rel_offset.x, self.snap_size),
            qy: quantize(rel_offset.y, self.snap_size),
        };

        if let Some(v) = self.bb.get(&key) {
            return *v;
        }

        // integrate in the canonical frame: one basis at the origin, the
        // other at the (unsnapped) relative offset
        let rel1 = BasisFlow::new(norm1, Vec2::ZERO, self.length_lvl0);
        let rel2 = BasisFlow::new(norm2, rel_offset, self.length_lvl0);
        let coeff = integrate_basis_basis(templates, &rel1, &rel2, self.integral_res);

        self.bb.insert(key, coeff);
        self.new_bb_computed = true;
        if self.bb.len() % 1000 == 0 {
            debug!("BB coefficients cached: {}", self.bb.len());
        }
        coeff
    }

    /// T coefficient: average velocity of the transporting basis over the
    /// transported basis's support. The canonical value scales linearly
    /// with absolute frequency (rescale exponent 1).
    pub fn transport(
        &mut self,
        templates: &BasisTemplates,
        transported: &BasisFlow,
        transporting: &BasisFlow,
    ) -> Vec2 {
        if BasisSupport::intersection_interior_empty(
            &transported.support(),
            &transporting.support(),
        ) {
            return Vec2::ZERO;
        }

        let (base_freq, norm_transported, norm_transporting, rel_offset) =
            Self::canonicalize(transporting, transported);
        // canonicalize() orders as (b1, b2) = (transporting, transported) so
        // the offset points from transporting to transported
        let key = CoeffKey {
            lvl1: norm_transported,
            lvl2: norm_transporting,
            qx: quantize(rel_offset.x, self.snap_size),
            qy: quantize(rel_offset.y, self.snap_size),
        };

        let result = if let Some(v) = self.t.get(&key) {
            *v
        } else {
            let rel_transporting = BasisFlow::new(norm_transporting, Vec2::ZERO, self.length_lvl0);
            let rel_transported = BasisFlow::new(norm_transported, rel_offset, self.length_lvl0);
            let coeff = average_basis_on_support(
                templates,
                &rel_transporting,
                &rel_transported,
                self.integral_res,
            );

            self.t.insert(key, coeff);
            self.new_t_computed = true;
            if self.t.len() % 1000 == 0 {
                debug!("T coefficients cached: {}", self.t.len());
            }
            coeff
        };

        result * base_freq
    }

    /// World-space value of a quantized offset component
    #[inline]
    fn snapped(&self, q: i32) -> f32 {
        q as f32 * self.snap_size
    }

    /// Write the BB table, one record per line. A no-op unless new
    /// coefficients were computed since the last save.
    pub fn save_bb(&mut self, path: &Path) -> Result<(), EigenfluidError> {
        if !self.new_bb_computed {
            debug!("no new BB coefficients, skipping save");
            return Ok(());
        }
        let mut out = String::new();
        for (k, v) in &self.bb {
            writeln!(
                out,
                "{} {} {} {} {} {} {}",
                k.lvl1.x,
                k.lvl1.y,
                k.lvl2.x,
                k.lvl2.y,
                self.snapped(k.qx),
                self.snapped(k.qy),
                v
            )
            .expect("write to String cannot fail");
        }
        fs::write(path, out)?;
        self.new_bb_computed = false;
        info!("saved {} BB coefficients to {}", self.bb.len(), path.display());
        Ok(())
    }

    /// Write the T table. A no-op unless new coefficients were computed.
    pub fn save_t(&mut self, path: &Path) -> Result<(), EigenfluidError> {
        if !self.new_t_computed {
            debug!("no new T coefficients, skipping save");
            return Ok(());
        }
        let mut out = String::new();
        for (k, v) in &self.t {
            writeln!(
                out,
                "{} {} {} {} {} {} {} {}",
                k.lvl1.x,
                k.lvl1.y,
                k.lvl2.x,
                k.lvl2.y,
                self.snapped(k.qx),
                self.snapped(k.qy),
                v.x,
                v.y
            )
            .expect("write to String cannot fail");
        }
        fs::write(path, out)?;
        self.new_t_computed = false;
        info!("saved {} T coefficients to {}", self.t.len(), path.display());
        Ok(())
    }

    /// Load a BB table. Stored offsets are re-snapped against the current
    /// snap size, so a table saved with a finer snap still lands on valid
    /// keys. Malformed lines are rejected, not skipped; the whole file is
    /// parsed before any entry lands in the cache, so a failed load leaves
    /// the cache exactly as it was.
    pub fn load_bb(&mut self, path: &Path) -> Result<(), EigenfluidError> {
        let text = fs::read_to_string(path)?;
        let mut loaded: HashMap<CoeffKey, f32> = HashMap::new();
        for (idx, line) in text.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let (key, values) = self.parse_record::<1>(line, path, idx + 1)?;
            loaded.insert(key, values[0]);
        }
        let count = loaded.len();
        self.bb.extend(loaded);
        info!("loaded {} BB coefficients from {}", count, path.display());
        Ok(())
    }

    /// Load a T table. Same format and atomicity as `load_bb`.
    pub fn load_t(&mut self, path: &Path) -> Result<(), EigenfluidError> {
        let text = fs::read_to_string(path)?;
        let mut loaded: HashMap<CoeffKey, Vec2> = HashMap::new();
        for (idx, line) in text.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let (key, values) = self.parse_record::<2>(line, path, idx + 1)?;
            loaded.insert(key, Vec2::new(values[0], values[1]));
        }
        let count = loaded.len();
        self.t.extend(loaded);
        info!("loaded {} T coefficients from {}", count, path.display());
        Ok(())
    }

    /// Parse `l1x l1y l2x l2y offx offy v0 [v1]` with exactly N trailing
    /// values. Any missing, unparsable, or extra token fails the whole load.
    fn parse_record<const N: usize>(
        &self,
        line: &str,
        path: &Path,
        line_no: usize,
    ) -> Result<(CoeffKey, [f32; N]), EigenfluidError> {
        let corrupt = || EigenfluidError::CacheFormat {
            path: path.display().to_string(),
            line: line_no,
        };
        let mut tokens = line.split_whitespace();
        let mut next_num = |tokens: &mut std::str::SplitWhitespace<'_>| -> Result<f64, EigenfluidError> {
            let tok = tokens.next().ok_or_else(corrupt)?;
            f64::from_str(tok).map_err(|_| corrupt())
        };

        let l1x = next_num(&mut tokens)? as i32;
        let l1y = next_num(&mut tokens)? as i32;
        let l2x = next_num(&mut tokens)? as i32;
        let l2y = next_num(&mut tokens)? as i32;
        let off_x = next_num(&mut tokens)? as f32;
        let off_y = next_num(&mut tokens)? as f32;
        let mut values = [0.0f32; N];
        for v in values.iter_mut() {
            *v = next_num(&mut tokens)? as f32;
        }
        if tokens.next().is_some() {
            return Err(corrupt());
        }

        Ok((
            CoeffKey {
                lvl1: IVec2::new(l1x, l1y),
                lvl2: IVec2::new(l2x, l2y),
                qx: quantize(off_x, self.snap_size),
                qy: quantize(off_y, self.snap_size),
            },
            values,
        ))
    }
}

/// Trapezoid-weighted quadrature of <b1, b2> over the support intersection.
/// Corner and edge samples carry half weight per boundary axis.
pub fn integrate_basis_basis(
    templates: &BasisTemplates,
    b1: &BasisFlow,
    b2: &BasisFlow,
    res: u32,
) -> f32 {
    let sup1 = b1.support();
    let sup2 = b2.support();
    let left = sup1.left.max(sup2.left);
    let right = sup1.right.min(sup2.right);
    let bottom = sup1.bottom.max(sup2.bottom);
    let top = sup1.top.min(sup2.top);

    if left >= right || bottom >= top {
        return 0.0;
    }

    let mut sum = 0.0f64;
    for i in 0..=res {
        for j in 0..=res {
            let p = Vec2::new(
                left + i as f32 / res as f32 * (right - left),
                bottom + j as f32 / res as f32 * (top - bottom),
            );
            let w = edge_weight(i, res) * edge_weight(j, res);
            let v1 = templates.evaluate(p, b1.freq_lvl, b1.center);
            let v2 = templates.evaluate(p, b2.freq_lvl, b2.center);
            sum += (w * v1.dot(v2)) as f64;
        }
    }

    (sum * ((right - left) * (top - bottom)) as f64 / (res as f64 * res as f64)) as f32
}

/// Average velocity of `b_vec` over the support of `b_support`: the
/// quadrature of `b_vec` over the intersection, divided by `b_support`'s
/// support area.
pub fn average_basis_on_support(
    templates: &BasisTemplates,
    b_vec: &BasisFlow,
    b_support: &BasisFlow,
    res: u32,
) -> Vec2 {
    let sup_vec = b_vec.support();
    let sup_sup = b_support.support();
    let left = sup_vec.left.max(sup_sup.left);
    let right = sup_vec.right.min(sup_sup.right);
    let bottom = sup_vec.bottom.max(sup_sup.bottom);
    let top = sup_vec.top.min(sup_sup.top);

    if left >= right || bottom >= top {
        return Vec2::ZERO;
    }

    let mut sum = glam::DVec2::ZERO;
    for i in 0..=res {
        for j in 0..=res {
            let p = Vec2::new(
                left + i as f32 / res as f32 * (right - left),
                bottom + j as f32 / res as f32 * (top - bottom),
            );
            let w = edge_weight(i, res) * edge_weight(j, res);
            sum += (w * templates.evaluate(p, b_vec.freq_lvl, b_vec.center)).as_dvec2();
        }
    }

    let half = b_support.support_half_size();
    let support_area = 4.0 * half.x * half.y;
    (sum * ((right - left) * (top - bottom)) as f64 / (res as f64 * res as f64)).as_vec2()
        / support_area
}

#[inline]
fn edge_weight(i: u32, res: u32) -> f32 {
    if i == 0 || i == res {
        0.5
    } else {
        1.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (BasisTemplates, CoefficientCache) {
        let mut config = SimulationConfig::default();
        config.template_res = 48;
        config.integral_res = 16;
        let templates = BasisTemplates::new(&config).unwrap();
        let cache = CoefficientCache::new(&config);
        (templates, cache)
    }

    #[test]
    fn offsets_within_half_snap_share_a_key() {
        let (templates, mut cache) = setup();
        let a = BasisFlow::new(IVec2::new(0, 0), Vec2::ZERO, 1.0);
        let b1 = BasisFlow::new(IVec2::new(0, 0), Vec2::new(0.2, 0.0), 1.0);
        // within half a snap step of b1's offset
        let b2 = BasisFlow::new(IVec2::new(0, 0), Vec2::new(0.2 + 0.01, 0.0), 1.0);
        cache.bb(&templates, &a, &b1);
        cache.bb(&templates, &a, &b2);
        assert_eq!(cache.bb_len(), 1, "snapped offsets should collide");
    }

    #[test]
    fn translation_invariance_through_canonical_frame() {
        let (templates, mut cache) = setup();
        let a1 = BasisFlow::new(IVec2::new(0, 0), Vec2::new(-0.3, 0.1), 1.0);
        let b1 = BasisFlow::new(IVec2::new(0, 1), Vec2::new(-0.1, 0.2), 1.0);
        let a2 = BasisFlow::new(IVec2::new(0, 0), Vec2::new(0.2, -0.4), 1.0);
        let b2 = BasisFlow::new(IVec2::new(0, 1), Vec2::new(0.4, -0.3), 1.0);
        let c1 = cache.bb(&templates, &a1, &b1);
        let c2 = cache.bb(&templates, &a2, &b2);
        assert_eq!(c1, c2, "same relative geometry must hit the same entry");
        assert_eq!(cache.bb_len(), 1);
    }

    #[test]
    fn transport_scales_with_base_frequency() {
        let (templates, mut cache) = setup();
        // same canonical shape at base level 0 and base level 1
        let a0 = BasisFlow::new(IVec2::new(0, 0), Vec2::ZERO, 1.0);
        let b0 = BasisFlow::new(IVec2::new(0, 0), Vec2::new(0.2, 0.1), 1.0);
        let a1 = BasisFlow::new(IVec2::new(1, 1), Vec2::ZERO, 1.0);
        let b1 = BasisFlow::new(IVec2::new(1, 1), Vec2::new(0.1, 0.05), 1.0);
        let t0 = cache.transport(&templates, &a0, &b0);
        let t1 = cache.transport(&templates, &a1, &b1);
        assert_eq!(cache.t_len(), 1, "both pairs share one canonical entry");
        assert!(
            (t1 - 2.0 * t0).length() < 1e-6,
            "T rescale exponent is 1: {t1:?} vs 2*{t0:?}"
        );
    }
}
