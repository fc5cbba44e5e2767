//! Canonical basis flow templates.
//!
//! One dense template field is generated per anisotropy ratio from a
//! closed-form eigen-expansion, then every translated basis evaluation is
//! a scaled bilinear lookup. Bases with `freq_lvl.x > freq_lvl.y` reuse the
//! mirror template through the axis-swap antisymmetry of the eigenflows.

use glam::{DVec2, IVec2, Vec2};

use crate::config::SimulationConfig;
use crate::error::EigenfluidError;
use crate::field::VectorField2D;

/// Divergence-free Laplacian eigenflow with wave vector `k`
#[inline]
pub fn eigen_laplace(p: DVec2, k: DVec2) -> DVec2 {
    DVec2::new(
        k.y * (std::f64::consts::PI * p.x * k.x).sin() * (std::f64::consts::PI * p.y * k.y).cos(),
        -k.x * (std::f64::consts::PI * p.x * k.x).cos() * (std::f64::consts::PI * p.y * k.y).sin(),
    )
}

/// Precomputed expansion for one anisotropy ratio: 3x3 harmonic weights
/// over the odd wave numbers (1, 3, 5) per axis, plus a normalization.
struct AnisoExpansion {
    coeffs: [[f64; 3]; 3],
    norm: f64,
}

/// Ratios with an analytic table. Anything beyond is rejected at
/// configuration time.
const EXPANSIONS: [AnisoExpansion; 3] = [
    AnisoExpansion {
        coeffs: [
            [1.0, -0.1107231462697129, -0.1335661122381723],
            [-0.1107231462697125, 0.126276763526633, -0.05362142886203727],
            [-0.1335661122381725, -0.05362142886203719, 0.05888607976485681],
        ],
        norm: 1.0221139695997405,
    },
    AnisoExpansion {
        coeffs: [
            [1.0, 0.02773519585551282, -0.2166411175133077],
            [-0.4866818264236261, 0.05437868400363529, 0.06470915488254406],
            [0.0920090958541756, -0.03817424957328374, 0.00450273057313512],
        ],
        norm: 0.7620965477955399,
    },
    AnisoExpansion {
        coeffs: [
            [1.0, 0.03365588438312442, -0.2201935306298747],
            [-0.5578126028758348, -0.00367012134209574, 0.1137645933804244],
            [0.1346875617255008, -0.004529104071367439, -0.02422004990227971],
        ],
        norm: 0.5618900800300474,
    },
];

/// Highest ratio the analytic tables cover
pub const MAX_SUPPORTED_ANISO: u32 = EXPANSIONS.len() as u32 - 1;

/// Canonical basis velocity at a template-local point, for frequency pair
/// (1, 2^log2_aniso). Support is [-0.5, 0.5] x [-0.5/2^a, 0.5/2^a].
pub fn flow_basis_hat(p: DVec2, log2_aniso: u32) -> DVec2 {
    let exp = &EXPANSIONS[log2_aniso as usize];
    let kx = 1.0;
    let ky = (1u32 << log2_aniso) as f64;

    // shift so the support's corner sits at the eigenflow origin
    let p2 = DVec2::new(p.x + 0.5 / kx, p.y + 0.5 / ky);

    let mut sum = DVec2::ZERO;
    for (i, row) in exp.coeffs.iter().enumerate() {
        for (j, c) in row.iter().enumerate() {
            let k = DVec2::new((2 * i + 1) as f64 * kx, (2 * j + 1) as f64 * ky);
            sum += *c * eigen_laplace(p2, k);
        }
    }
    exp.norm * sum
}

/// Owned set of sampled template fields, one per anisotropy ratio.
pub struct BasisTemplates {
    fields: Vec<VectorField2D>,
    length_lvl0: f32,
}

impl BasisTemplates {
    /// Sample all templates up to `config.max_aniso_lvl`. Fails when the
    /// config asks for a ratio without an analytic table.
    pub fn new(config: &SimulationConfig) -> Result<Self, EigenfluidError> {
        if config.max_aniso_lvl > MAX_SUPPORTED_ANISO {
            return Err(EigenfluidError::UnsupportedAnisotropy {
                ratio: config.max_aniso_lvl,
                max: MAX_SUPPORTED_ANISO,
            });
        }
        let mut fields = Vec::with_capacity(config.max_aniso_lvl as usize + 1);
        for ratio in 0..=config.max_aniso_lvl {
            let half_y = 0.5 / (1u32 << ratio) as f32;
            let mut field = VectorField2D::new(
                -0.5,
                0.5,
                -half_y,
                half_y,
                config.template_res,
                config.template_res,
            );
            field.populate_with(|x, y| {
                flow_basis_hat(DVec2::new(x as f64, y as f64), ratio).as_vec2()
            });
            fields.push(field);
        }
        Ok(Self {
            fields,
            length_lvl0: config.length_lvl0,
        })
    }

    /// Highest anisotropy ratio this set was built for
    #[inline]
    pub fn max_aniso_lvl(&self) -> u32 {
        self.fields.len() as u32 - 1
    }

    /// Velocity of the basis at frequency level `freq_lvl` centered at
    /// `center`, evaluated at world point `p`. Structurally zero outside
    /// the support.
    ///
    /// In log2 frequency space the anisotropy ratio is the level
    /// difference, so the template index is `|lvl.y - lvl.x|`. When
    /// `lvl.x > lvl.y` the mirror template is sampled with swapped axes,
    /// negated, and its components swapped back, which realizes the
    /// antisymmetry of the eigenflows under axis exchange.
    pub fn evaluate(&self, p: Vec2, freq_lvl: IVec2, center: Vec2) -> Vec2 {
        let min_lvl = freq_lvl.x.min(freq_lvl.y);
        let scale = (1i32 << min_lvl) as f32 / self.length_lvl0;
        let d = p - center;

        if freq_lvl.x <= freq_lvl.y {
            let template = &self.fields[(freq_lvl.y - freq_lvl.x) as usize];
            let local = Vec2::new(scale * d.x, scale * d.y);
            if !template.contains(local) {
                return Vec2::ZERO;
            }
            (1i32 << min_lvl) as f32 * template.interp(local)
        } else {
            let template = &self.fields[(freq_lvl.x - freq_lvl.y) as usize];
            let local = Vec2::new(scale * d.y, scale * d.x);
            if !template.contains(local) {
                return Vec2::ZERO;
            }
            let r = -template.interp(local);
            (1i32 << min_lvl) as f32 * Vec2::new(r.y, r.x)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn templates() -> BasisTemplates {
        let mut config = SimulationConfig::default();
        config.template_res = 96;
        BasisTemplates::new(&config).unwrap()
    }

    #[test]
    fn rejects_unsupported_ratio() {
        let mut config = SimulationConfig::default();
        config.max_aniso_lvl = MAX_SUPPORTED_ANISO + 1;
        assert!(matches!(
            BasisTemplates::new(&config),
            Err(EigenfluidError::UnsupportedAnisotropy { .. })
        ));
    }

    #[test]
    fn zero_outside_support() {
        let t = templates();
        let v = t.evaluate(Vec2::new(0.6, 0.0), IVec2::new(0, 0), Vec2::ZERO);
        assert_eq!(v, Vec2::ZERO);
        // level (0,1) support is half as tall
        let v = t.evaluate(Vec2::new(0.0, 0.3), IVec2::new(0, 1), Vec2::ZERO);
        assert_eq!(v, Vec2::ZERO);
    }

    #[test]
    fn nonzero_inside_support() {
        let t = templates();
        let v = t.evaluate(Vec2::new(0.1, 0.05), IVec2::new(0, 0), Vec2::ZERO);
        assert!(v.length() > 1e-4, "interior evaluation came out zero: {v:?}");
    }

    #[test]
    fn antisymmetric_under_axis_swap() {
        let t = templates();
        let p = Vec2::new(0.13, 0.07);
        let a = t.evaluate(p, IVec2::new(1, 0), Vec2::ZERO);
        let b = t.evaluate(Vec2::new(p.y, p.x), IVec2::new(0, 1), Vec2::ZERO);
        let expected = -Vec2::new(b.y, b.x);
        assert!(
            (a - expected).length() < 1e-5,
            "swap antisymmetry violated: {a:?} vs {expected:?}"
        );
    }

    #[test]
    fn tangential_at_support_edge() {
        let t = templates();
        // eigenflows vanish normal to the box edge; x component must be ~0
        // on the vertical edges of the support
        let v = t.evaluate(Vec2::new(0.5, 0.1), IVec2::new(0, 0), Vec2::ZERO);
        assert!(v.x.abs() < 1e-3, "normal flow through support edge: {v:?}");
    }
}
