// ─────────────────────────────────────────────────────────────────────
// φⁿ Resonance Kernel — Energy/Force Evaluator
// ─────────────────────────────────────────────────────────────────────
//! Signed corrective force over the tuning exponent n (positive force
//! increases n), as the sum of three terms:
//!
//!   F_phi(n) = 2πA·sin(2πn)                       E_phi = A·cos(2πn)
//!   F_rat(n) = −B·dχ_rat/dr · r·ln φ,  r = φⁿ      E_rat = B·χ_rat(φⁿ)
//!   F_cat(n) = w·(K·clamp((t − n)/ramp, ±1) − F_phi(n))   inside escape bands
//!
//! The catastrophe term cancels the φ pull inside a band and replaces it
//! with a bounded pull toward the band's quarter-integer fallback `t`.
//! All terms are baked into Q4.14 tables at build time; evaluation is
//! interpolation plus saturating adds.

use std::f64::consts::TAU;

use resonance_types::{
    ForceBreakdown, FrequencyRatio, LandscapeConfig, Q14, ResonanceError, ResonanceResult,
};

use crate::grid::UniformGrid;
use crate::params::{ratio_of_exponent, LN_PHI};
use crate::susceptibility::SusceptibilityModel;
use crate::zones::{build_escape_bands, EscapeBand};

/// Huber penalty with knee `delta`; its derivative is `clamp(x/δ, ±1)`.
fn huber(x: f64, delta: f64) -> f64 {
    if x.abs() <= delta {
        x * x / (2.0 * delta)
    } else {
        x.abs() - delta / 2.0
    }
}

/// Closed-form terms, only alive while baking.
struct Terms<'a> {
    model: &'a SusceptibilityModel,
    cfg: &'a LandscapeConfig,
    bands: &'a [EscapeBand],
}

impl Terms<'_> {
    fn phi_energy(&self, n: f64) -> f64 {
        self.cfg.phi_amplitude * (TAU * n).cos()
    }

    fn phi_force(&self, n: f64) -> f64 {
        TAU * self.cfg.phi_amplitude * (TAU * n).sin()
    }

    fn rational_force(&self, n: f64) -> f64 {
        let r = ratio_of_exponent(n);
        -self.cfg.rational_gain * self.model.rational_slope(r) * r * LN_PHI
    }

    fn rational_energy(&self, n: f64) -> f64 {
        self.cfg.rational_gain * self.model.rational_chi(ratio_of_exponent(n))
    }

    fn influence(&self, n: f64) -> Option<(f64, f64)> {
        self.bands
            .iter()
            .find_map(|b| b.influence(n, self.cfg.taper))
    }

    fn catastrophe_force(&self, n: f64) -> f64 {
        match self.influence(n) {
            Some((w, t)) => {
                let pull = ((t - n) / self.cfg.capture_ramp).clamp(-1.0, 1.0);
                w * (self.cfg.catastrophe_strength * pull - self.phi_force(n))
            }
            None => 0.0,
        }
    }

    fn catastrophe_energy(&self, n: f64) -> f64 {
        match self.influence(n) {
            Some((w, t)) => {
                w * (self.cfg.catastrophe_strength * huber(n - t, self.cfg.capture_ramp)
                    + self.phi_energy(t)
                    - self.phi_energy(n))
            }
            None => 0.0,
        }
    }

    fn energy(&self, n: f64) -> f64 {
        self.cfg.phi_amplitude + self.phi_energy(n) + self.rational_energy(n) + self.catastrophe_energy(n)
    }
}

/// Baked force and energy tables over the exponent domain.
#[derive(Debug, Clone)]
pub struct ForceLandscape {
    grid: UniformGrid,
    phi: Vec<Q14>,
    rational: Vec<Q14>,
    catastrophe: Vec<Q14>,
    energy: Vec<Q14>,
    ratio: Vec<Q14>,
    bands: Vec<EscapeBand>,
}

impl ForceLandscape {
    /// Bake every term and verify the catastrophe term inside each zone:
    /// it must dominate the φ term and the net force must point at the
    /// zone's escape target.
    pub fn build(model: &SusceptibilityModel, cfg: &LandscapeConfig) -> ResonanceResult<Self> {
        let grid = UniformGrid::from_range(cfg.n_min, cfg.n_max, cfg.step_raw);
        if grid.len() < 2 {
            return Err(ResonanceError::Landscape(format!(
                "need at least 2 samples, got {}",
                grid.len()
            )));
        }
        let bands = build_escape_bands(model.zones(), cfg.n_min, cfg.n_max, cfg.taper, |n| {
            model.chi(ratio_of_exponent(n))
        })?;
        let terms = Terms {
            model,
            cfg,
            bands: &bands,
        };

        let len = grid.len();
        let mut phi = Vec::with_capacity(len);
        let mut rational = Vec::with_capacity(len);
        let mut catastrophe = Vec::with_capacity(len);
        let mut energy = Vec::with_capacity(len);
        let mut ratio = Vec::with_capacity(len);
        for i in 0..len {
            let n = grid.point(i).to_f64();
            let values = [
                terms.phi_force(n),
                terms.rational_force(n),
                terms.catastrophe_force(n),
                terms.energy(n),
            ];
            if values.iter().any(|v| !v.is_finite()) {
                return Err(ResonanceError::Numerical(format!(
                    "non-finite landscape term at n = {n:.6}: {values:?}"
                )));
            }
            let e = values[3];
            if e < -1e-9 {
                return Err(ResonanceError::Landscape(format!(
                    "energy proxy negative at n = {n:.6}: {e:.6}"
                )));
            }
            phi.push(Q14::from_f64(values[0]));
            rational.push(Q14::from_f64(values[1]));
            catastrophe.push(Q14::from_f64(values[2]));
            energy.push(Q14::from_f64(e.max(0.0)));
            ratio.push(Q14::from_f64(ratio_of_exponent(n)));
        }

        let landscape = Self {
            grid,
            phi,
            rational,
            catastrophe,
            energy,
            ratio,
            bands,
        };
        landscape.verify_zones(model)?;
        landscape.verify_equilibria(cfg)?;
        log::info!(
            "force landscape baked: {} samples over n ∈ [{}, {}], {} escape band(s)",
            len,
            landscape.grid.start(),
            landscape.grid.end(),
            landscape.bands.len()
        );
        Ok(landscape)
    }

    fn verify_zones(&self, model: &SusceptibilityModel) -> ResonanceResult<()> {
        for band in &self.bands {
            let Some(zone) = model.zones().get(band.zone) else {
                continue;
            };
            for i in 0..self.grid.len() {
                let n = self.grid.point(i).to_f64();
                if !zone.contains_exponent(n) {
                    continue;
                }
                let phi = self.phi[i];
                let cat = self.catastrophe[i];
                if cat.abs() <= phi.abs() {
                    return Err(ResonanceError::Landscape(format!(
                        "zone {}: catastrophe force {cat} does not dominate φ force {phi} at n = {n:.4}",
                        zone.label
                    )));
                }
                let total = phi
                    .saturating_add(self.rational[i])
                    .saturating_add(cat);
                let toward = band.target(n) - n;
                if toward.abs() > 1e-3 && (total.signum() as f64) * toward <= 0.0 {
                    return Err(ResonanceError::Landscape(format!(
                        "zone {}: net force {total} at n = {n:.4} does not point at fallback {:.2}",
                        zone.label,
                        band.target(n)
                    )));
                }
            }
        }
        Ok(())
    }

    /// Outside every escape band the net force must point at the nearest
    /// half-integer, and each integer may hold at most one sign change.
    /// Samples within `equilibrium_tolerance` of an integer or half-integer
    /// are exempt from the sign rule.
    fn verify_equilibria(&self, cfg: &LandscapeConfig) -> ResonanceResult<()> {
        let tol = cfg.equilibrium_tolerance;
        let shielded = |n: f64| {
            self.bands
                .iter()
                .any(|b| n >= b.outer_lo(cfg.taper) && n <= b.outer_hi(cfg.taper))
        };
        // (integer, sign of the last nonzero force, crossings so far)
        let mut window: Option<(f64, i32, u32)> = None;
        for i in 0..self.grid.len() {
            let n = self.grid.point(i).to_f64();
            if shielded(n) {
                continue;
            }
            let total = self.phi[i]
                .saturating_add(self.rational[i])
                .saturating_add(self.catastrophe[i]);
            let sign = total.signum();
            let k = n.round();
            let h = n.floor() + 0.5;
            if (n - k).abs() <= tol {
                let (at, last, crossings) = match window {
                    Some(w) if w.0 == k => w,
                    _ => (k, 0, 0),
                };
                let crossings = if sign != 0 && last != 0 && sign != last {
                    crossings + 1
                } else {
                    crossings
                };
                if crossings > 1 {
                    return Err(ResonanceError::Landscape(format!(
                        "force changes sign {crossings} times near n = {k}; lower landscape.rational_gain"
                    )));
                }
                window = Some((at, if sign != 0 { sign } else { last }, crossings));
                continue;
            }
            if (n - h).abs() <= tol {
                continue;
            }
            let want = if h > n { 1 } else { -1 };
            if sign != want {
                return Err(ResonanceError::Landscape(format!(
                    "net force {total} at n = {n:.4} points away from attractor {h}; lower landscape.rational_gain"
                )));
            }
        }
        Ok(())
    }

    /// Force at `n`. Out-of-domain `n` is evaluated at the nearest edge.
    #[inline]
    pub fn force(&self, n: Q14) -> ForceBreakdown {
        let phi = self.grid.interpolate(&self.phi, n);
        let rational = self.grid.interpolate(&self.rational, n);
        let catastrophe = self.grid.interpolate(&self.catastrophe, n);
        let (partial, sat_a) = phi.overflowing_add(rational);
        let (total, sat_b) = partial.overflowing_add(catastrophe);
        ForceBreakdown {
            phi,
            rational,
            catastrophe,
            total,
            saturated: sat_a || sat_b,
        }
    }

    /// Non-negative energy proxy at `n`; lower = more stable.
    #[inline]
    pub fn energy(&self, n: Q14) -> Q14 {
        self.grid.interpolate(&self.energy, n)
    }

    /// φⁿ as a ratio (saturates above φ^4.32 ≈ 8).
    #[inline]
    pub fn ratio_of(&self, n: Q14) -> FrequencyRatio {
        FrequencyRatio::new(self.grid.interpolate(&self.ratio, n))
    }

    #[inline]
    pub fn clamp(&self, n: Q14) -> (Q14, bool) {
        self.grid.clamp(n)
    }

    pub fn domain(&self) -> (Q14, Q14) {
        (self.grid.start(), self.grid.end())
    }

    pub fn len(&self) -> usize {
        self.grid.len()
    }

    pub fn is_empty(&self) -> bool {
        self.grid.is_empty()
    }

    pub fn bands(&self) -> &[EscapeBand] {
        &self.bands
    }

    /// Escape target governing `n`, if `n` is inside a band (tapers excluded).
    pub fn escape_target(&self, n: Q14) -> Option<Q14> {
        let x = n.to_f64();
        self.bands
            .iter()
            .find(|b| x >= b.lo && x <= b.hi)
            .map(|b| Q14::from_f64(b.target(x)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use resonance_types::EngineConfig;

    use crate::zones::ZoneSet;

    fn model(cfg: &EngineConfig) -> SusceptibilityModel {
        SusceptibilityModel::new(cfg, ZoneSet::from_config(&cfg.zones))
    }

    fn build_default() -> ForceLandscape {
        let cfg = EngineConfig::default();
        ForceLandscape::build(&model(&cfg), &cfg.landscape).unwrap()
    }

    fn f(land: &ForceLandscape, n: f64) -> f64 {
        land.force(Q14::from_f64(n)).total.to_f64()
    }

    #[test]
    fn test_grid_covers_domain() {
        let land = build_default();
        assert_eq!(land.len(), 6145);
        assert_eq!(land.domain(), (Q14::from_f64(-1.5), Q14::from_f64(4.5)));
    }

    #[test]
    fn test_attractor_force_near_zero() {
        let land = build_default();
        let at = land.force(Q14::from_f64(0.5));
        assert!(at.total.to_f64().abs() < 0.15, "F(0.5) = {}", at.total);
        assert_eq!(at.catastrophe, Q14::ZERO);
        assert!(at.phi.raw().abs() <= 1, "φ term at attractor {}", at.phi);
        // rational perturbers shift the equilibrium off 0.5
        assert_ne!(at.total, Q14::ZERO);
    }

    #[test]
    fn test_sign_convention_around_half_integer() {
        let land = build_default();
        for k in 300..=490 {
            let n = k as f64 / 1000.0;
            assert!(f(&land, n) > 0.0, "F({n}) = {} should be positive", f(&land, n));
        }
        for k in 520..=700 {
            let n = k as f64 / 1000.0;
            assert!(f(&land, n) < 0.0, "F({n}) = {} should be negative", f(&land, n));
        }
    }

    #[test]
    fn test_phi_term_antisymmetric_about_attractor() {
        let land = build_default();
        let centre = Q14::from_f64(2.5).raw();
        for d in [16, 160, 1600, 3200] {
            let up = land.force(Q14::from_raw(centre + d)).phi;
            let down = land.force(Q14::from_raw(centre - d)).phi;
            assert_eq!(up, down.saturating_neg(), "d={d}");
        }
    }

    #[test]
    fn test_force_grows_with_distance_from_attractor() {
        let land = build_default();
        let mut prev = 0;
        for k in 0..=240 {
            let v = land.force(Q14::from_f64(3.5 + k as f64 / 1000.0)).total.raw().abs();
            assert!(v + 1 >= prev, "|F| dropped at n = {}", 3.5 + k as f64 / 1000.0);
            prev = v;
        }
    }

    #[test]
    fn test_integer_equilibrium_small_but_not_required_zero() {
        let land = build_default();
        assert!(f(&land, 1.0).abs() < 0.1, "F(1.0) = {}", f(&land, 1.0));
        assert!(f(&land, 0.0).abs() < 0.01, "F(0.0) = {}", f(&land, 0.0));
    }

    #[test]
    fn test_catastrophe_dominates_inside_zones() {
        let land = build_default();
        let cfg = EngineConfig::default();
        let zones = ZoneSet::from_config(&cfg.zones);
        for zone in zones.iter() {
            let steps = 200;
            for k in 0..=steps {
                let n = zone.n_lower + (zone.n_upper - zone.n_lower) * k as f64 / steps as f64;
                // snap onto a baked sample; between the two samples that
                // straddle a tie point the interpolated force crosses zero
                let q = Q14::from_raw(Q14::from_f64(n).raw() & !15);
                if !zone.contains_exponent(q.to_f64()) {
                    continue;
                }
                let fb = land.force(q);
                assert!(
                    fb.catastrophe.abs() > fb.phi.abs(),
                    "zone {} n={n}: |cat| {} <= |phi| {}",
                    zone.label,
                    fb.catastrophe,
                    fb.phi
                );
                let target = land.escape_target(q).unwrap();
                assert_eq!(
                    fb.total.signum(),
                    (target.raw() - q.raw()).signum(),
                    "zone {} n={n}: force {} target {}",
                    zone.label,
                    fb.total,
                    target
                );
            }
        }
    }

    #[test]
    fn test_blocked_attractor_escapes_to_quarter() {
        let land = build_default();
        // n = 1.5 (ratio ≈ 2.058) sits in the 2:1 zone.
        assert!(f(&land, 1.5) < -1.0, "F(1.5) = {}", f(&land, 1.5));
        assert_eq!(land.escape_target(Q14::from_f64(1.5)), Some(Q14::from_f64(1.25)));
        assert!(f(&land, 1.52) > 1.0, "F(1.52) = {}", f(&land, 1.52));
        assert_eq!(land.escape_target(Q14::from_f64(2.3)), Some(Q14::from_f64(2.5)));
        assert_eq!(land.escape_target(Q14::from_f64(2.85)), Some(Q14::from_f64(2.75)));
    }

    #[test]
    fn test_energy_non_negative_and_lower_at_attractor() {
        let land = build_default();
        for i in 0..land.len() {
            let n = Q14::from_raw(land.domain().0.raw() + i as i32 * 16);
            assert!(land.energy(n) >= Q14::ZERO);
        }
        assert!(land.energy(Q14::from_f64(0.5)) < land.energy(Q14::ZERO));
        assert!(land.energy(Q14::from_f64(1.25)) < land.energy(Q14::from_f64(1.45)));
    }

    #[test]
    fn test_force_is_deterministic() {
        let land = build_default();
        for raw in [-20000, 0, 8191, 24600, 47000] {
            let n = Q14::from_raw(raw);
            assert_eq!(land.force(n), land.force(n));
            assert_eq!(land.energy(n), land.energy(n));
        }
    }

    #[test]
    fn test_out_of_domain_evaluated_at_edge() {
        let land = build_default();
        let (lo, hi) = land.domain();
        assert_eq!(land.force(Q14::from_f64(-3.0)), land.force(lo));
        assert_eq!(land.force(Q14::from_f64(7.0)), land.force(hi));
        assert!(land.clamp(Q14::from_f64(-3.0)).1);
    }

    #[test]
    fn test_ratio_of_exponent() {
        let land = build_default();
        assert_eq!(land.ratio_of(Q14::ZERO), FrequencyRatio::UNITY);
        let r = land.ratio_of(Q14::from_f64(1.5)).to_f64();
        assert!((r - 2.058171).abs() < 1e-3, "φ^1.5 = {r}");
        assert_eq!(land.ratio_of(Q14::from_f64(4.5)).value(), Q14::MAX);
    }

    #[test]
    fn test_force_points_at_half_integer_outside_bands() {
        let cfg = EngineConfig::default();
        let land = build_default();
        let tol = cfg.landscape.equilibrium_tolerance;
        let (lo, _) = land.domain();
        for i in 0..land.len() {
            let q = Q14::from_raw(lo.raw() + i as i32 * 16);
            let n = q.to_f64();
            let shielded = land.bands().iter().any(|b| {
                n >= b.outer_lo(cfg.landscape.taper) && n <= b.outer_hi(cfg.landscape.taper)
            });
            let h = n.floor() + 0.5;
            if shielded || (n - n.round()).abs() <= tol || (n - h).abs() <= tol {
                continue;
            }
            let total = land.force(q).total;
            assert_eq!(
                total.signum(),
                if h > n { 1 } else { -1 },
                "F({n}) = {total} does not point at {h}"
            );
        }
    }

    #[test]
    fn test_single_crossing_near_integers() {
        let land = build_default();
        for k in -1..=4 {
            let centre = Q14::from_f64(k as f64).raw();
            let mut last = 0;
            let mut crossings = 0;
            for d in (-320..=320).step_by(16) {
                let sign = land.force(Q14::from_raw(centre + d)).total.signum();
                if sign != 0 {
                    if last != 0 && sign != last {
                        crossings += 1;
                    }
                    last = sign;
                }
            }
            assert!(crossings <= 1, "{crossings} sign changes near n = {k}");
        }
    }

    #[test]
    fn test_integer_start_is_not_held() {
        let land = build_default();
        // L4 spiny starts at n = 3.0; it must be pushed toward 2.75
        assert!(f(&land, 3.0) < -0.01, "F(3.0) = {}", f(&land, 3.0));
        assert!(f(&land, 2.0) > 0.0, "F(2.0) = {}", f(&land, 2.0));
        assert!(f(&land, 1.0) > 0.0, "F(1.0) = {}", f(&land, 1.0));
    }

    #[test]
    fn test_strong_rational_gain_rejected() {
        let mut cfg = EngineConfig::default();
        cfg.landscape.rational_gain = 0.05;
        match ForceLandscape::build(&model(&cfg), &cfg.landscape) {
            Err(ResonanceError::Landscape(msg)) => {
                assert!(msg.contains("rational_gain"), "{msg}")
            }
            other => panic!("expected landscape error, got {other:?}"),
        }
    }

    #[test]
    fn test_weak_catastrophe_strength_rejected() {
        let mut cfg = EngineConfig::default();
        cfg.landscape.catastrophe_strength = 1.2;
        let err = ForceLandscape::build(&model(&cfg), &cfg.landscape);
        assert!(matches!(err, Err(ResonanceError::Landscape(_))), "{err:?}");
    }
}
