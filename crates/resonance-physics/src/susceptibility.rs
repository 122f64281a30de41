// ─────────────────────────────────────────────────────────────────────
// φⁿ Resonance Kernel — Susceptibility Table Builder + Lookup
// ─────────────────────────────────────────────────────────────────────
//! χ(r): how strongly a frequency ratio resonates with a boundary
//! configuration. Higher = less stable.
//!
//!   χ(r) = baseline
//!        + Σ_{p/q} (1/q²)·L(r − p/q, w_q)          rational peaks
//!        − Σ_{φⁿ}  w_φ·L(r − φⁿ, w_φ)              φ wells
//!        + Σ_zone  w_c·L_asym(r − c, w_below, w_above)
//!
//! [`SusceptibilityModel`] evaluates the closed form in `f64` and is only
//! used while building. [`SusceptibilityTable`] holds the baked Q4.14
//! samples and serves O(1), allocation-free lookups.

use serde::{Deserialize, Serialize};

use resonance_types::{
    ChiBand, ChiLookup, EngineConfig, FrequencyRatio, Q14, ResonanceError, ResonanceResult,
    TableConfig,
};

use crate::attractors::{enumerate_phi, enumerate_rationals, PhiAttractor, RationalAttractor};
use crate::grid::UniformGrid;
use crate::zones::ZoneSet;

/// Closed-form χ(r) over the configured attractor sets.
#[derive(Debug, Clone)]
pub struct SusceptibilityModel {
    rationals: Vec<RationalAttractor>,
    phis: Vec<PhiAttractor>,
    zones: ZoneSet,
    baseline: f64,
    catastrophe_weight: f64,
    catastrophe_falloff: f64,
}

impl SusceptibilityModel {
    pub fn new(config: &EngineConfig, zones: ZoneSet) -> Self {
        Self {
            rationals: enumerate_rationals(
                &config.rational,
                config.table.ratio_min,
                config.table.ratio_max,
            ),
            phis: enumerate_phi(&config.phi),
            zones,
            baseline: config.table.baseline,
            catastrophe_weight: config.table.catastrophe_weight,
            catastrophe_falloff: config.table.catastrophe_falloff,
        }
    }

    pub fn rationals(&self) -> &[RationalAttractor] {
        &self.rationals
    }

    pub fn phis(&self) -> &[PhiAttractor] {
        &self.phis
    }

    pub fn zones(&self) -> &ZoneSet {
        &self.zones
    }

    /// Rational-resonance part of χ alone.
    pub fn rational_chi(&self, ratio: f64) -> f64 {
        self.rationals.iter().map(|a| a.contribution(ratio)).sum()
    }

    /// dχ_rat/dr.
    pub fn rational_slope(&self, ratio: f64) -> f64 {
        self.rationals.iter().map(|a| a.slope(ratio)).sum()
    }

    pub fn chi(&self, ratio: f64) -> f64 {
        let wells: f64 = self.phis.iter().map(|a| a.depth(ratio)).sum();
        let catastrophe: f64 = self
            .zones
            .iter()
            .map(|z| z.chi_contribution(ratio, self.catastrophe_weight, self.catastrophe_falloff))
            .sum();
        self.baseline + self.rational_chi(ratio) - wells + catastrophe
    }
}

/// Baked χ samples over a uniform ratio grid.
#[derive(Debug, Clone)]
pub struct SusceptibilityTable {
    grid: UniformGrid,
    samples: Vec<Q14>,
    min: Q14,
    max: Q14,
    argmin: usize,
    transition: Q14,
    boundary: Q14,
}

/// Summary of a built table, for logs and telemetry.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TableSummary {
    pub samples: usize,
    pub ratio_min: f64,
    pub ratio_max: f64,
    pub chi_min: f64,
    pub chi_max: f64,
    pub argmin_ratio: f64,
    pub transition: f64,
    pub boundary: f64,
}

impl SusceptibilityTable {
    /// Evaluate χ on every grid point and convert once to Q4.14.
    ///
    /// Fails on non-finite or negative samples, on a flat table (no
    /// usable χ range for the coarse bands), and on a zone whose two sides
    /// differ by less than `cfg.min_asymmetry`.
    pub fn build(model: &SusceptibilityModel, cfg: &TableConfig) -> ResonanceResult<Self> {
        let grid = UniformGrid::from_range(cfg.ratio_min, cfg.ratio_max, cfg.step_raw);
        if grid.len() < 2 {
            return Err(ResonanceError::Table(format!(
                "need at least 2 samples, got {}",
                grid.len()
            )));
        }

        let mut samples = Vec::with_capacity(grid.len());
        for i in 0..grid.len() {
            let r = grid.point(i).to_f64();
            let chi = model.chi(r);
            if !chi.is_finite() {
                return Err(ResonanceError::Numerical(format!(
                    "χ({r:.6}) is not finite"
                )));
            }
            if chi < 0.0 {
                return Err(ResonanceError::Table(format!(
                    "χ({r:.6}) = {chi:.6} < 0; raise table.baseline or lower phi weights"
                )));
            }
            samples.push(Q14::from_f64(chi));
        }

        let (argmin, min) = samples
            .iter()
            .copied()
            .enumerate()
            .min_by_key(|&(_, v)| v)
            .ok_or_else(|| ResonanceError::Table("empty table".to_string()))?;
        let max = samples.iter().copied().max().unwrap_or(min);
        if max.raw() - min.raw() < 4 {
            return Err(ResonanceError::Table(format!(
                "flat table: χ range [{min}, {max}] cannot separate bands"
            )));
        }
        if min == Q14::MAX || max == Q14::MAX {
            log::warn!("χ table saturates the Q4.14 range; lower the attractor weights");
        }

        let span = (max.raw() - min.raw()) as f64;
        let threshold = |fraction: f64| Q14::from_raw(min.raw() + (span * fraction).round() as i32);
        let table = Self {
            transition: threshold(cfg.transition_fraction),
            boundary: threshold(cfg.boundary_fraction),
            grid,
            samples,
            min,
            max,
            argmin,
        };
        table.verify_asymmetry(model.zones(), cfg)?;
        let s = table.summary();
        log::info!(
            "χ table baked: {} samples over [{:.3}, {:.3}], χ ∈ [{:.4}, {:.4}], argmin r = {:.4}",
            s.samples,
            s.ratio_min,
            s.ratio_max,
            s.chi_min,
            s.chi_max,
            s.argmin_ratio
        );
        Ok(table)
    }

    /// Each zone must read differently from below than from above once
    /// baked. Zones whose sides fall off the grid are skipped.
    fn verify_asymmetry(&self, zones: &ZoneSet, cfg: &TableConfig) -> ResonanceResult<()> {
        let (lo, hi) = (self.grid.start().to_f64(), self.grid.end().to_f64());
        for zone in zones.iter() {
            let d = cfg.asymmetry_offset;
            if zone.center - d < lo || zone.center + d > hi {
                log::debug!("zone {} sides outside the χ grid, asymmetry unchecked", zone.label);
                continue;
            }
            let gap = self.asymmetry(zone.center, d);
            if gap.abs() < cfg.min_asymmetry {
                return Err(ResonanceError::Table(format!(
                    "zone {}: |χ(c − {d}) − χ(c + {d})| = {:.4} < {}",
                    zone.label,
                    gap.abs(),
                    cfg.min_asymmetry
                )));
            }
        }
        Ok(())
    }

    /// χ(c − d) − χ(c + d) read from the baked samples.
    pub fn asymmetry(&self, center: f64, d: f64) -> f64 {
        let at = |r: f64| self.lookup(FrequencyRatio::from_f64(r)).chi.to_f64();
        at(center - d) - at(center + d)
    }

    /// χ and coarse band at `ratio`, clamped to the table edges.
    #[inline]
    pub fn lookup(&self, ratio: FrequencyRatio) -> ChiLookup {
        let (r, clamped) = self.grid.clamp(ratio.value());
        let chi = self.grid.interpolate(&self.samples, r);
        ChiLookup {
            chi,
            band: self.band(chi),
            clamped,
        }
    }

    /// Coarse class of a χ value. Depends on nothing but the value.
    #[inline]
    pub fn band(&self, chi: Q14) -> ChiBand {
        if chi >= self.boundary {
            ChiBand::Boundary
        } else if chi >= self.transition {
            ChiBand::Transitional
        } else {
            ChiBand::Stable
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn min(&self) -> Q14 {
        self.min
    }

    pub fn max(&self) -> Q14 {
        self.max
    }

    pub fn argmin_ratio(&self) -> FrequencyRatio {
        FrequencyRatio::new(self.grid.point(self.argmin))
    }

    pub fn transition_threshold(&self) -> Q14 {
        self.transition
    }

    pub fn boundary_threshold(&self) -> Q14 {
        self.boundary
    }

    pub fn domain(&self) -> (FrequencyRatio, FrequencyRatio) {
        (
            FrequencyRatio::new(self.grid.start()),
            FrequencyRatio::new(self.grid.end()),
        )
    }

    /// Sample `i` as (ratio, χ).
    pub fn sample(&self, i: usize) -> Option<(FrequencyRatio, Q14)> {
        self.samples
            .get(i)
            .map(|&chi| (FrequencyRatio::new(self.grid.point(i)), chi))
    }

    /// Position of `chi` within the baked range, 0 at min, 1 at max.
    pub fn normalized(&self, chi: Q14) -> f64 {
        let span = (self.max.raw() - self.min.raw()) as f64;
        (chi.raw() - self.min.raw()) as f64 / span
    }

    pub fn summary(&self) -> TableSummary {
        let (lo, hi) = self.domain();
        TableSummary {
            samples: self.len(),
            ratio_min: lo.to_f64(),
            ratio_max: hi.to_f64(),
            chi_min: self.min.to_f64(),
            chi_max: self.max.to_f64(),
            argmin_ratio: self.argmin_ratio().to_f64(),
            transition: self.transition.to_f64(),
            boundary: self.boundary.to_f64(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::PHI;

    fn build_default() -> (SusceptibilityModel, SusceptibilityTable) {
        let cfg = EngineConfig::default();
        let model = SusceptibilityModel::new(&cfg, ZoneSet::from_config(&cfg.zones));
        let table = SusceptibilityTable::build(&model, &cfg.table).unwrap();
        (model, table)
    }

    fn norm_at(table: &SusceptibilityTable, r: f64) -> f64 {
        table.normalized(table.lookup(FrequencyRatio::from_f64(r)).chi)
    }

    #[test]
    fn test_table_size_and_domain() {
        let (_, table) = build_default();
        assert_eq!(table.len(), 4097);
        let (lo, hi) = table.domain();
        assert_eq!(lo.raw(), 8192);
        assert_eq!(hi.raw(), 73728);
    }

    #[test]
    fn test_chi_non_negative() {
        let (_, table) = build_default();
        assert!(table.min() >= Q14::ZERO, "min χ = {}", table.min());
    }

    #[test]
    fn test_global_minimum_at_optimal_fallback() {
        let (_, table) = build_default();
        let target = PHI.powf(1.25);
        let at = table.argmin_ratio().to_f64();
        assert!((at - target).abs() < 0.01, "argmin {at} vs φ^1.25 {target}");
        // strict: every sample away from the optimum is higher
        for i in 0..table.len() {
            let (r, chi) = table.sample(i).unwrap();
            if (r.to_f64() - target).abs() > 0.02 {
                assert!(chi > table.min(), "χ({r}) = {chi} ties the minimum");
            }
        }
    }

    #[test]
    fn test_integers_in_top_quartile() {
        let (_, table) = build_default();
        for r in [1.0, 2.0, 3.0, 4.0] {
            let v = norm_at(&table, r);
            assert!(v > 0.75, "χ({r}) normalized {v} not in top quartile");
        }
    }

    #[test]
    fn test_ratio_two_in_top_fifteen_percent() {
        let (_, table) = build_default();
        let hit = table.lookup(FrequencyRatio::from_raw(32768));
        assert!(table.normalized(hit.chi) > 0.85, "χ(2) = {}", hit.chi);
        assert_eq!(hit.band, ChiBand::Boundary);
        assert!(!hit.clamped);
    }

    #[test]
    fn test_half_integers_below_integers() {
        let (_, table) = build_default();
        for k in 1..4 {
            let whole = norm_at(&table, k as f64);
            let half = norm_at(&table, k as f64 + 0.5);
            assert!(half < whole, "χ({k}.5) = {half} not below χ({k}) = {whole}");
        }
    }

    #[test]
    fn test_catastrophe_asymmetry() {
        let cfg = EngineConfig::default();
        let (model, table) = build_default();
        assert_eq!(model.zones().len(), 3);
        for zone in model.zones().iter() {
            let gap = table.asymmetry(zone.center, cfg.table.asymmetry_offset);
            assert!(
                gap.abs() >= cfg.table.min_asymmetry,
                "zone {} sides differ by {gap}",
                zone.label
            );
        }
        let below = table.lookup(FrequencyRatio::from_f64(1.98)).chi;
        let above = table.lookup(FrequencyRatio::from_f64(2.02)).chi;
        assert!(below > above, "χ(1.98) = {below}, χ(2.02) = {above}");
    }

    #[test]
    fn test_weak_asymmetry_rejected() {
        let mut cfg = EngineConfig::default();
        cfg.table.min_asymmetry = 0.2;
        let model = SusceptibilityModel::new(&cfg, ZoneSet::from_config(&cfg.zones));
        match SusceptibilityTable::build(&model, &cfg.table) {
            Err(ResonanceError::Table(msg)) => assert!(msg.contains("zone"), "{msg}"),
            other => panic!("expected table error, got {other:?}"),
        }
    }

    #[test]
    fn test_summary_json_export() {
        let (_, table) = build_default();
        let summary = table.summary();
        let json = serde_json::to_string(&summary).unwrap();
        assert!(json.contains("argmin_ratio"));
        let back: TableSummary = serde_json::from_str(&json).unwrap();
        assert_eq!(back.samples, 4097);
        assert_eq!(back.argmin_ratio, summary.argmin_ratio);
    }

    #[test]
    fn test_lookup_exact_sample_is_idempotent() {
        let (_, table) = build_default();
        let (r, chi) = table.sample(1234).unwrap();
        let a = table.lookup(r);
        let b = table.lookup(r);
        assert_eq!(a.chi, chi);
        assert_eq!(a, b);
    }

    #[test]
    fn test_lookup_clamps_and_flags() {
        let (_, table) = build_default();
        let low = table.lookup(FrequencyRatio::from_f64(0.1));
        assert!(low.clamped);
        assert_eq!(low.chi, table.sample(0).unwrap().1);
        let high = table.lookup(FrequencyRatio::from_raw(Q14::MAX_RAW));
        assert!(high.clamped);
        assert_eq!(high.chi, table.sample(table.len() - 1).unwrap().1);
    }

    #[test]
    fn test_interpolation_tracks_model() {
        let (model, table) = build_default();
        for r in [0.77, 1.333, 2.71828, 3.9] {
            let got = table.lookup(FrequencyRatio::from_f64(r)).chi.to_f64();
            let want = model.chi(FrequencyRatio::from_f64(r).to_f64());
            assert!((got - want).abs() < 2e-3, "r={r} table {got} model {want}");
        }
    }

    #[test]
    fn test_band_consistent_with_value() {
        let (_, table) = build_default();
        for i in (0..table.len()).step_by(7) {
            let (_, chi) = table.sample(i).unwrap();
            let band = table.band(chi);
            match band {
                ChiBand::Boundary => assert!(chi >= table.boundary_threshold()),
                ChiBand::Transitional => {
                    assert!(chi >= table.transition_threshold() && chi < table.boundary_threshold())
                }
                ChiBand::Stable => assert!(chi < table.transition_threshold()),
            }
        }
    }

    #[test]
    fn test_negative_chi_rejected() {
        let mut cfg = EngineConfig::default();
        cfg.table.baseline = 0.0;
        let model = SusceptibilityModel::new(&cfg, ZoneSet::from_config(&cfg.zones));
        assert!(matches!(
            SusceptibilityTable::build(&model, &cfg.table),
            Err(ResonanceError::Table(_))
        ));
    }
}
