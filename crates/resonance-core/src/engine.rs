// ─────────────────────────────────────────────────────────────────────
// φⁿ Resonance Kernel — Resonance Engine
// ─────────────────────────────────────────────────────────────────────
//! Immutable bundle of everything baked from an [`EngineConfig`]: the χ
//! table, the force landscape, the classifier, and the integrator gains.
//!
//! Built once, then shared by reference (or `Arc`) across every
//! oscillator and every correction loop. Nothing here mutates after
//! [`ResonanceEngine::build`] returns.

use resonance_physics::{
    ForceLandscape, PositionClassifier, SusceptibilityModel, SusceptibilityTable, ZoneSet,
};
use resonance_types::{
    ChiLookup, Classification, EngineConfig, ForceBreakdown, FrequencyRatio, Q14,
    ResonanceResult, ZoneFlags,
};

#[derive(Debug, Clone)]
pub struct ResonanceEngine {
    config: EngineConfig,
    zones: ZoneSet,
    table: SusceptibilityTable,
    landscape: ForceLandscape,
    classifier: PositionClassifier,
    gain: Q14,
    delta_max: Q14,
}

impl ResonanceEngine {
    /// Validate `config` and bake all tables. Any failure is fatal.
    pub fn build(config: EngineConfig) -> ResonanceResult<Self> {
        config.validate()?;
        let zones = ZoneSet::from_config(&config.zones);
        let model = SusceptibilityModel::new(&config, zones.clone());
        let table = SusceptibilityTable::build(&model, &config.table)?;
        let landscape = ForceLandscape::build(&model, &config.landscape)?;
        let classifier = PositionClassifier::new(&config.classifier, &zones);
        let gain = Q14::from_f64(config.correction.gain);
        let delta_max = Q14::from_f64(config.correction.delta_max);
        log::info!(
            "resonance engine ready: {} zone(s), gain {gain}, Δ_max {delta_max}",
            zones.len()
        );
        Ok(Self {
            config,
            zones,
            table,
            landscape,
            classifier,
            gain,
            delta_max,
        })
    }

    pub fn with_defaults() -> ResonanceResult<Self> {
        Self::build(EngineConfig::default())
    }

    pub fn from_json(json: &str) -> ResonanceResult<Self> {
        Self::build(EngineConfig::from_json(json)?)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn table(&self) -> &SusceptibilityTable {
        &self.table
    }

    pub fn landscape(&self) -> &ForceLandscape {
        &self.landscape
    }

    pub fn classifier(&self) -> &PositionClassifier {
        &self.classifier
    }

    pub fn zones(&self) -> &ZoneSet {
        &self.zones
    }

    /// χ and coarse band; out-of-domain ratios are clamped and flagged.
    #[inline]
    pub fn lookup(&self, ratio: FrequencyRatio) -> ChiLookup {
        self.table.lookup(ratio)
    }

    #[inline]
    pub fn force(&self, n: Q14) -> ForceBreakdown {
        self.landscape.force(n)
    }

    #[inline]
    pub fn energy(&self, n: Q14) -> Q14 {
        self.landscape.energy(n)
    }

    /// φⁿ from the baked landscape.
    #[inline]
    pub fn ratio_of(&self, n: Q14) -> FrequencyRatio {
        self.landscape.ratio_of(n)
    }

    /// Classify `n` at its own ratio φⁿ.
    #[inline]
    pub fn classify(&self, n: Q14) -> Classification {
        self.classify_at(n, self.ratio_of(n))
    }

    /// Classify `n` at an externally measured ratio.
    #[inline]
    pub fn classify_at(&self, n: Q14, ratio: FrequencyRatio) -> Classification {
        self.classifier.classify(n, ratio, self.table.lookup(ratio).band)
    }

    #[inline]
    pub fn near_catastrophe(&self, ratio: FrequencyRatio) -> ZoneFlags {
        self.zones.flags(ratio)
    }

    /// Flag bit of the zone labelled e.g. `"2:1"`.
    pub fn zone_index(&self, label: &str) -> Option<usize> {
        self.zones.index_of(label)
    }

    pub fn zone_labels(&self) -> impl Iterator<Item = &str> {
        self.zones.iter().map(|z| z.label.as_str())
    }

    pub fn gain(&self) -> Q14 {
        self.gain
    }

    pub fn delta_max(&self) -> Q14 {
        self.delta_max
    }

    /// Bounded increment `clamp(gain · force, ±Δ_max)`. The flag reports
    /// whether the product saturated before clamping.
    #[inline]
    pub fn increment(&self, force: Q14) -> (Q14, bool) {
        let (scaled, saturated) = self.gain.overflowing_mul(force);
        (
            scaled.clamp(self.delta_max.saturating_neg(), self.delta_max),
            saturated,
        )
    }

    /// [`increment`](Self::increment) with the sub-LSB remainder of the
    /// product kept in `carry` (units of 2⁻²⁸) and fed into the next call,
    /// so forces too small to move n by one raw step still add up.
    #[inline]
    pub fn increment_carried(&self, force: Q14, carry: &mut i32) -> (Q14, bool) {
        const HALF_LSB: i64 = 1 << (Q14::FRAC_BITS - 1);
        let (_, saturated) = self.gain.overflowing_mul(force);
        let limit = (self.delta_max.raw() as i64) << Q14::FRAC_BITS;
        let product = (self.gain.raw() as i64 * force.raw() as i64).clamp(-limit, limit);
        let acc = product + *carry as i64;
        let step = (acc + HALF_LSB) >> Q14::FRAC_BITS;
        *carry = (acc - (step << Q14::FRAC_BITS)) as i32;
        (Q14::from_raw(step as i32), saturated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use resonance_types::{ChiBand, PositionClass, ResonanceError};

    #[test]
    fn test_build_defaults() {
        let engine = ResonanceEngine::with_defaults().unwrap();
        assert_eq!(engine.table().len(), 4097);
        assert_eq!(engine.landscape().len(), 6145);
        assert_eq!(engine.gain().raw(), 66);
        assert_eq!(engine.delta_max().raw(), 131);
        assert_eq!(engine.zone_labels().collect::<Vec<_>>(), vec!["2:1", "3:1", "4:1"]);
    }

    #[test]
    fn test_invalid_config_aborts_build() {
        let mut cfg = EngineConfig::default();
        cfg.rational.widths[0] = -0.06;
        assert!(matches!(
            ResonanceEngine::build(cfg),
            Err(ResonanceError::Config(_))
        ));
    }

    #[test]
    fn test_from_json() {
        let engine =
            ResonanceEngine::from_json(r#"{"correction": {"gain": 0.002, "delta_max": 0.004}}"#)
                .unwrap();
        assert_eq!(engine.delta_max(), Q14::from_f64(0.004));
        assert!(ResonanceEngine::from_json("{\"zones\": 3}").is_err());
    }

    #[test]
    fn test_ratio_two_scenario() {
        let engine = ResonanceEngine::with_defaults().unwrap();
        let ratio = FrequencyRatio::from_frequencies(Q14::from_raw(32768), Q14::from_raw(16384));
        let hit = engine.lookup(ratio);
        assert!(engine.table().normalized(hit.chi) > 0.85);
        assert_eq!(hit.band, ChiBand::Boundary);
        let class = engine.classify_at(Q14::ONE, ratio);
        assert_eq!(class.class, PositionClass::NearCatastrophe);
        let k = engine.zone_index("2:1").unwrap();
        assert!(engine.near_catastrophe(ratio).contains(k));
    }

    #[test]
    fn test_attractor_scenario() {
        let engine = ResonanceEngine::with_defaults().unwrap();
        let n = Q14::HALF;
        assert!(engine.force(n).total.to_f64().abs() < 0.15);
        assert_eq!(engine.classify(n).class, PositionClass::HalfInteger);
    }

    #[test]
    fn test_increment_rate_limited() {
        let engine = ResonanceEngine::with_defaults().unwrap();
        let (d, sat) = engine.increment(Q14::from_f64(3.0));
        assert_eq!(d, engine.delta_max());
        assert!(!sat);
        let (d, _) = engine.increment(Q14::from_f64(-3.0));
        assert_eq!(d, engine.delta_max().saturating_neg());
        let (d, _) = engine.increment(Q14::from_f64(0.5));
        assert_eq!(d.raw(), 33);
    }

    #[test]
    fn test_increment_carried_accumulates_small_forces() {
        let engine = ResonanceEngine::with_defaults().unwrap();
        let force = Q14::from_f64(0.005);
        assert_eq!(engine.increment(force).0, Q14::ZERO);
        let mut carry = 0;
        let mut moved = 0;
        for _ in 0..300 {
            let (d, sat) = engine.increment_carried(force, &mut carry);
            assert!(!sat);
            assert!(d.raw().abs() <= 1);
            moved += d.raw();
        }
        let expected = 300.0 * (66 * force.raw()) as f64 / 16384.0;
        assert!((moved as f64 - expected).abs() <= 1.0, "moved {moved}, expected {expected}");
        assert!(carry.abs() <= 8192);
    }

    #[test]
    fn test_increment_carried_respects_rate_limit() {
        let engine = ResonanceEngine::with_defaults().unwrap();
        let mut carry = 8191;
        let (d, _) = engine.increment_carried(Q14::from_f64(5.0), &mut carry);
        assert_eq!(d, engine.delta_max());
        let mut carry = -8192;
        let (d, _) = engine.increment_carried(Q14::from_f64(-5.0), &mut carry);
        assert_eq!(d, engine.delta_max().saturating_neg());
        let mut carry = 0;
        let (d, _) = engine.increment_carried(Q14::from_f64(0.5), &mut carry);
        assert_eq!(d, engine.increment(Q14::from_f64(0.5)).0);
    }

    #[test]
    fn test_integer_boundary_only_above_transition() {
        let engine = ResonanceEngine::with_defaults().unwrap();
        let (lo, hi) = engine.landscape().domain();
        let mut integers = 0;
        let mut raw = lo.raw();
        while raw <= hi.raw() {
            let n = Q14::from_raw(raw);
            let ratio = engine.ratio_of(n);
            if engine.classify(n).class == PositionClass::IntegerBoundary {
                integers += 1;
                let chi = engine.lookup(ratio).chi;
                assert!(
                    chi >= engine.table().transition_threshold(),
                    "n = {n}: IntegerBoundary with χ {chi} in the Stable band"
                );
            }
            raw += 4;
        }
        assert!(integers > 0);
        // exact integers at their own ratio
        assert_ne!(engine.classify(Q14::ONE).class, PositionClass::IntegerBoundary);
        assert_ne!(
            engine.classify(Q14::from_f64(-1.0)).class,
            PositionClass::IntegerBoundary
        );
    }

    #[test]
    fn test_independent_engines_do_not_alias() {
        let a = ResonanceEngine::with_defaults().unwrap();
        let mut cfg = EngineConfig::default();
        cfg.landscape.phi_amplitude = 0.1;
        let b = ResonanceEngine::build(cfg).unwrap();
        let n = Q14::from_f64(0.3);
        assert_ne!(a.force(n).phi, b.force(n).phi);
        assert_eq!(a.force(n), ResonanceEngine::with_defaults().unwrap().force(n));
    }
}
