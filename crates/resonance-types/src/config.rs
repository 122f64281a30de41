// ─────────────────────────────────────────────────────────────────────
// φⁿ Resonance Kernel — Engine Configuration
// ─────────────────────────────────────────────────────────────────────
//! Build-time / startup-time configuration for the susceptibility table,
//! the force landscape, the position classifier, and the correction loop.
//!
//! None of these values change during normal operation. All of them are
//! validated before any table is baked; a bad value aborts construction.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::{ResonanceError, ResonanceResult};

/// Upper bound on configured catastrophe zones (one flag bit each).
pub const MAX_ZONES: usize = 16;

/// Largest representable Q4.14 magnitude.
const Q14_LIMIT: f64 = 8.0;

/// Farey-style rational attractors p/q, weight 1/q².
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RationalConfig {
    /// Largest denominator enumerated.
    pub q_max: u32,
    /// Lorentzian width per denominator (ratio units), index 0 = q=1.
    /// Must be positive and non-increasing in q.
    pub widths: Vec<f64>,
    /// Attractors within this distance outside the table domain are kept
    /// so the domain edges see their tails.
    pub ratio_padding: f64,
}

impl Default for RationalConfig {
    fn default() -> Self {
        Self {
            q_max: 5,
            widths: vec![0.06, 0.03, 0.02, 0.015, 0.012],
            ratio_padding: 0.25,
        }
    }
}

impl RationalConfig {
    pub fn validate(&self) -> ResonanceResult<()> {
        if self.q_max == 0 || self.q_max > 8 {
            return Err(ResonanceError::Config(format!(
                "rational.q_max must be in [1, 8], got {}",
                self.q_max
            )));
        }
        if self.widths.len() != self.q_max as usize {
            return Err(ResonanceError::Config(format!(
                "rational.widths needs {} entries (one per q), got {}",
                self.q_max,
                self.widths.len()
            )));
        }
        for (i, &w) in self.widths.iter().enumerate() {
            if !(w.is_finite() && w > 0.0) {
                return Err(ResonanceError::Config(format!(
                    "rational.widths[q={}] must be finite and > 0, got {w}",
                    i + 1
                )));
            }
        }
        if self.widths.windows(2).any(|p| p[1] > p[0]) {
            return Err(ResonanceError::Config(
                "rational.widths must be non-increasing in q".to_string(),
            ));
        }
        if !(self.ratio_padding.is_finite() && self.ratio_padding >= 0.0) {
            return Err(ResonanceError::Config(format!(
                "rational.ratio_padding must be >= 0, got {}",
                self.ratio_padding
            )));
        }
        Ok(())
    }
}

/// φⁿ attractor wells in the susceptibility landscape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhiConfig {
    /// Lowest exponent enumerated (quarter-integer grid).
    pub n_min: f64,
    /// Highest exponent enumerated.
    pub n_max: f64,
    /// Well depth at half-integer exponents.
    pub half_weight: f64,
    /// Well depth at quarter-integer exponents.
    pub quarter_weight: f64,
    /// Exponent of the optimal fallback (globally most stable ratio).
    pub optimal_exponent: f64,
    /// Well depth at the optimal fallback. Must exceed both other weights.
    pub optimal_weight: f64,
    /// Lorentzian width of every well (ratio units).
    pub width: f64,
}

impl Default for PhiConfig {
    fn default() -> Self {
        Self {
            n_min: -1.5,
            n_max: 4.5,
            half_weight: 0.30,
            quarter_weight: 0.18,
            optimal_exponent: 1.25,
            optimal_weight: 0.75,
            width: 0.06,
        }
    }
}

impl PhiConfig {
    pub fn validate(&self) -> ResonanceResult<()> {
        if !(self.n_min.is_finite() && self.n_max.is_finite() && self.n_min < self.n_max) {
            return Err(ResonanceError::Config(format!(
                "phi exponent range must satisfy n_min < n_max, got [{}, {}]",
                self.n_min, self.n_max
            )));
        }
        for (name, w) in [
            ("half_weight", self.half_weight),
            ("quarter_weight", self.quarter_weight),
            ("optimal_weight", self.optimal_weight),
        ] {
            if !(w.is_finite() && w >= 0.0) {
                return Err(ResonanceError::Config(format!(
                    "phi.{name} must be finite and >= 0, got {w}"
                )));
            }
        }
        if !(self.width.is_finite() && self.width > 0.0) {
            return Err(ResonanceError::Config(format!(
                "phi.width must be > 0, got {}",
                self.width
            )));
        }
        let k = self.optimal_exponent * 4.0;
        if (k - k.round()).abs() > 1e-9 || (k.round() as i64) % 4 == 0 {
            return Err(ResonanceError::Config(format!(
                "phi.optimal_exponent must be a non-integer multiple of 1/4, got {}",
                self.optimal_exponent
            )));
        }
        if !(self.n_min..=self.n_max).contains(&self.optimal_exponent) {
            return Err(ResonanceError::Config(format!(
                "phi.optimal_exponent {} outside [{}, {}]",
                self.optimal_exponent, self.n_min, self.n_max
            )));
        }
        if self.optimal_weight <= self.half_weight || self.optimal_weight <= self.quarter_weight {
            return Err(ResonanceError::Config(format!(
                "phi.optimal_weight ({}) must exceed half_weight ({}) and quarter_weight ({})",
                self.optimal_weight, self.half_weight, self.quarter_weight
            )));
        }
        Ok(())
    }
}

/// A dangerous ratio p:q with asymmetric membership half-widths.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatastropheZoneConfig {
    /// Name used by supervisors, e.g. "2:1".
    pub label: String,
    pub numerator: u32,
    pub denominator: u32,
    /// Half-width below the centre (ratio units).
    pub below_width: f64,
    /// Half-width above the centre (ratio units).
    pub above_width: f64,
}

impl CatastropheZoneConfig {
    pub fn new(numerator: u32, denominator: u32, below_width: f64, above_width: f64) -> Self {
        Self {
            label: format!("{numerator}:{denominator}"),
            numerator,
            denominator,
            below_width,
            above_width,
        }
    }

    pub fn center(&self) -> f64 {
        self.numerator as f64 / self.denominator.max(1) as f64
    }

    pub fn lower_edge(&self) -> f64 {
        self.center() - self.below_width
    }

    pub fn upper_edge(&self) -> f64 {
        self.center() + self.above_width
    }

    pub fn validate(&self) -> ResonanceResult<()> {
        if self.denominator == 0 || self.numerator == 0 {
            return Err(ResonanceError::Config(format!(
                "zone {}: numerator and denominator must be >= 1",
                self.label
            )));
        }
        for (side, w) in [("below", self.below_width), ("above", self.above_width)] {
            if !(w.is_finite() && w > 0.0) {
                return Err(ResonanceError::Config(format!(
                    "zone {}: {side}_width must be > 0, got {w}",
                    self.label
                )));
            }
        }
        if self.lower_edge() <= 0.0 || self.upper_edge() >= Q14_LIMIT {
            return Err(ResonanceError::Config(format!(
                "zone {}: [{}, {}] must lie inside (0, 8)",
                self.label,
                self.lower_edge(),
                self.upper_edge()
            )));
        }
        Ok(())
    }
}

/// Default zones: the integer harmonics 2:1, 3:1, 4:1.
pub fn default_zones() -> Vec<CatastropheZoneConfig> {
    vec![
        CatastropheZoneConfig::new(2, 1, 0.12, 0.08),
        CatastropheZoneConfig::new(3, 1, 0.12, 0.08),
        CatastropheZoneConfig::new(4, 1, 0.12, 0.08),
    ]
}

/// Susceptibility table sampling and composition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TableConfig {
    pub ratio_min: f64,
    pub ratio_max: f64,
    /// Sample spacing in raw Q4.14 units.
    pub step_raw: i32,
    /// Constant offset keeping χ non-negative under the φ wells.
    pub baseline: f64,
    /// Peak χ contribution of each catastrophe zone.
    pub catastrophe_weight: f64,
    /// χ falloff width per side = membership width × this factor.
    pub catastrophe_falloff: f64,
    /// Fraction of the χ range above which a ratio is `Transitional`.
    pub transition_fraction: f64,
    /// Fraction of the χ range above which a ratio is `Boundary`.
    pub boundary_fraction: f64,
    /// Offset from each zone centre at which the two sides are compared.
    pub asymmetry_offset: f64,
    /// Least |χ(c − offset) − χ(c + offset)| every zone must show.
    pub min_asymmetry: f64,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            ratio_min: 0.5,
            ratio_max: 4.5,
            step_raw: 16,
            baseline: 1.0,
            catastrophe_weight: 0.30,
            catastrophe_falloff: 0.5,
            transition_fraction: 0.35,
            boundary_fraction: 0.70,
            asymmetry_offset: 0.02,
            min_asymmetry: 0.02,
        }
    }
}

impl TableConfig {
    /// Number of samples the builder will produce.
    pub fn sample_count(&self) -> usize {
        let span = ((self.ratio_max - self.ratio_min) * (1 << 14) as f64).round() as i64;
        (span / self.step_raw.max(1) as i64) as usize + 1
    }

    pub fn validate(&self) -> ResonanceResult<()> {
        if !(self.ratio_min.is_finite() && self.ratio_min > 0.0) {
            return Err(ResonanceError::Config(format!(
                "table.ratio_min must be > 0, got {}",
                self.ratio_min
            )));
        }
        if !(self.ratio_max.is_finite() && self.ratio_max > self.ratio_min && self.ratio_max < Q14_LIMIT)
        {
            return Err(ResonanceError::Config(format!(
                "table.ratio_max must be in ({}, 8), got {}",
                self.ratio_min, self.ratio_max
            )));
        }
        if self.step_raw < 1 {
            return Err(ResonanceError::Config(format!(
                "table.step_raw must be >= 1, got {}",
                self.step_raw
            )));
        }
        let n = self.sample_count();
        if !(16..=1 << 17).contains(&n) {
            return Err(ResonanceError::Config(format!(
                "table must hold between 16 and 131072 samples, got {n}"
            )));
        }
        if !self.baseline.is_finite() {
            return Err(ResonanceError::Config("table.baseline must be finite".to_string()));
        }
        if !(self.catastrophe_weight.is_finite() && self.catastrophe_weight >= 0.0) {
            return Err(ResonanceError::Config(format!(
                "table.catastrophe_weight must be >= 0, got {}",
                self.catastrophe_weight
            )));
        }
        if !(self.catastrophe_falloff.is_finite() && self.catastrophe_falloff > 0.0) {
            return Err(ResonanceError::Config(format!(
                "table.catastrophe_falloff must be > 0, got {}",
                self.catastrophe_falloff
            )));
        }
        if !(0.0 < self.transition_fraction
            && self.transition_fraction < self.boundary_fraction
            && self.boundary_fraction < 1.0)
        {
            return Err(ResonanceError::Config(format!(
                "table fractions must satisfy 0 < transition ({}) < boundary ({}) < 1",
                self.transition_fraction, self.boundary_fraction
            )));
        }
        if !(self.asymmetry_offset.is_finite() && self.asymmetry_offset > 0.0) {
            return Err(ResonanceError::Config(format!(
                "table.asymmetry_offset must be > 0, got {}",
                self.asymmetry_offset
            )));
        }
        if !(self.min_asymmetry.is_finite() && self.min_asymmetry >= 0.0) {
            return Err(ResonanceError::Config(format!(
                "table.min_asymmetry must be >= 0, got {}",
                self.min_asymmetry
            )));
        }
        Ok(())
    }
}

/// Energy/force landscape over the tuning exponent n.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LandscapeConfig {
    pub n_min: f64,
    pub n_max: f64,
    /// Sample spacing in raw Q4.14 units.
    pub step_raw: i32,
    /// A in E_phi = A·cos(2πn).
    pub phi_amplitude: f64,
    /// Scale of the rational-resonance gradient term.
    pub rational_gain: f64,
    /// Magnitude K of the catastrophe escape force.
    pub catastrophe_strength: f64,
    /// Distance (n units) over which the escape pull ramps to full strength.
    pub capture_ramp: f64,
    /// Fade-out distance (n units) beyond an escape target.
    pub taper: f64,
    /// Outside escape bands the net force must carry the φ sign everywhere
    /// farther than this (n units) from an integer or half-integer.
    pub equilibrium_tolerance: f64,
}

impl Default for LandscapeConfig {
    fn default() -> Self {
        Self {
            n_min: -1.5,
            n_max: 4.5,
            step_raw: 16,
            phi_amplitude: 0.16,
            rational_gain: 0.01,
            catastrophe_strength: 2.5,
            capture_ramp: 0.02,
            taper: 0.02,
            equilibrium_tolerance: 0.02,
        }
    }
}

impl LandscapeConfig {
    /// Peak φ-landscape force, 2πA.
    pub fn phi_force_peak(&self) -> f64 {
        std::f64::consts::TAU * self.phi_amplitude
    }

    pub fn sample_count(&self) -> usize {
        let span = ((self.n_max - self.n_min) * (1 << 14) as f64).round() as i64;
        (span / self.step_raw.max(1) as i64) as usize + 1
    }

    pub fn validate(&self) -> ResonanceResult<()> {
        if !(self.n_min.is_finite()
            && self.n_max.is_finite()
            && self.n_min < self.n_max
            && self.n_min > -Q14_LIMIT
            && self.n_max < Q14_LIMIT)
        {
            return Err(ResonanceError::Config(format!(
                "landscape n range must satisfy -8 < n_min < n_max < 8, got [{}, {}]",
                self.n_min, self.n_max
            )));
        }
        if self.step_raw < 1 {
            return Err(ResonanceError::Config(format!(
                "landscape.step_raw must be >= 1, got {}",
                self.step_raw
            )));
        }
        let n = self.sample_count();
        if !(16..=1 << 17).contains(&n) {
            return Err(ResonanceError::Config(format!(
                "landscape must hold between 16 and 131072 samples, got {n}"
            )));
        }
        if !(self.phi_amplitude.is_finite() && self.phi_amplitude > 0.0) {
            return Err(ResonanceError::Config(format!(
                "landscape.phi_amplitude must be > 0, got {}",
                self.phi_amplitude
            )));
        }
        if !(self.rational_gain.is_finite() && self.rational_gain >= 0.0) {
            return Err(ResonanceError::Config(format!(
                "landscape.rational_gain must be >= 0, got {}",
                self.rational_gain
            )));
        }
        // Inside a zone |K − F_phi| > |F_phi| must hold for every F_phi.
        if !(self.catastrophe_strength > 2.0 * self.phi_force_peak())
            || self.catastrophe_strength >= Q14_LIMIT / 2.0
        {
            return Err(ResonanceError::Config(format!(
                "landscape.catastrophe_strength must be in (2·2πA = {:.4}, 4), got {}",
                2.0 * self.phi_force_peak(),
                self.catastrophe_strength
            )));
        }
        if !(self.capture_ramp.is_finite() && self.capture_ramp > 0.0) {
            return Err(ResonanceError::Config(format!(
                "landscape.capture_ramp must be > 0, got {}",
                self.capture_ramp
            )));
        }
        if !(self.taper.is_finite() && self.taper >= 0.0) {
            return Err(ResonanceError::Config(format!(
                "landscape.taper must be >= 0, got {}",
                self.taper
            )));
        }
        if !(self.equilibrium_tolerance > 0.0 && self.equilibrium_tolerance < 0.25) {
            return Err(ResonanceError::Config(format!(
                "landscape.equilibrium_tolerance must be in (0, 0.25), got {}",
                self.equilibrium_tolerance
            )));
        }
        Ok(())
    }
}

/// Tolerance bands of the position classifier (n units).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    pub integer_tolerance: f64,
    pub half_tolerance: f64,
    /// Wider than the other two.
    pub quarter_tolerance: f64,
    /// Score separating non-catastrophe positions from catastrophe ones.
    pub score_floor: f64,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            integer_tolerance: 0.05,
            half_tolerance: 0.05,
            quarter_tolerance: 0.10,
            score_floor: 0.20,
        }
    }
}

impl ClassifierConfig {
    pub fn validate(&self) -> ResonanceResult<()> {
        for (name, t) in [
            ("integer_tolerance", self.integer_tolerance),
            ("half_tolerance", self.half_tolerance),
            ("quarter_tolerance", self.quarter_tolerance),
        ] {
            if !(t.is_finite() && t > 0.0 && t < 0.25) {
                return Err(ResonanceError::Config(format!(
                    "classifier.{name} must be in (0, 0.25), got {t}"
                )));
            }
        }
        if self.quarter_tolerance < self.integer_tolerance.max(self.half_tolerance) {
            return Err(ResonanceError::Config(
                "classifier.quarter_tolerance must be the widest band".to_string(),
            ));
        }
        if self.integer_tolerance + self.quarter_tolerance > 0.25
            || self.half_tolerance + self.quarter_tolerance > 0.25
        {
            return Err(ResonanceError::Config(
                "classifier tolerance bands overlap (each pair must sum to <= 0.25)".to_string(),
            ));
        }
        if !(self.score_floor > 0.0 && self.score_floor < 1.0) {
            return Err(ResonanceError::Config(format!(
                "classifier.score_floor must be in (0, 1), got {}",
                self.score_floor
            )));
        }
        Ok(())
    }
}

/// Per-tick integrator: Δ = clamp(gain · force, ±delta_max).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CorrectionConfig {
    pub gain: f64,
    pub delta_max: f64,
}

impl Default for CorrectionConfig {
    fn default() -> Self {
        Self {
            gain: 0.004,
            delta_max: 0.008,
        }
    }
}

impl CorrectionConfig {
    pub fn validate(&self) -> ResonanceResult<()> {
        let resolution = 1.0 / (1 << 14) as f64;
        if !(self.gain.is_finite() && self.gain >= resolution && self.gain < 1.0) {
            return Err(ResonanceError::Config(format!(
                "correction.gain must be in [2^-14, 1), got {}",
                self.gain
            )));
        }
        if !(self.delta_max.is_finite() && self.delta_max >= resolution && self.delta_max < 0.25) {
            return Err(ResonanceError::Config(format!(
                "correction.delta_max must be in [2^-14, 0.25), got {}",
                self.delta_max
            )));
        }
        Ok(())
    }
}

/// Complete engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub rational: RationalConfig,
    pub phi: PhiConfig,
    pub zones: Vec<CatastropheZoneConfig>,
    pub table: TableConfig,
    pub landscape: LandscapeConfig,
    pub classifier: ClassifierConfig,
    pub correction: CorrectionConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            rational: RationalConfig::default(),
            phi: PhiConfig::default(),
            zones: default_zones(),
            table: TableConfig::default(),
            landscape: LandscapeConfig::default(),
            classifier: ClassifierConfig::default(),
            correction: CorrectionConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Validate every section plus cross-section constraints.
    pub fn validate(&self) -> ResonanceResult<()> {
        self.rational.validate()?;
        self.phi.validate()?;
        self.table.validate()?;
        self.landscape.validate()?;
        self.classifier.validate()?;
        self.correction.validate()?;

        if self.zones.len() > MAX_ZONES {
            return Err(ResonanceError::Config(format!(
                "at most {MAX_ZONES} catastrophe zones supported, got {}",
                self.zones.len()
            )));
        }
        let mut labels = HashSet::new();
        for zone in &self.zones {
            zone.validate()?;
            if !labels.insert(zone.label.as_str()) {
                return Err(ResonanceError::Config(format!(
                    "duplicate zone label {}",
                    zone.label
                )));
            }
        }
        let mut sorted: Vec<&CatastropheZoneConfig> = self.zones.iter().collect();
        sorted.sort_by(|a, b| a.center().total_cmp(&b.center()));
        for pair in sorted.windows(2) {
            if pair[0].upper_edge() >= pair[1].lower_edge() {
                return Err(ResonanceError::Config(format!(
                    "zones {} and {} overlap",
                    pair[0].label, pair[1].label
                )));
            }
        }

        let phi = (1.0 + 5.0_f64.sqrt()) / 2.0;
        let ratio_lo = phi.powf(self.landscape.n_min);
        let ratio_hi = phi.powf(self.landscape.n_max);
        if ratio_lo > self.table.ratio_min || ratio_hi < self.table.ratio_max {
            log::warn!(
                "landscape n range [{}, {}] maps to ratios [{ratio_lo:.4}, {ratio_hi:.4}], \
                 narrower than the table domain [{}, {}]",
                self.landscape.n_min,
                self.landscape.n_max,
                self.table.ratio_min,
                self.table.ratio_max
            );
        }
        Ok(())
    }

    /// Load from JSON string. Missing sections fall back to defaults.
    pub fn from_json(json: &str) -> ResonanceResult<Self> {
        serde_json::from_str(json)
            .map_err(|e| ResonanceError::Config(format!("JSON parse error: {e}")))
    }

    pub fn to_json(&self) -> ResonanceResult<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| ResonanceError::Config(format!("JSON encode error: {e}")))
    }
}
