// ─────────────────────────────────────────────────────────────────────
// φⁿ Resonance Kernel — Position Classifier
// ─────────────────────────────────────────────────────────────────────
//! Reduces a tuning exponent n (and the measured ratio) to a
//! [`PositionClass`] and a continuous [`StabilityScore`].
//!
//! Classification walks an ordered rule list; the first rule that fires
//! wins. The default order is catastrophe membership, then the integer,
//! half-integer and quarter-integer tolerance bands, then nearest lattice.
//!
//! Score outside catastrophe zones is
//! `floor + (1 − floor)·(1 − cos 2πn)/2`, baked over one period. It rises
//! monotonically with distance from the nearest integer, so the class
//! regions inherit the ordering HalfInteger > QuarterInteger >
//! IntegerBoundary. Inside a zone the score is `floor · depth`, never
//! above the lowest integer score.
//!
//! Boundary classes follow χ: while the measured ratio sits in the Stable
//! χ band, IntegerBoundary and zone-edge proximity are never reported. A
//! near-integer position then falls back to QuarterInteger, scored no lower
//! than the quarter lattice's own minimum.

use std::f64::consts::TAU;

use serde::{Deserialize, Serialize};

use resonance_types::{
    ChiBand, Classification, ClassifierConfig, FrequencyRatio, PositionClass, Q14,
    StabilityScore,
};

use crate::grid::UniformGrid;
use crate::zones::ZoneSet;

const QUARTER_RAW: i32 = Q14::ONE_RAW / 4;
const THREE_QUARTER_RAW: i32 = 3 * Q14::ONE_RAW / 4;

/// One step of the classification chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClassRule {
    /// Ratio inside any catastrophe zone → `NearCatastrophe`.
    Catastrophe,
    /// Exponent within the tolerance of the class's lattice.
    Within(PositionClass, Q14),
    /// Whichever lattice (or zone edge) is closest. Always fires.
    Nearest,
}

/// Distance from fractional part `frac` ∈ [0, 1) to a class's lattice.
#[inline]
fn lattice_distance(class: PositionClass, frac: i32) -> i32 {
    match class {
        PositionClass::IntegerBoundary => frac.min(Q14::ONE_RAW - frac),
        PositionClass::HalfInteger => (frac - Q14::HALF.raw()).abs(),
        PositionClass::QuarterInteger => {
            (frac - QUARTER_RAW).abs().min((frac - THREE_QUARTER_RAW).abs())
        }
        PositionClass::NearCatastrophe => i32::MAX,
    }
}

#[derive(Debug, Clone)]
pub struct PositionClassifier {
    rules: Vec<ClassRule>,
    zones: ZoneSet,
    floor: Q14,
    quarter_floor: StabilityScore,
    period: UniformGrid,
    score: Vec<Q14>,
}

impl PositionClassifier {
    pub fn new(cfg: &ClassifierConfig, zones: &ZoneSet) -> Self {
        let rules = vec![
            ClassRule::Catastrophe,
            ClassRule::Within(
                PositionClass::IntegerBoundary,
                Q14::from_f64(cfg.integer_tolerance),
            ),
            ClassRule::Within(PositionClass::HalfInteger, Q14::from_f64(cfg.half_tolerance)),
            ClassRule::Within(
                PositionClass::QuarterInteger,
                Q14::from_f64(cfg.quarter_tolerance),
            ),
            ClassRule::Nearest,
        ];
        Self::with_rules(cfg, zones, rules)
    }

    /// Classifier with a caller-supplied rule chain.
    pub fn with_rules(cfg: &ClassifierConfig, zones: &ZoneSet, rules: Vec<ClassRule>) -> Self {
        let period = UniformGrid::from_range(0.0, 1.0, 16);
        let floor = cfg.score_floor;
        let score = (0..period.len())
            .map(|i| {
                // folded so the table is exactly symmetric about 0.5
                let t = period.point(i).to_f64();
                let x = t.min(1.0 - t);
                Q14::from_f64(floor + (1.0 - floor) * 0.5 * (1.0 - (TAU * x).cos()))
            })
            .collect();
        let mut classifier = Self {
            rules,
            zones: zones.clone(),
            floor: Q14::from_f64(floor),
            quarter_floor: StabilityScore::MIN,
            period,
            score,
        };
        // lowest score the quarter lattice reaches on its own
        let reach = QUARTER_RAW - Q14::from_f64(cfg.quarter_tolerance).raw();
        let reach = reach.clamp(0, QUARTER_RAW).min(QUARTER_RAW / 2);
        classifier.quarter_floor = classifier.score_at(reach);
        classifier
    }

    pub fn rules(&self) -> &[ClassRule] {
        &self.rules
    }

    /// Class and score of exponent `n` observed at `ratio`, whose χ falls
    /// in `band`.
    pub fn classify(&self, n: Q14, ratio: FrequencyRatio, band: ChiBand) -> Classification {
        let frac = n.raw().rem_euclid(Q14::ONE_RAW);
        let zone = self.zones.membership(ratio);
        let calm = band == ChiBand::Stable;
        for rule in &self.rules {
            match *rule {
                ClassRule::Catastrophe => {
                    if let Some(k) = zone {
                        let depth = self.zones.get(k).map_or(Q14::ONE, |z| z.depth(ratio));
                        return Classification {
                            class: PositionClass::NearCatastrophe,
                            stability: StabilityScore::new(self.floor.saturating_mul(depth)),
                            zone: Some(k as u8),
                        };
                    }
                }
                ClassRule::Within(class, tolerance) => {
                    if calm && class == PositionClass::IntegerBoundary {
                        continue;
                    }
                    if lattice_distance(class, frac) <= tolerance.raw() {
                        return self.lattice(class, frac, zone);
                    }
                }
                ClassRule::Nearest => return self.nearest(n, frac, zone, calm),
            }
        }
        self.nearest(n, frac, zone, calm)
    }

    fn lattice(&self, class: PositionClass, frac: i32, zone: Option<usize>) -> Classification {
        let score = self.score_at(frac);
        Classification {
            class,
            stability: if class == PositionClass::QuarterInteger {
                score.max(self.quarter_floor)
            } else {
                score
            },
            zone: zone.map(|k| k as u8),
        }
    }

    fn nearest(&self, n: Q14, frac: i32, zone: Option<usize>, calm: bool) -> Classification {
        // ties resolve in this order
        let mut best = PositionClass::QuarterInteger;
        let mut best_d = lattice_distance(best, frac);
        for class in [PositionClass::HalfInteger, PositionClass::IntegerBoundary] {
            if calm && class == PositionClass::IntegerBoundary {
                continue;
            }
            let d = lattice_distance(class, frac);
            if d < best_d {
                best = class;
                best_d = d;
            }
        }
        let edge = if calm {
            None
        } else {
            self.zones.nearest_edge_distance(n)
        };
        match edge {
            Some(d) if d < best_d => Classification {
                class: PositionClass::NearCatastrophe,
                stability: StabilityScore::new(self.floor),
                zone: zone.map(|k| k as u8),
            },
            _ => self.lattice(best, frac, zone),
        }
    }

    /// Smooth score over one period of n, ignoring zones.
    #[inline]
    pub fn score_at(&self, frac: i32) -> StabilityScore {
        StabilityScore::new(
            self.period
                .interpolate(&self.score, Q14::from_raw(frac.rem_euclid(Q14::ONE_RAW))),
        )
    }
}
