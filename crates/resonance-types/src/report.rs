// ─────────────────────────────────────────────────────────────────────
// φⁿ Resonance Kernel — Per-Tick Outputs
// ─────────────────────────────────────────────────────────────────────
//! Values handed to downstream event/gain logic and supervisors.
//!
//! Everything here is `Copy` and `Default` so the correction loop can
//! keep one pre-allocated report per oscillator and overwrite it in place.

use serde::{Deserialize, Serialize};

use crate::config::MAX_ZONES;
use crate::fixed::{FrequencyRatio, Q14, StabilityScore};

/// Discrete stability class of a tuning coordinate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PositionClass {
    /// Near an integer exponent (unstable landscape maximum).
    #[default]
    IntegerBoundary,
    /// Near a half-integer exponent (primary attractor).
    HalfInteger,
    /// Near a quarter-integer exponent (fallback attractor).
    QuarterInteger,
    /// Ratio inside a catastrophe zone. Overrides every other class.
    NearCatastrophe,
}

impl PositionClass {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::IntegerBoundary => "integer_boundary",
            Self::HalfInteger => "half_integer",
            Self::QuarterInteger => "quarter_integer",
            Self::NearCatastrophe => "near_catastrophe",
        }
    }
}

/// Coarse susceptibility class, derived only from the χ value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChiBand {
    #[default]
    Stable,
    Transitional,
    Boundary,
}

impl ChiBand {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Stable => "stable",
            Self::Transitional => "transitional",
            Self::Boundary => "boundary",
        }
    }
}

/// Result of a susceptibility lookup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChiLookup {
    pub chi: Q14,
    pub band: ChiBand,
    /// The ratio was outside the table domain and was clamped to an edge.
    pub clamped: bool,
}

/// Signed corrective force split into its three terms.
/// Positive force increases n.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForceBreakdown {
    pub phi: Q14,
    pub rational: Q14,
    pub catastrophe: Q14,
    pub total: Q14,
    /// The sum hit the Q4.14 range limit.
    pub saturated: bool,
}

/// Position class plus continuous stability score.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    pub class: PositionClass,
    pub stability: StabilityScore,
    /// Index of the catastrophe zone containing the ratio, if any.
    pub zone: Option<u8>,
}

/// One bit per configured catastrophe zone (`near_catastrophe[k]`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ZoneFlags(u16);

impl ZoneFlags {
    pub const NONE: ZoneFlags = ZoneFlags(0);

    pub const fn from_bits(bits: u16) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u16 {
        self.0
    }

    /// Single-zone flag. Indices past `MAX_ZONES` are ignored.
    pub fn single(index: usize) -> Self {
        if index < MAX_ZONES {
            Self(1 << index)
        } else {
            Self::NONE
        }
    }

    pub fn contains(self, index: usize) -> bool {
        index < MAX_ZONES && self.0 & (1 << index) != 0
    }

    pub const fn any(self) -> bool {
        self.0 != 0
    }

    /// Indices of the set flags, ascending.
    pub fn iter(self) -> impl Iterator<Item = usize> {
        (0..MAX_ZONES).filter(move |&k| self.contains(k))
    }
}

/// Per-oscillator input for one tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickInput {
    /// Measured ratio. `None`: use φⁿ of the oscillator's own n.
    pub ratio: Option<FrequencyRatio>,
    /// Supervisor-owned tuning coordinate. When present the loop evaluates
    /// at this n and reports the proposed Δ without integrating it.
    pub tuning: Option<Q14>,
}

impl TickInput {
    pub fn ratio(ratio: FrequencyRatio) -> Self {
        Self {
            ratio: Some(ratio),
            tuning: None,
        }
    }

    pub fn supervised(ratio: Option<FrequencyRatio>, tuning: Q14) -> Self {
        Self {
            ratio,
            tuning: Some(tuning),
        }
    }
}

/// Everything the loop computed for one oscillator on one tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickReport {
    pub index: usize,
    /// Tuning coordinate the force was evaluated at.
    pub n: Q14,
    pub ratio: FrequencyRatio,
    pub chi: Q14,
    pub chi_band: ChiBand,
    pub force: ForceBreakdown,
    /// Bounded increment (applied unless `integrated` is false).
    pub delta: Q14,
    pub integrated: bool,
    pub position_class: PositionClass,
    pub stability: StabilityScore,
    pub near_catastrophe: ZoneFlags,
    pub ratio_clamped: bool,
    pub tuning_clamped: bool,
    pub saturated: bool,
}

/// Running counters of absorbed per-tick anomalies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoopStats {
    pub ticks: u64,
    pub ratio_clamps: u64,
    pub tuning_clamps: u64,
    pub saturations: u64,
    /// Transitions of an oscillator from outside to inside any zone.
    pub catastrophe_entries: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zone_flags_bits() {
        let flags = ZoneFlags::from_bits(ZoneFlags::single(0).bits() | ZoneFlags::single(2).bits());
        assert!(flags.contains(0));
        assert!(!flags.contains(1));
        assert!(flags.contains(2));
        assert!(flags.any());
        assert_eq!(flags.iter().collect::<Vec<_>>(), vec![0, 2]);
    }

    #[test]
    fn test_zone_flags_out_of_range_ignored() {
        assert_eq!(ZoneFlags::single(MAX_ZONES), ZoneFlags::NONE);
        assert!(!ZoneFlags::from_bits(u16::MAX).contains(MAX_ZONES + 3));
    }

    #[test]
    fn test_report_serializes() {
        let report = TickReport {
            position_class: PositionClass::HalfInteger,
            near_catastrophe: ZoneFlags::single(1),
            ..TickReport::default()
        };
        let json = serde_json::to_string(&report).unwrap();
        assert!(json.contains("HalfInteger"), "json: {json}");
        let back: TickReport = serde_json::from_str(&json).unwrap();
        assert_eq!(back, report);
    }

    #[test]
    fn test_class_names() {
        assert_eq!(PositionClass::NearCatastrophe.as_str(), "near_catastrophe");
        assert_eq!(ChiBand::Boundary.as_str(), "boundary");
    }
}
