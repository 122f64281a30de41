// ─────────────────────────────────────────────────────────────────────
// φⁿ Resonance Kernel — Catastrophe Zones & Escape Bands
// ─────────────────────────────────────────────────────────────────────
//! Catastrophe zones are ratio intervals `[c − below, c + above]` around
//! dangerous ratios. Membership is a pure function of the ratio and is
//! evaluated on raw Q4.14 bounds at runtime.
//!
//! Escape bands live in exponent space. Each zone gets a band spanning
//! the zone and the quarter-integer fallbacks it escapes to; inside the
//! band the landscape pulls toward the nearer fallback.

use serde::{Deserialize, Serialize};

use resonance_types::{
    CatastropheZoneConfig, FrequencyRatio, Q14, ResonanceError, ResonanceResult, ZoneFlags,
};

use crate::attractors::lorentzian;
use crate::params::{exponent_of_ratio, ratio_of_exponent};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatastropheZone {
    pub label: String,
    pub center: f64,
    pub below_width: f64,
    pub above_width: f64,
    /// Zone edges in exponent space, `log_φ` of the ratio edges.
    pub n_lower: f64,
    pub n_upper: f64,
    center_raw: i32,
    lower_raw: i32,
    upper_raw: i32,
    below_raw: i32,
    above_raw: i32,
    n_lower_raw: i32,
    n_upper_raw: i32,
}

impl CatastropheZone {
    pub fn from_config(cfg: &CatastropheZoneConfig) -> Self {
        let q = |v: f64| Q14::from_f64(v).raw();
        Self {
            label: cfg.label.clone(),
            center: cfg.center(),
            below_width: cfg.below_width,
            above_width: cfg.above_width,
            n_lower: exponent_of_ratio(cfg.lower_edge()),
            n_upper: exponent_of_ratio(cfg.upper_edge()),
            center_raw: q(cfg.center()),
            lower_raw: q(cfg.lower_edge()),
            upper_raw: q(cfg.upper_edge()),
            below_raw: q(cfg.below_width).max(1),
            above_raw: q(cfg.above_width).max(1),
            n_lower_raw: q(exponent_of_ratio(cfg.lower_edge())),
            n_upper_raw: q(exponent_of_ratio(cfg.upper_edge())),
        }
    }

    #[inline]
    pub fn lower_edge(&self) -> f64 {
        self.center - self.below_width
    }

    #[inline]
    pub fn upper_edge(&self) -> f64 {
        self.center + self.above_width
    }

    /// Runtime membership test on the raw ratio.
    #[inline]
    pub fn contains(&self, ratio: FrequencyRatio) -> bool {
        (self.lower_raw..=self.upper_raw).contains(&ratio.raw())
    }

    pub fn contains_f64(&self, ratio: f64) -> bool {
        ratio >= self.lower_edge() && ratio <= self.upper_edge()
    }

    pub fn contains_exponent(&self, n: f64) -> bool {
        n >= self.n_lower && n <= self.n_upper
    }

    /// Exponent-space distance from `n` to the nearer zone edge (zero inside).
    #[inline]
    pub fn exponent_distance(&self, n: Q14) -> i32 {
        let raw = n.raw();
        if raw < self.n_lower_raw {
            self.n_lower_raw - raw
        } else if raw > self.n_upper_raw {
            raw - self.n_upper_raw
        } else {
            0
        }
    }

    /// `|r − c|` over the width of the side `r` is on, capped at 1.
    #[inline]
    pub fn depth(&self, ratio: FrequencyRatio) -> Q14 {
        let offset = ratio.raw() - self.center_raw;
        let width = if offset < 0 { self.below_raw } else { self.above_raw };
        let scaled = ((offset.unsigned_abs() as i64) << Q14::FRAC_BITS) / width as i64;
        Q14::from_raw(scaled.min(Q14::ONE_RAW as i64) as i32)
    }

    /// Asymmetric χ bump: falloff width per side is `falloff` × membership width.
    pub fn chi_contribution(&self, ratio: f64, weight: f64, falloff: f64) -> f64 {
        let x = ratio - self.center;
        let width = if x < 0.0 {
            self.below_width * falloff
        } else {
            self.above_width * falloff
        };
        weight * lorentzian(x, width)
    }
}

/// The configured zones, in configuration order (index = flag bit).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ZoneSet {
    zones: Vec<CatastropheZone>,
}

impl ZoneSet {
    pub fn from_config(configs: &[CatastropheZoneConfig]) -> Self {
        Self {
            zones: configs.iter().map(CatastropheZone::from_config).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.zones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.zones.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&CatastropheZone> {
        self.zones.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &CatastropheZone> {
        self.zones.iter()
    }

    pub fn index_of(&self, label: &str) -> Option<usize> {
        self.zones.iter().position(|z| z.label == label)
    }

    /// First zone containing `ratio`. Zones never overlap.
    #[inline]
    pub fn membership(&self, ratio: FrequencyRatio) -> Option<usize> {
        self.zones.iter().position(|z| z.contains(ratio))
    }

    #[inline]
    pub fn flags(&self, ratio: FrequencyRatio) -> ZoneFlags {
        self.membership(ratio)
            .map(ZoneFlags::single)
            .unwrap_or(ZoneFlags::NONE)
    }

    pub fn contains_f64(&self, ratio: f64) -> bool {
        self.zones.iter().any(|z| z.contains_f64(ratio))
    }

    /// Smallest exponent-space distance to any zone edge, if any zone exists.
    #[inline]
    pub fn nearest_edge_distance(&self, n: Q14) -> Option<i32> {
        self.zones.iter().map(|z| z.exponent_distance(n)).min()
    }
}

/// Exponent-space escape region of one zone.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EscapeBand {
    pub zone: usize,
    pub lo: f64,
    pub hi: f64,
    /// Nearest fallback at or below the zone's lower edge.
    pub below: Option<f64>,
    /// Nearest fallback at or above the zone's upper edge.
    pub above: Option<f64>,
    /// Tie goes to `below` when its χ is not higher.
    pub prefer_below: bool,
    /// The band edge is itself a fallback target and the pull fades out
    /// beyond it.
    pub taper_lo: bool,
    pub taper_hi: bool,
}

impl EscapeBand {
    /// Fallback that `n` escapes toward.
    pub fn target(&self, n: f64) -> f64 {
        match (self.below, self.above) {
            (Some(b), None) => b,
            (None, Some(a)) => a,
            (Some(b), Some(a)) => {
                let db = n - b;
                let da = a - n;
                if db < da {
                    b
                } else if da < db {
                    a
                } else if self.prefer_below {
                    b
                } else {
                    a
                }
            }
            (None, None) => n,
        }
    }

    /// Weight and target of the escape pull at `n`, if it reaches there.
    pub fn influence(&self, n: f64, taper: f64) -> Option<(f64, f64)> {
        if n >= self.lo && n <= self.hi {
            return Some((1.0, self.target(n)));
        }
        if taper > 0.0 {
            if self.taper_lo && n > self.lo - taper && n < self.lo {
                return Some(((n - (self.lo - taper)) / taper, self.lo));
            }
            if self.taper_hi && n > self.hi && n < self.hi + taper {
                return Some((((self.hi + taper) - n) / taper, self.hi));
            }
        }
        None
    }

    pub fn outer_lo(&self, taper: f64) -> f64 {
        if self.taper_lo {
            self.lo - taper
        } else {
            self.lo
        }
    }

    pub fn outer_hi(&self, taper: f64) -> f64 {
        if self.taper_hi {
            self.hi + taper
        } else {
            self.hi
        }
    }
}

/// Quarter-integer exponents (integers excluded) inside `[n_min, n_max]`
/// whose ratio lies outside every zone.
pub fn fallback_candidates(zones: &ZoneSet, n_min: f64, n_max: f64) -> Vec<f64> {
    let k_lo = (n_min * 4.0).ceil() as i64;
    let k_hi = (n_max * 4.0).floor() as i64;
    (k_lo..=k_hi)
        .filter(|k| k.rem_euclid(4) != 0)
        .map(|k| k as f64 / 4.0)
        .filter(|&n| !zones.contains_f64(ratio_of_exponent(n)))
        .collect()
}

/// One band per zone that intersects `[n_min, n_max]`.
///
/// `chi_at` resolves exact-tie targets (lower χ wins). Fails when a zone
/// has no fallback on either side or when two bands overlap including
/// their tapers.
pub fn build_escape_bands(
    zones: &ZoneSet,
    n_min: f64,
    n_max: f64,
    taper: f64,
    chi_at: impl Fn(f64) -> f64,
) -> ResonanceResult<Vec<EscapeBand>> {
    let candidates = fallback_candidates(zones, n_min, n_max);
    let mut bands = Vec::with_capacity(zones.len());

    for (index, zone) in zones.iter().enumerate() {
        if zone.n_upper < n_min || zone.n_lower > n_max {
            log::debug!(
                "zone {} lies outside the exponent domain [{n_min}, {n_max}], no escape band",
                zone.label
            );
            continue;
        }
        let below = candidates
            .iter()
            .copied()
            .filter(|&c| c <= zone.n_lower)
            .reduce(f64::max);
        let above = candidates
            .iter()
            .copied()
            .filter(|&c| c >= zone.n_upper)
            .reduce(f64::min);
        if below.is_none() && above.is_none() {
            return Err(ResonanceError::Landscape(format!(
                "zone {} has no quarter-integer fallback in [{n_min}, {n_max}]",
                zone.label
            )));
        }
        let prefer_below = match (below, above) {
            (Some(b), Some(a)) => chi_at(b) <= chi_at(a),
            _ => below.is_some(),
        };
        let mut band = EscapeBand {
            zone: index,
            lo: zone.n_lower,
            hi: zone.n_upper,
            below,
            above,
            prefer_below,
            taper_lo: false,
            taper_hi: false,
        };
        let t_lo = band.target(zone.n_lower);
        let t_hi = band.target(zone.n_upper);
        band.lo = zone.n_lower.min(t_lo);
        band.hi = zone.n_upper.max(t_hi);
        band.taper_lo = t_lo < zone.n_lower;
        band.taper_hi = t_hi > zone.n_upper;
        log::debug!(
            "escape band {}: [{:.4}, {:.4}] below={:?} above={:?}",
            zone.label,
            band.lo,
            band.hi,
            below,
            above
        );
        bands.push(band);
    }

    bands.sort_by(|a, b| a.lo.total_cmp(&b.lo));
    for pair in bands.windows(2) {
        if pair[0].outer_hi(taper) >= pair[1].outer_lo(taper) {
            let name = |b: &EscapeBand| {
                zones
                    .get(b.zone)
                    .map(|z| z.label.clone())
                    .unwrap_or_default()
            };
            return Err(ResonanceError::Landscape(format!(
                "escape bands of zones {} and {} overlap",
                name(&pair[0]),
                name(&pair[1])
            )));
        }
    }
    Ok(bands)
}
