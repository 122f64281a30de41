// ─────────────────────────────────────────────────────────────────────
// φⁿ Resonance Kernel — Attractor Enumerations
// ─────────────────────────────────────────────────────────────────────
//! Rational (Farey) attractors p/q and φⁿ attractor wells.
//!
//! Both sets are enumerated once from configuration and never change.
//! Each attractor contributes a Lorentzian bump
//! `L(x, w) = 1 / (1 + (x/w)²)` scaled by its weight.

use serde::{Deserialize, Serialize};

use resonance_types::{PhiConfig, RationalConfig};

use crate::params::PHI;

/// Lorentzian bump of unit height.
#[inline]
pub fn lorentzian(x: f64, width: f64) -> f64 {
    let u = x / width;
    1.0 / (1.0 + u * u)
}

/// d/dx of [`lorentzian`].
#[inline]
pub fn lorentzian_slope(x: f64, width: f64) -> f64 {
    let u = x / width;
    let d = 1.0 + u * u;
    -2.0 * x / (width * width * d * d)
}

fn gcd(mut a: u32, mut b: u32) -> u32 {
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a
}

/// A fraction p/q in lowest terms, weight 1/q².
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RationalAttractor {
    pub p: u32,
    pub q: u32,
    pub center: f64,
    pub weight: f64,
    pub width: f64,
}

impl RationalAttractor {
    #[inline]
    pub fn contribution(&self, ratio: f64) -> f64 {
        self.weight * lorentzian(ratio - self.center, self.width)
    }

    #[inline]
    pub fn slope(&self, ratio: f64) -> f64 {
        self.weight * lorentzian_slope(ratio - self.center, self.width)
    }
}

/// Every p/q with gcd(p, q) = 1, q ≤ `q_max`, inside the padded domain.
/// Sorted by centre.
pub fn enumerate_rationals(
    cfg: &RationalConfig,
    ratio_min: f64,
    ratio_max: f64,
) -> Vec<RationalAttractor> {
    let lo = ratio_min - cfg.ratio_padding;
    let hi = ratio_max + cfg.ratio_padding;
    let mut out = Vec::new();
    for q in 1..=cfg.q_max {
        let width = cfg.widths[(q - 1) as usize];
        let weight = 1.0 / (q as f64 * q as f64);
        let mut p = 1u32;
        while (p as f64) / (q as f64) <= hi {
            let center = p as f64 / q as f64;
            if center >= lo && gcd(p, q) == 1 {
                out.push(RationalAttractor {
                    p,
                    q,
                    center,
                    weight,
                    width,
                });
            }
            p += 1;
        }
    }
    out.sort_by(|a, b| a.center.total_cmp(&b.center));
    out
}

/// A well at φⁿ. Subtracted from χ, so deeper = more stable.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PhiAttractor {
    pub exponent: f64,
    pub ratio: f64,
    pub weight: f64,
    pub width: f64,
}

impl PhiAttractor {
    #[inline]
    pub fn depth(&self, ratio: f64) -> f64 {
        self.weight * lorentzian(ratio - self.ratio, self.width)
    }
}

/// Quarter-integer exponents in `[n_min, n_max]`, integers excluded.
pub fn enumerate_phi(cfg: &PhiConfig) -> Vec<PhiAttractor> {
    let k_lo = (cfg.n_min * 4.0).ceil() as i64;
    let k_hi = (cfg.n_max * 4.0).floor() as i64;
    (k_lo..=k_hi)
        .filter(|k| k.rem_euclid(4) != 0)
        .map(|k| {
            let exponent = k as f64 / 4.0;
            let weight = if (exponent - cfg.optimal_exponent).abs() < 1e-9 {
                cfg.optimal_weight
            } else if k.rem_euclid(2) == 0 {
                cfg.half_weight
            } else {
                cfg.quarter_weight
            };
            PhiAttractor {
                exponent,
                ratio: PHI.powf(exponent),
                weight,
                width: cfg.width,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lorentzian_shape() {
        assert_eq!(lorentzian(0.0, 0.1), 1.0);
        assert!((lorentzian(0.1, 0.1) - 0.5).abs() < 1e-12);
        assert_eq!(lorentzian(0.05, 0.1), lorentzian(-0.05, 0.1));
    }

    #[test]
    fn test_lorentzian_slope_matches_difference() {
        let h = 1e-6;
        for x in [-0.07, -0.01, 0.02, 0.3] {
            let fd = (lorentzian(x + h, 0.03) - lorentzian(x - h, 0.03)) / (2.0 * h);
            let an = lorentzian_slope(x, 0.03);
            assert!((fd - an).abs() < 1e-5, "x={x} fd={fd} an={an}");
        }
    }

    #[test]
    fn test_rationals_lowest_terms() {
        let set = enumerate_rationals(&RationalConfig::default(), 0.5, 4.5);
        assert!(set.iter().all(|a| gcd(a.p, a.q) == 1));
        assert!(set.iter().any(|a| a.p == 3 && a.q == 2));
        assert!(!set.iter().any(|a| a.p == 4 && a.q == 2));
        assert!(set.windows(2).all(|w| w[0].center <= w[1].center));
        assert!(set.iter().all(|a| a.center >= 0.25 && a.center <= 4.75));
    }

    #[test]
    fn test_weight_hierarchy_at_equal_proximity() {
        let set = enumerate_rationals(&RationalConfig::default(), 0.5, 4.5);
        let mut peaks = [0.0f64; 5];
        for a in &set {
            // fixed proximity: 0.005 above the centre
            peaks[(a.q - 1) as usize] = a.contribution(a.center + 0.005);
        }
        for q in 0..4 {
            assert!(
                peaks[q] > peaks[q + 1],
                "q={} contribution {} not above q={} contribution {}",
                q + 1,
                peaks[q],
                q + 2,
                peaks[q + 1]
            );
        }
    }

    #[test]
    fn test_phi_set_excludes_integers() {
        let set = enumerate_phi(&PhiConfig::default());
        assert!(set.iter().all(|a| a.exponent.fract() != 0.0));
        assert_eq!(set.first().map(|a| a.exponent), Some(-1.5));
        assert_eq!(set.last().map(|a| a.exponent), Some(4.5));
        assert!(!set.iter().any(|a| a.exponent == 1.0));
    }

    #[test]
    fn test_optimal_fallback_is_deepest() {
        let set = enumerate_phi(&PhiConfig::default());
        let deepest = set
            .iter()
            .max_by(|a, b| a.weight.total_cmp(&b.weight))
            .map(|a| a.exponent);
        assert_eq!(deepest, Some(1.25));
        let half = set.iter().find(|a| a.exponent == 0.5).map(|a| a.weight);
        let quarter = set.iter().find(|a| a.exponent == 0.75).map(|a| a.weight);
        assert_eq!(half, Some(0.30));
        assert_eq!(quarter, Some(0.18));
    }
}
