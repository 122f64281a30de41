// ─────────────────────────────────────────────────────────────────────
// φⁿ Resonance Kernel — Q4.14 Fixed-Point Scalars
// ─────────────────────────────────────────────────────────────────────
//! Signed Q4.14 fixed point: 4 integer bits, 14 fractional bits, stored
//! in an `i32` but constrained to the 18-bit range [-8, 8).
//!
//! Every runtime quantity of the kernel (ratios, tuning coordinates,
//! susceptibility, forces) is a `Q14`. Floating point is only used at
//! construction time to bake tables; [`Q14::from_f64`] is the single
//! conversion point.
//!
//! Overflow policy: saturate to the representable extremum, never wrap.
//! Products are formed in `i64` before narrowing.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Signed Q4.14 fixed-point scalar.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Q14(i32);

impl Q14 {
    pub const FRAC_BITS: u32 = 14;
    pub const ONE_RAW: i32 = 1 << Self::FRAC_BITS;
    pub const MAX_RAW: i32 = (8 << Self::FRAC_BITS) - 1;
    pub const MIN_RAW: i32 = -(8 << Self::FRAC_BITS);

    pub const ZERO: Q14 = Q14(0);
    pub const ONE: Q14 = Q14(Self::ONE_RAW);
    pub const HALF: Q14 = Q14(Self::ONE_RAW / 2);
    pub const MAX: Q14 = Q14(Self::MAX_RAW);
    pub const MIN: Q14 = Q14(Self::MIN_RAW);

    /// Wrap a raw Q4.14 integer, saturating into the 18-bit range.
    #[inline]
    pub const fn from_raw(raw: i32) -> Self {
        if raw > Self::MAX_RAW {
            Q14(Self::MAX_RAW)
        } else if raw < Self::MIN_RAW {
            Q14(Self::MIN_RAW)
        } else {
            Q14(raw)
        }
    }

    #[inline]
    pub const fn raw(self) -> i32 {
        self.0
    }

    /// Whole-number constructor (saturating).
    #[inline]
    pub const fn from_int(v: i32) -> Self {
        Self::saturate(v as i64 * Self::ONE_RAW as i64)
    }

    /// Convert from floating point, rounding to nearest.
    ///
    /// NaN maps to zero; infinities and out-of-range values saturate.
    pub fn from_f64(v: f64) -> Self {
        if v.is_nan() {
            log::warn!("Q14::from_f64: NaN input, mapping to 0");
            return Self::ZERO;
        }
        let scaled = (v * Self::ONE_RAW as f64).round();
        if scaled >= Self::MAX_RAW as f64 {
            Self::MAX
        } else if scaled <= Self::MIN_RAW as f64 {
            Self::MIN
        } else {
            Q14(scaled as i32)
        }
    }

    #[inline]
    pub fn to_f64(self) -> f64 {
        self.0 as f64 / Self::ONE_RAW as f64
    }

    #[inline]
    const fn saturate(v: i64) -> Self {
        if v > Self::MAX_RAW as i64 {
            Q14(Self::MAX_RAW)
        } else if v < Self::MIN_RAW as i64 {
            Q14(Self::MIN_RAW)
        } else {
            Q14(v as i32)
        }
    }

    #[inline]
    pub const fn saturating_add(self, rhs: Q14) -> Q14 {
        Self::saturate(self.0 as i64 + rhs.0 as i64)
    }

    #[inline]
    pub const fn saturating_sub(self, rhs: Q14) -> Q14 {
        Self::saturate(self.0 as i64 - rhs.0 as i64)
    }

    #[inline]
    pub const fn saturating_neg(self) -> Q14 {
        Self::saturate(-(self.0 as i64))
    }

    /// Add, returning the saturated sum and whether saturation occurred.
    #[inline]
    pub const fn overflowing_add(self, rhs: Q14) -> (Q14, bool) {
        let wide = self.0 as i64 + rhs.0 as i64;
        let out = Self::saturate(wide);
        (out, out.0 as i64 != wide)
    }

    /// Q4.14 product with a double-width intermediate, rounded half-up.
    #[inline]
    pub const fn saturating_mul(self, rhs: Q14) -> Q14 {
        let wide = self.0 as i64 * rhs.0 as i64;
        Self::saturate((wide + (1 << (Self::FRAC_BITS - 1))) >> Self::FRAC_BITS)
    }

    /// Product that also reports saturation.
    #[inline]
    pub const fn overflowing_mul(self, rhs: Q14) -> (Q14, bool) {
        let wide = (self.0 as i64 * rhs.0 as i64 + (1 << (Self::FRAC_BITS - 1)))
            >> Self::FRAC_BITS;
        let out = Self::saturate(wide);
        (out, out.0 as i64 != wide)
    }

    #[inline]
    pub const fn abs(self) -> Q14 {
        if self.0 < 0 {
            self.saturating_neg()
        } else {
            self
        }
    }

    #[inline]
    pub fn clamp(self, lo: Q14, hi: Q14) -> Q14 {
        Q14(self.0.clamp(lo.0, hi.0))
    }

    #[inline]
    pub const fn signum(self) -> i32 {
        self.0.signum()
    }
}

impl fmt::Display for Q14 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.5}", self.to_f64())
    }
}

/// `measured_frequency / reference_frequency` in Q4.14.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct FrequencyRatio(Q14);

impl FrequencyRatio {
    pub const UNITY: FrequencyRatio = FrequencyRatio(Q14::ONE);

    #[inline]
    pub const fn new(value: Q14) -> Self {
        Self(value)
    }

    #[inline]
    pub const fn from_raw(raw: i32) -> Self {
        Self(Q14::from_raw(raw))
    }

    pub fn from_f64(ratio: f64) -> Self {
        Self(Q14::from_f64(ratio))
    }

    /// Divide two Q4.14 frequencies. A non-positive reference saturates
    /// to the top of the representable range.
    pub fn from_frequencies(measured: Q14, reference: Q14) -> Self {
        if reference.raw() <= 0 {
            return Self(Q14::MAX);
        }
        let wide = ((measured.raw() as i64) << Q14::FRAC_BITS) / reference.raw() as i64;
        Self(Q14::saturate(wide))
    }

    #[inline]
    pub const fn value(self) -> Q14 {
        self.0
    }

    #[inline]
    pub const fn raw(self) -> i32 {
        self.0.raw()
    }

    #[inline]
    pub fn to_f64(self) -> f64 {
        self.0.to_f64()
    }
}

impl From<Q14> for FrequencyRatio {
    fn from(value: Q14) -> Self {
        Self(value)
    }
}

impl fmt::Display for FrequencyRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Continuous stability in [0, 1] (Q4.14). Higher = more stable.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct StabilityScore(Q14);

impl StabilityScore {
    pub const MIN: StabilityScore = StabilityScore(Q14::ZERO);
    pub const MAX: StabilityScore = StabilityScore(Q14::ONE);

    /// Clamp into [0, 1].
    #[inline]
    pub fn new(value: Q14) -> Self {
        Self(value.clamp(Q14::ZERO, Q14::ONE))
    }

    #[inline]
    pub const fn value(self) -> Q14 {
        self.0
    }

    #[inline]
    pub fn to_f64(self) -> f64 {
        self.0.to_f64()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_raw_saturates() {
        assert_eq!(Q14::from_raw(1 << 20), Q14::MAX);
        assert_eq!(Q14::from_raw(-(1 << 20)), Q14::MIN);
        assert_eq!(Q14::from_raw(123).raw(), 123);
    }

    #[test]
    fn test_from_f64_rounds_and_saturates() {
        assert_eq!(Q14::from_f64(1.0), Q14::ONE);
        assert_eq!(Q14::from_f64(0.5), Q14::HALF);
        assert_eq!(Q14::from_f64(100.0), Q14::MAX);
        assert_eq!(Q14::from_f64(-100.0), Q14::MIN);
        assert_eq!(Q14::from_f64(f64::NAN), Q14::ZERO);
        assert_eq!(Q14::from_f64(f64::INFINITY), Q14::MAX);
    }

    #[test]
    fn test_add_saturates_instead_of_wrapping() {
        let (sum, sat) = Q14::MAX.overflowing_add(Q14::ONE);
        assert_eq!(sum, Q14::MAX);
        assert!(sat);
        let (sum, sat) = Q14::ONE.overflowing_add(Q14::ONE);
        assert_eq!(sum, Q14::from_int(2));
        assert!(!sat);
        assert_eq!(Q14::MIN.saturating_sub(Q14::ONE), Q14::MIN);
        assert_eq!(Q14::MIN.saturating_neg(), Q14::MAX);
    }

    #[test]
    fn test_mul_uses_wide_intermediate() {
        let a = Q14::from_f64(2.5);
        let b = Q14::from_f64(-3.0);
        assert_eq!(a.saturating_mul(b), Q14::from_f64(-7.5));
        let (p, sat) = Q14::from_f64(4.0).overflowing_mul(Q14::from_f64(4.0));
        assert_eq!(p, Q14::MAX);
        assert!(sat);
    }

    #[test]
    fn test_mul_rounds_half_up() {
        // 1 raw × 0.5 = 0.5 raw → rounds to 1
        assert_eq!(Q14::from_raw(1).saturating_mul(Q14::HALF).raw(), 1);
        assert_eq!(Q14::from_raw(-1).saturating_mul(Q14::HALF).raw(), 0);
    }

    #[test]
    fn test_ratio_from_frequencies() {
        let ratio = FrequencyRatio::from_frequencies(Q14::from_raw(32768), Q14::from_raw(16384));
        assert_eq!(ratio.raw(), 32768);
        assert!((ratio.to_f64() - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_ratio_zero_reference_saturates() {
        let ratio = FrequencyRatio::from_frequencies(Q14::ONE, Q14::ZERO);
        assert_eq!(ratio.value(), Q14::MAX);
    }

    #[test]
    fn test_stability_score_clamped() {
        assert_eq!(StabilityScore::new(Q14::from_f64(1.7)), StabilityScore::MAX);
        assert_eq!(StabilityScore::new(Q14::from_f64(-0.2)), StabilityScore::MIN);
    }
}
