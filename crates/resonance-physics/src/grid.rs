// ─────────────────────────────────────────────────────────────────────
// φⁿ Resonance Kernel — Uniform Fixed-Point Grid
// ─────────────────────────────────────────────────────────────────────
//! Uniformly spaced Q4.14 sample positions plus the integer linear
//! interpolation every baked table shares.
//!
//! A point that lands exactly on a sample returns that sample unchanged,
//! so repeated lookups of the same bit pattern are bit-identical.

use resonance_types::Q14;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UniformGrid {
    start_raw: i32,
    step_raw: i32,
    len: usize,
}

impl UniformGrid {
    /// Grid covering `[lo, hi]` with `step_raw` spacing. The last sample
    /// sits on or just below `hi`.
    pub fn from_range(lo: f64, hi: f64, step_raw: i32) -> Self {
        let start_raw = Q14::from_f64(lo).raw();
        let end_raw = Q14::from_f64(hi).raw();
        let step_raw = step_raw.max(1);
        let len = ((end_raw - start_raw).max(0) / step_raw) as usize + 1;
        Self {
            start_raw,
            step_raw,
            len,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn start(&self) -> Q14 {
        Q14::from_raw(self.start_raw)
    }

    #[inline]
    pub fn end(&self) -> Q14 {
        Q14::from_raw(self.end_raw())
    }

    #[inline]
    fn end_raw(&self) -> i32 {
        self.start_raw + (self.len.saturating_sub(1) as i32) * self.step_raw
    }

    /// Position of sample `i` (not bounds-checked against `len`).
    #[inline]
    pub fn point(&self, i: usize) -> Q14 {
        Q14::from_raw(self.start_raw + i as i32 * self.step_raw)
    }

    /// Clamp onto the grid domain; the flag reports whether `x` was outside.
    #[inline]
    pub fn clamp(&self, x: Q14) -> (Q14, bool) {
        let raw = x.raw();
        if raw < self.start_raw {
            (Q14::from_raw(self.start_raw), true)
        } else if raw > self.end_raw() {
            (Q14::from_raw(self.end_raw()), true)
        } else {
            (x, false)
        }
    }

    /// Linear interpolation of `samples` at `x`, which is clamped first.
    ///
    /// `samples.len()` must equal `self.len()`.
    #[inline]
    pub fn interpolate(&self, samples: &[Q14], x: Q14) -> Q14 {
        let (x, _) = self.clamp(x);
        let offset = x.raw() - self.start_raw;
        let i = (offset / self.step_raw) as usize;
        let frac = offset % self.step_raw;
        let a = samples[i];
        if frac == 0 || i + 1 >= samples.len() {
            return a;
        }
        let b = samples[i + 1];
        let delta = (b.raw() as i64 - a.raw() as i64) * frac as i64 / self.step_raw as i64;
        Q14::from_raw(a.raw() + delta as i32)
    }
}
