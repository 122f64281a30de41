// ─────────────────────────────────────────────────────────────────────
// φⁿ Resonance Kernel — Core Engine
// (C) 1998-2026 Miroslav Sotek. All rights reserved.
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
#![deny(unsafe_code)]
//! Resonance engine and per-tick correction loop for banks of
//! oscillators tuned to φⁿ frequency ratios.
//!
//! # Safety Invariants
//!
//! 1. **Bounded correction**: every tick moves an oscillator's exponent
//!    by at most `Δ_max`. No force magnitude, however large, can push a
//!    tuning further than that in one step.
//!
//! 2. **Tables are immutable after build**: a [`ResonanceEngine`] is
//!    validated and baked once. Any configuration or numerical fault
//!    aborts construction; a built engine never fails a query.
//!
//! 3. **Out-of-domain inputs saturate**: ratios outside the χ table and
//!    exponents outside the landscape are clamped to the nearest edge
//!    and flagged in the tick report, never rejected.
//!
//! 4. **No allocations in the hot path**: per-oscillator state and the
//!    report buffer are allocated at construction. A tick performs only
//!    integer arithmetic and table reads.

pub mod correction;
pub mod engine;

pub use correction::{CorrectionLoop, OscillatorTuningState};
pub use engine::ResonanceEngine;
