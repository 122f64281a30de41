// ─────────────────────────────────────────────────────────────────────
// φⁿ Resonance Kernel — Error Hierarchy
// ─────────────────────────────────────────────────────────────────────
//! Construction-time failures only. Per-tick domain violations and
//! fixed-point saturation are absorbed by the hot path and reported as
//! flags, never as errors.

use thiserror::Error;

/// Root error type for all resonance kernel failures.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ResonanceError {
    /// Malformed configuration (weights, widths, tolerances, gains).
    #[error("config error: {0}")]
    Config(String),

    /// The baked susceptibility table violates a build invariant
    /// (negative χ, non-finite sample, too few samples).
    #[error("susceptibility table error: {0}")]
    Table(String),

    /// The baked force landscape violates a build invariant
    /// (overlapping escape bands, catastrophe force not dominant).
    #[error("force landscape error: {0}")]
    Landscape(String),

    /// Non-finite value produced during table generation.
    #[error("numerical error: {0}")]
    Numerical(String),
}

pub type ResonanceResult<T> = Result<T, ResonanceError>;
