// ─────────────────────────────────────────────────────────────────────
// φⁿ Resonance Kernel — Types
// (C) 1998-2026 Miroslav Sotek. All rights reserved.
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
#![deny(unsafe_code)]
//! Fixed-point scalars, configuration, per-tick reports, and the error
//! hierarchy for the φⁿ resonance kernel.

pub mod config;
pub mod error;
pub mod fixed;
pub mod report;

pub use config::{
    CatastropheZoneConfig, ClassifierConfig, CorrectionConfig, EngineConfig, LandscapeConfig,
    PhiConfig, RationalConfig, TableConfig, MAX_ZONES,
};
pub use error::{ResonanceError, ResonanceResult};
pub use fixed::{FrequencyRatio, Q14, StabilityScore};
pub use report::{
    ChiBand, ChiLookup, Classification, ForceBreakdown, LoopStats, PositionClass, TickInput,
    TickReport, ZoneFlags,
};
