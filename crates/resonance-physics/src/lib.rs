// ─────────────────────────────────────────────────────────────────────
// φⁿ Resonance Kernel — Landscape Physics
// (C) 1998-2026 Miroslav Sotek. All rights reserved.
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
#![deny(unsafe_code)]
//! Susceptibility χ(r), the three-term force/energy landscape over the
//! tuning exponent n, and the position classifier.
//!
//! Floating point is used only while baking tables; every runtime query
//! is Q4.14 interpolation over immutable samples.

pub mod attractors;
pub mod classifier;
pub mod grid;
pub mod landscape;
pub mod params;
pub mod susceptibility;
pub mod zones;

pub use attractors::{PhiAttractor, RationalAttractor};
pub use classifier::{ClassRule, PositionClassifier};
pub use grid::UniformGrid;
pub use landscape::ForceLandscape;
pub use params::{
    layer_frequencies_hz, phi_frequency_hz, LAYER_EXPONENTS, LAYER_NAMES, LN_PHI, N_LAYERS, PHI,
    SCHUMANN_HZ,
};
pub use susceptibility::{SusceptibilityModel, SusceptibilityTable, TableSummary};
pub use zones::{CatastropheZone, EscapeBand, ZoneSet};
