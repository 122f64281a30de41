// ─────────────────────────────────────────────────────────────────────
// φⁿ Resonance Kernel — Canonical Parameters
// ─────────────────────────────────────────────────────────────────────
//! Golden-ratio constants and the canonical φⁿ oscillator bank.
//!
//! Every oscillator's nominal frequency is `SCHUMANN_HZ · φⁿ`; the six
//! layer presets place the bank on half-integer attractors plus one
//! integer-exponent (unstable) layer and one layer blocked by 2:1.

pub const PHI: f64 = 1.618_033_988_749_895;

/// ln φ, the factor converting d/dr into d/dn via dr/dn = r·ln φ.
pub const LN_PHI: f64 = 0.481_211_825_059_603_4;

/// Schumann fundamental, the base of the φⁿ frequency ladder.
pub const SCHUMANN_HZ: f64 = 7.83;

pub const N_LAYERS: usize = 6;

pub const LAYER_NAMES: [&str; N_LAYERS] = [
    "Theta",
    "L6 Alpha",
    "L5a Low-Beta",
    "L5b High-Beta",
    "L4 Low-Gamma",
    "L2/3 Gamma",
];

/// Canonical exponents n for each layer.
pub const LAYER_EXPONENTS: [f64; N_LAYERS] = [
    -0.5, // Theta       ≈ 4.84 Hz
    0.5,  // L6 Alpha    ≈ 9.96 Hz
    1.5,  // L5a Low-β   ≈ 16.1 Hz (2:1 zone)
    2.5,  // L5b High-β  ≈ 26.1 Hz
    3.0,  // L4 Low-γ    ≈ 33.2 Hz (integer boundary)
    3.5,  // L2/3 γ      ≈ 42.2 Hz
];

/// Nominal frequency of exponent `n` on the Schumann-based ladder.
pub fn phi_frequency_hz(n: f64) -> f64 {
    SCHUMANN_HZ * PHI.powf(n)
}

/// Frequency ratio φⁿ between two ladder rungs `n` apart.
pub fn ratio_of_exponent(n: f64) -> f64 {
    PHI.powf(n)
}

/// Inverse of [`ratio_of_exponent`]; `ratio` must be positive.
pub fn exponent_of_ratio(ratio: f64) -> f64 {
    ratio.ln() / LN_PHI
}

pub fn layer_frequencies_hz() -> [f64; N_LAYERS] {
    LAYER_EXPONENTS.map(phi_frequency_hz)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phi_identity() {
        assert!((PHI * PHI - PHI - 1.0).abs() < 1e-12);
        assert!((PHI.ln() - LN_PHI).abs() < 1e-15);
    }

    #[test]
    fn test_phi_frequency_ladder() {
        assert!((phi_frequency_hz(0.0) - 7.83).abs() < 1e-12);
        let f = layer_frequencies_hz();
        assert!((f[1] - 9.9597).abs() < 1e-3, "alpha = {}", f[1]);
        for w in f.windows(2) {
            assert!(w[1] > w[0], "ladder must ascend: {w:?}");
        }
    }

    #[test]
    fn test_exponent_roundtrip() {
        for n in [-1.5, 0.0, 1.25, 3.5] {
            let back = exponent_of_ratio(ratio_of_exponent(n));
            assert!((back - n).abs() < 1e-12, "n={n} back={back}");
        }
    }

    #[test]
    fn test_layer_names_distinct() {
        for (i, a) in LAYER_NAMES.iter().enumerate() {
            assert!(LAYER_NAMES[i + 1..].iter().all(|b| b != a), "duplicate layer {a}");
        }
    }
}
