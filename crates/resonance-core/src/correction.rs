// ─────────────────────────────────────────────────────────────────────
// φⁿ Resonance Kernel — Correction Loop
// ─────────────────────────────────────────────────────────────────────
//! Per-tick integrator over a bank of oscillators.
//!
//! Every tick, for each oscillator: resolve its ratio, look up χ,
//! evaluate the force at its tuning exponent, classify, and add the
//! rate-limited increment `Δ = clamp(gain · F, ±Δ_max)` to its offset.
//! The sub-LSB part of each product is carried to the next tick, so a
//! weak force still moves n over time. Oscillators are independent; their
//! processing order does not matter.
//!
//! The report buffer and per-oscillator state are allocated once at
//! construction. `tick` performs arithmetic and table reads only.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use resonance_physics::{phi_frequency_hz, LAYER_EXPONENTS, LAYER_NAMES};
use resonance_types::{
    LoopStats, Q14, ResonanceError, ResonanceResult, TickInput, TickReport, ZoneFlags,
};

use crate::engine::ResonanceEngine;

/// Tuning state owned by one oscillator slot: n = base + offset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OscillatorTuningState {
    pub base: Q14,
    /// Accumulated corrections.
    pub offset: Q14,
    /// Remainder of gain · F below one Q4.14 step, in units of 2⁻²⁸.
    #[serde(default)]
    pub carry: i32,
}

impl OscillatorTuningState {
    pub fn new(base: Q14) -> Self {
        Self {
            base,
            offset: Q14::ZERO,
            carry: 0,
        }
    }

    #[inline]
    pub fn n(&self) -> Q14 {
        self.base.saturating_add(self.offset)
    }
}

pub struct CorrectionLoop {
    engine: Arc<ResonanceEngine>,
    states: Vec<OscillatorTuningState>,
    reports: Vec<TickReport>,
    in_zone: Vec<bool>,
    pinned: Vec<bool>,
    stats: LoopStats,
}

impl CorrectionLoop {
    /// One oscillator per entry of `bases` (initial exponents).
    pub fn new(engine: Arc<ResonanceEngine>, bases: &[Q14]) -> Self {
        let states: Vec<_> = bases.iter().copied().map(OscillatorTuningState::new).collect();
        let reports = (0..states.len())
            .map(|index| TickReport {
                index,
                ..TickReport::default()
            })
            .collect();
        Self {
            engine,
            in_zone: vec![false; states.len()],
            pinned: vec![false; states.len()],
            states,
            reports,
            stats: LoopStats::default(),
        }
    }

    /// The six-layer canonical φⁿ bank.
    pub fn canonical(engine: Arc<ResonanceEngine>) -> Self {
        for (name, n) in LAYER_NAMES.iter().zip(LAYER_EXPONENTS) {
            log::debug!("layer {name}: n = {n}, {:.2} Hz", phi_frequency_hz(n));
        }
        let bases = LAYER_EXPONENTS.map(Q14::from_f64);
        Self::new(engine, &bases)
    }

    pub fn engine(&self) -> &Arc<ResonanceEngine> {
        &self.engine
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    pub fn states(&self) -> &[OscillatorTuningState] {
        &self.states
    }

    /// Reports from the most recent tick.
    pub fn reports(&self) -> &[TickReport] {
        &self.reports
    }

    pub fn stats(&self) -> LoopStats {
        self.stats
    }

    /// Move oscillator `index` to a new base exponent and drop its
    /// accumulated offset (a supervisor re-tune).
    pub fn retune(&mut self, index: usize, base: Q14) -> ResonanceResult<()> {
        let state = self.states.get_mut(index).ok_or_else(|| {
            ResonanceError::Config(format!("oscillator {index} out of range"))
        })?;
        *state = OscillatorTuningState::new(base);
        self.pinned[index] = false;
        log::debug!("oscillator {index} retuned to n = {base}");
        Ok(())
    }

    /// Zero every offset and counter.
    pub fn reset(&mut self) {
        for state in &mut self.states {
            state.offset = Q14::ZERO;
            state.carry = 0;
        }
        self.in_zone.fill(false);
        self.pinned.fill(false);
        self.stats = LoopStats::default();
    }

    /// Advance every oscillator by one tick.
    ///
    /// `inputs[i]` feeds oscillator `i`. A length mismatch is absorbed:
    /// missing inputs default to self-derived ratios, extras are ignored.
    pub fn tick(&mut self, inputs: &[TickInput]) -> &[TickReport] {
        if inputs.len() != self.states.len() {
            log::warn!(
                "tick: {} inputs for {} oscillators; processing the overlap",
                inputs.len(),
                self.states.len()
            );
        }
        for i in 0..self.states.len() {
            let input = inputs.get(i).copied().unwrap_or_default();
            self.step(i, input);
        }
        self.stats.ticks += 1;
        &self.reports
    }

    /// Free-running tick: every oscillator observes its own φⁿ.
    pub fn tick_free(&mut self) -> &[TickReport] {
        for i in 0..self.states.len() {
            self.step(i, TickInput::default());
        }
        self.stats.ticks += 1;
        &self.reports
    }

    /// Run `ticks` free-running ticks; returns the final reports.
    pub fn run(&mut self, ticks: usize) -> &[TickReport] {
        for _ in 0..ticks {
            self.tick_free();
        }
        &self.reports
    }

    fn step(&mut self, i: usize, input: TickInput) {
        let engine = &*self.engine;
        let state = self.states[i];
        let supervised = input.tuning.is_some();
        let (n, mut tuning_clamped) = engine
            .landscape()
            .clamp(input.tuning.unwrap_or_else(|| state.n()));
        let ratio = input.ratio.unwrap_or_else(|| engine.ratio_of(n));

        let chi = engine.lookup(ratio);
        let force = engine.force(n);
        let class = engine.classify_at(n, ratio);
        let flags = class
            .zone
            .map(|k| ZoneFlags::single(k as usize))
            .unwrap_or(ZoneFlags::NONE);

        let mut saturated = force.saturated;
        let delta = if supervised {
            // proposed only; the supervisor owns n
            let (proposed, product_saturated) = engine.increment(force.total);
            saturated |= product_saturated;
            proposed
        } else {
            let mut carry = state.carry;
            let (step, product_saturated) = engine.increment_carried(force.total, &mut carry);
            let (next, add_saturated) = n.overflowing_add(step);
            let (next, edge) = engine.landscape().clamp(next);
            saturated |= product_saturated || add_saturated;
            tuning_clamped |= edge;
            let slot = &mut self.states[i];
            slot.offset = next.saturating_sub(state.base);
            // no windup against the edge
            slot.carry = if edge { 0 } else { carry };
            next.saturating_sub(n)
        };

        if chi.clamped {
            self.stats.ratio_clamps += 1;
            log::trace!("oscillator {i}: ratio {ratio} clamped to table domain");
        }
        if tuning_clamped && !self.pinned[i] {
            self.stats.tuning_clamps += 1;
            log::debug!("oscillator {i}: n {n} pinned at landscape edge");
        }
        self.pinned[i] = tuning_clamped;
        if saturated {
            self.stats.saturations += 1;
        }
        let inside = flags.any();
        if inside != self.in_zone[i] {
            if inside {
                self.stats.catastrophe_entries += 1;
                log::debug!("oscillator {i} entered catastrophe zone at ratio {ratio}");
            } else {
                log::debug!("oscillator {i} left catastrophe zone at ratio {ratio}");
            }
            self.in_zone[i] = inside;
        }

        self.reports[i] = TickReport {
            index: i,
            n,
            ratio,
            chi: chi.chi,
            chi_band: chi.band,
            force,
            delta,
            integrated: !supervised,
            position_class: class.class,
            stability: class.stability,
            near_catastrophe: flags,
            ratio_clamped: chi.clamped,
            tuning_clamped,
            saturated,
        };
    }

    /// Latest reports as JSON, for telemetry export.
    pub fn reports_json(&self) -> ResonanceResult<String> {
        serde_json::to_string(&self.reports)
            .map_err(|e| ResonanceError::Numerical(format!("report encoding failed: {e}")))
    }
}
