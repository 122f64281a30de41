// ─────────────────────────────────────────────────────────────────────
// φⁿ Resonance Kernel — PyO3 FFI Bindings
// (C) 1998-2026 Miroslav Sotek. All rights reserved.
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
// Note: #[deny(unsafe_code)] not applied: PyO3 proc macros generate
// unsafe blocks internally. All hand-written code in this crate is safe.
//! Python-callable wrappers around the resonance engine and the
//! correction loop.
//!
//! # FFI Safety
//!
//! - Floats crossing the boundary are converted to Q4.14 with
//!   saturation; NaN maps to zero.
//! - Configuration errors surface as `ValueError`; a built engine never
//!   raises.
//! - Engines are shared between loops via `Arc`; nothing borrowed from
//!   Python outlives a call.
//!
//! Install: `pip install -e crates/resonance-ffi` (requires maturin).
//!
//! Usage from Python:
//! ```python
//! from resonance_kernel import RustResonanceEngine, RustCorrectionLoop
//!
//! engine = RustResonanceEngine()
//! bank = RustCorrectionLoop(engine)
//! reports = bank.run(200)
//! ```

use std::sync::Arc;

use pyo3::exceptions::{PyIndexError, PyValueError};
use pyo3::prelude::*;
use pyo3::types::{PyDict, PyList};

use resonance_core::{CorrectionLoop, ResonanceEngine};
use resonance_physics::{layer_frequencies_hz, LAYER_EXPONENTS, LAYER_NAMES};
use resonance_types::{
    ChiLookup, Classification, ForceBreakdown, FrequencyRatio, Q14, TickInput, TickReport,
};

fn chi_dict<'py>(py: Python<'py>, hit: &ChiLookup, norm: f64) -> PyResult<Bound<'py, PyDict>> {
    let dict = PyDict::new(py);
    dict.set_item("chi", hit.chi.to_f64())?;
    dict.set_item("chi_normalized", norm)?;
    dict.set_item("band", hit.band.as_str())?;
    dict.set_item("clamped", hit.clamped)?;
    Ok(dict)
}

fn force_dict<'py>(py: Python<'py>, f: &ForceBreakdown) -> PyResult<Bound<'py, PyDict>> {
    let dict = PyDict::new(py);
    dict.set_item("phi", f.phi.to_f64())?;
    dict.set_item("rational", f.rational.to_f64())?;
    dict.set_item("catastrophe", f.catastrophe.to_f64())?;
    dict.set_item("total", f.total.to_f64())?;
    dict.set_item("saturated", f.saturated)?;
    Ok(dict)
}

fn class_dict<'py>(
    py: Python<'py>,
    engine: &ResonanceEngine,
    c: &Classification,
) -> PyResult<Bound<'py, PyDict>> {
    let dict = PyDict::new(py);
    dict.set_item("class", c.class.as_str())?;
    dict.set_item("stability", c.stability.to_f64())?;
    let zone = c
        .zone
        .and_then(|k| engine.zones().get(k as usize))
        .map(|z| z.label.clone());
    dict.set_item("zone", zone)?;
    Ok(dict)
}

fn report_dict<'py>(
    py: Python<'py>,
    engine: &ResonanceEngine,
    r: &TickReport,
) -> PyResult<Bound<'py, PyDict>> {
    let dict = PyDict::new(py);
    dict.set_item("index", r.index)?;
    dict.set_item("n", r.n.to_f64())?;
    dict.set_item("ratio", r.ratio.to_f64())?;
    dict.set_item("chi", r.chi.to_f64())?;
    dict.set_item("chi_band", r.chi_band.as_str())?;
    dict.set_item("force", r.force.total.to_f64())?;
    dict.set_item("delta", r.delta.to_f64())?;
    dict.set_item("integrated", r.integrated)?;
    dict.set_item("position_class", r.position_class.as_str())?;
    dict.set_item("stability", r.stability.to_f64())?;
    let zones: Vec<String> = r
        .near_catastrophe
        .iter()
        .filter_map(|k| engine.zones().get(k).map(|z| z.label.clone()))
        .collect();
    dict.set_item("near_catastrophe", zones)?;
    dict.set_item("ratio_clamped", r.ratio_clamped)?;
    dict.set_item("tuning_clamped", r.tuning_clamped)?;
    dict.set_item("saturated", r.saturated)?;
    Ok(dict)
}

// ─── RustResonanceEngine ────────────────────────────────────────────

/// Baked χ table, force landscape and classifier.
#[pyclass(name = "RustResonanceEngine")]
struct PyResonanceEngine {
    inner: Arc<ResonanceEngine>,
}

#[pymethods]
impl PyResonanceEngine {
    /// Default configuration, or a JSON configuration string.
    #[new]
    #[pyo3(signature = (config_json = None))]
    fn new(config_json: Option<&str>) -> PyResult<Self> {
        let engine = match config_json {
            Some(json) => ResonanceEngine::from_json(json),
            None => ResonanceEngine::with_defaults(),
        }
        .map_err(|e| PyValueError::new_err(e.to_string()))?;
        Ok(Self {
            inner: Arc::new(engine),
        })
    }

    /// χ at a frequency ratio.
    fn lookup<'py>(&self, py: Python<'py>, ratio: f64) -> PyResult<Bound<'py, PyDict>> {
        let hit = self.inner.lookup(FrequencyRatio::from_f64(ratio));
        chi_dict(py, &hit, self.inner.table().normalized(hit.chi))
    }

    /// Force breakdown at tuning exponent `n`.
    fn force<'py>(&self, py: Python<'py>, n: f64) -> PyResult<Bound<'py, PyDict>> {
        force_dict(py, &self.inner.force(Q14::from_f64(n)))
    }

    fn energy(&self, n: f64) -> f64 {
        self.inner.energy(Q14::from_f64(n)).to_f64()
    }

    /// Classify `n`, at φⁿ or at a measured ratio.
    #[pyo3(signature = (n, ratio = None))]
    fn classify<'py>(
        &self,
        py: Python<'py>,
        n: f64,
        ratio: Option<f64>,
    ) -> PyResult<Bound<'py, PyDict>> {
        let n = Q14::from_f64(n);
        let c = match ratio {
            Some(r) => self.inner.classify_at(n, FrequencyRatio::from_f64(r)),
            None => self.inner.classify(n),
        };
        class_dict(py, &self.inner, &c)
    }

    /// Labels of the zones containing `ratio`.
    fn near_catastrophe(&self, ratio: f64) -> Vec<String> {
        self.inner
            .near_catastrophe(FrequencyRatio::from_f64(ratio))
            .iter()
            .filter_map(|k| self.inner.zones().get(k).map(|z| z.label.clone()))
            .collect()
    }

    fn zone_labels(&self) -> Vec<String> {
        self.inner.zone_labels().map(str::to_owned).collect()
    }

    fn config_json(&self) -> PyResult<String> {
        self.inner
            .config()
            .to_json()
            .map_err(|e| PyValueError::new_err(e.to_string()))
    }

    fn __repr__(&self) -> String {
        format!(
            "RustResonanceEngine(zones={}, gain={}, delta_max={})",
            self.inner.zones().len(),
            self.inner.gain(),
            self.inner.delta_max()
        )
    }
}

// ─── RustCorrectionLoop ─────────────────────────────────────────────

/// Per-tick correction over a bank of oscillators.
#[pyclass(name = "RustCorrectionLoop")]
struct PyCorrectionLoop {
    inner: CorrectionLoop,
}

#[pymethods]
impl PyCorrectionLoop {
    /// Bank over `engine`; the six canonical layers when `bases` is None.
    #[new]
    #[pyo3(signature = (engine, bases = None))]
    fn new(engine: PyRef<'_, PyResonanceEngine>, bases: Option<Vec<f64>>) -> Self {
        let shared = Arc::clone(&engine.inner);
        let inner = match bases {
            Some(bases) => {
                let bases: Vec<Q14> = bases.into_iter().map(Q14::from_f64).collect();
                CorrectionLoop::new(shared, &bases)
            }
            None => CorrectionLoop::canonical(shared),
        };
        Self { inner }
    }

    /// One tick. `ratios[i]` overrides oscillator i's observed ratio;
    /// `tunings[i]` supplies its exponent and suspends integration.
    #[pyo3(signature = (ratios = None, tunings = None))]
    fn tick<'py>(
        &mut self,
        py: Python<'py>,
        ratios: Option<Vec<Option<f64>>>,
        tunings: Option<Vec<Option<f64>>>,
    ) -> PyResult<Bound<'py, PyList>> {
        let ratios = ratios.unwrap_or_default();
        let tunings = tunings.unwrap_or_default();
        let inputs: Vec<TickInput> = (0..self.inner.len())
            .map(|i| TickInput {
                ratio: ratios.get(i).copied().flatten().map(FrequencyRatio::from_f64),
                tuning: tunings.get(i).copied().flatten().map(Q14::from_f64),
            })
            .collect();
        self.inner.tick(&inputs);
        self.reports(py)
    }

    /// Run free-running ticks; returns the final reports.
    fn run<'py>(&mut self, py: Python<'py>, ticks: usize) -> PyResult<Bound<'py, PyList>> {
        self.inner.run(ticks);
        self.reports(py)
    }

    fn reports<'py>(&self, py: Python<'py>) -> PyResult<Bound<'py, PyList>> {
        let engine = Arc::clone(self.inner.engine());
        let list = PyList::empty(py);
        for r in self.inner.reports() {
            list.append(report_dict(py, &engine, r)?)?;
        }
        Ok(list)
    }

    /// Current tuning exponent of every oscillator.
    fn tunings(&self) -> Vec<f64> {
        self.inner.states().iter().map(|s| s.n().to_f64()).collect()
    }

    fn retune(&mut self, index: usize, base: f64) -> PyResult<()> {
        self.inner
            .retune(index, Q14::from_f64(base))
            .map_err(|e| PyIndexError::new_err(e.to_string()))
    }

    fn reset(&mut self) {
        self.inner.reset();
    }

    fn stats<'py>(&self, py: Python<'py>) -> PyResult<Bound<'py, PyDict>> {
        let s = self.inner.stats();
        let dict = PyDict::new(py);
        dict.set_item("ticks", s.ticks)?;
        dict.set_item("ratio_clamps", s.ratio_clamps)?;
        dict.set_item("tuning_clamps", s.tuning_clamps)?;
        dict.set_item("saturations", s.saturations)?;
        dict.set_item("catastrophe_entries", s.catastrophe_entries)?;
        Ok(dict)
    }

    fn reports_json(&self) -> PyResult<String> {
        self.inner
            .reports_json()
            .map_err(|e| PyValueError::new_err(e.to_string()))
    }

    fn __len__(&self) -> usize {
        self.inner.len()
    }

    fn __repr__(&self) -> String {
        format!(
            "RustCorrectionLoop(oscillators={}, ticks={})",
            self.inner.len(),
            self.inner.stats().ticks
        )
    }
}

/// Canonical bank as (name, n, Hz) tuples, in `RustCorrectionLoop` order.
#[pyfunction]
fn layers() -> Vec<(String, f64, f64)> {
    LAYER_NAMES
        .iter()
        .zip(LAYER_EXPONENTS)
        .zip(layer_frequencies_hz())
        .map(|((name, n), hz)| (name.to_string(), n, hz))
        .collect()
}

#[pymodule]
fn resonance_kernel(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<PyResonanceEngine>()?;
    m.add_class::<PyCorrectionLoop>()?;
    m.add_function(wrap_pyfunction!(layers, m)?)?;
    Ok(())
}
