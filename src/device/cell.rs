//! ReRAM cell model: a bistable memristor in series with a selector.
//!
//! The memristor is a plain resistance (HRS or LRS). The selector is any
//! [`Selector`]. Two families of queries are offered:
//!
//! - `calc_*` solve the series combination directly (closed form or
//!   bisection). They are accurate and slow, and are used to build tables.
//! - `get_*` look up the precomputed [`IxVCurve`] of the active state in
//!   O(log n). The sneak-path solver only uses these.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{Result, XbarError};

use super::curve::IxVCurve;
use super::selector::{Selector, SelectorModel};
use super::ResistanceState;

/// Relative tolerance used when tabulating the cell.
pub const TABLE_RELATIVE_ERROR: f64 = 1e-12;

/// Bound on bisection rounds for the memristor/selector voltage split.
pub const MAX_BISECTION_STEPS: usize = 200;

/// Bound on doublings of the initial guess when inverting the cell.
pub const MAX_GUESS_DOUBLINGS: usize = 64;

/// Initial guess magnitude when inverting the cell (V).
const INITIAL_VOLTAGE_GUESS: f64 = 5.0;

/// Smallest voltage step before the inversion gives up (V).
const MIN_VOLTAGE_STEP: f64 = 1e-15;

/// Default first step of the table sampler (V).
pub const DEFAULT_TABLE_STEP: f64 = 1e-3;

/// Default extrapolation tolerance of the table sampler.
pub const DEFAULT_TABLE_TOLERANCE: f64 = 1e-3;

fn default_max_current_relative_error() -> f64 {
    1e-6
}

fn default_switching_voltage_per_decade() -> f64 {
    0.3
}

fn default_cell_area_f2() -> f64 {
    4.0
}

/// Device parameters of a cell, as written in configuration files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CellParams {
    /// High resistance state (Ω)
    pub hrs_resistance: f64,
    /// Low resistance state (Ω)
    pub lrs_resistance: f64,
    /// Selector device
    pub selector: Option<SelectorModel>,
    /// Convergence tolerance of the divider solve
    #[serde(default = "default_max_current_relative_error")]
    pub max_current_relative_error: f64,
    /// Nominal set voltage across the cell (V)
    pub set_voltage: f64,
    /// Nominal reset voltage across the cell (V, magnitude)
    pub reset_voltage: f64,
    /// Nominal read voltage, used to size read drivers (V)
    pub read_voltage: f64,
    /// Set switching time at the set voltage (s)
    pub set_time: f64,
    /// Reset switching time at the reset voltage (s)
    pub reset_time: f64,
    /// Voltage change that slows switching tenfold (V)
    #[serde(default = "default_switching_voltage_per_decade")]
    pub switching_voltage_per_decade: f64,
    /// Set compliance current (A), defaults to the selector maximum
    #[serde(default)]
    pub set_compliance_current: Option<f64>,
    /// Cell footprint in units of F²
    #[serde(default = "default_cell_area_f2")]
    pub cell_area_f2: f64,
}

/// Outcome of inverting the cell characteristic.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VoltageEstimate {
    pub voltage: f64,
    /// False when the bisection ran out of resolution before meeting the tolerance
    pub converged: bool,
}

/// Tables for both resistance states.
#[derive(Debug, Clone, PartialEq)]
struct CellCurves {
    hrs: IxVCurve,
    lrs: IxVCurve,
}

/// One memory cell.
#[derive(Debug, Clone)]
pub struct Cell {
    params: CellParams,
    state: ResistanceState,
    selector: Option<Arc<dyn Selector>>,
    curves: Option<CellCurves>,
}

impl Cell {
    /// Create a cell from its device parameters. The cell starts in HRS.
    pub fn new(params: CellParams) -> Result<Self> {
        validate_params(&params)?;
        let selector = params.selector.as_ref().map(|m| m.build()).transpose()?;
        Ok(Self {
            params,
            state: ResistanceState::High,
            selector,
            curves: None,
        })
    }

    /// Device parameters.
    pub fn params(&self) -> &CellParams {
        &self.params
    }

    /// Active resistance state.
    pub fn resistance_state(&self) -> ResistanceState {
        self.state
    }

    /// Switch the active resistance state. Tables stay valid.
    pub fn set_resistance_state(&mut self, state: ResistanceState) {
        self.state = state;
    }

    pub fn hrs_resistance(&self) -> f64 {
        self.params.hrs_resistance
    }

    pub fn lrs_resistance(&self) -> f64 {
        self.params.lrs_resistance
    }

    /// Change the HRS resistance. Invalidates the tables.
    pub fn set_hrs_resistance(&mut self, resistance: f64) -> Result<()> {
        let mut params = self.params.clone();
        params.hrs_resistance = resistance;
        validate_params(&params)?;
        self.params = params;
        self.curves = None;
        Ok(())
    }

    /// Change the LRS resistance. Invalidates the tables.
    pub fn set_lrs_resistance(&mut self, resistance: f64) -> Result<()> {
        let mut params = self.params.clone();
        params.lrs_resistance = resistance;
        validate_params(&params)?;
        self.params = params;
        self.curves = None;
        Ok(())
    }

    /// Replace the selector. Invalidates the tables.
    pub fn set_selector(&mut self, selector: Arc<dyn Selector>) {
        self.selector = Some(selector);
        self.curves = None;
    }

    /// Remove the selector. Every current query fails until a new one is set.
    pub fn clear_selector(&mut self) {
        self.selector = None;
        self.curves = None;
    }

    /// Resistance of the memristor in the active state.
    pub fn instant_resistance(&self) -> f64 {
        self.resistance_in(self.state)
    }

    fn resistance_in(&self, state: ResistanceState) -> f64 {
        match state {
            ResistanceState::High => self.params.hrs_resistance,
            ResistanceState::Low => self.params.lrs_resistance,
        }
    }

    fn selector(&self) -> Result<&Arc<dyn Selector>> {
        self.selector
            .as_ref()
            .ok_or_else(|| XbarError::model_selection("cell has no selector model configured"))
    }

    /// Maximum current of the configured selector.
    pub fn max_current(&self) -> Result<f64> {
        Ok(self.selector()?.max_current())
    }

    /// Set compliance current, defaulting to the selector maximum current.
    pub fn set_compliance_current(&self) -> Result<f64> {
        match self.params.set_compliance_current {
            Some(current) => Ok(current),
            None => self.max_current(),
        }
    }

    /// Selector current alone at `voltage`.
    pub fn calc_sel_current(&self, voltage: f64) -> Result<f64> {
        Ok(self.selector()?.current(voltage))
    }

    /// Cell current at `voltage` using the default divider tolerance.
    pub fn calc_cell_current(&self, voltage: f64) -> Result<f64> {
        self.calc_cell_current_with(voltage, self.params.max_current_relative_error)
    }

    /// Cell current at `voltage` with an explicit divider tolerance.
    pub fn calc_cell_current_with(&self, voltage: f64, rel_error: f64) -> Result<f64> {
        series_current(
            self.selector()?.as_ref(),
            self.instant_resistance(),
            voltage,
            rel_error,
        )
    }

    /// Voltage needed to drive `current` through the cell.
    ///
    /// Brackets the answer by doubling a ±5 V guess, then bisects. Running out
    /// of resolution is reported through [`VoltageEstimate::converged`].
    pub fn calc_cell_voltage(&self, current: f64) -> Result<VoltageEstimate> {
        if current == 0.0 {
            return Ok(VoltageEstimate {
                voltage: 0.0,
                converged: true,
            });
        }

        let target = current.abs();
        let tolerance = self.params.max_current_relative_error;

        let mut high = INITIAL_VOLTAGE_GUESS;
        let mut doublings = 0;
        while self.calc_cell_current(high)? < target {
            if doublings == MAX_GUESS_DOUBLINGS {
                warn!(current, voltage = high, "requested current exceeds what the cell can carry");
                return Ok(VoltageEstimate {
                    voltage: high.copysign(current),
                    converged: false,
                });
            }
            high *= 2.0;
            doublings += 1;
        }

        let mut low = 0.0;
        let mut best = high;
        while high - low >= MIN_VOLTAGE_STEP {
            let mid = 0.5 * (low + high);
            let i = self.calc_cell_current(mid)?;
            best = mid;
            if (i - target).abs() <= tolerance * target {
                return Ok(VoltageEstimate {
                    voltage: mid.copysign(current),
                    converged: true,
                });
            }
            if i < target {
                low = mid;
            } else {
                high = mid;
            }
        }

        warn!(current, voltage = best, "cell voltage inversion lost resolution before converging");
        Ok(VoltageEstimate {
            voltage: best.copysign(current),
            converged: false,
        })
    }

    /// Tabulate the cell characteristic for both resistance states.
    pub fn build_cell_ixv(&mut self, initial_step: f64, max_rel_error: f64) -> Result<()> {
        let selector = Arc::clone(self.selector()?);
        let max_current = selector.max_current();

        let tabulate = |resistance: f64| {
            IxVCurve::sample(
                |v| series_current(selector.as_ref(), resistance, v, TABLE_RELATIVE_ERROR),
                max_current,
                initial_step,
                max_rel_error,
            )
        };
        let hrs = tabulate(self.params.hrs_resistance)?;
        let lrs = tabulate(self.params.lrs_resistance)?;
        debug!(
            selector = selector.name(),
            hrs_points = hrs.len(),
            lrs_points = lrs.len(),
            "tabulated cell IxV curves"
        );

        self.curves = Some(CellCurves { hrs, lrs });
        Ok(())
    }

    /// Tabulate with the default sampler settings.
    pub fn build_default_ixv(&mut self) -> Result<()> {
        self.build_cell_ixv(DEFAULT_TABLE_STEP, DEFAULT_TABLE_TOLERANCE)
    }

    /// Whether tables are available.
    pub fn has_curves(&self) -> bool {
        self.curves.is_some()
    }

    /// Table of the active state.
    pub fn curve(&self) -> Result<&IxVCurve> {
        self.curve_in(self.state)
    }

    /// Table of the given state.
    pub fn curve_in(&self, state: ResistanceState) -> Result<&IxVCurve> {
        let curves = self.curves.as_ref().ok_or_else(|| {
            XbarError::model_selection("cell IxV tables missing or invalidated by a parameter change")
        })?;
        Ok(match state {
            ResistanceState::High => &curves.hrs,
            ResistanceState::Low => &curves.lrs,
        })
    }

    /// Tabulated cell current at `voltage`.
    pub fn get_cell_current(&self, voltage: f64) -> Result<f64> {
        Ok(self.curve()?.current(voltage))
    }

    /// Tabulated cell voltage at `current`.
    pub fn get_cell_voltage(&self, current: f64) -> Result<f64> {
        Ok(self.curve()?.voltage(current))
    }

    /// A copy of this cell with `extra` ohms in series with the memristor.
    ///
    /// Used for the lumped worst-case half-selected cells. The copy has no
    /// tables yet.
    pub fn with_series_resistance(&self, extra: f64) -> Result<Self> {
        let mut params = self.params.clone();
        params.hrs_resistance += extra;
        params.lrs_resistance += extra;
        validate_params(&params)?;
        Ok(Self {
            params,
            state: self.state,
            selector: self.selector.clone(),
            curves: None,
        })
    }

    /// Set switching time at `voltage` across the cell (s).
    pub fn set_time_at(&self, voltage: f64) -> f64 {
        self.switching_time(self.params.set_time, self.params.set_voltage, voltage)
    }

    /// Reset switching time at `voltage` across the cell (s).
    pub fn reset_time_at(&self, voltage: f64) -> f64 {
        self.switching_time(self.params.reset_time, self.params.reset_voltage, voltage)
    }

    /// Switching slows tenfold for every `switching_voltage_per_decade` below nominal.
    fn switching_time(&self, nominal_time: f64, nominal_voltage: f64, voltage: f64) -> f64 {
        let decades = (nominal_voltage - voltage.abs()) / self.params.switching_voltage_per_decade;
        nominal_time * 10f64.powf(decades)
    }

    /// Cell footprint in units of F².
    pub fn area_f2(&self) -> f64 {
        self.params.cell_area_f2
    }
}

/// Current through a memristor of `resistance` in series with `selector`.
fn series_current(
    selector: &dyn Selector,
    resistance: f64,
    voltage: f64,
    rel_error: f64,
) -> Result<f64> {
    if let Some(current) = selector.series_current(voltage, resistance) {
        return Ok(current);
    }
    if voltage == 0.0 {
        return Ok(0.0);
    }

    let v_abs = voltage.abs();
    let mut v_mem = v_abs / 2.0;
    let mut step = v_abs / 4.0;
    let mut mismatch = f64::INFINITY;

    for _ in 0..MAX_BISECTION_STEPS {
        let i_mem = v_mem / resistance;
        let i_sel = selector.current(v_abs - v_mem);
        let scale = i_mem.abs().max(i_sel.abs());
        mismatch = if scale > 0.0 {
            (i_mem - i_sel).abs() / scale
        } else {
            0.0
        };

        if mismatch <= rel_error {
            return Ok((0.5 * (i_mem + i_sel)).copysign(voltage));
        }
        // Too much current through the memristor means it holds too much voltage
        if i_mem > i_sel {
            v_mem -= step;
        } else {
            v_mem += step;
        }
        step /= 2.0;
    }

    Err(XbarError::convergence_failure(
        "memristor/selector divider",
        MAX_BISECTION_STEPS,
        mismatch,
    ))
}

fn validate_params(params: &CellParams) -> Result<()> {
    let positive = |name: &str, value: f64| {
        if value > 0.0 && value.is_finite() {
            Ok(())
        } else {
            Err(XbarError::configuration(
                name,
                format!("must be positive and finite, got {value}"),
            ))
        }
    };

    positive("lrs_resistance", params.lrs_resistance)?;
    positive("hrs_resistance", params.hrs_resistance)?;
    if params.hrs_resistance <= params.lrs_resistance {
        return Err(XbarError::configuration(
            "hrs_resistance",
            format!(
                "must exceed lrs_resistance ({} <= {})",
                params.hrs_resistance, params.lrs_resistance
            ),
        ));
    }
    positive("max_current_relative_error", params.max_current_relative_error)?;
    positive("set_voltage", params.set_voltage)?;
    positive("reset_voltage", params.reset_voltage)?;
    positive("read_voltage", params.read_voltage)?;
    positive("set_time", params.set_time)?;
    positive("reset_time", params.reset_time)?;
    positive("switching_voltage_per_decade", params.switching_voltage_per_decade)?;
    positive("cell_area_f2", params.cell_area_f2)?;
    if let Some(current) = params.set_compliance_current {
        positive("set_compliance_current", current)?;
    }
    Ok(())
}
