//! Selector device models.
//!
//! A selector is the nonlinear two-terminal device placed in series with the
//! memristor to suppress sneak current. Every model answers "what current flows
//! for this voltage"; models with a closed-form series solution may also
//! answer for the whole cell directly.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{Result, XbarError};

/// Current-voltage behaviour of a selector device.
pub trait Selector: fmt::Debug + Send + Sync {
    /// Selector current at the given voltage. Odd in voltage.
    fn current(&self, voltage: f64) -> f64;

    /// Largest current the selector can carry.
    fn max_current(&self) -> f64;

    /// Closed-form current of this selector in series with a resistance.
    ///
    /// Returns `None` when the model has no closed form and the caller must
    /// solve the voltage divider numerically.
    fn series_current(&self, _voltage: f64, _resistance: f64) -> Option<f64> {
        None
    }

    /// Short model name for reports.
    fn name(&self) -> &'static str;
}

/// Threshold selector: leakage below the snap voltage, saturated above it.
#[derive(Debug, Clone, PartialEq)]
pub struct SemiIdeal {
    pub snap_voltage: f64,
    pub leakage_current: f64,
    pub max_current: f64,
}

impl SemiIdeal {
    /// Create a semi-ideal selector, validating its parameters.
    pub fn new(snap_voltage: f64, leakage_current: f64, max_current: f64) -> Result<Self> {
        if !(snap_voltage > 0.0 && snap_voltage.is_finite()) {
            return Err(XbarError::configuration(
                "snap_voltage",
                format!("must be positive and finite, got {snap_voltage}"),
            ));
        }
        if !(leakage_current > 0.0) {
            return Err(XbarError::configuration(
                "leakage_current",
                format!("must be positive, got {leakage_current}"),
            ));
        }
        if !(max_current > leakage_current && max_current.is_finite()) {
            return Err(XbarError::configuration(
                "max_current",
                format!("must exceed the leakage current {leakage_current}, got {max_current}"),
            ));
        }
        Ok(Self {
            snap_voltage,
            leakage_current,
            max_current,
        })
    }
}

impl Selector for SemiIdeal {
    fn current(&self, voltage: f64) -> f64 {
        if voltage == 0.0 {
            return 0.0;
        }
        let magnitude = if voltage.abs() < self.snap_voltage {
            self.leakage_current
        } else {
            self.max_current
        };
        magnitude.copysign(voltage)
    }

    fn max_current(&self) -> f64 {
        self.max_current
    }

    fn series_current(&self, voltage: f64, resistance: f64) -> Option<f64> {
        let v_abs = voltage.abs();
        if v_abs == 0.0 {
            return Some(0.0);
        }

        let mut current = v_abs / resistance;
        if current >= self.leakage_current {
            current = if v_abs < self.snap_voltage {
                self.leakage_current
            } else {
                ((v_abs - self.snap_voltage) / resistance)
                    .clamp(self.leakage_current, self.max_current)
            };
        }
        Some(current.copysign(voltage))
    }

    fn name(&self) -> &'static str {
        "semi-ideal"
    }
}

/// Selector described by a measured IxV table (positive half only).
#[derive(Debug, Clone, PartialEq)]
pub struct TabulatedIxV {
    voltages: Vec<f64>,
    currents: Vec<f64>,
}

impl TabulatedIxV {
    /// Create a tabulated selector.
    ///
    /// The table must start at the origin and be strictly ascending in both
    /// voltage and current.
    pub fn new(voltages: Vec<f64>, currents: Vec<f64>) -> Result<Self> {
        const WHAT: &str = "selector IxV table";

        if voltages.len() != currents.len() {
            return Err(XbarError::domain_invariant(
                WHAT,
                format!(
                    "{} voltages but {} currents",
                    voltages.len(),
                    currents.len()
                ),
            ));
        }
        if voltages.len() < 2 {
            return Err(XbarError::domain_invariant(WHAT, "needs at least two points"));
        }
        if voltages[0] != 0.0 || currents[0] != 0.0 {
            return Err(XbarError::domain_invariant(WHAT, "must start at (0, 0)"));
        }
        for k in 1..voltages.len() {
            if !(voltages[k] > voltages[k - 1]) {
                return Err(XbarError::domain_invariant(
                    WHAT,
                    format!("voltage not ascending at point {k}"),
                ));
            }
            if !(currents[k] > currents[k - 1]) {
                return Err(XbarError::domain_invariant(
                    WHAT,
                    format!("current not ascending at point {k}"),
                ));
            }
        }

        Ok(Self { voltages, currents })
    }

    /// Tabulated voltages (V).
    pub fn voltages(&self) -> &[f64] {
        &self.voltages
    }

    /// Tabulated currents (A).
    pub fn currents(&self) -> &[f64] {
        &self.currents
    }
}

impl Selector for TabulatedIxV {
    fn current(&self, voltage: f64) -> f64 {
        interpolate(&self.voltages, &self.currents, voltage.abs()).copysign(voltage)
    }

    fn max_current(&self) -> f64 {
        self.currents[self.currents.len() - 1]
    }

    fn name(&self) -> &'static str {
        "tabulated"
    }
}

/// Linear interpolation in an ascending table.
///
/// Finds the lowest index whose abscissa strictly exceeds `x`; past the end of
/// the table the last ordinate is returned. `xs` must start at or below `x`.
pub(crate) fn interpolate(xs: &[f64], ys: &[f64], x: f64) -> f64 {
    let upper = xs.partition_point(|&p| p <= x);
    if upper >= xs.len() {
        return ys[ys.len() - 1];
    }
    if upper == 0 {
        return ys[0];
    }
    let (x0, x1) = (xs[upper - 1], xs[upper]);
    let (y0, y1) = (ys[upper - 1], ys[upper]);
    y0 + (y1 - y0) * (x - x0) / (x1 - x0)
}

/// Serializable selector choice, as written in configuration files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SelectorModel {
    SemiIdeal {
        snap_voltage: f64,
        leakage_current: f64,
        max_current: f64,
    },
    Tabulated {
        voltages: Vec<f64>,
        currents: Vec<f64>,
    },
}

impl SelectorModel {
    /// Instantiate the configured selector.
    pub fn build(&self) -> Result<Arc<dyn Selector>> {
        match self {
            SelectorModel::SemiIdeal {
                snap_voltage,
                leakage_current,
                max_current,
            } => Ok(Arc::new(SemiIdeal::new(
                *snap_voltage,
                *leakage_current,
                *max_current,
            )?)),
            SelectorModel::Tabulated { voltages, currents } => Ok(Arc::new(TabulatedIxV::new(
                voltages.clone(),
                currents.clone(),
            )?)),
        }
    }
}
