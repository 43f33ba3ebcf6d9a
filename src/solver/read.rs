//! Read-voltage search.
//!
//! Bisects the read voltage between zero and the write voltage. A candidate
//! is rejected when it is disruptive (fast enough to set the cell within a
//! few thousand sensing windows) or when the LRS/HRS current ratio falls
//! short of the target margin.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::array::{CrossbarArray, Operation};
use crate::error::{Result, XbarError};

use super::sneak::{calc_v_selected_cell, SneakPathSolution};

/// Bound on bisection rounds of the read-voltage search.
pub const MAX_READ_SEARCH_STEPS: usize = 64;

/// Settings of the read-voltage search.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReadSearchConfig {
    /// Required `I_sc(LRS) / I_sc(HRS)`
    pub target_ratio: f64,
    /// A read is disruptive when the cell would set within this many sensing delays
    pub disturb_factor: f64,
    /// Relative overshoot of the target ratio accepted as a hit
    pub tolerance: f64,
}

impl Default for ReadSearchConfig {
    fn default() -> Self {
        Self {
            target_ratio: 5.0,
            disturb_factor: 1e3,
            tolerance: 1e-3,
        }
    }
}

impl ReadSearchConfig {
    pub fn with_target_ratio(mut self, target_ratio: f64) -> Self {
        self.target_ratio = target_ratio;
        self
    }

    pub fn with_disturb_factor(mut self, disturb_factor: f64) -> Self {
        self.disturb_factor = disturb_factor;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.target_ratio > 1.0 && self.target_ratio.is_finite()) {
            return Err(XbarError::configuration(
                "read.target_ratio",
                format!("must be finite and above 1, got {}", self.target_ratio),
            ));
        }
        if !(self.disturb_factor > 0.0 && self.disturb_factor.is_finite()) {
            return Err(XbarError::configuration(
                "read.disturb_factor",
                format!("must be positive and finite, got {}", self.disturb_factor),
            ));
        }
        if !(self.tolerance > 0.0 && self.tolerance.is_finite()) {
            return Err(XbarError::configuration(
                "read.tolerance",
                format!("must be positive and finite, got {}", self.tolerance),
            ));
        }
        Ok(())
    }
}

/// A usable read operating point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ReadPoint {
    pub read_voltage: f64,
    /// Achieved `I_sc(LRS) / I_sc(HRS)`
    pub ratio: f64,
    pub hrs: SneakPathSolution,
    pub lrs: SneakPathSolution,
}

/// Outcome of [`find_best_v_read`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ReadVoltageSearch {
    Found(ReadPoint),
    /// No non-disruptive read voltage reaches the target margin
    Infeasible {
        read_voltage: f64,
        achieved_ratio: f64,
        target_ratio: f64,
    },
}

impl ReadVoltageSearch {
    pub fn is_feasible(&self) -> bool {
        matches!(self, ReadVoltageSearch::Found(_))
    }

    /// Turn an infeasible outcome into [`XbarError::InfeasibleDesign`].
    pub fn into_result(self, array: &CrossbarArray) -> Result<ReadPoint> {
        match self {
            ReadVoltageSearch::Found(point) => Ok(point),
            ReadVoltageSearch::Infeasible {
                achieved_ratio,
                target_ratio,
                ..
            } => Err(XbarError::InfeasibleDesign {
                n_rows: array.n_rows(),
                n_cols: array.n_cols(),
                target_ratio,
                achieved_ratio,
            }),
        }
    }
}

/// Sensing margin `I_sc(LRS) / I_sc(HRS)` of a read.
///
/// A read that drives no current through the HRS cell senses nothing and
/// has no margin.
fn read_ratio(hrs: &SneakPathSolution, lrs: &SneakPathSolution) -> f64 {
    if hrs.selected_cell_current > 0.0 {
        lrs.selected_cell_current / hrs.selected_cell_current
    } else {
        0.0
    }
}

/// Search the lowest-margin read voltage that still meets the target ratio
/// without disturbing the cell.
///
/// Starts at the array's write voltage (or the nominal programming voltage
/// when the array has not been programmed yet).
pub fn find_best_v_read(array: &CrossbarArray, config: &ReadSearchConfig) -> Result<ReadVoltageSearch> {
    config.validate()?;
    let cell = array.cell();
    let sensing_delay = array.sensing_delay()?;
    let disturb_time = config.disturb_factor * sensing_delay;
    let target = config.target_ratio;

    let start = array.write_voltage().unwrap_or_else(|| {
        let params = cell.params();
        params.set_voltage.max(params.reset_voltage)
    });
    let mut v_read = start;
    let mut step = 0.5 * start;
    let mut best: Option<ReadPoint> = None;
    let mut last_ratio = 0.0;

    for round in 0..MAX_READ_SEARCH_STEPS {
        let hrs = calc_v_selected_cell(array, v_read, None, Operation::ReadHrs)?;
        let lrs = calc_v_selected_cell(array, v_read, None, Operation::ReadLrs)?;
        let ratio = read_ratio(&hrs, &lrs);
        last_ratio = ratio;
        let disruptive = cell.set_time_at(v_read) < disturb_time;
        debug!(round, v_read, ratio, disruptive, "read voltage candidate");

        match (disruptive, ratio >= target) {
            (false, false) => v_read += step,
            (false, true) => {
                let point = ReadPoint {
                    read_voltage: v_read,
                    ratio,
                    hrs,
                    lrs,
                };
                best = Some(point);
                if (ratio - target) / target < config.tolerance {
                    return Ok(ReadVoltageSearch::Found(point));
                }
                v_read -= step;
            }
            (true, false) => {
                warn!(
                    geometry = %array.geometry(),
                    v_read,
                    ratio,
                    target,
                    "read margin unreachable without disturbing the cell"
                );
                return Ok(ReadVoltageSearch::Infeasible {
                    read_voltage: v_read,
                    achieved_ratio: ratio,
                    target_ratio: target,
                });
            }
            (true, true) => v_read -= step,
        }
        step *= 0.5;
    }

    match best {
        Some(point) => {
            debug!(
                v_read = point.read_voltage,
                ratio = point.ratio,
                "read search budget exhausted, keeping best candidate"
            );
            Ok(ReadVoltageSearch::Found(point))
        }
        None => {
            warn!(geometry = %array.geometry(), "no read voltage met the target ratio");
            Ok(ReadVoltageSearch::Infeasible {
                read_voltage: v_read,
                achieved_ratio: last_ratio,
                target_ratio: target,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::array::Geometry;
    use crate::device::fixtures::semi_ideal_params;
    use crate::device::Cell;
    use crate::tech::Technology;

    fn array(n_rows: usize, n_cols: usize) -> CrossbarArray {
        let mut array = CrossbarArray::new(
            Geometry::new(n_rows, n_cols),
            Cell::new(semi_ideal_params()).unwrap(),
            Technology::reference(),
        )
        .unwrap();
        array.size_drivers().unwrap();
        array
    }

    #[test]
    fn test_finds_read_voltage_just_above_snap() {
        let array = array(16, 16);
        let config = ReadSearchConfig::default().with_target_ratio(5.0);
        let point = match find_best_v_read(&array, &config).unwrap() {
            ReadVoltageSearch::Found(point) => point,
            other => panic!("expected a read point, got {other:?}"),
        };

        // Below the snap voltage both states leak equally
        assert!(point.read_voltage > 3.2 && point.read_voltage < 3.3);
        assert!(point.ratio >= 5.0);
        assert!(point.ratio < 5.0 * (1.0 + 1e-3));
        assert!(array.cell().set_time_at(point.read_voltage) >= 1e3 * array.sensing_delay().unwrap());
    }

    #[test]
    fn test_unreachable_margin_is_infeasible() {
        let array = array(16, 16);
        // LRS/HRS is below 10 even without any line loading
        let config = ReadSearchConfig::default().with_target_ratio(20.0);
        let search = find_best_v_read(&array, &config).unwrap();
        assert!(!search.is_feasible());

        match search.into_result(&array) {
            Err(XbarError::InfeasibleDesign {
                n_rows,
                n_cols,
                target_ratio,
                ..
            }) => {
                assert_eq!((n_rows, n_cols), (16, 16));
                assert_eq!(target_ratio, 20.0);
            }
            other => panic!("expected an infeasible design, got {other:?}"),
        }
    }

    #[test]
    fn test_unsensed_read_has_no_margin() {
        let array = array(4, 4);
        let hrs = calc_v_selected_cell(&array, 0.0, None, Operation::ReadHrs).unwrap();
        let lrs = calc_v_selected_cell(&array, 0.0, None, Operation::ReadLrs).unwrap();
        assert_eq!(hrs.selected_cell_current, 0.0);
        assert_eq!(read_ratio(&hrs, &lrs), 0.0);

        let lrs = SneakPathSolution {
            selected_cell_current: 1e-6,
            ..lrs
        };
        assert_eq!(read_ratio(&hrs, &lrs), 0.0);

        let hrs = calc_v_selected_cell(&array, 3.25, None, Operation::ReadHrs).unwrap();
        let lrs = calc_v_selected_cell(&array, 3.25, None, Operation::ReadLrs).unwrap();
        let ratio = read_ratio(&hrs, &lrs);
        assert!(ratio.is_finite() && ratio > 1.0);
    }

    #[test]
    fn test_rejects_meaningless_target() {
        let array = array(4, 4);
        let config = ReadSearchConfig::default().with_target_ratio(0.5);
        assert!(matches!(
            find_best_v_read(&array, &config),
            Err(XbarError::ConfigurationError { .. })
        ));
    }
}
