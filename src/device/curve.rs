//! Tabulated cell IxV curves.
//!
//! A curve stores the positive half of a cell's current-voltage
//! characteristic as ascending (voltage, current) pairs starting at the
//! origin. Lookups are a binary search plus linear interpolation; the
//! negative half follows from odd symmetry.

use crate::error::{Result, XbarError};

use super::selector::interpolate;

/// Smallest step the adaptive sampler refines down to (V).
pub const MIN_SAMPLE_STEP: f64 = 1e-9;

/// Upper bound on the number of points in one curve.
pub const MAX_CURVE_POINTS: usize = 200_000;

/// Relative slack when deciding the sampled current reached the maximum.
const SATURATION_SLACK: f64 = 1e-9;

/// Ascending IxV table for one resistance state.
#[derive(Debug, Clone, PartialEq)]
pub struct IxVCurve {
    voltages: Vec<f64>,
    currents: Vec<f64>,
}

impl IxVCurve {
    /// Create a curve from raw points.
    ///
    /// Voltages must be strictly ascending, currents non-decreasing, and the
    /// first point must be the origin.
    pub fn new(voltages: Vec<f64>, currents: Vec<f64>) -> Result<Self> {
        const WHAT: &str = "cell IxV curve";

        if voltages.len() != currents.len() || voltages.len() < 2 {
            return Err(XbarError::domain_invariant(
                WHAT,
                "needs matching voltage and current columns with at least two points",
            ));
        }
        if voltages[0] != 0.0 || currents[0] != 0.0 {
            return Err(XbarError::domain_invariant(WHAT, "must start at (0, 0)"));
        }
        for k in 1..voltages.len() {
            if !(voltages[k] > voltages[k - 1]) || currents[k] < currents[k - 1] {
                return Err(XbarError::domain_invariant(
                    WHAT,
                    format!("not monotonic at point {k}"),
                ));
            }
        }

        Ok(Self { voltages, currents })
    }

    /// Sample `cell_current` adaptively from the origin until `max_current`.
    ///
    /// Each new point is compared against the straight-line extrapolation of
    /// the two before it. A small error means the curve is locally linear and
    /// the step doubles; a large one rejects the point and retries with half
    /// the step, down to [`MIN_SAMPLE_STEP`].
    pub fn sample<F>(
        mut cell_current: F,
        max_current: f64,
        initial_step: f64,
        max_rel_error: f64,
    ) -> Result<Self>
    where
        F: FnMut(f64) -> Result<f64>,
    {
        if !(initial_step > 0.0) || !(max_rel_error > 0.0) {
            return Err(XbarError::configuration(
                "ixv_sampling",
                format!("step {initial_step} and tolerance {max_rel_error} must be positive"),
            ));
        }

        let mut voltages = vec![0.0];
        let mut currents = vec![0.0];
        let mut step = initial_step.max(MIN_SAMPLE_STEP);

        while voltages.len() < MAX_CURVE_POINTS {
            let last = voltages.len() - 1;
            let v = voltages[last] + step;
            let i = cell_current(v)?;

            if last >= 1 {
                let (v0, v1) = (voltages[last - 1], voltages[last]);
                let (i0, i1) = (currents[last - 1], currents[last]);
                let predicted = i1 + (i1 - i0) * (v - v1) / (v1 - v0);
                let rel_error = if i != 0.0 {
                    ((i - predicted) / i).abs()
                } else {
                    0.0
                };

                if rel_error >= max_rel_error && step > MIN_SAMPLE_STEP {
                    step = (step / 2.0).max(MIN_SAMPLE_STEP);
                    continue;
                }
                if rel_error < max_rel_error {
                    step *= 2.0;
                }
            }

            // Guard the non-decreasing invariant against bisection noise
            voltages.push(v);
            currents.push(i.max(currents[last]));

            if i >= max_current * (1.0 - SATURATION_SLACK) {
                return Ok(Self { voltages, currents });
            }
        }

        Err(XbarError::convergence_failure(
            "IxV curve sampling",
            MAX_CURVE_POINTS,
            currents[currents.len() - 1] / max_current,
        ))
    }

    /// Current at `voltage` (A). Saturates at the last tabulated current.
    pub fn current(&self, voltage: f64) -> f64 {
        if voltage == 0.0 {
            return 0.0;
        }
        interpolate(&self.voltages, &self.currents, voltage.abs()).copysign(voltage)
    }

    /// Voltage at `current` (V). Saturates at the last tabulated voltage.
    pub fn voltage(&self, current: f64) -> f64 {
        if current == 0.0 {
            return 0.0;
        }
        interpolate(&self.currents, &self.voltages, current.abs()).copysign(current)
    }

    /// Tabulated voltages.
    pub fn voltages(&self) -> &[f64] {
        &self.voltages
    }

    /// Tabulated currents.
    pub fn currents(&self) -> &[f64] {
        &self.currents
    }

    /// Number of points.
    pub fn len(&self) -> usize {
        self.voltages.len()
    }

    /// Whether the curve has no points (never true for a valid curve).
    pub fn is_empty(&self) -> bool {
        self.voltages.is_empty()
    }

    /// Last tabulated current.
    pub fn max_current(&self) -> f64 {
        self.currents[self.currents.len() - 1]
    }
}
