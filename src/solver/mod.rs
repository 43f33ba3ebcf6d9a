//! Sneak-path solver for crosspoint arrays.
//!
//! This module provides the nonlinear electrical engine of the estimator.
//!
//! ## Reduced line model
//!
//! The selected cell sits at the crossing of a positive line (PL, driven
//! high) and a negative line (NL, grounded or half-biased). Every other cell
//! on those two lines is half-selected: one terminal on a selection line, the
//! other on an unselected line held at the midpoint bias through its
//! half-bias driver. Each line is a resistor ladder:
//!
//! ```text
//!  V_p ─ R_drv ─┬─ R_w ─┬─ R_w ─ ... ─┬─ R_w ─┐
//!               │       │             │       │
//!              hs      hs            hs      SC ── NL segment 0 ─ ... ─ R_drv ─ V_n
//! ```
//!
//! The half-selected cells are lumped worst-case cells: the cell's own
//! memristor plus the full orthogonal line and its half-bias driver in
//! series, so the 2-D mesh collapses to two 1-D ladders.
//!
//! ## Relaxation
//!
//! Neither ladder has a closed form because every rung is nonlinear. The
//! solver alternates between settling rung currents from the present node
//! voltages and recomputing node voltages from the accumulated currents,
//! damping the update whenever the iterate starts to oscillate.

mod read;
mod sneak;
mod workspace;

pub use read::{find_best_v_read, ReadPoint, ReadSearchConfig, ReadVoltageSearch};
pub use sneak::{calc_v_edge, calc_v_selected_cell, SneakPathSolution};
pub use workspace::Workspace;

use serde::{Deserialize, Serialize};

use crate::error::{Result, XbarError};

/// Relative convergence tolerance of the relaxation loops.
pub const DEFAULT_TOLERANCE: f64 = 1e-6;

/// Maximum relaxation iterations per solve.
pub const DEFAULT_MAX_ITERATIONS: usize = 5000;

/// Successive estimates closer than this (relative) are taken as settled.
pub const NEAR_EQUAL_TOLERANCE: f64 = 1e-3;

/// Upper bound on the damping divisor.
pub const MAX_SLOW_DOWN: f64 = 1e12;

/// Magnitude under which relative changes are measured against the floor.
pub(crate) const MAGNITUDE_FLOOR: f64 = 1e-30;

/// Configuration for the relaxation loops.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    /// Relative convergence tolerance.
    pub tolerance: f64,
    /// Iteration budget before reporting a convergence failure.
    pub max_iterations: usize,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            tolerance: DEFAULT_TOLERANCE,
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }
}

impl SolverConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the iteration budget.
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Set the relative convergence tolerance.
    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.tolerance > 0.0 && self.tolerance < 1.0) {
            return Err(XbarError::configuration(
                "solver.tolerance",
                format!("must lie in (0, 1), got {}", self.tolerance),
            ));
        }
        if self.max_iterations == 0 {
            return Err(XbarError::configuration(
                "solver.max_iterations",
                "must allow at least one iteration",
            ));
        }
        Ok(())
    }
}

/// Adaptive damping of a scalar fixed-point iterate.
///
/// Corrections are divided by a slow-down factor that doubles every time
/// the correction changes sign. An estimate already within
/// [`NEAR_EQUAL_TOLERANCE`] of the iterate is taken as is.
#[derive(Debug, Clone)]
pub(crate) struct Damping {
    slow_down: f64,
    last_correction: f64,
    started: bool,
}

impl Damping {
    pub(crate) fn new() -> Self {
        Self {
            slow_down: 1.0,
            last_correction: 0.0,
            started: false,
        }
    }

    /// Current slow-down factor.
    pub(crate) fn slow_down(&self) -> f64 {
        self.slow_down
    }

    /// Move `current` toward `estimate`.
    pub(crate) fn step(&mut self, current: f64, estimate: f64) -> f64 {
        let correction = estimate - current;
        let started = std::mem::replace(&mut self.started, true);
        let previous = std::mem::replace(&mut self.last_correction, correction);

        if started && correction.abs() <= NEAR_EQUAL_TOLERANCE * estimate.abs() {
            return estimate;
        }
        if started && correction * previous < 0.0 {
            self.slow_down = (self.slow_down * 2.0).min(MAX_SLOW_DOWN);
        }
        current + correction / self.slow_down
    }
}

/// Relative change between two successive values. Zero when both vanish.
pub(crate) fn relative_change(previous: f64, current: f64) -> f64 {
    if current == previous {
        return 0.0;
    }
    (current - previous).abs() / current.abs().max(MAGNITUDE_FLOOR)
}
