//! Forward and inverse sneak-path relaxation.

use serde::Serialize;
use tracing::{debug, trace};

use crate::array::{CrossbarArray, Operation};
use crate::error::{Result, XbarError};

use super::workspace::Workspace;
use super::{relative_change, Damping, MAGNITUDE_FLOOR};

/// Relative mismatch tolerated between the line currents at the selected
/// cell and the current its IV curve gives.
pub const CONSERVATION_TOLERANCE: f64 = 1e-3;

/// Absolute slack of the conservation check (A).
const CONSERVATION_FLOOR: f64 = 1e-15;

/// Converged operating point of one operation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SneakPathSolution {
    pub operation: Operation,
    /// Positive-line driver voltage (V)
    pub driver_voltage: f64,
    /// Negative-line driver voltage (V)
    pub negative_line_voltage: f64,
    /// Voltage across the selected cell (V)
    pub selected_cell_voltage: f64,
    /// Current through the selected cell (A)
    pub selected_cell_current: f64,
    /// Total current through half-selected cells (A)
    pub sneak_current: f64,
    /// Current drawn from the positive-line driver (A)
    pub driver_current: f64,
    pub iterations: usize,
}

/// Negative-line bias of `operation`.
fn negative_line_bias(operation: Operation, v_half: Option<f64>) -> Result<f64> {
    match (operation.is_calibration(), v_half) {
        (true, Some(v)) if v.is_finite() => Ok(v),
        (true, Some(v)) => Err(XbarError::configuration(
            "v_half",
            format!("must be finite, got {v}"),
        )),
        (true, None) => Err(XbarError::configuration(
            "v_half",
            format!("{operation} biases the negative line and needs a voltage"),
        )),
        (false, None) => Ok(0.0),
        (false, Some(_)) => Err(XbarError::configuration(
            "v_half",
            format!("{operation} grounds the negative line"),
        )),
    }
}

fn check_finite(parameter: &str, value: f64) -> Result<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(XbarError::configuration(parameter, format!("must be finite, got {value}")))
    }
}

/// Solve for the voltage across the selected cell when the positive line is
/// driven at `v_p`.
///
/// `v_half` is the negative-line bias of calibration operations and must be
/// `None` for every other operation.
pub fn calc_v_selected_cell(
    array: &CrossbarArray,
    v_p: f64,
    v_half: Option<f64>,
    operation: Operation,
) -> Result<SneakPathSolution> {
    check_finite("v_p", v_p)?;
    let v_n = negative_line_bias(operation, v_half)?;
    let config = array.solver_config();

    let mut ws = Workspace::new(array, operation)?;
    ws.seed(v_p, v_n);
    let v_u = 0.5 * (v_p + v_n);
    let last = ws.n_pl_segments() - 1;

    let mut damping = Damping::new();
    let mut v_sc = 0.0;
    let mut previous_sneak = 0.0;
    let mut residual = f64::INFINITY;

    for iteration in 1..=config.max_iterations {
        ws.settle_half_selected(v_u, damping.slow_down())?;
        ws.update_nl_from_driver(v_n);
        ws.update_pl_from_driver(v_p);

        let estimate = ws.v_pl[last] - ws.v_nl[0];
        v_sc = damping.step(v_sc, estimate);
        let i_sc = ws.selected.get_cell_current(v_sc)?;
        ws.set_selected_current(i_sc);
        ws.update_nl_from_driver(v_n);
        ws.update_pl_from_driver(v_p);

        let across = ws.v_pl[last] - ws.v_nl[0];
        residual = (across - v_sc).abs() / v_sc.abs().max(MAGNITUDE_FLOOR);
        let sneak = ws.sneak_current();
        let sneak_change = relative_change(previous_sneak, sneak);
        previous_sneak = sneak;
        trace!(iteration, v_sc, residual, sneak, slow_down = damping.slow_down());

        if residual < config.tolerance && sneak_change < config.tolerance {
            let solution = finish(&ws, v_p, v_n, v_sc, iteration, config.tolerance)?;
            debug!(
                %operation,
                v_p,
                v_sc,
                iterations = iteration,
                "selected-cell voltage converged"
            );
            return Ok(solution);
        }
    }

    Err(XbarError::convergence_failure(
        "sneak-path relaxation",
        config.max_iterations,
        residual,
    ))
}

/// Solve for the positive-line driver voltage that puts `v_sc` across the
/// selected cell.
///
/// `v_half` follows the same rule as in [`calc_v_selected_cell`].
pub fn calc_v_edge(
    array: &CrossbarArray,
    v_sc: f64,
    v_half: Option<f64>,
    operation: Operation,
) -> Result<SneakPathSolution> {
    check_finite("v_sc", v_sc)?;
    let v_n = negative_line_bias(operation, v_half)?;
    let config = array.solver_config();

    let mut ws = Workspace::new(array, operation)?;
    let i_sc = ws.selected.get_cell_current(v_sc)?;
    let mut v_p = v_sc + v_n;
    ws.seed(v_p, v_n);
    ws.set_selected_current(i_sc);

    let mut damping = Damping::new();
    let mut previous_sneak = 0.0;
    let mut change = f64::INFINITY;

    for iteration in 1..=config.max_iterations {
        let v_u = 0.5 * (v_p + v_n);
        ws.settle_half_selected(v_u, damping.slow_down())?;
        ws.update_nl_from_driver(v_n);
        let estimate = ws.update_pl_from_selected(ws.v_nl[0] + v_sc);

        let previous = v_p;
        v_p = damping.step(v_p, estimate);
        change = (estimate - previous).abs() / v_p.abs().max(MAGNITUDE_FLOOR);
        let sneak = ws.sneak_current();
        let sneak_change = relative_change(previous_sneak, sneak);
        previous_sneak = sneak;
        trace!(iteration, v_p, change, sneak, slow_down = damping.slow_down());

        if change < config.tolerance && sneak_change < config.tolerance {
            // The line voltages were propagated from the undamped estimate
            let solution = finish(&ws, estimate, v_n, v_sc, iteration, config.tolerance)?;
            debug!(
                %operation,
                v_sc,
                v_p,
                iterations = iteration,
                "driver voltage converged"
            );
            return Ok(solution);
        }
    }

    Err(XbarError::convergence_failure(
        "inverse sneak-path relaxation",
        config.max_iterations,
        change,
    ))
}

/// Check current conservation at the selected cell and package the result.
///
/// The currents measured across the wire segments next to the selected cell
/// must match the cell's IV curve at the voltage the two lines put across
/// it. The slack widens by the current change that twice the relaxation
/// `tolerance`, as a relative voltage error, can cause on the curve.
fn finish(
    ws: &Workspace,
    v_p: f64,
    v_n: f64,
    v_sc: f64,
    iterations: usize,
    tolerance: f64,
) -> Result<SneakPathSolution> {
    let operation = ws.profile.operation;
    let across = ws.v_pl[ws.v_pl.len() - 1] - ws.v_nl[0];
    let margin = 2.0 * tolerance * across.abs().max(MAGNITUDE_FLOOR);
    let cell_current = ws.selected.get_cell_current(across)?;
    let spread = ws.selected.get_cell_current(across + margin)?
        - ws.selected.get_cell_current(across - margin)?;

    for line_current in [
        ws.pl_current_into_selected(v_p),
        ws.nl_current_from_selected(v_n),
    ] {
        let slack = CONSERVATION_TOLERANCE * line_current.abs().max(cell_current.abs())
            + spread.abs()
            + CONSERVATION_FLOOR;
        if !((line_current - cell_current).abs() <= slack) {
            return Err(XbarError::ConservationViolation {
                operation,
                line_current,
                cell_current,
            });
        }
    }

    Ok(SneakPathSolution {
        operation,
        driver_voltage: v_p,
        negative_line_voltage: v_n,
        selected_cell_voltage: v_sc,
        selected_cell_current: ws.selected_current(),
        sneak_current: ws.sneak_current(),
        driver_current: ws.pl_driver_current(),
        iterations,
    })
}
