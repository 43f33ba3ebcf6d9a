//! Per-solve scratch state of the two selection lines.

use crate::array::{CrossbarArray, DriverKind, Operation, OperationProfile};
use crate::device::Cell;
use crate::error::{Result, XbarError};

/// Node voltages, rung currents and ladder resistances of both selection
/// lines for one operation.
///
/// Positive-line node `k` sits `k + 1` wire segments from its driver; the
/// last node holds the selected cell. Negative-line node `0` holds the
/// selected cell and its driver sits past the last node.
#[derive(Debug, Clone)]
pub struct Workspace {
    pub(crate) profile: OperationProfile,
    pub(crate) v_pl: Vec<f64>,
    pub(crate) v_nl: Vec<f64>,
    /// Current leaving the positive line through each rung
    pub(crate) i_pl: Vec<f64>,
    /// Current entering the negative line through each rung
    pub(crate) i_nl: Vec<f64>,
    /// Wire current in the segment feeding each positive-line node
    pub(crate) i_wire_pl: Vec<f64>,
    /// Wire current in the segment draining each negative-line node
    pub(crate) i_wire_nl: Vec<f64>,
    pub(crate) acc_r_pl: Vec<f64>,
    pub(crate) acc_r_nl: Vec<f64>,
    pub(crate) selected: Cell,
    pub(crate) half_selected_pl: Cell,
    pub(crate) half_selected_nl: Cell,
}

impl Workspace {
    /// Build the workspace of `operation` on `array`.
    ///
    /// Fails when the array has no drivers or wire resistance, or when the
    /// cell cannot be tabulated.
    pub fn new(array: &CrossbarArray, operation: Operation) -> Result<Self> {
        let profile = OperationProfile::for_operation(operation);
        let pl = profile.positive_line;
        let nl = profile.negative_line();
        let geometry = array.geometry();
        let n_pl = geometry.cells_on(pl);
        let n_nl = geometry.cells_on(nl);
        if n_pl == 0 || n_nl == 0 {
            return Err(XbarError::configuration(
                "geometry",
                format!("{geometry} array has an empty selection line"),
            ));
        }

        let wire = array.wire_resistance();
        if !(wire > 0.0 && wire.is_finite()) {
            return Err(XbarError::configuration(
                "wire_resistance",
                format!("must be positive and finite, got {wire}"),
            ));
        }
        let r_pl = array.driver_resistance(pl, profile.pl_driver)?;
        let r_nl = array.driver_resistance(nl, profile.nl_driver)?;

        let acc_r_pl: Vec<f64> = (0..n_pl).map(|i| r_pl + (i + 1) as f64 * wire).collect();
        let acc_r_nl: Vec<f64> = (0..n_nl).map(|j| r_nl + (n_nl - j) as f64 * wire).collect();

        let mut selected = array.cell().clone();
        selected.set_resistance_state(profile.selected_state);
        if !selected.has_curves() {
            selected.build_default_ixv()?;
        }

        // A half-selected PL cell reaches its bias through a whole unselected
        // NL-type line and that line's half-bias driver, and vice versa.
        let half_selected = |across: f64| -> Result<Cell> {
            let mut cell = array.cell().with_series_resistance(across)?;
            cell.set_resistance_state(profile.half_selected_state);
            cell.build_default_ixv()?;
            Ok(cell)
        };
        let half_selected_pl =
            half_selected(array.driver_resistance(nl, DriverKind::HalfBias)? + n_nl as f64 * wire)?;
        let half_selected_nl =
            half_selected(array.driver_resistance(pl, DriverKind::HalfBias)? + n_pl as f64 * wire)?;

        Ok(Self {
            profile,
            v_pl: vec![0.0; n_pl],
            v_nl: vec![0.0; n_nl],
            i_pl: vec![0.0; n_pl],
            i_nl: vec![0.0; n_nl],
            i_wire_pl: vec![0.0; n_pl],
            i_wire_nl: vec![0.0; n_nl],
            acc_r_pl,
            acc_r_nl,
            selected,
            half_selected_pl,
            half_selected_nl,
        })
    }

    /// The operation being solved.
    pub fn profile(&self) -> &OperationProfile {
        &self.profile
    }

    pub fn n_pl_segments(&self) -> usize {
        self.v_pl.len()
    }

    pub fn n_nl_segments(&self) -> usize {
        self.v_nl.len()
    }

    /// Resistance from the positive-line driver source to each node (Ω).
    pub fn acc_r_pl(&self) -> &[f64] {
        &self.acc_r_pl
    }

    /// Resistance from each negative-line node to the driver source (Ω).
    pub fn acc_r_nl(&self) -> &[f64] {
        &self.acc_r_nl
    }

    pub fn v_pl(&self) -> &[f64] {
        &self.v_pl
    }

    pub fn v_nl(&self) -> &[f64] {
        &self.v_nl
    }

    /// Selected cell with tables of both states.
    pub fn selected_cell(&self) -> &Cell {
        &self.selected
    }

    /// Lumped worst-case half-selected cell of the positive line.
    pub fn half_selected_pl_cell(&self) -> &Cell {
        &self.half_selected_pl
    }

    /// Lumped worst-case half-selected cell of the negative line.
    pub fn half_selected_nl_cell(&self) -> &Cell {
        &self.half_selected_nl
    }

    /// Flat-line initial guess with no current flowing.
    pub(crate) fn seed(&mut self, v_p: f64, v_n: f64) {
        self.v_pl.fill(v_p);
        self.v_nl.fill(v_n);
        self.i_pl.fill(0.0);
        self.i_nl.fill(0.0);
        self.i_wire_pl.fill(0.0);
        self.i_wire_nl.fill(0.0);
    }

    /// Put `current` through the selected cell.
    pub(crate) fn set_selected_current(&mut self, current: f64) {
        if let Some(last) = self.i_pl.last_mut() {
            *last = current;
        }
        if let Some(first) = self.i_nl.first_mut() {
            *first = current;
        }
    }

    pub(crate) fn selected_current(&self) -> f64 {
        self.i_nl.first().copied().unwrap_or(0.0)
    }

    /// Move half-selected rung currents toward the values implied by the
    /// present node voltages and the unselected-line bias `v_u`.
    ///
    /// The correction is divided by `slow_down`.
    pub(crate) fn settle_half_selected(&mut self, v_u: f64, slow_down: f64) -> Result<()> {
        let n_pl = self.v_pl.len();
        let curve = self.half_selected_pl.curve()?;
        for k in 0..n_pl - 1 {
            let target = curve.current(self.v_pl[k] - v_u);
            self.i_pl[k] += (target - self.i_pl[k]) / slow_down;
        }

        let curve = self.half_selected_nl.curve()?;
        for j in 1..self.v_nl.len() {
            let target = curve.current(v_u - self.v_nl[j]);
            self.i_nl[j] += (target - self.i_nl[j]) / slow_down;
        }
        Ok(())
    }

    /// Sum of all half-selected rung currents on both lines.
    pub(crate) fn sneak_current(&self) -> f64 {
        let n_pl = self.i_pl.len();
        let pl: f64 = self.i_pl[..n_pl - 1].iter().sum();
        let nl: f64 = self.i_nl[1..].iter().sum();
        pl + nl
    }

    /// Recompute negative-line voltages walking in from the driver at `v_n`.
    pub(crate) fn update_nl_from_driver(&mut self, v_n: f64) {
        let n = self.v_nl.len();
        let mut carried = 0.0;
        for j in 0..n {
            carried += self.i_nl[j];
            self.i_wire_nl[j] = carried;
        }

        let mut v = v_n + self.acc_r_nl[n - 1] * self.i_wire_nl[n - 1];
        self.v_nl[n - 1] = v;
        for j in (0..n - 1).rev() {
            v += (self.acc_r_nl[j] - self.acc_r_nl[j + 1]) * self.i_wire_nl[j];
            self.v_nl[j] = v;
        }
    }

    fn accumulate_pl_wire_currents(&mut self) {
        let mut carried = 0.0;
        for k in (0..self.i_pl.len()).rev() {
            carried += self.i_pl[k];
            self.i_wire_pl[k] = carried;
        }
    }

    /// Recompute positive-line voltages walking out from the driver at `v_p`.
    pub(crate) fn update_pl_from_driver(&mut self, v_p: f64) {
        self.accumulate_pl_wire_currents();
        let n = self.v_pl.len();

        let mut v = v_p - self.acc_r_pl[0] * self.i_wire_pl[0];
        self.v_pl[0] = v;
        for k in 1..n {
            v -= (self.acc_r_pl[k] - self.acc_r_pl[k - 1]) * self.i_wire_pl[k];
            self.v_pl[k] = v;
        }
    }

    /// Pin the selected positive-line node at `v_selected`, recompute the
    /// line walking back toward the driver and return the driver voltage
    /// this requires.
    pub(crate) fn update_pl_from_selected(&mut self, v_selected: f64) -> f64 {
        self.accumulate_pl_wire_currents();
        let n = self.v_pl.len();

        let mut v = v_selected;
        self.v_pl[n - 1] = v;
        for k in (1..n).rev() {
            v += (self.acc_r_pl[k] - self.acc_r_pl[k - 1]) * self.i_wire_pl[k];
            self.v_pl[k - 1] = v;
        }
        v + self.acc_r_pl[0] * self.i_wire_pl[0]
    }

    /// Current delivered by the positive line into the selected cell,
    /// measured across the last wire segment.
    pub(crate) fn pl_current_into_selected(&self, v_p: f64) -> f64 {
        let n = self.v_pl.len();
        if n == 1 {
            (v_p - self.v_pl[0]) / self.acc_r_pl[0]
        } else {
            (self.v_pl[n - 2] - self.v_pl[n - 1]) / (self.acc_r_pl[n - 1] - self.acc_r_pl[n - 2])
        }
    }

    /// Current carried away by the negative line from the selected cell,
    /// measured across the first wire segment.
    pub(crate) fn nl_current_from_selected(&self, v_n: f64) -> f64 {
        if self.v_nl.len() == 1 {
            (self.v_nl[0] - v_n) / self.acc_r_nl[0]
        } else {
            (self.v_nl[0] - self.v_nl[1]) / (self.acc_r_nl[0] - self.acc_r_nl[1])
        }
    }

    /// Current drawn from the positive-line driver.
    pub(crate) fn pl_driver_current(&self) -> f64 {
        self.i_wire_pl[0]
    }

    /// Current sunk by the negative-line driver.
    pub(crate) fn nl_driver_current(&self) -> f64 {
        self.i_wire_nl[self.i_wire_nl.len() - 1]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::array::{ArrayDrivers, Geometry, Line};
    use crate::device::fixtures::semi_ideal_params;
    use crate::device::{CellParams, ResistanceState};
    use crate::tech::{Driver, LineDrivers, Technology};
    use approx::assert_relative_eq;

    fn fixed_drivers(write: f64, read: f64, half_bias: f64) -> LineDrivers {
        let driver = |resistance| Driver {
            resistance,
            width: 44e-9,
            stack: 1,
        };
        LineDrivers {
            write: driver(write),
            read: driver(read),
            half_bias: driver(half_bias),
        }
    }

    fn array(n_rows: usize, n_cols: usize, params: CellParams) -> CrossbarArray {
        let mut array = CrossbarArray::new(
            Geometry::new(n_rows, n_cols),
            Cell::new(params).unwrap(),
            Technology::reference(),
        )
        .unwrap();
        array.set_drivers(ArrayDrivers {
            wordline: fixed_drivers(100.0, 300.0, 50.0),
            bitline: fixed_drivers(200.0, 400.0, 60.0),
        });
        array
    }

    #[test]
    fn test_accumulated_resistances() {
        let array = array(3, 4, semi_ideal_params());
        let ws = Workspace::new(&array, Operation::Set).unwrap();

        // Set drives the wordline (4 cells) and grounds the bitline (3 cells)
        assert_eq!(ws.n_pl_segments(), 4);
        assert_eq!(ws.n_nl_segments(), 3);
        assert_relative_eq!(ws.acc_r_pl()[0], 102.0, max_relative = 1e-12);
        assert_relative_eq!(ws.acc_r_pl()[3], 108.0, max_relative = 1e-12);
        // The selected cell is furthest from the NL driver
        assert_relative_eq!(ws.acc_r_nl()[0], 206.0, max_relative = 1e-12);
        assert_relative_eq!(ws.acc_r_nl()[1], 204.0, max_relative = 1e-12);
        assert_relative_eq!(ws.acc_r_nl()[2], 202.0, max_relative = 1e-12);
        for w in ws.acc_r_nl().windows(2) {
            assert!(w[0] > w[1]);
        }
    }

    #[test]
    fn test_reset_uses_bitline_as_positive_line() {
        let array = array(3, 4, semi_ideal_params());
        let ws = Workspace::new(&array, Operation::Reset).unwrap();
        assert_eq!(ws.profile().positive_line, Line::Bitline);
        assert_eq!(ws.n_pl_segments(), 3);
        assert_relative_eq!(ws.acc_r_pl()[0], 202.0, max_relative = 1e-12);
        assert_relative_eq!(ws.acc_r_nl()[0], 108.0, max_relative = 1e-12);
    }

    #[test]
    fn test_read_uses_read_drivers() {
        let array = array(3, 4, semi_ideal_params());
        let ws = Workspace::new(&array, Operation::ReadLrs).unwrap();
        assert_relative_eq!(ws.acc_r_pl()[0], 302.0, max_relative = 1e-12);
        assert_relative_eq!(ws.acc_r_nl()[2], 402.0, max_relative = 1e-12);
    }

    #[test]
    fn test_half_selected_cells_lump_orthogonal_line() {
        let array = array(3, 4, semi_ideal_params());
        let ws = Workspace::new(&array, Operation::Set).unwrap();

        // PL cells see a whole 3-cell bitline and its half-bias driver
        let pl = ws.half_selected_pl_cell();
        assert_relative_eq!(pl.lrs_resistance(), 61224.0 + 60.0 + 6.0, max_relative = 1e-12);
        assert_eq!(pl.resistance_state(), ResistanceState::Low);
        assert!(pl.has_curves());

        let nl = ws.half_selected_nl_cell();
        assert_relative_eq!(nl.lrs_resistance(), 61224.0 + 50.0 + 8.0, max_relative = 1e-12);
        assert_eq!(ws.selected_cell().resistance_state(), ResistanceState::High);
    }

    #[test]
    fn test_line_updates_are_consistent() {
        let array = array(3, 4, semi_ideal_params());
        let mut ws = Workspace::new(&array, Operation::Set).unwrap();
        ws.seed(5.0, 0.0);
        ws.i_pl.copy_from_slice(&[1e-6, 2e-6, 3e-6, 4e-6]);
        ws.update_pl_from_driver(5.0);

        // Driver carries all rung currents
        assert_relative_eq!(ws.pl_driver_current(), 10e-6, max_relative = 1e-12);
        assert_relative_eq!(ws.v_pl()[0], 5.0 - 102.0 * 10e-6, max_relative = 1e-12);
        assert_relative_eq!(ws.pl_current_into_selected(5.0), 4e-6, max_relative = 1e-9);

        // Walking back from the selected node recovers the driver voltage
        let v_last = ws.v_pl()[3];
        let v_p = ws.update_pl_from_selected(v_last);
        assert_relative_eq!(v_p, 5.0, max_relative = 1e-12);
    }

    #[test]
    fn test_missing_drivers_are_reported() {
        let array = CrossbarArray::new(
            Geometry::new(4, 4),
            Cell::new(semi_ideal_params()).unwrap(),
            Technology::reference(),
        )
        .unwrap();
        assert!(matches!(
            Workspace::new(&array, Operation::Set),
            Err(XbarError::ConfigurationError { .. })
        ));
    }
}
