//! The crosspoint array: geometry, drivers, observables and rollups.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::device::Cell;
use crate::error::{Result, XbarError};
use crate::solver::{
    self, ReadPoint, ReadSearchConfig, ReadVoltageSearch, SneakPathSolution, SolverConfig,
};
use crate::tech::{size_line_drivers, LineDrivers, Technology};

use super::types::{DriverKind, Geometry, Line, Operation};
use super::validate::{validate_drivers, validate_geometry};

/// Elmore coefficient of a distributed RC line.
pub const LINE_DELAY_FACTOR: f64 = 0.69;

/// Drivers at the end of every wordline and every bitline.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ArrayDrivers {
    pub wordline: LineDrivers,
    pub bitline: LineDrivers,
}

impl ArrayDrivers {
    /// Drivers of one line kind.
    pub fn line(&self, line: Line) -> &LineDrivers {
        match line {
            Line::Wordline => &self.wordline,
            Line::Bitline => &self.bitline,
        }
    }

    /// On-resistance of one driver (Ω).
    pub fn resistance(&self, line: Line, kind: DriverKind) -> f64 {
        let drivers = self.line(line);
        match kind {
            DriverKind::Write => drivers.write.resistance,
            DriverKind::Read => drivers.read.resistance,
            DriverKind::HalfBias => drivers.half_bias.resistance,
        }
    }

    /// Footprint of every driver in the array (m²).
    pub fn area(&self, tech: &Technology, geometry: &Geometry) -> f64 {
        geometry.n_rows as f64 * self.wordline.area(tech)
            + geometry.n_cols as f64 * self.bitline.area(tech)
    }
}

/// Rolled-up figures of a characterized array.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ArrayMetrics {
    pub geometry: Geometry,
    /// Total area (m²)
    pub area: f64,
    /// Area per stored bit (m²)
    pub area_per_bit: f64,
    pub write_voltage: f64,
    pub read_voltage: f64,
    /// LRS/HRS sensing ratio at the read voltage
    pub read_ratio: f64,
    pub set_time: f64,
    pub reset_time: f64,
    pub write_time: f64,
    pub read_time: f64,
    pub set_sc_current: f64,
    pub set_sp_current: f64,
    pub reset_sc_current: f64,
    pub reset_sp_current: f64,
    pub read_sc_current: f64,
    pub read_sp_current: f64,
    pub write_energy: f64,
    pub read_energy: f64,
    pub precharge_energy: f64,
}

/// A crosspoint array of identical cells.
///
/// Observables of the sneak-path solver are recorded per operation whenever
/// a solve runs through the array. Changing the geometry drops the drivers
/// and every recorded observable.
#[derive(Debug, Clone)]
pub struct CrossbarArray {
    geometry: Geometry,
    technology: Technology,
    cell: Cell,
    wire_resistance: f64,
    wire_capacitance: f64,
    drivers: Option<ArrayDrivers>,
    solver: SolverConfig,
    solutions: [Option<SneakPathSolution>; 8],
    read_point: Option<ReadPoint>,
}

impl CrossbarArray {
    /// Create an array and tabulate the cell if needed. Drivers start unsized.
    pub fn new(geometry: Geometry, mut cell: Cell, technology: Technology) -> Result<Self> {
        validate_geometry(&geometry)?;
        technology.validate()?;
        if !cell.has_curves() {
            cell.build_default_ixv()?;
        }

        Ok(Self {
            geometry,
            wire_resistance: technology.wire_resistance_per_cell(),
            wire_capacitance: technology.wire_capacitance_per_cell(),
            technology,
            cell,
            drivers: None,
            solver: SolverConfig::default(),
            solutions: [None; 8],
            read_point: None,
        })
    }

    pub fn with_solver_config(mut self, config: SolverConfig) -> Self {
        self.solver = config;
        self
    }

    pub fn solver_config(&self) -> &SolverConfig {
        &self.solver
    }

    pub fn set_solver_config(&mut self, config: SolverConfig) {
        self.solver = config;
    }

    pub fn geometry(&self) -> Geometry {
        self.geometry
    }

    pub fn n_rows(&self) -> usize {
        self.geometry.n_rows
    }

    pub fn n_cols(&self) -> usize {
        self.geometry.n_cols
    }

    /// Resize the array. Drops drivers and observables.
    pub fn set_n_rows(&mut self, n_rows: usize) -> Result<()> {
        self.resize(Geometry::new(n_rows, self.geometry.n_cols))
    }

    /// Resize the array. Drops drivers and observables.
    pub fn set_n_cols(&mut self, n_cols: usize) -> Result<()> {
        self.resize(Geometry::new(self.geometry.n_rows, n_cols))
    }

    fn resize(&mut self, geometry: Geometry) -> Result<()> {
        validate_geometry(&geometry)?;
        self.geometry = geometry;
        self.drivers = None;
        self.clear_observables();
        Ok(())
    }

    fn clear_observables(&mut self) {
        self.solutions = [None; 8];
        self.read_point = None;
    }

    pub fn cell(&self) -> &Cell {
        &self.cell
    }

    pub fn technology(&self) -> &Technology {
        &self.technology
    }

    /// Line resistance across one cell pitch (Ω).
    pub fn wire_resistance(&self) -> f64 {
        self.wire_resistance
    }

    /// Line capacitance across one cell pitch (F).
    pub fn wire_capacitance(&self) -> f64 {
        self.wire_capacitance
    }

    pub fn drivers(&self) -> Option<&ArrayDrivers> {
        self.drivers.as_ref()
    }

    /// Install explicit drivers. Drops observables.
    pub fn set_drivers(&mut self, drivers: ArrayDrivers) {
        self.drivers = Some(drivers);
        self.clear_observables();
    }

    /// Size wordline and bitline drivers for the current geometry.
    pub fn size_drivers(&mut self) -> Result<()> {
        let wordline = size_line_drivers(&self.technology, &self.cell, self.geometry.n_cols)?;
        let bitline = size_line_drivers(&self.technology, &self.cell, self.geometry.n_rows)?;
        debug!(
            geometry = %self.geometry,
            wl_write = wordline.write.resistance,
            bl_write = bitline.write.resistance,
            "sized line drivers"
        );
        self.set_drivers(ArrayDrivers { wordline, bitline });
        Ok(())
    }

    fn sized_drivers(&self) -> Result<&ArrayDrivers> {
        let drivers = self.drivers.as_ref().ok_or_else(|| {
            XbarError::configuration("drivers", "array drivers have not been sized")
        })?;
        validate_drivers(drivers)?;
        Ok(drivers)
    }

    /// On-resistance of one driver (Ω).
    pub fn driver_resistance(&self, line: Line, kind: DriverKind) -> Result<f64> {
        Ok(self.sized_drivers()?.resistance(line, kind))
    }

    // ============ Solves ============

    /// Solve the selected-cell voltage at driver voltage `v_p` and record it.
    pub fn calc_v_selected_cell(
        &mut self,
        v_p: f64,
        v_half: Option<f64>,
        operation: Operation,
    ) -> Result<SneakPathSolution> {
        let solution = solver::calc_v_selected_cell(self, v_p, v_half, operation)?;
        self.solutions[operation.index()] = Some(solution);
        Ok(solution)
    }

    /// Solve the driver voltage that puts `v_sc` across the selected cell and
    /// record it.
    pub fn calc_v_edge(
        &mut self,
        v_sc: f64,
        v_half: Option<f64>,
        operation: Operation,
    ) -> Result<SneakPathSolution> {
        let solution = solver::calc_v_edge(self, v_sc, v_half, operation)?;
        self.solutions[operation.index()] = Some(solution);
        Ok(solution)
    }

    /// Find the driver voltages that deliver the nominal set and reset
    /// voltages to the selected cell.
    pub fn program(&mut self) -> Result<()> {
        let params = self.cell.params();
        let (v_set, v_reset) = (params.set_voltage, params.reset_voltage);
        self.calc_v_edge(v_set, None, Operation::Set)?;
        self.calc_v_edge(v_reset, None, Operation::Reset)?;
        Ok(())
    }

    /// Search a read voltage and record it when one is found.
    pub fn find_read_voltage(&mut self, config: &ReadSearchConfig) -> Result<ReadVoltageSearch> {
        let search = solver::find_best_v_read(self, config)?;
        if let ReadVoltageSearch::Found(point) = search {
            self.solutions[Operation::ReadHrs.index()] = Some(point.hrs);
            self.solutions[Operation::ReadLrs.index()] = Some(point.lrs);
            self.read_point = Some(point);
        }
        Ok(search)
    }

    /// Last recorded solution of `operation`.
    pub fn solution(&self, operation: Operation) -> Option<&SneakPathSolution> {
        self.solutions[operation.index()].as_ref()
    }

    fn require(&self, operation: Operation) -> Result<&SneakPathSolution> {
        self.solution(operation).ok_or_else(|| {
            XbarError::configuration(
                operation.tag(),
                format!("{operation} has not been solved on this array"),
            )
        })
    }

    fn require_read_point(&self) -> Result<&ReadPoint> {
        self.read_point
            .as_ref()
            .ok_or_else(|| XbarError::configuration("read_voltage", "no read voltage selected"))
    }

    // ============ Observables ============

    /// Driver voltage needed by the harder of set and reset.
    pub fn write_voltage(&self) -> Option<f64> {
        let set = self.solution(Operation::Set)?.driver_voltage;
        let reset = self.solution(Operation::Reset)?.driver_voltage;
        Some(set.max(reset))
    }

    pub fn read_voltage(&self) -> Option<f64> {
        self.read_point.map(|point| point.read_voltage)
    }

    pub fn set_sc_current(&self) -> Option<f64> {
        self.solution(Operation::Set).map(|s| s.selected_cell_current)
    }

    pub fn set_sp_current(&self) -> Option<f64> {
        self.solution(Operation::Set).map(|s| s.sneak_current)
    }

    pub fn reset_sc_current(&self) -> Option<f64> {
        self.solution(Operation::Reset).map(|s| s.selected_cell_current)
    }

    pub fn reset_sp_current(&self) -> Option<f64> {
        self.solution(Operation::Reset).map(|s| s.sneak_current)
    }

    /// Sensing current of an LRS cell at the read voltage.
    pub fn read_sc_current(&self) -> Option<f64> {
        self.solution(Operation::ReadLrs).map(|s| s.selected_cell_current)
    }

    /// Larger sneak current of the two read cases.
    pub fn read_sp_current(&self) -> Option<f64> {
        let hrs = self.solution(Operation::ReadHrs)?.sneak_current;
        let lrs = self.solution(Operation::ReadLrs)?.sneak_current;
        Some(hrs.max(lrs))
    }

    // ============ Rollups ============

    /// Cell and driver area (m²).
    pub fn area(&self) -> Result<f64> {
        let f = self.technology.feature_size;
        let cells = self.geometry.capacity() as f64 * self.cell.area_f2() * f * f;
        Ok(cells + self.sized_drivers()?.area(&self.technology, &self.geometry))
    }

    /// Elmore delay of one line charged through one of its drivers (s).
    pub fn line_delay(&self, line: Line, kind: DriverKind) -> Result<f64> {
        let n = self.geometry.cells_on(line) as f64;
        let capacitance = n * self.wire_capacitance;
        let wire = n * self.wire_resistance;
        let driver = self.driver_resistance(line, kind)?;
        Ok(LINE_DELAY_FACTOR * (driver * capacitance + wire * capacitance / 2.0))
    }

    fn write_line_delay(&self) -> Result<f64> {
        Ok(self.line_delay(Line::Wordline, DriverKind::Write)?
            + self.line_delay(Line::Bitline, DriverKind::Write)?)
    }

    /// Time from read activation until the sense amplifier resolves (s).
    pub fn sensing_delay(&self) -> Result<f64> {
        Ok(self.line_delay(Line::Wordline, DriverKind::Read)?
            + self.line_delay(Line::Bitline, DriverKind::Read)?
            + self.technology.sense_amp_delay)
    }

    pub fn set_time(&self) -> Result<f64> {
        let v_sc = self.require(Operation::Set)?.selected_cell_voltage;
        Ok(self.cell.set_time_at(v_sc) + self.write_line_delay()?)
    }

    pub fn reset_time(&self) -> Result<f64> {
        let v_sc = self.require(Operation::Reset)?.selected_cell_voltage;
        Ok(self.cell.reset_time_at(v_sc) + self.write_line_delay()?)
    }

    pub fn write_time(&self) -> Result<f64> {
        Ok(self.set_time()?.max(self.reset_time()?))
    }

    pub fn read_time(&self) -> Result<f64> {
        self.sensing_delay()
    }

    fn operation_energy(solution: &SneakPathSolution, duration: f64) -> f64 {
        solution.driver_voltage
            * (solution.selected_cell_current + solution.sneak_current)
            * duration
    }

    /// Energy of the costlier write (J).
    pub fn write_energy(&self) -> Result<f64> {
        let set = Self::operation_energy(self.require(Operation::Set)?, self.set_time()?);
        let reset = Self::operation_energy(self.require(Operation::Reset)?, self.reset_time()?);
        Ok(set.max(reset))
    }

    /// Energy of the costlier read (J).
    pub fn read_energy(&self) -> Result<f64> {
        let duration = self.read_time()?;
        let hrs = Self::operation_energy(self.require(Operation::ReadHrs)?, duration);
        let lrs = Self::operation_energy(self.require(Operation::ReadLrs)?, duration);
        Ok(hrs.max(lrs))
    }

    /// Energy to precharge one wordline and one bitline to the read voltage (J).
    pub fn precharge_energy(&self) -> Result<f64> {
        let v_read = self.require_read_point()?.read_voltage;
        let lines = (self.geometry.n_rows + self.geometry.n_cols) as f64;
        Ok(lines * self.wire_capacitance * v_read * v_read)
    }

    /// Collect every rollup. Needs drivers, a programmed array and a read
    /// voltage.
    pub fn metrics(&self) -> Result<ArrayMetrics> {
        let read = self.require_read_point()?;
        let set = self.require(Operation::Set)?;
        let reset = self.require(Operation::Reset)?;
        let area = self.area()?;

        Ok(ArrayMetrics {
            geometry: self.geometry,
            area,
            area_per_bit: area / self.geometry.capacity() as f64,
            write_voltage: set.driver_voltage.max(reset.driver_voltage),
            read_voltage: read.read_voltage,
            read_ratio: read.ratio,
            set_time: self.set_time()?,
            reset_time: self.reset_time()?,
            write_time: self.write_time()?,
            read_time: self.read_time()?,
            set_sc_current: set.selected_cell_current,
            set_sp_current: set.sneak_current,
            reset_sc_current: reset.selected_cell_current,
            reset_sp_current: reset.sneak_current,
            read_sc_current: read.lrs.selected_cell_current,
            read_sp_current: read.hrs.sneak_current.max(read.lrs.sneak_current),
            write_energy: self.write_energy()?,
            read_energy: self.read_energy()?,
            precharge_energy: self.precharge_energy()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::fixtures::semi_ideal_params;
    use approx::assert_relative_eq;

    fn array(n_rows: usize, n_cols: usize) -> CrossbarArray {
        CrossbarArray::new(
            Geometry::new(n_rows, n_cols),
            Cell::new(semi_ideal_params()).unwrap(),
            Technology::reference(),
        )
        .unwrap()
    }

    #[test]
    fn test_reference_line_parameters() {
        let mut array = array(1024, 2048);
        assert_relative_eq!(array.wire_resistance(), 2.0, max_relative = 1e-12);
        array.size_drivers().unwrap();
        let r = array.driver_resistance(Line::Wordline, DriverKind::Write).unwrap();
        assert_relative_eq!(r, 1761.96, max_relative = 1e-3);
        // Bitlines hold fewer cells, so they need less drive
        let r_bl = array.driver_resistance(Line::Bitline, DriverKind::Write).unwrap();
        assert!(r_bl > r);
    }

    #[test]
    fn test_rejects_empty_geometry() {
        let result = CrossbarArray::new(
            Geometry::new(0, 8),
            Cell::new(semi_ideal_params()).unwrap(),
            Technology::reference(),
        );
        assert!(matches!(result, Err(XbarError::ConfigurationError { .. })));
    }

    #[test]
    fn test_resize_drops_drivers_and_observables() {
        let mut array = array(8, 8);
        array.size_drivers().unwrap();
        array.calc_v_selected_cell(5.0, None, Operation::Set).unwrap();
        assert!(array.set_sc_current().is_some());

        array.set_n_rows(16).unwrap();
        assert_eq!(array.n_rows(), 16);
        assert!(array.drivers().is_none());
        assert!(array.set_sc_current().is_none());
        assert!(array.set_n_cols(0).is_err());
        assert_eq!(array.n_cols(), 8);
    }

    #[test]
    fn test_solves_record_observables() {
        let mut array = array(8, 16);
        array.size_drivers().unwrap();
        assert!(array.write_voltage().is_none());

        array.program().unwrap();
        let set = *array.solution(Operation::Set).unwrap();
        assert_relative_eq!(set.selected_cell_voltage, 5.7);
        assert!(set.driver_voltage > 5.7);
        assert_eq!(array.set_sc_current(), Some(set.selected_cell_current));
        assert_eq!(array.set_sp_current(), Some(set.sneak_current));

        let reset = *array.solution(Operation::Reset).unwrap();
        assert_eq!(
            array.write_voltage(),
            Some(set.driver_voltage.max(reset.driver_voltage))
        );
    }

    #[test]
    fn test_area_counts_cells_and_drivers() {
        let mut array = array(64, 128);
        assert!(array.area().is_err());
        array.size_drivers().unwrap();

        let tech = Technology::reference();
        let cells = 64.0 * 128.0 * 4.0 * 22e-9 * 22e-9;
        let drivers = array.drivers().unwrap();
        let expected = cells
            + 64.0 * drivers.wordline.area(&tech)
            + 128.0 * drivers.bitline.area(&tech);
        assert_relative_eq!(array.area().unwrap(), expected, max_relative = 1e-12);
    }

    #[test]
    fn test_line_delay_formula() {
        let mut array = array(32, 64);
        array.size_drivers().unwrap();
        let r_drv = array.driver_resistance(Line::Wordline, DriverKind::Read).unwrap();
        let c = 64.0 * array.wire_capacitance();
        let r_wire = 64.0 * 2.0;
        let expected = 0.69 * (r_drv * c + r_wire * c / 2.0);
        let delay = array.line_delay(Line::Wordline, DriverKind::Read).unwrap();
        assert_relative_eq!(delay, expected, max_relative = 1e-9);
        assert!(array.sensing_delay().unwrap() > 1e-9);
    }

    #[test]
    fn test_rollups_after_characterization() {
        let mut array = array(16, 16);
        array.size_drivers().unwrap();
        assert!(array.metrics().is_err());

        array.program().unwrap();
        let search = array.find_read_voltage(&ReadSearchConfig::default()).unwrap();
        assert!(search.is_feasible());

        let metrics = array.metrics().unwrap();
        assert_eq!(metrics.geometry, Geometry::new(16, 16));
        assert!(metrics.read_voltage > 3.2 && metrics.read_voltage < metrics.write_voltage);
        assert_eq!(metrics.write_time, metrics.set_time.max(metrics.reset_time));
        // Switching at the nominal voltage dominates the line delays
        assert!(metrics.set_time >= 10e-9);
        assert_relative_eq!(metrics.read_time, array.sensing_delay().unwrap());
        assert!(metrics.write_energy > 0.0 && metrics.read_energy > 0.0);

        let v = metrics.read_voltage;
        let expected = 32.0 * array.wire_capacitance() * v * v;
        assert_relative_eq!(metrics.precharge_energy, expected, max_relative = 1e-12);
        assert_relative_eq!(metrics.area_per_bit, metrics.area / 256.0, max_relative = 1e-12);
    }
}
