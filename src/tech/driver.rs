//! Line driver ("AMUX") sizing.
//!
//! A driver is a stack of identical transistors. The stack height is set by
//! the breakdown voltage; the width is chosen so the driver drops at most
//! `max_driver_drop` of its voltage at the worst-case current, and never goes
//! below the minimum width:
//!
//!   R_req = drop * V / I
//!   W     = max(W_min, stack * RW / R_req)
//!   R     = stack * RW / W

use serde::{Deserialize, Serialize};

use crate::device::{Cell, ResistanceState};
use crate::error::{Result, XbarError};

use super::Technology;

/// Transistor polarity of a driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransistorType {
    Nmos,
    Pmos,
}

/// A sized driver.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Driver {
    /// On-resistance (Ω)
    pub resistance: f64,
    /// Width of each stacked transistor (m)
    pub width: f64,
    /// Number of transistors in series
    pub stack: u32,
}

impl Driver {
    /// Silicon footprint (m²).
    pub fn area(&self, tech: &Technology) -> f64 {
        self.stack as f64 * self.width * tech.min_channel_length
    }
}

/// The three drivers at the end of one line.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LineDrivers {
    pub write: Driver,
    pub read: Driver,
    pub half_bias: Driver,
}

impl LineDrivers {
    /// Combined footprint (m²).
    pub fn area(&self, tech: &Technology) -> f64 {
        self.write.area(tech) + self.read.area(tech) + self.half_bias.area(tech)
    }
}

/// Size a driver that holds `voltage` while sourcing `current`.
pub fn size_driver(
    tech: &Technology,
    kind: TransistorType,
    voltage: f64,
    current: f64,
) -> Result<Driver> {
    if !(voltage > 0.0) || !(current > 0.0) {
        return Err(XbarError::configuration(
            "driver",
            format!("needs positive voltage and current, got {voltage} V and {current} A"),
        ));
    }

    let resistance_width = match kind {
        TransistorType::Nmos => tech.nmos_resistance_width,
        TransistorType::Pmos => tech.pmos_resistance_width,
    };
    let stack = (voltage / tech.breakdown_voltage).ceil().max(1.0);
    let required = tech.max_driver_drop * voltage / current;
    let width = (stack * resistance_width / required).max(tech.min_transistor_width);

    Ok(Driver {
        resistance: stack * resistance_width / width,
        width,
        stack: stack as u32,
    })
}

/// Size write, read and half-bias drivers for a line of `n_cells` cells.
///
/// Worst case: every other cell on the line is half-selected in LRS.
pub fn size_line_drivers(tech: &Technology, cell: &Cell, n_cells: usize) -> Result<LineDrivers> {
    if n_cells == 0 {
        return Err(XbarError::configuration("n_cells", "a line needs at least one cell"));
    }

    let mut lrs = cell.clone();
    lrs.set_resistance_state(ResistanceState::Low);
    let others = (n_cells - 1) as f64;
    let params = cell.params();

    let v_write = params.set_voltage.max(params.reset_voltage);
    let i_half_write = lrs.calc_cell_current(0.5 * v_write)?;
    let i_write = cell.set_compliance_current()? + others * i_half_write;

    let v_read = params.read_voltage;
    let i_half_read = lrs.calc_cell_current(0.5 * v_read)?;
    let i_read = v_read / cell.lrs_resistance() + others * i_half_read;

    Ok(LineDrivers {
        write: size_driver(tech, TransistorType::Pmos, v_write, i_write)?,
        read: size_driver(tech, TransistorType::Nmos, v_read, i_read)?,
        half_bias: size_driver(tech, TransistorType::Pmos, 0.5 * v_write, i_half_write)?,
    })
}
