//! Process technology parameters.
//!
//! The estimator only reads a handful of process numbers: wire geometry for
//! the line resistance and capacitance, transistor dimensions and
//! resistance-width products for the drivers, and the breakdown voltage that
//! decides how many transistors a driver stacks.

mod driver;

pub use driver::{size_driver, size_line_drivers, Driver, LineDrivers, TransistorType};

use serde::{Deserialize, Serialize};

use crate::error::{Result, XbarError};

/// Read-only process technology description. All values in SI units.
///
/// Fields missing from a configuration file take their reference values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Technology {
    /// Feature size F (m)
    pub feature_size: f64,
    /// Line metal resistivity (Ω·m)
    pub wire_resistivity: f64,
    /// Line thickness over line width
    pub wire_aspect_ratio: f64,
    /// Line capacitance per unit length (F/m)
    pub wire_capacitance_per_meter: f64,
    /// Minimum transistor width (m)
    pub min_transistor_width: f64,
    /// Minimum channel length (m)
    pub min_channel_length: f64,
    /// NMOS on-resistance times width (Ω·m)
    pub nmos_resistance_width: f64,
    /// PMOS on-resistance times width (Ω·m)
    pub pmos_resistance_width: f64,
    /// Largest voltage a single transistor may block (V)
    pub breakdown_voltage: f64,
    /// Largest fraction of the drive voltage a driver may drop
    pub max_driver_drop: f64,
    /// Intrinsic sense amplifier delay (s)
    pub sense_amp_delay: f64,
}

impl Default for Technology {
    fn default() -> Self {
        Self::reference()
    }
}

impl Technology {
    /// 22 nm reference process.
    pub fn reference() -> Self {
        Self {
            feature_size: 22e-9,
            wire_resistivity: 2.2e-8,
            wire_aspect_ratio: 1.0,
            wire_capacitance_per_meter: 2.0e-10,
            min_transistor_width: 44e-9,
            min_channel_length: 22e-9,
            nmos_resistance_width: 1.0e-3,
            pmos_resistance_width: 2.2e-3,
            breakdown_voltage: 3.0,
            max_driver_drop: 0.0187,
            sense_amp_delay: 1e-9,
        }
    }

    /// Check every parameter is physically meaningful.
    pub fn validate(&self) -> Result<()> {
        let checks = [
            ("feature_size", self.feature_size),
            ("wire_resistivity", self.wire_resistivity),
            ("wire_aspect_ratio", self.wire_aspect_ratio),
            ("wire_capacitance_per_meter", self.wire_capacitance_per_meter),
            ("min_transistor_width", self.min_transistor_width),
            ("min_channel_length", self.min_channel_length),
            ("nmos_resistance_width", self.nmos_resistance_width),
            ("pmos_resistance_width", self.pmos_resistance_width),
            ("breakdown_voltage", self.breakdown_voltage),
            ("max_driver_drop", self.max_driver_drop),
        ];
        for (name, value) in checks {
            if !(value > 0.0 && value.is_finite()) {
                return Err(XbarError::configuration(
                    name,
                    format!("must be positive and finite, got {value}"),
                ));
            }
        }
        if self.max_driver_drop >= 1.0 {
            return Err(XbarError::configuration(
                "max_driver_drop",
                format!("must be a fraction below 1, got {}", self.max_driver_drop),
            ));
        }
        if !(self.sense_amp_delay >= 0.0) {
            return Err(XbarError::configuration(
                "sense_amp_delay",
                format!("must not be negative, got {}", self.sense_amp_delay),
            ));
        }
        Ok(())
    }

    /// Line pitch of one cell (m). Crosspoint cells sit on a 2F grid.
    pub fn cell_pitch(&self) -> f64 {
        2.0 * self.feature_size
    }

    /// Line resistance across one cell pitch (Ω).
    pub fn wire_resistance_per_cell(&self) -> f64 {
        let width = self.feature_size;
        let thickness = self.wire_aspect_ratio * self.feature_size;
        self.wire_resistivity * self.cell_pitch() / (width * thickness)
    }

    /// Line capacitance across one cell pitch (F).
    pub fn wire_capacitance_per_cell(&self) -> f64 {
        self.wire_capacitance_per_meter * self.cell_pitch()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_reference_wire_resistance() {
        let tech = Technology::reference();
        assert_relative_eq!(tech.wire_resistance_per_cell(), 2.0, max_relative = 1e-12);
        assert_relative_eq!(tech.wire_capacitance_per_cell(), 8.8e-18, max_relative = 1e-12);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        assert!(Technology::reference().validate().is_ok());

        let tech = Technology {
            feature_size: 0.0,
            ..Technology::reference()
        };
        assert!(matches!(
            tech.validate(),
            Err(XbarError::ConfigurationError { parameter, .. }) if parameter == "feature_size"
        ));

        let tech = Technology {
            max_driver_drop: 1.5,
            ..Technology::reference()
        };
        assert!(tech.validate().is_err());
    }
}
