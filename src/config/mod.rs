//! Explorer configuration.
//!
//! A configuration is a JSON document with five sections:
//!
//! ```json
//! {
//!   "technology": { "feature_size": 22e-9, ... },
//!   "cell": { "hrs_resistance": 600e3, "lrs_resistance": 61224, "selector": { ... }, ... },
//!   "sweep": { "min_rows": 64, "max_rows": 1024, "min_cols": 64, "max_cols": 1024 },
//!   "read": { "target_ratio": 5.0, "disturb_factor": 1e3 },
//!   "solver": { "tolerance": 1e-6, "max_iterations": 5000 }
//! }
//! ```
//!
//! Every section except `cell` may be omitted and falls back to the
//! reference values.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::device::{Cell, CellParams, SelectorModel};
use crate::error::{Result, XbarError};
use crate::explore::OptimizationTarget;
use crate::solver::{ReadSearchConfig, SolverConfig};
use crate::tech::Technology;

/// Sweep bounds.
mod defaults {
    pub const MIN_LINE_CELLS: usize = 64;
    pub const MAX_LINE_CELLS: usize = 1024;
    /// Longest line the explorer will propose.
    pub const LINE_CELLS_LIMIT: usize = 8192;
}

pub use defaults::LINE_CELLS_LIMIT;

/// Geometry bounds of the design-space sweep. Every bound is a power of two.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepConfig {
    pub min_rows: usize,
    pub max_rows: usize,
    pub min_cols: usize,
    pub max_cols: usize,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            min_rows: defaults::MIN_LINE_CELLS,
            max_rows: defaults::MAX_LINE_CELLS,
            min_cols: defaults::MIN_LINE_CELLS,
            max_cols: defaults::MAX_LINE_CELLS,
        }
    }
}

impl SweepConfig {
    pub fn validate(&self) -> Result<()> {
        let bounds = [
            ("sweep.min_rows", self.min_rows),
            ("sweep.max_rows", self.max_rows),
            ("sweep.min_cols", self.min_cols),
            ("sweep.max_cols", self.max_cols),
        ];
        for (name, value) in bounds {
            if !value.is_power_of_two() || value > LINE_CELLS_LIMIT {
                return Err(XbarError::configuration(
                    name,
                    format!("must be a power of two up to {LINE_CELLS_LIMIT}, got {value}"),
                ));
            }
        }
        if self.min_rows > self.max_rows {
            return Err(XbarError::configuration(
                "sweep.min_rows",
                format!("{} exceeds max_rows {}", self.min_rows, self.max_rows),
            ));
        }
        if self.min_cols > self.max_cols {
            return Err(XbarError::configuration(
                "sweep.min_cols",
                format!("{} exceeds max_cols {}", self.min_cols, self.max_cols),
            ));
        }
        Ok(())
    }
}

/// Everything the explorer needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExplorerConfig {
    #[serde(default)]
    pub technology: Technology,
    pub cell: CellParams,
    #[serde(default)]
    pub sweep: SweepConfig,
    #[serde(default)]
    pub read: ReadSearchConfig,
    #[serde(default)]
    pub solver: SolverConfig,
    #[serde(default)]
    pub target: OptimizationTarget,
}

impl ExplorerConfig {
    /// Reference process, semi-ideal reference cell and default sweep.
    pub fn reference() -> Self {
        Self {
            technology: Technology::reference(),
            cell: reference_cell(),
            sweep: SweepConfig::default(),
            read: ReadSearchConfig::default(),
            solver: SolverConfig::default(),
            target: OptimizationTarget::default(),
        }
    }

    /// Check every section.
    pub fn validate(&self) -> Result<()> {
        self.technology.validate()?;
        if self.cell.selector.is_none() {
            return Err(XbarError::configuration("cell.selector", "a selector model is required"));
        }
        Cell::new(self.cell.clone())?;
        self.sweep.validate()?;
        self.read.validate()?;
        self.solver.validate()?;
        Ok(())
    }

    /// Parse and validate a JSON document.
    pub fn from_json(json: &str, origin: &str) -> Result<Self> {
        let config: ExplorerConfig =
            serde_json::from_str(json).map_err(|source| XbarError::ConfigParseError {
                path: origin.to_string(),
                source,
            })?;
        config.validate()?;
        Ok(config)
    }
}

/// Load and validate a JSON configuration file.
pub fn load(path: impl AsRef<Path>) -> Result<ExplorerConfig> {
    let path = path.as_ref();
    let display = path.display().to_string();
    let json = fs::read_to_string(path).map_err(|source| XbarError::FileReadError {
        path: display.clone(),
        source,
    })?;
    ExplorerConfig::from_json(&json, &display)
}

/// Semi-ideal reference cell: 600 kΩ / 61224 Ω behind a 3.2 V threshold
/// selector.
pub fn reference_cell() -> CellParams {
    CellParams {
        hrs_resistance: 600e3,
        lrs_resistance: 61224.0,
        selector: Some(SelectorModel::SemiIdeal {
            snap_voltage: 3.2,
            leakage_current: 10e-9,
            max_current: 40e-6,
        }),
        max_current_relative_error: 1e-6,
        set_voltage: 5.7,
        reset_voltage: 5.2,
        read_voltage: 3.5,
        set_time: 10e-9,
        reset_time: 10e-9,
        switching_voltage_per_decade: 0.3,
        set_compliance_current: None,
        cell_area_f2: 4.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_is_valid() {
        assert!(ExplorerConfig::reference().validate().is_ok());
    }

    #[test]
    fn test_sections_fall_back_to_reference() {
        let json = r#"{
            "cell": {
                "hrs_resistance": 600e3,
                "lrs_resistance": 61224,
                "selector": {"type": "semi_ideal", "snap_voltage": 3.2,
                             "leakage_current": 1e-8, "max_current": 4e-5},
                "set_voltage": 5.7,
                "reset_voltage": 5.2,
                "read_voltage": 3.5,
                "set_time": 1e-8,
                "reset_time": 1e-8
            },
            "technology": {"feature_size": 32e-9},
            "sweep": {"max_rows": 256}
        }"#;
        let config = ExplorerConfig::from_json(json, "inline").unwrap();
        assert_eq!(config.technology.feature_size, 32e-9);
        assert_eq!(config.technology.breakdown_voltage, 3.0);
        assert_eq!(config.sweep.max_rows, 256);
        assert_eq!(config.sweep.max_cols, 1024);
        assert_eq!(config.solver, SolverConfig::default());
        assert_eq!(config.cell.switching_voltage_per_decade, 0.3);
        assert_eq!(config.target, OptimizationTarget::Density);
    }

    #[test]
    fn test_tabulated_selector_from_json() {
        let json = r#"{
            "cell": {
                "hrs_resistance": 600e3,
                "lrs_resistance": 61224,
                "selector": {"type": "tabulated", "voltages": [0, 1, 2], "currents": [0, 1e-9, 1e-6]},
                "set_voltage": 5.7, "reset_voltage": 5.2, "read_voltage": 3.5,
                "set_time": 1e-8, "reset_time": 1e-8
            }
        }"#;
        assert!(ExplorerConfig::from_json(json, "inline").is_ok());

        let bad = json.replace("[0, 1, 2]", "[0, 2, 1]");
        assert!(matches!(
            ExplorerConfig::from_json(&bad, "inline"),
            Err(XbarError::DomainInvariantViolation { .. })
        ));
    }

    #[test]
    fn test_rejects_bad_sweep() {
        let mut config = ExplorerConfig::reference();
        config.sweep.max_rows = 1000;
        assert!(matches!(
            config.validate(),
            Err(XbarError::ConfigurationError { parameter, .. }) if parameter == "sweep.max_rows"
        ));

        let mut config = ExplorerConfig::reference();
        config.sweep.min_cols = 2048;
        assert!(config.validate().is_err());

        let mut config = ExplorerConfig::reference();
        config.sweep.max_cols = 16384;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_requires_selector() {
        let mut config = ExplorerConfig::reference();
        config.cell.selector = None;
        assert!(matches!(
            config.validate(),
            Err(XbarError::ConfigurationError { parameter, .. }) if parameter == "cell.selector"
        ));
    }

    #[test]
    fn test_load_reports_missing_file_and_bad_json() {
        assert!(matches!(
            load("/nonexistent/xbar.json"),
            Err(XbarError::FileReadError { .. })
        ));
        assert!(matches!(
            ExplorerConfig::from_json("{ not json", "inline"),
            Err(XbarError::ConfigParseError { .. })
        ));
    }
}
