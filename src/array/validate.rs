//! Array validation.

use crate::error::{Result, XbarError};

use super::crossbar::ArrayDrivers;
use super::types::{DriverKind, Geometry, Line};

/// Validate array dimensions.
pub fn validate_geometry(geometry: &Geometry) -> Result<()> {
    if geometry.n_rows == 0 {
        return Err(XbarError::configuration("n_rows", "array needs at least one row"));
    }
    if geometry.n_cols == 0 {
        return Err(XbarError::configuration("n_cols", "array needs at least one column"));
    }
    if geometry.n_rows.checked_mul(geometry.n_cols).is_none() {
        return Err(XbarError::configuration(
            "geometry",
            format!("{geometry} overflows the cell count"),
        ));
    }
    Ok(())
}

/// Validate that all six driver resistances are usable.
pub fn validate_drivers(drivers: &ArrayDrivers) -> Result<()> {
    for line in [Line::Wordline, Line::Bitline] {
        for kind in [DriverKind::Write, DriverKind::Read, DriverKind::HalfBias] {
            let resistance = drivers.resistance(line, kind);
            if !(resistance > 0.0 && resistance.is_finite()) {
                return Err(XbarError::configuration(
                    format!("{line} {kind:?} driver"),
                    format!("resistance must be positive and finite, got {resistance}"),
                ));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tech::{Driver, LineDrivers};

    fn drivers(write: f64) -> ArrayDrivers {
        let driver = |resistance| Driver {
            resistance,
            width: 44e-9,
            stack: 1,
        };
        let line = LineDrivers {
            write: driver(write),
            read: driver(300.0),
            half_bias: driver(50.0),
        };
        ArrayDrivers {
            wordline: line,
            bitline: line,
        }
    }

    #[test]
    fn test_geometry_needs_rows_and_columns() {
        assert!(validate_geometry(&Geometry::new(1, 1)).is_ok());
        assert!(matches!(
            validate_geometry(&Geometry::new(0, 8)),
            Err(XbarError::ConfigurationError { parameter, .. }) if parameter == "n_rows"
        ));
        assert!(validate_geometry(&Geometry::new(8, 0)).is_err());
    }

    #[test]
    fn test_driver_resistances_must_be_positive() {
        assert!(validate_drivers(&drivers(100.0)).is_ok());
        assert!(validate_drivers(&drivers(0.0)).is_err());
        assert!(validate_drivers(&drivers(f64::NAN)).is_err());
    }
}
