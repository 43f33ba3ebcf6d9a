//! Report output for the CLI frontend.
//!
//! Writes an [`Exploration`] either as an aligned text table or as JSON.

use std::io::{self, Write};

use crate::array::ArrayMetrics;
use crate::error::{Result, XbarError};
use crate::explore::Exploration;

/// Format `value` with an SI prefix, e.g. `1.762 kΩ`.
pub fn si(value: f64, unit: &str) -> String {
    const PREFIXES: [(f64, &str); 9] = [
        (1e9, "G"),
        (1e6, "M"),
        (1e3, "k"),
        (1.0, ""),
        (1e-3, "m"),
        (1e-6, "µ"),
        (1e-9, "n"),
        (1e-12, "p"),
        (1e-15, "f"),
    ];

    if value == 0.0 || !value.is_finite() {
        return format!("{value} {unit}");
    }
    let magnitude = value.abs();
    let (scale, prefix) = PREFIXES
        .iter()
        .find(|(scale, _)| magnitude >= *scale)
        .copied()
        .unwrap_or(PREFIXES[PREFIXES.len() - 1]);
    format!("{:.3} {prefix}{unit}", value / scale)
}

fn write_metrics(out: &mut impl Write, m: &ArrayMetrics) -> io::Result<()> {
    let pair = |sc: f64, sp: f64| format!("{} / {}", si(sc, "A"), si(sp, "A"));
    let rows = [
        ("Array", format!("{} ({} bits)", m.geometry, m.geometry.capacity())),
        ("Area", format!("{:.3} µm²", m.area * 1e12)),
        ("Area per bit", format!("{:.4} µm²", m.area_per_bit * 1e12)),
        ("Write voltage", si(m.write_voltage, "V")),
        ("Read voltage", si(m.read_voltage, "V")),
        ("Read margin", format!("{:.3}", m.read_ratio)),
        ("Set time", si(m.set_time, "s")),
        ("Reset time", si(m.reset_time, "s")),
        ("Write time", si(m.write_time, "s")),
        ("Read time", si(m.read_time, "s")),
        ("Set current (SC / SP)", pair(m.set_sc_current, m.set_sp_current)),
        ("Reset current (SC / SP)", pair(m.reset_sc_current, m.reset_sp_current)),
        ("Read current (SC / SP)", pair(m.read_sc_current, m.read_sp_current)),
        ("Write energy", si(m.write_energy, "J")),
        ("Read energy", si(m.read_energy, "J")),
        ("Precharge energy", si(m.precharge_energy, "J")),
    ];
    for (label, value) in rows {
        writeln!(out, "  {label:<26}{value}")?;
    }
    Ok(())
}

fn write_text_report(out: &mut impl Write, exploration: &Exploration) -> io::Result<()> {
    writeln!(out, "Best design for {:?}", exploration.target)?;
    write_metrics(out, &exploration.best)?;
    writeln!(
        out,
        "\n{} feasible, {} discarded",
        exploration.feasible.len(),
        exploration.discarded.len()
    )?;
    for geometry in &exploration.discarded {
        writeln!(out, "  discarded {geometry}")?;
    }
    Ok(())
}

/// Write a human-readable report.
pub fn write_text(out: &mut impl Write, exploration: &Exploration) -> Result<()> {
    write_text_report(out, exploration).map_err(|source| XbarError::ReportWriteError { source })
}

/// Write the whole exploration as pretty-printed JSON.
pub fn write_json(out: &mut impl Write, exploration: &Exploration) -> Result<()> {
    serde_json::to_writer_pretty(&mut *out, exploration)
        .map_err(io::Error::from)
        .and_then(|()| writeln!(out))
        .map_err(|source| XbarError::ReportWriteError { source })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::array::Geometry;
    use crate::explore::OptimizationTarget;

    fn exploration() -> Exploration {
        let metrics = ArrayMetrics {
            geometry: Geometry::new(512, 1024),
            area: 1.2e-9,
            area_per_bit: 2.3e-15,
            write_voltage: 5.9,
            read_voltage: 3.203,
            read_ratio: 5.001,
            set_time: 10.5e-9,
            reset_time: 11e-9,
            write_time: 11e-9,
            read_time: 1.2e-9,
            set_sc_current: 40e-6,
            set_sp_current: 10e-6,
            reset_sc_current: 39e-6,
            reset_sp_current: 12e-6,
            read_sc_current: 50e-9,
            read_sp_current: 15e-6,
            write_energy: 3e-12,
            read_energy: 4e-14,
            precharge_energy: 2e-13,
        };
        Exploration {
            target: OptimizationTarget::Density,
            best: metrics,
            feasible: vec![metrics],
            discarded: vec![Geometry::new(8192, 8192)],
        }
    }

    #[test]
    fn test_si_prefixes() {
        assert_eq!(si(1761.96, "Ω"), "1.762 kΩ");
        assert_eq!(si(10e-9, "s"), "10.000 ns");
        assert_eq!(si(-40e-6, "A"), "-40.000 µA");
        assert_eq!(si(0.0, "J"), "0 J");
    }

    #[test]
    fn test_text_report_lists_best_and_discarded() {
        let mut out = Vec::new();
        write_text(&mut out, &exploration()).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("Best design for Density"));
        assert!(text.contains("512x1024 (524288 bits)"));
        assert!(text.contains("Write time"));
        assert!(text.contains("discarded 8192x8192"));
    }

    #[test]
    fn test_json_report_round_trips_through_serde() {
        let mut out = Vec::new();
        write_json(&mut out, &exploration()).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(value["target"], "density");
        assert_eq!(value["best"]["geometry"]["n_rows"], 512);
        assert_eq!(value["discarded"][0]["n_cols"], 8192);
    }
}
