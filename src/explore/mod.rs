//! Design-space exploration over array geometries.
//!
//! Every candidate geometry is characterized independently: a fresh array is
//! built, its drivers sized, set and reset programmed, and a read voltage
//! searched. Candidates run in parallel on the rayon pool. Candidates that
//! fail to converge or cannot be read reliably are dropped; any other error
//! ends the sweep.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::array::{ArrayMetrics, CrossbarArray, Geometry};
use crate::config::{ExplorerConfig, SweepConfig};
use crate::device::Cell;
use crate::error::{Result, XbarError};

/// What the explorer minimizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
#[serde(rename_all = "snake_case")]
pub enum OptimizationTarget {
    /// Smallest area per bit
    #[default]
    Density,
    /// Shortest of the slower of read and write
    Performance,
    /// Lowest read plus write energy
    Energy,
}

impl OptimizationTarget {
    /// Figure of merit of `metrics`; lower is better.
    pub fn score(self, metrics: &ArrayMetrics) -> f64 {
        match self {
            OptimizationTarget::Density => metrics.area_per_bit,
            OptimizationTarget::Performance => metrics.read_time.max(metrics.write_time),
            OptimizationTarget::Energy => metrics.read_energy + metrics.write_energy,
        }
    }
}

/// Result of a sweep.
#[derive(Debug, Clone, Serialize)]
pub struct Exploration {
    pub target: OptimizationTarget,
    pub best: ArrayMetrics,
    /// Every candidate that passed, in sweep order
    pub feasible: Vec<ArrayMetrics>,
    /// Geometries dropped for failing to converge or to read
    pub discarded: Vec<Geometry>,
}

/// Powers of two within the sweep bounds, rows major.
pub fn candidate_geometries(sweep: &SweepConfig) -> Vec<Geometry> {
    let powers = |min: usize, max: usize| {
        std::iter::successors(Some(min), |n| n.checked_mul(2)).take_while(move |&n| n <= max)
    };
    powers(sweep.min_rows, sweep.max_rows)
        .flat_map(|n_rows| {
            powers(sweep.min_cols, sweep.max_cols).map(move |n_cols| Geometry::new(n_rows, n_cols))
        })
        .collect()
}

/// Characterize one geometry.
///
/// `cell` should already carry its tables so candidates share them.
pub fn evaluate_geometry(
    config: &ExplorerConfig,
    cell: &Cell,
    geometry: Geometry,
) -> Result<ArrayMetrics> {
    let mut array = CrossbarArray::new(geometry, cell.clone(), config.technology.clone())?
        .with_solver_config(config.solver);
    array.size_drivers()?;
    array.program()?;
    array.find_read_voltage(&config.read)?.into_result(&array)?;
    array.metrics()
}

fn achieved_ratio(err: &XbarError) -> Option<f64> {
    match err {
        XbarError::InfeasibleDesign { achieved_ratio, .. } => Some(*achieved_ratio),
        _ => None,
    }
}

/// Sweep every candidate geometry and pick the best for `target`.
pub fn explore(config: &ExplorerConfig, target: OptimizationTarget) -> Result<Exploration> {
    config.validate()?;
    let mut cell = Cell::new(config.cell.clone())?;
    cell.build_default_ixv()?;

    let geometries = candidate_geometries(&config.sweep);
    info!(candidates = geometries.len(), ?target, "exploring array geometries");

    let outcomes: Vec<(Geometry, Result<ArrayMetrics>)> = geometries
        .par_iter()
        .map(|&geometry| (geometry, evaluate_geometry(config, &cell, geometry)))
        .collect();

    let mut feasible = Vec::new();
    let mut discarded = Vec::new();
    // Unreadable candidate with the highest margin, reported if none passes
    let mut closest: Option<XbarError> = None;
    for (geometry, outcome) in outcomes {
        match outcome {
            Ok(metrics) => feasible.push(metrics),
            Err(err) if err.is_candidate_local() => {
                warn!(%geometry, error = %err, "discarding candidate");
                discarded.push(geometry);
                if let Some(ratio) = achieved_ratio(&err) {
                    if closest
                        .as_ref()
                        .and_then(achieved_ratio)
                        .map_or(true, |best| ratio > best)
                    {
                        closest = Some(err);
                    }
                }
            }
            Err(err) => return Err(err),
        }
    }

    let Some(best) = feasible
        .iter()
        .min_by(|a, b| target.score(a).total_cmp(&target.score(b)))
        .copied()
    else {
        return Err(closest.unwrap_or(XbarError::NoConvergedDesign {
            candidates: discarded.len(),
        }));
    };

    info!(
        best = %best.geometry,
        feasible = feasible.len(),
        discarded = discarded.len(),
        score = target.score(&best),
        "exploration finished"
    );
    Ok(Exploration {
        target,
        best,
        feasible,
        discarded,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_sweep() -> ExplorerConfig {
        let mut config = ExplorerConfig::reference();
        config.sweep = SweepConfig {
            min_rows: 8,
            max_rows: 32,
            min_cols: 8,
            max_cols: 16,
        };
        config
    }

    #[test]
    fn test_candidates_are_powers_of_two() {
        let geometries = candidate_geometries(&small_sweep().sweep);
        assert_eq!(geometries.len(), 6);
        assert_eq!(geometries[0], Geometry::new(8, 8));
        assert_eq!(geometries[5], Geometry::new(32, 16));
        assert!(geometries
            .iter()
            .all(|g| g.n_rows.is_power_of_two() && g.n_cols.is_power_of_two()));
    }

    #[test]
    fn test_density_prefers_largest_array() {
        let exploration = explore(&small_sweep(), OptimizationTarget::Density).unwrap();
        assert!(exploration.discarded.is_empty());
        assert_eq!(exploration.feasible.len(), 6);
        // Drivers amortize over more cells
        assert_eq!(exploration.best.geometry, Geometry::new(32, 16));
    }

    #[test]
    fn test_best_minimizes_target_score() {
        let config = small_sweep();
        for target in [OptimizationTarget::Performance, OptimizationTarget::Energy] {
            let exploration = explore(&config, target).unwrap();
            let best = target.score(&exploration.best);
            assert!(exploration.feasible.iter().all(|m| target.score(m) >= best));
        }
    }

    #[test]
    fn test_unreadable_designs_report_closest_candidate() {
        let mut config = small_sweep();
        config.read.target_ratio = 20.0;

        let mut cell = Cell::new(config.cell.clone()).unwrap();
        cell.build_default_ixv().unwrap();
        let ratios: Vec<(Geometry, f64)> = candidate_geometries(&config.sweep)
            .into_iter()
            .map(|geometry| match evaluate_geometry(&config, &cell, geometry) {
                Err(XbarError::InfeasibleDesign { achieved_ratio, .. }) => {
                    (geometry, achieved_ratio)
                }
                other => panic!("expected {geometry} to be unreadable, got {other:?}"),
            })
            .collect();
        let highest = ratios.iter().map(|&(_, r)| r).fold(f64::NEG_INFINITY, f64::max);

        match explore(&config, OptimizationTarget::Density) {
            Err(XbarError::InfeasibleDesign {
                n_rows,
                n_cols,
                achieved_ratio,
                target_ratio,
            }) => {
                assert_eq!(target_ratio, 20.0);
                assert_eq!(achieved_ratio, highest);
                assert!(achieved_ratio > 0.0);
                assert!(ratios.contains(&(Geometry::new(n_rows, n_cols), achieved_ratio)));
            }
            other => panic!("expected an infeasible design, got {other:?}"),
        }
    }

    #[test]
    fn test_unconverged_sweep_is_reported_as_such() {
        let mut config = small_sweep();
        config.solver = config.solver.with_max_iterations(1);
        match explore(&config, OptimizationTarget::Density) {
            Err(XbarError::NoConvergedDesign { candidates }) => assert_eq!(candidates, 6),
            other => panic!("expected no converged design, got {other:?}"),
        }
    }

    #[test]
    fn test_structural_errors_abort() {
        let mut config = small_sweep();
        config.sweep.max_rows = 24;
        assert!(matches!(
            explore(&config, OptimizationTarget::Density),
            Err(XbarError::ConfigurationError { .. })
        ));
    }
}
