//! Error types for the crosspoint array estimator.
//!
//! This module provides a unified error type [`XbarError`] that covers
//! all error conditions that can occur while configuring devices and arrays,
//! running the sneak-path solver, and exploring the design space.

use thiserror::Error;

use crate::array::Operation;

/// Result type alias using [`XbarError`].
pub type Result<T> = std::result::Result<T, XbarError>;

/// Unified error type for all Xbar operations.
#[derive(Error, Debug)]
pub enum XbarError {
    // ============ Configuration Errors ============
    /// Required device/geometry parameter missing or inconsistent
    #[error("Invalid configuration for '{parameter}': {message}")]
    ConfigurationError { parameter: String, message: String },

    /// Operation tag that does not name any known operation
    #[error("Unknown operation '{name}'")]
    UnknownOperation { name: String },

    // ============ Device Model Errors ============
    /// Selector model unset, or IV tables used after a parameter change
    #[error("No usable device model: {message}")]
    ModelSelectionError { message: String },

    /// Unsorted, non-monotonic or originless IV table
    #[error("Invalid {what}: {message}")]
    DomainInvariantViolation { what: String, message: String },

    // ============ Solver Errors ============
    /// A relaxation or bisection loop did not settle
    #[error("{context} did not converge after {iterations} iterations (residual: {residual:.2e})")]
    ConvergenceFailure {
        context: &'static str,
        iterations: usize,
        residual: f64,
    },

    /// The selection lines carry a current through the selected cell that its
    /// IV curve does not allow at the line voltages
    #[error("Current conservation violated for {operation}: lines carry {line_current:.4e} A through the selected cell, its IV curve gives {cell_current:.4e} A")]
    ConservationViolation {
        operation: Operation,
        line_current: f64,
        cell_current: f64,
    },

    /// No read voltage reaches the target margin without disturbing the cell
    #[error("Infeasible {n_rows}x{n_cols} design: read margin {achieved_ratio:.3} below target {target_ratio:.3}")]
    InfeasibleDesign {
        n_rows: usize,
        n_cols: usize,
        target_ratio: f64,
        achieved_ratio: f64,
    },

    /// Every candidate of a design sweep failed to converge
    #[error("None of the {candidates} candidate geometries converged")]
    NoConvergedDesign { candidates: usize },

    // ============ I/O Errors ============
    /// Error reading a configuration file
    #[error("Failed to read configuration file '{path}': {source}")]
    FileReadError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Error decoding a configuration file
    #[error("Failed to parse configuration file '{path}': {source}")]
    ConfigParseError {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    /// Error writing a report
    #[error("Failed to write report: {source}")]
    ReportWriteError {
        #[source]
        source: std::io::Error,
    },
}

impl XbarError {
    /// Create a configuration error
    pub fn configuration(parameter: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigurationError {
            parameter: parameter.into(),
            message: message.into(),
        }
    }

    /// Create a model selection error
    pub fn model_selection(message: impl Into<String>) -> Self {
        Self::ModelSelectionError {
            message: message.into(),
        }
    }

    /// Create a domain invariant violation
    pub fn domain_invariant(what: impl Into<String>, message: impl Into<String>) -> Self {
        Self::DomainInvariantViolation {
            what: what.into(),
            message: message.into(),
        }
    }

    /// Create a convergence failure error
    pub fn convergence_failure(context: &'static str, iterations: usize, residual: f64) -> Self {
        Self::ConvergenceFailure {
            context,
            iterations,
            residual,
        }
    }

    /// Whether the error only disqualifies the array candidate being evaluated.
    ///
    /// Design-space exploration skips such candidates and keeps going; every
    /// other error is structural and aborts the sweep.
    pub fn is_candidate_local(&self) -> bool {
        matches!(
            self,
            Self::ConvergenceFailure { .. } | Self::InfeasibleDesign { .. }
        )
    }
}
