//! Device models for crosspoint cells.
//!
//! This module provides:
//! - Selector models: semi-ideal threshold selector, tabulated IxV selector
//! - The memristor + selector cell, with bisection-based current/voltage solves
//! - Tabulated cell IxV curves for fast lookups inside the array solver

mod cell;
mod curve;
mod selector;

pub use cell::{
    Cell, CellParams, VoltageEstimate, DEFAULT_TABLE_STEP, DEFAULT_TABLE_TOLERANCE,
    TABLE_RELATIVE_ERROR,
};
pub use curve::IxVCurve;
pub use selector::{SemiIdeal, Selector, SelectorModel, TabulatedIxV};

#[cfg(test)]
pub(crate) use cell::tests as fixtures;

use std::fmt;

use serde::{Deserialize, Serialize};

/// Stable resistance state of the memristive element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResistanceState {
    /// High resistance state (HRS)
    High,
    /// Low resistance state (LRS)
    Low,
}

impl fmt::Display for ResistanceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResistanceState::High => write!(f, "HRS"),
            ResistanceState::Low => write!(f, "LRS"),
        }
    }
}
