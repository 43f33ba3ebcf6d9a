//! Crosspoint array representation and rollups.
//!
//! This module provides the [`CrossbarArray`] that ties a cell, a process
//! technology and a geometry together, holds the sized line drivers and the
//! per-operation solver observables, and rolls them up into area, latency and
//! energy figures.

mod crossbar;
mod types;
mod validate;

pub use crossbar::{ArrayDrivers, ArrayMetrics, CrossbarArray, LINE_DELAY_FACTOR};
pub use types::*;
pub use validate::{validate_drivers, validate_geometry};
