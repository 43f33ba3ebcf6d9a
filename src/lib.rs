//! # Xbar Core
//!
//! Area, timing and energy estimation for ReRAM crosspoint arrays.
//!
//! This library provides:
//! - Memristor + selector cell models with tabulated IV curves
//! - A sneak-path solver for the selected row and column of a crosspoint array
//! - Line driver sizing from process technology parameters
//! - A parallel design-space explorer over array geometries
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - [`device`] - Selector models, the cell, and its IV tables
//! - [`tech`] - Process technology and driver sizing
//! - [`array`] - Array geometry, operations, observables and rollups
//! - [`solver`] - Sneak-path relaxation and the read-voltage search
//! - [`explore`] - Geometry sweep and design selection
//! - [`config`] - JSON configuration
//! - [`report`] - Text and JSON reports
//!
//! ## Usage
//!
//! ### Native CLI
//!
//! ```bash
//! RUST_LOG=xbar_core=debug xbar config.json --target energy
//! ```
//!
//! ### Library
//!
//! ```no_run
//! use xbar_core::{CrossbarArray, Geometry, Operation, Technology};
//! use xbar_core::device::Cell;
//!
//! let cell = Cell::new(xbar_core::config::reference_cell())?;
//! let mut array = CrossbarArray::new(Geometry::new(512, 512), cell, Technology::reference())?;
//! array.size_drivers()?;
//! let set = array.calc_v_edge(5.7, None, Operation::Set)?;
//! println!("set needs {:.3} V at the driver", set.driver_voltage);
//! # Ok::<(), xbar_core::XbarError>(())
//! ```
//!
//! ## Sneak-Path Method
//!
//! Only the selected wordline and bitline are modeled node by node. Every
//! other cell on those lines is half-selected and is replaced by a lumped
//! worst-case cell that includes the orthogonal line behind it. The two
//! resulting ladders are solved by damped fixed-point relaxation:
//!
//! 1. Settle half-selected cell currents from the present line voltages
//! 2. Recompute line voltages from accumulated currents and driver resistances
//! 3. Update the selected-cell voltage (or driver voltage, for the inverse
//!    solve) and repeat until both it and the total sneak current settle

pub mod array;
pub mod config;
pub mod device;
pub mod error;
pub mod explore;
pub mod report;
pub mod solver;
pub mod tech;

// Re-export main types for convenience
pub use array::{CrossbarArray, Geometry, Operation};
pub use config::ExplorerConfig;
pub use error::{Result, XbarError};
pub use explore::{explore, OptimizationTarget};
pub use tech::Technology;
