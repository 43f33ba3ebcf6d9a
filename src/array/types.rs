//! Core types for crosspoint array operations.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::device::ResistanceState;
use crate::error::XbarError;

/// A physical line of the array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Line {
    /// Row line; holds one cell per column
    Wordline,
    /// Column line; holds one cell per row
    Bitline,
}

impl Line {
    /// The orthogonal line.
    pub fn opposite(self) -> Line {
        match self {
            Line::Wordline => Line::Bitline,
            Line::Bitline => Line::Wordline,
        }
    }
}

impl fmt::Display for Line {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Line::Wordline => write!(f, "WL"),
            Line::Bitline => write!(f, "BL"),
        }
    }
}

/// Which of a line's drivers is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DriverKind {
    Write,
    Read,
    HalfBias,
}

/// An array operation the sneak-path solver can analyse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Set,
    Reset,
    ReadHrs,
    ReadLrs,
    CalibWriteAllHrs,
    CalibWriteAllLrs,
    CalibReadAllHrs,
    CalibReadAllLrs,
}

impl Operation {
    /// Every operation, in a fixed order.
    pub const ALL: [Operation; 8] = [
        Operation::Set,
        Operation::Reset,
        Operation::ReadHrs,
        Operation::ReadLrs,
        Operation::CalibWriteAllHrs,
        Operation::CalibWriteAllLrs,
        Operation::CalibReadAllHrs,
        Operation::CalibReadAllLrs,
    ];

    /// The operation's tag.
    pub fn tag(self) -> &'static str {
        match self {
            Operation::Set => "set",
            Operation::Reset => "reset",
            Operation::ReadHrs => "read_hrs",
            Operation::ReadLrs => "read_lrs",
            Operation::CalibWriteAllHrs => "calib_wr_all_hrs",
            Operation::CalibWriteAllLrs => "calib_wr_all_lrs",
            Operation::CalibReadAllHrs => "calib_rd_all_hrs",
            Operation::CalibReadAllLrs => "calib_rd_all_lrs",
        }
    }

    /// Calibration operations bias the negative line explicitly.
    pub fn is_calibration(self) -> bool {
        matches!(
            self,
            Operation::CalibWriteAllHrs
                | Operation::CalibWriteAllLrs
                | Operation::CalibReadAllHrs
                | Operation::CalibReadAllLrs
        )
    }

    /// Index into per-operation storage.
    pub(crate) fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for Operation {
    type Err = XbarError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Operation::ALL
            .into_iter()
            .find(|op| op.tag() == s)
            .ok_or_else(|| XbarError::UnknownOperation {
                name: s.to_string(),
            })
    }
}

/// Everything an operation fixes about the network before solving.
///
/// The positive line (PL) is driven high; the negative line (NL) is grounded
/// or half-biased. The profile also presets the selected cell, the lumped
/// half-selected cells, and which driver each selection line uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OperationProfile {
    pub operation: Operation,
    pub positive_line: Line,
    pub selected_state: ResistanceState,
    pub half_selected_state: ResistanceState,
    pub pl_driver: DriverKind,
    pub nl_driver: DriverKind,
}

impl OperationProfile {
    /// Build the profile of `operation`.
    pub fn for_operation(operation: Operation) -> Self {
        use ResistanceState::{High, Low};

        let (positive_line, selected_state, half_selected_state, driver) = match operation {
            Operation::Set => (Line::Wordline, High, Low, DriverKind::Write),
            // Opposite polarity: the bitline is driven high
            Operation::Reset => (Line::Bitline, Low, Low, DriverKind::Write),
            Operation::ReadHrs => (Line::Wordline, High, Low, DriverKind::Read),
            Operation::ReadLrs => (Line::Wordline, Low, High, DriverKind::Read),
            Operation::CalibWriteAllHrs => (Line::Wordline, High, High, DriverKind::Write),
            Operation::CalibWriteAllLrs => (Line::Wordline, Low, Low, DriverKind::Write),
            Operation::CalibReadAllHrs => (Line::Wordline, High, High, DriverKind::Read),
            Operation::CalibReadAllLrs => (Line::Wordline, Low, Low, DriverKind::Read),
        };

        Self {
            operation,
            positive_line,
            selected_state,
            half_selected_state,
            pl_driver: driver,
            nl_driver: driver,
        }
    }

    /// The negative line.
    pub fn negative_line(&self) -> Line {
        self.positive_line.opposite()
    }
}

/// Array dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Geometry {
    pub n_rows: usize,
    pub n_cols: usize,
}

impl Geometry {
    pub fn new(n_rows: usize, n_cols: usize) -> Self {
        Self { n_rows, n_cols }
    }

    /// Number of cells on one line of the given kind.
    pub fn cells_on(&self, line: Line) -> usize {
        match line {
            Line::Wordline => self.n_cols,
            Line::Bitline => self.n_rows,
        }
    }

    /// Total number of cells.
    pub fn capacity(&self) -> usize {
        self.n_rows * self.n_cols
    }
}

impl fmt::Display for Geometry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.n_rows, self.n_cols)
    }
}
