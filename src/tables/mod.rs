//! # Lookup tables
//!
//! Two-dimensional lookup tables over (log10 size × core distance), one per target
//! quantity (width, length or log10 energy) and per telescope type.
//!
//! ## Overview
//! -----------------
//! A table has two exclusive lifecycles, modelled as two types sharing only the
//! axis definitions ([`TableAxes`]):
//!
//! * [`table_builder::LookupTableBuilder`] – write mode: `fill` weighted samples into
//!   [`bin_stat::BinnedStatAccumulator`] cells, then `finalize` (consuming the builder).
//! * [`table_reader::LookupTableReader`] – read mode: finalized per-bin statistics,
//!   queried with separable bilinear interpolation between bin centers.
//!
//! Bins are 0-based: bin `i` of an axis covers `[offset + i·w, offset + (i+1)·w)` and its
//! center is `offset + (i + 0.5)·w`.
//!
//! ## See also
//! ------------
//! * [`interpolation`] – two-point interpolation rules shared with the grid.
//! * [`crate::grid`] – the coarse index holding one table set per grid cell.
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::constants::EPS;
use crate::showerscale_errors::ShowerScaleError;

pub mod bin_stat;
pub mod interpolation;
pub mod table_builder;
pub mod table_reader;

/// Target quantity stored in a lookup table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TableQuantity {
    Width,
    Length,
    /// log10 of the true energy in TeV
    Energy,
}

impl TableQuantity {
    pub const ALL: [TableQuantity; 3] = [
        TableQuantity::Width,
        TableQuantity::Length,
        TableQuantity::Energy,
    ];
}

impl fmt::Display for TableQuantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TableQuantity::Width => write!(f, "width"),
            TableQuantity::Length => write!(f, "length"),
            TableQuantity::Energy => write!(f, "energy"),
        }
    }
}

/// Open interval `(min, max)` of accepted target values.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValueRange {
    pub min: f64,
    pub max: f64,
}

impl ValueRange {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    /// True for finite values strictly inside the range.
    #[inline]
    pub fn contains(&self, value: f64) -> bool {
        value.is_finite() && value > self.min && value < self.max
    }
}

impl fmt::Display for ValueRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.min, self.max)
    }
}

/// Regular binning of one table axis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TableAxis {
    /// Lower edge of the first bin
    pub offset: f64,
    pub bin_width: f64,
    pub n_bins: usize,
}

/// Position of a query value between two neighbouring bin centers.
///
/// `lower == upper` with `t == 0` when the value lies beyond the first or last bin
/// center; `clamped` is set when it lies outside the axis range altogether.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxisBracket {
    pub lower: usize,
    pub upper: usize,
    pub t: f64,
    pub clamped: bool,
}

impl TableAxis {
    pub fn new(offset: f64, bin_width: f64, n_bins: usize) -> Result<Self, ShowerScaleError> {
        let axis = Self {
            offset,
            bin_width,
            n_bins,
        };
        axis.validate("axis")?;
        Ok(axis)
    }

    pub(crate) fn validate(&self, name: &str) -> Result<(), ShowerScaleError> {
        if !self.offset.is_finite() {
            return Err(ShowerScaleError::InvalidLookupParameter(format!(
                "{name}: offset must be finite"
            )));
        }
        if !(self.bin_width.is_finite() && self.bin_width > 0.0) {
            return Err(ShowerScaleError::InvalidLookupParameter(format!(
                "{name}: bin width must be > 0"
            )));
        }
        if self.n_bins == 0 {
            return Err(ShowerScaleError::InvalidLookupParameter(format!(
                "{name}: at least one bin is required"
            )));
        }
        Ok(())
    }

    #[inline]
    pub fn lower_edge(&self) -> f64 {
        self.offset
    }

    #[inline]
    pub fn upper_edge(&self) -> f64 {
        self.offset + self.bin_width * self.n_bins as f64
    }

    #[inline]
    pub fn bin_center(&self, index: usize) -> f64 {
        self.offset + (index as f64 + 0.5) * self.bin_width
    }

    /// Index of the bin containing `x`, or `None` outside `[lower_edge, upper_edge)`.
    pub fn bin_index(&self, x: f64) -> Option<usize> {
        if !x.is_finite() || x < self.lower_edge() || x >= self.upper_edge() {
            return None;
        }
        let index = ((x - self.offset) / self.bin_width).floor() as usize;
        Some(index.min(self.n_bins - 1))
    }

    /// Bracket `x` between the two nearest bin centers.
    ///
    /// The fractional position is snapped onto a bin center when it is within
    /// numerical noise of it, so that a query at a center reads that bin alone.
    pub fn bracket(&self, x: f64) -> AxisBracket {
        let last = self.n_bins - 1;
        let clamped = x < self.lower_edge() || x >= self.upper_edge();

        let mut pos = (x - self.offset) / self.bin_width - 0.5;
        if (pos - pos.round()).abs() < EPS {
            pos = pos.round();
        }

        if pos <= 0.0 {
            return AxisBracket {
                lower: 0,
                upper: 0,
                t: 0.0,
                clamped,
            };
        }
        if pos >= last as f64 {
            return AxisBracket {
                lower: last,
                upper: last,
                t: 0.0,
                clamped,
            };
        }

        let lower = pos.floor() as usize;
        AxisBracket {
            lower,
            upper: lower + 1,
            t: pos - lower as f64,
            clamped,
        }
    }

    pub(crate) fn approx_eq(&self, other: &TableAxis) -> bool {
        self.n_bins == other.n_bins
            && (self.offset - other.offset).abs() < EPS
            && (self.bin_width - other.bin_width).abs() < EPS
    }
}

impl fmt::Display for TableAxis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}×{} from {}",
            self.n_bins, self.bin_width, self.offset
        )
    }
}

/// The two axes of a lookup table: log10(size) first, core distance second.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TableAxes {
    pub size: TableAxis,
    pub distance: TableAxis,
}

impl TableAxes {
    #[inline]
    pub fn n_cells(&self) -> usize {
        self.size.n_bins * self.distance.n_bins
    }

    /// Row-major cell index (size major, distance minor).
    #[inline]
    pub fn cell_index(&self, size_bin: usize, distance_bin: usize) -> usize {
        size_bin * self.distance.n_bins + distance_bin
    }

    /// Compare with the expected axes, describing the first difference.
    pub fn check_matches(
        &self,
        expected: &TableAxes,
        quantity: TableQuantity,
    ) -> Result<(), ShowerScaleError> {
        if !self.size.approx_eq(&expected.size) {
            return Err(ShowerScaleError::AxisMismatch {
                quantity,
                detail: format!("size axis {} != expected {}", self.size, expected.size),
            });
        }
        if !self.distance.approx_eq(&expected.distance) {
            return Err(ShowerScaleError::AxisMismatch {
                quantity,
                detail: format!(
                    "distance axis {} != expected {}",
                    self.distance, expected.distance
                ),
            });
        }
        Ok(())
    }
}
