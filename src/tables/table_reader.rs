//! # Read-mode lookup table
//!
//! A [`LookupTableReader`] holds the finalized statistics of every bin and answers
//! interpolated queries.
//!
//! ## Query algorithm
//! -----------------
//! For a query point (log10 size, distance):
//!
//! 1. each axis is bracketed between the two nearest **bin centers** (not the bin
//!    containing the point), giving a 2×2 block of bins and fractional positions,
//! 2. for each of the two size neighbours, the bins are interpolated along the
//!    distance axis,
//! 3. the two results are interpolated along the size axis.
//!
//! Invalid bins follow the two-point rules of [`crate::tables::interpolation`]: an
//! invalid neighbour is ignored, two invalid neighbours give no estimate. Beyond the
//! first/last bin center (and in the under/overflow margin) the edge bin is read
//! unweighted and the estimate is flagged as `clamped`.
use std::fmt;

use crate::constants::{Log10Size, Meter};
use crate::showerscale_errors::ShowerScaleError;
use crate::tables::bin_stat::FinalizedBin;
use crate::tables::interpolation::{interpolate_pair, Interpolate};
use crate::tables::{TableAxes, TableQuantity};

/// Which central value of a bin is read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinReadout {
    Median,
    Mean,
}

/// Interpolated table value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TableEstimate {
    /// Expected value of the target quantity
    pub value: f64,
    /// Quantile spread at that point
    pub sigma: f64,
    /// The query lay outside the axis range on at least one axis
    pub clamped: bool,
}

impl Interpolate for TableEstimate {
    fn blend(&self, other: &Self, t: f64) -> Self {
        TableEstimate {
            value: self.value.blend(&other.value, t),
            sigma: self.sigma.blend(&other.sigma, t),
            clamped: self.clamped || other.clamped,
        }
    }
}

/// Filled/valid bin counts of one table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableSummary {
    pub quantity: TableQuantity,
    pub total_bins: usize,
    pub filled_bins: usize,
    pub valid_bins: usize,
    pub entries: u64,
}

impl fmt::Display for TableSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} table: {} entries, {}/{} bins filled, {} valid",
            self.quantity, self.entries, self.filled_bins, self.total_bins, self.valid_bins
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LookupTableReader {
    quantity: TableQuantity,
    axes: TableAxes,
    cells: Vec<FinalizedBin>,
}

impl LookupTableReader {
    pub(crate) fn from_finalized(
        quantity: TableQuantity,
        axes: TableAxes,
        cells: Vec<FinalizedBin>,
    ) -> Self {
        Self {
            quantity,
            axes,
            cells,
        }
    }

    /// Rebuild a reader from persisted statistics.
    ///
    /// Return
    /// ----------
    /// * `Err(InvalidTableAxis)` if the number of cells does not match the axes.
    pub fn from_parts(
        quantity: TableQuantity,
        axes: TableAxes,
        cells: Vec<FinalizedBin>,
    ) -> Result<Self, ShowerScaleError> {
        if cells.len() != axes.n_cells() {
            return Err(ShowerScaleError::InvalidTableAxis(format!(
                "{quantity} table holds {} cells, axes require {}",
                cells.len(),
                axes.n_cells()
            )));
        }
        Ok(Self::from_finalized(quantity, axes, cells))
    }

    pub fn quantity(&self) -> TableQuantity {
        self.quantity
    }

    pub fn axes(&self) -> &TableAxes {
        &self.axes
    }

    pub fn cells(&self) -> &[FinalizedBin] {
        &self.cells
    }

    #[inline]
    pub fn cell(&self, size_bin: usize, distance_bin: usize) -> &FinalizedBin {
        &self.cells[self.axes.cell_index(size_bin, distance_bin)]
    }

    /// Median estimate and spread at (log10 size, distance).
    pub fn query(&self, log10_size: Log10Size, distance: Meter) -> Option<TableEstimate> {
        self.query_with(log10_size, distance, BinReadout::Median)
    }

    /// Interpolated estimate and spread at (log10 size, distance).
    ///
    /// Arguments
    /// -----------------
    /// * `log10_size`: decimal logarithm of the image size.
    /// * `distance`: core distance in meters.
    /// * `readout`: read the bin medians or the bin means.
    ///
    /// Return
    /// ----------
    /// * `None` for non-finite inputs or when every bin involved is invalid.
    pub fn query_with(
        &self,
        log10_size: Log10Size,
        distance: Meter,
        readout: BinReadout,
    ) -> Option<TableEstimate> {
        if !log10_size.is_finite() || !distance.is_finite() {
            return None;
        }

        let bs = self.axes.size.bracket(log10_size);
        let bd = self.axes.distance.bracket(distance);
        let clamped = bs.clamped || bd.clamped;

        let along_distance = |size_bin: usize| {
            let low = self.bin_estimate(size_bin, bd.lower, readout, clamped);
            let high = self.bin_estimate(size_bin, bd.upper, readout, clamped);
            interpolate_pair(low.as_ref(), high.as_ref(), bd.t)
        };

        let low = along_distance(bs.lower);
        let high = if bs.upper == bs.lower {
            None
        } else {
            along_distance(bs.upper)
        };
        interpolate_pair(low.as_ref(), high.as_ref(), bs.t)
    }

    fn bin_estimate(
        &self,
        size_bin: usize,
        distance_bin: usize,
        readout: BinReadout,
        clamped: bool,
    ) -> Option<TableEstimate> {
        self.cell(size_bin, distance_bin).stats.map(|s| TableEstimate {
            value: match readout {
                BinReadout::Median => s.median,
                BinReadout::Mean => s.mean,
            },
            sigma: s.sigma,
            clamped,
        })
    }

    pub fn summary(&self) -> TableSummary {
        TableSummary {
            quantity: self.quantity,
            total_bins: self.cells.len(),
            filled_bins: self.cells.iter().filter(|c| c.count > 0).count(),
            valid_bins: self.cells.iter().filter(|c| c.is_valid()).count(),
            entries: self.cells.iter().map(|c| c.count).sum(),
        }
    }
}

#[cfg(test)]
mod table_reader_tests {
    use super::*;
    use crate::tables::bin_stat::BinStatistics;
    use crate::tables::table_builder::LookupTableBuilder;
    use crate::tables::{TableAxis, ValueRange};
    use approx::assert_relative_eq;

    fn axes() -> TableAxes {
        TableAxes {
            size: TableAxis::new(1.5, 0.1, 55).unwrap(),
            distance: TableAxis::new(0.0, 15.0, 80).unwrap(),
        }
    }

    fn valid(median: f64, sigma: f64) -> FinalizedBin {
        FinalizedBin {
            count: 10,
            stats: Some(BinStatistics {
                median,
                sigma,
                mean: median + 0.01,
            }),
        }
    }

    /// Table whose valid bins follow `f(size_bin, distance_bin)`.
    fn table_from(f: impl Fn(usize, usize) -> Option<f64>) -> LookupTableReader {
        let axes = axes();
        let mut cells = Vec::with_capacity(axes.n_cells());
        for i in 0..axes.size.n_bins {
            for j in 0..axes.distance.n_bins {
                cells.push(f(i, j).map_or(FinalizedBin::default(), |v| valid(v, 0.1)));
            }
        }
        LookupTableReader::from_parts(TableQuantity::Width, axes, cells).unwrap()
    }

    #[test]
    fn scenario_fill_then_query() {
        let mut builder = LookupTableBuilder::new(TableQuantity::Width, axes(), ValueRange::new(0.0, 2.0));
        for v in [0.8, 0.9, 0.9, 1.0, 1.0, 1.0, 1.0, 1.1, 1.1, 1.2] {
            builder.fill(2.0, 50.0, v, 1.0).unwrap();
        }
        let reader = builder.finalize(5, (0.16, 0.84));

        let i = reader.axes().size.bin_index(2.0).unwrap();
        let j = reader.axes().distance.bin_index(50.0).unwrap();
        assert_eq!(reader.cell(i, j).count, 10);

        let est = reader.query(2.0, 50.0).unwrap();
        assert_relative_eq!(est.value, 1.0, epsilon = 1e-9);
        assert_relative_eq!(est.sigma, 0.2, epsilon = 1e-9);
        assert!(!est.clamped);
    }

    #[test]
    fn bin_center_reproduces_the_bin() {
        let reader = table_from(|i, j| Some(0.01 * i as f64 + 0.001 * j as f64));
        let size = reader.axes().size.bin_center(12);
        let dist = reader.axes().distance.bin_center(7);
        let est = reader.query(size, dist).unwrap();
        assert_eq!(est.value, reader.cell(12, 7).stats.unwrap().median);
    }

    #[test]
    fn separable_bilinear_interpolation() {
        let reader = table_from(|i, j| Some(i as f64 + 10.0 * j as f64));
        // midway between centers 3|4 on size and 2|3 on distance
        let size = 0.5 * (reader.axes().size.bin_center(3) + reader.axes().size.bin_center(4));
        let dist = 0.5 * (reader.axes().distance.bin_center(2) + reader.axes().distance.bin_center(3));
        let est = reader.query(size, dist).unwrap();
        assert_relative_eq!(est.value, 3.5 + 25.0, epsilon = 1e-9);
    }

    #[test]
    fn invalid_neighbour_is_ignored() {
        let reader = table_from(|i, j| if i == 4 && j == 3 { None } else { Some(1.0 + 0.1 * j as f64) });
        let dist = 0.5 * (reader.axes().distance.bin_center(2) + reader.axes().distance.bin_center(3));
        let size = reader.axes().size.bin_center(4);
        // (4,3) is invalid: the (4,2) bin is used unweighted
        let est = reader.query(size, dist).unwrap();
        assert_relative_eq!(est.value, 1.2, epsilon = 1e-9);
    }

    #[test]
    fn all_invalid_gives_none() {
        let reader = table_from(|i, _| if i > 10 { Some(1.0) } else { None });
        assert_eq!(reader.query(1.6, 100.0), None);
        assert!(reader.query(f64::NAN, 100.0).is_none());
    }

    #[test]
    fn overflow_reads_edge_bin() {
        let reader = table_from(|_, j| Some(1.0 + j as f64));
        let size = reader.axes().size.bin_center(20);
        let est = reader.query(size, 5000.0).unwrap();
        assert_eq!(est.value, 80.0);
        assert!(est.clamped);
    }

    #[test]
    fn mean_readout() {
        let reader = table_from(|_, _| Some(2.0));
        let est = reader.query_with(2.0, 50.0, BinReadout::Mean).unwrap();
        assert_relative_eq!(est.value, 2.01, epsilon = 1e-12);
    }

    #[test]
    fn cell_count_is_checked() {
        let err = LookupTableReader::from_parts(TableQuantity::Length, axes(), vec![]).unwrap_err();
        assert!(matches!(err, ShowerScaleError::InvalidTableAxis(_)));
    }
}
