//! Write-mode lookup table.
//!
//! A [`LookupTableBuilder`] owns one [`BinnedStatAccumulator`] per (size, distance) bin.
//! Samples outside the axis range are skipped and counted, never an error.
//! [`LookupTableBuilder::finalize`] consumes the builder and yields the read-mode
//! [`LookupTableReader`], so that a table cannot be filled once it has been frozen.
use crate::constants::{Log10Size, Meter};
use crate::showerscale_errors::ShowerScaleError;
use crate::tables::bin_stat::{BinnedStatAccumulator, SampleOutcome};
use crate::tables::table_reader::LookupTableReader;
use crate::tables::{TableAxes, TableQuantity, ValueRange};

/// Outcome of a single [`LookupTableBuilder::fill`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillOutcome {
    Filled,
    /// (log10 size, distance) outside the table axes
    OutsideAxes,
    /// Target value outside the accepted range
    ValueRejected,
    ZeroWeight,
}

/// Counters of fill outcomes, kept for the end-of-run summary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FillCounters {
    pub filled: u64,
    pub outside_axes: u64,
    pub value_rejected: u64,
    pub zero_weight: u64,
}

#[derive(Debug, Clone)]
pub struct LookupTableBuilder {
    quantity: TableQuantity,
    axes: TableAxes,
    cells: Vec<BinnedStatAccumulator>,
    counters: FillCounters,
}

impl LookupTableBuilder {
    pub fn new(quantity: TableQuantity, axes: TableAxes, range: ValueRange) -> Self {
        Self {
            quantity,
            axes,
            cells: vec![BinnedStatAccumulator::new(range); axes.n_cells()],
            counters: FillCounters::default(),
        }
    }

    pub fn quantity(&self) -> TableQuantity {
        self.quantity
    }

    pub fn axes(&self) -> &TableAxes {
        &self.axes
    }

    pub fn counters(&self) -> FillCounters {
        self.counters
    }

    /// Add one weighted sample at (log10 size, core distance).
    ///
    /// Arguments
    /// -----------------
    /// * `log10_size`: decimal logarithm of the image size.
    /// * `distance`: core distance in meters.
    /// * `value`: target value (width, length or log10 energy).
    /// * `weight`: finite, non-negative sample weight.
    ///
    /// Return
    /// ----------
    /// * the [`FillOutcome`]; only an invalid weight is an error.
    pub fn fill(
        &mut self,
        log10_size: Log10Size,
        distance: Meter,
        value: f64,
        weight: f64,
    ) -> Result<FillOutcome, ShowerScaleError> {
        if !weight.is_finite() || weight < 0.0 {
            return Err(ShowerScaleError::InvalidSampleWeight(weight));
        }

        let (Some(i_size), Some(i_dist)) = (
            self.axes.size.bin_index(log10_size),
            self.axes.distance.bin_index(distance),
        ) else {
            self.counters.outside_axes += 1;
            return Ok(FillOutcome::OutsideAxes);
        };

        let index = self.axes.cell_index(i_size, i_dist);
        let outcome = match self.cells[index].accumulate(value, weight)? {
            SampleOutcome::Accepted => {
                self.counters.filled += 1;
                FillOutcome::Filled
            }
            SampleOutcome::OutOfRange => {
                self.counters.value_rejected += 1;
                FillOutcome::ValueRejected
            }
            SampleOutcome::ZeroWeight => {
                self.counters.zero_weight += 1;
                FillOutcome::ZeroWeight
            }
        };
        Ok(outcome)
    }

    /// Freeze every bin and switch to read mode.
    ///
    /// A table without any entry is not an error: it yields an all-invalid reader.
    pub fn finalize(self, min_showers_per_bin: u64, sigma_quantiles: (f64, f64)) -> LookupTableReader {
        let cells = self
            .cells
            .into_iter()
            .map(|cell| cell.finalize(min_showers_per_bin, sigma_quantiles))
            .collect();
        LookupTableReader::from_finalized(self.quantity, self.axes, cells)
    }
}
