//! Interpolation of one telescope's table estimate across the grid.
//!
//! Given a [`CellSelection`], the table value at (log10 size, distance) is read from
//! the four selected table sets and combined in two stages:
//!
//! 1. at each of the two zenith angles, linearly in wobble offset,
//! 2. between the two zenith angles, linearly in `cos(zenith)`.
//!
//! Expected value and spread are interpolated alike. Invalid endpoints follow
//! [`interpolate_pair`]: one valid endpoint is used as is, two invalid endpoints
//! give no estimate. At a catalogued zenith angle the second stage returns the
//! first-stage estimate of that zenith angle unchanged.
use crate::constants::{Log10Size, Meter};
use crate::grid::table_grid::CellSelection;
use crate::tables::interpolation::{cosine_weight, interpolate_pair, linear_weight};
use crate::tables::table_reader::{BinReadout, TableEstimate};
use crate::tables::TableQuantity;

/// Wobble-interpolated estimate at zenith bracket `k` (0 = lower, 1 = upper).
pub fn wobble_stage(
    selection: &CellSelection<'_>,
    k: usize,
    quantity: TableQuantity,
    log10_size: Log10Size,
    distance: Meter,
    readout: BinReadout,
) -> Option<TableEstimate> {
    let [low, high] = selection.tables[k];
    let a = low.get(quantity).query_with(log10_size, distance, readout);
    let b = if std::ptr::eq(low, high) {
        None
    } else {
        high.get(quantity).query_with(log10_size, distance, readout)
    };
    let [w0, w1] = selection.wobble[k];
    let t = linear_weight(w0, w1, selection.query_wobble);
    interpolate_pair(a.as_ref(), b.as_ref(), t)
}

/// Full wobble-then-zenith interpolation of one table quantity.
///
/// Arguments
/// -----------------
/// * `selection`: the bracketing table sets of the telescope.
/// * `quantity`: width, length or energy.
/// * `log10_size`, `distance`: query point of the tables.
/// * `readout`: bin median or bin mean.
///
/// Return
/// ----------
/// * `None` if no contributing table has a valid estimate around the query point.
pub fn interpolate_selection(
    selection: &CellSelection<'_>,
    quantity: TableQuantity,
    log10_size: Log10Size,
    distance: Meter,
    readout: BinReadout,
) -> Option<TableEstimate> {
    let low = wobble_stage(selection, 0, quantity, log10_size, distance, readout);
    let [z0, z1] = selection.zenith;
    let t = cosine_weight(z0, z1, selection.query_zenith);
    if t <= 0.0 {
        return low;
    }
    let high = wobble_stage(selection, 1, quantity, log10_size, distance, readout);
    interpolate_pair(low.as_ref(), high.as_ref(), t)
}
