//! # Read-mode table grid
//!
//! A [`TableGrid`] owns every finalized table of a run. It is immutable once built
//! (by [`crate::grid::grid_builder::GridBuilder::finalize`] or
//! [`crate::grid::persistence::load`]) and is only ever borrowed by the estimator,
//! so one instance can be shared by any number of readers.
//!
//! ## Cell selection
//! -----------------
//! [`TableGrid::select_cell`] resolves a query (zenith, wobble offset, azimuth,
//! telescope type, noise level) into the 2×2 block of table sets needed for the
//! wobble-then-zenith interpolation:
//!
//! * zenith: bracketing pair of catalogued zenith angles,
//! * wobble offset: bracketing pair **within each zenith angle** (wobble offsets
//!   may differ between zenith angles),
//! * azimuth: the sector containing the pointing azimuth,
//! * noise: nearest catalogued level of each selected cell,
//! * telescope type: exact match, an unknown type is an error.
use std::fmt;

use crate::constants::Degree;
use crate::grid::axis_values::{self, DiscreteBracket};
use crate::grid::{AzimuthSector, Grid, GridIndex, GridKey, GridLayout, TableSet};
use crate::images::TelescopeType;
use crate::showerscale_errors::ShowerScaleError;
use crate::tables::table_reader::LookupTableReader;
use crate::tables::{TableAxes, TableQuantity};

/// Table sets bracketing one query.
///
/// `tables[k][l]` belongs to zenith angle `zenith[k]` and wobble offset `wobble[k][l]`.
/// Repeated values (query outside the covered range) refer to the same table set.
#[derive(Debug, Clone, Copy)]
pub struct CellSelection<'a> {
    pub zenith: [Degree; 2],
    pub wobble: [[Degree; 2]; 2],
    pub tables: [[&'a TableSet<LookupTableReader>; 2]; 2],
    /// The query zenith angle and wobble offset
    pub query_zenith: Degree,
    pub query_wobble: Degree,
}

/// Table and bin counts of a grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridSummary {
    pub zenith_angles: usize,
    pub telescope_types: usize,
    pub table_sets: usize,
    pub empty_tables: usize,
    pub valid_bins: usize,
    pub total_bins: usize,
}

impl fmt::Display for GridSummary {
    /// Compact by default; multi-line with the alternate flag (`{:#}`).
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if f.alternate() {
            writeln!(f, "Table grid summary")?;
            writeln!(f, "------------------")?;
            writeln!(f, "zenith angles   : {}", self.zenith_angles)?;
            writeln!(f, "telescope types : {}", self.telescope_types)?;
            writeln!(f, "table sets      : {}", self.table_sets)?;
            writeln!(f, "empty tables    : {}", self.empty_tables)?;
            write!(f, "valid bins      : {}/{}", self.valid_bins, self.total_bins)
        } else {
            write!(
                f,
                "{} table sets over {} zenith angles and {} telescope types, {} empty tables, {}/{} valid bins",
                self.table_sets,
                self.zenith_angles,
                self.telescope_types,
                self.empty_tables,
                self.valid_bins,
                self.total_bins
            )
        }
    }
}

#[derive(Debug, Clone)]
pub struct TableGrid {
    axes: TableAxes,
    grid: Grid<TableSet<LookupTableReader>>,
}

impl TableGrid {
    /// Wrap a grid of finalized tables after checking its consistency.
    ///
    /// Return
    /// ----------
    /// * `Err(MissingTable)` if an entry of the layout has no table set,
    ///   `Err(AxisMismatch)` if a table does not use `axes`,
    ///   `Err(InconsistentGrid)` if a table is stored under the wrong quantity.
    pub fn new(
        axes: TableAxes,
        grid: Grid<TableSet<LookupTableReader>>,
    ) -> Result<Self, ShowerScaleError> {
        let layout = grid.layout();
        for index in layout.indices() {
            let Some(tables) = grid.get(&index) else {
                return Err(ShowerScaleError::MissingTable(layout.key(&index).to_string()));
            };
            for quantity in TableQuantity::ALL {
                let table = tables.get(quantity);
                if table.quantity() != quantity {
                    return Err(ShowerScaleError::InconsistentGrid(format!(
                        "{} table stored as {quantity} table at {}",
                        table.quantity(),
                        layout.key(&index)
                    )));
                }
                table.axes().check_matches(&axes, quantity)?;
            }
        }
        Ok(Self { axes, grid })
    }

    pub fn axes(&self) -> &TableAxes {
        &self.axes
    }

    pub fn layout(&self) -> &GridLayout {
        self.grid.layout()
    }

    pub fn get(&self, index: &GridIndex) -> Option<&TableSet<LookupTableReader>> {
        self.grid.get(index)
    }

    /// Every table set with its key.
    pub fn iter(&self) -> impl Iterator<Item = (GridKey, &TableSet<LookupTableReader>)> + '_ {
        self.grid.iter()
    }

    /// Select the table sets needed to interpolate one telescope's estimate.
    ///
    /// Arguments
    /// -----------------
    /// * `zenith`: pointing zenith angle (deg).
    /// * `wobble`: wobble offset (deg).
    /// * `azimuth`: pointing azimuth (deg).
    /// * `telescope_type`: type of the telescope.
    /// * `noise`: noise level of the image.
    ///
    /// Return
    /// ----------
    /// * the [`CellSelection`], or `Err(UnknownTelescopeType)` when the grid holds no
    ///   table for that type, `Err(InvalidEvent)` for a non-finite query.
    ///
    /// See also
    /// ------------
    /// * [`crate::estimator::cell_interpolation`] – interpolation over the selection.
    pub fn select_cell(
        &self,
        zenith: Degree,
        wobble: Degree,
        azimuth: Degree,
        telescope_type: TelescopeType,
        noise: f64,
    ) -> Result<CellSelection<'_>, ShowerScaleError> {
        let layout = self.grid.layout();
        if !layout.has_telescope_type(telescope_type) {
            return Err(ShowerScaleError::UnknownTelescopeType(telescope_type));
        }
        if ![zenith, wobble, azimuth, noise].iter().all(|v| v.is_finite()) {
            return Err(ShowerScaleError::InvalidEvent(format!(
                "non-finite cell query: zenith {zenith}, wobble {wobble}, azimuth {azimuth}, noise {noise}"
            )));
        }
        let sector = AzimuthSector::from_azimuth(azimuth);

        let z = bracket_or_empty(layout.zenith(), zenith, "zenith angle")?;
        let zenith_indices = [z.lower, z.upper];

        let mut wobble_values = [[0.0; 2]; 2];
        let mut tables: [[Option<&TableSet<LookupTableReader>>; 2]; 2] = [[None; 2]; 2];
        for (k, &zi) in zenith_indices.iter().enumerate() {
            let offsets = layout.wobble(zi);
            let w = bracket_or_empty(offsets, wobble, "wobble offset")?;
            for (l, wi) in [w.lower, w.upper].into_iter().enumerate() {
                wobble_values[k][l] = offsets[wi];
                let levels = layout.noise(zi, wi, sector);
                let Some(ni) = axis_values::nearest(levels, noise) else {
                    return Err(ShowerScaleError::EmptyGrid(format!(
                        "no noise level at zenith {} deg, wobble {} deg, {sector}",
                        layout.zenith()[zi],
                        offsets[wi]
                    )));
                };
                let index = GridIndex {
                    zenith: zi,
                    wobble: wi,
                    sector,
                    telescope_type,
                    noise: ni,
                };
                tables[k][l] = Some(self.grid.get(&index).ok_or_else(|| {
                    ShowerScaleError::MissingTable(layout.key(&index).to_string())
                })?);
            }
        }

        let [[Some(t00), Some(t01)], [Some(t10), Some(t11)]] = tables else {
            return Err(ShowerScaleError::InconsistentGrid(
                "incomplete cell selection".into(),
            ));
        };

        Ok(CellSelection {
            zenith: [layout.zenith()[z.lower], layout.zenith()[z.upper]],
            wobble: wobble_values,
            tables: [[t00, t01], [t10, t11]],
            query_zenith: zenith,
            query_wobble: wobble,
        })
    }

    /// Table and bin counts over the whole grid.
    pub fn summary(&self) -> GridSummary {
        let mut summary = GridSummary {
            zenith_angles: self.layout().zenith().len(),
            telescope_types: self.layout().telescope_types().len(),
            table_sets: 0,
            empty_tables: 0,
            valid_bins: 0,
            total_bins: 0,
        };
        for (_, tables) in self.grid.iter() {
            summary.table_sets += 1;
            for quantity in TableQuantity::ALL {
                let s = tables.get(quantity).summary();
                if s.entries == 0 {
                    summary.empty_tables += 1;
                }
                summary.valid_bins += s.valid_bins;
                summary.total_bins += s.total_bins;
            }
        }
        summary
    }
}

fn bracket_or_empty(
    values: &[f64],
    x: f64,
    axis: &str,
) -> Result<DiscreteBracket, ShowerScaleError> {
    axis_values::bracket(values, x)
        .ok_or_else(|| ShowerScaleError::EmptyGrid(format!("no {axis} in the grid")))
}
