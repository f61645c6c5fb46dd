//! JSON storage of a finalized table grid.
//!
//! A grid is written as one document listing every table with its grid key, its
//! quantity, its axis definition and the finalized `(count, median, sigma, mean)` of
//! each bin. Loading rebuilds the grid layout from the keys found in the document
//! ([`GridLayout::discover`]) and then requires every (cell, telescope type, noise
//! level) of that layout to provide all three tables. Axis definitions must equal
//! those of the current [`LookupParams`]; any mismatch or missing table aborts the
//! load.
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};

use ahash::RandomState;
use camino::Utf8Path;
use serde::{Deserialize, Serialize};

use crate::grid::table_grid::TableGrid;
use crate::grid::{AzimuthSector, Grid, GridIndex, GridKey, GridLayout, TableSet};
use crate::images::TelescopeType;
use crate::lookup_params::LookupParams;
use crate::showerscale_errors::ShowerScaleError;
use crate::tables::bin_stat::FinalizedBin;
use crate::tables::table_reader::LookupTableReader;
use crate::tables::{TableAxes, TableQuantity};

/// Version of the document layout written by [`save`].
pub const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedTable {
    pub zenith: f64,
    pub wobble: f64,
    pub azimuth_sector: AzimuthSector,
    pub telescope_type: TelescopeType,
    pub noise: f64,
    pub quantity: TableQuantity,
    pub axes: TableAxes,
    /// Bins in size-major order
    pub cells: Vec<FinalizedBin>,
}

impl PersistedTable {
    fn key(&self) -> GridKey {
        GridKey {
            zenith: self.zenith,
            wobble: self.wobble,
            sector: self.azimuth_sector,
            telescope_type: self.telescope_type,
            noise: self.noise,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedGrid {
    pub format_version: u32,
    pub min_showers_per_bin: u64,
    pub sigma_quantiles: (f64, f64),
    pub tables: Vec<PersistedTable>,
}

impl PersistedGrid {
    /// Snapshot of every table of `grid`.
    pub fn from_grid(grid: &TableGrid, params: &LookupParams) -> Self {
        let mut tables = Vec::with_capacity(3 * grid.layout().indices().len());
        for (key, set) in grid.iter() {
            for quantity in TableQuantity::ALL {
                let table = set.get(quantity);
                tables.push(PersistedTable {
                    zenith: key.zenith,
                    wobble: key.wobble,
                    azimuth_sector: key.sector,
                    telescope_type: key.telescope_type,
                    noise: key.noise,
                    quantity,
                    axes: *table.axes(),
                    cells: table.cells().to_vec(),
                });
            }
        }
        Self {
            format_version: FORMAT_VERSION,
            min_showers_per_bin: params.min_showers_per_bin,
            sigma_quantiles: params.sigma_quantiles,
            tables,
        }
    }

    /// Rebuild the read-mode grid.
    ///
    /// Return
    /// ----------
    /// * `Err(AxisMismatch)` if a table was written with other axes than
    ///   `params.table_axes()`,
    /// * `Err(MissingTable)` if a (cell, type, noise level, quantity) implied by the
    ///   document is absent,
    /// * `Err(InconsistentGrid)` for duplicated tables,
    /// * `Err(EmptyGrid)` for a document without tables.
    pub fn into_grid(self, params: &LookupParams) -> Result<TableGrid, ShowerScaleError> {
        if self.format_version != FORMAT_VERSION {
            return Err(ShowerScaleError::InconsistentGrid(format!(
                "unsupported table format version {} (expected {FORMAT_VERSION})",
                self.format_version
            )));
        }
        if self.min_showers_per_bin != params.min_showers_per_bin {
            log::warn!(
                "tables were finalized with min_showers_per_bin = {}, current setting is {}",
                self.min_showers_per_bin,
                params.min_showers_per_bin
            );
        }

        let axes = params.table_axes();
        for table in &self.tables {
            table.axes.check_matches(&axes, table.quantity)?;
        }

        let layout = GridLayout::discover(self.tables.iter().map(PersistedTable::key))?;

        let mut by_index: HashMap<(GridIndex, TableQuantity), LookupTableReader, RandomState> =
            HashMap::default();
        for table in self.tables {
            let key = table.key();
            let index = layout.index_of(&key).ok_or_else(|| {
                ShowerScaleError::InconsistentGrid(format!("table {key} outside the layout"))
            })?;
            let reader = LookupTableReader::from_parts(table.quantity, table.axes, table.cells)?;
            if by_index.insert((index, table.quantity), reader).is_some() {
                return Err(ShowerScaleError::InconsistentGrid(format!(
                    "duplicate {} table for {key}",
                    table.quantity
                )));
            }
        }

        let mut take = |index: &GridIndex, key: &GridKey, quantity: TableQuantity| {
            by_index.remove(&(*index, quantity)).ok_or_else(|| {
                ShowerScaleError::MissingTable(format!("{quantity} table for {key}"))
            })
        };
        let grid = Grid::from_layout(layout, |index, key| {
            Ok(TableSet {
                width: take(index, key, TableQuantity::Width)?,
                length: take(index, key, TableQuantity::Length)?,
                energy: take(index, key, TableQuantity::Energy)?,
            })
        })?;

        TableGrid::new(axes, grid)
    }
}

/// Write `grid` as a JSON document at `path`.
pub fn save(grid: &TableGrid, params: &LookupParams, path: &Utf8Path) -> Result<(), ShowerScaleError> {
    let document = PersistedGrid::from_grid(grid, params);
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer(&mut writer, &document)?;
    writer.flush()?;
    log::info!("Wrote {} tables to {path}", document.tables.len());
    Ok(())
}

/// Load a grid written by [`save`], checking it against `params`.
pub fn load(path: &Utf8Path, params: &LookupParams) -> Result<TableGrid, ShowerScaleError> {
    let reader = BufReader::new(File::open(path)?);
    let document: PersistedGrid = serde_json::from_reader(reader)?;
    let grid = document.into_grid(params)?;
    log::info!("Loaded table grid from {path}: {}", grid.summary());
    Ok(grid)
}
