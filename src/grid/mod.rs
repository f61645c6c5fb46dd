//! # Table grid
//!
//! Coarse 4-axis index of lookup tables: zenith angle × wobble offset × azimuth
//! sector × noise level, with one [`TableSet`] (width, length, energy) per
//! telescope type in every cell.
//!
//! ## Overview
//! -----------------
//! * [`GridLayout`] – the discrete axis values. Zenith angles, wobble offsets (per
//!   zenith) and noise levels (per zenith/wobble/sector) are the sorted sets of values
//!   present in the simulation corpus; azimuth uses four fixed 90° sectors
//!   ([`AzimuthSector`]).
//! * [`Grid`] – generic storage of one `T` per (cell, telescope type, noise level).
//!   It is instantiated with table builders in write mode
//!   ([`grid_builder::GridBuilder`]) and with table readers in read mode
//!   ([`table_grid::TableGrid`]).
//!
//! ## Lookup rules
//! -----------------
//! * zenith and wobble offset: bracketing pairs, interpolated downstream,
//! * azimuth: the sector containing the azimuth,
//! * noise level: the nearest catalogued level,
//! * telescope type: exact match; an unknown type is a structural error.
//!
//! ## See also
//! ------------
//! * [`axis_values`] – bracketing and nearest-value searches.
//! * [`persistence`] – JSON storage of a finalized grid.
use std::collections::HashMap;
use std::fmt;

use ahash::RandomState;
use serde::{Deserialize, Serialize};

use crate::constants::{Degree, AZIMUTH_SECTORS, EPS};
use crate::images::TelescopeType;
use crate::showerscale_errors::ShowerScaleError;
use crate::tables::TableQuantity;

pub mod axis_values;
pub mod grid_builder;
pub mod persistence;
pub mod table_grid;

/// One of the four fixed azimuth sectors.
///
/// Azimuths are folded into `(-180, 180]` first. Sector 0 covers `(135, 180]` and
/// `(-180, -135]`, then `(-135, -45]`, `(-45, 45]` and `(45, 135]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AzimuthSector(usize);

impl AzimuthSector {
    pub const ALL: [AzimuthSector; AZIMUTH_SECTORS] = [
        AzimuthSector(0),
        AzimuthSector(1),
        AzimuthSector(2),
        AzimuthSector(3),
    ];

    pub fn new(index: usize) -> Result<Self, ShowerScaleError> {
        if index < AZIMUTH_SECTORS {
            Ok(AzimuthSector(index))
        } else {
            Err(ShowerScaleError::InconsistentGrid(format!(
                "azimuth sector {index} does not exist"
            )))
        }
    }

    /// Sector containing the azimuth `azimuth` (deg, any range).
    pub fn from_azimuth(azimuth: Degree) -> Self {
        let mut az = azimuth.rem_euclid(360.0);
        if az > 180.0 {
            az -= 360.0;
        }
        let index = if az > 135.0 || az <= -135.0 {
            0
        } else if az <= -45.0 {
            1
        } else if az <= 45.0 {
            2
        } else {
            3
        };
        AzimuthSector(index)
    }

    #[inline]
    pub fn index(&self) -> usize {
        self.0
    }
}

impl fmt::Display for AzimuthSector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (low, high) = crate::constants::AZIMUTH_SECTOR_EDGES[self.0];
        write!(f, "az[{low}, {high}]")
    }
}

/// Values identifying one table set of the grid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridKey {
    pub zenith: Degree,
    pub wobble: Degree,
    pub sector: AzimuthSector,
    pub telescope_type: TelescopeType,
    pub noise: f64,
}

impl fmt::Display for GridKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "zenith {} deg, wobble {} deg, {}, telescope type {}, noise {}",
            self.zenith, self.wobble, self.sector, self.telescope_type, self.noise
        )
    }
}

/// Indices identifying one table set of the grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GridIndex {
    pub zenith: usize,
    pub wobble: usize,
    pub sector: AzimuthSector,
    pub telescope_type: TelescopeType,
    pub noise: usize,
}

/// The three tables of one grid cell and telescope type.
#[derive(Debug, Clone, PartialEq)]
pub struct TableSet<T> {
    pub width: T,
    pub length: T,
    pub energy: T,
}

impl<T> TableSet<T> {
    pub fn get(&self, quantity: TableQuantity) -> &T {
        match quantity {
            TableQuantity::Width => &self.width,
            TableQuantity::Length => &self.length,
            TableQuantity::Energy => &self.energy,
        }
    }

    pub fn get_mut(&mut self, quantity: TableQuantity) -> &mut T {
        match quantity {
            TableQuantity::Width => &mut self.width,
            TableQuantity::Length => &mut self.length,
            TableQuantity::Energy => &mut self.energy,
        }
    }

    pub fn map<U, F: FnMut(TableQuantity, T) -> U>(self, mut f: F) -> TableSet<U> {
        TableSet {
            width: f(TableQuantity::Width, self.width),
            length: f(TableQuantity::Length, self.length),
            energy: f(TableQuantity::Energy, self.energy),
        }
    }
}

/// Discrete axis values of a table grid.
#[derive(Debug, Clone, PartialEq)]
pub struct GridLayout {
    zenith: Vec<Degree>,
    wobble: Vec<Vec<Degree>>,
    noise: Vec<Vec<[Vec<f64>; AZIMUTH_SECTORS]>>,
    telescope_types: Vec<TelescopeType>,
}

impl GridLayout {
    /// Build a layout from explicit axis values.
    ///
    /// Arguments
    /// -----------------
    /// * `zenith`: zenith angles (deg).
    /// * `wobble`: wobble offsets (deg) available at each zenith angle.
    /// * `noise`: noise levels available at each (zenith, wobble, azimuth sector).
    /// * `telescope_types`: telescope types present in every cell.
    ///
    /// Rows are sorted ascending together with their sub-rows; noise levels are
    /// sorted and de-duplicated.
    ///
    /// Return
    /// ----------
    /// * `Err(InconsistentGrid)` for mismatched shapes, duplicate or non-finite
    ///   values; `Err(EmptyGrid)` if an axis is empty.
    pub fn new(
        zenith: Vec<Degree>,
        wobble: Vec<Vec<Degree>>,
        noise: Vec<Vec<[Vec<f64>; AZIMUTH_SECTORS]>>,
        mut telescope_types: Vec<TelescopeType>,
    ) -> Result<Self, ShowerScaleError> {
        if zenith.is_empty() {
            return Err(ShowerScaleError::EmptyGrid("no zenith angle".into()));
        }
        if telescope_types.is_empty() {
            return Err(ShowerScaleError::EmptyGrid("no telescope type".into()));
        }
        if wobble.len() != zenith.len() || noise.len() != zenith.len() {
            return Err(ShowerScaleError::InconsistentGrid(format!(
                "{} zenith angles but {} wobble rows and {} noise rows",
                zenith.len(),
                wobble.len(),
                noise.len()
            )));
        }

        let mut rows: Vec<(Degree, Vec<(Degree, [Vec<f64>; AZIMUTH_SECTORS])>)> =
            Vec::with_capacity(zenith.len());
        for ((z, wobbles), noise_row) in zenith.into_iter().zip(wobble).zip(noise) {
            if !z.is_finite() {
                return Err(ShowerScaleError::InconsistentGrid(
                    "non-finite zenith angle".into(),
                ));
            }
            if wobbles.is_empty() {
                return Err(ShowerScaleError::EmptyGrid(format!(
                    "no wobble offset at zenith {z} deg"
                )));
            }
            if wobbles.len() != noise_row.len() {
                return Err(ShowerScaleError::InconsistentGrid(format!(
                    "zenith {z} deg: {} wobble offsets but {} noise rows",
                    wobbles.len(),
                    noise_row.len()
                )));
            }

            let mut cells = Vec::with_capacity(wobbles.len());
            for (w, mut sectors) in wobbles.into_iter().zip(noise_row) {
                if !w.is_finite() {
                    return Err(ShowerScaleError::InconsistentGrid(format!(
                        "zenith {z} deg: non-finite wobble offset"
                    )));
                }
                for (s, levels) in sectors.iter_mut().enumerate() {
                    if levels.iter().any(|n| !n.is_finite()) {
                        return Err(ShowerScaleError::InconsistentGrid(format!(
                            "zenith {z} deg, wobble {w} deg, sector {s}: non-finite noise level"
                        )));
                    }
                    axis_values::sort_dedup(levels);
                    if levels.is_empty() {
                        return Err(ShowerScaleError::EmptyGrid(format!(
                            "zenith {z} deg, wobble {w} deg, sector {s}: no noise level"
                        )));
                    }
                }
                cells.push((w, sectors));
            }
            cells.sort_by(|a, b| a.0.total_cmp(&b.0));
            if cells.windows(2).any(|p| (p[1].0 - p[0].0).abs() < EPS) {
                return Err(ShowerScaleError::InconsistentGrid(format!(
                    "zenith {z} deg: duplicate wobble offset"
                )));
            }
            rows.push((z, cells));
        }
        rows.sort_by(|a, b| a.0.total_cmp(&b.0));
        if rows.windows(2).any(|p| (p[1].0 - p[0].0).abs() < EPS) {
            return Err(ShowerScaleError::InconsistentGrid(
                "duplicate zenith angle".into(),
            ));
        }

        telescope_types.sort_unstable();
        telescope_types.dedup();

        let mut layout = GridLayout {
            zenith: Vec::with_capacity(rows.len()),
            wobble: Vec::with_capacity(rows.len()),
            noise: Vec::with_capacity(rows.len()),
            telescope_types,
        };
        for (z, cells) in rows {
            layout.zenith.push(z);
            let (w, n): (Vec<_>, Vec<_>) = cells.into_iter().unzip();
            layout.wobble.push(w);
            layout.noise.push(n);
        }
        Ok(layout)
    }

    /// Discover the layout from the keys of the tables present in a corpus.
    ///
    /// Every (zenith, wobble, sector) combination found must be populated in all four
    /// sectors; otherwise the missing sector is reported as a missing table.
    pub fn discover<I>(keys: I) -> Result<Self, ShowerScaleError>
    where
        I: IntoIterator<Item = GridKey>,
    {
        let keys: Vec<GridKey> = keys.into_iter().collect();
        if keys.is_empty() {
            return Err(ShowerScaleError::EmptyGrid("no table found".into()));
        }

        let mut zenith = Vec::new();
        for k in &keys {
            axis_values::insert_sorted(&mut zenith, k.zenith);
        }
        let mut wobble = vec![Vec::new(); zenith.len()];
        for k in &keys {
            if let Some(zi) = axis_values::position(&zenith, k.zenith) {
                axis_values::insert_sorted(&mut wobble[zi], k.wobble);
            }
        }
        let mut noise: Vec<Vec<[Vec<f64>; AZIMUTH_SECTORS]>> = wobble
            .iter()
            .map(|row| vec![Default::default(); row.len()])
            .collect();
        let mut telescope_types = Vec::new();
        for k in &keys {
            let Some(zi) = axis_values::position(&zenith, k.zenith) else {
                continue;
            };
            let Some(wi) = axis_values::position(&wobble[zi], k.wobble) else {
                continue;
            };
            axis_values::insert_sorted(&mut noise[zi][wi][k.sector.index()], k.noise);
            telescope_types.push(k.telescope_type);
        }

        for (zi, row) in noise.iter().enumerate() {
            for (wi, sectors) in row.iter().enumerate() {
                for (s, levels) in sectors.iter().enumerate() {
                    if levels.is_empty() {
                        return Err(ShowerScaleError::MissingTable(format!(
                            "no table for zenith {} deg, wobble {} deg, {}",
                            zenith[zi], wobble[zi][wi], AzimuthSector(s)
                        )));
                    }
                }
            }
        }

        Self::new(zenith, wobble, noise, telescope_types)
    }

    pub fn zenith(&self) -> &[Degree] {
        &self.zenith
    }

    pub fn wobble(&self, zenith_index: usize) -> &[Degree] {
        &self.wobble[zenith_index]
    }

    pub fn noise(&self, zenith_index: usize, wobble_index: usize, sector: AzimuthSector) -> &[f64] {
        &self.noise[zenith_index][wobble_index][sector.index()]
    }

    pub fn telescope_types(&self) -> &[TelescopeType] {
        &self.telescope_types
    }

    pub fn has_telescope_type(&self, telescope_type: TelescopeType) -> bool {
        self.telescope_types.binary_search(&telescope_type).is_ok()
    }

    /// Values of the cell at `index`.
    pub fn key(&self, index: &GridIndex) -> GridKey {
        GridKey {
            zenith: self.zenith[index.zenith],
            wobble: self.wobble[index.zenith][index.wobble],
            sector: index.sector,
            telescope_type: index.telescope_type,
            noise: self.noise[index.zenith][index.wobble][index.sector.index()][index.noise],
        }
    }

    /// Indices of the cell whose catalogued values equal `key` (within tolerance).
    pub fn index_of(&self, key: &GridKey) -> Option<GridIndex> {
        let zi = axis_values::position(&self.zenith, key.zenith)?;
        let wi = axis_values::position(&self.wobble[zi], key.wobble)?;
        let ni = axis_values::position(&self.noise[zi][wi][key.sector.index()], key.noise)?;
        self.has_telescope_type(key.telescope_type).then_some(GridIndex {
            zenith: zi,
            wobble: wi,
            sector: key.sector,
            telescope_type: key.telescope_type,
            noise: ni,
        })
    }

    /// Every cell index, in layout order.
    pub fn indices(&self) -> Vec<GridIndex> {
        let mut out = Vec::new();
        for (zi, row) in self.noise.iter().enumerate() {
            for (wi, sectors) in row.iter().enumerate() {
                for sector in AzimuthSector::ALL {
                    for &telescope_type in &self.telescope_types {
                        for ni in 0..sectors[sector.index()].len() {
                            out.push(GridIndex {
                                zenith: zi,
                                wobble: wi,
                                sector,
                                telescope_type,
                                noise: ni,
                            });
                        }
                    }
                }
            }
        }
        out
    }
}

type TelescopeColumns<T> = HashMap<TelescopeType, Vec<T>, RandomState>;

/// One `T` per grid cell, telescope type and noise level.
#[derive(Debug, Clone)]
pub struct Grid<T> {
    layout: GridLayout,
    cells: Vec<Vec<[TelescopeColumns<T>; AZIMUTH_SECTORS]>>,
}

impl<T> Grid<T> {
    /// Create every entry of the layout with `make`.
    pub fn from_layout<F>(layout: GridLayout, mut make: F) -> Result<Self, ShowerScaleError>
    where
        F: FnMut(&GridIndex, &GridKey) -> Result<T, ShowerScaleError>,
    {
        let mut cells: Vec<Vec<[TelescopeColumns<T>; AZIMUTH_SECTORS]>> = layout
            .wobble
            .iter()
            .map(|row| {
                row.iter()
                    .map(|_| std::array::from_fn(|_| HashMap::default()))
                    .collect()
            })
            .collect();

        for index in layout.indices() {
            let key = layout.key(&index);
            let value = make(&index, &key)?;
            cells[index.zenith][index.wobble][index.sector.index()]
                .entry(index.telescope_type)
                .or_insert_with(Vec::new)
                .push(value);
        }

        Ok(Grid { layout, cells })
    }

    /// Transform every entry, stopping at the first error.
    pub fn try_map<U, F>(self, mut f: F) -> Result<Grid<U>, ShowerScaleError>
    where
        F: FnMut(&GridKey, T) -> Result<U, ShowerScaleError>,
    {
        let layout = self.layout;
        let mut cells = Vec::with_capacity(self.cells.len());
        for (zi, row) in self.cells.into_iter().enumerate() {
            let mut new_row = Vec::with_capacity(row.len());
            for (wi, sectors) in row.into_iter().enumerate() {
                let mut new_sectors: [TelescopeColumns<U>; AZIMUTH_SECTORS] =
                    std::array::from_fn(|_| HashMap::default());
                for (s, columns) in sectors.into_iter().enumerate() {
                    for (telescope_type, column) in columns {
                        let mut new_column = Vec::with_capacity(column.len());
                        for (ni, value) in column.into_iter().enumerate() {
                            let key = layout.key(&GridIndex {
                                zenith: zi,
                                wobble: wi,
                                sector: AzimuthSector(s),
                                telescope_type,
                                noise: ni,
                            });
                            new_column.push(f(&key, value)?);
                        }
                        new_sectors[s].insert(telescope_type, new_column);
                    }
                }
                new_row.push(new_sectors);
            }
            cells.push(new_row);
        }
        Ok(Grid { layout, cells })
    }

    pub fn layout(&self) -> &GridLayout {
        &self.layout
    }

    pub fn get(&self, index: &GridIndex) -> Option<&T> {
        self.cells
            .get(index.zenith)?
            .get(index.wobble)?
            .get(index.sector.index())?
            .get(&index.telescope_type)?
            .get(index.noise)
    }

    pub fn get_mut(&mut self, index: &GridIndex) -> Option<&mut T> {
        self.cells
            .get_mut(index.zenith)?
            .get_mut(index.wobble)?
            .get_mut(index.sector.index())?
            .get_mut(&index.telescope_type)?
            .get_mut(index.noise)
    }

    /// Every entry with its key, in layout order.
    pub fn iter(&self) -> impl Iterator<Item = (GridKey, &T)> + '_ {
        self.layout.indices().into_iter().filter_map(move |index| {
            self.get(&index).map(|value| (self.layout.key(&index), value))
        })
    }

    pub fn len(&self) -> usize {
        self.cells
            .iter()
            .flatten()
            .flatten()
            .map(|columns| columns.values().map(Vec::len).sum::<usize>())
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
