//! Write-mode table grid.
//!
//! A [`GridBuilder`] owns one [`LookupTableBuilder`] triple (width, length, energy)
//! per grid entry. Simulated events are routed to the **nearest** zenith angle,
//! wobble offset and noise level of the layout (no interpolation while filling), to
//! the azimuth sector of their pointing, and to the tables of each image's telescope
//! type. Events close to the zenith fill every azimuth sector, since the azimuth is
//! meaningless there.
//!
//! [`GridBuilder::finalize`] freezes every table and yields the read-mode
//! [`TableGrid`].
use crate::constants::{Log10TeV, TeV};
use crate::grid::axis_values;
use crate::grid::table_grid::TableGrid;
use crate::grid::{AzimuthSector, Grid, GridIndex, GridLayout, TableSet};
use crate::images::{ArrayConfiguration, ArrayEvent};
use crate::lookup_params::LookupParams;
use crate::reconstruction::ShowerGeometry;
use crate::showerscale_errors::ShowerScaleError;
use crate::tables::table_builder::{FillCounters, FillOutcome, LookupTableBuilder};
use crate::tables::{TableAxes, TableQuantity};
use crate::warning_counter::WarningCounter;

/// Per-quantity fill counters summed over the whole grid.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GridFillCounters {
    pub width: FillCounters,
    pub length: FillCounters,
    pub energy: FillCounters,
}

#[derive(Debug)]
pub struct GridBuilder {
    params: LookupParams,
    axes: TableAxes,
    grid: Grid<TableSet<LookupTableBuilder>>,
    axis_warnings: WarningCounter,
    noise_warnings: WarningCounter,
}

impl GridBuilder {
    /// Allocate empty tables for every entry of `layout`.
    pub fn new(layout: GridLayout, params: &LookupParams) -> Result<Self, ShowerScaleError> {
        let axes = params.table_axes();
        let grid = Grid::from_layout(layout, |_, _| {
            Ok(TableSet {
                width: LookupTableBuilder::new(TableQuantity::Width, axes, params.width_range),
                length: LookupTableBuilder::new(TableQuantity::Length, axes, params.length_range),
                energy: LookupTableBuilder::new(
                    TableQuantity::Energy,
                    axes,
                    params.log_energy_range,
                ),
            })
        })?;
        Ok(Self {
            params: params.clone(),
            axes,
            grid,
            axis_warnings: WarningCounter::new("table axis range"),
            noise_warnings: WarningCounter::new("noise level"),
        })
    }

    pub fn layout(&self) -> &GridLayout {
        self.grid.layout()
    }

    pub fn axes(&self) -> &TableAxes {
        &self.axes
    }

    /// Azimuth sectors filled by an event with this pointing.
    pub fn target_sectors(&self, zenith: f64, azimuth: f64) -> Vec<AzimuthSector> {
        if zenith < self.params.all_azimuth_zenith {
            AzimuthSector::ALL.to_vec()
        } else {
            vec![AzimuthSector::from_azimuth(azimuth)]
        }
    }

    /// Fill the tables with the usable images of one reconstructed event.
    ///
    /// Arguments
    /// -----------------
    /// * `array`: telescope types, indexed like the event images.
    /// * `event`: pointing, wobble offset and images.
    /// * `geometry`: reconstructed shower axis, providing the core distances.
    /// * `true_energy`: simulated energy (TeV), stored as log10 in the energy tables.
    /// * `weight`: sample weight (e.g. spectral re-weighting factor).
    ///
    /// Return
    /// ----------
    /// * the number of images that entered at least one table.
    /// * `Err(UnknownTelescopeType)` if an image belongs to a type absent from the layout,
    ///   `Err(InvalidSampleWeight)` for a negative or non-finite weight.
    pub fn fill_event(
        &mut self,
        array: &ArrayConfiguration,
        event: &ArrayEvent,
        geometry: &ShowerGeometry,
        true_energy: TeV,
        weight: f64,
    ) -> Result<usize, ShowerScaleError> {
        let layout = self.grid.layout();
        let Some(zi) = axis_values::nearest(layout.zenith(), event.pointing.zenith) else {
            return Ok(0);
        };
        let Some(wi) = axis_values::nearest(layout.wobble(zi), event.wobble_offset) else {
            return Ok(0);
        };
        let sectors = self.target_sectors(event.pointing.zenith, event.pointing.azimuth);
        let log_energy = energy_table_value(true_energy);

        let mut filled_images = 0;
        for (i, image) in event.images.iter().enumerate() {
            let Some(Some(distance)) = geometry.core_distances.get(i).copied() else {
                continue;
            };
            if !image.is_usable(self.params.min_image_size) {
                continue;
            }
            let telescope_type = array.telescopes[i].telescope_type;
            if !self.grid.layout().has_telescope_type(telescope_type) {
                return Err(ShowerScaleError::UnknownTelescopeType(telescope_type));
            }

            let mut image_filled = false;
            for &sector in &sectors {
                let levels = self.grid.layout().noise(zi, wi, sector);
                let Some(ni) = axis_values::nearest(levels, image.noise) else {
                    continue;
                };
                if image.noise < levels[0] || image.noise > levels[levels.len() - 1] {
                    let (low, high) = (levels[0], levels[levels.len() - 1]);
                    self.noise_warnings.warn(|| {
                        format!(
                            "event {}: noise {} outside catalogued levels [{low}, {high}]",
                            event.event_id, image.noise
                        )
                    });
                }

                let index = GridIndex {
                    zenith: zi,
                    wobble: wi,
                    sector,
                    telescope_type,
                    noise: ni,
                };
                let key = self.grid.layout().key(&index);
                let Some(tables) = self.grid.get_mut(&index) else {
                    return Err(ShowerScaleError::MissingTable(key.to_string()));
                };

                let log_size = image.log10_size();
                let outcomes = [
                    tables.width.fill(log_size, distance, image.width, weight)?,
                    tables.length.fill(log_size, distance, image.length, weight)?,
                    tables.energy.fill(log_size, distance, log_energy, weight)?,
                ];
                if outcomes.contains(&FillOutcome::OutsideAxes) {
                    self.axis_warnings.warn(|| {
                        format!(
                            "event {}: log10(size) {log_size:.3}, distance {distance:.1} m outside table axes",
                            event.event_id
                        )
                    });
                }
                image_filled |= outcomes.contains(&FillOutcome::Filled);
            }
            if image_filled {
                filled_images += 1;
            }
        }
        Ok(filled_images)
    }

    /// Fill counters summed over every table of the grid.
    pub fn counters(&self) -> GridFillCounters {
        fn add(total: &mut FillCounters, c: FillCounters) {
            total.filled += c.filled;
            total.outside_axes += c.outside_axes;
            total.value_rejected += c.value_rejected;
            total.zero_weight += c.zero_weight;
        }
        let mut total = GridFillCounters::default();
        for (_, tables) in self.grid.iter() {
            add(&mut total.width, tables.width.counters());
            add(&mut total.length, tables.length.counters());
            add(&mut total.energy, tables.energy.counters());
        }
        total
    }

    /// Freeze every table and switch the grid to read mode.
    ///
    /// Tables without entries are kept (all bins invalid). One summary line per
    /// non-empty table is logged at debug level, grid totals at info level.
    pub fn finalize(self) -> Result<TableGrid, ShowerScaleError> {
        self.axis_warnings.report();
        self.noise_warnings.report();

        let min_showers = self.params.min_showers_per_bin;
        let quantiles = self.params.sigma_quantiles;
        let mut valid_bins = [0usize; 3];
        let mut empty_tables = 0usize;

        let grid = self.grid.try_map(|key, tables| {
            Ok(tables.map(|quantity, builder| {
                let reader = builder.finalize(min_showers, quantiles);
                let summary = reader.summary();
                if summary.entries == 0 {
                    empty_tables += 1;
                } else {
                    log::debug!("{key}: {summary}");
                }
                let slot = match quantity {
                    TableQuantity::Width => 0,
                    TableQuantity::Length => 1,
                    TableQuantity::Energy => 2,
                };
                valid_bins[slot] += summary.valid_bins;
                reader
            }))
        })?;

        log::info!(
            "Finalized {} table sets ({} empty tables), valid bins: width {}, length {}, energy {}",
            grid.len(),
            empty_tables,
            valid_bins[0],
            valid_bins[1],
            valid_bins[2]
        );
        TableGrid::new(self.axes, grid)
    }
}

/// True energy in the unit stored by the energy tables.
#[inline]
pub fn energy_table_value(true_energy: TeV) -> Log10TeV {
    true_energy.log10()
}

#[cfg(test)]
mod grid_builder_tests {
    use super::*;
    use crate::grid::grid_tests::small_layout;
    use crate::grid::GridKey;
    use crate::images::{ImageMeasurement, Pointing, Telescope, TelescopeType, TelescopeVec};
    use approx::assert_relative_eq;
    use smallvec::smallvec;

    fn array() -> ArrayConfiguration {
        ArrayConfiguration::new(vec![
            Telescope::new(TelescopeType(1), 0.0, 0.0, 0.0),
            Telescope::new(TelescopeType(2), 100.0, 0.0, 0.0),
        ])
    }

    fn image(noise: f64) -> ImageMeasurement {
        ImageMeasurement {
            size: 112.0,
            centroid_x: 0.5,
            centroid_y: 0.0,
            cos_phi: 1.0,
            sin_phi: 0.0,
            width: 0.1,
            length: 0.3,
            noise,
            valid: true,
        }
    }

    fn event(zenith: f64, azimuth: f64, wobble: f64) -> ArrayEvent {
        ArrayEvent {
            event_id: 1,
            pointing: Pointing { azimuth, zenith },
            wobble_offset: wobble,
            images: smallvec![image(190.0), image(90.0)],
            truth: None,
            seed: None,
        }
    }

    fn geometry(distances: TelescopeVec<Option<f64>>) -> ShowerGeometry {
        ShowerGeometry {
            offset_x: 0.0,
            offset_y: 0.0,
            direction: nalgebra::Vector3::z(),
            direction_dispersion: 0.0,
            direction_chi2: 0.0,
            core_x: 0.0,
            core_y: 0.0,
            core_dispersion: 0.0,
            n_images: 2,
            core_distances: distances,
        }
    }

    #[test]
    fn fills_nearest_cell_and_sector() {
        let params = LookupParams::default();
        let mut builder = GridBuilder::new(small_layout(), &params).unwrap();
        let n = builder
            .fill_event(
                &array(),
                &event(24.0, 90.0, 0.3),
                &geometry(smallvec![Some(50.0), Some(50.0)]),
                1.0,
                1.0,
            )
            .unwrap();
        assert_eq!(n, 2);
        let counters = builder.counters();
        assert_eq!(counters.width.filled, 2);
        assert_eq!(counters.energy.filled, 2);

        // telescope type 1 had noise 190 → level 200 of the (20°, 0.25°) cell, sector 3
        let layout = builder.layout().clone();
        let index = layout
            .index_of(&GridKey {
                zenith: 20.0,
                wobble: 0.25,
                sector: AzimuthSector::from_azimuth(90.0),
                telescope_type: TelescopeType(1),
                noise: 200.0,
            })
            .unwrap();
        assert_eq!(builder.grid.get(&index).unwrap().width.counters().filled, 1);
    }

    #[test]
    fn small_zenith_fills_every_sector() {
        let params = LookupParams::builder().all_azimuth_zenith(25.0).build().unwrap();
        let mut builder = GridBuilder::new(small_layout(), &params).unwrap();
        builder
            .fill_event(
                &array(),
                &event(20.0, 10.0, 0.5),
                &geometry(smallvec![Some(50.0), None]),
                2.0,
                1.0,
            )
            .unwrap();
        assert_eq!(builder.counters().length.filled, 4);
    }

    #[test]
    fn non_finite_noise_or_pointing_fills_nothing() {
        let params = LookupParams::default();
        let mut builder = GridBuilder::new(small_layout(), &params).unwrap();
        let distances = geometry(smallvec![Some(50.0), Some(50.0)]);

        let mut noisy = event(20.0, 0.0, 0.5);
        noisy.images[0].noise = f64::NAN;
        let n = builder.fill_event(&array(), &noisy, &distances, 1.0, 1.0).unwrap();
        assert_eq!(n, 1);

        let mut lost = event(20.0, 0.0, 0.5);
        lost.pointing.zenith = f64::NAN;
        let n = builder.fill_event(&array(), &lost, &distances, 1.0, 1.0).unwrap();
        assert_eq!(n, 0);
        assert_eq!(builder.counters().width.filled, 1);
    }

    #[test]
    fn unknown_telescope_type_is_fatal() {
        let params = LookupParams::default();
        let mut builder = GridBuilder::new(small_layout(), &params).unwrap();
        let array = ArrayConfiguration::new(vec![
            Telescope::new(TelescopeType(1), 0.0, 0.0, 0.0),
            Telescope::new(TelescopeType(9), 100.0, 0.0, 0.0),
        ]);
        let err = builder
            .fill_event(
                &array,
                &event(40.0, 0.0, 1.0),
                &geometry(smallvec![Some(50.0), Some(60.0)]),
                1.0,
                1.0,
            )
            .unwrap_err();
        assert_eq!(err, ShowerScaleError::UnknownTelescopeType(TelescopeType(9)));
    }

    #[test]
    fn finalize_reads_back_filled_values() {
        let params = LookupParams::builder().min_showers_per_bin(3).build().unwrap();
        let mut builder = GridBuilder::new(small_layout(), &params).unwrap();
        let geometry = geometry(smallvec![Some(52.5), Some(52.5)]);
        for _ in 0..10 {
            builder
                .fill_event(&array(), &event(40.0, 0.0, 1.0), &geometry, 10.0, 1.0)
                .unwrap();
        }
        let grid = builder.finalize().unwrap();
        let selection = grid
            .select_cell(40.0, 1.0, 0.0, TelescopeType(2), 100.0)
            .unwrap();
        let tables = selection.tables[0][0];
        // log10(112) falls in the size bin centred on 2.05, 52.5 m is a distance bin center
        let est = tables.width.query(2.05, 52.5).unwrap();
        assert_relative_eq!(est.value, 0.1, epsilon = 1e-12);
        let energy = tables.energy.query(2.05, 52.5).unwrap();
        assert_relative_eq!(energy.value, energy_table_value(10.0), epsilon = 1e-12);
    }
}
