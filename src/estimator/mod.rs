//! # Shower parameter estimation
//!
//! Per-event conversion of image measurements into shower-level quantities, by
//! lookup in a finalized [`TableGrid`].
//!
//! ## Overview
//! -----------------
//! For every telescope with a usable image and a known core distance:
//!
//! 1. select the bracketing table sets of its telescope type
//!    ([`TableGrid::select_cell`]),
//! 2. interpolate the width, length and energy tables at
//!    `(log10 size, core distance)`, first across wobble offset, then across
//!    `cos(zenith)` ([`cell_interpolation`]),
//! 3. derive the telescope's scaled width/length and energy estimate.
//!
//! The per-telescope values are then fused ([`fusion`]) into the mean scaled
//! width/length (mscw/mscl), the mean width/length ratios (MWR/MLR) and the energy
//! with its resolution and χ².
//!
//! ## Validity
//! -----------------
//! Per-event anomalies are never errors. An event with a non-finite pointing, too
//! few usable images, a failed geometric reconstruction, or no table estimate gets an
//! [`EventStatus`] other than [`EventStatus::Estimated`] and no numeric values.
//! Only structural problems (telescope type absent from the grid, event
//! inconsistent with the array) are returned as [`ShowerScaleError`].
//!
//! The estimator keeps no state between events: its result depends only on the
//! event, its geometry and the borrowed grid.
use std::fmt;

use crate::constants::{Log10Size, Log10TeV, Meter, TeV};
use crate::grid::table_grid::TableGrid;
use crate::images::{ArrayConfiguration, ArrayEvent, TelescopeType, TelescopeVec};
use crate::lookup_params::LookupParams;
use crate::reconstruction::{ReconstructionFailure, ShowerGeometry, StereoReconstructor};
use crate::showerscale_errors::ShowerScaleError;
use crate::tables::table_reader::{BinReadout, TableEstimate};
use crate::tables::TableQuantity;

pub mod cell_interpolation;
pub mod fusion;

use self::cell_interpolation::interpolate_selection;
use self::fusion::{fuse_energy, fuse_mean_scaled, EnergyTerm, ScaledTerm};

/// Outcome of the estimation of one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventStatus {
    /// At least one of mscw, mscl or energy is available
    Estimated,
    /// Non-finite zenith, azimuth or wobble offset
    InvalidInput,
    TooFewImages { found: usize, required: usize },
    NotReconstructed(ReconstructionFailure),
    /// No telescope obtained a valid table estimate
    NoTableEstimate,
}

impl EventStatus {
    #[inline]
    pub fn is_valid(&self) -> bool {
        matches!(self, EventStatus::Estimated)
    }
}

impl fmt::Display for EventStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventStatus::Estimated => write!(f, "estimated"),
            EventStatus::InvalidInput => write!(f, "invalid input (non-finite pointing)"),
            EventStatus::TooFewImages { found, required } => {
                write!(f, "too few images ({found} < {required})")
            }
            EventStatus::NotReconstructed(reason) => write!(f, "not reconstructed: {reason}"),
            EventStatus::NoTableEstimate => write!(f, "no table estimate"),
        }
    }
}

/// Table lookups of one telescope.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TelescopeEstimate {
    /// Index in the array configuration
    pub telescope: usize,
    pub telescope_type: TelescopeType,
    pub log10_size: Log10Size,
    pub core_distance: Meter,
    /// Expected width and its spread
    pub width: Option<TableEstimate>,
    pub length: Option<TableEstimate>,
    /// Energy estimate, log10(E/TeV), and its spread
    pub log10_energy: Option<TableEstimate>,
    /// `(width − expected) / sigma`, when the telescope contributes
    pub scaled_width: Option<f64>,
    pub scaled_length: Option<f64>,
    /// The energy estimate entered the final average
    pub energy_used: bool,
}

impl TelescopeEstimate {
    /// Any of the table lookups read beyond the table axes.
    pub fn clamped(&self) -> bool {
        [self.width, self.length, self.log10_energy]
            .iter()
            .flatten()
            .any(|e| e.clamped)
    }
}

/// Shower-level estimate of one event.
#[derive(Debug, Clone, PartialEq)]
pub struct ShowerEstimate {
    pub event_id: u64,
    pub status: EventStatus,
    pub mscw: Option<f64>,
    pub mscl: Option<f64>,
    /// Mean of measured/expected width
    pub mwr: Option<f64>,
    pub mlr: Option<f64>,
    pub energy: Option<TeV>,
    pub log10_energy: Option<Log10TeV>,
    pub energy_chi2: Option<f64>,
    /// `sqrt(1/Σw)` of the energy average, in log10(E) units
    pub energy_resolution: Option<f64>,
    /// Telescopes contributing to mscw / mscl / energy
    pub n_mscw: usize,
    pub n_mscl: usize,
    pub n_energy: usize,
    /// Energy estimates rejected as outliers
    pub n_energy_rejected: usize,
    pub geometry: Option<ShowerGeometry>,
    pub per_telescope: TelescopeVec<TelescopeEstimate>,
}

impl ShowerEstimate {
    /// An estimate without values.
    pub fn invalid(event_id: u64, status: EventStatus, geometry: Option<ShowerGeometry>) -> Self {
        Self {
            event_id,
            status,
            mscw: None,
            mscl: None,
            mwr: None,
            mlr: None,
            energy: None,
            log10_energy: None,
            energy_chi2: None,
            energy_resolution: None,
            n_mscw: 0,
            n_mscl: 0,
            n_energy: 0,
            n_energy_rejected: 0,
            geometry,
            per_telescope: TelescopeVec::new(),
        }
    }

    #[inline]
    pub fn is_valid(&self) -> bool {
        self.status.is_valid()
    }

    /// Number of telescope lookups that read beyond the table axes.
    pub fn clamped_lookups(&self) -> usize {
        self.per_telescope.iter().filter(|t| t.clamped()).count()
    }
}

/// Read-mode estimator over a borrowed table grid.
#[derive(Debug, Clone, Copy)]
pub struct ShowerParameterEstimator<'a> {
    grid: &'a TableGrid,
    params: &'a LookupParams,
    reconstructor: StereoReconstructor,
}

impl<'a> ShowerParameterEstimator<'a> {
    pub fn new(grid: &'a TableGrid, params: &'a LookupParams) -> Self {
        Self {
            grid,
            params,
            reconstructor: StereoReconstructor::new(params),
        }
    }

    pub fn grid(&self) -> &'a TableGrid {
        self.grid
    }

    pub fn params(&self) -> &'a LookupParams {
        self.params
    }

    fn energy_readout(&self) -> BinReadout {
        if self.params.use_median_energy {
            BinReadout::Median
        } else {
            BinReadout::Mean
        }
    }

    /// Reconstruct the shower axis of `event`, then estimate its parameters.
    ///
    /// A failed reconstruction yields an estimate with
    /// [`EventStatus::NotReconstructed`], not an error.
    pub fn reconstruct_and_estimate(
        &self,
        array: &ArrayConfiguration,
        event: &ArrayEvent,
    ) -> Result<ShowerEstimate, ShowerScaleError> {
        event.validate(array)?;
        if !event.has_finite_pointing() {
            return Ok(ShowerEstimate::invalid(event.event_id, EventStatus::InvalidInput, None));
        }
        match self.reconstructor.reconstruct(array, event) {
            Ok(geometry) => self.estimate(array, event, &geometry),
            Err(ReconstructionFailure::TooFewImages { found, required }) => Ok(ShowerEstimate::invalid(
                event.event_id,
                EventStatus::TooFewImages { found, required },
                None,
            )),
            Err(failure) => Ok(ShowerEstimate::invalid(
                event.event_id,
                EventStatus::NotReconstructed(failure),
                None,
            )),
        }
    }

    /// Estimate mscw, mscl and energy of one event with a known shower axis.
    ///
    /// Arguments
    /// -----------------
    /// * `array`: telescope types, indexed like the event images.
    /// * `event`: pointing, wobble offset, images.
    /// * `geometry`: reconstructed axis, providing one core distance per usable image.
    ///
    /// Return
    /// ----------
    /// * the [`ShowerEstimate`]; check [`ShowerEstimate::is_valid`] before using values.
    /// * `Err(UnknownTelescopeType)` if the grid has no table for an image's telescope
    ///   type, `Err(InvalidEvent)` if the event does not match the array.
    ///
    /// See also
    /// ------------
    /// * [`fusion::fuse_mean_scaled`] – mscw/mscl combination.
    /// * [`fusion::fuse_energy`] – outlier rejection and energy average.
    pub fn estimate(
        &self,
        array: &ArrayConfiguration,
        event: &ArrayEvent,
        geometry: &ShowerGeometry,
    ) -> Result<ShowerEstimate, ShowerScaleError> {
        event.validate(array)?;
        if !event.has_finite_pointing() {
            return Ok(ShowerEstimate::invalid(
                event.event_id,
                EventStatus::InvalidInput,
                Some(geometry.clone()),
            ));
        }
        let params = self.params;

        let usable: TelescopeVec<(usize, Meter)> = event
            .images
            .iter()
            .enumerate()
            .filter(|(_, image)| image.is_usable(params.min_image_size))
            .filter_map(|(i, _)| {
                geometry
                    .core_distances
                    .get(i)
                    .copied()
                    .flatten()
                    .filter(|d| d.is_finite())
                    .map(|d| (i, d))
            })
            .collect();
        if usable.len() < params.min_telescope_multiplicity {
            return Ok(ShowerEstimate::invalid(
                event.event_id,
                EventStatus::TooFewImages {
                    found: usable.len(),
                    required: params.min_telescope_multiplicity,
                },
                Some(geometry.clone()),
            ));
        }

        let energy_readout = self.energy_readout();
        let mut per_telescope: TelescopeVec<TelescopeEstimate> = TelescopeVec::new();
        for &(i, distance) in &usable {
            let image = &event.images[i];
            let telescope_type = array.telescopes[i].telescope_type;
            let selection = self.grid.select_cell(
                event.pointing.zenith,
                event.wobble_offset,
                event.pointing.azimuth,
                telescope_type,
                image.noise,
            )?;
            let log10_size = image.log10_size();
            let lookup = |quantity, readout| {
                interpolate_selection(&selection, quantity, log10_size, distance, readout)
            };
            let width = lookup(TableQuantity::Width, BinReadout::Median);
            let length = lookup(TableQuantity::Length, BinReadout::Median);
            let log10_energy = lookup(TableQuantity::Energy, energy_readout);

            let scaled = |measured: f64, expected: Option<TableEstimate>| {
                expected.and_then(|e| {
                    ScaledTerm {
                        measured,
                        expected: e.value,
                        sigma: e.sigma,
                    }
                    .deviation()
                })
            };
            per_telescope.push(TelescopeEstimate {
                telescope: i,
                telescope_type,
                log10_size,
                core_distance: distance,
                width,
                length,
                log10_energy,
                scaled_width: scaled(image.width, width),
                scaled_length: scaled(image.length, length),
                energy_used: false,
            });
        }

        let scaled_terms = |quantity: TableQuantity| -> Vec<ScaledTerm> {
            per_telescope
                .iter()
                .filter_map(|t| {
                    let (measured, expected) = match quantity {
                        TableQuantity::Width => (event.images[t.telescope].width, t.width?),
                        _ => (event.images[t.telescope].length, t.length?),
                    };
                    Some(ScaledTerm {
                        measured,
                        expected: expected.value,
                        sigma: expected.sigma,
                    })
                })
                .collect()
        };
        let weighting = params.mean_scaled_weighting;
        let width_fusion = fuse_mean_scaled(&scaled_terms(TableQuantity::Width), weighting);
        let length_fusion = fuse_mean_scaled(&scaled_terms(TableQuantity::Length), weighting);

        let energy_index: Vec<usize> = (0..per_telescope.len())
            .filter(|&k| per_telescope[k].log10_energy.is_some())
            .collect();
        let energy_terms: Vec<EnergyTerm> = energy_index
            .iter()
            .filter_map(|&k| {
                per_telescope[k].log10_energy.map(|e| EnergyTerm {
                    log10_energy: e.value,
                    sigma: e.sigma,
                })
            })
            .collect();
        let energy_fusion = fuse_energy(
            &energy_terms,
            params.outlier_mad_factor,
            params.outlier_min_telescopes,
        );
        let mut n_energy_rejected = 0;
        if let Some(fusion) = &energy_fusion {
            for (term, &k) in energy_index.iter().enumerate() {
                per_telescope[k].energy_used = fusion.used[term];
            }
            n_energy_rejected = energy_terms
                .iter()
                .zip(&fusion.used)
                .filter(|(t, used)| t.contributes() && !**used)
                .count();
        }

        let status = if width_fusion.is_some() || length_fusion.is_some() || energy_fusion.is_some()
        {
            EventStatus::Estimated
        } else {
            EventStatus::NoTableEstimate
        };

        Ok(ShowerEstimate {
            event_id: event.event_id,
            status,
            mscw: width_fusion.map(|f| f.mean_scaled),
            mscl: length_fusion.map(|f| f.mean_scaled),
            mwr: width_fusion.map(|f| f.mean_ratio),
            mlr: length_fusion.map(|f| f.mean_ratio),
            energy: energy_fusion.as_ref().map(|f| f.energy),
            log10_energy: energy_fusion.as_ref().map(|f| f.log10_energy),
            energy_chi2: energy_fusion.as_ref().and_then(|f| f.chi2),
            energy_resolution: energy_fusion.as_ref().map(|f| f.resolution),
            n_mscw: width_fusion.map_or(0, |f| f.n_telescopes),
            n_mscl: length_fusion.map_or(0, |f| f.n_telescopes),
            n_energy: energy_fusion.as_ref().map_or(0, |f| f.n_used),
            n_energy_rejected,
            geometry: Some(geometry.clone()),
            per_telescope,
        })
    }
}
