//! # Lookup-table reconstruction parameters
//!
//! This module defines the [`LookupParams`] configuration struct and its builder,
//! which control how lookup tables are **binned**, **filled** and **read back**, and
//! how the stereo reconstructor and the shower-level fusion behave.
//!
//! ## Purpose
//!
//! A single [`LookupParams`] value is shared by the table-filling run and the lookup run.
//! It lets you:
//!
//! - Define the (log10 size × core distance) binning of every table,
//! - Set the statistical requirements of a bin (`min_showers_per_bin`, sigma quantiles),
//! - Restrict the accepted target values (width, length, log10 energy),
//! - Tune the geometric reconstruction (multiplicity, minimum inter-axis angle),
//! - Tune the energy fusion (median vs. mean surface, outlier rejection),
//! - Apply fill-mode quality cuts and a spectral re-weighting,
//! - Truncate a run after an event-count or wall-clock budget.
//!
//! The axis definitions are persisted with the tables; reading tables with a different
//! binning is rejected at load time.
//!
//! ## Example
//!
//! ```rust,no_run
//! use showerscale::lookup_params::LookupParams;
//!
//! let params = LookupParams::builder()
//!     .min_showers_per_bin(10)
//!     .min_telescope_multiplicity(3)
//!     .min_axis_angle(10.0)
//!     .spectral_reweight_index(Some(2.5))
//!     .build()
//!     .unwrap();
//! println!("{params:#}");
//! ```
//!
//! ## See also
//!
//! * [`crate::grid::grid_builder::GridBuilder`] – fill mode
//! * [`crate::estimator::ShowerParameterEstimator`] – read mode
//! * [`crate::reconstruction::StereoReconstructor`] – geometric reconstruction
use std::cmp::Ordering::{Equal, Greater, Less};
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{
    Degree, Meter, DEFAULT_DISTANCE_AXIS_BINS, DEFAULT_DISTANCE_AXIS_OFFSET,
    DEFAULT_DISTANCE_AXIS_WIDTH, DEFAULT_MIN_SHOWERS_PER_BIN, DEFAULT_SIGMA_QUANTILES,
    DEFAULT_SIZE_AXIS_BINS, DEFAULT_SIZE_AXIS_OFFSET, DEFAULT_SIZE_AXIS_WIDTH,
};
use crate::showerscale_errors::ShowerScaleError;
use crate::tables::{TableAxes, TableAxis, ValueRange};

/// Per-telescope weighting used when averaging scaled widths and lengths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MeanScaledWeighting {
    /// Weight `(expected / sigma)^2`: telescopes with a sharper expectation dominate.
    RelativePrecision,
    /// Plain arithmetic mean of the per-telescope deviations.
    Equal,
}

impl fmt::Display for MeanScaledWeighting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MeanScaledWeighting::RelativePrecision => write!(f, "relative-precision"),
            MeanScaledWeighting::Equal => write!(f, "equal"),
        }
    }
}

/// Configuration of the lookup-table engine.
///
/// Fields
/// -----------------
/// **Table binning**
/// * `size_axis` – log10(size) axis of every table.
/// * `distance_axis` – core-distance axis (m) of every table.
/// * `min_showers_per_bin` – a bin is valid only if it holds strictly more entries.
/// * `sigma_quantiles` – lower/upper quantiles whose difference defines the bin spread.
/// * `width_range`, `length_range`, `log_energy_range` – accepted target values
///   (exclusive bounds); samples outside are discarded at fill time.
///
/// **Image selection and geometry**
/// * `min_image_size` – images with `size <= min_image_size` are ignored.
/// * `min_telescope_multiplicity` – minimum number of usable images per event.
/// * `min_axis_angle` – image-axis pairs closer to parallel than this (deg) are ignored.
///
/// **Fill-mode cuts**
/// * `max_core_distance_error` – maximum distance (m) between reconstructed and true core
///   (no cut when `None`).
/// * `max_wobble_offset` – maximum wobble offset (deg).
/// * `spectral_reweight_index` – target spectral index for re-weighting simulated showers.
/// * `all_azimuth_zenith` – events below this zenith angle (deg) fill every azimuth sector.
///
/// **Read mode**
/// * `use_median_energy` – read the median (true) or mean (false) energy surface.
/// * `mean_scaled_weighting` – per-telescope weighting of scaled width/length.
/// * `outlier_mad_factor` – energy estimates farther than this many mean absolute
///   deviations from the median are rejected.
/// * `outlier_min_telescopes` – outlier rejection requires at least this many estimates.
///
/// **Run budget**
/// * `max_events` – stop after this many events.
/// * `max_wall_time` – stop after this wall-clock duration.
///
/// Defaults
/// -----------------
/// * axes: 55 × 0.1 in log10(size) from 1.5; 80 × 15 m in distance from 0 m
/// * `min_showers_per_bin`: 5, `sigma_quantiles`: (0.16, 0.84)
/// * `width_range`/`length_range`: (0, 2) deg, `log_energy_range`: (-2.5, 3.0)
/// * `min_image_size`: 0, `min_telescope_multiplicity`: 2, `min_axis_angle`: 5°
/// * `max_core_distance_error`: none, `max_wobble_offset`: 100°
/// * `spectral_reweight_index`: none, `all_azimuth_zenith`: 3°
/// * `use_median_energy`: true, `mean_scaled_weighting`: relative precision
/// * `outlier_mad_factor`: 5.0, `outlier_min_telescopes`: 5
/// * no run budget
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LookupParams {
    // --- Table binning ---
    pub size_axis: TableAxis,
    pub distance_axis: TableAxis,
    pub min_showers_per_bin: u64,
    pub sigma_quantiles: (f64, f64),
    pub width_range: ValueRange,
    pub length_range: ValueRange,
    pub log_energy_range: ValueRange,

    // --- Image selection / geometry ---
    pub min_image_size: f64,
    pub min_telescope_multiplicity: usize,
    pub min_axis_angle: Degree,

    // --- Fill-mode cuts ---
    pub max_core_distance_error: Option<Meter>,
    pub max_wobble_offset: Degree,
    pub spectral_reweight_index: Option<f64>,
    pub all_azimuth_zenith: Degree,

    // --- Read mode ---
    pub use_median_energy: bool,
    pub mean_scaled_weighting: MeanScaledWeighting,
    pub outlier_mad_factor: f64,
    pub outlier_min_telescopes: usize,

    // --- Run budget ---
    pub max_events: Option<u64>,
    pub max_wall_time: Option<Duration>,
}

impl LookupParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new [`LookupParamsBuilder`] initialized with the default values.
    pub fn builder() -> LookupParamsBuilder {
        LookupParamsBuilder::new()
    }

    /// Both table axes, in the order used by every lookup table.
    pub fn table_axes(&self) -> TableAxes {
        TableAxes {
            size: self.size_axis,
            distance: self.distance_axis,
        }
    }
}

impl Default for LookupParams {
    fn default() -> Self {
        LookupParams {
            size_axis: TableAxis {
                offset: DEFAULT_SIZE_AXIS_OFFSET,
                bin_width: DEFAULT_SIZE_AXIS_WIDTH,
                n_bins: DEFAULT_SIZE_AXIS_BINS,
            },
            distance_axis: TableAxis {
                offset: DEFAULT_DISTANCE_AXIS_OFFSET,
                bin_width: DEFAULT_DISTANCE_AXIS_WIDTH,
                n_bins: DEFAULT_DISTANCE_AXIS_BINS,
            },
            min_showers_per_bin: DEFAULT_MIN_SHOWERS_PER_BIN,
            sigma_quantiles: DEFAULT_SIGMA_QUANTILES,
            width_range: ValueRange::new(0.0, 2.0),
            length_range: ValueRange::new(0.0, 2.0),
            log_energy_range: ValueRange::new(-2.5, 3.0),

            min_image_size: 0.0,
            min_telescope_multiplicity: 2,
            min_axis_angle: 5.0,

            max_core_distance_error: None,
            max_wobble_offset: 100.0,
            spectral_reweight_index: None,
            all_azimuth_zenith: 3.0,

            use_median_energy: true,
            mean_scaled_weighting: MeanScaledWeighting::RelativePrecision,
            outlier_mad_factor: 5.0,
            outlier_min_telescopes: 5,

            max_events: None,
            max_wall_time: None,
        }
    }
}

/// Builder for [`LookupParams`], with validation.
#[derive(Debug, Clone)]
pub struct LookupParamsBuilder {
    params: LookupParams,
}

impl Default for LookupParamsBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl LookupParamsBuilder {
    pub fn new() -> Self {
        Self {
            params: LookupParams::default(),
        }
    }

    // --- Table binning ---
    pub fn size_axis(mut self, offset: f64, bin_width: f64, n_bins: usize) -> Self {
        self.params.size_axis = TableAxis {
            offset,
            bin_width,
            n_bins,
        };
        self
    }
    pub fn distance_axis(mut self, offset: Meter, bin_width: Meter, n_bins: usize) -> Self {
        self.params.distance_axis = TableAxis {
            offset,
            bin_width,
            n_bins,
        };
        self
    }
    pub fn min_showers_per_bin(mut self, v: u64) -> Self {
        self.params.min_showers_per_bin = v;
        self
    }
    pub fn sigma_quantiles(mut self, low: f64, high: f64) -> Self {
        self.params.sigma_quantiles = (low, high);
        self
    }
    pub fn width_range(mut self, min: f64, max: f64) -> Self {
        self.params.width_range = ValueRange::new(min, max);
        self
    }
    pub fn length_range(mut self, min: f64, max: f64) -> Self {
        self.params.length_range = ValueRange::new(min, max);
        self
    }
    pub fn log_energy_range(mut self, min: f64, max: f64) -> Self {
        self.params.log_energy_range = ValueRange::new(min, max);
        self
    }

    // --- Image selection / geometry ---
    pub fn min_image_size(mut self, v: f64) -> Self {
        self.params.min_image_size = v;
        self
    }
    pub fn min_telescope_multiplicity(mut self, v: usize) -> Self {
        self.params.min_telescope_multiplicity = v;
        self
    }
    pub fn min_axis_angle(mut self, v: Degree) -> Self {
        self.params.min_axis_angle = v;
        self
    }

    // --- Fill-mode cuts ---
    pub fn max_core_distance_error(mut self, v: Option<Meter>) -> Self {
        self.params.max_core_distance_error = v;
        self
    }
    pub fn max_wobble_offset(mut self, v: Degree) -> Self {
        self.params.max_wobble_offset = v;
        self
    }
    pub fn spectral_reweight_index(mut self, v: Option<f64>) -> Self {
        self.params.spectral_reweight_index = v;
        self
    }
    pub fn all_azimuth_zenith(mut self, v: Degree) -> Self {
        self.params.all_azimuth_zenith = v;
        self
    }

    // --- Read mode ---
    pub fn use_median_energy(mut self, v: bool) -> Self {
        self.params.use_median_energy = v;
        self
    }
    pub fn mean_scaled_weighting(mut self, v: MeanScaledWeighting) -> Self {
        self.params.mean_scaled_weighting = v;
        self
    }
    pub fn outlier_mad_factor(mut self, v: f64) -> Self {
        self.params.outlier_mad_factor = v;
        self
    }
    pub fn outlier_min_telescopes(mut self, v: usize) -> Self {
        self.params.outlier_min_telescopes = v;
        self
    }

    // --- Run budget ---
    pub fn max_events(mut self, v: Option<u64>) -> Self {
        self.params.max_events = v;
        self
    }
    pub fn max_wall_time(mut self, v: Option<Duration>) -> Self {
        self.params.max_wall_time = v;
        self
    }

    // ---- Numeric helpers for PartialOrd (handle NaN as invalid) ----

    #[inline]
    fn gt0(x: f64) -> bool {
        x.partial_cmp(&0.0) == Some(Greater)
    }

    #[inline]
    fn ge0(x: f64) -> bool {
        matches!(x.partial_cmp(&0.0), Some(Greater) | Some(Equal))
    }

    #[inline]
    fn lt(a: f64, b: f64) -> bool {
        a.partial_cmp(&b) == Some(Less)
    }

    /// Finalize the builder and produce a [`LookupParams`] instance.
    ///
    /// Validation rules
    /// -----------------
    /// * both table axes: finite offset, `bin_width > 0`, `n_bins >= 1`.
    /// * `0 <= q_low < q_high <= 1` for the sigma quantiles.
    /// * every target range is ordered (`min < max`).
    /// * `min_image_size >= 0`, `min_telescope_multiplicity >= 2`.
    /// * `0 <= min_axis_angle < 90`.
    /// * `max_core_distance_error > 0` when set, `max_wobble_offset >= 0`.
    /// * `spectral_reweight_index`, when set, is finite.
    /// * `all_azimuth_zenith >= 0`.
    /// * `outlier_mad_factor > 0`, `outlier_min_telescopes >= 1`.
    /// * `max_wall_time`, when set, is non-zero.
    ///
    /// Return
    /// ----------
    /// * `Ok(LookupParams)` if all values are valid.
    /// * `Err(ShowerScaleError::InvalidLookupParameter)` naming the first violated rule.
    pub fn build(self) -> Result<LookupParams, ShowerScaleError> {
        let p = &self.params;

        p.size_axis.validate("size_axis")?;
        p.distance_axis.validate("distance_axis")?;

        let (q_low, q_high) = p.sigma_quantiles;
        if !(Self::ge0(q_low) && Self::lt(q_low, q_high) && q_high <= 1.0) {
            return Err(ShowerScaleError::InvalidLookupParameter(
                "sigma_quantiles require 0 <= low < high <= 1".into(),
            ));
        }

        for (name, range) in [
            ("width_range", &p.width_range),
            ("length_range", &p.length_range),
            ("log_energy_range", &p.log_energy_range),
        ] {
            if !Self::lt(range.min, range.max) {
                return Err(ShowerScaleError::InvalidLookupParameter(format!(
                    "{name} requires min < max"
                )));
            }
        }

        if !Self::ge0(p.min_image_size) {
            return Err(ShowerScaleError::InvalidLookupParameter(
                "min_image_size must be >= 0".into(),
            ));
        }
        if p.min_telescope_multiplicity < 2 {
            return Err(ShowerScaleError::InvalidLookupParameter(
                "min_telescope_multiplicity must be >= 2".into(),
            ));
        }
        if !(Self::ge0(p.min_axis_angle) && Self::lt(p.min_axis_angle, 90.0)) {
            return Err(ShowerScaleError::InvalidLookupParameter(
                "min_axis_angle must be in [0, 90) degrees".into(),
            ));
        }

        if p.max_core_distance_error.is_some_and(|d| !Self::gt0(d)) {
            return Err(ShowerScaleError::InvalidLookupParameter(
                "max_core_distance_error must be > 0".into(),
            ));
        }
        if !Self::ge0(p.max_wobble_offset) {
            return Err(ShowerScaleError::InvalidLookupParameter(
                "max_wobble_offset must be >= 0".into(),
            ));
        }
        if let Some(index) = p.spectral_reweight_index {
            if !index.is_finite() {
                return Err(ShowerScaleError::InvalidLookupParameter(
                    "spectral_reweight_index must be finite".into(),
                ));
            }
        }
        if !Self::ge0(p.all_azimuth_zenith) {
            return Err(ShowerScaleError::InvalidLookupParameter(
                "all_azimuth_zenith must be >= 0".into(),
            ));
        }

        if !Self::gt0(p.outlier_mad_factor) {
            return Err(ShowerScaleError::InvalidLookupParameter(
                "outlier_mad_factor must be > 0".into(),
            ));
        }
        if p.outlier_min_telescopes == 0 {
            return Err(ShowerScaleError::InvalidLookupParameter(
                "outlier_min_telescopes must be >= 1".into(),
            ));
        }
        if p.max_wall_time.is_some_and(|d| d.is_zero()) {
            return Err(ShowerScaleError::InvalidLookupParameter(
                "max_wall_time must be non-zero".into(),
            ));
        }

        Ok(self.params)
    }
}

impl fmt::Display for LookupParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if f.alternate() {
            const PARAM_COL: usize = 50;
            writeln!(f, "Lookup Table Parameters")?;
            writeln!(f, "-----------------------")?;

            macro_rules! line {
                ($fmt:expr, $val:expr, $comment:expr) => {{
                    let s = format!($fmt, $val);
                    let pad = if s.len() < PARAM_COL {
                        " ".repeat(PARAM_COL - s.len())
                    } else {
                        " ".to_string()
                    };
                    writeln!(f, "  {}{}# {}", s, pad, $comment)
                }};
            }

            writeln!(f, "[Table binning]")?;
            line!(
                "size_axis            = {}",
                self.size_axis,
                "log10(size) bins"
            )?;
            line!(
                "distance_axis        = {}",
                self.distance_axis,
                "Core distance bins (m)"
            )?;
            line!(
                "min_showers_per_bin  = {}",
                self.min_showers_per_bin,
                "Valid bins hold strictly more entries"
            )?;
            line!(
                "sigma_quantiles      = {:?}",
                self.sigma_quantiles,
                "Quantiles defining the bin spread"
            )?;
            line!(
                "width_range          = {}",
                self.width_range,
                "Accepted widths"
            )?;
            line!(
                "length_range         = {}",
                self.length_range,
                "Accepted lengths"
            )?;
            line!(
                "log_energy_range     = {}",
                self.log_energy_range,
                "Accepted log10(E/TeV)"
            )?;

            writeln!(f, "\n[Image selection / geometry]")?;
            line!(
                "min_image_size       = {:.1}",
                self.min_image_size,
                "Images at or below are ignored"
            )?;
            line!(
                "min_multiplicity     = {}",
                self.min_telescope_multiplicity,
                "Minimum usable images per event"
            )?;
            line!(
                "min_axis_angle       = {:.2} deg",
                self.min_axis_angle,
                "Minimum angle between image axes"
            )?;

            writeln!(f, "\n[Fill-mode cuts]")?;
            line!(
                "max_core_error       = {:?}",
                self.max_core_distance_error,
                "Reconstructed vs. true core (m)"
            )?;
            line!(
                "max_wobble_offset    = {:.2} deg",
                self.max_wobble_offset,
                "Maximum wobble offset"
            )?;
            line!(
                "spectral_index       = {:?}",
                self.spectral_reweight_index,
                "Target spectral index"
            )?;
            line!(
                "all_azimuth_zenith   = {:.1} deg",
                self.all_azimuth_zenith,
                "Below: fill every azimuth sector"
            )?;

            writeln!(f, "\n[Read mode]")?;
            line!(
                "use_median_energy    = {}",
                self.use_median_energy,
                "Median (true) or mean energy surface"
            )?;
            line!(
                "mscw_weighting       = {}",
                self.mean_scaled_weighting,
                "Per-telescope weighting"
            )?;
            line!(
                "outlier_mad_factor   = {:.2}",
                self.outlier_mad_factor,
                "Rejection distance in MAD units"
            )?;
            line!(
                "outlier_min_tels     = {}",
                self.outlier_min_telescopes,
                "Outlier rejection threshold"
            )?;

            writeln!(f, "\n[Run budget]")?;
            line!(
                "max_events           = {:?}",
                self.max_events,
                "Event-count budget"
            )?;
            line!(
                "max_wall_time        = {:?}",
                self.max_wall_time,
                "Wall-clock budget"
            )?;

            Ok(())
        } else {
            write!(
                f,
                "LookupParams(size={}, distance={}, min_showers={}, multiplicity>={}, min_axis_angle={:.1}deg, median_energy={}, outliers>{:.1}MAD@{}tels)",
                self.size_axis,
                self.distance_axis,
                self.min_showers_per_bin,
                self.min_telescope_multiplicity,
                self.min_axis_angle,
                self.use_median_energy,
                self.outlier_mad_factor,
                self.outlier_min_telescopes,
            )
        }
    }
}
