//! # Event loops: table filling and table lookup
//!
//! Drive the engine over a stream of events pulled from an [`EventSource`].
//!
//! ## Overview
//! -----------------
//! * [`fill_tables`] – write mode. Simulated events are reconstructed, filtered by the
//!   fill-mode quality cuts, optionally re-weighted to a target spectrum, and fed to a
//!   [`GridBuilder`]. The run ends with a finalized [`TableGrid`] and the
//!   [`CutStatistics`] of the gates.
//! * [`run_lookup`] – read mode. Every event is reconstructed and estimated against a
//!   borrowed [`TableGrid`]; one [`ShowerEstimate`] is produced per event, valid or not.
//!
//! The two runs never overlap: tables are only read once finalized.
//!
//! ## Fill-mode gates
//! -----------------
//! Applied in this order, each rejected event is counted once:
//!
//! 1. non-finite zenith, azimuth or wobble offset,
//! 2. missing simulation truth,
//! 3. true energy not finite and positive,
//! 4. wobble offset above `max_wobble_offset`,
//! 5. too few usable images,
//! 6. failed geometric reconstruction,
//! 7. reconstructed core farther than `max_core_distance_error` from the true core.
//!
//! Only an event that does not match the array configuration ends a run with an
//! error; bad numbers in an event are counted and skipped.
//!
//! ## Run budget and cancellation
//! -----------------
//! Both loops honour `max_events` / `max_wall_time` of [`LookupParams`] and poll the
//! caller's `should_cancel` closure on a wall-clock interval (see [`budget`]). The
//! budget is checked between events only: a truncated run returns a consistent result
//! for every event it processed.
//!
//! ## Progress UI (feature: `progress`)
//! -----------------
//! With the `progress` feature both loops render an `indicatif` progress bar.
//! The smoothed event rate is shown as the bar message and logged at debug
//! level when a loop ends.
//!
//! ## Examples
//! -----------------
//! ```rust,no_run
//! use showerscale::grid::GridLayout;
//! use showerscale::lookup_params::LookupParams;
//! use showerscale::pipeline::{fill_tables, run_lookup, VecEventSource};
//!
//! # fn demo(
//! #     mut simulated: VecEventSource,
//! #     mut observed: VecEventSource,
//! #     layout: GridLayout,
//! # ) -> Result<(), showerscale::showerscale_errors::ShowerScaleError> {
//! let params = LookupParams::builder().min_showers_per_bin(10).build()?;
//! let filled = fill_tables(&mut simulated, layout, &params, None, || false)?;
//! println!("{:#}", filled.cuts);
//!
//! let lookup = run_lookup(&mut observed, &filled.grid, &params, || false)?;
//! for est in lookup.estimates.iter().filter(|e| e.is_valid()) {
//!     println!("{}: mscw={:?} E={:?}", est.event_id, est.mscw, est.energy);
//! }
//! # Ok(()) }
//! ```
use crate::estimator::{EventStatus, ShowerEstimate, ShowerParameterEstimator};
use crate::grid::grid_builder::GridBuilder;
use crate::grid::table_grid::TableGrid;
use crate::grid::GridLayout;
use crate::images::{ArrayConfiguration, ArrayEvent};
use crate::lookup_params::LookupParams;
use crate::reconstruction::{ReconstructionFailure, StereoReconstructor};
use crate::showerscale_errors::ShowerScaleError;
use crate::warning_counter::WarningCounter;

pub mod budget;
pub mod cuts;
pub mod export;
pub mod progress;
pub mod spectral;

use self::budget::{RunBudget, StopReason};
use self::cuts::{CutStatistics, LookupStatistics};
use self::progress::RunProgress;
use self::spectral::SimulatedSpectrum;

/// Pull-based stream of array events.
pub trait EventSource {
    /// Telescope configuration shared by every event of the stream.
    fn array(&self) -> &ArrayConfiguration;

    /// Next event, `Ok(None)` once the stream is exhausted.
    fn next_event(&mut self) -> Result<Option<ArrayEvent>, ShowerScaleError>;

    /// Expected number of events, if known (used for progress reporting).
    fn len_hint(&self) -> Option<u64> {
        None
    }
}

/// In-memory event source.
#[derive(Debug, Clone)]
pub struct VecEventSource {
    array: ArrayConfiguration,
    events: std::vec::IntoIter<ArrayEvent>,
}

impl VecEventSource {
    pub fn new(array: ArrayConfiguration, events: Vec<ArrayEvent>) -> Self {
        Self {
            array,
            events: events.into_iter(),
        }
    }
}

impl EventSource for VecEventSource {
    fn array(&self) -> &ArrayConfiguration {
        &self.array
    }

    fn next_event(&mut self) -> Result<Option<ArrayEvent>, ShowerScaleError> {
        Ok(self.events.next())
    }

    fn len_hint(&self) -> Option<u64> {
        Some(self.events.len() as u64)
    }
}

/// Result of a table-filling run.
#[derive(Debug, Clone)]
pub struct FillRunOutput {
    pub grid: TableGrid,
    pub cuts: CutStatistics,
}

/// Result of a lookup run.
#[derive(Debug, Clone)]
pub struct LookupRunOutput {
    /// One estimate per processed event, in stream order
    pub estimates: Vec<ShowerEstimate>,
    pub stats: LookupStatistics,
}

/// Fill a table grid from simulated events.
///
/// Arguments
/// -----------------
/// * `source`: simulated events; each must carry its [`crate::images::SimulationTruth`].
/// * `layout`: discrete grid axes to fill (zenith, wobble, noise, telescope types).
/// * `params`: binning, cuts, run budget.
/// * `spectrum`: spectrum the events were simulated with; required when
///   `params.spectral_reweight_index` is set.
/// * `should_cancel`: polled between events, a `true` ends the run.
///
/// Return
/// ----------
/// * the finalized grid and the cut statistics.
/// * `Err(InvalidLookupParameter)` if re-weighting is requested without a simulated
///   spectrum; structural errors of the grid or the events are propagated.
///
/// See also
/// ------------
/// * [`GridBuilder::fill_event`] – per-image binning.
/// * [`SimulatedSpectrum::weight`] – spectral re-weighting.
pub fn fill_tables<S, F>(
    source: &mut S,
    layout: GridLayout,
    params: &LookupParams,
    spectrum: Option<SimulatedSpectrum>,
    mut should_cancel: F,
) -> Result<FillRunOutput, ShowerScaleError>
where
    S: EventSource + ?Sized,
    F: FnMut() -> bool,
{
    let reweight = match (params.spectral_reweight_index, spectrum) {
        (Some(index), Some(spectrum)) => Some((index, spectrum)),
        (Some(index), None) => {
            return Err(ShowerScaleError::InvalidLookupParameter(format!(
                "spectral re-weighting to index {index} requires the simulated spectrum"
            )))
        }
        (None, _) => None,
    };

    let reconstructor = StereoReconstructor::new(params);
    let mut builder = GridBuilder::new(layout, params)?;
    let mut budget = RunBudget::from_params(params);
    let mut progress = RunProgress::new(source.len_hint());
    let mut cuts = CutStatistics::default();

    loop {
        if let Some(reason) = budget.check(cuts.events_read, &mut should_cancel) {
            cuts.stop = reason;
            break;
        }
        let Some(event) = source.next_event()? else {
            break;
        };
        cuts.events_read += 1;
        progress.inc();

        let array = source.array();
        event.validate(array)?;
        if !event.has_finite_pointing() {
            cuts.invalid_pointing += 1;
            continue;
        }

        let Some(truth) = event.truth else {
            cuts.no_simulation_truth += 1;
            continue;
        };
        if !(truth.energy.is_finite() && truth.energy > 0.0) {
            cuts.invalid_truth += 1;
            continue;
        }
        if event.wobble_offset > params.max_wobble_offset {
            cuts.wobble_offset += 1;
            continue;
        }
        let geometry = match reconstructor.reconstruct(array, &event) {
            Ok(geometry) => geometry,
            Err(ReconstructionFailure::TooFewImages { .. }) => {
                cuts.multiplicity += 1;
                continue;
            }
            Err(failure) => {
                log::debug!("event {}: {failure}", event.event_id);
                cuts.reconstruction_failed += 1;
                continue;
            }
        };
        if let Some(max_error) = params.max_core_distance_error {
            let error = (geometry.core_x - truth.core_x).hypot(geometry.core_y - truth.core_y);
            if !(error <= max_error) {
                cuts.core_error += 1;
                continue;
            }
        }

        let weight = reweight.map_or(1.0, |(index, spectrum)| spectrum.weight(truth.energy, index));
        let images = builder.fill_event(array, &event, &geometry, truth.energy, weight)?;
        if images > 0 {
            cuts.events_filled += 1;
            cuts.images_filled += images as u64;
        }
    }

    progress.finish(&cuts.stop.to_string());
    if cuts.stop.is_truncated() {
        log::warn!(
            "Table filling truncated after {} events ({}, {:.1?})",
            cuts.events_read,
            cuts.stop,
            budget.elapsed()
        );
    }
    log::info!("{cuts:#}");

    let grid = builder.finalize()?;
    log::info!("{}", grid.summary());
    Ok(FillRunOutput { grid, cuts })
}

/// Reconstruct and estimate every event of a stream.
///
/// Arguments
/// -----------------
/// * `source`: events to analyse.
/// * `grid`: finalized tables.
/// * `params`: reconstruction and fusion settings, run budget.
/// * `should_cancel`: polled between events, a `true` ends the run.
///
/// Return
/// ----------
/// * one [`ShowerEstimate`] per processed event and the run statistics.
/// * structural errors (unknown telescope type, event inconsistent with the array)
///   abort the run.
pub fn run_lookup<S, F>(
    source: &mut S,
    grid: &TableGrid,
    params: &LookupParams,
    mut should_cancel: F,
) -> Result<LookupRunOutput, ShowerScaleError>
where
    S: EventSource + ?Sized,
    F: FnMut() -> bool,
{
    let estimator = ShowerParameterEstimator::new(grid, params);
    let mut budget = RunBudget::from_params(params);
    let mut progress = RunProgress::new(source.len_hint());
    let mut stats = LookupStatistics::default();
    let mut clamped_warnings = WarningCounter::new("lookup beyond table axes");
    let mut estimates = Vec::with_capacity(source.len_hint().unwrap_or(0) as usize);

    loop {
        if let Some(reason) = budget.check(stats.events_read, &mut should_cancel) {
            stats.stop = reason;
            break;
        }
        let Some(event) = source.next_event()? else {
            break;
        };
        stats.events_read += 1;
        progress.inc();

        let estimate = estimator.reconstruct_and_estimate(source.array(), &event)?;
        match estimate.status {
            EventStatus::Estimated => stats.estimated += 1,
            EventStatus::InvalidInput => stats.invalid_input += 1,
            EventStatus::TooFewImages { .. } => stats.multiplicity += 1,
            EventStatus::NotReconstructed(_) => stats.reconstruction_failed += 1,
            EventStatus::NoTableEstimate => stats.no_table_estimate += 1,
        }
        let clamped = estimate.clamped_lookups();
        if clamped > 0 {
            stats.clamped_lookups += clamped as u64;
            clamped_warnings.warn(|| {
                format!(
                    "event {}: {clamped} telescope(s) read the edge bins",
                    event.event_id
                )
            });
        }
        stats.energy_outliers += estimate.n_energy_rejected as u64;
        estimates.push(estimate);
    }

    progress.finish(&stats.stop.to_string());
    clamped_warnings.report();
    if stats.stop != StopReason::Completed {
        log::warn!(
            "Lookup truncated after {} events ({}, {:.1?})",
            stats.events_read,
            stats.stop,
            budget.elapsed()
        );
    }
    log::info!("{stats:#}");
    Ok(LookupRunOutput { estimates, stats })
}

#[cfg(test)]
mod pipeline_tests {
    use super::*;
    use crate::grid::grid_tests::small_layout;
    use crate::grid::table_grid::table_grid_tests::uniform_grid;
    use crate::images::{
        ImageMeasurement, Pointing, ShowerAxisSeed, SimulationTruth, Telescope, TelescopeType,
        TelescopeVec,
    };
    use approx::assert_relative_eq;
    use smallvec::smallvec;

    fn array() -> ArrayConfiguration {
        ArrayConfiguration::new(vec![
            Telescope::new(TelescopeType(1), -60.0, 0.0, 0.0),
            Telescope::new(TelescopeType(2), 60.0, 0.0, 0.0),
            Telescope::new(TelescopeType(1), 0.0, 80.0, 0.0),
        ])
    }

    fn image() -> ImageMeasurement {
        ImageMeasurement {
            size: 112.0,
            centroid_x: 0.3,
            centroid_y: 0.1,
            cos_phi: 1.0,
            sin_phi: 0.0,
            width: 0.1,
            length: 0.3,
            noise: 100.0,
            valid: true,
        }
    }

    /// Event with a known axis through the array center.
    fn event(event_id: u64, images: TelescopeVec<ImageMeasurement>, true_core_x: f64) -> ArrayEvent {
        ArrayEvent {
            event_id,
            pointing: Pointing {
                azimuth: 0.0,
                zenith: 20.0,
            },
            wobble_offset: 0.5,
            images,
            truth: Some(SimulationTruth {
                energy: 1.0,
                core_x: true_core_x,
                core_y: 0.0,
                offset_x: 0.0,
                offset_y: 0.0,
            }),
            seed: Some(ShowerAxisSeed {
                offset_x: 0.0,
                offset_y: 0.0,
                core_x: 0.0,
                core_y: 0.0,
            }),
        }
    }

    fn fill_params() -> LookupParams {
        LookupParams::builder()
            .size_axis(1.5, 0.5, 4)
            .distance_axis(0.0, 50.0, 4)
            .min_showers_per_bin(2)
            .max_wobble_offset(2.0)
            .max_core_distance_error(Some(50.0))
            .build()
            .unwrap()
    }

    fn simulated_events() -> Vec<ArrayEvent> {
        let mut events: Vec<ArrayEvent> = (0..4)
            .map(|i| event(i, smallvec![image(), image(), image()], 0.0))
            .collect();
        let mut no_truth = event(10, smallvec![image(), image(), image()], 0.0);
        no_truth.truth = None;
        let mut far_wobble = event(11, smallvec![image(), image(), image()], 0.0);
        far_wobble.wobble_offset = 3.0;
        let single = event(
            12,
            smallvec![image(), ImageMeasurement::empty(), ImageMeasurement::empty()],
            0.0,
        );
        let bad_core = event(13, smallvec![image(), image(), image()], 300.0);
        events.extend([no_truth, far_wobble, single, bad_core]);
        events
    }

    #[test]
    fn fill_run_applies_gates_in_order() {
        let params = fill_params();
        let mut source = VecEventSource::new(array(), simulated_events());
        let out = fill_tables(&mut source, small_layout(), &params, None, || false).unwrap();

        let cuts = out.cuts;
        assert_eq!(cuts.events_read, 8);
        assert_eq!(cuts.no_simulation_truth, 1);
        assert_eq!(cuts.wobble_offset, 1);
        assert_eq!(cuts.multiplicity, 1);
        assert_eq!(cuts.core_error, 1);
        assert_eq!(cuts.rejected(), 4);
        assert_eq!(cuts.events_filled, 4);
        assert_eq!(cuts.images_filled, 12);
        assert_eq!(cuts.stop, StopReason::Completed);

        // telescope 0 sits 60 m from the axis
        let sel = out
            .grid
            .select_cell(20.0, 0.5, 0.0, TelescopeType(1), 100.0)
            .unwrap();
        let width = sel.tables[0][0].width.query(112f64.log10(), 60.0).unwrap();
        assert_relative_eq!(width.value, 0.1, epsilon = 1e-12);
        let energy = sel.tables[0][0].energy.query(112f64.log10(), 60.0).unwrap();
        assert_relative_eq!(energy.value, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn reweighting_requires_the_simulated_spectrum() {
        let params = LookupParams::builder()
            .spectral_reweight_index(Some(2.5))
            .build()
            .unwrap();
        let mut source = VecEventSource::new(array(), simulated_events());
        let err = fill_tables(&mut source, small_layout(), &params, None, || false).unwrap_err();
        assert!(matches!(err, ShowerScaleError::InvalidLookupParameter(_)));

        let spectrum = SimulatedSpectrum::new(2.0, 0.03, 200.0).unwrap();
        let mut source = VecEventSource::new(array(), simulated_events());
        assert!(fill_tables(&mut source, small_layout(), &params, Some(spectrum), || false).is_ok());
    }

    #[test]
    fn event_limit_truncates_the_fill_run() {
        let params = LookupParams::builder()
            .size_axis(1.5, 0.5, 4)
            .distance_axis(0.0, 50.0, 4)
            .max_events(Some(3))
            .build()
            .unwrap();
        let mut source = VecEventSource::new(array(), simulated_events());
        let out = fill_tables(&mut source, small_layout(), &params, None, || false).unwrap();
        assert_eq!(out.cuts.events_read, 3);
        assert_eq!(out.cuts.events_filled, 3);
        assert_eq!(out.cuts.stop, StopReason::EventLimit);
    }

    #[test]
    fn lookup_run_keeps_invalid_events() {
        let grid = uniform_grid();
        let params = LookupParams::default();
        let events = vec![
            event(1, smallvec![image(), image(), image()], 0.0),
            event(
                2,
                smallvec![image(), ImageMeasurement::empty(), ImageMeasurement::empty()],
                0.0,
            ),
            event(3, smallvec![image(), image(), image()], 0.0),
        ];
        let mut source = VecEventSource::new(array(), events);
        let out = run_lookup(&mut source, &grid, &params, || false).unwrap();

        assert_eq!(out.estimates.len(), 3);
        assert_eq!(out.stats.events_read, 3);
        assert_eq!(out.stats.estimated, 2);
        assert_eq!(out.stats.multiplicity, 1);
        assert_eq!(out.stats.clamped_lookups, 0);
        assert!(!out.estimates[1].is_valid());
        assert_eq!(out.estimates[0].mscw, out.estimates[2].mscw);
        assert_relative_eq!(out.estimates[0].energy.unwrap(), 10f64.powf(0.5), epsilon = 1e-9);
    }

    #[test]
    fn bad_numbers_are_cut_without_ending_the_fill_run() {
        let params = LookupParams::builder()
            .size_axis(1.5, 0.5, 4)
            .distance_axis(0.0, 50.0, 4)
            .spectral_reweight_index(Some(2.5))
            .build()
            .unwrap();
        let spectrum = SimulatedSpectrum::new(2.0, 0.03, 200.0).unwrap();
        let images = || smallvec![image(), image(), image()];

        let mut nan_zenith = event(1, images(), 0.0);
        nan_zenith.pointing.zenith = f64::NAN;
        let mut zero_energy = event(2, images(), 0.0);
        if let Some(truth) = zero_energy.truth.as_mut() {
            truth.energy = 0.0;
        }
        let mut nan_energy = event(3, images(), 0.0);
        if let Some(truth) = nan_energy.truth.as_mut() {
            truth.energy = f64::NAN;
        }
        let mut noisy = event(4, images(), 0.0);
        noisy.images[1].noise = f64::NAN;
        let events = vec![nan_zenith, zero_energy, nan_energy, noisy, event(5, images(), 0.0)];

        let mut source = VecEventSource::new(array(), events);
        let out = fill_tables(&mut source, small_layout(), &params, Some(spectrum), || false).unwrap();
        let cuts = out.cuts;
        assert_eq!(cuts.events_read, 5);
        assert_eq!(cuts.invalid_pointing, 1);
        assert_eq!(cuts.invalid_truth, 2);
        assert_eq!(cuts.events_filled, 2);
        // the image with a non-finite noise level is skipped
        assert_eq!(cuts.images_filled, 5);
    }

    #[test]
    fn lookup_run_continues_after_a_non_finite_pointing() {
        let grid = uniform_grid();
        let params = LookupParams::default();
        let mut bad = event(2, smallvec![image(), image(), image()], 0.0);
        bad.pointing.zenith = f64::NAN;
        let events = vec![
            event(1, smallvec![image(), image(), image()], 0.0),
            bad,
            event(3, smallvec![image(), image(), image()], 0.0),
        ];
        let mut source = VecEventSource::new(array(), events);
        let out = run_lookup(&mut source, &grid, &params, || false).unwrap();

        assert_eq!(out.estimates.len(), 3);
        assert_eq!(out.stats.estimated, 2);
        assert_eq!(out.stats.invalid_input, 1);
        assert_eq!(out.estimates[1].status, EventStatus::InvalidInput);
        assert!(out.estimates[2].is_valid());
    }

    #[test]
    fn lookup_rejects_events_of_another_array() {
        let grid = uniform_grid();
        let params = LookupParams::default();
        let mut source = VecEventSource::new(
            array(),
            vec![event(1, smallvec![image(), image()], 0.0)],
        );
        let err = run_lookup(&mut source, &grid, &params, || false).unwrap_err();
        assert!(matches!(err, ShowerScaleError::InvalidEvent(_)));
    }
}
