//! # Geometric stereo reconstruction
//!
//! Shower direction and core position from the image axes of several telescopes.
//!
//! ## Overview
//! -----------------
//! Every usable image defines a line: its major axis in the camera (direction
//! reconstruction) or, once the direction is known, the trace of the plane
//! containing the telescope and the image axis in the plane perpendicular to the
//! shower (core reconstruction). Each pair of lines is intersected; the result is the
//! weighted mean of all pairwise intersections.
//!
//! Pair weight (before squaring):
//!
//! ```text
//! w_ij = 1/(1/size_i + 1/size_j) · (1 − width_i/length_i) · (1 − width_j/length_j) · |sin Δφ_ij|
//! ```
//!
//! so that bright, elongated images crossing at large angles dominate. Pairs whose
//! lines are closer to parallel than `min_axis_angle` are skipped.
//!
//! Quality:
//! * `dispersion` – weighted RMS of the pairwise intersections about the mean,
//! * `chi2` – weighted sum of squared residuals with weights normalised to a mean of 1.
//!
//! ## Failure
//! -----------------
//! Too few usable images, or no pair passing the angle cut, yield an explicit
//! [`ReconstructionFailure`]; no coordinates are produced in that case.
//!
//! ## See also
//! ------------
//! * [`frames`] – camera and shower-plane frames.
//! * [`direction`] – camera-plane direction fit.
//! * [`core`] – shower-plane core fit and core distances.
use itertools::Itertools;
use nalgebra::{Vector2, Vector3};
use thiserror::Error;

use crate::constants::{Degree, Meter, RADEG};
use crate::images::{ArrayConfiguration, ArrayEvent, TelescopeVec};
use crate::lookup_params::LookupParams;

pub mod core;
pub mod direction;
pub mod frames;

use self::core::{core_distance, CoreFit};
use self::direction::DirectionFit;
use self::frames::PointingFrame;

/// Reason why an event could not be reconstructed.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconstructionFailure {
    #[error("too few usable images: {found} (required {required})")]
    TooFewImages { found: usize, required: usize },

    #[error("no pair of image axes passes the minimum angle cut ({images} images)")]
    NoUsablePairs { images: usize },

    #[error("reconstructed direction does not reach the ground")]
    BelowHorizon,
}

/// One image line in a 2D plane, with what the pair weight needs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct ImageLine {
    pub point: Vector2<f64>,
    /// Unit direction
    pub direction: Vector2<f64>,
    pub size: f64,
    pub ellipticity: f64,
}

/// Weighted mean of pairwise line intersections.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct IntersectionFit {
    pub mean: Vector2<f64>,
    pub dispersion: f64,
    pub chi2: f64,
    pub n_pairs: usize,
}

#[inline]
fn cross2(a: &Vector2<f64>, b: &Vector2<f64>) -> f64 {
    a.x * b.y - a.y * b.x
}

/// `1 − width/length`, or 0 for a degenerate image.
#[inline]
pub(crate) fn ellipticity(width: f64, length: f64) -> f64 {
    if length > 0.0 && width.is_finite() {
        (1.0 - width / length).max(0.0)
    } else {
        0.0
    }
}

/// Intersect every pair of lines and combine the intersections.
///
/// Return
/// ----------
/// * `None` if no pair has a positive weight and an angle of at least `min_axis_angle`.
pub(crate) fn intersect_lines(lines: &[ImageLine], min_axis_angle: Degree) -> Option<IntersectionFit> {
    let min_sin = (min_axis_angle * RADEG).sin();

    let candidates: Vec<(Vector2<f64>, f64)> = lines
        .iter()
        .tuple_combinations()
        .filter_map(|(a, b)| {
            let sin_angle = cross2(&a.direction, &b.direction);
            if sin_angle.abs() < min_sin || sin_angle == 0.0 {
                return None;
            }
            let w = 1.0 / (1.0 / a.size + 1.0 / b.size)
                * a.ellipticity
                * b.ellipticity
                * sin_angle.abs();
            let weight = w * w;
            if !(weight.is_finite() && weight > 0.0) {
                return None;
            }
            let s = cross2(&(b.point - a.point), &b.direction) / sin_angle;
            Some((a.point + a.direction * s, weight))
        })
        .collect();

    if candidates.is_empty() {
        return None;
    }

    let total: f64 = candidates.iter().map(|(_, w)| w).sum();
    let mean = candidates
        .iter()
        .fold(Vector2::zeros(), |acc, (p, w)| acc + p * *w)
        / total;
    let weighted_sq: f64 = candidates
        .iter()
        .map(|(p, w)| w * (p - mean).norm_squared())
        .sum();
    let n_pairs = candidates.len();

    Some(IntersectionFit {
        mean,
        dispersion: (weighted_sq / total).sqrt(),
        chi2: weighted_sq / total * n_pairs as f64,
        n_pairs,
    })
}

/// Reconstructed shower axis of one event.
#[derive(Debug, Clone, PartialEq)]
pub struct ShowerGeometry {
    /// Source position in camera coordinates (deg)
    pub offset_x: Degree,
    pub offset_y: Degree,
    /// Unit vector pointing from the ground towards the shower origin
    pub direction: Vector3<f64>,
    pub direction_dispersion: Degree,
    pub direction_chi2: f64,
    pub core_x: Meter,
    pub core_y: Meter,
    pub core_dispersion: Meter,
    /// Number of images used
    pub n_images: usize,
    /// Perpendicular distance of each telescope to the shower axis (`None` for unusable images)
    pub core_distances: TelescopeVec<Option<Meter>>,
}

/// Geometric stereo reconstructor (direction, then core).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StereoReconstructor {
    pub min_multiplicity: usize,
    pub min_axis_angle: Degree,
    pub min_image_size: f64,
}

impl StereoReconstructor {
    pub fn new(params: &LookupParams) -> Self {
        Self {
            min_multiplicity: params.min_telescope_multiplicity,
            min_axis_angle: params.min_axis_angle,
            min_image_size: params.min_image_size,
        }
    }

    /// Direction and core of an event, then the core distance of every usable image.
    ///
    /// When the event carries a [`crate::images::ShowerAxisSeed`], the axis is taken from
    /// it and only the core distances are computed.
    ///
    /// Arguments
    /// -----------------
    /// * `array`: telescope positions and types.
    /// * `event`: pointing and images (one per telescope).
    ///
    /// Return
    /// ----------
    /// * the [`ShowerGeometry`], or the [`ReconstructionFailure`] that makes the event
    ///   unusable for table lookup.
    pub fn reconstruct(
        &self,
        array: &ArrayConfiguration,
        event: &ArrayEvent,
    ) -> Result<ShowerGeometry, ReconstructionFailure> {
        let usable = event.usable_images(self.min_image_size);
        if usable.len() < self.min_multiplicity {
            return Err(ReconstructionFailure::TooFewImages {
                found: usable.len(),
                required: self.min_multiplicity,
            });
        }

        let (fit, core) = match event.seed {
            Some(seed) => {
                let fit = DirectionFit::from_offset(seed.offset_x, seed.offset_y, usable.len());
                let core = CoreFit {
                    core_x: seed.core_x,
                    core_y: seed.core_y,
                    dispersion: 0.0,
                    n_pairs: 0,
                };
                (fit, core)
            }
            None => {
                let fit = self.reconstruct_direction(event)?;
                let core = self.reconstruct_core(array, event, &fit)?;
                (fit, core)
            }
        };

        let camera = PointingFrame::new(event.pointing.azimuth, event.pointing.zenith);
        let direction = camera.direction_from_camera(fit.offset_x, fit.offset_y);
        let core_point = Vector3::new(core.core_x, core.core_y, 0.0);
        let mut core_distances: TelescopeVec<Option<Meter>> =
            TelescopeVec::from_elem(None, event.images.len());
        for &i in &usable {
            core_distances[i] = Some(core_distance(
                &array.telescopes[i].position,
                &core_point,
                &direction,
            ));
        }

        Ok(ShowerGeometry {
            offset_x: fit.offset_x,
            offset_y: fit.offset_y,
            direction,
            direction_dispersion: fit.dispersion,
            direction_chi2: fit.chi2,
            core_x: core.core_x,
            core_y: core.core_y,
            core_dispersion: core.dispersion,
            n_images: usable.len(),
            core_distances,
        })
    }
}
