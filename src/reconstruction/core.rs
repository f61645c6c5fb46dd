//! Shower core from the image planes, given the shower direction.
//!
//! The image axis of a telescope and the telescope itself span a plane that contains
//! the shower axis. Projected along the shower direction onto the shower plane,
//! each such plane becomes a line through the projected telescope position; the
//! shower axis projects onto the common intersection point. That point is moved
//! along the shower direction to the ground (`z = 0`).
use nalgebra::Vector3;

use crate::constants::Meter;
use crate::images::{ArrayConfiguration, ArrayEvent};
use crate::reconstruction::direction::DirectionFit;
use crate::reconstruction::frames::{PointingFrame, ShowerFrame};
use crate::reconstruction::{
    ellipticity, intersect_lines, ImageLine, ReconstructionFailure, StereoReconstructor,
};

/// Ground core estimate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoreFit {
    pub core_x: Meter,
    pub core_y: Meter,
    /// Weighted RMS of the pairwise intersections in the shower plane (m)
    pub dispersion: Meter,
    pub n_pairs: usize,
}

/// Perpendicular distance from `telescope` to the axis through `core` along `direction` (unit).
#[inline]
pub fn core_distance(telescope: &Vector3<f64>, core: &Vector3<f64>, direction: &Vector3<f64>) -> Meter {
    let rel = telescope - core;
    (rel - direction * rel.dot(direction)).norm()
}

impl StereoReconstructor {
    /// Core position on the ground for an already reconstructed direction.
    ///
    /// Arguments
    /// -----------------
    /// * `array`: telescope ground positions.
    /// * `event`: pointing and images.
    /// * `direction`: camera-plane direction (e.g. from
    ///   [`reconstruct_direction`](StereoReconstructor::reconstruct_direction)).
    ///
    /// Return
    /// ----------
    /// * the [`CoreFit`], or a [`ReconstructionFailure`] when too few images or
    ///   usable pairs remain, or when the direction does not reach the ground.
    pub fn reconstruct_core(
        &self,
        array: &ArrayConfiguration,
        event: &ArrayEvent,
        direction: &DirectionFit,
    ) -> Result<CoreFit, ReconstructionFailure> {
        let usable = event.usable_images(self.min_image_size);
        if usable.len() < self.min_multiplicity {
            return Err(ReconstructionFailure::TooFewImages {
                found: usable.len(),
                required: self.min_multiplicity,
            });
        }

        let camera = PointingFrame::new(event.pointing.azimuth, event.pointing.zenith);
        let shower_direction = camera.direction_from_camera(direction.offset_x, direction.offset_y);
        if shower_direction.z <= f64::EPSILON {
            return Err(ReconstructionFailure::BelowHorizon);
        }
        let shower = ShowerFrame::new(shower_direction, &camera);

        let lines: Vec<ImageLine> = usable
            .iter()
            .filter_map(|&i| {
                let image = &event.images[i];
                let centroid = camera.tangent_point(image.centroid_x, image.centroid_y);
                let axis = camera.camera_axis(image.cos_phi, image.sin_phi);
                let normal = centroid.cross(&axis);
                let trace = shower.project(&normal.cross(&shower_direction));
                let norm = trace.norm();
                if !(norm.is_finite() && norm > f64::EPSILON) {
                    return None;
                }
                Some(ImageLine {
                    point: shower.project(&array.telescopes[i].position),
                    direction: trace / norm,
                    size: image.size,
                    ellipticity: ellipticity(image.width, image.length),
                })
            })
            .collect();

        let fit = intersect_lines(&lines, self.min_axis_angle).ok_or(
            ReconstructionFailure::NoUsablePairs {
                images: usable.len(),
            },
        )?;

        let on_plane = shower.lift(&fit.mean);
        let core = on_plane - shower_direction * (on_plane.z / shower_direction.z);

        Ok(CoreFit {
            core_x: core.x,
            core_y: core.y,
            dispersion: fit.dispersion,
            n_pairs: fit.n_pairs,
        })
    }
}
