//! Shower direction from intersecting image axes in the camera plane.
use nalgebra::Vector2;

use crate::constants::Degree;
use crate::images::ArrayEvent;
use crate::reconstruction::{
    ellipticity, intersect_lines, ImageLine, ReconstructionFailure, StereoReconstructor,
};

/// Camera-plane direction estimate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DirectionFit {
    pub offset_x: Degree,
    pub offset_y: Degree,
    /// Weighted RMS of the pairwise intersections (deg)
    pub dispersion: Degree,
    pub chi2: f64,
    pub n_images: usize,
    pub n_pairs: usize,
}

impl DirectionFit {
    /// A direction known in advance (no fit quality).
    pub fn from_offset(offset_x: Degree, offset_y: Degree, n_images: usize) -> Self {
        Self {
            offset_x,
            offset_y,
            dispersion: 0.0,
            chi2: 0.0,
            n_images,
            n_pairs: 0,
        }
    }
}

impl StereoReconstructor {
    /// Intersect the image major axes of every usable pair of images.
    ///
    /// Each axis passes through the image centroid with orientation `(cos φ, sin φ)`.
    /// Telescopes are assumed to point in parallel, so all images share the camera
    /// plane of the event pointing.
    ///
    /// Return
    /// ----------
    /// * `Err(TooFewImages)` below the minimum multiplicity,
    /// * `Err(NoUsablePairs)` when every pair is closer to parallel than
    ///   `min_axis_angle` (or has a vanishing weight).
    pub fn reconstruct_direction(&self, event: &ArrayEvent) -> Result<DirectionFit, ReconstructionFailure> {
        let usable = event.usable_images(self.min_image_size);
        if usable.len() < self.min_multiplicity {
            return Err(ReconstructionFailure::TooFewImages {
                found: usable.len(),
                required: self.min_multiplicity,
            });
        }

        let lines: Vec<ImageLine> = usable
            .iter()
            .map(|&i| {
                let image = &event.images[i];
                ImageLine {
                    point: Vector2::new(image.centroid_x, image.centroid_y),
                    direction: Vector2::new(image.cos_phi, image.sin_phi).normalize(),
                    size: image.size,
                    ellipticity: ellipticity(image.width, image.length),
                }
            })
            .collect();

        let fit = intersect_lines(&lines, self.min_axis_angle).ok_or(
            ReconstructionFailure::NoUsablePairs {
                images: usable.len(),
            },
        )?;

        Ok(DirectionFit {
            offset_x: fit.mean.x,
            offset_y: fit.mean.y,
            dispersion: fit.dispersion,
            chi2: fit.chi2,
            n_images: usable.len(),
            n_pairs: fit.n_pairs,
        })
    }
}
