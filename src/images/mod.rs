//! # Event and image data model
//!
//! Per-event inputs of the engine, as delivered by an event source:
//!
//! * [`ArrayConfiguration`] – telescope positions and types, fixed for a run,
//! * [`ArrayEvent`] – pointing, wobble offset and one [`ImageMeasurement`] per telescope,
//! * [`SimulationTruth`] – true energy, core and direction of simulated showers.
//!
//! Ground coordinates are meters with `x` towards East, `y` towards North and `z` up.
//! Camera coordinates are degrees on the tangent plane of the pointing direction
//! (see [`crate::reconstruction::frames`]). Azimuth is measured from North towards East.
use std::fmt;

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::constants::{Degree, Meter, TeV};
use crate::showerscale_errors::ShowerScaleError;

/// Telescope-type identifier, used only as a key into the table grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TelescopeType(pub u64);

impl fmt::Display for TelescopeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Telescope {
    pub telescope_type: TelescopeType,
    /// Ground position (m)
    pub position: Vector3<Meter>,
}

impl Telescope {
    pub fn new(telescope_type: TelescopeType, x: Meter, y: Meter, z: Meter) -> Self {
        Self {
            telescope_type,
            position: Vector3::new(x, y, z),
        }
    }
}

/// Telescopes of the array, indexed like the images of every event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArrayConfiguration {
    pub telescopes: Vec<Telescope>,
}

impl ArrayConfiguration {
    pub fn new(telescopes: Vec<Telescope>) -> Self {
        Self { telescopes }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.telescopes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.telescopes.is_empty()
    }

    /// Distinct telescope types, sorted.
    pub fn telescope_types(&self) -> Vec<TelescopeType> {
        let mut types: Vec<TelescopeType> =
            self.telescopes.iter().map(|t| t.telescope_type).collect();
        types.sort_unstable();
        types.dedup();
        types
    }
}

/// Hillas parametrization of one telescope image.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ImageMeasurement {
    /// Total light yield; positive for a valid image
    pub size: f64,
    /// Centroid in camera coordinates (deg)
    pub centroid_x: Degree,
    pub centroid_y: Degree,
    /// Orientation of the major axis
    pub cos_phi: f64,
    pub sin_phi: f64,
    pub width: Degree,
    pub length: Degree,
    /// Background light level of the camera for this event
    pub noise: f64,
    /// Trigger/cleaning validity
    pub valid: bool,
}

impl ImageMeasurement {
    /// True if the image can be used for reconstruction and table lookup.
    ///
    /// The noise level selects the table set, so it must be finite too.
    #[inline]
    pub fn is_usable(&self, min_size: f64) -> bool {
        self.valid
            && self.size.is_finite()
            && self.size > min_size
            && self.size > 0.0
            && self.noise.is_finite()
    }

    #[inline]
    pub fn log10_size(&self) -> f64 {
        self.size.log10()
    }

    /// Image without a signal (telescope not triggered).
    pub fn empty() -> Self {
        Self {
            size: 0.0,
            centroid_x: 0.0,
            centroid_y: 0.0,
            cos_phi: 1.0,
            sin_phi: 0.0,
            width: 0.0,
            length: 0.0,
            noise: 0.0,
            valid: false,
        }
    }
}

/// Telescope pointing (deg).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pointing {
    pub azimuth: Degree,
    pub zenith: Degree,
}

/// Known shower parameters of a simulated event.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimulationTruth {
    pub energy: TeV,
    pub core_x: Meter,
    pub core_y: Meter,
    /// True source position in camera coordinates (deg)
    pub offset_x: Degree,
    pub offset_y: Degree,
}

/// Shower axis already known for an event (e.g. from an earlier reconstruction).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ShowerAxisSeed {
    pub offset_x: Degree,
    pub offset_y: Degree,
    pub core_x: Meter,
    pub core_y: Meter,
}

/// Per-telescope container sized for typical arrays without heap allocation.
pub type TelescopeVec<T> = SmallVec<[T; 8]>;

#[derive(Debug, Clone, PartialEq)]
pub struct ArrayEvent {
    pub event_id: u64,
    pub pointing: Pointing,
    pub wobble_offset: Degree,
    /// One image per telescope of the array configuration
    pub images: TelescopeVec<ImageMeasurement>,
    pub truth: Option<SimulationTruth>,
    pub seed: Option<ShowerAxisSeed>,
}

impl ArrayEvent {
    /// Check the event against the array configuration.
    ///
    /// Only a mismatch with the array is an error. Bad numeric content is a
    /// per-event condition, see [`ArrayEvent::has_finite_pointing`].
    pub fn validate(&self, array: &ArrayConfiguration) -> Result<(), ShowerScaleError> {
        if self.images.len() != array.len() {
            return Err(ShowerScaleError::InvalidEvent(format!(
                "event {} carries {} images for {} telescopes",
                self.event_id,
                self.images.len(),
                array.len()
            )));
        }
        Ok(())
    }

    /// Zenith, azimuth and wobble offset are all finite.
    #[inline]
    pub fn has_finite_pointing(&self) -> bool {
        self.pointing.zenith.is_finite()
            && self.pointing.azimuth.is_finite()
            && self.wobble_offset.is_finite()
    }

    /// Indices of the images usable for reconstruction.
    pub fn usable_images(&self, min_size: f64) -> TelescopeVec<usize> {
        self.images
            .iter()
            .enumerate()
            .filter(|(_, image)| image.is_usable(min_size))
            .map(|(i, _)| i)
            .collect()
    }
}
