#![allow(dead_code)]

use nalgebra::Vector3;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};
use showerscale::constants::AZIMUTH_SECTORS;
use showerscale::grid::GridLayout;
use showerscale::images::{
    ArrayConfiguration, ArrayEvent, ImageMeasurement, Pointing, SimulationTruth, Telescope,
    TelescopeType, TelescopeVec,
};
use showerscale::lookup_params::LookupParams;
use showerscale::reconstruction::core::core_distance;
use showerscale::reconstruction::frames::PointingFrame;

/// Camera noise level of every simulated image.
pub const NOISE: f64 = 100.0;
/// Height of the emission point of the images (m).
const EMISSION_HEIGHT: f64 = 10_000.0;
/// Images below this size do not trigger.
const TRIGGER_SIZE: f64 = 50.0;

/// Four telescopes on an 160 m square, two of each type.
pub fn square_array() -> ArrayConfiguration {
    ArrayConfiguration::new(vec![
        Telescope::new(TelescopeType(1), -80.0, -80.0, 0.0),
        Telescope::new(TelescopeType(1), 80.0, 80.0, 0.0),
        Telescope::new(TelescopeType(2), 80.0, -80.0, 0.0),
        Telescope::new(TelescopeType(2), -80.0, 80.0, 0.0),
    ])
}

/// Layout matching [`square_array`]: one wobble offset and one noise level per zenith.
pub fn layout(zenith: &[f64], wobble: f64) -> GridLayout {
    GridLayout::new(
        zenith.to_vec(),
        vec![vec![wobble]; zenith.len()],
        vec![vec![std::array::from_fn::<_, AZIMUTH_SECTORS, _>(|_| vec![NOISE])]; zenith.len()],
        vec![TelescopeType(1), TelescopeType(2)],
    )
    .unwrap()
}

/// Coarse binning suited to a few thousand simulated events.
pub fn params() -> LookupParams {
    LookupParams::builder()
        .size_axis(1.5, 0.25, 12)
        .distance_axis(0.0, 40.0, 10)
        .min_showers_per_bin(5)
        .max_core_distance_error(Some(20.0))
        .max_wobble_offset(2.0)
        .build()
        .unwrap()
}

/// Mean gamma-ray image width (deg).
pub fn expected_width(log10_size: f64, distance: f64) -> f64 {
    0.05 + 0.01 * (log10_size - 2.0) + 0.0002 * distance
}

pub fn expected_length(log10_size: f64, distance: f64) -> f64 {
    2.5 * expected_width(log10_size, distance) + 0.05
}

/// Mean image size of a shower of `energy` TeV seen at `distance` m from the axis.
pub fn light_yield(energy: f64, distance: f64) -> f64 {
    800.0 * energy * (-distance / 250.0).exp()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Primary {
    Gamma,
    /// Wider and longer images than gamma rays
    Hadron,
}

/// Deterministic toy simulation of an IACT array.
pub struct ShowerSimulator {
    pub array: ArrayConfiguration,
    pub pointing: Pointing,
    pub wobble: f64,
    rng: StdRng,
    fluctuation: Normal<f64>,
}

impl ShowerSimulator {
    pub fn new(seed: u64, zenith: f64, azimuth: f64, wobble: f64) -> Self {
        Self {
            array: square_array(),
            pointing: Pointing { azimuth, zenith },
            wobble,
            rng: StdRng::seed_from_u64(seed),
            fluctuation: Normal::new(1.0, 0.1).unwrap(),
        }
    }

    /// Energy drawn uniformly in log10 between 0.3 and 30 TeV.
    pub fn random_energy(&mut self) -> f64 {
        10f64.powf(self.rng.random_range(-0.5..1.5))
    }

    /// Core drawn uniformly in a 150 m disk around the array center.
    pub fn random_core(&mut self) -> (f64, f64) {
        let r = 150.0 * self.rng.random::<f64>().sqrt();
        let theta = self.rng.random_range(0.0..std::f64::consts::TAU);
        (r * theta.cos(), r * theta.sin())
    }

    /// One event with the source at the wobble position.
    pub fn event(&mut self, event_id: u64, energy: f64, core: (f64, f64), primary: Primary) -> ArrayEvent {
        let frame = PointingFrame::new(self.pointing.azimuth, self.pointing.zenith);
        let (source_x, source_y) = (self.wobble, 0.0);
        let direction = frame.direction_from_camera(source_x, source_y);
        let core_point = Vector3::new(core.0, core.1, 0.0);
        let emission = core_point + direction * (EMISSION_HEIGHT / direction.z);
        let shape_factor = match primary {
            Primary::Gamma => 1.0,
            Primary::Hadron => 1.6,
        };

        let mut images: TelescopeVec<ImageMeasurement> = TelescopeVec::new();
        for telescope in &self.array.telescopes {
            let distance = core_distance(&telescope.position, &core_point, &direction);
            let size = light_yield(energy, distance) * self.fluctuation.sample(&mut self.rng).max(0.2);
            let (centroid_x, centroid_y) = frame
                .camera_from_direction(&(emission - telescope.position).normalize())
                .unwrap();
            let (dx, dy) = (centroid_x - source_x, centroid_y - source_y);
            let r = dx.hypot(dy);
            if size < TRIGGER_SIZE || r < 1e-6 {
                images.push(ImageMeasurement {
                    noise: NOISE,
                    ..ImageMeasurement::empty()
                });
                continue;
            }

            let log10_size = size.log10();
            let width = expected_width(log10_size, distance)
                * shape_factor
                * self.fluctuation.sample(&mut self.rng);
            let length = expected_length(log10_size, distance)
                * shape_factor
                * self.fluctuation.sample(&mut self.rng);
            images.push(ImageMeasurement {
                size,
                centroid_x,
                centroid_y,
                cos_phi: dx / r,
                sin_phi: dy / r,
                width,
                length,
                noise: NOISE,
                valid: true,
            });
        }

        ArrayEvent {
            event_id,
            pointing: self.pointing,
            wobble_offset: self.wobble,
            images,
            truth: Some(SimulationTruth {
                energy,
                core_x: core.0,
                core_y: core.1,
                offset_x: source_x,
                offset_y: source_y,
            }),
            seed: None,
        }
    }

    /// `n` events with random energy and core, numbered from `first_id`.
    pub fn events(&mut self, first_id: u64, n: usize, primary: Primary) -> Vec<ArrayEvent> {
        (0..n as u64)
            .map(|i| {
                let energy = self.random_energy();
                let core = self.random_core();
                self.event(first_id + i, energy, core, primary)
            })
            .collect()
    }
}

/// Median of a non-empty sample.
pub fn median(values: &mut [f64]) -> f64 {
    values.sort_by(f64::total_cmp);
    let n = values.len();
    if n % 2 == 1 {
        values[n / 2]
    } else {
        0.5 * (values[n / 2 - 1] + values[n / 2])
    }
}
