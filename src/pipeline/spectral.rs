//! Spectral re-weighting of simulated showers.
//!
//! Simulations are produced with a power law `dN/dE ∝ E^-γ_mc` between `e_min` and
//! `e_max`. To fill the tables as if the showers followed `E^-γ_target`, each event
//! gets the weight
//!
//! ```text
//! w(E) = α · E^-γ_target / E^-γ_mc
//! ```
//!
//! with `α` chosen so that the largest weight over the simulated range is 1: the
//! normalisation is taken at `e_min` for a steeper target spectrum and at `e_max`
//! for a harder one.
use serde::{Deserialize, Serialize};

use crate::constants::TeV;
use crate::showerscale_errors::ShowerScaleError;

/// Power-law spectrum of a simulation corpus.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimulatedSpectrum {
    /// Spectral index `γ_mc` (positive for a falling spectrum)
    pub index: f64,
    pub e_min: TeV,
    pub e_max: TeV,
}

impl SimulatedSpectrum {
    pub fn new(index: f64, e_min: TeV, e_max: TeV) -> Result<Self, ShowerScaleError> {
        if !(index.is_finite() && e_min > 0.0 && e_max > e_min && e_max.is_finite()) {
            return Err(ShowerScaleError::InvalidLookupParameter(format!(
                "simulated spectrum: index {index}, energy range [{e_min}, {e_max}] TeV"
            )));
        }
        Ok(Self {
            index,
            e_min,
            e_max,
        })
    }

    /// Weight of a shower of energy `energy` for the target index `target_index`.
    ///
    /// `energy` must be finite and positive, otherwise the weight is NaN.
    /// [`crate::pipeline::fill_tables`] cuts such events before weighting.
    pub fn weight(&self, energy: TeV, target_index: f64) -> f64 {
        let norm_energy = if target_index > self.index {
            self.e_min
        } else {
            self.e_max
        };
        let alpha = norm_energy.powf(-self.index) / norm_energy.powf(-target_index);
        alpha * energy.powf(-target_index) / energy.powf(-self.index)
    }
}

#[cfg(test)]
mod spectral_tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn steeper_target_normalised_at_low_energy() {
        let mc = SimulatedSpectrum::new(2.0, 0.03, 200.0).unwrap();
        assert_relative_eq!(mc.weight(0.03, 2.5), 1.0, epsilon = 1e-12);
        // one decade above e_min the weight drops by 10^-0.5
        assert_relative_eq!(mc.weight(0.3, 2.5), 10f64.powf(-0.5), epsilon = 1e-12);
    }

    #[test]
    fn harder_target_normalised_at_high_energy() {
        let mc = SimulatedSpectrum::new(2.5, 0.03, 200.0).unwrap();
        assert_relative_eq!(mc.weight(200.0, 2.0), 1.0, epsilon = 1e-12);
        assert!(mc.weight(1.0, 2.0) < 1.0);
    }

    #[test]
    fn identical_index_gives_unit_weight() {
        let mc = SimulatedSpectrum::new(2.0, 0.03, 200.0).unwrap();
        assert_relative_eq!(mc.weight(5.0, 2.0), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn zero_energy_has_no_weight() {
        let mc = SimulatedSpectrum::new(2.0, 0.03, 200.0).unwrap();
        assert!(mc.weight(0.0, 2.5).is_nan());
        assert!(mc.weight(1.0, 2.5).is_finite());
    }

    #[test]
    fn invalid_range_is_rejected() {
        assert!(SimulatedSpectrum::new(2.0, 1.0, 0.5).is_err());
        assert!(SimulatedSpectrum::new(2.0, 0.0, 0.5).is_err());
    }
}
