//! # Fusion of per-telescope estimates
//!
//! ## Mean scaled width / length
//! -----------------
//! Each contributing telescope provides a measured value `m`, the table expectation
//! `e` and spread `σ`. Its scaled deviation is `(m − e) / σ`; the shower-level value
//! is the weighted mean of the deviations with weights
//!
//! * `(e/σ)²` ([`MeanScaledWeighting::RelativePrecision`], default), or
//! * `1` ([`MeanScaledWeighting::Equal`]).
//!
//! A telescope contributes only if `e > 0`, `σ > 0` and `m` is a positive finite value.
//! The mean ratio `m / e` over the same telescopes is reported alongside (MWR / MLR).
//!
//! ## Energy
//! -----------------
//! Per-telescope estimates are `log10(E/TeV)` with their table spread. With at least
//! `min_count` estimates, any estimate farther than `factor × MAD` from the median is
//! rejected, where MAD is the mean absolute deviation about the median; the cut is
//! repeated on the remaining estimates until nothing more is rejected, so that
//! cleaning an already cleaned set is a no-op. The survivors are combined with
//! inverse-variance weights `1/σ²`.
use crate::constants::{Log10TeV, TeV};
use crate::lookup_params::MeanScaledWeighting;

/// One telescope's input to the mean-scaled fusion.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScaledTerm {
    pub measured: f64,
    pub expected: f64,
    pub sigma: f64,
}

impl ScaledTerm {
    #[inline]
    pub fn contributes(&self) -> bool {
        self.expected > 0.0
            && self.sigma > 0.0
            && self.expected.is_finite()
            && self.sigma.is_finite()
            && self.measured.is_finite()
            && self.measured > 0.0
    }

    /// `(measured − expected) / sigma`, for a contributing term.
    #[inline]
    pub fn deviation(&self) -> Option<f64> {
        self.contributes()
            .then(|| (self.measured - self.expected) / self.sigma)
    }

    fn weight(&self, weighting: MeanScaledWeighting) -> f64 {
        match weighting {
            MeanScaledWeighting::RelativePrecision => {
                let r = self.expected / self.sigma;
                r * r
            }
            MeanScaledWeighting::Equal => 1.0,
        }
    }
}

/// Shower-level mean scaled value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScaledFusion {
    /// Weighted mean of the scaled deviations (mscw or mscl)
    pub mean_scaled: f64,
    /// Mean of `measured / expected` (MWR or MLR)
    pub mean_ratio: f64,
    pub n_telescopes: usize,
}

/// Combine per-telescope scaled deviations.
///
/// Return
/// ----------
/// * `None` if no term contributes.
pub fn fuse_mean_scaled(terms: &[ScaledTerm], weighting: MeanScaledWeighting) -> Option<ScaledFusion> {
    let mut sum_w = 0.0;
    let mut sum_wd = 0.0;
    let mut sum_ratio = 0.0;
    let mut n = 0usize;
    for term in terms.iter().filter(|t| t.contributes()) {
        let w = term.weight(weighting);
        sum_w += w;
        sum_wd += w * (term.measured - term.expected) / term.sigma;
        sum_ratio += term.measured / term.expected;
        n += 1;
    }
    if n == 0 || sum_w <= 0.0 {
        return None;
    }
    Some(ScaledFusion {
        mean_scaled: sum_wd / sum_w,
        mean_ratio: sum_ratio / n as f64,
        n_telescopes: n,
    })
}

/// One telescope's energy estimate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnergyTerm {
    pub log10_energy: Log10TeV,
    pub sigma: f64,
}

impl EnergyTerm {
    #[inline]
    pub fn contributes(&self) -> bool {
        self.log10_energy.is_finite() && self.sigma.is_finite() && self.sigma > 0.0
    }
}

/// Median of a non-empty slice (mean of the two central values for even lengths).
pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let n = sorted.len();
    Some(if n % 2 == 1 {
        sorted[n / 2]
    } else {
        0.5 * (sorted[n / 2 - 1] + sorted[n / 2])
    })
}

/// Mean absolute deviation of `values` about `center`.
pub fn mean_absolute_deviation(values: &[f64], center: f64) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().map(|v| (v - center).abs()).sum::<f64>() / values.len() as f64)
}

/// Flag the values kept by the median/MAD outlier cut.
///
/// The cut is repeated on the surviving values until it rejects nothing.
/// A single pass can keep a value that the cut on the cleaned set rejects,
/// so the mask would not be stable under a second application.
///
/// Arguments
/// -----------------
/// * `values`: the estimates.
/// * `factor`: rejection distance in units of MAD.
/// * `min_count`: the cut is applied only while at least this many values remain.
///
/// Return
/// ----------
/// * one flag per value, `true` for kept values.
pub fn outlier_mask(values: &[f64], factor: f64, min_count: usize) -> Vec<bool> {
    let mut kept = vec![true; values.len()];
    loop {
        let current: Vec<f64> = values
            .iter()
            .zip(&kept)
            .filter_map(|(v, k)| k.then_some(*v))
            .collect();
        if current.len() < min_count.max(1) {
            break;
        }
        let Some(med) = median(&current) else {
            break;
        };
        let Some(mad) = mean_absolute_deviation(&current, med) else {
            break;
        };
        let limit = factor * mad;
        let mut rejected = 0;
        for (v, k) in values.iter().zip(kept.iter_mut()) {
            if *k && (v - med).abs() > limit {
                *k = false;
                rejected += 1;
            }
        }
        if rejected == 0 {
            break;
        }
    }
    kept
}

/// Shower-level energy.
#[derive(Debug, Clone, PartialEq)]
pub struct EnergyFusion {
    pub log10_energy: Log10TeV,
    pub energy: TeV,
    /// `sqrt(1/Σw)`, in log10(E) units
    pub resolution: f64,
    /// `Σ w (x − mean)² / (n − 1)`; `None` for a single estimate
    pub chi2: Option<f64>,
    pub n_used: usize,
    /// Per input term: used in the final average
    pub used: Vec<bool>,
}

/// Reject outliers, then combine the energy estimates by inverse-variance weighting.
///
/// Return
/// ----------
/// * `None` if no term contributes.
pub fn fuse_energy(terms: &[EnergyTerm], factor: f64, min_count: usize) -> Option<EnergyFusion> {
    let candidates: Vec<usize> = (0..terms.len()).filter(|&i| terms[i].contributes()).collect();
    if candidates.is_empty() {
        return None;
    }
    let values: Vec<f64> = candidates.iter().map(|&i| terms[i].log10_energy).collect();
    let kept = outlier_mask(&values, factor, min_count);

    let mut used = vec![false; terms.len()];
    let mut sum_w = 0.0;
    let mut sum_wx = 0.0;
    for (&i, _) in candidates.iter().zip(&kept).filter(|(_, k)| **k) {
        let w = 1.0 / (terms[i].sigma * terms[i].sigma);
        sum_w += w;
        sum_wx += w * terms[i].log10_energy;
        used[i] = true;
    }
    if !(sum_w > 0.0 && sum_w.is_finite()) {
        return None;
    }
    let mean = sum_wx / sum_w;
    let n_used = used.iter().filter(|u| **u).count();
    let chi2 = (n_used > 1).then(|| {
        let sq: f64 = used
            .iter()
            .enumerate()
            .filter(|(_, u)| **u)
            .map(|(i, _)| {
                let d = terms[i].log10_energy - mean;
                d * d / (terms[i].sigma * terms[i].sigma)
            })
            .sum();
        sq / (n_used - 1) as f64
    });

    Some(EnergyFusion {
        log10_energy: mean,
        energy: 10f64.powf(mean),
        resolution: (1.0 / sum_w).sqrt(),
        chi2,
        n_used,
        used,
    })
}

#[cfg(test)]
mod fusion_tests {
    use super::*;
    use approx::assert_relative_eq;

    fn scaled(measured: f64, expected: f64, sigma: f64) -> ScaledTerm {
        ScaledTerm {
            measured,
            expected,
            sigma,
        }
    }

    fn energy(e_tev: f64, sigma: f64) -> EnergyTerm {
        EnergyTerm {
            log10_energy: e_tev.log10(),
            sigma,
        }
    }

    #[test]
    fn opposite_deviations_cancel_with_equal_weights() {
        let terms = [scaled(1.0, 0.9, 0.1), scaled(1.0, 1.1, 0.1)];
        let fused = fuse_mean_scaled(&terms, MeanScaledWeighting::Equal).unwrap();
        assert_relative_eq!(fused.mean_scaled, 0.0, epsilon = 1e-9);
        assert_eq!(fused.n_telescopes, 2);
        assert_relative_eq!(fused.mean_ratio, 0.5 * (1.0 / 0.9 + 1.0 / 1.1), epsilon = 1e-12);
    }

    #[test]
    fn relative_precision_favours_larger_expectation() {
        let terms = [scaled(1.0, 0.9, 0.1), scaled(1.0, 1.1, 0.1)];
        let fused = fuse_mean_scaled(&terms, MeanScaledWeighting::RelativePrecision).unwrap();
        // weights 81 and 121 on deviations +1 and -1
        assert_relative_eq!(fused.mean_scaled, -40.0 / 202.0, epsilon = 1e-9);
    }

    #[test]
    fn non_contributing_terms_are_ignored() {
        let terms = [
            scaled(1.0, 0.0, 0.1),
            scaled(1.0, 1.0, 0.0),
            scaled(f64::NAN, 1.0, 0.1),
            scaled(0.0, 1.0, 0.1),
            scaled(1.2, 1.0, 0.1),
        ];
        let fused = fuse_mean_scaled(&terms, MeanScaledWeighting::Equal).unwrap();
        assert_eq!(fused.n_telescopes, 1);
        assert_relative_eq!(fused.mean_scaled, 2.0, epsilon = 1e-9);
        assert!(fuse_mean_scaled(&terms[..4], MeanScaledWeighting::Equal).is_none());
    }

    #[test]
    fn mean_scaled_is_order_independent() {
        let terms = vec![
            scaled(0.11, 0.10, 0.02),
            scaled(0.09, 0.12, 0.03),
            scaled(0.15, 0.14, 0.01),
            scaled(0.08, 0.07, 0.02),
        ];
        let forward = fuse_mean_scaled(&terms, MeanScaledWeighting::RelativePrecision).unwrap();
        let mut reversed = terms.clone();
        reversed.reverse();
        let backward = fuse_mean_scaled(&reversed, MeanScaledWeighting::RelativePrecision).unwrap();
        assert_relative_eq!(forward.mean_scaled, backward.mean_scaled, epsilon = 1e-12);
        assert_relative_eq!(forward.mean_ratio, backward.mean_ratio, epsilon = 1e-12);
    }

    #[test]
    fn high_energy_outlier_is_rejected() {
        let terms: Vec<EnergyTerm> = [1.0, 1.0, 1.0, 1.0, 1.0, 100.0]
            .iter()
            .map(|&e| energy(e, 0.1))
            .collect();
        let fused = fuse_energy(&terms, 5.0, 5).unwrap();
        assert_eq!(fused.n_used, 5);
        assert!(!fused.used[5]);
        assert_relative_eq!(fused.energy, 1.0, epsilon = 1e-12);
        assert_relative_eq!(fused.resolution, (0.01f64 / 5.0).sqrt(), epsilon = 1e-12);
        assert_relative_eq!(fused.chi2.unwrap(), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn rejection_needs_enough_telescopes() {
        let terms: Vec<EnergyTerm> = [1.0, 1.0, 1.0, 100.0]
            .iter()
            .map(|&e| energy(e, 0.1))
            .collect();
        let fused = fuse_energy(&terms, 5.0, 5).unwrap();
        assert_eq!(fused.n_used, 4);
        assert_relative_eq!(fused.log10_energy, 0.5, epsilon = 1e-12);
    }

    #[test]
    fn outlier_rejection_is_idempotent() {
        let values = [0.0, 0.02, -0.01, 0.01, 0.0, 1.0, 3.0, 0.03];
        let first = outlier_mask(&values, 5.0, 5);
        let cleaned: Vec<f64> = values
            .iter()
            .zip(&first)
            .filter_map(|(v, k)| k.then_some(*v))
            .collect();
        assert!(cleaned.len() < values.len());
        let second = outlier_mask(&cleaned, 5.0, 5);
        assert!(second.iter().all(|k| *k));
    }

    #[test]
    fn rejection_repeats_until_stable() {
        // first pass: median 0, MAD 11/7, only 10.0 is beyond 2 MAD
        // second pass: median 0, MAD 1/6, now 1.0 is beyond 2 MAD
        let values = [0.0, 0.0, 0.0, 0.0, 0.0, 1.0, 10.0];
        let kept = outlier_mask(&values, 2.0, 5);
        assert_eq!(kept, vec![true, true, true, true, true, false, false]);
    }

    #[test]
    fn inverse_variance_average() {
        let terms = [
            EnergyTerm {
                log10_energy: 0.0,
                sigma: 0.1,
            },
            EnergyTerm {
                log10_energy: 0.3,
                sigma: 0.2,
            },
        ];
        let fused = fuse_energy(&terms, 5.0, 5).unwrap();
        // weights 100 and 25
        assert_relative_eq!(fused.log10_energy, 0.3 * 25.0 / 125.0, epsilon = 1e-12);
        assert_relative_eq!(fused.resolution, (1.0f64 / 125.0).sqrt(), epsilon = 1e-12);
        let mean = 0.06;
        let chi2 = 100.0 * mean * mean + 25.0 * (0.3 - mean) * (0.3 - mean);
        assert_relative_eq!(fused.chi2.unwrap(), chi2, epsilon = 1e-9);
    }

    #[test]
    fn single_estimate_has_no_chi2() {
        let fused = fuse_energy(&[energy(3.0, 0.15)], 5.0, 5).unwrap();
        assert_eq!(fused.chi2, None);
        assert_relative_eq!(fused.energy, 3.0, epsilon = 1e-12);
        assert!(fuse_energy(&[], 5.0, 5).is_none());
    }

    #[test]
    fn median_and_mad() {
        assert_eq!(median(&[3.0, 1.0, 2.0]), Some(2.0));
        assert_eq!(median(&[4.0, 1.0, 2.0, 3.0]), Some(2.5));
        assert_eq!(median(&[]), None);
        assert_relative_eq!(
            mean_absolute_deviation(&[0.0, 0.0, 2.0], 0.0).unwrap(),
            2.0 / 3.0,
            epsilon = 1e-12
        );
    }
}
