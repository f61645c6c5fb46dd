//! # Binned statistics accumulator
//!
//! One (size, distance) cell of a lookup table in write mode.
//!
//! ## Overview
//! -----------------
//! [`BinnedStatAccumulator`] keeps the raw weighted samples of the target quantity.
//! [`BinnedStatAccumulator::finalize`] sorts them and derives the weighted median, the
//! quantile spread ("sigma") and the weighted mean. The result does not depend on
//! the accumulation order: samples are ordered by `(value, weight)` before any
//! quantile is read.
//!
//! Weighted quantiles use the midpoint rule. With samples sorted ascending and total
//! weight `W`, sample `k` sits at cumulative fraction
//!
//! ```text
//! c_k = (w_0 + … + w_{k-1} + w_k / 2) / W
//! ```
//!
//! and the quantile `q` is linearly interpolated between the two samples bracketing
//! `q` (clamped to the first/last sample at the ends). A quantile therefore always
//! lies within the sample range.
use serde::{Deserialize, Serialize};

use crate::showerscale_errors::ShowerScaleError;
use crate::tables::ValueRange;

/// Finalized statistics of a valid bin.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BinStatistics {
    pub median: f64,
    /// Difference between the upper and lower sigma quantiles (16–84 % by default)
    pub sigma: f64,
    pub mean: f64,
}

/// A finalized bin: its entry count and, when `count > min_showers_per_bin`, its statistics.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct FinalizedBin {
    pub count: u64,
    pub stats: Option<BinStatistics>,
}

impl FinalizedBin {
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.stats.is_some()
    }
}

/// Outcome of a single [`BinnedStatAccumulator::accumulate`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleOutcome {
    Accepted,
    /// Zero weight: nothing to add
    ZeroWeight,
    /// Value outside the accepted target range
    OutOfRange,
}

/// Weighted sample collector of one bin.
#[derive(Debug, Clone)]
pub struct BinnedStatAccumulator {
    range: ValueRange,
    samples: Vec<(f64, f64)>,
}

impl BinnedStatAccumulator {
    pub fn new(range: ValueRange) -> Self {
        Self {
            range,
            samples: Vec::new(),
        }
    }

    /// Add a weighted sample.
    ///
    /// Arguments
    /// -----------------
    /// * `value`: target quantity; values outside the configured range (including the
    ///   minimum itself) are discarded.
    /// * `weight`: finite, non-negative weight (e.g. a spectral re-weighting factor).
    ///
    /// Return
    /// ----------
    /// * the [`SampleOutcome`], or `Err(InvalidSampleWeight)` for a negative or
    ///   non-finite weight.
    pub fn accumulate(&mut self, value: f64, weight: f64) -> Result<SampleOutcome, ShowerScaleError> {
        if !weight.is_finite() || weight < 0.0 {
            return Err(ShowerScaleError::InvalidSampleWeight(weight));
        }
        if weight == 0.0 {
            return Ok(SampleOutcome::ZeroWeight);
        }
        if !self.range.contains(value) {
            return Ok(SampleOutcome::OutOfRange);
        }
        self.samples.push((value, weight));
        Ok(SampleOutcome::Accepted)
    }

    /// Number of accepted samples.
    #[inline]
    pub fn count(&self) -> u64 {
        self.samples.len() as u64
    }

    /// Freeze the bin.
    ///
    /// Arguments
    /// -----------------
    /// * `min_showers_per_bin`: statistics are computed only if `count > min_showers_per_bin`.
    /// * `sigma_quantiles`: lower/upper quantiles; `sigma = Q(high) − Q(low)`.
    ///
    /// Return
    /// ----------
    /// * A [`FinalizedBin`] whose `stats` is `None` for an under-populated bin.
    pub fn finalize(mut self, min_showers_per_bin: u64, sigma_quantiles: (f64, f64)) -> FinalizedBin {
        let count = self.count();
        if count <= min_showers_per_bin {
            return FinalizedBin { count, stats: None };
        }

        self.samples
            .sort_unstable_by(|a, b| a.0.total_cmp(&b.0).then(a.1.total_cmp(&b.1)));

        let total_weight: f64 = self.samples.iter().map(|(_, w)| w).sum();
        let mean = self.samples.iter().map(|(v, w)| v * w).sum::<f64>() / total_weight;

        let median = weighted_quantile(&self.samples, total_weight, 0.5);
        let low = weighted_quantile(&self.samples, total_weight, sigma_quantiles.0);
        let high = weighted_quantile(&self.samples, total_weight, sigma_quantiles.1);

        FinalizedBin {
            count,
            stats: Some(BinStatistics {
                median,
                sigma: high - low,
                mean,
            }),
        }
    }
}

/// Weighted quantile of samples sorted by value (midpoint rule).
fn weighted_quantile(sorted: &[(f64, f64)], total_weight: f64, q: f64) -> f64 {
    let n = sorted.len();
    if n == 1 {
        return sorted[0].0;
    }

    let mut cumulative = 0.0;
    let mut previous: Option<(f64, f64)> = None;
    for &(value, weight) in sorted {
        let position = (cumulative + 0.5 * weight) / total_weight;
        cumulative += weight;

        if q <= position {
            return match previous {
                None => value,
                Some((prev_value, prev_position)) => {
                    let span = position - prev_position;
                    if span <= 0.0 {
                        value
                    } else {
                        prev_value + (value - prev_value) * (q - prev_position) / span
                    }
                }
            };
        }
        previous = Some((value, position));
    }

    sorted[n - 1].0
}
