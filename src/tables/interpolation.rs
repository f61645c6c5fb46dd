//! Two-point interpolation with invalid endpoints.
//!
//! Every interpolation step of the engine (between bin centers, across wobble
//! offsets, across zenith angles) goes through [`interpolate_pair`]:
//!
//! * `t <= 0` reads the first endpoint and `t >= 1` the second, unchanged,
//! * otherwise both endpoints invalid → invalid,
//! * one endpoint invalid → the other one, unweighted (no extrapolation),
//! * both valid → `a·(1 − t) + b·t`.
//!
//! Weights are produced by [`linear_weight`] (table axes, wobble offset) or
//! [`cosine_weight`] (zenith angle, linear in `cos(zenith)`).
use crate::constants::{Degree, RADEG};

/// Values that can be blended between two endpoints.
pub trait Interpolate: Sized {
    fn blend(&self, other: &Self, t: f64) -> Self;
}

impl Interpolate for f64 {
    #[inline]
    fn blend(&self, other: &Self, t: f64) -> Self {
        self * (1.0 - t) + other * t
    }
}

/// Interpolate between two optional endpoints at fractional position `t`.
pub fn interpolate_pair<T: Interpolate + Clone>(a: Option<&T>, b: Option<&T>, t: f64) -> Option<T> {
    if t <= 0.0 {
        return a.cloned();
    }
    if t >= 1.0 {
        return b.cloned();
    }
    match (a, b) {
        (None, None) => None,
        (Some(a), None) => Some(a.clone()),
        (None, Some(b)) => Some(b.clone()),
        (Some(a), Some(b)) => Some(a.blend(b, t)),
    }
}

/// Linear weight of `x` between `x0` and `x1`, clamped to `[0, 1]`.
///
/// Identical endpoints give `0` (read the first endpoint).
#[inline]
pub fn linear_weight(x0: f64, x1: f64, x: f64) -> f64 {
    let span = x1 - x0;
    if span.abs() <= f64::EPSILON {
        return 0.0;
    }
    ((x - x0) / span).clamp(0.0, 1.0)
}

/// Weight of zenith angle `z` between `z0` and `z1`, linear in `cos(zenith)`.
#[inline]
pub fn cosine_weight(z0: Degree, z1: Degree, z: Degree) -> f64 {
    linear_weight((z0 * RADEG).cos(), (z1 * RADEG).cos(), (z * RADEG).cos())
}
