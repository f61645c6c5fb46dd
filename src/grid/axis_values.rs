//! Discrete axis values of the table grid.
//!
//! Zenith angles, wobble offsets and noise levels are not binned a priori: they are
//! the sorted set of values found in the simulation corpus. This module provides the
//! two lookups performed on such a set:
//!
//! * [`bracket`] – the two closest surrounding values (zenith, wobble offset); a
//!   query outside the covered range repeats the boundary value,
//! * [`nearest`] – the single closest value (noise level).
use crate::constants::EPS;

/// Indices of the two catalogued values surrounding a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiscreteBracket {
    pub lower: usize,
    pub upper: usize,
}

/// Bracket `x` in the ascending slice `values`.
///
/// Return
/// ----------
/// * `None` for an empty slice or a non-finite `x`.
/// * `(0, 0)` for `x <= values[0]`, `(n-1, n-1)` for `x >= values[n-1]`,
///   otherwise `(i, i+1)` with `values[i] <= x < values[i+1]`.
pub fn bracket(values: &[f64], x: f64) -> Option<DiscreteBracket> {
    let last = values.len().checked_sub(1)?;
    if !x.is_finite() {
        return None;
    }
    if x <= values[0] {
        return Some(DiscreteBracket { lower: 0, upper: 0 });
    }
    if x >= values[last] {
        return Some(DiscreteBracket {
            lower: last,
            upper: last,
        });
    }
    let upper = values.partition_point(|v| *v <= x);
    Some(DiscreteBracket {
        lower: upper - 1,
        upper,
    })
}

/// Index of the value closest to `x` (the lower one on ties).
pub fn nearest(values: &[f64], x: f64) -> Option<usize> {
    let b = bracket(values, x)?;
    if b.lower == b.upper || (x - values[b.lower]) <= (values[b.upper] - x) {
        Some(b.lower)
    } else {
        Some(b.upper)
    }
}

/// Index of the catalogued value equal to `x` within tolerance.
pub fn position(values: &[f64], x: f64) -> Option<usize> {
    values.iter().position(|v| (v - x).abs() < EPS)
}

/// Insert `x` keeping the slice sorted and free of duplicates (within tolerance).
///
/// Returns the index of the value.
pub fn insert_sorted(values: &mut Vec<f64>, x: f64) -> usize {
    if let Some(i) = position(values, x) {
        return i;
    }
    let i = values.partition_point(|v| *v < x);
    values.insert(i, x);
    i
}

/// Sort ascending and remove duplicates (within tolerance).
pub fn sort_dedup(values: &mut Vec<f64>) {
    values.sort_by(f64::total_cmp);
    values.dedup_by(|a, b| (*a - *b).abs() < EPS);
}
