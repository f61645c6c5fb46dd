//! # Constants and type definitions for showerscale
//!
//! This module centralizes the **unit aliases**, **conversion factors**, and the
//! **default binning constants** used by the lookup-table engine.
//!
//! ## Overview
//!
//! - Angle conversion (degrees ↔ radians)
//! - Unit aliases used across the crate (`Degree`, `Meter`, `Log10Size`, …)
//! - Default lookup-table axes (log10 size × core distance)
//! - The fixed azimuth sector edges of the table grid
//!
//! The default axes reproduce the binning used for the standard tables:
//! 55 bins of 0.1 in log10(size) starting at 1.5, and 80 bins of 15 m in core
//! distance starting at 0 m.

// -------------------------------------------------------------------------------------------------
// Unit conversions
// -------------------------------------------------------------------------------------------------

/// Degrees → radians
pub const RADEG: f64 = std::f64::consts::PI / 180.0;

/// Numerical epsilon used for floating-point comparisons of axis values
pub const EPS: f64 = 1e-6;

// -------------------------------------------------------------------------------------------------
// Type aliases
// -------------------------------------------------------------------------------------------------

/// Angle in degrees
pub type Degree = f64;
/// Angle in radians
pub type Radian = f64;
/// Distance in meters
pub type Meter = f64;
/// Decimal logarithm of the image size (integrated light yield)
pub type Log10Size = f64;
/// Decimal logarithm of an energy in TeV
pub type Log10TeV = f64;
/// Energy in TeV
pub type TeV = f64;

// -------------------------------------------------------------------------------------------------
// Default lookup-table binning
// -------------------------------------------------------------------------------------------------

/// Lower edge of the log10(size) axis
pub const DEFAULT_SIZE_AXIS_OFFSET: Log10Size = 1.5;
/// Bin width of the log10(size) axis
pub const DEFAULT_SIZE_AXIS_WIDTH: f64 = 0.1;
/// Number of bins of the log10(size) axis
pub const DEFAULT_SIZE_AXIS_BINS: usize = 55;

/// Lower edge of the core-distance axis
pub const DEFAULT_DISTANCE_AXIS_OFFSET: Meter = 0.0;
/// Bin width of the core-distance axis
pub const DEFAULT_DISTANCE_AXIS_WIDTH: Meter = 15.0;
/// Number of bins of the core-distance axis
pub const DEFAULT_DISTANCE_AXIS_BINS: usize = 80;

/// Default minimum number of showers in a bin (a bin is valid for `count > min`)
pub const DEFAULT_MIN_SHOWERS_PER_BIN: u64 = 5;

/// Quantiles used for the robust spread ("sigma") of a bin
pub const DEFAULT_SIGMA_QUANTILES: (f64, f64) = (0.16, 0.84);

// -------------------------------------------------------------------------------------------------
// Azimuth sectors
// -------------------------------------------------------------------------------------------------

/// Number of fixed azimuth sectors of the table grid
pub const AZIMUTH_SECTORS: usize = 4;

/// Lower/upper azimuth edges (degrees, in `(-180, 180]`) of the four sectors.
///
/// Sector 0 wraps around ±180° (`az > 135` or `az <= -135`).
pub const AZIMUTH_SECTOR_EDGES: [(Degree, Degree); AZIMUTH_SECTORS] = [
    (135.0, -135.0),
    (-135.0, -45.0),
    (-45.0, 45.0),
    (45.0, 135.0),
];

/// Maximum number of count-only warnings printed per warning category
pub const MAX_LOGGED_WARNINGS: u64 = 30;
