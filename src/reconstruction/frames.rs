//! Pointing and shower frames.
//!
//! Ground frame: `x` East, `y` North, `z` up (m). Azimuth is counted from North
//! towards East, zenith from the vertical.
//!
//! Camera coordinates are gnomonic (tangent-plane) coordinates around the pointing
//! direction `p`, expressed in degrees. A camera point `(X, Y)` corresponds to the
//! sky direction
//!
//! ```text
//! v = normalize(p + X·RADEG·e_x + Y·RADEG·e_y)
//! ```
//!
//! with `e_x = (cos az, −sin az, 0)` and `e_y = p × e_x`. The gnomonic projection maps
//! straight lines in space to straight lines in the camera, so the image of a shower
//! axis is a line through the source position.
use nalgebra::{Vector2, Vector3};

use crate::constants::{Degree, RADEG};

/// Camera frame attached to a pointing direction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointingFrame {
    pub pointing: Vector3<f64>,
    pub e_x: Vector3<f64>,
    pub e_y: Vector3<f64>,
}

impl PointingFrame {
    pub fn new(azimuth: Degree, zenith: Degree) -> Self {
        let (sin_az, cos_az) = (azimuth * RADEG).sin_cos();
        let (sin_ze, cos_ze) = (zenith * RADEG).sin_cos();
        let pointing = Vector3::new(sin_ze * sin_az, sin_ze * cos_az, cos_ze);
        let e_x = Vector3::new(cos_az, -sin_az, 0.0);
        let e_y = pointing.cross(&e_x);
        Self { pointing, e_x, e_y }
    }

    /// Point of the tangent plane (at unit distance) for camera coordinates (deg).
    #[inline]
    pub fn tangent_point(&self, x: Degree, y: Degree) -> Vector3<f64> {
        self.pointing + self.e_x * (x * RADEG) + self.e_y * (y * RADEG)
    }

    /// Unit sky direction of camera coordinates (deg).
    #[inline]
    pub fn direction_from_camera(&self, x: Degree, y: Degree) -> Vector3<f64> {
        self.tangent_point(x, y).normalize()
    }

    /// Camera coordinates (deg) of a sky direction, `None` behind the camera.
    pub fn camera_from_direction(&self, direction: &Vector3<f64>) -> Option<(Degree, Degree)> {
        let along = direction.dot(&self.pointing);
        if along <= 0.0 {
            return None;
        }
        Some((
            direction.dot(&self.e_x) / along / RADEG,
            direction.dot(&self.e_y) / along / RADEG,
        ))
    }

    /// 3D direction of a camera-plane orientation `(cos φ, sin φ)`.
    #[inline]
    pub fn camera_axis(&self, cos_phi: f64, sin_phi: f64) -> Vector3<f64> {
        self.e_x * cos_phi + self.e_y * sin_phi
    }
}

/// Plane perpendicular to a shower direction, through the ground origin.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShowerFrame {
    pub direction: Vector3<f64>,
    pub b1: Vector3<f64>,
    pub b2: Vector3<f64>,
}

impl ShowerFrame {
    /// Build the frame of `direction` (unit), oriented along the camera `e_x` axis.
    pub fn new(direction: Vector3<f64>, camera: &PointingFrame) -> Self {
        let b1 = (camera.e_x - direction * camera.e_x.dot(&direction)).normalize();
        let b2 = direction.cross(&b1);
        Self { direction, b1, b2 }
    }

    /// Coordinates of the projection of `v` along the shower direction.
    #[inline]
    pub fn project(&self, v: &Vector3<f64>) -> Vector2<f64> {
        Vector2::new(v.dot(&self.b1), v.dot(&self.b2))
    }

    /// 3D point of shower-plane coordinates.
    #[inline]
    pub fn lift(&self, q: &Vector2<f64>) -> Vector3<f64> {
        self.b1 * q.x + self.b2 * q.y
    }
}
