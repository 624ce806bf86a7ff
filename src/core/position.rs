use crate::core::constants::{DEFAULT_CENTER, DEFAULT_ZOOM, TOP_DOWN_PITCH};
use crate::core::geo::Point;
use serde::{Deserialize, Serialize};
use std::f64::consts::TAU;

/// 3D camera pose, present only while the globe view is active.
///
/// `x`/`y` are WGS84 longitude/latitude, `z` the height in metres and the
/// angles are in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Camera {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub heading: f64,
    pub pitch: f64,
    pub roll: f64,
}

impl Camera {
    /// Camera looking straight down on `(x, y)` from height `z`
    pub fn top_down(x: f64, y: f64, z: f64) -> Self {
        Self {
            x,
            y,
            z,
            heading: 0.0,
            pitch: TOP_DOWN_PITCH,
            roll: 0.0,
        }
    }
}

/// The current view of the map in the working projection (LV95)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub center: Point,
    pub zoom: f64,
    /// Radians, always within [0, 2π)
    rotation: f64,
    pub camera: Option<Camera>,
}

impl Position {
    pub fn new(center: Point, zoom: f64) -> Self {
        Self {
            center,
            zoom,
            rotation: 0.0,
            camera: None,
        }
    }

    pub fn rotation(&self) -> f64 {
        self.rotation
    }

    /// Sets the rotation, normalized into [0, 2π)
    pub fn set_rotation(&mut self, rotation: f64) {
        self.rotation = normalize_rotation(rotation);
    }

    pub fn is_3d(&self) -> bool {
        self.camera.is_some()
    }
}

impl Default for Position {
    fn default() -> Self {
        Self::new(Point::new(DEFAULT_CENTER.0, DEFAULT_CENTER.1), DEFAULT_ZOOM)
    }
}

/// Normalizes an angle in radians into [0, 2π)
pub fn normalize_rotation(rotation: f64) -> f64 {
    if !rotation.is_finite() {
        return 0.0;
    }
    let normalized = rotation.rem_euclid(TAU);
    // rem_euclid can round up to exactly TAU for tiny negative inputs
    if normalized >= TAU {
        0.0
    } else {
        normalized
    }
}
