use crate::core::constants::{LV03_TO_LV95_EAST_OFFSET, LV03_TO_LV95_NORTH_OFFSET};
use crate::traits::Reprojector;
use crate::MapStateError;
use serde::{Deserialize, Serialize};

/// Represents a geographical coordinate with latitude and longitude (WGS84 degrees)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl LatLng {
    /// Creates a new LatLng coordinate
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Validates that the coordinates are within valid ranges
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lng.is_finite()
            && self.lat >= -90.0
            && self.lat <= 90.0
            && self.lng >= -180.0
            && self.lng <= 180.0
    }

    /// Rounds both components to `decimals` places
    pub fn rounded(&self, decimals: i32) -> Self {
        Self::new(round_to(self.lat, decimals), round_to(self.lng, decimals))
    }
}

impl Default for LatLng {
    fn default() -> Self {
        Self::new(0.0, 0.0)
    }
}

/// Represents a point in projected coordinates (east, north)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }

    pub fn offset(&self, dx: f64, dy: f64) -> Point {
        Point::new(self.x + dx, self.y + dy)
    }
}

impl Default for Point {
    fn default() -> Self {
        Self::new(0.0, 0.0)
    }
}

/// Coordinate reference systems a permalink can express positions in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CoordinateSystem {
    Wgs84,
    Lv95,
    Lv03,
}

impl CoordinateSystem {
    /// Guesses LV95 vs LV03 from an (east, north) pair
    pub fn guess_swiss(east: f64, north: f64) -> Self {
        if east >= LV03_TO_LV95_EAST_OFFSET || north >= LV03_TO_LV95_NORTH_OFFSET {
            Self::Lv95
        } else {
            Self::Lv03
        }
    }
}

/// Rounds `value` to `decimals` places
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10_f64.powi(decimals);
    (value * factor).round() / factor
}

/// Formats a float without trailing zeros after rounding to `decimals`
pub fn format_number(value: f64, decimals: i32) -> String {
    let rounded = round_to(value, decimals);
    // -0 prints as "-0"
    if rounded == 0.0 {
        return "0".to_string();
    }
    format!("{}", rounded)
}

/// Swiss projection adapter based on the swisstopo approximate formulas.
///
/// Accurate to about one metre inside Switzerland, which is the precision a
/// permalink carries anyway. Positions far outside the country are refused.
#[derive(Debug, Clone, Copy, Default)]
pub struct SwissReprojector;

impl SwissReprojector {
    pub fn new() -> Self {
        Self
    }

    fn wgs84_to_lv95(lat_lng: LatLng) -> Point {
        // auxiliary values, in 10000" units relative to Bern
        let phi = (lat_lng.lat * 3600.0 - 169_028.66) / 10_000.0;
        let lambda = (lat_lng.lng * 3600.0 - 26_782.5) / 10_000.0;

        let east = 2_600_072.37 + 211_455.93 * lambda
            - 10_938.51 * lambda * phi
            - 0.36 * lambda * phi.powi(2)
            - 44.54 * lambda.powi(3);
        let north = 1_200_147.07 + 308_807.95 * phi + 3_745.25 * lambda.powi(2)
            + 76.63 * phi.powi(2)
            - 194.56 * lambda.powi(2) * phi
            + 119.79 * phi.powi(3);

        Point::new(east, north)
    }

    fn lv95_to_wgs84(point: Point) -> LatLng {
        let y = (point.x - 2_600_000.0) / 1_000_000.0;
        let x = (point.y - 1_200_000.0) / 1_000_000.0;

        let lambda = 2.677_909_4 + 4.728_982 * y + 0.791_484 * y * x + 0.130_6 * y * x.powi(2)
            - 0.043_6 * y.powi(3);
        let phi = 16.902_389_2 + 3.238_272 * x
            - 0.270_978 * y.powi(2)
            - 0.002_528 * x.powi(2)
            - 0.044_7 * y.powi(2) * x
            - 0.014 * x.powi(3);

        LatLng::new(phi * 100.0 / 36.0, lambda * 100.0 / 36.0)
    }
}

impl Reprojector for SwissReprojector {
    fn to_working(&self, point: Point, from: CoordinateSystem) -> crate::Result<Point> {
        if !point.is_finite() {
            return Err(MapStateError::InvalidCoordinates(format!(
                "non finite coordinate {:?}",
                point
            ))
            .into());
        }
        match from {
            CoordinateSystem::Lv95 => Ok(point),
            CoordinateSystem::Lv03 => {
                Ok(point.offset(LV03_TO_LV95_EAST_OFFSET, LV03_TO_LV95_NORTH_OFFSET))
            }
            CoordinateSystem::Wgs84 => {
                let lat_lng = LatLng::new(point.y, point.x);
                // the approximation diverges quickly outside central Europe
                if !lat_lng.is_valid() || !(30.0..=60.0).contains(&lat_lng.lat) {
                    return Err(MapStateError::InvalidCoordinates(format!(
                        "{:?} is outside the supported area",
                        lat_lng
                    ))
                    .into());
                }
                Ok(Self::wgs84_to_lv95(lat_lng))
            }
        }
    }

    fn to_wgs84(&self, point: Point) -> crate::Result<LatLng> {
        if !point.is_finite() {
            return Err(MapStateError::InvalidCoordinates(format!(
                "non finite coordinate {:?}",
                point
            ))
            .into());
        }
        Ok(Self::lv95_to_wgs84(point))
    }
}
