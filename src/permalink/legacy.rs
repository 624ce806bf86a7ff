//! Translation of the query parameters used by the previous viewer
//! generation (`?lang=de&E=...&N=...&layers=a,b&layers_opacity=...`) into
//! canonical hash-route parameters.

use crate::core::constants::{
    LEGACY_VOID_BACKGROUND, VOID_BACKGROUND, WGS84_PRECISION, ZOOM_PRECISION,
};
use crate::core::geo::{format_number, CoordinateSystem, LatLng, Point};
use crate::core::position::Camera;
use crate::features::mode::FeatureInfoMode;
use crate::layers::base::LayerRef;
use crate::layers::codec::{decode_layer_entry, decode_layers, encode_layers};
use crate::layers::manager::LayerList;
use crate::permalink::params::{
    format_camera, format_center, QueryParams, BACKGROUND, CAMERA, CATALOG_NODES, CENTER,
    CROSSHAIR, FEATURE_INFO, LANG, LAYERS, TOPIC, ZOOM,
};
use crate::traits::Reprojector;

const LAT: &str = "lat";
const LON: &str = "lon";
const EAST: &str = "E";
const NORTH: &str = "N";
/// Legacy `X` is the northing
const LEGACY_X: &str = "X";
/// Legacy `Y` is the easting
const LEGACY_Y: &str = "Y";
const LEGACY_ZOOM: &str = "zoom";
const LAYERS_OPACITY: &str = "layers_opacity";
const LAYERS_VISIBILITY: &str = "layers_visibility";
const LAYERS_TIMESTAMP: &str = "layers_timestamp";
const ADMIN_ID: &str = "adminId";
const SHOW_TOOLTIP: &str = "showTooltip";
const SWISSSEARCH: &str = "swisssearch";
const ELEVATION: &str = "elevation";
const HEADING: &str = "heading";
const PITCH: &str = "pitch";

/// Every key this module understands
const LEGACY_KEYS: [&str; 23] = [
    LAT,
    LON,
    EAST,
    NORTH,
    LEGACY_X,
    LEGACY_Y,
    LEGACY_ZOOM,
    LAYERS,
    LAYERS_OPACITY,
    LAYERS_VISIBILITY,
    LAYERS_TIMESTAMP,
    ADMIN_ID,
    SHOW_TOOLTIP,
    SWISSSEARCH,
    ELEVATION,
    HEADING,
    PITCH,
    LANG,
    TOPIC,
    BACKGROUND,
    CATALOG_NODES,
    CROSSHAIR,
    FEATURE_INFO,
];

/// Outcome of a legacy translation
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LegacyTranslation {
    /// Canonical parameters, legacy values merged in
    pub params: QueryParams,
    /// Legacy keys that were understood and must be stripped from the URL
    pub consumed: Vec<String>,
    /// Drawing to resolve through the KML service; never part of `params`
    pub admin_id: Option<String>,
    /// Initial search; never part of `params`
    pub search_query: Option<String>,
}

impl LegacyTranslation {
    pub fn is_empty(&self) -> bool {
        self.consumed.is_empty()
    }
}

/// Merges the legacy parameters into the canonical ones.
///
/// Values already present in `canonical` win. Nothing here fails: numbers
/// that do not parse are dropped and a position that cannot be reprojected
/// is left out with a warning.
pub fn translate(
    legacy: &QueryParams,
    canonical: &QueryParams,
    reprojector: &dyn Reprojector,
) -> LegacyTranslation {
    let mut params = canonical.clone();
    let consumed: Vec<String> = legacy
        .keys()
        .filter(|k| LEGACY_KEYS.contains(k))
        .map(str::to_string)
        .collect();

    if consumed.is_empty() {
        return LegacyTranslation {
            params,
            ..LegacyTranslation::default()
        };
    }
    log::debug!("translating legacy parameters {:?}", consumed);

    let wgs84 = legacy_wgs84(legacy);
    let center = legacy_center(legacy, wgs84, reprojector);
    if let Some(center) = center {
        params.insert_if_absent(CENTER, format_center(center));
    }
    if let Some(zoom) = legacy.get_f64(LEGACY_ZOOM) {
        params.insert_if_absent(ZOOM, format_number(zoom, ZOOM_PRECISION));
    }
    if let Some(camera) = legacy_camera(legacy, wgs84, center, reprojector) {
        params.insert_if_absent(CAMERA, format_camera(&camera));
    }

    if let Some(layers) = legacy_layers(legacy, canonical) {
        params.insert(LAYERS, encode_layers(&layers));
    }

    for key in [LANG, TOPIC, CATALOG_NODES, CROSSHAIR] {
        if let Some(value) = legacy.get(key).filter(|v| !v.is_empty()) {
            params.insert_if_absent(key, value);
        }
    }
    if let Some(background) = legacy.get(BACKGROUND).filter(|v| !v.is_empty()) {
        let background = if background == LEGACY_VOID_BACKGROUND {
            VOID_BACKGROUND
        } else {
            background
        };
        params.insert_if_absent(BACKGROUND, background);
    }

    if let Some(mode) = legacy.get(FEATURE_INFO) {
        params.insert_if_absent(FEATURE_INFO, mode);
    } else if let Some(show) = legacy.get(SHOW_TOOLTIP) {
        let mode = if show.trim().eq_ignore_ascii_case("true") {
            FeatureInfoMode::Default
        } else {
            FeatureInfoMode::None
        };
        params.insert_if_absent(FEATURE_INFO, mode.as_param());
    }

    LegacyTranslation {
        params,
        consumed,
        admin_id: legacy
            .get(ADMIN_ID)
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string),
        search_query: legacy
            .get(SWISSSEARCH)
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string),
    }
}

fn legacy_wgs84(legacy: &QueryParams) -> Option<LatLng> {
    let lat_lng = LatLng::new(legacy.get_f64(LAT)?, legacy.get_f64(LON)?);
    lat_lng
        .is_valid()
        .then(|| lat_lng.rounded(WGS84_PRECISION))
}

/// lat/lon first, then E/N, then X/Y
fn legacy_center(
    legacy: &QueryParams,
    wgs84: Option<LatLng>,
    reprojector: &dyn Reprojector,
) -> Option<Point> {
    let (point, system) = if let Some(lat_lng) = wgs84 {
        (Point::new(lat_lng.lng, lat_lng.lat), CoordinateSystem::Wgs84)
    } else if let (Some(east), Some(north)) = (legacy.get_f64(EAST), legacy.get_f64(NORTH)) {
        (Point::new(east, north), CoordinateSystem::Lv95)
    } else if let (Some(north), Some(east)) = (legacy.get_f64(LEGACY_X), legacy.get_f64(LEGACY_Y)) {
        (
            Point::new(east, north),
            CoordinateSystem::guess_swiss(east, north),
        )
    } else {
        return None;
    };

    match reprojector.to_working(point, system) {
        Ok(center) => Some(center),
        Err(e) => {
            log::warn!("ignoring legacy position {:?}: {}", point, e);
            None
        }
    }
}

fn legacy_camera(
    legacy: &QueryParams,
    wgs84: Option<LatLng>,
    center: Option<Point>,
    reprojector: &dyn Reprojector,
) -> Option<Camera> {
    let elevation = legacy.get_f64(ELEVATION);
    let heading = legacy.get_f64(HEADING);
    let pitch = legacy.get_f64(PITCH);
    if elevation.is_none() && heading.is_none() && pitch.is_none() {
        return None;
    }

    let target = match wgs84 {
        Some(lat_lng) => lat_lng,
        None => match center.map(|c| reprojector.to_wgs84(c)) {
            Some(Ok(lat_lng)) => lat_lng.rounded(WGS84_PRECISION),
            Some(Err(e)) => {
                log::warn!("ignoring legacy camera: {}", e);
                return None;
            }
            None => return None,
        },
    };

    let mut camera = Camera::top_down(target.lng, target.lat, elevation.unwrap_or(0.0));
    if let Some(heading) = heading {
        camera.heading = heading;
    }
    if let Some(pitch) = pitch {
        camera.pitch = pitch;
    }
    Some(camera)
}

/// Zips `layers` with the parallel opacity/visibility/timestamp lists and
/// merges the result behind the canonical layers
fn legacy_layers(legacy: &QueryParams, canonical: &QueryParams) -> Option<LayerList> {
    let ids = legacy.get(LAYERS)?;
    let column = |key: &str| -> Vec<String> {
        legacy
            .get(key)
            .map(|v| v.split(',').map(|s| s.trim().to_string()).collect())
            .unwrap_or_default()
    };
    let opacities = column(LAYERS_OPACITY);
    let visibilities = column(LAYERS_VISIBILITY);
    let timestamps = column(LAYERS_TIMESTAMP);

    let mut merged = canonical.get(LAYERS).map(decode_layers).unwrap_or_default();
    let canonical_count = merged.len();

    for (index, id) in ids.split(',').map(str::trim).enumerate() {
        if id.is_empty() {
            continue;
        }
        let mut layer = if id.contains("||") {
            match decode_layer_entry(id) {
                Ok(layer) => layer,
                Err(e) => {
                    log::warn!("ignoring legacy layer {:?}: {}", id, e);
                    continue;
                }
            }
        } else {
            LayerRef::catalog(id)
        };

        if let Some(opacity) = opacities.get(index).and_then(|o| o.parse::<f64>().ok()) {
            layer.set_opacity(opacity);
        }
        if let Some(visible) = visibilities.get(index) {
            layer.visible = !visible.eq_ignore_ascii_case("false");
        }
        if let Some(timestamp) = timestamps.get(index).filter(|t| !t.is_empty()) {
            layer.timestamp = Some(timestamp.clone());
        }

        let collides = merged
            .iter()
            .take(canonical_count)
            .any(|existing| existing.id == layer.id);
        if collides {
            log::debug!("legacy layer {} already in canonical layers", layer.id);
            continue;
        }
        merged.push(layer);
    }

    Some(merged)
}
