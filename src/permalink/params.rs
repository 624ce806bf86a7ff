use crate::core::constants::{METRIC_PRECISION, WGS84_PRECISION, ZOOM_PRECISION};
use crate::core::geo::{format_number, Point};
use crate::core::position::Camera;
use crate::features::mode::FeatureInfoMode;
use crate::layers::codec::{decode_layers, encode_layers};
use crate::layers::manager::LayerList;
use indexmap::IndexMap;
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use std::fmt;

/// Escaped when writing a query. `%` is part of it so layer-codec escapes
/// survive the round trip through the query decoder.
const QUERY_VALUE: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'&')
    .add(b'+')
    .add(b'<')
    .add(b'>')
    .add(b'`');

const QUERY_KEY: &AsciiSet = &QUERY_VALUE.add(b'=');

pub const LANG: &str = "lang";
pub const CENTER: &str = "center";
pub const ZOOM: &str = "z";
pub const BACKGROUND: &str = "bgLayer";
pub const TOPIC: &str = "topic";
pub const LAYERS: &str = "layers";
pub const FEATURE_INFO: &str = "featureInfo";
pub const CAMERA: &str = "camera";
pub const CATALOG_NODES: &str = "catalogNodes";
pub const CROSSHAIR: &str = "crosshair";

/// Ordered query parameters; the first occurrence of a key wins
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams {
    params: IndexMap<String, String>,
}

impl QueryParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses `a=1&b=2` (a leading `?` is ignored)
    pub fn parse(query: &str) -> Self {
        let query = query.strip_prefix('?').unwrap_or(query);
        let mut params = IndexMap::new();
        for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
            if key.is_empty() {
                continue;
            }
            params
                .entry(key.into_owned())
                .or_insert_with(|| value.into_owned());
        }
        Self { params }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    /// Parsed numeric value; unparseable numbers count as absent
    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.get(key)
            .and_then(|v| v.trim().parse::<f64>().ok())
            .filter(|v| v.is_finite())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.params.contains_key(key)
    }

    /// Sets `key`, keeping its position when it already exists
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.params.insert(key.into(), value.into());
    }

    /// Sets `key` only when it is not there yet
    pub fn insert_if_absent(&mut self, key: &str, value: impl Into<String>) -> bool {
        if self.contains(key) {
            return false;
        }
        self.insert(key, value);
        true
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.params.shift_remove(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.params.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.params.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub fn to_query_string(&self) -> String {
        self.params
            .iter()
            .map(|(k, v)| {
                format!(
                    "{}={}",
                    utf8_percent_encode(k, QUERY_KEY),
                    utf8_percent_encode(v, QUERY_VALUE)
                )
            })
            .collect::<Vec<_>>()
            .join("&")
    }
}

impl fmt::Display for QueryParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_query_string())
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for QueryParams {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut params = Self::new();
        for (key, value) in iter {
            let key = key.into();
            if !params.contains(&key) {
                params.insert(key, value);
            }
        }
        params
    }
}

/// Typed view of the canonical hash-route parameters
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PermalinkState {
    pub lang: Option<String>,
    pub center: Option<Point>,
    pub zoom: Option<f64>,
    pub background: Option<String>,
    pub topic: Option<String>,
    pub layers: Option<LayerList>,
    pub feature_info: Option<FeatureInfoMode>,
    pub camera: Option<Camera>,
    pub catalog_nodes: Option<Vec<String>>,
    pub crosshair: Option<String>,
}

impl PermalinkState {
    /// Reads the canonical parameters; malformed values are ignored
    pub fn from_params(params: &QueryParams) -> Self {
        Self {
            lang: non_empty(params.get(LANG)),
            center: params.get(CENTER).and_then(parse_center),
            zoom: params.get_f64(ZOOM),
            background: non_empty(params.get(BACKGROUND)),
            topic: non_empty(params.get(TOPIC)),
            layers: params.get(LAYERS).map(decode_layers),
            feature_info: params.get(FEATURE_INFO).and_then(|v| match v.parse() {
                Ok(mode) => Some(mode),
                Err(e) => {
                    log::debug!("{}", e);
                    None
                }
            }),
            camera: params.get(CAMERA).and_then(parse_camera),
            catalog_nodes: params.get(CATALOG_NODES).map(|v| {
                v.split(',')
                    .map(str::trim)
                    .filter(|n| !n.is_empty())
                    .map(str::to_string)
                    .collect()
            }),
            crosshair: non_empty(params.get(CROSSHAIR)),
        }
    }

    /// Writes the parameters in their canonical order
    pub fn to_params(&self) -> QueryParams {
        let mut params = QueryParams::new();
        if let Some(lang) = &self.lang {
            params.insert(LANG, lang.as_str());
        }
        if let Some(center) = self.center {
            params.insert(CENTER, format_center(center));
        }
        if let Some(zoom) = self.zoom {
            params.insert(ZOOM, format_number(zoom, ZOOM_PRECISION));
        }
        if let Some(background) = &self.background {
            params.insert(BACKGROUND, background.as_str());
        }
        if let Some(topic) = &self.topic {
            params.insert(TOPIC, topic.as_str());
        }
        if let Some(layers) = &self.layers {
            params.insert(LAYERS, encode_layers(layers));
        }
        if let Some(mode) = self.feature_info {
            params.insert(FEATURE_INFO, mode.as_param());
        }
        if let Some(camera) = &self.camera {
            params.insert(CAMERA, format_camera(camera));
        }
        if let Some(nodes) = self.catalog_nodes.as_ref().filter(|n| !n.is_empty()) {
            params.insert(CATALOG_NODES, nodes.join(","));
        }
        if let Some(crosshair) = &self.crosshair {
            params.insert(CROSSHAIR, crosshair.as_str());
        }
        params
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

pub fn parse_center(value: &str) -> Option<Point> {
    let (x, y) = value.split_once(',')?;
    let point = Point::new(x.trim().parse().ok()?, y.trim().parse().ok()?);
    point.is_finite().then_some(point)
}

pub fn format_center(center: Point) -> String {
    format!(
        "{},{}",
        format_number(center.x, METRIC_PRECISION),
        format_number(center.y, METRIC_PRECISION)
    )
}

/// `x,y,z,pitch,heading,roll`; missing angles fall back to a top-down view
pub fn parse_camera(value: &str) -> Option<Camera> {
    let fields: Vec<Option<f64>> = value
        .split(',')
        .map(|f| f.trim().parse::<f64>().ok().filter(|v| v.is_finite()))
        .collect();
    let field = |index: usize| fields.get(index).copied().flatten();

    let mut camera = Camera::top_down(field(0)?, field(1)?, field(2).unwrap_or(0.0));
    if let Some(pitch) = field(3) {
        camera.pitch = pitch;
    }
    if let Some(heading) = field(4) {
        camera.heading = heading;
    }
    if let Some(roll) = field(5) {
        camera.roll = roll;
    }
    Some(camera)
}

pub fn format_camera(camera: &Camera) -> String {
    [
        format_number(camera.x, WGS84_PRECISION),
        format_number(camera.y, WGS84_PRECISION),
        format_number(camera.z, METRIC_PRECISION),
        format_number(camera.pitch, METRIC_PRECISION),
        format_number(camera.heading, METRIC_PRECISION),
        format_number(camera.roll, METRIC_PRECISION),
    ]
    .join(",")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layers::base::LayerRef;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_query_parsing_keeps_order_and_first_value() {
        let params = QueryParams::parse("?b=2&a=1&b=3&=x&swisssearch=Bern+Bahnhof");

        assert_eq!(params.keys().collect::<Vec<_>>(), vec!["b", "a", "swisssearch"]);
        assert_eq!(params.get("b"), Some("2"));
        assert_eq!(params.get("swisssearch"), Some("Bern Bahnhof"));
    }

    #[test]
    fn test_codec_escapes_survive_the_query() {
        let mut params = QueryParams::new();
        params.insert(LAYERS, "KML|https://a.ch/x%3By.kml;b,f");

        let written = params.to_query_string();
        assert_eq!(written, "layers=KML|https://a.ch/x%253By.kml;b,f");
        assert_eq!(QueryParams::parse(&written), params);
    }

    #[test]
    fn test_state_roundtrip() {
        let state = PermalinkState {
            lang: Some("fr".into()),
            center: Some(Point::new(2_600_000.5, 1_200_000.0)),
            zoom: Some(7.25),
            background: Some("void".into()),
            topic: Some("ech".into()),
            layers: Some(
                vec![
                    LayerRef::catalog("ch.swisstopo.zeitreihen").with_timestamp("18641231"),
                    LayerRef::catalog("ch.bav.haltestellen-oev").with_features(["1", "2"]),
                ]
                .into(),
            ),
            feature_info: Some(FeatureInfoMode::BottomPanel),
            camera: Some(Camera::top_down(7.5, 46.5, 1200.0)),
            catalog_nodes: Some(vec!["457".into(), "532".into()]),
            crosshair: Some("marker".into()),
        };

        let query = state.to_params().to_query_string();
        assert_eq!(PermalinkState::from_params(&QueryParams::parse(&query)), state);
        assert!(query.starts_with("lang=fr&center=2600000.5,1200000&z=7.25&bgLayer=void"));
    }

    #[test]
    fn test_malformed_values_are_ignored() {
        let state = PermalinkState::from_params(&QueryParams::parse(
            "center=abc,1&z=NaN&featureInfo=sideways&camera=7.5",
        ));
        assert_eq!(state, PermalinkState::default());
    }

    #[test]
    fn test_camera_defaults() {
        let camera = parse_camera("7.5,46.5").unwrap();
        assert_eq!(camera, Camera::top_down(7.5, 46.5, 0.0));
        assert_eq!(format_camera(&camera), "7.5,46.5,0,-90,0,0");
    }
}
