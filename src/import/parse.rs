use crate::core::bounds::Bounds;
use geo::BoundingRect;
use geo_types::{Coord, Geometry, LineString, MultiLineString, Point, Polygon};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use serde::{Deserialize, Serialize};

/// Vector file formats accepted for import
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FileFormat {
    Kml,
    Gpx,
}

impl FileFormat {
    /// Guess from a media type; `None` means the content has to be sniffed
    pub fn from_media_type(media_type: &str) -> Option<Self> {
        match media_type {
            "application/vnd.google-earth.kml+xml" => Some(Self::Kml),
            "application/gpx+xml" => Some(Self::Gpx),
            _ => None,
        }
    }

    /// Guess from a file name or URL path
    pub fn from_extension(name: &str) -> Option<Self> {
        let path = name.split(['?', '#']).next().unwrap_or(name);
        let extension = path.rsplit('.').next()?.to_ascii_lowercase();
        match extension.as_str() {
            "kml" => Some(Self::Kml),
            "gpx" => Some(Self::Gpx),
            _ => None,
        }
    }
}

/// One placemark, waypoint, route or track
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedFeature {
    pub id: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    /// WGS84, x = longitude
    pub geometry: Geometry<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParsedDocument {
    pub format: FileFormat,
    pub name: Option<String>,
    pub features: Vec<ParsedFeature>,
}

impl ParsedDocument {
    /// WGS84 bounding box of every feature, `None` without features
    pub fn extent(&self) -> Option<Bounds> {
        self.features
            .iter()
            .filter_map(|f| f.geometry.bounding_rect())
            .map(Bounds::from)
            .reduce(|a, b| {
                Bounds::from_coords(
                    a.min.x.min(b.min.x),
                    a.min.y.min(b.min.y),
                    a.max.x.max(b.max.x),
                    a.max.y.max(b.max.y),
                )
            })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum XmlParseError {
    #[error("content is not XML")]
    NotXml,
    #[error("malformed XML: {0}")]
    Malformed(String),
    #[error("unsupported root element <{0}>")]
    UnsupportedRoot(String),
}

/// Parses a KML or GPX document.
///
/// The whole document is read before the root is judged, so broken XML is
/// reported as malformed even when its root is something else.
pub fn parse_document(content: &[u8]) -> Result<ParsedDocument, XmlParseError> {
    let text = std::str::from_utf8(content).map_err(|_| XmlParseError::NotXml)?;
    let text = text.trim_start_matches('\u{feff}');
    if !text.trim_start().starts_with('<') {
        return Err(XmlParseError::NotXml);
    }

    let mut reader = Reader::from_str(text);
    reader.trim_text(true);

    let mut builder = DocumentBuilder::default();
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => builder.start(e),
            Ok(Event::Empty(ref e)) => {
                builder.start(e);
                builder.end();
            }
            Ok(Event::End(_)) => builder.end(),
            Ok(Event::Text(ref e)) => {
                let value = e
                    .unescape()
                    .map_err(|err| XmlParseError::Malformed(err.to_string()))?;
                builder.text(&value);
            }
            Ok(Event::CData(e)) => {
                let value = e.into_inner();
                builder.text(&String::from_utf8_lossy(&value));
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(err) => {
                return Err(XmlParseError::Malformed(format!(
                    "{} at byte {}",
                    err,
                    reader.buffer_position()
                )))
            }
        }
        buf.clear();
    }

    builder.finish()
}

#[derive(Default)]
struct FeatureDraft {
    id: Option<String>,
    name: Option<String>,
    description: Option<String>,
    geometries: Vec<Geometry<f64>>,
}

#[derive(Default)]
struct DocumentBuilder {
    root: Option<String>,
    stack: Vec<String>,
    text: String,
    document_name: Option<String>,
    features: Vec<ParsedFeature>,
    current: Option<FeatureDraft>,
    // geometry in progress
    coords: Vec<Coord<f64>>,
    exterior: Option<LineString<f64>>,
    interiors: Vec<LineString<f64>>,
    segments: Vec<LineString<f64>>,
}

impl DocumentBuilder {
    fn format(&self) -> Option<FileFormat> {
        match self.root.as_deref() {
            Some("kml") => Some(FileFormat::Kml),
            Some("gpx") => Some(FileFormat::Gpx),
            _ => None,
        }
    }

    fn start(&mut self, e: &BytesStart) {
        let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
        if self.root.is_none() {
            self.root = Some(name.clone());
        }
        self.text.clear();

        match (self.format(), name.as_str()) {
            (Some(FileFormat::Kml), "Placemark") => {
                self.current = Some(FeatureDraft {
                    id: attribute(e, "id"),
                    ..FeatureDraft::default()
                });
            }
            (Some(FileFormat::Gpx), "wpt" | "rte" | "trk") => {
                self.current = Some(FeatureDraft::default());
                self.coords.clear();
                self.segments.clear();
                if name == "wpt" {
                    self.push_gpx_point(e);
                }
            }
            (Some(FileFormat::Gpx), "rtept" | "trkpt") => self.push_gpx_point(e),
            (Some(FileFormat::Gpx), "trkseg") => self.coords.clear(),
            _ => {}
        }
        self.stack.push(name);
    }

    fn text(&mut self, value: &str) {
        self.text.push_str(value);
    }

    fn end(&mut self) {
        let Some(name) = self.stack.pop() else {
            return;
        };
        let text = std::mem::take(&mut self.text);
        let text = text.trim();

        match self.format() {
            Some(FileFormat::Kml) => self.end_kml(&name, text),
            Some(FileFormat::Gpx) => self.end_gpx(&name, text),
            None => {}
        }
    }

    fn parent(&self) -> Option<&str> {
        self.stack.last().map(String::as_str)
    }

    fn inside(&self, element: &str) -> bool {
        self.stack.iter().any(|s| s == element)
    }

    fn end_kml(&mut self, name: &str, text: &str) {
        match name {
            "name" | "description" if self.parent() == Some("Placemark") => {
                if let Some(draft) = self.current.as_mut() {
                    let value = (!text.is_empty()).then(|| text.to_string());
                    if name == "name" {
                        draft.name = value;
                    } else {
                        draft.description = value;
                    }
                }
            }
            "name" if self.parent() == Some("Document") && self.document_name.is_none() => {
                self.document_name = (!text.is_empty()).then(|| text.to_string());
            }
            "coordinates" => self.coords = parse_kml_coordinates(text),
            "Point" => {
                if let Some(coord) = self.coords.first().copied() {
                    self.push_geometry(Point::from(coord).into());
                }
                self.coords.clear();
            }
            "LineString" => {
                if self.coords.len() >= 2 {
                    let line = LineString::new(std::mem::take(&mut self.coords));
                    self.push_geometry(line.into());
                }
                self.coords.clear();
            }
            "LinearRing" => {
                let ring = LineString::new(std::mem::take(&mut self.coords));
                if ring.0.len() >= 3 {
                    if self.inside("innerBoundaryIs") {
                        self.interiors.push(ring);
                    } else {
                        self.exterior = Some(ring);
                    }
                }
            }
            "Polygon" => {
                if let Some(exterior) = self.exterior.take() {
                    let interiors = std::mem::take(&mut self.interiors);
                    self.push_geometry(Polygon::new(exterior, interiors).into());
                }
                self.interiors.clear();
            }
            "Placemark" => self.finish_feature(),
            _ => {}
        }
    }

    fn end_gpx(&mut self, name: &str, text: &str) {
        match name {
            "name" | "desc" if matches!(self.parent(), Some("wpt" | "rte" | "trk")) => {
                if let Some(draft) = self.current.as_mut() {
                    let value = (!text.is_empty()).then(|| text.to_string());
                    if name == "name" {
                        draft.name = value;
                    } else {
                        draft.description = value;
                    }
                }
            }
            "name" if self.parent() == Some("metadata") => {
                self.document_name = (!text.is_empty()).then(|| text.to_string());
            }
            "wpt" => {
                if let Some(coord) = self.coords.first().copied() {
                    self.push_geometry(Point::from(coord).into());
                }
                self.coords.clear();
                self.finish_feature();
            }
            "rte" => {
                if self.coords.len() >= 2 {
                    let line = LineString::new(std::mem::take(&mut self.coords));
                    self.push_geometry(line.into());
                }
                self.coords.clear();
                self.finish_feature();
            }
            "trkseg" => {
                if self.coords.len() >= 2 {
                    self.segments
                        .push(LineString::new(std::mem::take(&mut self.coords)));
                }
                self.coords.clear();
            }
            "trk" => {
                let mut segments = std::mem::take(&mut self.segments);
                match segments.len() {
                    0 => {}
                    1 => {
                        if let Some(line) = segments.pop() {
                            self.push_geometry(line.into());
                        }
                    }
                    _ => self.push_geometry(MultiLineString::new(segments).into()),
                }
                self.finish_feature();
            }
            _ => {}
        }
    }

    fn push_gpx_point(&mut self, e: &BytesStart) {
        let lat = attribute(e, "lat").and_then(|v| v.trim().parse::<f64>().ok());
        let lon = attribute(e, "lon").and_then(|v| v.trim().parse::<f64>().ok());
        match (lat, lon) {
            (Some(lat), Some(lon)) if lat.is_finite() && lon.is_finite() => {
                self.coords.push(Coord { x: lon, y: lat });
            }
            _ => log::debug!("skipping GPX point without usable lat/lon"),
        }
    }

    fn push_geometry(&mut self, geometry: Geometry<f64>) {
        if let Some(draft) = self.current.as_mut() {
            draft.geometries.push(geometry);
        }
    }

    fn finish_feature(&mut self) {
        let Some(mut draft) = self.current.take() else {
            return;
        };
        let geometry = match draft.geometries.len() {
            0 => {
                log::debug!("dropping feature {:?} without geometry", draft.name);
                return;
            }
            1 => draft.geometries.remove(0),
            _ => Geometry::GeometryCollection(draft.geometries.into_iter().collect()),
        };
        self.features.push(ParsedFeature {
            id: draft.id,
            name: draft.name,
            description: draft.description,
            geometry,
        });
    }

    fn finish(self) -> Result<ParsedDocument, XmlParseError> {
        if let Some(open) = self.stack.last() {
            return Err(XmlParseError::Malformed(format!(
                "unexpected end of document inside <{}>",
                open
            )));
        }
        let format = match (self.format(), self.root) {
            (Some(format), _) => format,
            (None, Some(root)) => return Err(XmlParseError::UnsupportedRoot(root)),
            (None, None) => return Err(XmlParseError::Malformed("no root element".into())),
        };
        Ok(ParsedDocument {
            format,
            name: self.document_name,
            features: self.features,
        })
    }
}

fn attribute(e: &BytesStart, key: &str) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.local_name().as_ref() == key.as_bytes())
        .and_then(|a| a.unescape_value().ok())
        .map(|v| v.into_owned())
}

/// `lon,lat[,alt]` tuples separated by whitespace
fn parse_kml_coordinates(text: &str) -> Vec<Coord<f64>> {
    text.split_whitespace()
        .filter_map(|tuple| {
            let mut parts = tuple.split(',');
            let x = parts.next()?.parse::<f64>().ok()?;
            let y = parts.next()?.parse::<f64>().ok()?;
            (x.is_finite() && y.is_finite()).then_some(Coord { x, y })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const KML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<kml xmlns="http://www.opengis.net/kml/2.2">
  <Document>
    <name>Drawing</name>
    <Placemark id="marker_1">
      <name>Bern</name>
      <description><![CDATA[<p>Federal city</p>]]></description>
      <Point><coordinates>7.4386,46.9511,0</coordinates></Point>
    </Placemark>
    <Placemark id="line_1">
      <LineString><coordinates>7.0,46.5 7.5,46.8 8.0,47.0</coordinates></LineString>
    </Placemark>
    <Placemark id="polygon_1">
      <Polygon>
        <outerBoundaryIs><LinearRing><coordinates>
          6.5,46.2 6.9,46.2 6.9,46.6 6.5,46.2
        </coordinates></LinearRing></outerBoundaryIs>
      </Polygon>
    </Placemark>
  </Document>
</kml>"#;

    const GPX: &str = r#"<?xml version="1.0"?>
<gpx version="1.1" creator="test">
  <metadata><name>Hike</name></metadata>
  <wpt lat="46.5" lon="7.9"><name>Top</name></wpt>
  <trk>
    <name>Track</name>
    <trkseg>
      <trkpt lat="46.50" lon="7.90"/>
      <trkpt lat="46.52" lon="7.95"/>
    </trkseg>
  </trk>
</gpx>"#;

    #[test]
    fn test_parse_kml_placemarks() {
        let document = parse_document(KML.as_bytes()).unwrap();

        assert_eq!(document.format, FileFormat::Kml);
        assert_eq!(document.name.as_deref(), Some("Drawing"));
        assert_eq!(document.features.len(), 3);

        let bern = &document.features[0];
        assert_eq!(bern.id.as_deref(), Some("marker_1"));
        assert_eq!(bern.name.as_deref(), Some("Bern"));
        assert_eq!(bern.description.as_deref(), Some("<p>Federal city</p>"));
        assert!(matches!(bern.geometry, Geometry::Point(_)));
        assert!(matches!(document.features[1].geometry, Geometry::LineString(_)));
        assert!(matches!(document.features[2].geometry, Geometry::Polygon(_)));
    }

    #[test]
    fn test_kml_extent() {
        let extent = parse_document(KML.as_bytes()).unwrap().extent().unwrap();
        assert_eq!(extent.min.x, 6.5);
        assert_eq!(extent.min.y, 46.2);
        assert_eq!(extent.max.x, 8.0);
        assert_eq!(extent.max.y, 47.0);
    }

    #[test]
    fn test_parse_gpx() {
        let document = parse_document(GPX.as_bytes()).unwrap();

        assert_eq!(document.format, FileFormat::Gpx);
        assert_eq!(document.name.as_deref(), Some("Hike"));
        assert_eq!(document.features.len(), 2);
        assert!(matches!(document.features[0].geometry, Geometry::Point(_)));
        assert_eq!(document.features[1].name.as_deref(), Some("Track"));
        assert!(matches!(document.features[1].geometry, Geometry::LineString(_)));
    }

    #[test]
    fn test_empty_kml_has_no_features() {
        let document =
            parse_document(br#"<kml xmlns="http://www.opengis.net/kml/2.2"><Document/></kml>"#)
                .unwrap();
        assert!(document.features.is_empty());
        assert_eq!(document.extent(), None);
    }

    #[test]
    fn test_malformed_and_unsupported() {
        assert!(matches!(
            parse_document(b"<kml><Document></kml>"),
            Err(XmlParseError::Malformed(_))
        ));
        assert!(matches!(
            parse_document(b"<kml><Document>"),
            Err(XmlParseError::Malformed(_))
        ));
        assert_eq!(
            parse_document(b"<html><body/></html>"),
            Err(XmlParseError::UnsupportedRoot("html".into()))
        );
        assert_eq!(parse_document(b"{\"type\":\"Feature\"}"), Err(XmlParseError::NotXml));
    }

    #[test]
    fn test_format_guessing() {
        assert_eq!(FileFormat::from_extension("Trip.GPX"), Some(FileFormat::Gpx));
        assert_eq!(
            FileFormat::from_extension("https://a.ch/files/x.kml?v=2"),
            Some(FileFormat::Kml)
        );
        assert_eq!(FileFormat::from_extension("notes.txt"), None);
        assert_eq!(
            FileFormat::from_media_type("application/gpx+xml"),
            Some(FileFormat::Gpx)
        );
    }
}
