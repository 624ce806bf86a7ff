use crate::core::bounds::{Bounds, Containment};
use crate::core::config::ImportConfig;
use crate::import::fetch::{FetchError, FetchResponse};
use crate::import::parse::{parse_document, FileFormat, ParsedDocument, XmlParseError};
use crate::import::sanitize::Sanitizer;
use crate::layers::base::{ImportedLayerDescriptor, LayerError, LayerRef};
use crate::traits::ResourceFetcher;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Media types accepted without looking at the content
const XML_MEDIA_TYPES: [&str; 5] = [
    "application/vnd.google-earth.kml+xml",
    "application/gpx+xml",
    "application/xml",
    "text/xml",
    "application/octet-stream",
];

/// Something the user wants to add to the map
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportSource {
    Url(String),
    File { name: String, content: Vec<u8> },
}

impl ImportSource {
    pub fn url(url: impl Into<String>) -> Self {
        Self::Url(url.into())
    }

    pub fn file(name: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        Self::File {
            name: name.into(),
            content: content.into(),
        }
    }

    /// URL or file name, used in messages
    pub fn location(&self) -> &str {
        match self {
            Self::Url(url) => url,
            Self::File { name, .. } => name,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ValidationStatus {
    Ok,
    NetworkError,
    InvalidContent,
    OutOfBounds,
    Empty,
    UnsupportedFormat,
}

impl fmt::Display for ValidationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Ok => "ok",
            Self::NetworkError => "networkError",
            Self::InvalidContent => "invalidContent",
            Self::OutOfBounds => "outOfBounds",
            Self::Empty => "empty",
            Self::UnsupportedFormat => "unsupportedFormat",
        };
        f.write_str(label)
    }
}

/// Verdict shown next to the import field or as a layer badge
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub status: ValidationStatus,
    pub detail: Option<String>,
    /// Non-blocking findings, e.g. data partially outside the supported area
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl ValidationResult {
    pub fn ok() -> Self {
        Self {
            status: ValidationStatus::Ok,
            detail: None,
            warnings: Vec::new(),
        }
    }

    pub fn failure(status: ValidationStatus, detail: impl Into<String>) -> Self {
        Self {
            status,
            detail: Some(detail.into()),
            warnings: Vec::new(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == ValidationStatus::Ok
    }

    /// Error badge for a layer that failed validation
    pub fn layer_error(&self) -> Option<LayerError> {
        let detail = self.detail.clone().unwrap_or_else(|| self.status.to_string());
        match self.status {
            ValidationStatus::Ok => None,
            ValidationStatus::NetworkError => Some(LayerError::Network(detail)),
            _ => Some(LayerError::InvalidContent(detail)),
        }
    }
}

/// Result plus, when admitted, the layer to add and the cleaned document
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationOutcome {
    pub result: ValidationResult,
    pub layer: Option<LayerRef>,
    pub document: Option<ParsedDocument>,
}

impl ValidationOutcome {
    fn rejected(result: ValidationResult) -> Self {
        Self {
            result,
            layer: None,
            document: None,
        }
    }
}

/// Checks KML/GPX sources before they become layers
pub struct ImportValidator {
    fetcher: Arc<dyn ResourceFetcher>,
    sanitizer: Sanitizer,
    supported_extent: Bounds,
    max_size_bytes: usize,
}

impl ImportValidator {
    pub fn new(fetcher: Arc<dyn ResourceFetcher>, config: &ImportConfig) -> Self {
        Self {
            fetcher,
            sanitizer: Sanitizer::new(config),
            supported_extent: Bounds::from_array(config.supported_extent_wgs84),
            max_size_bytes: config.max_size_bytes,
        }
    }

    pub async fn validate(&self, source: ImportSource) -> ValidationOutcome {
        match source {
            ImportSource::Url(url) => {
                let response = match self.fetch(&url).await {
                    Ok(response) => response,
                    Err(result) => return ValidationOutcome::rejected(result),
                };
                let location = if response.final_url.is_empty() {
                    url
                } else {
                    response.final_url
                };
                self.validate_content(
                    &location,
                    &response.body,
                    response.content_type.as_deref(),
                )
            }
            ImportSource::File { name, content } => self.validate_content(&name, &content, None),
        }
    }

    /// HEAD then GET; servers refusing HEAD are given the benefit of the doubt
    async fn fetch(&self, url: &str) -> Result<FetchResponse, ValidationResult> {
        match self.fetcher.head(url).await {
            Ok(head) if head.is_success() => {}
            Ok(head) if matches!(head.status, 405 | 501) => {
                log::debug!("{} does not support HEAD ({})", url, head.status);
            }
            Ok(head) => {
                return Err(ValidationResult::failure(
                    ValidationStatus::NetworkError,
                    format!("{} answered HTTP {}", url, head.status),
                ))
            }
            Err(e) => return Err(fetch_failure(e)),
        }

        let response = self.fetcher.get(url).await.map_err(fetch_failure)?;
        if !response.is_success() {
            return Err(ValidationResult::failure(
                ValidationStatus::NetworkError,
                format!("{} answered HTTP {}", url, response.status),
            ));
        }
        Ok(response)
    }

    /// Validates content that is already in memory
    pub fn validate_content(
        &self,
        location: &str,
        content: &[u8],
        content_type: Option<&str>,
    ) -> ValidationOutcome {
        if content.len() > self.max_size_bytes {
            return ValidationOutcome::rejected(ValidationResult::failure(
                ValidationStatus::InvalidContent,
                format!("{} exceeds {} bytes", location, self.max_size_bytes),
            ));
        }

        let media_type = content_type.and_then(|ct| {
            ct.split(';')
                .next()
                .map(|t| t.trim().to_ascii_lowercase())
        });
        let hinted = match media_type.as_deref() {
            Some(t) if XML_MEDIA_TYPES.contains(&t) => FileFormat::from_media_type(t),
            Some(t) => {
                log::debug!("{} served as {}, sniffing content", location, t);
                None
            }
            None => None,
        }
        .or_else(|| FileFormat::from_extension(location));

        let mut document = match parse_document(content) {
            Ok(document) => document,
            Err(XmlParseError::Malformed(reason)) => {
                log::warn!("{} is not well-formed: {}", location, reason);
                return ValidationOutcome::rejected(ValidationResult::failure(
                    ValidationStatus::InvalidContent,
                    reason,
                ));
            }
            Err(e) => {
                return ValidationOutcome::rejected(ValidationResult::failure(
                    ValidationStatus::UnsupportedFormat,
                    e.to_string(),
                ))
            }
        };

        if let Some(hinted) = hinted.filter(|h| *h != document.format) {
            log::debug!(
                "{} looked like {:?} but contains {:?}",
                location,
                hinted,
                document.format
            );
        }

        if document.features.is_empty() {
            return ValidationOutcome::rejected(ValidationResult::failure(
                ValidationStatus::Empty,
                format!("{} contains no features", location),
            ));
        }

        let mut result = ValidationResult::ok();
        if let Some(extent) = document.extent() {
            match self.supported_extent.classify(&extent) {
                Containment::Inside => {}
                Containment::Partial => {
                    result
                        .warnings
                        .push("some features lie outside the supported area".into());
                }
                Containment::Outside => {
                    return ValidationOutcome::rejected(ValidationResult::failure(
                        ValidationStatus::OutOfBounds,
                        format!("{} lies outside the supported area", location),
                    ));
                }
            }
        }

        let mut sanitized = 0;
        for feature in document.features.iter_mut() {
            if let Some(description) = feature.description.as_deref() {
                let clean = self.sanitizer.sanitize(description);
                if clean.modified || clean.truncated {
                    sanitized += 1;
                }
                feature.description = Some(clean.html);
            }
        }
        if sanitized > 0 {
            result
                .warnings
                .push(format!("{} feature descriptions were sanitized", sanitized));
        }

        let descriptor = match document.format {
            FileFormat::Kml => ImportedLayerDescriptor::kml(location),
            FileFormat::Gpx => ImportedLayerDescriptor::gpx(location),
        };
        log::info!(
            "{} admitted with {} features",
            location,
            document.features.len()
        );

        ValidationOutcome {
            result,
            layer: Some(LayerRef::new(descriptor)),
            document: Some(document),
        }
    }
}

fn fetch_failure(error: FetchError) -> ValidationResult {
    let status = match error {
        FetchError::TooLarge { .. } => ValidationStatus::InvalidContent,
        FetchError::Transport { .. } | FetchError::Timeout(_) => ValidationStatus::NetworkError,
    };
    log::warn!("import fetch failed: {}", error);
    ValidationResult::failure(status, error.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn validator() -> ImportValidator {
        struct Offline;

        #[async_trait::async_trait]
        impl ResourceFetcher for Offline {
            async fn head(&self, url: &str) -> Result<FetchResponse, FetchError> {
                Err(FetchError::Timeout(url.into()))
            }
            async fn get(&self, url: &str) -> Result<FetchResponse, FetchError> {
                Err(FetchError::Timeout(url.into()))
            }
        }

        ImportValidator::new(Arc::new(Offline), &ImportConfig::default())
    }

    fn kml_with(coordinates: &str, description: &str) -> String {
        format!(
            r#"<kml><Document><Placemark><description>{}</description><Point><coordinates>{}</coordinates></Point></Placemark></Document></kml>"#,
            description, coordinates
        )
    }

    #[test]
    fn test_point_in_switzerland_is_admitted() {
        let outcome =
            validator().validate_content("bern.kml", kml_with("7.44,46.95", "").as_bytes(), None);

        assert!(outcome.result.is_ok());
        assert!(outcome.result.warnings.is_empty());
        let layer = outcome.layer.unwrap();
        assert_eq!(layer.id, "KML|bern.kml");
    }

    #[test]
    fn test_out_of_bounds() {
        let outcome =
            validator().validate_content("paris.kml", kml_with("2.35,48.85", "").as_bytes(), None);
        assert_eq!(outcome.result.status, ValidationStatus::OutOfBounds);
        assert!(outcome.layer.is_none());
    }

    #[test]
    fn test_partially_outside_is_a_warning() {
        let kml = r#"<kml><Placemark><LineString><coordinates>7.0,46.5 2.35,48.85</coordinates></LineString></Placemark></kml>"#;
        let outcome = validator().validate_content("x.kml", kml.as_bytes(), None);

        assert!(outcome.result.is_ok());
        assert_eq!(outcome.result.warnings.len(), 1);
    }

    #[test]
    fn test_descriptions_are_sanitized() {
        let kml = kml_with("7.44,46.95", "&lt;b&gt;hi&lt;/b&gt;&lt;script&gt;x()&lt;/script&gt;");
        let outcome = validator().validate_content("x.kml", kml.as_bytes(), None);

        let document = outcome.document.unwrap();
        assert_eq!(document.features[0].description.as_deref(), Some("<b>hi</b>"));
        assert_eq!(outcome.result.warnings.len(), 1);
    }

    #[test]
    fn test_failure_statuses() {
        let v = validator();
        assert_eq!(
            v.validate_content("x.kml", b"<kml><Placemark>", None).result.status,
            ValidationStatus::InvalidContent
        );
        assert_eq!(
            v.validate_content("x.json", b"{}", Some("application/json")).result.status,
            ValidationStatus::UnsupportedFormat
        );
        assert_eq!(
            v.validate_content("x.kml", b"<kml><Document/></kml>", None).result.status,
            ValidationStatus::Empty
        );
    }

    #[test]
    fn test_layer_error_badge() {
        let network = ValidationResult::failure(ValidationStatus::NetworkError, "down");
        assert_eq!(network.layer_error(), Some(LayerError::Network("down".into())));
        assert_eq!(ValidationResult::ok().layer_error(), None);
    }
}
