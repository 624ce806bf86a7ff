use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};

/// Where a layer comes from, with what is needed to rebuild it
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ImportedLayerDescriptor {
    InternalCatalogLayer {
        id: String,
    },
    ExternalWms {
        base_url: String,
        layer_name: String,
        version: Option<String>,
    },
    ExternalWmts {
        capabilities_url: String,
        layer_id: String,
    },
    ExternalKml {
        url: String,
        /// Edit token of a saved drawing; kept in memory only
        #[serde(skip_serializing, default)]
        admin_id: Option<String>,
    },
    ExternalGpx {
        url: String,
    },
}

impl ImportedLayerDescriptor {
    pub fn catalog(id: impl Into<String>) -> Self {
        Self::InternalCatalogLayer { id: id.into() }
    }

    pub fn kml(url: impl Into<String>) -> Self {
        Self::ExternalKml {
            url: url.into(),
            admin_id: None,
        }
    }

    pub fn gpx(url: impl Into<String>) -> Self {
        Self::ExternalGpx { url: url.into() }
    }

    pub fn is_external(&self) -> bool {
        !matches!(self, Self::InternalCatalogLayer { .. })
    }

    /// Key used as the layer id; external layers get a `TYPE|...` composite
    pub fn composite_id(&self) -> String {
        match self {
            Self::InternalCatalogLayer { id } => id.clone(),
            Self::ExternalWms {
                base_url,
                layer_name,
                ..
            } => format!("WMS|{}|{}", base_url, layer_name),
            Self::ExternalWmts {
                capabilities_url,
                layer_id,
            } => format!("WMTS|{}|{}", capabilities_url, layer_id),
            Self::ExternalKml { url, .. } => format!("KML|{}", url),
            Self::ExternalGpx { url } => format!("GPX|{}", url),
        }
    }

    /// Remote file behind a KML/GPX layer
    pub fn file_url(&self) -> Option<&str> {
        match self {
            Self::ExternalKml { url, .. } | Self::ExternalGpx { url } => Some(url),
            _ => None,
        }
    }

    pub fn admin_id(&self) -> Option<&str> {
        match self {
            Self::ExternalKml { admin_id, .. } => admin_id.as_deref(),
            _ => None,
        }
    }
}

/// Why a layer is shown with an error badge
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
pub enum LayerError {
    #[error("layer {0} is not part of the catalog")]
    UnknownLayer(String),
    #[error("layer source could not be reached: {0}")]
    Network(String),
    #[error("layer content is invalid: {0}")]
    InvalidContent(String),
}

/// One entry of the active layer list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerRef {
    pub id: String,
    pub descriptor: ImportedLayerDescriptor,
    pub visible: bool,
    opacity: f64,
    pub timestamp: Option<String>,
    pub custom_attributes: IndexMap<String, String>,
    pub selected_feature_ids: IndexSet<String>,
    /// Set by catalog resolution or imports; never written to the URL
    pub error: Option<LayerError>,
}

impl LayerRef {
    pub fn new(descriptor: ImportedLayerDescriptor) -> Self {
        Self {
            id: descriptor.composite_id(),
            descriptor,
            visible: true,
            opacity: 1.0,
            timestamp: None,
            custom_attributes: IndexMap::new(),
            selected_feature_ids: IndexSet::new(),
            error: None,
        }
    }

    /// Shorthand for a catalog layer
    pub fn catalog(id: impl Into<String>) -> Self {
        Self::new(ImportedLayerDescriptor::catalog(id))
    }

    pub fn with_opacity(mut self, opacity: f64) -> Self {
        self.set_opacity(opacity);
        self
    }

    pub fn with_visibility(mut self, visible: bool) -> Self {
        self.visible = visible;
        self
    }

    pub fn with_timestamp(mut self, timestamp: impl Into<String>) -> Self {
        self.timestamp = Some(timestamp.into());
        self
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.custom_attributes.insert(key.into(), value.into());
        self
    }

    pub fn with_features<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.selected_feature_ids = ids.into_iter().map(Into::into).collect();
        self
    }

    pub fn opacity(&self) -> f64 {
        self.opacity
    }

    /// Sets the opacity, clamped to [0, 1]; NaN resets to fully opaque
    pub fn set_opacity(&mut self, opacity: f64) {
        self.opacity = clamp_opacity(opacity);
    }

    pub fn has_selection(&self) -> bool {
        !self.selected_feature_ids.is_empty()
    }

    pub fn is_external(&self) -> bool {
        self.descriptor.is_external()
    }
}

pub fn clamp_opacity(opacity: f64) -> f64 {
    if opacity.is_nan() {
        1.0
    } else {
        opacity.clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opacity_is_clamped() {
        assert_eq!(LayerRef::catalog("a").with_opacity(1.7).opacity(), 1.0);
        assert_eq!(LayerRef::catalog("a").with_opacity(-0.2).opacity(), 0.0);
        assert_eq!(LayerRef::catalog("a").with_opacity(f64::NAN).opacity(), 1.0);
        assert_eq!(LayerRef::catalog("a").with_opacity(0.35).opacity(), 0.35);
    }

    #[test]
    fn test_composite_ids() {
        let wms = ImportedLayerDescriptor::ExternalWms {
            base_url: "https://wms.geo.admin.ch/".into(),
            layer_name: "ch.bav.haltestellen-oev".into(),
            version: Some("1.3.0".into()),
        };
        assert_eq!(
            wms.composite_id(),
            "WMS|https://wms.geo.admin.ch/|ch.bav.haltestellen-oev"
        );
        assert_eq!(
            LayerRef::new(ImportedLayerDescriptor::kml("https://a.ch/x.kml")).id,
            "KML|https://a.ch/x.kml"
        );
    }

    #[test]
    fn test_admin_id_accessor() {
        let descriptor = ImportedLayerDescriptor::ExternalKml {
            url: "https://a.ch/x.kml".into(),
            admin_id: Some("secret".into()),
        };
        assert_eq!(descriptor.admin_id(), Some("secret"));
        assert_eq!(descriptor.file_url(), Some("https://a.ch/x.kml"));
        assert_eq!(ImportedLayerDescriptor::catalog("a").admin_id(), None);
    }
}
