use crate::layers::base::{LayerError, LayerRef};
use crate::layers::manager::LayerList;
use crate::prelude::HashMap;
use crate::traits::LayerCatalog;
use crate::{MapStateError, Result};
use serde::{Deserialize, Serialize};

/// Catalog entry as found in the layers configuration document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogEntry {
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub opacity: Option<f64>,
    #[serde(default)]
    pub time_enabled: bool,
    #[serde(default, rename = "type")]
    pub layer_type: Option<String>,
    #[serde(default)]
    pub background: bool,
}

/// Layer catalog held in memory, built from the layers configuration JSON
#[derive(Debug, Clone, Default)]
pub struct InMemoryCatalog {
    entries: HashMap<String, CatalogEntry>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Catalog that only knows ids, with default settings
    pub fn from_ids<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut catalog = Self::new();
        for id in ids {
            let id = id.into();
            catalog.insert(
                id.clone(),
                CatalogEntry {
                    label: id,
                    opacity: None,
                    time_enabled: false,
                    layer_type: None,
                    background: false,
                },
            );
        }
        catalog
    }

    /// Parses the `{ "<layer id>": { "label": ..., ... }, ... }` document
    pub fn from_json(json: &str) -> Result<Self> {
        let entries: HashMap<String, CatalogEntry> = serde_json::from_str(json)
            .map_err(|e| MapStateError::ParseError(format!("invalid layers config: {}", e)))?;
        log::info!("layer catalog loaded with {} entries", entries.len());
        Ok(Self { entries })
    }

    /// Downloads and parses the layers configuration
    #[cfg(feature = "http")]
    pub async fn load(url: &str) -> Result<Self> {
        log::debug!("loading layer catalog from {}", url);
        let body = crate::import::fetch::HTTP_CLIENT
            .get(url)
            .send()
            .await
            .map_err(MapStateError::Network)?
            .error_for_status()
            .map_err(MapStateError::Network)?
            .text()
            .await
            .map_err(MapStateError::Network)?;
        Self::from_json(&body)
    }

    pub fn insert(&mut self, id: String, entry: CatalogEntry) {
        self.entries.insert(id, entry);
    }

    pub fn get(&self, id: &str) -> Option<&CatalogEntry> {
        self.entries.get(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl LayerCatalog for InMemoryCatalog {
    fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    fn is_time_enabled(&self, id: &str) -> bool {
        self.entries.get(id).map(|e| e.time_enabled).unwrap_or(false)
    }

    fn default_opacity(&self, id: &str) -> Option<f64> {
        self.entries.get(id).and_then(|e| e.opacity)
    }
}

/// Flags internal layers the catalog does not know.
///
/// Unknown layers stay in the list so the menu can show them as broken;
/// external layers are left untouched. Returns how many layers were flagged.
pub fn resolve_layers(layers: &mut LayerList, catalog: &dyn LayerCatalog) -> usize {
    let mut flagged = 0;
    for layer in layers.iter_mut() {
        if layer.is_external() {
            continue;
        }
        if catalog.contains(&layer.id) {
            if matches!(layer.error, Some(LayerError::UnknownLayer(_))) {
                layer.error = None;
            }
            drop_unsupported_timestamp(layer, catalog);
        } else {
            log::warn!("layer {} is not in the catalog", layer.id);
            layer.error = Some(LayerError::UnknownLayer(layer.id.clone()));
            flagged += 1;
        }
    }
    flagged
}

fn drop_unsupported_timestamp(layer: &mut LayerRef, catalog: &dyn LayerCatalog) {
    if layer.timestamp.is_some() && !catalog.is_time_enabled(&layer.id) {
        log::debug!("layer {} is not time enabled, dropping timestamp", layer.id);
        layer.timestamp = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layers::base::ImportedLayerDescriptor;

    const LAYERS_CONFIG: &str = r#"{
        "ch.swisstopo.zeitreihen": { "label": "Journey through time", "timeEnabled": true, "opacity": 1.0, "type": "wmts" },
        "ch.bav.haltestellen-oev": { "label": "Public transport stops", "type": "geojson", "opacity": 0.8 },
        "ch.swisstopo.pixelkarte-farbe": { "label": "Colour map", "background": true }
    }"#;

    #[test]
    fn test_parse_layers_config() {
        let catalog = InMemoryCatalog::from_json(LAYERS_CONFIG).unwrap();

        assert_eq!(catalog.len(), 3);
        assert!(catalog.is_time_enabled("ch.swisstopo.zeitreihen"));
        assert_eq!(catalog.default_opacity("ch.bav.haltestellen-oev"), Some(0.8));
        assert!(catalog.get("ch.swisstopo.pixelkarte-farbe").unwrap().background);
    }

    #[test]
    fn test_unknown_layer_is_kept_with_error() {
        let catalog = InMemoryCatalog::from_ids(["known"]);
        let mut layers: LayerList = vec![
            LayerRef::catalog("known"),
            LayerRef::catalog("unknown"),
            LayerRef::new(ImportedLayerDescriptor::kml("https://a.ch/x.kml")),
        ]
        .into();

        let flagged = resolve_layers(&mut layers, &catalog);

        assert_eq!(flagged, 1);
        assert_eq!(layers.len(), 3);
        assert_eq!(
            layers.get(1).unwrap().error,
            Some(LayerError::UnknownLayer("unknown".into()))
        );
        assert!(layers.get(0).unwrap().error.is_none());
        assert!(layers.get(2).unwrap().error.is_none());
    }

    #[test]
    fn test_timestamp_dropped_for_static_layers() {
        let catalog = InMemoryCatalog::from_json(LAYERS_CONFIG).unwrap();
        let mut layers: LayerList = vec![
            LayerRef::catalog("ch.swisstopo.zeitreihen").with_timestamp("18641231"),
            LayerRef::catalog("ch.bav.haltestellen-oev").with_timestamp("2020"),
        ]
        .into();

        resolve_layers(&mut layers, &catalog);

        assert_eq!(layers.get(0).unwrap().timestamp.as_deref(), Some("18641231"));
        assert_eq!(layers.get(1).unwrap().timestamp, None);
    }

    #[test]
    fn test_invalid_config() {
        assert!(InMemoryCatalog::from_json("[1, 2]").is_err());
    }
}
