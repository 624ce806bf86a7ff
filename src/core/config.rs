//! Configuration system for URL synchronization, service endpoints and imports
//!
//! Presets cover the three deployments of the viewer; anything else can be
//! expressed as a custom configuration, typically loaded from a JSON file.

use crate::core::constants::{
    DEFAULT_BACKGROUND, DEFAULT_CENTER, DEFAULT_LANG, DEFAULT_TOPIC, DEFAULT_ZOOM,
    LV95_EXTENT_WGS84, MAX_DESCRIPTION_LENGTH, MAX_IMPORT_SIZE_BYTES, PHONE_BREAKPOINT_PX,
    TRUNCATION_PLACEHOLDER, TRUSTED_IFRAME_HOSTS, URL_DEBOUNCE_MS,
};
use crate::{MapStateError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub enum Environment {
    Production,
    Integration,
    Development,
    Custom(SyncConfig),
}

impl Environment {
    pub fn resolve(&self) -> SyncConfig {
        match self {
            Self::Production => SyncConfig {
                services: ServiceConfig {
                    kml_service_url: "https://service-kml.geo.admin.ch".into(),
                    layers_config_url: "https://api3.geo.admin.ch/rest/services/all/MapServer/layersConfig".into(),
                    http_timeout_ms: 10_000,
                },
                ..SyncConfig::base()
            },
            Self::Integration => SyncConfig {
                services: ServiceConfig {
                    kml_service_url: "https://sys-public.int.bgdi.ch".into(),
                    layers_config_url: "https://sys-api3.int.bgdi.ch/rest/services/all/MapServer/layersConfig".into(),
                    http_timeout_ms: 15_000,
                },
                ..SyncConfig::base()
            },
            Self::Development => SyncConfig {
                services: ServiceConfig {
                    kml_service_url: "https://sys-public.dev.bgdi.ch".into(),
                    layers_config_url: "https://sys-api3.dev.bgdi.ch/rest/services/all/MapServer/layersConfig".into(),
                    http_timeout_ms: 30_000,
                },
                url: UrlSyncConfig {
                    debounce_ms: 0,
                    ..UrlSyncConfig::default()
                },
                ..SyncConfig::base()
            },
            Self::Custom(config) => config.clone(),
        }
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::Production
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub services: ServiceConfig,
    pub url: UrlSyncConfig,
    pub display: DisplayConfig,
    pub import: ImportConfig,
    pub defaults: StateDefaults,
}

impl SyncConfig {
    /// Settings shared by every preset
    fn base() -> Self {
        Self {
            services: ServiceConfig::default(),
            url: UrlSyncConfig::default(),
            display: DisplayConfig::default(),
            import: ImportConfig::default(),
            defaults: StateDefaults::default(),
        }
    }

    /// Loads a configuration from JSON; missing sections fall back to production defaults
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| MapStateError::Config(format!("invalid configuration: {}", e)).into())
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(MapStateError::Io)?;
        let config = Self::from_json_str(&content)?;
        log::debug!("loaded configuration from {}", path.as_ref().display());
        Ok(config)
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Environment::default().resolve()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub kml_service_url: String,
    pub layers_config_url: String,
    pub http_timeout_ms: u64,
}

impl ServiceConfig {
    pub fn http_timeout(&self) -> Duration {
        Duration::from_millis(self.http_timeout_ms)
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            kml_service_url: "https://service-kml.geo.admin.ch".into(),
            layers_config_url: "https://api3.geo.admin.ch/rest/services/all/MapServer/layersConfig"
                .into(),
            http_timeout_ms: 10_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UrlSyncConfig {
    /// Quiet period before store changes reach the URL
    pub debounce_ms: u64,
    /// Route the canonical parameters live under, inside the URL fragment
    pub hash_route: String,
}

impl UrlSyncConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

impl Default for UrlSyncConfig {
    fn default() -> Self {
        Self {
            debounce_ms: URL_DEBOUNCE_MS,
            hash_route: "/map".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    pub phone_breakpoint_px: u32,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            phone_breakpoint_px: PHONE_BREAKPOINT_PX,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportConfig {
    /// Supported area in WGS84 (min lon, min lat, max lon, max lat)
    pub supported_extent_wgs84: [f64; 4],
    pub trusted_iframe_hosts: Vec<String>,
    pub max_description_length: usize,
    pub truncation_placeholder: String,
    pub max_size_bytes: usize,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            supported_extent_wgs84: LV95_EXTENT_WGS84,
            trusted_iframe_hosts: TRUSTED_IFRAME_HOSTS.iter().map(|h| h.to_string()).collect(),
            max_description_length: MAX_DESCRIPTION_LENGTH,
            truncation_placeholder: TRUNCATION_PLACEHOLDER.into(),
            max_size_bytes: MAX_IMPORT_SIZE_BYTES,
        }
    }
}

/// State used when the URL does not say otherwise
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StateDefaults {
    pub lang: String,
    pub topic: String,
    pub background: String,
    pub center: (f64, f64),
    pub zoom: f64,
}

impl Default for StateDefaults {
    fn default() -> Self {
        Self {
            lang: DEFAULT_LANG.into(),
            topic: DEFAULT_TOPIC.into(),
            background: DEFAULT_BACKGROUND.into(),
            center: DEFAULT_CENTER,
            zoom: DEFAULT_ZOOM,
        }
    }
}
