//! # mapstate
//!
//! Application state layer of a Swiss federal web map viewer.
//!
//! The crate owns the viewer state (position, layers, topic, language,
//! feature selection) and keeps it synchronized with the browser URL, both
//! the modern hash-route parameters and the legacy query dialects. It also
//! validates KML/GPX imports before they become layers.

pub mod core;
pub mod features;
pub mod import;
pub mod layers;
pub mod permalink;
pub mod prelude;
pub mod store;
pub mod traits;
pub use crate::core::constants;

// Re-export public API
pub use crate::core::{
    bounds::Bounds,
    config::{Environment, SyncConfig},
    geo::{CoordinateSystem, LatLng, Point, SwissReprojector},
    position::{Camera, Position},
};

pub use layers::{
    base::{ImportedLayerDescriptor, LayerError, LayerRef},
    catalog::InMemoryCatalog,
    codec::{decode_layers, encode_layers},
    manager::LayerList,
};

pub use features::{mode::FeatureInfoMode, selection::IdentifiedFeature};

pub use import::{
    manager::{ImportManager, ImportOutcome},
    validate::{ImportSource, ImportValidator, ValidationOutcome, ValidationResult, ValidationStatus},
};

pub use permalink::{params::QueryParams, sync::UrlSynchronizer, PermalinkUrl};

pub use store::{actions::Command, controller::MapController, events::StateChange, state::AppState};

/// Result type used throughout the library
pub type Result<T> = std::result::Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// Common error types
#[derive(Debug, thiserror::Error)]
pub enum MapStateError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[cfg(feature = "http")]
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("Invalid coordinates: {0}")]
    InvalidCoordinates(String),

    #[error("Layer error: {0}")]
    Layer(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Import error: {0}")]
    Import(String),
}

/// Error type alias for convenience
pub type Error = MapStateError;

/// Initializes `env_logger` from `RUST_LOG`; calling it twice is harmless
#[cfg(feature = "debug")]
pub fn init_logging() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .try_init();
}
