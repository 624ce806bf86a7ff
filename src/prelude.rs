//! Prelude module for common mapstate types and traits
//!
//! This module re-exports the most commonly used types, traits, and functions
//! for easy importing with `use mapstate::prelude::*;`

pub use crate::core::{
    bounds::{Bounds, Containment},
    config::{Environment, ImportConfig, SyncConfig, UrlSyncConfig},
    geo::{CoordinateSystem, LatLng, Point, SwissReprojector},
    position::{Camera, Position},
};

pub use crate::layers::{
    base::{ImportedLayerDescriptor, LayerError, LayerRef},
    catalog::{resolve_layers, InMemoryCatalog},
    codec::{decode_layers, encode_layers},
    manager::LayerList,
};

pub use crate::features::{
    mode::FeatureInfoMode,
    selection::{IdentifiedFeature, KeyModifiers},
};

pub use crate::import::{
    manager::{ImportManager, ImportOutcome},
    validate::{ImportSource, ImportValidator, ValidationOutcome, ValidationResult, ValidationStatus},
};

pub use crate::permalink::{
    legacy::LegacyTranslation, params::QueryParams, sync::UrlSynchronizer, PermalinkUrl,
};

pub use crate::store::{
    actions::Command, controller::MapController, events::StateChange, state::AppState,
};

pub use crate::traits::{KmlMetadataProvider, LayerCatalog, Reprojector, ResourceFetcher};

pub use crate::{Error as MapStateError, Result};

pub use std::{
    sync::Arc,
    time::{Duration, Instant},
};

pub use fxhash::{FxHashMap as HashMap, FxHashSet as HashSet};
