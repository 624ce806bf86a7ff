use crate::core::geo::Point;
use crate::core::position::Camera;
use crate::features::mode::FeatureInfoMode;
use crate::features::selection::{IdentifiedFeature, KeyModifiers};
use crate::layers::base::LayerRef;
use crate::layers::manager::LayerList;
use serde::{Deserialize, Serialize};

/// Mutations accepted by [`MapController::dispatch`](crate::store::controller::MapController::dispatch).
///
/// Layer indices are render indices (0 = bottom).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Command {
    SetCenter(Point),
    SetZoom(f64),
    SetView { center: Point, zoom: f64 },
    SetRotation(f64),
    SetCamera(Option<Camera>),

    AddLayer(LayerRef),
    RemoveLayer(usize),
    MoveLayer { from: usize, to: usize },
    DuplicateLayer(usize),
    SetLayerOpacity { index: usize, opacity: f64 },
    SetLayerVisibility { index: usize, visible: bool },
    SetLayerTimestamp { index: usize, timestamp: Option<String> },
    ReplaceLayers(LayerList),

    /// Result of a map click
    Identify {
        features: Vec<IdentifiedFeature>,
        modifiers: KeyModifiers,
    },
    /// Feature panel closed
    ClearSelection,
    /// Drop selected ids a layer no longer serves
    PruneSelection { index: usize, existing_ids: Vec<String> },
    SetFeatureInfoMode(FeatureInfoMode),
    SetViewportWidth(u32),

    SetLang(String),
    SetTopic(String),
    SetBackground(String),
    SetCatalogNodes(Vec<String>),
    SetCrosshair(Option<String>),
    /// The initial search has been run
    ClearSearchQuery,
}
