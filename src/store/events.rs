use crate::core::geo::Point;
use crate::features::mode::FeatureInfoMode;
use serde::{Deserialize, Serialize};

/// Change notifications published by the store after each mutation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StateChange {
    /// Center or zoom changed
    ViewChanged { center: Point, zoom: f64 },
    /// Map rotated (radians)
    RotationChanged { rotation: f64 },
    /// 3D camera moved, entered or left
    CameraChanged,
    /// Layer was added at `index`
    LayerAdded { index: usize, layer_id: String },
    /// Layer was removed from `index`
    LayerRemoved { index: usize, layer_id: String },
    /// Layer moved in the stack
    LayerMoved { from: usize, to: usize },
    /// Opacity, visibility or timestamp of one layer changed
    LayerUpdated { index: usize },
    /// The whole layer list was replaced
    LayersReplaced,
    /// Selected features changed on at least one layer
    SelectionChanged,
    /// Displayed feature-info mode changed
    FeatureInfoModeChanged { mode: FeatureInfoMode },
    LangChanged { lang: String },
    TopicChanged { topic: String },
    BackgroundChanged { layer_id: String },
    CatalogNodesChanged,
    CrosshairChanged,
    ViewportResized { width: u32 },
}

impl StateChange {
    /// Short name used in logs
    pub fn event_type(&self) -> &'static str {
        match self {
            StateChange::ViewChanged { .. } => "viewchanged",
            StateChange::RotationChanged { .. } => "rotationchanged",
            StateChange::CameraChanged => "camerachanged",
            StateChange::LayerAdded { .. } => "layeradd",
            StateChange::LayerRemoved { .. } => "layerremove",
            StateChange::LayerMoved { .. } => "layermove",
            StateChange::LayerUpdated { .. } => "layerupdate",
            StateChange::LayersReplaced => "layersreplaced",
            StateChange::SelectionChanged => "selectionchanged",
            StateChange::FeatureInfoModeChanged { .. } => "featureinfochanged",
            StateChange::LangChanged { .. } => "langchanged",
            StateChange::TopicChanged { .. } => "topicchanged",
            StateChange::BackgroundChanged { .. } => "backgroundchanged",
            StateChange::CatalogNodesChanged => "catalognodeschanged",
            StateChange::CrosshairChanged => "crosshairchanged",
            StateChange::ViewportResized { .. } => "viewportresized",
        }
    }
}
