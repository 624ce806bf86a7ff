use crate::core::config::StateDefaults;
use crate::core::geo::Point;
use crate::core::position::Position;
use crate::features::mode::FeatureInfoMode;
use crate::layers::manager::LayerList;
use serde::{Deserialize, Serialize};

/// Everything the URL describes, plus the viewport facts needed to derive it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppState {
    pub position: Position,
    /// Bottom layer first
    pub layers: LayerList,
    pub background: String,
    pub topic: String,
    pub lang: String,
    /// Requested mode; what is shown also depends on selection and viewport
    pub feature_info: FeatureInfoMode,
    pub viewport_width: u32,
    pub catalog_nodes: Vec<String>,
    pub crosshair: Option<String>,
    /// Search typed into a legacy link, run once and never written back
    pub search_query: Option<String>,
}

impl AppState {
    pub fn from_defaults(defaults: &StateDefaults) -> Self {
        Self {
            position: Position::new(
                Point::new(defaults.center.0, defaults.center.1),
                defaults.zoom,
            ),
            layers: LayerList::new(),
            background: defaults.background.clone(),
            topic: defaults.topic.clone(),
            lang: defaults.lang.clone(),
            feature_info: FeatureInfoMode::default(),
            viewport_width: u32::MAX,
            catalog_nodes: Vec::new(),
            crosshair: None,
            search_query: None,
        }
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::from_defaults(&StateDefaults::default())
    }
}
