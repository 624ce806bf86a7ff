use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How feature information is displayed once something is selected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FeatureInfoMode {
    None,
    Tooltip,
    #[default]
    Default,
    BottomPanel,
}

impl FeatureInfoMode {
    /// Value used in the `featureInfo` URL parameter
    pub fn as_param(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Tooltip => "tooltip",
            Self::Default => "default",
            Self::BottomPanel => "bottomPanel",
        }
    }

    /// Rewrites floating modes to the bottom panel on phone-sized viewports
    pub fn coerce_for_viewport(self, viewport_width: u32, phone_breakpoint: u32) -> Self {
        match self {
            Self::Tooltip | Self::Default if viewport_width < phone_breakpoint => Self::BottomPanel,
            other => other,
        }
    }
}

impl fmt::Display for FeatureInfoMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_param())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown feature info mode {0:?}")]
pub struct UnknownFeatureInfoMode(pub String);

impl FromStr for FeatureInfoMode {
    type Err = UnknownFeatureInfoMode;

    /// Case-insensitive
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "none" => Ok(Self::None),
            "tooltip" => Ok(Self::Tooltip),
            "default" => Ok(Self::Default),
            "bottompanel" => Ok(Self::BottomPanel),
            _ => Err(UnknownFeatureInfoMode(value.to_string())),
        }
    }
}

/// Mode actually in effect: nothing is shown without a selection
pub fn effective_mode(
    preference: FeatureInfoMode,
    has_selection: bool,
    viewport_width: u32,
    phone_breakpoint: u32,
) -> FeatureInfoMode {
    if !has_selection {
        return FeatureInfoMode::None;
    }
    preference.coerce_for_viewport(viewport_width, phone_breakpoint)
}
