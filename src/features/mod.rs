pub mod mode;
pub mod selection;

pub use mode::{effective_mode, FeatureInfoMode};
pub use selection::{IdentifiedFeature, KeyModifiers};
