pub mod actions;
pub mod controller;
pub mod events;
pub mod state;

pub use actions::Command;
pub use controller::MapController;
pub use events::StateChange;
pub use state::AppState;
