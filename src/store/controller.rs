use crate::core::config::SyncConfig;
use crate::core::geo::SwissReprojector;
use crate::core::position::Position;
use crate::features::mode::{effective_mode, FeatureInfoMode};
use crate::features::selection::{self, IdentifiedFeature};
use crate::import::manager::{ImportManager, ImportOutcome};
use crate::import::validate::ImportSource;
use crate::layers::base::{ImportedLayerDescriptor, LayerRef};
use crate::layers::catalog::resolve_layers;
use crate::layers::manager::LayerList;
use crate::permalink::legacy::translate;
use crate::permalink::params::{PermalinkState, QueryParams};
use crate::permalink::PermalinkUrl;
use crate::store::actions::Command;
use crate::store::events::StateChange;
use crate::store::state::AppState;
use crate::traits::{KmlMetadataProvider, LayerCatalog, Reprojector};
use crate::Result;
use crossbeam_channel::{unbounded, Receiver, Sender};
use std::sync::Arc;

/// Single owner of the application state.
///
/// All mutations go through [`MapController::dispatch`]; every accepted
/// mutation is published to the subscribers as [`StateChange`] events. The
/// URL is derived from the state on demand and never stored.
pub struct MapController {
    state: AppState,
    config: SyncConfig,
    catalog: Option<Arc<dyn LayerCatalog>>,
    reprojector: Arc<dyn Reprojector>,
    subscribers: Vec<Sender<StateChange>>,
    /// Query keys of the last applied URL this crate does not interpret
    retained_query: QueryParams,
}

impl MapController {
    pub fn new(config: SyncConfig) -> Self {
        Self {
            state: AppState::from_defaults(&config.defaults),
            config,
            catalog: None,
            reprojector: Arc::new(SwissReprojector::new()),
            subscribers: Vec::new(),
            retained_query: QueryParams::new(),
        }
    }

    /// Unknown catalog layers get flagged as they arrive
    pub fn with_catalog(mut self, catalog: Arc<dyn LayerCatalog>) -> Self {
        self.catalog = Some(catalog);
        self
    }

    pub fn with_reprojector(mut self, reprojector: Arc<dyn Reprojector>) -> Self {
        self.reprojector = reprojector;
        self
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn position(&self) -> &Position {
        &self.state.position
    }

    pub fn active_layers(&self) -> &LayerList {
        &self.state.layers
    }

    pub fn visible_layers(&self) -> Vec<&LayerRef> {
        self.state.layers.visible_layers()
    }

    /// Top-most layer first
    pub fn menu_layers(&self) -> Vec<&LayerRef> {
        self.state.layers.menu_order().collect()
    }

    pub fn selected_features(&self) -> Vec<IdentifiedFeature> {
        selection::selected_features(&self.state.layers)
    }

    /// Mode actually shown, given the selection and the viewport width
    pub fn feature_info_mode(&self) -> FeatureInfoMode {
        effective_mode(
            self.state.feature_info,
            self.state.layers.has_selection(),
            self.state.viewport_width,
            self.config.display.phone_breakpoint_px,
        )
    }

    /// New channel receiving every subsequent change
    pub fn subscribe(&mut self) -> Receiver<StateChange> {
        let (tx, rx) = unbounded();
        self.subscribers.push(tx);
        rx
    }

    pub fn dispatch(&mut self, command: Command) -> Result<()> {
        let mode_before = self.feature_info_mode();
        let mut changes = Vec::new();
        let result = self.apply(command, &mut changes);

        let mode_after = self.feature_info_mode();
        if mode_after != mode_before {
            changes.push(StateChange::FeatureInfoModeChanged { mode: mode_after });
        }
        for change in changes {
            self.emit(change);
        }
        result
    }

    fn apply(&mut self, command: Command, changes: &mut Vec<StateChange>) -> Result<()> {
        let state = &mut self.state;
        match command {
            Command::SetCenter(center) => {
                state.position.center = center;
                changes.push(view_changed(&state.position));
            }
            Command::SetZoom(zoom) => {
                state.position.zoom = zoom;
                changes.push(view_changed(&state.position));
            }
            Command::SetView { center, zoom } => {
                state.position.center = center;
                state.position.zoom = zoom;
                changes.push(view_changed(&state.position));
            }
            Command::SetRotation(rotation) => {
                state.position.set_rotation(rotation);
                changes.push(StateChange::RotationChanged {
                    rotation: state.position.rotation(),
                });
            }
            Command::SetCamera(camera) => {
                state.position.camera = camera;
                changes.push(StateChange::CameraChanged);
            }

            Command::AddLayer(layer) => {
                let layer_id = layer.id.clone();
                let selected = layer.has_selection();
                state.layers.push(layer);
                if let Some(catalog) = &self.catalog {
                    resolve_layers(&mut state.layers, catalog.as_ref());
                }
                changes.push(StateChange::LayerAdded {
                    index: state.layers.len() - 1,
                    layer_id,
                });
                if selected {
                    changes.push(StateChange::SelectionChanged);
                }
            }
            Command::RemoveLayer(index) => {
                let removed = state.layers.remove(index)?;
                changes.push(StateChange::LayerRemoved {
                    index,
                    layer_id: removed.id.clone(),
                });
                if removed.has_selection() {
                    changes.push(StateChange::SelectionChanged);
                }
            }
            Command::MoveLayer { from, to } => {
                state.layers.move_layer(from, to)?;
                changes.push(StateChange::LayerMoved { from, to });
            }
            Command::DuplicateLayer(index) => {
                let copy = state.layers.duplicate(index)?;
                let layer_id = state
                    .layers
                    .get(copy)
                    .map(|l| l.id.clone())
                    .unwrap_or_default();
                changes.push(StateChange::LayerAdded {
                    index: copy,
                    layer_id,
                });
            }
            Command::SetLayerOpacity { index, opacity } => {
                state.layers.with_layer_mut(index, |l| l.set_opacity(opacity))?;
                changes.push(StateChange::LayerUpdated { index });
            }
            Command::SetLayerVisibility { index, visible } => {
                state.layers.with_layer_mut(index, |l| l.visible = visible)?;
                changes.push(StateChange::LayerUpdated { index });
                if !visible && selection::clear_layer_selection(&mut state.layers, index) {
                    changes.push(StateChange::SelectionChanged);
                }
            }
            Command::SetLayerTimestamp { index, timestamp } => {
                state.layers.with_layer_mut(index, |l| l.timestamp = timestamp)?;
                changes.push(StateChange::LayerUpdated { index });
            }
            Command::ReplaceLayers(mut layers) => {
                if let Some(catalog) = &self.catalog {
                    resolve_layers(&mut layers, catalog.as_ref());
                }
                let selection_touched = state.layers.has_selection() || layers.has_selection();
                state.layers = layers;
                changes.push(StateChange::LayersReplaced);
                if selection_touched {
                    changes.push(StateChange::SelectionChanged);
                }
            }

            Command::Identify {
                features,
                modifiers,
            } => {
                if selection::apply_identify(&mut state.layers, &features, modifiers) {
                    changes.push(StateChange::SelectionChanged);
                }
            }
            Command::ClearSelection => {
                if selection::clear_all(&mut state.layers) {
                    changes.push(StateChange::SelectionChanged);
                }
            }
            Command::PruneSelection {
                index,
                existing_ids,
            } => {
                let dropped = selection::prune_selection(
                    &mut state.layers,
                    index,
                    existing_ids.iter().map(String::as_str),
                );
                if dropped > 0 {
                    changes.push(StateChange::SelectionChanged);
                }
            }
            Command::SetFeatureInfoMode(mode) => state.feature_info = mode,
            Command::SetViewportWidth(width) => {
                state.viewport_width = width;
                changes.push(StateChange::ViewportResized { width });
            }

            Command::SetLang(lang) => {
                state.lang = lang.clone();
                changes.push(StateChange::LangChanged { lang });
            }
            Command::SetTopic(topic) => {
                state.topic = topic.clone();
                changes.push(StateChange::TopicChanged { topic });
            }
            Command::SetBackground(layer_id) => {
                state.background = layer_id.clone();
                changes.push(StateChange::BackgroundChanged { layer_id });
            }
            Command::SetCatalogNodes(nodes) => {
                state.catalog_nodes = nodes;
                changes.push(StateChange::CatalogNodesChanged);
            }
            Command::SetCrosshair(crosshair) => {
                state.crosshair = crosshair;
                changes.push(StateChange::CrosshairChanged);
            }
            Command::ClearSearchQuery => state.search_query = None,
        }
        Ok(())
    }

    fn emit(&mut self, change: StateChange) {
        log::debug!("state change: {}", change.event_type());
        self.subscribers.retain(|tx| tx.send(change.clone()).is_ok());
    }

    /// Canonical parameters describing the current state
    pub fn permalink_state(&self) -> PermalinkState {
        let state = &self.state;
        let has_selection = state.layers.has_selection();
        PermalinkState {
            lang: Some(state.lang.clone()),
            center: Some(state.position.center),
            zoom: Some(state.position.zoom),
            background: Some(state.background.clone()),
            topic: Some(state.topic.clone()),
            layers: (!state.layers.is_empty()).then(|| state.layers.clone()),
            feature_info: has_selection.then(|| self.feature_info_mode()),
            camera: state.position.camera,
            catalog_nodes: (!state.catalog_nodes.is_empty()).then(|| state.catalog_nodes.clone()),
            crosshair: state.crosshair.clone(),
        }
    }

    pub fn permalink_params(&self) -> QueryParams {
        self.permalink_state().to_params()
    }

    /// Canonical URL below the configured hash route. Query keys of the
    /// applied URL that are not permalink parameters are carried over.
    pub fn permalink_url(&self, base: &str) -> PermalinkUrl {
        PermalinkUrl::new(base, self.permalink_params())
            .with_route(self.config.url.hash_route.as_str())
            .with_legacy(self.retained_query.clone())
    }

    /// Replaces the state with what `url` describes.
    ///
    /// Parameters missing from the URL fall back to the configured defaults
    /// and the selection comes only from `@features=`. Returns the admin id
    /// of a drawing to resolve, if the URL carried one.
    pub fn apply_permalink(&mut self, url: &PermalinkUrl) -> Option<String> {
        let translation = translate(&url.legacy, &url.params, self.reprojector.as_ref());
        let incoming = PermalinkState::from_params(&translation.params);
        let defaults = &self.config.defaults;
        let old = self.state.clone();

        let mut next = AppState::from_defaults(defaults);
        next.viewport_width = old.viewport_width;
        next.position.set_rotation(old.position.rotation());
        if let Some(center) = incoming.center {
            next.position.center = center;
        }
        if let Some(zoom) = incoming.zoom {
            next.position.zoom = zoom;
        }
        next.position.camera = incoming.camera;
        next.lang = incoming.lang.unwrap_or_else(|| defaults.lang.clone());
        next.topic = incoming.topic.unwrap_or_else(|| defaults.topic.clone());
        next.background = incoming
            .background
            .unwrap_or_else(|| defaults.background.clone());
        next.layers = incoming.layers.unwrap_or_default();
        if let Some(catalog) = &self.catalog {
            resolve_layers(&mut next.layers, catalog.as_ref());
        }
        if selection::clear_hidden(&mut next.layers) {
            log::debug!("dropped selection on hidden layers");
        }
        if let Some(mode) = incoming.feature_info {
            next.feature_info = mode;
        }
        next.catalog_nodes = incoming.catalog_nodes.unwrap_or_default();
        next.crosshair = incoming.crosshair;
        next.search_query = translation.search_query;
        self.retained_query = url
            .clone()
            .without_legacy(translation.consumed.iter().map(String::as_str))
            .legacy;

        let mode_before = self.feature_info_mode();
        self.state = next;
        for change in diff(&old, &self.state) {
            self.emit(change);
        }
        let mode_after = self.feature_info_mode();
        if mode_after != mode_before {
            self.emit(StateChange::FeatureInfoModeChanged { mode: mode_after });
        }

        log::info!(
            "applied permalink with {} layers{}",
            self.state.layers.len(),
            if translation.consumed.is_empty() {
                ""
            } else {
                " (legacy parameters translated)"
            }
        );
        translation.admin_id
    }

    /// Parses and applies `url`, then resolves a drawing admin id through
    /// `provider`. A failed lookup is logged and leaves the rest applied.
    pub async fn load_permalink(
        &mut self,
        url: &str,
        provider: Option<&dyn KmlMetadataProvider>,
    ) -> Result<()> {
        let parsed = PermalinkUrl::parse(url)?;
        let Some(admin_id) = self.apply_permalink(&parsed) else {
            return Ok(());
        };

        match provider {
            Some(provider) => match provider.metadata_by_admin_id(&admin_id).await {
                Ok(metadata) => {
                    self.attach_drawing(&metadata.links.kml, &admin_id);
                }
                Err(e) => log::warn!("could not resolve drawing from the URL: {}", e),
            },
            None => log::warn!("URL carries an admin id but no KML service is configured"),
        }
        Ok(())
    }

    /// Adds the drawing at `kml_url`, or gives the admin id to the layer
    /// already showing it. Returns the layer index.
    pub fn attach_drawing(&mut self, kml_url: &str, admin_id: &str) -> usize {
        let existing = self
            .state
            .layers
            .iter()
            .position(|l| l.descriptor.file_url() == Some(kml_url));
        if let Some(index) = existing {
            if let Some(ImportedLayerDescriptor::ExternalKml { admin_id: slot, .. }) = self
                .state
                .layers
                .get_mut(index)
                .map(|l| &mut l.descriptor)
            {
                *slot = Some(admin_id.to_string());
            }
            return index;
        }

        let layer = LayerRef::new(ImportedLayerDescriptor::ExternalKml {
            url: kml_url.to_string(),
            admin_id: Some(admin_id.to_string()),
        });
        let layer_id = layer.id.clone();
        self.state.layers.push(layer);
        let index = self.state.layers.len() - 1;
        self.emit(StateChange::LayerAdded { index, layer_id });
        index
    }

    /// Runs an import against the current layers and adds the layer when admitted
    pub async fn import(
        &mut self,
        manager: &ImportManager,
        slot: &str,
        source: ImportSource,
    ) -> ImportOutcome {
        let outcome = manager.import(slot, source, &self.state.layers).await;
        self.apply_import(&outcome);
        outcome
    }

    /// Imports a saved drawing by admin id, reusing the layer already showing it
    pub async fn import_drawing(
        &mut self,
        manager: &ImportManager,
        admin_id: &str,
        provider: &dyn KmlMetadataProvider,
    ) -> ImportOutcome {
        let outcome = manager
            .import_by_admin_id("drawing", admin_id, provider, &self.state.layers)
            .await;
        self.apply_import(&outcome);
        outcome
    }

    /// Adds an admitted layer; returns where the imported file is now shown
    pub fn apply_import(&mut self, outcome: &ImportOutcome) -> Option<usize> {
        match outcome {
            ImportOutcome::Admitted { layer, .. } => {
                let index = self.state.layers.len();
                self.dispatch_logged(Command::AddLayer(layer.clone()));
                Some(index)
            }
            ImportOutcome::AlreadyActive { index } => Some(*index),
            ImportOutcome::AdminIdAttached { index, admin_id } => {
                let Some(layer) = self.state.layers.get_mut(*index) else {
                    log::warn!("drawing layer {} vanished before its admin id arrived", index);
                    return None;
                };
                if let ImportedLayerDescriptor::ExternalKml { admin_id: slot, .. } =
                    &mut layer.descriptor
                {
                    *slot = Some(admin_id.clone());
                }
                self.emit(StateChange::LayerUpdated { index: *index });
                Some(*index)
            }
            ImportOutcome::Rejected(_) | ImportOutcome::Superseded => None,
        }
    }

    fn dispatch_logged(&mut self, command: Command) {
        if let Err(e) = self.dispatch(command) {
            log::warn!("command failed: {}", e);
        }
    }
}

fn view_changed(position: &Position) -> StateChange {
    StateChange::ViewChanged {
        center: position.center,
        zoom: position.zoom,
    }
}

/// Events describing the step from `old` to `new`
fn diff(old: &AppState, new: &AppState) -> Vec<StateChange> {
    let mut changes = Vec::new();
    if old.position.center != new.position.center || old.position.zoom != new.position.zoom {
        changes.push(view_changed(&new.position));
    }
    if old.position.rotation() != new.position.rotation() {
        changes.push(StateChange::RotationChanged {
            rotation: new.position.rotation(),
        });
    }
    if old.position.camera != new.position.camera {
        changes.push(StateChange::CameraChanged);
    }
    if old.layers != new.layers {
        changes.push(StateChange::LayersReplaced);
    }
    if selection::selected_features(&old.layers) != selection::selected_features(&new.layers) {
        changes.push(StateChange::SelectionChanged);
    }
    if old.lang != new.lang {
        changes.push(StateChange::LangChanged {
            lang: new.lang.clone(),
        });
    }
    if old.topic != new.topic {
        changes.push(StateChange::TopicChanged {
            topic: new.topic.clone(),
        });
    }
    if old.background != new.background {
        changes.push(StateChange::BackgroundChanged {
            layer_id: new.background.clone(),
        });
    }
    if old.catalog_nodes != new.catalog_nodes {
        changes.push(StateChange::CatalogNodesChanged);
    }
    if old.crosshair != new.crosshair {
        changes.push(StateChange::CrosshairChanged);
    }
    changes
}
