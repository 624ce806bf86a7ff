use crate::import::parse::ParsedDocument;
use crate::import::validate::{ImportSource, ImportValidator, ValidationResult, ValidationStatus};
use crate::layers::base::{ImportedLayerDescriptor, LayerRef};
use crate::layers::manager::LayerList;
use crate::prelude::HashMap;
use crate::traits::KmlMetadataProvider;
use futures::future::join_all;
use std::sync::Mutex;

/// What became of one import request
#[derive(Debug, Clone, PartialEq)]
pub enum ImportOutcome {
    /// Valid and new; the caller adds `layer` to the map
    Admitted {
        layer: LayerRef,
        result: ValidationResult,
        document: Option<ParsedDocument>,
    },
    /// The same file is already on the map at `index`
    AlreadyActive { index: usize },
    /// The drawing is already on the map at `index`; the caller attaches
    /// `admin_id` to that layer
    AdminIdAttached { index: usize, admin_id: String },
    Rejected(ValidationResult),
    /// A newer request for the same slot was started meanwhile
    Superseded,
}

impl ImportOutcome {
    pub fn is_admitted(&self) -> bool {
        matches!(self, Self::Admitted { .. })
    }
}

/// Runs imports and discards the ones that were overtaken.
///
/// Every request belongs to a slot (an import form, a drop zone, the admin
/// id of the URL...). Starting a request bumps the slot's generation; a
/// completion whose generation is no longer current is reported as
/// [`ImportOutcome::Superseded`] and must not be applied.
pub struct ImportManager {
    validator: ImportValidator,
    generations: Mutex<HashMap<String, u64>>,
}

impl ImportManager {
    pub fn new(validator: ImportValidator) -> Self {
        Self {
            validator,
            generations: Mutex::new(HashMap::default()),
        }
    }

    pub fn validator(&self) -> &ImportValidator {
        &self.validator
    }

    /// Validates `source` and checks it against the layers already active
    pub async fn import(&self, slot: &str, source: ImportSource, active: &LayerList) -> ImportOutcome {
        let generation = self.begin(slot);

        if let ImportSource::Url(url) = &source {
            if let Some(index) = find_file_layer(active, url) {
                log::debug!("{} is already active at {}", url, index);
                return ImportOutcome::AlreadyActive { index };
            }
        }

        let outcome = self.validator.validate(source).await;
        if !self.is_current(slot, generation) {
            log::debug!("import in slot {} superseded", slot);
            return ImportOutcome::Superseded;
        }

        let Some(layer) = outcome.layer.filter(|_| outcome.result.is_ok()) else {
            return ImportOutcome::Rejected(outcome.result);
        };

        // the resolved URL may differ from the requested one after redirects
        if let Some(index) = layer.descriptor.file_url().and_then(|u| find_file_layer(active, u)) {
            return ImportOutcome::AlreadyActive { index };
        }

        ImportOutcome::Admitted {
            layer,
            result: outcome.result,
            document: outcome.document,
        }
    }

    /// Resolves a saved drawing by admin id and imports its KML file.
    ///
    /// The admin id stays on the layer descriptor so the drawing can be
    /// edited; it is never written to the URL.
    pub async fn import_by_admin_id(
        &self,
        slot: &str,
        admin_id: &str,
        provider: &dyn KmlMetadataProvider,
        active: &LayerList,
    ) -> ImportOutcome {
        let generation = self.begin(slot);

        if let Some(index) = active
            .iter()
            .position(|l| l.descriptor.admin_id() == Some(admin_id))
        {
            return ImportOutcome::AlreadyActive { index };
        }

        let metadata = match provider.metadata_by_admin_id(admin_id).await {
            Ok(metadata) => metadata,
            Err(e) => {
                log::warn!("could not resolve drawing: {}", e);
                if !self.is_current(slot, generation) {
                    return ImportOutcome::Superseded;
                }
                return ImportOutcome::Rejected(ValidationResult::failure(
                    ValidationStatus::NetworkError,
                    e.to_string(),
                ));
            }
        };
        if !self.is_current(slot, generation) {
            return ImportOutcome::Superseded;
        }

        // an existing layer with the file URL gets the admin id attached
        if let Some(index) = find_file_layer(active, &metadata.links.kml) {
            return ImportOutcome::AdminIdAttached {
                index,
                admin_id: admin_id.to_string(),
            };
        }

        match self
            .import(slot, ImportSource::Url(metadata.links.kml.clone()), active)
            .await
        {
            ImportOutcome::Admitted {
                mut layer,
                result,
                document,
            } => {
                if let ImportedLayerDescriptor::ExternalKml { admin_id: slot_id, .. } =
                    &mut layer.descriptor
                {
                    *slot_id = Some(admin_id.to_string());
                }
                ImportOutcome::Admitted {
                    layer,
                    result,
                    document,
                }
            }
            ImportOutcome::AlreadyActive { index } => ImportOutcome::AdminIdAttached {
                index,
                admin_id: admin_id.to_string(),
            },
            other => other,
        }
    }

    /// Imports several sources concurrently, one slot per source
    pub async fn import_many(
        &self,
        sources: Vec<ImportSource>,
        active: &LayerList,
    ) -> Vec<ImportOutcome> {
        let slots: Vec<String> = sources
            .iter()
            .map(|s| format!("batch:{}", s.location()))
            .collect();
        let imports = slots
            .iter()
            .zip(sources)
            .map(|(slot, source)| self.import(slot, source, active));
        join_all(imports).await
    }

    fn begin(&self, slot: &str) -> u64 {
        let mut generations = self.generations.lock().unwrap_or_else(|e| e.into_inner());
        let generation = generations.entry(slot.to_string()).or_insert(0);
        *generation += 1;
        *generation
    }

    fn is_current(&self, slot: &str, generation: u64) -> bool {
        let generations = self.generations.lock().unwrap_or_else(|e| e.into_inner());
        generations.get(slot) == Some(&generation)
    }
}

fn find_file_layer(layers: &LayerList, url: &str) -> Option<usize> {
    layers
        .iter()
        .position(|l| l.descriptor.file_url() == Some(url))
}
