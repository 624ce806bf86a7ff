use async_trait::async_trait;
use mapstate::import::admin::{KmlLinks, KmlMetadata};
use mapstate::import::{FetchError, FetchResponse};
use mapstate::prelude::*;
use tokio::sync::Notify;

const BERN_KML: &str = r#"<kml><Document><Placemark><name>Bern</name><Point><coordinates>7.44,46.95</coordinates></Point></Placemark></Document></kml>"#;
const EMPTY_KML: &str = r#"<kml><Document><name>nothing</name></Document></kml>"#;

/// Serves fixed bodies; URLs containing "slow" wait for `gate` first
struct FakeServer {
    gate: Arc<Notify>,
}

impl FakeServer {
    fn new() -> Self {
        Self {
            gate: Arc::new(Notify::new()),
        }
    }
}

#[async_trait]
impl ResourceFetcher for FakeServer {
    async fn head(&self, url: &str) -> std::result::Result<FetchResponse, FetchError> {
        if url.contains("slow") {
            self.gate.notified().await;
        }
        Ok(FetchResponse::with_status(url, 200))
    }

    async fn get(&self, url: &str) -> std::result::Result<FetchResponse, FetchError> {
        if url.contains("missing") {
            return Ok(FetchResponse::with_status(url, 404));
        }
        let body = if url.contains("empty") { EMPTY_KML } else { BERN_KML };
        Ok(FetchResponse::ok(url, Some("application/vnd.google-earth.kml+xml"), body))
    }
}

/// Resolves every admin id to the Bern drawing
struct DrawingService;

#[async_trait]
impl KmlMetadataProvider for DrawingService {
    async fn metadata_by_admin_id(&self, admin_id: &str) -> Result<KmlMetadata> {
        Ok(KmlMetadata {
            id: "bern".into(),
            admin_id: Some(admin_id.into()),
            links: KmlLinks {
                kml: "https://a.ch/bern.kml".into(),
                metadata: None,
            },
            created: None,
            updated: None,
        })
    }
}

/// Import flows as the viewer drives them: validator, manager and store together
#[cfg(test)]
mod import_tests {
    use super::*;

    fn manager_with(server: FakeServer) -> ImportManager {
        ImportManager::new(ImportValidator::new(
            Arc::new(server),
            &ImportConfig::default(),
        ))
    }

    /// An empty document is rejected and never becomes a layer
    #[tokio::test]
    async fn test_empty_kml_is_rejected() {
        let manager = manager_with(FakeServer::new());
        let mut controller = MapController::new(SyncConfig::default());

        let outcome = controller
            .import(&manager, "form", ImportSource::url("https://a.ch/empty.kml"))
            .await;

        let ImportOutcome::Rejected(result) = outcome else {
            panic!("expected rejection, got {:?}", outcome);
        };
        assert_eq!(result.status, ValidationStatus::Empty);
        assert!(controller.active_layers().is_empty());
    }

    /// A dead link is reported as a network problem
    #[tokio::test]
    async fn test_unreachable_file() {
        let manager = manager_with(FakeServer::new());
        let outcome = manager
            .import("form", ImportSource::url("https://a.ch/missing.kml"), &LayerList::new())
            .await;

        let ImportOutcome::Rejected(result) = outcome else {
            panic!("expected rejection, got {:?}", outcome);
        };
        assert_eq!(result.status, ValidationStatus::NetworkError);
    }

    /// Importing the same file twice keeps a single layer
    #[tokio::test]
    async fn test_reimport_does_not_duplicate() {
        let manager = manager_with(FakeServer::new());
        let mut controller = MapController::new(SyncConfig::default());
        let source = || ImportSource::url("https://a.ch/bern.kml");

        let first = controller.import(&manager, "form", source()).await;
        assert!(first.is_admitted());
        let second = controller.import(&manager, "form", source()).await;

        assert_eq!(second, ImportOutcome::AlreadyActive { index: 0 });
        assert_eq!(controller.active_layers().len(), 1);
        assert_eq!(
            controller.permalink_params().get("layers"),
            Some("KML|https://a.ch/bern.kml")
        );
    }

    /// A slow import overtaken by a newer one in the same slot is dropped
    #[tokio::test]
    async fn test_stale_import_is_superseded() {
        let server = FakeServer::new();
        let gate = server.gate.clone();
        let manager = manager_with(server);
        let layers = LayerList::new();

        let (slow, fast, _) = tokio::join!(
            manager.import("form", ImportSource::url("https://a.ch/slow.kml"), &layers),
            manager.import("form", ImportSource::url("https://a.ch/fast.kml"), &layers),
            async { gate.notify_one() },
        );

        assert_eq!(slow, ImportOutcome::Superseded);
        assert!(fast.is_admitted());
    }

    /// Different slots do not interfere with each other
    #[tokio::test]
    async fn test_separate_slots_both_complete() {
        let server = FakeServer::new();
        let gate = server.gate.clone();
        let manager = manager_with(server);
        let layers = LayerList::new();

        let (slow, fast, _) = tokio::join!(
            manager.import("drop-zone", ImportSource::url("https://a.ch/slow.kml"), &layers),
            manager.import("form", ImportSource::url("https://a.ch/fast.kml"), &layers),
            async { gate.notify_one() },
        );

        assert!(slow.is_admitted());
        assert!(fast.is_admitted());
    }

    /// Local files are identified by their name
    #[tokio::test]
    async fn test_local_file_import() {
        let manager = manager_with(FakeServer::new());
        let mut controller = MapController::new(SyncConfig::default());

        let outcome = controller
            .import(&manager, "form", ImportSource::file("bern.kml", BERN_KML))
            .await;
        let ImportOutcome::Admitted { document, .. } = &outcome else {
            panic!("expected admission, got {:?}", outcome);
        };

        assert_eq!(document.as_ref().map(|d| d.features.len()), Some(1));
        assert_eq!(controller.active_layers().get(0).unwrap().id, "KML|bern.kml");
    }

    /// Opening a drawing for editing reuses the layer already showing it
    #[tokio::test]
    async fn test_drawing_import_reuses_loaded_layer() {
        let manager = manager_with(FakeServer::new());
        let mut controller = MapController::new(SyncConfig::default());
        controller
            .import(&manager, "form", ImportSource::url("https://a.ch/bern.kml"))
            .await;
        assert_eq!(controller.active_layers().get(0).unwrap().descriptor.admin_id(), None);

        let outcome = controller.import_drawing(&manager, "edit-me", &DrawingService).await;

        assert!(matches!(outcome, ImportOutcome::AdminIdAttached { index: 0, .. }));
        assert_eq!(controller.active_layers().len(), 1);
        assert_eq!(
            controller.active_layers().get(0).unwrap().descriptor.admin_id(),
            Some("edit-me")
        );
    }

    /// A drawing not yet on the map is imported with its admin id
    #[tokio::test]
    async fn test_drawing_import_adds_layer() {
        let manager = manager_with(FakeServer::new());
        let mut controller = MapController::new(SyncConfig::default());

        let outcome = controller.import_drawing(&manager, "edit-me", &DrawingService).await;

        assert!(outcome.is_admitted());
        let layer = controller.active_layers().get(0).unwrap();
        assert_eq!(layer.descriptor.file_url(), Some("https://a.ch/bern.kml"));
        assert_eq!(layer.descriptor.admin_id(), Some("edit-me"));
    }
}
