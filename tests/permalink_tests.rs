use mapstate::prelude::*;

/// End-to-end permalink scenarios: a URL goes in, the store is updated and
/// the canonical URL comes back out
#[cfg(test)]
mod permalink_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const BASE: &str = "https://map.geo.admin.ch/";

    fn load(url: &str) -> MapController {
        let mut controller = MapController::new(SyncConfig::default());
        let parsed = PermalinkUrl::parse(url).unwrap();
        controller.apply_permalink(&parsed);
        controller
    }

    /// Legacy WGS84 coordinates land where a direct reprojection puts them
    #[test]
    fn test_legacy_lat_lon_matches_reprojection() {
        let controller = load("https://map.geo.admin.ch/?lat=46.95108&lon=7.43863&zoom=8");
        let expected = SwissReprojector::new()
            .to_working(Point::new(7.43863, 46.95108), CoordinateSystem::Wgs84)
            .unwrap();

        let center = controller.position().center;
        assert!((center.x - expected.x).abs() < 0.01);
        assert!((center.y - expected.y).abs() < 0.01);
        assert_eq!(controller.position().zoom, 8.0);
    }

    /// Zipped legacy layer parameters collapse into one canonical list
    #[test]
    fn test_zipped_legacy_layers() {
        let controller = load(
            "https://map.geo.admin.ch/?layers=ch.a,ch.b&layers_opacity=0.4,0.7&layers_visibility=false,true&layers_timestamp=,2020",
        );
        let url = controller.permalink_url(BASE).to_string();

        assert!(url.starts_with("https://map.geo.admin.ch/#/map?"));
        assert_eq!(
            controller.permalink_params().get("layers"),
            Some("ch.a,f,0.4;ch.b@time=2020,,0.7")
        );
    }

    /// Secrets and one-shot parameters never reach the rewritten URL
    #[test]
    fn test_admin_id_and_search_are_not_written() {
        let mut controller = MapController::new(SyncConfig::default());
        let parsed = PermalinkUrl::parse(
            "https://map.geo.admin.ch/?adminId=s3cr3t&swisssearch=Bern#/map?lang=de",
        )
        .unwrap();

        assert_eq!(controller.apply_permalink(&parsed).as_deref(), Some("s3cr3t"));
        assert_eq!(controller.state().search_query.as_deref(), Some("Bern"));

        let url = controller.permalink_url(BASE).to_string();
        assert!(!url.contains("s3cr3t"));
        assert!(!url.contains("adminId"));
        assert!(!url.contains("swisssearch"));
        assert!(url.contains("lang=de"));
    }

    /// The selection in the URL is restored exactly and survives a rewrite
    #[test]
    fn test_selection_round_trip_through_store() {
        let controller = load(
            "https://map.geo.admin.ch/#/map?layers=ch.a@features=1:2;ch.b&featureInfo=tooltip",
        );

        let selected: Vec<(usize, String)> = controller
            .selected_features()
            .into_iter()
            .map(|f| (f.layer_index, f.feature_id))
            .collect();
        assert_eq!(selected, vec![(0, "1".to_string()), (0, "2".to_string())]);
        assert_eq!(controller.feature_info_mode(), FeatureInfoMode::Tooltip);

        let params = controller.permalink_params();
        assert_eq!(params.get("layers"), Some("ch.a@features=1:2;ch.b"));
        assert_eq!(params.get("featureInfo"), Some("tooltip"));
    }

    /// Canonical output is stable: reloading it yields the same URL
    #[test]
    fn test_canonical_url_is_a_fixed_point() {
        let first = load(
            "https://map.geo.admin.ch/?E=2600000&N=1200000&zoom=4&topic=ech&bgLayer=voidLayer",
        );
        let url = first.permalink_url(BASE).to_string();
        assert!(url.contains("bgLayer=void"));

        let second = load(&url);
        assert_eq!(second.permalink_url(BASE).to_string(), url);
    }
}
