//! Shared trait abstractions for the external collaborators
//!
//! Projection math, HTTP, the KML storage service and the layer catalog live
//! outside this crate. Everything here talks to them through these traits so
//! tests and alternative runtimes can plug in their own implementations.

use crate::{
    core::geo::{CoordinateSystem, LatLng, Point},
    import::{
        admin::KmlMetadata,
        fetch::{FetchError, FetchResponse},
    },
    Result,
};
use async_trait::async_trait;

/// Trait for coordinate transformation into the working projection (LV95)
pub trait Reprojector: Send + Sync {
    /// Transform a point expressed in `from` into the working projection.
    /// WGS84 points are given as `x = longitude`, `y = latitude`.
    fn to_working(&self, point: Point, from: CoordinateSystem) -> Result<Point>;

    /// Transform a working-projection point back to WGS84
    fn to_wgs84(&self, point: Point) -> Result<LatLng>;
}

/// Trait for retrieving remote resources during import validation
#[async_trait]
pub trait ResourceFetcher: Send + Sync {
    /// Issue a HEAD request; only the status and headers are meaningful
    async fn head(&self, url: &str) -> std::result::Result<FetchResponse, FetchError>;

    /// Issue a GET request and read the full body
    async fn get(&self, url: &str) -> std::result::Result<FetchResponse, FetchError>;
}

/// Trait for resolving a drawing's admin id into its KML metadata
#[async_trait]
pub trait KmlMetadataProvider: Send + Sync {
    async fn metadata_by_admin_id(&self, admin_id: &str) -> Result<KmlMetadata>;
}

/// Trait for looking up layer ids in the layer catalog
pub trait LayerCatalog: Send + Sync {
    /// Whether `id` names a catalog layer
    fn contains(&self, id: &str) -> bool;

    /// Whether the layer supports timestamps
    fn is_time_enabled(&self, _id: &str) -> bool {
        false
    }

    /// Opacity the catalog recommends for the layer
    fn default_opacity(&self, _id: &str) -> Option<f64> {
        None
    }
}
