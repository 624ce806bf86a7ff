//! Metadata of drawings saved in the KML storage service.
//!
//! A drawing is shared by file URL; the admin id grants edit rights and is
//! only resolved here, never written back to the URL.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KmlLinks {
    /// Public URL of the KML file
    pub kml: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<String>,
}

/// Answer of `GET /api/kml/admin?admin_id=...`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KmlMetadata {
    pub id: String,
    #[serde(default)]
    pub admin_id: Option<String>,
    pub links: KmlLinks,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated: Option<String>,
}

#[cfg(feature = "http")]
pub use self::http::HttpKmlMetadataProvider;

#[cfg(feature = "http")]
mod http {
    use super::KmlMetadata;
    use crate::core::config::ServiceConfig;
    use crate::import::fetch::HTTP_CLIENT;
    use crate::traits::KmlMetadataProvider;
    use crate::{MapStateError, Result};
    use async_trait::async_trait;
    use std::time::Duration;

    /// Looks up drawings in the KML storage service over HTTP
    #[derive(Debug, Clone)]
    pub struct HttpKmlMetadataProvider {
        service_url: String,
        timeout: Duration,
    }

    impl HttpKmlMetadataProvider {
        pub fn new(service_url: impl Into<String>, timeout: Duration) -> Self {
            Self {
                service_url: service_url.into(),
                timeout,
            }
        }

        pub fn from_config(services: &ServiceConfig) -> Self {
            Self::new(services.kml_service_url.clone(), services.http_timeout())
        }

        fn admin_url(&self, admin_id: &str) -> Result<url::Url> {
            let mut url = url::Url::parse(&format!(
                "{}/api/kml/admin",
                self.service_url.trim_end_matches('/')
            ))?;
            url.query_pairs_mut().append_pair("admin_id", admin_id);
            Ok(url)
        }
    }

    #[async_trait]
    impl KmlMetadataProvider for HttpKmlMetadataProvider {
        async fn metadata_by_admin_id(&self, admin_id: &str) -> Result<KmlMetadata> {
            let url = self.admin_url(admin_id)?;
            let response = HTTP_CLIENT
                .get(url)
                .timeout(self.timeout)
                .send()
                .await
                .map_err(MapStateError::Network)?;

            if !response.status().is_success() {
                return Err(MapStateError::Import(format!(
                    "KML metadata lookup failed with HTTP {}",
                    response.status()
                ))
                .into());
            }

            let metadata = response
                .json::<KmlMetadata>()
                .await
                .map_err(MapStateError::Network)?;
            log::debug!("resolved drawing {} to {}", metadata.id, metadata.links.kml);
            Ok(metadata)
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn test_admin_url_is_escaped() {
            let provider =
                HttpKmlMetadataProvider::new("https://service-kml.bgdi.ch/", Duration::from_secs(1));
            let url = provider.admin_url("a b&c").unwrap();
            assert_eq!(
                url.as_str(),
                "https://service-kml.bgdi.ch/api/kml/admin?admin_id=a+b%26c"
            );
        }
    }
}
