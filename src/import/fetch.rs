#[cfg(feature = "http")]
use {crate::traits::ResourceFetcher, async_trait::async_trait, once_cell::sync::Lazy, std::time::Duration};

#[cfg(feature = "http")]
pub(crate) static HTTP_CLIENT: Lazy<reqwest::Client> = Lazy::new(|| {
    reqwest::Client::builder()
        .user_agent(concat!("mapstate/", env!("CARGO_PKG_VERSION")))
        .timeout(Duration::from_secs(30))
        .pool_idle_timeout(Duration::from_secs(90))
        .build()
        .expect("failed to build reqwest async client")
});

/// What came back from a HEAD or GET
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FetchResponse {
    pub status: u16,
    pub content_type: Option<String>,
    /// URL after redirects
    pub final_url: String,
    pub body: Vec<u8>,
}

impl FetchResponse {
    pub fn ok(url: impl Into<String>, content_type: Option<&str>, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status: 200,
            content_type: content_type.map(str::to_string),
            final_url: url.into(),
            body: body.into(),
        }
    }

    pub fn with_status(url: impl Into<String>, status: u16) -> Self {
        Self {
            status,
            final_url: url.into(),
            ..Self::default()
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Media type without parameters, lowercased
    pub fn media_type(&self) -> Option<String> {
        self.content_type
            .as_deref()
            .and_then(|ct| ct.split(';').next())
            .map(|ct| ct.trim().to_ascii_lowercase())
            .filter(|ct| !ct.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    #[error("request to {url} failed: {reason}")]
    Transport { url: String, reason: String },
    #[error("request to {0} timed out")]
    Timeout(String),
    #[error("{url} is larger than {limit} bytes")]
    TooLarge { url: String, limit: usize },
}

/// `ResourceFetcher` backed by the shared reqwest client
#[cfg(feature = "http")]
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    timeout: Duration,
    max_size_bytes: usize,
}

#[cfg(feature = "http")]
impl HttpFetcher {
    pub fn new(timeout: Duration, max_size_bytes: usize) -> Self {
        Self {
            timeout,
            max_size_bytes,
        }
    }

    fn map_error(url: &str, error: reqwest::Error) -> FetchError {
        if error.is_timeout() {
            FetchError::Timeout(url.to_string())
        } else {
            FetchError::Transport {
                url: url.to_string(),
                reason: error.to_string(),
            }
        }
    }

    fn content_type(response: &reqwest::Response) -> Option<String> {
        response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    }
}

#[cfg(feature = "http")]
impl Default for HttpFetcher {
    fn default() -> Self {
        let config = crate::core::config::SyncConfig::default();
        Self::new(config.services.http_timeout(), config.import.max_size_bytes)
    }
}

#[cfg(feature = "http")]
#[async_trait]
impl ResourceFetcher for HttpFetcher {
    async fn head(&self, url: &str) -> Result<FetchResponse, FetchError> {
        let response = HTTP_CLIENT
            .head(url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| Self::map_error(url, e))?;

        Ok(FetchResponse {
            status: response.status().as_u16(),
            content_type: Self::content_type(&response),
            final_url: response.url().to_string(),
            body: Vec::new(),
        })
    }

    async fn get(&self, url: &str) -> Result<FetchResponse, FetchError> {
        let response = HTTP_CLIENT
            .get(url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| Self::map_error(url, e))?;

        if let Some(length) = response.content_length() {
            if length as usize > self.max_size_bytes {
                return Err(FetchError::TooLarge {
                    url: url.to_string(),
                    limit: self.max_size_bytes,
                });
            }
        }

        let status = response.status().as_u16();
        let content_type = Self::content_type(&response);
        let final_url = response.url().to_string();
        let body = response
            .bytes()
            .await
            .map_err(|e| Self::map_error(url, e))?
            .to_vec();

        if body.len() > self.max_size_bytes {
            return Err(FetchError::TooLarge {
                url: url.to_string(),
                limit: self.max_size_bytes,
            });
        }

        log::debug!("fetched {} ({} bytes, HTTP {})", final_url, body.len(), status);
        Ok(FetchResponse {
            status,
            content_type,
            final_url,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_media_type_strips_parameters() {
        let response = FetchResponse::ok(
            "https://a.ch/x.kml",
            Some("Application/vnd.google-earth.kml+xml; charset=UTF-8"),
            Vec::new(),
        );
        assert_eq!(
            response.media_type().as_deref(),
            Some("application/vnd.google-earth.kml+xml")
        );
        assert_eq!(FetchResponse::default().media_type(), None);
    }

    #[test]
    fn test_success_range() {
        assert!(FetchResponse::with_status("u", 204).is_success());
        assert!(!FetchResponse::with_status("u", 304).is_success());
        assert!(!FetchResponse::with_status("u", 404).is_success());
    }
}
