//! Catalog HTTP client
//!
//! Downloads the JSON hierarchy description consumed by
//! [`MediaHierarchyLoader`](crate::catalog::MediaHierarchyLoader) and maps
//! transport failures onto [`LoadError`].

use reqwest::{StatusCode, Url};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, error};

use crate::catalog::{parse_catalog, Catalog, CatalogFetch, LoadError};

/// Request timeout used by [`CatalogClient::new`]
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

const USER_AGENT: &str = concat!("reelcast/", env!("CARGO_PKG_VERSION"));

/// HTTP client for catalog documents
#[derive(Debug, Clone)]
pub struct CatalogClient {
    client: reqwest::Client,
}

impl CatalogClient {
    /// Create a client with the default timeout
    pub fn new() -> Self {
        Self::with_timeout(DEFAULT_TIMEOUT)
    }

    /// Create a client with a custom request timeout
    pub fn with_timeout(timeout: Duration) -> Self {
        let client = build_client(timeout, USER_AGENT).unwrap_or_else(|e| {
            error!(error = %e, ?timeout, "Failed to configure catalog HTTP client, using defaults");
            reqwest::Client::new()
        });
        Self { client }
    }

    /// Fetch the raw document body
    pub async fn fetch_document(&self, url: &Url) -> Result<String, LoadError> {
        let response = self
            .client
            .get(url.clone())
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(classify_transport_error)?;

        let status = response.status();
        debug!(%url, %status, "Catalog request completed");
        if status != StatusCode::OK {
            return Err(LoadError::HttpStatus(status.as_u16()));
        }

        response.text().await.map_err(classify_transport_error)
    }

    /// Fetch and decode a catalog in one step
    pub async fn fetch_catalog(&self, url: &str) -> Result<Catalog, LoadError> {
        let url = Url::parse(url).map_err(|e| LoadError::InvalidUrl(format!("{}: {}", url, e)))?;
        let body = self.fetch_document(&url).await?;
        parse_catalog(&body)
    }
}

impl Default for CatalogClient {
    fn default() -> Self {
        Self::new()
    }
}

impl CatalogFetch for CatalogClient {
    fn fetch(&self, url: Url) -> impl Future<Output = Result<String, LoadError>> + Send {
        async move { self.fetch_document(&url).await }
    }
}

fn build_client(timeout: Duration, user_agent: &str) -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(user_agent)
        .build()
}

fn classify_transport_error(e: reqwest::Error) -> LoadError {
    if e.is_timeout() {
        LoadError::Timeout
    } else {
        LoadError::Unreachable(e.to_string())
    }
}
