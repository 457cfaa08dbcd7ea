//! Live configuration backend

use crate::error::UpstreamError;
use crate::http::{build_client, check_status};
use std::time::Duration;

const SERVICE: &str = "backend";
const DEFAULT_TIMEOUT_SECS: u64 = 8;

/// Source of the currently-live config documents
#[async_trait::async_trait]
pub trait ConfigBackend: Send + Sync {
    /// Raw JSON text of the live UI config
    async fn ui_document(&self) -> Result<String, UpstreamError>;

    /// Raw JSON text of the live policy config
    async fn policy_document(&self) -> Result<String, UpstreamError>;
}

/// Reads `GET {base}/ui-config` and `GET {base}/policy`
#[derive(Debug, Clone)]
pub struct HttpConfigBackend {
    client: reqwest::Client,
    base_url: String,
}

impl HttpConfigBackend {
    /// Create a backend client rooted at `base_url`
    ///
    /// # Errors
    /// Returns [`UpstreamError::Config`] when `base_url` is blank
    pub fn new(base_url: &str) -> Result<Self, UpstreamError> {
        let base_url = base_url.trim().trim_end_matches('/');
        if base_url.is_empty() {
            return Err(UpstreamError::Config(
                "BACKEND_PUBLIC_BASE_URL is not set".to_string(),
            ));
        }
        Ok(Self {
            client: build_client(SERVICE, Duration::from_secs(DEFAULT_TIMEOUT_SECS))?,
            base_url: base_url.to_string(),
        })
    }

    /// Override the request timeout
    ///
    /// # Errors
    /// Returns [`UpstreamError::Transport`] if the client cannot be rebuilt
    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self, UpstreamError> {
        self.client = build_client(SERVICE, timeout)?;
        Ok(self)
    }

    #[inline]
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get_text(&self, path: &str) -> Result<String, UpstreamError> {
        let url = self.endpoint(path);
        tracing::debug!("Fetching live config from {}", url);
        let resp = self
            .client
            .get(&url)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| UpstreamError::transport(SERVICE, e))?;
        check_status(SERVICE, "GET", resp)
            .await?
            .text()
            .await
            .map_err(|e| UpstreamError::transport(SERVICE, e))
    }
}

#[async_trait::async_trait]
impl ConfigBackend for HttpConfigBackend {
    async fn ui_document(&self) -> Result<String, UpstreamError> {
        self.get_text("/ui-config").await
    }

    async fn policy_document(&self) -> Result<String, UpstreamError> {
        self.get_text("/policy").await
    }
}
