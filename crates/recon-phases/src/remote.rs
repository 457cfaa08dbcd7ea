//! HTTP client for a remote reconciliation router

use crate::error::{ApiErrorEnvelope, PhaseError};
use crate::model::{ChangeSet, CheckLiveResponse, CheckOpenPrResponse, EnsurePrResponse};
use crate::reconciler::Reconciler;
use recon_upstream::{build_client, sanitize_error_body, UpstreamError, INTERNAL_TOKEN_HEADER};
use serde::de::DeserializeOwned;
use std::time::Duration;

const SERVICE: &str = "router";

pub const CHECK_LIVE_PATH: &str = "/config/check-live";
pub const CHECK_OPEN_PR_PATH: &str = "/config/check-open-pr";
pub const ENSURE_PR_PATH: &str = "/config/ensure-pr";

/// Posts change-sets to `{base}/config/*`
#[derive(Debug, Clone)]
pub struct HttpReconciler {
    client: reqwest::Client,
    base_url: String,
    token: String,
}

impl HttpReconciler {
    /// # Errors
    /// Config error for a blank base URL; upstream error if the client cannot be built
    pub fn new(
        base_url: &str,
        token: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, PhaseError> {
        let base_url = base_url.trim().trim_end_matches('/');
        if base_url.is_empty() {
            return Err(PhaseError::Config("router base URL is not set".to_string()));
        }
        let client = build_client(SERVICE, timeout)?;
        Ok(Self {
            client,
            base_url: base_url.to_string(),
            token: token.into(),
        })
    }

    #[must_use]
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn post<T: DeserializeOwned>(
        &self,
        path: &str,
        request: &ChangeSet,
    ) -> Result<T, PhaseError> {
        let url = self.endpoint(path);
        tracing::debug!("POST {}", url);
        let resp = self
            .client
            .post(&url)
            .header(INTERNAL_TOKEN_HEADER, self.token.as_str())
            .json(request)
            .send()
            .await
            .map_err(|e| transport(&e))?;

        let status = resp.status();
        let body = resp.text().await.map_err(|e| transport(&e))?;
        if !status.is_success() {
            return Err(error_from_response(status.as_u16(), &url, &body));
        }
        serde_json::from_str(&body).map_err(|e| PhaseError::MalformedDocument {
            message: format!("malformed response from {SERVICE} for {path}: {e}"),
        })
    }
}

fn transport(err: &reqwest::Error) -> PhaseError {
    PhaseError::Upstream(UpstreamError::Transport {
        service: SERVICE,
        message: err.to_string(),
    })
}

/// Prefer the router's structured error; fall back to a plain HTTP failure
fn error_from_response(status: u16, url: &str, body: &str) -> PhaseError {
    if let Ok(envelope) = serde_json::from_str::<ApiErrorEnvelope>(body) {
        return envelope.error.into();
    }
    PhaseError::Upstream(UpstreamError::Http {
        service: SERVICE,
        method: "POST",
        status,
        url: url.to_string(),
        body: sanitize_error_body(body),
    })
}

#[async_trait::async_trait]
impl Reconciler for HttpReconciler {
    async fn check_live(&self, request: &ChangeSet) -> Result<CheckLiveResponse, PhaseError> {
        self.post(CHECK_LIVE_PATH, request).await
    }

    async fn check_open_pr(
        &self,
        request: &ChangeSet,
    ) -> Result<CheckOpenPrResponse, PhaseError> {
        self.post(CHECK_OPEN_PR_PATH, request).await
    }

    async fn ensure_pr(&self, request: &ChangeSet) -> Result<EnsurePrResponse, PhaseError> {
        self.post(ENSURE_PR_PATH, request).await
    }
}
