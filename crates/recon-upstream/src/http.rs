//! Shared HTTP plumbing

use crate::error::UpstreamError;
use std::time::Duration;

/// Header carrying the shared secret between the engine and the backend
pub const INTERNAL_TOKEN_HEADER: &str = "X-Internal-Token";

/// User agent sent on every outbound request
pub const USER_AGENT: &str = concat!("recon/", env!("CARGO_PKG_VERSION"));

/// Maximum length for error body content kept in errors
const MAX_ERROR_BODY_LEN: usize = 200;

/// Client with the workspace user agent and the given timeout
///
/// # Errors
/// [`UpstreamError::Transport`] if the TLS backend cannot be initialized
pub fn build_client(
    service: &'static str,
    timeout: Duration,
) -> Result<reqwest::Client, UpstreamError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(USER_AGENT)
        .build()
        .map_err(|e| UpstreamError::transport(service, e))
}

/// Turn a non-2xx response into [`UpstreamError::Http`]
pub(crate) async fn check_status(
    service: &'static str,
    method: &'static str,
    resp: reqwest::Response,
) -> Result<reqwest::Response, UpstreamError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let url = resp.url().to_string();
    let body = resp.text().await.unwrap_or_default();
    Err(UpstreamError::Http {
        service,
        method,
        status: status.as_u16(),
        url,
        body: sanitize_error_body(&body),
    })
}

/// Truncate long bodies and drop any that look like they echo credentials
#[must_use]
pub fn sanitize_error_body(body: &str) -> String {
    const SECRET_PATTERNS: &[&str] = &[
        "token",
        "secret",
        "password",
        "credential",
        "bearer",
        "ghp_",
        "github_pat_",
    ];

    let truncated: String = if body.chars().count() > MAX_ERROR_BODY_LEN {
        let head: String = body.chars().take(MAX_ERROR_BODY_LEN).collect();
        format!("{head}... (truncated)")
    } else {
        body.to_string()
    };

    let lower = truncated.to_lowercase();
    if SECRET_PATTERNS.iter().any(|p| lower.contains(p)) {
        return "(error details redacted)".to_string();
    }
    truncated
}
