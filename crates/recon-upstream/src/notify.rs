//! Event fan-out and backend cache-invalidation callbacks

use crate::error::UpstreamError;
use crate::http::{build_client, check_status, INTERNAL_TOKEN_HEADER};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tokio::sync::broadcast;

const NOTIFY_SERVICE: &str = "notify";
const DEFAULT_HUB_CAPACITY: usize = 256;

/// A named event with a JSON payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub event: String,
    pub payload: Value,
    pub emitted_at: DateTime<Utc>,
}

/// Destination for plan lifecycle events
///
/// Failures are reported, but callers treat delivery as best-effort.
#[async_trait::async_trait]
pub trait NotificationSink: Send + Sync {
    async fn broadcast(&self, event: &str, payload: Value) -> Result<(), UpstreamError>;
}

/// In-process hub built on a tokio broadcast channel
///
/// Every subscriber sees every event emitted after it subscribed. Slow
/// subscribers lose the oldest events once `capacity` is exceeded.
#[derive(Debug, Clone)]
pub struct BroadcastHub {
    sender: broadcast::Sender<Notification>,
}

impl BroadcastHub {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_HUB_CAPACITY)
    }

    #[inline]
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Receive all subsequent notifications
    #[inline]
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.sender.subscribe()
    }

    #[inline]
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for BroadcastHub {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl NotificationSink for BroadcastHub {
    async fn broadcast(&self, event: &str, payload: Value) -> Result<(), UpstreamError> {
        let notification = Notification {
            event: event.to_string(),
            payload,
            emitted_at: Utc::now(),
        };
        // No subscribers is not an error; the event simply has no audience.
        match self.sender.send(notification) {
            Ok(n) => tracing::debug!("Broadcast {} to {} subscribers", event, n),
            Err(_) => tracing::debug!("Broadcast {} with no subscribers", event),
        }
        Ok(())
    }
}

#[derive(Debug, Serialize)]
struct ConfigUpdatedBody<'a> {
    env: &'a str,
    updated: &'a [String],
    version: &'a str,
}

/// Tells the backend that runtime config objects were republished
#[derive(Debug, Clone)]
pub struct ConfigUpdateNotifier {
    client: reqwest::Client,
    notify_url: Option<String>,
    token: String,
}

impl ConfigUpdateNotifier {
    /// A blank or missing `notify_url` makes every notification a no-op
    ///
    /// # Errors
    /// Returns [`UpstreamError::Transport`] if the HTTP client cannot be built
    pub fn new(
        notify_url: Option<&str>,
        token: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, UpstreamError> {
        Ok(Self {
            client: build_client(NOTIFY_SERVICE, timeout)?,
            notify_url: notify_url
                .map(str::trim)
                .filter(|u| !u.is_empty())
                .map(str::to_string),
            token: token.into(),
        })
    }

    #[inline]
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.notify_url.is_some()
    }

    /// POST `{env, updated, version}` to the notify URL
    ///
    /// # Errors
    /// Transport failures and non-2xx responses
    pub async fn notify_config_updated(
        &self,
        env: &str,
        updated: &[String],
        version: &str,
    ) -> Result<(), UpstreamError> {
        let Some(url) = self.notify_url.as_deref() else {
            tracing::debug!("Config update notify skipped: no notify URL configured");
            return Ok(());
        };

        let body = ConfigUpdatedBody {
            env,
            updated,
            version,
        };
        let resp = self
            .client
            .post(url)
            .header(INTERNAL_TOKEN_HEADER, self.token.as_str())
            .json(&body)
            .send()
            .await
            .map_err(|e| UpstreamError::transport(NOTIFY_SERVICE, e))?;
        check_status(NOTIFY_SERVICE, "POST", resp).await?;
        tracing::info!("Notified backend of config update {:?} at {}", updated, version);
        Ok(())
    }
}
