//! Publishing canonical config to the runtime object store

use crate::error::PhaseError;
use crate::files::ConfigFiles;
use crate::model::Target;
use recon_upstream::{ConfigUpdateNotifier, GitHost, ObjectPublisher, PublishReceipt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Environment label sent with config-updated notifications
pub const DEFAULT_PUBLISH_ENV: &str = "prod";

/// Result of republishing the live branch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishCanonicalResponse {
    #[serde(rename = "ref")]
    pub git_ref: String,
    /// Targets actually published, in `ui`, `policy` order
    pub updated: Vec<String>,
    pub location: String,
    pub ui_key: String,
    pub policy_key: String,
}

/// Copies validated config documents into the runtime store
#[derive(Clone)]
pub struct CanonicalPublisher {
    git: Arc<dyn GitHost>,
    publisher: Arc<dyn ObjectPublisher>,
    notifier: Option<ConfigUpdateNotifier>,
    live_branch: String,
    files: ConfigFiles,
    runtime_prefix: String,
    env: String,
}

impl CanonicalPublisher {
    #[must_use]
    pub fn new(
        git: Arc<dyn GitHost>,
        publisher: Arc<dyn ObjectPublisher>,
        live_branch: impl Into<String>,
    ) -> Self {
        Self {
            git,
            publisher,
            notifier: None,
            live_branch: live_branch.into().trim().to_string(),
            files: ConfigFiles::default(),
            runtime_prefix: "runtime/".to_string(),
            env: DEFAULT_PUBLISH_ENV.to_string(),
        }
    }

    #[inline]
    #[must_use]
    pub fn with_notifier(mut self, notifier: ConfigUpdateNotifier) -> Self {
        self.notifier = Some(notifier);
        self
    }

    #[inline]
    #[must_use]
    pub fn with_files(mut self, files: ConfigFiles) -> Self {
        self.files = files;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_runtime_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.runtime_prefix = prefix.into();
        self
    }

    #[inline]
    #[must_use]
    pub fn with_env(mut self, env: impl Into<String>) -> Self {
        self.env = env.into();
        self
    }

    /// Object key for a target, e.g. `runtime/ui.json`
    #[must_use]
    pub fn runtime_key(&self, target: Target) -> String {
        format!("{}{}.json", self.runtime_prefix, target)
    }

    /// Validate and publish one document
    ///
    /// # Errors
    /// Client errors for a blank or unknown kind, blank content or invalid
    /// JSON; upstream errors from the store
    pub async fn publish(&self, kind: &str, content: &str) -> Result<PublishReceipt, PhaseError> {
        if kind.trim().is_empty() {
            return Err(PhaseError::Client("kind is required".to_string()));
        }
        if content.trim().is_empty() {
            return Err(PhaseError::Client("content is required".to_string()));
        }
        let target = Target::parse(kind)
            .ok_or_else(|| PhaseError::Client(format!("unknown kind: {kind}")))?;
        serde_json::from_str::<serde_json::Value>(content)
            .map_err(|e| PhaseError::Client(format!("content is not valid JSON: {e}")))?;

        Ok(self
            .publisher
            .put_json(&self.runtime_key(target), content)
            .await?)
    }

    /// Publish every present document from the live branch, then notify
    ///
    /// # Errors
    /// Config error for a blank live branch; upstream errors from the git
    /// host, the store or the notifier
    pub async fn publish_canonical(&self) -> Result<PublishCanonicalResponse, PhaseError> {
        if self.live_branch.is_empty() {
            return Err(PhaseError::Config("CONFIG_BRANCH_LIVE is not set".to_string()));
        }

        let mut updated = Vec::new();
        for target in Target::ALL {
            let path = self.files.path_for(target);
            if let Some(text) = self.git.get_file_text(&self.live_branch, path).await? {
                self.publish(target.as_str(), &text).await?;
                updated.push(target.as_str().to_string());
            } else {
                tracing::warn!("{} missing on {}; not published", path, self.live_branch);
            }
        }

        if let Some(notifier) = &self.notifier {
            notifier
                .notify_config_updated(&self.env, &updated, &self.live_branch)
                .await?;
        }

        Ok(PublishCanonicalResponse {
            git_ref: self.live_branch.clone(),
            updated,
            location: self.publisher.location(),
            ui_key: self.runtime_key(Target::Ui),
            policy_key: self.runtime_key(Target::Policy),
        })
    }
}
