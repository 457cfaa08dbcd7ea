//! Runtime object publishing

use crate::error::UpstreamError;
use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};

/// Outcome of a single object write
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishReceipt {
    /// Store identity (bucket name, directory...)
    pub location: String,
    pub key: String,
    pub bytes: usize,
}

/// Key/value object store for runtime config
#[async_trait::async_trait]
pub trait ObjectPublisher: Send + Sync {
    async fn put_json(&self, key: &str, content: &str) -> Result<PublishReceipt, UpstreamError>;

    fn location(&self) -> String;
}

/// Publishes objects as files beneath a root directory
#[derive(Debug, Clone)]
pub struct DirectoryPublisher {
    root: PathBuf,
}

impl DirectoryPublisher {
    #[inline]
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[inline]
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve `key` under the root, rejecting absolute and parent-escaping keys
    fn resolve(&self, key: &str) -> Result<PathBuf, UpstreamError> {
        let relative = Path::new(key);
        let safe = !key.trim().is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
        if !safe {
            return Err(UpstreamError::InvalidInput(format!(
                "object key must be a relative path: {key}"
            )));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait::async_trait]
impl ObjectPublisher for DirectoryPublisher {
    async fn put_json(&self, key: &str, content: &str) -> Result<PublishReceipt, UpstreamError> {
        let target = self.resolve(key)?;
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        // Write-then-rename so readers never observe a half-written object.
        let staging = target.with_extension("json.tmp");
        tokio::fs::write(&staging, content.as_bytes()).await?;
        tokio::fs::rename(&staging, &target).await?;

        tracing::info!("Published {} ({} bytes) to {}", key, content.len(), self.location());
        Ok(PublishReceipt {
            location: self.location(),
            key: key.to_string(),
            bytes: content.len(),
        })
    }

    fn location(&self) -> String {
        self.root.display().to_string()
    }
}
