//! Git host abstraction

use crate::error::UpstreamError;
use serde::{Deserialize, Serialize};

/// Read-only projection of an open pull request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenPullRequest {
    pub number: u64,
    pub title: String,
    pub html_url: String,
    pub head_sha: String,
    pub head_ref: String,
    pub base_ref: String,
    pub updated_at: String,
}

/// Logical operations the engine needs from a git host
///
/// Implementations must be safe to share across tasks.
#[async_trait::async_trait]
pub trait GitHost: Send + Sync {
    /// Text of `path` at `git_ref` (branch or SHA); `None` when the file does not exist
    async fn get_file_text(&self, git_ref: &str, path: &str)
        -> Result<Option<String>, UpstreamError>;

    /// Open pull requests targeting `base_branch`
    async fn list_open_pull_requests(
        &self,
        base_branch: &str,
    ) -> Result<Vec<OpenPullRequest>, UpstreamError>;

    /// Commit SHA at the tip of `branch`
    async fn get_branch_head_sha(&self, branch: &str) -> Result<String, UpstreamError>;

    /// Create `name` pointing at `from_sha`
    async fn create_branch(&self, name: &str, from_sha: &str) -> Result<(), UpstreamError>;

    /// Create or replace `path` on `branch` with a single commit
    async fn upsert_text_file(
        &self,
        branch: &str,
        path: &str,
        content: &str,
        message: &str,
    ) -> Result<(), UpstreamError>;

    /// Open a pull request from `head` into `base`
    async fn create_pull_request(
        &self,
        base: &str,
        head: &str,
        title: &str,
        body: &str,
    ) -> Result<OpenPullRequest, UpstreamError>;

    /// Human-readable identity, e.g. `github:owner/repo`
    fn name(&self) -> String;
}
