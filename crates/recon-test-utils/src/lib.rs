//! Testing utilities for the recon workspace
//!
//! In-memory collaborators that record every call so tests can assert on
//! side effects (or their absence).

#![allow(missing_docs)]

use dashmap::DashMap;
use parking_lot::Mutex;
use recon_upstream::{
    ConfigBackend, GitHost, NotificationSink, ObjectPublisher, OpenPullRequest, PublishReceipt,
    UpstreamError,
};
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};

fn http_error(service: &'static str, method: &'static str, status: u16, url: &str) -> UpstreamError {
    UpstreamError::Http {
        service,
        method,
        status,
        url: url.to_string(),
        body: String::new(),
    }
}

/// One recorded `upsert_text_file`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Commit {
    pub branch: String,
    pub path: String,
    pub content: String,
    pub message: String,
}

/// One recorded `create_pull_request`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedPr {
    pub base: String,
    pub head: String,
    pub title: String,
    pub body: String,
}

/// In-memory git host
///
/// Files are keyed by `(ref, path)`; a ref can be a branch name or a SHA.
#[derive(Debug, Default)]
pub struct FakeGitHost {
    files: DashMap<(String, String), String>,
    heads: DashMap<String, String>,
    open_prs: Mutex<Vec<OpenPullRequest>>,
    branches: Mutex<Vec<(String, String)>>,
    commits: Mutex<Vec<Commit>>,
    created_prs: Mutex<Vec<CreatedPr>>,
    next_pr_number: AtomicUsize,
    fail_listing: Mutex<bool>,
    fail_pr_create: Mutex<bool>,
    get_file_calls: AtomicUsize,
    list_calls: AtomicUsize,
}

impl FakeGitHost {
    #[must_use]
    pub fn new() -> Self {
        Self {
            next_pr_number: AtomicUsize::new(100),
            ..Self::default()
        }
    }

    /// Store `content` at `path` on `git_ref`
    #[must_use]
    pub fn with_file(self, git_ref: &str, path: &str, content: &str) -> Self {
        self.files
            .insert((git_ref.to_string(), path.to_string()), content.to_string());
        self
    }

    /// Set the head SHA of `branch`
    #[must_use]
    pub fn with_branch_head(self, branch: &str, sha: &str) -> Self {
        self.heads.insert(branch.to_string(), sha.to_string());
        self
    }

    #[must_use]
    pub fn with_open_pr(self, pr: OpenPullRequest) -> Self {
        self.open_prs.lock().push(pr);
        self
    }

    /// Make `list_open_pull_requests` fail with HTTP 500
    #[must_use]
    pub fn with_failing_pr_listing(self) -> Self {
        *self.fail_listing.lock() = true;
        self
    }

    /// Make `create_pull_request` fail with HTTP 422 after branches and commits succeed
    #[must_use]
    pub fn with_failing_pr_create(self) -> Self {
        *self.fail_pr_create.lock() = true;
        self
    }

    #[must_use]
    pub fn branches_created(&self) -> Vec<(String, String)> {
        self.branches.lock().clone()
    }

    #[must_use]
    pub fn commits(&self) -> Vec<Commit> {
        self.commits.lock().clone()
    }

    #[must_use]
    pub fn created_prs(&self) -> Vec<CreatedPr> {
        self.created_prs.lock().clone()
    }

    /// Branches, commits and PRs created so far
    #[must_use]
    pub fn mutation_count(&self) -> usize {
        self.branches.lock().len() + self.commits.lock().len() + self.created_prs.lock().len()
    }

    #[must_use]
    pub fn get_file_calls(&self) -> usize {
        self.get_file_calls.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    /// Current content of `path` on `git_ref`
    #[must_use]
    pub fn file(&self, git_ref: &str, path: &str) -> Option<String> {
        self.files
            .get(&(git_ref.to_string(), path.to_string()))
            .map(|e| e.value().clone())
    }
}

/// Build a PR projection with conventional defaults
#[must_use]
pub fn open_pr(number: u64, head_sha: &str, base_ref: &str) -> OpenPullRequest {
    OpenPullRequest {
        number,
        title: format!("PR {number}"),
        html_url: format!("https://git.example/pull/{number}"),
        head_sha: head_sha.to_string(),
        head_ref: format!("feature/{number}"),
        base_ref: base_ref.to_string(),
        updated_at: "2024-01-01T00:00:00Z".to_string(),
    }
}

#[async_trait::async_trait]
impl GitHost for FakeGitHost {
    async fn get_file_text(
        &self,
        git_ref: &str,
        path: &str,
    ) -> Result<Option<String>, UpstreamError> {
        self.get_file_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.file(git_ref, path))
    }

    async fn list_open_pull_requests(
        &self,
        _base_branch: &str,
    ) -> Result<Vec<OpenPullRequest>, UpstreamError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if *self.fail_listing.lock() {
            return Err(http_error("fake-git", "GET", 500, "pulls"));
        }
        Ok(self.open_prs.lock().clone())
    }

    async fn get_branch_head_sha(&self, branch: &str) -> Result<String, UpstreamError> {
        self.heads
            .get(branch)
            .map(|e| e.value().clone())
            .ok_or_else(|| http_error("fake-git", "GET", 404, branch))
    }

    async fn create_branch(&self, name: &str, from_sha: &str) -> Result<(), UpstreamError> {
        let snapshot: Vec<_> = self
            .files
            .iter()
            .filter(|e| e.key().0 == from_sha)
            .map(|e| (e.key().1.clone(), e.value().clone()))
            .collect();
        for (path, content) in snapshot {
            self.files.insert((name.to_string(), path), content);
        }
        self.heads.insert(name.to_string(), from_sha.to_string());
        self.branches
            .lock()
            .push((name.to_string(), from_sha.to_string()));
        Ok(())
    }

    async fn upsert_text_file(
        &self,
        branch: &str,
        path: &str,
        content: &str,
        message: &str,
    ) -> Result<(), UpstreamError> {
        self.files
            .insert((branch.to_string(), path.to_string()), content.to_string());
        self.commits.lock().push(Commit {
            branch: branch.to_string(),
            path: path.to_string(),
            content: content.to_string(),
            message: message.to_string(),
        });
        Ok(())
    }

    async fn create_pull_request(
        &self,
        base: &str,
        head: &str,
        title: &str,
        body: &str,
    ) -> Result<OpenPullRequest, UpstreamError> {
        if *self.fail_pr_create.lock() {
            return Err(http_error("fake-git", "POST", 422, "pulls"));
        }
        let number = self.next_pr_number.fetch_add(1, Ordering::SeqCst) as u64;
        self.created_prs.lock().push(CreatedPr {
            base: base.to_string(),
            head: head.to_string(),
            title: title.to_string(),
            body: body.to_string(),
        });
        let head_sha = self
            .heads
            .get(head)
            .map(|e| e.value().clone())
            .unwrap_or_default();
        Ok(OpenPullRequest {
            number,
            title: title.to_string(),
            html_url: format!("https://git.example/pull/{number}"),
            head_sha,
            head_ref: head.to_string(),
            base_ref: base.to_string(),
            updated_at: "2024-01-01T00:00:00Z".to_string(),
        })
    }

    fn name(&self) -> String {
        "fake:repo".to_string()
    }
}

/// Live backend serving fixed documents; `None` answers HTTP 503
#[derive(Debug, Default)]
pub struct FakeConfigBackend {
    ui: Option<String>,
    policy: Option<String>,
    ui_calls: AtomicUsize,
    policy_calls: AtomicUsize,
}

impl FakeConfigBackend {
    #[must_use]
    pub fn new(ui: Option<&str>, policy: Option<&str>) -> Self {
        Self {
            ui: ui.map(str::to_string),
            policy: policy.map(str::to_string),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn ui_calls(&self) -> usize {
        self.ui_calls.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn policy_calls(&self) -> usize {
        self.policy_calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl ConfigBackend for FakeConfigBackend {
    async fn ui_document(&self) -> Result<String, UpstreamError> {
        self.ui_calls.fetch_add(1, Ordering::SeqCst);
        self.ui
            .clone()
            .ok_or_else(|| http_error("backend", "GET", 503, "/ui-config"))
    }

    async fn policy_document(&self) -> Result<String, UpstreamError> {
        self.policy_calls.fetch_add(1, Ordering::SeqCst);
        self.policy
            .clone()
            .ok_or_else(|| http_error("backend", "GET", 503, "/policy"))
    }
}

/// Notification sink that remembers everything
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<(String, Value)>>,
}

impl RecordingSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn events(&self) -> Vec<(String, Value)> {
        self.events.lock().clone()
    }

    #[must_use]
    pub fn event_names(&self) -> Vec<String> {
        self.events.lock().iter().map(|(n, _)| n.clone()).collect()
    }

    /// `payload.phase` of every event that has one
    #[must_use]
    pub fn phases(&self) -> Vec<String> {
        self.events
            .lock()
            .iter()
            .filter_map(|(_, p)| p.get("phase").and_then(Value::as_str).map(str::to_string))
            .collect()
    }
}

#[async_trait::async_trait]
impl NotificationSink for RecordingSink {
    async fn broadcast(&self, event: &str, payload: Value) -> Result<(), UpstreamError> {
        self.events.lock().push((event.to_string(), payload));
        Ok(())
    }
}

/// Object store held in memory
#[derive(Debug, Default)]
pub struct MemoryPublisher {
    objects: DashMap<String, String>,
}

impl MemoryPublisher {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn object(&self, key: &str) -> Option<String> {
        self.objects.get(key).map(|e| e.value().clone())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

#[async_trait::async_trait]
impl ObjectPublisher for MemoryPublisher {
    async fn put_json(&self, key: &str, content: &str) -> Result<PublishReceipt, UpstreamError> {
        self.objects.insert(key.to_string(), content.to_string());
        Ok(PublishReceipt {
            location: self.location(),
            key: key.to_string(),
            bytes: content.len(),
        })
    }

    fn location(&self) -> String {
        "memory".to_string()
    }
}
