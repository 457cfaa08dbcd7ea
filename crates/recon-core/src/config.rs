//! Engine configuration
//!
//! Values come from an optional TOML file and are then overridden by
//! environment variables. Blank values count as unset.

use crate::error::PlanError;
use crate::tools::{ToolAllowList, DEFAULT_ALLOWED_TOOLS};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Reconciliation engine configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconConfig {
    /// GitHub token with contents and pull-request write access
    pub github_token: String,
    pub repo_owner: String,
    pub repo_name: String,
    pub github_api_base: String,
    /// Branch holding the live config documents
    pub config_branch_live: String,
    pub ui_path: String,
    pub policy_path: String,
    /// Backend serving `/ui-config` and `/policy`
    pub backend_public_base_url: String,
    /// Cache-invalidation callback; blank disables notification
    pub backend_notify_url: String,
    /// Shared secret sent as `X-Internal-Token`
    pub internal_token: String,
    /// Remote reconciliation router; blank runs the phases in-process
    pub router_url: String,
    /// Root directory for published runtime objects
    pub publish_dir: String,
    pub runtime_prefix: String,
    pub allowed_tools: Vec<String>,
    pub http_timeout_secs: u64,
}

impl Default for ReconConfig {
    fn default() -> Self {
        Self {
            github_token: String::new(),
            repo_owner: String::new(),
            repo_name: String::new(),
            github_api_base: "https://api.github.com".to_string(),
            config_branch_live: "config/live".to_string(),
            ui_path: "config/ui.json".to_string(),
            policy_path: "config/policy.json".to_string(),
            backend_public_base_url: String::new(),
            backend_notify_url: String::new(),
            internal_token: String::new(),
            router_url: String::new(),
            publish_dir: "publish".to_string(),
            runtime_prefix: "runtime/".to_string(),
            allowed_tools: DEFAULT_ALLOWED_TOOLS.iter().map(ToString::to_string).collect(),
            http_timeout_secs: 8,
        }
    }
}

fn set_if_present(field: &mut String, value: Option<String>) {
    if let Some(v) = value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty()) {
        *field = v;
    }
}

impl ReconConfig {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults overridden by the process environment
    #[must_use]
    pub fn from_env() -> Self {
        Self::default().with_env_overrides(|key| std::env::var(key).ok())
    }

    /// Parse a TOML document; missing keys keep their defaults
    ///
    /// # Errors
    /// [`PlanError::Config`] when the document is not valid TOML for this shape
    pub fn from_toml_str(content: &str) -> Result<Self, PlanError> {
        toml::from_str(content).map_err(|e| PlanError::Config(format!("invalid config file: {e}")))
    }

    /// Read `path` (when given) and apply environment overrides
    ///
    /// # Errors
    /// [`PlanError::Config`] when the file cannot be read or parsed
    pub fn load(path: Option<&Path>) -> Result<Self, PlanError> {
        let base = match path {
            Some(path) => {
                let content = std::fs::read_to_string(path).map_err(|e| {
                    PlanError::Config(format!("cannot read {}: {e}", path.display()))
                })?;
                Self::from_toml_str(&content)?
            }
            None => Self::default(),
        };
        Ok(base.with_env_overrides(|key| std::env::var(key).ok()))
    }

    /// Apply overrides from any variable source
    #[must_use]
    pub fn with_env_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        set_if_present(&mut self.github_token, lookup("GITHUB_TOKEN"));
        set_if_present(&mut self.repo_owner, lookup("REPO_OWNER"));
        set_if_present(&mut self.repo_name, lookup("REPO_NAME"));
        set_if_present(&mut self.github_api_base, lookup("GITHUB_API_BASE"));
        set_if_present(&mut self.config_branch_live, lookup("CONFIG_BRANCH_LIVE"));
        set_if_present(&mut self.ui_path, lookup("CONFIG_UI_PATH"));
        set_if_present(&mut self.policy_path, lookup("CONFIG_POLICY_PATH"));
        set_if_present(&mut self.backend_public_base_url, lookup("BACKEND_PUBLIC_BASE_URL"));
        set_if_present(&mut self.backend_notify_url, lookup("BACKEND_NOTIFY_URL"));
        set_if_present(&mut self.router_url, lookup("MCP_ROUTER_URL"));
        set_if_present(&mut self.publish_dir, lookup("PUBLISH_DIR"));
        set_if_present(&mut self.runtime_prefix, lookup("RUNTIME_PREFIX"));

        // MCP_INTERNAL_API_KEY wins over the older name.
        set_if_present(&mut self.internal_token, lookup("INTERNAL_NOTIFY_TOKEN"));
        set_if_present(&mut self.internal_token, lookup("MCP_INTERNAL_API_KEY"));

        if let Some(tools) = lookup("ALLOWED_TOOLS").filter(|t| !t.trim().is_empty()) {
            self.allowed_tools = tools
                .split(',')
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(str::to_string)
                .collect();
        }
        if let Some(secs) = lookup("HTTP_TIMEOUT_SECS").and_then(|s| s.trim().parse().ok()) {
            self.http_timeout_secs = secs;
        }
        self
    }

    #[inline]
    #[must_use]
    pub fn with_repo(mut self, owner: impl Into<String>, name: impl Into<String>) -> Self {
        self.repo_owner = owner.into();
        self.repo_name = name.into();
        self
    }

    #[inline]
    #[must_use]
    pub fn with_github_token(mut self, token: impl Into<String>) -> Self {
        self.github_token = token.into();
        self
    }

    #[inline]
    #[must_use]
    pub fn with_backend_public_base_url(mut self, url: impl Into<String>) -> Self {
        self.backend_public_base_url = url.into();
        self
    }

    #[inline]
    #[must_use]
    pub fn with_router_url(mut self, url: impl Into<String>) -> Self {
        self.router_url = url.into();
        self
    }

    #[inline]
    #[must_use]
    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs.max(1))
    }

    #[must_use]
    pub fn allow_list(&self) -> ToolAllowList {
        ToolAllowList::new(&self.allowed_tools)
    }

    /// Whether phases should be sent to a remote router
    #[inline]
    #[must_use]
    pub fn uses_router(&self) -> bool {
        !self.router_url.trim().is_empty()
    }

    /// Names of required settings that are blank
    ///
    /// Running the phases locally needs the git host and the backend; a
    /// remote router only needs its URL and token.
    #[must_use]
    pub fn missing(&self) -> Vec<&'static str> {
        let required: Vec<(&'static str, &str)> = if self.uses_router() {
            vec![("MCP_INTERNAL_API_KEY", self.internal_token.as_str())]
        } else {
            vec![
                ("GITHUB_TOKEN", self.github_token.as_str()),
                ("REPO_OWNER", self.repo_owner.as_str()),
                ("REPO_NAME", self.repo_name.as_str()),
                ("CONFIG_BRANCH_LIVE", self.config_branch_live.as_str()),
                ("BACKEND_PUBLIC_BASE_URL", self.backend_public_base_url.as_str()),
            ]
        };
        required
            .into_iter()
            .filter(|(_, v)| v.trim().is_empty())
            .map(|(k, _)| k)
            .collect()
    }

    /// # Errors
    /// [`PlanError::Config`] naming every missing setting
    pub fn validate(&self) -> Result<(), PlanError> {
        let missing = self.missing();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(PlanError::Config(format!("missing {}", missing.join(", "))))
        }
    }
}
