//! Builds collaborators from [`ReconConfig`]

use anyhow::{Context, Result};
use recon_core::ReconConfig;
use recon_phases::{
    CanonicalPublisher, ConfigFiles, FileReader, HttpReconciler, LiveConfigChecker,
    LocalReconciler, OpenPrMatcher, PrEnsurer, Reconciler,
};
use recon_upstream::{
    ConfigBackend, ConfigUpdateNotifier, DirectoryPublisher, GitHost, GitHubHost,
    HttpConfigBackend,
};
use std::sync::Arc;

pub struct Wiring {
    config: ReconConfig,
}

impl Wiring {
    #[must_use]
    pub fn new(config: ReconConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn config(&self) -> &ReconConfig {
        &self.config
    }

    #[must_use]
    pub fn files(&self) -> ConfigFiles {
        ConfigFiles {
            ui: self.config.ui_path.clone(),
            policy: self.config.policy_path.clone(),
        }
    }

    pub fn git_host(&self) -> Result<Arc<dyn GitHost>> {
        let cfg = &self.config;
        let host = GitHubHost::new(&cfg.github_token, &cfg.repo_owner, &cfg.repo_name)
            .context("configuring GitHub")?
            .with_api_base(&cfg.github_api_base)?
            .with_timeout(cfg.http_timeout())?;
        Ok(Arc::new(host))
    }

    pub fn backend(&self) -> Result<Arc<dyn ConfigBackend>> {
        let backend = HttpConfigBackend::new(&self.config.backend_public_base_url)
            .context("configuring the live config backend")?
            .with_timeout(self.config.http_timeout())?;
        Ok(Arc::new(backend))
    }

    /// Remote router when one is configured, otherwise the in-process pipeline
    pub fn reconciler(&self) -> Result<Arc<dyn Reconciler>> {
        let cfg = &self.config;
        if cfg.uses_router() {
            tracing::info!("Using reconciliation router at {}", cfg.router_url);
            let remote = HttpReconciler::new(&cfg.router_url, &cfg.internal_token, cfg.http_timeout())
                .context("configuring the reconciliation router")?;
            return Ok(Arc::new(remote));
        }

        let git = self.git_host()?;
        let files = self.files();
        Ok(Arc::new(LocalReconciler::new(
            LiveConfigChecker::new(self.backend()?),
            OpenPrMatcher::new(Arc::clone(&git), &cfg.config_branch_live).with_files(files.clone()),
            PrEnsurer::new(git, &cfg.config_branch_live).with_files(files),
        )))
    }

    pub fn canonical_publisher(&self) -> Result<CanonicalPublisher> {
        let cfg = &self.config;
        let notify_url = Some(cfg.backend_notify_url.as_str()).filter(|u| !u.trim().is_empty());
        let notifier = ConfigUpdateNotifier::new(notify_url, &cfg.internal_token, cfg.http_timeout())
            .context("configuring the backend notifier")?;
        Ok(CanonicalPublisher::new(
            self.git_host()?,
            Arc::new(DirectoryPublisher::new(&cfg.publish_dir)),
            &cfg.config_branch_live,
        )
        .with_files(self.files())
        .with_runtime_prefix(&cfg.runtime_prefix)
        .with_notifier(notifier))
    }

    pub fn file_reader(&self) -> Result<FileReader> {
        Ok(FileReader::new(self.git_host()?))
    }
}
