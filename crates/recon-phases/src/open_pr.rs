//! Phase 1: does an open pull request already contain the change?

use crate::error::PhaseError;
use crate::files::{ConfigFiles, Documents};
use crate::model::{
    ChangeSet, CheckOpenPrResponse, OpenPrDecision, OpenPrMatch, ResolvedChangeSet,
};
use recon_upstream::GitHost;
use std::sync::Arc;

const MSG_IN_OPEN_PR: &str = "Requested config change(s) already exist in an open PR. Agent should link the PR instead of opening a duplicate.";
const MSG_NEEDS_NEW_PR: &str =
    "No open PR already contains the requested config change(s). Agent should raise a new PR.";

/// Finds open PRs whose head already satisfies a change-set
#[derive(Clone)]
pub struct OpenPrMatcher {
    git: Arc<dyn GitHost>,
    base_branch: String,
    files: ConfigFiles,
}

impl OpenPrMatcher {
    #[must_use]
    pub fn new(git: Arc<dyn GitHost>, base_branch: impl Into<String>) -> Self {
        Self {
            git,
            base_branch: base_branch.into().trim().to_string(),
            files: ConfigFiles::default(),
        }
    }

    #[inline]
    #[must_use]
    pub fn with_files(mut self, files: ConfigFiles) -> Self {
        self.files = files;
        self
    }

    #[inline]
    #[must_use]
    pub fn base_branch(&self) -> &str {
        &self.base_branch
    }

    pub(crate) fn require_base_branch(base_branch: &str) -> Result<(), PhaseError> {
        if base_branch.is_empty() {
            Err(PhaseError::Config("CONFIG_BRANCH_LIVE is not set".to_string()))
        } else {
            Ok(())
        }
    }

    /// Evaluate every open PR into the base branch
    ///
    /// # Errors
    /// Client errors for an invalid change-set, a config error for a blank
    /// base branch, upstream errors from the git host
    pub async fn check_open_pr(
        &self,
        request: &ChangeSet,
    ) -> Result<CheckOpenPrResponse, PhaseError> {
        let resolved = request.resolve()?;
        self.check_resolved(&resolved).await
    }

    pub(crate) async fn check_resolved(
        &self,
        resolved: &ResolvedChangeSet,
    ) -> Result<CheckOpenPrResponse, PhaseError> {
        Self::require_base_branch(&self.base_branch)?;

        let open = self.git.list_open_pull_requests(&self.base_branch).await?;
        let open_pr_count = open.len();
        let mut candidates: Vec<_> = open
            .into_iter()
            .filter(|pr| pr.base_ref == self.base_branch)
            .collect();
        candidates.sort_by_key(|pr| pr.number);

        let targets = resolved.targets();
        let mut matches = Vec::new();
        for pr in candidates {
            // A PR without a head SHA has nothing to read; every check sees an absent document.
            let docs = if pr.head_sha.trim().is_empty() {
                Documents::default()
            } else {
                Documents::load_at_ref(self.git.as_ref(), &self.files, &pr.head_sha, &targets)
                    .await?
            };
            let checks: Vec<_> = resolved
                .changes
                .iter()
                .map(|c| c.check_against(docs.get(c.target)))
                .collect();

            if checks.iter().all(|c| c.matches) {
                tracing::debug!("PR #{} satisfies all {} changes", pr.number, checks.len());
                matches.push(OpenPrMatch {
                    pr,
                    all_match: true,
                    checks,
                });
            }
        }

        let (decision, message) = if matches.is_empty() {
            (OpenPrDecision::NeedsNewPr, MSG_NEEDS_NEW_PR)
        } else {
            (OpenPrDecision::AlreadyInOpenPr, MSG_IN_OPEN_PR)
        };
        tracing::info!(
            "Phase 1 env={} base={} decision={:?} open={} matching={}",
            resolved.env,
            self.base_branch,
            decision,
            open_pr_count,
            matches.len()
        );

        Ok(CheckOpenPrResponse {
            env: resolved.env.clone(),
            base_branch: self.base_branch.clone(),
            decision,
            open_pr_count,
            matching_pr_count: matches.len(),
            matches,
            message: message.to_string(),
        })
    }
}
