//! Phase 2: make sure a pull request carrying the change exists

use crate::error::PhaseError;
use crate::files::{into_object, render_document, ConfigFiles, Documents};
use crate::model::{
    ChangeSet, EnsurePrDecision, EnsurePrResponse, OpenPrDecision, ResolvedChangeSet,
};
use crate::open_pr::OpenPrMatcher;
use chrono::{DateTime, SecondsFormat, Utc};
use recon_upstream::GitHost;
use std::sync::Arc;

const MSG_REUSED: &str = "Change already exists in an open PR; returning that PR.";
const MSG_CREATED: &str = "Created new PR with requested config changes.";

/// Source of "now" for branch naming
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Fixed instant, for reproducible branch names
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// `config/agent/<env>/<timestamp>` with `:` and `.` removed from the RFC 3339 instant
#[must_use]
pub fn agent_branch_name(env: &str, at: DateTime<Utc>) -> String {
    let stamp: String = at
        .to_rfc3339_opts(SecondsFormat::Millis, true)
        .chars()
        .filter(|c| *c != ':' && *c != '.')
        .collect();
    format!("config/agent/{env}/{stamp}")
}

/// Reuses a matching open PR or opens a new one
#[derive(Clone)]
pub struct PrEnsurer {
    git: Arc<dyn GitHost>,
    matcher: OpenPrMatcher,
    files: ConfigFiles,
    clock: Arc<dyn Clock>,
}

impl PrEnsurer {
    #[must_use]
    pub fn new(git: Arc<dyn GitHost>, base_branch: impl Into<String>) -> Self {
        Self {
            matcher: OpenPrMatcher::new(Arc::clone(&git), base_branch),
            git,
            files: ConfigFiles::default(),
            clock: Arc::new(SystemClock),
        }
    }

    #[must_use]
    pub fn with_files(mut self, files: ConfigFiles) -> Self {
        self.matcher = self.matcher.with_files(files.clone());
        self.files = files;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    #[inline]
    #[must_use]
    pub fn base_branch(&self) -> &str {
        self.matcher.base_branch()
    }

    /// Return a matching open PR, or branch, commit and open a new one
    ///
    /// All validation and in-memory application happens before the first
    /// git mutation, so client errors and path conflicts never leave a
    /// stray branch behind.
    ///
    /// # Errors
    /// Client and path-conflict errors before any mutation; upstream errors
    /// from the git host at any step (intermediate state is then unknown)
    pub async fn ensure_pr(&self, request: &ChangeSet) -> Result<EnsurePrResponse, PhaseError> {
        let resolved = request.resolve()?;
        let base_branch = self.base_branch().to_string();
        OpenPrMatcher::require_base_branch(&base_branch)?;

        let existing = self.matcher.check_resolved(&resolved).await?;
        if existing.decision == OpenPrDecision::AlreadyInOpenPr {
            if let Some(best) = existing.matches.into_iter().next() {
                tracing::info!(
                    "Phase 2 env={} reusing PR #{} ({})",
                    resolved.env,
                    best.pr.number,
                    best.pr.head_ref
                );
                return Ok(EnsurePrResponse {
                    env: resolved.env,
                    base_branch,
                    decision: EnsurePrDecision::AlreadyInOpenPr,
                    head_branch: best.pr.head_ref.clone(),
                    pr: best.pr,
                    applied_checks: best.checks,
                    message: MSG_REUSED.to_string(),
                });
            }
        }

        let base_sha = self.git.get_branch_head_sha(&base_branch).await?;
        let docs = self.apply_in_memory(&resolved, &base_sha).await?;

        let head_branch = agent_branch_name(&resolved.env, self.clock.now());
        self.git.create_branch(&head_branch, &base_sha).await?;

        for target in resolved.targets() {
            let content = render_document(docs.get(target))?;
            let message = format!("config: update {} {} (agent)", resolved.env, target);
            self.git
                .upsert_text_file(&head_branch, self.files.path_for(target), &content, &message)
                .await?;
        }

        let title = format!("config: update {} (agent)", resolved.env);
        let body = pr_body(&base_branch, &resolved);
        let pr = self
            .git
            .create_pull_request(&base_branch, &head_branch, &title, &body)
            .await?;
        tracing::info!(
            "Phase 2 env={} created PR #{} from {}",
            resolved.env,
            pr.number,
            head_branch
        );

        Ok(EnsurePrResponse {
            env: resolved.env.clone(),
            base_branch,
            decision: EnsurePrDecision::CreatedNewPr,
            pr,
            head_branch,
            applied_checks: resolved.changes.iter().map(|c| c.applied()).collect(),
            message: MSG_CREATED.to_string(),
        })
    }

    /// Load touched documents at `base_sha` and apply every change to them
    async fn apply_in_memory(
        &self,
        resolved: &ResolvedChangeSet,
        base_sha: &str,
    ) -> Result<Documents, PhaseError> {
        let targets = resolved.targets();
        let mut docs =
            Documents::load_at_ref(self.git.as_ref(), &self.files, base_sha, &targets).await?;
        for &target in &targets {
            let doc = std::mem::take(docs.get_mut(target));
            docs.insert(target, into_object(self.files.path_for(target), doc)?);
        }
        for change in &resolved.changes {
            change
                .path
                .set(docs.get_mut(change.target), change.value.clone())?;
        }
        Ok(docs)
    }
}

fn pr_body(base_branch: &str, resolved: &ResolvedChangeSet) -> String {
    let mut body = format!("Triggered by agent.\n\nBase: `{base_branch}`\n\nChanges:\n");
    for change in &resolved.changes {
        body.push_str(&change.summary_line());
        body.push('\n');
    }
    body
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ConfigChange, Target};
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn branch_name_strips_separators() {
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 10, 20, 30).unwrap()
            + chrono::Duration::milliseconds(123);
        assert_eq!(
            agent_branch_name("live", at),
            "config/agent/live/2024-05-01T102030123Z"
        );
    }

    #[test]
    fn body_lists_changes() {
        let resolved = ChangeSet::new(
            "live",
            vec![
                ConfigChange::set(Target::Ui, "rateLimit.rpm", json!(123)),
                ConfigChange::set(Target::Policy, "rules.mode", json!("strict")),
            ],
        )
        .resolve()
        .unwrap();
        assert_eq!(
            pr_body("config/live", &resolved),
            "Triggered by agent.\n\nBase: `config/live`\n\nChanges:\n\
             - ui.rateLimit.rpm = 123\n\
             - policy.rules.mode = \"strict\"\n"
        );
    }
}
