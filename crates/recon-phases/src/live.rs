//! Phase 0: is the requested change already live?

use crate::error::PhaseError;
use crate::files::{parse_document, Documents};
use crate::model::{ChangeSet, CheckLiveResponse, LiveDecision, Target};
use recon_upstream::ConfigBackend;
use std::sync::Arc;

const MSG_ALREADY_LIVE: &str = "Already live (no change needed)";
const MSG_NOT_LIVE: &str = "Not live yet (agent should raise a PR)";

/// Compares requested changes with the live backend
#[derive(Clone)]
pub struct LiveConfigChecker {
    backend: Arc<dyn ConfigBackend>,
}

impl LiveConfigChecker {
    #[inline]
    #[must_use]
    pub fn new(backend: Arc<dyn ConfigBackend>) -> Self {
        Self { backend }
    }

    /// Evaluate every change against the live documents
    ///
    /// Each referenced target is fetched once; unreferenced targets are not fetched.
    ///
    /// # Errors
    /// Client errors for an invalid change-set (no I/O performed); upstream
    /// errors when the backend fails or returns malformed JSON
    pub async fn check_live(&self, request: &ChangeSet) -> Result<CheckLiveResponse, PhaseError> {
        let resolved = request.resolve()?;

        let mut docs = Documents::default();
        for target in resolved.targets() {
            let text = match target {
                Target::Ui => self.backend.ui_document().await?,
                Target::Policy => self.backend.policy_document().await?,
            };
            docs.insert(target, parse_document(target.as_str(), Some(&text))?);
        }

        let checks: Vec<_> = resolved
            .changes
            .iter()
            .map(|c| c.check_against(docs.get(c.target)))
            .collect();
        let all_match = checks.iter().all(|c| c.matches);

        let (decision, message) = if all_match {
            (LiveDecision::NoChangeNeeded, MSG_ALREADY_LIVE)
        } else {
            (LiveDecision::NeedsPr, MSG_NOT_LIVE)
        };
        tracing::info!(
            "Phase 0 env={} decision={:?} ({} checks)",
            resolved.env,
            decision,
            checks.len()
        );

        Ok(CheckLiveResponse {
            env: resolved.env,
            decision,
            all_match,
            checks,
            message: message.to_string(),
        })
    }
}
