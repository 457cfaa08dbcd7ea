//! The three-phase pipeline behind a single seam

use crate::ensure_pr::PrEnsurer;
use crate::error::PhaseError;
use crate::live::LiveConfigChecker;
use crate::model::{ChangeSet, CheckLiveResponse, CheckOpenPrResponse, EnsurePrResponse};
use crate::open_pr::OpenPrMatcher;

/// Runs reconciliation phases, locally or on a remote router
#[async_trait::async_trait]
pub trait Reconciler: Send + Sync {
    /// Phase 0
    async fn check_live(&self, request: &ChangeSet) -> Result<CheckLiveResponse, PhaseError>;

    /// Phase 1
    async fn check_open_pr(&self, request: &ChangeSet)
        -> Result<CheckOpenPrResponse, PhaseError>;

    /// Phase 2
    async fn ensure_pr(&self, request: &ChangeSet) -> Result<EnsurePrResponse, PhaseError>;
}

/// In-process pipeline
#[derive(Clone)]
pub struct LocalReconciler {
    live: LiveConfigChecker,
    open_pr: OpenPrMatcher,
    ensure: PrEnsurer,
}

impl LocalReconciler {
    #[inline]
    #[must_use]
    pub fn new(live: LiveConfigChecker, open_pr: OpenPrMatcher, ensure: PrEnsurer) -> Self {
        Self {
            live,
            open_pr,
            ensure,
        }
    }
}

#[async_trait::async_trait]
impl Reconciler for LocalReconciler {
    async fn check_live(&self, request: &ChangeSet) -> Result<CheckLiveResponse, PhaseError> {
        self.live.check_live(request).await
    }

    async fn check_open_pr(
        &self,
        request: &ChangeSet,
    ) -> Result<CheckOpenPrResponse, PhaseError> {
        self.open_pr.check_open_pr(request).await
    }

    async fn ensure_pr(&self, request: &ChangeSet) -> Result<EnsurePrResponse, PhaseError> {
        self.ensure.ensure_pr(request).await
    }
}
