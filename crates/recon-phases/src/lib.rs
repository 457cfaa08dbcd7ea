//! Recon Phases
//!
//! The config reconciliation pipeline. A [`ChangeSet`] is checked against
//! three sources of truth in order:
//!
//! 1. [`LiveConfigChecker`]: is it already live?
//! 2. [`OpenPrMatcher`]: does an open pull request already carry it?
//! 3. [`PrEnsurer`]: reuse that PR, or branch, commit and open a new one.
//!
//! [`Reconciler`] hides whether the pipeline runs in-process
//! ([`LocalReconciler`]) or behind a router ([`HttpReconciler`]).
//! [`CanonicalPublisher`] copies the live branch into the runtime store.
//!
//! # Example
//!
//! ```rust,ignore
//! use recon_phases::{ChangeSet, ConfigChange, Target, LiveConfigChecker};
//!
//! let request = ChangeSet::new("live", vec![
//!     ConfigChange::set(Target::Ui, "rateLimit.rpm", serde_json::json!(120)),
//! ]);
//! let result = LiveConfigChecker::new(backend).check_live(&request).await?;
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod ensure_pr;
mod error;
mod files;
mod live;
mod model;
mod open_pr;
mod publish;
mod reconciler;
mod remote;

pub use ensure_pr::{agent_branch_name, Clock, FixedClock, PrEnsurer, SystemClock};
pub use error::{ApiError, ApiErrorEnvelope, ErrorKind, PhaseError};
pub use files::{ConfigFiles, FileReader, GetFileResponse};
pub use live::LiveConfigChecker;
pub use model::{
    ChangeSet, CheckLiveResponse, CheckOpenPrResponse, ConfigChange, EnsurePrDecision,
    EnsurePrResponse, FieldCheck, LiveDecision, OpenPrDecision, OpenPrMatch, ResolvedChange,
    ResolvedChangeSet, Target, DEFAULT_ENV, MAX_CHANGES, OP_SET,
};
pub use open_pr::OpenPrMatcher;
pub use publish::{CanonicalPublisher, PublishCanonicalResponse, DEFAULT_PUBLISH_ENV};
pub use reconciler::{LocalReconciler, Reconciler};
pub use remote::{HttpReconciler, CHECK_LIVE_PATH, CHECK_OPEN_PR_PATH, ENSURE_PR_PATH};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
