//! Error types for the plan lifecycle
//!
//! [`StoreError`] covers persistence and compare-and-set failures;
//! [`PlanError`] is what service and executor callers see.

use crate::types::{PlanId, PlanStatus};
use recon_phases::{ApiError, ErrorKind, PhaseError};

/// Plan store errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// No plan with this id
    #[error("plan not found: {0}")]
    NotFound(PlanId),

    /// Compare-and-set lost: the plan is no longer in the expected status
    #[error("plan {id} is {actual}, expected {expected}")]
    StatusMismatch {
        id: PlanId,
        expected: PlanStatus,
        actual: PlanStatus,
    },

    /// The state machine forbids this transition
    #[error("illegal plan transition {from} -> {to}")]
    IllegalTransition { from: PlanStatus, to: PlanStatus },

    /// Storage backend failure
    #[error("plan store error: {0}")]
    Backend(String),
}

impl StoreError {
    #[inline]
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Check if the plan was in the wrong status for the operation
    #[inline]
    #[must_use]
    pub fn is_status_conflict(&self) -> bool {
        matches!(
            self,
            Self::StatusMismatch { .. } | Self::IllegalTransition { .. }
        )
    }
}

/// Plan lifecycle errors
#[derive(Debug, thiserror::Error)]
pub enum PlanError {
    /// Confirm or reject on a plan that is not `PROPOSED`
    #[error("Plan is not PROPOSED (status={status})")]
    NotProposed { id: PlanId, status: PlanStatus },

    #[error("plan not found: {0}")]
    NotFound(PlanId),

    /// Stored proposal failed validation
    #[error("Invalid plan: {}", .errors.join("; "))]
    InvalidPlan { errors: Vec<String> },

    /// Reconciliation phase failed
    #[error(transparent)]
    Phase(#[from] PhaseError),

    #[error(transparent)]
    Store(StoreError),

    /// Missing or invalid engine configuration
    #[error("configuration error: {0}")]
    Config(String),
}

impl From<StoreError> for PlanError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => Self::NotFound(id),
            other => Self::Store(other),
        }
    }
}

impl PlanError {
    /// Category of this error; `None` for a missing plan
    #[must_use]
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            Self::NotProposed { .. } => Some(ErrorKind::PlanState),
            Self::Store(e) if e.is_status_conflict() => Some(ErrorKind::PlanState),
            Self::InvalidPlan { .. } => Some(ErrorKind::Client),
            Self::Phase(e) => Some(e.kind()),
            Self::Store(_) | Self::Config(_) => Some(ErrorKind::Config),
            Self::NotFound(_) => None,
        }
    }

    /// HTTP-style status for this error
    #[must_use]
    pub fn status_code(&self) -> u16 {
        self.kind().map_or(404, ErrorKind::status_code)
    }

    #[inline]
    #[must_use]
    pub fn is_plan_state(&self) -> bool {
        self.kind() == Some(ErrorKind::PlanState)
    }

    /// Validation messages, when the stored proposal was invalid
    #[must_use]
    pub fn validation_errors(&self) -> &[String] {
        match self {
            Self::InvalidPlan { errors } => errors,
            _ => &[],
        }
    }

    /// Structured body for transports; `None` for a missing plan
    #[must_use]
    pub fn to_api_error(&self) -> Option<ApiError> {
        self.kind().map(|code| ApiError {
            code,
            message: self.to_string(),
            details: self.validation_errors().to_vec(),
        })
    }
}
