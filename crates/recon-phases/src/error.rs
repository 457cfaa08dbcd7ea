//! Phase error types
//!
//! Every failure falls into one of five categories ([`ErrorKind`]) with a
//! fixed HTTP-style status, so transports can map errors without matching on
//! variants.

use recon_path::PathError;
use recon_upstream::UpstreamError;
use serde::{Deserialize, Serialize};

/// Failure category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    /// Bad request; nothing was attempted
    Client,
    /// A collaborator failed or answered garbage
    Upstream,
    /// A change cannot be applied to the existing document shape
    PathConflict,
    /// Engine is missing required configuration
    Config,
    /// Plan is not in the status the operation requires
    PlanState,
}

impl ErrorKind {
    #[inline]
    #[must_use]
    pub fn status_code(self) -> u16 {
        match self {
            Self::Client | Self::PathConflict => 400,
            Self::Upstream => 502,
            Self::Config => 500,
            Self::PlanState => 409,
        }
    }
}

/// Error raised by any reconciliation phase
#[derive(Debug, thiserror::Error)]
pub enum PhaseError {
    /// Invalid request
    #[error("{0}")]
    Client(String),

    /// Collaborator failure
    #[error(transparent)]
    Upstream(#[from] UpstreamError),

    /// Document returned by a collaborator is not usable JSON
    #[error("{message}")]
    MalformedDocument { message: String },

    /// Dot-path write failed
    #[error(transparent)]
    Path(#[from] PathError),

    /// Missing configuration
    #[error("{0}")]
    Config(String),

    /// Error reported by a remote reconciler
    #[error("{message}")]
    Remote { kind: ErrorKind, message: String },
}

impl PhaseError {
    /// Category of this error
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Client(_) => ErrorKind::Client,
            Self::Upstream(e) if e.is_config() => ErrorKind::Config,
            Self::Upstream(e) if e.is_invalid_input() => ErrorKind::Client,
            Self::Upstream(_) | Self::MalformedDocument { .. } => ErrorKind::Upstream,
            Self::Path(e) if e.is_conflict() => ErrorKind::PathConflict,
            Self::Path(_) => ErrorKind::Client,
            Self::Config(_) => ErrorKind::Config,
            Self::Remote { kind, .. } => *kind,
        }
    }

    /// HTTP-style status for this error
    #[inline]
    #[must_use]
    pub fn status_code(&self) -> u16 {
        self.kind().status_code()
    }

    /// Check if the caller's request caused this error
    #[inline]
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        matches!(self.kind(), ErrorKind::Client | ErrorKind::PathConflict)
    }

    /// Structured `{code, message, details}` body for transports
    #[must_use]
    pub fn to_api_error(&self) -> ApiError {
        ApiError {
            code: self.kind(),
            message: self.to_string(),
            details: Vec::new(),
        }
    }
}

/// Transport-neutral error body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiError {
    pub code: ErrorKind,
    pub message: String,
    #[serde(default)]
    pub details: Vec<String>,
}

/// Envelope `{"error": {...}}` used on the wire
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiErrorEnvelope {
    pub error: ApiError,
}

impl From<ApiError> for PhaseError {
    fn from(err: ApiError) -> Self {
        Self::Remote {
            kind: err.code,
            message: err.message,
        }
    }
}
