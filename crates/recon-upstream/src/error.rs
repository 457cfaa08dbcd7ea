//! Upstream failure types

/// Failure talking to an external collaborator
#[derive(Debug, thiserror::Error)]
pub enum UpstreamError {
    /// Non-2xx response
    #[error("{service} {method} failed {status} for {url}")]
    Http {
        service: &'static str,
        method: &'static str,
        status: u16,
        url: String,
        /// Truncated, possibly redacted response body
        body: String,
    },

    /// Connection, TLS or timeout failure
    #[error("{service} request failed: {message}")]
    Transport {
        service: &'static str,
        message: String,
    },

    /// Response arrived but could not be understood
    #[error("malformed response from {service}: {message}")]
    Decode {
        service: &'static str,
        message: String,
    },

    /// Collaborator not configured (missing URL, token, owner...)
    #[error("configuration error: {0}")]
    Config(String),

    /// Caller supplied an unusable argument
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Local filesystem failure
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl UpstreamError {
    #[inline]
    pub(crate) fn transport(service: &'static str, err: impl std::fmt::Display) -> Self {
        Self::Transport {
            service,
            message: err.to_string(),
        }
    }

    #[inline]
    pub(crate) fn decode(service: &'static str, err: impl std::fmt::Display) -> Self {
        Self::Decode {
            service,
            message: err.to_string(),
        }
    }

    /// HTTP status of the failed response, if there was one
    #[inline]
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Check if the upstream answered 404
    #[inline]
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }

    /// Check if the failure is local misconfiguration rather than a remote fault
    #[inline]
    #[must_use]
    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }

    /// Check if the failure was caused by the caller's input
    #[inline]
    #[must_use]
    pub fn is_invalid_input(&self) -> bool {
        matches!(self, Self::InvalidInput(_))
    }
}
