//! Recon Upstream
//!
//! Trait seams and HTTP implementations for everything the reconciliation
//! engine talks to:
//!
//! - [`GitHost`]: canonical config repository and its pull requests ([`GitHubHost`])
//! - [`ConfigBackend`]: the live configuration service ([`HttpConfigBackend`])
//! - [`NotificationSink`]: event fan-out to connected clients ([`BroadcastHub`])
//! - [`ObjectPublisher`]: runtime object store ([`DirectoryPublisher`])
//! - [`ConfigUpdateNotifier`]: cache invalidation callback to the backend

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod backend;
mod error;
mod git;
mod github;
mod http;
mod notify;
mod publish;

pub use backend::{ConfigBackend, HttpConfigBackend};
pub use error::UpstreamError;
pub use git::{GitHost, OpenPullRequest};
pub use github::GitHubHost;
pub use http::{build_client, sanitize_error_body, INTERNAL_TOKEN_HEADER, USER_AGENT};
pub use notify::{BroadcastHub, ConfigUpdateNotifier, Notification, NotificationSink};
pub use publish::{DirectoryPublisher, ObjectPublisher, PublishReceipt};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
