//! Core types for plans
//!
//! Defines the identifiers and records the lifecycle operates on:
//! - Plan, chat and message identifiers
//! - Plans and their status
//! - Tool calls derived from loose step proposals

use crate::proposal::ProposalKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            /// Generate a new random identifier
            #[inline]
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl std::str::FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s.trim()).map(Self)
            }
        }
    };
}

uuid_id!(
    /// Unique plan identifier
    PlanId
);
uuid_id!(
    /// Conversation a plan belongs to
    ChatId
);
uuid_id!(
    /// Message that carried the proposal text
    MessageId
);
uuid_id!(
    /// Unique tool call identifier
    ToolCallId
);

/// Plan lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PlanStatus {
    Proposed,
    Superseded,
    Confirmed,
    Running,
    Completed,
    Failed,
}

impl PlanStatus {
    pub const ALL: [PlanStatus; 6] = [
        PlanStatus::Proposed,
        PlanStatus::Superseded,
        PlanStatus::Confirmed,
        PlanStatus::Running,
        PlanStatus::Completed,
        PlanStatus::Failed,
    ];

    /// Wire name, e.g. `PROPOSED`
    #[inline]
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Proposed => "PROPOSED",
            Self::Superseded => "SUPERSEDED",
            Self::Confirmed => "CONFIRMED",
            Self::Running => "RUNNING",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
        }
    }

    /// Check if no further transition is possible
    #[inline]
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Superseded | Self::Completed | Self::Failed)
    }
}

impl std::fmt::Display for PlanStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A proposed configuration change awaiting (or past) confirmation
///
/// Plans are never deleted; they only move through statuses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Plan {
    pub id: PlanId,
    pub chat_id: ChatId,
    pub message_id: MessageId,
    pub status: PlanStatus,
    /// Parsed proposal, or an `invalid_json_from_llm` wrapper around the raw text
    pub proposal_json: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rejection_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Plan {
    /// Create a new plan in `PROPOSED`
    #[must_use]
    pub fn proposed(chat_id: ChatId, message_id: MessageId, proposal_json: Value) -> Self {
        let now = Utc::now();
        Self {
            id: PlanId::new(),
            chat_id,
            message_id,
            status: PlanStatus::Proposed,
            proposal_json,
            rejection_reason: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Classify the stored proposal
    #[inline]
    #[must_use]
    pub fn kind(&self) -> ProposalKind<'_> {
        ProposalKind::classify(&self.proposal_json)
    }
}

/// Tool call status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ToolCallStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
}

/// A single step of a loose tool-step proposal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCall {
    pub id: ToolCallId,
    pub plan_id: PlanId,
    /// Normalized tool name
    pub tool: String,
    /// Always a JSON object
    pub args_json: Value,
    pub status: ToolCallStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_json: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
