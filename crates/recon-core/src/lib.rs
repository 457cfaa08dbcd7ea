//! Recon Core - plan lifecycle
//!
//! Turns assistant output into plans and drives confirmed plans through the
//! reconciliation pipeline:
//! - Parses raw proposals and derives allow-listed tool calls
//! - Supersedes stale proposals per chat
//! - Confirms plans with a compare-and-set on their status
//! - Runs Phase 0, Phase 1 and Phase 2, emitting an event after each
//!
//! # Core Concepts
//!
//! - [`Plan`]: a proposal plus its [`PlanStatus`]
//! - [`PlanStore`]: persistence; every status change is a compare-and-set
//! - [`PlanService`]: propose, query and reject
//! - [`PlanExecutor`]: confirm and execute against any [`recon_phases::Reconciler`]
//!
//! # Example
//!
//! ```rust,ignore
//! use recon_core::prelude::*;
//!
//! let store = Arc::new(InMemoryPlanStore::new());
//! let service = PlanService::new(store.clone());
//! let plan = service.propose(chat_id, message_id, &assistant_text).await?;
//!
//! let executor = PlanExecutor::new(store, reconciler, sink);
//! let report = executor.confirm_and_execute(plan.id).await?;
//! println!("{}", report.status);
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod config;
pub mod error;
pub mod executor;
pub mod proposal;
pub mod service;
pub mod state_machine;
pub mod store;
pub mod tools;
pub mod types;

pub use config::ReconConfig;
pub use error::{PlanError, StoreError};
pub use executor::{
    ExecutionPhase, ExecutionReport, PlanExecutor, EVENT_PLAN_CONFIRMED,
    EVENT_PLAN_EXECUTION_UPDATED,
};
pub use proposal::{parse_raw_proposal, PlanProposal, ProposalKind, ProposedChange};
pub use service::PlanService;
pub use state_machine::{allowed_transitions, validate_transition};
pub use store::{InMemoryPlanStore, PlanStore};
pub use tools::{derive_tool_calls, normalize_tool_name, ToolAllowList};
pub use types::{
    ChatId, MessageId, Plan, PlanId, PlanStatus, ToolCall, ToolCallId, ToolCallStatus,
};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for working with Recon Core
    pub use crate::{
        ChatId, ExecutionReport, InMemoryPlanStore, MessageId, Plan, PlanError, PlanExecutor,
        PlanId, PlanService, PlanStatus, PlanStore, ReconConfig,
    };
    pub use std::sync::Arc;
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
