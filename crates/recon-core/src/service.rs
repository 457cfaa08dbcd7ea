//! Proposing, querying and rejecting plans

use crate::error::{PlanError, StoreError};
use crate::proposal::parse_raw_proposal;
use crate::store::PlanStore;
use crate::tools::{derive_tool_calls, ToolAllowList};
use crate::types::{ChatId, MessageId, Plan, PlanId, PlanStatus, ToolCall};
use std::sync::Arc;

/// Plan bookkeeping that never touches the reconciliation pipeline
#[derive(Clone)]
pub struct PlanService {
    store: Arc<dyn PlanStore>,
    allow_list: ToolAllowList,
}

impl PlanService {
    #[inline]
    #[must_use]
    pub fn new(store: Arc<dyn PlanStore>) -> Self {
        Self {
            store,
            allow_list: ToolAllowList::default(),
        }
    }

    #[inline]
    #[must_use]
    pub fn with_allow_list(mut self, allow_list: ToolAllowList) -> Self {
        self.allow_list = allow_list;
        self
    }

    #[inline]
    #[must_use]
    pub fn allow_list(&self) -> &ToolAllowList {
        &self.allow_list
    }

    /// Record assistant output as the chat's current plan
    ///
    /// Older `PROPOSED` plans of the chat are superseded first. Text that is
    /// not JSON is still stored, wrapped as `invalid_json_from_llm`.
    pub async fn propose(
        &self,
        chat_id: ChatId,
        message_id: MessageId,
        raw: &str,
    ) -> Result<Plan, PlanError> {
        let superseded = self.store.supersede_proposed(chat_id).await?;
        if superseded > 0 {
            tracing::info!("Superseded {} proposed plan(s) in chat {}", superseded, chat_id);
        }

        let plan = Plan::proposed(chat_id, message_id, parse_raw_proposal(raw));
        let calls = derive_tool_calls(plan.id, &plan.proposal_json, &self.allow_list);
        tracing::info!(
            "Proposed plan {} ({}) with {} tool call(s)",
            plan.id,
            plan.kind().name(),
            calls.len()
        );
        self.store.insert(plan.clone(), calls).await?;
        Ok(plan)
    }

    pub async fn get(&self, id: PlanId) -> Result<Plan, PlanError> {
        Ok(self.store.get(id).await?)
    }

    pub async fn list_for_chat(&self, chat_id: ChatId) -> Result<Vec<Plan>, PlanError> {
        Ok(self.store.list_for_chat(chat_id).await?)
    }

    pub async fn tool_calls(&self, id: PlanId) -> Result<Vec<ToolCall>, PlanError> {
        Ok(self.store.tool_calls(id).await?)
    }

    /// Decline a `PROPOSED` plan, recording why
    pub async fn reject(&self, id: PlanId, reason: &str) -> Result<Plan, PlanError> {
        let reason = Some(reason.trim().to_string()).filter(|r| !r.is_empty());
        match self
            .store
            .transition(id, PlanStatus::Proposed, PlanStatus::Superseded, reason)
            .await
        {
            Ok(plan) => {
                tracing::info!("Rejected plan {}", id);
                Ok(plan)
            }
            Err(StoreError::StatusMismatch { actual, .. }) => {
                Err(PlanError::NotProposed { id, status: actual })
            }
            Err(e) => Err(e.into()),
        }
    }
}
