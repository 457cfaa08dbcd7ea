//! Plan persistence
//!
//! Every status change goes through [`PlanStore::transition`], a
//! compare-and-set against the stored status that also consults the state
//! machine. Two concurrent confirmations of the same plan therefore cannot
//! both succeed.

use crate::error::StoreError;
use crate::state_machine::validate_transition;
use crate::types::{ChatId, Plan, PlanId, PlanStatus, ToolCall};
use chrono::Utc;
use dashmap::DashMap;

/// Storage for plans and their tool calls
#[async_trait::async_trait]
pub trait PlanStore: Send + Sync {
    /// Persist a new plan together with its derived tool calls
    async fn insert(&self, plan: Plan, tool_calls: Vec<ToolCall>) -> Result<(), StoreError>;

    async fn get(&self, id: PlanId) -> Result<Plan, StoreError>;

    /// Plans of a chat, oldest first
    async fn list_for_chat(&self, chat_id: ChatId) -> Result<Vec<Plan>, StoreError>;

    /// Move `id` from `from` to `to`, failing if its status is not `from`
    ///
    /// `rejection_reason` is recorded when given. Returns the updated plan.
    async fn transition(
        &self,
        id: PlanId,
        from: PlanStatus,
        to: PlanStatus,
        rejection_reason: Option<String>,
    ) -> Result<Plan, StoreError>;

    /// Mark every `PROPOSED` plan of a chat `SUPERSEDED`; returns how many
    async fn supersede_proposed(&self, chat_id: ChatId) -> Result<usize, StoreError>;

    async fn tool_calls(&self, plan_id: PlanId) -> Result<Vec<ToolCall>, StoreError>;
}

/// Plan store held in memory
#[derive(Debug, Default)]
pub struct InMemoryPlanStore {
    plans: DashMap<PlanId, Plan>,
    tool_calls: DashMap<PlanId, Vec<ToolCall>>,
}

impl InMemoryPlanStore {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.plans.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.plans.is_empty()
    }
}

#[async_trait::async_trait]
impl PlanStore for InMemoryPlanStore {
    async fn insert(&self, plan: Plan, tool_calls: Vec<ToolCall>) -> Result<(), StoreError> {
        if self.plans.contains_key(&plan.id) {
            return Err(StoreError::Backend(format!("duplicate plan id {}", plan.id)));
        }
        self.tool_calls.insert(plan.id, tool_calls);
        self.plans.insert(plan.id, plan);
        Ok(())
    }

    async fn get(&self, id: PlanId) -> Result<Plan, StoreError> {
        self.plans
            .get(&id)
            .map(|e| e.value().clone())
            .ok_or(StoreError::NotFound(id))
    }

    async fn list_for_chat(&self, chat_id: ChatId) -> Result<Vec<Plan>, StoreError> {
        let mut plans: Vec<Plan> = self
            .plans
            .iter()
            .filter(|e| e.chat_id == chat_id)
            .map(|e| e.value().clone())
            .collect();
        plans.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(plans)
    }

    async fn transition(
        &self,
        id: PlanId,
        from: PlanStatus,
        to: PlanStatus,
        rejection_reason: Option<String>,
    ) -> Result<Plan, StoreError> {
        // The entry lock is held for the whole check-and-write.
        let mut plan = self.plans.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        if plan.status != from {
            return Err(StoreError::StatusMismatch {
                id,
                expected: from,
                actual: plan.status,
            });
        }
        validate_transition(from, to)?;

        plan.status = to;
        if rejection_reason.is_some() {
            plan.rejection_reason = rejection_reason;
        }
        plan.updated_at = Utc::now();
        tracing::debug!("Plan {} {} -> {}", id, from, to);
        Ok(plan.clone())
    }

    async fn supersede_proposed(&self, chat_id: ChatId) -> Result<usize, StoreError> {
        let now = Utc::now();
        let mut count = 0;
        for mut plan in self.plans.iter_mut() {
            if plan.chat_id == chat_id && plan.status == PlanStatus::Proposed {
                plan.status = PlanStatus::Superseded;
                plan.updated_at = now;
                count += 1;
            }
        }
        Ok(count)
    }

    async fn tool_calls(&self, plan_id: PlanId) -> Result<Vec<ToolCall>, StoreError> {
        if !self.plans.contains_key(&plan_id) {
            return Err(StoreError::NotFound(plan_id));
        }
        Ok(self
            .tool_calls
            .get(&plan_id)
            .map(|e| e.value().clone())
            .unwrap_or_default())
    }
}
