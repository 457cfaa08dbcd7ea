//! Plan confirmation and execution
//!
//! Confirmation is a compare-and-set from `PROPOSED` to `CONFIRMED`; only the
//! caller that wins it runs the phases. Execution then walks
//! `CONFIRMED -> RUNNING -> COMPLETED | FAILED`, emitting a
//! `PLAN_EXECUTION_UPDATED` event at each step.
//!
//! Event delivery is best-effort: a failing [`NotificationSink`] is logged
//! and never changes the plan's outcome.

use crate::error::{PlanError, StoreError};
use crate::proposal::PlanProposal;
use crate::store::PlanStore;
use crate::types::{Plan, PlanId, PlanStatus};
use recon_phases::{
    ChangeSet, CheckLiveResponse, CheckOpenPrResponse, EnsurePrResponse, Reconciler,
};
use recon_upstream::NotificationSink;
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tokio::task::JoinHandle;

pub const EVENT_PLAN_CONFIRMED: &str = "PLAN_CONFIRMED";
pub const EVENT_PLAN_EXECUTION_UPDATED: &str = "PLAN_EXECUTION_UPDATED";

/// Step reported in `PLAN_EXECUTION_UPDATED` events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionPhase {
    Start,
    #[serde(rename = "PHASE_0_CHECK_LIVE")]
    CheckLive,
    #[serde(rename = "PHASE_1_CHECK_OPEN_PR")]
    CheckOpenPr,
    #[serde(rename = "PHASE_2_ENSURE_PR")]
    EnsurePr,
    Done,
    Error,
}

impl ExecutionPhase {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Start => "START",
            Self::CheckLive => "PHASE_0_CHECK_LIVE",
            Self::CheckOpenPr => "PHASE_1_CHECK_OPEN_PR",
            Self::EnsurePr => "PHASE_2_ENSURE_PR",
            Self::Done => "DONE",
            Self::Error => "ERROR",
        }
    }
}

impl std::fmt::Display for ExecutionPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of running a confirmed plan
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionReport {
    pub plan_id: PlanId,
    /// `COMPLETED` or `FAILED`
    pub status: PlanStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub check_live: Option<CheckLiveResponse>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub check_open_pr: Option<CheckOpenPrResponse>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ensure_pr: Option<EnsurePrResponse>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ExecutionReport {
    fn new(plan_id: PlanId) -> Self {
        Self {
            plan_id,
            status: PlanStatus::Running,
            check_live: None,
            check_open_pr: None,
            ensure_pr: None,
            error: None,
        }
    }

    #[inline]
    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.status == PlanStatus::Completed
    }
}

/// Drives confirmed plans through the reconciliation phases
#[derive(Clone)]
pub struct PlanExecutor {
    store: Arc<dyn PlanStore>,
    reconciler: Arc<dyn Reconciler>,
    sink: Arc<dyn NotificationSink>,
}

impl PlanExecutor {
    #[must_use]
    pub fn new(
        store: Arc<dyn PlanStore>,
        reconciler: Arc<dyn Reconciler>,
        sink: Arc<dyn NotificationSink>,
    ) -> Self {
        Self {
            store,
            reconciler,
            sink,
        }
    }

    /// Claim a `PROPOSED` plan for execution
    ///
    /// # Errors
    /// [`PlanError::NotProposed`] when the plan is in any other status; the
    /// plan is left untouched and no event is emitted.
    pub async fn confirm(&self, id: PlanId) -> Result<Plan, PlanError> {
        let plan = self
            .store
            .transition(id, PlanStatus::Proposed, PlanStatus::Confirmed, None)
            .await
            .map_err(|e| not_proposed(id, e))?;

        tracing::info!("Plan {} confirmed", id);
        self.notify(
            EVENT_PLAN_CONFIRMED,
            json!({
                "chatId": plan.chat_id,
                "planId": plan.id,
                "status": plan.status,
            }),
        )
        .await;
        Ok(plan)
    }

    /// Confirm and run to completion in the caller's task
    pub async fn confirm_and_execute(&self, id: PlanId) -> Result<ExecutionReport, PlanError> {
        let plan = self.confirm(id).await?;
        self.execute_confirmed(plan).await
    }

    /// Confirm now, run the phases on a spawned task
    ///
    /// A confirmation failure is returned immediately and nothing is spawned.
    pub async fn confirm_in_background(
        &self,
        id: PlanId,
    ) -> Result<JoinHandle<Result<ExecutionReport, PlanError>>, PlanError> {
        let plan = self.confirm(id).await?;
        let this = self.clone();
        Ok(tokio::spawn(async move { this.execute_confirmed(plan).await }))
    }

    /// Run a plan that is already `CONFIRMED`
    ///
    /// A phase failure is not an `Err`: the plan ends `FAILED` and the
    /// report carries the message. `Err` means the store refused a status
    /// change.
    pub async fn execute_confirmed(&self, plan: Plan) -> Result<ExecutionReport, PlanError> {
        let plan = self
            .store
            .transition(plan.id, PlanStatus::Confirmed, PlanStatus::Running, None)
            .await?;
        self.emit_phase(&plan, ExecutionPhase::Start, None).await;

        let mut report = ExecutionReport::new(plan.id);
        match self.run_phases(&plan, &mut report).await {
            Ok(()) => {
                let done = self
                    .store
                    .transition(plan.id, PlanStatus::Running, PlanStatus::Completed, None)
                    .await?;
                report.status = done.status;
                tracing::info!("Plan {} completed", plan.id);
                self.emit_phase(&done, ExecutionPhase::Done, None).await;
            }
            Err(e) => {
                let message = e.to_string();
                tracing::error!("Plan {} failed: {}", plan.id, message);
                let failed = self
                    .store
                    .transition(plan.id, PlanStatus::Running, PlanStatus::Failed, None)
                    .await?;
                report.status = failed.status;
                report.error = Some(message.clone());
                self.emit_phase(&failed, ExecutionPhase::Error, Some(("error", json!(message))))
                    .await;
            }
        }
        Ok(report)
    }

    async fn run_phases(&self, plan: &Plan, report: &mut ExecutionReport) -> Result<(), PlanError> {
        let request = change_set_for(plan)?;

        let live = self.reconciler.check_live(&request).await?;
        tracing::info!("Plan {} phase 0: {:?}", plan.id, live.decision);
        self.emit_phase(plan, ExecutionPhase::CheckLive, Some(("result", to_json(&live))))
            .await;
        report.check_live = Some(live);

        let open = self.reconciler.check_open_pr(&request).await?;
        tracing::info!("Plan {} phase 1: {:?}", plan.id, open.decision);
        self.emit_phase(plan, ExecutionPhase::CheckOpenPr, Some(("result", to_json(&open))))
            .await;
        report.check_open_pr = Some(open);

        let ensured = self.reconciler.ensure_pr(&request).await?;
        tracing::info!(
            "Plan {} phase 2: {:?} (PR #{})",
            plan.id,
            ensured.decision,
            ensured.pr.number
        );
        self.emit_phase(plan, ExecutionPhase::EnsurePr, Some(("result", to_json(&ensured))))
            .await;
        report.ensure_pr = Some(ensured);

        Ok(())
    }

    async fn emit_phase(&self, plan: &Plan, phase: ExecutionPhase, extra: Option<(&str, Value)>) {
        let mut payload = Map::new();
        payload.insert("chatId".into(), json!(plan.chat_id));
        payload.insert("planId".into(), json!(plan.id));
        payload.insert("status".into(), json!(plan.status));
        payload.insert("phase".into(), json!(phase));
        if let Some((key, value)) = extra {
            payload.insert(key.into(), value);
        }
        self.notify(EVENT_PLAN_EXECUTION_UPDATED, Value::Object(payload))
            .await;
    }

    async fn notify(&self, event: &str, payload: Value) {
        if let Err(e) = self.sink.broadcast(event, payload).await {
            tracing::warn!("Dropping {} event: {}", event, e);
        }
    }
}

/// Parse and validate the stored proposal into a phase request
fn change_set_for(plan: &Plan) -> Result<ChangeSet, PlanError> {
    let proposal = PlanProposal::from_value(&plan.proposal_json)
        .map_err(|e| PlanError::InvalidPlan { errors: vec![e] })?;
    let errors = proposal.validate();
    if !errors.is_empty() {
        return Err(PlanError::InvalidPlan { errors });
    }
    Ok(proposal.to_change_set())
}

fn not_proposed(id: PlanId, err: StoreError) -> PlanError {
    match err {
        StoreError::StatusMismatch { actual, .. } => PlanError::NotProposed { id, status: actual },
        other => other.into(),
    }
}

fn to_json<T: Serialize>(value: &T) -> Value {
    serde_json::to_value(value).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ChatId, MessageId};

    #[test]
    fn phase_wire_names() {
        for phase in [
            ExecutionPhase::Start,
            ExecutionPhase::CheckLive,
            ExecutionPhase::CheckOpenPr,
            ExecutionPhase::EnsurePr,
            ExecutionPhase::Done,
            ExecutionPhase::Error,
        ] {
            assert_eq!(json!(phase), json!(phase.as_str()));
        }
    }

    #[test]
    fn unparseable_proposal_is_invalid() {
        let plan = Plan::proposed(
            ChatId::new(),
            MessageId::new(),
            crate::proposal::parse_raw_proposal("not json"),
        );
        let err = change_set_for(&plan).unwrap_err();
        assert!(err.to_string().starts_with("Invalid plan: planVersion must be v1"));
    }
}
