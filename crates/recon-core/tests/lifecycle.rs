use chrono::{TimeZone, Utc};
use pretty_assertions::assert_eq;
use recon_core::prelude::*;
use recon_core::{
    ExecutionPhase, ProposalKind, ToolCallStatus, EVENT_PLAN_CONFIRMED,
    EVENT_PLAN_EXECUTION_UPDATED,
};
use recon_phases::{
    EnsurePrDecision, FixedClock, LiveConfigChecker, LiveDecision, LocalReconciler,
    OpenPrMatcher, PrEnsurer, Reconciler,
};
use recon_test_utils::{FakeConfigBackend, FakeGitHost, RecordingSink};
use recon_upstream::{BroadcastHub, NotificationSink, UpstreamError};
use serde_json::{json, Value};

const BASE: &str = "config/live";

mockall::mock! {
    pub Sink {}

    #[async_trait::async_trait]
    impl NotificationSink for Sink {
        async fn broadcast(&self, event: &str, payload: Value) -> Result<(), UpstreamError>;
    }
}

fn proposal(rpm: i64) -> String {
    json!({
        "planVersion": "v1",
        "intent": "runtime_config_change",
        "env": "live",
        "summary": "Raise the UI rate limit",
        "requiresConfirmation": true,
        "changes": [
            {"target": "ui", "op": "set", "path": "rateLimit.rpm", "value": rpm}
        ]
    })
    .to_string()
}

struct Harness {
    store: Arc<InMemoryPlanStore>,
    service: PlanService,
    git: Arc<FakeGitHost>,
    backend: Arc<FakeConfigBackend>,
    reconciler: Arc<dyn Reconciler>,
}

impl Harness {
    fn new() -> Self {
        let git = Arc::new(
            FakeGitHost::new()
                .with_branch_head(BASE, "sha-live")
                .with_file("sha-live", "config/ui.json", r#"{"rateLimit":{"rpm":60}}"#)
                .with_file("sha-live", "config/policy.json", "{}"),
        );
        let backend = Arc::new(FakeConfigBackend::new(
            Some(r#"{"rateLimit":{"rpm":60}}"#),
            Some("{}"),
        ));
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 10, 20, 30).unwrap();
        let reconciler: Arc<dyn Reconciler> = Arc::new(LocalReconciler::new(
            LiveConfigChecker::new(backend.clone()),
            OpenPrMatcher::new(git.clone(), BASE),
            PrEnsurer::new(git.clone(), BASE).with_clock(Arc::new(FixedClock(at))),
        ));
        let store = Arc::new(InMemoryPlanStore::new());
        Self {
            service: PlanService::new(store.clone()),
            store,
            git,
            backend,
            reconciler,
        }
    }

    fn executor(&self, sink: Arc<dyn NotificationSink>) -> PlanExecutor {
        PlanExecutor::new(self.store.clone(), self.reconciler.clone(), sink)
    }
}

#[tokio::test]
async fn propose_supersedes_previous_proposals() {
    let h = Harness::new();
    let chat = ChatId::new();

    let first = h.service.propose(chat, MessageId::new(), &proposal(1)).await.unwrap();
    let second = h.service.propose(chat, MessageId::new(), &proposal(2)).await.unwrap();

    assert_eq!(h.service.get(first.id).await.unwrap().status, PlanStatus::Superseded);
    assert_eq!(h.service.get(second.id).await.unwrap().status, PlanStatus::Proposed);
    let listed: Vec<_> = h
        .service
        .list_for_chat(chat)
        .await
        .unwrap()
        .into_iter()
        .map(|p| p.id)
        .collect();
    assert_eq!(listed, vec![first.id, second.id]);
}

#[tokio::test]
async fn propose_stores_unparseable_text() {
    let h = Harness::new();
    let plan = h
        .service
        .propose(ChatId::new(), MessageId::new(), "I think we should raise it")
        .await
        .unwrap();

    assert_eq!(
        plan.proposal_json,
        json!({"type": "invalid_json_from_llm", "raw": "I think we should raise it"})
    );
    assert!(matches!(plan.kind(), ProposalKind::Unparseable { .. }));
    assert!(h.service.tool_calls(plan.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn propose_records_tool_calls() {
    let h = Harness::new();
    let raw = json!({"steps": [
        {"tool": "git_ls_files", "args": {"ref": "main"}},
        {"tool": "Delete Repo"}
    ]})
    .to_string();

    let plan = h.service.propose(ChatId::new(), MessageId::new(), &raw).await.unwrap();
    let calls = h.service.tool_calls(plan.id).await.unwrap();

    let statuses: Vec<_> = calls.iter().map(|c| c.status).collect();
    assert_eq!(statuses, vec![ToolCallStatus::Pending, ToolCallStatus::Failed]);
    assert_eq!(calls[1].error.as_deref(), Some("Tool not allowed: Delete Repo"));
}

#[tokio::test]
async fn reject_records_reason_and_blocks_confirmation() {
    let h = Harness::new();
    let plan = h.service.propose(ChatId::new(), MessageId::new(), &proposal(5)).await.unwrap();

    let rejected = h.service.reject(plan.id, " wrong env ").await.unwrap();
    assert_eq!(rejected.status, PlanStatus::Superseded);
    assert_eq!(rejected.rejection_reason.as_deref(), Some("wrong env"));

    let err = h.service.reject(plan.id, "again").await.unwrap_err();
    assert!(err.is_plan_state());

    let sink = Arc::new(RecordingSink::new());
    let err = h.executor(sink.clone()).confirm(plan.id).await.unwrap_err();
    assert_eq!(err.to_string(), "Plan is not PROPOSED (status=SUPERSEDED)");
    assert!(sink.events().is_empty());
}

#[tokio::test]
async fn confirm_runs_all_phases_and_opens_pr() {
    let h = Harness::new();
    let chat = ChatId::new();
    let plan = h.service.propose(chat, MessageId::new(), &proposal(120)).await.unwrap();
    let sink = Arc::new(RecordingSink::new());

    let report = h.executor(sink.clone()).confirm_and_execute(plan.id).await.unwrap();

    assert!(report.is_completed());
    assert_eq!(report.check_live.as_ref().unwrap().decision, LiveDecision::NeedsPr);
    let ensured = report.ensure_pr.as_ref().unwrap();
    assert_eq!(ensured.decision, EnsurePrDecision::CreatedNewPr);
    assert_eq!(ensured.pr.number, 100);
    assert_eq!(h.git.created_prs().len(), 1);
    assert_eq!(h.store.get(plan.id).await.unwrap().status, PlanStatus::Completed);

    assert_eq!(
        sink.event_names(),
        vec![
            EVENT_PLAN_CONFIRMED,
            EVENT_PLAN_EXECUTION_UPDATED,
            EVENT_PLAN_EXECUTION_UPDATED,
            EVENT_PLAN_EXECUTION_UPDATED,
            EVENT_PLAN_EXECUTION_UPDATED,
            EVENT_PLAN_EXECUTION_UPDATED,
        ]
    );
    assert_eq!(
        sink.phases(),
        vec![
            "START",
            "PHASE_0_CHECK_LIVE",
            "PHASE_1_CHECK_OPEN_PR",
            "PHASE_2_ENSURE_PR",
            "DONE"
        ]
    );

    let events = sink.events();
    assert_eq!(
        events[0].1,
        json!({"chatId": chat, "planId": plan.id, "status": "CONFIRMED"})
    );
    assert_eq!(events[2].1["status"], json!("RUNNING"));
    assert_eq!(events[2].1["result"]["decision"], json!("NEEDS_PR"));
    assert_eq!(events[4].1["result"]["decision"], json!("CREATED_NEW_PR"));
    assert_eq!(events[5].1["status"], json!("COMPLETED"));
}

#[tokio::test]
async fn phases_run_even_when_already_live() {
    let h = Harness::new();
    let plan = h.service.propose(ChatId::new(), MessageId::new(), &proposal(60)).await.unwrap();
    let sink = Arc::new(RecordingSink::new());

    let report = h.executor(sink.clone()).confirm_and_execute(plan.id).await.unwrap();

    assert_eq!(report.check_live.unwrap().decision, LiveDecision::NoChangeNeeded);
    assert!(report.ensure_pr.is_some());
    assert_eq!(sink.phases().len(), 5);
}

#[tokio::test]
async fn invalid_proposal_fails_execution() {
    let h = Harness::new();
    let raw = json!({"planVersion": "v2", "changes": []}).to_string();
    let plan = h.service.propose(ChatId::new(), MessageId::new(), &raw).await.unwrap();
    let sink = Arc::new(RecordingSink::new());

    let report = h.executor(sink.clone()).confirm_and_execute(plan.id).await.unwrap();

    assert_eq!(report.status, PlanStatus::Failed);
    let error = report.error.unwrap();
    assert!(error.starts_with("Invalid plan: planVersion must be v1; "));
    assert!(error.ends_with("changes[] is required"));
    assert_eq!(sink.phases(), vec!["START", "ERROR"]);
    assert_eq!(sink.events()[2].1["error"], json!(error));
    assert_eq!(h.backend.ui_calls(), 0);
    assert_eq!(h.git.mutation_count(), 0);
}

#[tokio::test]
async fn phase_failure_marks_plan_failed() {
    let h = Harness::new();
    let backend = Arc::new(FakeConfigBackend::new(None, None));
    let reconciler: Arc<dyn Reconciler> = Arc::new(LocalReconciler::new(
        LiveConfigChecker::new(backend),
        OpenPrMatcher::new(h.git.clone(), BASE),
        PrEnsurer::new(h.git.clone(), BASE),
    ));
    let plan = h.service.propose(ChatId::new(), MessageId::new(), &proposal(9)).await.unwrap();
    let sink = Arc::new(RecordingSink::new());

    let report = PlanExecutor::new(h.store.clone(), reconciler, sink.clone())
        .confirm_and_execute(plan.id)
        .await
        .unwrap();

    assert_eq!(report.status, PlanStatus::Failed);
    assert!(report.error.unwrap().contains("503"));
    assert_eq!(sink.phases(), vec!["START", "ERROR"]);
    assert_eq!(h.store.get(plan.id).await.unwrap().status, PlanStatus::Failed);
}

#[tokio::test]
async fn double_confirm_runs_phases_once() {
    let h = Harness::new();
    let plan = h.service.propose(ChatId::new(), MessageId::new(), &proposal(77)).await.unwrap();
    let executor = h.executor(Arc::new(RecordingSink::new()));

    let (a, b) = tokio::join!(
        executor.confirm_and_execute(plan.id),
        executor.confirm_and_execute(plan.id)
    );

    let outcomes = [a, b];
    let wins = outcomes.iter().filter(|r| r.is_ok()).count();
    assert_eq!(wins, 1);
    let loser = outcomes.into_iter().find_map(Result::err).unwrap();
    assert!(loser.is_plan_state());
    assert_eq!(loser.status_code(), 409);
    assert_eq!(h.backend.ui_calls(), 1);
    assert_eq!(h.git.created_prs().len(), 1);
}

#[tokio::test]
async fn background_confirmation() {
    let h = Harness::new();
    let plan = h.service.propose(ChatId::new(), MessageId::new(), &proposal(3)).await.unwrap();
    let executor = h.executor(Arc::new(RecordingSink::new()));

    let handle = executor.confirm_in_background(plan.id).await.unwrap();
    // Confirmation is visible before the task runs to completion.
    assert!(executor.confirm_in_background(plan.id).await.is_err());

    let report = handle.await.unwrap().unwrap();
    assert!(report.is_completed());
}

#[tokio::test]
async fn sink_failures_never_fail_the_plan() {
    let h = Harness::new();
    let plan = h.service.propose(ChatId::new(), MessageId::new(), &proposal(11)).await.unwrap();

    let mut sink = MockSink::new();
    sink.expect_broadcast().times(6).returning(|_, _| {
        Err(UpstreamError::Transport {
            service: "hub",
            message: "connection reset".into(),
        })
    });

    let report = h
        .executor(Arc::new(sink))
        .confirm_and_execute(plan.id)
        .await
        .unwrap();

    assert!(report.is_completed());
}

#[tokio::test]
async fn broadcast_hub_delivers_events() {
    let h = Harness::new();
    let plan = h.service.propose(ChatId::new(), MessageId::new(), &proposal(42)).await.unwrap();
    let hub = Arc::new(BroadcastHub::new());
    let mut rx = hub.subscribe();

    h.executor(hub.clone()).confirm_and_execute(plan.id).await.unwrap();

    let mut phases = Vec::new();
    while let Ok(n) = rx.try_recv() {
        if let Some(phase) = n.payload.get("phase").and_then(Value::as_str) {
            phases.push(phase.to_string());
        }
    }
    assert_eq!(phases.first().map(String::as_str), Some(ExecutionPhase::Start.as_str()));
    assert_eq!(phases.last().map(String::as_str), Some(ExecutionPhase::Done.as_str()));
}
