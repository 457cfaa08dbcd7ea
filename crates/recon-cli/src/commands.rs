//! Subcommand handlers

use crate::wiring::Wiring;
use anyhow::{bail, Context, Result};
use clap::ArgMatches;
use recon_core::{
    ChatId, InMemoryPlanStore, MessageId, PlanExecutor, PlanProposal, PlanService, ReconConfig,
};
use recon_phases::ChangeSet;
use recon_upstream::BroadcastHub;
use serde::Serialize;
use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Config file plus environment, with `--remote` applied last
pub fn load_config(args: &ArgMatches) -> Result<ReconConfig> {
    let path = args.get_one::<PathBuf>("config");
    let mut config = ReconConfig::load(path.map(PathBuf::as_path))?;
    if let Some(remote) = args.get_one::<String>("remote") {
        config = config.with_router_url(remote.as_str());
    }
    Ok(config)
}

/// Parse a change-set from `--request`, or stdin when absent or `-`
pub fn read_request(args: &ArgMatches) -> Result<ChangeSet> {
    let raw = match args.get_one::<PathBuf>("request") {
        Some(path) if path.as_os_str() != "-" => std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?,
        _ => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("reading request from stdin")?;
            buf
        }
    };
    parse_request(&raw)
}

pub fn parse_request(raw: &str) -> Result<ChangeSet> {
    serde_json::from_str(raw).context("request is not a valid {env, changes[]} document")
}

/// Dispatch the parsed command line
pub async fn run(matches: &ArgMatches) -> Result<()> {
    let Some((name, args)) = matches.subcommand() else {
        bail!("no subcommand given");
    };

    if name == "schema" {
        return schema(args);
    }

    let wiring = Wiring::new(load_config(args)?);
    match name {
        "check-live" => {
            let request = read_request(args)?;
            print_json(&wiring.reconciler()?.check_live(&request).await?)
        }
        "check-open-pr" => {
            let request = read_request(args)?;
            print_json(&wiring.reconciler()?.check_open_pr(&request).await?)
        }
        "ensure-pr" => {
            let request = read_request(args)?;
            print_json(&wiring.reconciler()?.ensure_pr(&request).await?)
        }
        "get-file" => {
            let git_ref = args.get_one::<String>("ref").map_or("", String::as_str);
            let path = args.get_one::<String>("path").map_or("", String::as_str);
            print_json(&wiring.file_reader()?.get_file(git_ref, path).await?)
        }
        "publish-canonical" => print_json(&wiring.canonical_publisher()?.publish_canonical().await?),
        "run-plan" => run_plan(&wiring, args).await,
        other => bail!("unknown subcommand: {other}"),
    }
}

fn schema(args: &ArgMatches) -> Result<()> {
    let kind = args.get_one::<String>("kind").map_or("proposal", String::as_str);
    print_json(&schema_json(kind)?)
}

/// JSON schema of a proposal (`proposal`) or a phase request (`change-set`)
pub fn schema_json(kind: &str) -> Result<serde_json::Value> {
    let schema = match kind {
        "proposal" => schemars::schema_for!(PlanProposal),
        "change-set" => schemars::schema_for!(ChangeSet),
        other => bail!("unknown schema kind: {other}"),
    };
    Ok(serde_json::to_value(schema)?)
}

async fn run_plan(wiring: &Wiring, args: &ArgMatches) -> Result<()> {
    let Some(path) = args.get_one::<PathBuf>("proposal") else {
        bail!("--proposal is required");
    };
    let raw = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let chat_id = match args.get_one::<String>("chat") {
        Some(id) => id.parse::<ChatId>().context("--chat is not a UUID")?,
        None => ChatId::new(),
    };

    let store = Arc::new(InMemoryPlanStore::new());
    let service = PlanService::new(store.clone()).with_allow_list(wiring.config().allow_list());
    let hub = Arc::new(BroadcastHub::new());
    let mut events = hub.subscribe();
    let printer = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => match serde_json::to_string(&event) {
                    Ok(line) => println!("{line}"),
                    Err(e) => tracing::warn!("Unprintable event {}: {}", event.event, e),
                },
                Err(RecvError::Lagged(n)) => tracing::warn!("Dropped {} events", n),
                Err(RecvError::Closed) => break,
            }
        }
    });

    let plan = service.propose(chat_id, MessageId::new(), &raw).await?;
    tracing::info!("Plan {} proposed ({})", plan.id, plan.kind().name());

    let executor = PlanExecutor::new(store, wiring.reconciler()?, hub);
    let report = executor.confirm_and_execute(plan.id).await?;
    drop(executor);
    printer.await.context("event printer panicked")?;

    print_json(&report)?;
    if !report.is_completed() {
        bail!(
            "plan {} failed: {}",
            report.plan_id,
            report.error.as_deref().unwrap_or("unknown error")
        );
    }
    Ok(())
}
