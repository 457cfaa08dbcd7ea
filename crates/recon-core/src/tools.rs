//! Tool calls derived from loose step proposals

use crate::types::{PlanId, ToolCall, ToolCallId, ToolCallStatus};
use chrono::Utc;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};
use std::collections::BTreeSet;

static WHITESPACE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s+").expect("valid whitespace regex"));
static DISALLOWED_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^a-z0-9_\-]").expect("valid tool-name regex"));

/// Tools permitted when no allow-list is configured
pub const DEFAULT_ALLOWED_TOOLS: [&str; 3] = ["git_ls_files", "git_ls", "text"];

/// Canonical tool name: trimmed, lowercase, whitespace runs as `_`, and
/// nothing outside `[a-z0-9_-]`
#[must_use]
pub fn normalize_tool_name(raw: &str) -> String {
    let lower = raw.trim().to_lowercase();
    let underscored = WHITESPACE_RE.replace_all(&lower, "_");
    DISALLOWED_RE.replace_all(&underscored, "").into_owned()
}

/// Set of tool names a plan may call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolAllowList {
    tools: BTreeSet<String>,
}

impl ToolAllowList {
    /// Names are normalized on insert
    #[must_use]
    pub fn new<I, S>(tools: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            tools: tools
                .into_iter()
                .map(|t| normalize_tool_name(t.as_ref()))
                .filter(|t| !t.is_empty())
                .collect(),
        }
    }

    #[inline]
    #[must_use]
    pub fn contains(&self, normalized: &str) -> bool {
        self.tools.contains(normalized)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.tools.iter().map(String::as_str)
    }
}

impl Default for ToolAllowList {
    fn default() -> Self {
        Self::new(DEFAULT_ALLOWED_TOOLS)
    }
}

fn step_tool(step: &Value) -> Option<String> {
    match step.get("tool")? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// One [`ToolCall`] per usable entry of the proposal's `steps` array
///
/// Steps with a blank tool are skipped. Tools outside `allow` are recorded
/// as `FAILED` right away; everything else starts `PENDING`.
#[must_use]
pub fn derive_tool_calls(plan_id: PlanId, proposal: &Value, allow: &ToolAllowList) -> Vec<ToolCall> {
    let Some(steps) = proposal.get("steps").and_then(Value::as_array) else {
        return Vec::new();
    };

    let now = Utc::now();
    steps
        .iter()
        .filter_map(|step| {
            let raw = step_tool(step).filter(|t| !t.trim().is_empty())?;
            let args = match step.get("args") {
                Some(Value::Object(map)) => Value::Object(map.clone()),
                _ => Value::Object(Map::new()),
            };
            let tool = normalize_tool_name(&raw);
            let (status, error) = if allow.contains(&tool) {
                (ToolCallStatus::Pending, None)
            } else {
                tracing::warn!("Plan {} requested disallowed tool {:?}", plan_id, raw);
                (ToolCallStatus::Failed, Some(format!("Tool not allowed: {raw}")))
            };
            Some(ToolCall {
                id: ToolCallId::new(),
                plan_id,
                tool,
                args_json: args,
                status,
                result_json: None,
                error,
                created_at: now,
                updated_at: now,
            })
        })
        .collect()
}
