//! Plan proposals as written by the assistant
//!
//! A proposal arrives as raw text. [`parse_raw_proposal`] always yields a
//! JSON value (wrapping unparseable text), [`ProposalKind`] tells the shapes
//! apart, and [`PlanProposal::validate`] checks a structured proposal before
//! it is executed.

use recon_phases::{ChangeSet, ConfigChange, Target, MAX_CHANGES, OP_SET};
use schemars::JsonSchema;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{json, Value};

/// The only accepted `planVersion`
pub const PLAN_VERSION: &str = "v1";

/// The only accepted `intent`
pub const INTENT_RUNTIME_CONFIG_CHANGE: &str = "runtime_config_change";

/// `type` tag used to store text that was not JSON
pub const INVALID_JSON_TYPE: &str = "invalid_json_from_llm";

pub const MAX_SUMMARY_CHARS: usize = 140;

/// Structured runtime-config proposal
///
/// Every field is optional on the wire so that validation can report all
/// problems at once instead of failing on the first missing field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PlanProposal {
    /// Must be `v1`
    #[serde(default)]
    pub plan_version: Option<String>,
    /// Must be `runtime_config_change`
    #[serde(default)]
    pub intent: Option<String>,
    #[serde(default)]
    pub env: Option<String>,
    /// One line, at most 140 characters
    #[serde(default)]
    pub summary: Option<String>,
    /// Must be `true`
    #[serde(default)]
    pub requires_confirmation: bool,
    /// Between 1 and 20 changes
    #[serde(default)]
    pub changes: Option<Vec<Option<ProposedChange>>>,
}

/// One change inside a [`PlanProposal`]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ProposedChange {
    /// `ui` or `policy`
    #[serde(default)]
    pub target: Option<String>,
    /// `set`
    #[serde(default)]
    pub op: Option<String>,
    /// Dotted object path
    #[serde(default)]
    pub path: Option<String>,
    /// Required; an explicit `null` is allowed
    #[serde(
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    #[schemars(with = "Value")]
    pub value: Option<Value>,
}

/// Distinguishes a present `null` from a missing key
fn present<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

fn lower_trimmed(value: Option<&String>) -> String {
    value.map(|s| s.trim().to_lowercase()).unwrap_or_default()
}

fn is_blank(value: Option<&String>) -> bool {
    value.map_or(true, |s| s.trim().is_empty())
}

impl PlanProposal {
    /// Decode a stored proposal value
    ///
    /// # Errors
    /// Returns the serde message when the value does not have the proposal shape
    pub fn from_value(value: &Value) -> Result<Self, String> {
        Self::deserialize(value).map_err(|e| format!("plan is not a v1 proposal: {e}"))
    }

    /// Every violation, in field order; empty when the proposal is valid
    #[must_use]
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.plan_version.as_deref() != Some(PLAN_VERSION) {
            errors.push("planVersion must be v1".to_string());
        }
        if self.intent.as_deref() != Some(INTENT_RUNTIME_CONFIG_CHANGE) {
            errors.push("intent must be runtime_config_change".to_string());
        }
        if is_blank(self.env.as_ref()) {
            errors.push("env is required".to_string());
        }
        if is_blank(self.summary.as_ref()) {
            errors.push("summary is required".to_string());
        }
        if self
            .summary
            .as_ref()
            .is_some_and(|s| s.chars().count() > MAX_SUMMARY_CHARS)
        {
            errors.push("summary too long".to_string());
        }
        if !self.requires_confirmation {
            errors.push("requiresConfirmation must be true".to_string());
        }

        let changes = self.changes.as_deref().unwrap_or_default();
        if changes.is_empty() {
            errors.push("changes[] is required".to_string());
        }
        if changes.len() > MAX_CHANGES {
            errors.push("changes[] too large".to_string());
        }

        for (i, change) in changes.iter().enumerate() {
            let Some(change) = change else {
                errors.push(format!("changes[{i}] is null"));
                continue;
            };
            if Target::parse(&lower_trimmed(change.target.as_ref())).is_none() {
                errors.push(format!("changes[{i}].target invalid"));
            }
            if lower_trimmed(change.op.as_ref()) != OP_SET {
                errors.push(format!("changes[{i}].op must be set"));
            }
            if is_blank(change.path.as_ref()) {
                errors.push(format!("changes[{i}].path required"));
            }
            if change.value.is_none() {
                errors.push(format!("changes[{i}].value required"));
            }
        }
        errors
    }

    /// Wire change-set for the reconciliation phases
    ///
    /// Null entries are dropped; call [`validate`](Self::validate) first.
    #[must_use]
    pub fn to_change_set(&self) -> ChangeSet {
        let changes = self
            .changes
            .iter()
            .flatten()
            .flatten()
            .map(|c| ConfigChange {
                target: lower_trimmed(c.target.as_ref()),
                op: lower_trimmed(c.op.as_ref()),
                path: c.path.as_deref().unwrap_or_default().trim().to_string(),
                value: c.value.clone().unwrap_or(Value::Null),
            })
            .collect();
        ChangeSet::new(self.env.as_deref().unwrap_or_default().trim(), changes)
    }
}

/// Shape of a stored proposal
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ProposalKind<'a> {
    /// Structured config change with a `changes` array
    ConfigChange(&'a [Value]),
    /// Loose tool steps with a `steps` array
    ToolSteps(&'a [Value]),
    /// Text that was not JSON
    Unparseable { raw: &'a str },
    Unknown,
}

impl<'a> ProposalKind<'a> {
    #[must_use]
    pub fn classify(proposal: &'a Value) -> Self {
        if proposal.get("type").and_then(Value::as_str) == Some(INVALID_JSON_TYPE) {
            if let Some(raw) = proposal.get("raw").and_then(Value::as_str) {
                return Self::Unparseable { raw };
            }
        }
        if let Some(changes) = proposal.get("changes").and_then(Value::as_array) {
            return Self::ConfigChange(changes);
        }
        if let Some(steps) = proposal.get("steps").and_then(Value::as_array) {
            return Self::ToolSteps(steps);
        }
        Self::Unknown
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::ConfigChange(_) => "config_change",
            Self::ToolSteps(_) => "tool_steps",
            Self::Unparseable { .. } => "unparseable",
            Self::Unknown => "unknown",
        }
    }
}

/// Parse assistant output, wrapping anything that is not JSON
#[must_use]
pub fn parse_raw_proposal(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|e| {
        tracing::debug!("Proposal is not JSON ({}), storing raw text", e);
        json!({ "type": INVALID_JSON_TYPE, "raw": raw })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn valid() -> Value {
        json!({
            "planVersion": "v1",
            "intent": "runtime_config_change",
            "env": "live",
            "summary": "Raise the rate limit",
            "requiresConfirmation": true,
            "changes": [
                {"target": "policy", "op": "set", "path": "rateLimit.rpm", "value": 120}
            ],
            "rationale": "ignored"
        })
    }

    #[test]
    fn valid_proposal_has_no_errors() {
        let p = PlanProposal::from_value(&valid()).unwrap();
        assert!(p.validate().is_empty());
    }

    #[test]
    fn empty_object_reports_everything() {
        let p = PlanProposal::from_value(&json!({})).unwrap();
        assert_eq!(
            p.validate(),
            vec![
                "planVersion must be v1",
                "intent must be runtime_config_change",
                "env is required",
                "summary is required",
                "requiresConfirmation must be true",
                "changes[] is required",
            ]
        );
    }

    #[test]
    fn per_change_errors_are_indexed() {
        let mut v = valid();
        v["changes"] = json!([
            {"target": "db", "op": "delete", "path": " "},
            null,
            {"target": " UI ", "op": "SET", "path": "a", "value": null}
        ]);
        let p = PlanProposal::from_value(&v).unwrap();
        assert_eq!(
            p.validate(),
            vec![
                "changes[0].target invalid",
                "changes[0].op must be set",
                "changes[0].path required",
                "changes[0].value required",
                "changes[1] is null",
            ]
        );
    }

    #[test]
    fn summary_and_change_limits() {
        let mut v = valid();
        v["summary"] = json!("x".repeat(141));
        let change = json!({"target": "ui", "op": "set", "path": "a", "value": 1});
        v["changes"] = Value::Array(vec![change; 21]);
        let errors = PlanProposal::from_value(&v).unwrap().validate();
        assert_eq!(errors, vec!["summary too long", "changes[] too large"]);

        v["summary"] = json!("é".repeat(140));
        v["changes"] = json!([{"target": "ui", "op": "set", "path": "a", "value": 1}]);
        assert!(PlanProposal::from_value(&v).unwrap().validate().is_empty());
    }

    #[test]
    fn explicit_null_value_is_kept() {
        let mut v = valid();
        v["changes"] = json!([{"target": "Policy", "op": "set", "path": " a.b ", "value": null}]);
        let set = PlanProposal::from_value(&v).unwrap().to_change_set();
        assert_eq!(set.env, "live");
        assert_eq!(
            set.changes,
            vec![ConfigChange::set(Target::Policy, "a.b", Value::Null)]
        );
    }

    #[test]
    fn wrong_shape_is_a_decode_error() {
        let err = PlanProposal::from_value(&json!({"changes": "nope"})).unwrap_err();
        assert!(err.starts_with("plan is not a v1 proposal"));
    }

    #[test]
    fn classify_shapes() {
        let raw = parse_raw_proposal("sure, here is a plan");
        assert_eq!(
            ProposalKind::classify(&raw),
            ProposalKind::Unparseable {
                raw: "sure, here is a plan"
            }
        );
        assert_eq!(ProposalKind::classify(&valid()).name(), "config_change");
        let steps = json!({"steps": [{"tool": "text"}]});
        assert!(matches!(ProposalKind::classify(&steps), ProposalKind::ToolSteps(s) if s.len() == 1));
        assert_eq!(ProposalKind::classify(&json!([1, 2])), ProposalKind::Unknown);
    }

    #[test]
    fn parse_keeps_valid_json() {
        assert_eq!(parse_raw_proposal(r#"{"a":1}"#), json!({"a": 1}));
    }
}
