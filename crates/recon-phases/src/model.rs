//! Wire and domain types for config changes and phase responses
//!
//! Wire structs ([`ChangeSet`], [`ConfigChange`]) are deliberately loose so
//! that any caller can send them; [`ChangeSet::resolve`] turns them into the
//! strict [`ResolvedChangeSet`] every phase works from.

use crate::error::PhaseError;
use recon_path::DotPath;
use recon_upstream::OpenPullRequest;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Environment used when a request leaves `env` blank
pub const DEFAULT_ENV: &str = "live";

/// The only supported change operation
pub const OP_SET: &str = "set";

/// Largest change-set any phase accepts
pub const MAX_CHANGES: usize = 20;

/// Which config document a change addresses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Target {
    Ui,
    Policy,
}

impl Target {
    pub const ALL: [Target; 2] = [Target::Ui, Target::Policy];

    #[inline]
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ui => "ui",
            Self::Policy => "policy",
        }
    }

    /// Case- and whitespace-insensitive parse
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "ui" => Some(Self::Ui),
            "policy" => Some(Self::Policy),
            _ => None,
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One requested change, as sent over the wire
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ConfigChange {
    /// `ui` or `policy`
    #[serde(default)]
    pub target: String,
    /// Always `set`
    #[serde(default)]
    pub op: String,
    /// Dotted object path, e.g. `rateLimit.rpm`
    #[serde(default)]
    pub path: String,
    /// Desired value; absent means JSON null
    #[serde(default)]
    pub value: Value,
}

impl ConfigChange {
    /// Convenience constructor for a `set` change
    #[must_use]
    pub fn set(target: Target, path: impl Into<String>, value: Value) -> Self {
        Self {
            target: target.as_str().to_string(),
            op: OP_SET.to_string(),
            path: path.into(),
            value,
        }
    }

    /// Validate and normalize this change
    ///
    /// # Errors
    /// Returns [`PhaseError::Client`] for an unsupported op or target or a
    /// blank/malformed path
    pub fn resolve(&self) -> Result<ResolvedChange, PhaseError> {
        let op = self.op.trim().to_lowercase();
        if op != OP_SET {
            return Err(PhaseError::Client(format!("unsupported op: {}", self.op)));
        }
        let target = Target::parse(&self.target)
            .ok_or_else(|| PhaseError::Client(format!("unsupported target: {}", self.target)))?;
        if self.path.trim().is_empty() {
            return Err(PhaseError::Client("path is required".to_string()));
        }
        let path = DotPath::parse(&self.path).map_err(|e| PhaseError::Client(e.to_string()))?;

        Ok(ResolvedChange {
            target,
            path,
            value: self.value.clone(),
        })
    }
}

/// Request body shared by all three phases
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ChangeSet {
    #[serde(default)]
    pub env: String,
    #[serde(default)]
    pub changes: Vec<ConfigChange>,
}

impl ChangeSet {
    #[must_use]
    pub fn new(env: impl Into<String>, changes: Vec<ConfigChange>) -> Self {
        Self {
            env: env.into(),
            changes,
        }
    }

    /// Validate every change up front; no phase performs I/O on an invalid set
    ///
    /// # Errors
    /// Returns [`PhaseError::Client`] on the first invalid change, or when
    /// `changes` is empty or longer than [`MAX_CHANGES`]
    pub fn resolve(&self) -> Result<ResolvedChangeSet, PhaseError> {
        if self.changes.is_empty() {
            return Err(PhaseError::Client("changes[] is required".to_string()));
        }
        if self.changes.len() > MAX_CHANGES {
            return Err(PhaseError::Client("changes[] too large".to_string()));
        }
        let env = match self.env.trim() {
            "" => DEFAULT_ENV.to_string(),
            env => env.to_string(),
        };
        let changes = self
            .changes
            .iter()
            .map(ConfigChange::resolve)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ResolvedChangeSet { env, changes })
    }
}

/// A validated change
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedChange {
    pub target: Target,
    pub path: DotPath,
    pub value: Value,
}

impl ResolvedChange {
    /// Compare this change against a document (`Null` for an absent document)
    #[must_use]
    pub fn check_against(&self, document: &Value) -> FieldCheck {
        let observed = self.path.get(document).cloned();
        let matches = recon_path::matches(Some(&self.value), observed.as_ref());
        FieldCheck {
            target: self.target,
            path: self.path.to_string(),
            desired: self.value.clone(),
            observed,
            matches,
        }
    }

    /// Check recorded for a change that was just written
    #[must_use]
    pub fn applied(&self) -> FieldCheck {
        FieldCheck {
            target: self.target,
            path: self.path.to_string(),
            desired: self.value.clone(),
            observed: Some(self.value.clone()),
            matches: true,
        }
    }

    /// `- target.path = value` line used in PR bodies
    #[must_use]
    pub fn summary_line(&self) -> String {
        format!("- {}.{} = {}", self.target, self.path, self.value)
    }
}

/// A validated change-set with its effective environment
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedChangeSet {
    pub env: String,
    pub changes: Vec<ResolvedChange>,
}

impl ResolvedChangeSet {
    /// Targets referenced by at least one change, in first-use order
    #[must_use]
    pub fn targets(&self) -> Vec<Target> {
        let mut out = Vec::with_capacity(Target::ALL.len());
        for change in &self.changes {
            if !out.contains(&change.target) {
                out.push(change.target);
            }
        }
        out
    }
}

/// Result of comparing one change to one document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldCheck {
    pub target: Target,
    pub path: String,
    pub desired: Value,
    /// `None` when the path does not resolve
    pub observed: Option<Value>,
    pub matches: bool,
}

/// Phase 0 decision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LiveDecision {
    NoChangeNeeded,
    NeedsPr,
}

/// Phase 0 response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckLiveResponse {
    pub env: String,
    pub decision: LiveDecision,
    pub all_match: bool,
    pub checks: Vec<FieldCheck>,
    pub message: String,
}

/// Phase 1 decision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OpenPrDecision {
    AlreadyInOpenPr,
    NeedsNewPr,
}

/// An open PR whose head satisfies every change
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenPrMatch {
    pub pr: OpenPullRequest,
    pub all_match: bool,
    pub checks: Vec<FieldCheck>,
}

/// Phase 1 response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckOpenPrResponse {
    pub env: String,
    pub base_branch: String,
    pub decision: OpenPrDecision,
    pub open_pr_count: usize,
    pub matching_pr_count: usize,
    pub matches: Vec<OpenPrMatch>,
    pub message: String,
}

/// Phase 2 decision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EnsurePrDecision {
    AlreadyInOpenPr,
    CreatedNewPr,
}

/// Phase 2 response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnsurePrResponse {
    pub env: String,
    pub base_branch: String,
    pub decision: EnsurePrDecision,
    pub pr: OpenPullRequest,
    pub head_branch: String,
    pub applied_checks: Vec<FieldCheck>,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn target_parse_is_lenient() {
        assert_eq!(Target::parse(" UI "), Some(Target::Ui));
        assert_eq!(Target::parse("Policy"), Some(Target::Policy));
        assert_eq!(Target::parse("db"), None);
    }

    #[test]
    fn change_value_defaults_to_null() {
        let change: ConfigChange =
            serde_json::from_value(json!({"target": "ui", "op": "set", "path": "a"})).unwrap();
        assert_eq!(change.value, Value::Null);
    }

    #[test]
    fn resolve_normalizes() {
        let change = ConfigChange {
            target: " UI".into(),
            op: "SET ".into(),
            path: " rateLimit . rpm ".into(),
            value: json!(5),
        };
        let resolved = change.resolve().unwrap();
        assert_eq!(resolved.target, Target::Ui);
        assert_eq!(resolved.path.to_string(), "rateLimit.rpm");
    }

    #[test]
    fn resolve_rejects_bad_changes() {
        let base = ConfigChange::set(Target::Ui, "a", json!(1));

        let bad_op = ConfigChange { op: "delete".into(), ..base.clone() };
        assert_eq!(bad_op.resolve().unwrap_err().to_string(), "unsupported op: delete");

        let bad_target = ConfigChange { target: "db".into(), ..base.clone() };
        assert_eq!(
            bad_target.resolve().unwrap_err().to_string(),
            "unsupported target: db"
        );

        let blank_path = ConfigChange { path: "  ".into(), ..base.clone() };
        assert_eq!(blank_path.resolve().unwrap_err().to_string(), "path is required");

        let bad_path = ConfigChange { path: "a..b".into(), ..base };
        assert!(bad_path.resolve().unwrap_err().is_client_error());
    }

    #[test]
    fn change_set_defaults_env_and_requires_changes() {
        let empty = ChangeSet::new("prod", vec![]);
        assert_eq!(empty.resolve().unwrap_err().to_string(), "changes[] is required");

        let blank_env = ChangeSet::new("  ", vec![ConfigChange::set(Target::Ui, "a", json!(1))]);
        assert_eq!(blank_env.resolve().unwrap().env, DEFAULT_ENV);
    }

    #[test]
    fn targets_are_deduplicated_in_order() {
        let set = ChangeSet::new(
            "live",
            vec![
                ConfigChange::set(Target::Policy, "a", json!(1)),
                ConfigChange::set(Target::Ui, "b", json!(1)),
                ConfigChange::set(Target::Policy, "c", json!(1)),
            ],
        )
        .resolve()
        .unwrap();
        assert_eq!(set.targets(), vec![Target::Policy, Target::Ui]);
    }

    #[test]
    fn check_against_absent_document() {
        let change = ConfigChange::set(Target::Ui, "a.b", json!(1)).resolve().unwrap();
        let check = change.check_against(&Value::Null);
        assert_eq!(check.observed, None);
        assert!(!check.matches);
    }

    #[test]
    fn summary_line_renders_json_value() {
        let change = ConfigChange::set(Target::Policy, "rules.mode", json!("strict"))
            .resolve()
            .unwrap();
        assert_eq!(change.summary_line(), "- policy.rules.mode = \"strict\"");
    }

    #[test]
    fn field_check_wire_shape() {
        let check = FieldCheck {
            target: Target::Ui,
            path: "a".into(),
            desired: json!(1),
            observed: None,
            matches: false,
        };
        assert_eq!(
            serde_json::to_value(&check).unwrap(),
            json!({"target": "ui", "path": "a", "desired": 1, "observed": null, "matches": false})
        );
    }

    #[test]
    fn decisions_are_screaming_snake() {
        assert_eq!(
            serde_json::to_value(LiveDecision::NoChangeNeeded).unwrap(),
            json!("NO_CHANGE_NEEDED")
        );
        assert_eq!(
            serde_json::to_value(OpenPrDecision::AlreadyInOpenPr).unwrap(),
            json!("ALREADY_IN_OPEN_PR")
        );
        assert_eq!(
            serde_json::to_value(EnsurePrDecision::CreatedNewPr).unwrap(),
            json!("CREATED_NEW_PR")
        );
    }
}
