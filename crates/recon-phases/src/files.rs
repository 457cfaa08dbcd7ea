//! Config document locations and loading

use crate::error::PhaseError;
use crate::model::Target;
use recon_upstream::GitHost;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

/// Repository paths of the two config documents
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigFiles {
    pub ui: String,
    pub policy: String,
}

impl ConfigFiles {
    #[inline]
    #[must_use]
    pub fn path_for(&self, target: Target) -> &str {
        match target {
            Target::Ui => &self.ui,
            Target::Policy => &self.policy,
        }
    }
}

impl Default for ConfigFiles {
    fn default() -> Self {
        Self {
            ui: "config/ui.json".to_string(),
            policy: "config/policy.json".to_string(),
        }
    }
}

/// One parsed document per target; unloaded or absent documents are `Null`
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct Documents {
    ui: Value,
    policy: Value,
}

impl Documents {
    pub(crate) fn get(&self, target: Target) -> &Value {
        match target {
            Target::Ui => &self.ui,
            Target::Policy => &self.policy,
        }
    }

    pub(crate) fn get_mut(&mut self, target: Target) -> &mut Value {
        match target {
            Target::Ui => &mut self.ui,
            Target::Policy => &mut self.policy,
        }
    }

    pub(crate) fn insert(&mut self, target: Target, document: Value) {
        *self.get_mut(target) = document;
    }

    /// Load `targets` from `git_ref`, one read per target
    pub(crate) async fn load_at_ref(
        git: &dyn GitHost,
        files: &ConfigFiles,
        git_ref: &str,
        targets: &[Target],
    ) -> Result<Self, PhaseError> {
        let mut docs = Self::default();
        for &target in targets {
            let path = files.path_for(target);
            let text = git.get_file_text(git_ref, path).await?;
            docs.insert(target, parse_document(path, text.as_deref())?);
        }
        Ok(docs)
    }
}

/// Parse document text; missing or blank text is an absent (`Null`) document
pub(crate) fn parse_document(source: &str, text: Option<&str>) -> Result<Value, PhaseError> {
    match text.map(str::trim) {
        None | Some("") => Ok(Value::Null),
        Some(text) => serde_json::from_str(text).map_err(|e| PhaseError::MalformedDocument {
            message: format!("invalid JSON in {source}: {e}"),
        }),
    }
}

/// Coerce a parsed document into a writable object; absent becomes `{}`
pub(crate) fn into_object(source: &str, document: Value) -> Result<Value, PhaseError> {
    match document {
        Value::Null => Ok(Value::Object(serde_json::Map::new())),
        Value::Object(_) => Ok(document),
        _ => Err(PhaseError::MalformedDocument {
            message: format!("expected JSON object at {source}"),
        }),
    }
}

/// Canonical on-disk rendering: pretty JSON with a trailing newline
pub(crate) fn render_document(document: &Value) -> Result<String, PhaseError> {
    let mut text = serde_json::to_string_pretty(document).map_err(|e| {
        PhaseError::MalformedDocument {
            message: format!("failed to render document: {e}"),
        }
    })?;
    text.push('\n');
    Ok(text)
}

/// Response for a raw file read
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetFileResponse {
    #[serde(rename = "ref")]
    pub git_ref: String,
    pub path: String,
    pub found: bool,
    pub content: String,
}

/// Reads arbitrary files from the config repository
#[derive(Clone)]
pub struct FileReader {
    git: Arc<dyn GitHost>,
}

impl FileReader {
    #[inline]
    #[must_use]
    pub fn new(git: Arc<dyn GitHost>) -> Self {
        Self { git }
    }

    /// Read `path` at `git_ref`; a missing file is `found: false` with empty content
    ///
    /// # Errors
    /// Blank `git_ref` or `path` is a client error; host failures are upstream errors
    pub async fn get_file(&self, git_ref: &str, path: &str) -> Result<GetFileResponse, PhaseError> {
        if git_ref.trim().is_empty() {
            return Err(PhaseError::Client("ref is required".to_string()));
        }
        if path.trim().is_empty() {
            return Err(PhaseError::Client("path is required".to_string()));
        }

        let text = self.git.get_file_text(git_ref, path).await?;
        tracing::debug!("get-file {}@{} found={}", path, git_ref, text.is_some());
        Ok(GetFileResponse {
            git_ref: git_ref.to_string(),
            path: path.to_string(),
            found: text.is_some(),
            content: text.unwrap_or_default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parse_blank_is_absent() {
        assert_eq!(parse_document("x", None).unwrap(), Value::Null);
        assert_eq!(parse_document("x", Some("  \n")).unwrap(), Value::Null);
        assert_eq!(parse_document("x", Some("null")).unwrap(), Value::Null);
    }

    #[test]
    fn parse_invalid_json_is_upstream() {
        let err = parse_document("config/ui.json", Some("{nope")).unwrap_err();
        assert_eq!(err.status_code(), 502);
        assert!(err.to_string().starts_with("invalid JSON in config/ui.json"));
    }

    #[test]
    fn into_object_coerces_absent() {
        assert_eq!(into_object("p", Value::Null).unwrap(), json!({}));
        assert_eq!(into_object("p", json!({"a": 1})).unwrap(), json!({"a": 1}));
        let err = into_object("config/policy.json", json!([1])).unwrap_err();
        assert_eq!(err.to_string(), "expected JSON object at config/policy.json");
    }

    #[test]
    fn render_is_pretty_with_newline() {
        let text = render_document(&json!({"a": {"b": 1}})).unwrap();
        assert_eq!(text, "{\n  \"a\": {\n    \"b\": 1\n  }\n}\n");
    }

    #[test]
    fn get_file_response_uses_ref_key() {
        let resp = GetFileResponse {
            git_ref: "main".into(),
            path: "a".into(),
            found: false,
            content: String::new(),
        };
        assert_eq!(
            serde_json::to_value(&resp).unwrap(),
            json!({"ref": "main", "path": "a", "found": false, "content": ""})
        );
    }
}
