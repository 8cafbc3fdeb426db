//! Anti-repetition nudge for side-effecting creation tools.
//!
//! Document and file creation is expensive and not idempotent; once such a
//! tool reports success the model is told, in-band, not to call it again.

use std::collections::HashSet;

use serde_json::Value;

use crate::settings::AgentSettings;

#[derive(Debug, Clone)]
pub struct CompletionGuard {
    creation_tools: HashSet<String>,
    markers: Vec<String>,
}

impl CompletionGuard {
    pub fn new(settings: &AgentSettings) -> Self {
        Self {
            creation_tools: settings.creation_tools.clone(),
            markers: settings
                .success_markers
                .iter()
                .map(|m| m.to_lowercase())
                .collect(),
        }
    }

    pub fn is_creation_tool(&self, tool: &str) -> bool {
        self.creation_tools.contains(tool)
    }

    /// Whether the compact rendering of `result` contains a success marker.
    /// A result that reports a failure never counts, whatever its text says.
    pub fn indicates_success(&self, result: &Value) -> bool {
        if reports_failure(result) {
            return false;
        }
        let rendered = match result {
            Value::String(s) => s.to_lowercase(),
            other => other.to_string().to_lowercase(),
        };
        self.markers.iter().any(|m| rendered.contains(m.as_str()))
    }

    /// The system note to inject, when `tool` is a creation tool that just succeeded.
    pub fn check(&self, tool: &str, result: &Value) -> Option<String> {
        if !self.is_creation_tool(tool) || !self.indicates_success(result) {
            return None;
        }
        Some(format!(
            "[system] The {tool} action completed successfully. Do not call {tool} again \
             for this request; report the result to the user."
        ))
    }
}

/// Failure shapes: `success: false`, a non-empty `error`, an error-like
/// `status`, or error wording in a plain string result.
fn reports_failure(result: &Value) -> bool {
    match result {
        Value::Object(map) => {
            if map.get("success").and_then(Value::as_bool) == Some(false) {
                return true;
            }
            let has_error = match map.get("error") {
                None | Some(Value::Null) | Some(Value::Bool(false)) => false,
                Some(Value::String(s)) => !s.trim().is_empty(),
                Some(_) => true,
            };
            let bad_status = map
                .get("status")
                .and_then(Value::as_str)
                .map(|s| matches!(s.to_ascii_lowercase().as_str(), "error" | "failed" | "failure"))
                .unwrap_or(false);
            has_error || bad_status
        }
        Value::String(s) => {
            let lower = s.to_lowercase();
            FAILURE_WORDING.iter().any(|w| lower.contains(w))
        }
        _ => false,
    }
}

const FAILURE_WORDING: &[&str] = &["error", "failed", "could not", "unable to"];

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn guard() -> CompletionGuard {
        CompletionGuard::new(&AgentSettings::default())
    }

    #[test]
    fn test_creation_success_produces_note() {
        let note = guard()
            .check("create_pdf", &json!({"success": true, "fileName": "a.pdf"}))
            .unwrap();
        assert!(note.contains("Do not call create_pdf again"));
    }

    #[test]
    fn test_failure_or_other_tools_are_ignored() {
        let g = guard();
        assert!(g.check("create_pdf", &json!({"success": false, "error": "disk full"})).is_none());
        assert!(g.check("web_search", &json!({"success": true})).is_none());
    }

    #[test]
    fn test_failed_creation_mentioning_created_is_not_success() {
        let g = guard();
        let failed = json!({"success": false, "error": "PDF could not be created: disk full"});
        assert!(!g.indicates_success(&failed));
        assert!(g.check("create_pdf", &failed).is_none());

        assert!(g
            .check("create_pdf", &json!({"status": "error", "message": "nothing created"}))
            .is_none());
        assert!(g
            .check("create_pdf", &json!({"error": "file was not created", "fileName": "a.pdf"}))
            .is_none());
        assert!(g
            .check("create_document", &json!("Error: document could not be created"))
            .is_none());
    }

    #[test]
    fn test_null_error_field_does_not_block_success() {
        let g = guard();
        assert!(g
            .check("create_pdf", &json!({"success": true, "error": null, "fileName": "a.pdf"}))
            .is_some());
    }

    #[test]
    fn test_string_results_are_matched_case_insensitively() {
        let g = guard();
        assert!(g.indicates_success(&json!("Document CREATED at /tmp/a.docx")));
        assert!(g.indicates_success(&json!({"Status": "SUCCESS"})));
        assert!(!g.indicates_success(&json!("nothing happened")));
    }
}
