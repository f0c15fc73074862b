use serde::{Deserialize, Serialize};

/// Serialized workflow document exchanged with the generation service.
///
/// The document is opaque to this crate apart from its `workflowCode` list,
/// which `extract::extract_latest_code` reads from the serialized form.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkflowDefinition(pub serde_json::Value);

impl WorkflowDefinition {
    /// Wraps an arbitrary JSON document.
    pub fn new(value: serde_json::Value) -> Self {
        Self(value)
    }

    /// Returns the underlying JSON document.
    pub fn as_value(&self) -> &serde_json::Value {
        &self.0
    }

    /// Returns `false` for `null` and the empty string.
    pub fn is_present(&self) -> bool {
        match &self.0 {
            serde_json::Value::Null => false,
            serde_json::Value::String(s) => !s.is_empty(),
            _ => true,
        }
    }

    /// Serializes to the 2-space pretty JSON form used as the session's
    /// definition text. Absent definitions serialize to an empty string.
    pub fn serialize(&self) -> String {
        if !self.is_present() {
            return String::new();
        }
        serde_json::to_string_pretty(&self.0).unwrap_or_else(|_| self.0.to_string())
    }
}

impl From<serde_json::Value> for WorkflowDefinition {
    fn from(value: serde_json::Value) -> Self {
        Self(value)
    }
}

/// Status embedded in every streamed response. A non-zero `code` is an
/// in-band failure.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpcStatus {
    #[serde(default)]
    pub code: i32,
    #[serde(default)]
    pub message: String,
}

impl RpcStatus {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Returns the failure message for a non-zero code, falling back to
    /// `default_message` when the server left it empty.
    pub fn failure_message(&self, default_message: &str) -> Option<String> {
        if self.code == 0 {
            return None;
        }
        if self.message.is_empty() {
            Some(default_message.to_string())
        } else {
            Some(self.message.clone())
        }
    }
}

/// Request for a fresh workflow built from a natural-language prompt.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateWorkflowRequest {
    pub prompt: String,
}

/// One streamed chunk of a generate call.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateWorkflowResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workflow_definition: Option<WorkflowDefinition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<RpcStatus>,
}

/// Request to revise an existing workflow with a change description.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FixWorkflowRequest {
    /// Serialized prior definition.
    pub workflow_definition: String,
    /// New instruction describing the desired change.
    pub description: String,
}

/// One streamed chunk of a fix call.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FixWorkflowResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fixed_workflow_definition: Option<WorkflowDefinition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub change_summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<RpcStatus>,
}

impl GenerateWorkflowResponse {
    /// Returns the definition when the chunk carries a non-empty one.
    pub fn definition(&self) -> Option<&WorkflowDefinition> {
        self.workflow_definition.as_ref().filter(|d| d.is_present())
    }
}

impl FixWorkflowResponse {
    /// Returns the fixed definition when the chunk carries a non-empty one.
    pub fn definition(&self) -> Option<&WorkflowDefinition> {
        self.fixed_workflow_definition
            .as_ref()
            .filter(|d| d.is_present())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn responses_use_camel_case_wire_names() {
        let raw = json!({
            "fixedWorkflowDefinition": {"workflowCode": []},
            "changeSummary": "Applied fixes",
            "status": {"code": 0, "message": ""}
        });
        let parsed: FixWorkflowResponse = serde_json::from_value(raw).expect("parse");
        assert_eq!(parsed.change_summary.as_deref(), Some("Applied fixes"));
        assert!(parsed.definition().is_some());

        let req = serde_json::to_value(FixWorkflowRequest {
            workflow_definition: "{}".into(),
            description: "add a step".into(),
        })
        .expect("serialize");
        assert_eq!(req, json!({"workflowDefinition": "{}", "description": "add a step"}));
    }

    #[test]
    fn empty_string_definition_is_absent() {
        let resp = GenerateWorkflowResponse {
            workflow_definition: Some(WorkflowDefinition::new(json!(""))),
            status: Some(RpcStatus::new(3, "INVALID_ARGUMENT: prompt is empty")),
        };
        assert!(resp.definition().is_none());
        assert_eq!(WorkflowDefinition::default().serialize(), "");
    }

    #[test]
    fn failure_message_falls_back_when_server_message_is_empty() {
        assert_eq!(RpcStatus::new(0, "ignored").failure_message("x"), None);
        assert_eq!(
            RpcStatus::new(13, "").failure_message("Generation error").as_deref(),
            Some("Generation error")
        );
        assert_eq!(
            RpcStatus::new(9, "FAILED_PRECONDITION").failure_message("Fix error").as_deref(),
            Some("FAILED_PRECONDITION")
        );
    }

    #[test]
    fn serialize_is_pretty_printed() {
        let def = WorkflowDefinition::new(json!({"workflowCode": [{"codeRevision": 1}]}));
        let text = def.serialize();
        assert!(text.starts_with("{\n  \"workflowCode\""));
    }
}
