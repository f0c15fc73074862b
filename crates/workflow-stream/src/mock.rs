//! Deterministic in-process backend for demos and tests.

use std::sync::Mutex;
use std::time::Duration;

use futures::StreamExt as _;
use futures::stream;
use serde_json::json;
use tracing::debug;

use crate::client::WorkflowClient;
use crate::errors::StreamFailure;
use crate::model::{
    FixWorkflowRequest, FixWorkflowResponse, GenerateWorkflowRequest, GenerateWorkflowResponse,
    RpcStatus, WorkflowDefinition,
};
use crate::progress::ItemStream;

const INVALID_ARGUMENT: i32 = 3;
const FAILED_PRECONDITION: i32 = 9;

/// A request received by `MockWorkflowClient`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RecordedRequest {
    Generate(GenerateWorkflowRequest),
    Fix(FixWorkflowRequest),
}

/// `WorkflowClient` that answers from canned data with a per-item delay.
///
/// Generate streams three growing drafts; fix streams a draft then the final
/// definition with the description appended as a new code revision.
pub struct MockWorkflowClient {
    delay: Duration,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl Default for MockWorkflowClient {
    fn default() -> Self {
        Self::with_delay(Duration::from_millis(120))
    }
}

impl MockWorkflowClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a mock that waits `delay` before yielding each item.
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Returns every request received so far, oldest first.
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests
            .lock()
            .map(|requests| requests.clone())
            .unwrap_or_default()
    }

    fn record(&self, request: RecordedRequest) {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request);
        }
    }

    fn delayed<T: Send + 'static>(&self, items: Vec<T>, delay: Duration) -> ItemStream<T> {
        Box::pin(stream::iter(items).then(move |item| async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            Ok::<T, StreamFailure>(item)
        }))
    }
}

fn draft_code(prompt: &str, revision: usize) -> String {
    let mut lines = vec![
        format!("// {prompt}"),
        "const tab = await floorp.tabs.create({ active: true });".to_string(),
    ];
    if revision >= 2 {
        lines.push("const page = await floorp.tabs.read(tab.id);".to_string());
    }
    if revision >= 3 {
        lines.push("return { summary: page.text.slice(0, 200) };".to_string());
    }
    lines.join("\n")
}

fn generated_definition(prompt: &str, revisions: usize) -> WorkflowDefinition {
    let codes = (1..=revisions)
        .map(|rev| json!({ "codeRevision": rev, "code": draft_code(prompt, rev) }))
        .collect::<Vec<_>>();
    WorkflowDefinition::new(json!({
        "displayName": "Generated workflow",
        "description": prompt,
        "workflowCode": codes,
    }))
}

fn fix_failure(code: i32, message: &str) -> FixWorkflowResponse {
    FixWorkflowResponse {
        fixed_workflow_definition: None,
        change_summary: None,
        status: Some(RpcStatus::new(code, message)),
    }
}

fn apply_fix(
    mut doc: serde_json::Map<String, serde_json::Value>,
    description: &str,
) -> serde_json::Map<String, serde_json::Value> {
    let codes = doc
        .get("workflowCode")
        .and_then(|v| v.as_array())
        .cloned()
        .unwrap_or_default();
    let next_revision = codes
        .iter()
        .filter_map(|c| c.get("codeRevision").and_then(|v| v.as_i64()))
        .max()
        .unwrap_or(0)
        + 1;
    let base_code = codes
        .iter()
        .filter_map(|c| c.get("code").and_then(|v| v.as_str()))
        .last()
        .unwrap_or_default();
    let fixed_code = if base_code.is_empty() {
        format!("// fix: {description}")
    } else {
        format!("{base_code}\n// fix: {description}")
    };
    let mut codes = codes;
    codes.push(json!({ "codeRevision": next_revision, "code": fixed_code }));
    doc.insert("workflowCode".into(), json!(codes));
    doc.insert("notes".into(), json!(["fixed by mock", description]));
    doc
}

#[async_trait::async_trait]
impl WorkflowClient for MockWorkflowClient {
    async fn generate_workflow(
        &self,
        req: GenerateWorkflowRequest,
    ) -> Result<ItemStream<GenerateWorkflowResponse>, StreamFailure> {
        self.record(RecordedRequest::Generate(req.clone()));
        let prompt = req.prompt.trim();
        if prompt.is_empty() {
            let rejected = GenerateWorkflowResponse {
                workflow_definition: None,
                status: Some(RpcStatus::new(
                    INVALID_ARGUMENT,
                    "INVALID_ARGUMENT: prompt is empty",
                )),
            };
            return Ok(self.delayed(vec![rejected], Duration::ZERO));
        }

        debug!(prompt_len = prompt.len(), "mock generate");
        let partials = (1..=3)
            .map(|rev| GenerateWorkflowResponse {
                workflow_definition: Some(generated_definition(prompt, rev)),
                status: None,
            })
            .collect();
        Ok(self.delayed(partials, self.delay))
    }

    async fn fix_workflow(
        &self,
        req: FixWorkflowRequest,
    ) -> Result<ItemStream<FixWorkflowResponse>, StreamFailure> {
        self.record(RecordedRequest::Fix(req.clone()));
        let definition = req.workflow_definition.trim();
        let description = req.description.trim();
        if definition.is_empty() || description.is_empty() {
            let message = if definition.is_empty() {
                "INVALID_ARGUMENT: workflow_definition is empty"
            } else {
                "INVALID_ARGUMENT: description is empty"
            };
            let rejected = fix_failure(INVALID_ARGUMENT, message);
            return Ok(self.delayed(vec![rejected], Duration::ZERO));
        }

        let doc = match serde_json::from_str::<serde_json::Value>(definition) {
            Ok(serde_json::Value::Object(doc)) => doc,
            Ok(_) => serde_json::Map::new(),
            Err(_) => {
                let rejected =
                    fix_failure(FAILED_PRECONDITION, "FAILED_PRECONDITION: invalid JSON");
                return Ok(self.delayed(vec![rejected], Duration::ZERO));
            }
        };

        debug!(description_len = description.len(), "mock fix");
        let fixed = apply_fix(doc, description);
        let mut draft = fixed.clone();
        draft.insert("draft".into(), json!(true));
        let partials = vec![
            FixWorkflowResponse {
                fixed_workflow_definition: Some(WorkflowDefinition::new(
                    serde_json::Value::Object(draft),
                )),
                change_summary: Some("Collecting issues".into()),
                status: None,
            },
            FixWorkflowResponse {
                fixed_workflow_definition: Some(WorkflowDefinition::new(
                    serde_json::Value::Object(fixed),
                )),
                change_summary: Some("Applied fixes".into()),
                status: None,
            },
        ];
        Ok(self.delayed(partials, self.delay))
    }
}
