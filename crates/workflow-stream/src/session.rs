//! Two-phase generate/fix session over a `WorkflowClient`.
//!
//! The first prompt generates a workflow; every later prompt asks the service
//! to fix the generated definition. All displayed values (current code, diff,
//! flags) are derived on demand from the two streams' item histories.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, info};

use crate::client::WorkflowClient;
use crate::diff::{DiffLine, build_diff};
use crate::extract::{CodeLine, code_to_lines, extract_latest_code};
use crate::model::{
    FixWorkflowRequest, FixWorkflowResponse, GenerateWorkflowRequest, GenerateWorkflowResponse,
};
use crate::progress::{StreamProgress, StreamProgressBuilder};

const GENERATE_ERROR: &str = "Generation error";
const FIX_ERROR: &str = "Fix error";

/// Progress builder for the generate stream with in-band status detection.
pub fn generate_progress_builder() -> StreamProgressBuilder<GenerateWorkflowResponse> {
    StreamProgress::builder("generate").extract_error(|item: &GenerateWorkflowResponse| {
        item.status
            .as_ref()
            .and_then(|status| status.failure_message(GENERATE_ERROR))
    })
}

/// Progress builder for the fix stream with in-band status detection.
pub fn fix_progress_builder() -> StreamProgressBuilder<FixWorkflowResponse> {
    StreamProgress::builder("fix").extract_error(|item: &FixWorkflowResponse| {
        item.status
            .as_ref()
            .and_then(|status| status.failure_message(FIX_ERROR))
    })
}

/// What `GenerationSession::initiate` did with a prompt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InitiateOutcome {
    /// The prompt was blank.
    Ignored,
    /// The stream that would handle the prompt is still running.
    Busy,
    /// A generate stream ran.
    Generated,
    /// A fix stream ran against the generated definition.
    Fixed,
}

/// Derived, display-ready view of a session.
#[derive(Clone, Debug, Default)]
pub struct SessionView {
    pub prompt: String,
    /// Latest non-empty definition of the generate stream.
    pub gen_definition: String,
    /// Latest non-empty definition of the fix stream.
    pub fix_definition: String,
    /// `fix_definition` when present, else `gen_definition`.
    pub current_definition: String,
    /// Definition of the second-to-last generate item.
    pub previous_definition: String,
    pub current_code: String,
    pub previous_code: String,
    pub code_lines: Vec<CodeLine>,
    pub diff_lines: Vec<DiffLine>,
    pub step_count: usize,
    pub has_generated: bool,
    pub is_generating: bool,
    pub is_fixing: bool,
    pub error_generate: Option<String>,
    pub error_fix: Option<String>,
    pub generate_items: Arc<Vec<GenerateWorkflowResponse>>,
    pub fix_items: Arc<Vec<FixWorkflowResponse>>,
}

fn latest_generated(items: &[GenerateWorkflowResponse]) -> String {
    items
        .iter()
        .rev()
        .find_map(|item| item.definition())
        .map(|def| def.serialize())
        .unwrap_or_default()
}

fn latest_fixed(items: &[FixWorkflowResponse]) -> String {
    items
        .iter()
        .rev()
        .find_map(|item| item.definition())
        .map(|def| def.serialize())
        .unwrap_or_default()
}

fn previous_generated(items: &[GenerateWorkflowResponse]) -> String {
    if items.len() < 2 {
        return String::new();
    }
    items[items.len() - 2]
        .workflow_definition
        .as_ref()
        .map(|def| def.serialize())
        .unwrap_or_default()
}

struct SessionInner {
    client: Arc<dyn WorkflowClient>,
    generate: StreamProgress<GenerateWorkflowResponse>,
    fix: StreamProgress<FixWorkflowResponse>,
    prompt: watch::Sender<String>,
}

/// Orchestrates the generate-then-fix lifecycle for one user session.
#[derive(Clone)]
pub struct GenerationSession {
    inner: Arc<SessionInner>,
}

impl GenerationSession {
    /// Creates a session with default progress trackers.
    pub fn new(client: Arc<dyn WorkflowClient>) -> Self {
        Self::with_streams(
            client,
            generate_progress_builder().build(),
            fix_progress_builder().build(),
        )
    }

    /// Creates a session over caller-built trackers, typically from
    /// [`generate_progress_builder`] / [`fix_progress_builder`] with extra hooks.
    pub fn with_streams(
        client: Arc<dyn WorkflowClient>,
        generate: StreamProgress<GenerateWorkflowResponse>,
        fix: StreamProgress<FixWorkflowResponse>,
    ) -> Self {
        let (prompt, _) = watch::channel(String::new());
        Self {
            inner: Arc::new(SessionInner {
                client,
                generate,
                fix,
                prompt,
            }),
        }
    }

    pub fn prompt(&self) -> String {
        self.inner.prompt.borrow().clone()
    }

    pub fn set_prompt(&self, prompt: impl Into<String>) {
        self.inner.prompt.send_replace(prompt.into());
    }

    pub fn generate_progress(&self) -> &StreamProgress<GenerateWorkflowResponse> {
        &self.inner.generate
    }

    pub fn fix_progress(&self) -> &StreamProgress<FixWorkflowResponse> {
        &self.inner.fix
    }

    /// Sends `prompt` to the service and drains the resulting stream.
    ///
    /// Before anything has been generated this runs a generate call. After
    /// that it runs a fix call whose base is always the *generated*
    /// definition, never the output of an earlier fix.
    pub async fn initiate(&self, prompt: impl Into<String>) -> InitiateOutcome {
        let prompt = prompt.into();
        self.set_prompt(prompt.clone());
        if prompt.trim().is_empty() {
            return InitiateOutcome::Ignored;
        }

        let gen_definition = latest_generated(&self.inner.generate.items());
        if gen_definition.is_empty() {
            if self.inner.generate.is_streaming() {
                debug!("generate already streaming; prompt not sent");
                return InitiateOutcome::Busy;
            }
            info!(prompt_len = prompt.len(), "starting workflow generation");
            let client = self.inner.client.clone();
            let req = GenerateWorkflowRequest { prompt };
            self.inner
                .generate
                .start(move || async move { client.generate_workflow(req).await })
                .await;
            InitiateOutcome::Generated
        } else {
            if self.inner.fix.is_streaming() {
                debug!("fix already streaming; prompt not sent");
                return InitiateOutcome::Busy;
            }
            info!(prompt_len = prompt.len(), "starting workflow fix");
            let client = self.inner.client.clone();
            let req = FixWorkflowRequest {
                workflow_definition: gen_definition,
                description: prompt,
            };
            self.inner
                .fix
                .start(move || async move { client.fix_workflow(req).await })
                .await;
            InitiateOutcome::Fixed
        }
    }

    pub fn abort_all(&self) {
        self.inner.generate.abort();
        self.inner.fix.abort();
    }

    /// Aborts and clears both streams and the prompt.
    pub fn reset_all(&self) {
        self.abort_all();
        self.inner.generate.reset();
        self.inner.fix.reset();
        self.inner.prompt.send_replace(String::new());
    }

    /// Computes the display view from the current stream snapshots.
    pub fn view(&self) -> SessionView {
        let generate = self.inner.generate.snapshot();
        let fix = self.inner.fix.snapshot();

        let gen_definition = latest_generated(&generate.items);
        let fix_definition = latest_fixed(&fix.items);
        let current_definition = if fix_definition.is_empty() {
            gen_definition.clone()
        } else {
            fix_definition.clone()
        };
        let previous_definition = previous_generated(&generate.items);
        let current_code = extract_latest_code(&current_definition);
        let previous_code = extract_latest_code(&previous_definition);
        let code_lines = code_to_lines(&current_code);
        let diff_lines = build_diff(&previous_code, &current_code);

        SessionView {
            prompt: self.prompt(),
            has_generated: !gen_definition.is_empty(),
            step_count: code_lines.len(),
            gen_definition,
            fix_definition,
            current_definition,
            previous_definition,
            current_code,
            previous_code,
            code_lines,
            diff_lines,
            is_generating: generate.is_streaming,
            is_fixing: fix.is_streaming,
            error_generate: generate.error,
            error_fix: fix.error,
            generate_items: generate.items,
            fix_items: fix.items,
        }
    }
}
