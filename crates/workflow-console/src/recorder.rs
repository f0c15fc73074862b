//! Writes stream progress and run lifecycle into an `EventTimeline`.

use std::fmt::Display;
use std::future::Future;

use serde::Serialize;
use tracing::warn;
use workflow_stream::{StreamFailure, StreamProgressBuilder};

use crate::events::{EventKind, EventTimeline};
use crate::payload::Payload;

pub(crate) fn to_payload<T: Serialize>(value: &T) -> Payload {
    match serde_json::to_value(value) {
        Ok(json) => Payload::from(json),
        Err(e) => {
            warn!(error = %e, "event payload could not be serialized");
            Payload::error("SerializationError", e.to_string())
        }
    }
}

fn failure_payload(failure: &StreamFailure) -> Payload {
    let name = match failure {
        StreamFailure::Transport { .. } => "TransportError",
        StreamFailure::InBand { .. } => "StatusError",
    };
    Payload::error(name, failure.message())
}

fn stage_payload(stage: &str) -> Payload {
    Payload::object([("stage", stage)])
}

/// Appends the events a console shows for generation and execution runs.
#[derive(Clone, Default)]
pub struct TimelineRecorder {
    timeline: EventTimeline,
}

impl TimelineRecorder {
    pub fn new(timeline: EventTimeline) -> Self {
        Self { timeline }
    }

    pub fn timeline(&self) -> &EventTimeline {
        &self.timeline
    }

    /// Adds hooks to `builder` that log every item as a message, failures as
    /// errors and completion as `done { stage }`.
    pub fn attach<T>(
        &self,
        builder: StreamProgressBuilder<T>,
        stage: &'static str,
    ) -> StreamProgressBuilder<T>
    where
        T: Serialize + Clone + Send + Sync + 'static,
    {
        let on_item = self.clone();
        let on_error = self.clone();
        let on_complete = self.clone();
        builder
            .on_partial(move |item: &T, _items: &[T]| on_item.message(to_payload(item)))
            .on_error(move |failure: &StreamFailure| on_error.error(failure_payload(failure)))
            .on_complete(move |_items: &[T], aborted: bool| {
                let mut payload = vec![("stage".to_string(), Payload::from(stage))];
                if aborted {
                    payload.push(("aborted".to_string(), Payload::Bool(true)));
                }
                on_complete.done(Payload::Object(payload));
            })
    }

    pub fn message(&self, payload: impl Into<Payload>) {
        self.timeline.push(EventKind::Message, Some(payload.into()));
    }

    pub fn error(&self, payload: impl Into<Payload>) {
        self.timeline.push(EventKind::Error, Some(payload.into()));
    }

    pub fn done(&self, payload: impl Into<Payload>) {
        self.timeline.push(EventKind::Done, Some(payload.into()));
    }

    pub fn run_started(&self) {
        self.message(Payload::object([("stage", "run"), ("status", "start")]));
    }

    pub fn run_finished(&self) {
        self.done(stage_payload("run"));
    }

    /// Records a complete execution: a start marker, then either the result
    /// and a completion marker or the error.
    pub async fn record_run<Fut, R, E>(&self, run: Fut) -> Result<R, E>
    where
        Fut: Future<Output = Result<R, E>>,
        R: Serialize,
        E: Display,
    {
        self.run_started();
        match run.await {
            Ok(result) => {
                self.message(to_payload(&result));
                self.run_finished();
                Ok(result)
            }
            Err(e) => {
                self.error(Payload::error("Error", e.to_string()));
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rows::{Row, to_rows};
    use futures::stream;
    use serde_json::json;
    use workflow_stream::{
        GenerateWorkflowResponse, ItemStream, RpcStatus, StreamProgress, WorkflowDefinition,
    };

    fn separators(rows: &[Row]) -> Vec<&'static str> {
        rows.iter().filter_map(Row::as_separator).collect()
    }

    #[tokio::test]
    async fn generate_stream_is_logged_with_completion_marker() {
        let recorder = TimelineRecorder::default();
        let progress: StreamProgress<GenerateWorkflowResponse> = recorder
            .attach(StreamProgress::builder("generate"), "generate")
            .build();
        let items = (1..=2)
            .map(|step| {
                Ok(GenerateWorkflowResponse {
                    workflow_definition: Some(WorkflowDefinition::new(json!({ "step": step }))),
                    status: None,
                })
            })
            .collect::<Vec<_>>();
        let stream: ItemStream<GenerateWorkflowResponse> = Box::pin(stream::iter(items));
        progress.start_stream(stream).await;

        let events = recorder.timeline().sorted();
        assert_eq!(
            events.iter().map(|e| e.kind).collect::<Vec<_>>(),
            vec![EventKind::Message, EventKind::Message, EventKind::Done]
        );
        let rows = to_rows(&events);
        assert_eq!(separators(&rows), vec!["generation complete"]);
        assert!(events[0].payload_field("workflowDefinition").is_some());
    }

    #[tokio::test]
    async fn in_band_failure_is_logged_as_error() {
        let recorder = TimelineRecorder::default();
        let builder = StreamProgress::builder("generate").extract_error(
            |item: &GenerateWorkflowResponse| {
                item.status
                    .as_ref()
                    .and_then(|s| s.failure_message("Generation error"))
            },
        );
        let progress: StreamProgress<GenerateWorkflowResponse> =
            recorder.attach(builder, "generate").build();
        let stream: ItemStream<GenerateWorkflowResponse> = Box::pin(stream::iter(vec![Ok(
            GenerateWorkflowResponse {
                workflow_definition: None,
                status: Some(RpcStatus::new(3, "INVALID_ARGUMENT: prompt is empty")),
            },
        )]));
        progress.start_stream(stream).await;

        let events = recorder.timeline().sorted();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, EventKind::Error);
        assert_eq!(
            crate::rows::summarize(&events[0]),
            "INVALID_ARGUMENT: prompt is empty"
        );
    }

    #[tokio::test]
    async fn record_run_logs_lifecycle() {
        let recorder = TimelineRecorder::default();
        let result: Result<serde_json::Value, String> = recorder
            .record_run(async {
                Ok(json!({ "workflowResult": { "id": "wf-9", "resultType": 0 } }))
            })
            .await;
        assert!(result.is_ok());

        let rows = to_rows(&recorder.timeline().sorted());
        assert_eq!(separators(&rows), vec!["execution start", "execution complete"]);
        let summaries: Vec<String> = rows
            .iter()
            .filter_map(Row::as_event)
            .map(crate::rows::summarize)
            .collect();
        assert_eq!(
            summaries,
            vec!["execution start", "wf-9: SUCCESS", "execution complete"]
        );
    }

    #[tokio::test]
    async fn failed_run_logs_error_without_completion() {
        let recorder = TimelineRecorder::default();
        let result: Result<(), String> = recorder
            .record_run(async { Err("executor offline".to_string()) })
            .await;
        assert!(result.is_err());

        let events = recorder.timeline().sorted();
        assert_eq!(events.last().map(|e| e.kind), Some(EventKind::Error));
        assert_eq!(crate::rows::summarize(&events[1]), "executor offline");
    }
}
