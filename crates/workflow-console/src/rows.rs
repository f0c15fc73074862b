//! Projection of timeline events into console rows and one-line summaries.

use tracing::debug;

use crate::events::{EventEntry, EventKind};
use crate::payload::{Payload, js_number};
use crate::stringify::stringify_checked;

pub const RUN_START_LABEL: &str = "execution start";
pub const RUN_COMPLETE_LABEL: &str = "execution complete";
pub const GENERATION_COMPLETE_LABEL: &str = "generation complete";
pub const DONE_LABEL: &str = "complete";
pub const DEFINITION_UPDATED_LABEL: &str = "workflow definition updated";
pub const ERROR_LABEL: &str = "error occurred";
pub const MESSAGE_LABEL: &str = "message";

const FALLBACK_RUN_NAME: &str = "execution";
const RESULT_TEXT_LIMIT: usize = 160;
const PAYLOAD_TEXT_LIMIT: usize = 120;
const LINE_TIME_STEP: f64 = 1e-9;

/// Console row: a phase separator or one event.
#[derive(Clone, Debug)]
pub enum Row {
    Separator { label: &'static str },
    Log { event: EventEntry },
}

impl Row {
    pub fn as_separator(&self) -> Option<&'static str> {
        match self {
            Row::Separator { label } => Some(*label),
            Row::Log { .. } => None,
        }
    }

    pub fn as_event(&self) -> Option<&EventEntry> {
        match self {
            Row::Separator { .. } => None,
            Row::Log { event } => Some(event),
        }
    }
}

fn is_run_start(payload: &Payload) -> bool {
    payload.field("stage").as_ref().and_then(Payload::as_str) == Some("run")
        && payload.field("status").as_ref().and_then(Payload::as_str) == Some("start")
}

/// Multi-line `workflowResult.result` text of a message payload.
fn multiline_result(payload: &Payload) -> Option<String> {
    let result = payload.field("workflowResult")?.field("result")?;
    result.as_str().filter(|s| s.contains('\n')).map(str::to_owned)
}

/// One log row per non-blank line, each at a slightly later timestamp than
/// the source so the rows sort after it and in line order.
fn push_lines(rows: &mut Vec<Row>, source: &EventEntry, text: &str) {
    let text = text.replace("\r\n", "\n");
    for (i, line) in text.split('\n').enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        rows.push(Row::Log {
            event: EventEntry::new(
                source.t + i as f64 * LINE_TIME_STEP,
                source.kind,
                Some(Payload::String(line.to_string())),
            ),
        });
    }
}

/// Builds the console rows for `events`, which must already be in timestamp
/// order.
///
/// Run start/completion and generation completion get separator rows, and
/// multi-line message text (a plain string payload or a run result) is split
/// into one row per line.
pub fn to_rows(events: &[EventEntry]) -> Vec<Row> {
    let mut rows = Vec::with_capacity(events.len());
    for event in events {
        match (event.kind, event.payload.as_ref()) {
            (EventKind::Message, Some(payload)) => {
                if is_run_start(payload) {
                    rows.push(Row::Separator {
                        label: RUN_START_LABEL,
                    });
                }
                if let Some(result) = multiline_result(payload) {
                    push_lines(&mut rows, event, &result);
                    continue;
                }
                if let Payload::String(text) = payload
                    && text.contains('\n')
                {
                    push_lines(&mut rows, event, text);
                    continue;
                }
            }
            (EventKind::Done, _) => match event.stage().as_deref() {
                Some("run") => rows.push(Row::Separator {
                    label: RUN_COMPLETE_LABEL,
                }),
                Some("generate") => rows.push(Row::Separator {
                    label: GENERATION_COMPLETE_LABEL,
                }),
                _ => {}
            },
            _ => {}
        }
        rows.push(Row::Log {
            event: event.clone(),
        });
    }
    rows
}

/// Cuts `text` to `max` characters, marking the cut with `…`.
pub fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => format!("{}…", &text[..idx]),
        None => text.to_string(),
    }
}

/// One-line display text for an event. Never fails.
pub fn summarize(event: &EventEntry) -> String {
    match event.kind {
        EventKind::Error => summarize_error(event.payload.as_ref()),
        EventKind::Done => match event.stage().as_deref() {
            Some("run") => RUN_COMPLETE_LABEL.to_string(),
            Some("generate") => GENERATION_COMPLETE_LABEL.to_string(),
            _ => DONE_LABEL.to_string(),
        },
        EventKind::Message => summarize_message(event.payload.as_ref()),
    }
}

fn summarize_error(payload: Option<&Payload>) -> String {
    let text = match payload {
        None => String::new(),
        Some(payload) => match payload.field("message") {
            Some(message) if message.is_nullish() => String::new(),
            Some(message) => message.try_display().unwrap_or_default(),
            None => payload.try_display().unwrap_or_default(),
        },
    };
    if text.is_empty() {
        ERROR_LABEL.to_string()
    } else {
        text
    }
}

fn summarize_message(payload: Option<&Payload>) -> String {
    if let Some(payload) = payload {
        if is_run_start(payload) {
            return RUN_START_LABEL.to_string();
        }
        if let Some(result) = payload.field("workflowResult").filter(Payload::is_truthy) {
            return summarize_result(&result);
        }
        if payload
            .field("workflowDefinition")
            .is_some_and(|definition| definition.is_truthy())
        {
            return DEFINITION_UPDATED_LABEL.to_string();
        }
    }
    match stringify_checked(payload.unwrap_or(&Payload::Undefined)) {
        Some(text) => truncate_chars(&text, PAYLOAD_TEXT_LIMIT),
        None => {
            debug!("payload could not be stringified; using generic label");
            MESSAGE_LABEL.to_string()
        }
    }
}

fn summarize_result(result: &Payload) -> String {
    if let Some(text) = result.field("result")
        && let Some(text) = text.as_str()
        && !text.trim().is_empty()
    {
        return truncate_chars(text.trim(), RESULT_TEXT_LIMIT);
    }

    let name = ["displayName", "id"]
        .iter()
        .filter_map(|key| result.field(key))
        .find(Payload::is_truthy)
        .and_then(|name| name.try_display().ok())
        .unwrap_or_else(|| FALLBACK_RUN_NAME.to_string());
    let failed = result.field("resultType").and_then(|t| t.as_f64()) == Some(1.0);
    let outcome = if failed { "FAILED" } else { "SUCCESS" };
    let exit = result
        .field("exitCode")
        .and_then(|code| code.as_f64())
        .map(|code| format!(", exit {}", js_number(code)))
        .unwrap_or_default();
    format!("{name}: {outcome}{exit}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::SharedPayload;

    fn texts(rows: &[Row]) -> Vec<String> {
        rows.iter()
            .map(|row| match row {
                Row::Separator { label } => format!("--{label}--"),
                Row::Log { event } => summarize(event),
            })
            .collect()
    }

    #[test]
    fn run_lifecycle_gets_separators() {
        let events = vec![
            EventEntry::message(1.0, Payload::object([("stage", "run"), ("status", "start")])),
            EventEntry::done(2.0, Payload::object([("stage", "run")])),
        ];
        let rows = to_rows(&events);
        assert_eq!(rows.len(), 4);
        assert_eq!(rows[0].as_separator(), Some(RUN_START_LABEL));
        assert_eq!(rows[1].as_event().map(|e| e.t), Some(1.0));
        assert_eq!(rows[2].as_separator(), Some(RUN_COMPLETE_LABEL));
        assert_eq!(rows[3].as_event().map(|e| e.t), Some(2.0));
    }

    #[test]
    fn multiline_string_message_expands_without_blank_lines() {
        let rows = to_rows(&[EventEntry::message(10.0, "line1\n\nline2")]);
        assert_eq!(texts(&rows), vec!["line1", "line2"]);
        let times: Vec<f64> = rows.iter().filter_map(|r| r.as_event()).map(|e| e.t).collect();
        assert_eq!(times, vec![10.0, 10.0 + 2.0 * 1e-9]);
        assert!(rows.iter().all(|r| r.as_event().map(|e| e.kind) == Some(EventKind::Message)));
    }

    #[test]
    fn multiline_run_result_replaces_source_row() {
        let payload = Payload::object([(
            "workflowResult",
            Payload::object([("result", "ok\r\n  \r\ndone")]),
        )]);
        let rows = to_rows(&[EventEntry::message(3.0, payload)]);
        assert_eq!(texts(&rows), vec!["ok", "done"]);
    }

    #[test]
    fn generation_done_and_unknown_stage() {
        let rows = to_rows(&[
            EventEntry::done(1.0, Payload::object([("stage", "generate")])),
            EventEntry::done(2.0, Payload::object([("stage", "other")])),
            EventEntry::new(3.0, EventKind::Done, None),
        ]);
        assert_eq!(
            texts(&rows),
            vec!["--generation complete--", "generation complete", "complete", "complete"]
        );
    }

    #[test]
    fn error_rows_never_expand() {
        let rows = to_rows(&[EventEntry::error(1.0, "a\nb")]);
        assert_eq!(rows.len(), 1);
        assert_eq!(summarize(&rows[0].as_event().cloned().expect("log row")), "a\nb");
    }

    #[test]
    fn error_summaries() {
        assert_eq!(summarize(&EventEntry::error(1.0, Payload::error("Error", "boom"))), "boom");
        assert_eq!(
            summarize(&EventEntry::error(1.0, Payload::object([("message", Payload::Null)]))),
            ERROR_LABEL
        );
        assert_eq!(summarize(&EventEntry::error(1.0, "")), ERROR_LABEL);
        assert_eq!(summarize(&EventEntry::new(1.0, EventKind::Error, None)), ERROR_LABEL);
        assert_eq!(summarize(&EventEntry::error(1.0, "timeout")), "timeout");
    }

    #[test]
    fn run_result_summaries() {
        let long = "x".repeat(200);
        let with_text = Payload::object([(
            "workflowResult",
            Payload::object([("result", format!("  {long}  "))]),
        )]);
        let summary = summarize(&EventEntry::message(1.0, with_text));
        assert_eq!(summary.chars().count(), RESULT_TEXT_LIMIT + 1);
        assert!(summary.ends_with('…'));

        let failed = Payload::object([(
            "workflowResult",
            Payload::object([
                ("displayName", Payload::from("")),
                ("id", Payload::from("wf-1")),
                ("resultType", Payload::from(1)),
                ("exitCode", Payload::from(2)),
                ("result", Payload::from("   ")),
            ]),
        )]);
        assert_eq!(summarize(&EventEntry::message(1.0, failed)), "wf-1: FAILED, exit 2");

        let unnamed = Payload::object([(
            "workflowResult",
            Payload::object([("resultType", 0)]),
        )]);
        assert_eq!(summarize(&EventEntry::message(1.0, unnamed)), "execution: SUCCESS");
    }

    #[test]
    fn message_summaries() {
        let definition = Payload::object([("workflowDefinition", Payload::object([("a", 1)]))]);
        assert_eq!(summarize(&EventEntry::message(1.0, definition)), DEFINITION_UPDATED_LABEL);

        let start = Payload::object([("stage", "run"), ("status", "start")]);
        assert_eq!(summarize(&EventEntry::message(1.0, start)), RUN_START_LABEL);

        let generic = Payload::object([("note", "y".repeat(300))]);
        let summary = summarize(&EventEntry::message(1.0, generic));
        assert!(summary.starts_with("{\n  \"note\": \"yyy"));
        assert_eq!(summary.chars().count(), PAYLOAD_TEXT_LIMIT + 1);

        assert_eq!(summarize(&EventEntry::new(1.0, EventKind::Message, None)), "");
    }

    #[test]
    fn unstringifiable_message_falls_back_to_label() {
        let node = SharedPayload::new(Payload::Null);
        let poisoner = node.clone();
        let _ = std::thread::spawn(move || {
            let _ = poisoner.update(|_| panic!("poison the lock"));
        })
        .join();
        assert_eq!(summarize(&EventEntry::message(1.0, node)), MESSAGE_LABEL);
    }

    #[test]
    fn truncation_counts_characters() {
        assert_eq!(truncate_chars("héllo", 2), "hé…");
        assert_eq!(truncate_chars("héllo", 5), "héllo");
    }
}
