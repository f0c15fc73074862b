//! Pulls source code out of serialized workflow definitions.

use serde::Serialize;

use crate::model::WorkflowDefinition;

/// One numbered line of workflow source, 1-based.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CodeLine {
    pub number: usize,
    pub text: String,
}

/// Serializes a definition to the text form the session compares and sends.
pub fn serialize_definition(definition: &WorkflowDefinition) -> String {
    definition.serialize()
}

/// Returns the `code` of the latest revision in a serialized definition.
///
/// Never fails: malformed JSON, a non-object document, a missing or
/// non-array `workflowCode`, or a non-string `code` all yield an empty string.
///
/// Revisions are compared with a strict `<`, so when several entries share
/// the highest `codeRevision` the first of them wins. Entries without a
/// numeric revision never replace the current candidate.
pub fn extract_latest_code(serialized: &str) -> String {
    if serialized.is_empty() {
        return String::new();
    }
    let Ok(parsed) = serde_json::from_str::<serde_json::Value>(serialized) else {
        return String::new();
    };
    let Some(entries) = parsed.get("workflowCode").and_then(|v| v.as_array()) else {
        return String::new();
    };

    let Some(mut latest) = entries.iter().find(|entry| entry.is_object()) else {
        return String::new();
    };
    for entry in entries.iter().filter(|entry| entry.is_object()) {
        let Some(revision) = entry.get("codeRevision").and_then(|v| v.as_f64()) else {
            continue;
        };
        let current = latest
            .get("codeRevision")
            .and_then(|v| v.as_f64())
            .unwrap_or(-1.0);
        if current < revision {
            latest = entry;
        }
    }

    latest
        .get("code")
        .and_then(|v| v.as_str())
        .map(ToOwned::to_owned)
        .unwrap_or_default()
}

/// Splits code into numbered lines after normalizing `\r\n` and bare `\r`.
///
/// Empty input yields no lines.
pub fn code_to_lines(code: &str) -> Vec<CodeLine> {
    if code.is_empty() {
        return Vec::new();
    }
    code.replace("\r\n", "\n")
        .replace('\r', "\n")
        .split('\n')
        .enumerate()
        .map(|(idx, text)| CodeLine {
            number: idx + 1,
            text: text.to_string(),
        })
        .collect()
}
