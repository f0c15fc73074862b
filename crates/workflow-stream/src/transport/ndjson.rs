use serde::de::DeserializeOwned;

use crate::errors::ClientError;

/// Incremental newline-delimited JSON splitter.
///
/// Bytes are buffered until a full line is available, so chunk boundaries may
/// fall anywhere (including inside a multi-byte character).
#[derive(Default)]
pub(crate) struct NdjsonDecoder {
    buf: Vec<u8>,
}

impl NdjsonDecoder {
    /// Appends a chunk and returns every complete, non-blank line.
    pub fn push_chunk(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buf.extend_from_slice(chunk);
        let mut lines = Vec::new();
        while let Some(idx) = self.buf.iter().position(|b| *b == b'\n') {
            let line_bytes: Vec<u8> = self.buf.drain(..=idx).collect();
            if let Some(line) = clean_line(&line_bytes) {
                lines.push(line);
            }
        }
        lines
    }

    /// Returns the trailing line left without a terminating newline.
    pub fn finish(&mut self) -> Option<String> {
        let rest = std::mem::take(&mut self.buf);
        clean_line(&rest)
    }
}

fn clean_line(bytes: &[u8]) -> Option<String> {
    let text = String::from_utf8_lossy(bytes);
    let trimmed = text.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Parses a buffered response body.
///
/// Accepts a JSON array of items, a single JSON item, or NDJSON. Any element
/// or line that does not decode fails the whole body.
pub(crate) fn parse_body<T: DeserializeOwned>(text: &str) -> Result<Vec<T>, ClientError> {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(text) {
        return match value {
            serde_json::Value::Array(values) => values
                .into_iter()
                .enumerate()
                .map(|(idx, v)| {
                    serde_json::from_value(v)
                        .map_err(|e| ClientError::Decode(format!("array element {idx}: {e}")))
                })
                .collect(),
            other => serde_json::from_value(other)
                .map(|item| vec![item])
                .map_err(|e| ClientError::Decode(e.to_string())),
        };
    }
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(parse_line)
        .collect()
}

/// Decodes one NDJSON line.
pub(crate) fn parse_line<T: DeserializeOwned>(line: &str) -> Result<T, ClientError> {
    serde_json::from_str(line).map_err(|e| ClientError::Decode(format!("NDJSON line: {e}")))
}

/// Extracts a human-readable message from an error response body.
pub(crate) fn error_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    ["message", "error"]
        .iter()
        .find_map(|key| value.get(*key).and_then(|v| v.as_str()))
        .filter(|message| !message.trim().is_empty())
        .map(ToOwned::to_owned)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::GenerateWorkflowResponse;

    #[test]
    fn decoder_handles_partial_chunk_boundaries() {
        let mut decoder = NdjsonDecoder::default();
        assert!(decoder.push_chunk(b"{\"status\":{\"code\":0,").is_empty());
        let lines = decoder.push_chunk(b"\"message\":\"\"}}\n\n{\"a\"");
        assert_eq!(lines, vec!["{\"status\":{\"code\":0,\"message\":\"\"}}".to_string()]);
        assert!(decoder.push_chunk(b":1}").is_empty());
        assert_eq!(decoder.finish().as_deref(), Some("{\"a\":1}"));
        assert_eq!(decoder.finish(), None);
    }

    #[test]
    fn decoder_handles_crlf_lines() {
        let mut decoder = NdjsonDecoder::default();
        let lines = decoder.push_chunk(b"{}\r\n{}\r\n");
        assert_eq!(lines, vec!["{}".to_string(), "{}".to_string()]);
    }

    #[test]
    fn parse_body_accepts_array_object_and_ndjson() {
        let array: Vec<GenerateWorkflowResponse> =
            parse_body(r#"[{"workflowDefinition":{"a":1}},{"status":{"code":0,"message":""}}]"#)
                .expect("array body");
        assert_eq!(array.len(), 2);

        let single: Vec<GenerateWorkflowResponse> =
            parse_body("{\n  \"workflowDefinition\": {\"a\": 1}\n}").expect("object body");
        assert_eq!(single.len(), 1);
        assert!(single[0].definition().is_some());

        let body = "{\"workflowDefinition\":{\"a\":1}}\n\n{\"workflowDefinition\":{\"a\":2}}\n";
        let ndjson: Vec<GenerateWorkflowResponse> = parse_body(body).expect("ndjson body");
        assert_eq!(ndjson.len(), 2);
    }

    #[test]
    fn parse_body_fails_on_any_malformed_entry() {
        let body = concat!(
            "{\"workflowDefinition\":{\"a\":1}}\n",
            "not json\n",
            "{\"workflowDefinition\":{\"a\":2}}\n",
        );
        let bad_line = parse_body::<GenerateWorkflowResponse>(body);
        assert!(matches!(bad_line, Err(ClientError::Decode(_))));

        let bad_element = parse_body::<GenerateWorkflowResponse>(
            r#"[{"workflowDefinition":{"a":1}},{"status":7}]"#,
        );
        match bad_element {
            Err(ClientError::Decode(message)) => assert!(message.starts_with("array element 1")),
            other => panic!("expected decode error, got {other:?}"),
        }

        let bad_object = parse_body::<GenerateWorkflowResponse>(r#"{"status":"oops"}"#);
        assert!(matches!(bad_object, Err(ClientError::Decode(_))));
    }

    #[test]
    fn parse_body_of_blank_text_is_empty() {
        let items = parse_body::<GenerateWorkflowResponse>("  \n").expect("blank body");
        assert!(items.is_empty());
    }

    #[test]
    fn error_message_prefers_message_then_error() {
        assert_eq!(error_message(r#"{"message":"quota"}"#).as_deref(), Some("quota"));
        assert_eq!(error_message(r#"{"error":"denied"}"#).as_deref(), Some("denied"));
        assert_eq!(error_message(r#"{"message":""}"#), None);
        assert_eq!(error_message("<html>"), None);
    }
}
