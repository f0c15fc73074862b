use std::collections::VecDeque;
use std::pin::Pin;

use futures::StreamExt as _;
use futures::stream;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::client::WorkflowClient;
use crate::errors::{ClientError, StreamFailure};
use crate::model::{
    FixWorkflowRequest, FixWorkflowResponse, GenerateWorkflowRequest, GenerateWorkflowResponse,
};
use crate::progress::ItemStream;

use super::config::WorkflowClientConfig;
use super::ndjson::{NdjsonDecoder, error_message, parse_body, parse_line};

type ByteStream =
    Pin<Box<dyn futures::Stream<Item = Result<bytes::Bytes, reqwest::Error>> + Send + 'static>>;

const NDJSON_CONTENT_TYPES: [&str; 2] = ["application/x-ndjson", "application/jsonl"];

/// `WorkflowClient` speaking JSON over HTTP to the workflow backend.
///
/// NDJSON responses are decoded while they arrive; any other body is read
/// whole and parsed as an array, a single item, or NDJSON.
pub struct HttpWorkflowClient {
    client: reqwest::Client,
    config: WorkflowClientConfig,
}

impl HttpWorkflowClient {
    pub fn new(config: WorkflowClientConfig) -> Result<Self, ClientError> {
        config.validate()?;
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ClientError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client, config })
    }

    /// Creates a client from `WORKFLOW_BACKEND_*` environment variables.
    pub fn from_env() -> Result<Self, ClientError> {
        Self::new(WorkflowClientConfig::from_env()?)
    }

    pub fn config(&self) -> &WorkflowClientConfig {
        &self.config
    }

    async fn post_stream<B, T>(&self, url: String, body: &B) -> Result<ItemStream<T>, ClientError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned + Send + 'static,
    {
        debug!(url = %url, "posting workflow request");
        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| ClientError::Transport(format!("request to {url} failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = error_message(&text).unwrap_or_else(|| {
                status
                    .canonical_reason()
                    .unwrap_or("Request failed")
                    .to_string()
            });
            warn!(
                url = %url,
                status = status.as_u16(),
                message = %message,
                "workflow backend rejected request"
            );
            return Err(ClientError::Status {
                status: status.as_u16(),
                message,
            });
        }

        let is_ndjson = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|ct| NDJSON_CONTENT_TYPES.iter().any(|t| ct.starts_with(*t)))
            .unwrap_or(false);

        if is_ndjson {
            let bytes_stream: ByteStream = Box::pin(response.bytes_stream());
            return Ok(Box::pin(ndjson_item_stream(bytes_stream)));
        }

        let text = response
            .text()
            .await
            .map_err(|e| ClientError::Transport(format!("failed to read response body: {e}")))?;
        let items: Vec<T> = parse_body(&text).inspect_err(|e| {
            warn!(url = %url, error = %e, "workflow response body could not be decoded");
        })?;
        debug!(url = %url, count = items.len(), "parsed buffered workflow response");
        Ok(Box::pin(stream::iter(items.into_iter().map(Ok))))
    }
}

#[async_trait::async_trait]
impl WorkflowClient for HttpWorkflowClient {
    async fn generate_workflow(
        &self,
        req: GenerateWorkflowRequest,
    ) -> Result<ItemStream<GenerateWorkflowResponse>, StreamFailure> {
        Ok(self.post_stream(self.config.generate_url(), &req).await?)
    }

    async fn fix_workflow(
        &self,
        req: FixWorkflowRequest,
    ) -> Result<ItemStream<FixWorkflowResponse>, StreamFailure> {
        Ok(self.post_stream(self.config.fix_url(), &req).await?)
    }
}

fn ndjson_item_stream<T>(
    bytes_stream: ByteStream,
) -> impl futures::Stream<Item = Result<T, StreamFailure>> + Send
where
    T: DeserializeOwned + Send + 'static,
{
    struct State<T> {
        bytes_stream: ByteStream,
        decoder: NdjsonDecoder,
        pending: VecDeque<T>,
        failure: Option<ClientError>,
        done: bool,
    }

    stream::try_unfold(
        State {
            bytes_stream,
            decoder: NdjsonDecoder::default(),
            pending: VecDeque::new(),
            failure: None,
            done: false,
        },
        |mut state| async move {
            loop {
                if let Some(item) = state.pending.pop_front() {
                    return Ok(Some((item, state)));
                }
                // Items decoded ahead of a malformed line are yielded first.
                if let Some(failure) = state.failure.take() {
                    return Err(StreamFailure::from(failure));
                }
                if state.done {
                    return Ok(None);
                }
                match state.bytes_stream.next().await {
                    Some(Ok(chunk)) => {
                        let lines = state.decoder.push_chunk(&chunk);
                        state.failure = push_lines(&mut state.pending, lines);
                    }
                    Some(Err(e)) => {
                        return Err(StreamFailure::from(ClientError::Transport(format!(
                            "response stream failed: {e}"
                        ))));
                    }
                    None => {
                        let rest = state.decoder.finish().into_iter().collect();
                        state.failure = push_lines(&mut state.pending, rest);
                        state.done = true;
                    }
                }
            }
        },
    )
}

/// Queues decoded lines, stopping at the first one that does not decode.
fn push_lines<T: DeserializeOwned>(
    pending: &mut VecDeque<T>,
    lines: Vec<String>,
) -> Option<ClientError> {
    for line in lines {
        match parse_line(&line) {
            Ok(item) => pending.push_back(item),
            Err(e) => {
                warn!(error = %e, queued = pending.len(), "malformed NDJSON line ends stream");
                return Some(e);
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt as _;

    fn byte_stream(chunks: Vec<&'static [u8]>) -> ByteStream {
        Box::pin(stream::iter(
            chunks
                .into_iter()
                .map(|c| Ok::<_, reqwest::Error>(bytes::Bytes::from_static(c))),
        ))
    }

    #[tokio::test]
    async fn ndjson_stream_yields_items_across_chunks() {
        let chunks: Vec<&'static [u8]> = vec![
            b"{\"workflowDefinition\":{\"step\":1}}\n{\"workflow",
            b"Definition\":{\"step\":2}}\n\n",
            b"{\"status\":{\"code\":13,\"message\":\"boom\"}}",
        ];
        let items: Vec<Result<GenerateWorkflowResponse, StreamFailure>> =
            ndjson_item_stream(byte_stream(chunks)).collect().await;

        assert_eq!(items.len(), 3);
        let last = items[2].as_ref().expect("last item");
        assert_eq!(last.status.as_ref().map(|s| s.code), Some(13));
    }

    #[tokio::test]
    async fn malformed_ndjson_line_fails_after_earlier_items() {
        let chunks: Vec<&'static [u8]> = vec![
            b"{\"workflowDefinition\":{\"step\":1}}\n",
            b"{\"workflowDefinition\":{\"step\":2}}\ngarbage\n{\"status\":null}\n",
            b"{\"workflowDefinition\":{\"step\":3}}\n",
        ];
        let items: Vec<Result<GenerateWorkflowResponse, StreamFailure>> =
            ndjson_item_stream(byte_stream(chunks)).collect().await;

        assert_eq!(items.len(), 3);
        assert!(items[0].is_ok());
        assert!(items[1].is_ok());
        match &items[2] {
            Err(failure @ StreamFailure::Transport { .. }) => {
                assert!(failure.message().starts_with("decode error:"));
            }
            other => panic!("expected decode failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn malformed_trailing_line_fails_the_stream() {
        let chunks: Vec<&'static [u8]> = vec![b"{\"workflowDefinition\":{\"step\":1}}\n{\"work"];
        let items: Vec<Result<GenerateWorkflowResponse, StreamFailure>> =
            ndjson_item_stream(byte_stream(chunks)).collect().await;

        assert_eq!(items.len(), 2);
        assert!(items[0].is_ok());
        assert!(items[1].is_err());
    }

    #[test]
    fn new_rejects_invalid_config() {
        let err = HttpWorkflowClient::new(WorkflowClientConfig::new("ftp://x"));
        assert!(matches!(err, Err(ClientError::Config(_))));
    }
}
