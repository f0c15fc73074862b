//! Client-side core for streaming workflow generation.
//!
//! A [`GenerationSession`] sends the first prompt to the generate endpoint and
//! every later prompt to the fix endpoint. Each response arrives as a stream of
//! partial results tracked by a [`StreamProgress`]; the session derives the
//! current workflow code, its numbered lines and a line diff against the
//! previous partial from those histories.
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use workflow_stream::prelude::*;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), workflow_stream::ClientError> {
//! let client = HttpWorkflowClient::from_env()?;
//! let session = GenerationSession::new(Arc::new(client));
//!
//! session.initiate("Summarize the active tab").await;
//! let view = session.view();
//! for line in &view.code_lines {
//!     println!("{:>3} {}", line.number, line.text);
//! }
//! # Ok(())
//! # }
//! ```

/// Backend contract producing streamed responses.
pub mod client;
/// Line-level diff between two code revisions.
pub mod diff;
/// Error types for streams and the HTTP client.
pub mod errors;
/// Latest-revision code extraction from serialized definitions.
pub mod extract;
/// Canned backend for demos and tests.
pub mod mock;
/// Request/response messages of the generate and fix calls.
pub mod model;
/// Process-wide `tracing` setup.
pub mod observability;
/// Common imports for typical usage.
pub mod prelude;
/// Generic progress tracking over a stream of items.
pub mod progress;
/// Generate/fix session orchestration.
pub mod session;
/// HTTP implementation of `WorkflowClient`.
pub mod transport;

pub use client::WorkflowClient;
pub use diff::{DiffKind, DiffLine, DiffStats, MAX_DIFF_ROWS, build_diff};
pub use errors::{ClientError, StreamFailure};
pub use extract::{CodeLine, code_to_lines, extract_latest_code, serialize_definition};
pub use mock::{MockWorkflowClient, RecordedRequest};
pub use model::{
    FixWorkflowRequest, FixWorkflowResponse, GenerateWorkflowRequest, GenerateWorkflowResponse,
    RpcStatus, WorkflowDefinition,
};
pub use observability::init_observability;
pub use progress::{ItemStream, StreamProgress, StreamProgressBuilder, StreamState};
pub use session::{
    GenerationSession, InitiateOutcome, SessionView, fix_progress_builder,
    generate_progress_builder,
};
pub use transport::{HttpWorkflowClient, WorkflowClientConfig};
