use crate::errors::StreamFailure;
use crate::model::{
    FixWorkflowRequest, FixWorkflowResponse, GenerateWorkflowRequest, GenerateWorkflowResponse,
};
use crate::progress::ItemStream;

/// Streaming contract of the workflow generation service.
///
/// Implementations own the connection lifecycle; the returned stream yields
/// response chunks in arrival order. Failures before the first chunk are
/// returned directly, later ones as `Err` items of the stream.
#[async_trait::async_trait]
pub trait WorkflowClient: Send + Sync {
    /// Starts a streamed generate call.
    async fn generate_workflow(
        &self,
        req: GenerateWorkflowRequest,
    ) -> Result<ItemStream<GenerateWorkflowResponse>, StreamFailure>;

    /// Starts a streamed fix call.
    async fn fix_workflow(
        &self,
        req: FixWorkflowRequest,
    ) -> Result<ItemStream<FixWorkflowResponse>, StreamFailure>;
}
