//! Common imports for driving a generation session.
pub use crate::{
    DiffKind, DiffLine, FixWorkflowRequest, FixWorkflowResponse, GenerateWorkflowRequest,
    GenerateWorkflowResponse, GenerationSession, HttpWorkflowClient, InitiateOutcome,
    MockWorkflowClient, SessionView, StreamFailure, StreamProgress, WorkflowClient,
    WorkflowClientConfig, WorkflowDefinition,
};
