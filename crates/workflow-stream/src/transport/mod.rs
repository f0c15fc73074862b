//! HTTP transport for the workflow backend.
mod config;
mod http;
mod ndjson;

pub use config::WorkflowClientConfig;
pub use http::HttpWorkflowClient;
