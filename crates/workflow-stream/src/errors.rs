/// Failure that ends a `StreamProgress` run.
///
/// Both variants surface identically through `StreamState::error`; the variant
/// only records where the failure came from.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StreamFailure {
    /// The upstream sequence (or the factory producing it) failed.
    #[error("transport failure: {message}")]
    Transport { message: String },
    /// A received item carried an application-level failure status.
    #[error("{message}")]
    InBand { message: String },
}

impl StreamFailure {
    /// Creates a transport-level failure.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    /// Creates an in-band failure.
    pub fn in_band(message: impl Into<String>) -> Self {
        Self::InBand {
            message: message.into(),
        }
    }

    /// Returns the message stored in `StreamState::error`.
    pub fn message(&self) -> &str {
        match self {
            Self::Transport { message } | Self::InBand { message } => message,
        }
    }
}

/// Errors produced by `WorkflowClient` implementations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClientError {
    /// Invalid client configuration.
    #[error("config error: {0}")]
    Config(String),
    /// Request could not be sent or the response body could not be read.
    #[error("transport error: {0}")]
    Transport(String),
    /// Backend answered with a non-success HTTP status.
    #[error("backend error ({status}): {message}")]
    Status { status: u16, message: String },
    /// Response body could not be decoded into stream items.
    #[error("decode error: {0}")]
    Decode(String),
}

impl From<ClientError> for StreamFailure {
    fn from(value: ClientError) -> Self {
        match value {
            // Backends report a usable message; keep it verbatim for display.
            ClientError::Status { message, .. } => StreamFailure::transport(message),
            other => StreamFailure::transport(other.to_string()),
        }
    }
}
