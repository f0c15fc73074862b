use thiserror::Error;

/// Failure inside one stringification path. Never escapes `stringify`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StringifyError {
    #[error("shared payload lock poisoned")]
    Poisoned,
    #[error("conversion failed: {0}")]
    Conversion(String),
    #[error("value has no JSON form")]
    Unsupported,
}

impl StringifyError {
    pub fn conversion(message: impl Into<String>) -> Self {
        Self::Conversion(message.into())
    }
}

/// The other end of a run-signal channel was dropped.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("run signal channel closed")]
pub struct SignalClosed;
