//! Error types for event sinks.

use mexec_protocol::ProtocolError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

/// Convenience result type for sink operations.
pub type SinkResult<T> = Result<T, SinkError>;
