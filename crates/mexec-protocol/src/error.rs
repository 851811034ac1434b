//! Error types for the executor protocol.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("invalid amount: {0:?}")]
    InvalidAmount(String),
    #[error("{event} still carries exception state; extract it before serializing")]
    ExceptionNotExtracted { event: &'static str },
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Convenience result type for protocol operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Parse a decimal amount string as reported on invoices and payments.
pub fn parse_amount(amount: &str) -> ProtocolResult<f64> {
    let trimmed = amount.trim();
    match trimmed.parse::<f64>() {
        Ok(value) if value.is_finite() && value >= 0.0 => Ok(value),
        _ => Err(ProtocolError::InvalidAmount(amount.to_owned())),
    }
}
