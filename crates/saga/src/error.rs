//! Saga error types.

use bus::BusError;
use ledger::LedgerError;
use thiserror::Error;

/// Errors that can occur while consuming and forwarding events.
#[derive(Debug, Error)]
pub enum SagaError {
    /// The inbound subscription could not be opened.
    #[error("Subscribe failed: {0}")]
    Subscribe(#[source] BusError),

    /// The bus failed while polling or publishing.
    #[error("Bus error: {0}")]
    Bus(#[from] BusError),

    /// The payload did not match the expected event schema.
    #[error("Decode error: {0}")]
    Decode(#[source] serde_json::Error),

    /// An outbound event could not be serialized.
    #[error("Encode error: {0}")]
    Encode(#[source] serde_json::Error),

    /// The dedup ledger could not be read or written.
    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    /// A stage rejected its input.
    #[error("Stage '{stage}' failed: {reason}")]
    StageFailed { stage: String, reason: String },
}

/// Convenience type alias for saga results.
pub type Result<T> = std::result::Result<T, SagaError>;
