use thiserror::Error;

/// Errors returned by x402 operations.
#[derive(Debug, Error)]
pub enum X402Error {
    #[error("ledger error: {0}")]
    LedgerError(String),

    #[error("invalid payment: {0}")]
    InvalidPayment(String),

    #[error("invalid envelope: {0}")]
    InvalidEnvelope(String),

    #[error("config error: {0}")]
    ConfigError(String),

    #[error("http error: {0}")]
    HttpError(String),

    #[error("serialization error: {0}")]
    SerdeError(#[from] serde_json::Error),
}
