//! Error types for the handpay reporting core.

use thiserror::Error;

use crate::config::ConfigurationError;
use crate::models::ClientId;

#[derive(Debug, Error)]
pub enum HandpayError {
    #[error("Configuration error: {0}")]
    Configuration(String),
    #[error("Persistence error for {client_id}: {reason}")]
    Persistence { client_id: ClientId, reason: String },
    #[error("Ledger error: {0}")]
    Ledger(String),
    #[error("No report queue registered for {0}")]
    UnknownClient(ClientId),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl HandpayError {
    pub fn persistence(client_id: ClientId, reason: impl std::fmt::Display) -> Self {
        Self::Persistence {
            client_id,
            reason: reason.to_string(),
        }
    }

    /// Check if the error left in-memory state intact and only durability degraded
    pub fn is_persistence(&self) -> bool {
        matches!(self, Self::Persistence { .. } | Self::Io(_))
    }
}

impl From<ConfigurationError> for HandpayError {
    fn from(error: ConfigurationError) -> Self {
        HandpayError::Configuration(error.to_string())
    }
}

pub type Result<T> = std::result::Result<T, HandpayError>;
