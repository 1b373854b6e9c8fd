//! Error types for Davcoin

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChainError {
    #[error("Invalid transaction: {0}")]
    InvalidTransaction(String),
    #[error("Invalid peer: {0}")]
    InvalidPeer(String),
    #[error("Invalid chain: {0}")]
    InvalidChain(String),
    #[error("Invalid block linkage at index {index}")]
    InvalidBlockLinkage { index: u64 },
    #[error("Invalid proof of work at index {index}")]
    InvalidProofOfWork { index: u64 },
    #[error("Proof search exhausted after {attempts} attempts")]
    ProofSearchExhausted { attempts: u64 },
    #[error("Network error: {0}")]
    NetworkError(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("IO error: {0}")]
    Io(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ChainError {
    /// Errors caused by what the caller sent rather than by the node itself.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            ChainError::InvalidTransaction(_) | ChainError::InvalidPeer(_)
        )
    }
}

impl From<std::io::Error> for ChainError {
    fn from(err: std::io::Error) -> Self {
        ChainError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for ChainError {
    fn from(err: serde_json::Error) -> Self {
        ChainError::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for ChainError {
    fn from(err: toml::de::Error) -> Self {
        ChainError::Config(err.to_string())
    }
}

impl From<reqwest::Error> for ChainError {
    fn from(err: reqwest::Error) -> Self {
        ChainError::NetworkError(err.to_string())
    }
}

/// Convenience alias used across the crate
pub type Result<T> = std::result::Result<T, ChainError>;
