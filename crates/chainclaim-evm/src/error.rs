//! Authorization building errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthorizationError {
    /// The signing capability refused or failed.
    #[error("signer error: {0}")]
    Signer(String),

    /// The amount is not a valid unsigned integer.
    #[error("invalid amount '{0}'")]
    InvalidAmount(String),

    #[error("invalid address '{0}'")]
    InvalidAddress(String),

    #[error("invalid nonce '{0}'")]
    InvalidNonce(String),

    /// Never carries the key material.
    #[error("invalid private key")]
    InvalidKey,

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}
