//! Errors from HTTP and JSON-RPC calls.

use thiserror::Error;

use crate::request::JsonRpcError;

#[derive(Debug, Error)]
pub enum RpcError {
    /// Connection refused, reset, TLS failure, unreadable body.
    #[error("HTTP error: {0}")]
    Http(String),

    /// The endpoint answered with a status the caller did not expect.
    #[error("unexpected HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// JSON-RPC error object returned by the node.
    #[error("RPC error {}: {}", .0.code, .0.message)]
    Rpc(JsonRpcError),

    #[error("request timed out after {ms}ms")]
    Timeout { ms: u64 },

    #[error("deserialization error: {0}")]
    Deserialization(#[from] serde_json::Error),

    /// A transaction could not be signed locally.
    #[error("signing failed: {0}")]
    Signing(String),

    /// A well-formed response missing a required field.
    #[error("malformed response: {0}")]
    Malformed(String),
}

impl RpcError {
    /// Transient failures worth another attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Http(_) | Self::Timeout { .. } => true,
            Self::Status { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }

    pub(crate) fn from_reqwest(err: reqwest::Error, timeout_ms: u64) -> Self {
        if err.is_timeout() {
            Self::Timeout { ms: timeout_ms }
        } else {
            Self::Http(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_classification() {
        assert!(RpcError::Http("reset".into()).is_retryable());
        assert!(RpcError::Timeout { ms: 10 }.is_retryable());
        assert!(RpcError::Status { status: 503, body: String::new() }.is_retryable());
        assert!(RpcError::Status { status: 429, body: String::new() }.is_retryable());
        assert!(!RpcError::Status { status: 401, body: String::new() }.is_retryable());
        assert!(!RpcError::Rpc(JsonRpcError {
            code: -32000,
            message: "execution reverted".into(),
            data: None,
        })
        .is_retryable());
    }
}
