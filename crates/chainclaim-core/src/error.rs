//! Error types for claim calls, receipt inspection and dispatch.

use serde_json::Value;
use thiserror::Error;

/// Classification used when a failure carries no recognizable code.
pub const UNKNOWN_CODE: &str = "unknown";

/// Classification attached to client-side timeouts.
pub const TIMEOUT_CODE: &str = "timeout";

/// A failed remote claim call. Terminal for the task that produced it.
#[derive(Debug, Clone, Error)]
pub enum ClaimError {
    /// The endpoint answered with a non-success status.
    /// `body` is the JSON error body, or the raw text as a JSON string.
    #[error("claim rejected with HTTP {status}: {body}")]
    Rejected { status: u16, body: Value },

    /// The call could not complete (connection refused, reset, TLS, ...).
    #[error("transport error: {message}")]
    Transport {
        message: String,
        code: Option<String>,
    },

    /// The transport gave up waiting for a response.
    #[error("claim timed out after {ms}ms")]
    Timeout { ms: u64 },

    /// A success response could not be interpreted.
    #[error("unreadable claim response: {0}")]
    Decode(String),
}

impl ClaimError {
    /// The histogram key for this failure.
    ///
    /// Rejections use the body's `code` field when present (string or
    /// number); everything else falls back to [`UNKNOWN_CODE`].
    pub fn code(&self) -> String {
        match self {
            Self::Rejected { body, .. } => match body.get("code") {
                Some(Value::String(s)) if !s.is_empty() => s.clone(),
                Some(Value::Number(n)) => n.to_string(),
                _ => UNKNOWN_CODE.to_string(),
            },
            Self::Transport { code: Some(code), .. } => code.clone(),
            Self::Timeout { .. } => TIMEOUT_CODE.to_string(),
            Self::Transport { code: None, .. } | Self::Decode(_) => UNKNOWN_CODE.to_string(),
        }
    }

    /// Returns `true` if the remote side produced this error.
    pub fn is_rejection(&self) -> bool {
        matches!(self, Self::Rejected { .. })
    }
}

/// Hard failures while fetching or reading a receipt.
///
/// A receipt that simply is not indexed yet is *not* an error; see
/// [`crate::Inspection::Pending`].
#[derive(Debug, Error)]
pub enum InspectError {
    #[error("receipt fetch failed for {tx_hash}: {reason}")]
    Fetch { tx_hash: String, reason: String },

    #[error("malformed receipt for {tx_hash}: {reason}")]
    Malformed { tx_hash: String, reason: String },
}

/// Internal consistency faults of the dispatch engine.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// A second outcome arrived for an ordinal that was already recorded.
    #[error("duplicate outcome delivered for ordinal {ordinal}")]
    DuplicateOutcome { ordinal: u64 },

    /// The batch handed to the dispatcher lists the same ordinal twice.
    #[error("ordinal {ordinal} appears more than once in the batch")]
    DuplicateTask { ordinal: u64 },

    /// An outcome or task carries an ordinal outside `1..=N`.
    #[error("unknown ordinal {ordinal} (batch size {batch})")]
    UnknownOrdinal { ordinal: u64, batch: usize },
}
