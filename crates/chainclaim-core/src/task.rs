//! Tasks and outcomes: the unit of work and its single recorded result.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ClaimError;

/// One unit of work in the fixed batch.
///
/// `ordinal` is the 1-based position in the batch. `payload` is the opaque,
/// pre-built authorization the remote endpoint expects; the engine never
/// looks inside it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub ordinal: u64,
    pub payload: Value,
}

impl Task {
    pub fn new(ordinal: u64, payload: Value) -> Self {
        Self { ordinal, payload }
    }

    /// Number a list of payloads `1..=N` in order.
    pub fn batch<I>(payloads: I) -> Vec<Task>
    where
        I: IntoIterator<Item = Value>,
    {
        payloads
            .into_iter()
            .zip(1u64..)
            .map(|(payload, ordinal)| Task { ordinal, payload })
            .collect()
    }
}

/// Success payload of a claim call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claimed {
    /// Transaction that carries the on-chain side effect, if the endpoint
    /// reported one.
    pub tx_hash: Option<String>,
}

impl Claimed {
    pub fn with_tx(tx_hash: impl Into<String>) -> Self {
        Self {
            tx_hash: Some(tx_hash.into()),
        }
    }
}

/// The single result recorded for a task ordinal.
#[derive(Debug, Clone)]
pub struct Outcome {
    pub ordinal: u64,
    pub result: Result<Claimed, ClaimError>,
}

impl Outcome {
    pub fn success(ordinal: u64, claimed: Claimed) -> Self {
        Self {
            ordinal,
            result: Ok(claimed),
        }
    }

    pub fn failure(ordinal: u64, error: ClaimError) -> Self {
        Self {
            ordinal,
            result: Err(error),
        }
    }

    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }

    /// Transaction hash of a successful claim.
    pub fn tx_hash(&self) -> Option<&str> {
        self.result.as_ref().ok()?.tx_hash.as_deref()
    }

    pub fn error(&self) -> Option<&ClaimError> {
        self.result.as_ref().err()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn batch_numbers_from_one() {
        let tasks = Task::batch(vec![json!({"n": "a"}), json!({"n": "b"}), json!({"n": "c"})]);
        let ordinals: Vec<u64> = tasks.iter().map(|t| t.ordinal).collect();
        assert_eq!(ordinals, vec![1, 2, 3]);
        assert_eq!(tasks[1].payload["n"], "b");
    }

    #[test]
    fn empty_batch() {
        assert!(Task::batch(Vec::new()).is_empty());
    }

    #[test]
    fn outcome_accessors() {
        let ok = Outcome::success(4, Claimed::with_tx("0xabc"));
        assert!(ok.is_success());
        assert_eq!(ok.tx_hash(), Some("0xabc"));
        assert!(ok.error().is_none());

        let bare = Outcome::success(5, Claimed { tx_hash: None });
        assert!(bare.tx_hash().is_none());

        let failed = Outcome::failure(6, ClaimError::Timeout { ms: 10 });
        assert!(!failed.is_success());
        assert!(failed.tx_hash().is_none());
        assert_eq!(failed.error().map(|e| e.code()), Some("timeout".to_string()));
    }
}
