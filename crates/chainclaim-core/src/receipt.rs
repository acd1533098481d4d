//! Transaction receipts, semantic receipt records and the two seams the
//! inspector is built on: [`ReceiptSource`] and [`LogDecoder`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::InspectError;

/// A log entry as returned inside `eth_getTransactionReceipt`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceiptLog {
    /// Contract that emitted the log.
    pub address: String,
    /// `topics[0]` is the event signature hash; the rest are indexed params.
    pub topics: Vec<String>,
    /// Hex-encoded non-indexed params.
    #[serde(default)]
    pub data: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_index: Option<String>,
}

/// The subset of a transaction receipt the inspector needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionReceipt {
    pub transaction_hash: String,
    /// `"0x1"` on success, `"0x0"` on revert (absent on pre-Byzantium chains).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_number: Option<String>,
    #[serde(default)]
    pub logs: Vec<ReceiptLog>,
}

impl TransactionReceipt {
    /// Returns `false` only when the receipt explicitly reports a revert.
    pub fn succeeded(&self) -> bool {
        !matches!(self.status.as_deref(), Some("0x0"))
    }
}

/// A decoded issuance: one item delivered to `recipient`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ReceiptRecord {
    /// Destination address as decoded from the log.
    pub recipient: String,
    /// Raw item identifier (decimal token id).
    pub token_id: String,
    /// Human-meaningful grouping derived from `token_id`.
    pub category: String,
}

impl ReceiptRecord {
    /// Case-insensitive address comparison.
    pub fn is_for(&self, recipient: &str) -> bool {
        self.recipient.eq_ignore_ascii_case(recipient)
    }
}

/// Where receipts come from (a chain node in production).
#[async_trait]
pub trait ReceiptSource: Send + Sync + 'static {
    /// `Ok(None)` means the node has not indexed the transaction yet.
    async fn transaction_receipt(
        &self,
        tx_hash: &str,
    ) -> Result<Option<TransactionReceipt>, InspectError>;
}

/// Pluggable event decoder.
///
/// Returns `None` for any log that does not decode under the decoder's event
/// schema; such logs are skipped, never treated as errors.
pub trait LogDecoder: Send + Sync + 'static {
    /// Event name, for logs.
    fn event_name(&self) -> &str;

    fn decode(&self, log: &ReceiptLog) -> Option<ReceiptRecord>;
}
