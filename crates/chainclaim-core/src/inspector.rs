//! `ReceiptInspector`: extracts the issuance records a transaction carries
//! for the configured contract and recipient.

use std::sync::Arc;

use crate::error::InspectError;
use crate::receipt::{LogDecoder, ReceiptRecord, ReceiptSource};

/// Result of inspecting one transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inspection {
    /// The node has not indexed the receipt yet. Soft condition: the caller
    /// may retry later; nothing should be counted.
    Pending,
    /// The receipt was read; zero or more matching records.
    Ready(Vec<ReceiptRecord>),
}

impl Inspection {
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending)
    }

    /// Matching records (empty while pending).
    pub fn records(&self) -> &[ReceiptRecord] {
        match self {
            Self::Pending => &[],
            Self::Ready(records) => records,
        }
    }

    pub fn into_records(self) -> Vec<ReceiptRecord> {
        match self {
            Self::Pending => Vec::new(),
            Self::Ready(records) => records,
        }
    }
}

/// Fetches a receipt and keeps the logs that
/// 1. were emitted by `contract`,
/// 2. decode under the decoder's event schema, and
/// 3. are addressed to `recipient`.
///
/// Address comparisons are case-insensitive. Inspection holds no state, so
/// inspecting the same transaction twice yields the same records.
pub struct ReceiptInspector {
    source: Arc<dyn ReceiptSource>,
    decoder: Arc<dyn LogDecoder>,
    contract: String,
    recipient: String,
}

impl ReceiptInspector {
    pub fn new(
        source: Arc<dyn ReceiptSource>,
        decoder: Arc<dyn LogDecoder>,
        contract: impl Into<String>,
        recipient: impl Into<String>,
    ) -> Self {
        Self {
            source,
            decoder,
            contract: contract.into(),
            recipient: recipient.into(),
        }
    }

    pub fn contract(&self) -> &str {
        &self.contract
    }

    pub fn recipient(&self) -> &str {
        &self.recipient
    }

    pub async fn inspect(&self, tx_hash: &str) -> Result<Inspection, InspectError> {
        let Some(receipt) = self.source.transaction_receipt(tx_hash).await? else {
            tracing::info!(tx = %tx_hash, "receipt not yet available, skipping item details");
            return Ok(Inspection::Pending);
        };

        if !receipt.succeeded() {
            tracing::warn!(tx = %tx_hash, "transaction reverted on-chain");
        }

        let records: Vec<ReceiptRecord> = receipt
            .logs
            .iter()
            .filter(|log| log.address.eq_ignore_ascii_case(&self.contract))
            .filter_map(|log| self.decoder.decode(log))
            .filter(|record| record.is_for(&self.recipient))
            .collect();

        if records.is_empty() {
            tracing::info!(
                tx = %tx_hash,
                contract = %self.contract,
                event = self.decoder.event_name(),
                "no matching items from target contract in this tx"
            );
        }
        for record in &records {
            tracing::info!(
                tx = %tx_hash,
                contract = %self.contract,
                token_id = %record.token_id,
                category = %record.category,
                "item received"
            );
        }

        Ok(Inspection::Ready(records))
    }
}
