//! Running counters folded from outcomes and receipt records.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::receipt::ReceiptRecord;
use crate::task::Outcome;

/// Count of one raw item identifier plus the category it maps to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenTally {
    pub category: String,
    pub count: u64,
}

/// Receipts addressed to the configured recipient.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiptTally {
    pub total: u64,
    /// token id → count
    pub by_id: BTreeMap<String, TokenTally>,
    /// category → count
    pub by_category: BTreeMap<String, u64>,
}

/// Success/failure counters, failure-code histogram and receipt tally.
///
/// Counters only ever increase. The engine is the sole writer; the final
/// report is a plain read of this state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClaimStats {
    recipient: String,
    pub succeeded: u64,
    pub failed: u64,
    /// failure code → count
    pub errors: BTreeMap<String, u64>,
    pub receipts: ReceiptTally,
}

impl ClaimStats {
    /// Counters for receipts addressed to `recipient`.
    pub fn new(recipient: impl Into<String>) -> Self {
        Self {
            recipient: recipient.into(),
            succeeded: 0,
            failed: 0,
            errors: BTreeMap::new(),
            receipts: ReceiptTally::default(),
        }
    }

    /// Pre-seed categories so they show up in the report even at zero.
    pub fn with_categories<I, S>(mut self, categories: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for category in categories {
            self.receipts.by_category.entry(category.into()).or_insert(0);
        }
        self
    }

    pub fn recipient(&self) -> &str {
        &self.recipient
    }

    /// Fold one outcome. Returns the failure code for failed outcomes.
    pub fn observe(&mut self, outcome: &Outcome) -> Option<String> {
        match &outcome.result {
            Ok(_) => {
                self.succeeded += 1;
                None
            }
            Err(err) => {
                self.failed += 1;
                let code = err.code();
                *self.errors.entry(code.clone()).or_insert(0) += 1;
                Some(code)
            }
        }
    }

    /// Fold the records of one inspected transaction. Records addressed to
    /// anyone else are ignored. Returns how many records were counted.
    pub fn observe_receipt(&mut self, records: &[ReceiptRecord]) -> usize {
        let mut counted = 0;
        for record in records.iter().filter(|r| r.is_for(&self.recipient)) {
            let tally = &mut self.receipts;
            tally.total += 1;
            tally
                .by_id
                .entry(record.token_id.clone())
                .or_insert_with(|| TokenTally {
                    category: record.category.clone(),
                    count: 0,
                })
                .count += 1;
            *tally.by_category.entry(record.category.clone()).or_insert(0) += 1;
            counted += 1;
        }
        counted
    }

    /// Outcomes folded so far.
    pub fn observed(&self) -> u64 {
        self.succeeded + self.failed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ClaimError;
    use crate::task::Claimed;
    use serde_json::json;

    const ME: &str = "0xAbC0000000000000000000000000000000000001";

    fn record(to: &str, id: &str, category: &str) -> ReceiptRecord {
        ReceiptRecord {
            recipient: to.into(),
            token_id: id.into(),
            category: category.into(),
        }
    }

    fn rejected(code: &str) -> Outcome {
        Outcome::failure(
            1,
            ClaimError::Rejected {
                status: 400,
                body: json!({ "code": code }),
            },
        )
    }

    #[test]
    fn histogram_sums_to_failed() {
        let mut stats = ClaimStats::new(ME);
        stats.observe(&Outcome::success(1, Claimed::with_tx("0x1")));
        assert_eq!(stats.observe(&rejected("insufficient_funds")).as_deref(), Some("insufficient_funds"));
        stats.observe(&rejected("insufficient_funds"));
        stats.observe(&Outcome::failure(4, ClaimError::Decode("bad".into())));

        assert_eq!(stats.succeeded, 1);
        assert_eq!(stats.failed, 3);
        assert_eq!(stats.errors.get("insufficient_funds"), Some(&2));
        assert_eq!(stats.errors.get("unknown"), Some(&1));
        assert_eq!(stats.errors.values().sum::<u64>(), stats.failed);
        assert_eq!(stats.observed(), 4);
    }

    #[test]
    fn receipts_grouped_by_id_and_category() {
        let mut stats = ClaimStats::new(ME).with_categories(["Bronze", "Silver", "Gold"]);
        let counted = stats.observe_receipt(&[
            record(&ME.to_lowercase(), "0", "Bronze"),
            record(ME, "1", "Silver"),
            record(ME, "1", "Silver"),
            record("0x0000000000000000000000000000000000000009", "2", "Gold"),
        ]);

        assert_eq!(counted, 3);
        assert_eq!(stats.receipts.total, 3);
        assert_eq!(stats.receipts.by_id["0"].count, 1);
        assert_eq!(stats.receipts.by_id["1"].count, 2);
        assert_eq!(stats.receipts.by_id["1"].category, "Silver");
        assert!(!stats.receipts.by_id.contains_key("2"));
        assert_eq!(stats.receipts.by_category["Bronze"], 1);
        assert_eq!(stats.receipts.by_category["Silver"], 2);
        assert_eq!(stats.receipts.by_category["Gold"], 0);
    }

    #[test]
    fn empty_records_change_nothing() {
        let mut stats = ClaimStats::new(ME);
        assert_eq!(stats.observe_receipt(&[]), 0);
        assert_eq!(stats.receipts, ReceiptTally::default());
    }
}
