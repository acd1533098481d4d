//! Final batch report.

use std::fmt;

use crate::stats::ClaimStats;
use crate::task::Outcome;

/// Everything known once the batch has finished.
#[derive(Debug, Clone)]
pub struct BatchReport {
    /// Number of tasks in the batch.
    pub attempts: u64,
    pub stats: ClaimStats,
    /// Contract whose receipts were tallied, when receipt inspection ran.
    pub contract: Option<String>,
    /// Ordinals that never produced an outcome (their worker crashed).
    pub incomplete: Vec<u64>,
    /// Inspections still outstanding when the report was built.
    pub receipts_pending: usize,
    /// Recorded outcomes in ordinal order; `None` for incomplete ordinals.
    pub outcomes: Vec<Option<Outcome>>,
}

impl BatchReport {
    pub fn succeeded(&self) -> u64 {
        self.stats.succeeded
    }

    pub fn failed(&self) -> u64 {
        self.stats.failed
    }

    /// Every ordinal produced exactly one outcome.
    pub fn is_complete(&self) -> bool {
        self.incomplete.is_empty()
    }

    /// Iterate over recorded outcomes in ordinal order.
    pub fn outcomes(&self) -> impl Iterator<Item = &Outcome> {
        self.outcomes.iter().flatten()
    }
}

impl fmt::Display for BatchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "================ SUMMARY ================")?;
        writeln!(f, "Total attempts : {}", self.attempts)?;
        writeln!(f, "Success claims : {}", self.stats.succeeded)?;
        writeln!(f, "Failed claims  : {}", self.stats.failed)?;
        if !self.incomplete.is_empty() {
            writeln!(f, "Never completed: {} {:?}", self.incomplete.len(), self.incomplete)?;
        }

        writeln!(f)?;
        writeln!(f, "Error counts:")?;
        for (code, count) in &self.stats.errors {
            writeln!(f, "  - {code}: {count}")?;
        }

        writeln!(f)?;
        match &self.contract {
            Some(contract) => writeln!(
                f,
                "Items received (from contract {contract} to {}):",
                self.stats.recipient()
            )?,
            None => writeln!(f, "Items received (to {}):", self.stats.recipient())?,
        }
        let receipts = &self.stats.receipts;
        writeln!(f, "  Total items : {}", receipts.total)?;
        if self.receipts_pending > 0 {
            writeln!(f, "  Receipts still pending: {}", self.receipts_pending)?;
        }
        writeln!(f, "  By Token ID:")?;
        for (id, tally) in &receipts.by_id {
            writeln!(f, "    - ID {id} ({}): {}", tally.category, tally.count)?;
        }
        writeln!(f, "  By Category:")?;
        for (category, count) in &receipts.by_category {
            writeln!(f, "    - {category}: {count}")?;
        }
        write!(f, "=========================================")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ClaimError;
    use crate::receipt::ReceiptRecord;
    use crate::task::Claimed;
    use serde_json::json;

    #[test]
    fn summary_lists_codes_and_categories() {
        let mut stats = ClaimStats::new("0xme").with_categories(["Bronze", "Silver"]);
        let ok = Outcome::success(1, Claimed::with_tx("0x1"));
        let bad = Outcome::failure(
            2,
            ClaimError::Rejected {
                status: 402,
                body: json!({ "code": "insufficient_funds" }),
            },
        );
        stats.observe(&ok);
        stats.observe(&bad);
        stats.observe_receipt(&[ReceiptRecord {
            recipient: "0xME".into(),
            token_id: "1".into(),
            category: "Silver".into(),
        }]);

        let report = BatchReport {
            attempts: 3,
            stats,
            contract: Some("0xnft".into()),
            incomplete: vec![3],
            receipts_pending: 0,
            outcomes: vec![Some(ok), Some(bad), None],
        };

        let text = report.to_string();
        assert!(text.contains("Total attempts : 3"));
        assert!(text.contains("  - insufficient_funds: 1"));
        assert!(text.contains("Never completed: 1 [3]"));
        assert!(text.contains("from contract 0xnft to 0xme"));
        assert!(text.contains("    - ID 1 (Silver): 1"));
        assert!(text.contains("    - Bronze: 0"));
        assert!(!report.is_complete());
        assert_eq!(report.outcomes().count(), 2);
    }
}
