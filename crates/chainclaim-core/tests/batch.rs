//! End-to-end runs of the dispatcher against scripted transports.

use std::collections::HashSet;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chainclaim_core::{
    BatchReport, ClaimError, ClaimStats, ClaimTransport, Claimed, DispatchConfig, DispatchError,
    Dispatcher, InspectError, LogDecoder, ReceiptInspector, ReceiptLog, ReceiptRecord, ReceiptSource, Task,
    TransactionReceipt,
};
use serde_json::json;

const ME: &str = "0x1111111111111111111111111111111111111111";
const NFT: &str = "0x2222222222222222222222222222222222222222";

#[derive(Default)]
struct ScriptedTransport {
    reject: HashSet<u64>,
    panic_on: HashSet<u64>,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl ScriptedTransport {
    fn rejecting(ordinals: &[u64]) -> Self {
        Self {
            reject: ordinals.iter().copied().collect(),
            ..Self::default()
        }
    }

    fn panicking(ordinals: &[u64]) -> Self {
        Self {
            panic_on: ordinals.iter().copied().collect(),
            ..Self::default()
        }
    }
}

fn tx_for(ordinal: u64) -> String {
    format!("0x{ordinal:064x}")
}

#[async_trait]
impl ClaimTransport for ScriptedTransport {
    async fn claim(&self, task: &Task) -> Result<Claimed, ClaimError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);

        // Uneven latencies so completion order differs from ordinal order.
        tokio::time::sleep(Duration::from_millis(1 + (task.ordinal * 7) % 5)).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.panic_on.contains(&task.ordinal) {
            panic!("transport blew up on ordinal {}", task.ordinal);
        }
        if self.reject.contains(&task.ordinal) {
            return Err(ClaimError::Rejected {
                status: 400,
                body: json!({ "code": "insufficient_funds", "message": "balance too low" }),
            });
        }
        Ok(Claimed::with_tx(tx_for(task.ordinal)))
    }

    fn endpoint(&self) -> &str {
        "scripted"
    }
}

/// Panics while building the claim future for `ordinal`, before anything
/// is polled. Written without `#[async_trait]` so the panic is synchronous.
struct EagerPanic {
    ordinal: u64,
    calls: AtomicUsize,
}

impl ClaimTransport for EagerPanic {
    fn claim<'life0, 'life1, 'async_trait>(
        &'life0 self,
        task: &'life1 Task,
    ) -> Pin<Box<dyn Future<Output = Result<Claimed, ClaimError>> + Send + 'async_trait>>
    where
        'life0: 'async_trait,
        'life1: 'async_trait,
        Self: 'async_trait,
    {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if task.ordinal == self.ordinal {
            panic!("no future for ordinal {}", task.ordinal);
        }
        let tx = tx_for(task.ordinal);
        Box::pin(async move {
            tokio::time::sleep(Duration::from_millis(2)).await;
            Ok(Claimed::with_tx(tx))
        })
    }

    fn endpoint(&self) -> &str {
        "eager-panic"
    }
}

/// Every tx gets the same logs; `None` means the node has not indexed it.
struct FixedReceipts(Option<Vec<ReceiptLog>>);

#[async_trait]
impl ReceiptSource for FixedReceipts {
    async fn transaction_receipt(
        &self,
        tx_hash: &str,
    ) -> Result<Option<TransactionReceipt>, InspectError> {
        Ok(self.0.clone().map(|logs| TransactionReceipt {
            transaction_hash: tx_hash.to_string(),
            status: Some("0x1".into()),
            block_number: Some("0x1".into()),
            logs,
        }))
    }
}

/// Answers long after any sensible drain deadline.
struct SlowReceipts(Duration);

#[async_trait]
impl ReceiptSource for SlowReceipts {
    async fn transaction_receipt(
        &self,
        tx_hash: &str,
    ) -> Result<Option<TransactionReceipt>, InspectError> {
        tokio::time::sleep(self.0).await;
        Ok(Some(TransactionReceipt {
            transaction_hash: tx_hash.to_string(),
            status: Some("0x1".into()),
            block_number: Some("0x1".into()),
            logs: vec![issue(ME, "0")],
        }))
    }
}

/// topics = ["issue", to, id]
struct IssueDecoder;

impl LogDecoder for IssueDecoder {
    fn event_name(&self) -> &str {
        "Issue"
    }

    fn decode(&self, log: &ReceiptLog) -> Option<ReceiptRecord> {
        match log.topics.as_slice() {
            [sig, to, id] if sig == "issue" => Some(ReceiptRecord {
                recipient: to.clone(),
                token_id: id.clone(),
                category: if id == "0" { "Bronze".into() } else { "Silver".into() },
            }),
            _ => None,
        }
    }
}

fn issue(to: &str, id: &str) -> ReceiptLog {
    ReceiptLog {
        address: NFT.into(),
        topics: vec!["issue".into(), to.into(), id.into()],
        data: "0x".into(),
        log_index: None,
    }
}

fn payloads(n: u64) -> Vec<Task> {
    Task::batch((1..=n).map(|i| json!({ "nonce": format!("0x{i:064x}") })))
}

fn config(workers: usize) -> DispatchConfig {
    DispatchConfig {
        workers,
        receipt_drain_timeout: Duration::from_secs(5),
    }
}

async fn run(transport: Arc<ScriptedTransport>, n: u64, k: usize) -> BatchReport {
    Dispatcher::new(transport, ClaimStats::new(ME), config(k))
        .run(payloads(n))
        .await
        .unwrap()
}

fn assert_accounted(report: &BatchReport, n: u64) {
    let ordinals: Vec<u64> = report.outcomes().map(|o| o.ordinal).collect();
    assert_eq!(ordinals, (1..=n).collect::<Vec<_>>());
    assert_eq!(report.outcomes.len() as u64, n);
    assert_eq!(report.succeeded() + report.failed(), n);
    assert_eq!(report.stats.errors.values().sum::<u64>(), report.failed());
    assert!(report.is_complete());
}

#[tokio::test]
async fn empty_batch_completes_immediately() {
    let transport = Arc::new(ScriptedTransport::default());
    let report = run(Arc::clone(&transport), 0, 4).await;

    assert_eq!(report.attempts, 0);
    assert_eq!(report.succeeded(), 0);
    assert_eq!(report.failed(), 0);
    assert!(report.stats.errors.is_empty());
    assert_eq!(report.stats.receipts.total, 0);
    assert!(report.is_complete());
    assert_eq!(transport.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn all_claims_succeed_without_matching_receipts() {
    let transport = Arc::new(ScriptedTransport::default());
    let inspector = ReceiptInspector::new(
        Arc::new(FixedReceipts(Some(vec![issue("0x9999999999999999999999999999999999999999", "0")]))),
        Arc::new(IssueDecoder),
        NFT,
        ME,
    );
    let report = Dispatcher::new(transport.clone(), ClaimStats::new(ME), config(2))
        .with_inspector(Arc::new(inspector))
        .run(payloads(5))
        .await
        .unwrap();

    assert_accounted(&report, 5);
    assert_eq!(report.succeeded(), 5);
    assert_eq!(report.failed(), 0);
    assert_eq!(report.stats.receipts.total, 0);
    assert_eq!(report.receipts_pending, 0);

    let hashes: HashSet<&str> = report.outcomes().filter_map(|o| o.tx_hash()).collect();
    assert_eq!(hashes.len(), 5);
    assert!(transport.peak.load(Ordering::SeqCst) <= 2);
}

#[tokio::test]
async fn rejections_land_in_the_histogram() {
    let transport = Arc::new(ScriptedTransport::rejecting(&[2, 5, 9]));
    let report = run(transport, 10, 3).await;

    assert_accounted(&report, 10);
    assert_eq!(report.succeeded(), 7);
    assert_eq!(report.failed(), 3);
    assert_eq!(report.stats.errors.len(), 1);
    assert_eq!(report.stats.errors["insufficient_funds"], 3);
    for ordinal in [2usize, 5, 9] {
        let outcome = report.outcomes[ordinal - 1].as_ref().unwrap();
        assert!(!outcome.is_success());
    }
}

#[tokio::test]
async fn in_flight_calls_never_exceed_worker_count() {
    for (n, k) in [(1u64, 1usize), (7, 1), (20, 4), (3, 10), (50, 8)] {
        let transport = Arc::new(ScriptedTransport::rejecting(&[3, 4]));
        let report = run(Arc::clone(&transport), n, k).await;

        assert_accounted(&report, n);
        let peak = transport.peak.load(Ordering::SeqCst);
        assert!(peak >= 1, "n={n} k={k}");
        assert!(peak <= k.min(n as usize), "n={n} k={k} peak={peak}");
        assert_eq!(transport.calls.load(Ordering::SeqCst) as u64, n);
    }
}

#[tokio::test]
async fn crashed_worker_leaves_its_ordinal_incomplete() {
    let transport = Arc::new(ScriptedTransport::panicking(&[3]));
    let report = run(Arc::clone(&transport), 6, 2).await;

    assert_eq!(report.incomplete, vec![3]);
    assert!(!report.is_complete());
    assert_eq!(report.succeeded(), 5);
    assert_eq!(report.failed(), 0);
    assert!(report.outcomes[2].is_none());
    // No requeue: ordinal 3 was attempted once.
    assert_eq!(transport.calls.load(Ordering::SeqCst), 6);
}

#[tokio::test]
async fn losing_every_worker_still_terminates() {
    let transport = Arc::new(ScriptedTransport::panicking(&[1]));
    let report = run(Arc::clone(&transport), 4, 1).await;

    assert_eq!(report.incomplete, vec![1, 2, 3, 4]);
    assert_eq!(report.succeeded() + report.failed(), 0);
    assert_eq!(transport.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn matching_receipts_are_tallied() {
    let transport = Arc::new(ScriptedTransport::rejecting(&[2]));
    let inspector = ReceiptInspector::new(
        Arc::new(FixedReceipts(Some(vec![issue(ME, "0"), issue(ME, "1")]))),
        Arc::new(IssueDecoder),
        NFT,
        ME,
    );
    let stats = ClaimStats::new(ME).with_categories(["Bronze", "Silver", "Gold"]);
    let report = Dispatcher::new(transport, stats, config(2))
        .with_inspector(Arc::new(inspector))
        .run(payloads(3))
        .await
        .unwrap();

    // Two successful claims, two matching records each.
    assert_eq!(report.stats.receipts.total, 4);
    assert_eq!(report.stats.receipts.by_category["Bronze"], 2);
    assert_eq!(report.stats.receipts.by_category["Silver"], 2);
    assert_eq!(report.stats.receipts.by_category["Gold"], 0);
    assert_eq!(report.stats.receipts.by_id["0"].count, 2);
    assert_eq!(report.contract.as_deref(), Some(NFT));
}

#[tokio::test]
async fn unavailable_receipts_change_nothing() {
    let transport = Arc::new(ScriptedTransport::default());
    let inspector = ReceiptInspector::new(Arc::new(FixedReceipts(None)), Arc::new(IssueDecoder), NFT, ME);
    let report = Dispatcher::new(transport, ClaimStats::new(ME), config(3))
        .with_inspector(Arc::new(inspector))
        .run(payloads(4))
        .await
        .unwrap();

    assert_accounted(&report, 4);
    assert_eq!(report.stats.receipts.total, 0);
    assert!(report.stats.receipts.by_id.is_empty());
    assert!(report.stats.errors.is_empty());
}

#[tokio::test]
async fn synchronous_panic_in_claim_does_not_hang_the_batch() {
    let transport = Arc::new(EagerPanic {
        ordinal: 2,
        calls: AtomicUsize::new(0),
    });
    let run = Dispatcher::new(transport.clone(), ClaimStats::new(ME), config(2)).run(payloads(4));
    let report = tokio::time::timeout(Duration::from_secs(5), run)
        .await
        .expect("dispatcher hung after a worker panicked")
        .unwrap();

    assert_eq!(report.incomplete, vec![2]);
    assert_eq!(report.succeeded(), 3);
    assert_eq!(report.failed(), 0);
    assert_eq!(transport.calls.load(Ordering::SeqCst), 4);
}

#[tokio::test]
async fn slow_receipts_are_cut_off_at_the_drain_deadline() {
    let transport = Arc::new(ScriptedTransport::rejecting(&[2]));
    let inspector = ReceiptInspector::new(
        Arc::new(SlowReceipts(Duration::from_secs(3))),
        Arc::new(IssueDecoder),
        NFT,
        ME,
    );
    let config = DispatchConfig {
        workers: 4,
        receipt_drain_timeout: Duration::from_millis(50),
    };

    let started = Instant::now();
    let report = Dispatcher::new(transport, ClaimStats::new(ME), config)
        .with_inspector(Arc::new(inspector))
        .run(payloads(4))
        .await
        .unwrap();

    assert!(started.elapsed() < Duration::from_secs(2));
    assert_accounted(&report, 4);
    assert_eq!(report.succeeded(), 3);
    assert_eq!(report.failed(), 1);
    assert_eq!(report.receipts_pending, 3);
    assert_eq!(report.stats.receipts.total, 0);
    assert!(report.stats.receipts.by_id.is_empty());
}

#[tokio::test]
async fn malformed_ordinals_are_rejected_before_any_claim() {
    let cases = [
        (vec![1, 2, 2], DispatchError::DuplicateTask { ordinal: 2 }),
        (vec![0, 1, 2], DispatchError::UnknownOrdinal { ordinal: 0, batch: 3 }),
        (vec![1, 2, 4], DispatchError::UnknownOrdinal { ordinal: 4, batch: 3 }),
    ];
    for (ordinals, expected) in cases {
        let transport = Arc::new(ScriptedTransport::default());
        let tasks = ordinals.iter().map(|&o| Task::new(o, json!({}))).collect();
        let err = Dispatcher::new(transport.clone(), ClaimStats::new(ME), config(2))
            .run(tasks)
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), expected.to_string(), "ordinals {ordinals:?}");
        assert_eq!(transport.calls.load(Ordering::SeqCst), 0);
    }

    // Any permutation of 1..=N is a valid batch.
    let transport = Arc::new(ScriptedTransport::default());
    let tasks = [3, 1, 2].into_iter().map(|o| Task::new(o, json!({}))).collect();
    let report = Dispatcher::new(transport, ClaimStats::new(ME), config(2))
        .run(tasks)
        .await
        .unwrap();
    assert_accounted(&report, 3);
}
