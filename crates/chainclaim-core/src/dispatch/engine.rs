//! `Dispatcher`: runs a fixed batch to completion on a bounded worker pool.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, error, info, warn};

use super::worker::{panic_message, run_worker, WorkerEvent, WorkerId, WorkerSlot};
use crate::correlator::ResultSlots;
use crate::error::{DispatchError, InspectError};
use crate::inspector::{Inspection, ReceiptInspector};
use crate::report::BatchReport;
use crate::stats::ClaimStats;
use crate::task::{Outcome, Task};
use crate::transport::ClaimTransport;

/// Failures past this many are only logged every `PROGRESS_EVERY` ordinals.
const LOUD_FAILURES: u64 = 3;
const PROGRESS_EVERY: u64 = 100;

/// Configuration for a [`Dispatcher`].
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    /// Maximum number of concurrently in-flight claim calls.
    pub workers: usize,
    /// How long to wait for outstanding receipt inspections once every task
    /// has an outcome.
    pub receipt_drain_timeout: Duration,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            workers: 20,
            receipt_drain_timeout: Duration::from_secs(10),
        }
    }
}

/// Greedy, order-preserving batch runner.
///
/// Tasks are handed out in ordinal order to whichever worker is idle; there
/// is no priority, no reordering and no retry. Outcomes can arrive in any
/// order. The batch is complete when every ordinal has exactly one outcome;
/// all workers are then terminated and the report is returned.
///
/// A worker whose claim call panics is logged and dropped from the pool
/// without respawn. Its ordinal is reported in [`BatchReport::incomplete`].
pub struct Dispatcher {
    transport: Arc<dyn ClaimTransport>,
    inspector: Option<Arc<ReceiptInspector>>,
    stats: ClaimStats,
    config: DispatchConfig,
}

impl Dispatcher {
    pub fn new(transport: Arc<dyn ClaimTransport>, stats: ClaimStats, config: DispatchConfig) -> Self {
        Self {
            transport,
            inspector: None,
            stats,
            config,
        }
    }

    /// Inspect the receipt of every successful claim and tally its records.
    pub fn with_inspector(mut self, inspector: Arc<ReceiptInspector>) -> Self {
        self.inspector = Some(inspector);
        self
    }

    /// Run `tasks` to completion.
    ///
    /// The ordinals of `tasks` must be exactly `1..=N`; anything else is
    /// rejected before a worker is spawned. Beyond that only internal
    /// consistency faults are returned as errors; failed claims are part of
    /// the report.
    pub async fn run(self, tasks: Vec<Task>) -> Result<BatchReport, DispatchError> {
        check_ordinals(&tasks)?;
        let total = tasks.len();
        let contract = self.inspector.as_ref().map(|i| i.contract().to_string());
        let mut batch = Batch {
            total,
            finished: 0,
            pending: tasks.into_iter(),
            slots: ResultSlots::new(total),
            stats: self.stats,
            pool: Vec::new(),
            inspector: self.inspector,
            inspections: JoinSet::new(),
        };

        if total == 0 {
            info!("empty batch, nothing to dispatch");
            return Ok(batch.into_report(contract, 0));
        }

        let pool_size = self.config.workers.max(1).min(total);
        info!(
            tasks = total,
            workers = pool_size,
            endpoint = self.transport.endpoint(),
            "spawning workers"
        );

        let (event_tx, mut event_rx) = mpsc::channel(pool_size);
        let mut workers = JoinSet::new();
        for id in 0..pool_size {
            let (task_tx, task_rx) = mpsc::channel(1);
            let body = run_worker(id, Arc::clone(&self.transport), task_rx, event_tx.clone());
            workers.spawn(async move {
                let exit = AssertUnwindSafe(body).catch_unwind().await;
                (id, exit.err().map(|panic| panic_message(panic.as_ref())))
            });
            batch.pool.push(WorkerSlot::new(id, task_tx));
        }
        // Only workers hold senders, so the channel closes once all have exited.
        drop(event_tx);

        for id in 0..pool_size {
            batch.assign(id);
        }

        while !batch.is_settled() {
            let step = tokio::select! {
                event = event_rx.recv() => Step::Worker(event),
                Some(joined) = batch.inspections.join_next(), if !batch.inspections.is_empty() => {
                    Step::Inspection(joined)
                }
                Some(exited) = workers.join_next(), if !workers.is_empty() => Step::Exited(exited),
            };

            match step {
                Step::Worker(Some(event)) => batch.on_worker_event(event)?,
                Step::Worker(None) => {
                    warn!("every worker has exited");
                    break;
                }
                Step::Inspection(joined) => batch.on_inspection(joined),
                Step::Exited(Ok((worker, panic))) => batch.on_worker_exit(worker, panic),
                Step::Exited(Err(err)) => error!(error = %err, "worker task failed to join"),
            }
        }

        // Terminate every worker, idle or not.
        workers.shutdown().await;

        if batch.finished < batch.total {
            warn!(
                finished = batch.finished,
                total = batch.total,
                incomplete = ?batch.slots.missing(),
                "batch ended with ordinals that never completed"
            );
        }

        let receipts_pending = batch.drain_inspections(self.config.receipt_drain_timeout).await;
        let report = batch.into_report(contract, receipts_pending);
        info!(
            attempts = report.attempts,
            succeeded = report.succeeded(),
            failed = report.failed(),
            receipts = report.stats.receipts.total,
            "batch complete"
        );
        Ok(report)
    }
}

/// Ordinals must be a permutation of `1..=N`.
fn check_ordinals(tasks: &[Task]) -> Result<(), DispatchError> {
    let batch = tasks.len();
    let mut seen = vec![false; batch];
    for task in tasks {
        let ordinal = task.ordinal;
        let slot = ordinal
            .checked_sub(1)
            .and_then(|idx| usize::try_from(idx).ok())
            .and_then(|idx| seen.get_mut(idx))
            .ok_or(DispatchError::UnknownOrdinal { ordinal, batch })?;
        if *slot {
            return Err(DispatchError::DuplicateTask { ordinal });
        }
        *slot = true;
    }
    Ok(())
}

type InspectionResult = (u64, String, Result<Inspection, InspectError>);

/// A worker task ended; carries the panic message if it unwound.
type WorkerExit = (WorkerId, Option<String>);

enum Step {
    Worker(Option<WorkerEvent>),
    Inspection(Result<InspectionResult, JoinError>),
    Exited(Result<WorkerExit, JoinError>),
}

/// Coordinator state for one run. Only the coordinator loop touches it.
struct Batch {
    total: usize,
    finished: usize,
    /// Cursor over tasks not yet assigned.
    pending: std::vec::IntoIter<Task>,
    slots: ResultSlots,
    stats: ClaimStats,
    pool: Vec<WorkerSlot>,
    inspector: Option<Arc<ReceiptInspector>>,
    inspections: JoinSet<InspectionResult>,
}

impl Batch {
    /// Every ordinal has an outcome, or nothing is running that could
    /// still produce one.
    fn is_settled(&self) -> bool {
        self.finished == self.total || self.pool.iter().all(|w| w.in_flight.is_none())
    }

    /// Hand the next task to `worker` if it is idle and work remains.
    fn assign(&mut self, worker: WorkerId) {
        if self.finished == self.total {
            return;
        }
        let Some(slot) = self.pool.get_mut(worker) else {
            return;
        };
        if !slot.is_idle() {
            return;
        }
        let Some(task) = self.pending.next() else {
            return;
        };

        let ordinal = task.ordinal;
        match slot.inbox.try_send(task) {
            Ok(()) => slot.in_flight = Some(ordinal),
            Err(_) => {
                error!(
                    worker = slot.id,
                    ordinal, "worker exited unexpectedly; ordinal will not complete"
                );
                slot.alive = false;
            }
        }
    }

    fn on_worker_event(&mut self, event: WorkerEvent) -> Result<(), DispatchError> {
        match event {
            WorkerEvent::Finished { worker, outcome } => {
                if let Some(slot) = self.pool.get_mut(worker) {
                    slot.in_flight = None;
                }
                self.record(outcome)?;
                self.assign(worker);
            }
            WorkerEvent::Crashed {
                worker,
                ordinal,
                reason,
            } => {
                if let Some(slot) = self.pool.get_mut(worker) {
                    slot.alive = false;
                    // The exit may already have been seen through the join set.
                    if slot.in_flight.take().is_some() {
                        error!(worker, ordinal, %reason, "worker crashed; ordinal will not complete");
                    }
                }
            }
        }
        Ok(())
    }

    /// A worker task ended while the batch was still running.
    fn on_worker_exit(&mut self, worker: WorkerId, panic: Option<String>) {
        let Some(slot) = self.pool.get_mut(worker) else {
            return;
        };
        slot.alive = false;
        match (slot.in_flight.take(), panic) {
            (Some(ordinal), Some(reason)) => {
                error!(worker, ordinal, %reason, "worker panicked; ordinal will not complete")
            }
            (Some(ordinal), None) => {
                error!(worker, ordinal, "worker exited unexpectedly; ordinal will not complete")
            }
            (None, Some(reason)) => error!(worker, %reason, "idle worker panicked"),
            (None, None) => debug!(worker, "worker stopped"),
        }
    }

    fn record(&mut self, outcome: Outcome) -> Result<(), DispatchError> {
        let ordinal = outcome.ordinal;
        let tx_hash = outcome.tx_hash().map(str::to_string);
        let failure = outcome.error().map(|e| e.to_string());

        self.slots.record(outcome)?;
        let code = self.slots.get(ordinal).and_then(|o| self.stats.observe(o));
        self.finished += 1;

        match (code, failure) {
            (Some(code), Some(error)) => {
                if self.stats.failed <= LOUD_FAILURES || ordinal % PROGRESS_EVERY == 0 {
                    warn!(ordinal, %code, %error, "claim failed");
                } else {
                    debug!(ordinal, %code, %error, "claim failed");
                }
            }
            _ => match &tx_hash {
                Some(tx) => info!(ordinal, tx = %tx, "claim succeeded"),
                None => info!(ordinal, "claim succeeded without a transaction hash"),
            },
        }

        if let (Some(tx), Some(inspector)) = (tx_hash, &self.inspector) {
            let inspector = Arc::clone(inspector);
            self.inspections.spawn(async move {
                let result = inspector.inspect(&tx).await;
                (ordinal, tx, result)
            });
        }

        if self.finished as u64 % PROGRESS_EVERY == 0 {
            info!(
                finished = self.finished,
                total = self.total,
                succeeded = self.stats.succeeded,
                failed = self.stats.failed,
                "batch progress"
            );
        }
        Ok(())
    }

    fn on_inspection(&mut self, joined: Result<InspectionResult, JoinError>) {
        match joined {
            Ok((ordinal, tx, Ok(inspection))) => {
                if inspection.is_pending() {
                    debug!(ordinal, tx = %tx, "receipt pending; not counted");
                    return;
                }
                let counted = self.stats.observe_receipt(inspection.records());
                debug!(ordinal, tx = %tx, counted, "receipt tallied");
            }
            Ok((ordinal, tx, Err(err))) => {
                warn!(ordinal, tx = %tx, error = %err, "could not read receipt");
            }
            Err(err) => error!(error = %err, "receipt inspection task failed"),
        }
    }

    /// Wait up to `limit` for outstanding inspections; returns how many were
    /// still outstanding and got cancelled.
    async fn drain_inspections(&mut self, limit: Duration) -> usize {
        if self.inspections.is_empty() {
            return 0;
        }
        info!(outstanding = self.inspections.len(), "waiting for receipt inspections");

        let drained = tokio::time::timeout(limit, async {
            while let Some(joined) = self.inspections.join_next().await {
                self.on_inspection(joined);
            }
        })
        .await;

        let outstanding = self.inspections.len();
        if drained.is_err() {
            warn!(outstanding, "receipt inspections still running; giving up on them");
        }
        self.inspections.shutdown().await;
        outstanding
    }

    fn into_report(self, contract: Option<String>, receipts_pending: usize) -> BatchReport {
        BatchReport {
            attempts: self.total as u64,
            incomplete: self.slots.missing(),
            stats: self.stats,
            contract,
            receipts_pending,
            outcomes: self.slots.into_outcomes(),
        }
    }
}
