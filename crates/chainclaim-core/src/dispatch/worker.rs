//! Worker units: one task in, exactly one event out.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tokio::sync::mpsc;

use crate::task::{Outcome, Task};
use crate::transport::ClaimTransport;

/// Index of a worker in the pool.
pub type WorkerId = usize;

/// Message from a worker back to the coordinator.
#[derive(Debug)]
pub(crate) enum WorkerEvent {
    /// The remote call returned, successfully or not.
    Finished { worker: WorkerId, outcome: Outcome },
    /// The remote call panicked. The worker exits after reporting this and
    /// `ordinal` never gets an outcome.
    Crashed {
        worker: WorkerId,
        ordinal: u64,
        reason: String,
    },
}

/// Coordinator-side view of a worker.
#[derive(Debug)]
pub(crate) struct WorkerSlot {
    pub id: WorkerId,
    pub inbox: mpsc::Sender<Task>,
    /// Ordinal currently assigned; `None` while idle.
    pub in_flight: Option<u64>,
    pub alive: bool,
}

impl WorkerSlot {
    pub fn new(id: WorkerId, inbox: mpsc::Sender<Task>) -> Self {
        Self {
            id,
            inbox,
            in_flight: None,
            alive: true,
        }
    }

    pub fn is_idle(&self) -> bool {
        self.alive && self.in_flight.is_none()
    }
}

/// Worker body: receive a task, make one claim call, report, repeat.
///
/// Returns when the inbox closes, the coordinator stops listening, or the
/// claim call panics. A panic while the transport builds its future counts
/// as a panic of the call.
pub(crate) async fn run_worker(
    id: WorkerId,
    transport: Arc<dyn ClaimTransport>,
    mut inbox: mpsc::Receiver<Task>,
    events: mpsc::Sender<WorkerEvent>,
) {
    while let Some(task) = inbox.recv().await {
        let ordinal = task.ordinal;
        tracing::trace!(worker = id, ordinal, "claim started");

        let call = AssertUnwindSafe(async { transport.claim(&task).await })
            .catch_unwind()
            .await;
        let (event, crashed) = match call {
            Ok(result) => (
                WorkerEvent::Finished {
                    worker: id,
                    outcome: Outcome { ordinal, result },
                },
                false,
            ),
            Err(panic) => (
                WorkerEvent::Crashed {
                    worker: id,
                    ordinal,
                    reason: panic_message(panic.as_ref()),
                },
                true,
            ),
        };

        if events.send(event).await.is_err() || crashed {
            break;
        }
    }
    tracing::trace!(worker = id, "worker stopped");
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "worker panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ClaimError;
    use crate::task::Claimed;
    use async_trait::async_trait;
    use serde_json::json;

    struct EchoTransport;

    #[async_trait]
    impl ClaimTransport for EchoTransport {
        async fn claim(&self, task: &Task) -> Result<Claimed, ClaimError> {
            if task.ordinal == 13 {
                panic!("unlucky ordinal");
            }
            if task.ordinal % 2 == 0 {
                return Err(ClaimError::Timeout { ms: 5 });
            }
            Ok(Claimed::with_tx(format!("0x{:x}", task.ordinal)))
        }

        fn endpoint(&self) -> &str {
            "echo"
        }
    }

    #[tokio::test]
    async fn reports_one_event_per_task() {
        let (task_tx, task_rx) = mpsc::channel(1);
        let (event_tx, mut event_rx) = mpsc::channel(4);
        let handle = tokio::spawn(run_worker(7, Arc::new(EchoTransport), task_rx, event_tx));

        task_tx.send(Task::new(1, json!({}))).await.unwrap();
        match event_rx.recv().await.unwrap() {
            WorkerEvent::Finished { worker, outcome } => {
                assert_eq!(worker, 7);
                assert_eq!(outcome.tx_hash(), Some("0x1"));
            }
            other => panic!("unexpected event: {other:?}"),
        }

        task_tx.send(Task::new(2, json!({}))).await.unwrap();
        match event_rx.recv().await.unwrap() {
            WorkerEvent::Finished { outcome, .. } => assert!(!outcome.is_success()),
            other => panic!("unexpected event: {other:?}"),
        }

        drop(task_tx);
        handle.await.unwrap();
        assert!(event_rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn panic_becomes_crash_event_and_worker_exits() {
        let (task_tx, task_rx) = mpsc::channel(1);
        let (event_tx, mut event_rx) = mpsc::channel(4);
        let handle = tokio::spawn(run_worker(0, Arc::new(EchoTransport), task_rx, event_tx));

        task_tx.send(Task::new(13, json!({}))).await.unwrap();
        match event_rx.recv().await.unwrap() {
            WorkerEvent::Crashed { ordinal, reason, .. } => {
                assert_eq!(ordinal, 13);
                assert!(reason.contains("unlucky"));
            }
            other => panic!("unexpected event: {other:?}"),
        }
        handle.await.unwrap();
        assert!(task_tx.send(Task::new(14, json!({}))).await.is_err());
    }
}
