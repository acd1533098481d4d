//! chainclaim-core: dispatch engine and accounting for ChainClaim.
//!
//! # Overview
//!
//! ChainClaim drains a fixed batch of pre-built claim payloads against a
//! paid-per-request remote endpoint, then verifies the on-chain side effects
//! of every successful claim. The core crate is chain- and transport-agnostic
//! and defines:
//!
//! - [`Task`] / [`Outcome`]: one unit of work and its single recorded result
//! - [`ClaimTransport`]: the async seam every remote claim client implements
//! - [`ResultSlots`]: ordinal-indexed outcome correlator
//! - [`ClaimStats`]: running success/failure/receipt counters
//! - [`ReceiptInspector`]: turns a transaction hash into semantic records
//! - [`Dispatcher`]: bounded worker pool that runs the batch to completion
//! - [`BatchReport`]: the final, read-only summary
//!
//! ```text
//! Vec<Task> → Dispatcher ──assign──▶ worker ──claim()──▶ ClaimTransport
//!                 ▲                     │
//!                 └──── WorkerEvent ────┘
//!                 │
//!                 ├── ResultSlots / ClaimStats
//!                 └── ReceiptInspector (off the critical path)
//! ```

pub mod correlator;
pub mod dispatch;
pub mod error;
pub mod inspector;
pub mod receipt;
pub mod report;
pub mod stats;
pub mod task;
pub mod transport;

pub use correlator::ResultSlots;
pub use dispatch::{DispatchConfig, Dispatcher};
pub use error::{ClaimError, DispatchError, InspectError};
pub use inspector::{Inspection, ReceiptInspector};
pub use receipt::{LogDecoder, ReceiptLog, ReceiptRecord, ReceiptSource, TransactionReceipt};
pub use report::BatchReport;
pub use stats::{ClaimStats, ReceiptTally, TokenTally};
pub use task::{Claimed, Outcome, Task};
pub use transport::ClaimTransport;
