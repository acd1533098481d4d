//! Bounded worker pool that drains a fixed batch of claim tasks.
//!
//! One coordinator owns every piece of mutable batch state (task cursor,
//! result slots, statistics, outstanding receipt inspections). Workers own
//! nothing but the task they are currently running and talk to the
//! coordinator only through channels: a task goes in, a [`WorkerEvent`]
//! comes back.

mod engine;
mod worker;

pub use engine::{DispatchConfig, Dispatcher};
pub use worker::WorkerId;
