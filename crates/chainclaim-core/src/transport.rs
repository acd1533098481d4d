//! The `ClaimTransport` trait: the seam between the engine and the remote
//! claim endpoint.

use async_trait::async_trait;

use crate::error::ClaimError;
use crate::task::{Claimed, Task};

/// Performs exactly one remote claim attempt for a task.
///
/// Everything that is shared by all tasks (endpoint, bearer credential,
/// recipient, token and relayer identifiers) lives in the implementation;
/// only the task payload varies per call.
///
/// Implementations must not retry: a returned error is terminal for that
/// ordinal. They must also bound the call with a timeout and surface it as
/// [`ClaimError::Timeout`] rather than hang.
///
/// The trait is object-safe and is shared across workers as
/// `Arc<dyn ClaimTransport>`.
#[async_trait]
pub trait ClaimTransport: Send + Sync + 'static {
    async fn claim(&self, task: &Task) -> Result<Claimed, ClaimError>;

    /// Identifier of the remote endpoint, for logs.
    fn endpoint(&self) -> &str;
}
