//! Per-call context handed to phase handlers.

use gantry_core::{OperationId, PhaseId};
use tokio_util::sync::CancellationToken;

/// Identity and cancellation for one handler call.
#[derive(Debug, Clone)]
pub struct PhaseContext {
    /// Operation the phase belongs to.
    pub operation_id: OperationId,
    /// Phase being executed or rolled back.
    pub phase_id: PhaseId,
    /// 1-based attempt number of this call.
    pub attempt: u32,
    cancellation: CancellationToken,
}

impl PhaseContext {
    /// Create a context.
    #[must_use]
    pub fn new(
        operation_id: OperationId,
        phase_id: PhaseId,
        attempt: u32,
        cancellation: CancellationToken,
    ) -> Self {
        Self {
            operation_id,
            phase_id,
            attempt,
            cancellation,
        }
    }

    /// Returns `true` once the plan run has been cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// Resolves when the plan run is cancelled.
    pub async fn cancelled(&self) {
        self.cancellation.cancelled().await;
    }

    /// The underlying token, for handlers that spawn their own work.
    #[must_use]
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }
}
