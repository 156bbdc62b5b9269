//! Plan repository port.

use async_trait::async_trait;
use gantry_core::OperationId;
use gantry_plan::Plan;

use crate::error::PortsError;

/// Durable storage of plans with optimistic concurrency.
///
/// `Plan::version` is the concurrency token: `save` succeeds only if the
/// stored version equals the version of the plan passed in, and bumps it.
#[async_trait]
pub trait PlanRepo: Send + Sync {
    /// Persist a new plan. Fails with `Conflict` if the operation already exists.
    async fn create(&self, plan: &Plan) -> Result<(), PortsError>;

    /// Load a plan, live or archived. Fails with `NotFound` if absent.
    async fn load(&self, id: OperationId) -> Result<Plan, PortsError>;

    /// Compare-and-swap on `plan.version`. On success the stored version and
    /// `plan.version` both advance by one.
    async fn save(&self, plan: &mut Plan) -> Result<u64, PortsError>;

    /// Retire a plan: move it out of the live set without deleting it.
    async fn archive(&self, id: OperationId) -> Result<(), PortsError>;

    /// Operations that are not archived.
    async fn list_active(&self) -> Result<Vec<OperationId>, PortsError>;
}
