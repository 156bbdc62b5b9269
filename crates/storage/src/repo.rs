//! [`PlanRepo`] over a key-value backend.

use async_trait::async_trait;
use gantry_core::OperationId;
use gantry_plan::Plan;
use gantry_ports::{KvBackend, PlanRepo, PortsError, Record};

use crate::codec::{Codec, JsonCodec};

const LIVE_PREFIX: &str = "/operations/";
const ARCHIVE_PREFIX: &str = "/archive/operations/";
const ENTITY: &str = "plan";

/// Key of a live plan.
#[must_use]
pub fn live_key(id: OperationId) -> String {
    format!("{LIVE_PREFIX}{id}")
}

/// Key of an archived plan.
#[must_use]
pub fn archive_key(id: OperationId) -> String {
    format!("{ARCHIVE_PREFIX}{id}")
}

/// Plan repository storing each plan as one versioned record.
///
/// The record version always equals `Plan::version`.
#[derive(Debug, Clone)]
pub struct KvPlanRepo<B, C = JsonCodec> {
    backend: B,
    codec: C,
}

impl<B: KvBackend> KvPlanRepo<B, JsonCodec> {
    /// Repository using the JSON codec.
    #[must_use]
    pub fn new(backend: B) -> Self {
        Self::with_codec(backend, JsonCodec)
    }
}

impl<B: KvBackend, C: Codec> KvPlanRepo<B, C> {
    /// Repository using a specific codec.
    #[must_use]
    pub fn with_codec(backend: B, codec: C) -> Self {
        Self { backend, codec }
    }

    /// The underlying backend.
    #[must_use]
    pub fn backend(&self) -> &B {
        &self.backend
    }

    fn decode(&self, record: &Record) -> Result<Plan, PortsError> {
        let mut plan: Plan = self.codec.decode(&record.value)?;
        plan.version = record.version;
        Ok(plan)
    }
}

/// Re-label record-level errors as plan errors.
fn for_plan(err: PortsError, id: OperationId) -> PortsError {
    match err {
        PortsError::Conflict {
            expected_version,
            actual_version,
            ..
        } => PortsError::conflict(ENTITY, id.to_string(), expected_version, actual_version),
        PortsError::NotFound { .. } => PortsError::not_found(ENTITY, id.to_string()),
        PortsError::AlreadyExists { .. } => PortsError::already_exists(ENTITY, id.to_string()),
        other => other,
    }
}

#[async_trait]
impl<B: KvBackend, C: Codec> PlanRepo for KvPlanRepo<B, C> {
    async fn create(&self, plan: &Plan) -> Result<(), PortsError> {
        let id = plan.operation_id;
        let record = Record::new(plan.version, self.codec.encode(plan)?);
        self.backend
            .put_if(&live_key(id), None, record)
            .await
            .map_err(|e| for_plan(e, id))?;
        tracing::debug!(operation_id = %id, codec = self.codec.name(), "created plan record");
        Ok(())
    }

    async fn load(&self, id: OperationId) -> Result<Plan, PortsError> {
        if let Some(record) = self.backend.get(&live_key(id)).await? {
            return self.decode(&record);
        }
        match self.backend.get(&archive_key(id)).await? {
            Some(record) => self.decode(&record),
            None => Err(PortsError::not_found(ENTITY, id.to_string())),
        }
    }

    async fn save(&self, plan: &mut Plan) -> Result<u64, PortsError> {
        let id = plan.operation_id;
        let expected = plan.version;
        let next = expected + 1;

        plan.version = next;
        let encoded = self.codec.encode(&*plan);
        let result = match encoded {
            Ok(bytes) => self
                .backend
                .put_if(&live_key(id), Some(expected), Record::new(next, bytes))
                .await
                .map_err(|e| for_plan(e, id)),
            Err(err) => Err(err),
        };

        match result {
            Ok(()) => {
                tracing::trace!(operation_id = %id, version = next, "saved plan");
                Ok(next)
            }
            Err(err) => {
                plan.version = expected;
                if matches!(err, PortsError::Conflict { .. }) {
                    tracing::warn!(operation_id = %id, expected, error = %err, "plan save lost compare-and-swap");
                }
                Err(err)
            }
        }
    }

    async fn archive(&self, id: OperationId) -> Result<(), PortsError> {
        let live = live_key(id);
        let Some(record) = self.backend.get(&live).await? else {
            return match self.backend.get(&archive_key(id)).await? {
                Some(_) => Ok(()),
                None => Err(PortsError::not_found(ENTITY, id.to_string())),
            };
        };

        let mut plan = self.decode(&record)?;
        plan.archived = true;
        let archived = Record::new(record.version, self.codec.encode(&plan)?);
        match self.backend.put_if(&archive_key(id), None, archived).await {
            // A previous attempt may have died between the put and the delete.
            Ok(()) | Err(PortsError::AlreadyExists { .. }) => {}
            Err(err) => return Err(for_plan(err, id)),
        }
        self.backend.delete(&live).await?;
        tracing::info!(operation_id = %id, "archived plan");
        Ok(())
    }

    async fn list_active(&self) -> Result<Vec<OperationId>, PortsError> {
        let keys = self.backend.list(LIVE_PREFIX).await?;
        Ok(keys
            .iter()
            .filter_map(|key| key.strip_prefix(LIVE_PREFIX))
            .filter_map(|raw| OperationId::parse(raw).ok())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use gantry_plan::{PhaseSpec, State, build_plan};
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::codec::Base64JsonCodec;
    use crate::memory::MemoryBackend;

    fn plan() -> Plan {
        build_plan(
            OperationId::v4(),
            [PhaseSpec::new("/init".parse().unwrap(), "noop".parse().unwrap())],
        )
        .unwrap()
    }

    #[tokio::test]
    async fn create_load_save() {
        let repo = KvPlanRepo::new(MemoryBackend::new());
        let mut plan = plan();
        repo.create(&plan).await.unwrap();

        plan.transition(State::InProgress).unwrap();
        assert_eq!(repo.save(&mut plan).await.unwrap(), 1);
        assert_eq!(plan.version, 1);

        let loaded = repo.load(plan.operation_id).await.unwrap();
        assert_eq!(loaded.version, 1);
        assert_eq!(loaded.state, State::InProgress);
    }

    #[tokio::test]
    async fn create_twice_is_already_exists() {
        let repo = KvPlanRepo::new(MemoryBackend::new());
        let plan = plan();
        repo.create(&plan).await.unwrap();
        let err = repo.create(&plan).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            format!("plan already exists: {}", plan.operation_id)
        );
    }

    #[tokio::test]
    async fn stale_save_conflicts_and_keeps_version() {
        let repo = KvPlanRepo::new(MemoryBackend::new());
        let mut first = plan();
        repo.create(&first).await.unwrap();
        let mut second = first.clone();

        repo.save(&mut first).await.unwrap();
        let err = repo.save(&mut second).await.unwrap_err();
        assert!(matches!(
            err,
            PortsError::Conflict {
                expected_version: 0,
                actual_version: 1,
                ..
            }
        ));
        assert_eq!(second.version, 0);
    }

    #[tokio::test]
    async fn load_missing_is_not_found() {
        let repo = KvPlanRepo::new(MemoryBackend::new());
        assert!(repo.load(OperationId::v4()).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn archive_moves_plan() {
        let backend = MemoryBackend::new();
        let repo = KvPlanRepo::with_codec(backend.clone(), Base64JsonCodec);
        let plan = plan();
        let id = plan.operation_id;
        repo.create(&plan).await.unwrap();
        assert_eq!(repo.list_active().await.unwrap(), vec![id]);

        repo.archive(id).await.unwrap();
        repo.archive(id).await.unwrap();

        assert!(repo.list_active().await.unwrap().is_empty());
        let loaded = repo.load(id).await.unwrap();
        assert!(loaded.archived);
        assert_eq!(backend.list(ARCHIVE_PREFIX).await.unwrap(), vec![archive_key(id)]);
    }

    #[tokio::test]
    async fn archive_missing_is_not_found() {
        let repo = KvPlanRepo::new(MemoryBackend::new());
        assert!(repo.archive(OperationId::v4()).await.unwrap_err().is_not_found());
    }
}
