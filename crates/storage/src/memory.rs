//! In-memory key-value backend.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use gantry_ports::{KvBackend, PortsError, Record};
use parking_lot::Mutex;

/// A [`KvBackend`] held in process memory. Clones share the same store.
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    records: Arc<Mutex<BTreeMap<String, Record>>>,
}

impl MemoryBackend {
    /// Create an empty backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    /// Returns `true` if nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }
}

#[async_trait]
impl KvBackend for MemoryBackend {
    async fn get(&self, key: &str) -> Result<Option<Record>, PortsError> {
        Ok(self.records.lock().get(key).cloned())
    }

    async fn put_if(
        &self,
        key: &str,
        expected: Option<u64>,
        record: Record,
    ) -> Result<(), PortsError> {
        let mut records = self.records.lock();
        check_expected(key, records.get(key), expected)?;
        records.insert(key.to_owned(), record);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, PortsError> {
        Ok(self.records.lock().remove(key).is_some())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, PortsError> {
        Ok(self
            .records
            .lock()
            .range(prefix.to_owned()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(key, _)| key.clone())
            .collect())
    }
}

/// Shared compare step of `put_if`.
pub(crate) fn check_expected(
    key: &str,
    current: Option<&Record>,
    expected: Option<u64>,
) -> Result<(), PortsError> {
    match (current, expected) {
        (None, None) => Ok(()),
        (Some(_), None) => Err(PortsError::already_exists("record", key)),
        (None, Some(_)) => Err(PortsError::not_found("record", key)),
        (Some(record), Some(version)) if record.version == version => Ok(()),
        (Some(record), Some(version)) => {
            Err(PortsError::conflict("record", key, version, record.version))
        }
    }
}
