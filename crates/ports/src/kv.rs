//! Key-value backend port: get / put-if / delete / list on opaque records.

use async_trait::async_trait;

use crate::error::PortsError;

/// A stored value with its version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// Version chosen by the writer; compared by [`KvBackend::put_if`].
    pub version: u64,
    /// Opaque encoded payload.
    pub value: Vec<u8>,
}

impl Record {
    /// Create a record.
    #[must_use]
    pub fn new(version: u64, value: Vec<u8>) -> Self {
        Self { version, value }
    }
}

/// A distributed key-value store as the persistence layer needs it.
#[async_trait]
pub trait KvBackend: Send + Sync {
    /// Fetch the record under `key`.
    async fn get(&self, key: &str) -> Result<Option<Record>, PortsError>;

    /// Atomically write `record` if the current version matches `expected`
    /// (`None` means the key must be absent).
    ///
    /// Fails with `Conflict` on a version mismatch, `AlreadyExists` when
    /// `expected` is `None` and the key exists, `NotFound` when `expected` is
    /// `Some` and the key is absent.
    async fn put_if(
        &self,
        key: &str,
        expected: Option<u64>,
        record: Record,
    ) -> Result<(), PortsError>;

    /// Remove `key`. Returns `false` if it did not exist.
    async fn delete(&self, key: &str) -> Result<bool, PortsError>;

    /// Keys starting with `prefix`, sorted.
    async fn list(&self, prefix: &str) -> Result<Vec<String>, PortsError>;
}
