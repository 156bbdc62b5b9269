//! Cluster object port used by resource bootstrap phases.

use async_trait::async_trait;
use gantry_core::ResourceKind;
use serde::{Deserialize, Serialize};

use crate::error::PortsError;

/// A declarative cluster object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceObject {
    /// Object kind, e.g. `ClusterRole`.
    pub kind: ResourceKind,
    /// Object name.
    pub name: String,
    /// Namespace for namespaced kinds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    /// Full object body as understood by the cluster API.
    #[serde(default)]
    pub body: serde_json::Value,
}

impl ResourceObject {
    /// `namespace/name`, or just `name` for cluster-scoped objects.
    #[must_use]
    pub fn qualified_name(&self) -> String {
        match &self.namespace {
            Some(ns) => format!("{ns}/{}", self.name),
            None => self.name.clone(),
        }
    }
}

/// Create, update and delete of cluster objects.
#[async_trait]
pub trait ResourceClient: Send + Sync {
    /// Create the object. Fails with `AlreadyExists` if present.
    async fn create(&self, object: &ResourceObject) -> Result<(), PortsError>;

    /// Replace an existing object. Fails with `NotFound` if absent.
    async fn update(&self, object: &ResourceObject) -> Result<(), PortsError>;

    /// Delete the object. Fails with `NotFound` if absent.
    async fn delete(&self, object: &ResourceObject) -> Result<(), PortsError>;
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn qualified_name() {
        let mut object = ResourceObject {
            kind: ResourceKind::new("Role").unwrap(),
            name: "reader".into(),
            namespace: None,
            body: serde_json::Value::Null,
        };
        assert_eq!(object.qualified_name(), "reader");
        object.namespace = Some("kube-system".into());
        assert_eq!(object.qualified_name(), "kube-system/reader");
    }
}
