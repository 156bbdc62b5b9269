//! Plan files: a YAML or JSON document declaring one operation.

use std::path::Path;

use anyhow::Context;
use gantry_core::OperationId;
use gantry_plan::{OperationKind, PhaseSpec, Plan, PlanBuilder};
use serde::Deserialize;

/// On-disk form of a plan.
///
/// ```yaml
/// kind: install
/// phases:
///   - id: /init
///     action: noop
///   - id: /masters/node-1
///     action: command
///     dependencies: [/init]
///     exclusivity_key: node-1
///     data:
///       execute: [systemctl, start, planet]
///       rollback: [systemctl, stop, planet]
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PlanFile {
    /// Fixed operation id; a fresh one is generated when absent.
    #[serde(default)]
    pub operation_id: Option<OperationId>,
    /// Procedure kind.
    #[serde(default)]
    pub kind: OperationKind,
    /// Phase declarations in plan order.
    #[serde(default)]
    pub phases: Vec<PhaseSpec>,
}

impl PlanFile {
    /// Read a plan file. `.json` files are parsed as JSON, anything else as YAML.
    pub fn read(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading plan file {}", path.display()))?;
        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        let parsed = if is_json {
            serde_json::from_str(&raw).map_err(anyhow::Error::from)
        } else {
            serde_yaml::from_str(&raw).map_err(anyhow::Error::from)
        };
        parsed.with_context(|| format!("parsing plan file {}", path.display()))
    }

    /// Validate and turn the declarations into a fresh plan.
    pub fn into_plan(self) -> anyhow::Result<Plan> {
        let operation_id = self.operation_id.unwrap_or_else(OperationId::v4);
        PlanBuilder::new(operation_id)
            .kind(self.kind)
            .phases(self.phases)
            .build()
            .context("invalid plan")
    }
}
