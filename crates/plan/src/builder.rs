//! Fluent construction of validated plans.

use gantry_core::OperationId;

use crate::error::PlanError;
use crate::phase::{Phase, PhaseSpec};
use crate::plan::{OperationKind, Plan};
use crate::validate::validate_specs;

/// Builder for [`Plan`].
///
/// # Examples
///
/// ```
/// use gantry_core::OperationId;
/// use gantry_plan::{OperationKind, PhaseSpec, PlanBuilder, State};
///
/// let plan = PlanBuilder::new(OperationId::v4())
///     .kind(OperationKind::Install)
///     .phase(PhaseSpec::new("/init".parse().unwrap(), "noop".parse().unwrap()))
///     .phase(
///         PhaseSpec::new("/masters/node1".parse().unwrap(), "noop".parse().unwrap())
///             .depends_on("/init".parse().unwrap())
///             .exclusive_on("node1"),
///     )
///     .build()
///     .unwrap();
///
/// assert_eq!(plan.phases.len(), 2);
/// assert_eq!(plan.state, State::Unstarted);
/// ```
#[derive(Debug, Clone)]
pub struct PlanBuilder {
    operation_id: OperationId,
    kind: OperationKind,
    phases: Vec<PhaseSpec>,
}

impl PlanBuilder {
    /// Start a plan for `operation_id`.
    #[must_use]
    pub fn new(operation_id: OperationId) -> Self {
        Self {
            operation_id,
            kind: OperationKind::default(),
            phases: Vec::new(),
        }
    }

    /// Set the operation kind.
    #[must_use]
    pub fn kind(mut self, kind: OperationKind) -> Self {
        self.kind = kind;
        self
    }

    /// Append a phase.
    #[must_use]
    pub fn phase(mut self, spec: PhaseSpec) -> Self {
        self.phases.push(spec);
        self
    }

    /// Append several phases.
    #[must_use]
    pub fn phases(mut self, specs: impl IntoIterator<Item = PhaseSpec>) -> Self {
        self.phases.extend(specs);
        self
    }

    /// Validate and build. Returns the first validation error.
    pub fn build(mut self) -> Result<Plan, PlanError> {
        for spec in &mut self.phases {
            spec.normalize();
        }
        if let Some(err) = validate_specs(&self.phases).into_iter().next() {
            return Err(err);
        }
        let phases = self.phases.into_iter().map(Phase::new).collect();
        Ok(Plan::new(self.operation_id, self.kind, phases))
    }
}

/// Build a plan from phase declarations.
pub fn build_plan(
    operation_id: OperationId,
    specs: impl IntoIterator<Item = PhaseSpec>,
) -> Result<Plan, PlanError> {
    PlanBuilder::new(operation_id).phases(specs).build()
}
