//! Plan shape validation.
//!
//! Pure and side-effect free. Runs before a plan is persisted and again
//! before every resume.

use std::collections::HashSet;

use crate::error::PlanError;
use crate::graph::PhaseGraph;
use crate::phase::PhaseSpec;
use crate::plan::Plan;

/// Validate a plan, returning the first problem found.
///
/// Checks run in order: duplicate ids, dangling references, cycles.
pub fn validate(plan: &Plan) -> Result<(), PlanError> {
    match collect_errors(plan.phases.iter().map(|p| &p.spec)).into_iter().next() {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

/// Validate phase declarations, collecting every problem so they can all be
/// reported at once.
///
/// Cycle detection only runs when ids and references are sound, and reports a
/// single cycle.
#[must_use]
pub fn validate_specs(specs: &[PhaseSpec]) -> Vec<PlanError> {
    collect_errors(specs.iter())
}

fn collect_errors<'a>(specs: impl Iterator<Item = &'a PhaseSpec> + Clone) -> Vec<PlanError> {
    let mut errors = Vec::new();

    let mut seen = HashSet::new();
    let mut reported = HashSet::new();
    for spec in specs.clone() {
        if !seen.insert(&spec.id) && reported.insert(&spec.id) {
            errors.push(PlanError::DuplicatePhase(spec.id.clone()));
        }
    }

    for spec in specs.clone() {
        for dependency in &spec.dependencies {
            if !seen.contains(dependency) {
                errors.push(PlanError::InvalidReference {
                    phase: spec.id.clone(),
                    dependency: dependency.clone(),
                });
            }
        }
    }

    if !errors.is_empty() {
        return errors;
    }

    match PhaseGraph::new(specs.map(|s| (&s.id, s.dependencies.as_slice()))) {
        Ok(graph) => {
            if let Some(cycle) = graph.find_cycle() {
                errors.push(PlanError::CyclicDependency { cycle });
            }
        }
        Err(err) => errors.push(err),
    }

    errors
}
