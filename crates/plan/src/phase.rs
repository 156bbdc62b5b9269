//! Phase declarations and their live execution state.

use chrono::{DateTime, Utc};
use gantry_core::{ActionKind, PhaseId};
use serde::{Deserialize, Serialize};

use crate::retry::RetryConfig;
use crate::state::State;

/// Declaration of one unit of work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseSpec {
    /// Unique id within the plan.
    pub id: PhaseId,
    /// Free text for reporting.
    #[serde(default)]
    pub description: String,
    /// Phases that must be `Completed` before this one becomes eligible.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<PhaseId>,
    /// Selects the handler in the executor registry.
    pub action: ActionKind,
    /// Opaque, action-specific payload.
    #[serde(default)]
    pub data: serde_json::Value,
    /// Phases sharing a key never run concurrently (typically a node name).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exclusivity_key: Option<String>,
    /// Per-phase override of the engine retry policy.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry: Option<RetryConfig>,
}

impl PhaseSpec {
    /// Declare a phase with no dependencies and a null payload.
    #[must_use]
    pub fn new(id: PhaseId, action: ActionKind) -> Self {
        Self {
            id,
            description: String::new(),
            dependencies: Vec::new(),
            action,
            data: serde_json::Value::Null,
            exclusivity_key: None,
            retry: None,
        }
    }

    /// Set the description.
    #[must_use]
    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Add a dependency.
    #[must_use]
    pub fn depends_on(mut self, dependency: PhaseId) -> Self {
        self.dependencies.push(dependency);
        self
    }

    /// Set the payload.
    #[must_use]
    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = data;
        self
    }

    /// Serialize phases on `key` with every other phase using it.
    #[must_use]
    pub fn exclusive_on(mut self, key: impl Into<String>) -> Self {
        self.exclusivity_key = Some(key.into());
        self
    }

    /// Override the retry policy for this phase.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = Some(retry);
        self
    }

    /// Drop duplicate dependencies and blank exclusivity keys.
    pub(crate) fn normalize(&mut self) {
        let mut seen = std::collections::HashSet::new();
        self.dependencies.retain(|dep| seen.insert(dep.clone()));
        if self
            .exclusivity_key
            .as_deref()
            .is_some_and(|key| key.trim().is_empty())
        {
            self.exclusivity_key = None;
        }
    }
}

/// Which handler operation an attempt invoked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptKind {
    /// Forward `execute` call.
    Execute,
    /// Compensating `rollback` call.
    Rollback,
}

/// One handler invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseAttempt {
    /// 1-based attempt number within its kind.
    pub number: u32,
    /// Execute or rollback.
    pub kind: AttemptKind,
    /// When the handler was called.
    pub started_at: DateTime<Utc>,
    /// When the handler returned; `None` if the process died mid-call.
    #[serde(default)]
    pub finished_at: Option<DateTime<Utc>>,
    /// Error returned by the handler, if any.
    #[serde(default)]
    pub error: Option<String>,
}

impl PhaseAttempt {
    /// Returns `true` if the attempt never finished.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.finished_at.is_none()
    }

    /// Returns `true` if the attempt finished with an error.
    #[must_use]
    pub fn is_failure(&self) -> bool {
        self.finished_at.is_some() && self.error.is_some()
    }
}

/// A phase declaration together with its live state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Phase {
    /// The declaration.
    #[serde(flatten)]
    pub spec: PhaseSpec,
    /// Current lifecycle state.
    #[serde(default)]
    pub state: State,
    /// Every execute and rollback call, in order.
    #[serde(default)]
    pub attempts: Vec<PhaseAttempt>,
    /// Most recent execute error.
    #[serde(default)]
    pub last_error: Option<String>,
    /// Most recent rollback error.
    #[serde(default)]
    pub rollback_error: Option<String>,
    /// When the phase first entered `InProgress`.
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    /// When the phase last settled.
    #[serde(default)]
    pub finished_at: Option<DateTime<Utc>>,
}

impl Phase {
    /// Wrap a declaration as an `Unstarted` phase.
    #[must_use]
    pub fn new(spec: PhaseSpec) -> Self {
        Self {
            spec,
            state: State::Unstarted,
            attempts: Vec::new(),
            last_error: None,
            rollback_error: None,
            started_at: None,
            finished_at: None,
        }
    }

    /// Phase id.
    #[must_use]
    pub fn id(&self) -> &PhaseId {
        &self.spec.id
    }

    /// Action kind.
    #[must_use]
    pub fn action(&self) -> &ActionKind {
        &self.spec.action
    }

    /// Declared dependencies.
    #[must_use]
    pub fn dependencies(&self) -> &[PhaseId] {
        &self.spec.dependencies
    }

    /// Exclusivity key, if any.
    #[must_use]
    pub fn exclusivity_key(&self) -> Option<&str> {
        self.spec.exclusivity_key.as_deref()
    }

    /// Payload handed to the handler.
    #[must_use]
    pub fn data(&self) -> &serde_json::Value {
        &self.spec.data
    }

    /// Number of calls of the given kind.
    #[must_use]
    pub fn attempt_count(&self, kind: AttemptKind) -> u32 {
        self.attempts.iter().filter(|a| a.kind == kind).count() as u32
    }

    /// Number of failed calls of the given kind. Interrupted calls do not count.
    #[must_use]
    pub fn failure_count(&self, kind: AttemptKind) -> u32 {
        self.attempts
            .iter()
            .filter(|a| a.kind == kind && a.is_failure())
            .count() as u32
    }

    /// Record the start of a handler call and return its number.
    pub fn begin_attempt(&mut self, kind: AttemptKind) -> u32 {
        let number = self.attempt_count(kind) + 1;
        self.attempts.push(PhaseAttempt {
            number,
            kind,
            started_at: Utc::now(),
            finished_at: None,
            error: None,
        });
        number
    }

    /// Record the outcome of the latest open call of `kind`.
    pub fn finish_attempt(&mut self, kind: AttemptKind, error: Option<String>) {
        if let Some(attempt) = self
            .attempts
            .iter_mut()
            .rev()
            .find(|a| a.kind == kind && a.is_open())
        {
            attempt.finished_at = Some(Utc::now());
            attempt.error.clone_from(&error);
        }
        if let Some(message) = error {
            match kind {
                AttemptKind::Execute => self.last_error = Some(message),
                AttemptKind::Rollback => self.rollback_error = Some(message),
            }
        }
    }

    /// Close calls left open by a previous process.
    pub fn close_interrupted_attempts(&mut self) -> usize {
        let now = Utc::now();
        let mut closed = 0;
        for attempt in self.attempts.iter_mut().filter(|a| a.is_open()) {
            attempt.finished_at = Some(now);
            closed += 1;
        }
        closed
    }
}
