//! Check executions and their results.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::{CheckScope, CheckerOptions, Identifier};

/// Lifecycle state of an execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionState {
    /// Created, waiting in the dispatch queue.
    Pending,
    /// Picked up by a worker.
    Running,
    /// Plugin returned a pass or warn verdict.
    Succeeded,
    /// Plugin returned fail/error, errored, timed out, or the run was abandoned.
    Failed,
    /// Never ran.
    Cancelled,
}

impl ExecutionState {
    /// Terminal states are immutable.
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Cancelled)
    }
}

impl fmt::Display for ExecutionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// What caused an execution to be created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "by", content = "id", rename_all = "snake_case")]
pub enum TriggeredBy {
    /// A due schedule fired.
    Schedule(Identifier),
    /// A user asked for an on-demand run.
    User(Identifier),
    /// Triggered without a user (admin tooling, tests).
    System,
}

impl fmt::Display for TriggeredBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Schedule(id) => write!(f, "schedule:{id}"),
            Self::User(id) => write!(f, "user:{id}"),
            Self::System => f.write_str("system"),
        }
    }
}

/// One attempt to run a checker against a scope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckExecution {
    /// Execution id.
    pub id: Identifier,
    /// Checker to run.
    pub checker_name: String,
    /// Target scope.
    pub scope: CheckScope,
    /// User the run is performed for; drives the user option layer and auto-fill.
    pub owner_id: Option<Identifier>,
    /// Origin of the run.
    pub triggered_by: TriggeredBy,
    /// Current state.
    pub state: ExecutionState,
    /// Creation time.
    pub started_at_ms: u128,
    /// Time the execution reached a terminal state.
    pub finished_at_ms: Option<u128>,
    /// Failure reason.
    pub error_message: Option<String>,
    /// Options supplied by the trigger (or the schedule).
    #[serde(default)]
    pub runtime_options: CheckerOptions,
}

impl CheckExecution {
    /// New pending execution.
    pub fn pending(
        checker_name: impl Into<String>,
        scope: CheckScope,
        owner_id: Option<Identifier>,
        triggered_by: TriggeredBy,
        runtime_options: CheckerOptions,
        now_ms: u128,
    ) -> Self {
        Self {
            id: Identifier::new(),
            checker_name: checker_name.into(),
            scope,
            owner_id,
            triggered_by,
            state: ExecutionState::Pending,
            started_at_ms: now_ms,
            finished_at_ms: None,
            error_message: None,
            runtime_options,
        }
    }

    /// Copy of this execution moved to `running`.
    #[must_use]
    pub fn running(&self) -> Self {
        Self {
            state: ExecutionState::Running,
            ..self.clone()
        }
    }

    /// Copy of this execution moved to a terminal state.
    #[must_use]
    pub fn finished(
        &self,
        state: ExecutionState,
        error_message: Option<String>,
        now_ms: u128,
    ) -> Self {
        debug_assert!(state.is_terminal());
        Self {
            state,
            finished_at_ms: Some(now_ms),
            error_message,
            ..self.clone()
        }
    }

    /// Whether this execution targets the same `(checker, scope)` tuple.
    pub fn same_target(&self, checker_name: &str, scope: &CheckScope) -> bool {
        self.checker_name == checker_name && &self.scope == scope
    }
}

/// Outcome classification reported by a checker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    /// Everything looks right.
    Pass,
    /// Works, with remarks.
    Warn,
    /// The check found a problem.
    Fail,
    /// The check could not reach a conclusion.
    Error,
}

impl Verdict {
    /// Terminal execution state implied by this verdict.
    pub const fn execution_state(self) -> ExecutionState {
        match self {
            Self::Pass | Self::Warn => ExecutionState::Succeeded,
            Self::Fail | Self::Error => ExecutionState::Failed,
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pass => "pass",
            Self::Warn => "warn",
            Self::Fail => "fail",
            Self::Error => "error",
        };
        f.write_str(s)
    }
}

/// Persisted outcome of an execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckResult {
    /// Result id.
    pub id: Identifier,
    /// Execution that produced this result.
    pub execution_id: Identifier,
    /// Checker name.
    pub checker_name: String,
    /// Target scope.
    pub scope: CheckScope,
    /// Verdict.
    pub verdict: Verdict,
    /// Checker-specific report.
    pub report: serde_json::Value,
    /// Time the result was produced.
    pub generated_at_ms: u128,
}

impl CheckResult {
    /// Result for `execution`.
    pub fn for_execution(
        execution: &CheckExecution,
        verdict: Verdict,
        report: serde_json::Value,
        now_ms: u128,
    ) -> Self {
        Self {
            id: Identifier::new(),
            execution_id: execution.id,
            checker_name: execution.checker_name.clone(),
            scope: execution.scope,
            verdict,
            report,
            generated_at_ms: now_ms,
        }
    }
}
