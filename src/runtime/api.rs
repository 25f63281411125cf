//! API-facing request/response models and thin handlers.

use serde::{Deserialize, Serialize};

use crate::core::{
    Availability, CheckError, CheckExecution, CheckResult, CheckScope, Checker, CheckerOptions,
    CheckerRegistry, ExecutionStore, Identifier, OptionsDoc, ResultStore, Scheduler,
    SchedulerStats, SchedulerStatus,
};

/// Checker listing entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckerSummary {
    /// Registry key.
    pub name: String,
    /// Human label.
    pub display_name: String,
    /// Scopes the checker applies to.
    pub availability: Availability,
    /// Documented options.
    pub options: OptionsDoc,
    /// Whether results can be rendered as HTML.
    pub supports_html_report: bool,
}

impl CheckerSummary {
    fn of(checker: &dyn Checker) -> Self {
        Self {
            name: checker.name().to_string(),
            display_name: checker.display_name().to_string(),
            availability: checker.availability(),
            options: checker.options_doc(),
            supports_html_report: checker.supports_html_report(),
        }
    }
}

/// Every registered checker, ordered by name.
pub fn list_checkers(registry: &CheckerRegistry) -> Vec<CheckerSummary> {
    registry
        .list()
        .iter()
        .map(|c| CheckerSummary::of(c.as_ref()))
        .collect()
}

/// One checker.
///
/// # Errors
///
/// `UnknownChecker` if `name` is not registered.
pub fn get_checker(registry: &CheckerRegistry, name: &str) -> Result<CheckerSummary, CheckError> {
    registry.get(name).map(|c| CheckerSummary::of(c.as_ref()))
}

/// On-demand trigger payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerRequest {
    /// Checker to run.
    pub checker_name: String,
    /// Target scope.
    pub scope: CheckScope,
    /// Requesting user.
    #[serde(default)]
    pub user_id: Option<Identifier>,
    /// Run options.
    #[serde(default)]
    pub options: CheckerOptions,
}

/// On-demand trigger response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerResponse {
    /// Queued execution, or the in-flight one it coalesced with.
    pub execution_id: Identifier,
}

/// Trigger a run.
///
/// # Errors
///
/// See [`Scheduler::trigger_on_demand`].
pub async fn trigger(
    scheduler: &Scheduler,
    req: TriggerRequest,
) -> Result<TriggerResponse, CheckError> {
    let execution_id = scheduler
        .trigger_on_demand(&req.checker_name, req.scope, req.user_id, req.options)
        .await?;
    Ok(TriggerResponse { execution_id })
}

/// Execution with its result, once produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResponse {
    /// Execution record.
    pub execution: CheckExecution,
    /// Result, for executions that completed with a verdict.
    pub result: Option<CheckResult>,
}

/// Look up an execution and its result.
///
/// # Errors
///
/// `NotFound` for unknown ids; storage failures.
pub async fn execution_status(
    scheduler: &Scheduler,
    execution_id: &Identifier,
) -> Result<ExecutionResponse, CheckError> {
    let store = scheduler.store();
    let execution = store.get_execution(execution_id).await?;
    let result = if execution.state.is_terminal() {
        store
            .list_results(
                &execution.checker_name,
                &execution.scope,
                scheduler.config().results_per_tuple,
            )
            .await?
            .into_iter()
            .find(|r| &r.execution_id == execution_id)
    } else {
        None
    };
    Ok(ExecutionResponse { execution, result })
}

/// Upcoming scheduled run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpcomingRun {
    /// Schedule id.
    pub schedule_id: Identifier,
    /// Checker name.
    pub checker_name: String,
    /// Target scope.
    pub scope: CheckScope,
    /// Next due time (ms since epoch).
    pub next_run_ms: u128,
}

/// Scheduler status response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerStatusResponse {
    /// Runtime enable flag.
    pub enabled: bool,
    /// Whether the scheduler is started.
    pub running: bool,
    /// Worker pool size.
    pub workers: usize,
    /// Executions waiting in the queue.
    pub queue_depth: usize,
    /// Next scheduled runs.
    pub next_runs: Vec<UpcomingRun>,
    /// Counters.
    pub stats: SchedulerStats,
}

impl From<SchedulerStatus> for SchedulerStatusResponse {
    fn from(status: SchedulerStatus) -> Self {
        Self {
            enabled: status.enabled,
            running: status.running,
            workers: status.workers,
            queue_depth: status.queue_depth,
            next_runs: status
                .next_schedules
                .into_iter()
                .map(|s| UpcomingRun {
                    schedule_id: s.id,
                    checker_name: s.checker_name,
                    scope: s.scope,
                    next_run_ms: s.next_run_ms,
                })
                .collect(),
            stats: status.stats,
        }
    }
}

/// Scheduler status.
///
/// # Errors
///
/// Storage failures.
pub async fn scheduler_status(scheduler: &Scheduler) -> Result<SchedulerStatusResponse, CheckError> {
    scheduler.status().await.map(Into::into)
}

/// Health response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Health {
    /// Healthy flag.
    pub ok: bool,
    /// Whether the scheduler is started.
    pub running: bool,
    /// Runtime enable flag.
    pub enabled: bool,
}

/// Liveness probe: healthy while the scheduler is started.
pub fn health(scheduler: &Scheduler) -> Health {
    let running = scheduler.is_running();
    Health {
        ok: running,
        running,
        enabled: scheduler.is_enabled(),
    }
}
