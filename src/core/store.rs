//! Storage contract for option layers, schedules, executions and results.
//!
//! Logical collections: `checker_options`, `checker_schedules`,
//! `check_executions` and `check_results`. Backends must provide the
//! atomicity noted on individual methods.

use std::time::Duration;

use async_trait::async_trait;

use super::{
    CheckError, CheckExecution, CheckResult, CheckScope, CheckerOptions, CheckerSchedule,
    Identifier, OptionLayer,
};

/// Outcome of inserting a pending execution with coalescing.
#[derive(Debug, Clone, PartialEq)]
pub enum Admission {
    /// The execution was inserted.
    Created(CheckExecution),
    /// The execution was inserted after the expired in-flight executions of
    /// the same `(checker, scope)` were failed as `abandoned`.
    Replaced {
        /// The inserted execution.
        created: CheckExecution,
        /// Executions swept to make room.
        abandoned: Vec<CheckExecution>,
    },
    /// A non-terminal execution for the same `(checker, scope)` already exists.
    Joined(CheckExecution),
}

impl Admission {
    /// The execution callers should track.
    pub const fn execution(&self) -> &CheckExecution {
        match self {
            Self::Created(e) | Self::Replaced { created: e, .. } | Self::Joined(e) => e,
        }
    }

    /// Whether a new execution was inserted.
    pub const fn is_created(&self) -> bool {
        !matches!(self, Self::Joined(_))
    }
}

/// Stored option layers, keyed by `(checker, scope)`.
#[async_trait]
pub trait OptionStore: Send + Sync {
    /// Layer for exactly this scope.
    async fn get_layer(
        &self,
        checker_name: &str,
        scope: &CheckScope,
    ) -> Result<Option<OptionLayer>, CheckError>;

    /// Replace the layer wholesale.
    async fn put_layer(&self, layer: OptionLayer) -> Result<(), CheckError>;

    /// Merge `options` key by key into the stored layer, creating it if needed.
    /// Returns the merged layer.
    async fn merge_layer(
        &self,
        checker_name: &str,
        scope: &CheckScope,
        owner_id: Option<Identifier>,
        options: CheckerOptions,
    ) -> Result<OptionLayer, CheckError>;

    /// Remove a layer; returns whether one existed.
    async fn delete_layer(&self, checker_name: &str, scope: &CheckScope) -> Result<bool, CheckError>;

    /// Every layer stored for a checker.
    async fn list_layers(&self, checker_name: &str) -> Result<Vec<OptionLayer>, CheckError>;

    /// Remove every layer owned by a user.
    async fn delete_layers_by_owner(&self, owner_id: &Identifier) -> Result<usize, CheckError>;

    /// Remove every layer scoped to a domain or one of its services.
    async fn delete_layers_for_domain(&self, domain_id: &Identifier) -> Result<usize, CheckError>;
}

/// Persisted schedules.
#[async_trait]
pub trait ScheduleStore: Send + Sync {
    /// Insert a schedule.
    ///
    /// # Errors
    ///
    /// `Validation` for bad fields or when a schedule already exists for the
    /// same owner, checker and scope.
    async fn create_schedule(&self, schedule: CheckerSchedule) -> Result<(), CheckError>;

    /// Fetch a schedule.
    async fn get_schedule(&self, id: &Identifier) -> Result<CheckerSchedule, CheckError>;

    /// Replace a schedule.
    async fn update_schedule(&self, schedule: CheckerSchedule) -> Result<(), CheckError>;

    /// Delete a schedule.
    async fn delete_schedule(&self, id: &Identifier) -> Result<(), CheckError>;

    /// Schedules owned by a user.
    async fn list_by_owner(&self, owner_id: &Identifier) -> Result<Vec<CheckerSchedule>, CheckError>;

    /// Schedules attached to a scope.
    async fn list_by_target(&self, scope: &CheckScope) -> Result<Vec<CheckerSchedule>, CheckError>;

    /// Enabled schedules with `next_run <= now`, ascending by next run then id.
    async fn list_due(&self, now_ms: u128) -> Result<Vec<CheckerSchedule>, CheckError>;

    /// Enabled schedules, ascending by next run then id.
    async fn list_enabled(&self) -> Result<Vec<CheckerSchedule>, CheckError>;

    /// Remove every schedule owned by a user.
    async fn delete_schedules_by_owner(&self, owner_id: &Identifier) -> Result<usize, CheckError>;

    /// Remove every schedule scoped to a domain or one of its services.
    async fn delete_schedules_for_domain(&self, domain_id: &Identifier)
        -> Result<usize, CheckError>;

    /// Check that `user_id` owns the schedule before a mutation.
    ///
    /// # Errors
    ///
    /// `NotFound` for unknown schedules, `Forbidden` for foreign ones.
    async fn validate_ownership(
        &self,
        schedule_id: &Identifier,
        user_id: &Identifier,
    ) -> Result<CheckerSchedule, CheckError> {
        let schedule = self.get_schedule(schedule_id).await?;
        if &schedule.owner_id != user_id {
            return Err(CheckError::Forbidden(format!(
                "schedule {schedule_id} is not owned by user {user_id}"
            )));
        }
        Ok(schedule)
    }
}

/// Execution records.
#[async_trait]
pub trait ExecutionStore: Send + Sync {
    /// Insert an execution.
    ///
    /// # Errors
    ///
    /// `Validation` if the id is already taken.
    async fn create_execution(&self, execution: CheckExecution) -> Result<(), CheckError>;

    /// Insert a pending execution unless a non-terminal one exists for the same
    /// `(checker, scope)`; the lookup and the insert are atomic.
    ///
    /// An in-flight execution older than `ttl` (measured against the new
    /// execution's `started_at_ms`) is never joined: it is moved to `failed`
    /// with reason `abandoned` in the same atomic step.
    async fn admit_execution(
        &self,
        execution: CheckExecution,
        ttl: Duration,
    ) -> Result<Admission, CheckError>;

    /// Replace an execution.
    ///
    /// # Errors
    ///
    /// `IllegalTransition` if the stored execution is terminal.
    async fn update_execution(&self, execution: CheckExecution) -> Result<(), CheckError>;

    /// Move an execution to a terminal state and append its result (if any) in
    /// one atomic step.
    ///
    /// # Errors
    ///
    /// `IllegalTransition` if the stored execution is already terminal or the
    /// new state is not terminal.
    async fn finish_execution(
        &self,
        execution: CheckExecution,
        result: Option<CheckResult>,
    ) -> Result<(), CheckError>;

    /// Fetch an execution.
    async fn get_execution(&self, id: &Identifier) -> Result<CheckExecution, CheckError>;

    /// Executions in `pending` or `running`.
    async fn list_inflight(&self) -> Result<Vec<CheckExecution>, CheckError>;

    /// Executions for a `(checker, scope)` tuple, most recent first.
    async fn list_executions(
        &self,
        checker_name: &str,
        scope: &CheckScope,
        limit: usize,
    ) -> Result<Vec<CheckExecution>, CheckError>;
}

/// Result history.
#[async_trait]
pub trait ResultStore: Send + Sync {
    /// Change the per-tuple cap. Tuples above a lowered cap shrink on their
    /// next append.
    fn set_results_per_tuple(&self, cap: usize);

    /// Append a result whose execution is already terminal, evicting the
    /// oldest result of the tuple once the per-tuple cap is exceeded.
    async fn append_result(&self, result: CheckResult) -> Result<(), CheckError>;

    /// Results for a tuple, most recent first, at most `limit`.
    async fn list_results(
        &self,
        checker_name: &str,
        scope: &CheckScope,
        limit: usize,
    ) -> Result<Vec<CheckResult>, CheckError>;

    /// Fetch a result.
    async fn get_result(&self, id: &Identifier) -> Result<CheckResult, CheckError>;

    /// Delete a result.
    async fn delete_result(&self, id: &Identifier) -> Result<(), CheckError>;

    /// Delete every result of a tuple; returns how many were removed.
    async fn delete_all_results(
        &self,
        checker_name: &str,
        scope: &CheckScope,
    ) -> Result<usize, CheckError>;

    /// Delete every result scoped to a domain or one of its services.
    async fn delete_results_for_domain(&self, domain_id: &Identifier) -> Result<usize, CheckError>;
}

/// A backend implementing the whole storage contract.
pub trait CheckStore: OptionStore + ScheduleStore + ExecutionStore + ResultStore {}

impl<T> CheckStore for T where T: OptionStore + ScheduleStore + ExecutionStore + ResultStore {}
