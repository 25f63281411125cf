//! Error types for the check subsystem.

use thiserror::Error;

/// Boxed cause carried by storage errors.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors produced by the registry, resolver, stores and scheduler.
#[derive(Debug, Error)]
pub enum CheckError {
    /// Entity id does not exist.
    #[error("not found: {0}")]
    NotFound(String),
    /// Ownership check failed.
    #[error("forbidden: {0}")]
    Forbidden(String),
    /// Malformed input.
    #[error("validation failed: {0}")]
    Validation(String),
    /// Attempt to mutate an execution that already reached a terminal state.
    #[error("illegal transition: {0}")]
    IllegalTransition(String),
    /// Trigger denied because the scheduler is disabled at runtime.
    #[error("scheduler disabled")]
    SchedulerDisabled,
    /// Scheduler has not been started or is shutting down.
    #[error("scheduler not running")]
    NotRunning,
    /// Checker name not present in the registry.
    #[error("unknown checker: {0}")]
    UnknownChecker(String),
    /// On-demand trigger could not be enqueued in time.
    #[error("queue timeout")]
    QueueTimeout,
    /// Plugin exceeded its wall-clock deadline.
    #[error("plugin timeout: {0}")]
    PluginTimeout(String),
    /// Plugin reported a failure.
    #[error("plugin error: {0}")]
    PluginError(String),
    /// Failure from the data tier.
    #[error("storage error: {0}")]
    Storage(#[source] BoxError),
    /// Worker threads or their runtimes could not be created.
    #[error("runtime error: {0}")]
    Runtime(String),
    /// One or more components failed to stop cleanly.
    #[error("shutdown failed: {}", .0.join("; "))]
    Shutdown(Vec<String>),
}

impl CheckError {
    /// Wrap a data-tier failure.
    pub fn storage(cause: impl Into<BoxError>) -> Self {
        Self::Storage(cause.into())
    }

    /// True for errors that mean the entity does not exist.
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// Application-facing result using anyhow for higher-level contexts.
pub type AppResult<T> = Result<T, anyhow::Error>;
