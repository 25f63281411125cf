//! Recurring check schedules.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::{CheckError, CheckScope, CheckerOptions, Identifier};

/// Shortest interval a schedule may use.
pub const MIN_INTERVAL: Duration = Duration::from_secs(60);

/// A recurring run of one checker against one target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckerSchedule {
    /// Schedule id.
    pub id: Identifier,
    /// Owning user.
    pub owner_id: Identifier,
    /// Checker to run.
    pub checker_name: String,
    /// Target scope.
    pub scope: CheckScope,
    /// Period between runs, in seconds.
    pub interval_secs: u64,
    /// Disabled schedules never fire.
    pub enabled: bool,
    /// Next time the schedule is due.
    pub next_run_ms: u128,
    /// Last time the schedule fired.
    pub last_run_ms: Option<u128>,
    /// Per-schedule options, applied at the runtime layer.
    pub options: Option<CheckerOptions>,
}

impl CheckerSchedule {
    /// Enabled schedule due at `next_run_ms`.
    pub fn new(
        owner_id: Identifier,
        checker_name: impl Into<String>,
        scope: CheckScope,
        interval: Duration,
        next_run_ms: u128,
    ) -> Self {
        Self {
            id: Identifier::new(),
            owner_id,
            checker_name: checker_name.into(),
            scope,
            interval_secs: interval.as_secs(),
            enabled: true,
            next_run_ms,
            last_run_ms: None,
            options: None,
        }
    }

    /// Interval as a duration.
    pub const fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    /// Interval in milliseconds.
    pub fn interval_ms(&self) -> u128 {
        self.interval().as_millis()
    }

    /// Whether the schedule should fire at `now_ms`.
    pub const fn is_due(&self, now_ms: u128) -> bool {
        self.enabled && self.next_run_ms <= now_ms
    }

    /// Uniqueness key: at most one schedule per owner, checker and scope.
    pub fn unique_key(&self) -> (Identifier, &str, CheckScope) {
        (self.owner_id, self.checker_name.as_str(), self.scope)
    }

    /// Check field invariants.
    pub fn validate(&self) -> Result<(), CheckError> {
        if self.interval() < MIN_INTERVAL {
            return Err(CheckError::Validation(format!(
                "interval must be at least {}s, got {}s",
                MIN_INTERVAL.as_secs(),
                self.interval_secs
            )));
        }
        if self.checker_name.is_empty() {
            return Err(CheckError::Validation("checker name must not be empty".into()));
        }
        Ok(())
    }
}
