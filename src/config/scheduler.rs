//! Scheduler and resolver configuration structures.

use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::core::AppResult;

/// Prefix of the environment variables read by [`SchedulerConfig::from_env`].
pub const ENV_PREFIX: &str = "HAPPYDOMAIN_CHECK_";

/// Option resolver configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolverConfig {
    /// Reject option ids the checker does not document for the target level.
    #[serde(default)]
    pub strict_options: bool,
}

/// Scheduler configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Worker pool size.
    pub workers: usize,
    /// Dispatch queue capacity.
    pub queue_capacity: usize,
    /// Period between due-schedule scans, in milliseconds.
    pub tick_interval_ms: u64,
    /// Plugin wall-clock deadline, in milliseconds.
    pub per_run_timeout_ms: u64,
    /// Grace before abandoning an uncooperative plugin, in milliseconds.
    pub cancel_grace_ms: u64,
    /// Max blocking time for on-demand enqueue, in milliseconds.
    pub trigger_enqueue_timeout_ms: u64,
    /// Age at which stuck executions are swept at startup, in milliseconds.
    pub execution_ttl_ms: u64,
    /// Max kept results per `(checker, scope, target)`.
    pub results_per_tuple: usize,
    /// Max wait during shutdown, in milliseconds.
    pub drain_timeout_ms: u64,
    /// Initial runtime state.
    pub scheduler_enabled: bool,
    /// Number of upcoming schedules reported by `status()`.
    pub status_upcoming: usize,
    /// Seed for jitter rescheduling; random when absent.
    pub jitter_seed: Option<u64>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            workers: num_cpus::get().max(4),
            queue_capacity: 1024,
            tick_interval_ms: 15_000,
            per_run_timeout_ms: 60_000,
            cancel_grace_ms: 5_000,
            trigger_enqueue_timeout_ms: 5_000,
            execution_ttl_ms: 3_600_000,
            results_per_tuple: 50,
            drain_timeout_ms: 30_000,
            scheduler_enabled: true,
            status_upcoming: 10,
            jitter_seed: None,
        }
    }
}

impl SchedulerConfig {
    /// Configuration with every default.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the worker pool size.
    #[must_use]
    pub const fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Set the dispatch queue capacity.
    #[must_use]
    pub const fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    /// Set the tick interval.
    #[must_use]
    pub fn with_tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval_ms = duration_ms(interval);
        self
    }

    /// Set the plugin deadline.
    #[must_use]
    pub fn with_per_run_timeout(mut self, timeout: Duration) -> Self {
        self.per_run_timeout_ms = duration_ms(timeout);
        self
    }

    /// Set the cancel grace period.
    #[must_use]
    pub fn with_cancel_grace(mut self, grace: Duration) -> Self {
        self.cancel_grace_ms = duration_ms(grace);
        self
    }

    /// Set the on-demand enqueue timeout.
    #[must_use]
    pub fn with_trigger_enqueue_timeout(mut self, timeout: Duration) -> Self {
        self.trigger_enqueue_timeout_ms = duration_ms(timeout);
        self
    }

    /// Set the execution TTL.
    #[must_use]
    pub fn with_execution_ttl(mut self, ttl: Duration) -> Self {
        self.execution_ttl_ms = duration_ms(ttl);
        self
    }

    /// Set the per-tuple result cap.
    #[must_use]
    pub const fn with_results_per_tuple(mut self, cap: usize) -> Self {
        self.results_per_tuple = cap;
        self
    }

    /// Set the shutdown drain timeout.
    #[must_use]
    pub fn with_drain_timeout(mut self, timeout: Duration) -> Self {
        self.drain_timeout_ms = duration_ms(timeout);
        self
    }

    /// Set the initial runtime state.
    #[must_use]
    pub const fn with_enabled(mut self, enabled: bool) -> Self {
        self.scheduler_enabled = enabled;
        self
    }

    /// Seed the jitter RNG.
    #[must_use]
    pub const fn with_jitter_seed(mut self, seed: u64) -> Self {
        self.jitter_seed = Some(seed);
        self
    }

    /// Tick interval.
    pub const fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    /// Plugin deadline.
    pub const fn per_run_timeout(&self) -> Duration {
        Duration::from_millis(self.per_run_timeout_ms)
    }

    /// Cancel grace period.
    pub const fn cancel_grace(&self) -> Duration {
        Duration::from_millis(self.cancel_grace_ms)
    }

    /// On-demand enqueue timeout.
    pub const fn trigger_enqueue_timeout(&self) -> Duration {
        Duration::from_millis(self.trigger_enqueue_timeout_ms)
    }

    /// Execution TTL.
    pub const fn execution_ttl(&self) -> Duration {
        Duration::from_millis(self.execution_ttl_ms)
    }

    /// Shutdown drain timeout.
    pub const fn drain_timeout(&self) -> Duration {
        Duration::from_millis(self.drain_timeout_ms)
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), String> {
        if self.workers == 0 {
            return Err("workers must be greater than 0".into());
        }
        if self.queue_capacity == 0 {
            return Err("queue_capacity must be greater than 0".into());
        }
        if self.results_per_tuple == 0 {
            return Err("results_per_tuple must be greater than 0".into());
        }
        for (name, value) in [
            ("tick_interval_ms", self.tick_interval_ms),
            ("per_run_timeout_ms", self.per_run_timeout_ms),
            ("trigger_enqueue_timeout_ms", self.trigger_enqueue_timeout_ms),
            ("execution_ttl_ms", self.execution_ttl_ms),
            ("drain_timeout_ms", self.drain_timeout_ms),
        ] {
            if value == 0 {
                return Err(format!("{name} must be greater than 0"));
            }
        }
        // Running executions past the TTL are swept as abandoned
        if self.execution_ttl_ms <= self.per_run_timeout_ms.saturating_add(self.cancel_grace_ms) {
            return Err("execution_ttl_ms must exceed per_run_timeout_ms + cancel_grace_ms".into());
        }
        Ok(())
    }

    /// Parse configuration from a JSON string and validate. Missing fields take
    /// their defaults.
    pub fn from_json_str(input: &str) -> Result<Self, String> {
        let cfg: Self = serde_json::from_str(input).map_err(|e| format!("parse error: {e}"))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Load configuration from the environment (and a `.env` file if present).
    ///
    /// Recognized variables are `HAPPYDOMAIN_CHECK_` followed by the upper-case
    /// field name, e.g. `HAPPYDOMAIN_CHECK_WORKERS` or
    /// `HAPPYDOMAIN_CHECK_TICK_INTERVAL_MS`.
    pub fn from_env() -> AppResult<Self> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> AppResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();
        let var = |name: &str| lookup(&format!("{ENV_PREFIX}{name}"));

        if let Some(v) = var("WORKERS") {
            cfg.workers = parse_var("WORKERS", &v)?;
        }
        if let Some(v) = var("QUEUE_CAPACITY") {
            cfg.queue_capacity = parse_var("QUEUE_CAPACITY", &v)?;
        }
        if let Some(v) = var("TICK_INTERVAL_MS") {
            cfg.tick_interval_ms = parse_var("TICK_INTERVAL_MS", &v)?;
        }
        if let Some(v) = var("PER_RUN_TIMEOUT_MS") {
            cfg.per_run_timeout_ms = parse_var("PER_RUN_TIMEOUT_MS", &v)?;
        }
        if let Some(v) = var("CANCEL_GRACE_MS") {
            cfg.cancel_grace_ms = parse_var("CANCEL_GRACE_MS", &v)?;
        }
        if let Some(v) = var("TRIGGER_ENQUEUE_TIMEOUT_MS") {
            cfg.trigger_enqueue_timeout_ms = parse_var("TRIGGER_ENQUEUE_TIMEOUT_MS", &v)?;
        }
        if let Some(v) = var("EXECUTION_TTL_MS") {
            cfg.execution_ttl_ms = parse_var("EXECUTION_TTL_MS", &v)?;
        }
        if let Some(v) = var("RESULTS_PER_TUPLE") {
            cfg.results_per_tuple = parse_var("RESULTS_PER_TUPLE", &v)?;
        }
        if let Some(v) = var("DRAIN_TIMEOUT_MS") {
            cfg.drain_timeout_ms = parse_var("DRAIN_TIMEOUT_MS", &v)?;
        }
        if let Some(v) = var("SCHEDULER_ENABLED") {
            cfg.scheduler_enabled = parse_var("SCHEDULER_ENABLED", &v)?;
        }
        if let Some(v) = var("STATUS_UPCOMING") {
            cfg.status_upcoming = parse_var("STATUS_UPCOMING", &v)?;
        }
        if let Some(v) = var("JITTER_SEED") {
            cfg.jitter_seed = Some(parse_var("JITTER_SEED", &v)?);
        }

        cfg.validate().map_err(anyhow::Error::msg)?;
        Ok(cfg)
    }
}

fn parse_var<T>(name: &str, value: &str) -> AppResult<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    value
        .trim()
        .parse()
        .with_context(|| format!("invalid value for {ENV_PREFIX}{name}: `{value}`"))
}

fn duration_ms(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let cfg = SchedulerConfig::default();
        assert!(cfg.workers >= 4);
        assert_eq!(cfg.queue_capacity, 1024);
        assert_eq!(cfg.tick_interval(), Duration::from_secs(15));
        assert_eq!(cfg.per_run_timeout(), Duration::from_secs(60));
        assert_eq!(cfg.cancel_grace(), Duration::from_secs(5));
        assert_eq!(cfg.trigger_enqueue_timeout(), Duration::from_secs(5));
        assert_eq!(cfg.execution_ttl(), Duration::from_secs(3600));
        assert_eq!(cfg.results_per_tuple, 50);
        assert_eq!(cfg.drain_timeout(), Duration::from_secs(30));
        assert!(cfg.scheduler_enabled);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn lookup_overrides_defaults() {
        let vars: HashMap<String, String> = [
            ("HAPPYDOMAIN_CHECK_WORKERS", "2"),
            ("HAPPYDOMAIN_CHECK_TICK_INTERVAL_MS", "250"),
            ("HAPPYDOMAIN_CHECK_SCHEDULER_ENABLED", "false"),
            ("HAPPYDOMAIN_CHECK_JITTER_SEED", "42"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        let cfg = SchedulerConfig::from_lookup(|k| vars.get(k).cloned()).unwrap();
        assert_eq!(cfg.workers, 2);
        assert_eq!(cfg.tick_interval_ms, 250);
        assert!(!cfg.scheduler_enabled);
        assert_eq!(cfg.jitter_seed, Some(42));
        assert_eq!(cfg.queue_capacity, 1024);
    }

    #[test]
    fn lookup_rejects_bad_values() {
        let err = SchedulerConfig::from_lookup(|k| {
            (k == "HAPPYDOMAIN_CHECK_WORKERS").then(|| "many".to_string())
        })
        .unwrap_err();
        assert!(err.to_string().contains("HAPPYDOMAIN_CHECK_WORKERS"));

        assert!(SchedulerConfig::from_lookup(|k| {
            (k == "HAPPYDOMAIN_CHECK_WORKERS").then(|| "0".to_string())
        })
        .is_err());
    }
}
