//! Tests for configuration validation

use happydomain_checks::config::{ResolverConfig, SchedulerConfig};
use std::collections::HashMap;
use std::time::Duration;

#[test]
fn test_scheduler_config_defaults_are_valid() {
    let cfg = SchedulerConfig::default();
    assert!(cfg.validate().is_ok());
    assert_eq!(cfg.queue_capacity, 1024);
    assert_eq!(cfg.results_per_tuple, 50);
    assert!(cfg.scheduler_enabled);
}

#[test]
fn test_scheduler_config_invalid_workers() {
    let cfg = SchedulerConfig::new().with_workers(0);
    assert!(cfg.validate().is_err());
}

#[test]
fn test_scheduler_config_invalid_queue_capacity() {
    let cfg = SchedulerConfig::new().with_queue_capacity(0);
    assert!(cfg.validate().is_err());
}

#[test]
fn test_scheduler_config_invalid_results_cap() {
    let cfg = SchedulerConfig::new().with_results_per_tuple(0);
    assert!(cfg.validate().is_err());
}

#[test]
fn test_scheduler_config_invalid_durations() {
    let cfg = SchedulerConfig::new().with_tick_interval(Duration::ZERO);
    let err = cfg.validate().expect_err("zero tick interval accepted");
    assert!(err.contains("tick_interval_ms"));

    let cfg = SchedulerConfig::new().with_per_run_timeout(Duration::ZERO);
    assert!(cfg.validate().is_err());
}

#[test]
fn test_scheduler_config_ttl_must_outlive_run_deadline() {
    let cfg = SchedulerConfig::new()
        .with_per_run_timeout(Duration::from_secs(60))
        .with_cancel_grace(Duration::from_secs(5))
        .with_execution_ttl(Duration::from_secs(65));
    let err = cfg.validate().expect_err("ttl shorter than a run accepted");
    assert!(err.contains("execution_ttl_ms"));

    let cfg = cfg.with_execution_ttl(Duration::from_secs(66));
    assert!(cfg.validate().is_ok());
}

#[test]
fn test_scheduler_config_builders() {
    let cfg = SchedulerConfig::new()
        .with_workers(3)
        .with_tick_interval(Duration::from_secs(30))
        .with_cancel_grace(Duration::from_millis(250))
        .with_enabled(false)
        .with_jitter_seed(7);
    assert_eq!(cfg.workers, 3);
    assert_eq!(cfg.tick_interval(), Duration::from_secs(30));
    assert_eq!(cfg.cancel_grace(), Duration::from_millis(250));
    assert!(!cfg.scheduler_enabled);
    assert_eq!(cfg.jitter_seed, Some(7));
}

#[test]
fn test_scheduler_config_from_json() {
    let cfg = SchedulerConfig::from_json_str(r#"{"workers": 2, "tick_interval_ms": 500}"#)
        .expect("Failed to parse config");
    assert_eq!(cfg.workers, 2);
    assert_eq!(cfg.tick_interval(), Duration::from_millis(500));
    assert_eq!(cfg.per_run_timeout(), Duration::from_secs(60));

    assert!(SchedulerConfig::from_json_str(r#"{"workers": 0}"#).is_err());
    assert!(SchedulerConfig::from_json_str("not json").is_err());
}

#[test]
fn test_scheduler_config_from_lookup() {
    let vars: HashMap<&str, &str> = [
        ("HAPPYDOMAIN_CHECK_QUEUE_CAPACITY", "8"),
        ("HAPPYDOMAIN_CHECK_SCHEDULER_ENABLED", "false"),
    ]
    .into_iter()
    .collect();
    let cfg = SchedulerConfig::from_lookup(|k| vars.get(k).map(|v| (*v).to_string()))
        .expect("Failed to load config");
    assert_eq!(cfg.queue_capacity, 8);
    assert!(!cfg.scheduler_enabled);

    let broken = SchedulerConfig::from_lookup(|k| {
        (k == "HAPPYDOMAIN_CHECK_WORKERS").then(|| "many".to_string())
    });
    assert!(broken.is_err());
}

#[test]
fn test_resolver_config_defaults_to_lenient() {
    assert!(!ResolverConfig::default().strict_options);
    let cfg: ResolverConfig = serde_json::from_str("{}").expect("Failed to parse config");
    assert_eq!(cfg, ResolverConfig::default());
}
