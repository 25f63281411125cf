//! Tests for error types

use happydomain_checks::core::CheckError;

#[test]
fn test_not_found_error() {
    let err = CheckError::NotFound("schedule 42".to_string());
    assert_eq!(format!("{}", err), "not found: schedule 42");
    assert!(err.is_not_found());
}

#[test]
fn test_scheduler_state_errors() {
    assert_eq!(format!("{}", CheckError::SchedulerDisabled), "scheduler disabled");
    assert_eq!(format!("{}", CheckError::NotRunning), "scheduler not running");
    assert_eq!(format!("{}", CheckError::QueueTimeout), "queue timeout");
    assert!(!CheckError::QueueTimeout.is_not_found());
}

#[test]
fn test_unknown_checker_error() {
    let err = CheckError::UnknownChecker("dnssec".to_string());
    assert_eq!(format!("{}", err), "unknown checker: dnssec");
}

#[test]
fn test_plugin_errors() {
    let err = CheckError::PluginError("resolver unreachable".to_string());
    assert_eq!(format!("{}", err), "plugin error: resolver unreachable");
    let err = CheckError::PluginTimeout("zonemaster exceeded 60s".to_string());
    assert_eq!(format!("{}", err), "plugin timeout: zonemaster exceeded 60s");
}

#[test]
fn test_storage_error_keeps_source() {
    let io = std::io::Error::new(std::io::ErrorKind::Other, "disk gone");
    let err = CheckError::storage(io);
    assert_eq!(format!("{}", err), "storage error: disk gone");
    assert!(std::error::Error::source(&err).is_some());
}

#[test]
fn test_shutdown_error_joins_reasons() {
    let err = CheckError::Shutdown(vec!["tick loop".to_string(), "worker 1".to_string()]);
    assert_eq!(format!("{}", err), "shutdown failed: tick loop; worker 1");
}

#[test]
fn test_converts_into_anyhow() {
    let err: anyhow::Error = CheckError::Forbidden("not yours".to_string()).into();
    assert_eq!(err.to_string(), "forbidden: not yours");
    assert!(err.downcast_ref::<CheckError>().is_some());
}
