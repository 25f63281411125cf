//! Tests for the API request/response layer

use async_trait::async_trait;
use happydomain_checks::builders::SchedulerBuilder;
use happydomain_checks::config::SchedulerConfig;
use happydomain_checks::core::{
    AppResult, Availability, CheckError, CheckOutcome, CheckScope, Checker, CheckerOptions,
    CheckerRegistry, ExecutionState, HtmlReporter, Identifier, RunContext, Scheduler, Verdict,
};
use happydomain_checks::runtime::{
    execution_status, get_checker, health, list_checkers, scheduler_status, trigger,
    TriggerRequest,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

struct ZoneChecker;

impl HtmlReporter for ZoneChecker {
    fn render_html(&self, report: &serde_json::Value) -> AppResult<String> {
        Ok(format!("<p>{report}</p>"))
    }
}

#[async_trait]
impl Checker for ZoneChecker {
    fn name(&self) -> &str {
        "zone"
    }

    fn display_name(&self) -> &str {
        "Zone consistency"
    }

    fn availability(&self) -> Availability {
        Availability::domain()
    }

    fn html_reporter(&self) -> Option<&dyn HtmlReporter> {
        Some(self)
    }

    async fn run(&self, _options: CheckerOptions, _ctx: RunContext) -> AppResult<CheckOutcome> {
        Ok(CheckOutcome::new(Verdict::Warn, json!({ "serial": 7 })))
    }
}

struct PortChecker;

#[async_trait]
impl Checker for PortChecker {
    fn name(&self) -> &str {
        "port"
    }

    fn availability(&self) -> Availability {
        Availability::service()
    }

    async fn run(&self, _options: CheckerOptions, _ctx: RunContext) -> AppResult<CheckOutcome> {
        Ok(CheckOutcome::pass(json!({})))
    }
}

fn scheduler() -> Scheduler {
    let registry = Arc::new(CheckerRegistry::new());
    registry
        .register(Arc::new(ZoneChecker))
        .expect("Failed to register checker");
    registry
        .register(Arc::new(PortChecker))
        .expect("Failed to register checker");
    SchedulerBuilder::new(
        SchedulerConfig::new()
            .with_workers(1)
            .with_queue_capacity(4)
            .with_tick_interval(Duration::from_secs(3600)),
    )
    .with_registry(registry)
    .build()
    .expect("Failed to build scheduler")
}

#[test]
fn test_list_checkers_sorted_with_capabilities() {
    let scheduler = scheduler();
    let checkers = list_checkers(scheduler.registry());
    let names: Vec<&str> = checkers.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["port", "zone"]);

    assert_eq!(checkers[0].display_name, "port");
    assert!(!checkers[0].supports_html_report);
    assert!(checkers[1].supports_html_report);
    assert!(checkers[1].availability.applies_to_domain);
}

#[test]
fn test_get_checker_unknown() {
    let scheduler = scheduler();
    assert_eq!(
        get_checker(scheduler.registry(), "zone")
            .expect("Failed to get checker")
            .display_name,
        "Zone consistency"
    );
    assert!(matches!(
        get_checker(scheduler.registry(), "nope"),
        Err(CheckError::UnknownChecker(_))
    ));
}

#[test]
fn test_trigger_request_from_json() {
    let domain_id = Identifier::new();
    let body = format!(
        r#"{{"checker_name": "zone", "scope": {{"kind": "domain", "domain_id": "{domain_id}"}}}}"#
    );
    let req: TriggerRequest = serde_json::from_str(&body).expect("Failed to parse request");
    assert_eq!(req.scope, CheckScope::Domain { domain_id });
    assert!(req.user_id.is_none());
    assert!(req.options.is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_trigger_and_poll_execution() {
    let scheduler = scheduler();
    assert!(!health(&scheduler).ok);

    let scope = CheckScope::Domain {
        domain_id: Identifier::new(),
    };
    let req = TriggerRequest {
        checker_name: "zone".to_string(),
        scope,
        user_id: None,
        options: CheckerOptions::new(),
    };
    assert!(matches!(
        trigger(&scheduler, req.clone()).await,
        Err(CheckError::NotRunning)
    ));

    scheduler.start().await.expect("Failed to start scheduler");
    let live = health(&scheduler);
    assert!(live.ok && live.running && live.enabled);

    let accepted = trigger(&scheduler, req).await.expect("Failed to trigger");
    let mut response = execution_status(&scheduler, &accepted.execution_id)
        .await
        .expect("Failed to read execution");
    for _ in 0..200 {
        if response.execution.state.is_terminal() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
        response = execution_status(&scheduler, &accepted.execution_id)
            .await
            .expect("Failed to read execution");
    }
    assert_eq!(response.execution.state, ExecutionState::Succeeded);
    let result = response.result.expect("result missing");
    assert_eq!(result.verdict, Verdict::Warn);
    assert_eq!(result.report, json!({ "serial": 7 }));

    let status = scheduler_status(&scheduler)
        .await
        .expect("Failed to read status");
    assert_eq!(status.workers, 1);
    assert_eq!(status.stats.succeeded, 1);
    assert!(status.next_runs.is_empty());

    let mismatched = TriggerRequest {
        checker_name: "port".to_string(),
        scope,
        user_id: None,
        options: CheckerOptions::new(),
    };
    assert!(matches!(
        trigger(&scheduler, mismatched).await,
        Err(CheckError::Validation(_))
    ));

    scheduler.stop().await.expect("Failed to stop scheduler");
    assert!(!health(&scheduler).running);
}

#[tokio::test]
async fn test_execution_status_unknown_id() {
    let scheduler = scheduler();
    assert!(matches!(
        execution_status(&scheduler, &Identifier::new()).await,
        Err(CheckError::NotFound(_))
    ));
}
