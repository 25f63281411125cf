//! Per-target checker status projection and HTML report rendering.

use serde::{Deserialize, Serialize};

use super::{
    AppResult, CheckError, CheckResult, CheckScope, CheckerRegistry, CheckerSchedule, Identifier,
    ResultStore, ScheduleStore,
};

/// What a user sees for one checker on one target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckerStatus {
    /// Checker name.
    pub checker_name: String,
    /// `false` only when the user's schedule for this target is disabled.
    pub enabled: bool,
    /// The user's schedule for this target, if any.
    pub schedule: Option<CheckerSchedule>,
    /// Most recent result for this target, if any.
    pub last_result: Option<CheckResult>,
}

/// Status of every registered checker applicable to `scope`, ordered by name.
///
/// # Errors
///
/// Storage failures from either store.
pub async fn checker_statuses<S>(
    registry: &CheckerRegistry,
    store: &S,
    owner_id: &Identifier,
    scope: &CheckScope,
) -> Result<Vec<CheckerStatus>, CheckError>
where
    S: ScheduleStore + ResultStore + ?Sized,
{
    let schedules = store.list_by_target(scope).await?;
    let mut statuses = Vec::new();
    for checker in registry.list() {
        if !checker.availability().applies_to(scope.kind()) {
            continue;
        }
        let name = checker.name();
        let schedule = schedules
            .iter()
            .find(|s| s.checker_name == name && &s.owner_id == owner_id)
            .cloned();
        let last_result = store.list_results(name, scope, 1).await?.into_iter().next();
        statuses.push(CheckerStatus {
            checker_name: name.to_string(),
            enabled: schedule.as_ref().map_or(true, |s| s.enabled),
            schedule,
            last_result,
        });
    }
    Ok(statuses)
}

/// Render a stored result through its checker's HTML reporter.
///
/// Returns `Ok(None)` when the checker has no HTML capability.
///
/// # Errors
///
/// `UnknownChecker` if the result's checker is no longer registered; any
/// rendering failure from the plugin.
pub fn render_html_report(
    registry: &CheckerRegistry,
    result: &CheckResult,
) -> AppResult<Option<String>> {
    let checker = registry.get(&result.checker_name)?;
    checker
        .html_reporter()
        .map(|reporter| reporter.render_html(&result.report))
        .transpose()
}
