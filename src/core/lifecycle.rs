//! Ownership cascades run when users or domains are deleted.

use serde::{Deserialize, Serialize};

use super::{CheckError, Identifier, OptionStore, ResultStore, ScheduleStore};

/// Number of records removed by a cascade.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CascadeReport {
    /// Schedules deleted.
    pub schedules: usize,
    /// Option layers deleted.
    pub option_layers: usize,
    /// Results deleted.
    pub results: usize,
}

/// Delete the schedules and option layers owned by a user.
///
/// # Errors
///
/// Storage failures; earlier deletions are not rolled back.
pub async fn on_user_deleted<S>(store: &S, user_id: &Identifier) -> Result<CascadeReport, CheckError>
where
    S: OptionStore + ScheduleStore + ?Sized,
{
    let report = CascadeReport {
        schedules: store.delete_schedules_by_owner(user_id).await?,
        option_layers: store.delete_layers_by_owner(user_id).await?,
        results: 0,
    };
    tracing::info!(
        user_id = %user_id,
        schedules = report.schedules,
        option_layers = report.option_layers,
        "removed checks owned by deleted user"
    );
    Ok(report)
}

/// Delete the schedules, option layers and results scoped to a domain or one
/// of its services.
///
/// # Errors
///
/// Storage failures; earlier deletions are not rolled back.
pub async fn on_domain_deleted<S>(
    store: &S,
    domain_id: &Identifier,
) -> Result<CascadeReport, CheckError>
where
    S: OptionStore + ScheduleStore + ResultStore + ?Sized,
{
    let report = CascadeReport {
        schedules: store.delete_schedules_for_domain(domain_id).await?,
        option_layers: store.delete_layers_for_domain(domain_id).await?,
        results: store.delete_results_for_domain(domain_id).await?,
    };
    tracing::info!(
        domain_id = %domain_id,
        schedules = report.schedules,
        option_layers = report.option_layers,
        results = report.results,
        "removed checks scoped to deleted domain"
    );
    Ok(report)
}
