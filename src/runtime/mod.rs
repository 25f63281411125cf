//! API surface consumed by the HTTP layer.

pub mod api;

pub use api::{
    execution_status, get_checker, health, list_checkers, scheduler_status, trigger,
    CheckerSummary, ExecutionResponse, Health, SchedulerStatusResponse, TriggerRequest,
    TriggerResponse, UpcomingRun,
};
