//! Core check abstractions: scopes, plugins, storage contracts, option
//! resolution and the scheduler.

pub mod checker;
pub mod error;
pub mod execution;
pub mod identifier;
pub mod lifecycle;
pub mod options;
pub mod ports;
pub mod registry;
pub mod resolver;
pub mod schedule;
pub mod scheduler;
pub mod scope;
pub mod status;
pub mod store;

pub use checker::{
    Availability, CancelSignal, CheckOutcome, Checker, HtmlReporter, RunContext,
};
pub use error::{AppResult, BoxError, CheckError};
pub use execution::{CheckExecution, CheckResult, ExecutionState, TriggeredBy, Verdict};
pub use identifier::Identifier;
pub use lifecycle::{on_domain_deleted, on_user_deleted, CascadeReport};
pub use options::{
    merge_options, AutoFill, CheckerOptions, OptionDoc, OptionLayer, OptionsDoc,
};
pub use ports::{
    DomainInfo, DomainStore, IdentityStore, ServiceInfo, UserInfo, ZoneInfo, ZoneStore,
};
pub use registry::CheckerRegistry;
pub use resolver::OptionResolver;
pub use schedule::{CheckerSchedule, MIN_INTERVAL};
pub use scheduler::{reasons, Scheduler, SchedulerStats, SchedulerStatus, TickReport};
pub use scope::{CheckScope, ScopeKind};
pub use status::{checker_statuses, render_html_report, CheckerStatus};
pub use store::{
    Admission, CheckStore, ExecutionStore, OptionStore, ResultStore, ScheduleStore,
};
