//! Checker plugin abstraction.
//!
//! A checker is an immutable, in-memory descriptor plus a `run` entry point.
//! Plugins are registered once at process init (see
//! [`CheckerRegistry`](super::CheckerRegistry)) and executed by scheduler
//! workers.
//!
//! # Cancellation contract
//!
//! `run` receives a [`CancelSignal`] inside its [`RunContext`]. When the
//! per-run deadline expires the signal fires and the plugin is expected to
//! return promptly. A plugin that ignores the signal is not killed: the worker
//! stops waiting after a grace period, records a timeout and moves on, leaving
//! the plugin future detached.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use super::{AppResult, CheckScope, CheckerOptions, Identifier, OptionsDoc, ScopeKind, Verdict};

/// Scope kinds a checker can be attached to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Availability {
    /// Runs against domains.
    pub applies_to_domain: bool,
    /// Runs against services.
    pub applies_to_service: bool,
}

impl Availability {
    /// Domain-only checker.
    pub const fn domain() -> Self {
        Self {
            applies_to_domain: true,
            applies_to_service: false,
        }
    }

    /// Service-only checker.
    pub const fn service() -> Self {
        Self {
            applies_to_domain: false,
            applies_to_service: true,
        }
    }

    /// Whether the checker may run at a scope of `kind`. Admin and user scopes
    /// accept every checker.
    pub const fn applies_to(&self, kind: ScopeKind) -> bool {
        match kind {
            ScopeKind::Admin | ScopeKind::User => true,
            ScopeKind::Domain => self.applies_to_domain,
            ScopeKind::Service => self.applies_to_service,
        }
    }
}

/// Verdict and report produced by a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckOutcome {
    /// Verdict.
    pub verdict: Verdict,
    /// Checker-specific report.
    pub report: serde_json::Value,
}

impl CheckOutcome {
    /// Outcome with the given verdict.
    pub const fn new(verdict: Verdict, report: serde_json::Value) -> Self {
        Self { verdict, report }
    }

    /// Passing outcome.
    pub const fn pass(report: serde_json::Value) -> Self {
        Self::new(Verdict::Pass, report)
    }
}

/// Cooperative cancellation flag handed to plugins.
#[derive(Debug, Clone)]
pub struct CancelSignal {
    tx: Arc<watch::Sender<bool>>,
}

impl CancelSignal {
    /// Fresh, unfired signal.
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Fire the signal. Idempotent.
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    /// Whether the signal has fired.
    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolves once the signal fires.
    pub async fn cancelled(&self) {
        let mut rx = self.tx.subscribe();
        let _ = rx.wait_for(|fired| *fired).await;
    }
}

impl Default for CancelSignal {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-run metadata passed to [`Checker::run`].
#[derive(Debug, Clone)]
pub struct RunContext {
    /// Execution being processed.
    pub execution_id: Identifier,
    /// Checker name.
    pub checker_name: String,
    /// Target scope.
    pub scope: CheckScope,
    /// User the run is performed for.
    pub owner_id: Option<Identifier>,
    /// Fires when the run deadline expires or the scheduler stops waiting.
    pub cancel: CancelSignal,
}

/// Optional capability: render a result report as HTML.
pub trait HtmlReporter: Send + Sync {
    /// Render `report` as an HTML fragment.
    fn render_html(&self, report: &serde_json::Value) -> AppResult<String>;
}

/// A check plugin.
///
/// Side effects must go through ports injected into the plugin at
/// construction; `run` itself is treated as pure by the scheduler.
#[async_trait]
pub trait Checker: Send + Sync + 'static {
    /// Stable registry key.
    fn name(&self) -> &str;

    /// Human label.
    fn display_name(&self) -> &str {
        self.name()
    }

    /// Scopes the checker applies to.
    fn availability(&self) -> Availability;

    /// Documented options.
    fn options_doc(&self) -> OptionsDoc {
        OptionsDoc::default()
    }

    /// HTML rendering capability, if the checker has one.
    fn html_reporter(&self) -> Option<&dyn HtmlReporter> {
        None
    }

    /// Whether [`Checker::html_reporter`] is available.
    fn supports_html_report(&self) -> bool {
        self.html_reporter().is_some()
    }

    /// Run the check with fully resolved options.
    async fn run(&self, options: CheckerOptions, ctx: RunContext) -> AppResult<CheckOutcome>;
}
